/// Errors produced while parsing or building addresses
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum AddressError {
    /// Input was empty where an address was required
    #[error("empty address")]
    Empty,

    /// Unexpected character at a byte offset
    #[error("unexpected {found:?} at offset {offset} in {input:?}")]
    UnexpectedChar {
        /// Full input
        input: String,
        /// Byte offset of the offending character
        offset: usize,
        /// The character found
        found: char,
    },

    /// Input ended in the middle of an address
    #[error("unexpected end of address {0:?}")]
    UnexpectedEnd(String),

    /// Integer key did not fit
    #[error("invalid instance key {0:?}")]
    InvalidKey(String),

    /// A resource part was required but absent
    #[error("address {0:?} does not name a resource")]
    MissingResource(String),

    /// Provider address had the wrong shape
    #[error("invalid provider address {0:?}: {1}")]
    InvalidProvider(String, &'static str),

    /// Hostname failed normalization
    #[error("invalid hostname {0:?}")]
    InvalidHostname(String),
}
