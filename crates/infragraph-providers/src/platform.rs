use std::fmt::{self, Display, Formatter};
use std::str::FromStr;

/// Target operating system and architecture, written `os_arch`
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct Platform {
    /// Operating system, e.g. `linux`
    pub os: String,
    /// Architecture, e.g. `amd64`
    pub arch: String,
}

impl Platform {
    /// Create a platform
    #[must_use]
    pub fn new(os: impl Into<String>, arch: impl Into<String>) -> Self {
        Self {
            os: os.into(),
            arch: arch.into(),
        }
    }
}

impl Display for Platform {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        write!(f, "{}_{}", self.os, self.arch)
    }
}

/// Platform strings must be `os_arch`, each part lowercase alphanumeric
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("platform {0:?} must be two lowercase alphanumeric words separated by an underscore")]
pub struct InvalidPlatform(pub String);

impl FromStr for Platform {
    type Err = InvalidPlatform;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let valid = |part: &str| {
            !part.is_empty()
                && part
                    .chars()
                    .all(|c| c.is_ascii_lowercase() || c.is_ascii_digit())
        };
        match s.split_once('_') {
            Some((os, arch)) if valid(os) && valid(arch) => Ok(Self::new(os, arch)),
            _ => Err(InvalidPlatform(s.to_string())),
        }
    }
}
