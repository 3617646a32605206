//! Provider package discovery
//!
//! Scans a local mirror directory for provider packages. Two layouts are
//! recognised under `base`:
//!
//! - unpacked: `host/namespace/type/version/os_arch/` (a directory)
//! - packed: `host/namespace/type/terraform-provider-<type>_<version>_<os>_<arch>.zip`
//!
//! Entries that do not fit either layout are skipped with a warning.

#![warn(missing_docs)]

mod error;
mod package;
mod platform;
mod search;

pub use error::DiscoveryError;
pub use package::{PackageLocation, PackageMeta};
pub use platform::{InvalidPlatform, Platform};
pub use search::{search_local_directory, unpacked_directory_path_for_package};

/// Version of this crate
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
