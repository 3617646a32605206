use crate::platform::Platform;
use infragraph_addrs::ProviderAddr;
use semver::Version;
use std::cmp::Ordering;
use std::path::PathBuf;

/// Where a package lives on disk
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PackageLocation {
    /// Already-unpacked directory
    LocalDir(PathBuf),
    /// Zip archive
    LocalArchive(PathBuf),
}

/// One provider package found in a mirror
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PackageMeta {
    /// Provider the package belongs to
    pub provider: ProviderAddr,
    /// Package version
    pub version: Version,
    /// Platform the package is built for
    pub target_platform: Platform,
    /// Canonical archive filename, lowercase
    pub filename: String,
    /// Location on disk
    pub location: PackageLocation,
    /// Hex SHA-256 of the archive; only known for packed packages
    pub checksum: Option<String>,
}

impl PackageMeta {
    /// Canonical archive filename for a package
    #[must_use]
    pub fn canonical_filename(provider: &ProviderAddr, version: &Version, platform: &Platform) -> String {
        format!("terraform-provider-{}_{version}_{platform}.zip", provider.kind)
    }
}

impl PartialOrd for PackageMeta {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

/// Newest version first, then by platform
impl Ord for PackageMeta {
    fn cmp(&self, other: &Self) -> Ordering {
        other
            .version
            .cmp(&self.version)
            .then_with(|| self.target_platform.cmp(&other.target_platform))
            .then_with(|| self.filename.cmp(&other.filename))
            .then_with(|| location_path(&self.location).cmp(location_path(&other.location)))
    }
}

fn location_path(location: &PackageLocation) -> &PathBuf {
    match location {
        PackageLocation::LocalDir(p) | PackageLocation::LocalArchive(p) => p,
    }
}
