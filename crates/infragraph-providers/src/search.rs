use crate::error::DiscoveryError;
use crate::package::{PackageLocation, PackageMeta};
use crate::platform::Platform;
use infragraph_addrs::{ProviderAddr, DEFAULT_REGISTRY_HOST, LEGACY_NAMESPACE};
use semver::Version;
use sha2::{Digest, Sha256};
use std::collections::BTreeMap;
use std::fs::File;
use std::path::{Path, PathBuf};
use tracing::{trace, warn};
use walkdir::{DirEntry, WalkDir};

const PACKAGE_PREFIX: &str = "terraform-provider-";
const PACKAGE_SUFFIX: &str = ".zip";

/// Scan `base` for provider packages in either mirror layout
///
/// Packages for each provider are sorted newest version first, then by
/// platform.
///
/// # Errors
/// Traversal failures, and packed archives that cannot be read for their
/// checksum.
pub fn search_local_directory(base: &Path) -> Result<BTreeMap<ProviderAddr, Vec<PackageMeta>>, DiscoveryError> {
    let mut found: BTreeMap<ProviderAddr, Vec<PackageMeta>> = BTreeMap::new();

    for entry in WalkDir::new(base).min_depth(4).max_depth(5) {
        let entry = entry.map_err(|source| DiscoveryError::Walk {
            path: source.path().map_or_else(|| base.to_path_buf(), Path::to_path_buf),
            source,
        })?;
        let Ok(relative) = entry.path().strip_prefix(base) else {
            trace!(path = %entry.path().display(), "ignoring path outside search base");
            continue;
        };
        let Some(parts) = relative
            .components()
            .map(|c| c.as_os_str().to_str())
            .collect::<Option<Vec<&str>>>()
        else {
            warn!(path = %entry.path().display(), "ignoring non-UTF-8 provider path");
            continue;
        };

        let meta = match parts.as_slice() {
            [host, namespace, kind, version, platform] if entry.file_type().is_dir() => {
                unpacked(&entry, host, namespace, kind, version, platform)
            }
            [host, namespace, kind, filename] if entry.file_type().is_file() => {
                packed(&entry, host, namespace, kind, filename)?
            }
            _ => None,
        };
        if let Some(meta) = meta {
            trace!(
                provider = %meta.provider,
                version = %meta.version,
                platform = %meta.target_platform,
                path = %entry.path().display(),
                "found provider package"
            );
            found.entry(meta.provider.clone()).or_default().push(meta);
        }
    }

    for packages in found.values_mut() {
        packages.sort();
    }
    Ok(found)
}

/// Canonical unpacked location of a package under `base`
#[must_use]
pub fn unpacked_directory_path_for_package(
    base: &Path,
    provider: &ProviderAddr,
    version: &Version,
    platform: &Platform,
) -> PathBuf {
    base.join(&provider.hostname)
        .join(&provider.namespace)
        .join(&provider.kind)
        .join(version.to_string())
        .join(platform.to_string())
}

fn provider_at(path: &Path, host: &str, namespace: &str, kind: &str) -> Option<ProviderAddr> {
    let Ok(hostname) = ProviderAddr::normalize_hostname(host) else {
        warn!(path = %path.display(), hostname = host, "local provider path contains invalid hostname; ignoring");
        return None;
    };
    if namespace == LEGACY_NAMESPACE {
        if hostname != DEFAULT_REGISTRY_HOST {
            warn!(path = %path.display(), "legacy provider outside the default registry host; ignoring");
            return None;
        }
        return Some(ProviderAddr::legacy(kind));
    }
    match ProviderAddr::new(&hostname, namespace, kind) {
        Ok(addr) => Some(addr),
        Err(err) => {
            warn!(path = %path.display(), error = %err, "invalid provider address; ignoring");
            None
        }
    }
}

fn parse_version(path: &Path, given: &str) -> Option<Version> {
    match Version::parse(given) {
        Ok(version) => Some(version),
        Err(err) => {
            warn!(path = %path.display(), version = given, error = %err, "ignoring provider path with invalid version");
            None
        }
    }
}

fn parse_platform(path: &Path, given: &str) -> Option<Platform> {
    match given.parse() {
        Ok(platform) => Some(platform),
        Err(err) => {
            warn!(path = %path.display(), platform = given, error = %err, "ignoring provider path with invalid platform");
            None
        }
    }
}

fn unpacked(
    entry: &DirEntry,
    host: &str,
    namespace: &str,
    kind: &str,
    version: &str,
    platform: &str,
) -> Option<PackageMeta> {
    let path = entry.path();
    let provider = provider_at(path, host, namespace, kind)?;
    let version = parse_version(path, version)?;
    let target_platform = parse_platform(path, platform)?;
    Some(PackageMeta {
        filename: PackageMeta::canonical_filename(&provider, &version, &target_platform),
        provider,
        version,
        target_platform,
        location: PackageLocation::LocalDir(path.to_path_buf()),
        checksum: None,
    })
}

fn packed(
    entry: &DirEntry,
    host: &str,
    namespace: &str,
    kind: &str,
    filename: &str,
) -> Result<Option<PackageMeta>, DiscoveryError> {
    let path = entry.path();
    let Some(provider) = provider_at(path, host, namespace, kind) else {
        return Ok(None);
    };

    // Matched case-insensitively; the lowercase form is the canonical name.
    let normalized = filename.to_lowercase();
    let prefix = format!("{PACKAGE_PREFIX}{}_", provider.kind);
    let Some(rest) = normalized.strip_prefix(&prefix) else {
        warn!(file = filename, %provider, %prefix, "ignoring possible package: lacks expected prefix");
        return Ok(None);
    };
    let Some(info) = rest.strip_suffix(PACKAGE_SUFFIX) else {
        warn!(file = filename, %provider, "ignoring possible package: not a zip archive");
        return Ok(None);
    };

    let info: Vec<&str> = info.split('_').collect();
    let [version, os, arch, ..] = info.as_slice() else {
        warn!(file = filename, %provider, "ignoring possible package: filename lacks version, OS and architecture");
        return Ok(None);
    };
    let Some(version) = parse_version(path, version) else {
        return Ok(None);
    };
    let Some(target_platform) = parse_platform(path, &format!("{os}_{arch}")) else {
        return Ok(None);
    };

    let checksum = sha256_file(path)?;
    Ok(Some(PackageMeta {
        provider,
        version,
        target_platform,
        filename: normalized,
        location: PackageLocation::LocalArchive(path.to_path_buf()),
        checksum: Some(checksum),
    }))
}

fn sha256_file(path: &Path) -> Result<String, DiscoveryError> {
    let io_err = |source| DiscoveryError::Io {
        path: path.to_path_buf(),
        source,
    };
    let mut file = File::open(path).map_err(io_err)?;
    let mut hasher = Sha256::new();
    std::io::copy(&mut file, &mut hasher).map_err(io_err)?;
    Ok(hex::encode(hasher.finalize()))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn unpacked_path_is_canonical() {
        let provider: ProviderAddr = "hashicorp/aws".parse().unwrap();
        let path = unpacked_directory_path_for_package(
            Path::new("/mirror"),
            &provider,
            &Version::new(2, 1, 0),
            &Platform::new("linux", "amd64"),
        );
        assert_eq!(
            path,
            Path::new("/mirror/registry.terraform.io/hashicorp/aws/2.1.0/linux_amd64")
        );
    }

    #[test]
    fn canonical_filename_uses_type() {
        let provider = ProviderAddr::legacy("null");
        assert_eq!(
            PackageMeta::canonical_filename(&provider, &Version::new(1, 0, 0), &Platform::new("darwin", "arm64")),
            "terraform-provider-null_1.0.0_darwin_arm64.zip"
        );
    }
}
