//! Provider identities

use crate::error::AddressError;
use serde::{Deserialize, Serialize};
use std::fmt::{self, Display, Formatter};
use std::str::FromStr;

/// Registry host assumed when an address omits one
pub const DEFAULT_REGISTRY_HOST: &str = "registry.terraform.io";

/// Namespace used by providers that predate namespacing
pub const LEGACY_NAMESPACE: &str = "-";

/// Fully-qualified provider identity: `hostname/namespace/type`
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct ProviderAddr {
    /// Normalized registry hostname
    pub hostname: String,
    /// Publisher namespace
    pub namespace: String,
    /// Provider type, e.g. `aws`
    pub kind: String,
}

impl ProviderAddr {
    /// Create a provider address, normalizing the hostname
    ///
    /// # Errors
    /// Returns [`AddressError::InvalidHostname`] for malformed hostnames and
    /// [`AddressError::InvalidProvider`] for a legacy namespace outside the
    /// default registry.
    pub fn new(
        hostname: &str,
        namespace: impl Into<String>,
        kind: impl Into<String>,
    ) -> Result<Self, AddressError> {
        let hostname = Self::normalize_hostname(hostname)?;
        let namespace = namespace.into();
        let kind = kind.into();
        if namespace == LEGACY_NAMESPACE && hostname != DEFAULT_REGISTRY_HOST {
            return Err(AddressError::InvalidProvider(
                format!("{hostname}/{namespace}/{kind}"),
                "legacy providers must live on the default registry host",
            ));
        }
        Ok(Self {
            hostname,
            namespace,
            kind,
        })
    }

    /// Legacy (un-namespaced) provider on the default registry
    #[must_use]
    pub fn legacy(kind: impl Into<String>) -> Self {
        Self {
            hostname: DEFAULT_REGISTRY_HOST.to_string(),
            namespace: LEGACY_NAMESPACE.to_string(),
            kind: kind.into(),
        }
    }

    /// Check if this is a legacy provider
    #[inline]
    #[must_use]
    pub fn is_legacy(&self) -> bool {
        self.namespace == LEGACY_NAMESPACE
    }

    /// Lowercase a hostname and check it only holds hostname characters
    ///
    /// # Errors
    /// Returns [`AddressError::InvalidHostname`] if the hostname is empty,
    /// has empty labels, or contains characters outside `[a-z0-9.-:]`.
    pub fn normalize_hostname(given: &str) -> Result<String, AddressError> {
        let host = given.trim().to_ascii_lowercase();
        let (name, port) = match host.split_once(':') {
            Some((name, port)) => (name, Some(port)),
            None => (host.as_str(), None),
        };
        let labels_ok = !name.is_empty()
            && name.split('.').all(|label| {
                !label.is_empty()
                    && !label.starts_with('-')
                    && !label.ends_with('-')
                    && label.chars().all(|c| c.is_ascii_alphanumeric() || c == '-')
            });
        let port_ok = port.map_or(true, |p| !p.is_empty() && p.chars().all(|c| c.is_ascii_digit()));
        if labels_ok && port_ok {
            Ok(host)
        } else {
            Err(AddressError::InvalidHostname(given.to_string()))
        }
    }
}

impl Display for ProviderAddr {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        write!(f, "{}/{}/{}", self.hostname, self.namespace, self.kind)
    }
}

impl FromStr for ProviderAddr {
    type Err = AddressError;

    /// Accepts `type`, `namespace/type` or `hostname/namespace/type`
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let parts: Vec<&str> = s.split('/').collect();
        if parts.iter().any(|p| p.is_empty()) {
            return Err(AddressError::InvalidProvider(s.to_string(), "empty segment"));
        }
        match parts.as_slice() {
            [kind] => Ok(Self::legacy(*kind)),
            [namespace, kind] => Self::new(DEFAULT_REGISTRY_HOST, *namespace, *kind),
            [hostname, namespace, kind] => Self::new(hostname, *namespace, *kind),
            _ => Err(AddressError::InvalidProvider(s.to_string(), "too many segments")),
        }
    }
}

impl Serialize for ProviderAddr {
    fn serialize<S: serde::Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.collect_str(self)
    }
}

impl<'de> Deserialize<'de> for ProviderAddr {
    fn deserialize<D: serde::Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let s = String::deserialize(deserializer)?;
        s.parse().map_err(serde::de::Error::custom)
    }
}
