use crate::error::AddressError;
use crate::parse::parse_relative;
use crate::resource::{InstanceKey, Resource};
use serde::{Deserialize, Serialize};
use std::fmt::{self, Display, Formatter};
use std::str::FromStr;

/// Module-relative reference to a resource or one of its instances
///
/// Expressions declare these; the reference transformer turns them into
/// edges. `aws_instance.web` refers to every instance, `aws_instance.web[0]`
/// to one.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct Reference {
    /// Referenced resource
    pub resource: Resource,
    /// Specific instance, if any
    pub key: Option<InstanceKey>,
}

impl Reference {
    /// Reference to a whole resource
    #[inline]
    #[must_use]
    pub fn resource(kind: impl Into<String>, name: impl Into<String>) -> Self {
        Self {
            resource: Resource::new(kind, name),
            key: None,
        }
    }

    /// Narrow to one instance
    #[inline]
    #[must_use]
    pub fn with_key(mut self, key: InstanceKey) -> Self {
        self.key = Some(key);
        self
    }

    /// The containing-resource form of this reference, if it names an instance
    #[must_use]
    pub fn containing_resource(&self) -> Option<Self> {
        self.key.as_ref().map(|_| Self {
            resource: self.resource.clone(),
            key: None,
        })
    }
}

impl Display for Reference {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        match &self.key {
            Some(key) => write!(f, "{}{key}", self.resource),
            None => write!(f, "{}", self.resource),
        }
    }
}

impl FromStr for Reference {
    type Err = AddressError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let (resource, key) = parse_relative(s)?;
        Ok(Self { resource, key })
    }
}

impl Serialize for Reference {
    fn serialize<S: serde::Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.collect_str(self)
    }
}

impl<'de> Deserialize<'de> for Reference {
    fn deserialize<D: serde::Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let s = String::deserialize(deserializer)?;
        s.parse().map_err(serde::de::Error::custom)
    }
}
