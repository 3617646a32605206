//! Resource and instance addresses

use crate::error::AddressError;
use crate::module::{ModuleInstance, ModulePath};
use crate::parse::parse_address;
use serde::{Deserialize, Serialize};
use std::fmt::{self, Display, Formatter};
use std::str::FromStr;

/// Key distinguishing instances of a repeated resource or module
///
/// Ordering is `NoKey < Int < Str`, and within a variant the natural order,
/// so sorted key sets are deterministic.
#[derive(Debug, Clone, Default, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(untagged)]
pub enum InstanceKey {
    /// No repetition
    #[default]
    NoKey,
    /// Index produced by `count`
    Int(i64),
    /// Key produced by `for_each`
    Str(String),
}

impl InstanceKey {
    /// Check if this is [`InstanceKey::NoKey`]
    #[inline]
    #[must_use]
    pub fn is_none(&self) -> bool {
        matches!(self, Self::NoKey)
    }
}

impl Display for InstanceKey {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        match self {
            Self::NoKey => Ok(()),
            Self::Int(n) => write!(f, "[{n}]"),
            Self::Str(s) => {
                f.write_str("[\"")?;
                for c in s.chars() {
                    if c == '"' || c == '\\' {
                        f.write_str("\\")?;
                    }
                    write!(f, "{c}")?;
                }
                f.write_str("\"]")
            }
        }
    }
}

impl From<i64> for InstanceKey {
    fn from(value: i64) -> Self {
        Self::Int(value)
    }
}

impl From<&str> for InstanceKey {
    fn from(value: &str) -> Self {
        Self::Str(value.to_string())
    }
}

/// A resource relative to its module: `kind.name`
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct Resource {
    /// Resource type, e.g. `aws_instance`
    pub kind: String,
    /// Configured name
    pub name: String,
}

impl Resource {
    /// Create a resource
    #[inline]
    #[must_use]
    pub fn new(kind: impl Into<String>, name: impl Into<String>) -> Self {
        Self {
            kind: kind.into(),
            name: name.into(),
        }
    }

    /// Place this resource in a module instance
    #[inline]
    #[must_use]
    pub fn absolute(&self, module: ModuleInstance) -> ResourceAddress {
        ResourceAddress {
            module,
            resource: self.clone(),
        }
    }

    /// Place this resource in an unexpanded module
    #[inline]
    #[must_use]
    pub fn in_module(&self, module: ModulePath) -> ConfigResource {
        ConfigResource {
            module,
            resource: self.clone(),
        }
    }
}

impl Display for Resource {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        write!(f, "{}.{}", self.kind, self.name)
    }
}

fn write_in_module(f: &mut Formatter<'_>, module: &dyn Display, is_root: bool, rest: &dyn Display) -> fmt::Result {
    if is_root {
        write!(f, "{rest}")
    } else {
        write!(f, "{module}.{rest}")
    }
}

/// A resource in an expanded module instance (no instance key)
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct ResourceAddress {
    /// Containing module instance
    pub module: ModuleInstance,
    /// The resource
    pub resource: Resource,
}

impl ResourceAddress {
    /// Address of one instance of this resource
    #[inline]
    #[must_use]
    pub fn instance(&self, key: InstanceKey) -> InstanceAddress {
        InstanceAddress {
            resource: self.clone(),
            key,
        }
    }

    /// The unexpanded resource this belongs to
    #[inline]
    #[must_use]
    pub fn config(&self) -> ConfigResource {
        self.resource.in_module(self.module.module_path())
    }
}

impl Display for ResourceAddress {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        write_in_module(f, &self.module, self.module.is_root(), &self.resource)
    }
}

impl FromStr for ResourceAddress {
    type Err = AddressError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let parsed = parse_address(s)?;
        match parsed.resource {
            Some((resource, None)) => Ok(resource.absolute(parsed.module)),
            Some((_, Some(_))) => Err(AddressError::UnexpectedChar {
                input: s.to_string(),
                offset: s.rfind('[').unwrap_or(0),
                found: '[',
            }),
            None => Err(AddressError::MissingResource(s.to_string())),
        }
    }
}

/// A resource in an unexpanded module
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct ConfigResource {
    /// Containing module
    pub module: ModulePath,
    /// The resource
    pub resource: Resource,
}

impl Display for ConfigResource {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        write_in_module(f, &self.module, self.module.is_root(), &self.resource)
    }
}

/// One concrete instance of a resource
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct InstanceAddress {
    /// The resource
    pub resource: ResourceAddress,
    /// Instance key
    pub key: InstanceKey,
}

impl InstanceAddress {
    /// Create an instance address
    #[inline]
    #[must_use]
    pub fn new(resource: ResourceAddress, key: InstanceKey) -> Self {
        Self { resource, key }
    }

    /// Containing module instance
    #[inline]
    #[must_use]
    pub fn module(&self) -> &ModuleInstance {
        &self.resource.module
    }
}

impl Display for InstanceAddress {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        write!(f, "{}{}", self.resource, self.key)
    }
}

impl FromStr for InstanceAddress {
    type Err = AddressError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let parsed = parse_address(s)?;
        let (resource, key) = parsed
            .resource
            .ok_or_else(|| AddressError::MissingResource(s.to_string()))?;
        Ok(resource.absolute(parsed.module).instance(key.unwrap_or_default()))
    }
}

macro_rules! string_serde {
    ($ty:ty) => {
        impl Serialize for $ty {
            fn serialize<S: serde::Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
                serializer.collect_str(self)
            }
        }

        impl<'de> Deserialize<'de> for $ty {
            fn deserialize<D: serde::Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
                let s = String::deserialize(deserializer)?;
                s.parse().map_err(serde::de::Error::custom)
            }
        }
    };
}

string_serde!(ResourceAddress);
string_serde!(InstanceAddress);
