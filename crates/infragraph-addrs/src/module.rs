//! Module paths and module instances

use crate::error::AddressError;
use crate::parse::parse_address;
use crate::resource::InstanceKey;
use serde::{Deserialize, Serialize};
use std::fmt::{self, Display, Formatter};
use std::str::FromStr;

/// Path of a module in the configuration tree, without instance keys
///
/// The root module is the empty path.
#[derive(Debug, Clone, Default, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct ModulePath(Vec<String>);

impl ModulePath {
    /// Create from call names
    #[inline]
    #[must_use]
    pub fn new(calls: Vec<String>) -> Self {
        Self(calls)
    }

    /// The root module
    #[inline]
    #[must_use]
    pub fn root() -> Self {
        Self(Vec::new())
    }

    /// Module call names from root to leaf
    #[inline]
    #[must_use]
    pub fn calls(&self) -> &[String] {
        &self.0
    }

    /// Check if this is the root module
    #[inline]
    #[must_use]
    pub fn is_root(&self) -> bool {
        self.0.is_empty()
    }

    /// Number of calls
    #[inline]
    #[must_use]
    pub fn len(&self) -> usize {
        self.0.len()
    }

    /// Check if the path is empty (same as root)
    #[inline]
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    /// Append a call, returning new path
    #[inline]
    #[must_use]
    pub fn child(&self, call: impl Into<String>) -> Self {
        let mut new = self.clone();
        new.0.push(call.into());
        new
    }

    /// Path of the parent module plus the final call name
    #[must_use]
    pub fn split_last(&self) -> Option<(Self, &str)> {
        let (last, parent) = self.0.split_last()?;
        Some((Self(parent.to_vec()), last.as_str()))
    }

    /// Check if `self` is `other` or one of its ancestors
    #[must_use]
    pub fn contains(&self, other: &Self) -> bool {
        other.0.starts_with(&self.0)
    }
}

impl Display for ModulePath {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        for (i, call) in self.0.iter().enumerate() {
            if i > 0 {
                f.write_str(".")?;
            }
            write!(f, "module.{call}")?;
        }
        Ok(())
    }
}

/// One step of a module instance: a call name and its instance key
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct ModuleInstanceStep {
    /// Module call name
    pub name: String,
    /// Key of this call's instance
    pub key: InstanceKey,
}

impl ModuleInstanceStep {
    /// Create a step
    #[inline]
    #[must_use]
    pub fn new(name: impl Into<String>, key: InstanceKey) -> Self {
        Self {
            name: name.into(),
            key,
        }
    }
}

/// An expanded module instance
#[derive(Debug, Clone, Default, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct ModuleInstance(Vec<ModuleInstanceStep>);

impl ModuleInstance {
    /// Create from steps
    #[inline]
    #[must_use]
    pub fn new(steps: Vec<ModuleInstanceStep>) -> Self {
        Self(steps)
    }

    /// The root module instance
    #[inline]
    #[must_use]
    pub fn root() -> Self {
        Self(Vec::new())
    }

    /// Steps from root to leaf
    #[inline]
    #[must_use]
    pub fn steps(&self) -> &[ModuleInstanceStep] {
        &self.0
    }

    /// Check if this is the root module instance
    #[inline]
    #[must_use]
    pub fn is_root(&self) -> bool {
        self.0.is_empty()
    }

    /// Number of steps
    #[inline]
    #[must_use]
    pub fn len(&self) -> usize {
        self.0.len()
    }

    /// Check if empty (same as root)
    #[inline]
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    /// Child instance for a keyed call
    #[inline]
    #[must_use]
    pub fn child(&self, name: impl Into<String>, key: InstanceKey) -> Self {
        let mut new = self.clone();
        new.0.push(ModuleInstanceStep::new(name, key));
        new
    }

    /// Strip instance keys, yielding the configuration path
    #[must_use]
    pub fn module_path(&self) -> ModulePath {
        ModulePath::new(self.0.iter().map(|s| s.name.clone()).collect())
    }

    /// Check if `self` is `other` or one of its ancestors
    #[must_use]
    pub fn contains(&self, other: &Self) -> bool {
        self.0.len() <= other.0.len() && self.0[..] == other.0[..self.0.len()]
    }
}

impl Display for ModuleInstance {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        for (i, step) in self.0.iter().enumerate() {
            if i > 0 {
                f.write_str(".")?;
            }
            write!(f, "module.{}{}", step.name, step.key)?;
        }
        Ok(())
    }
}

impl FromStr for ModuleInstance {
    type Err = AddressError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        if s.trim().is_empty() {
            return Ok(Self::root());
        }
        let parsed = parse_address(s)?;
        if parsed.resource.is_some() {
            return Err(AddressError::UnexpectedEnd(s.to_string()));
        }
        Ok(parsed.module)
    }
}

impl Serialize for ModuleInstance {
    fn serialize<S: serde::Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.collect_str(self)
    }
}

impl<'de> Deserialize<'de> for ModuleInstance {
    fn deserialize<D: serde::Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let s = String::deserialize(deserializer)?;
        s.parse().map_err(serde::de::Error::custom)
    }
}
