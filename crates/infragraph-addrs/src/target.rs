//! Targeting addresses
//!
//! A target narrows a walk to a subset of the graph. It can name a whole
//! module instance, a resource, or a single instance.

use crate::error::AddressError;
use crate::module::ModuleInstance;
use crate::parse::parse_address;
use crate::resource::{ConfigResource, InstanceAddress, ResourceAddress};
use serde::{Deserialize, Serialize};
use std::fmt::{self, Display, Formatter};
use std::str::FromStr;

/// Address accepted by `--target`
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum Target {
    /// Everything inside a module instance
    Module(ModuleInstance),
    /// Every instance of a resource
    Resource(ResourceAddress),
    /// One instance
    Instance(InstanceAddress),
}

impl Target {
    /// Check if an instance falls under this target
    #[must_use]
    pub fn matches_instance(&self, addr: &InstanceAddress) -> bool {
        match self {
            Self::Module(m) => m.contains(addr.module()),
            Self::Resource(r) => *r == addr.resource,
            Self::Instance(i) => i == addr,
        }
    }

    /// Check if a resource is targeted in whole or in part
    #[must_use]
    pub fn matches_resource(&self, addr: &ResourceAddress) -> bool {
        match self {
            Self::Module(m) => m.contains(&addr.module),
            Self::Resource(r) => r == addr,
            Self::Instance(i) => i.resource == *addr,
        }
    }

    /// Check if any expansion of an unexpanded resource could be targeted
    #[must_use]
    pub fn matches_config_resource(&self, addr: &ConfigResource) -> bool {
        match self {
            Self::Module(m) => m.module_path().contains(&addr.module),
            Self::Resource(r) => r.config() == *addr,
            Self::Instance(i) => i.resource.config() == *addr,
        }
    }
}

impl Display for Target {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        match self {
            Self::Module(m) => write!(f, "{m}"),
            Self::Resource(r) => write!(f, "{r}"),
            Self::Instance(i) => write!(f, "{i}"),
        }
    }
}

impl FromStr for Target {
    type Err = AddressError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let parsed = parse_address(s)?;
        Ok(match parsed.resource {
            None => Self::Module(parsed.module),
            Some((resource, None)) => Self::Resource(resource.absolute(parsed.module)),
            Some((resource, Some(key))) => Self::Instance(resource.absolute(parsed.module).instance(key)),
        })
    }
}

impl Serialize for Target {
    fn serialize<S: serde::Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.collect_str(self)
    }
}

impl<'de> Deserialize<'de> for Target {
    fn deserialize<D: serde::Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let s = String::deserialize(deserializer)?;
        s.parse().map_err(serde::de::Error::custom)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::resource::InstanceKey;

    fn inst(s: &str) -> InstanceAddress {
        s.parse().unwrap()
    }

    #[test]
    fn parses_each_form() {
        assert!(matches!("module.m[0]".parse::<Target>().unwrap(), Target::Module(_)));
        assert!(matches!("a.b".parse::<Target>().unwrap(), Target::Resource(_)));
        assert!(matches!(r#"a.b["x"]"#.parse::<Target>().unwrap(), Target::Instance(_)));
    }

    #[test]
    fn module_target_covers_nested_instances() {
        let t: Target = "module.m[0]".parse().unwrap();
        assert!(t.matches_instance(&inst("module.m[0].module.n.a.b[3]")));
        assert!(!t.matches_instance(&inst("module.m[1].a.b")));
    }

    #[test]
    fn instance_target_partially_matches_resource() {
        let t: Target = r#"a.b["x"]"#.parse().unwrap();
        let res: ResourceAddress = "a.b".parse().unwrap();
        assert!(t.matches_resource(&res));
        assert!(t.matches_instance(&res.instance(InstanceKey::Str("x".into()))));
        assert!(!t.matches_instance(&res.instance(InstanceKey::Str("y".into()))));
    }

    #[test]
    fn config_resource_matching_ignores_keys() {
        let t: Target = "module.m[2].a.b".parse().unwrap();
        let res: ResourceAddress = "module.m[5].a.b".parse().unwrap();
        assert!(t.matches_config_resource(&res.config()));
        assert!(!t.matches_resource(&res));
    }
}
