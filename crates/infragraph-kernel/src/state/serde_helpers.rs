//! Map encodings for state files
//!
//! Instance keys include `null`, which JSON object keys cannot hold, so
//! instance maps are written as `[key, value]` pairs. Resource maps are
//! written as a list of records, each carrying its own address.

pub(super) mod entries {
    use serde::de::{Deserialize, Deserializer};
    use serde::ser::Serializer;
    use std::collections::BTreeMap;

    pub(crate) fn serialize<K, V, S>(map: &BTreeMap<K, V>, serializer: S) -> Result<S::Ok, S::Error>
    where
        K: serde::Serialize,
        V: serde::Serialize,
        S: Serializer,
    {
        serializer.collect_seq(map.iter())
    }

    pub(crate) fn deserialize<'de, K, V, D>(deserializer: D) -> Result<BTreeMap<K, V>, D::Error>
    where
        K: Deserialize<'de> + Ord,
        V: Deserialize<'de>,
        D: Deserializer<'de>,
    {
        let pairs = Vec::<(K, V)>::deserialize(deserializer)?;
        Ok(pairs.into_iter().collect())
    }
}

pub(super) mod by_address {
    use super::super::ResourceState;
    use infragraph_addrs::ResourceAddress;
    use serde::de::{Deserialize, Deserializer};
    use serde::ser::Serializer;
    use std::collections::BTreeMap;

    pub(crate) fn serialize<S: Serializer>(
        map: &BTreeMap<ResourceAddress, ResourceState>,
        serializer: S,
    ) -> Result<S::Ok, S::Error> {
        serializer.collect_seq(map.values())
    }

    pub(crate) fn deserialize<'de, D: Deserializer<'de>>(
        deserializer: D,
    ) -> Result<BTreeMap<ResourceAddress, ResourceState>, D::Error> {
        let records = Vec::<ResourceState>::deserialize(deserializer)?;
        Ok(records.into_iter().map(|r| (r.addr.clone(), r)).collect())
    }
}
