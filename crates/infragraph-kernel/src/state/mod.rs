//! Resource state
//!
//! [`State`] is the tree of recorded objects keyed by resource and instance
//! address. During a walk it lives inside a [`SyncState`]; every read that
//! feeds graph construction and every write happens under its lock.

mod serde_helpers;

use infragraph_addrs::{ConfigResource, InstanceAddress, InstanceKey, ProviderAddr, ResourceAddress};
use parking_lot::{Mutex, MutexGuard};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::collections::BTreeMap;
use tracing::debug;

/// How instances of a resource are keyed
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum EachMode {
    /// One unkeyed instance
    #[default]
    Single,
    /// Integer keys from `count`
    List,
    /// String keys from `for_each`
    Map,
}

impl EachMode {
    fn for_key(key: &InstanceKey) -> Self {
        match key {
            InstanceKey::NoKey => Self::Single,
            InstanceKey::Int(_) => Self::List,
            InstanceKey::Str(_) => Self::Map,
        }
    }
}

/// Health of a recorded object
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ObjectStatus {
    /// Fully created
    #[default]
    Ready,
    /// Creation succeeded but a provisioner failed; must be replaced
    Tainted,
}

/// One recorded remote object
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ObjectState {
    /// Attribute values as returned by the provider
    pub value: Value,
    /// Resources this object depended on when written
    #[serde(default)]
    pub dependencies: Vec<ConfigResource>,
    /// Whether it was created with create-before-destroy
    #[serde(default)]
    pub create_before_destroy: bool,
    /// Ready or tainted
    #[serde(default)]
    pub status: ObjectStatus,
}

impl ObjectState {
    /// Ready object with no dependencies
    #[must_use]
    pub fn new(value: Value) -> Self {
        Self {
            value,
            dependencies: Vec::new(),
            create_before_destroy: false,
            status: ObjectStatus::Ready,
        }
    }

    /// Set recorded dependencies
    #[must_use]
    pub fn with_dependencies(mut self, dependencies: Vec<ConfigResource>) -> Self {
        self.dependencies = dependencies;
        self
    }
}

/// Objects recorded for one instance address
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct InstanceRecord {
    /// The live object
    #[serde(default)]
    pub current: Option<ObjectState>,
    /// Object replaced under create-before-destroy, awaiting destruction
    #[serde(default)]
    pub deposed: Option<ObjectState>,
}

impl InstanceRecord {
    /// Check if no object is recorded
    #[inline]
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.current.is_none() && self.deposed.is_none()
    }
}

/// Outcome of [`State::depose_current`]
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Depose {
    /// The live object moved to the deposed slot
    Moved,
    /// No live object to move
    NoCurrent,
    /// An earlier deposed object still awaits destruction; nothing moved
    Occupied,
}

/// Recorded state of one resource in one module instance
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ResourceState {
    /// Resource address
    pub addr: ResourceAddress,
    /// Keying mode
    #[serde(default)]
    pub each_mode: EachMode,
    /// Provider that manages it
    #[serde(default)]
    pub provider: Option<ProviderAddr>,
    /// Instance records
    #[serde(default, with = "serde_helpers::entries")]
    pub instances: BTreeMap<InstanceKey, InstanceRecord>,
}

impl ResourceState {
    /// Empty resource record
    #[must_use]
    pub fn new(addr: ResourceAddress) -> Self {
        Self {
            addr,
            each_mode: EachMode::Single,
            provider: None,
            instances: BTreeMap::new(),
        }
    }

    /// Addresses of recorded instances
    #[must_use]
    pub fn instance_addresses(&self) -> Vec<InstanceAddress> {
        self.instances.keys().map(|k| self.addr.instance(k.clone())).collect()
    }
}

/// The whole state tree
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct State {
    #[serde(default, with = "serde_helpers::by_address")]
    resources: BTreeMap<ResourceAddress, ResourceState>,
}

impl State {
    /// Empty state
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Check if nothing is recorded
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.resources.is_empty()
    }

    /// Decode from JSON
    ///
    /// # Errors
    /// Malformed JSON or addresses.
    pub fn from_json(text: &str) -> Result<Self, serde_json::Error> {
        serde_json::from_str(text)
    }

    /// Encode as pretty JSON
    ///
    /// # Errors
    /// Only if a value cannot be represented in JSON.
    pub fn to_json(&self) -> Result<String, serde_json::Error> {
        serde_json::to_string_pretty(self)
    }

    /// One resource's record
    #[must_use]
    pub fn resource(&self, addr: &ResourceAddress) -> Option<&ResourceState> {
        self.resources.get(addr)
    }

    /// All resource records, ordered by address
    pub fn resources(&self) -> impl Iterator<Item = &ResourceState> {
        self.resources.values()
    }

    /// Records of every expansion of an unexpanded resource
    pub fn resources_for<'a>(&'a self, addr: &'a ConfigResource) -> impl Iterator<Item = &'a ResourceState> {
        self.resources.values().filter(move |r| r.addr.config() == *addr)
    }

    /// One instance's record
    #[must_use]
    pub fn instance(&self, addr: &InstanceAddress) -> Option<&InstanceRecord> {
        self.resources.get(&addr.resource)?.instances.get(&addr.key)
    }

    /// Live object of an instance
    #[must_use]
    pub fn current_object(&self, addr: &InstanceAddress) -> Option<&ObjectState> {
        self.instance(addr)?.current.as_ref()
    }

    /// Record resource-level metadata, creating the record if needed
    pub fn set_resource_meta(&mut self, addr: &ResourceAddress, each_mode: EachMode, provider: ProviderAddr) {
        let rs = self
            .resources
            .entry(addr.clone())
            .or_insert_with(|| ResourceState::new(addr.clone()));
        rs.each_mode = each_mode;
        rs.provider = Some(provider);
    }

    fn record_mut(&mut self, addr: &InstanceAddress) -> &mut InstanceRecord {
        self.resources
            .entry(addr.resource.clone())
            .or_insert_with(|| {
                let mut rs = ResourceState::new(addr.resource.clone());
                rs.each_mode = EachMode::for_key(&addr.key);
                rs
            })
            .instances
            .entry(addr.key.clone())
            .or_default()
    }

    fn drop_if_empty(&mut self, addr: &InstanceAddress) {
        if let Some(rs) = self.resources.get_mut(&addr.resource) {
            if rs.instances.get(&addr.key).is_some_and(InstanceRecord::is_empty) {
                rs.instances.remove(&addr.key);
            }
        }
    }

    /// Replace (or clear) the live object of an instance
    pub fn set_current(&mut self, addr: &InstanceAddress, object: Option<ObjectState>) {
        self.record_mut(addr).current = object;
        self.drop_if_empty(addr);
    }

    /// Replace (or clear) the deposed object of an instance
    pub fn set_deposed(&mut self, addr: &InstanceAddress, object: Option<ObjectState>) {
        self.record_mut(addr).deposed = object;
        self.drop_if_empty(addr);
    }

    /// Move the live object aside so a replacement can be created
    ///
    /// Refuses while an earlier deposed object is still recorded, so that
    /// object is never lost.
    pub fn depose_current(&mut self, addr: &InstanceAddress) -> Depose {
        let Some(rs) = self.resources.get_mut(&addr.resource) else {
            return Depose::NoCurrent;
        };
        let Some(record) = rs.instances.get_mut(&addr.key) else {
            return Depose::NoCurrent;
        };
        if record.deposed.is_some() {
            return Depose::Occupied;
        }
        match record.current.take() {
            Some(current) => {
                record.deposed = Some(current);
                Depose::Moved
            }
            None => Depose::NoCurrent,
        }
    }

    /// Remove an instance record entirely
    pub fn remove_instance(&mut self, addr: &InstanceAddress) -> Option<InstanceRecord> {
        self.resources.get_mut(&addr.resource)?.instances.remove(&addr.key)
    }

    /// Drop resource records that have no instances and fail `keep`
    pub fn prune<F>(&mut self, keep: F)
    where
        F: Fn(&ResourceAddress) -> bool,
    {
        self.resources.retain(|addr, rs| !rs.instances.is_empty() || keep(addr));
    }

    /// Rename the unkeyed/zero instance when count is switched on or off
    ///
    /// With count enabled, a `NoKey` record becomes `[0]`; with count
    /// disabled, a `[0]` record becomes `NoKey`. Nothing happens if both
    /// keys already exist. Returns whether a record was moved.
    pub fn fix_count_set_transition(&mut self, addr: &ResourceAddress, count_enabled: bool) -> bool {
        let Some(rs) = self.resources.get_mut(addr) else {
            return false;
        };
        let (from, to) = if count_enabled {
            (InstanceKey::NoKey, InstanceKey::Int(0))
        } else {
            (InstanceKey::Int(0), InstanceKey::NoKey)
        };
        if rs.instances.contains_key(&to) {
            return false;
        }
        let Some(record) = rs.instances.remove(&from) else {
            return false;
        };
        debug!(resource = %addr, from = %addr.instance(from), to = %addr.instance(to.clone()), "renaming instance for count change");
        rs.instances.insert(to.clone(), record);
        rs.each_mode = EachMode::for_key(&to);
        true
    }
}

/// [`State`] behind an exclusive lock, shared by a walk
#[derive(Debug, Default)]
pub struct SyncState {
    inner: Mutex<State>,
}

impl SyncState {
    /// Wrap a state
    #[must_use]
    pub fn new(state: State) -> Self {
        Self {
            inner: Mutex::new(state),
        }
    }

    /// Acquire the lock; released when the guard drops
    pub fn lock(&self) -> MutexGuard<'_, State> {
        self.inner.lock()
    }

    /// Copy of the current state
    #[must_use]
    pub fn snapshot(&self) -> State {
        self.inner.lock().clone()
    }

    /// Unwrap the state
    #[must_use]
    pub fn into_inner(self) -> State {
        self.inner.into_inner()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use infragraph_addrs::{ModuleInstance, Resource};
    use serde_json::json;

    fn res() -> ResourceAddress {
        Resource::new("null_resource", "a").absolute(ModuleInstance::root())
    }

    #[test]
    fn unkeyed_moves_to_zero_when_count_enabled() {
        let mut state = State::new();
        let a = res();
        state.set_current(&a.instance(InstanceKey::NoKey), Some(ObjectState::new(json!({"id": "1"}))));

        assert!(state.fix_count_set_transition(&a, true));
        assert!(state.instance(&a.instance(InstanceKey::NoKey)).is_none());
        assert_eq!(
            state.current_object(&a.instance(InstanceKey::Int(0))).unwrap().value,
            json!({"id": "1"})
        );
        assert_eq!(state.resource(&a).unwrap().each_mode, EachMode::List);
    }

    #[test]
    fn zero_moves_to_unkeyed_when_count_disabled() {
        let mut state = State::new();
        let a = res();
        state.set_current(&a.instance(InstanceKey::Int(0)), Some(ObjectState::new(json!(1))));
        assert!(state.fix_count_set_transition(&a, false));
        assert!(state.current_object(&a.instance(InstanceKey::NoKey)).is_some());
    }

    #[test]
    fn no_rename_when_both_exist() {
        let mut state = State::new();
        let a = res();
        state.set_current(&a.instance(InstanceKey::NoKey), Some(ObjectState::new(json!(1))));
        state.set_current(&a.instance(InstanceKey::Int(0)), Some(ObjectState::new(json!(2))));
        assert!(!state.fix_count_set_transition(&a, true));
        assert!(!state.fix_count_set_transition(&res().instance(InstanceKey::NoKey).resource, false));
    }

    #[test]
    fn depose_refuses_occupied_slot() {
        let mut state = State::new();
        let addr = res().instance(InstanceKey::NoKey);
        state.set_current(&addr, Some(ObjectState::new(json!("older"))));
        assert_eq!(state.depose_current(&addr), Depose::Moved);
        state.set_current(&addr, Some(ObjectState::new(json!("old"))));

        assert_eq!(state.depose_current(&addr), Depose::Occupied);
        let record = state.instance(&addr).unwrap();
        assert_eq!(record.deposed.as_ref().unwrap().value, json!("older"));
        assert_eq!(record.current.as_ref().unwrap().value, json!("old"));
    }

    #[test]
    fn depose_without_live_object() {
        let mut state = State::new();
        let addr = res().instance(InstanceKey::NoKey);
        assert_eq!(state.depose_current(&addr), Depose::NoCurrent);
        state.set_deposed(&addr, Some(ObjectState::new(json!("old"))));
        assert_eq!(state.depose_current(&addr), Depose::Occupied);
    }

    #[test]
    fn depose_then_clear() {
        let mut state = State::new();
        let addr = res().instance(InstanceKey::NoKey);
        state.set_current(&addr, Some(ObjectState::new(json!("old"))));
        assert_eq!(state.depose_current(&addr), Depose::Moved);
        assert!(state.current_object(&addr).is_none());

        state.set_current(&addr, Some(ObjectState::new(json!("new"))));
        state.set_deposed(&addr, None);
        let record = state.instance(&addr).unwrap();
        assert!(record.deposed.is_none());
        assert_eq!(record.current.as_ref().unwrap().value, json!("new"));

        state.set_current(&addr, None);
        assert!(state.instance(&addr).is_none());
    }

    #[test]
    fn prune_keeps_requested_empty_resources() {
        let mut state = State::new();
        state.set_resource_meta(&res(), EachMode::List, ProviderAddr::legacy("null"));
        state.prune(|_| true);
        assert!(!state.is_empty());
        state.prune(|_| false);
        assert!(state.is_empty());
    }

    #[test]
    fn json_round_trip_with_unkeyed_instance() {
        let mut state = State::new();
        let a = res();
        state.set_resource_meta(&a, EachMode::Single, ProviderAddr::legacy("null"));
        state.set_current(
            &a.instance(InstanceKey::NoKey),
            Some(ObjectState::new(json!({"id": "x"})).with_dependencies(vec![Resource::new("null_resource", "b").in_module(Default::default())])),
        );
        let text = state.to_json().unwrap();
        let back = State::from_json(&text).unwrap();
        assert_eq!(back, state);
    }

    #[test]
    fn sync_state_guard_scopes_writes() {
        let shared = SyncState::new(State::new());
        {
            let mut guard = shared.lock();
            guard.set_resource_meta(&res(), EachMode::Map, ProviderAddr::legacy("null"));
        }
        assert_eq!(shared.snapshot().resource(&res()).unwrap().each_mode, EachMode::Map);
        assert!(!shared.into_inner().is_empty());
    }
}
