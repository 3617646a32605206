//! Addresses for infragraph
//!
//! Every object the engine touches is named by one of the types here:
//!
//! - [`ModulePath`]: a module in the configuration tree (`module.net.module.subnet`)
//! - [`ModuleInstance`]: one expanded instance of a module (`module.net["eu"]`)
//! - [`Resource`]: a module-relative resource (`aws_instance.web`)
//! - [`ResourceAddress`]: a resource inside a module instance
//! - [`ConfigResource`]: a resource inside an unexpanded module
//! - [`InstanceAddress`]: one instance of a resource (`aws_instance.web[0]`)
//! - [`Reference`]: a module-relative pointer used to derive dependency edges
//! - [`ProviderAddr`]: `hostname/namespace/type` identity of a provider
//! - [`Target`]: a module, resource or instance selected with `--target`
//!
//! All addresses have a canonical [`Display`](std::fmt::Display) form and
//! parse back from it.

#![warn(missing_docs)]
#![warn(unreachable_pub)]

mod error;
mod module;
mod parse;
mod provider;
mod reference;
mod resource;
mod target;

pub use error::AddressError;
pub use module::{ModuleInstance, ModuleInstanceStep, ModulePath};
pub use provider::{ProviderAddr, DEFAULT_REGISTRY_HOST, LEGACY_NAMESPACE};
pub use reference::Reference;
pub use resource::{ConfigResource, InstanceAddress, InstanceKey, Resource, ResourceAddress};
pub use target::Target;

/// Version of this crate
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
