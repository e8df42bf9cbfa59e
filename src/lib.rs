//! Workspace placeholder crate.
//!
//! Exposes the feature flags that map onto the workspace crates so a bot can
//! depend on `disrupt-workspace` and enable `desktop-shims` without wiring
//! each crate individually.

#[cfg(feature = "desktop-shims")]
pub use core_service;
