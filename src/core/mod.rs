//! Core business logic module
//!
//! Side effects go through collaborator traits: processes through
//! [`crate::infra::process::ProcessSpawner`] and serial devices through
//! [`crate::infra::serial`].
//!
//! # Submodules
//!
//! - [`properties`] - Layered `key=value` configuration sets
//! - [`board`] - Board descriptor parsing
//! - [`context`] - Per-project device context (sketchctl.toml)
//! - [`settings`] - User settings (config.toml) and strategy selection
//! - [`platform`] - Installed platform lookup
//! - [`negotiator`] - Serial port reset and rediscovery
//! - [`installer`] - Board package and library installation
//! - [`bootstrap`] - Best-effort package index refresh
//! - [`orchestrator`] - Verify and upload pipeline
//! - [`session`] - Serial monitor and hotplug collaborators
//! - [`sketch`] - Entry-sketch discovery
//! - [`sink`] - Output sinks

pub mod board;
pub mod bootstrap;
pub mod context;
pub mod installer;
pub mod negotiator;
pub mod orchestrator;
pub mod platform;
pub mod properties;
pub mod session;
pub mod settings;
pub mod sink;
pub mod sketch;
