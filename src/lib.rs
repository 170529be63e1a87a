//! sketchctl - Firmware build and upload orchestration
//!
//! This library drives an external microcontroller toolchain to verify,
//! upload, and manage packages for firmware projects ("sketches").
//!
//! # Architecture
//!
//! The crate is organized into several modules:
//!
//! - [`cli`] - Command-line interface parsing and output formatting
//! - [`core`] - Business logic (property resolution, port negotiation,
//!   verify/upload pipeline, package installation)
//! - [`infra`] - Infrastructure layer (processes, serial devices, filesystem)
//! - [`config`] - Constants and defaults
//! - [`error`] - Error types and handling

pub mod cli;
pub mod config;
pub mod core;
pub mod error;
pub mod infra;
