//! vigil-core: Core library for Vigil
//!
//! This crate provides the client-resident compliance and activity audit
//! core: symmetric encryption for sensitive values, a bounded hash-chained
//! audit trail, debounced user-activity monitoring, and session idle-timeout
//! detection.
//!
//! # Architecture
//!
//! ```text
//! Signal Source → Activity Monitor ─┐
//!                       ↑           ↓
//!                Timeout Detector → Audit Trail ← Encryption Gateway
//!                       ↓
//!               Announcer / Observers
//! ```
//!
//! # Modules
//!
//! - `core`: Facade assembling the components from one config
//! - `gateway`: Symmetric string encryption with failure policies
//! - `trail`: Bounded, hash-chained audit trail recorder
//! - `monitor`: Debounced user-activity monitoring
//! - `timeout`: Session idle-timeout state machine
//! - `signal`: Interaction signals and the sources that emit them
//! - `identity`: Principal resolution from the host's user record
//! - `announce`: Accessibility announce capability
//! - `clock`: Clock seam with a manually driven test clock
//! - `config`: Configuration loading and validation
//! - `logging`: Tracing subscriber setup
//! - `error`: Error types with remediation guidance
//!
//! # Safety
//!
//! This crate forbids unsafe code.

#![forbid(unsafe_code)]

pub mod announce;
pub mod clock;
pub mod config;
pub mod core;
pub mod error;
pub mod gateway;
pub mod identity;
pub mod logging;
pub mod monitor;
pub mod signal;
pub mod timeout;
pub mod trail;

pub use error::{Error, Result};

/// Library version
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
