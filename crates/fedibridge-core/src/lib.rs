//! `fedibridge` Core Library
//!
//! Shared functionality for the extension contexts:
//! - Envelope protocol spoken between pages, popup and background
//! - Module/method surface and the static permission table
//! - Configuration resolution and hierarchy
//! - Common error types

pub mod config;
pub mod envelope;
pub mod error;
pub mod permissions;
pub mod tracing_init;

pub use config::Config;
pub use envelope::{Envelope, ModuleMethodCall, Response, WindowPosition};
pub use error::{Error, Result};
pub use permissions::{ModuleKind, ModuleMethod, PermissionLevel, PermissionTable};
