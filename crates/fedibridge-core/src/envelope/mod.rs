//! Envelope protocol spoken between extension contexts.
//!
//! Implements tolerant reader pattern: traffic from other namespaces is
//! skipped, unknown kinds are surfaced as [`Envelope::Unknown`].

mod parser;
mod types;

pub use parser::{parse_envelope, parse_message};
pub use types::*;
