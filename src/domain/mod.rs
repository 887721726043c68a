//! Domain model for the consent gate
//!
//! Identifier types, vendor definitions, and the consent signals passed
//! between CMP adapters, the evaluator and the activation controllers.

mod event;
mod types;
mod vendor;

pub use event::*;
pub use types::*;
pub use vendor::*;
