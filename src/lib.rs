//! Consent Gate Library
//!
//! Gates third-party embeds and scripts behind the consent a user gave in
//! the site's consent management platform (CMP). Nothing gated is shown or
//! executed before consent is confirmed, and every later consent change is
//! reflected live.
//!
//! ## Modules
//!
//! - [`domain`] - Identifiers, vendors, lifecycle events and decisions
//! - [`registry`] - Static vendor/purpose catalogues per CMP backend
//! - [`cmp`] - Adapters for the LiveRamp and Sourcepoint CMPs
//! - [`evaluator`] - Backend-specific grant rules (AND vs. OR)
//! - [`activation`] - Content and script activation controllers
//! - [`markup`] - Gated-content and staged-script markup contracts
//! - [`transform`] - Render-time iframe rewriting
//! - [`gate`] - Page-level wiring of controllers to CMP events
//! - [`config`] - Resolved configuration and the declarative script table
//! - [`telemetry`] - Tracing subscriber setup
//! - [`testing`] - In-memory CMP and script loader

pub mod activation;
pub mod cmp;
pub mod config;
pub mod domain;
pub mod error;
pub mod evaluator;
pub mod gate;
pub mod markup;
pub mod registry;
pub mod telemetry;
pub mod testing;
pub mod transform;

// Re-export commonly used types
pub use domain::{
    ActivationState, CmpBackend, ConsentDecision, ConsentEvent, ConsentQuery, ElementKey,
    EventStatus, PurposeId, Vendor, VendorId, VendorRef,
};

pub use activation::{ContentActivationController, LoadedScripts, ScriptActivationController};
pub use cmp::{ConsentSignalAdapter, LiveRampAdapter, SourcepointAdapter, TcfApi};
pub use config::{GateConfig, ScriptTable};
pub use error::{ConsentError, Result};
pub use evaluator::ConsentEvaluator;
pub use gate::ConsentGate;
pub use registry::VendorPurposeRegistry;
pub use transform::{EmbedPolicy, EmbedRewriteTransform};
