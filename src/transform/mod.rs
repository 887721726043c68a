//! Server-side embed rewriting
//!
//! Every `<iframe>` in rendered content is classified against an ordered
//! [`EmbedPolicy`]:
//!
//! | Action | Result                                          |
//! |--------|-------------------------------------------------|
//! | Gate   | replaced by the gated-content structure         |
//! | Allow  | kept byte-for-byte                              |
//! | (none) | removed                                         |
//!
//! The rewrite is default-deny: an iframe that matches no rule, or whose
//! tag cannot be parsed, does not survive.

mod policy;
mod rewrite;

pub use policy::{EmbedAction, EmbedPolicy, EmbedRule};
pub use rewrite::{EmbedRewriteTransform, RewriteOutput};
