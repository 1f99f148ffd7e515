//! Client-side streaming session core for a conversational shopping assistant.
//!
//! [`SessionController`] owns one conversation: it records the user turn,
//! posts it to the agent endpoint, decodes the newline-delimited event stream
//! and folds every record into an ordered [`Timeline`]. Guardrail
//! revalidation can rewrite an in-flight answer; the rewrite replaces the old
//! text on its first token instead of concatenating.
//!
//! [`view_items`] derives renderable items from a snapshot. Rendering itself,
//! markdown and host-page mounting live outside this crate.

pub mod controller;
pub mod guardrail;
pub mod presentation;
pub mod product;
pub mod timeline;
pub mod transport;

pub use controller::{SessionController, SessionOptions, SubscriptionId, TurnOutcome};
pub use guardrail::{ComplianceVerdict, GuardrailPhase, GuardrailState};
pub use presentation::{view_items, ViewItem};
pub use product::{
    DefaultProductNormalizer, ProductMetadata, ProductNormalizer, StructuredProduct, ToolOutput,
};
pub use timeline::{EntryId, EntryKind, Timeline, TimelineEntry, TimelineStore};
pub use transport::Transport;
