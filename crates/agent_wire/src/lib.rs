//! Transport-only primitives for the streaming agent message endpoint.
//!
//! This crate owns building the outbound POST, decoding the newline-delimited
//! JSON response body into typed [`WireEvent`] records, and surfacing transport
//! failures. It has no knowledge of the conversation timeline.
//!
//! Decoding never aborts a stream; malformed lines and records without a
//! `type` discriminator are skipped.

pub mod client;
pub mod config;
pub mod error;
pub mod events;
pub mod headers;
pub mod ndjson;
pub mod payload;
pub mod url;

pub use client::{decode_body, AgentWireClient, ByteStream, CancellationSignal, StreamResult};
pub use config::AgentWireConfig;
pub use error::AgentWireError;
pub use events::{AgentPhase, ClaimsValidation, FrontendData, WireEvent};
pub use ndjson::NdjsonDecoder;
pub use payload::AgentMessageRequest;
pub use url::normalize_message_url;

pub use reqwest::StatusCode;
