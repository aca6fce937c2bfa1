//! Inbound payload normalization for Murmur.
//!
//! Everything that enters the message log passes through here first:
//! free-form chat text and structured webhook bodies are both turned into
//! canonical [`NewRecord`]s, independent of their original shape. The
//! transforms are pure — persistence is the caller's job.

pub mod normalizer;
pub mod webhook;

pub use normalizer::{Payload, normalize};
pub use webhook::summarize;
