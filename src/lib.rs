#![forbid(unsafe_code)]

//! Inline edit-source overlay engine.
//!
//! Scans a document tree for steganographic provenance payloads embedded in
//! rendered text, tags the carrying elements, and presents a cursor-proximity
//! highlight plus a click-through overlay that links each fragment back to the
//! system it came from. Everything hangs off a single edit-mode boolean: the
//! engine is inert until the host flips it on, and deactivation restores the
//! document to its untouched state.
//!
//! The host owns the document and the clock. It applies its own mutations to
//! [`dom::Document`], forwards input through [`engine::ScanEngine::handle_event`],
//! and pumps [`engine::ScanEngine::tick`] whenever
//! [`engine::ScanEngine::next_deadline`] comes due.

pub mod clean;
pub mod config;
pub mod constants;
pub mod decode;
pub mod dom;
pub mod engine;
pub mod overlay;
pub mod proximity;
pub mod registry;
mod sched;
pub mod visibility;

pub use config::EngineConfig;
pub use decode::{PayloadDecoder, ProvenanceDecoder, ProvenanceRecord};
pub use dom::{Document, Rect, Viewport};
pub use engine::{EngineEffect, InputEvent, ScanEngine};
