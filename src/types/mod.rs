//! Core types for the schema graph kernel.

pub mod pointer;
pub mod document;
pub mod processed;

pub use pointer::{Pointer, PointerError};
pub use document::{DocumentError, Node, NodeId, NodeKind, ResolvedDocument, Value};
pub use processed::{EntryState, ModuleRecord, ProcessedSchema};
