//! Task records: the on-disk format and the rules that govern it.
//!
//! - `model`: record fields, status and priority enumerations
//! - `schema`: reserved header field names and list syntax
//! - `parse` / `render`: header text to record and back
//! - `validate`: record invariants
//! - `transition`: status changes and waiting-on bookkeeping

pub mod model;
pub mod parse;
pub mod render;
pub mod schema;
pub mod transition;
pub mod validate;

pub use model::{Priority, Status, TaskRecord};
pub use parse::{parse, Diagnostic, DiagnosticKind};
pub use render::render;
pub use transition::{DependencyLookup, StatusChange, TransitionError, TransitionOutcome};
pub use validate::{validate, ValidationError};
