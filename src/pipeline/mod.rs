//! The mass-reply pipeline.
//!
//! Every fetched message flows through:
//! 1. `Tokens::extract` — normalized header fields
//! 2. `FilterEngine::decide` — ignore/skip policy (short-circuits)
//! 3. `compose` — quoted, attachment-stripped body
//! 4. `assemble` — the outbound reply
//! 5. send (or dry-run) → one report line

pub mod processor;
pub mod types;

pub use processor::Pipeline;
pub use types::{ReportLine, RunError};
