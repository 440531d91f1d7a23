//! Per-message parsing: token extraction, quoting banner, body composition.

pub mod banner;
pub mod compose;
pub mod tokens;

pub use banner::Banner;
pub use compose::ComposedBody;
pub use tokens::Tokens;
