pub mod resolver;
pub mod scoring;
pub mod triggers;

pub use resolver::resolve_candidates;
pub use triggers::{is_broad_scope, is_greeting};
