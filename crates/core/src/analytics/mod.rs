//! Derived views over the loaded rate data. Every function here is pure: the same
//! inputs always produce the same output, and nothing is cached or persisted.

pub mod brief;
pub mod changes;
pub mod detail;
pub mod filter;
pub mod rank;
pub mod risk;
pub mod stats;

pub use changes::{detect_changes, summarize};
pub use filter::filter;
pub use rank::rank;
pub use risk::classify;
