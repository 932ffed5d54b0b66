#[allow(clippy::module_inception)]
mod analyzer;
pub mod decoder;
pub mod entity_tracker;
pub mod packet_dump;
pub mod path;
pub mod path_stats;
pub mod survey;

pub use analyzer::*;
