pub mod analyzer;
mod error;
pub mod hexdump;
pub mod packet;
pub mod segment;
pub mod types;

pub use analyzer::entity_tracker::{
    EntitySummary, ParseStats, ParsedLog, TrackerConfig, TrackerConfigBuilder, parse_log,
    parse_log_bytes, parse_log_with,
};
pub use analyzer::path::{
    PathConfig, PathConfigBuilder, PathPart, calc_rot_diff, parse_path, parse_path_with,
};
pub use analyzer::path_stats::{Histogram, PathStats};
pub use error::*;
pub use strum;
