//! Configuration parsing and types.
//!
//! - `types` - Root [`Config`] and its sections
//! - `duration` - Human-readable timeout values
//! - `parser` - YAML discovery and loading

mod duration;
mod parser;
mod types;

pub use duration::*;
pub use parser::*;
pub use types::*;
