//! Load-test scripts: phases, variables, engine configuration and scenarios.

pub mod parser;
pub mod types;

pub use parser::{ScriptError, ScriptParser};
pub use types::*;
