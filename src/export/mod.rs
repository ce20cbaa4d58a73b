//! Export of analysis results

pub mod json;

pub use json::{read_json, to_json_string, write_json};
