//! Audio ingestion: signature sniffing, validation and decoding to mono PCM

pub mod decoder;
pub mod format;

pub use decoder::{decode, DecodeOptions};
pub use format::{detect_format, validate, MIN_FILE_SIZE};
