//! Stem separation side-channel
//!
//! Separation is delegated to an external service. Without one configured
//! the pipeline uses [`UnavailableStemSeparator`] and leaves `stems` empty.

use crate::analysis::traits::StemSeparator;
use crate::error::{AnalysisError, ErrorCode, Result};
use crate::types::StemRefs;
use async_trait::async_trait;

/// Separator used when no separation service is configured
#[derive(Debug, Default)]
pub struct UnavailableStemSeparator;

impl UnavailableStemSeparator {
    pub fn new() -> Self {
        Self
    }
}

#[async_trait]
impl StemSeparator for UnavailableStemSeparator {
    async fn separate(&self, source: &str) -> Result<StemRefs> {
        Err(AnalysisError::new(
            ErrorCode::ProcessingLimitExceeded,
            format!("Stem separation not available for '{}'", source),
        )
        .with_detail("separator", self.name()))
    }

    fn is_available(&self) -> bool {
        false
    }

    fn name(&self) -> &'static str {
        "unavailable"
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_unavailable_separator_errors() {
        let separator = UnavailableStemSeparator::new();
        assert!(!separator.is_available());
        assert!(separator.separate("https://example.com/a.mp3").await.is_err());
    }
}
