//! Terminal backend of every chain

use super::SegmentationBackend;
use crate::{error::BackendError, types::Mask, types::SourceImage};
use async_trait::async_trait;
use std::sync::Arc;

/// Produces a fully opaque mask at source resolution
///
/// Compositing against it is an identity on visible content, so the caller still
/// gets a usable (uncut) image when every real backend failed.
#[derive(Debug, Default, Clone, Copy)]
pub struct OpaqueBackend;

impl OpaqueBackend {
    pub const NAME: &'static str = "opaque";

    #[must_use]
    pub fn new() -> Self {
        Self
    }

    /// The fallback mask for a source of the given size
    #[must_use]
    pub fn mask_for(dimensions: (u32, u32)) -> Mask {
        Mask::opaque(dimensions.0, dimensions.1)
    }
}

#[async_trait]
impl SegmentationBackend for OpaqueBackend {
    fn name(&self) -> &str {
        Self::NAME
    }

    async fn attempt(&self, source: Arc<SourceImage>) -> Result<Mask, BackendError> {
        Ok(Self::mask_for(source.dimensions()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::PixelBuffer;
    use std::path::PathBuf;

    #[tokio::test]
    async fn test_opaque_mask_matches_source() {
        let source = Arc::new(SourceImage::new(
            PixelBuffer::filled(17, 9, [0, 0, 255, 255]),
            PathBuf::from("blue.png"),
        ));
        let mask = OpaqueBackend::new().attempt(source).await.unwrap();
        assert_eq!(mask.dimensions(), (17, 9));
        assert!(mask.is_fully_opaque());
    }
}
