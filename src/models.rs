//! Fixed segmentation model profiles
//!
//! Each [`SegmentationKind`] selects one model asset and one fixed input box.

use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

/// What is being cut out; picks the on-device model
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SegmentationKind {
    /// Full-body person photo
    #[default]
    Body,
    /// Garment photo
    Clothes,
}

impl SegmentationKind {
    #[must_use]
    pub fn profile(self) -> ModelProfile {
        match self {
            Self::Body => ModelProfile {
                kind: self,
                asset_id: "selfie_segmentation",
                input_width: 256,
                input_height: 256,
                layout: TensorLayout::Nhwc,
            },
            Self::Clothes => ModelProfile {
                kind: self,
                asset_id: "u2netp_clothes",
                input_width: 320,
                input_height: 320,
                layout: TensorLayout::Nhwc,
            },
        }
    }
}

impl std::fmt::Display for SegmentationKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Body => write!(f, "body"),
            Self::Clothes => write!(f, "clothes"),
        }
    }
}

impl std::str::FromStr for SegmentationKind {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "body" => Ok(Self::Body),
            "clothes" | "garment" => Ok(Self::Clothes),
            other => Err(format!("unknown segmentation kind '{other}'")),
        }
    }
}

/// Memory order of the float input tensor
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TensorLayout {
    /// `[1, height, width, 3]`, channels interleaved per pixel
    Nhwc,
    /// `[1, 3, height, width]`, one plane per channel
    Nchw,
}

/// Fixed model description for one segmentation kind
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ModelProfile {
    pub kind: SegmentationKind,
    pub asset_id: &'static str,
    pub input_width: u32,
    pub input_height: u32,
    pub layout: TensorLayout,
}

impl ModelProfile {
    /// Input tensor shape for this profile's layout
    #[must_use]
    pub fn input_shape(&self) -> (usize, usize, usize, usize) {
        let (w, h) = (self.input_width as usize, self.input_height as usize);
        match self.layout {
            TensorLayout::Nhwc => (1, h, w, 3),
            TensorLayout::Nchw => (1, 3, h, w),
        }
    }

    /// Mask resolution produced by the model (one value per input pixel)
    #[must_use]
    pub fn output_dimensions(&self) -> (u32, u32) {
        (self.input_width, self.input_height)
    }

    /// Asset file inside a model directory
    #[must_use]
    pub fn asset_path(&self, model_dir: &Path) -> PathBuf {
        model_dir.join(format!("{}.onnx", self.asset_id))
    }
}
