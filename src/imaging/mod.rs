//! Pixel-level building blocks: codec, resampling and compositing

pub mod codec;
pub mod compose;
pub mod resample;

pub use codec::{decode, encode};
pub use compose::Compositor;
pub use resample::{resample, ScaleFactors};
