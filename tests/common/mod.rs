//! Shared fixtures for the integration tests

#![allow(dead_code)]

use image::{Rgb, RgbImage};
use snap_erase::{BackgroundRemovalProcessor, ModelConfig, SourceImage, StubBackend};

/// Solid color photograph
pub fn solid(width: u32, height: u32, color: [u8; 3]) -> SourceImage {
    SourceImage::new(RgbImage::from_pixel(width, height, Rgb(color)))
}

/// Photograph where neighbouring pixels differ in every channel
pub fn gradient(width: u32, height: u32) -> SourceImage {
    SourceImage::new(RgbImage::from_fn(width, height, |x, y| {
        Rgb([(x % 256) as u8, (y % 256) as u8, ((x * 3 + y * 7) % 256) as u8])
    }))
}

/// Small model contract so tests stay fast
pub fn small_model() -> ModelConfig {
    ModelConfig {
        name: "test-small".to_string(),
        input_size: 32,
        ..ModelConfig::u2net()
    }
}

/// Processor around a stub backend
pub fn processor(stub: StubBackend) -> BackgroundRemovalProcessor {
    BackgroundRemovalProcessor::from_backend(stub).unwrap()
}
