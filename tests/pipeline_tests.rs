//! End-to-end pipeline behaviour against the stub backend

mod common;

use common::{gradient, processor, small_model, solid};
use image::{DynamicImage, RgbaImage};
use snap_erase::{ImageIo, ModelConfig, Result, SnapEraseError, SourceImage, StubBackend};
use tempfile::TempDir;

#[test]
fn test_zero_surface_makes_everything_transparent() -> Result<()> {
    let processor = processor(StubBackend::constant(ModelConfig::u2net(), 0.0));
    let result = processor.remove_background(&solid(640, 480, [255, 0, 0]))?;

    assert_eq!(result.dimensions(), (640, 480));
    assert!(result.image().pixels().all(|p| p.0 == [255, 0, 0, 0]));
    Ok(())
}

#[test]
fn test_unit_surface_keeps_everything_opaque() -> Result<()> {
    let processor = processor(StubBackend::constant(ModelConfig::u2net(), 1.0));
    let result = processor.remove_background(&solid(640, 480, [255, 0, 0]))?;

    assert_eq!(result.dimensions(), (640, 480));
    assert!(result.image().pixels().all(|p| p.0 == [255, 0, 0, 255]));
    Ok(())
}

#[test]
fn test_out_of_range_surfaces_are_clamped() -> Result<()> {
    let below = processor(StubBackend::constant(small_model(), -0.3))
        .remove_background(&solid(50, 40, [1, 2, 3]))?;
    assert!(below.image().pixels().all(|p| p[3] == 0));

    let above = processor(StubBackend::constant(small_model(), 1.7))
        .remove_background(&solid(50, 40, [1, 2, 3]))?;
    assert!(above.image().pixels().all(|p| p[3] == 255));
    Ok(())
}

#[test]
fn test_colors_are_bit_identical_to_source() -> Result<()> {
    let source = gradient(123, 77);
    let result = processor(StubBackend::radial(small_model())).remove_background(&source)?;

    for (x, y, pixel) in result.image().enumerate_pixels() {
        assert_eq!(&pixel.0[..3], &source.pixels().get_pixel(x, y).0[..]);
    }
    Ok(())
}

#[test]
fn test_output_matches_input_resolution() -> Result<()> {
    let processor = processor(StubBackend::radial(small_model()));
    for (width, height) in [(1, 1), (3, 1000), (1000, 3), (32, 32), (641, 479)] {
        let result = processor.remove_background(&solid(width, height, [9, 9, 9]))?;
        assert_eq!(result.dimensions(), (width, height));
    }
    Ok(())
}

#[test]
fn test_mask_follows_surface_geometry() -> Result<()> {
    // Right half foreground at model resolution
    let stub = StubBackend::from_fn(ModelConfig::u2net(), |x, _, side| {
        if x >= side / 2 {
            1.0
        } else {
            0.0
        }
    });
    let result = processor(stub).remove_background(&solid(640, 480, [0, 128, 255]))?;

    let image = result.image();
    assert_eq!(image.get_pixel(0, 240)[3], 0);
    assert_eq!(image.get_pixel(100, 10)[3], 0);
    assert_eq!(image.get_pixel(639, 240)[3], 255);
    assert_eq!(image.get_pixel(540, 470)[3], 255);
    Ok(())
}

#[test]
fn test_runs_are_deterministic() -> Result<()> {
    let processor = processor(StubBackend::radial(small_model()));
    let source = gradient(200, 150);

    let first = processor.remove_background(&source)?;
    let second = processor.remove_background(&source)?;
    assert_eq!(first.image(), second.image());
    Ok(())
}

#[test]
fn test_zero_area_input_never_reaches_backend() {
    let stub = StubBackend::constant(small_model(), 1.0);
    let probe = stub.probe();
    let processor = processor(stub);

    for (width, height) in [(0, 10), (10, 0), (0, 0)] {
        let err = processor
            .remove_background(&solid(width, height, [0, 0, 0]))
            .unwrap_err();
        assert!(matches!(err, SnapEraseError::InvalidInput(_)));
    }
    assert_eq!(probe.initializations(), 0);
    assert_eq!(probe.inferences(), 0);
}

#[test]
fn test_inference_failure_propagates_unchanged() {
    let processor = processor(StubBackend::constant(small_model(), 1.0).failing_inference());
    let err = processor
        .remove_background(&solid(20, 20, [5, 5, 5]))
        .unwrap_err();
    assert!(matches!(err, SnapEraseError::InferenceFailure(_)));

    // The processor stays usable after a failed run
    let err = processor
        .remove_background(&solid(20, 20, [5, 5, 5]))
        .unwrap_err();
    assert!(matches!(err, SnapEraseError::InferenceFailure(_)));
}

#[test]
fn test_metadata_carries_model_and_timings() -> Result<()> {
    let result = processor(StubBackend::radial(small_model()))
        .remove_background(&solid(64, 48, [1, 1, 1]))?;

    let metadata = result.metadata();
    assert_eq!(metadata.model_name, "test-small");
    let timings = &metadata.timings;
    assert!(timings.total_ms >= timings.inference_ms);
    assert!(timings.total_ms >= timings.postprocessing_ms);
    assert!(timings.summary().starts_with("Total:"));
    Ok(())
}

#[test]
fn test_png_round_trip() -> Result<()> {
    let result = processor(StubBackend::radial(small_model()))
        .remove_background(&gradient(90, 60))?;

    let temp_dir = TempDir::new()?;
    let path = temp_dir.path().join("out").join("photo_no_bg.png");
    ImageIo::save_result(&result, &path)?;
    let reloaded: RgbaImage = image::open(&path)?.to_rgba8();
    assert_eq!(&reloaded, result.image());

    let decoded = image::load_from_memory(&result.to_png_bytes()?)?;
    assert!(matches!(decoded, DynamicImage::ImageRgba8(_)));
    assert_eq!(&decoded.to_rgba8(), result.image());
    Ok(())
}

#[test]
fn test_process_bytes_and_file() -> Result<()> {
    let source = gradient(40, 30);
    let mut encoded = Vec::new();
    DynamicImage::ImageRgb8(source.pixels().clone())
        .write_to(&mut std::io::Cursor::new(&mut encoded), image::ImageFormat::Png)?;

    let processor = processor(StubBackend::constant(small_model(), 1.0));
    let from_bytes = processor.process_bytes(&encoded)?;
    assert_eq!(from_bytes.dimensions(), (40, 30));

    let temp_dir = TempDir::new()?;
    let path = temp_dir.path().join("photo.png");
    std::fs::write(&path, &encoded)?;
    let from_file = processor.process_file(&path)?;
    assert_eq!(from_file.image(), from_bytes.image());
    Ok(())
}

#[test]
fn test_raw_rgb_input() -> Result<()> {
    let source = SourceImage::from_raw(2, 1, vec![10, 20, 30, 40, 50, 60])?;
    let result = processor(StubBackend::constant(small_model(), 1.0)).remove_background(&source)?;
    assert_eq!(result.image().get_pixel(1, 0).0, [40, 50, 60, 255]);
    Ok(())
}
