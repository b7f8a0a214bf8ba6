//! Error classification at the public surface

mod common;

use common::{processor, small_model, solid};
use snap_erase::{
    create_backend, BackendFactory, BackendOptions, BackendType, BackgroundRemovalProcessor,
    Compositor, DefaultBackendFactory, ImageIo, Mask, MaskDecoder, ModelConfig, ModelSpec,
    ProcessorConfig, SnapEraseError, SourceImage, StubBackend,
};
use std::fs;
use tempfile::TempDir;

fn missing_model_config(backend_type: BackendType) -> ProcessorConfig {
    ProcessorConfig::builder()
        .model_spec(ModelSpec::new(
            "/nonexistent/models/u2net.onnx",
            ModelConfig::u2net(),
        ))
        .backend_type(backend_type)
        .build()
        .unwrap()
}

#[test]
fn test_missing_model_is_model_unavailable_for_every_backend() {
    for backend_type in DefaultBackendFactory.available_backends() {
        let processor = BackgroundRemovalProcessor::new(missing_model_config(backend_type))
            .expect("creation does not touch the model");
        assert!(!processor.is_initialized());

        let err = processor.initialize().unwrap_err();
        assert!(
            matches!(err, SnapEraseError::ModelUnavailable(_)),
            "{backend_type}: {err}"
        );
        assert!(err.to_string().contains("u2net.onnx"));

        let err = processor
            .remove_background(&solid(8, 8, [0, 0, 0]))
            .unwrap_err();
        assert!(matches!(err, SnapEraseError::ModelUnavailable(_)));
    }
}

#[test]
fn test_garbage_model_is_model_unavailable_for_every_backend() {
    let temp_dir = TempDir::new().unwrap();
    let path = temp_dir.path().join("u2net.onnx");
    fs::write(&path, b"this is not a protobuf").unwrap();

    for backend_type in DefaultBackendFactory.available_backends() {
        let config = ProcessorConfig::builder()
            .model_spec(ModelSpec::new(&path, ModelConfig::u2net()))
            .backend_type(backend_type)
            .build()
            .unwrap();
        let processor = BackgroundRemovalProcessor::new(config).unwrap();

        let err = processor.initialize().unwrap_err();
        assert!(
            matches!(err, SnapEraseError::ModelUnavailable(_)),
            "{backend_type}: {err}"
        );
    }
}

#[test]
fn test_invalid_configuration_values() {
    let result = ProcessorConfig::builder().inter_threads(2048).build();
    assert!(matches!(result, Err(SnapEraseError::InvalidConfig(_))));

    let result = ProcessorConfig::builder()
        .model_config(ModelConfig {
            input_size: 8192,
            ..ModelConfig::u2net()
        })
        .build();
    assert!(matches!(result, Err(SnapEraseError::InvalidConfig(_))));

    let result = ProcessorConfig::builder()
        .model_config(ModelConfig {
            normalization_std: [0.2, -1.0, 0.2],
            ..ModelConfig::u2net()
        })
        .build();
    assert!(matches!(result, Err(SnapEraseError::InvalidConfig(_))));

    assert!(matches!(
        "cuda".parse::<BackendType>(),
        Err(SnapEraseError::InvalidConfig(_))
    ));
}

#[test]
fn test_backend_with_invalid_contract_is_rejected() {
    let stub = StubBackend::constant(
        ModelConfig {
            input_size: 0,
            ..small_model()
        },
        1.0,
    );
    let err = BackgroundRemovalProcessor::from_backend(stub).unwrap_err();
    assert!(matches!(err, SnapEraseError::InvalidConfig(_)));
}

#[test]
fn test_invalid_sidecar_is_invalid_config() {
    let temp_dir = TempDir::new().unwrap();
    fs::write(temp_dir.path().join("model.json"), "{ not json").unwrap();

    let err = ModelSpec::from_path(temp_dir.path().join("u2net.onnx")).unwrap_err();
    assert!(matches!(err, SnapEraseError::InvalidConfig(_)));

    fs::write(
        temp_dir.path().join("model.json"),
        r#"{"name": "bad", "input_size": 0, "normalization_mean": [0, 0, 0], "normalization_std": [1, 1, 1]}"#,
    )
    .unwrap();
    let err = ModelSpec::from_path(temp_dir.path().join("u2net.onnx")).unwrap_err();
    assert!(matches!(err, SnapEraseError::InvalidConfig(_)));
}

#[test]
fn test_created_backends_are_lazy() {
    for backend_type in DefaultBackendFactory.available_backends() {
        let backend = create_backend(
            backend_type,
            ModelSpec::new("/nonexistent/u2net.onnx", ModelConfig::u2net()),
            BackendOptions::default(),
        )
        .unwrap();
        assert!(!backend.is_initialized());
        assert_eq!(backend.input_shape(), (1, 3, 320, 320));
        assert_eq!(backend.output_shape(), (1, 1, 320, 320));
    }
}

#[test]
fn test_wrong_output_shape_is_internal() {
    let stub = StubBackend::constant(small_model(), 0.5).with_output_shape((1, 2, 32, 32));
    let err = processor(stub)
        .remove_background(&solid(10, 10, [0, 0, 0]))
        .unwrap_err();
    assert!(err.is_internal());
    assert!(matches!(err, SnapEraseError::InternalInvariantViolation(_)));
}

#[test]
fn test_stage_contract_violations_are_internal() {
    let raw = ndarray::Array4::<f32>::zeros((1, 3, 8, 8));
    let err = MaskDecoder::decode(&raw, 4, 4, Default::default()).unwrap_err();
    assert!(err.is_internal());

    let image = solid(4, 4, [1, 2, 3]);
    let mask = Mask::new(vec![1.0; 9], 3, 3).unwrap();
    let err = Compositor::composite(&image, &mask).unwrap_err();
    assert!(err.is_internal());
}

#[test]
fn test_raw_buffer_length_mismatch_is_invalid_input() {
    let err = SourceImage::from_raw(4, 4, vec![0; 10]).unwrap_err();
    assert!(matches!(err, SnapEraseError::InvalidInput(_)));
}

#[test]
fn test_io_failures() {
    let err = ImageIo::load("/nonexistent/photo.jpg").unwrap_err();
    assert!(matches!(err, SnapEraseError::Io(_)));

    let err = ImageIo::load_from_bytes(b"definitely not an image").unwrap_err();
    assert!(matches!(err, SnapEraseError::Image(_)));

    let err = processor(StubBackend::constant(small_model(), 1.0))
        .process_bytes(&[])
        .unwrap_err();
    assert!(!err.is_internal());
}

#[test]
fn test_error_messages() {
    let cases = [
        (
            SnapEraseError::invalid_input("image has zero width"),
            "Invalid input: image has zero width",
        ),
        (
            SnapEraseError::inference("session run failed"),
            "Inference failure: session run failed",
        ),
        (
            SnapEraseError::invariant("mask is 3x3, image is 4x4"),
            "Internal invariant violation: mask is 3x3, image is 4x4",
        ),
        (
            SnapEraseError::Cancelled("compositing".to_string()),
            "Processing cancelled before compositing",
        ),
    ];
    for (err, expected) in cases {
        assert_eq!(err.to_string(), expected);
    }
}
