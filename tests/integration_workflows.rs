//! End-to-end workflow tests for the detection pipeline
//!
//! Exercises the public API from raw upload bytes through analysis,
//! artifact persistence, session lookup, report export and retention.

use authlens::{
    analyze_image_from_bytes, generate_report, services, DetectionConfig, DetectionError,
    DetectionService, InferenceContext, SessionCache,
};
use image::{ImageBuffer, Rgb};
use std::io::Cursor;
use std::sync::Arc;
use std::time::{Duration, SystemTime};

fn encoded_image(width: u32, height: u32, color: [u8; 3], format: image::ImageFormat) -> Vec<u8> {
    let buf: ImageBuffer<Rgb<u8>, Vec<u8>> = ImageBuffer::from_pixel(width, height, Rgb(color));
    let mut bytes = Vec::new();
    image::DynamicImage::ImageRgb8(buf)
        .write_to(&mut Cursor::new(&mut bytes), format)
        .unwrap();
    bytes
}

fn shared_service(results_dir: &std::path::Path) -> DetectionService {
    let config = Arc::new(
        DetectionConfig::builder()
            .results_dir(results_dir)
            .build()
            .unwrap(),
    );
    let context = Arc::new(InferenceContext::initialize(&config));
    let sessions = Arc::new(SessionCache::new(
        config.session_ttl_minutes as i64,
        config.session_capacity,
    ));
    DetectionService::new(context, config, sessions)
}

#[tokio::test]
async fn analyze_uniform_jpeg_end_to_end() {
    let dir = tempfile::tempdir().unwrap();
    let config = DetectionConfig::builder()
        .results_dir(dir.path())
        .build()
        .unwrap();
    let payload = encoded_image(224, 224, [128, 128, 128], image::ImageFormat::Jpeg);

    let response = analyze_image_from_bytes(&payload, "image/jpeg", &config)
        .await
        .unwrap();

    assert!(response.success);
    assert!(["Real", "AI-generated image"].contains(&response.prediction.label.as_str()));
    assert!(response.explanation.gradcam_image.starts_with("/results/gradcam_"));
    assert!(response.explanation.gradcam_image.ends_with(".png"));
    assert!(response
        .explanation
        .description
        .contains(&response.prediction.label.to_lowercase()));

    // Both artifacts persisted under their managed prefixes.
    let stats = services::storage_stats(dir.path()).unwrap();
    assert_eq!(stats.file_count, 2);
}

#[tokio::test]
async fn rejected_content_type_leaves_no_artifacts() {
    let dir = tempfile::tempdir().unwrap();
    let config = DetectionConfig::builder()
        .results_dir(dir.path())
        .build()
        .unwrap();
    let payload = encoded_image(64, 64, [0, 0, 0], image::ImageFormat::Png);

    let err = analyze_image_from_bytes(&payload, "text/plain", &config)
        .await
        .unwrap_err();
    assert!(matches!(err, DetectionError::UnsupportedContentType(_)));
    assert_eq!(services::storage_stats(dir.path()).unwrap().file_count, 0);
}

#[tokio::test]
async fn corrupt_payload_is_reported_not_fatal() {
    let dir = tempfile::tempdir().unwrap();
    let config = DetectionConfig::builder()
        .results_dir(dir.path())
        .build()
        .unwrap();

    let err = analyze_image_from_bytes(&[0xde, 0xad, 0xbe, 0xef], "image/png", &config)
        .await
        .unwrap_err();
    assert!(err.is_input_error());
}

#[tokio::test]
async fn report_export_round_trip() {
    let dir = tempfile::tempdir().unwrap();
    let service = shared_service(dir.path());
    let payload = encoded_image(96, 96, [200, 100, 40], image::ImageFormat::Png);

    let response = service.analyze(&payload, "image/png").unwrap();
    let session_id = response.session_id.unwrap();

    let pdf = generate_report(service.sessions(), &session_id).unwrap();
    assert!(pdf.starts_with(b"%PDF"));
}

#[tokio::test]
async fn unknown_session_report_is_not_found() {
    let dir = tempfile::tempdir().unwrap();
    let service = shared_service(dir.path());

    let err = generate_report(service.sessions(), "not-a-session").unwrap_err();
    assert!(matches!(err, DetectionError::SessionNotFound(_)));
}

#[test]
fn retention_removes_only_expired_artifacts() {
    let dir = tempfile::tempdir().unwrap();
    for (name, hours) in [
        ("gradcam_a.png", 1u64),
        ("gradcam_b.png", 25),
        ("source_c.png", 48),
    ] {
        let path = dir.path().join(name);
        let file = std::fs::File::create(&path).unwrap();
        file.set_modified(SystemTime::now() - Duration::from_secs(hours * 3600))
            .unwrap();
    }

    let removed = services::cleanup_by_age(dir.path(), 24).unwrap();
    assert_eq!(removed, 2);
    assert!(dir.path().join("gradcam_a.png").exists());
    assert!(!dir.path().join("gradcam_b.png").exists());
    assert!(!dir.path().join("source_c.png").exists());
}

#[tokio::test]
async fn repeated_analysis_is_deterministic() {
    let dir = tempfile::tempdir().unwrap();
    let service = shared_service(dir.path());
    let payload = encoded_image(128, 128, [30, 180, 220], image::ImageFormat::Png);

    let a = service.analyze(&payload, "image/png").unwrap();
    let b = service.analyze(&payload, "image/png").unwrap();
    assert_eq!(a.prediction.label, b.prediction.label);
    assert_eq!(a.prediction.is_deepfake, b.prediction.is_deepfake);
    assert_eq!(a.explanation.description, b.explanation.description);
}

#[tokio::test]
async fn oversized_payload_is_rejected_before_decode() {
    let dir = tempfile::tempdir().unwrap();
    let config = DetectionConfig::builder()
        .results_dir(dir.path())
        .max_payload_bytes(1024)
        .build()
        .unwrap();
    // Valid image with noisy content so the encoded size exceeds the ceiling.
    let mut seed = 0x1234_5678u32;
    let buf: ImageBuffer<Rgb<u8>, Vec<u8>> = ImageBuffer::from_fn(256, 256, |_, _| {
        seed = seed.wrapping_mul(1_664_525).wrapping_add(1_013_904_223);
        let v = (seed >> 24) as u8;
        Rgb([v, v.wrapping_add(85), v.wrapping_add(170)])
    });
    let mut payload = Vec::new();
    image::DynamicImage::ImageRgb8(buf)
        .write_to(&mut Cursor::new(&mut payload), image::ImageFormat::Png)
        .unwrap();
    assert!(payload.len() > 1024);

    let err = analyze_image_from_bytes(&payload, "image/png", &config)
        .await
        .unwrap_err();
    assert!(matches!(err, DetectionError::InvalidInput(_)));
}
