//! Fuzz-style tests using proptest
//!
//! These provide fuzz-like testing without requiring nightly Rust or cargo-fuzz.
//! Run with: cargo test --test fuzz_tests

use autocapture::config::DocumentConfig;
use autocapture::crop::CropExtractor;
use autocapture::quality::{alignment_score, CaptureStabilityTracker};
use autocapture::{BoundingBox, Detection, DetectionDecoder, GeometryContext, ModelOutput, Tensor};
use proptest::prelude::*;

proptest! {
    #![proptest_config(ProptestConfig::with_cases(500))]

    /// Letterbox padding always fills the square exactly
    #[test]
    fn fuzz_letterbox_geometry(
        width in 1u32..5000,
        height in 1u32..5000,
        size in prop::sample::select(vec![320u32, 416, 640]),
    ) {
        let g = GeometryContext::letterbox(size, width, height);
        prop_assert_eq!(g.top_padding + g.scaled_height + g.bottom_padding(), size);
        prop_assert_eq!(g.left_padding + g.scaled_width + g.right_padding(), size);
        prop_assert!(g.bottom_padding() >= g.top_padding);
        prop_assert!(g.right_padding() >= g.left_padding);
    }

    /// Forward then inverse mapping returns the original box
    #[test]
    fn fuzz_coordinate_round_trip(
        width in 16u32..4000,
        height in 16u32..4000,
        fx in 0.0f32..0.9,
        fy in 0.0f32..0.9,
        fw in 0.01f32..0.5,
        fh in 0.01f32..0.5,
    ) {
        let g = GeometryContext::letterbox(640, width, height);
        let original = BoundingBox::new(
            fx * width as f32,
            fy * height as f32,
            fw * width as f32,
            fh * height as f32,
        );
        let [cx, cy, w, h] = g.to_model_space(&original);
        let back = g.to_frame_space(cx, cy, w, h);
        let tolerance = 1e-3 * width.max(height) as f32;
        prop_assert!((back.x - original.x).abs() < tolerance);
        prop_assert!((back.y - original.y).abs() < tolerance);
        prop_assert!((back.width - original.width).abs() < tolerance);
        prop_assert!((back.height - original.height).abs() < tolerance);
    }

    /// Alignment is always within [0, 1]
    #[test]
    fn fuzz_alignment_bounded(
        aspect in -10.0f32..10.0,
        area in -1e6f32..1e7,
        w in 0.0f32..4000.0,
        h in 0.0f32..4000.0,
    ) {
        let score = alignment_score(aspect, area, w, h);
        prop_assert!((0.0..=1.0).contains(&score));
    }

    /// The run counter never goes negative, never reaches the threshold
    /// between frames, and a capture fires at most once
    #[test]
    fn fuzz_tracker_counter(
        frames in prop::collection::vec(
            prop::option::of((0.0f32..1.0, 1.0f32..2.2, 0.01f32..0.9, 0.0f32..1.0)),
            1..60,
        ),
    ) {
        let mut tracker = CaptureStabilityTracker::new(DocumentConfig::default());
        let mut captures = 0;
        for frame in frames {
            let detection = frame.map(|(confidence, aspect, area_ratio, alignment)| {
                let height = (area_ratio * 1280.0 * 720.0 / aspect).sqrt();
                Detection {
                    bbox: BoundingBox::new(10.0, 10.0, height * aspect, height),
                    confidence,
                    aspect_ratio: aspect,
                    alignment_score: alignment,
                }
            });
            let update = tracker.observe(detection.as_ref(), 1280, 720);
            if update.capture_ready() {
                captures += 1;
            }
            prop_assert!(tracker.state().consecutive_good_count < tracker.state().threshold);
        }
        prop_assert!(captures <= 1);
    }

    /// Crop regions always lie inside the frame or fail cleanly
    #[test]
    fn fuzz_crop_region_inside_frame(
        x in -500.0f32..2500.0,
        y in -500.0f32..1500.0,
        w in 0.0f32..2000.0,
        h in 0.0f32..1500.0,
        fw in 1u32..2000,
        fh in 1u32..2000,
    ) {
        let extractor = CropExtractor::default();
        if let Ok(region) = extractor.compute_crop_region(&BoundingBox::new(x, y, w, h), fw, fh) {
            prop_assert!(region.fits_within(fw, fh));
        }
    }

    /// Arbitrary detector output never panics the decoder
    #[test]
    fn fuzz_decoder_random_output(
        batch in 0usize..3,
        predictions in 1usize..40,
        fields in 1usize..8,
        column_major in any::<bool>(),
        seed in prop::collection::vec(-2.0f32..2.0, 320),
    ) {
        let shape = if column_major {
            vec![batch, fields, predictions]
        } else {
            vec![batch, predictions, fields]
        };
        let len = batch * predictions * fields;
        let data: Vec<f32> = seed.iter().cycle().take(len).copied().collect();
        let tensor = Tensor::new(shape, data).unwrap();
        let geometry = GeometryContext::letterbox(640, 1280, 720);
        let output = ModelOutput::Single(tensor);
        let decoded = DetectionDecoder::default().decode_or_skip(&output, &geometry, None);
        for pair in decoded.windows(2) {
            prop_assert!(pair[0].confidence >= pair[1].confidence);
        }
        for d in &decoded {
            prop_assert!(d.confidence > 0.85);
            prop_assert!((0.0..=1.0).contains(&d.alignment_score));
        }
    }
}
