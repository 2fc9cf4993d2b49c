use autocapture::testing::synthetic_data::{column_major_output, row_major_output};
use autocapture::{
    BoundingBox, DetectionDecoder, FramePreprocessor, GeometryContext, ModelOutput, OutputLayout,
    Tensor,
};

fn candidates() -> Vec<(BoundingBox, f32)> {
    vec![
        (BoundingBox::new(300.0, 150.0, 400.0, 252.0), 0.91),
        (BoundingBox::new(50.0, 60.0, 200.0, 120.0), 0.97),
        (BoundingBox::new(700.0, 300.0, 320.0, 210.0), 0.88),
        (BoundingBox::new(10.0, 10.0, 30.0, 30.0), 0.40),
    ]
}

#[test]
fn test_row_and_column_major_decode_identically() {
    let geometry = GeometryContext::letterbox(640, 1280, 720);
    let decoder = DetectionDecoder::default();

    let row = decoder
        .decode(&row_major_output(&candidates(), &geometry, 32), &geometry)
        .unwrap();
    let col = decoder
        .decode(&column_major_output(&candidates(), &geometry, 32), &geometry)
        .unwrap();

    assert_eq!(row.len(), 3);
    assert_eq!(row, col);
    let confidences: Vec<f32> = row.iter().map(|d| d.confidence).collect();
    assert_eq!(confidences, vec![0.97, 0.91, 0.88]);
}

#[test]
fn test_decoded_boxes_round_trip_to_frame_space() {
    for (width, height) in [(1280, 720), (720, 1280), (641, 400), (640, 640)] {
        let geometry = GeometryContext::letterbox(640, width, height);
        let original = BoundingBox::new(
            width as f32 * 0.2,
            height as f32 * 0.3,
            width as f32 * 0.4,
            height as f32 * 0.25,
        );
        let output = row_major_output(&[(original, 0.95)], &geometry, 8);
        let detections = DetectionDecoder::default()
            .decode(&output, &geometry)
            .unwrap();
        let decoded = detections[0].bbox;

        assert!((decoded.x - original.x).abs() < 0.05, "{}x{}", width, height);
        assert!((decoded.y - original.y).abs() < 0.05, "{}x{}", width, height);
        assert!((decoded.width - original.width).abs() < 0.05);
        assert!((decoded.height - original.height).abs() < 0.05);
    }
}

#[test]
fn test_geometry_matches_preprocessor() {
    let frame = autocapture::testing::synthetic_video_frame(0, 1280, 720);
    let prepared = FramePreprocessor::default().preprocess(&frame).unwrap();
    assert_eq!(
        prepared.geometry,
        GeometryContext::letterbox(640, 1280, 720)
    );
}

#[test]
fn test_list_output_uses_first_tensor() {
    let geometry = GeometryContext::letterbox(640, 1280, 720);
    let card = BoundingBox::new(300.0, 150.0, 400.0, 252.0);
    let first = match row_major_output(&[(card, 0.9)], &geometry, 8) {
        ModelOutput::Single(tensor) => tensor,
        ModelOutput::Many(_) => unreachable!(),
    };
    let noise = Tensor::new(vec![1, 4], vec![1.0; 4]).unwrap();
    let output = ModelOutput::Many(vec![first, noise]);

    let detections = DetectionDecoder::default().decode(&output, &geometry).unwrap();
    assert_eq!(detections.len(), 1);
}

#[test]
fn test_extra_fields_are_ignored() {
    // [cx, cy, w, h, confidence, class] per candidate
    let geometry = GeometryContext::letterbox(640, 640, 640);
    let mut data = vec![0.0; 8 * 6];
    data[..6].copy_from_slice(&[0.5, 0.5, 0.4, 0.25, 0.93, 7.0]);
    let output = ModelOutput::Single(Tensor::new(vec![1, 8, 6], data).unwrap());

    let detections = DetectionDecoder::default().decode(&output, &geometry).unwrap();
    assert_eq!(detections.len(), 1);
    assert!((detections[0].bbox.width - 256.0).abs() < 1e-3);
    assert!((detections[0].bbox.height - 160.0).abs() < 1e-3);
}

#[test]
fn test_layout_hint_for_short_row_major_output() {
    let geometry = GeometryContext::letterbox(640, 1280, 720);
    let card = BoundingBox::new(300.0, 150.0, 400.0, 252.0);
    let [cx, cy, w, h] = geometry.to_model_space(&card);
    // three candidates, row-major, looks column-major by shape
    let data = vec![
        cx, cy, w, h, 0.9, //
        0.0, 0.0, 0.0, 0.0, 0.0, //
        0.0, 0.0, 0.0, 0.0, 0.0,
    ];
    let output = ModelOutput::Single(Tensor::new(vec![1, 3, 5], data).unwrap());
    let decoder = DetectionDecoder::default();

    // the heuristic reads this as 5 fields x 3 predictions and rejects it
    assert!(decoder.decode(&output, &geometry).is_err());

    let hinted = decoder
        .decode_with_layout(&output, &geometry, Some(OutputLayout::RowMajor))
        .unwrap();
    assert_eq!(hinted.len(), 1);
    assert!((hinted[0].bbox.x - 300.0).abs() < 0.05);
}

#[test]
fn test_shape_mismatch_is_skipped() {
    let geometry = GeometryContext::letterbox(640, 1280, 720);
    let tensor: Tensor = serde_json::from_str(r#"{"shape":[1,8,5],"data":[0.5,0.5]}"#).unwrap();
    let decoder = DetectionDecoder::default();
    assert!(decoder
        .decode_or_skip(&ModelOutput::Single(tensor), &geometry, None)
        .is_empty());
}
