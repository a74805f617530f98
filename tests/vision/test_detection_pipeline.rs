// Copyright (c) 2025 Fabstir
// SPDX-License-Identifier: BUSL-1.1

//! Detection pipeline tests without a model file
//!
//! A hand-built YOLOv5 output tensor is pushed through decoding,
//! suppression and letterbox unmapping, then rendered.

use detection_node::vision::{
    postprocess::{decode_output, finalize, preprocess, Letterbox, LETTERBOX_FILL},
    Annotator,
};
use image::{DynamicImage, Rgb, RgbImage};
use ndarray::Array3;

const CLASSES: usize = 80;

fn candidate(cx: f32, cy: f32, w: f32, h: f32, objectness: f32, class: usize, score: f32) -> Vec<f32> {
    let mut row = vec![0.0; 5 + CLASSES];
    row[..5].copy_from_slice(&[cx, cy, w, h, objectness]);
    row[5 + class] = score;
    row
}

fn model_output(rows: Vec<Vec<f32>>) -> Array3<f32> {
    let n = rows.len();
    let flat: Vec<f32> = rows.into_iter().flatten().collect();
    Array3::from_shape_vec((1, n, 5 + CLASSES), flat).unwrap()
}

fn approx(a: f32, b: f32) -> bool {
    (a - b).abs() < 1e-3
}

#[test]
fn test_preprocess_letterboxes_wide_frame() {
    let frame = DynamicImage::ImageRgb8(RgbImage::from_pixel(1280, 640, Rgb([255, 0, 0])));
    let (tensor, letterbox) = preprocess(&frame, 640);

    assert_eq!(tensor.shape(), &[1, 3, 640, 640]);
    assert_eq!(letterbox.pad_x, 0);
    assert_eq!(letterbox.pad_y, 160);

    // Padding rows carry the fill colour, content rows the image
    let fill = LETTERBOX_FILL as f32 / 255.0;
    assert!(approx(tensor[[0, 0, 0, 0]], fill));
    assert!(approx(tensor[[0, 0, 320, 320]], 1.0));
    assert!(approx(tensor[[0, 1, 320, 320]], 0.0));
}

#[test]
fn test_pipeline_maps_boxes_to_source_pixels() {
    let letterbox = Letterbox::new(1280, 640, 640);
    let output = model_output(vec![
        // car, kept
        candidate(320.0, 320.0, 100.0, 80.0, 0.9, 2, 0.9),
        // near-duplicate car, suppressed
        candidate(322.0, 321.0, 100.0, 80.0, 0.8, 2, 0.9),
        // person at the same spot, different class so kept
        candidate(320.0, 320.0, 100.0, 80.0, 0.7, 0, 1.0),
        // below threshold
        candidate(100.0, 300.0, 50.0, 50.0, 0.1, 5, 0.9),
        // entirely inside the top padding, collapses after clamping
        candidate(320.0, 50.0, 40.0, 40.0, 0.9, 1, 0.9),
    ]);

    let candidates = decode_output(output.view().into_dyn(), CLASSES, 0.25).unwrap();
    assert_eq!(candidates.len(), 4);

    let detections = finalize(candidates, &letterbox, 0.45, 300);
    assert_eq!(detections.len(), 2);

    let car = &detections[0];
    assert_eq!(car.class_id, 2);
    assert_eq!(car.class_name, "car");
    assert!(approx(car.confidence, 0.81));
    assert!(approx(car.bbox.xmin, 540.0));
    assert!(approx(car.bbox.ymin, 240.0));
    assert!(approx(car.bbox.xmax, 740.0));
    assert!(approx(car.bbox.ymax, 400.0));

    let person = &detections[1];
    assert_eq!(person.class_name, "person");
    assert!(approx(person.confidence, 0.7));

    for d in &detections {
        assert!(d.is_valid());
    }
}

#[test]
fn test_max_detections_caps_output() {
    let letterbox = Letterbox::new(640, 640, 640);
    let rows = (0..20)
        .map(|i| candidate(16.0 + i as f32 * 30.0, 320.0, 20.0, 20.0, 0.9, 0, 0.9 - i as f32 * 0.01))
        .collect();

    let candidates = decode_output(model_output(rows).view().into_dyn(), CLASSES, 0.25).unwrap();
    let detections = finalize(candidates, &letterbox, 0.45, 5);

    assert_eq!(detections.len(), 5);
    assert!(detections
        .windows(2)
        .all(|w| w[0].confidence >= w[1].confidence));
}

#[test]
fn test_annotation_draws_on_a_copy() {
    let letterbox = Letterbox::new(1280, 640, 640);
    let output = model_output(vec![candidate(320.0, 320.0, 100.0, 80.0, 0.9, 2, 0.9)]);
    let detections = finalize(
        decode_output(output.view().into_dyn(), CLASSES, 0.25).unwrap(),
        &letterbox,
        0.45,
        300,
    );

    let source = DynamicImage::ImageRgb8(RgbImage::new(1280, 640));
    let annotated = Annotator::new().unwrap().annotate(&source, &detections);

    assert_eq!(annotated.dimensions(), (1280, 640));
    // Left edge of the car box is painted, the source is untouched
    assert_ne!(annotated.get_pixel(540, 320), &Rgb([0, 0, 0]));
    assert_eq!(source.to_rgb8().get_pixel(540, 320), &Rgb([0, 0, 0]));
    // Far away from any box nothing changes
    assert_eq!(annotated.get_pixel(100, 600), &Rgb([0, 0, 0]));
}
