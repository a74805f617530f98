// Copyright (c) 2025 Fabstir
// SPDX-License-Identifier: BUSL-1.1
//! COCO class names used by the stock YOLO exports

use std::borrow::Cow;

/// Number of classes in the COCO detection set
pub const COCO_CLASS_COUNT: usize = 80;

/// COCO class names, indexed by class id
pub const COCO_CLASSES: [&str; COCO_CLASS_COUNT] = [
    "person",
    "bicycle",
    "car",
    "motorcycle",
    "airplane",
    "bus",
    "train",
    "truck",
    "boat",
    "traffic light",
    "fire hydrant",
    "stop sign",
    "parking meter",
    "bench",
    "bird",
    "cat",
    "dog",
    "horse",
    "sheep",
    "cow",
    "elephant",
    "bear",
    "zebra",
    "giraffe",
    "backpack",
    "umbrella",
    "handbag",
    "tie",
    "suitcase",
    "frisbee",
    "skis",
    "snowboard",
    "sports ball",
    "kite",
    "baseball bat",
    "baseball glove",
    "skateboard",
    "surfboard",
    "tennis racket",
    "bottle",
    "wine glass",
    "cup",
    "fork",
    "knife",
    "spoon",
    "bowl",
    "banana",
    "apple",
    "sandwich",
    "orange",
    "broccoli",
    "carrot",
    "hot dog",
    "pizza",
    "donut",
    "cake",
    "chair",
    "couch",
    "potted plant",
    "bed",
    "dining table",
    "toilet",
    "tv",
    "laptop",
    "mouse",
    "remote",
    "keyboard",
    "cell phone",
    "microwave",
    "oven",
    "toaster",
    "sink",
    "refrigerator",
    "book",
    "clock",
    "vase",
    "scissors",
    "teddy bear",
    "hair drier",
    "toothbrush",
];

/// Resolve a class id to its display name
///
/// Ids outside the COCO range come from custom-trained exports and are
/// rendered as `class_<id>`.
pub fn class_name(class_id: u32) -> Cow<'static, str> {
    match COCO_CLASSES.get(class_id as usize) {
        Some(name) => Cow::Borrowed(name),
        None => Cow::Owned(format!("class_{}", class_id)),
    }
}
