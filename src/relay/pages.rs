// Copyright (c) 2025 Fabstir
// SPDX-License-Identifier: BUSL-1.1
//! HTML pages served by the relay
//!
//! All interpolated text goes through `ammonia::clean_text`.

use ammonia::clean_text;

use crate::vision::Detection;

const STYLE: &str = r#"<style>
body { font-family: sans-serif; margin: 2rem auto; max-width: 960px; }
img { max-width: 100%; border: 1px solid #ccc; }
table { border-collapse: collapse; margin-top: 1rem; }
th, td { border: 1px solid #ccc; padding: 4px 10px; text-align: left; }
</style>"#;

/// Upload form posting `file` to `/upload`
pub fn render_index() -> String {
    format!(
        r#"<!DOCTYPE html>
<html>
<head>
<meta charset="utf-8">
<title>Object Detection</title>
{style}
</head>
<body>
<h1>Object Detection</h1>
<form action="/upload" method="post" enctype="multipart/form-data">
<input type="file" name="file" accept="image/*" required>
<button type="submit">Detect</button>
</form>
</body>
</html>
"#,
        style = STYLE
    )
}

/// Results page showing the annotated image and the detection list
pub fn render_results(image_url: &str, detections: &[Detection]) -> String {
    let rows = if detections.is_empty() {
        r#"<tr><td colspan="4">No objects detected</td></tr>"#.to_string()
    } else {
        detections
            .iter()
            .map(|d| {
                format!(
                    "<tr><td>{}</td><td>{}</td><td>{:.1}%</td><td>({:.0}, {:.0}) - ({:.0}, {:.0})</td></tr>",
                    d.class_id,
                    clean_text(&d.class_name),
                    d.confidence * 100.0,
                    d.bbox.xmin,
                    d.bbox.ymin,
                    d.bbox.xmax,
                    d.bbox.ymax
                )
            })
            .collect::<Vec<_>>()
            .join("\n")
    };

    format!(
        r#"<!DOCTYPE html>
<html>
<head>
<meta charset="utf-8">
<title>Detection Results</title>
{style}
</head>
<body>
<h1>Detection Results</h1>
<img src="{image_url}" alt="Annotated image">
<table>
<tr><th>Class ID</th><th>Class</th><th>Confidence</th><th>Bounding box</th></tr>
{rows}
</table>
<p><a href="/">Upload another image</a></p>
</body>
</html>
"#,
        style = STYLE,
        image_url = clean_text(image_url),
        rows = rows
    )
}
