//! Annotation rendering: circle markers over detected faces, JPEG-encoded
//! into a base64 data URL.

use std::io::Cursor;

use base64::Engine as _;
use base64::engine::general_purpose::STANDARD;
use image::codecs::jpeg::JpegEncoder;
use image::{DynamicImage, Rgb, RgbImage, Rgba};

use crate::models::Face;
use crate::services::error::ApiError;

const JPEG_QUALITY: u8 = 90;

/// Stroke configuration for face markers.
#[derive(Debug, Clone)]
pub struct CircleOptions {
    pub color: Rgba<u8>,
    pub line_width: u32,
}

/// Draw circles around the given faces on a private copy of the image and
/// return the result as a `data:image/jpeg;base64,` URL.
///
/// The source image is never mutated.
pub fn draw_face_circles(
    img: &DynamicImage,
    faces: &[Face],
    opts: &CircleOptions,
) -> Result<String, ApiError> {
    let mut canvas = img.to_rgb8();

    for face in faces {
        let center_x = face.x + face.width / 2;
        let center_y = face.y + face.height / 2;
        let radius = face.width.max(face.height) / 2;

        draw_circle(
            &mut canvas,
            center_x,
            center_y,
            radius,
            opts.color,
            opts.line_width as i32,
        );
    }

    encode_to_base64(&canvas)
}

/// Midpoint (Bresenham) circle outline with 8-way symmetry, thickened by
/// stacking concentric outlines across the stroke width.
fn draw_circle(
    canvas: &mut RgbImage,
    center_x: i32,
    center_y: i32,
    radius: i32,
    color: Rgba<u8>,
    line_width: i32,
) {
    for w in 0..line_width {
        let r = radius + w - line_width / 2;
        if r <= 0 {
            continue;
        }

        let mut x = 0;
        let mut y = r;
        let mut d = 3 - 2 * r;

        while x <= y {
            set_pixel_safe(canvas, center_x + x, center_y + y, color);
            set_pixel_safe(canvas, center_x - x, center_y + y, color);
            set_pixel_safe(canvas, center_x + x, center_y - y, color);
            set_pixel_safe(canvas, center_x - x, center_y - y, color);
            set_pixel_safe(canvas, center_x + y, center_y + x, color);
            set_pixel_safe(canvas, center_x - y, center_y + x, color);
            set_pixel_safe(canvas, center_x + y, center_y - x, color);
            set_pixel_safe(canvas, center_x - y, center_y - x, color);

            if d < 0 {
                d += 4 * x + 6;
            } else {
                d += 4 * (x - y) + 10;
                y -= 1;
            }
            x += 1;
        }
    }
}

/// Write a pixel if it falls inside the canvas; out-of-range writes are
/// silently skipped so partially visible circles render without error.
fn set_pixel_safe(canvas: &mut RgbImage, x: i32, y: i32, color: Rgba<u8>) {
    if x >= 0 && y >= 0 && (x as u32) < canvas.width() && (y as u32) < canvas.height() {
        let Rgba([r, g, b, _]) = color;
        canvas.put_pixel(x as u32, y as u32, Rgb([r, g, b]));
    }
}

fn encode_to_base64(canvas: &RgbImage) -> Result<String, ApiError> {
    let mut buffer = Cursor::new(Vec::new());
    let encoder = JpegEncoder::new_with_quality(&mut buffer, JPEG_QUALITY);
    canvas
        .write_with_encoder(encoder)
        .map_err(|e| ApiError::RenderFailed(e.to_string()))?;

    Ok(format!(
        "data:image/jpeg;base64,{}",
        STANDARD.encode(buffer.into_inner())
    ))
}

/// Resolve a color name to RGBA. Unrecognized names fall back to red;
/// matching is case-sensitive.
pub fn parse_color(name: &str) -> Rgba<u8> {
    match name {
        "red" => Rgba([255, 0, 0, 255]),
        "green" => Rgba([0, 255, 0, 255]),
        "blue" => Rgba([0, 0, 255, 255]),
        "yellow" => Rgba([255, 255, 0, 255]),
        "white" => Rgba([255, 255, 255, 255]),
        "black" => Rgba([0, 0, 0, 255]),
        "orange" => Rgba([255, 165, 0, 255]),
        "purple" => Rgba([128, 0, 128, 255]),
        "pink" => Rgba([255, 192, 203, 255]),
        "cyan" => Rgba([0, 255, 255, 255]),
        _ => Rgba([255, 0, 0, 255]),
    }
}
