//! Frame → model input tensor.

use image::imageops::{self, FilterType};
use image::RgbImage;
use serde::Deserialize;

use crate::error::PipelineError;
use crate::frame::{Frame, PixelFormat};

/// Element type the model declares for its input tensor.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TensorType {
    /// Quantized model: 0..=255 samples, no further scaling.
    #[default]
    U8,
    /// Float model: samples scaled into 0.0..=1.0.
    F32,
}

#[derive(Clone, Debug, PartialEq)]
pub enum TensorData {
    U8(Vec<u8>),
    F32(Vec<f32>),
}

impl TensorData {
    pub fn len(&self) -> usize {
        match self {
            TensorData::U8(values) => values.len(),
            TensorData::F32(values) => values.len(),
        }
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

/// Interleaved `height x width x 3` model input.
#[derive(Clone, Debug, PartialEq)]
pub struct NormalizedTensor {
    pub width: u32,
    pub height: u32,
    pub data: TensorData,
}

impl NormalizedTensor {
    pub const CHANNELS: u32 = 3;

    pub fn tensor_type(&self) -> TensorType {
        match self.data {
            TensorData::U8(_) => TensorType::U8,
            TensorData::F32(_) => TensorType::F32,
        }
    }
}

/// Convert `frame` into a `target_width x target_height` RGB tensor.
///
/// Resampling is bilinear. Pure function of its inputs.
pub fn normalize(
    frame: &Frame,
    target_width: u32,
    target_height: u32,
    target_type: TensorType,
) -> Result<NormalizedTensor, PipelineError> {
    if target_width == 0 || target_height == 0 {
        return Err(PipelineError::UnsupportedFormat(format!(
            "target size {}x{} is empty",
            target_width, target_height
        )));
    }

    let (width, height) = (frame.width(), frame.height());
    let rgb = normalize_to_rgb(frame.data(), width, height, frame.format())?;

    let resized = if width == target_width && height == target_height {
        rgb
    } else {
        let image = RgbImage::from_raw(width, height, rgb).ok_or_else(|| {
            PipelineError::UnsupportedFormat("RGB buffer does not match frame size".to_string())
        })?;
        imageops::resize(&image, target_width, target_height, FilterType::Triangle).into_raw()
    };

    let data = match target_type {
        TensorType::U8 => TensorData::U8(resized),
        TensorType::F32 => TensorData::F32(resized.iter().map(|&v| v as f32 / 255.0).collect()),
    };

    Ok(NormalizedTensor {
        width: target_width,
        height: target_height,
        data,
    })
}

/// Convert raw frame bytes of the given layout into packed RGB24.
pub fn normalize_to_rgb(
    pixels: &[u8],
    width: u32,
    height: u32,
    format: PixelFormat,
) -> Result<Vec<u8>, PipelineError> {
    if width == 0 || height == 0 {
        return Err(PipelineError::UnsupportedFormat(format!(
            "{} frame has empty size {}x{}",
            format.name(),
            width,
            height
        )));
    }

    match format {
        PixelFormat::Rgb24 => {
            expect_len(format, pixels, plane_len(width, height, 3)?)?;
            Ok(pixels.to_vec())
        }
        PixelFormat::Rgba32 => {
            expect_len(format, pixels, plane_len(width, height, 4)?)?;
            Ok(pixels
                .chunks_exact(4)
                .flat_map(|px| [px[0], px[1], px[2]])
                .collect())
        }
        PixelFormat::Nv12 => semi_planar_to_rgb(pixels, width, height, format, false),
        PixelFormat::Nv21 => semi_planar_to_rgb(pixels, width, height, format, true),
        PixelFormat::I420 => planar_to_rgb(pixels, width, height),
        PixelFormat::Gray8 | PixelFormat::Jpeg => Err(PipelineError::UnsupportedFormat(format!(
            "{} cannot be converted to RGB",
            format.name()
        ))),
    }
}

fn plane_len(width: u32, height: u32, bytes_per_pixel: usize) -> Result<usize, PipelineError> {
    (width as usize)
        .checked_mul(height as usize)
        .and_then(|v| v.checked_mul(bytes_per_pixel))
        .ok_or_else(|| PipelineError::UnsupportedFormat("frame dimensions overflow".to_string()))
}

fn expect_len(format: PixelFormat, pixels: &[u8], expected: usize) -> Result<(), PipelineError> {
    if pixels.len() != expected {
        return Err(PipelineError::UnsupportedFormat(format!(
            "{} frame length mismatch: expected {}, got {}",
            format.name(),
            expected,
            pixels.len()
        )));
    }
    Ok(())
}

fn chroma_dims(width: u32, height: u32) -> (usize, usize) {
    (width.div_ceil(2) as usize, height.div_ceil(2) as usize)
}

// Luma plane plus two chroma planes, or an error if the header lies.
fn yuv420_len(y_plane: usize, cw: usize, ch: usize) -> Result<usize, PipelineError> {
    cw.checked_mul(ch)
        .and_then(|c| c.checked_mul(2))
        .and_then(|c| c.checked_add(y_plane))
        .ok_or_else(|| PipelineError::UnsupportedFormat("frame dimensions overflow".to_string()))
}

fn semi_planar_to_rgb(
    pixels: &[u8],
    width: u32,
    height: u32,
    format: PixelFormat,
    vu_order: bool,
) -> Result<Vec<u8>, PipelineError> {
    let w = width as usize;
    let h = height as usize;
    let y_plane = plane_len(width, height, 1)?;
    let (cw, ch) = chroma_dims(width, height);
    expect_len(format, pixels, yuv420_len(y_plane, cw, ch)?)?;

    let mut rgb = vec![0u8; y_plane * 3];
    for j in 0..h {
        for i in 0..w {
            let y = pixels[j * w + i];
            let uv_index = y_plane + (j / 2) * cw * 2 + (i / 2) * 2;
            let (u, v) = if vu_order {
                (pixels[uv_index + 1], pixels[uv_index])
            } else {
                (pixels[uv_index], pixels[uv_index + 1])
            };
            write_rgb(&mut rgb[(j * w + i) * 3..], y, u, v);
        }
    }
    Ok(rgb)
}

fn planar_to_rgb(pixels: &[u8], width: u32, height: u32) -> Result<Vec<u8>, PipelineError> {
    let w = width as usize;
    let h = height as usize;
    let y_plane = plane_len(width, height, 1)?;
    let (cw, ch) = chroma_dims(width, height);
    expect_len(PixelFormat::I420, pixels, yuv420_len(y_plane, cw, ch)?)?;
    let chroma_plane = cw * ch;

    let u_base = y_plane;
    let v_base = y_plane + chroma_plane;
    let mut rgb = vec![0u8; y_plane * 3];
    for j in 0..h {
        for i in 0..w {
            let c = (j / 2) * cw + i / 2;
            write_rgb(
                &mut rgb[(j * w + i) * 3..],
                pixels[j * w + i],
                pixels[u_base + c],
                pixels[v_base + c],
            );
        }
    }
    Ok(rgb)
}

// BT.601 full range.
fn write_rgb(out: &mut [u8], y: u8, u: u8, v: u8) {
    let y = y as f32;
    let u = u as f32 - 128.0;
    let v = v as f32 - 128.0;

    out[0] = clamp_to_u8(y + 1.402_f32 * v);
    out[1] = clamp_to_u8(y - 0.344_136_f32 * u - 0.714_136_f32 * v);
    out[2] = clamp_to_u8(y + 1.772_f32 * u);
}

fn clamp_to_u8(value: f32) -> u8 {
    value.round().clamp(0.0, 255.0) as u8
}
