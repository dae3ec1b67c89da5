use image::imageops::FilterType;
use ndarray::{Array, Ix4};
use serde::Deserialize;
use std::io::Cursor;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum PreprocessError {
    #[error("Error decoding image: {0}")]
    Decode(#[from] image::ImageError),
    #[error("Error reading image: {0}")]
    Read(#[from] std::io::Error),
    #[error("Empty image payload")]
    Empty,
}

#[derive(Debug, Deserialize, Clone, Copy, PartialEq, Eq)]
pub struct ImageSize {
    pub width: u32,
    pub height: u32,
}

impl Default for ImageSize {
    fn default() -> Self {
        Self {
            width: 150,
            height: 150,
        }
    }
}

/// Decodes raw upload bytes into the NHWC `[1, height, width, 3]` tensor the
/// classifier was trained on, with channels scaled to `[0, 1]`.
pub fn preprocess_image(image_data: &[u8], size: ImageSize) -> Result<Array<f32, Ix4>, PreprocessError> {
    if image_data.is_empty() {
        return Err(PreprocessError::Empty);
    }

    let original_img = image::ImageReader::new(Cursor::new(image_data))
        .with_guessed_format()?
        .decode()?;

    let img = original_img
        .resize_exact(size.width, size.height, FilterType::CatmullRom)
        .to_rgb8();

    let mut input = Array::zeros((1, size.height as usize, size.width as usize, 3));
    for (x, y, pixel) in img.enumerate_pixels() {
        let [r, g, b] = pixel.0;
        let (x, y) = (x as usize, y as usize);
        input[[0, y, x, 0]] = (r as f32) / 255.;
        input[[0, y, x, 1]] = (g as f32) / 255.;
        input[[0, y, x, 2]] = (b as f32) / 255.;
    }

    Ok(input)
}
