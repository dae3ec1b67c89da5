use crate::preprocess::ImageSize;
use serde::Deserialize;
use std::path::PathBuf;

#[derive(Debug, Deserialize, Clone)]
pub struct ModelConfig {
    pub model_dir: PathBuf,
    pub onnx_file: String,
    #[serde(default = "default_model_instances")]
    pub num_instances: usize,
    #[serde(default = "default_image_side")]
    pub image_width: u32,
    #[serde(default = "default_image_side")]
    pub image_height: u32,
}

fn default_model_instances() -> usize {
    std::thread::available_parallelism()
        .map(|n| n.get())
        .unwrap_or(2)
}

fn default_image_side() -> u32 {
    150
}

impl ModelConfig {
    pub fn get_path(&self) -> PathBuf {
        self.model_dir.join(&self.onnx_file)
    }

    pub fn image_size(&self) -> ImageSize {
        ImageSize {
            width: self.image_width,
            height: self.image_height,
        }
    }

    pub fn validate(&self) -> Result<(), String> {
        if !self.get_path().exists() {
            return Err(format!("Model file not found: {:?}", self.get_path()));
        }
        if self.image_width == 0 || self.image_height == 0 {
            return Err("Image dimensions must be non-zero".to_string());
        }
        Ok(())
    }
}
