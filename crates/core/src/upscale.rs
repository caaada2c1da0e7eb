//! Super-resolution parameters accepted by the upscale worker.

use serde::{Deserialize, Serialize};

use crate::error::CoreError;

/// Supported scale factors.
pub const UPSCALE_SCALES: [u8; 3] = [2, 3, 4];

pub const DEFAULT_UPSCALE_SCALE: u8 = 2;

/// Real-ESRGAN model names accepted by the binary.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub enum UpscaleModel {
    #[default]
    #[serde(rename = "realesrgan-x4plus")]
    RealEsrganX4Plus,
    #[serde(rename = "realesrgan-x4plus-anime")]
    RealEsrganX4PlusAnime,
    #[serde(rename = "realesr-animevideov3")]
    RealEsrAnimeVideoV3,
}

impl UpscaleModel {
    pub fn as_str(self) -> &'static str {
        match self {
            UpscaleModel::RealEsrganX4Plus => "realesrgan-x4plus",
            UpscaleModel::RealEsrganX4PlusAnime => "realesrgan-x4plus-anime",
            UpscaleModel::RealEsrAnimeVideoV3 => "realesr-animevideov3",
        }
    }

    pub fn parse(value: &str) -> Result<Self, CoreError> {
        match value {
            "realesrgan-x4plus" => Ok(UpscaleModel::RealEsrganX4Plus),
            "realesrgan-x4plus-anime" => Ok(UpscaleModel::RealEsrganX4PlusAnime),
            "realesr-animevideov3" => Ok(UpscaleModel::RealEsrAnimeVideoV3),
            other => Err(CoreError::Validation(format!("Unknown upscale model '{other}'"))),
        }
    }
}

/// Validate a requested scale factor.
pub fn validate_scale(scale: u8) -> Result<u8, CoreError> {
    if UPSCALE_SCALES.contains(&scale) {
        Ok(scale)
    } else {
        Err(CoreError::Validation(format!(
            "Upscale scale must be one of {UPSCALE_SCALES:?} (got {scale})"
        )))
    }
}
