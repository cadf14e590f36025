use image::GrayImage;
use serde::{Deserialize, Serialize};
use std::time::Duration;

use super::error::AnalysisError;

/// 帧尺寸（像素）
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct FrameDimensions {
    pub width: u32,
    pub height: u32,
}

impl FrameDimensions {
    pub const fn new(width: u32, height: u32) -> Self {
        Self { width, height }
    }

    pub fn pixel_count(&self) -> usize {
        self.width as usize * self.height as usize
    }
}

/// 亮度帧（Y 平面），由原生层解码后传入
#[derive(Debug, Clone)]
pub struct LumaFrame {
    pub width: u32,
    pub height: u32,
    pub y_plane: Vec<u8>,
    pub timestamp: Duration,
    pub frame_number: u64,
}

impl LumaFrame {
    pub fn new(width: u32, height: u32, y_plane: Vec<u8>, timestamp_ms: u64, frame_number: u64) -> Self {
        Self {
            width,
            height,
            y_plane,
            timestamp: Duration::from_millis(timestamp_ms),
            frame_number,
        }
    }

    pub fn dimensions(&self) -> FrameDimensions {
        FrameDimensions::new(self.width, self.height)
    }

    pub fn to_gray_image(&self) -> Result<GrayImage, AnalysisError> {
        GrayImage::from_raw(self.width, self.height, self.y_plane.clone()).ok_or_else(|| {
            AnalysisError::DimensionMismatch {
                expected: (self.width, self.height),
                actual: (self.y_plane.len() as u32, 1),
            }
        })
    }

    pub fn resize_to(&self, target_width: u32, target_height: u32) -> Result<LumaFrame, AnalysisError> {
        if self.width == target_width && self.height == target_height {
            return Ok(self.clone());
        }

        let img = self.to_gray_image()?;
        let resized = image::imageops::resize(
            &img,
            target_width,
            target_height,
            image::imageops::FilterType::Triangle,
        );

        Ok(LumaFrame {
            width: target_width,
            height: target_height,
            y_plane: resized.into_raw(),
            timestamp: self.timestamp,
            frame_number: self.frame_number,
        })
    }
}
