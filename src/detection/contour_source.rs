//! 轮廓来源
//!
//! 分析核心只消费轮廓；轮廓来自真实分割模型还是模拟生成器，由实现方决定。
//! 模型句柄由调用方持有并以引用传入，核心不持有任何模型状态。

use imageproc::contours::{find_contours, BorderType};
use imageproc::distance_transform::Norm;

use crate::core::error::AnalysisError;
use crate::core::frame::LumaFrame;
use crate::core::geometry::{self, Contour, Point};

pub const SYNTHETIC_LABEL: &str = "Synthetic threshold segmentation";

pub trait ContourSource: Send + Sync {
    fn contours(&self, frame: &LumaFrame) -> Result<Vec<Contour>, AnalysisError>;

    /// 覆盖报告中的 “Model used”；None 时沿用 `ReportConfig::model_label`
    fn label(&self) -> Option<&str> {
        None
    }
}

/// 模拟分割：亮度阈值 → 形态学闭运算 → 外轮廓 → 面积过滤
///
/// 没有分割模型时的降级方案，输出可复现（不做随机抽样）。
pub struct ThresholdContourSource {
    /// 亮度大于该值视为前景
    luma_threshold: u8,
    /// 闭运算半径（像素）
    close_radius: u8,
    /// 面积开区间 (min, max)
    min_area: f64,
    max_area: f64,
}

impl ThresholdContourSource {
    pub fn new() -> Self {
        Self {
            luma_threshold: 100,
            close_radius: 10,
            min_area: 1000.0,
            max_area: 20000.0,
        }
    }

    pub fn with_params(luma_threshold: u8, close_radius: u8, min_area: f64, max_area: f64) -> Self {
        Self {
            luma_threshold,
            close_radius,
            min_area,
            max_area,
        }
    }
}

impl Default for ThresholdContourSource {
    fn default() -> Self {
        Self::new()
    }
}

impl ContourSource for ThresholdContourSource {
    fn contours(&self, frame: &LumaFrame) -> Result<Vec<Contour>, AnalysisError> {
        let gray = frame.to_gray_image()?;
        let mask = imageproc::contrast::threshold(&gray, self.luma_threshold);
        let mask = if self.close_radius > 0 {
            imageproc::morphology::close(&mask, Norm::LInf, self.close_radius)
        } else {
            mask
        };

        let contours = find_contours::<i32>(&mask)
            .into_iter()
            .filter(|c| c.border_type == BorderType::Outer && c.parent.is_none())
            .map(|c| Contour::new(c.points.iter().map(|p| Point::new(p.x, p.y)).collect()))
            .filter(|c| {
                let area = geometry::contour_area(c);
                area > self.min_area && area < self.max_area
            })
            .collect();

        Ok(contours)
    }

    fn label(&self) -> Option<&str> {
        Some(SYNTHETIC_LABEL)
    }
}

/// 测试用：按帧号返回预设轮廓
pub struct MockContourSource {
    pattern: Option<Box<dyn Fn(u64) -> Vec<Contour> + Send + Sync>>,
}

impl MockContourSource {
    pub fn new() -> Self {
        Self { pattern: None }
    }

    pub fn with_pattern<F>(pattern: F) -> Self
    where
        F: Fn(u64) -> Vec<Contour> + Send + Sync + 'static,
    {
        Self {
            pattern: Some(Box::new(pattern)),
        }
    }

    /// 每一帧都返回同一组轮廓
    pub fn with_fixed_contours(contours: Vec<Contour>) -> Self {
        Self::with_pattern(move |_| contours.clone())
    }
}

impl Default for MockContourSource {
    fn default() -> Self {
        Self::new()
    }
}

impl ContourSource for MockContourSource {
    fn contours(&self, frame: &LumaFrame) -> Result<Vec<Contour>, AnalysisError> {
        Ok(self
            .pattern
            .as_ref()
            .map(|p| p(frame.frame_number))
            .unwrap_or_default())
    }
}
