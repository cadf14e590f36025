//! 坑洞分级：面积 → 尺寸类别，尺寸 + 纵向位置 → 风险等级

use serde::{Deserialize, Serialize};
use std::fmt;

use super::error::AnalysisError;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub enum SizeCategory {
    Small,
    Medium,
    Large,
}

impl SizeCategory {
    pub const ALL: [SizeCategory; 3] = [SizeCategory::Small, SizeCategory::Medium, SizeCategory::Large];

    /// 尺寸带来的基础风险分
    pub fn base_risk(self) -> f64 {
        match self {
            SizeCategory::Small => 0.0,
            SizeCategory::Medium => 1.0,
            SizeCategory::Large => 2.0,
        }
    }

    pub fn label(self) -> &'static str {
        match self {
            SizeCategory::Small => "Small",
            SizeCategory::Medium => "Medium",
            SizeCategory::Large => "Large",
        }
    }
}

impl fmt::Display for SizeCategory {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.label())
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub enum RiskLevel {
    Low,
    Medium,
    High,
}

impl RiskLevel {
    pub const ALL: [RiskLevel; 3] = [RiskLevel::Low, RiskLevel::Medium, RiskLevel::High];

    /// 排序用：High=2, Medium=1, Low=0
    pub fn rank(self) -> u8 {
        match self {
            RiskLevel::Low => 0,
            RiskLevel::Medium => 1,
            RiskLevel::High => 2,
        }
    }

    pub fn label(self) -> &'static str {
        match self {
            RiskLevel::Low => "Low",
            RiskLevel::Medium => "Medium",
            RiskLevel::High => "High",
        }
    }

    fn from_adjusted(risk_adjusted: f64) -> Self {
        if risk_adjusted >= 2.0 {
            RiskLevel::High
        } else if risk_adjusted >= 1.0 {
            RiskLevel::Medium
        } else {
            RiskLevel::Low
        }
    }
}

impl fmt::Display for RiskLevel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.label())
    }
}

/// 面积阈值（像素²）
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ClassifierConfig {
    /// 小于该值为 Small
    pub small_area_threshold: f64,
    /// 大于该值为 Large
    pub large_area_threshold: f64,
}

impl Default for ClassifierConfig {
    fn default() -> Self {
        Self {
            small_area_threshold: 5000.0,
            large_area_threshold: 15000.0,
        }
    }
}

impl ClassifierConfig {
    pub fn validate(&self) -> Result<(), AnalysisError> {
        if !self.small_area_threshold.is_finite() || !self.large_area_threshold.is_finite() {
            return Err(AnalysisError::InvalidConfig(
                "area thresholds must be finite".to_string(),
            ));
        }
        if self.small_area_threshold > self.large_area_threshold {
            return Err(AnalysisError::InvalidConfig(format!(
                "small_area_threshold ({}) exceeds large_area_threshold ({})",
                self.small_area_threshold, self.large_area_threshold
            )));
        }
        Ok(())
    }
}

#[derive(Debug, Clone, Default)]
pub struct DefectClassifier {
    config: ClassifierConfig,
}

impl DefectClassifier {
    pub fn new() -> Self {
        Self::with_config(ClassifierConfig::default())
    }

    pub fn with_config(config: ClassifierConfig) -> Self {
        Self { config }
    }

    pub fn config(&self) -> &ClassifierConfig {
        &self.config
    }

    pub fn size_category(&self, area: f64) -> SizeCategory {
        if area < self.config.small_area_threshold {
            SizeCategory::Small
        } else if area > self.config.large_area_threshold {
            SizeCategory::Large
        } else {
            SizeCategory::Medium
        }
    }

    pub fn classify(&self, area: f64, centroid_y: f64, frame_height: f64) -> (SizeCategory, RiskLevel) {
        let size = self.size_category(area);
        let risk_adjusted = size.base_risk() + center_factor(centroid_y, frame_height);
        (size, RiskLevel::from_adjusted(risk_adjusted))
    }
}

/// 1.0 在画面纵向中线，0.0 在上下边缘；画面外的质心夹到 [0, 1]
pub fn center_factor(centroid_y: f64, frame_height: f64) -> f64 {
    let road_center = frame_height / 2.0;
    if road_center <= 0.0 {
        return 0.0;
    }
    (1.0 - (centroid_y - road_center).abs() / road_center).clamp(0.0, 1.0)
}
