use serde::{Deserialize, Serialize};

use crate::core::classifier::{ClassifierConfig, DefectClassifier, RiskLevel, SizeCategory};
use crate::core::frame::FrameDimensions;
use crate::core::geometry::{self, Centroid, Contour};
use crate::core::heatmap::{Heatmap, StampMode};

/// 单个坑洞检测记录，创建后不再修改
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DetectionRecord {
    pub centroid: Centroid,
    pub area: f64,
    pub size: SizeCategory,
    pub risk: RiskLevel,
}

/// 单帧分析结果
#[derive(Debug, Clone)]
pub struct FrameAnalysis {
    pub dimensions: FrameDimensions,
    pub records: Vec<DetectionRecord>,
    pub heatmap_delta: Heatmap,
}

impl FrameAnalysis {
    pub fn count_size(&self, size: SizeCategory) -> usize {
        self.records.iter().filter(|r| r.size == size).count()
    }

    pub fn count_risk(&self, risk: RiskLevel) -> usize {
        self.records.iter().filter(|r| r.risk == risk).count()
    }
}

/// 帧分析器：轮廓集合 → 检测记录 + 热力图增量
///
/// 无状态，可跨线程共享；轮廓来源（分割模型或模拟生成）对它透明。
#[derive(Debug, Clone, Default)]
pub struct FrameAnalyzer {
    classifier: DefectClassifier,
    stamp_mode: StampMode,
}

impl FrameAnalyzer {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_config(classifier: ClassifierConfig, stamp_mode: StampMode) -> Self {
        Self {
            classifier: DefectClassifier::with_config(classifier),
            stamp_mode,
        }
    }

    pub fn classifier(&self) -> &DefectClassifier {
        &self.classifier
    }

    pub fn analyze_frame(&self, dimensions: FrameDimensions, contours: &[Contour]) -> FrameAnalysis {
        let mut records = Vec::with_capacity(contours.len());
        let mut heatmap_delta = Heatmap::new(dimensions.width, dimensions.height);
        let frame_height = dimensions.height as f64;

        for contour in contours {
            let area = geometry::contour_area(contour);
            if area <= 0.0 {
                continue;
            }

            let centroid = geometry::centroid(contour);
            let (size, risk) = self.classifier.classify(area, centroid.y, frame_height);

            records.push(DetectionRecord {
                centroid,
                area,
                size,
                risk,
            });
            heatmap_delta.stamp_contour(contour, self.stamp_mode);
        }

        FrameAnalysis {
            dimensions,
            records,
            heatmap_delta,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const DIMS: FrameDimensions = FrameDimensions::new(1020, 500);

    fn square(cx: i32, cy: i32, side: i32) -> Contour {
        let h = side / 2;
        Contour::from_tuples(&[
            (cx - h, cy - h),
            (cx + h, cy - h),
            (cx + h, cy + h),
            (cx - h, cy + h),
        ])
    }

    #[test]
    fn test_analyze_classifies_each_contour() {
        let analyzer = FrameAnalyzer::new();
        let contours = vec![
            square(100, 250, 50),  // 2500 px², centered → Small / Medium
            square(500, 250, 100), // 10000 px², centered → Medium / High
            square(900, 10, 140),  // 19600 px², near top → Large / High
        ];

        let result = analyzer.analyze_frame(DIMS, &contours);
        assert_eq!(result.records.len(), 3);

        assert_eq!(result.records[0].size, SizeCategory::Small);
        assert_eq!(result.records[0].risk, RiskLevel::Medium);
        assert_eq!(result.records[1].size, SizeCategory::Medium);
        assert_eq!(result.records[1].risk, RiskLevel::High);
        assert_eq!(result.records[2].size, SizeCategory::Large);
        assert_eq!(result.records[2].risk, RiskLevel::High);

        assert_eq!(result.records[1].area, 10_000.0);
        assert_eq!(result.records[1].centroid, Centroid::new(500.0, 250.0));
        assert_eq!(result.count_size(SizeCategory::Small), 1);
        assert_eq!(result.count_risk(RiskLevel::High), 2);
    }

    #[test]
    fn test_zero_area_contours_discarded() {
        let analyzer = FrameAnalyzer::new();
        let contours = vec![
            Contour::from_tuples(&[(0, 0), (10, 10), (20, 20)]),
            Contour::from_tuples(&[(5, 5)]),
            Contour::default(),
        ];

        let result = analyzer.analyze_frame(DIMS, &contours);
        assert!(result.records.is_empty());
        assert_eq!(result.heatmap_delta.covered_pixels(), 0);
        assert_eq!(result.heatmap_delta.dimensions(), (1020, 500));
    }

    #[test]
    fn test_heatmap_delta_matches_frame() {
        let analyzer = FrameAnalyzer::with_config(ClassifierConfig::default(), StampMode::Filled);
        let result = analyzer.analyze_frame(DIMS, &[square(50, 50, 10)]);

        assert_eq!(result.heatmap_delta.get(50, 50), Some(1));
        assert_eq!(result.heatmap_delta.covered_pixels(), 121);
        assert_eq!(result.heatmap_delta.max_count(), 1);
    }

    #[test]
    fn test_empty_frame() {
        let analyzer = FrameAnalyzer::new();
        let result = analyzer.analyze_frame(DIMS, &[]);
        assert!(result.records.is_empty());
    }
}
