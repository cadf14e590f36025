use serde::{Deserialize, Serialize};

use crate::core::geometry::Contour;
use crate::detection::DetectionRecord;

/// 宿主侧传入的轮廓，坐标交错排列：`[x0, y0, x1, y1, ...]`
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ContourData {
    pub points: Vec<i32>,
}

impl ContourData {
    /// 末尾落单的坐标被忽略
    pub fn to_contour(&self) -> Contour {
        let pairs: Vec<(i32, i32)> = self.points.chunks_exact(2).map(|p| (p[0], p[1])).collect();
        Contour::from_tuples(&pairs)
    }
}

/// 单个检测，供 UI 叠加绘制
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DetectionInfo {
    pub x: f64,
    pub y: f64,
    pub area: f64,
    pub size: String,
    pub risk: String,
}

impl From<&DetectionRecord> for DetectionInfo {
    fn from(record: &DetectionRecord) -> Self {
        Self {
            x: record.centroid.x,
            y: record.centroid.y,
            area: record.area,
            size: record.size.label().to_string(),
            risk: record.risk.label().to_string(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FrameDetections {
    pub frame_number: u64,
    pub detections: Vec<DetectionInfo>,
}

/// 分析结束后返回给宿主的摘要
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct AnalysisSummary {
    pub success: bool,
    pub report_path: Option<String>,
    pub heatmap_path: Option<String>,
    /// 即使落盘失败也会填充
    pub report_text: String,
    pub severity: f64,
    pub frames_processed: u64,
    pub total_potholes: u64,
    pub hotspot_count: u32,
    pub processing_time_ms: u64,
    pub cancelled: bool,
    pub error_message: Option<String>,
}
