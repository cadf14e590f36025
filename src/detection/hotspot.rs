//! 热点聚类：贪心 O(n²)，结果依赖输入顺序（先到先得）

use serde::{Deserialize, Serialize};

use crate::core::error::AnalysisError;
use crate::core::geometry::Centroid;

use super::frame_analyzer::DetectionRecord;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct HotspotConfig {
    /// 邻近半径（像素，严格小于）
    pub radius_px: f64,
    /// 记录数少于该值时不做聚类
    pub min_records: usize,
    /// 成为种子所需的最少邻居数
    pub min_neighbors: usize,
}

impl Default for HotspotConfig {
    fn default() -> Self {
        Self {
            radius_px: 50.0,
            min_records: 3,
            min_neighbors: 2,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Hotspot {
    pub center: Centroid,
    /// 邻居数 + 自身
    pub member_count: usize,
}

impl HotspotConfig {
    /// 成员数 = 邻居数 + 1，`min_neighbors >= 2` 保证每个热点至少 3 个成员
    pub fn validate(&self) -> Result<(), AnalysisError> {
        if !(self.radius_px.is_finite() && self.radius_px > 0.0) {
            return Err(AnalysisError::InvalidConfig(
                "hotspot radius must be positive".to_string(),
            ));
        }
        if self.min_neighbors < 2 {
            return Err(AnalysisError::InvalidConfig(format!(
                "hotspot min_neighbors must be >= 2, got {}",
                self.min_neighbors
            )));
        }
        if self.min_records < 3 {
            return Err(AnalysisError::InvalidConfig(format!(
                "hotspot min_records must be >= 3, got {}",
                self.min_records
            )));
        }
        Ok(())
    }
}

pub fn find_hotspots(records: &[DetectionRecord]) -> Vec<Hotspot> {
    find_hotspots_with_config(records, &HotspotConfig::default())
}

pub fn find_hotspots_with_config(records: &[DetectionRecord], config: &HotspotConfig) -> Vec<Hotspot> {
    let mut hotspots: Vec<Hotspot> = Vec::new();
    if records.len() < config.min_records {
        return hotspots;
    }

    for (i, record) in records.iter().enumerate() {
        let nearby = records
            .iter()
            .enumerate()
            .filter(|(j, other)| *j != i && record.centroid.distance(&other.centroid) < config.radius_px)
            .count();

        if nearby < config.min_neighbors {
            continue;
        }

        let already_covered = hotspots
            .iter()
            .any(|h| record.centroid.distance(&h.center) < config.radius_px);
        if !already_covered {
            hotspots.push(Hotspot {
                center: record.centroid,
                member_count: nearby + 1,
            });
        }
    }

    hotspots
}

/// 按成员数降序（稳定排序，同数保持发现顺序）
pub fn rank_hotspots(hotspots: &[Hotspot]) -> Vec<Hotspot> {
    let mut ranked = hotspots.to_vec();
    ranked.sort_by(|a, b| b.member_count.cmp(&a.member_count));
    ranked
}
