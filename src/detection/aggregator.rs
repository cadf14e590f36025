//! 全视频统计累加
//!
//! 所有累加都满足交换律/结合律：帧的摄入顺序只影响 `records` 的插入顺序，
//! 报告生成时会重新排序。

use log::debug;
use serde::{Deserialize, Serialize};

use crate::core::classifier::{RiskLevel, SizeCategory};
use crate::core::error::AnalysisError;
use crate::core::heatmap::Heatmap;

use super::frame_analyzer::{DetectionRecord, FrameAnalysis};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct SizeCounts {
    pub small: u64,
    pub medium: u64,
    pub large: u64,
}

impl SizeCounts {
    pub fn get(&self, size: SizeCategory) -> u64 {
        match size {
            SizeCategory::Small => self.small,
            SizeCategory::Medium => self.medium,
            SizeCategory::Large => self.large,
        }
    }

    fn increment(&mut self, size: SizeCategory) {
        match size {
            SizeCategory::Small => self.small += 1,
            SizeCategory::Medium => self.medium += 1,
            SizeCategory::Large => self.large += 1,
        }
    }

    pub fn total(&self) -> u64 {
        self.small + self.medium + self.large
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct RiskCounts {
    pub low: u64,
    pub medium: u64,
    pub high: u64,
}

impl RiskCounts {
    pub fn get(&self, risk: RiskLevel) -> u64 {
        match risk {
            RiskLevel::Low => self.low,
            RiskLevel::Medium => self.medium,
            RiskLevel::High => self.high,
        }
    }

    fn increment(&mut self, risk: RiskLevel) {
        match risk {
            RiskLevel::Low => self.low += 1,
            RiskLevel::Medium => self.medium += 1,
            RiskLevel::High => self.high += 1,
        }
    }

    pub fn total(&self) -> u64 {
        self.low + self.medium + self.high
    }
}

/// 一次视频分析的汇总统计
///
/// 不变式：`size_counts.total() == records.len() == areas.len()`
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct AggregateStatistics {
    pub size_counts: SizeCounts,
    pub risk_counts: RiskCounts,
    pub areas: Vec<f64>,
    pub records: Vec<DetectionRecord>,
    #[serde(skip)]
    pub heatmap: Heatmap,
}

impl AggregateStatistics {
    pub fn total_potholes(&self) -> usize {
        self.records.len()
    }

    /// 平均面积；无记录时为 0
    pub fn average_area(&self) -> f64 {
        if self.areas.is_empty() {
            return 0.0;
        }
        self.areas.iter().sum::<f64>() / self.areas.len() as f64
    }
}

/// 累加会话；单写者，多线程摄入时由调用方加锁
#[derive(Debug, Default)]
pub struct AggregationSession {
    stats: AggregateStatistics,
    frames_ingested: u64,
}

impl AggregationSession {
    pub fn begin() -> Self {
        Self::default()
    }

    /// 摄入一帧结果。热力图尺寸由首帧决定，尺寸不符的帧整帧拒收。
    pub fn ingest(&mut self, frame: FrameAnalysis) -> Result<(), AnalysisError> {
        if self.stats.heatmap.is_unsized() {
            self.stats.heatmap = Heatmap::new(frame.dimensions.width, frame.dimensions.height);
        }
        self.stats.heatmap.accumulate(&frame.heatmap_delta)?;

        for record in frame.records {
            self.stats.size_counts.increment(record.size);
            self.stats.risk_counts.increment(record.risk);
            self.stats.areas.push(record.area);
            self.stats.records.push(record);
        }

        self.frames_ingested += 1;
        debug!(
            "📥 Frame ingested: frames={}, potholes={}",
            self.frames_ingested,
            self.stats.records.len()
        );
        Ok(())
    }

    pub fn frames_ingested(&self) -> u64 {
        self.frames_ingested
    }

    pub fn total_potholes(&self) -> usize {
        self.stats.records.len()
    }

    pub fn statistics(&self) -> &AggregateStatistics {
        &self.stats
    }

    /// 结束会话；中途取消时同样返回已摄入部分的统计
    pub fn finalize(self) -> AggregateStatistics {
        self.stats
    }
}
