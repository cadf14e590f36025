//! 分析报告生成
//!
//! 报告是固定结构的纯文本，章节顺序是兼容性约定；
//! 时间戳由调用方注入，相同输入总是得到逐字节相同的文本。

use once_cell::sync::Lazy;
use regex::Regex;
use serde::{Deserialize, Serialize};
use std::fmt::Write;

use crate::core::classifier::{RiskLevel, SizeCategory};
use crate::core::error::AnalysisError;

use super::aggregator::{AggregateStatistics, RiskCounts, SizeCounts};
use super::frame_analyzer::DetectionRecord;
use super::hotspot::{rank_hotspots, Hotspot};

const RULE_WIDTH: usize = 80;
const TIMESTAMP_FORMAT: &str = "%Y-%m-%d %H:%M:%S";

static SIZE_LINE: Lazy<Result<Regex, regex::Error>> =
    Lazy::new(|| Regex::new(r"(?m)^  - (Small|Medium|Large): (\d+)$"));
static RISK_LINE: Lazy<Result<Regex, regex::Error>> =
    Lazy::new(|| Regex::new(r"(?m)^  - (Low|Medium|High) risk: (\d+)$"));

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ReportConfig {
    /// “Model used” 一栏的标签
    pub model_label: String,
    /// 热点章节最多列出的条数
    pub max_listed_hotspots: usize,
}

impl Default for ReportConfig {
    fn default() -> Self {
        Self {
            model_label: "YOLOv8-seg (best_02.pt)".to_string(),
            max_listed_hotspots: 5,
        }
    }
}

/// 视频元信息
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct VideoMetadata {
    pub video_name: String,
    pub duration_seconds: f64,
    pub frames_processed: u64,
    /// “Generated on” 时间戳，见 [`timestamp_now`]
    pub generated_at: String,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum RecommendationTier {
    Urgent,
    Moderate,
    Minor,
}

impl RecommendationTier {
    pub fn from_severity(severity: f64) -> Self {
        if severity >= 7.0 {
            RecommendationTier::Urgent
        } else if severity >= 4.0 {
            RecommendationTier::Moderate
        } else {
            RecommendationTier::Minor
        }
    }

    pub fn lines(self) -> &'static [&'static str] {
        match self {
            RecommendationTier::Urgent => &[
                "URGENT ATTENTION REQUIRED: The analyzed road section shows significant pothole damage that requires immediate repair.",
                "- Prioritize the identified hotspot areas for immediate patching.",
                "- Consider complete resurfacing for long-term solution.",
                "- Place warning signs for drivers about dangerous road conditions.",
            ],
            RecommendationTier::Moderate => &[
                "MODERATE ATTENTION NEEDED: The analyzed road section shows moderate pothole damage that should be addressed soon.",
                "- Schedule repairs for high-risk potholes within the next maintenance cycle.",
                "- Monitor the identified hotspots for further deterioration.",
            ],
            RecommendationTier::Minor => &[
                "MINOR ATTENTION SUGGESTED: The analyzed road section shows minimal pothole damage.",
                "- Address the few identified potholes during regular maintenance cycles.",
                "- Re-analyze the road after adverse weather conditions to monitor degradation.",
            ],
        }
    }
}

/// 渲染结果：报告文本 + 下游 UI 需要的数值
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RenderedReport {
    pub text: String,
    pub severity: f64,
    pub average_area: f64,
    pub total_potholes: usize,
    pub hotspot_count: usize,
    pub tier: RecommendationTier,
}

/// 严重度评分 0-10：(中风险×0.5 + 高风险×1.0) / 帧数 × 10，上限 10
pub fn severity_rating(risk_counts: &RiskCounts, frames_processed: u64) -> f64 {
    let weighted = risk_counts.medium as f64 * 0.5 + risk_counts.high as f64;
    (weighted / frames_processed.max(1) as f64 * 10.0).min(10.0)
}

/// 本地时间，格式 `yyyy-MM-dd HH:mm:ss`
pub fn timestamp_now() -> String {
    chrono::Local::now().format(TIMESTAMP_FORMAT).to_string()
}

/// Fixed-point formatting, rounding half away from zero.
fn fixed(value: f64, decimals: usize) -> String {
    let scale = 10f64.powi(decimals as i32);
    format!("{:.*}", decimals, (value * scale).round() / scale)
}

/// 风险降序，同级保持原插入顺序
pub fn sort_by_risk(records: &[DetectionRecord]) -> Vec<&DetectionRecord> {
    let mut sorted: Vec<&DetectionRecord> = records.iter().collect();
    sorted.sort_by(|a, b| b.risk.rank().cmp(&a.risk.rank()));
    sorted
}

#[derive(Debug, Clone, Default)]
pub struct ReportSynthesizer {
    config: ReportConfig,
}

impl ReportSynthesizer {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_config(config: ReportConfig) -> Self {
        Self { config }
    }

    pub fn render(
        &self,
        metadata: &VideoMetadata,
        stats: &AggregateStatistics,
        hotspots: &[Hotspot],
    ) -> Result<RenderedReport, AnalysisError> {
        let severity = severity_rating(&stats.risk_counts, metadata.frames_processed);
        let average_area = stats.average_area();
        let tier = RecommendationTier::from_severity(severity);

        let text = self.write_report(metadata, stats, hotspots, severity, average_area, tier)?;

        Ok(RenderedReport {
            text,
            severity,
            average_area,
            total_potholes: stats.records.len(),
            hotspot_count: hotspots.len(),
            tier,
        })
    }

    #[allow(clippy::too_many_arguments)]
    fn write_report(
        &self,
        metadata: &VideoMetadata,
        stats: &AggregateStatistics,
        hotspots: &[Hotspot],
        severity: f64,
        average_area: f64,
        tier: RecommendationTier,
    ) -> Result<String, std::fmt::Error> {
        let mut text = String::with_capacity(4096 + stats.records.len() * 160);
        let out = &mut text;
        let heavy = "=".repeat(RULE_WIDTH);
        let light = "-".repeat(RULE_WIDTH);

        writeln!(out, "{heavy}")?;
        writeln!(out, "POTHOLE DETECTION ANALYSIS REPORT")?;
        writeln!(out, "Generated on: {}", metadata.generated_at)?;
        writeln!(out, "{heavy}")?;
        writeln!(out)?;

        writeln!(out, "VIDEO INFORMATION")?;
        writeln!(out, "{light}")?;
        writeln!(out, "Filename: {}", metadata.video_name)?;
        writeln!(out, "Duration: {} seconds", fixed(metadata.duration_seconds, 2))?;
        writeln!(out, "Frames analyzed: {}", metadata.frames_processed)?;
        writeln!(out, "Model used: {}", self.config.model_label)?;
        writeln!(out)?;

        writeln!(out, "SUMMARY STATISTICS")?;
        writeln!(out, "{light}")?;
        writeln!(out, "Total unique potholes detected: {}", stats.records.len())?;
        writeln!(out, "Pothole size distribution:")?;
        for size in SizeCategory::ALL {
            writeln!(out, "  - {}: {}", size, stats.size_counts.get(size))?;
        }
        writeln!(out)?;
        writeln!(out, "Risk level distribution:")?;
        for risk in RiskLevel::ALL {
            writeln!(out, "  - {} risk: {}", risk, stats.risk_counts.get(risk))?;
        }
        writeln!(out)?;
        writeln!(out, "Average pothole area: {} square pixels", fixed(average_area, 2))?;
        writeln!(
            out,
            "Overall road condition severity rating (0-10): {}",
            fixed(severity, 1)
        )?;
        writeln!(out)?;

        writeln!(out, "HOTSPOT ANALYSIS")?;
        writeln!(out, "{light}")?;
        if hotspots.is_empty() {
            writeln!(out, "No significant hotspots identified.")?;
        } else {
            writeln!(
                out,
                "Identified {} hotspot areas with multiple potholes:",
                hotspots.len()
            )?;
            let ranked = rank_hotspots(hotspots);
            for (i, hotspot) in ranked.iter().take(self.config.max_listed_hotspots).enumerate() {
                writeln!(
                    out,
                    "  {}. Location: x={}, y={} - {} potholes in proximity",
                    i + 1,
                    fixed(hotspot.center.x, 0),
                    fixed(hotspot.center.y, 0),
                    hotspot.member_count
                )?;
            }
        }
        writeln!(out)?;

        writeln!(out, "DETAILED POTHOLE INFORMATION")?;
        writeln!(out, "{light}")?;
        for (i, record) in sort_by_risk(&stats.records).into_iter().enumerate() {
            writeln!(out, "Pothole #{}:", i + 1)?;
            writeln!(out, "  - Size category: {}", record.size)?;
            writeln!(out, "  - Area: {} square pixels", fixed(record.area, 2))?;
            writeln!(out, "  - Risk level: {}", record.risk)?;
            writeln!(
                out,
                "  - Position: x={}, y={}",
                fixed(record.centroid.x, 0),
                fixed(record.centroid.y, 0)
            )?;
            writeln!(out)?;
        }

        writeln!(out, "RECOMMENDATIONS")?;
        writeln!(out, "{light}")?;
        for line in tier.lines() {
            writeln!(out, "{line}")?;
        }

        Ok(text)
    }
}

fn capture_count(caps: &regex::Captures<'_>) -> Option<u64> {
    caps.get(2)?.as_str().parse().ok()
}

/// 从报告文本解析尺寸分布；三项缺一返回 None
pub fn parse_size_distribution(text: &str) -> Option<SizeCounts> {
    let (mut small, mut medium, mut large) = (None, None, None);
    for caps in SIZE_LINE.as_ref().ok()?.captures_iter(text) {
        let count = capture_count(&caps)?;
        match caps.get(1)?.as_str() {
            "Small" => small = Some(count),
            "Medium" => medium = Some(count),
            "Large" => large = Some(count),
            _ => {}
        }
    }
    Some(SizeCounts {
        small: small?,
        medium: medium?,
        large: large?,
    })
}

/// 从报告文本解析风险分布
pub fn parse_risk_distribution(text: &str) -> Option<RiskCounts> {
    let (mut low, mut medium, mut high) = (None, None, None);
    for caps in RISK_LINE.as_ref().ok()?.captures_iter(text) {
        let count = capture_count(&caps)?;
        match caps.get(1)?.as_str() {
            "Low" => low = Some(count),
            "Medium" => medium = Some(count),
            "High" => high = Some(count),
            _ => {}
        }
    }
    Some(RiskCounts {
        low: low?,
        medium: medium?,
        high: high?,
    })
}
