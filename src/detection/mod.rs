pub mod aggregator;
pub mod contour_source;
pub mod frame_analyzer;
pub mod hotspot;
pub mod persistence;
pub mod pipeline;
pub mod report;

pub use aggregator::{AggregateStatistics, AggregationSession, RiskCounts, SizeCounts};
pub use contour_source::{ContourSource, MockContourSource, ThresholdContourSource};
pub use frame_analyzer::{DetectionRecord, FrameAnalysis, FrameAnalyzer};
pub use hotspot::{find_hotspots, find_hotspots_with_config, rank_hotspots, Hotspot, HotspotConfig};
pub use persistence::ReportWriter;
pub use pipeline::{
    AnalysisConfig, AnalysisOutcome, CancellationToken, FrameSummary, ProcessingProgress, VideoAnalysisPipeline,
};
pub use report::{
    parse_risk_distribution, parse_size_distribution, severity_rating, RecommendationTier, RenderedReport,
    ReportConfig, ReportSynthesizer, VideoMetadata,
};
