use log::{debug, info, warn};
use rayon::prelude::*;
use serde::{Deserialize, Serialize};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Instant;

use crate::core::classifier::ClassifierConfig;
use crate::core::error::AnalysisError;
use crate::core::frame::{FrameDimensions, LumaFrame};
use crate::core::heatmap::StampMode;

use super::aggregator::{AggregateStatistics, AggregationSession};
use super::contour_source::ContourSource;
use super::frame_analyzer::{FrameAnalysis, FrameAnalyzer};
use super::hotspot::{find_hotspots_with_config, Hotspot, HotspotConfig};
use super::report::{timestamp_now, RenderedReport, ReportConfig, ReportSynthesizer, VideoMetadata};

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct AnalysisConfig {
    pub classifier: ClassifierConfig,
    pub hotspot: HotspotConfig,
    pub report: ReportConfig,
    /// 每隔 N 帧分析一帧
    pub frame_stride: u32,
    /// 分析分辨率
    pub target_width: u32,
    pub target_height: u32,
    pub stamp_mode: StampMode,
    /// 批量分析的线程数
    pub worker_threads: usize,
}

impl Default for AnalysisConfig {
    fn default() -> Self {
        Self {
            classifier: ClassifierConfig::default(),
            hotspot: HotspotConfig::default(),
            report: ReportConfig::default(),
            frame_stride: 3,
            target_width: 1020,
            target_height: 500,
            stamp_mode: StampMode::Outline,
            worker_threads: num_cpus::get(),
        }
    }
}

impl AnalysisConfig {
    pub fn from_json(json: &str) -> Result<Self, AnalysisError> {
        let config: AnalysisConfig = serde_json::from_str(json)?;
        config.validate()?;
        Ok(config)
    }

    pub fn to_json(&self) -> Result<String, AnalysisError> {
        Ok(serde_json::to_string_pretty(self)?)
    }

    pub fn validate(&self) -> Result<(), AnalysisError> {
        self.classifier.validate()?;
        if self.frame_stride == 0 {
            return Err(AnalysisError::InvalidConfig("frame_stride must be >= 1".to_string()));
        }
        if self.target_width == 0 || self.target_height == 0 {
            return Err(AnalysisError::InvalidConfig(format!(
                "target resolution must be non-zero, got {}x{}",
                self.target_width, self.target_height
            )));
        }
        self.hotspot.validate()?;
        Ok(())
    }

    pub fn target_dimensions(&self) -> FrameDimensions {
        FrameDimensions::new(self.target_width, self.target_height)
    }
}

/// 协作式取消标记，可跨线程克隆
#[derive(Debug, Clone, Default)]
pub struct CancellationToken {
    cancelled: Arc<AtomicBool>,
}

impl CancellationToken {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn cancel(&self) {
        self.cancelled.store(true, Ordering::SeqCst);
    }

    pub fn is_cancelled(&self) -> bool {
        self.cancelled.load(Ordering::SeqCst)
    }
}

/// 进度快照
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct ProcessingProgress {
    /// 收到的帧（含跳过的）
    pub frames_seen: u64,
    /// 实际分析的帧
    pub frames_processed: u64,
    pub total_potholes: u64,
    pub elapsed_ms: u64,
}

/// 单帧处理摘要
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct FrameSummary {
    pub frame_number: u64,
    pub detections: usize,
}

/// 一次视频分析的最终产出
#[derive(Debug, Clone)]
pub struct AnalysisOutcome {
    pub statistics: AggregateStatistics,
    pub hotspots: Vec<Hotspot>,
    pub report: RenderedReport,
    pub frames_processed: u64,
    pub cancelled: bool,
    pub processing_time_ms: u64,
}

/// 视频分析驱动：抽帧 → 轮廓 → 帧分析 → 累加；结束时聚类并生成报告
pub struct VideoAnalysisPipeline {
    analyzer: FrameAnalyzer,
    session: AggregationSession,
    config: AnalysisConfig,
    frames_seen: u64,
    started_at: Instant,
    /// 轮廓来源给出的模型标签，覆盖报告配置
    source_label: Option<String>,
    /// 批量分析线程池，首次 `process_batch` 时创建
    pool: Option<rayon::ThreadPool>,
}

impl VideoAnalysisPipeline {
    pub fn new() -> Self {
        Self::with_config(AnalysisConfig::default())
    }

    pub fn with_config(config: AnalysisConfig) -> Self {
        Self {
            analyzer: FrameAnalyzer::with_config(config.classifier.clone(), config.stamp_mode),
            session: AggregationSession::begin(),
            config,
            frames_seen: 0,
            started_at: Instant::now(),
            source_label: None,
            pool: None,
        }
    }

    fn note_source(&mut self, source: &dyn ContourSource) {
        if let Some(label) = source.label() {
            if self.source_label.as_deref() != Some(label) {
                self.source_label = Some(label.to_string());
            }
        }
    }

    fn ensure_pool(&mut self) -> Result<(), AnalysisError> {
        if self.pool.is_none() {
            let pool = rayon::ThreadPoolBuilder::new()
                .num_threads(self.config.worker_threads.max(1))
                .build()
                .map_err(|e| AnalysisError::ThreadPool(e.to_string()))?;
            self.pool = Some(pool);
        }
        Ok(())
    }

    pub fn config(&self) -> &AnalysisConfig {
        &self.config
    }

    fn should_sample(&self, frame_number: u64) -> bool {
        frame_number % self.config.frame_stride as u64 == 0
    }

    fn prepare(&self, frame: &LumaFrame) -> Result<LumaFrame, AnalysisError> {
        frame.resize_to(self.config.target_width, self.config.target_height)
    }

    fn analyze(&self, frame: &LumaFrame, source: &dyn ContourSource) -> Result<FrameAnalysis, AnalysisError> {
        let prepared = self.prepare(frame)?;
        let contours = source.contours(&prepared)?;
        Ok(self.analyzer.analyze_frame(prepared.dimensions(), &contours))
    }

    /// 处理一帧；不在采样步长上的帧返回 Ok(None)
    pub fn process_frame(
        &mut self,
        frame: &LumaFrame,
        source: &dyn ContourSource,
    ) -> Result<Option<FrameSummary>, AnalysisError> {
        self.frames_seen += 1;
        self.note_source(source);
        if !self.should_sample(frame.frame_number) {
            return Ok(None);
        }

        let analysis = self.analyze(frame, source)?;
        let detections = analysis.records.len();
        self.ingest(analysis, frame.frame_number)?;

        debug!("🕳️ Frame {}: {} potholes", frame.frame_number, detections);
        Ok(Some(FrameSummary {
            frame_number: frame.frame_number,
            detections,
        }))
    }

    fn ingest(&mut self, analysis: FrameAnalysis, frame_number: u64) -> Result<(), AnalysisError> {
        self.session.ingest(analysis).map_err(|e| {
            warn!("⚠️ Frame {} rejected: {}", frame_number, e);
            e
        })
    }

    /// 预先分析好的帧结果（轮廓已在外部提取）
    pub fn ingest_analysis(&mut self, analysis: FrameAnalysis) -> Result<usize, AnalysisError> {
        let frame_number = self.frames_seen;
        self.frames_seen += 1;
        let detections = analysis.records.len();
        self.ingest(analysis, frame_number)?;
        Ok(detections)
    }

    pub fn analyzer(&self) -> &FrameAnalyzer {
        &self.analyzer
    }

    /// 批量处理：并行分析，按输入顺序单线程摄入
    ///
    /// 整批要么全部摄入，要么全部拒收：任一帧分析失败或尺寸不符时返回错误，
    /// 会话与 `frames_seen` 保持调用前的状态。
    pub fn process_batch(
        &mut self,
        frames: &[LumaFrame],
        source: &dyn ContourSource,
    ) -> Result<Vec<FrameSummary>, AnalysisError> {
        self.ensure_pool()?;
        let pool = self
            .pool
            .as_ref()
            .ok_or_else(|| AnalysisError::ThreadPool("thread pool unavailable".to_string()))?;

        let sampled: Vec<&LumaFrame> = frames
            .iter()
            .filter(|f| self.should_sample(f.frame_number))
            .collect();

        let this = &*self;
        let results: Vec<Result<(u64, FrameAnalysis), AnalysisError>> = pool.install(|| {
            sampled
                .par_iter()
                .map(|f| this.analyze(f, source).map(|a| (f.frame_number, a)))
                .collect()
        });
        let analyses = results.into_iter().collect::<Result<Vec<_>, _>>()?;

        let expected = if self.session.statistics().heatmap.is_unsized() {
            analyses.first().map(|(_, a)| a.dimensions)
        } else {
            let (width, height) = self.session.statistics().heatmap.dimensions();
            Some(FrameDimensions::new(width, height))
        };
        if let Some(expected) = expected {
            if let Some((frame_number, odd)) = analyses.iter().find(|(_, a)| a.dimensions != expected) {
                warn!("⚠️ Batch rejected at frame {}", frame_number);
                return Err(AnalysisError::DimensionMismatch {
                    expected: (expected.width, expected.height),
                    actual: (odd.dimensions.width, odd.dimensions.height),
                });
            }
        }

        self.frames_seen += frames.len() as u64;
        self.note_source(source);
        let mut summaries = Vec::with_capacity(analyses.len());
        for (frame_number, analysis) in analyses {
            let detections = analysis.records.len();
            self.ingest(analysis, frame_number)?;
            summaries.push(FrameSummary {
                frame_number,
                detections,
            });
        }

        info!(
            "📦 Batch processed: {} frames, {} analyzed",
            frames.len(),
            summaries.len()
        );
        Ok(summaries)
    }

    /// 顺序处理整段视频；每帧之间检查取消标记
    pub fn run<I, F>(
        &mut self,
        frames: I,
        source: &dyn ContourSource,
        token: &CancellationToken,
        mut on_progress: F,
    ) -> Result<bool, AnalysisError>
    where
        I: IntoIterator<Item = LumaFrame>,
        F: FnMut(ProcessingProgress),
    {
        for frame in frames {
            if token.is_cancelled() {
                info!("⏹️ Analysis cancelled after {} frames", self.frames_seen);
                return Ok(true);
            }
            self.process_frame(&frame, source)?;
            on_progress(self.progress());
        }
        Ok(false)
    }

    pub fn progress(&self) -> ProcessingProgress {
        ProcessingProgress {
            frames_seen: self.frames_seen,
            frames_processed: self.session.frames_ingested(),
            total_potholes: self.session.total_potholes() as u64,
            elapsed_ms: self.started_at.elapsed().as_millis() as u64,
        }
    }

    pub fn frames_processed(&self) -> u64 {
        self.session.frames_ingested()
    }

    pub fn statistics(&self) -> &AggregateStatistics {
        self.session.statistics()
    }

    /// 结束分析：热点聚类 + 报告渲染（取消后同样可调用，得到部分结果）
    pub fn finish(
        self,
        video_name: &str,
        duration_seconds: f64,
        cancelled: bool,
    ) -> Result<AnalysisOutcome, AnalysisError> {
        let frames_processed = self.session.frames_ingested();
        let processing_time_ms = self.started_at.elapsed().as_millis() as u64;
        let statistics = self.session.finalize();

        // 按插入顺序聚类
        let hotspots = find_hotspots_with_config(&statistics.records, &self.config.hotspot);

        let metadata = VideoMetadata {
            video_name: video_name.to_string(),
            duration_seconds,
            frames_processed,
            generated_at: timestamp_now(),
        };
        let mut report_config = self.config.report.clone();
        if let Some(label) = self.source_label {
            report_config.model_label = label;
        }
        let report = ReportSynthesizer::with_config(report_config).render(
            &metadata,
            &statistics,
            &hotspots,
        )?;

        if cancelled {
            warn!("⚠️ Report built from partial results ({} frames)", frames_processed);
        }
        info!(
            "✅ Analysis finished: {} frames, {} potholes, {} hotspots, severity {:.1}",
            frames_processed,
            statistics.records.len(),
            hotspots.len(),
            report.severity
        );

        Ok(AnalysisOutcome {
            statistics,
            hotspots,
            report,
            frames_processed,
            cancelled,
            processing_time_ms,
        })
    }
}

impl Default for VideoAnalysisPipeline {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::geometry::Contour;
    use crate::detection::contour_source::{MockContourSource, ThresholdContourSource};

    fn create_test_frame(width: u32, height: u32, frame_number: u64) -> LumaFrame {
        LumaFrame::new(width, height, vec![0u8; (width * height) as usize], frame_number * 33, frame_number)
    }

    fn square(cx: i32, cy: i32, side: i32) -> Contour {
        let h = side / 2;
        Contour::from_tuples(&[
            (cx - h, cy - h),
            (cx + h, cy - h),
            (cx + h, cy + h),
            (cx - h, cy + h),
        ])
    }

    fn small_config() -> AnalysisConfig {
        AnalysisConfig {
            frame_stride: 1,
            target_width: 200,
            target_height: 100,
            worker_threads: 2,
            ..Default::default()
        }
    }

    #[test]
    fn test_default_config() {
        let config = AnalysisConfig::default();
        assert_eq!(config.frame_stride, 3);
        assert_eq!(config.target_dimensions(), FrameDimensions::new(1020, 500));
        assert_eq!(config.classifier.small_area_threshold, 5000.0);
        assert_eq!(config.hotspot.radius_px, 50.0);
        assert!(config.worker_threads >= 1);
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_config_json() {
        let config = AnalysisConfig::from_json(r#"{ "frame_stride": 5, "hotspot": { "radius_px": 30.0 } }"#).unwrap();
        assert_eq!(config.frame_stride, 5);
        assert_eq!(config.hotspot.radius_px, 30.0);
        assert_eq!(config.hotspot.min_records, 3);
        assert_eq!(config.target_width, 1020);

        let json = config.to_json().unwrap();
        assert_eq!(AnalysisConfig::from_json(&json).unwrap(), config);

        assert!(matches!(
            AnalysisConfig::from_json(r#"{ "frame_stride": 0 }"#),
            Err(AnalysisError::InvalidConfig(_))
        ));
        assert!(matches!(AnalysisConfig::from_json("not json"), Err(AnalysisError::Json(_))));
    }

    #[test]
    fn test_frame_stride_sampling() {
        let mut pipeline = VideoAnalysisPipeline::with_config(AnalysisConfig {
            frame_stride: 3,
            ..small_config()
        });
        let source = MockContourSource::with_fixed_contours(vec![square(50, 50, 20)]);

        let mut analyzed = 0;
        for i in 0..10 {
            if pipeline.process_frame(&create_test_frame(200, 100, i), &source).unwrap().is_some() {
                analyzed += 1;
            }
        }
        // frames 0, 3, 6, 9
        assert_eq!(analyzed, 4);
        assert_eq!(pipeline.frames_processed(), 4);
        assert_eq!(pipeline.progress().frames_seen, 10);
        assert_eq!(pipeline.progress().total_potholes, 4);
    }

    #[test]
    fn test_frames_resized_to_target() {
        let mut pipeline = VideoAnalysisPipeline::with_config(small_config());
        let source = MockContourSource::with_fixed_contours(vec![square(50, 50, 20)]);

        pipeline.process_frame(&create_test_frame(400, 200, 0), &source).unwrap();
        assert_eq!(pipeline.statistics().heatmap.dimensions(), (200, 100));
    }

    #[test]
    fn test_full_pipeline_with_hotspot() {
        let mut pipeline = VideoAnalysisPipeline::with_config(small_config());
        // 同一位置连续三帧出现坑洞
        let source = MockContourSource::with_pattern(|n| {
            if n < 3 {
                vec![square(100 + n as i32 * 5, 50, 80)]
            } else {
                Vec::new()
            }
        });

        let frames: Vec<LumaFrame> = (0..6).map(|i| create_test_frame(200, 100, i)).collect();
        let token = CancellationToken::new();
        let mut updates = Vec::new();
        let cancelled = pipeline
            .run(frames, &source, &token, |p| updates.push(p))
            .unwrap();
        assert!(!cancelled);
        assert_eq!(updates.len(), 6);
        assert_eq!(updates.last().unwrap().frames_processed, 6);

        let outcome = pipeline.finish("clip.mp4", 0.2, cancelled).unwrap();
        assert_eq!(outcome.frames_processed, 6);
        assert_eq!(outcome.statistics.records.len(), 3);
        assert_eq!(outcome.hotspots.len(), 1);
        assert_eq!(outcome.hotspots[0].member_count, 3);
        assert_eq!(outcome.report.total_potholes, 3);
        assert!(outcome.report.text.contains("Filename: clip.mp4\n"));
        assert!(outcome.report.text.contains("3 potholes in proximity"));
    }

    #[test]
    fn test_cancellation_yields_partial_results() {
        let mut pipeline = VideoAnalysisPipeline::with_config(small_config());
        let source = MockContourSource::with_fixed_contours(vec![square(50, 50, 20)]);
        let token = CancellationToken::new();

        let frames: Vec<LumaFrame> = (0..10).map(|i| create_test_frame(200, 100, i)).collect();
        let cancel_handle = token.clone();
        let cancelled = pipeline
            .run(frames, &source, &token, |p| {
                if p.frames_processed == 4 {
                    cancel_handle.cancel();
                }
            })
            .unwrap();

        assert!(cancelled);
        let outcome = pipeline.finish("clip.mp4", 1.0, cancelled).unwrap();
        assert!(outcome.cancelled);
        assert_eq!(outcome.frames_processed, 4);
        assert_eq!(outcome.statistics.records.len(), 4);
        assert!(outcome.report.text.contains("Frames analyzed: 4\n"));
    }

    #[test]
    fn test_batch_matches_sequential() {
        let source = MockContourSource::with_pattern(|n| {
            vec![square(20 + (n as i32 % 7) * 20, 50, 10 + n as i32 % 30), square(150, 30, 40)]
        });
        let frames: Vec<LumaFrame> = (0..12).map(|i| create_test_frame(200, 100, i)).collect();

        let mut sequential = VideoAnalysisPipeline::with_config(small_config());
        for f in &frames {
            sequential.process_frame(f, &source).unwrap();
        }
        let mut batched = VideoAnalysisPipeline::with_config(small_config());
        let summaries = batched.process_batch(&frames, &source).unwrap();
        assert_eq!(summaries.len(), 12);
        assert_eq!(summaries[5].frame_number, 5);

        let a = sequential.statistics();
        let b = batched.statistics();
        assert_eq!(a.size_counts, b.size_counts);
        assert_eq!(a.risk_counts, b.risk_counts);
        assert_eq!(a.records, b.records);
        assert_eq!(a.heatmap, b.heatmap);
    }

    struct FailingSource {
        fail_on: u64,
    }

    impl ContourSource for FailingSource {
        fn contours(&self, frame: &LumaFrame) -> Result<Vec<Contour>, AnalysisError> {
            if frame.frame_number == self.fail_on {
                return Err(AnalysisError::InvalidConfig("segmentation failed".to_string()));
            }
            Ok(vec![square(50, 50, 20)])
        }
    }

    #[test]
    fn test_batch_analysis_error_ingests_nothing() {
        let mut pipeline = VideoAnalysisPipeline::with_config(small_config());
        let frames: Vec<LumaFrame> = (0..6).map(|i| create_test_frame(200, 100, i)).collect();

        assert!(pipeline.process_batch(&frames, &FailingSource { fail_on: 3 }).is_err());
        let progress = pipeline.progress();
        assert_eq!(progress.frames_seen, 0);
        assert_eq!(progress.frames_processed, 0);
        assert_eq!(progress.total_potholes, 0);

        // the cached pool is reused by the next batch
        let summaries = pipeline.process_batch(&frames, &FailingSource { fail_on: 99 }).unwrap();
        assert_eq!(summaries.len(), 6);
        assert_eq!(pipeline.progress().frames_seen, 6);
        assert_eq!(pipeline.frames_processed(), 6);
    }

    #[test]
    fn test_batch_dimension_mismatch_ingests_nothing() {
        let mut pipeline = VideoAnalysisPipeline::with_config(small_config());
        let first = pipeline
            .analyzer()
            .analyze_frame(FrameDimensions::new(50, 50), &[square(10, 10, 8)]);
        pipeline.ingest_analysis(first).unwrap();

        let source = MockContourSource::with_fixed_contours(vec![square(50, 50, 20)]);
        let frames: Vec<LumaFrame> = (0..4).map(|i| create_test_frame(200, 100, i)).collect();
        assert!(matches!(
            pipeline.process_batch(&frames, &source),
            Err(AnalysisError::DimensionMismatch { expected: (50, 50), actual: (200, 100) })
        ));
        assert_eq!(pipeline.frames_processed(), 1);
        assert_eq!(pipeline.progress().frames_seen, 1);
        assert_eq!(pipeline.progress().total_potholes, 1);
    }

    #[test]
    fn test_report_names_contour_source() {
        let frames = || (0..3).map(|i| create_test_frame(200, 100, i)).collect::<Vec<_>>();
        let token = CancellationToken::new();

        let mut synthetic = VideoAnalysisPipeline::with_config(small_config());
        synthetic
            .run(frames(), &ThresholdContourSource::new(), &token, |_| {})
            .unwrap();
        let outcome = synthetic.finish("clip.mp4", 1.0, false).unwrap();
        assert!(outcome
            .report
            .text
            .contains("Model used: Synthetic threshold segmentation\n"));

        let mut external = VideoAnalysisPipeline::with_config(small_config());
        external
            .run(frames(), &MockContourSource::new(), &token, |_| {})
            .unwrap();
        let outcome = external.finish("clip.mp4", 1.0, false).unwrap();
        assert!(outcome.report.text.contains("Model used: YOLOv8-seg (best_02.pt)\n"));
    }

    #[test]
    fn test_config_rejects_small_hotspots() {
        assert!(matches!(
            AnalysisConfig::from_json(r#"{ "hotspot": { "min_neighbors": 0 } }"#),
            Err(AnalysisError::InvalidConfig(_))
        ));
    }

    #[test]
    fn test_mismatched_analysis_rejected() {
        let mut pipeline = VideoAnalysisPipeline::with_config(small_config());
        let source = MockContourSource::with_fixed_contours(vec![square(50, 50, 20)]);
        pipeline.process_frame(&create_test_frame(200, 100, 0), &source).unwrap();

        let odd = pipeline
            .analyzer()
            .analyze_frame(FrameDimensions::new(50, 50), &[square(10, 10, 8)]);
        assert!(matches!(
            pipeline.ingest_analysis(odd),
            Err(AnalysisError::DimensionMismatch { .. })
        ));
        assert_eq!(pipeline.frames_processed(), 1);
        assert_eq!(pipeline.progress().total_potholes, 1);
    }

    #[test]
    fn test_empty_video() {
        let pipeline = VideoAnalysisPipeline::with_config(small_config());
        let outcome = pipeline.finish("empty.mp4", 0.0, false).unwrap();
        assert_eq!(outcome.frames_processed, 0);
        assert!(outcome.hotspots.is_empty());
        assert_eq!(outcome.report.severity, 0.0);
        assert!(outcome.report.text.contains("No significant hotspots identified."));
    }
}
