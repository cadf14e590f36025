//! 坑洞分析器

use flutter_rust_bridge::frb;
use log::{error, info, warn};
use std::sync::Mutex;

use crate::api::models::analysis::{AnalysisSummary, ContourData, DetectionInfo, FrameDetections};
use crate::core::error::AnalysisError;
use crate::core::frame::{FrameDimensions, LumaFrame};
use crate::core::geometry::Contour;
use crate::detection::{
    AnalysisConfig, AnalysisOutcome, CancellationToken, ContourSource, ProcessingProgress, ReportWriter,
    ThresholdContourSource, VideoAnalysisPipeline,
};

/// 坑洞分析器 - 逐帧累加 + 热点聚类 + 报告
///
/// ```dart
/// final analyzer = PotholeAnalyzer.create();
/// for (final frame in frames) {
///   analyzer.submitFrame(width: w, height: h, contours: frame.contours);
/// }
/// final summary = await analyzer.finish(videoName: name, durationSeconds: d, outputDir: dir);
/// ```
#[frb(opaque)]
pub struct PotholeAnalyzer {
    pipeline: Mutex<Option<VideoAnalysisPipeline>>,
    token: CancellationToken,
    synthetic: ThresholdContourSource,
}

impl PotholeAnalyzer {
    /// 默认配置
    #[frb(sync)]
    pub fn create() -> Self {
        Self::from_config(AnalysisConfig::default())
    }

    /// JSON 配置，缺省字段取默认值
    #[frb(sync)]
    pub fn create_with_config_json(json: String) -> Result<Self, AnalysisError> {
        let config = AnalysisConfig::from_json(&json)?;
        Ok(Self::from_config(config))
    }

    fn from_config(config: AnalysisConfig) -> Self {
        info!(
            "🕳️ PotholeAnalyzer: created (stride={}, target={}x{})",
            config.frame_stride, config.target_width, config.target_height
        );
        Self {
            pipeline: Mutex::new(Some(VideoAnalysisPipeline::with_config(config))),
            token: CancellationToken::new(),
            synthetic: ThresholdContourSource::new(),
        }
    }

    fn check_active(&self) -> Result<(), AnalysisError> {
        if self.token.is_cancelled() {
            return Err(AnalysisError::Cancelled);
        }
        Ok(())
    }

    /// 提交一帧的分割轮廓（由宿主侧模型产出）
    #[frb]
    pub fn submit_frame(
        &self,
        width: u32,
        height: u32,
        contours: Vec<ContourData>,
    ) -> Result<FrameDetections, AnalysisError> {
        self.check_active()?;
        let contours: Vec<Contour> = contours.iter().map(ContourData::to_contour).collect();

        let mut guard = self
            .pipeline
            .lock()
            .map_err(|_| AnalysisError::SessionUnavailable("pipeline lock poisoned".to_string()))?;
        let pipeline = guard
            .as_mut()
            .ok_or_else(|| AnalysisError::SessionUnavailable("analysis already finished".to_string()))?;

        let frame_number = pipeline.progress().frames_seen;
        let analysis = pipeline
            .analyzer()
            .analyze_frame(FrameDimensions::new(width, height), &contours);
        let detections = analysis.records.iter().map(DetectionInfo::from).collect();
        pipeline.ingest_analysis(analysis)?;

        Ok(FrameDetections {
            frame_number,
            detections,
        })
    }

    /// 提交亮度帧，走内置阈值分割（无模型时的降级路径）
    #[frb]
    pub fn submit_luma_frame(
        &self,
        width: u32,
        height: u32,
        y_plane: Vec<u8>,
        timestamp_ms: u64,
        frame_number: u64,
    ) -> Result<u32, AnalysisError> {
        self.check_active()?;
        let frame = LumaFrame::new(width, height, y_plane, timestamp_ms, frame_number);

        let mut guard = self
            .pipeline
            .lock()
            .map_err(|_| AnalysisError::SessionUnavailable("pipeline lock poisoned".to_string()))?;
        let pipeline = guard
            .as_mut()
            .ok_or_else(|| AnalysisError::SessionUnavailable("analysis already finished".to_string()))?;

        let detections = pipeline
            .process_frame(&frame, &self.synthetic as &dyn ContourSource)?
            .map(|s| s.detections as u32)
            .unwrap_or(0);
        Ok(detections)
    }

    /// 请求取消；已提交的帧仍计入最终报告
    #[frb(sync)]
    pub fn cancel(&self) {
        info!("⏹️ PotholeAnalyzer: cancel requested");
        self.token.cancel();
    }

    #[frb(sync, getter)]
    pub fn is_cancelled(&self) -> bool {
        self.token.is_cancelled()
    }

    #[frb(sync, getter)]
    pub fn progress(&self) -> ProcessingProgress {
        match self.pipeline.lock() {
            Ok(guard) => guard.as_ref().map(|p| p.progress()).unwrap_or_default(),
            Err(_) => ProcessingProgress::default(),
        }
    }

    /// 结束分析：生成报告并写入 output_dir
    ///
    /// 落盘失败时 `success = false`，`report_text` 仍然可用。
    #[frb]
    pub fn finish(&self, video_name: String, duration_seconds: f64, output_dir: String) -> AnalysisSummary {
        let pipeline = match self.pipeline.lock() {
            Ok(mut guard) => guard.take(),
            Err(_) => None,
        };
        let Some(pipeline) = pipeline else {
            warn!("⚠️ PotholeAnalyzer: finish called twice");
            return AnalysisSummary {
                error_message: Some("analysis already finished".to_string()),
                ..Default::default()
            };
        };

        match pipeline.finish(&video_name, duration_seconds, self.token.is_cancelled()) {
            Ok(outcome) => Self::persist(outcome, &output_dir),
            Err(e) => {
                error!("❌ Failed to build report: {}", e);
                AnalysisSummary {
                    error_message: Some(e.to_string()),
                    ..Default::default()
                }
            }
        }
    }

    fn persist(outcome: AnalysisOutcome, output_dir: &str) -> AnalysisSummary {
        let mut summary = AnalysisSummary {
            success: false,
            report_path: None,
            heatmap_path: None,
            report_text: outcome.report.text.clone(),
            severity: outcome.report.severity,
            frames_processed: outcome.frames_processed,
            total_potholes: outcome.report.total_potholes as u64,
            hotspot_count: outcome.report.hotspot_count as u32,
            processing_time_ms: outcome.processing_time_ms,
            cancelled: outcome.cancelled,
            error_message: None,
        };

        let writer = ReportWriter::new(output_dir);
        match writer.write_report(&outcome.report) {
            Ok(path) => {
                summary.success = true;
                summary.report_path = Some(path.to_string_lossy().to_string());
            }
            Err(e) => {
                error!("❌ Failed to save report: {}", e);
                summary.error_message = Some(e.to_string());
                return summary;
            }
        }

        // 热力图是附加产物，失败不影响报告
        match writer.write_heatmap(&outcome.statistics.heatmap) {
            Ok(path) => summary.heatmap_path = path.map(|p| p.to_string_lossy().to_string()),
            Err(e) => warn!("⚠️ Failed to save heatmap: {}", e),
        }

        summary
    }
}

impl Drop for PotholeAnalyzer {
    fn drop(&mut self) {
        info!("🗑️ PotholeAnalyzer: released");
    }
}
