//! 报告与热力图落盘

use log::info;
use std::fs;
use std::path::{Path, PathBuf};

use crate::core::error::AnalysisError;
use crate::core::heatmap::Heatmap;

use super::report::RenderedReport;

const FILE_STAMP_FORMAT: &str = "%Y%m%d_%H%M%S";

pub struct ReportWriter {
    output_dir: PathBuf,
}

impl ReportWriter {
    pub fn new(output_dir: impl AsRef<Path>) -> Self {
        Self {
            output_dir: output_dir.as_ref().to_path_buf(),
        }
    }

    pub fn output_dir(&self) -> &Path {
        &self.output_dir
    }

    fn file_stamp() -> String {
        chrono::Local::now().format(FILE_STAMP_FORMAT).to_string()
    }

    fn ensure_dir(&self) -> Result<(), AnalysisError> {
        if !self.output_dir.exists() {
            fs::create_dir_all(&self.output_dir)?;
        }
        Ok(())
    }

    /// 写入 `pothole_report_<yyyyMMdd_HHmmss>.txt`，返回文件路径
    pub fn write_report(&self, report: &RenderedReport) -> Result<PathBuf, AnalysisError> {
        self.write_report_named(report, &format!("pothole_report_{}.txt", Self::file_stamp()))
    }

    pub fn write_report_named(&self, report: &RenderedReport, file_name: &str) -> Result<PathBuf, AnalysisError> {
        self.ensure_dir()?;
        let path = self.output_dir.join(file_name);
        fs::write(&path, report.text.as_bytes())?;
        info!("📝 Report saved: {}", path.display());
        Ok(path)
    }

    /// 归一化热力图存为 PNG；尚未定尺寸的热力图不写文件
    pub fn write_heatmap(&self, heatmap: &Heatmap) -> Result<Option<PathBuf>, AnalysisError> {
        if heatmap.is_unsized() {
            return Ok(None);
        }
        self.ensure_dir()?;
        let path = self
            .output_dir
            .join(format!("pothole_heatmap_{}.png", Self::file_stamp()));
        heatmap
            .to_gray_image()
            .save_with_format(&path, image::ImageFormat::Png)?;
        info!("🔥 Heatmap saved: {}", path.display());
        Ok(Some(path))
    }
}
