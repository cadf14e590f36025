//! 检测热力图：逐像素计数，记录“有多少次检测覆盖了该位置”

use image::{GrayImage, Luma};
use serde::{Deserialize, Serialize};

use super::error::AnalysisError;
use super::geometry::{Contour, Point};

/// 轮廓写入热力图的方式
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub enum StampMode {
    /// 1px 轮廓线
    #[default]
    Outline,
    /// 填充整个区域（含边界）
    Filled,
}

#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct Heatmap {
    width: u32,
    height: u32,
    cells: Vec<u32>,
}

impl Heatmap {
    pub fn new(width: u32, height: u32) -> Self {
        Self {
            width,
            height,
            cells: vec![0; width as usize * height as usize],
        }
    }

    pub fn width(&self) -> u32 {
        self.width
    }

    pub fn height(&self) -> u32 {
        self.height
    }

    pub fn dimensions(&self) -> (u32, u32) {
        (self.width, self.height)
    }

    /// 尚未确定尺寸（0×0）
    pub fn is_unsized(&self) -> bool {
        self.width == 0 && self.height == 0
    }

    pub fn get(&self, x: u32, y: u32) -> Option<u32> {
        if x >= self.width || y >= self.height {
            return None;
        }
        self.cells.get(self.index(x, y)).copied()
    }

    pub fn cells(&self) -> &[u32] {
        &self.cells
    }

    pub fn max_count(&self) -> u32 {
        self.cells.iter().copied().max().unwrap_or(0)
    }

    /// 非零像素个数
    pub fn covered_pixels(&self) -> usize {
        self.cells.iter().filter(|&&c| c > 0).count()
    }

    fn index(&self, x: u32, y: u32) -> usize {
        y as usize * self.width as usize + x as usize
    }

    fn mark(&mut self, x: i64, y: i64) {
        if x < 0 || y < 0 || x >= self.width as i64 || y >= self.height as i64 {
            return;
        }
        let idx = self.index(x as u32, y as u32);
        self.cells[idx] = 1;
    }

    /// 把轮廓印到二值增量图上（重叠区域仍为 1）
    pub fn stamp_contour(&mut self, contour: &Contour, mode: StampMode) {
        if contour.is_empty() {
            return;
        }
        if mode == StampMode::Filled {
            self.fill_polygon(&contour.points);
        }
        self.draw_outline(&contour.points);
    }

    fn draw_outline(&mut self, points: &[Point]) {
        if points.len() == 1 {
            self.mark(points[0].x as i64, points[0].y as i64);
            return;
        }
        for i in 0..points.len() {
            let a = points[i];
            let b = points[(i + 1) % points.len()];
            self.draw_line(a, b);
        }
    }

    fn contains(&self, x: i64, y: i64) -> bool {
        x >= 0 && y >= 0 && x < self.width as i64 && y < self.height as i64
    }

    /// Liang–Barsky clip against the pixel-center rectangle; None when the segment misses it.
    fn clip_segment(&self, a: Point, b: Point) -> Option<((i64, i64), (i64, i64))> {
        let (ax, ay, bx, by) = (a.x as i64, a.y as i64, b.x as i64, b.y as i64);
        if self.contains(ax, ay) && self.contains(bx, by) {
            return Some(((ax, ay), (bx, by)));
        }
        if self.width == 0 || self.height == 0 {
            return None;
        }

        let (x0, y0) = (ax as f64, ay as f64);
        let (dx, dy) = ((bx - ax) as f64, (by - ay) as f64);
        let (max_x, max_y) = ((self.width - 1) as f64, (self.height - 1) as f64);
        let mut t0 = 0.0f64;
        let mut t1 = 1.0f64;
        for (p, q) in [(-dx, x0), (dx, max_x - x0), (-dy, y0), (dy, max_y - y0)] {
            if p == 0.0 {
                if q < 0.0 {
                    return None;
                }
                continue;
            }
            let r = q / p;
            if p < 0.0 {
                t0 = t0.max(r);
            } else {
                t1 = t1.min(r);
            }
            if t0 > t1 {
                return None;
            }
        }

        let clamp = |v: f64, max: f64| v.round().clamp(0.0, max) as i64;
        Some((
            (clamp(x0 + t0 * dx, max_x), clamp(y0 + t0 * dy, max_y)),
            (clamp(x0 + t1 * dx, max_x), clamp(y0 + t1 * dy, max_y)),
        ))
    }

    // Bresenham over the clipped segment
    fn draw_line(&mut self, a: Point, b: Point) {
        let Some(((mut x0, mut y0), (x1, y1))) = self.clip_segment(a, b) else {
            return;
        };
        let dx = (x1 - x0).abs();
        let dy = -(y1 - y0).abs();
        let sx = if x0 < x1 { 1 } else { -1 };
        let sy = if y0 < y1 { 1 } else { -1 };
        let mut err = dx + dy;

        loop {
            self.mark(x0, y0);
            if x0 == x1 && y0 == y1 {
                break;
            }
            let e2 = 2 * err;
            if e2 >= dy {
                err += dy;
                x0 += sx;
            }
            if e2 <= dx {
                err += dx;
                y0 += sy;
            }
        }
    }

    /// Even-odd scanline fill sampled at integer rows.
    fn fill_polygon(&mut self, points: &[Point]) {
        if points.len() < 3 || self.height == 0 {
            return;
        }
        let min_y = points.iter().map(|p| p.y).min().unwrap_or(0).max(0) as i64;
        let max_y = (points.iter().map(|p| p.y).max().unwrap_or(0) as i64).min(self.height as i64 - 1);

        let max_x = self.width as i64 - 1;
        let mut crossings: Vec<f64> = Vec::new();
        for y in min_y..=max_y {
            crossings.clear();
            for i in 0..points.len() {
                let a = points[i];
                let b = points[(i + 1) % points.len()];
                let (ay, by) = (a.y as i64, b.y as i64);
                if ay == by {
                    continue;
                }
                let (lo, hi) = if ay < by { (ay, by) } else { (by, ay) };
                if y < lo || y >= hi {
                    continue;
                }
                let t = (y - ay) as f64 / (by - ay) as f64;
                crossings.push(a.x as f64 + t * (b.x as f64 - a.x as f64));
            }
            crossings.sort_by(|a, b| a.total_cmp(b));

            for pair in crossings.chunks_exact(2) {
                let start = (pair[0].ceil() as i64).max(0);
                let end = (pair[1].floor() as i64).min(max_x);
                for x in start..=end {
                    self.mark(x, y);
                }
            }
        }
    }

    /// 逐元素相加；尺寸必须一致
    pub fn accumulate(&mut self, delta: &Heatmap) -> Result<(), AnalysisError> {
        if self.dimensions() != delta.dimensions() {
            return Err(AnalysisError::DimensionMismatch {
                expected: self.dimensions(),
                actual: delta.dimensions(),
            });
        }
        for (cell, add) in self.cells.iter_mut().zip(delta.cells.iter()) {
            *cell += *add;
        }
        Ok(())
    }

    /// 归一化到 0..=255 的灰度图，最大计数映射为 255
    pub fn to_gray_image(&self) -> GrayImage {
        let max = self.max_count();
        let mut img = GrayImage::new(self.width, self.height);
        if max == 0 {
            return img;
        }
        for (x, y, pixel) in img.enumerate_pixels_mut() {
            let count = self.cells[y as usize * self.width as usize + x as usize] as u64;
            *pixel = Luma([(count * 255 / max as u64) as u8]);
        }
        img
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn rect(x0: i32, y0: i32, x1: i32, y1: i32) -> Contour {
        Contour::from_tuples(&[(x0, y0), (x1, y0), (x1, y1), (x0, y1)])
    }

    #[test]
    fn test_outline_stamp() {
        let mut heatmap = Heatmap::new(20, 20);
        heatmap.stamp_contour(&rect(2, 2, 6, 6), StampMode::Outline);

        assert_eq!(heatmap.get(2, 2), Some(1));
        assert_eq!(heatmap.get(6, 4), Some(1));
        assert_eq!(heatmap.get(4, 4), Some(0));
        // 5x5 square perimeter
        assert_eq!(heatmap.covered_pixels(), 16);
    }

    #[test]
    fn test_filled_stamp() {
        let mut heatmap = Heatmap::new(20, 20);
        heatmap.stamp_contour(&rect(2, 2, 6, 6), StampMode::Filled);

        assert_eq!(heatmap.get(4, 4), Some(1));
        assert_eq!(heatmap.covered_pixels(), 25);
        assert_eq!(heatmap.max_count(), 1);
    }

    #[test]
    fn test_stamp_is_clipped() {
        let mut heatmap = Heatmap::new(10, 10);
        heatmap.stamp_contour(&rect(-5, -5, 4, 4), StampMode::Filled);
        assert_eq!(heatmap.covered_pixels(), 25);
        assert_eq!(heatmap.get(10, 0), None);
    }

    #[test]
    fn test_far_off_frame_contour_is_cheap() {
        let started = std::time::Instant::now();

        let mut filled = Heatmap::new(10, 10);
        filled.stamp_contour(&rect(-400_000_000, 0, 400_000_000, 5), StampMode::Filled);
        assert_eq!(filled.covered_pixels(), 60);

        let mut outline = Heatmap::new(10, 10);
        outline.stamp_contour(&rect(i32::MIN, i32::MIN, i32::MAX, i32::MAX), StampMode::Outline);
        assert_eq!(outline.covered_pixels(), 0);

        let mut diagonal = Heatmap::new(10, 10);
        diagonal.stamp_contour(
            &Contour::from_tuples(&[(-1_000_000_000, -1_000_000_000), (1_000_000_000, 1_000_000_000)]),
            StampMode::Outline,
        );
        assert_eq!(diagonal.get(0, 0), Some(1));
        assert_eq!(diagonal.get(9, 9), Some(1));
        assert_eq!(diagonal.get(9, 0), Some(0));

        assert!(started.elapsed() < std::time::Duration::from_secs(2));
    }

    #[test]
    fn test_overlapping_stamps_stay_binary() {
        let mut delta = Heatmap::new(10, 10);
        delta.stamp_contour(&rect(1, 1, 5, 5), StampMode::Filled);
        delta.stamp_contour(&rect(3, 3, 8, 8), StampMode::Filled);
        assert_eq!(delta.max_count(), 1);
    }

    #[test]
    fn test_accumulate() {
        let mut total = Heatmap::new(10, 10);
        let mut delta = Heatmap::new(10, 10);
        delta.stamp_contour(&rect(1, 1, 3, 3), StampMode::Filled);

        total.accumulate(&delta).unwrap();
        total.accumulate(&delta).unwrap();
        assert_eq!(total.get(2, 2), Some(2));
        assert_eq!(total.get(9, 9), Some(0));

        let wrong = Heatmap::new(5, 5);
        assert!(matches!(
            total.accumulate(&wrong),
            Err(AnalysisError::DimensionMismatch { expected: (10, 10), actual: (5, 5) })
        ));
    }

    #[test]
    fn test_gray_image_normalized() {
        let mut total = Heatmap::new(4, 4);
        let mut delta = Heatmap::new(4, 4);
        delta.stamp_contour(&Contour::from_tuples(&[(1, 1)]), StampMode::Outline);
        total.accumulate(&delta).unwrap();
        total.accumulate(&delta).unwrap();

        let img = total.to_gray_image();
        assert_eq!(img.get_pixel(1, 1)[0], 255);
        assert_eq!(img.get_pixel(0, 0)[0], 0);

        let blank = Heatmap::new(3, 3).to_gray_image();
        assert!(blank.pixels().all(|p| p[0] == 0));
    }
}
