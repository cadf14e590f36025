//! 轮廓几何工具：面积、质心、外接矩形
//!
//! 顶点是整数像素坐标（与分割掩码的轮廓输出一致），
//! 所有矩量都用 i64 精确累加，退化判断不依赖浮点误差。

use serde::{Deserialize, Serialize};

/// 像素坐标点
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Point {
    pub x: i32,
    pub y: i32,
}

impl Point {
    pub const fn new(x: i32, y: i32) -> Self {
        Self { x, y }
    }
}

impl From<(i32, i32)> for Point {
    fn from((x, y): (i32, i32)) -> Self {
        Self { x, y }
    }
}

/// 亚像素坐标（质心、热点中心）
#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize)]
pub struct Centroid {
    pub x: f64,
    pub y: f64,
}

impl Centroid {
    pub const fn new(x: f64, y: f64) -> Self {
        Self { x, y }
    }

    pub fn distance(&self, other: &Centroid) -> f64 {
        ((self.x - other.x).powi(2) + (self.y - other.y).powi(2)).sqrt()
    }
}

/// 外接矩形，宽高按像素个数计（max - min + 1）
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct BoundingBox {
    pub x: i32,
    pub y: i32,
    pub width: i32,
    pub height: i32,
}

impl BoundingBox {
    pub fn center(&self) -> Centroid {
        Centroid {
            x: self.x as f64 + self.width as f64 / 2.0,
            y: self.y as f64 + self.height as f64 / 2.0,
        }
    }
}

/// 一帧中一个候选坑洞的闭合轮廓
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct Contour {
    pub points: Vec<Point>,
}

impl Contour {
    pub fn new(points: Vec<Point>) -> Self {
        Self { points }
    }

    pub fn from_tuples(points: &[(i32, i32)]) -> Self {
        Self {
            points: points.iter().copied().map(Point::from).collect(),
        }
    }

    pub fn len(&self) -> usize {
        self.points.len()
    }

    pub fn is_empty(&self) -> bool {
        self.points.is_empty()
    }

    /// Iterates closed edges, including the last→first edge.
    fn edges(&self) -> impl Iterator<Item = (Point, Point)> + '_ {
        let n = self.points.len();
        (0..n).map(move |i| (self.points[i], self.points[(i + 1) % n]))
    }
}

/// Polygon moments up to first order, kept as exact integer sums.
///
/// `cross = Σ (x_i·y_{i+1} − x_{i+1}·y_i)` equals `2·m00`,
/// `sum_x = Σ (x_i + x_{i+1})·cross_i` equals `6·m10`, likewise `sum_y`.
/// i128 holds every product of i32 vertices without overflow.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
struct RawMoments {
    cross: i128,
    sum_x: i128,
    sum_y: i128,
}

fn raw_moments(contour: &Contour) -> RawMoments {
    let mut moments = RawMoments::default();
    if contour.len() < 3 {
        return moments;
    }

    for (a, b) in contour.edges() {
        let (ax, ay, bx, by) = (a.x as i128, a.y as i128, b.x as i128, b.y as i128);
        let cross = ax * by - bx * ay;
        moments.cross += cross;
        moments.sum_x += (ax + bx) * cross;
        moments.sum_y += (ay + by) * cross;
    }

    moments
}

/// 轮廓面积（鞋带公式，取绝对值，与方向无关）
pub fn contour_area(contour: &Contour) -> f64 {
    (raw_moments(contour).cross as f64 / 2.0).abs()
}

/// 外接矩形；空轮廓返回全零矩形
pub fn bounding_box(contour: &Contour) -> BoundingBox {
    let Some(first) = contour.points.first() else {
        return BoundingBox::default();
    };

    let (mut min_x, mut min_y, mut max_x, mut max_y) = (first.x, first.y, first.x, first.y);
    for p in &contour.points[1..] {
        min_x = min_x.min(p.x);
        min_y = min_y.min(p.y);
        max_x = max_x.max(p.x);
        max_y = max_y.max(p.y);
    }

    BoundingBox {
        x: min_x,
        y: min_y,
        width: max_x.saturating_sub(min_x).saturating_add(1),
        height: max_y.saturating_sub(min_y).saturating_add(1),
    }
}

/// 质心：m10/m00, m01/m00；m00 为零时退回外接矩形中心
pub fn centroid(contour: &Contour) -> Centroid {
    let moments = raw_moments(contour);
    if moments.cross == 0 {
        return bounding_box(contour).center();
    }

    // m10/m00 = (sum_x / 6) / (cross / 2) = sum_x / (3·cross)
    let denom = 3.0 * moments.cross as f64;
    Centroid {
        x: moments.sum_x as f64 / denom,
        y: moments.sum_y as f64 / denom,
    }
}
