//! 二维仿射几何

use serde::{Deserialize, Serialize};

/// 二维点
#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize)]
pub struct Point {
    pub x: f64,
    pub y: f64,
}

impl Point {
    pub const fn new(x: f64, y: f64) -> Self {
        Self { x, y }
    }
}

/// 轴对齐矩形
///
/// 在页面坐标系中 `y` 是下边（原点在左下）；在像素坐标系中 `y` 是上边（原点在左上）。
/// 矩形本身不区分坐标系，由调用方约定。
#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize)]
pub struct Rect {
    pub x: f64,
    pub y: f64,
    pub width: f64,
    pub height: f64,
}

impl Rect {
    pub const fn new(x: f64, y: f64, width: f64, height: f64) -> Self {
        Self {
            x,
            y,
            width,
            height,
        }
    }

    /// 由两个对角点构造
    pub fn from_corners(min_x: f64, min_y: f64, max_x: f64, max_y: f64) -> Self {
        Self {
            x: min_x,
            y: min_y,
            width: max_x - min_x,
            height: max_y - min_y,
        }
    }

    /// 包含所有点的最小矩形，空输入返回 `None`
    pub fn bounding(points: &[Point]) -> Option<Self> {
        let first = points.first()?;
        let (mut min_x, mut min_y, mut max_x, mut max_y) = (first.x, first.y, first.x, first.y);
        for p in &points[1..] {
            min_x = min_x.min(p.x);
            min_y = min_y.min(p.y);
            max_x = max_x.max(p.x);
            max_y = max_y.max(p.y);
        }
        Some(Self::from_corners(min_x, min_y, max_x, max_y))
    }

    pub fn right(&self) -> f64 {
        self.x + self.width
    }

    /// `y + height`：页面坐标系中是上边，像素坐标系中是下边
    pub fn top(&self) -> f64 {
        self.y + self.height
    }

    pub fn center_y(&self) -> f64 {
        self.y + self.height / 2.0
    }

    /// 严格相交检测（仅边界接触不算相交）
    pub fn intersects(&self, other: &Rect) -> bool {
        self.x < other.right()
            && self.right() > other.x
            && self.y < other.top()
            && self.top() > other.y
    }

    /// 向四周扩展 `margin`
    pub fn inflate(&self, margin: f64) -> Self {
        Self {
            x: self.x - margin,
            y: self.y - margin,
            width: self.width + margin * 2.0,
            height: self.height + margin * 2.0,
        }
    }

    pub fn contains(&self, p: Point) -> bool {
        p.x >= self.x && p.x <= self.right() && p.y >= self.y && p.y <= self.top()
    }
}

/// PDF 风格的仿射矩阵 `[a b c d e f]`
///
/// 点变换：`x' = a·x + c·y + e`，`y' = b·x + d·y + f`。
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Matrix(pub [f64; 6]);

impl Default for Matrix {
    fn default() -> Self {
        Self::IDENTITY
    }
}

impl Matrix {
    pub const IDENTITY: Matrix = Matrix([1.0, 0.0, 0.0, 1.0, 0.0, 0.0]);

    pub const fn new(a: f64, b: f64, c: f64, d: f64, e: f64, f: f64) -> Self {
        Self([a, b, c, d, e, f])
    }

    pub const fn translate(tx: f64, ty: f64) -> Self {
        Self([1.0, 0.0, 0.0, 1.0, tx, ty])
    }

    pub const fn scale(sx: f64, sy: f64) -> Self {
        Self([sx, 0.0, 0.0, sy, 0.0, 0.0])
    }

    pub fn a(&self) -> f64 {
        self.0[0]
    }
    pub fn b(&self) -> f64 {
        self.0[1]
    }
    pub fn c(&self) -> f64 {
        self.0[2]
    }
    pub fn d(&self) -> f64 {
        self.0[3]
    }
    pub fn e(&self) -> f64 {
        self.0[4]
    }
    pub fn f(&self) -> f64 {
        self.0[5]
    }

    /// 复合变换 `self ∘ inner`：先应用 `inner`，再应用 `self`
    pub fn concat(&self, inner: &Matrix) -> Matrix {
        let [a1, b1, c1, d1, e1, f1] = self.0;
        let [a2, b2, c2, d2, e2, f2] = inner.0;
        Matrix([
            a1 * a2 + c1 * b2,
            b1 * a2 + d1 * b2,
            a1 * c2 + c1 * d2,
            b1 * c2 + d1 * d2,
            a1 * e2 + c1 * f2 + e1,
            b1 * e2 + d1 * f2 + f1,
        ])
    }

    pub fn apply(&self, p: Point) -> Point {
        let [a, b, c, d, e, f] = self.0;
        Point {
            x: a * p.x + c * p.y + e,
            y: b * p.x + d * p.y + f,
        }
    }

    /// 只应用线性部分（不含平移），用于方向向量
    pub fn apply_vector(&self, v: Point) -> Point {
        let [a, b, c, d, _, _] = self.0;
        Point {
            x: a * v.x + c * v.y,
            y: b * v.x + d * v.y,
        }
    }

    pub fn determinant(&self) -> f64 {
        self.0[0] * self.0[3] - self.0[1] * self.0[2]
    }

    /// 逆矩阵，行列式接近 0 时返回 `None`
    pub fn inverse(&self) -> Option<Matrix> {
        let det = self.determinant();
        if !det.is_finite() || det.abs() < f64::EPSILON {
            return None;
        }
        let [a, b, c, d, e, f] = self.0;
        Some(Matrix([
            d / det,
            -b / det,
            -c / det,
            a / det,
            (c * f - d * e) / det,
            (b * e - a * f) / det,
        ]))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn assert_close(a: f64, b: f64) {
        assert!((a - b).abs() < 1e-9, "{} != {}", a, b);
    }

    #[test]
    fn test_concat_applies_inner_first() {
        let scale = Matrix::scale(2.0, 2.0);
        let shift = Matrix::translate(10.0, 5.0);
        let p = scale.concat(&shift).apply(Point::new(1.0, 1.0));
        assert_close(p.x, 22.0);
        assert_close(p.y, 12.0);
    }

    #[test]
    fn test_inverse_round_trip() {
        let m = Matrix::new(0.0, -1.5, 1.5, 0.0, 30.0, 900.0);
        let inv = m.inverse().unwrap();
        let p = Point::new(123.4, -56.7);
        let back = inv.apply(m.apply(p));
        assert_close(back.x, p.x);
        assert_close(back.y, p.y);
    }

    #[test]
    fn test_singular_matrix_has_no_inverse() {
        assert!(Matrix::scale(0.0, 1.0).inverse().is_none());
    }

    #[test]
    fn test_rect_intersects_is_strict() {
        let a = Rect::new(0.0, 0.0, 10.0, 10.0);
        assert!(a.intersects(&Rect::new(5.0, 5.0, 10.0, 10.0)));
        assert!(!a.intersects(&Rect::new(10.0, 0.0, 5.0, 5.0)));
    }

    #[test]
    fn test_bounding_rect() {
        let r = Rect::bounding(&[Point::new(3.0, 9.0), Point::new(-1.0, 4.0)]).unwrap();
        assert_eq!(r, Rect::new(-1.0, 4.0, 4.0, 5.0));
        assert!(Rect::bounding(&[]).is_none());
    }
}
