// 该文件是 Shanan （山南西风） 项目的一部分。
// src/model/geometry.rs - 后处理用到的几何运算
//
// 本文件根据 Apache 许可证第 2.0 版（以下简称“许可证”）授权使用；
// 除非遵守该许可证条款，否则您不得使用本文件。
// 您可通过以下网址获取许可证副本：
// http://www.apache.org/licenses/LICENSE-2.0
// 除非适用法律要求或书面同意，根据本许可协议分发的软件均按“原样”提供，
// 不附带任何形式的明示或暗示的保证或条件。
// 有关许可权限与限制的具体条款，请参阅本许可协议。
//
// Copyright (C) 2026 Johann Li <me@qinka.pro>, Wareless Group

use std::cmp::Ordering;

use clipper2::{EndType, JoinType, Path as ClipperPath};
use image::{GrayImage, Luma};
use imageproc::{drawing::draw_polygon_mut, point::Point as ContourPoint};
use ndarray::ArrayView2;

pub type Point = [f32; 2];

/// 旋转矩形，`angle` 为角度制
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct RotatedRect {
  pub center: Point,
  pub width: f32,
  pub height: f32,
  pub angle: f32,
}

impl RotatedRect {
  pub fn min_side(&self) -> f32 {
    self.width.min(self.height)
  }

  pub fn corners(&self) -> [Point; 4] {
    let (sin_a, cos_a) = self.angle.to_radians().sin_cos();
    let (w_2, h_2) = (self.width / 2.0, self.height / 2.0);
    [(-w_2, -h_2), (w_2, -h_2), (w_2, h_2), (-w_2, h_2)].map(|(x, y)| {
      [
        x * cos_a - y * sin_a + self.center[0],
        x * sin_a + y * cos_a + self.center[1],
      ]
    })
  }
}

fn cross(o: Point, a: Point, b: Point) -> f32 {
  (a[0] - o[0]) * (b[1] - o[1]) - (a[1] - o[1]) * (b[0] - o[0])
}

/// Andrew 单调链凸包
fn convex_hull(points: &[Point]) -> Vec<Point> {
  let mut pts = points.to_vec();
  pts.sort_by(|a, b| {
    a[0]
      .partial_cmp(&b[0])
      .unwrap_or(Ordering::Equal)
      .then_with(|| a[1].partial_cmp(&b[1]).unwrap_or(Ordering::Equal))
  });
  pts.dedup();
  if pts.len() < 3 {
    return pts;
  }

  let mut lower: Vec<Point> = Vec::with_capacity(pts.len());
  for p in &pts {
    while lower.len() >= 2 && cross(lower[lower.len() - 2], lower[lower.len() - 1], *p) <= 0.0 {
      lower.pop();
    }
    lower.push(*p);
  }

  let mut upper: Vec<Point> = Vec::with_capacity(pts.len());
  for p in pts.iter().rev() {
    while upper.len() >= 2 && cross(upper[upper.len() - 2], upper[upper.len() - 1], *p) <= 0.0 {
      upper.pop();
    }
    upper.push(*p);
  }

  lower.pop();
  upper.pop();
  lower.extend(upper);
  lower
}

/// 最小面积外接矩形（旋转卡壳）
pub fn min_area_rect(points: &[Point]) -> Option<RotatedRect> {
  let hull = convex_hull(points);

  if hull.len() < 3 {
    // 点集共线或只有一两个点
    let first = *hull.first()?;
    let last = *hull.last()?;
    let (dx, dy) = (last[0] - first[0], last[1] - first[1]);
    return Some(RotatedRect {
      center: [(first[0] + last[0]) / 2.0, (first[1] + last[1]) / 2.0],
      width: dx.hypot(dy),
      height: 0.0,
      angle: dy.atan2(dx).to_degrees(),
    });
  }

  let mut best: Option<(f32, RotatedRect)> = None;
  for i in 0..hull.len() {
    let p1 = hull[i];
    let p2 = hull[(i + 1) % hull.len()];
    let (ex, ey) = (p2[0] - p1[0], p2[1] - p1[1]);
    let len = ex.hypot(ey);
    if len < 1e-6 {
      continue;
    }
    let (ux, uy) = (ex / len, ey / len);
    let (vx, vy) = (-uy, ux);

    let (mut min_u, mut max_u) = (f32::MAX, f32::MIN);
    let (mut min_v, mut max_v) = (f32::MAX, f32::MIN);
    for p in &hull {
      let (dx, dy) = (p[0] - p1[0], p[1] - p1[1]);
      let u = dx * ux + dy * uy;
      let v = dx * vx + dy * vy;
      min_u = min_u.min(u);
      max_u = max_u.max(u);
      min_v = min_v.min(v);
      max_v = max_v.max(v);
    }

    let (width, height) = (max_u - min_u, max_v - min_v);
    let area = width * height;
    if best.as_ref().is_some_and(|(best_area, _)| *best_area <= area) {
      continue;
    }

    let (cu, cv) = ((min_u + max_u) / 2.0, (min_v + max_v) / 2.0);
    best = Some((
      area,
      RotatedRect {
        center: [p1[0] + cu * ux + cv * vx, p1[1] + cu * uy + cv * vy],
        width,
        height,
        angle: uy.atan2(ux).to_degrees(),
      },
    ));
  }

  best.map(|(_, rect)| rect)
}

/// 最小外接矩形的四个顶点及其短边
///
/// 顶点顺序为左上、右上、右下、左下：先按 x 排序，
/// 左右两对再分别按 y 区分上下。
pub fn mini_box(points: &[Point]) -> Option<([Point; 4], f32)> {
  let rect = min_area_rect(points)?;
  let mut corners = rect.corners();
  corners.sort_by(|a, b| a[0].partial_cmp(&b[0]).unwrap_or(Ordering::Equal));

  let (index_1, index_4) = if corners[1][1] > corners[0][1] {
    (0, 1)
  } else {
    (1, 0)
  };
  let (index_2, index_3) = if corners[3][1] > corners[2][1] {
    (2, 3)
  } else {
    (3, 2)
  };

  Some((
    [
      corners[index_1],
      corners[index_2],
      corners[index_3],
      corners[index_4],
    ],
    rect.min_side(),
  ))
}

pub fn polygon_area(points: &[Point]) -> f32 {
  if points.len() < 3 {
    return 0.0;
  }
  let n = points.len();
  let twice: f32 = (0..n)
    .map(|i| {
      let (a, b) = (points[i], points[(i + 1) % n]);
      a[0] * b[1] - b[0] * a[1]
    })
    .sum();
  twice.abs() / 2.0
}

pub fn polygon_perimeter(points: &[Point]) -> f32 {
  if points.len() < 2 {
    return 0.0;
  }
  let n = points.len();
  (0..n)
    .map(|i| {
      let (a, b) = (points[i], points[(i + 1) % n]);
      (b[0] - a[0]).hypot(b[1] - a[1])
    })
    .sum()
}

/// 多边形覆盖区域（含边界）内的平均分数
///
/// 区域先按外接矩形裁剪到图像内，再在矩形内栅格化多边形掩码。
pub fn polygon_mean_score(pred: &ArrayView2<f32>, polygon: &[Point]) -> f32 {
  let (height, width) = pred.dim();
  if polygon.is_empty() || height == 0 || width == 0 {
    return 0.0;
  }

  let clamp = |v: f32, max: usize| (v as i64).clamp(0, max as i64 - 1) as usize;
  let min_x = polygon.iter().map(|p| p[0]).fold(f32::INFINITY, f32::min);
  let max_x = polygon.iter().map(|p| p[0]).fold(f32::NEG_INFINITY, f32::max);
  let min_y = polygon.iter().map(|p| p[1]).fold(f32::INFINITY, f32::min);
  let max_y = polygon.iter().map(|p| p[1]).fold(f32::NEG_INFINITY, f32::max);
  let (xmin, xmax) = (clamp(min_x.floor(), width), clamp(max_x.ceil(), width));
  let (ymin, ymax) = (clamp(min_y.floor(), height), clamp(max_y.ceil(), height));

  let mut vertices: Vec<ContourPoint<i32>> = Vec::with_capacity(polygon.len());
  for p in polygon {
    let vertex = ContourPoint::new((p[0] - xmin as f32) as i32, (p[1] - ymin as f32) as i32);
    if vertices.last() != Some(&vertex) {
      vertices.push(vertex);
    }
  }
  // 首尾相同会被 draw_polygon_mut 拒绝
  while vertices.len() > 1 && vertices.first() == vertices.last() {
    vertices.pop();
  }

  let mut mask = GrayImage::new((xmax - xmin + 1) as u32, (ymax - ymin + 1) as u32);
  match vertices.as_slice() {
    [single] => {
      if let (Ok(x), Ok(y)) = (u32::try_from(single.x), u32::try_from(single.y))
        && x < mask.width()
        && y < mask.height()
      {
        mask.put_pixel(x, y, Luma([1u8]));
      }
    }
    _ => draw_polygon_mut(&mut mask, &vertices, Luma([1u8])),
  }

  let mut sum = 0.0f64;
  let mut count = 0usize;
  for (x, y, pixel) in mask.enumerate_pixels() {
    if pixel.0[0] != 0 {
      sum += pred[[ymin + y as usize, xmin + x as usize]] as f64;
      count += 1;
    }
  }

  if count == 0 {
    0.0
  } else {
    (sum / count as f64) as f32
  }
}

/// 按 `area * ratio / perimeter` 的距离向外扩张多边形（圆角连接）
///
/// 返回扩张后的所有多边形，输入退化时返回空。
pub fn unclip(points: &[Point], unclip_ratio: f32) -> Vec<Vec<Point>> {
  if points.len() < 3 {
    return Vec::new();
  }

  let clipper_path: ClipperPath = points
    .iter()
    .map(|p| (p[0] as f64, p[1] as f64))
    .collect::<Vec<_>>()
    .into();

  let area = clipper_path.signed_area().abs();
  let perimeter = polygon_perimeter(points) as f64;
  if area <= f64::EPSILON || perimeter <= f64::EPSILON {
    return Vec::new();
  }

  let distance = area * unclip_ratio as f64 / perimeter;
  clipper_path
    .inflate(distance, JoinType::Round, EndType::Polygon, 2.0)
    .into_iter()
    .map(|path| {
      let mut expanded: Vec<Point> = path.iter().map(|pt| [pt.x() as f32, pt.y() as f32]).collect();
      if expanded.len() > 1 && expanded.first() == expanded.last() {
        expanded.pop();
      }
      expanded
    })
    .filter(|expanded| expanded.len() >= 3)
    .collect()
}
