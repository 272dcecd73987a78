// 该文件是 Shanan （山南西风） 项目的一部分。
// src/model/post.rs - DB 概率图后处理
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

use image::{GrayImage, Luma};
use imageproc::{
  contours::{Contour, find_contours},
  geometry::{approximate_polygon_dp, arc_length},
  point::Point as ContourPoint,
};
use ndarray::ArrayView2;
use tracing::debug;

use crate::{
  config::SegDetectorArgs,
  model::{
    Detections, Polygon,
    geometry::{Point, mini_box, polygon_mean_score, unclip},
  },
};

const MIN_SIZE: f32 = 3.0;
const POLYGON_UNCLIP_RATIO: f32 = 2.0;
const POLYGON_EPSILON_RATIO: f64 = 0.005;

/// 将 DB 网络输出的概率图转换为文本框
#[derive(Debug, Clone)]
pub struct SegDetectorRepresenter {
  thresh: f32,
  box_thresh: f32,
  max_candidates: usize,
  unclip_ratio: f32,
  min_size: f32,
}

impl From<SegDetectorArgs> for SegDetectorRepresenter {
  fn from(args: SegDetectorArgs) -> Self {
    Self {
      thresh: args.thresh,
      box_thresh: args.box_thresh,
      max_candidates: args.max_candidates,
      unclip_ratio: args.unclip_ratio,
      min_size: MIN_SIZE,
    }
  }
}

impl Default for SegDetectorRepresenter {
  fn default() -> Self {
    SegDetectorArgs::default().into()
  }
}

impl SegDetectorRepresenter {
  /// `pred` 为概率图（网络输出的第 0 通道），`dest` 为原图的 (height, width)
  ///
  /// 四边形模式下被过滤的候选位置保留为全零框，由调用方统一剔除。
  pub fn represent(
    &self,
    pred: &ArrayView2<f32>,
    dest: (usize, usize),
    is_output_polygon: bool,
  ) -> Detections {
    let bitmap = self.binarize(pred);
    if is_output_polygon {
      self.polygons_from_bitmap(pred, &bitmap, dest)
    } else {
      self.boxes_from_bitmap(pred, &bitmap, dest)
    }
  }

  fn binarize(&self, pred: &ArrayView2<f32>) -> GrayImage {
    let (height, width) = pred.dim();
    GrayImage::from_fn(width as u32, height as u32, |x, y| {
      if pred[[y as usize, x as usize]] > self.thresh {
        Luma([255u8])
      } else {
        Luma([0u8])
      }
    })
  }

  fn contours(&self, bitmap: &GrayImage) -> Vec<Contour<i32>> {
    let contours = find_contours::<i32>(bitmap);
    debug!("找到 {} 个轮廓", contours.len());
    contours
  }

  fn polygons_from_bitmap(
    &self,
    pred: &ArrayView2<f32>,
    bitmap: &GrayImage,
    dest: (usize, usize),
  ) -> Detections {
    let scale = Scale::new(bitmap, dest);
    let mut detections = Detections::default();

    for contour in self.contours(bitmap).iter().take(self.max_candidates) {
      let epsilon = POLYGON_EPSILON_RATIO * arc_length(&contour.points, true);
      // 单像素等退化轮廓没有可简化的边
      if contour.points.len() < 4 || epsilon <= 0.0 {
        continue;
      }
      let approx = approximate_polygon_dp(&contour.points, epsilon, true);
      if approx.len() < 4 {
        continue;
      }

      let score = polygon_mean_score(pred, &to_points(&contour.points));
      if score < self.box_thresh {
        continue;
      }

      let mut unclipped = unclip(&to_points(&approx), POLYGON_UNCLIP_RATIO);
      // 扩张后分裂成多个多边形的候选直接丢弃
      if unclipped.len() != 1 {
        continue;
      }
      let polygon = unclipped.remove(0);

      match mini_box(&polygon) {
        Some((_, sside)) if sside >= self.min_size + 2.0 => {}
        _ => continue,
      }

      detections.push(Polygon::new(scale.apply(&polygon)), score);
    }

    debug!("多边形模式保留 {} 个文本框", detections.len());
    detections
  }

  fn boxes_from_bitmap(
    &self,
    pred: &ArrayView2<f32>,
    bitmap: &GrayImage,
    dest: (usize, usize),
  ) -> Detections {
    let scale = Scale::new(bitmap, dest);
    let contours = self.contours(bitmap);
    let num_contours = contours.len().min(self.max_candidates);
    let mut boxes = vec![Polygon::zeros(4); num_contours];
    let mut scores = vec![0.0f32; num_contours];

    for (index, contour) in contours.iter().take(num_contours).enumerate() {
      let contour = to_points(&contour.points);
      let Some((points, sside)) = mini_box(&contour) else {
        continue;
      };
      if sside < self.min_size {
        continue;
      }

      let score = polygon_mean_score(pred, &points);
      if score < self.box_thresh {
        continue;
      }

      let Some(expanded) = unclip(&points, self.unclip_ratio).into_iter().next() else {
        continue;
      };
      let Some((points, sside)) = mini_box(&expanded) else {
        continue;
      };
      if sside < self.min_size + 2.0 {
        continue;
      }

      boxes[index] = Polygon::new(scale.apply(&points));
      scores[index] = score;
    }

    Detections::from_parts(boxes, scores)
  }
}

fn to_points(points: &[ContourPoint<i32>]) -> Vec<Point> {
  points.iter().map(|p| [p.x as f32, p.y as f32]).collect()
}

/// 概率图坐标到原图坐标的缩放
struct Scale {
  x: f32,
  y: f32,
  dest_width: f32,
  dest_height: f32,
}

impl Scale {
  fn new(bitmap: &GrayImage, (dest_height, dest_width): (usize, usize)) -> Self {
    Self {
      x: dest_width as f32 / bitmap.width() as f32,
      y: dest_height as f32 / bitmap.height() as f32,
      dest_width: dest_width as f32,
      dest_height: dest_height as f32,
    }
  }

  fn apply(&self, points: &[Point]) -> Vec<Point> {
    points
      .iter()
      .map(|p| {
        [
          (p[0] * self.x).round().clamp(0.0, self.dest_width),
          (p[1] * self.y).round().clamp(0.0, self.dest_height),
        ]
      })
      .collect()
  }
}

#[cfg(test)]
mod tests {
  use super::*;
  use ndarray::Array2;

  /// 在 (y0..y1, x0..x1) 区域内填入 `value`
  fn score_map(height: usize, width: usize, blobs: &[(usize, usize, usize, usize, f32)]) -> Array2<f32> {
    let mut pred = Array2::<f32>::zeros((height, width));
    for &(y0, y1, x0, x1, value) in blobs {
      for y in y0..y1 {
        for x in x0..x1 {
          pred[[y, x]] = value;
        }
      }
    }
    pred
  }

  #[test]
  fn empty_map_has_no_detections() {
    let pred = Array2::<f32>::zeros((64, 64));
    let post = SegDetectorRepresenter::default();
    assert!(post.represent(&pred.view(), (64, 64), false).is_empty());
    assert!(post.represent(&pred.view(), (64, 64), true).is_empty());
  }

  #[test]
  fn single_blob_yields_one_box_in_original_coordinates() {
    let pred = score_map(64, 128, &[(20, 40, 30, 90, 0.9)]);
    let post = SegDetectorRepresenter::default();
    // 原图是概率图的一半大小
    let detections = post.represent(&pred.view(), (32, 64), false);

    assert_eq!(detections.len(), 1);
    let (polygon, score) = detections.iter().next().unwrap();
    assert!((score - 0.9).abs() < 1e-3);
    assert_eq!(polygon.points().len(), 4);

    let xs: Vec<f32> = polygon.points().iter().map(|p| p[0]).collect();
    let ys: Vec<f32> = polygon.points().iter().map(|p| p[1]).collect();
    let (min_x, max_x) = (xs.iter().cloned().fold(f32::MAX, f32::min), xs.iter().cloned().fold(f32::MIN, f32::max));
    let (min_y, max_y) = (ys.iter().cloned().fold(f32::MAX, f32::min), ys.iter().cloned().fold(f32::MIN, f32::max));
    // 扩张后框会略大于原始区域（缩放后 15..45 x 10..20）
    assert!(min_x <= 15.0 && max_x >= 44.0, "{:?}", xs);
    assert!(min_y <= 10.0 && max_y >= 19.0, "{:?}", ys);
    assert!(min_x >= 0.0 && max_x <= 64.0 && min_y >= 0.0 && max_y <= 32.0);
  }

  #[test]
  fn low_score_blob_leaves_zero_slot() {
    // 0.5 超过二值化阈值但低于 box_thresh
    let pred = score_map(64, 128, &[(10, 30, 10, 50, 0.5), (40, 60, 60, 120, 0.95)]);
    let post = SegDetectorRepresenter::default();
    let detections = post.represent(&pred.view(), (64, 128), false);

    assert_eq!(detections.len(), 2);
    let degenerate = detections.iter().filter(|(p, _)| p.is_degenerate()).count();
    assert_eq!(degenerate, 1);

    let mut filtered = detections.clone();
    filtered.retain_valid();
    assert_eq!(filtered.len(), 1);
    assert!((filtered.scores()[0] - 0.95).abs() < 1e-3);
  }

  #[test]
  fn tiny_blob_is_dropped() {
    let pred = score_map(32, 32, &[(10, 12, 10, 12, 0.99)]);
    let post = SegDetectorRepresenter::default();
    let mut detections = post.represent(&pred.view(), (32, 32), false);
    detections.retain_valid();
    assert!(detections.is_empty());
  }

  #[test]
  fn isolated_pixels_are_skipped_in_both_modes() {
    let mut pred = Array2::<f32>::zeros((32, 32));
    pred[[10, 10]] = 0.9;
    pred[[20, 5]] = 0.9;
    pred[[20, 6]] = 0.9;
    let post = SegDetectorRepresenter::default();

    assert!(post.represent(&pred.view(), (32, 32), true).is_empty());
    let mut boxes = post.represent(&pred.view(), (32, 32), false);
    boxes.retain_valid();
    assert!(boxes.is_empty());
  }

  #[test]
  fn max_candidates_limits_slots() {
    let pred = score_map(
      64,
      128,
      &[(5, 20, 5, 40, 0.9), (30, 50, 5, 40, 0.9), (5, 20, 60, 120, 0.9)],
    );
    let post = SegDetectorRepresenter::from(SegDetectorArgs {
      max_candidates: 2,
      ..SegDetectorArgs::default()
    });
    assert_eq!(post.represent(&pred.view(), (64, 128), false).len(), 2);
  }

  #[test]
  fn polygon_mode_returns_only_kept_polygons() {
    let pred = score_map(64, 128, &[(20, 40, 30, 90, 0.9), (45, 60, 5, 25, 0.4)]);
    let post = SegDetectorRepresenter::default();
    let detections = post.represent(&pred.view(), (64, 128), true);

    assert_eq!(detections.len(), 1);
    let (polygon, score) = detections.iter().next().unwrap();
    assert!(polygon.points().len() >= 4);
    assert!(!polygon.is_degenerate());
    assert!((score - 0.9).abs() < 1e-3);
  }
}
