// 该文件是 Shanan （山南西风） 项目的一部分。
// src/output/draw.rs - 文本检测结果可视化
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

use image::{GrayImage, Luma, Rgb, RgbImage};
use imageproc::drawing::draw_line_segment_mut;
use ndarray::Array2;

use crate::model::{Detections, Polygon};

const BOX_COLOR: [u8; 3] = [255, 0, 0]; // 红色
const BOX_THICKNESS: i32 = 2;

pub struct Draw {
  color: [u8; 3],
  thickness: i32,
}

impl Default for Draw {
  fn default() -> Self {
    Self {
      color: BOX_COLOR,
      thickness: BOX_THICKNESS,
    }
  }
}

impl Draw {
  pub fn with_color(mut self, color: [u8; 3]) -> Self {
    self.color = color;
    self
  }

  pub fn with_thickness(mut self, thickness: i32) -> Self {
    self.thickness = thickness.max(1);
    self
  }

  // 闭合折线，线宽通过平移多次绘制实现
  fn draw_polygon(&self, image: &mut RgbImage, polygon: &Polygon) {
    let points = polygon.points();
    if points.len() < 2 {
      return;
    }

    let offset = (self.thickness - 1) / 2;
    for (i, start) in points.iter().enumerate() {
      let end = points[(i + 1) % points.len()];
      for dx in 0..self.thickness {
        for dy in 0..self.thickness {
          let (dx, dy) = ((dx - offset) as f32, (dy - offset) as f32);
          draw_line_segment_mut(
            image,
            (start[0] + dx, start[1] + dy),
            (end[0] + dx, end[1] + dy),
            Rgb(self.color),
          );
        }
      }
    }
  }

  /// 在原图副本上绘制所有文本框
  pub fn draw_detection(&self, image: &RgbImage, detections: &Detections) -> RgbImage {
    let mut image = image.clone();
    for polygon in detections.boxes() {
      self.draw_polygon(&mut image, polygon);
    }
    image
  }
}

/// 将概率图转换为灰度图，概率 1 对应白色
pub fn score_map_image(score_map: &Array2<f32>) -> GrayImage {
  let (height, width) = score_map.dim();
  GrayImage::from_fn(width as u32, height as u32, |x, y| {
    let value = score_map[[y as usize, x as usize]].clamp(0.0, 1.0);
    Luma([(value * 255.0).round() as u8])
  })
}
