// 该文件是 Shanan （山南西风） 项目的一部分。
// src/model.rs - 模型
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

use std::{path::PathBuf, time::Duration};

use ndarray::Array2;

use crate::transform::DEFAULT_SHORT_SIZE;

pub trait Model {
  type Input;
  type Output;
  type Error;

  fn infer(&mut self, input: &Self::Input) -> Result<Self::Output, Self::Error>;
}

/// 原图坐标系下的文本框顶点
#[derive(Debug, Clone, PartialEq)]
pub struct Polygon(Vec<[f32; 2]>);

impl Polygon {
  pub fn new(points: Vec<[f32; 2]>) -> Self {
    Polygon(points)
  }

  /// 全零占位框
  pub fn zeros(len: usize) -> Self {
    Polygon(vec![[0.0, 0.0]; len])
  }

  pub fn points(&self) -> &[[f32; 2]] {
    &self.0
  }

  pub fn coordinate_sum(&self) -> f32 {
    self.0.iter().map(|p| p[0] + p[1]).sum()
  }

  /// 坐标之和不大于 0 的框视为无效
  pub fn is_degenerate(&self) -> bool {
    self.coordinate_sum() <= 0.0
  }
}

/// 文本框及其置信度，两者一一对应
#[derive(Debug, Clone, Default)]
pub struct Detections {
  boxes: Vec<Polygon>,
  scores: Vec<f32>,
}

impl Detections {
  /// 两个列表必须等长，只在本 crate 内由后处理构造
  pub(crate) fn from_parts(boxes: Vec<Polygon>, scores: Vec<f32>) -> Self {
    debug_assert_eq!(boxes.len(), scores.len());
    Detections { boxes, scores }
  }

  pub fn push(&mut self, polygon: Polygon, score: f32) {
    self.boxes.push(polygon);
    self.scores.push(score);
  }

  /// 剔除无效框，同步移除对应的分数
  pub fn retain_valid(&mut self) {
    let (boxes, scores) = std::mem::take(&mut self.boxes)
      .into_iter()
      .zip(std::mem::take(&mut self.scores))
      .filter(|(polygon, _)| !polygon.is_degenerate())
      .unzip();
    self.boxes = boxes;
    self.scores = scores;
  }

  pub fn boxes(&self) -> &[Polygon] {
    &self.boxes
  }

  pub fn scores(&self) -> &[f32] {
    &self.scores
  }

  pub fn len(&self) -> usize {
    self.boxes.len()
  }

  pub fn is_empty(&self) -> bool {
    self.boxes.is_empty()
  }

  pub fn iter(&self) -> impl Iterator<Item = (&Polygon, f32)> {
    self.boxes.iter().zip(self.scores.iter().copied())
  }
}

/// 单张图片的预测结果
#[derive(Debug, Clone)]
pub struct Prediction {
  /// 概率图，尺寸为缩放后的输入尺寸
  pub score_map: Array2<f32>,
  pub detections: Detections,
  /// 从张量送入设备到后处理结束的耗时
  pub elapsed: Duration,
}

impl Prediction {
  pub fn elapsed_secs(&self) -> f64 {
    self.elapsed.as_secs_f64()
  }
}

/// 单张图片的推理请求
#[derive(Debug, Clone)]
pub struct Request {
  pub path: PathBuf,
  pub is_output_polygon: bool,
  pub short_size: u32,
}

impl Request {
  pub fn new(path: impl Into<PathBuf>) -> Self {
    Request {
      path: path.into(),
      is_output_polygon: false,
      short_size: DEFAULT_SHORT_SIZE,
    }
  }

  pub fn polygon(mut self, is_output_polygon: bool) -> Self {
    self.is_output_polygon = is_output_polygon;
    self
  }

  pub fn short_size(mut self, short_size: u32) -> Self {
    self.short_size = short_size;
    self
  }
}

mod dbnet;
pub mod geometry;
mod post;

pub use self::{
  dbnet::{DbNet, DbNetBuilder, DbNetError},
  post::SegDetectorRepresenter,
};
