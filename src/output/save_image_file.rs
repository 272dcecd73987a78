// 该文件是 Shanan （山南西风） 项目的一部分。
// src/output/save_image_file.rs - 保存检测结果
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

use std::{
  fmt::Write as _,
  path::{Path, PathBuf},
};

use tracing::warn;

use crate::{
  input::read_rgb,
  model::{Detections, Polygon, Prediction, Request},
  output::{OutputError, Render, draw::Draw, output_path},
};

const RESULT_IMAGE_SUFFIX: &str = "_result.jpg";
const RESULT_TEXT_SUFFIX: &str = "_result.txt";

/// 将绘制结果和文本框坐标写入输出目录
pub struct SaveResultOutput {
  dir: PathBuf,
  draw: Draw,
}

impl SaveResultOutput {
  pub fn new(dir: impl Into<PathBuf>) -> Self {
    SaveResultOutput {
      dir: dir.into(),
      draw: Draw::default(),
    }
  }

  pub fn image_path(&self, image_path: &Path) -> PathBuf {
    output_path(&self.dir, image_path, RESULT_IMAGE_SUFFIX)
  }

  pub fn text_path(&self, image_path: &Path) -> PathBuf {
    output_path(&self.dir, image_path, RESULT_TEXT_SUFFIX)
  }

  fn save_text(&self, path: &Path, detections: &Detections) -> Result<(), OutputError> {
    let mut text = String::new();
    for (polygon, score) in detections.iter() {
      text.push_str(&format_result_line(polygon, score));
      text.push('\n');
    }
    std::fs::write(path, text).map_err(|e| OutputError::io(path, e))?;
    warn!("保存检测结果到文件: {}", path.display());
    Ok(())
  }
}

/// 一行一个文本框：取整后的顶点坐标，最后是分数
pub fn format_result_line(polygon: &Polygon, score: f32) -> String {
  let mut line = String::new();
  for point in polygon.points() {
    let _ = write!(line, "{},{},", point[0] as i64, point[1] as i64);
  }
  let _ = write!(line, "{}", score);
  line
}

impl Render<Request, Prediction> for SaveResultOutput {
  type Error = OutputError;

  fn render_result(&self, frame: &Request, result: &Prediction) -> Result<(), Self::Error> {
    std::fs::create_dir_all(&self.dir).map_err(|e| OutputError::io(&self.dir, e))?;

    let image = read_rgb(&frame.path)?;
    let image = self.draw.draw_detection(&image, &result.detections);
    let image_path = self.image_path(&frame.path);
    image
      .save(&image_path)
      .map_err(|e| OutputError::image(&image_path, e))?;
    warn!("保存图像到文件: {}", image_path.display());

    self.save_text(&self.text_path(&frame.path), &result.detections)
  }
}
