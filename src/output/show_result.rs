// 该文件是 Shanan （山南西风） 项目的一部分。
// src/output/show_result.rs - 概率图与检测结果展示
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

use std::path::PathBuf;

use tracing::info;

use crate::{
  input::read_rgb,
  model::{Prediction, Request},
  output::{
    OutputError, Render,
    draw::{Draw, score_map_image},
    output_path,
  },
};

const SCORE_SUFFIX: &str = "_score.png";
const SHOW_SUFFIX: &str = "_show.jpg";

/// 没有窗口环境，展示结果以图片形式写到输出目录
pub struct ShowOutput {
  dir: PathBuf,
  draw: Draw,
}

impl ShowOutput {
  pub fn new(dir: impl Into<PathBuf>) -> Self {
    ShowOutput {
      dir: dir.into(),
      draw: Draw::default(),
    }
  }
}

impl Render<Request, Prediction> for ShowOutput {
  type Error = OutputError;

  fn render_result(&self, frame: &Request, result: &Prediction) -> Result<(), Self::Error> {
    std::fs::create_dir_all(&self.dir).map_err(|e| OutputError::io(&self.dir, e))?;

    let score_path = output_path(&self.dir, &frame.path, SCORE_SUFFIX);
    score_map_image(&result.score_map)
      .save(&score_path)
      .map_err(|e| OutputError::image(&score_path, e))?;
    info!("概率图: {}", score_path.display());

    let show_path = output_path(&self.dir, &frame.path, SHOW_SUFFIX);
    let image = read_rgb(&frame.path)?;
    self
      .draw
      .draw_detection(&image, &result.detections)
      .save(&show_path)
      .map_err(|e| OutputError::image(&show_path, e))?;
    info!("检测结果: {}", show_path.display());

    Ok(())
  }
}

#[cfg(test)]
mod tests {
  use super::*;
  use crate::model::Detections;
  use image::{Rgb, RgbImage};
  use ndarray::Array2;
  use std::time::Duration;

  #[test]
  fn writes_score_and_show_images() {
    let dir = tempfile::tempdir().unwrap();
    let image_path = dir.path().join("page.jpg");
    RgbImage::from_pixel(20, 10, Rgb([0, 0, 0]))
      .save(&image_path)
      .unwrap();

    let prediction = Prediction {
      score_map: Array2::from_elem((32, 64), 0.5),
      detections: Detections::default(),
      elapsed: Duration::ZERO,
    };
    ShowOutput::new(dir.path().join("show"))
      .render_result(&Request::new(&image_path), &prediction)
      .unwrap();

    let score = image::open(dir.path().join("show/page_score.png")).unwrap();
    assert_eq!((score.width(), score.height()), (64, 32));
    assert!(dir.path().join("show/page_show.jpg").is_file());
  }
}
