// 该文件是 Shanan （山南西风） 项目的一部分。
// src/output.rs - 输出定义
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

use std::path::{Path, PathBuf};

use thiserror::Error;

use crate::{
  input::InputError,
  model::{Prediction, Request},
};

pub trait Render<Frame, Output>: Sized {
  type Error;
  fn render_result(&self, frame: &Frame, result: &Output) -> Result<(), Self::Error>;
}

pub mod draw;

#[cfg(feature = "save_image_file")]
mod save_image_file;
#[cfg(feature = "save_image_file")]
pub use self::save_image_file::{SaveResultOutput, format_result_line};

#[cfg(feature = "show_result")]
mod show_result;
#[cfg(feature = "show_result")]
pub use self::show_result::ShowOutput;

#[derive(Error, Debug)]
pub enum OutputError {
  #[error("I/O 错误 {path}: {source}")]
  IoError {
    path: PathBuf,
    source: std::io::Error,
  },
  #[error("图像保存错误 {path}: {source}")]
  ImageError {
    path: PathBuf,
    source: image::ImageError,
  },
  #[error("读取原图错误: {0}")]
  InputError(#[from] InputError),
}

impl OutputError {
  pub(crate) fn io(path: &Path, source: std::io::Error) -> Self {
    OutputError::IoError {
      path: path.to_path_buf(),
      source,
    }
  }

  pub(crate) fn image(path: &Path, source: image::ImageError) -> Self {
    OutputError::ImageError {
      path: path.to_path_buf(),
      source,
    }
  }
}

/// `<dir>/<stem><suffix>`，例如 `out/img_10_result.jpg`
pub fn output_path(dir: &Path, image_path: &Path, suffix: &str) -> PathBuf {
  let stem = image_path
    .file_stem()
    .map(|s| s.to_string_lossy().into_owned())
    .unwrap_or_default();
  dir.join(format!("{}{}", stem, suffix))
}

pub enum OutputWrapper {
  #[cfg(feature = "save_image_file")]
  SaveResult(SaveResultOutput),
  #[cfg(feature = "show_result")]
  Show(ShowOutput),
}

impl Render<Request, Prediction> for OutputWrapper {
  type Error = OutputError;

  fn render_result(&self, frame: &Request, result: &Prediction) -> Result<(), Self::Error> {
    match self {
      #[cfg(feature = "save_image_file")]
      OutputWrapper::SaveResult(output) => output.render_result(frame, result),
      #[cfg(feature = "show_result")]
      OutputWrapper::Show(output) => output.render_result(frame, result),
    }
  }
}

impl Render<Request, Prediction> for Vec<OutputWrapper> {
  type Error = OutputError;

  fn render_result(&self, frame: &Request, result: &Prediction) -> Result<(), Self::Error> {
    for output in self {
      output.render_result(frame, result)?;
    }
    Ok(())
  }
}

#[cfg(test)]
mod tests {
  use super::*;

  #[test]
  fn output_path_uses_stem() {
    assert_eq!(
      output_path(Path::new("out"), Path::new("input/sub/img_10.jpg"), "_result.txt"),
      PathBuf::from("out/img_10_result.txt")
    );
    assert_eq!(
      output_path(Path::new("out"), Path::new("a.b.jpg"), "_show.jpg"),
      PathBuf::from("out/a.b_show.jpg")
    );
  }
}
