// 该文件是 Shanan （山南西风） 项目的一部分。
// src/input.rs - 图像输入
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

use image::{ImageReader, RgbImage};
use thiserror::Error;
use tracing::debug;

use crate::frame::{Frame, ImageMode};

#[cfg(feature = "read_image_file")]
mod read_image_file;
#[cfg(feature = "read_image_file")]
pub use self::read_image_file::ImageFolderInput;

#[derive(Error, Debug)]
pub enum InputError {
  #[error("I/O 错误 {path}: {source}")]
  IoError {
    path: PathBuf,
    source: std::io::Error,
  },
  #[error("图像解码错误 {path}: {source}")]
  ImageLoadError {
    path: PathBuf,
    source: image::ImageError,
  },
  #[error("遍历目录错误: {0}")]
  WalkError(#[from] walkdir::Error),
}

fn decode(path: &Path) -> Result<image::DynamicImage, InputError> {
  let reader = ImageReader::open(path).map_err(|source| InputError::IoError {
    path: path.to_path_buf(),
    source,
  })?;
  reader.decode().map_err(|source| InputError::ImageLoadError {
    path: path.to_path_buf(),
    source,
  })
}

/// 按照模型配置的颜色模式读取图像
pub fn read_frame(path: impl AsRef<Path>, mode: ImageMode) -> Result<Frame, InputError> {
  let path = path.as_ref();
  let frame = Frame::from_dynamic(decode(path)?, mode);
  debug!(
    "读取图像 {}: {}x{} ({:?})",
    path.display(),
    frame.height(),
    frame.width(),
    mode
  );
  Ok(frame)
}

/// 以 RGB 顺序读取原图，用于绘制结果
pub fn read_rgb(path: impl AsRef<Path>) -> Result<RgbImage, InputError> {
  Ok(decode(path.as_ref())?.to_rgb8())
}

#[cfg(test)]
mod tests {
  use super::*;
  use image::Rgb;

  #[test]
  fn read_frame_respects_mode() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("a.png");
    RgbImage::from_pixel(6, 4, Rgb([200, 100, 50])).save(&path).unwrap();

    let rgb = read_frame(&path, ImageMode::Rgb).unwrap();
    assert_eq!(rgb.shape(), (4, 6));
    assert_eq!(&rgb.as_hwc()[..3], &[200, 100, 50]);

    let bgr = read_frame(&path, ImageMode::Bgr).unwrap();
    assert_eq!(&bgr.as_hwc()[..3], &[50, 100, 200]);

    let gray = read_frame(&path, ImageMode::Gray).unwrap();
    assert_eq!(gray.channels(), 1);

    assert_eq!(read_rgb(&path).unwrap().get_pixel(0, 0), &Rgb([200, 100, 50]));
  }

  #[test]
  fn missing_file_is_io_error() {
    let err = read_frame("/nonexistent/a.jpg", ImageMode::Rgb).unwrap_err();
    assert!(matches!(err, InputError::IoError { .. }));
  }

  #[test]
  fn garbage_file_is_decode_error() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("broken.jpg");
    std::fs::write(&path, b"not an image").unwrap();
    let err = read_rgb(&path).unwrap_err();
    assert!(matches!(err, InputError::ImageLoadError { .. }));
  }
}
