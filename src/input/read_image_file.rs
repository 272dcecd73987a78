// 该文件是 Shanan （山南西风） 项目的一部分。
// src/input/read_image_file.rs - 图像目录输入
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

use tracing::{info, warn};
use walkdir::WalkDir;

use crate::{input::InputError, model::Request};

const IMAGE_EXTENSION: &str = "jpg";

/// 递归收集目录下的所有 `.jpg` 文件，按路径排序
pub struct ImageFolderInput {
  paths: Vec<PathBuf>,
}

impl ImageFolderInput {
  pub fn from_dir(dir: impl AsRef<Path>) -> Result<Self, InputError> {
    let dir = dir.as_ref();
    if !dir.is_dir() {
      warn!("输入目录不存在: {}，没有图片需要处理", dir.display());
      return Ok(ImageFolderInput { paths: Vec::new() });
    }

    let mut paths = Vec::new();
    for entry in WalkDir::new(dir) {
      let entry = entry?;
      if entry.file_type().is_file()
        && entry.path().extension().and_then(|ext| ext.to_str()) == Some(IMAGE_EXTENSION)
      {
        paths.push(entry.into_path());
      }
    }
    paths.sort();

    info!("在 {} 中找到 {} 张图片", dir.display(), paths.len());
    Ok(ImageFolderInput { paths })
  }

  pub fn paths(&self) -> &[PathBuf] {
    &self.paths
  }

  pub fn len(&self) -> usize {
    self.paths.len()
  }

  pub fn is_empty(&self) -> bool {
    self.paths.is_empty()
  }

  /// 为每张图片生成推理请求
  pub fn into_requests(
    self,
    is_output_polygon: bool,
    short_size: u32,
  ) -> impl Iterator<Item = Request> {
    self.paths.into_iter().map(move |path| {
      Request::new(path)
        .polygon(is_output_polygon)
        .short_size(short_size)
    })
  }
}

#[cfg(test)]
mod tests {
  use super::*;

  fn touch(path: &Path) {
    if let Some(parent) = path.parent() {
      std::fs::create_dir_all(parent).unwrap();
    }
    std::fs::write(path, b"").unwrap();
  }

  #[test]
  fn collects_jpg_recursively_and_sorted() {
    let dir = tempfile::tempdir().unwrap();
    touch(&dir.path().join("b.jpg"));
    touch(&dir.path().join("a.jpg"));
    touch(&dir.path().join("c.png"));
    touch(&dir.path().join("d.jpeg"));
    touch(&dir.path().join("sub/e.jpg"));
    std::fs::create_dir_all(dir.path().join("dir.jpg")).unwrap();

    let input = ImageFolderInput::from_dir(dir.path()).unwrap();
    let names: Vec<_> = input
      .paths()
      .iter()
      .map(|p| p.strip_prefix(dir.path()).unwrap().to_path_buf())
      .collect();
    assert_eq!(
      names,
      vec![
        PathBuf::from("a.jpg"),
        PathBuf::from("b.jpg"),
        PathBuf::from("sub/e.jpg")
      ]
    );
  }

  #[test]
  fn empty_folder_yields_no_requests() {
    let dir = tempfile::tempdir().unwrap();
    let input = ImageFolderInput::from_dir(dir.path()).unwrap();
    assert!(input.is_empty());
    assert_eq!(input.into_requests(false, 736).count(), 0);
  }

  #[test]
  fn requests_carry_options() {
    let dir = tempfile::tempdir().unwrap();
    touch(&dir.path().join("x.jpg"));
    let requests: Vec<_> = ImageFolderInput::from_dir(dir.path())
      .unwrap()
      .into_requests(true, 640)
      .collect();
    assert_eq!(requests.len(), 1);
    assert!(requests[0].is_output_polygon);
    assert_eq!(requests[0].short_size, 640);
  }

  #[test]
  fn missing_folder_yields_no_images() {
    let dir = tempfile::tempdir().unwrap();
    let input = ImageFolderInput::from_dir(dir.path().join("missing")).unwrap();
    assert!(input.is_empty());
  }
}
