// 该文件是 Shanan （山南西风） 项目的一部分。
// src/frame.rs - HWC 帧定义
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

use image::{DynamicImage, GrayImage, RgbImage, imageops::FilterType};
use serde::Deserialize;

const RGB_CHANNELS: usize = 3;
const GRAY_CHANNELS: usize = 1;

/// 图像读取模式，对应配置中的 `img_mode`
#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize)]
pub enum ImageMode {
  #[serde(rename = "RGB")]
  Rgb,
  #[serde(rename = "BGR")]
  Bgr,
  #[serde(rename = "GRAY")]
  Gray,
}

/// HWC 排布的 8 位图像帧
///
/// `Bgr` 变体在 `RgbImage` 缓冲区中按 B、G、R 顺序存放像素。
#[derive(Debug, Clone)]
pub enum Frame {
  Rgb(RgbImage),
  Bgr(RgbImage),
  Gray(GrayImage),
}

impl Frame {
  /// 按照读取模式转换解码后的图像
  pub fn from_dynamic(image: DynamicImage, mode: ImageMode) -> Self {
    match mode {
      ImageMode::Rgb => Frame::Rgb(image.to_rgb8()),
      ImageMode::Bgr => {
        let mut image = image.to_rgb8();
        for pixel in image.pixels_mut() {
          pixel.0.swap(0, 2);
        }
        Frame::Bgr(image)
      }
      ImageMode::Gray => Frame::Gray(image.to_luma8()),
    }
  }

  pub fn mode(&self) -> ImageMode {
    match self {
      Frame::Rgb(_) => ImageMode::Rgb,
      Frame::Bgr(_) => ImageMode::Bgr,
      Frame::Gray(_) => ImageMode::Gray,
    }
  }

  pub fn height(&self) -> usize {
    match self {
      Frame::Rgb(image) | Frame::Bgr(image) => image.height() as usize,
      Frame::Gray(image) => image.height() as usize,
    }
  }

  pub fn width(&self) -> usize {
    match self {
      Frame::Rgb(image) | Frame::Bgr(image) => image.width() as usize,
      Frame::Gray(image) => image.width() as usize,
    }
  }

  pub fn channels(&self) -> usize {
    match self {
      Frame::Rgb(_) | Frame::Bgr(_) => RGB_CHANNELS,
      Frame::Gray(_) => GRAY_CHANNELS,
    }
  }

  /// (height, width)
  pub fn shape(&self) -> (usize, usize) {
    (self.height(), self.width())
  }

  pub fn as_hwc(&self) -> &[u8] {
    match self {
      Frame::Rgb(image) | Frame::Bgr(image) => image.as_raw(),
      Frame::Gray(image) => image.as_raw(),
    }
  }

  /// 双线性缩放到指定尺寸，保持通道顺序不变
  pub fn resize(&self, height: u32, width: u32) -> Frame {
    match self {
      Frame::Rgb(image) => Frame::Rgb(image::imageops::resize(
        image,
        width,
        height,
        FilterType::Triangle,
      )),
      Frame::Bgr(image) => Frame::Bgr(image::imageops::resize(
        image,
        width,
        height,
        FilterType::Triangle,
      )),
      Frame::Gray(image) => Frame::Gray(image::imageops::resize(
        image,
        width,
        height,
        FilterType::Triangle,
      )),
    }
  }
}
