// 该文件是 Shanan （山南西风） 项目的一部分。
// src/transform.rs - 图像缩放与预处理流水线
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

use ndarray::{Array3, Array4, Axis};
use serde::Deserialize;
use thiserror::Error;
use tracing::debug;

use crate::{config::TransformSpec, frame::Frame};

/// 网络的下采样步长，输入尺寸必须是它的整数倍
pub const STRIDE: u32 = 32;

pub const DEFAULT_SHORT_SIZE: u32 = 736;

const DEFAULT_MEAN: [f32; 3] = [0.485, 0.456, 0.406];
const DEFAULT_STD: [f32; 3] = [0.229, 0.224, 0.225];

#[derive(Error, Debug)]
pub enum TransformError {
  #[error("{kind} 参数无效: {source}")]
  InvalidArgs {
    kind: String,
    source: serde_json::Error,
  },
  #[error("Normalize 的 std 不能为 0")]
  ZeroStd,
  #[error("Normalize 的 mean 与 std 长度不一致: {mean} != {std}")]
  LengthMismatch { mean: usize, std: usize },
  #[error("Normalize 参数有 {params} 个通道，但图像有 {channels} 个通道")]
  ChannelMismatch { params: usize, channels: usize },
  #[error("Normalize 必须位于 ToTensor 之后")]
  NormalizeBeforeToTensor,
}

/// 计算缩放后的 (height, width)
///
/// 较短的一边缩放到 `short_size`，另一边按比例缩放后向上取整到 32 的倍数。
pub fn resized_shape(height: usize, width: usize, short_size: u32) -> (u32, u32) {
  let short = short_size as f64;
  let stride = STRIDE as f64;
  if height < width {
    let new_width = (short / height as f64 * width as f64 / stride).ceil() * stride;
    (short_size, new_width as u32)
  } else {
    let new_height = (short / width as f64 * height as f64 / stride).ceil() * stride;
    (new_height as u32, short_size)
  }
}

/// 将图像缩放到满足网络步长要求的尺寸
pub fn resize_image(frame: &Frame, short_size: u32) -> Frame {
  let (height, width) = frame.shape();
  let (new_height, new_width) = resized_shape(height, width, short_size);
  debug!(
    "缩放图像: {}x{} -> {}x{}",
    height, width, new_height, new_width
  );
  frame.resize(new_height, new_width)
}

#[derive(Debug, Deserialize)]
struct NormalizeArgs {
  #[serde(default = "default_mean")]
  mean: Vec<f32>,
  #[serde(default = "default_std")]
  std: Vec<f32>,
}

fn default_mean() -> Vec<f32> {
  DEFAULT_MEAN.to_vec()
}

fn default_std() -> Vec<f32> {
  DEFAULT_STD.to_vec()
}

/// 推理时保留的预处理步骤
#[derive(Debug, Clone, PartialEq)]
pub enum Transform {
  /// HWC u8 -> CHW f32，数值缩放到 [0, 1]
  ToTensor,
  /// 逐通道 `(x - mean) / std`
  Normalize { mean: Vec<f32>, std: Vec<f32> },
}

impl Transform {
  /// 从配置项构造预处理步骤，训练用的数据增强返回 `None`
  pub fn from_spec(spec: &TransformSpec) -> Result<Option<Self>, TransformError> {
    match spec.kind.as_str() {
      "ToTensor" => Ok(Some(Transform::ToTensor)),
      "Normalize" => {
        let args = if spec.args.is_null() {
          NormalizeArgs {
            mean: default_mean(),
            std: default_std(),
          }
        } else {
          serde_json::from_value::<NormalizeArgs>(spec.args.clone()).map_err(|source| {
            TransformError::InvalidArgs {
              kind: spec.kind.clone(),
              source,
            }
          })?
        };

        if args.mean.len() != args.std.len() {
          return Err(TransformError::LengthMismatch {
            mean: args.mean.len(),
            std: args.std.len(),
          });
        }
        if args.std.iter().any(|s| *s == 0.0) {
          return Err(TransformError::ZeroStd);
        }

        Ok(Some(Transform::Normalize {
          mean: args.mean,
          std: args.std,
        }))
      }
      other => {
        debug!("推理时忽略预处理步骤: {}", other);
        Ok(None)
      }
    }
  }
}

/// 由 `ToTensor` 和 `Normalize` 组成的预处理流水线
#[derive(Debug, Clone, PartialEq)]
pub struct TransformPipeline {
  steps: Vec<Transform>,
}

impl Default for TransformPipeline {
  fn default() -> Self {
    Self {
      steps: vec![Transform::ToTensor],
    }
  }
}

impl TransformPipeline {
  /// 按配置顺序构造，缺少 `ToTensor` 时补在最前面
  pub fn from_specs(specs: &[TransformSpec]) -> Result<Self, TransformError> {
    let mut steps = Vec::new();
    for spec in specs {
      if let Some(step) = Transform::from_spec(spec)? {
        steps.push(step);
      }
    }

    match steps.iter().position(|s| *s == Transform::ToTensor) {
      Some(to_tensor) => {
        if steps[..to_tensor]
          .iter()
          .any(|s| matches!(s, Transform::Normalize { .. }))
        {
          return Err(TransformError::NormalizeBeforeToTensor);
        }
      }
      None => {
        if steps.iter().any(|s| matches!(s, Transform::Normalize { .. })) {
          return Err(TransformError::NormalizeBeforeToTensor);
        }
        debug!("配置中没有 ToTensor，自动补充");
        steps.insert(0, Transform::ToTensor);
      }
    }

    Ok(Self { steps })
  }

  pub fn steps(&self) -> &[Transform] {
    &self.steps
  }

  /// 预处理并添加 batch 维度，输出 `[1, C, H, W]`
  pub fn run(&self, frame: &Frame) -> Result<Array4<f32>, TransformError> {
    let mut tensor = to_tensor(frame);
    for step in &self.steps {
      match step {
        // 已在循环前完成
        Transform::ToTensor => {}
        Transform::Normalize { mean, std } => normalize(&mut tensor, mean, std)?,
      }
    }
    Ok(tensor.insert_axis(Axis(0)))
  }
}

/// HWC u8 -> CHW f32 / 255
pub fn to_tensor(frame: &Frame) -> Array3<f32> {
  let (height, width) = frame.shape();
  let channels = frame.channels();
  let data = frame.as_hwc();
  Array3::from_shape_fn((channels, height, width), |(c, h, w)| {
    data[(h * width + w) * channels + c] as f32 / 255.0
  })
}

fn normalize(tensor: &mut Array3<f32>, mean: &[f32], std: &[f32]) -> Result<(), TransformError> {
  let channels = tensor.shape()[0];
  // 单个数值时广播到所有通道
  let broadcast = mean.len() == 1;
  if !broadcast && mean.len() != channels {
    return Err(TransformError::ChannelMismatch {
      params: mean.len(),
      channels,
    });
  }

  for (c, mut plane) in tensor.axis_iter_mut(Axis(0)).enumerate() {
    let idx = if broadcast { 0 } else { c };
    let (m, s) = (mean[idx], std[idx]);
    plane.mapv_inplace(|x| (x - m) / s);
  }
  Ok(())
}
