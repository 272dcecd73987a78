// 该文件是 Shanan （山南西风） 项目的一部分。
// src/device.rs - 推理设备选择
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

use std::{fmt, str::FromStr};

use thiserror::Error;

#[derive(Error, Debug, PartialEq, Eq)]
pub enum DeviceError {
  #[error("无法识别的设备: {0}")]
  Unknown(String),
  #[error("无效的 GPU 编号: {0}")]
  InvalidId(String),
}

/// 设备类别
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DeviceKind {
  Cpu,
  Cuda,
}

/// 推理设备，`Cuda` 携带 GPU 编号
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum Device {
  #[default]
  Cpu,
  Cuda(i32),
}

impl Device {
  pub fn kind(&self) -> DeviceKind {
    match self {
      Device::Cpu => DeviceKind::Cpu,
      Device::Cuda(_) => DeviceKind::Cuda,
    }
  }

  pub fn is_accelerator(&self) -> bool {
    self.kind() != DeviceKind::Cpu
  }
}

impl fmt::Display for Device {
  fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
    match self {
      Device::Cpu => write!(f, "cpu"),
      Device::Cuda(id) => write!(f, "cuda:{}", id),
    }
  }
}

impl FromStr for Device {
  type Err = DeviceError;

  /// 支持 `cpu`、`cuda`、`cuda:N`、`gpu`、`gpu:N`
  fn from_str(s: &str) -> Result<Self, Self::Err> {
    let lower = s.trim().to_lowercase();
    let (name, id) = match lower.split_once(':') {
      Some((name, id)) => (name, Some(id)),
      None => (lower.as_str(), None),
    };

    match (name, id) {
      ("cpu", None) => Ok(Device::Cpu),
      ("cuda" | "gpu", None) => Ok(Device::Cuda(0)),
      ("cuda" | "gpu", Some(id)) => id
        .parse::<i32>()
        .ok()
        .filter(|id| *id >= 0)
        .map(Device::Cuda)
        .ok_or_else(|| DeviceError::InvalidId(id.to_string())),
      _ => Err(DeviceError::Unknown(s.to_string())),
    }
  }
}
