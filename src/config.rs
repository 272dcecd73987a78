// 该文件是 Shanan （山南西风） 项目的一部分。
// src/config.rs - 检查点与模型配置
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

//! 检查点文件是一个 JSON 文档：
//!
//! ```json
//! {
//!   "config": {
//!     "arch": { "type": "Model", "args": { "backbone": "resnet18", "pretrained": true } },
//!     "post_processing": {
//!       "type": "SegDetectorRepresenter",
//!       "args": { "thresh": 0.3, "box_thresh": 0.7, "max_candidates": 1000, "unclip_ratio": 1.5 }
//!     },
//!     "dataset": { "train": { "dataset": { "args": {
//!       "img_mode": "RGB",
//!       "transforms": [
//!         { "type": "ToTensor", "args": {} },
//!         { "type": "Normalize", "args": { "mean": [0.485, 0.456, 0.406], "std": [0.229, 0.224, 0.225] } }
//!       ]
//!     } } } }
//!   },
//!   "state_dict": "model_best.onnx"
//! }
//! ```
//!
//! `state_dict` 指向导出的 ONNX 权重，相对路径以检查点所在目录为基准。

use std::path::{Path, PathBuf};

use serde::Deserialize;
use thiserror::Error;
use tracing::{debug, info};

use crate::{
  frame::ImageMode,
  transform::{TransformError, TransformPipeline},
};

pub const SEG_DETECTOR_REPRESENTER: &str = "SegDetectorRepresenter";

#[derive(Error, Debug)]
pub enum ConfigError {
  #[error("无法读取检查点 {path}: {source}")]
  Io {
    path: PathBuf,
    source: std::io::Error,
  },
  #[error("检查点格式错误: {0}")]
  Parse(#[from] serde_json::Error),
  #[error("不支持的后处理类型: {0}")]
  UnsupportedPostProcessing(String),
  #[error("配置项 {key} 无效: {reason}")]
  InvalidValue { key: &'static str, reason: String },
  #[error("预处理配置错误: {0}")]
  Transform(#[from] TransformError),
  #[error("模型权重文件不存在: {0}")]
  WeightsNotFound(PathBuf),
}

impl ConfigError {
  fn invalid(key: &'static str, reason: impl Into<String>) -> Self {
    ConfigError::InvalidValue {
      key,
      reason: reason.into(),
    }
  }
}

/// 检查点：模型配置和权重位置
#[derive(Debug, Clone, Deserialize)]
pub struct Checkpoint {
  pub config: DbNetConfig,
  pub state_dict: PathBuf,
}

#[derive(Debug, Clone, Deserialize)]
pub struct DbNetConfig {
  pub arch: ArchConfig,
  pub post_processing: PostProcessingConfig,
  pub dataset: DatasetConfig,
}

#[derive(Debug, Clone, Deserialize)]
pub struct ArchConfig {
  #[serde(rename = "type")]
  pub kind: String,
  pub args: ArchArgs,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct ArchArgs {
  #[serde(default)]
  pub pretrained: bool,
  #[serde(default)]
  pub backbone: Option<String>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct PostProcessingConfig {
  #[serde(rename = "type")]
  pub kind: String,
  pub args: SegDetectorArgs,
}

/// `SegDetectorRepresenter` 的参数
#[derive(Debug, Clone, Copy, PartialEq, Deserialize)]
pub struct SegDetectorArgs {
  #[serde(default = "default_thresh")]
  pub thresh: f32,
  #[serde(default = "default_box_thresh")]
  pub box_thresh: f32,
  #[serde(default = "default_max_candidates")]
  pub max_candidates: usize,
  #[serde(default = "default_unclip_ratio")]
  pub unclip_ratio: f32,
}

fn default_thresh() -> f32 {
  0.3
}

fn default_box_thresh() -> f32 {
  0.7
}

fn default_max_candidates() -> usize {
  1000
}

fn default_unclip_ratio() -> f32 {
  1.5
}

impl Default for SegDetectorArgs {
  fn default() -> Self {
    Self {
      thresh: default_thresh(),
      box_thresh: default_box_thresh(),
      max_candidates: default_max_candidates(),
      unclip_ratio: default_unclip_ratio(),
    }
  }
}

#[derive(Debug, Clone, Deserialize)]
pub struct DatasetConfig {
  pub train: TrainConfig,
}

#[derive(Debug, Clone, Deserialize)]
pub struct TrainConfig {
  pub dataset: DatasetEntry,
}

#[derive(Debug, Clone, Deserialize)]
pub struct DatasetEntry {
  pub args: DatasetArgs,
}

#[derive(Debug, Clone, Deserialize)]
pub struct DatasetArgs {
  pub img_mode: ImageMode,
  pub transforms: Vec<TransformSpec>,
}

/// 预处理配置项，参数保持原样，由 [`crate::transform::Transform`] 解析
#[derive(Debug, Clone, Deserialize)]
pub struct TransformSpec {
  #[serde(rename = "type")]
  pub kind: String,
  #[serde(default)]
  pub args: serde_json::Value,
}

impl Checkpoint {
  /// 读取并校验检查点，`state_dict` 解析为绝对或相对于检查点目录的路径
  pub fn load(path: impl AsRef<Path>) -> Result<Self, ConfigError> {
    let path = path.as_ref();
    info!("加载检查点: {}", path.display());
    let text = std::fs::read_to_string(path).map_err(|source| ConfigError::Io {
      path: path.to_path_buf(),
      source,
    })?;

    let base_dir = path.parent().unwrap_or_else(|| Path::new(""));
    let checkpoint = Self::from_json_str(&text, base_dir)?;

    if !checkpoint.state_dict.is_file() {
      return Err(ConfigError::WeightsNotFound(checkpoint.state_dict));
    }

    Ok(checkpoint)
  }

  /// 解析并校验，不检查权重文件是否存在
  pub fn from_json_str(text: &str, base_dir: &Path) -> Result<Self, ConfigError> {
    let mut checkpoint: Checkpoint = serde_json::from_str(text)?;

    if checkpoint.state_dict.is_relative() {
      checkpoint.state_dict = base_dir.join(&checkpoint.state_dict);
    }
    // 推理时不加载预训练骨干网络
    checkpoint.config.arch.args.pretrained = false;

    checkpoint.config.validate()?;
    debug!("检查点配置: {:?}", checkpoint.config);
    Ok(checkpoint)
  }
}

impl DbNetConfig {
  pub fn img_mode(&self) -> ImageMode {
    self.dataset.train.dataset.args.img_mode
  }

  pub fn transform_specs(&self) -> &[TransformSpec] {
    &self.dataset.train.dataset.args.transforms
  }

  pub fn transforms(&self) -> Result<TransformPipeline, ConfigError> {
    Ok(TransformPipeline::from_specs(self.transform_specs())?)
  }

  pub fn validate(&self) -> Result<(), ConfigError> {
    if self.post_processing.kind != SEG_DETECTOR_REPRESENTER {
      return Err(ConfigError::UnsupportedPostProcessing(
        self.post_processing.kind.clone(),
      ));
    }

    let args = &self.post_processing.args;
    if !(0.0..1.0).contains(&args.thresh) {
      return Err(ConfigError::invalid(
        "post_processing.args.thresh",
        format!("{} 不在 [0, 1) 范围内", args.thresh),
      ));
    }
    if !(0.0..1.0).contains(&args.box_thresh) {
      return Err(ConfigError::invalid(
        "post_processing.args.box_thresh",
        format!("{} 不在 [0, 1) 范围内", args.box_thresh),
      ));
    }
    if args.max_candidates == 0 {
      return Err(ConfigError::invalid(
        "post_processing.args.max_candidates",
        "必须大于 0",
      ));
    }
    if !(args.unclip_ratio.is_finite() && args.unclip_ratio > 0.0) {
      return Err(ConfigError::invalid(
        "post_processing.args.unclip_ratio",
        format!("{} 必须为正数", args.unclip_ratio),
      ));
    }

    self.transforms()?;
    Ok(())
  }
}

#[cfg(test)]
mod tests {
  use super::*;
  use crate::transform::Transform;
  use serde_json::json;

  fn checkpoint_json() -> serde_json::Value {
    json!({
      "config": {
        "arch": { "type": "Model", "args": { "backbone": "resnet18", "pretrained": true } },
        "post_processing": {
          "type": "SegDetectorRepresenter",
          "args": { "thresh": 0.3, "box_thresh": 0.7, "max_candidates": 1000, "unclip_ratio": 1.5 }
        },
        "dataset": { "train": { "dataset": {
          "type": "ICDAR2015Dataset",
          "args": {
            "data_path": ["./datasets/train.txt"],
            "img_mode": "RGB",
            "transforms": [
              { "type": "ToTensor", "args": {} },
              { "type": "Normalize", "args": { "mean": [0.485, 0.456, 0.406], "std": [0.229, 0.224, 0.225] } }
            ]
          }
        } } }
      },
      "state_dict": "model_best.onnx"
    })
  }

  fn parse(value: serde_json::Value) -> Result<Checkpoint, ConfigError> {
    Checkpoint::from_json_str(&value.to_string(), Path::new("/models"))
  }

  #[test]
  fn parse_full_checkpoint() {
    let checkpoint = parse(checkpoint_json()).unwrap();
    assert_eq!(checkpoint.state_dict, PathBuf::from("/models/model_best.onnx"));
    assert!(!checkpoint.config.arch.args.pretrained);
    assert_eq!(checkpoint.config.arch.args.backbone.as_deref(), Some("resnet18"));
    assert_eq!(checkpoint.config.img_mode(), ImageMode::Rgb);
    assert_eq!(checkpoint.config.post_processing.args, SegDetectorArgs::default());

    let pipeline = checkpoint.config.transforms().unwrap();
    assert_eq!(pipeline.steps()[0], Transform::ToTensor);
    assert_eq!(pipeline.steps().len(), 2);
  }

  #[test]
  fn absolute_weights_path_is_kept() {
    let mut value = checkpoint_json();
    value["state_dict"] = json!("/opt/dbnet/weights.onnx");
    let checkpoint = parse(value).unwrap();
    assert_eq!(checkpoint.state_dict, PathBuf::from("/opt/dbnet/weights.onnx"));
  }

  #[test]
  fn post_processing_args_have_defaults() {
    let mut value = checkpoint_json();
    value["config"]["post_processing"]["args"] = json!({ "box_thresh": 0.5 });
    let args = parse(value).unwrap().config.post_processing.args;
    assert_eq!(args.thresh, 0.3);
    assert_eq!(args.box_thresh, 0.5);
    assert_eq!(args.max_candidates, 1000);
    assert_eq!(args.unclip_ratio, 1.5);
  }

  #[test]
  fn missing_keys_are_reported() {
    let mut value = checkpoint_json();
    value["config"]["dataset"]["train"]["dataset"]["args"]
      .as_object_mut()
      .unwrap()
      .remove("img_mode");
    let err = parse(value).unwrap_err();
    assert!(matches!(err, ConfigError::Parse(_)));
    assert!(err.to_string().contains("img_mode"));

    let mut value = checkpoint_json();
    value.as_object_mut().unwrap().remove("state_dict");
    assert!(parse(value).unwrap_err().to_string().contains("state_dict"));

    for (parent, key) in [
      ("/config/dataset/train/dataset/args", "transforms"),
      ("/config/arch", "args"),
      ("/config/post_processing", "args"),
    ] {
      let mut value = checkpoint_json();
      value
        .pointer_mut(parent)
        .and_then(|v| v.as_object_mut())
        .unwrap()
        .remove(key);
      let err = parse(value).unwrap_err();
      assert!(matches!(err, ConfigError::Parse(_)), "{}/{}", parent, key);
      assert!(err.to_string().contains(key), "{}", err);
    }
  }

  #[test]
  fn unsupported_post_processing_is_rejected() {
    let mut value = checkpoint_json();
    value["config"]["post_processing"]["type"] = json!("PSEPostProcess");
    assert!(matches!(
      parse(value),
      Err(ConfigError::UnsupportedPostProcessing(kind)) if kind == "PSEPostProcess"
    ));
  }

  #[test]
  fn invalid_thresholds_are_rejected() {
    for (key, bad) in [
      ("thresh", json!(1.5)),
      ("box_thresh", json!(-0.1)),
      ("max_candidates", json!(0)),
      ("unclip_ratio", json!(0.0)),
    ] {
      let mut value = checkpoint_json();
      value["config"]["post_processing"]["args"][key] = bad;
      assert!(
        matches!(parse(value), Err(ConfigError::InvalidValue { .. })),
        "{} should be rejected",
        key
      );
    }
  }

  #[test]
  fn invalid_transform_is_rejected() {
    let mut value = checkpoint_json();
    value["config"]["dataset"]["train"]["dataset"]["args"]["transforms"][1]["args"]["std"] =
      json!([0.0, 0.0, 0.0]);
    assert!(matches!(parse(value), Err(ConfigError::Transform(_))));
  }

  #[test]
  fn load_reports_missing_files() {
    let dir = tempfile::tempdir().unwrap();
    let missing = dir.path().join("model_best.json");
    assert!(matches!(
      Checkpoint::load(&missing),
      Err(ConfigError::Io { .. })
    ));

    std::fs::write(&missing, checkpoint_json().to_string()).unwrap();
    assert!(matches!(
      Checkpoint::load(&missing),
      Err(ConfigError::WeightsNotFound(path)) if path == dir.path().join("model_best.onnx")
    ));

    std::fs::write(dir.path().join("model_best.onnx"), b"onnx").unwrap();
    let checkpoint = Checkpoint::load(&missing).unwrap();
    assert_eq!(checkpoint.state_dict, dir.path().join("model_best.onnx"));
  }
}
