// 该文件是 Shanan （山南西风） 项目的一部分。
// src/model/dbnet.rs - DBNet 文本检测模型
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
  fmt::Display,
  path::{Path, PathBuf},
  time::Instant,
};

use ndarray::{Array2, Array4, Axis, Ix4};
use ort::{
  execution_providers::{CUDAExecutionProvider, ExecutionProvider},
  session::{Session, builder::GraphOptimizationLevel},
  value::TensorRef,
};
use thiserror::Error;
use tracing::{debug, info, warn};

use crate::{
  config::{Checkpoint, ConfigError},
  device::Device,
  frame::ImageMode,
  input::{InputError, read_frame},
  model::{Detections, Model, Prediction, Request, SegDetectorRepresenter},
  transform::{TransformError, TransformPipeline, resize_image},
};

#[derive(Error, Debug)]
pub enum DbNetError {
  #[error("配置错误: {0}")]
  Config(#[from] ConfigError),
  #[error("图像不存在: {0}")]
  ImageNotFound(PathBuf),
  #[error("图像读取错误: {0}")]
  Input(#[from] InputError),
  #[error("预处理错误: {0}")]
  Transform(#[from] TransformError),
  #[error("ONNX Runtime 错误: {0}")]
  Runtime(String),
  #[error("模型输出形状无效: {0:?}")]
  OutputShape(Vec<usize>),
}

impl DbNetError {
  fn runtime<E: Display>(err: E) -> Self {
    DbNetError::Runtime(err.to_string())
  }
}

pub struct DbNetBuilder {
  checkpoint: Checkpoint,
  device: Device,
}

impl DbNetBuilder {
  pub fn from_checkpoint(path: impl AsRef<Path>) -> Result<Self, DbNetError> {
    Ok(DbNetBuilder {
      checkpoint: Checkpoint::load(path)?,
      device: Device::default(),
    })
  }

  pub fn device(mut self, device: Device) -> Self {
    self.device = device;
    self
  }

  pub fn build(self) -> Result<DbNet, DbNetError> {
    let config = &self.checkpoint.config;
    info!(
      "模型结构: {} (backbone: {})",
      config.arch.kind,
      config.arch.args.backbone.as_deref().unwrap_or("-")
    );

    let device = resolve_device(self.device);
    // 默认环境由 Session::builder 按需创建，初始化失败同样作为运行时错误返回
    let mut builder = Session::builder()
      .map_err(DbNetError::runtime)?
      .with_optimization_level(GraphOptimizationLevel::Level3)
      .map_err(DbNetError::runtime)?;

    if let Device::Cuda(id) = device {
      builder = builder
        .with_execution_providers([CUDAExecutionProvider::default()
          .with_device_id(id)
          .build()
          .error_on_failure()])
        .map_err(DbNetError::runtime)?;
    }

    info!("加载模型权重: {}", self.checkpoint.state_dict.display());
    let session = builder
      .commit_from_file(&self.checkpoint.state_dict)
      .map_err(DbNetError::runtime)?;
    info!("模型加载完成，设备: {}", device);

    let transforms = config.transforms()?;
    debug!("预处理步骤: {:?}", transforms.steps());

    Ok(DbNet {
      session,
      device,
      img_mode: config.img_mode(),
      transforms,
      post_process: SegDetectorRepresenter::from(config.post_processing.args),
    })
  }
}

/// 请求 CUDA 但执行器不可用时回退到 CPU
fn resolve_device(requested: Device) -> Device {
  match requested {
    Device::Cpu => Device::Cpu,
    Device::Cuda(id) => match CUDAExecutionProvider::default().is_available() {
      Ok(true) => Device::Cuda(id),
      Ok(false) => {
        warn!("CUDA 执行器不可用，回退到 CPU");
        Device::Cpu
      }
      Err(e) => {
        warn!("查询 CUDA 执行器失败: {}，回退到 CPU", e);
        Device::Cpu
      }
    },
  }
}

pub struct DbNet {
  session: Session,
  device: Device,
  img_mode: ImageMode,
  transforms: TransformPipeline,
  post_process: SegDetectorRepresenter,
}

impl DbNet {
  pub fn device(&self) -> Device {
    self.device
  }

  /// 对单张图片进行文本检测
  pub fn predict(
    &mut self,
    image_path: impl AsRef<Path>,
    is_output_polygon: bool,
    short_size: u32,
  ) -> Result<Prediction, DbNetError> {
    let image_path = image_path.as_ref();
    if !image_path.exists() {
      return Err(DbNetError::ImageNotFound(image_path.to_path_buf()));
    }

    let frame = read_frame(image_path, self.img_mode)?;
    let shape = frame.shape();
    let tensor = self.transforms.run(&resize_image(&frame, short_size))?;
    debug!("输入张量形状: {:?}", tensor.shape());

    let now = Instant::now();
    let preds = self.forward(&tensor)?;
    let score_map = preds.index_axis(Axis(0), 0).index_axis(Axis(0), 0).to_owned();
    let detections = post_process(&self.post_process, &score_map, shape, is_output_polygon);
    let elapsed = now.elapsed();

    debug!(
      "{}: {} 个文本框，耗时 {:.2?}",
      image_path.display(),
      detections.len(),
      elapsed
    );

    Ok(Prediction {
      score_map,
      detections,
      elapsed,
    })
  }

  fn forward(&mut self, tensor: &Array4<f32>) -> Result<Array4<f32>, DbNetError> {
    let input = TensorRef::from_array_view(tensor.view()).map_err(DbNetError::runtime)?;
    let outputs = self
      .session
      .run(ort::inputs![input])
      .map_err(DbNetError::runtime)?;
    let output = outputs[0]
      .try_extract_array::<f32>()
      .map_err(DbNetError::runtime)?
      .into_owned();

    let shape = output.shape().to_vec();
    let preds = output
      .into_dimensionality::<Ix4>()
      .map_err(|_| DbNetError::OutputShape(shape.clone()))?;
    if preds.shape()[0] == 0 || preds.shape()[1] == 0 {
      return Err(DbNetError::OutputShape(shape));
    }
    debug!("输出张量形状: {:?}", preds.shape());
    Ok(preds)
  }
}

/// 后处理并剔除无效框，计入推理耗时
fn post_process(
  representer: &SegDetectorRepresenter,
  score_map: &Array2<f32>,
  shape: (usize, usize),
  is_output_polygon: bool,
) -> Detections {
  let mut detections = representer.represent(&score_map.view(), shape, is_output_polygon);
  filter_degenerate(&mut detections);
  detections
}

/// 剔除后处理留下的全零框
fn filter_degenerate(detections: &mut Detections) {
  let before = detections.len();
  detections.retain_valid();
  if before != detections.len() {
    debug!("剔除 {} 个无效框", before - detections.len());
  }
}

impl Model for DbNet {
  type Input = Request;
  type Output = Prediction;
  type Error = DbNetError;

  fn infer(&mut self, input: &Self::Input) -> Result<Self::Output, Self::Error> {
    self.predict(&input.path, input.is_output_polygon, input.short_size)
  }
}
