// 该文件是 Shanan （山南西风） 项目的一部分。
// src/bin/dbnet_predict.rs - 目录批量文本检测
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

use anyhow::Result;
use clap::Parser;
use tracing::info;
use tracing_subscriber::EnvFilter;

use shanan_dbnet::{
  device::Device,
  input::ImageFolderInput,
  model::DbNetBuilder,
  output::{OutputWrapper, SaveResultOutput, ShowOutput},
  task::{FolderTask, Task},
  transform::DEFAULT_SHORT_SIZE,
};

/// DBNet 文本检测参数配置
#[derive(Parser, Debug)]
#[command(author, version, about, long_about = None)]
pub struct Args {
  /// 检查点文件路径（JSON 配置，引用 ONNX 权重）
  #[arg(long = "model_path", default_value = "model_best.json", value_name = "FILE")]
  pub model_path: PathBuf,
  /// 输入图片目录，递归查找 *.jpg
  #[arg(long = "input_folder", default_value = "./input", value_name = "DIR")]
  pub input_folder: PathBuf,
  /// 结果输出目录
  #[arg(long = "output_folder", default_value = "./input", value_name = "DIR")]
  pub output_folder: PathBuf,
  /// 输出多边形而不是四边形
  #[arg(long)]
  pub polygon: bool,
  /// 保存概率图和可视化结果
  #[arg(long)]
  pub show: bool,
  /// 保存绘制结果和文本框坐标
  #[arg(long = "save_resut", visible_alias = "save_result")]
  pub save_result: bool,
  /// 推理设备: cpu, cuda, cuda:N
  #[arg(long, default_value = "cuda:0", value_name = "DEVICE")]
  pub device: Device,
  /// 缩放后短边长度
  #[arg(long = "short_size", default_value_t = DEFAULT_SHORT_SIZE, value_name = "PIXELS")]
  pub short_size: u32,
}

fn main() -> Result<()> {
  tracing_subscriber::fmt()
    .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
    .init();

  let args = Args::parse();
  info!("{:?}", args);

  let model = DbNetBuilder::from_checkpoint(&args.model_path)?
    .device(args.device)
    .build()?;
  let input = ImageFolderInput::from_dir(&args.input_folder)?;

  let mut outputs = Vec::new();
  if args.show {
    outputs.push(OutputWrapper::Show(ShowOutput::new(&args.output_folder)));
  }
  if args.save_result {
    outputs.push(OutputWrapper::SaveResult(SaveResultOutput::new(
      &args.output_folder,
    )));
  }

  FolderTask.run_task(
    input.into_requests(args.polygon, args.short_size),
    model,
    outputs,
  )?;

  Ok(())
}
