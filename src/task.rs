// 该文件是 Shanan （山南西风） 项目的一部分。
// src/task.rs - 推理任务
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

use std::time::Duration;

use tracing::info;

use crate::{
  model::{Model, Prediction, Request},
  output::Render,
};

pub trait Task<I, M, O>: Sized {
  type Error;
  type Summary;
  fn run_task(self, input: I, model: M, output: O) -> Result<Self::Summary, Self::Error>;
}

/// 任务统计
#[derive(Debug, Default, Clone, PartialEq)]
pub struct TaskSummary {
  pub images: usize,
  pub detections: usize,
  pub total_time: Duration,
}

impl TaskSummary {
  fn record(&mut self, prediction: &Prediction) {
    self.images += 1;
    self.detections += prediction.detections.len();
    self.total_time += prediction.elapsed;
  }

  pub fn mean_time(&self) -> Option<Duration> {
    (self.images > 0).then(|| self.total_time / self.images as u32)
  }
}

/// 逐张处理目录中的图片，任意一张失败即终止
#[derive(Default, Debug)]
pub struct FolderTask;

impl<
  ME: std::error::Error + Sync + Send + 'static,
  RE: std::error::Error + Sync + Send + 'static,
  I: Iterator<Item = Request>,
  M: Model<Input = Request, Output = Prediction, Error = ME>,
  O: Render<Request, Prediction, Error = RE>,
> Task<I, M, O> for FolderTask
{
  type Error = anyhow::Error;
  type Summary = TaskSummary;

  fn run_task(self, input: I, mut model: M, output: O) -> Result<Self::Summary, Self::Error> {
    info!("开始任务...");
    let mut summary = TaskSummary::default();

    for request in input {
      let prediction = model.infer(&request)?;
      info!(
        "{}: {} 个文本框，耗时 {:.4} 秒",
        request.path.display(),
        prediction.detections.len(),
        prediction.elapsed_secs()
      );
      output.render_result(&request, &prediction)?;
      summary.record(&prediction);
    }

    match summary.mean_time() {
      Some(mean) => info!(
        "任务完成: {} 张图片，{} 个文本框，平均耗时 {:.2?}",
        summary.images, summary.detections, mean
      ),
      None => info!("任务完成: 没有找到图片"),
    }
    Ok(summary)
  }
}

#[cfg(test)]
mod tests {
  use super::*;
  use crate::model::{Detections, Polygon};
  use ndarray::Array2;
  use std::cell::RefCell;
  use thiserror::Error;

  #[derive(Error, Debug)]
  #[error("fake")]
  struct FakeError;

  struct FakeModel {
    fail_on: Option<&'static str>,
  }

  impl Model for FakeModel {
    type Input = Request;
    type Output = Prediction;
    type Error = FakeError;

    fn infer(&mut self, input: &Request) -> Result<Prediction, FakeError> {
      if self.fail_on.is_some_and(|name| input.path.ends_with(name)) {
        return Err(FakeError);
      }
      Ok(Prediction {
        score_map: Array2::zeros((4, 4)),
        detections: Detections::from_parts(vec![Polygon::zeros(4); 2], vec![0.9; 2]),
        elapsed: Duration::from_millis(10),
      })
    }
  }

  #[derive(Default)]
  struct Recorder(RefCell<Vec<String>>);

  impl Render<Request, Prediction> for &Recorder {
    type Error = FakeError;

    fn render_result(&self, frame: &Request, _: &Prediction) -> Result<(), FakeError> {
      self.0.borrow_mut().push(frame.path.display().to_string());
      Ok(())
    }
  }

  fn requests(names: &[&str]) -> impl Iterator<Item = Request> {
    names
      .iter()
      .map(|name| Request::new(*name))
      .collect::<Vec<_>>()
      .into_iter()
  }

  #[test]
  fn summary_counts_images_and_detections() {
    let recorder = Recorder::default();
    let summary = FolderTask
      .run_task(requests(&["a.jpg", "b.jpg"]), FakeModel { fail_on: None }, &recorder)
      .unwrap();

    assert_eq!(summary.images, 2);
    assert_eq!(summary.detections, 4);
    assert_eq!(summary.mean_time(), Some(Duration::from_millis(10)));
    assert_eq!(*recorder.0.borrow(), vec!["a.jpg", "b.jpg"]);
  }

  #[test]
  fn failure_aborts_the_run() {
    let recorder = Recorder::default();
    let result = FolderTask.run_task(
      requests(&["a.jpg", "b.jpg", "c.jpg"]),
      FakeModel { fail_on: Some("b.jpg") },
      &recorder,
    );
    assert!(result.is_err());
    assert_eq!(*recorder.0.borrow(), vec!["a.jpg"]);
  }

  #[test]
  fn empty_input_has_no_mean() {
    assert_eq!(TaskSummary::default().mean_time(), None);
  }
}
