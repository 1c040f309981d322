// 该文件是 Huojing （火警） 项目的一部分。
// src/task.rs - 逐帧解码任务
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
  sync::{Condvar, Mutex, MutexGuard, PoisonError, mpsc},
  thread,
  time::Instant,
};

use tracing::{debug, info, warn};

use crate::{
  detection::{DetectionEngine, DetectionSet},
  output::Report,
  suppress::NonMaxSuppression,
  tensor::{FrameSize, TensorFrame},
};

/// 解码引擎 + 可选的 NMS 阶段 + 缺省画面尺寸
#[derive(Debug, Clone)]
pub struct Pipeline {
  engine: DetectionEngine,
  suppression: Option<NonMaxSuppression>,
  default_frame_size: FrameSize,
}

impl Pipeline {
  pub fn new(engine: DetectionEngine, default_frame_size: FrameSize) -> Self {
    Self {
      engine,
      suppression: None,
      default_frame_size,
    }
  }

  pub fn with_suppression(mut self, suppression: Option<NonMaxSuppression>) -> Self {
    self.suppression = suppression;
    self
  }

  pub fn process(&self, frame: &TensorFrame) -> DetectionSet {
    let FrameSize { width, height } = frame.frame_size_or(self.default_frame_size);
    let result = self.engine.decode_tensor(&frame.tensor, width, height);
    match &self.suppression {
      Some(nms) => nms.apply_to_set(result),
      None => result,
    }
  }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct TaskSummary {
  pub frames_read: usize,
  pub frames_decoded: usize,
  pub frames_dropped: usize,
  pub detections: usize,
}

pub trait Task<I, O>: Sized {
  type Error;
  fn run_task(self, input: I, pipeline: Pipeline, output: O) -> Result<TaskSummary, Self::Error>;
}

pub struct OneShotTask;

impl<RE, I, O> Task<I, O> for OneShotTask
where
  RE: std::error::Error + Sync + Send + 'static,
  I: Iterator<Item = TensorFrame>,
  O: Report<Error = RE>,
{
  type Error = anyhow::Error;

  fn run_task(self, mut input: I, pipeline: Pipeline, output: O) -> Result<TaskSummary, Self::Error> {
    info!("开始任务...");
    let frame = input.next().ok_or_else(|| anyhow::anyhow!("没有输入帧"))?;
    info!("输入帧获取成功，开始解码...");
    let now = Instant::now();
    let result = pipeline.process(&frame);
    info!("解码完成，耗时: {:.2?}", now.elapsed());
    output.report(&frame, &result)?;

    Ok(TaskSummary {
      frames_read: 1,
      frames_decoded: 1,
      frames_dropped: 0,
      detections: result.len(),
    })
  }
}

/// 帧到达快于解码时的处理方式
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum Backpressure {
  /// 等待解码线程取走上一帧
  #[default]
  Block,
  /// 用新帧覆盖尚未解码的旧帧
  KeepLatest,
}

#[derive(Default)]
struct SlotState {
  frame: Option<TensorFrame>,
  closed: bool,
  dropped: usize,
}

/// 容量为 1 的帧交接槽
#[derive(Default)]
struct FrameSlot {
  state: Mutex<SlotState>,
  changed: Condvar,
}

impl FrameSlot {
  fn lock(&self) -> MutexGuard<'_, SlotState> {
    self.state.lock().unwrap_or_else(PoisonError::into_inner)
  }

  fn wait<'a>(&self, guard: MutexGuard<'a, SlotState>) -> MutexGuard<'a, SlotState> {
    self
      .changed
      .wait(guard)
      .unwrap_or_else(PoisonError::into_inner)
  }

  /// 槽已关闭时返回 false
  fn push(&self, frame: TensorFrame, backpressure: Backpressure) -> bool {
    let mut state = self.lock();
    if backpressure == Backpressure::Block {
      while state.frame.is_some() && !state.closed {
        state = self.wait(state);
      }
    }
    if state.closed {
      return false;
    }
    if let Some(stale) = state.frame.replace(frame) {
      state.dropped += 1;
      debug!("丢弃未解码的第 {} 帧", stale.index);
    }
    self.changed.notify_all();
    true
  }

  fn take(&self) -> Option<TensorFrame> {
    let mut state = self.lock();
    loop {
      if let Some(frame) = state.frame.take() {
        self.changed.notify_all();
        return Some(frame);
      }
      if state.closed {
        return None;
      }
      state = self.wait(state);
    }
  }

  fn close(&self) {
    self.lock().closed = true;
    self.changed.notify_all();
  }

  fn dropped(&self) -> usize {
    self.lock().dropped
  }
}

#[derive(Default, Debug)]
pub struct ContinuousTask {
  frame_number: Option<usize>,
  backpressure: Backpressure,
  interrupt: bool,
}

impl ContinuousTask {
  pub fn with_frame_number(mut self, frame_number: Option<usize>) -> Self {
    self.frame_number = frame_number;
    self
  }

  pub fn with_backpressure(mut self, backpressure: Backpressure) -> Self {
    self.backpressure = backpressure;
    self
  }

  /// 注册 Ctrl-C 处理，每个进程只能注册一次
  pub fn with_interrupt(mut self, interrupt: bool) -> Self {
    self.interrupt = interrupt;
    self
  }
}

impl<RE, I, O> Task<I, O> for ContinuousTask
where
  RE: std::error::Error + Sync + Send + 'static,
  I: Iterator<Item = TensorFrame>,
  O: Report<Error = RE> + Sync,
{
  type Error = anyhow::Error;

  fn run_task(self, input: I, pipeline: Pipeline, output: O) -> Result<TaskSummary, Self::Error> {
    info!("开始任务...");
    let (tx, rx) = mpsc::channel();
    if self.interrupt {
      ctrlc::set_handler(move || {
        info!("收到中断信号，准备退出...");
        let _ = tx.send(());
      })?;
    }

    let slot = FrameSlot::default();
    let mut frames_read = 0usize;

    let worker_result: Result<(usize, usize), RE> = thread::scope(|scope| {
      let worker = scope.spawn(|| {
        let mut decoded = 0usize;
        let mut detections = 0usize;
        while let Some(frame) = slot.take() {
          let now = Instant::now();
          let result = pipeline.process(&frame);
          let elapsed = now.elapsed();
          if let Err(e) = output.report(&frame, &result) {
            slot.close();
            return Err(e);
          }
          decoded += 1;
          detections += result.len();
          debug!("第 {} 帧解码完成，耗时: {:.2?}", frame.index, elapsed);
        }
        Ok((decoded, detections))
      });

      for frame in input {
        frames_read += 1;
        if !slot.push(frame, self.backpressure) {
          warn!("解码线程已停止，退出任务循环");
          break;
        }
        if self.frame_number.map(|n| frames_read >= n).unwrap_or(false) {
          info!("达到指定帧数 {}, 退出任务循环", frames_read);
          break;
        }
        if rx.try_recv().is_ok() {
          warn!("中断信号接收，退出任务循环");
          break;
        }
      }
      slot.close();

      worker
        .join()
        .unwrap_or_else(|panic| std::panic::resume_unwind(panic))
    });

    let (frames_decoded, detections) = worker_result?;
    let summary = TaskSummary {
      frames_read,
      frames_decoded,
      frames_dropped: slot.dropped(),
      detections,
    };
    info!(
      "任务完成: 读取 {} 帧, 解码 {} 帧, 丢弃 {} 帧, 检测结果 {} 个",
      summary.frames_read, summary.frames_decoded, summary.frames_dropped, summary.detections
    );
    Ok(summary)
  }
}

#[cfg(test)]
mod tests {
  use super::*;
  use crate::{output::ReportError, tensor::RawOutputTensor};

  fn hot_frame(index: usize) -> TensorFrame {
    TensorFrame {
      index,
      tensor: RawOutputTensor::new(vec![320.0, 320.0, 64.0, 64.0, 0.8, 0.9], vec![1, 6, 1]),
      frame_size: None,
    }
  }

  fn pipeline() -> Pipeline {
    Pipeline::new(
      DetectionEngine::default(),
      FrameSize {
        width: 640,
        height: 480,
      },
    )
  }

  struct Counting(Mutex<Vec<usize>>);

  impl Report for Counting {
    type Error = ReportError;

    fn report(&self, frame: &TensorFrame, _result: &DetectionSet) -> Result<(), Self::Error> {
      self.0.lock().unwrap().push(frame.index);
      Ok(())
    }
  }

  struct Failing;

  impl Report for Failing {
    type Error = ReportError;

    fn report(&self, _frame: &TensorFrame, _result: &DetectionSet) -> Result<(), Self::Error> {
      Err(ReportError::Poisoned)
    }
  }

  #[test]
  fn one_shot_decodes_first_frame() {
    let frames = (0..3).map(hot_frame);
    let summary = OneShotTask
      .run_task(frames, pipeline(), Counting(Mutex::new(Vec::new())))
      .unwrap();
    assert_eq!(summary.frames_decoded, 1);
    assert_eq!(summary.detections, 1);
  }

  #[test]
  fn one_shot_without_input_fails() {
    let result = OneShotTask.run_task(
      std::iter::empty(),
      pipeline(),
      Counting(Mutex::new(Vec::new())),
    );
    assert!(result.is_err());
  }

  #[test]
  fn continuous_blocking_decodes_every_frame_in_order() {
    let report = Counting(Mutex::new(Vec::new()));
    let summary = ContinuousTask::default()
      .run_task((0..20).map(hot_frame), pipeline(), &report)
      .unwrap();
    assert_eq!(summary.frames_read, 20);
    assert_eq!(summary.frames_decoded, 20);
    assert_eq!(summary.frames_dropped, 0);
    assert_eq!(summary.detections, 20);
    assert_eq!(*report.0.lock().unwrap(), (0..20).collect::<Vec<_>>());
  }

  #[test]
  fn continuous_keep_latest_accounts_for_every_frame() {
    let report = Counting(Mutex::new(Vec::new()));
    let summary = ContinuousTask::default()
      .with_backpressure(Backpressure::KeepLatest)
      .run_task((0..50).map(hot_frame), pipeline(), &report)
      .unwrap();
    assert_eq!(summary.frames_read, 50);
    assert_eq!(summary.frames_decoded + summary.frames_dropped, 50);
    let seen = report.0.lock().unwrap();
    assert!(seen.windows(2).all(|w| w[0] < w[1]));
    // 最后一帧总会被解码
    assert_eq!(seen.last(), Some(&49));
  }

  #[test]
  fn continuous_respects_frame_limit() {
    let summary = ContinuousTask::default()
      .with_frame_number(Some(5))
      .run_task((0..20).map(hot_frame), pipeline(), Counting(Mutex::new(Vec::new())))
      .unwrap();
    assert_eq!(summary.frames_read, 5);
    assert_eq!(summary.frames_decoded, 5);
  }

  #[test]
  fn continuous_propagates_report_errors() {
    let result = ContinuousTask::default().run_task((0..5).map(hot_frame), pipeline(), Failing);
    assert!(result.is_err());
  }

  #[test]
  fn pipeline_applies_optional_suppression() {
    let frame = TensorFrame {
      index: 0,
      tensor: RawOutputTensor::new(
        vec![
          320.0, 322.0, 320.0, 320.0, 64.0, 64.0, 64.0, 64.0, 0.8, 0.8, 0.9, 0.8,
        ],
        vec![1, 6, 2],
      ),
      frame_size: None,
    };
    assert_eq!(pipeline().process(&frame).len(), 2);
    let suppressed = pipeline().with_suppression(Some(NonMaxSuppression::default()));
    let result = suppressed.process(&frame);
    assert_eq!(result.len(), 1);
    assert_eq!(result[0].confidence, 0.9);
  }
}
