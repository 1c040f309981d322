// 该文件是 Huojing （火警） 项目的一部分。
// src/decoder.rs - 检测输出解码
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

use thiserror::Error;
use tracing::{debug, trace, warn};

use crate::{
  config::DecodeConfig,
  layout::{BOX_CHANNELS, LayoutKind, classify},
  mapper::CoordinateSpace,
};

/// 解码过程中的非致命诊断信息
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum DecodeWarning {
  #[error("无法识别的输出张量形状: {shape:?}")]
  UnrecognizedLayout { shape: Vec<usize> },
  #[error("输出缓冲区被截断: 期望 {expected} 个元素, 实际 {actual} 个, 丢弃 {dropped} 个候选框")]
  TruncatedBuffer {
    expected: usize,
    actual: usize,
    dropped: usize,
  },
}

/// 解码过程中的单个候选框，坐标为中心点格式
#[derive(Debug, Clone, PartialEq)]
pub struct Candidate {
  pub index: usize,
  pub center_x: f32,
  pub center_y: f32,
  pub width: f32,
  pub height: f32,
  pub objectness: f32,
  pub class_id: usize,
  pub class_score: f32,
  pub space: CoordinateSpace,
}

#[derive(Debug, Clone, PartialEq)]
pub struct Decoded {
  pub layout: LayoutKind,
  pub candidates: Vec<Candidate>,
  pub warnings: Vec<DecodeWarning>,
}

/// 按布局计算平面缓冲区中的下标
#[derive(Debug, Clone, Copy)]
enum Addressing {
  /// 下标 = 通道 * N + i
  ChannelMajor { candidates: usize },
  /// 下标 = i * 记录长度 + 字段
  CandidateMajor { stride: usize },
}

impl Addressing {
  fn index(&self, field: usize, i: usize) -> Option<usize> {
    match *self {
      Addressing::ChannelMajor { candidates } => field.checked_mul(candidates)?.checked_add(i),
      Addressing::CandidateMajor { stride } => i.checked_mul(stride)?.checked_add(field),
    }
  }

  /// 长度为 `len` 的缓冲区中至少有一个字段在界内的候选框数量上限，
  /// 此后的候选框所有字段均越界
  fn reachable(&self, declared: usize, len: usize) -> usize {
    let reachable = match *self {
      // 下标 = 通道 * N + i >= i
      Addressing::ChannelMajor { .. } => len,
      Addressing::CandidateMajor { stride } if stride > 0 => len.div_ceil(stride),
      Addressing::CandidateMajor { .. } => 0,
    };
    declared.min(reachable)
  }
}

/// 某一布局下各字段所在的通道/偏移
#[derive(Debug, Clone, Copy)]
struct FieldMap {
  addressing: Addressing,
  /// `None` 表示目标置信度隐含在最大类别分数中
  objectness: Option<usize>,
  class_base: usize,
  classes: usize,
  space: CoordinateSpace,
}

impl FieldMap {
  fn for_layout(layout: LayoutKind) -> Option<Self> {
    let map = match layout {
      LayoutKind::ChannelsFirstMultiClass { candidates } => FieldMap {
        addressing: Addressing::ChannelMajor { candidates },
        objectness: None,
        class_base: BOX_CHANNELS,
        classes: layout.classes(),
        space: CoordinateSpace::Normalized,
      },
      LayoutKind::CandidateMajorWithClasses { classes, .. } => FieldMap {
        addressing: Addressing::CandidateMajor {
          stride: BOX_CHANNELS + 1 + classes,
        },
        objectness: Some(BOX_CHANNELS),
        class_base: BOX_CHANNELS + 1,
        classes,
        space: CoordinateSpace::ModelPixels,
      },
      LayoutKind::ChannelsFirstSingleClass { candidates } => FieldMap {
        addressing: Addressing::ChannelMajor { candidates },
        objectness: Some(BOX_CHANNELS),
        class_base: BOX_CHANNELS + 1,
        classes: 1,
        space: CoordinateSpace::Normalized,
      },
      LayoutKind::Unrecognized => return None,
    };
    Some(map)
  }
}

/// 严格大于才替换，分数相同时保留较小的类别编号
fn argmax(scores: impl Iterator<Item = f32>) -> Option<(usize, f32)> {
  let mut best: Option<(usize, f32)> = None;
  for (class_id, score) in scores.enumerate() {
    match best {
      Some((_, best_score)) if score <= best_score || score.is_nan() => {}
      _ => best = Some((class_id, score)),
    }
  }
  best
}

/// 阈值比较，NaN 一律视为未通过
fn passes(score: f32, threshold: f32) -> bool {
  score > threshold
}

enum Outcome {
  Accepted(Candidate),
  Rejected,
  Truncated,
}

struct CandidateScanner<'a> {
  data: &'a [f32],
  fields: FieldMap,
  objectness_threshold: f32,
  class_threshold: f32,
  input_side: f32,
}

impl CandidateScanner<'_> {
  fn read(&self, field: usize, i: usize) -> Option<f32> {
    let index = self.fields.addressing.index(field, i)?;
    self.data.get(index).copied()
  }

  fn scan(&self, i: usize) -> Outcome {
    let fields = &self.fields;

    // 显式的目标置信度先行过滤，省去类别分数的读取
    let explicit_objectness = match fields.objectness {
      Some(channel) => match self.read(channel, i) {
        Some(objectness) => {
          if !passes(objectness, self.objectness_threshold) {
            return Outcome::Rejected;
          }
          Some(objectness)
        }
        None => return Outcome::Truncated,
      },
      None => None,
    };

    // 越界的类别分数按 0.0 处理
    let scores = (0..fields.classes).map(|j| self.read(fields.class_base + j, i).unwrap_or(0.0));
    let Some((class_id, class_score)) = argmax(scores) else {
      return Outcome::Rejected;
    };

    let objectness = explicit_objectness.unwrap_or(class_score);
    if !passes(objectness, self.objectness_threshold) {
      return Outcome::Rejected;
    }
    if !passes(class_score, self.class_threshold) {
      return Outcome::Rejected;
    }

    let (Some(x), Some(y), Some(w), Some(h)) = (
      self.read(0, i),
      self.read(1, i),
      self.read(2, i),
      self.read(3, i),
    ) else {
      return Outcome::Truncated;
    };

    let (x, y, w, h) = match fields.space {
      CoordinateSpace::Normalized => (
        x / self.input_side,
        y / self.input_side,
        w / self.input_side,
        h / self.input_side,
      ),
      CoordinateSpace::ModelPixels => (x, y, w, h),
    };

    Outcome::Accepted(Candidate {
      index: i,
      center_x: x,
      center_y: y,
      width: w,
      height: h,
      objectness,
      class_id,
      class_score,
      space: fields.space,
    })
  }
}

fn expected_len(shape: &[usize]) -> Option<usize> {
  shape.iter().try_fold(1usize, |acc, &dim| acc.checked_mul(dim))
}

/// 识别布局并按扫描顺序解出所有通过阈值的候选框
pub fn decode_candidates(data: &[f32], shape: &[usize], config: &DecodeConfig) -> Decoded {
  let layout = classify(shape);
  let mut warnings = Vec::new();

  let Some(fields) = FieldMap::for_layout(layout) else {
    warn!("无法识别的输出张量形状 {:?}，本帧无检测结果", shape);
    warnings.push(DecodeWarning::UnrecognizedLayout {
      shape: shape.to_vec(),
    });
    return Decoded {
      layout,
      candidates: Vec::new(),
      warnings,
    };
  };

  if config.input_side == 0 {
    warn!("模型输入边长为 0，框坐标将不是有限值");
  }

  debug!(
    "输出布局: {}, 缓冲区长度: {}, 阈值: {}/{}",
    layout,
    data.len(),
    config.objectness_threshold,
    config.class_threshold
  );

  let scanner = CandidateScanner {
    data,
    fields,
    objectness_threshold: config.objectness_threshold,
    class_threshold: config.class_threshold,
    input_side: config.input_side as f32,
  };

  let declared = layout.candidates();
  let reachable = fields.addressing.reachable(declared, data.len());
  let mut candidates = Vec::new();
  // 完全落在缓冲区之外的候选框直接计入丢弃，不逐个扫描
  let mut dropped = declared - reachable;
  for i in 0..reachable {
    match scanner.scan(i) {
      Outcome::Accepted(candidate) => {
        trace!(
          "候选框 {}: 类别 {} 分数 {:.3} 中心 ({:.3}, {:.3}) 尺寸 {:.3}x{:.3}",
          i,
          candidate.class_id,
          candidate.class_score,
          candidate.center_x,
          candidate.center_y,
          candidate.width,
          candidate.height
        );
        candidates.push(candidate);
      }
      Outcome::Rejected => {}
      Outcome::Truncated => dropped += 1,
    }
  }

  let expected = expected_len(shape).unwrap_or(usize::MAX);
  if data.len() < expected || dropped > 0 {
    warn!(
      "输出缓冲区长度 {} 小于形状 {:?} 所需的 {}，丢弃 {} 个候选框",
      data.len(),
      shape,
      expected,
      dropped
    );
    warnings.push(DecodeWarning::TruncatedBuffer {
      expected,
      actual: data.len(),
      dropped,
    });
  }

  debug!("解码得到 {} 个候选框", candidates.len());

  Decoded {
    layout,
    candidates,
    warnings,
  }
}
