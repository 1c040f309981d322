// 该文件是 Huojing （火警） 项目的一部分。
// src/detection.rs - 检测结果与解码入口
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

use std::ops::Deref;

use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::{
  config::DecodeConfig,
  decoder::{DecodeWarning, decode_candidates},
  layout::LayoutKind,
  mapper::{BoundingBox, map_to_frame},
  tensor::RawOutputTensor,
};

pub const FIRE_LABEL: &str = "fire";
pub const SMOKE_LABEL: &str = "smoke";

/// 单个检测结果，构造后不再修改
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DetectionResult {
  pub label: String,
  pub class_id: usize,
  /// 通过阈值的类别分数
  pub confidence: f32,
  /// 原始画面像素坐标
  pub bounding_box: BoundingBox,
}

/// 一帧的检测结果集合，保持解码时的扫描顺序
#[derive(Debug, Clone, PartialEq)]
pub struct DetectionSet {
  pub layout: LayoutKind,
  pub items: Box<[DetectionResult]>,
  pub diagnostics: Box<[DecodeWarning]>,
}

impl DetectionSet {
  pub fn has_diagnostics(&self) -> bool {
    !self.diagnostics.is_empty()
  }

  /// 用后处理（例如 NMS）的结果替换检测列表，诊断信息保留
  pub fn with_items(self, items: Vec<DetectionResult>) -> Self {
    Self {
      items: items.into_boxed_slice(),
      ..self
    }
  }
}

impl Deref for DetectionSet {
  type Target = [DetectionResult];

  fn deref(&self) -> &Self::Target {
    &self.items
  }
}

/// 无状态的解码引擎，可在多个线程间共享
#[derive(Debug, Clone, Default)]
pub struct DetectionEngine {
  config: DecodeConfig,
}

impl DetectionEngine {
  pub fn new(config: DecodeConfig) -> Self {
    Self { config }
  }

  pub fn decode(
    &self,
    data: &[f32],
    shape: &[usize],
    original_width: u32,
    original_height: u32,
  ) -> DetectionSet {
    let decoded = decode_candidates(data, shape, &self.config);

    let items: Box<[DetectionResult]> = decoded
      .candidates
      .iter()
      .map(|candidate| DetectionResult {
        label: self.config.labels.label_of(candidate.class_id).to_string(),
        class_id: candidate.class_id,
        confidence: candidate.class_score,
        bounding_box: map_to_frame(
          candidate,
          self.config.input_side,
          original_width,
          original_height,
        ),
      })
      .collect();

    debug!(
      "画面 {}x{} 上得到 {} 个检测结果",
      original_width,
      original_height,
      items.len()
    );

    DetectionSet {
      layout: decoded.layout,
      items,
      diagnostics: decoded.warnings.into_boxed_slice(),
    }
  }

  pub fn decode_tensor(
    &self,
    tensor: &RawOutputTensor,
    original_width: u32,
    original_height: u32,
  ) -> DetectionSet {
    self.decode(tensor.data(), tensor.shape(), original_width, original_height)
  }
}

/// 使用默认配置解码
pub fn decode(
  data: &[f32],
  shape: &[usize],
  original_width: u32,
  original_height: u32,
) -> DetectionSet {
  DetectionEngine::default().decode(data, shape, original_width, original_height)
}

/// 是否存在指定标签且置信度严格高于下限的结果
pub fn has_label(results: &[DetectionResult], label: &str, confidence_floor: f32) -> bool {
  results
    .iter()
    .any(|result| result.label == label && result.confidence > confidence_floor)
}

pub fn has_fire(results: &[DetectionResult], confidence_floor: f32) -> bool {
  has_label(results, FIRE_LABEL, confidence_floor)
}

pub fn has_smoke(results: &[DetectionResult], confidence_floor: f32) -> bool {
  has_label(results, SMOKE_LABEL, confidence_floor)
}

pub fn count_label(results: &[DetectionResult], label: &str) -> usize {
  results.iter().filter(|result| result.label == label).count()
}
