// 该文件是 Huojing （火警） 项目的一部分。
// src/suppress.rs - 可选的非极大值抑制
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

use tracing::debug;

use crate::detection::{DetectionResult, DetectionSet};

pub const DEFAULT_IOU_THRESHOLD: f32 = 0.45;

/// 解码之后的独立过滤阶段，`decode` 本身从不调用
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct NonMaxSuppression {
  iou_threshold: f32,
}

impl Default for NonMaxSuppression {
  fn default() -> Self {
    Self::new(DEFAULT_IOU_THRESHOLD)
  }
}

impl NonMaxSuppression {
  pub fn new(iou_threshold: f32) -> Self {
    Self { iou_threshold }
  }

  pub fn iou_threshold(&self) -> f32 {
    self.iou_threshold
  }

  /// 同一标签内按置信度降序贪心保留，输出按置信度降序排列
  pub fn apply(&self, mut detections: Vec<DetectionResult>) -> Vec<DetectionResult> {
    let before = detections.len();
    detections.sort_by(|a, b| b.confidence.total_cmp(&a.confidence));

    let mut kept: Vec<DetectionResult> = Vec::with_capacity(detections.len());
    for det in detections {
      let suppressed = kept.iter().any(|best| {
        best.class_id == det.class_id
          && best.bounding_box.iou(&det.bounding_box) >= self.iou_threshold
      });
      if !suppressed {
        kept.push(det);
      }
    }

    debug!("NMS: {} -> {}", before, kept.len());
    kept
  }

  pub fn apply_to_set(&self, set: DetectionSet) -> DetectionSet {
    let items = self.apply(set.items.to_vec());
    set.with_items(items)
  }
}

#[cfg(test)]
mod tests {
  use super::*;
  use crate::mapper::BoundingBox;

  fn det(class_id: usize, confidence: f32, left: f32) -> DetectionResult {
    DetectionResult {
      label: if class_id == 0 { "fire" } else { "smoke" }.to_string(),
      class_id,
      confidence,
      bounding_box: BoundingBox {
        left,
        top: 0.0,
        right: left + 10.0,
        bottom: 10.0,
      },
    }
  }

  #[test]
  fn overlapping_boxes_of_same_class_are_merged() {
    let nms = NonMaxSuppression::new(0.5);
    let kept = nms.apply(vec![det(0, 0.6, 1.0), det(0, 0.9, 0.0), det(0, 0.7, 50.0)]);
    assert_eq!(kept.len(), 2);
    assert_eq!(kept[0].confidence, 0.9);
    assert_eq!(kept[1].confidence, 0.7);
  }

  #[test]
  fn different_classes_are_independent() {
    let nms = NonMaxSuppression::default();
    let kept = nms.apply(vec![det(0, 0.9, 0.0), det(1, 0.8, 0.0)]);
    assert_eq!(kept.len(), 2);
  }

  #[test]
  fn empty_input() {
    assert!(NonMaxSuppression::default().apply(Vec::new()).is_empty());
  }
}
