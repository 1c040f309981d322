// 该文件是 Huojing （火警） 项目的一部分。
// src/mapper.rs - 模型坐标到原始画面坐标的映射
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

use serde::{Deserialize, Serialize};

use crate::decoder::Candidate;

/// 候选框坐标所处的坐标系
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CoordinateSpace {
  /// 已除以模型输入边长，落在 [0, 1]
  Normalized,
  /// 模型输入像素单位
  ModelPixels,
}

impl CoordinateSpace {
  pub fn reference_unit(&self, input_side: u32) -> f32 {
    match self {
      CoordinateSpace::Normalized => 1.0,
      CoordinateSpace::ModelPixels => input_side as f32,
    }
  }
}

/// 原始画面像素坐标下的轴对齐矩形，不裁剪到画面范围内
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct BoundingBox {
  pub left: f32,
  pub top: f32,
  pub right: f32,
  pub bottom: f32,
}

impl BoundingBox {
  pub fn width(&self) -> f32 {
    self.right - self.left
  }

  pub fn height(&self) -> f32 {
    self.bottom - self.top
  }

  pub fn area(&self) -> f32 {
    self.width().max(0.0) * self.height().max(0.0)
  }

  /// 计算两个边界框的 IoU
  pub fn iou(&self, other: &BoundingBox) -> f32 {
    let x1 = self.left.max(other.left);
    let y1 = self.top.max(other.top);
    let x2 = self.right.min(other.right);
    let y2 = self.bottom.min(other.bottom);

    let intersection = (x2 - x1).max(0.0) * (y2 - y1).max(0.0);
    let union = self.area() + other.area() - intersection;

    if union > 0.0 {
      intersection / union
    } else {
      0.0
    }
  }
}

/// 把中心点格式的框缩放到原始画面
pub fn map_to_frame(
  candidate: &Candidate,
  input_side: u32,
  original_width: u32,
  original_height: u32,
) -> BoundingBox {
  let reference = candidate.space.reference_unit(input_side);
  let scale_x = original_width as f32 / reference;
  let scale_y = original_height as f32 / reference;

  let half_w = candidate.width / 2.0;
  let half_h = candidate.height / 2.0;

  BoundingBox {
    left: (candidate.center_x - half_w) * scale_x,
    top: (candidate.center_y - half_h) * scale_y,
    right: (candidate.center_x + half_w) * scale_x,
    bottom: (candidate.center_y + half_h) * scale_y,
  }
}

#[cfg(test)]
mod tests {
  use super::*;

  fn candidate(cx: f32, cy: f32, w: f32, h: f32, space: CoordinateSpace) -> Candidate {
    Candidate {
      index: 0,
      center_x: cx,
      center_y: cy,
      width: w,
      height: h,
      objectness: 0.9,
      class_id: 0,
      class_score: 0.9,
      space,
    }
  }

  #[test]
  fn normalized_box_scales_by_frame_size() {
    let c = candidate(0.4, 0.4, 0.2, 0.4, CoordinateSpace::Normalized);
    let bbox = map_to_frame(&c, 640, 640, 480);
    for (got, want) in [
      (bbox.left, 192.0),
      (bbox.top, 96.0),
      (bbox.right, 320.0),
      (bbox.bottom, 288.0),
    ] {
      assert!((got - want).abs() < 1e-3, "got {got}, want {want}");
    }
  }

  #[test]
  fn model_pixel_box_divides_by_input_side() {
    let c = candidate(320.0, 320.0, 64.0, 128.0, CoordinateSpace::ModelPixels);
    let bbox = map_to_frame(&c, 640, 1280, 960);
    assert_eq!(bbox.left, 576.0);
    assert_eq!(bbox.right, 704.0);
    assert_eq!(bbox.top, 384.0);
    assert_eq!(bbox.bottom, 576.0);
  }

  #[test]
  fn boxes_are_not_clamped() {
    let c = candidate(0.0, 1.0, 0.5, 0.5, CoordinateSpace::Normalized);
    let bbox = map_to_frame(&c, 640, 100, 100);
    assert_eq!(bbox.left, -25.0);
    assert_eq!(bbox.bottom, 125.0);
    assert!(bbox.left <= bbox.right && bbox.top <= bbox.bottom);
  }

  #[test]
  fn iou_of_overlapping_boxes() {
    let a = BoundingBox {
      left: 0.0,
      top: 0.0,
      right: 10.0,
      bottom: 10.0,
    };
    let b = BoundingBox {
      left: 5.0,
      top: 0.0,
      right: 15.0,
      bottom: 10.0,
    };
    assert!((a.iou(&b) - 50.0 / 150.0).abs() < 1e-6);
    assert_eq!(a.iou(&a), 1.0);

    let far = BoundingBox {
      left: 100.0,
      top: 100.0,
      right: 110.0,
      bottom: 110.0,
    };
    assert_eq!(a.iou(&far), 0.0);
  }
}
