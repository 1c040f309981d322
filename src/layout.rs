// 该文件是 Huojing （火警） 项目的一部分。
// src/layout.rs - 输出张量布局识别
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

use std::fmt;

/// `[1, 84, N]` 布局固定的类别数
pub const MULTI_CLASS_NUM: usize = 80;
/// 框坐标通道数 (cx, cy, w, h)
pub const BOX_CHANNELS: usize = 4;

const MULTI_CLASS_CHANNELS: usize = BOX_CHANNELS + MULTI_CLASS_NUM;
const CANDIDATE_MAJOR_ROWS: usize = 25200;
const SINGLE_CLASS_CHANNELS: usize = 6;
// x, y, w, h, objectness
const CANDIDATE_RECORD_HEAD: usize = 5;

/// 已知的输出张量组织方式
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LayoutKind {
  /// `[1, 4 + 80, N]`，通道优先，最大类别分数即目标置信度
  ChannelsFirstMultiClass { candidates: usize },
  /// `[1, N, 5 + C]`，每个候选框的记录连续存放
  CandidateMajorWithClasses { candidates: usize, classes: usize },
  /// `[1, 6, N]`，通道优先，4 个坐标 + 目标置信度 + 单一类别分数
  ChannelsFirstSingleClass { candidates: usize },
  Unrecognized,
}

impl LayoutKind {
  pub fn candidates(&self) -> usize {
    match *self {
      LayoutKind::ChannelsFirstMultiClass { candidates }
      | LayoutKind::CandidateMajorWithClasses { candidates, .. }
      | LayoutKind::ChannelsFirstSingleClass { candidates } => candidates,
      LayoutKind::Unrecognized => 0,
    }
  }

  pub fn classes(&self) -> usize {
    match *self {
      LayoutKind::ChannelsFirstMultiClass { .. } => MULTI_CLASS_NUM,
      LayoutKind::CandidateMajorWithClasses { classes, .. } => classes,
      LayoutKind::ChannelsFirstSingleClass { .. } => 1,
      LayoutKind::Unrecognized => 0,
    }
  }

  pub fn is_channel_major(&self) -> bool {
    matches!(
      self,
      LayoutKind::ChannelsFirstMultiClass { .. } | LayoutKind::ChannelsFirstSingleClass { .. }
    )
  }
}

impl fmt::Display for LayoutKind {
  fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
    match self {
      LayoutKind::ChannelsFirstMultiClass { candidates } => {
        write!(f, "channels-first multi-class [1, {}, {}]", MULTI_CLASS_CHANNELS, candidates)
      }
      LayoutKind::CandidateMajorWithClasses {
        candidates,
        classes,
      } => write!(
        f,
        "candidate-major [1, {}, {}]",
        candidates,
        classes + CANDIDATE_RECORD_HEAD
      ),
      LayoutKind::ChannelsFirstSingleClass { candidates } => {
        write!(f, "channels-first single-class [1, {}, {}]", SINGLE_CLASS_CHANNELS, candidates)
      }
      LayoutKind::Unrecognized => write!(f, "unrecognized"),
    }
  }
}

/// 根据声明的形状判断张量布局，按顺序第一个匹配的规则生效
pub fn classify(shape: &[usize]) -> LayoutKind {
  match *shape {
    [_, MULTI_CLASS_CHANNELS, n] => LayoutKind::ChannelsFirstMultiClass { candidates: n },
    // 记录长度不足以容纳一个类别时无法解码
    [_, CANDIDATE_MAJOR_ROWS, record] if record > CANDIDATE_RECORD_HEAD => {
      LayoutKind::CandidateMajorWithClasses {
        candidates: CANDIDATE_MAJOR_ROWS,
        classes: record - CANDIDATE_RECORD_HEAD,
      }
    }
    [_, SINGLE_CLASS_CHANNELS, n] => LayoutKind::ChannelsFirstSingleClass { candidates: n },
    _ => LayoutKind::Unrecognized,
  }
}

#[cfg(test)]
mod tests {
  use super::*;

  #[test]
  fn classify_known_shapes() {
    assert_eq!(
      classify(&[1, 84, 8400]),
      LayoutKind::ChannelsFirstMultiClass { candidates: 8400 }
    );
    assert_eq!(
      classify(&[1, 25200, 7]),
      LayoutKind::CandidateMajorWithClasses {
        candidates: 25200,
        classes: 2
      }
    );
    assert_eq!(
      classify(&[1, 6, 8400]),
      LayoutKind::ChannelsFirstSingleClass { candidates: 8400 }
    );
  }

  #[test]
  fn classify_falls_through_to_unrecognized() {
    assert_eq!(classify(&[1, 7, 7]), LayoutKind::Unrecognized);
    assert_eq!(classify(&[84, 8400]), LayoutKind::Unrecognized);
    assert_eq!(classify(&[1, 1, 84, 8400]), LayoutKind::Unrecognized);
    assert_eq!(classify(&[]), LayoutKind::Unrecognized);
    assert_eq!(classify(&[1, 25200, 5]), LayoutKind::Unrecognized);
  }

  #[test]
  fn layout_parameters() {
    let multi = classify(&[1, 84, 100]);
    assert_eq!(multi.candidates(), 100);
    assert_eq!(multi.classes(), 80);
    assert!(multi.is_channel_major());

    let candidate_major = classify(&[1, 25200, 85]);
    assert_eq!(candidate_major.classes(), 80);
    assert!(!candidate_major.is_channel_major());

    assert_eq!(LayoutKind::Unrecognized.candidates(), 0);
  }
}
