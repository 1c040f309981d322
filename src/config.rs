// 该文件是 Huojing （火警） 项目的一部分。
// src/config.rs - 解码配置与标签表
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

use std::path::Path;

use thiserror::Error;
use tracing::{debug, info};

pub const DEFAULT_OBJECTNESS_THRESHOLD: f32 = 0.25;
pub const DEFAULT_CLASS_THRESHOLD: f32 = 0.25;
pub const DEFAULT_INPUT_SIDE: u32 = 640;
pub const DEFAULT_LABELS: [&str; 2] = ["fire", "smoke"];

const UNKNOWN_LABEL: &str = "unknown";

#[derive(Error, Debug)]
pub enum LabelTableError {
  #[error("I/O 错误: {0}")]
  IoError(#[from] std::io::Error),
  #[error("标签文件为空: {0}")]
  Empty(String),
  #[error("第 {line} 行标签编号 {found} 与位置 {expected} 不一致")]
  OutOfOrder {
    line: usize,
    expected: usize,
    found: usize,
  },
}

/// 按类别编号索引的标签表
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LabelTable {
  labels: Box<[String]>,
}

impl Default for LabelTable {
  fn default() -> Self {
    Self::new(DEFAULT_LABELS)
  }
}

impl LabelTable {
  pub fn new<I, S>(labels: I) -> Self
  where
    I: IntoIterator<Item = S>,
    S: Into<String>,
  {
    Self {
      labels: labels.into_iter().map(Into::into).collect(),
    }
  }

  /// 解析标签文本，每行一个标签。
  ///
  /// 空行与 `#` 开头的行会被忽略；
  /// 也接受 `0 fire` 这种带编号的写法，但编号必须与行序一致。
  pub fn parse(text: &str, source: &str) -> Result<Self, LabelTableError> {
    let mut labels = Vec::new();

    for (line_no, line) in text.lines().enumerate() {
      let line = line.trim();
      if line.is_empty() || line.starts_with('#') {
        continue;
      }

      let label = match line.split_once(char::is_whitespace) {
        Some((id, rest)) => match id.parse::<usize>() {
          Ok(found) if found != labels.len() => {
            return Err(LabelTableError::OutOfOrder {
              line: line_no + 1,
              expected: labels.len(),
              found,
            });
          }
          Ok(_) => rest.trim(),
          Err(_) => line,
        },
        None => line,
      };

      labels.push(label.to_string());
    }

    if labels.is_empty() {
      return Err(LabelTableError::Empty(source.to_string()));
    }

    debug!("从 {} 解析到 {} 个标签", source, labels.len());
    Ok(Self::new(labels))
  }

  pub fn from_file<P: AsRef<Path>>(path: P) -> Result<Self, LabelTableError> {
    let path = path.as_ref();
    info!("加载标签文件: {}", path.display());
    let text = std::fs::read_to_string(path)?;
    Self::parse(&text, &path.display().to_string())
  }

  pub fn get(&self, class_id: usize) -> Option<&str> {
    self.labels.get(class_id).map(String::as_str)
  }

  /// 越界的类别编号记为 "unknown"
  pub fn label_of(&self, class_id: usize) -> &str {
    self.get(class_id).unwrap_or(UNKNOWN_LABEL)
  }

  pub fn len(&self) -> usize {
    self.labels.len()
  }

  pub fn is_empty(&self) -> bool {
    self.labels.is_empty()
  }

  pub fn iter(&self) -> impl Iterator<Item = &str> {
    self.labels.iter().map(String::as_str)
  }
}

/// 一次解码所需的全部参数
#[derive(Debug, Clone, PartialEq)]
pub struct DecodeConfig {
  /// 目标置信度阈值，严格大于才保留
  pub objectness_threshold: f32,
  /// 类别分数阈值，严格大于才保留
  pub class_threshold: f32,
  pub labels: LabelTable,
  /// 模型输入边长（正方形输入）
  pub input_side: u32,
}

impl Default for DecodeConfig {
  fn default() -> Self {
    Self {
      objectness_threshold: DEFAULT_OBJECTNESS_THRESHOLD,
      class_threshold: DEFAULT_CLASS_THRESHOLD,
      labels: LabelTable::default(),
      input_side: DEFAULT_INPUT_SIDE,
    }
  }
}

impl DecodeConfig {
  pub fn objectness_threshold(mut self, threshold: f32) -> Self {
    self.objectness_threshold = threshold;
    self
  }

  pub fn class_threshold(mut self, threshold: f32) -> Self {
    self.class_threshold = threshold;
    self
  }

  pub fn labels(mut self, labels: LabelTable) -> Self {
    self.labels = labels;
    self
  }

  pub fn input_side(mut self, side: u32) -> Self {
    self.input_side = side;
    self
  }
}
