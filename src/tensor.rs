// 该文件是 Huojing （火警） 项目的一部分。
// src/tensor.rs - 模型原始输出张量与张量输入源
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
use url::Url;

use crate::{FromUrl, FromUrlWithScheme};

mod json_file;
mod raw_file;

pub use self::json_file::JsonTensorInput;
pub use self::raw_file::RawTensorInput;

/// 模型输出的平面 f32 缓冲区及其声明形状。
///
/// 缓冲区长度与形状乘积不一致时不会报错，越界读取由解码器按缺失处理。
#[derive(Debug, Clone, PartialEq)]
pub struct RawOutputTensor {
  data: Box<[f32]>,
  shape: Box<[usize]>,
}

impl RawOutputTensor {
  pub fn new(data: impl Into<Box<[f32]>>, shape: impl Into<Box<[usize]>>) -> Self {
    Self {
      data: data.into(),
      shape: shape.into(),
    }
  }

  pub fn data(&self) -> &[f32] {
    &self.data
  }

  pub fn shape(&self) -> &[usize] {
    &self.shape
  }

  pub fn get(&self, index: usize) -> Option<f32> {
    self.data.get(index).copied()
  }

  /// 形状各维的乘积，溢出时为 `None`
  pub fn expected_len(&self) -> Option<usize> {
    self
      .shape
      .iter()
      .try_fold(1usize, |acc, &dim| acc.checked_mul(dim))
  }

  pub fn is_complete(&self) -> bool {
    self.expected_len() == Some(self.data.len())
  }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct FrameSize {
  pub width: u32,
  pub height: u32,
}

/// 一帧对应的模型输出，原始画面尺寸可由输入源携带
#[derive(Debug, Clone, PartialEq)]
pub struct TensorFrame {
  pub index: usize,
  pub tensor: RawOutputTensor,
  pub frame_size: Option<FrameSize>,
}

impl TensorFrame {
  pub fn frame_size_or(&self, fallback: FrameSize) -> FrameSize {
    self.frame_size.unwrap_or(fallback)
  }
}

#[derive(Error, Debug)]
pub enum TensorInputError {
  #[error("URI 方案不匹配: 期望 '{expected}', 实际 '{found}'")]
  SchemeMismatch { expected: String, found: String },
  #[error("I/O 错误: {0}")]
  IoError(#[from] std::io::Error),
  #[error("JSON 解析错误: {0}")]
  JsonError(#[from] serde_json::Error),
  #[error("缺少参数: {0}")]
  MissingParameter(&'static str),
  #[error("参数 {name} 无效: {value}")]
  InvalidParameter { name: &'static str, value: String },
}

impl TensorInputError {
  pub(crate) fn scheme_mismatch(expected: &str, url: &Url) -> Self {
    TensorInputError::SchemeMismatch {
      expected: expected.to_string(),
      found: url.scheme().to_string(),
    }
  }
}

pub enum TensorInput {
  Json(JsonTensorInput),
  Raw(RawTensorInput),
}

impl FromUrl for TensorInput {
  type Error = TensorInputError;

  fn from_url(url: &Url) -> Result<Self, Self::Error> {
    match url.scheme() {
      JsonTensorInput::SCHEME => Ok(TensorInput::Json(JsonTensorInput::from_url(url)?)),
      RawTensorInput::SCHEME => Ok(TensorInput::Raw(RawTensorInput::from_url(url)?)),
      _ => Err(TensorInputError::scheme_mismatch(
        &format!("{}|{}", JsonTensorInput::SCHEME, RawTensorInput::SCHEME),
        url,
      )),
    }
  }
}

impl Iterator for TensorInput {
  type Item = TensorFrame;

  fn next(&mut self) -> Option<Self::Item> {
    match self {
      TensorInput::Json(input) => input.next(),
      TensorInput::Raw(input) => input.next(),
    }
  }
}

#[cfg(test)]
mod tests {
  use super::*;

  #[test]
  fn tensor_reports_completeness() {
    let tensor = RawOutputTensor::new(vec![0.0; 36], vec![1, 6, 6]);
    assert!(tensor.is_complete());
    assert_eq!(tensor.get(35), Some(0.0));
    assert_eq!(tensor.get(36), None);

    let short = RawOutputTensor::new(vec![0.0; 26], vec![1, 6, 6]);
    assert!(!short.is_complete());
    assert_eq!(short.expected_len(), Some(36));

    let overflow = RawOutputTensor::new(vec![], vec![usize::MAX, 2]);
    assert_eq!(overflow.expected_len(), None);
  }

  #[test]
  fn unknown_scheme_is_rejected() {
    let url = Url::parse("http://example.com/tensor.json").unwrap();
    assert!(matches!(
      TensorInput::from_url(&url),
      Err(TensorInputError::SchemeMismatch { .. })
    ));
  }

  #[test]
  fn frame_size_fallback() {
    let frame = TensorFrame {
      index: 0,
      tensor: RawOutputTensor::new(vec![], vec![]),
      frame_size: None,
    };
    let fallback = FrameSize {
      width: 640,
      height: 480,
    };
    assert_eq!(frame.frame_size_or(fallback), fallback);
  }
}
