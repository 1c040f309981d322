// 该文件是 Huojing （火警） 项目的一部分。
// src/tensor/raw_file.rs - 小端 f32 原始张量输入
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

use tracing::{info, warn};
use url::Url;

use crate::{
  FromUrl, FromUrlWithScheme,
  tensor::{FrameSize, RawOutputTensor, TensorFrame, TensorInputError},
};

const F32_BYTES: usize = std::mem::size_of::<f32>();

/// `raw:///path/to/output.bin?shape=1,84,8400&width=1920&height=1080`
pub struct RawTensorInput {
  frame: Option<TensorFrame>,
}

impl FromUrlWithScheme for RawTensorInput {
  const SCHEME: &'static str = "raw";
}

fn parse_shape(value: &str) -> Result<Vec<usize>, TensorInputError> {
  value
    .split(',')
    .map(|dim| {
      dim
        .trim()
        .parse::<usize>()
        .map_err(|_| TensorInputError::InvalidParameter {
          name: "shape",
          value: value.to_string(),
        })
    })
    .collect()
}

fn parse_dim(name: &'static str, value: &str) -> Result<u32, TensorInputError> {
  value
    .parse::<u32>()
    .map_err(|_| TensorInputError::InvalidParameter {
      name,
      value: value.to_string(),
    })
}

/// 按小端序解析，末尾不足 4 字节的部分丢弃
pub fn f32_from_le_bytes(bytes: &[u8]) -> Vec<f32> {
  let chunks = bytes.chunks_exact(F32_BYTES);
  if !chunks.remainder().is_empty() {
    warn!("原始张量末尾有 {} 个多余字节", chunks.remainder().len());
  }
  chunks
    .map(|chunk| f32::from_le_bytes([chunk[0], chunk[1], chunk[2], chunk[3]]))
    .collect()
}

impl FromUrl for RawTensorInput {
  type Error = TensorInputError;

  fn from_url(url: &Url) -> Result<Self, Self::Error> {
    if url.scheme() != Self::SCHEME {
      return Err(TensorInputError::scheme_mismatch(Self::SCHEME, url));
    }

    let mut shape = None;
    let mut width = None;
    let mut height = None;
    for (k, v) in url.query_pairs() {
      match k.as_ref() {
        "shape" => shape = Some(parse_shape(&v)?),
        "width" => width = Some(parse_dim("width", &v)?),
        "height" => height = Some(parse_dim("height", &v)?),
        _ => warn!("忽略未知参数: {}={}", k, v),
      }
    }
    let shape = shape.ok_or(TensorInputError::MissingParameter("shape"))?;

    let path = url.path();
    info!("读取原始张量文件: {}, 形状: {:?}", path, shape);
    let bytes = std::fs::read(path)?;
    let data = f32_from_le_bytes(&bytes);

    let frame_size = match (width, height) {
      (Some(width), Some(height)) => Some(FrameSize { width, height }),
      _ => None,
    };

    Ok(Self {
      frame: Some(TensorFrame {
        index: 0,
        tensor: RawOutputTensor::new(data, shape),
        frame_size,
      }),
    })
  }
}

impl Iterator for RawTensorInput {
  type Item = TensorFrame;

  fn next(&mut self) -> Option<Self::Item> {
    self.frame.take()
  }
}

#[cfg(test)]
mod tests {
  use super::*;

  fn raw_url(path: &std::path::Path, query: &str) -> Url {
    Url::parse(&format!("raw://{}?{}", path.display(), query)).unwrap()
  }

  #[test]
  fn load_raw_tensor_with_frame_size() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("out.bin");
    let values = [0.5f32, -1.0, 2.25];
    let bytes: Vec<u8> = values.iter().flat_map(|v| v.to_le_bytes()).collect();
    std::fs::write(&path, bytes).unwrap();

    let mut input =
      RawTensorInput::from_url(&raw_url(&path, "shape=1,3,1&width=1920&height=1080")).unwrap();
    let frame = input.next().unwrap();
    assert_eq!(frame.tensor.data(), &values);
    assert_eq!(frame.tensor.shape(), &[1, 3, 1]);
    assert_eq!(
      frame.frame_size,
      Some(FrameSize {
        width: 1920,
        height: 1080
      })
    );
    assert!(input.next().is_none());
  }

  #[test]
  fn shape_is_required() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("out.bin");
    std::fs::write(&path, []).unwrap();
    assert!(matches!(
      RawTensorInput::from_url(&raw_url(&path, "width=10")),
      Err(TensorInputError::MissingParameter("shape"))
    ));
  }

  #[test]
  fn invalid_shape_is_rejected() {
    assert!(matches!(
      parse_shape("1,x,3"),
      Err(TensorInputError::InvalidParameter { name: "shape", .. })
    ));
  }

  #[test]
  fn trailing_bytes_are_ignored() {
    let mut bytes = 1.5f32.to_le_bytes().to_vec();
    bytes.push(0xff);
    assert_eq!(f32_from_le_bytes(&bytes), vec![1.5]);
  }
}
