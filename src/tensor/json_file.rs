// 该文件是 Huojing （火警） 项目的一部分。
// src/tensor/json_file.rs - JSON 张量转储输入
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

use std::{fs::File, io::BufReader};

use serde::Deserialize;
use tracing::{debug, info};
use url::Url;

use crate::{
  FromUrl, FromUrlWithScheme,
  tensor::{FrameSize, RawOutputTensor, TensorFrame, TensorInputError},
};

#[derive(Debug, Deserialize)]
struct TensorDump {
  shape: Vec<usize>,
  data: Vec<f32>,
  #[serde(default)]
  frame_width: Option<u32>,
  #[serde(default)]
  frame_height: Option<u32>,
}

/// 单个张量或按帧排列的张量数组
#[derive(Debug, Deserialize)]
#[serde(untagged)]
enum DumpFile {
  Sequence(Vec<TensorDump>),
  Single(TensorDump),
}

impl TensorDump {
  fn into_frame(self, index: usize) -> TensorFrame {
    let frame_size = match (self.frame_width, self.frame_height) {
      (Some(width), Some(height)) => Some(FrameSize { width, height }),
      _ => None,
    };

    TensorFrame {
      index,
      tensor: RawOutputTensor::new(self.data, self.shape),
      frame_size,
    }
  }
}

pub struct JsonTensorInput {
  frames: std::vec::IntoIter<TensorFrame>,
}

impl FromUrlWithScheme for JsonTensorInput {
  const SCHEME: &'static str = "json";
}

impl FromUrl for JsonTensorInput {
  type Error = TensorInputError;

  fn from_url(url: &Url) -> Result<Self, Self::Error> {
    if url.scheme() != Self::SCHEME {
      return Err(TensorInputError::scheme_mismatch(Self::SCHEME, url));
    }

    let path = url.path();
    info!("读取 JSON 张量文件: {}", path);
    let reader = BufReader::new(File::open(path)?);
    let dump: DumpFile = serde_json::from_reader(reader)?;
    Ok(Self::from_dump(dump))
  }
}

impl JsonTensorInput {
  pub fn from_json_str(text: &str) -> Result<Self, TensorInputError> {
    let dump: DumpFile = serde_json::from_str(text)?;
    Ok(Self::from_dump(dump))
  }

  fn from_dump(dump: DumpFile) -> Self {
    let dumps = match dump {
      DumpFile::Sequence(dumps) => dumps,
      DumpFile::Single(dump) => vec![dump],
    };
    debug!("JSON 张量帧数: {}", dumps.len());

    let frames: Vec<TensorFrame> = dumps
      .into_iter()
      .enumerate()
      .map(|(index, dump)| dump.into_frame(index))
      .collect();

    Self {
      frames: frames.into_iter(),
    }
  }
}

impl Iterator for JsonTensorInput {
  type Item = TensorFrame;

  fn next(&mut self) -> Option<Self::Item> {
    self.frames.next()
  }
}
