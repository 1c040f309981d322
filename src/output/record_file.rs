// 该文件是 Huojing （火警） 项目的一部分。
// src/output/record_file.rs - 按行记录检测结果
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
  fs::File,
  io::{BufWriter, Write},
  path::Path,
  sync::Mutex,
};

use chrono::{DateTime, Utc};
use serde::Serialize;
use tracing::info;
use url::Url;

use crate::{
  FromUrl, FromUrlWithScheme,
  detection::{DetectionResult, DetectionSet},
  output::{Report, ReportError},
  tensor::TensorFrame,
};

#[derive(Serialize)]
struct FrameRecord<'a> {
  frame: usize,
  recorded_at: DateTime<Utc>,
  layout: String,
  detections: &'a [DetectionResult],
  diagnostics: Vec<String>,
}

/// `record:///path/to/detections.jsonl`，每帧一行 JSON
pub struct RecordReport {
  writer: Mutex<BufWriter<File>>,
}

impl FromUrlWithScheme for RecordReport {
  const SCHEME: &'static str = "record";
}

impl FromUrl for RecordReport {
  type Error = ReportError;

  fn from_url(url: &Url) -> Result<Self, Self::Error> {
    if url.scheme() != Self::SCHEME {
      return Err(ReportError::SchemeMismatch(url.scheme().to_string()));
    }

    let path = url.path();
    if let Some(parent) = Path::new(path).parent()
      && !parent.as_os_str().is_empty()
    {
      std::fs::create_dir_all(parent)?;
    }

    info!("记录检测结果到文件: {}", path);
    let file = File::create(path)?;
    Ok(RecordReport {
      writer: Mutex::new(BufWriter::new(file)),
    })
  }
}

impl Report for RecordReport {
  type Error = ReportError;

  fn report(&self, frame: &TensorFrame, result: &DetectionSet) -> Result<(), Self::Error> {
    let record = FrameRecord {
      frame: frame.index,
      recorded_at: Utc::now(),
      layout: result.layout.to_string(),
      detections: &result.items,
      diagnostics: result.diagnostics.iter().map(ToString::to_string).collect(),
    };

    let mut writer = self.writer.lock().map_err(|_| ReportError::Poisoned)?;
    serde_json::to_writer(&mut *writer, &record)?;
    writer.write_all(b"\n")?;
    writer.flush()?;
    Ok(())
  }
}

#[cfg(test)]
mod tests {
  use super::*;
  use crate::{detection::decode, tensor::RawOutputTensor};

  #[test]
  fn records_one_line_per_frame() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("nested").join("out.jsonl");
    let url = Url::parse(&format!("record://{}", path.display())).unwrap();
    let report = RecordReport::from_url(&url).unwrap();

    let data = [320.0, 320.0, 64.0, 64.0, 0.8, 0.9];
    let frame = TensorFrame {
      index: 3,
      tensor: RawOutputTensor::new(data.to_vec(), vec![1, 6, 1]),
      frame_size: None,
    };
    let result = decode(frame.tensor.data(), frame.tensor.shape(), 640, 640);
    report.report(&frame, &result).unwrap();
    report.report(&frame, &decode(&[], &[1, 7, 7], 640, 640)).unwrap();

    let text = std::fs::read_to_string(&path).unwrap();
    let lines: Vec<serde_json::Value> = text
      .lines()
      .map(|line| serde_json::from_str(line).unwrap())
      .collect();
    assert_eq!(lines.len(), 2);
    assert_eq!(lines[0]["frame"], 3);
    assert_eq!(lines[0]["detections"][0]["label"], "fire");
    assert_eq!(lines[1]["detections"].as_array().unwrap().len(), 0);
    assert_eq!(lines[1]["diagnostics"].as_array().unwrap().len(), 1);
  }
}
