// 该文件是 Huojing （火警） 项目的一部分。
// src/output/log_report.rs - 以日志形式输出检测结果
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
  detection::DetectionSet,
  output::{Report, ReportError},
  tensor::TensorFrame,
};

/// `log://` 或 `log://?quiet`，quiet 时只记录有检测结果的帧
#[derive(Debug, Default)]
pub struct LogReport {
  quiet: bool,
}

impl FromUrlWithScheme for LogReport {
  const SCHEME: &'static str = "log";
}

impl FromUrl for LogReport {
  type Error = ReportError;

  fn from_url(url: &Url) -> Result<Self, Self::Error> {
    if url.scheme() != Self::SCHEME {
      return Err(ReportError::SchemeMismatch(url.scheme().to_string()));
    }

    let quiet = url.query_pairs().any(|(k, _)| k == "quiet");
    Ok(LogReport { quiet })
  }
}

impl Report for LogReport {
  type Error = ReportError;

  fn report(&self, frame: &TensorFrame, result: &DetectionSet) -> Result<(), Self::Error> {
    for diagnostic in result.diagnostics.iter() {
      warn!("帧 {}: {}", frame.index, diagnostic);
    }

    if result.is_empty() {
      if !self.quiet {
        info!("帧 {}: 无检测结果", frame.index);
      }
      return Ok(());
    }

    info!("帧 {}: 检测到 {} 个对象", frame.index, result.len());
    for det in result.iter() {
      let bbox = &det.bounding_box;
      info!(
        "  - {}: {:.2}% at ({:.0}, {:.0}) - ({:.0}, {:.0})",
        det.label,
        det.confidence * 100.0,
        bbox.left,
        bbox.top,
        bbox.right,
        bbox.bottom
      );
    }

    Ok(())
  }
}
