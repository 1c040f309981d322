// 该文件是 Huojing （火警） 项目的一部分。
// src/output.rs - 检测结果的消费方
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

use crate::{FromUrl, FromUrlWithScheme, detection::DetectionSet, tensor::TensorFrame};

pub trait Report: Sized {
  type Error;
  fn report(&self, frame: &TensorFrame, result: &DetectionSet) -> Result<(), Self::Error>;
}

mod alert;
pub use self::alert::{Alert, AlertKind, AlertMonitor, AlertPolicy, DEFAULT_ALERT_FLOOR};

mod log_report;
pub use self::log_report::LogReport;

#[cfg(feature = "record_output")]
mod record_file;
#[cfg(feature = "record_output")]
pub use self::record_file::RecordReport;

#[derive(Error, Debug)]
pub enum ReportError {
  #[error("I/O 错误: {0}")]
  IoError(#[from] std::io::Error),
  #[error("JSON 序列化错误: {0}")]
  JsonError(#[from] serde_json::Error),
  #[error("URI 方案不匹配: {0}")]
  SchemeMismatch(String),
  #[error("报告状态被污染")]
  Poisoned,
}

pub enum OutputWrapper {
  Log(LogReport),
  #[cfg(feature = "record_output")]
  Record(RecordReport),
}

impl FromUrl for OutputWrapper {
  type Error = ReportError;

  fn from_url(url: &Url) -> Result<Self, Self::Error> {
    match url.scheme() {
      LogReport::SCHEME => Ok(OutputWrapper::Log(LogReport::from_url(url)?)),
      #[cfg(feature = "record_output")]
      RecordReport::SCHEME => Ok(OutputWrapper::Record(RecordReport::from_url(url)?)),
      scheme => Err(ReportError::SchemeMismatch(scheme.to_string())),
    }
  }
}

impl Report for OutputWrapper {
  type Error = ReportError;

  fn report(&self, frame: &TensorFrame, result: &DetectionSet) -> Result<(), Self::Error> {
    match self {
      OutputWrapper::Log(output) => output.report(frame, result),
      #[cfg(feature = "record_output")]
      OutputWrapper::Record(output) => output.report(frame, result),
    }
  }
}

impl<R: Report> Report for &R {
  type Error = R::Error;

  fn report(&self, frame: &TensorFrame, result: &DetectionSet) -> Result<(), Self::Error> {
    (**self).report(frame, result)
  }
}

/// 依次交给两个消费方
impl<A, B> Report for (A, B)
where
  A: Report<Error = ReportError>,
  B: Report<Error = ReportError>,
{
  type Error = ReportError;

  fn report(&self, frame: &TensorFrame, result: &DetectionSet) -> Result<(), Self::Error> {
    self.0.report(frame, result)?;
    self.1.report(frame, result)
  }
}

#[cfg(test)]
mod tests {
  use super::*;

  #[test]
  fn output_from_url_by_scheme() {
    let url = Url::parse("log://detections").unwrap();
    assert!(matches!(
      OutputWrapper::from_url(&url),
      Ok(OutputWrapper::Log(_))
    ));

    let url = Url::parse("rtsp://camera/stream").unwrap();
    assert!(matches!(
      OutputWrapper::from_url(&url),
      Err(ReportError::SchemeMismatch(scheme)) if scheme == "rtsp"
    ));
  }
}
