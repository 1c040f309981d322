// 该文件是 Huojing （火警） 项目的一部分。
// src/output/alert.rs - 火情/烟雾告警判定
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

use std::{fmt, sync::Mutex};

use chrono::{DateTime, Utc};
use serde::Serialize;
use tracing::{info, warn};

use crate::{
  detection::{DetectionResult, DetectionSet, FIRE_LABEL, SMOKE_LABEL, has_label},
  output::{Report, ReportError},
  tensor::TensorFrame,
};

pub const DEFAULT_ALERT_FLOOR: f32 = 0.7;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum AlertKind {
  Fire,
  Smoke,
}

impl AlertKind {
  pub fn label(&self) -> &'static str {
    match self {
      AlertKind::Fire => FIRE_LABEL,
      AlertKind::Smoke => SMOKE_LABEL,
    }
  }
}

impl fmt::Display for AlertKind {
  fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
    f.write_str(self.label())
  }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Alert {
  pub kind: AlertKind,
  /// 触发告警的最高置信度
  pub confidence: f32,
  pub raised_at: DateTime<Utc>,
  /// 截至此时出现火情的帧数
  pub fire_frames: u64,
}

/// 告警下限，严格大于才触发；`None` 表示不监测该类别
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct AlertPolicy {
  pub fire_floor: f32,
  pub smoke_floor: Option<f32>,
}

impl Default for AlertPolicy {
  fn default() -> Self {
    Self {
      fire_floor: DEFAULT_ALERT_FLOOR,
      smoke_floor: Some(DEFAULT_ALERT_FLOOR),
    }
  }
}

#[derive(Debug, Default)]
struct MonitorState {
  fire_frames: u64,
  fire_active: bool,
  smoke_active: bool,
  pending: Vec<Alert>,
}

/// 逐帧判定是否出现火情或烟雾。
///
/// 同一类别只在由无到有的那一帧告警，持续出现时不重复告警。
#[derive(Debug, Default)]
pub struct AlertMonitor {
  policy: AlertPolicy,
  state: Mutex<MonitorState>,
}

fn max_confidence(results: &[DetectionResult], label: &str) -> f32 {
  results
    .iter()
    .filter(|r| r.label == label)
    .map(|r| r.confidence)
    .fold(0.0, f32::max)
}

impl AlertMonitor {
  pub fn new(policy: AlertPolicy) -> Self {
    Self {
      policy,
      state: Mutex::new(MonitorState::default()),
    }
  }

  /// 处理一帧结果，返回本帧新触发的告警
  pub fn observe(&self, results: &[DetectionResult]) -> Result<Vec<Alert>, ReportError> {
    let mut state = self.state.lock().map_err(|_| ReportError::Poisoned)?;
    let mut raised = Vec::new();

    let fire = has_label(results, FIRE_LABEL, self.policy.fire_floor);
    if fire {
      state.fire_frames += 1;
    }
    if fire && !state.fire_active {
      raised.push(Alert {
        kind: AlertKind::Fire,
        confidence: max_confidence(results, FIRE_LABEL),
        raised_at: Utc::now(),
        fire_frames: state.fire_frames,
      });
    }
    state.fire_active = fire;

    if let Some(floor) = self.policy.smoke_floor {
      let smoke = has_label(results, SMOKE_LABEL, floor);
      if smoke && !state.smoke_active {
        raised.push(Alert {
          kind: AlertKind::Smoke,
          confidence: max_confidence(results, SMOKE_LABEL),
          raised_at: Utc::now(),
          fire_frames: state.fire_frames,
        });
      }
      state.smoke_active = smoke;
    }

    for alert in raised.iter() {
      warn!(
        "告警: 检测到 {} (置信度 {:.2}%), 累计火情帧数 {}",
        alert.kind,
        alert.confidence * 100.0,
        alert.fire_frames
      );
    }
    state.pending.extend(raised.iter().cloned());

    Ok(raised)
  }

  pub fn fire_frames(&self) -> u64 {
    self.state.lock().map(|s| s.fire_frames).unwrap_or_default()
  }

  /// 取走尚未被消费的告警
  pub fn take_alerts(&self) -> Vec<Alert> {
    self
      .state
      .lock()
      .map(|mut s| std::mem::take(&mut s.pending))
      .unwrap_or_default()
  }

  /// 清空计数与状态
  pub fn reset(&self) {
    if let Ok(mut state) = self.state.lock() {
      *state = MonitorState::default();
      info!("告警状态已重置");
    }
  }
}

impl Report for AlertMonitor {
  type Error = ReportError;

  fn report(&self, _frame: &TensorFrame, result: &DetectionSet) -> Result<(), Self::Error> {
    self.observe(result).map(|_| ())
  }
}

#[cfg(test)]
mod tests {
  use super::*;
  use crate::mapper::BoundingBox;

  fn result(label: &str, confidence: f32) -> DetectionResult {
    DetectionResult {
      label: label.to_string(),
      class_id: 0,
      confidence,
      bounding_box: BoundingBox {
        left: 0.0,
        top: 0.0,
        right: 1.0,
        bottom: 1.0,
      },
    }
  }

  #[test]
  fn fire_alert_on_rising_edge_only() {
    let monitor = AlertMonitor::default();

    assert!(monitor.observe(&[result("fire", 0.69)]).unwrap().is_empty());

    let alerts = monitor.observe(&[result("fire", 0.71), result("fire", 0.9)]).unwrap();
    assert_eq!(alerts.len(), 1);
    assert_eq!(alerts[0].kind, AlertKind::Fire);
    assert_eq!(alerts[0].confidence, 0.9);
    assert_eq!(alerts[0].fire_frames, 1);

    // 持续出现不重复告警，但计数增加
    assert!(monitor.observe(&[result("fire", 0.8)]).unwrap().is_empty());
    assert_eq!(monitor.fire_frames(), 2);

    assert!(monitor.observe(&[]).unwrap().is_empty());
    let again = monitor.observe(&[result("fire", 0.8)]).unwrap();
    assert_eq!(again.len(), 1);
    assert_eq!(again[0].fire_frames, 3);
  }

  #[test]
  fn smoke_monitoring_can_be_disabled() {
    let monitor = AlertMonitor::new(AlertPolicy {
      fire_floor: 0.25,
      smoke_floor: None,
    });
    assert!(monitor.observe(&[result("smoke", 0.99)]).unwrap().is_empty());

    let monitor = AlertMonitor::default();
    let alerts = monitor.observe(&[result("smoke", 0.99)]).unwrap();
    assert_eq!(alerts[0].kind, AlertKind::Smoke);
    assert_eq!(alerts[0].fire_frames, 0);
  }

  #[test]
  fn pending_alerts_are_drained_and_reset() {
    let monitor = AlertMonitor::default();
    monitor.observe(&[result("fire", 0.95)]).unwrap();
    assert_eq!(monitor.take_alerts().len(), 1);
    assert!(monitor.take_alerts().is_empty());

    monitor.reset();
    assert_eq!(monitor.fire_frames(), 0);
  }
}
