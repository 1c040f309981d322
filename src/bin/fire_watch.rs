// 该文件是 Huojing （火警） 项目的一部分。
// src/bin/fire_watch.rs - 连续解码并判定火情告警
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

use anyhow::Result;
use clap::Parser;
use url::Url;

use huojing::{
  FromUrl,
  args::{AlertArgs, DecodeArgs},
  output::{AlertMonitor, OutputWrapper},
  task::{Backpressure, ContinuousTask, Task},
  tensor::TensorInput,
};
use tracing::{info, warn};

/// Huojing 连续火情监测
#[derive(Parser, Debug)]
#[command(author, version, about, long_about = None)]
pub struct Args {
  /// 张量输入
  #[arg(long, value_name = "SOURCE")]
  pub input: Url,
  /// 输出路径
  #[arg(long, value_name = "OUTPUT", default_value = "log://?quiet")]
  pub output: Url,

  #[arg(long, value_name = "FRAME_NUMBER")]
  pub frame_number: Option<usize>,

  /// 解码跟不上时只保留最新一帧
  #[arg(long)]
  pub keep_latest: bool,

  #[command(flatten)]
  pub alert: AlertArgs,

  #[command(flatten)]
  pub decode: DecodeArgs,
}

fn main() -> Result<()> {
  tracing_subscriber::fmt::init();

  let args = Args::parse();

  info!("输入来源: {}", args.input);
  info!("输出路径: {}", args.output);

  let input = TensorInput::from_url(&args.input)?;
  let pipeline = args.decode.pipeline()?;
  let output = OutputWrapper::from_url(&args.output)?;
  let monitor = AlertMonitor::new(args.alert.policy());

  let backpressure = if args.keep_latest {
    Backpressure::KeepLatest
  } else {
    Backpressure::Block
  };

  let summary = ContinuousTask::default()
    .with_frame_number(args.frame_number)
    .with_backpressure(backpressure)
    .with_interrupt(true)
    .run_task(input, pipeline, (output, &monitor))?;

  let alerts = monitor.take_alerts();
  for alert in alerts.iter() {
    warn!(
      "{} 告警于 {} (置信度 {:.2}%)",
      alert.kind,
      alert.raised_at.to_rfc3339(),
      alert.confidence * 100.0
    );
  }
  info!(
    "共 {} 帧, 火情帧数 {}, 告警 {} 次",
    summary.frames_decoded,
    monitor.fire_frames(),
    alerts.len()
  );

  Ok(())
}
