// 该文件是 Huojing （火警） 项目的一部分。
// src/bin/decode_oneshot.rs - 解码单个张量文件
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
  args::DecodeArgs,
  output::OutputWrapper,
  task::{OneShotTask, Task},
  tensor::TensorInput,
};
use tracing::info;

/// Huojing 单帧解码
#[derive(Parser, Debug)]
#[command(author, version, about, long_about = None)]
pub struct Args {
  /// 张量输入，例如 json:///tmp/out.json 或 raw:///tmp/out.bin?shape=1,84,8400
  #[arg(long, value_name = "SOURCE")]
  pub input: Url,
  /// 输出，例如 log:// 或 record:///tmp/detections.jsonl
  #[arg(long, value_name = "OUTPUT", default_value = "log://")]
  pub output: Url,

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

  let summary = OneShotTask.run_task(input, pipeline, output)?;
  info!("检测结果 {} 个", summary.detections);

  Ok(())
}
