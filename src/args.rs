// 该文件是 Huojing （火警） 项目的一部分。
// src/args.rs - 命令行公共参数
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

use std::path::PathBuf;

use clap::Args;
use tracing::info;
#[cfg(feature = "image_input")]
use url::Url;

use crate::{
  config::{DEFAULT_INPUT_SIDE, DecodeConfig, LabelTable},
  detection::DetectionEngine,
  output::{AlertPolicy, DEFAULT_ALERT_FLOOR},
  suppress::NonMaxSuppression,
  task::Pipeline,
  tensor::FrameSize,
};

/// 解码相关参数
#[derive(Args, Debug, Clone)]
pub struct DecodeArgs {
  /// 目标置信度阈值 (0.0 - 1.0)
  #[arg(long, default_value = "0.25", value_name = "THRESHOLD")]
  pub objectness_threshold: f32,

  /// 类别分数阈值 (0.0 - 1.0)
  #[arg(long, default_value = "0.25", value_name = "THRESHOLD")]
  pub class_threshold: f32,

  /// 标签文件，每行一个标签；缺省为 fire, smoke
  #[arg(long, value_name = "FILE")]
  pub labels: Option<PathBuf>,

  /// 模型输入边长，必须大于 0
  #[arg(
    long,
    default_value_t = DEFAULT_INPUT_SIDE,
    value_parser = clap::value_parser!(u32).range(1..),
    value_name = "PIXELS"
  )]
  pub input_side: u32,

  /// 原始画面宽度，输入源未携带画面尺寸时使用
  #[arg(long, default_value = "640", value_name = "PIXELS")]
  pub frame_width: u32,

  /// 原始画面高度，输入源未携带画面尺寸时使用
  #[arg(long, default_value = "480", value_name = "PIXELS")]
  pub frame_height: u32,

  /// 从画面文件读取原始尺寸，例如 image:///tmp/frame.jpg
  #[cfg(feature = "image_input")]
  #[arg(long, value_name = "FRAME")]
  pub frame: Option<Url>,

  /// 启用 NMS 并指定 IoU 阈值
  #[arg(long, value_name = "IOU")]
  pub nms: Option<f32>,
}

impl DecodeArgs {
  pub fn decode_config(&self) -> anyhow::Result<DecodeConfig> {
    let labels = match &self.labels {
      Some(path) => LabelTable::from_file(path)?,
      None => LabelTable::default(),
    };

    Ok(
      DecodeConfig::default()
        .objectness_threshold(self.objectness_threshold)
        .class_threshold(self.class_threshold)
        .labels(labels)
        .input_side(self.input_side),
    )
  }

  pub fn frame_size(&self) -> anyhow::Result<FrameSize> {
    #[cfg(feature = "image_input")]
    {
      use crate::{FromUrl, frame::ImageFileFrame};

      if let Some(url) = &self.frame {
        let size = ImageFileFrame::from_url(url)?.size();
        info!("画面尺寸取自 {}: {}x{}", url, size.width, size.height);
        return Ok(size);
      }
    }

    Ok(FrameSize {
      width: self.frame_width,
      height: self.frame_height,
    })
  }

  pub fn pipeline(&self) -> anyhow::Result<Pipeline> {
    let config = self.decode_config()?;
    info!(
      "阈值: {}/{}, 输入边长: {}, 标签: {:?}",
      config.objectness_threshold,
      config.class_threshold,
      config.input_side,
      config.labels.iter().collect::<Vec<_>>()
    );

    let suppression = self.nms.map(NonMaxSuppression::new);
    if let Some(nms) = &suppression {
      info!("启用 NMS, IoU 阈值: {}", nms.iou_threshold());
    }

    Ok(
      Pipeline::new(DetectionEngine::new(config), self.frame_size()?)
        .with_suppression(suppression),
    )
  }
}

/// 告警相关参数
#[derive(Args, Debug, Clone)]
pub struct AlertArgs {
  /// 火情告警下限
  #[arg(long, default_value_t = DEFAULT_ALERT_FLOOR, value_name = "CONFIDENCE")]
  pub fire_floor: f32,

  /// 烟雾告警下限
  #[arg(long, default_value_t = DEFAULT_ALERT_FLOOR, value_name = "CONFIDENCE")]
  pub smoke_floor: f32,

  /// 不监测烟雾
  #[arg(long, conflicts_with = "smoke_floor")]
  pub no_smoke: bool,
}

impl AlertArgs {
  pub fn policy(&self) -> AlertPolicy {
    AlertPolicy {
      fire_floor: self.fire_floor,
      smoke_floor: (!self.no_smoke).then_some(self.smoke_floor),
    }
  }
}
