// 该文件是 Huojing （火警） 项目的一部分。
// src/frame.rs - 相机画面与模型输入帧
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

use image::{ImageReader, RgbImage, imageops::FilterType};
use thiserror::Error;
use tracing::{debug, error};
use url::Url;

use crate::{FromUrl, FromUrlWithScheme, tensor::FrameSize};

#[derive(Error, Debug)]
pub enum InputFrameError {
  #[error("URI 方案不匹配")]
  SchemaMismatch,
  #[error("I/O 错误: {0}")]
  IoError(#[from] std::io::Error),
  #[error("图像加载错误: {0}")]
  ImageLoadError(#[from] image::ImageError),
  #[error("模型输入边长不能为 0")]
  ZeroInputSide,
}

/// 缩放到模型正方形输入后的 NHWC 帧，同时记录原始画面尺寸
#[derive(Debug, Clone)]
pub struct InputFrame {
  side: u32,
  original: FrameSize,
  data: Box<[u8]>,
}

impl InputFrame {
  pub fn from_image(image: &RgbImage, side: u32) -> Result<Self, InputFrameError> {
    if side == 0 {
      return Err(InputFrameError::ZeroInputSide);
    }

    let (width, height) = image.dimensions();
    debug!("预处理画面 {}x{} -> {}x{}", width, height, side, side);

    // 双线性缩放，不保持宽高比
    let resized = image::imageops::resize(image, side, side, FilterType::Triangle);

    Ok(Self {
      side,
      original: FrameSize { width, height },
      data: resized.into_raw().into_boxed_slice(),
    })
  }

  pub fn side(&self) -> u32 {
    self.side
  }

  pub fn original_size(&self) -> FrameSize {
    self.original
  }

  pub fn as_nhwc(&self) -> &[u8] {
    &self.data
  }

  /// 归一化到 [0, 1] 的浮点输入
  pub fn to_normalized_f32(&self) -> Vec<f32> {
    self.data.iter().map(|&v| v as f32 / 255.0).collect()
  }
}

const READ_IMAGE_FILE_SCHEME: &str = "image";

/// 从图像文件读取的单帧画面
pub struct ImageFileFrame {
  image: RgbImage,
}

impl FromUrlWithScheme for ImageFileFrame {
  const SCHEME: &'static str = READ_IMAGE_FILE_SCHEME;
}

impl FromUrl for ImageFileFrame {
  type Error = InputFrameError;

  fn from_url(url: &Url) -> Result<Self, Self::Error> {
    if url.scheme() != Self::SCHEME {
      error!(
        "URI 方案不匹配: 期望 '{}', 实际 '{}'",
        Self::SCHEME,
        url.scheme()
      );
      return Err(InputFrameError::SchemaMismatch);
    }

    let image = ImageReader::open(url.path())?.decode()?;
    Ok(Self {
      image: image.to_rgb8(),
    })
  }
}

impl ImageFileFrame {
  pub fn size(&self) -> FrameSize {
    let (width, height) = self.image.dimensions();
    FrameSize { width, height }
  }

  pub fn to_input(&self, side: u32) -> Result<InputFrame, InputFrameError> {
    InputFrame::from_image(&self.image, side)
  }
}

#[cfg(test)]
mod tests {
  use super::*;
  use image::Rgb;

  #[test]
  fn resize_keeps_original_size() {
    let image = RgbImage::from_pixel(64, 48, Rgb([255, 0, 0]));
    let frame = InputFrame::from_image(&image, 32).unwrap();
    assert_eq!(frame.side(), 32);
    assert_eq!(
      frame.original_size(),
      FrameSize {
        width: 64,
        height: 48
      }
    );
    assert_eq!(frame.as_nhwc().len(), 32 * 32 * 3);
    assert_eq!(&frame.as_nhwc()[..3], &[255, 0, 0]);

    let normalized = frame.to_normalized_f32();
    assert_eq!(normalized[0], 1.0);
    assert_eq!(normalized[1], 0.0);
  }

  #[test]
  fn zero_side_is_rejected() {
    let image = RgbImage::new(4, 4);
    assert!(matches!(
      InputFrame::from_image(&image, 0),
      Err(InputFrameError::ZeroInputSide)
    ));
  }

  #[test]
  fn load_image_file_from_url() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("frame.png");
    RgbImage::from_pixel(20, 10, Rgb([0, 128, 0])).save(&path).unwrap();

    let url = Url::parse(&format!("image://{}", path.display())).unwrap();
    let frame = ImageFileFrame::from_url(&url).unwrap();
    assert_eq!(
      frame.size(),
      FrameSize {
        width: 20,
        height: 10
      }
    );
    assert_eq!(frame.to_input(8).unwrap().as_nhwc().len(), 8 * 8 * 3);
  }
}
