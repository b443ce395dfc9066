//! Portrait matting model.
//!
//! An encoder-decoder network with skip connections producing a
//! single-channel opacity mask. The network runs at a fixed reference
//! resolution; the mask is resampled back to source-registered
//! resolutions afterwards, so both outputs preserve the source aspect
//! ratio.

// Allow common ML code patterns
#![allow(clippy::cast_possible_truncation)]
#![allow(clippy::cast_precision_loss)]
#![allow(clippy::cast_sign_loss)]

use anyhow::{Context, Result};
use candle_core::{DType, Device, Module, Tensor};
use candle_nn::{conv2d, Conv2d, Conv2dConfig, VarBuilder};
use image::RgbImage;

use crate::domain::{AlphaMatte, MattePair};

/// Square resolution the matting network runs at.
pub const REF_SIZE: usize = 512;

/// Two 3x3 convolutions with folded `BatchNorm` (bias included), each
/// followed by ReLU.
struct DoubleConv {
    conv1: Conv2d,
    conv2: Conv2d,
}

impl DoubleConv {
    fn new(in_c: usize, out_c: usize, vb: &VarBuilder) -> Result<Self> {
        let cfg = Conv2dConfig {
            padding: 1,
            ..Conv2dConfig::default()
        };
        Ok(Self {
            conv1: conv2d(in_c, out_c, 3, cfg, vb.pp("conv1"))?,
            conv2: conv2d(out_c, out_c, 3, cfg, vb.pp("conv2"))?,
        })
    }

    fn forward(&self, x: &Tensor) -> Result<Tensor> {
        let x = self.conv1.forward(x)?.relu()?;
        Ok(self.conv2.forward(&x)?.relu()?)
    }
}

/// Portrait matting network.
///
/// Encoder: 16-32-64-128 channels with 2x max pooling between levels.
/// Bridge: 256 channels. Decoder: nearest-neighbor upsampling with
/// encoder skip concatenation, mirrored channel widths, and a 1x1
/// sigmoid head.
pub struct MattingNet {
    enc1: DoubleConv,
    enc2: DoubleConv,
    enc3: DoubleConv,
    enc4: DoubleConv,
    bridge: DoubleConv,
    dec4: DoubleConv,
    dec3: DoubleConv,
    dec2: DoubleConv,
    dec1: DoubleConv,
    head: Conv2d,
    device: Device,
}

impl MattingNet {
    /// Creates the model from weights.
    ///
    /// # Errors
    ///
    /// Returns an error if model weights cannot be loaded or are invalid.
    #[allow(clippy::needless_pass_by_value)]
    pub fn new(vb: VarBuilder) -> Result<Self> {
        Ok(Self {
            enc1: DoubleConv::new(3, 16, &vb.pp("enc1"))?,
            enc2: DoubleConv::new(16, 32, &vb.pp("enc2"))?,
            enc3: DoubleConv::new(32, 64, &vb.pp("enc3"))?,
            enc4: DoubleConv::new(64, 128, &vb.pp("enc4"))?,
            bridge: DoubleConv::new(128, 256, &vb.pp("bridge"))?,
            dec4: DoubleConv::new(256 + 128, 128, &vb.pp("dec4"))?,
            dec3: DoubleConv::new(128 + 64, 64, &vb.pp("dec3"))?,
            dec2: DoubleConv::new(64 + 32, 32, &vb.pp("dec2"))?,
            dec1: DoubleConv::new(32 + 16, 16, &vb.pp("dec1"))?,
            head: conv2d(16, 1, 1, Conv2dConfig::default(), vb.pp("head"))?,
            device: vb.device().clone(),
        })
    }

    /// Preprocesses an image into a `(1, 3, 512, 512)` tensor normalized
    /// to `[-1, 1]`.
    ///
    /// # Errors
    ///
    /// Returns an error if tensor creation fails.
    pub fn preprocess(&self, image: &RgbImage) -> Result<Tensor> {
        let resized = image::imageops::resize(
            image,
            REF_SIZE as u32,
            REF_SIZE as u32,
            image::imageops::FilterType::Triangle,
        );

        let data: Vec<f32> = resized
            .pixels()
            .flat_map(|p| {
                [
                    (f32::from(p[0]) / 127.5) - 1.0,
                    (f32::from(p[1]) / 127.5) - 1.0,
                    (f32::from(p[2]) / 127.5) - 1.0,
                ]
            })
            .collect();

        let tensor = Tensor::from_vec(data, (1, REF_SIZE, REF_SIZE, 3), &self.device)?;
        tensor
            .permute((0, 3, 1, 2))?
            .to_dtype(DType::F32)
            .context("Failed to preprocess matting input")
    }

    fn forward(&self, x: &Tensor) -> Result<Tensor> {
        let e1 = self.enc1.forward(x)?;
        let e2 = self.enc2.forward(&e1.max_pool2d(2)?)?;
        let e3 = self.enc3.forward(&e2.max_pool2d(2)?)?;
        let e4 = self.enc4.forward(&e3.max_pool2d(2)?)?;
        let b = self.bridge.forward(&e4.max_pool2d(2)?)?;

        let up = |t: &Tensor, skip: &Tensor| -> Result<Tensor> {
            let (_, _, h, w) = skip.dims4()?;
            Ok(Tensor::cat(&[&t.upsample_nearest2d(h, w)?, skip], 1)?)
        };

        let d4 = self.dec4.forward(&up(&b, &e4)?)?;
        let d3 = self.dec3.forward(&up(&d4, &e3)?)?;
        let d2 = self.dec2.forward(&up(&d3, &e2)?)?;
        let d1 = self.dec1.forward(&up(&d2, &e1)?)?;

        Ok(candle_nn::ops::sigmoid(&self.head.forward(&d1)?)?)
    }

    /// Runs matting once and produces the standard and high-definition
    /// mattes, both at the source aspect ratio.
    ///
    /// # Errors
    ///
    /// Returns an error if the input is empty or inference fails.
    pub fn matte_pair(&self, image: &RgbImage, preview_edge: u32) -> Result<MattePair> {
        anyhow::ensure!(
            image.width() > 0 && image.height() > 0,
            "matting input image is empty"
        );

        let input = self.preprocess(image)?;
        let output = self.forward(&input)?;

        let data = output
            .squeeze(0)?
            .squeeze(0)?
            .flatten_all()?
            .to_vec1::<f32>()?;
        let reference = AlphaMatte::from_raw(REF_SIZE as u32, REF_SIZE as u32, data)
            .context("matting output has unexpected element count")?;

        let hd = reference.resized(image.width(), image.height());
        let (pw, ph) = preview_dimensions(image.width(), image.height(), preview_edge);
        let standard = reference.resized(pw, ph);

        Ok(MattePair { standard, hd })
    }
}

/// Preview dimensions: long edge capped at `edge`, aspect ratio
/// preserved, never upscaled.
pub(crate) fn preview_dimensions(width: u32, height: u32, edge: u32) -> (u32, u32) {
    let long = width.max(height);
    if long <= edge {
        return (width, height);
    }
    let scale = f64::from(edge) / f64::from(long);
    let scaled = |v: u32| ((f64::from(v) * scale).round() as u32).max(1);
    (scaled(width), scaled(height))
}
