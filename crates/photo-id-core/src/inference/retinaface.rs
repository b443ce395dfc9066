//! `RetinaFace`-style face detection model.
//!
//! A compact single-stage detector with a depthwise-separable backbone,
//! feature pyramid, and context modules, predicting a bounding box and
//! five facial landmarks per anchor. Follows the architecture of
//! "`RetinaFace`: Single-stage Dense Face Localisation in the Wild"
//! at the mobile operating point.

// Allow common ML code patterns
#![allow(clippy::cast_possible_truncation)]
#![allow(clippy::cast_precision_loss)]

use anyhow::{Context, Result};
use candle_core::{DType, Device, Module, Tensor};
use candle_nn::{conv2d, Conv2d, Conv2dConfig, VarBuilder};
use image::RgbImage;

use super::softmax2;
use crate::domain::{BoundingBox, FaceDetection, FaceLandmarks, Point};

/// Square input size the detector runs at.
pub const INPUT_SIZE: usize = 640;

/// Feature map strides of the three pyramid levels.
const STEPS: [usize; 3] = [8, 16, 32];

/// Anchor sizes per pyramid level, in input pixels.
const MIN_SIZES: [[usize; 2]; 3] = [[16, 32], [64, 128], [256, 512]];

/// Anchors per feature map location.
const ANCHORS_PER_LOCATION: usize = 2;

/// Box/landmark decode variances.
const VARIANCES: [f32; 2] = [0.1, 0.2];

/// Non-maximum suppression IOU threshold.
const NMS_THRESHOLD: f32 = 0.4;

/// Per-channel means subtracted during preprocessing (RGB order).
const CHANNEL_MEANS: [f32; 3] = [123.0, 117.0, 104.0];

/// Channel width of the pyramid and context modules.
const FPN_CHANNELS: usize = 64;

/// Total anchor count for the 640x640 input.
pub const NUM_ANCHORS: usize = {
    let mut total = 0;
    let mut level = 0;
    while level < 3 {
        let cells = (INPUT_SIZE / STEPS[level]) * (INPUT_SIZE / STEPS[level]);
        total += cells * ANCHORS_PER_LOCATION;
        level += 1;
    }
    total
};

/// A 3x3 convolution with folded `BatchNorm` (bias included) and ReLU.
struct ConvBn {
    conv: Conv2d,
}

impl ConvBn {
    fn new(in_c: usize, out_c: usize, stride: usize, vb: &VarBuilder) -> Result<Self> {
        let conv = conv2d(
            in_c,
            out_c,
            3,
            Conv2dConfig {
                stride,
                padding: 1,
                ..Conv2dConfig::default()
            },
            vb.pp("conv"),
        )?;
        Ok(Self { conv })
    }

    fn forward(&self, x: &Tensor) -> Result<Tensor> {
        Ok(self.conv.forward(x)?.relu()?)
    }
}

/// Depthwise-separable block: depthwise 3x3 + pointwise 1x1, each with
/// folded `BatchNorm` and ReLU.
struct ConvDw {
    depthwise: Conv2d,
    pointwise: Conv2d,
}

impl ConvDw {
    fn new(in_c: usize, out_c: usize, stride: usize, vb: &VarBuilder) -> Result<Self> {
        let depthwise = conv2d(
            in_c,
            in_c,
            3,
            Conv2dConfig {
                stride,
                padding: 1,
                groups: in_c,
                ..Conv2dConfig::default()
            },
            vb.pp("depthwise"),
        )?;
        let pointwise = conv2d(in_c, out_c, 1, Conv2dConfig::default(), vb.pp("pointwise"))?;
        Ok(Self {
            depthwise,
            pointwise,
        })
    }

    fn forward(&self, x: &Tensor) -> Result<Tensor> {
        let x = self.depthwise.forward(x)?.relu()?;
        Ok(self.pointwise.forward(&x)?.relu()?)
    }
}

/// SSH context module: parallel 3x3, 5x5, and 7x7 receptive-field paths
/// concatenated back to the pyramid width.
struct ContextModule {
    conv3: Conv2d,
    conv5_1: Conv2d,
    conv5_2: Conv2d,
    conv7: Conv2d,
}

impl ContextModule {
    fn new(vb: &VarBuilder) -> Result<Self> {
        let half = FPN_CHANNELS / 2;
        let quarter = FPN_CHANNELS / 4;
        let cfg = Conv2dConfig {
            padding: 1,
            ..Conv2dConfig::default()
        };
        Ok(Self {
            conv3: conv2d(FPN_CHANNELS, half, 3, cfg, vb.pp("conv3"))?,
            conv5_1: conv2d(FPN_CHANNELS, quarter, 3, cfg, vb.pp("conv5_1"))?,
            conv5_2: conv2d(quarter, quarter, 3, cfg, vb.pp("conv5_2"))?,
            conv7: conv2d(quarter, quarter, 3, cfg, vb.pp("conv7"))?,
        })
    }

    fn forward(&self, x: &Tensor) -> Result<Tensor> {
        let p3 = self.conv3.forward(x)?;
        let mid = self.conv5_1.forward(x)?.relu()?;
        let p5 = self.conv5_2.forward(&mid)?;
        let p7 = self.conv7.forward(&mid)?;
        Ok(Tensor::cat(&[p3, p5, p7], 1)?.relu()?)
    }
}

/// Per-level prediction heads: class logits, box offsets, landmark
/// offsets.
struct DetectionHead {
    class: Conv2d,
    bbox: Conv2d,
    landmark: Conv2d,
}

impl DetectionHead {
    fn new(vb: &VarBuilder) -> Result<Self> {
        let cfg = Conv2dConfig::default();
        Ok(Self {
            class: conv2d(
                FPN_CHANNELS,
                ANCHORS_PER_LOCATION * 2,
                1,
                cfg,
                vb.pp("class"),
            )?,
            bbox: conv2d(FPN_CHANNELS, ANCHORS_PER_LOCATION * 4, 1, cfg, vb.pp("bbox"))?,
            landmark: conv2d(
                FPN_CHANNELS,
                ANCHORS_PER_LOCATION * 10,
                1,
                cfg,
                vb.pp("landmark"),
            )?,
        })
    }

    /// Runs the head and flattens each output to `(anchors, channels)`.
    fn forward(&self, x: &Tensor) -> Result<(Tensor, Tensor, Tensor)> {
        let flatten = |t: Tensor, ch: usize| -> Result<Tensor> {
            let (_, _, h, w) = t.dims4()?;
            Ok(t.permute((0, 2, 3, 1))?
                .contiguous()?
                .reshape((h * w * ANCHORS_PER_LOCATION, ch))?)
        };
        let class = flatten(self.class.forward(x)?, 2)?;
        let bbox = flatten(self.bbox.forward(x)?, 4)?;
        let landmark = flatten(self.landmark.forward(x)?, 10)?;
        Ok((class, bbox, landmark))
    }
}

/// `RetinaFace` face detection model.
pub struct RetinaFace {
    backbone_to_c1: Vec<ConvDw>,
    stem: ConvBn,
    backbone_to_c2: Vec<ConvDw>,
    backbone_to_c3: Vec<ConvDw>,
    lateral1: Conv2d,
    lateral2: Conv2d,
    lateral3: Conv2d,
    merge1: Conv2d,
    merge2: Conv2d,
    context: [ContextModule; 3],
    heads: [DetectionHead; 3],
    priors: Vec<[f32; 4]>,
    device: Device,
}

impl RetinaFace {
    /// Creates the model from weights.
    ///
    /// # Errors
    ///
    /// Returns an error if model weights cannot be loaded or are invalid.
    #[allow(clippy::needless_pass_by_value)]
    pub fn new(vb: VarBuilder) -> Result<Self> {
        let device = vb.device().clone();

        let stem = ConvBn::new(3, 8, 2, &vb.pp("stem"))?;

        // Stage producing the stride-8 feature map (64 channels).
        let c1_config = [(8, 16, 1), (16, 32, 2), (32, 32, 1), (32, 64, 2), (64, 64, 1)];
        let mut backbone_to_c1 = Vec::new();
        for (i, (in_c, out_c, s)) in c1_config.iter().enumerate() {
            backbone_to_c1.push(ConvDw::new(*in_c, *out_c, *s, &vb.pp(format!("stage1.{i}")))?);
        }

        // Stage producing the stride-16 feature map (128 channels).
        let c2_config = [
            (64, 128, 2),
            (128, 128, 1),
            (128, 128, 1),
            (128, 128, 1),
            (128, 128, 1),
            (128, 128, 1),
        ];
        let mut backbone_to_c2 = Vec::new();
        for (i, (in_c, out_c, s)) in c2_config.iter().enumerate() {
            backbone_to_c2.push(ConvDw::new(*in_c, *out_c, *s, &vb.pp(format!("stage2.{i}")))?);
        }

        // Stage producing the stride-32 feature map (256 channels).
        let c3_config = [(128, 256, 2), (256, 256, 1)];
        let mut backbone_to_c3 = Vec::new();
        for (i, (in_c, out_c, s)) in c3_config.iter().enumerate() {
            backbone_to_c3.push(ConvDw::new(*in_c, *out_c, *s, &vb.pp(format!("stage3.{i}")))?);
        }

        let lateral_cfg = Conv2dConfig::default();
        let merge_cfg = Conv2dConfig {
            padding: 1,
            ..Conv2dConfig::default()
        };
        let lateral1 = conv2d(64, FPN_CHANNELS, 1, lateral_cfg, vb.pp("fpn.lateral1"))?;
        let lateral2 = conv2d(128, FPN_CHANNELS, 1, lateral_cfg, vb.pp("fpn.lateral2"))?;
        let lateral3 = conv2d(256, FPN_CHANNELS, 1, lateral_cfg, vb.pp("fpn.lateral3"))?;
        let merge1 = conv2d(FPN_CHANNELS, FPN_CHANNELS, 3, merge_cfg, vb.pp("fpn.merge1"))?;
        let merge2 = conv2d(FPN_CHANNELS, FPN_CHANNELS, 3, merge_cfg, vb.pp("fpn.merge2"))?;

        let context = [
            ContextModule::new(&vb.pp("ssh1"))?,
            ContextModule::new(&vb.pp("ssh2"))?,
            ContextModule::new(&vb.pp("ssh3"))?,
        ];
        let heads = [
            DetectionHead::new(&vb.pp("head1"))?,
            DetectionHead::new(&vb.pp("head2"))?,
            DetectionHead::new(&vb.pp("head3"))?,
        ];

        Ok(Self {
            backbone_to_c1,
            stem,
            backbone_to_c2,
            backbone_to_c3,
            lateral1,
            lateral2,
            lateral3,
            merge1,
            merge2,
            context,
            heads,
            priors: generate_priors(),
            device,
        })
    }

    /// Preprocesses an image into a `(1, 3, 640, 640)` tensor with
    /// per-channel mean subtraction.
    ///
    /// # Errors
    ///
    /// Returns an error if tensor creation fails.
    pub fn preprocess(&self, image: &RgbImage) -> Result<Tensor> {
        let resized = image::imageops::resize(
            image,
            INPUT_SIZE as u32,
            INPUT_SIZE as u32,
            image::imageops::FilterType::Triangle,
        );

        let data: Vec<f32> = resized
            .pixels()
            .flat_map(|p| {
                [
                    f32::from(p[0]) - CHANNEL_MEANS[0],
                    f32::from(p[1]) - CHANNEL_MEANS[1],
                    f32::from(p[2]) - CHANNEL_MEANS[2],
                ]
            })
            .collect();

        let tensor = Tensor::from_vec(data, (1, INPUT_SIZE, INPUT_SIZE, 3), &self.device)?;
        tensor
            .permute((0, 3, 1, 2))?
            .to_dtype(DType::F32)
            .context("Failed to preprocess detector input")
    }

    /// Runs the network, returning per-anchor class logits, box offsets,
    /// and landmark offsets.
    fn forward(&self, x: &Tensor) -> Result<(Tensor, Tensor, Tensor)> {
        let mut h = self.stem.forward(x)?;
        for block in &self.backbone_to_c1 {
            h = block.forward(&h)?;
        }
        let c1 = h.clone();
        for block in &self.backbone_to_c2 {
            h = block.forward(&h)?;
        }
        let c2 = h.clone();
        for block in &self.backbone_to_c3 {
            h = block.forward(&h)?;
        }
        let c3 = h;

        // Feature pyramid: top-down nearest upsampling with lateral sums.
        let p3 = self.lateral3.forward(&c3)?;
        let (_, _, h2, w2) = c2.dims4()?;
        let p2 = (self.lateral2.forward(&c2)? + p3.upsample_nearest2d(h2, w2)?)?;
        let p2 = self.merge2.forward(&p2)?.relu()?;
        let (_, _, h1, w1) = c1.dims4()?;
        let p1 = (self.lateral1.forward(&c1)? + p2.upsample_nearest2d(h1, w1)?)?;
        let p1 = self.merge1.forward(&p1)?.relu()?;

        let mut classes = Vec::with_capacity(3);
        let mut boxes = Vec::with_capacity(3);
        let mut landmarks = Vec::with_capacity(3);
        for (level, feature) in [p1, p2, p3].iter().enumerate() {
            let ctx = self.context[level].forward(feature)?;
            let (c, b, l) = self.heads[level].forward(&ctx)?;
            classes.push(c);
            boxes.push(b);
            landmarks.push(l);
        }

        Ok((
            Tensor::cat(&classes, 0)?,
            Tensor::cat(&boxes, 0)?,
            Tensor::cat(&landmarks, 0)?,
        ))
    }

    /// Detects faces in an image.
    ///
    /// Returns detections in source-image pixel coordinates, ordered by
    /// descending confidence, excluding candidates below
    /// `confidence_floor`.
    ///
    /// # Errors
    ///
    /// Returns an error if inference fails.
    pub fn detect(&self, image: &RgbImage, confidence_floor: f32) -> Result<Vec<FaceDetection>> {
        anyhow::ensure!(
            image.width() > 0 && image.height() > 0,
            "detector input image is empty"
        );

        let input = self.preprocess(image)?;
        let (classes, boxes, landmarks) = self.forward(&input)?;

        let classes = classes.to_vec2::<f32>()?;
        let boxes = boxes.to_vec2::<f32>()?;
        let landmarks = landmarks.to_vec2::<f32>()?;

        let scale_x = image.width() as f32;
        let scale_y = image.height() as f32;

        let mut detections = Vec::new();
        for (i, prior) in self.priors.iter().enumerate() {
            let score = softmax2(classes[i][0], classes[i][1]);
            if score < confidence_floor {
                continue;
            }

            let corners = decode_box(prior, &boxes[i]);
            let points = decode_landmarks(prior, &landmarks[i]);

            let bbox = BoundingBox::new(
                (corners[0] * scale_x).clamp(0.0, scale_x),
                (corners[1] * scale_y).clamp(0.0, scale_y),
                (corners[2] * scale_x).clamp(0.0, scale_x),
                (corners[3] * scale_y).clamp(0.0, scale_y),
            );
            let point = |k: usize| Point::new(points[k][0] * scale_x, points[k][1] * scale_y);

            detections.push(FaceDetection {
                bbox,
                confidence: score,
                landmarks: FaceLandmarks {
                    left_eye: point(0),
                    right_eye: point(1),
                    nose: point(2),
                    left_mouth: point(3),
                    right_mouth: point(4),
                },
            });
        }

        Ok(nms(detections))
    }
}

/// Generates the normalized anchor grid `[cx, cy, w, h]` for the three
/// pyramid levels.
fn generate_priors() -> Vec<[f32; 4]> {
    let mut priors = Vec::with_capacity(NUM_ANCHORS);
    for (level, step) in STEPS.iter().enumerate() {
        let cells = INPUT_SIZE / step;
        for row in 0..cells {
            for col in 0..cells {
                for min_size in MIN_SIZES[level] {
                    let s = min_size as f32 / INPUT_SIZE as f32;
                    let cx = (col as f32 + 0.5) * *step as f32 / INPUT_SIZE as f32;
                    let cy = (row as f32 + 0.5) * *step as f32 / INPUT_SIZE as f32;
                    priors.push([cx, cy, s, s]);
                }
            }
        }
    }
    priors
}

/// Decodes anchor-relative box offsets to normalized corner coordinates.
fn decode_box(prior: &[f32; 4], loc: &[f32]) -> [f32; 4] {
    let cx = prior[0] + loc[0] * VARIANCES[0] * prior[2];
    let cy = prior[1] + loc[1] * VARIANCES[0] * prior[3];
    let w = prior[2] * (loc[2] * VARIANCES[1]).exp();
    let h = prior[3] * (loc[3] * VARIANCES[1]).exp();
    [cx - w / 2.0, cy - h / 2.0, cx + w / 2.0, cy + h / 2.0]
}

/// Decodes the five anchor-relative landmark offsets to normalized
/// coordinates.
fn decode_landmarks(prior: &[f32; 4], offsets: &[f32]) -> [[f32; 2]; 5] {
    let mut points = [[0.0f32; 2]; 5];
    for (k, point) in points.iter_mut().enumerate() {
        point[0] = prior[0] + offsets[k * 2] * VARIANCES[0] * prior[2];
        point[1] = prior[1] + offsets[k * 2 + 1] * VARIANCES[0] * prior[3];
    }
    points
}

/// Non-maximum suppression, keeping the highest-confidence detection of
/// each overlapping cluster. Output stays sorted by descending
/// confidence.
fn nms(mut detections: Vec<FaceDetection>) -> Vec<FaceDetection> {
    detections.sort_by(|a, b| {
        b.confidence
            .partial_cmp(&a.confidence)
            .unwrap_or(std::cmp::Ordering::Equal)
    });

    let mut keep: Vec<FaceDetection> = Vec::new();
    for det in detections {
        if keep.iter().all(|k| iou(&k.bbox, &det.bbox) < NMS_THRESHOLD) {
            keep.push(det);
        }
    }
    keep
}

/// Intersection over Union for two bounding boxes.
fn iou(a: &BoundingBox, b: &BoundingBox) -> f32 {
    let x1 = a.x1.max(b.x1);
    let y1 = a.y1.max(b.y1);
    let x2 = a.x2.min(b.x2);
    let y2 = a.y2.min(b.y2);

    let intersection = (x2 - x1).max(0.0) * (y2 - y1).max(0.0);
    let union = a.width() * a.height() + b.width() * b.height() - intersection;

    if union > 0.0 {
        intersection / union
    } else {
        0.0
    }
}
