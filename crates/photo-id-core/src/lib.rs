//! ID Photo Core - standards-compliant identification photos from
//! arbitrary portraits.
//!
//! This crate contains the pure pipeline: face detection, portrait
//! matting, alignment and crop under head-geometry constraints,
//! background compositing, and print-sheet layout. Transport, image
//! codecs, and file I/O are external collaborators; the pipeline takes
//! an already-decoded raster image plus a configuration record and
//! returns a structured result.

pub mod domain;
pub mod inference;
pub mod pipeline;
pub mod ports;

pub use domain::{
    AlignmentRatios, AlphaMatte, BoundingBox, ColorSpec, FaceDetection, FaceLandmarks,
    IdPhotoResult, LayoutSheet, MattePair, PhotoSizeSpec, PipelineError, Placement, Point,
    PresetTable, SheetSpec,
};
pub use inference::{InferenceSession, ModelPaths};
pub use pipeline::{
    composite, composite_rgba, detect_faces, pack_sheet, run_pipeline, IdPhotoCreator,
    PipelineConfig, Stage,
};
pub use ports::{FaceDetector, PortraitMatter};
