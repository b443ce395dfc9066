//! ML inference engine using Candle.
//!
//! Provides model loading and inference for:
//! - `RetinaFace`-style face detection with five landmarks
//! - encoder-decoder portrait matting

mod device;
mod loader;
mod matting;
mod retinaface;
mod session;
mod utils;

pub use device::get_device;
pub use loader::{load_safetensors, LazyModel};
pub use matting::{MattingNet, REF_SIZE};
pub use retinaface::{RetinaFace, INPUT_SIZE, NUM_ANCHORS};
pub use session::{InferenceSession, ModelPaths};
pub(crate) use utils::softmax2;
