//! Stereo rendering: per-eye matrices applied at flush time, a headset
//! session driven through [`VrDevice`], and a simulator that distorts a
//! side-by-side render texture for a flat screen.

mod bridge;
pub mod convert;
mod device;
mod simulator;
mod stereo;

pub use bridge::VrSession;
pub use device::{
    Eye, EyeRenderDesc, FovPort, HmdDesc, LayerEyeFov, MirrorDesc, MirrorHandle, Pose, SessionHandle,
    SessionStatus, SwapChainDesc, SwapChainHandle, TextureSize, ViewScaleDesc, VrDevice, VrResult,
};
pub use simulator::VrSimulator;
pub use stereo::{DistortionParams, StereoConfig, StereoView, VrDeviceInfo};
