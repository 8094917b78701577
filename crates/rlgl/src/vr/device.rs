//! Narrow interface to a head-mounted display SDK.
//!
//! Only the calls the stereo bridge needs, with plain Rust types. The SDK's
//! own structs never cross this boundary.

use std::fmt;

use crate::math::{Quat, Vec3};

/// Signed SDK result code. Negative values are failures.
#[derive(Debug, Copy, Clone, Eq, PartialEq)]
pub struct VrResult(pub i32);

impl VrResult {
    #[inline]
    pub fn is_failure(self) -> bool {
        self.0 < 0
    }

    /// `Ok(())` for non-negative codes.
    pub fn check(code: i32) -> Result<(), VrResult> {
        if code < 0 { Err(VrResult(code)) } else { Ok(()) }
    }
}

impl fmt::Display for VrResult {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "VR SDK call failed with code {}", self.0)
    }
}

impl std::error::Error for VrResult {}

#[derive(Debug, Copy, Clone, Eq, PartialEq, Hash)]
pub enum Eye {
    Left,
    Right,
}

impl Eye {
    /// Render order.
    pub const BOTH: [Eye; 2] = [Eye::Left, Eye::Right];

    #[inline]
    pub fn index(self) -> usize {
        match self {
            Eye::Left => 0,
            Eye::Right => 1,
        }
    }
}

/// Field of view as tangents of the half-angles.
#[derive(Debug, Copy, Clone, Default, PartialEq)]
pub struct FovPort {
    pub up_tan: f32,
    pub down_tan: f32,
    pub left_tan: f32,
    pub right_tan: f32,
}

#[derive(Debug, Copy, Clone, Default, Eq, PartialEq)]
pub struct TextureSize {
    pub width: u32,
    pub height: u32,
}

#[derive(Debug, Copy, Clone, Default, PartialEq)]
pub struct HmdDesc {
    pub resolution: TextureSize,
    pub default_eye_fov: [FovPort; 2],
}

#[derive(Debug, Copy, Clone, Default, PartialEq)]
pub struct EyeRenderDesc {
    pub fov: FovPort,
    pub hmd_to_eye_offset: Vec3,
}

/// Tracked pose in tracking space, metres.
#[derive(Debug, Copy, Clone, PartialEq)]
pub struct Pose {
    pub orientation: Quat,
    pub position: Vec3,
}

impl Default for Pose {
    fn default() -> Self {
        Self {
            orientation: Quat::IDENTITY,
            position: Vec3::ZERO,
        }
    }
}

#[derive(Debug, Copy, Clone, Default, Eq, PartialEq)]
pub struct SessionStatus {
    pub is_visible: bool,
    pub hmd_present: bool,
    pub should_quit: bool,
    pub should_recenter: bool,
}

#[derive(Debug, Copy, Clone, Eq, PartialEq, Hash)]
pub struct SessionHandle(pub u64);

#[derive(Debug, Copy, Clone, Eq, PartialEq, Hash)]
pub struct SwapChainHandle(pub u64);

#[derive(Debug, Copy, Clone, Eq, PartialEq, Hash)]
pub struct MirrorHandle(pub u64);

/// sRGB RGBA8 textures, single sample.
#[derive(Debug, Copy, Clone, Eq, PartialEq)]
pub struct SwapChainDesc {
    pub size: TextureSize,
}

#[derive(Debug, Copy, Clone, Eq, PartialEq)]
pub struct MirrorDesc {
    pub size: TextureSize,
}

/// One stereo layer: both eyes side by side in one swap chain.
#[derive(Debug, Copy, Clone, PartialEq)]
pub struct LayerEyeFov {
    pub swap_chain: SwapChainHandle,
    /// `[x, y, width, height]` per eye inside the swap-chain texture.
    pub viewports: [[i32; 4]; 2],
    pub fov: [FovPort; 2],
    pub render_pose: [Pose; 2],
    pub sensor_sample_time: f64,
}

#[derive(Debug, Copy, Clone, PartialEq)]
pub struct ViewScaleDesc {
    pub hmd_to_eye_offset: [Vec3; 2],
    pub world_scale_in_meters: f32,
}

/// A VR runtime. Every call reports failure through [`VrResult`]; outputs
/// exist only on success.
pub trait VrDevice {
    fn initialize(&mut self) -> Result<(), VrResult>;
    fn create_session(&mut self) -> Result<SessionHandle, VrResult>;
    fn hmd_desc(&mut self, session: SessionHandle) -> Result<HmdDesc, VrResult>;
    fn render_desc(&mut self, session: SessionHandle, eye: Eye, fov: FovPort) -> Result<EyeRenderDesc, VrResult>;
    fn fov_texture_size(&mut self, session: SessionHandle, eye: Eye, fov: FovPort, pixel_density: f32) -> Result<TextureSize, VrResult>;

    fn create_swap_chain(&mut self, session: SessionHandle, desc: &SwapChainDesc) -> Result<SwapChainHandle, VrResult>;
    fn swap_chain_length(&mut self, session: SessionHandle, chain: SwapChainHandle) -> Result<usize, VrResult>;
    fn swap_chain_current_index(&mut self, session: SessionHandle, chain: SwapChainHandle) -> Result<usize, VrResult>;
    /// GL texture name of buffer `index`.
    fn swap_chain_buffer(&mut self, session: SessionHandle, chain: SwapChainHandle, index: usize) -> Result<u32, VrResult>;
    fn commit_swap_chain(&mut self, session: SessionHandle, chain: SwapChainHandle) -> Result<(), VrResult>;
    fn destroy_swap_chain(&mut self, session: SessionHandle, chain: SwapChainHandle);

    fn create_mirror_texture(&mut self, session: SessionHandle, desc: &MirrorDesc) -> Result<MirrorHandle, VrResult>;
    /// GL texture name of the mirror.
    fn mirror_texture_buffer(&mut self, session: SessionHandle, mirror: MirrorHandle) -> Result<u32, VrResult>;
    fn destroy_mirror_texture(&mut self, session: SessionHandle, mirror: MirrorHandle);

    /// Predicted poses for `frame_index` and the time they were sampled.
    fn eye_poses(
        &mut self,
        session: SessionHandle,
        frame_index: u64,
        latency_marker: bool,
        hmd_to_eye_offset: [Vec3; 2],
    ) -> Result<([Pose; 2], f64), VrResult>;
    fn submit_frame(
        &mut self,
        session: SessionHandle,
        frame_index: u64,
        view_scale: &ViewScaleDesc,
        layers: &[LayerEyeFov],
    ) -> Result<(), VrResult>;

    fn recenter_tracking_origin(&mut self, session: SessionHandle) -> Result<(), VrResult>;
    fn session_status(&mut self, session: SessionHandle) -> Result<SessionStatus, VrResult>;

    fn destroy_session(&mut self, session: SessionHandle);
    fn shutdown(&mut self);
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn negative_codes_are_failures() {
        assert!(VrResult(-1006).is_failure());
        assert!(!VrResult(0).is_failure());
        assert!(!VrResult(1000).is_failure());
        assert_eq!(VrResult::check(-3), Err(VrResult(-3)));
        assert_eq!(VrResult::check(1), Ok(()));
    }

    #[test]
    fn eyes_index_in_render_order() {
        let idx: Vec<usize> = Eye::BOTH.iter().map(|e| e.index()).collect();
        assert_eq!(idx, vec![0, 1]);
    }
}
