use crate::math::{Mat4, Vec3};

use super::device::Eye;

/// Physical description of a head-mounted display, used by the simulator.
#[derive(Debug, Copy, Clone, PartialEq)]
pub struct VrDeviceInfo {
    /// Pixels, both eyes.
    pub h_resolution: u32,
    pub v_resolution: u32,
    /// Metres.
    pub h_screen_size: f32,
    pub v_screen_size: f32,
    pub v_screen_center: f32,
    pub eye_to_screen_distance: f32,
    pub lens_separation_distance: f32,
    pub interpupillary_distance: f32,
    /// Radial warp coefficients `k0..k3`.
    pub lens_distortion_values: [f32; 4],
    pub chroma_ab_correction: [f32; 4],
}

impl VrDeviceInfo {
    pub const fn oculus_rift_cv1() -> Self {
        Self {
            h_resolution: 2160,
            v_resolution: 1200,
            h_screen_size: 0.133793,
            v_screen_size: 0.0669,
            v_screen_center: 0.04678,
            eye_to_screen_distance: 0.041,
            lens_separation_distance: 0.07,
            interpupillary_distance: 0.07,
            lens_distortion_values: [1.0, 0.22, 0.24, 0.0],
            chroma_ab_correction: [0.996, -0.004, 1.014, 0.0],
        }
    }

    #[inline]
    pub fn aspect(&self) -> f32 {
        self.h_resolution as f32 * 0.5 / self.v_resolution as f32
    }
}

impl Default for VrDeviceInfo {
    fn default() -> Self {
        Self::oculus_rift_cv1()
    }
}

/// Uniform values for the lens distortion post-pass, in normalized texture
/// coordinates of the side-by-side target.
#[derive(Debug, Copy, Clone, PartialEq)]
pub struct DistortionParams {
    pub left_lens_center: [f32; 2],
    pub right_lens_center: [f32; 2],
    pub left_screen_center: [f32; 2],
    pub right_screen_center: [f32; 2],
    pub scale: [f32; 2],
    pub scale_in: [f32; 2],
    pub device_warp: [f32; 4],
    pub chroma_ab: [f32; 4],
}

/// Per-eye matrices and viewports applied at flush time.
#[derive(Debug, Copy, Clone, PartialEq)]
pub struct StereoView {
    /// Replaces the base projection for each eye.
    pub projection: [Mat4; 2],
    /// Applied after the base modelview.
    pub view: [Mat4; 2],
    /// `[x, y, width, height]`.
    pub viewports: [[i32; 4]; 2],
    /// Restored once both eyes are drawn.
    pub full_viewport: [i32; 4],
}

impl StereoView {
    /// Left eye on the left half, right eye on the right half.
    pub fn side_by_side_viewports(width: i32, height: i32) -> [[i32; 4]; 2] {
        let half = width / 2;
        [[0, 0, half, height], [half, 0, half, height]]
    }

    /// Projection and modelview for drawing `eye`.
    #[inline]
    pub fn apply(&self, eye: Eye, base_modelview: &Mat4) -> (Mat4, Mat4) {
        let i = eye.index();
        (self.projection[i], self.view[i] * *base_modelview)
    }
}

/// Everything derived from a [`VrDeviceInfo`]: the stereo view and the
/// distortion shader parameters.
#[derive(Debug, Copy, Clone, PartialEq)]
pub struct StereoConfig {
    pub view: StereoView,
    pub distortion: DistortionParams,
}

impl StereoConfig {
    pub fn from_device(info: &VrDeviceInfo, near: f64, far: f64) -> Self {
        let aspect = info.aspect();

        // horizontal offset of each lens centre from its half-screen centre
        let lens_shift = (info.h_screen_size * 0.25 - info.lens_separation_distance * 0.5) / info.h_screen_size;

        let [k0, k1, k2, k3] = info.lens_distortion_values;
        let lens_radius = (-1.0 - 4.0 * lens_shift).abs();
        let r2 = lens_radius * lens_radius;
        let distortion_scale = k0 + k1 * r2 + k2 * r2 * r2 + k3 * r2 * r2 * r2;

        // normalized half-screen is 0.5 wide and 1.0 tall
        let distortion = DistortionParams {
            left_lens_center: [0.25 + lens_shift, 0.5],
            right_lens_center: [0.75 - lens_shift, 0.5],
            left_screen_center: [0.25, 0.5],
            right_screen_center: [0.75, 0.5],
            scale: [0.5 * 0.5 / distortion_scale, 0.5 * aspect / distortion_scale],
            scale_in: [2.0 / 0.5, 2.0 / aspect],
            device_warp: info.lens_distortion_values,
            chroma_ab: info.chroma_ab_correction,
        };

        let fovy = 2.0 * ((info.v_screen_size * 0.5 * distortion_scale) / info.eye_to_screen_distance).atan();
        let base = Mat4::perspective_rh_gl(fovy, aspect, near as f32, far as f32);
        let projection_offset = 4.0 * lens_shift;
        let projection = [
            Mat4::from_translation(Vec3::new(projection_offset, 0.0, 0.0)) * base,
            Mat4::from_translation(Vec3::new(-projection_offset, 0.0, 0.0)) * base,
        ];

        let half_ipd = info.interpupillary_distance * 0.5;
        let view = [
            Mat4::from_translation(Vec3::new(-half_ipd, 0.075, 0.045)),
            Mat4::from_translation(Vec3::new(half_ipd, 0.075, 0.045)),
        ];

        let (w, h) = (info.h_resolution as i32, info.v_resolution as i32);
        log::debug!("VR: stereo config fovy {:.2} deg, lens shift {lens_shift:.4}, distortion scale {distortion_scale:.4}", fovy.to_degrees());

        Self {
            view: StereoView {
                projection,
                view,
                viewports: StereoView::side_by_side_viewports(w, h),
                full_viewport: [0, 0, w, h],
            },
            distortion,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const EPS: f32 = 1e-5;

    fn cv1() -> StereoConfig {
        StereoConfig::from_device(&VrDeviceInfo::default(), 0.01, 1000.0)
    }

    // ── distortion ────────────────────────────────────────────────────────

    #[test]
    fn lens_centers_mirror_each_other() {
        let d = cv1().distortion;
        assert!(d.left_lens_center[0] < 0.25);
        assert!(d.right_lens_center[0] > 0.75);
        assert!((d.left_lens_center[0] + d.right_lens_center[0] - 1.0).abs() < EPS);
        assert_eq!(d.left_screen_center, [0.25, 0.5]);
        assert_eq!(d.right_screen_center, [0.75, 0.5]);
    }

    #[test]
    fn scale_in_maps_half_screen_to_unit_range() {
        let info = VrDeviceInfo::default();
        let d = cv1().distortion;
        assert!((info.aspect() - 0.9).abs() < EPS);
        assert!((d.scale_in[0] - 4.0).abs() < EPS);
        assert!((d.scale_in[1] - 2.0 / 0.9).abs() < 1e-4);
        assert_eq!(d.device_warp, info.lens_distortion_values);
        assert_eq!(d.chroma_ab, info.chroma_ab_correction);
    }

    // ── view ──────────────────────────────────────────────────────────────

    #[test]
    fn projections_shift_in_opposite_directions() {
        let v = cv1().view;
        let left = v.projection[0].col(2)[0];
        let right = v.projection[1].col(2)[0];
        assert!(left.abs() > 1e-3);
        assert!((left + right).abs() < EPS);
    }

    #[test]
    fn eye_views_are_half_ipd_apart() {
        let v = cv1().view;
        let l = v.view[0].transform_point3(Vec3::ZERO);
        let r = v.view[1].transform_point3(Vec3::ZERO);
        assert!((r.x - l.x - 0.07).abs() < EPS);
        assert!((l.y - 0.075).abs() < EPS && (l.z - 0.045).abs() < EPS);
    }

    #[test]
    fn viewports_split_the_target() {
        let v = cv1().view;
        assert_eq!(v.viewports, [[0, 0, 1080, 1200], [1080, 0, 1080, 1200]]);
        assert_eq!(v.full_viewport, [0, 0, 2160, 1200]);
    }

    #[test]
    fn apply_replaces_projection_and_composes_view() {
        let v = cv1().view;
        let base = Mat4::from_translation(Vec3::new(0.0, 0.0, -5.0));
        let (p, mv) = v.apply(Eye::Right, &base);
        assert_eq!(p, v.projection[1]);
        let o = mv.transform_point3(Vec3::ZERO);
        assert!((o - Vec3::new(0.035, 0.075, -4.955)).length() < EPS);
    }
}
