//! `glam` adapters for the GL conventions this crate follows.
//!
//! Matrices are column-major with column vectors (`p' = M * p`), and
//! composition follows fixed-function GL: `current = current * op`, so the
//! last operation issued is the first one applied to a vertex. Projection
//! helpers take `f64` planes the way the immediate-mode API does.

pub use glam::{Mat4, Quat, Vec3, Vec4};

/// Perspective frustum, `glFrustum` semantics. Intermediates stay in `f64`.
pub fn frustum(left: f64, right: f64, bottom: f64, top: f64, near: f64, far: f64) -> Mat4 {
    let rl = right - left;
    let tb = top - bottom;
    let fn_ = far - near;

    Mat4::from_cols(
        Vec4::new((near * 2.0 / rl) as f32, 0.0, 0.0, 0.0),
        Vec4::new(0.0, (near * 2.0 / tb) as f32, 0.0, 0.0),
        Vec4::new(
            ((right + left) / rl) as f32,
            ((top + bottom) / tb) as f32,
            (-(far + near) / fn_) as f32,
            -1.0,
        ),
        Vec4::new(0.0, 0.0, (-(far * near * 2.0) / fn_) as f32, 0.0),
    )
}

/// Orthographic projection, `glOrtho` semantics.
pub fn ortho(left: f64, right: f64, bottom: f64, top: f64, near: f64, far: f64) -> Mat4 {
    Mat4::orthographic_rh_gl(left as f32, right as f32, bottom as f32, top as f32, near as f32, far as f32)
}

/// Rotation of `angle` radians around `axis`, normalized here. A zero axis
/// yields identity.
pub fn rotation(axis: Vec3, angle: f32) -> Mat4 {
    match axis.try_normalize() {
        Some(axis) => Mat4::from_axis_angle(axis, angle),
        None => Mat4::IDENTITY,
    }
}

/// Builds a matrix from rows (`rows[r][c]`), the layout row-major SDKs use.
#[inline]
pub fn from_rows(rows: [[f32; 4]; 4]) -> Mat4 {
    Mat4::from_cols_array_2d(&rows).transpose()
}
