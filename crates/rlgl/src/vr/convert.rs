//! Conversions between SDK-side data and [`Mat4`].
//!
//! SDK matrices are row-major `[[f32; 4]; 4]` indexed `m[row][col]` and act on
//! column vectors, the same maths as [`Mat4`] with the storage transposed:
//! `ovr[r][c] == m.row(r)[c]`.

use crate::math::{self, Mat4};

use super::device::{FovPort, Pose};

pub fn matrix_from_ovr(m: &[[f32; 4]; 4]) -> Mat4 {
    math::from_rows(*m)
}

pub fn matrix_to_ovr(m: &Mat4) -> [[f32; 4]; 4] {
    m.transpose().to_cols_array_2d()
}

/// Off-axis perspective projection for an eye's field of view.
pub fn projection_from_fov(fov: &FovPort, near: f64, far: f64) -> Mat4 {
    math::frustum(
        -(fov.left_tan as f64) * near,
        fov.right_tan as f64 * near,
        -(fov.down_tan as f64) * near,
        fov.up_tan as f64 * near,
        near,
        far,
    )
}

/// View matrix of a tracked eye: inverse rotation after inverse translation.
pub fn view_from_pose(pose: &Pose) -> Mat4 {
    Mat4::from_quat(pose.orientation.normalize().conjugate()) * Mat4::from_translation(-pose.position)
}
