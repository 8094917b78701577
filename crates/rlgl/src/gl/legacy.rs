//! OpenGL 1.1 entry points `glow` does not expose.
//!
//! Loaded through the same loader as the `glow` context. Only the fixed
//! function calls the client-array strategy needs are resolved.

use std::ffi::c_void;

use crate::backend::{BackendError, DrawRange, VertexArrays};
use crate::math::Mat4;

pub const MODELVIEW: u32 = 0x1700;
pub const PROJECTION: u32 = 0x1701;
pub const VERTEX_ARRAY: u32 = 0x8074;
pub const NORMAL_ARRAY: u32 = 0x8075;
pub const COLOR_ARRAY: u32 = 0x8076;
pub const TEXTURE_COORD_ARRAY: u32 = 0x8078;
pub const TEXTURE_2D_ENABLE: u32 = 0x0DE1;
pub const QUADS: u32 = 0x0007;

const FLOAT: u32 = 0x1406;
const UNSIGNED_BYTE: u32 = 0x1401;

type MatrixModeFn = unsafe extern "system" fn(mode: u32);
type LoadMatrixFn = unsafe extern "system" fn(m: *const f32);
type ClientStateFn = unsafe extern "system" fn(array: u32);
type PointerFn = unsafe extern "system" fn(size: i32, ty: u32, stride: i32, ptr: *const c_void);
type NormalPointerFn = unsafe extern "system" fn(ty: u32, stride: i32, ptr: *const c_void);

pub struct LegacyGl {
    matrix_mode: MatrixModeFn,
    load_matrixf: LoadMatrixFn,
    enable_client_state: ClientStateFn,
    disable_client_state: ClientStateFn,
    vertex_pointer: PointerFn,
    tex_coord_pointer: PointerFn,
    color_pointer: PointerFn,
    normal_pointer: NormalPointerFn,
}

macro_rules! load {
    ($loader:expr, $name:literal, $ty:ty) => {{
        let ptr = $loader($name);
        if ptr.is_null() {
            return Err(BackendError::Unsupported($name));
        }
        // SAFETY: the loader returned a non-null entry point for this
        // exact GL 1.1 signature.
        unsafe { std::mem::transmute::<*const c_void, $ty>(ptr) }
    }};
}

impl LegacyGl {
    pub fn load<F: FnMut(&str) -> *const c_void>(mut loader: F) -> Result<Self, BackendError> {
        Ok(Self {
            matrix_mode: load!(loader, "glMatrixMode", MatrixModeFn),
            load_matrixf: load!(loader, "glLoadMatrixf", LoadMatrixFn),
            enable_client_state: load!(loader, "glEnableClientState", ClientStateFn),
            disable_client_state: load!(loader, "glDisableClientState", ClientStateFn),
            vertex_pointer: load!(loader, "glVertexPointer", PointerFn),
            tex_coord_pointer: load!(loader, "glTexCoordPointer", PointerFn),
            color_pointer: load!(loader, "glColorPointer", PointerFn),
            normal_pointer: load!(loader, "glNormalPointer", NormalPointerFn),
        })
    }

    /// # Safety
    /// A GL 1.1 context must be current.
    pub unsafe fn load_matrices(&self, projection: &Mat4, modelview: &Mat4) {
        let p = projection.to_cols_array();
        let mv = modelview.to_cols_array();
        unsafe {
            (self.matrix_mode)(PROJECTION);
            (self.load_matrixf)(p.as_ptr());
            (self.matrix_mode)(MODELVIEW);
            (self.load_matrixf)(mv.as_ptr());
        }
    }

    /// Points the client arrays at `arrays` and enables the present streams.
    /// Returns the enabled states for [`LegacyGl::disable`].
    ///
    /// # Safety
    /// A GL 1.1 context must be current and `arrays` must outlive the draw.
    pub unsafe fn enable(&self, arrays: &VertexArrays<'_>) -> Vec<u32> {
        let mut enabled = Vec::with_capacity(4);
        unsafe {
            (self.enable_client_state)(VERTEX_ARRAY);
            (self.vertex_pointer)(3, FLOAT, 0, arrays.vertices.as_ptr().cast());
            enabled.push(VERTEX_ARRAY);

            if let Some(t) = arrays.texcoords {
                (self.enable_client_state)(TEXTURE_COORD_ARRAY);
                (self.tex_coord_pointer)(2, FLOAT, 0, t.as_ptr().cast());
                enabled.push(TEXTURE_COORD_ARRAY);
            }
            if let Some(n) = arrays.normals {
                (self.enable_client_state)(NORMAL_ARRAY);
                (self.normal_pointer)(FLOAT, 0, n.as_ptr().cast());
                enabled.push(NORMAL_ARRAY);
            }
            if let Some(c) = arrays.colors {
                (self.enable_client_state)(COLOR_ARRAY);
                (self.color_pointer)(4, UNSIGNED_BYTE, 0, c.as_ptr().cast());
                enabled.push(COLOR_ARRAY);
            }
        }
        enabled
    }

    /// # Safety
    /// A GL 1.1 context must be current.
    pub unsafe fn disable(&self, enabled: &[u32]) {
        for &state in enabled {
            unsafe { (self.disable_client_state)(state) };
        }
    }
}

/// Vertex range a quads draw covers when drawn as `GL_QUADS` without an
/// index buffer. Six indices per quad map to four vertices.
pub fn quad_vertex_range(range: DrawRange) -> (i32, i32) {
    match range {
        DrawRange::Arrays { first, count } => (first as i32, count as i32),
        DrawRange::Indexed { count, byte_offset } => {
            let first_index = byte_offset / size_of::<u32>();
            ((first_index / 6 * 4) as i32, (count / 6 * 4) as i32)
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn indexed_quads_become_vertex_ranges() {
        assert_eq!(quad_vertex_range(DrawRange::Indexed { count: 6, byte_offset: 0 }), (0, 4));
        assert_eq!(
            quad_vertex_range(DrawRange::Indexed { count: 18, byte_offset: 24 * 4 }),
            (16, 12)
        );
        assert_eq!(quad_vertex_range(DrawRange::Arrays { first: 3, count: 9 }), (3, 9));
    }

    #[test]
    fn missing_entry_point_is_unsupported() {
        let err = LegacyGl::load(|_| std::ptr::null()).err();
        assert_eq!(err, Some(BackendError::Unsupported("glMatrixMode")));
    }
}
