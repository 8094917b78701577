//! GPU backend seam.
//!
//! Everything above this module speaks in plain `u32` handles (`0` = null) and
//! `i32` uniform locations (`-1` = absent). A backend owns the graphics context
//! and translates these calls for one API generation; the strategy is chosen
//! once, at construction.
//!
//! Implementations:
//! - [`crate::gl::GlBackend`] drives a real context through `glow`.
//! - [`recording::RecordingBackend`] records commands for headless tests.

mod error;
pub mod recording;

pub use error::BackendError;

use crate::batch::DrawMode;
use crate::caps::{Capabilities, GlProfile};
use crate::math::Mat4;
use crate::resources::PixelFormat;

// ── attribute slots ───────────────────────────────────────────────────────

pub const ATTRIB_POSITION: u32 = 0;
pub const ATTRIB_TEXCOORD: u32 = 1;
pub const ATTRIB_NORMAL: u32 = 2;
pub const ATTRIB_COLOR: u32 = 3;
pub const ATTRIB_TANGENT: u32 = 4;
pub const ATTRIB_TEXCOORD2: u32 = 5;

/// Attribute names bound to fixed slots before every program link.
pub const DEFAULT_ATTRIBUTES: [(u32, &str); 6] = [
    (ATTRIB_POSITION, "vertexPosition"),
    (ATTRIB_TEXCOORD, "vertexTexCoord"),
    (ATTRIB_NORMAL, "vertexNormal"),
    (ATTRIB_COLOR, "vertexColor"),
    (ATTRIB_TANGENT, "vertexTangent"),
    (ATTRIB_TEXCOORD2, "vertexTexCoord2"),
];

// ── parameter types ───────────────────────────────────────────────────────

#[derive(Debug, Copy, Clone, Eq, PartialEq)]
pub enum ShaderStage {
    Vertex,
    Fragment,
}

/// Toggleable pipeline state.
#[derive(Debug, Copy, Clone, Eq, PartialEq)]
pub enum Capability {
    DepthTest,
    Blend,
    CullFace,
}

#[derive(Debug, Copy, Clone, Eq, PartialEq)]
pub enum TextureWrap {
    Repeat,
    Clamp,
    MirrorRepeat,
    /// Needs the `mirror_clamp` capability.
    MirrorClamp,
}

#[derive(Debug, Copy, Clone, Eq, PartialEq)]
pub enum FilterMode {
    Nearest,
    Linear,
    NearestMipmapNearest,
    LinearMipmapNearest,
    NearestMipmapLinear,
    LinearMipmapLinear,
}

#[derive(Debug, Copy, Clone, PartialEq)]
pub enum TextureParam {
    WrapS(TextureWrap),
    WrapT(TextureWrap),
    MinFilter(FilterMode),
    MagFilter(FilterMode),
    /// Already clamped to the probed maximum.
    Anisotropy(f32),
}

#[derive(Debug, Copy, Clone, PartialEq)]
pub enum UniformValue {
    Float(f32),
    Vec2([f32; 2]),
    Vec3([f32; 3]),
    Vec4([f32; 4]),
    Int(i32),
    /// Column-major.
    Mat4([f32; 16]),
}

#[derive(Debug, Copy, Clone, Eq, PartialEq)]
pub struct TextureDesc {
    pub width: u32,
    pub height: u32,
    pub format: PixelFormat,
}

#[derive(Debug, Clone, Eq, PartialEq)]
pub enum FramebufferStatus {
    Complete,
    Incomplete(String),
}

#[derive(Debug, Copy, Clone, Eq, PartialEq)]
pub enum BufferUsage {
    /// Uploaded once (meshes).
    Static,
    /// Rewritten every flush (batches).
    Dynamic,
}

/// CPU-side vertex data. Absent streams are `None`.
///
/// Layout per vertex: 3 floats position, 2 floats texcoord, 3 floats normal,
/// 4 bytes RGBA colour.
#[derive(Debug, Copy, Clone, Default)]
pub struct VertexArrays<'a> {
    pub vertices: &'a [f32],
    pub texcoords: Option<&'a [f32]>,
    pub normals: Option<&'a [f32]>,
    pub colors: Option<&'a [u8]>,
    pub indices: Option<&'a [u32]>,
}

/// GPU objects backing one [`VertexArrays`] set. Zero fields are unused.
#[derive(Debug, Copy, Clone, Default, Eq, PartialEq)]
pub struct VertexBuffers {
    pub vao: u32,
    pub positions: u32,
    pub texcoords: u32,
    pub normals: u32,
    pub colors: u32,
    pub indices: u32,
}

impl VertexBuffers {
    #[inline]
    pub fn is_null(&self) -> bool {
        *self == Self::default()
    }
}

/// Which vertices a draw consumes.
#[derive(Debug, Copy, Clone, Eq, PartialEq)]
pub enum DrawRange {
    Arrays { first: u32, count: u32 },
    /// `count` indices starting `byte_offset` bytes into the index buffer.
    Indexed { count: u32, byte_offset: usize },
}

// ── backend trait ─────────────────────────────────────────────────────────

/// One GPU API generation.
///
/// Object creation reports failure through [`BackendError`]; everything else
/// is fire-and-forget, the way GL itself behaves. Deleting handle `0` is a
/// no-op in every implementation.
pub trait GpuBackend {
    fn capabilities(&self) -> &Capabilities;

    #[inline]
    fn profile(&self) -> GlProfile {
        self.capabilities().profile
    }

    // state
    fn viewport(&mut self, x: i32, y: i32, width: i32, height: i32);
    fn clear_color(&mut self, rgba: [f32; 4]);
    fn clear(&mut self, color: bool, depth: bool);
    fn set_capability(&mut self, cap: Capability, enabled: bool);
    /// `SRC_ALPHA, ONE_MINUS_SRC_ALPHA`.
    fn set_alpha_blending(&mut self);
    fn set_depth_less_equal(&mut self);
    /// Counter-clockwise front faces, back faces culled.
    fn set_cull_back_faces(&mut self);

    // textures
    /// `levels` holds one slice per mip level; empty allocates level 0
    /// without data.
    fn create_texture(&mut self, desc: &TextureDesc, levels: &[&[u8]]) -> Result<u32, BackendError>;
    fn set_texture_param(&mut self, texture: u32, param: TextureParam);
    fn generate_mipmaps(&mut self, texture: u32) -> Result<(), BackendError>;
    fn read_texture_rgba(&mut self, texture: u32, width: u32, height: u32) -> Result<Vec<u8>, BackendError>;
    fn upload_texture_level(&mut self, texture: u32, level: u32, width: u32, height: u32, rgba: &[u8]);
    fn bind_texture(&mut self, texture: u32);
    /// Binds `texture` on texture unit `unit` and leaves unit 0 active.
    fn bind_texture_unit(&mut self, unit: u32, texture: u32);
    fn delete_texture(&mut self, texture: u32);
    /// Bottom-left origin, the way the driver returns it.
    fn read_pixels_rgba(&mut self, x: i32, y: i32, width: u32, height: u32) -> Vec<u8>;

    // shaders
    fn compile_shader(&mut self, stage: ShaderStage, source: &str) -> Result<u32, BackendError>;
    /// Binds `attributes` before linking.
    fn link_program(&mut self, vertex: u32, fragment: u32, attributes: &[(u32, &str)]) -> Result<u32, BackendError>;
    fn delete_shader(&mut self, shader: u32);
    fn delete_program(&mut self, program: u32);
    fn uniform_location(&mut self, program: u32, name: &str) -> i32;
    fn use_program(&mut self, program: u32);
    /// Applies to the program in use. Ignored for location `-1`.
    fn set_uniform(&mut self, location: i32, value: UniformValue);

    // framebuffers
    fn create_framebuffer(&mut self) -> Result<u32, BackendError>;
    fn create_depth_renderbuffer(&mut self, width: u32, height: u32) -> Result<u32, BackendError>;
    fn attach_color_texture(&mut self, framebuffer: u32, texture: u32);
    fn attach_depth_renderbuffer(&mut self, framebuffer: u32, renderbuffer: u32);
    fn framebuffer_status(&mut self, framebuffer: u32) -> FramebufferStatus;
    /// `0` selects the default framebuffer.
    fn bind_framebuffer(&mut self, framebuffer: u32);
    fn delete_framebuffer(&mut self, framebuffer: u32);
    fn delete_renderbuffer(&mut self, renderbuffer: u32);

    // geometry
    fn create_vertex_buffers(&mut self, arrays: &VertexArrays<'_>, usage: BufferUsage) -> Result<VertexBuffers, BackendError>;
    /// Rewrites the leading part of each buffer with the (already trimmed)
    /// slices in `arrays`.
    fn update_vertex_buffers(&mut self, buffers: &VertexBuffers, arrays: &VertexArrays<'_>);
    /// `arrays` is only read by strategies without buffer objects.
    fn draw_vertex_buffers(&mut self, buffers: &VertexBuffers, arrays: &VertexArrays<'_>, mode: DrawMode, range: DrawRange);
    fn delete_vertex_buffers(&mut self, buffers: &VertexBuffers);

    /// Loads both matrices into the fixed-function pipeline. Shader
    /// strategies ignore it.
    fn load_fixed_function_matrices(&mut self, projection: &Mat4, modelview: &Mat4);
}

impl<B: GpuBackend + ?Sized> GpuBackend for Box<B> {
    fn capabilities(&self) -> &Capabilities {
        (**self).capabilities()
    }
    fn viewport(&mut self, x: i32, y: i32, width: i32, height: i32) {
        (**self).viewport(x, y, width, height)
    }
    fn clear_color(&mut self, rgba: [f32; 4]) {
        (**self).clear_color(rgba)
    }
    fn clear(&mut self, color: bool, depth: bool) {
        (**self).clear(color, depth)
    }
    fn set_capability(&mut self, cap: Capability, enabled: bool) {
        (**self).set_capability(cap, enabled)
    }
    fn set_alpha_blending(&mut self) {
        (**self).set_alpha_blending()
    }
    fn set_depth_less_equal(&mut self) {
        (**self).set_depth_less_equal()
    }
    fn set_cull_back_faces(&mut self) {
        (**self).set_cull_back_faces()
    }
    fn create_texture(&mut self, desc: &TextureDesc, levels: &[&[u8]]) -> Result<u32, BackendError> {
        (**self).create_texture(desc, levels)
    }
    fn set_texture_param(&mut self, texture: u32, param: TextureParam) {
        (**self).set_texture_param(texture, param)
    }
    fn generate_mipmaps(&mut self, texture: u32) -> Result<(), BackendError> {
        (**self).generate_mipmaps(texture)
    }
    fn read_texture_rgba(&mut self, texture: u32, width: u32, height: u32) -> Result<Vec<u8>, BackendError> {
        (**self).read_texture_rgba(texture, width, height)
    }
    fn upload_texture_level(&mut self, texture: u32, level: u32, width: u32, height: u32, rgba: &[u8]) {
        (**self).upload_texture_level(texture, level, width, height, rgba)
    }
    fn bind_texture(&mut self, texture: u32) {
        (**self).bind_texture(texture)
    }
    fn bind_texture_unit(&mut self, unit: u32, texture: u32) {
        (**self).bind_texture_unit(unit, texture)
    }
    fn delete_texture(&mut self, texture: u32) {
        (**self).delete_texture(texture)
    }
    fn read_pixels_rgba(&mut self, x: i32, y: i32, width: u32, height: u32) -> Vec<u8> {
        (**self).read_pixels_rgba(x, y, width, height)
    }
    fn compile_shader(&mut self, stage: ShaderStage, source: &str) -> Result<u32, BackendError> {
        (**self).compile_shader(stage, source)
    }
    fn link_program(&mut self, vertex: u32, fragment: u32, attributes: &[(u32, &str)]) -> Result<u32, BackendError> {
        (**self).link_program(vertex, fragment, attributes)
    }
    fn delete_shader(&mut self, shader: u32) {
        (**self).delete_shader(shader)
    }
    fn delete_program(&mut self, program: u32) {
        (**self).delete_program(program)
    }
    fn uniform_location(&mut self, program: u32, name: &str) -> i32 {
        (**self).uniform_location(program, name)
    }
    fn use_program(&mut self, program: u32) {
        (**self).use_program(program)
    }
    fn set_uniform(&mut self, location: i32, value: UniformValue) {
        (**self).set_uniform(location, value)
    }
    fn create_framebuffer(&mut self) -> Result<u32, BackendError> {
        (**self).create_framebuffer()
    }
    fn create_depth_renderbuffer(&mut self, width: u32, height: u32) -> Result<u32, BackendError> {
        (**self).create_depth_renderbuffer(width, height)
    }
    fn attach_color_texture(&mut self, framebuffer: u32, texture: u32) {
        (**self).attach_color_texture(framebuffer, texture)
    }
    fn attach_depth_renderbuffer(&mut self, framebuffer: u32, renderbuffer: u32) {
        (**self).attach_depth_renderbuffer(framebuffer, renderbuffer)
    }
    fn framebuffer_status(&mut self, framebuffer: u32) -> FramebufferStatus {
        (**self).framebuffer_status(framebuffer)
    }
    fn bind_framebuffer(&mut self, framebuffer: u32) {
        (**self).bind_framebuffer(framebuffer)
    }
    fn delete_framebuffer(&mut self, framebuffer: u32) {
        (**self).delete_framebuffer(framebuffer)
    }
    fn delete_renderbuffer(&mut self, renderbuffer: u32) {
        (**self).delete_renderbuffer(renderbuffer)
    }
    fn create_vertex_buffers(&mut self, arrays: &VertexArrays<'_>, usage: BufferUsage) -> Result<VertexBuffers, BackendError> {
        (**self).create_vertex_buffers(arrays, usage)
    }
    fn update_vertex_buffers(&mut self, buffers: &VertexBuffers, arrays: &VertexArrays<'_>) {
        (**self).update_vertex_buffers(buffers, arrays)
    }
    fn draw_vertex_buffers(&mut self, buffers: &VertexBuffers, arrays: &VertexArrays<'_>, mode: DrawMode, range: DrawRange) {
        (**self).draw_vertex_buffers(buffers, arrays, mode, range)
    }
    fn delete_vertex_buffers(&mut self, buffers: &VertexBuffers) {
        (**self).delete_vertex_buffers(buffers)
    }
    fn load_fixed_function_matrices(&mut self, projection: &Mat4, modelview: &Mat4) {
        (**self).load_fixed_function_matrices(projection, modelview)
    }
}
