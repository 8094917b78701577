//! [`GpuBackend`] over a live OpenGL context through `glow`.
//!
//! One backend serves all three profiles; the [`Strategy`] picked at
//! creation decides how vertex data is bound. Fixed-function matrix and
//! client-array calls go through [`legacy::LegacyGl`].

pub mod legacy;
mod strategy;

pub use strategy::Strategy;

use std::ffi::c_void;
use std::num::NonZeroU32;

use anyhow::{Context as _, Result};
use glow::{HasContext, PixelPackData, PixelUnpackData};

use crate::backend::{
    BackendError, BufferUsage, Capability, DrawRange, FilterMode, FramebufferStatus, GpuBackend, ShaderStage,
    TextureDesc, TextureParam, TextureWrap, UniformValue, VertexArrays, VertexBuffers, ATTRIB_COLOR, ATTRIB_NORMAL,
    ATTRIB_POSITION, ATTRIB_TEXCOORD,
};
use crate::batch::DrawMode;
use crate::caps::{Capabilities, GlProfile};
use crate::math::Mat4;
use crate::resources::PixelFormat;

use legacy::{quad_vertex_range, LegacyGl};

const TEXTURE_MAX_ANISOTROPY: u32 = 0x84FE;
const MAX_TEXTURE_MAX_ANISOTROPY: u32 = 0x84FF;
const MIRROR_CLAMP_EXT: u32 = 0x8742;

const COMPRESSED_RGB_S3TC_DXT1: u32 = 0x83F0;
const COMPRESSED_RGBA_S3TC_DXT1: u32 = 0x83F1;
const COMPRESSED_RGBA_S3TC_DXT3: u32 = 0x83F2;
const COMPRESSED_RGBA_S3TC_DXT5: u32 = 0x83F3;
const ETC1_RGB8_OES: u32 = 0x8D64;
const COMPRESSED_RGB8_ETC2: u32 = 0x9274;
const COMPRESSED_RGBA8_ETC2_EAC: u32 = 0x9278;
const COMPRESSED_RGB_PVRTC_4BPPV1_IMG: u32 = 0x8C00;
const COMPRESSED_RGBA_PVRTC_4BPPV1_IMG: u32 = 0x8C02;
const COMPRESSED_RGBA_ASTC_4X4_KHR: u32 = 0x93B0;
const COMPRESSED_RGBA_ASTC_8X8_KHR: u32 = 0x93B7;

/// How a [`PixelFormat`] is handed to the driver.
#[derive(Debug, Copy, Clone, Eq, PartialEq)]
enum TexFormat {
    Plain { internal: u32, format: u32, ty: u32 },
    Compressed(u32),
}

fn tex_format(format: PixelFormat, profile: GlProfile) -> TexFormat {
    use PixelFormat::*;
    // ES2 wants unsized internal formats equal to the pixel format
    let sized = profile == GlProfile::CoreProfile;
    let plain = |sized_internal: u32, format: u32, ty: u32| TexFormat::Plain {
        internal: if sized { sized_internal } else { format },
        format,
        ty,
    };
    match format {
        Grayscale if sized => plain(glow::R8, glow::RED, glow::UNSIGNED_BYTE),
        Grayscale => plain(glow::LUMINANCE, glow::LUMINANCE, glow::UNSIGNED_BYTE),
        GrayAlpha if sized => plain(glow::RG8, glow::RG, glow::UNSIGNED_BYTE),
        GrayAlpha => plain(glow::LUMINANCE_ALPHA, glow::LUMINANCE_ALPHA, glow::UNSIGNED_BYTE),
        R5G6B5 => plain(glow::RGB565, glow::RGB, glow::UNSIGNED_SHORT_5_6_5),
        R8G8B8 => plain(glow::RGB8, glow::RGB, glow::UNSIGNED_BYTE),
        R5G5B5A1 => plain(glow::RGB5_A1, glow::RGBA, glow::UNSIGNED_SHORT_5_5_5_1),
        R4G4B4A4 => plain(glow::RGBA4, glow::RGBA, glow::UNSIGNED_SHORT_4_4_4_4),
        R8G8B8A8 => plain(glow::RGBA8, glow::RGBA, glow::UNSIGNED_BYTE),
        Dxt1Rgb => TexFormat::Compressed(COMPRESSED_RGB_S3TC_DXT1),
        Dxt1Rgba => TexFormat::Compressed(COMPRESSED_RGBA_S3TC_DXT1),
        Dxt3Rgba => TexFormat::Compressed(COMPRESSED_RGBA_S3TC_DXT3),
        Dxt5Rgba => TexFormat::Compressed(COMPRESSED_RGBA_S3TC_DXT5),
        Etc1Rgb => TexFormat::Compressed(ETC1_RGB8_OES),
        Etc2Rgb => TexFormat::Compressed(COMPRESSED_RGB8_ETC2),
        Etc2EacRgba => TexFormat::Compressed(COMPRESSED_RGBA8_ETC2_EAC),
        PvrtRgb => TexFormat::Compressed(COMPRESSED_RGB_PVRTC_4BPPV1_IMG),
        PvrtRgba => TexFormat::Compressed(COMPRESSED_RGBA_PVRTC_4BPPV1_IMG),
        Astc4x4Rgba => TexFormat::Compressed(COMPRESSED_RGBA_ASTC_4X4_KHR),
        Astc8x8Rgba => TexFormat::Compressed(COMPRESSED_RGBA_ASTC_8X8_KHR),
    }
}

fn wrap_enum(wrap: TextureWrap) -> u32 {
    match wrap {
        TextureWrap::Repeat => glow::REPEAT,
        TextureWrap::Clamp => glow::CLAMP_TO_EDGE,
        TextureWrap::MirrorRepeat => glow::MIRRORED_REPEAT,
        TextureWrap::MirrorClamp => MIRROR_CLAMP_EXT,
    }
}

fn filter_enum(filter: FilterMode) -> u32 {
    match filter {
        FilterMode::Nearest => glow::NEAREST,
        FilterMode::Linear => glow::LINEAR,
        FilterMode::NearestMipmapNearest => glow::NEAREST_MIPMAP_NEAREST,
        FilterMode::LinearMipmapNearest => glow::LINEAR_MIPMAP_NEAREST,
        FilterMode::NearestMipmapLinear => glow::NEAREST_MIPMAP_LINEAR,
        FilterMode::LinearMipmapLinear => glow::LINEAR_MIPMAP_LINEAR,
    }
}

fn framebuffer_reason(status: u32) -> &'static str {
    match status {
        glow::FRAMEBUFFER_UNSUPPORTED => "unsupported",
        glow::FRAMEBUFFER_INCOMPLETE_ATTACHMENT => "incomplete attachment",
        glow::FRAMEBUFFER_INCOMPLETE_MISSING_ATTACHMENT => "missing attachment",
        glow::FRAMEBUFFER_INCOMPLETE_MULTISAMPLE => "incomplete multisample",
        _ => "unknown status",
    }
}

// ── handle mapping ────────────────────────────────────────────────────────

#[inline]
fn texture(id: u32) -> Option<glow::Texture> {
    NonZeroU32::new(id).map(glow::NativeTexture)
}

#[inline]
fn buffer(id: u32) -> Option<glow::Buffer> {
    NonZeroU32::new(id).map(glow::NativeBuffer)
}

#[inline]
fn vertex_array(id: u32) -> Option<glow::VertexArray> {
    NonZeroU32::new(id).map(glow::NativeVertexArray)
}

#[inline]
fn program(id: u32) -> Option<glow::Program> {
    NonZeroU32::new(id).map(glow::NativeProgram)
}

#[inline]
fn shader(id: u32) -> Option<glow::Shader> {
    NonZeroU32::new(id).map(glow::NativeShader)
}

#[inline]
fn framebuffer(id: u32) -> Option<glow::Framebuffer> {
    NonZeroU32::new(id).map(glow::NativeFramebuffer)
}

#[inline]
fn renderbuffer(id: u32) -> Option<glow::Renderbuffer> {
    NonZeroU32::new(id).map(glow::NativeRenderbuffer)
}

fn allocation(what: &'static str) -> impl FnOnce(String) -> BackendError {
    move |reason| BackendError::Allocation { what, reason }
}

// ── backend ───────────────────────────────────────────────────────────────

pub struct GlBackend {
    gl: glow::Context,
    legacy: Option<LegacyGl>,
    caps: Capabilities,
    strategy: Strategy,
}

/// Wraps the current GL context, logs the driver and probes capabilities.
///
/// `loader` resolves GL entry points (`glfw`/`glutin`/`sdl2` style).
/// `profile_override` forces a strategy instead of the one the version
/// string implies.
///
/// # Safety
/// A GL context must be current on this thread and stay current for the
/// backend's lifetime.
pub unsafe fn create_gl_backend<F>(mut loader: F, profile_override: Option<GlProfile>) -> Result<GlBackend>
where
    F: FnMut(&str) -> *const c_void,
{
    let gl = unsafe { glow::Context::from_loader_function(&mut loader) };
    log_driver_info(&gl);

    let version = unsafe { gl.get_parameter_string(glow::VERSION) };
    let extensions: Vec<&str> = gl.supported_extensions().iter().map(String::as_str).collect();
    let anisotropic = extensions.contains(&"GL_EXT_texture_filter_anisotropic");
    let max_anisotropy = if anisotropic {
        unsafe { gl.get_parameter_f32(MAX_TEXTURE_MAX_ANISOTROPY) }
    } else {
        0.0
    };
    let mut caps = Capabilities::probe(&version, &extensions, max_anisotropy);
    if let Some(profile) = profile_override {
        log::info!("RLGL: forcing {profile} over probed {}", caps.profile);
        caps.profile = profile;
        if profile == GlProfile::FixedFunction {
            caps.vao = false;
        }
    }

    let legacy = if caps.profile == GlProfile::FixedFunction {
        let legacy = LegacyGl::load(&mut loader).context("fixed-function entry points missing")?;
        unsafe { gl.enable(legacy::TEXTURE_2D_ENABLE) };
        Some(legacy)
    } else {
        None
    };

    let strategy = Strategy::select(&caps);
    log::info!("RLGL: vertex path: {}", strategy.description());

    Ok(GlBackend {
        gl,
        legacy,
        caps,
        strategy,
    })
}

fn log_driver_info(gl: &glow::Context) {
    fn norm(value: String) -> String {
        let trimmed = value.trim();
        if trimmed.is_empty() { "<unknown>".to_owned() } else { trimmed.to_owned() }
    }
    unsafe {
        let vendor = norm(gl.get_parameter_string(glow::VENDOR));
        let renderer = norm(gl.get_parameter_string(glow::RENDERER));
        let version = norm(gl.get_parameter_string(glow::VERSION));
        log::info!("GL: vendor: {vendor}");
        log::info!("GL: renderer: {renderer}");
        log::info!("GL: version: {version}");
        if gl.get_error() == glow::NO_ERROR {
            let glsl = norm(gl.get_parameter_string(glow::SHADING_LANGUAGE_VERSION));
            log::info!("GL: GLSL: {glsl}");
        }
    }
}

impl GlBackend {
    #[inline]
    pub fn strategy(&self) -> Strategy {
        self.strategy
    }

    #[inline]
    pub fn context(&self) -> &glow::Context {
        &self.gl
    }

    /// ES2 has no 32-bit indices without an extension; batches never need
    /// more than 16 bits there.
    #[inline]
    fn short_indices(&self) -> bool {
        self.caps.profile == GlProfile::Es2
    }

    fn upload(&self, target: u32, id: u32, bytes: &[u8], usage: BufferUsage) {
        let usage = match usage {
            BufferUsage::Static => glow::STATIC_DRAW,
            BufferUsage::Dynamic => glow::DYNAMIC_DRAW,
        };
        unsafe {
            self.gl.bind_buffer(target, buffer(id));
            self.gl.buffer_data_u8_slice(target, bytes, usage);
        }
    }

    fn new_buffer(&self, target: u32, bytes: &[u8], usage: BufferUsage) -> Result<u32, BackendError> {
        let id = unsafe { self.gl.create_buffer() }.map_err(allocation("vertex buffer"))?;
        let id = id.0.get();
        self.upload(target, id, bytes, usage);
        Ok(id)
    }

    /// Points the attribute slots at `buffers`; absent streams get a
    /// constant value instead.
    fn bind_attributes(&self, buffers: &VertexBuffers) {
        let gl = &self.gl;
        unsafe {
            let float_stream = |slot: u32, id: u32, size: i32| {
                if id == 0 {
                    gl.disable_vertex_attrib_array(slot);
                    return;
                }
                gl.bind_buffer(glow::ARRAY_BUFFER, buffer(id));
                gl.vertex_attrib_pointer_f32(slot, size, glow::FLOAT, false, 0, 0);
                gl.enable_vertex_attrib_array(slot);
            };
            float_stream(ATTRIB_POSITION, buffers.positions, 3);
            float_stream(ATTRIB_TEXCOORD, buffers.texcoords, 2);
            float_stream(ATTRIB_NORMAL, buffers.normals, 3);

            if buffers.colors == 0 {
                gl.disable_vertex_attrib_array(ATTRIB_COLOR);
                gl.vertex_attrib_4_f32(ATTRIB_COLOR, 1.0, 1.0, 1.0, 1.0);
            } else {
                gl.bind_buffer(glow::ARRAY_BUFFER, buffer(buffers.colors));
                gl.vertex_attrib_pointer_f32(ATTRIB_COLOR, 4, glow::UNSIGNED_BYTE, true, 0, 0);
                gl.enable_vertex_attrib_array(ATTRIB_COLOR);
            }

            gl.bind_buffer(glow::ELEMENT_ARRAY_BUFFER, buffer(buffers.indices));
        }
    }

    fn draw_client_arrays(&self, arrays: &VertexArrays<'_>, mode: DrawMode, range: DrawRange) {
        let Some(legacy) = &self.legacy else {
            log::warn!("GL: client-array draw without fixed-function entry points");
            return;
        };
        let (gl_mode, (first, count)) = match (mode, range) {
            (DrawMode::Quads, _) => (legacy::QUADS, quad_vertex_range(range)),
            (DrawMode::Lines, DrawRange::Arrays { first, count }) => (glow::LINES, (first as i32, count as i32)),
            (DrawMode::Triangles, DrawRange::Arrays { first, count }) => {
                (glow::TRIANGLES, (first as i32, count as i32))
            }
            (_, DrawRange::Indexed { .. }) => {
                log::warn!("GL: indexed {mode:?} draw has no client-array path");
                return;
            }
        };
        unsafe {
            let enabled = legacy.enable(arrays);
            self.gl.draw_arrays(gl_mode, first, count);
            legacy.disable(&enabled);
        }
    }

    fn read_via_framebuffer(&self, id: u32, width: u32, height: u32) -> Result<Vec<u8>, BackendError> {
        let gl = &self.gl;
        let mut out = vec![0u8; width as usize * height as usize * 4];
        unsafe {
            let fbo = gl.create_framebuffer().map_err(allocation("readback framebuffer"))?;
            gl.bind_framebuffer(glow::FRAMEBUFFER, Some(fbo));
            gl.framebuffer_texture_2d(glow::FRAMEBUFFER, glow::COLOR_ATTACHMENT0, glow::TEXTURE_2D, texture(id), 0);
            gl.pixel_store_i32(glow::PACK_ALIGNMENT, 1);
            gl.read_pixels(
                0,
                0,
                width as i32,
                height as i32,
                glow::RGBA,
                glow::UNSIGNED_BYTE,
                PixelPackData::Slice(Some(out.as_mut_slice())),
            );
            gl.bind_framebuffer(glow::FRAMEBUFFER, None);
            gl.delete_framebuffer(fbo);
        }
        Ok(out)
    }
}

impl GpuBackend for GlBackend {
    fn capabilities(&self) -> &Capabilities {
        &self.caps
    }

    // ── state ─────────────────────────────────────────────────────────────

    fn viewport(&mut self, x: i32, y: i32, width: i32, height: i32) {
        unsafe { self.gl.viewport(x, y, width, height) };
    }

    fn clear_color(&mut self, [r, g, b, a]: [f32; 4]) {
        unsafe { self.gl.clear_color(r, g, b, a) };
    }

    fn clear(&mut self, color: bool, depth: bool) {
        let mut mask = 0;
        if color {
            mask |= glow::COLOR_BUFFER_BIT;
        }
        if depth {
            mask |= glow::DEPTH_BUFFER_BIT;
        }
        if mask != 0 {
            unsafe { self.gl.clear(mask) };
        }
    }

    fn set_capability(&mut self, cap: Capability, enabled: bool) {
        let cap = match cap {
            Capability::DepthTest => glow::DEPTH_TEST,
            Capability::Blend => glow::BLEND,
            Capability::CullFace => glow::CULL_FACE,
        };
        unsafe {
            if enabled {
                self.gl.enable(cap);
            } else {
                self.gl.disable(cap);
            }
        }
    }

    fn set_alpha_blending(&mut self) {
        unsafe { self.gl.blend_func(glow::SRC_ALPHA, glow::ONE_MINUS_SRC_ALPHA) };
    }

    fn set_depth_less_equal(&mut self) {
        unsafe { self.gl.depth_func(glow::LEQUAL) };
    }

    fn set_cull_back_faces(&mut self) {
        unsafe {
            self.gl.cull_face(glow::BACK);
            self.gl.front_face(glow::CCW);
        }
    }

    // ── textures ──────────────────────────────────────────────────────────

    fn create_texture(&mut self, desc: &TextureDesc, levels: &[&[u8]]) -> Result<u32, BackendError> {
        let format = tex_format(desc.format, self.caps.profile);
        if matches!(format, TexFormat::Compressed(_)) && levels.is_empty() {
            return Err(BackendError::Unsupported("empty compressed texture"));
        }
        let gl = &self.gl;
        unsafe {
            let id = gl.create_texture().map_err(allocation("texture"))?;
            gl.bind_texture(glow::TEXTURE_2D, Some(id));
            gl.pixel_store_i32(glow::UNPACK_ALIGNMENT, 1);

            let (w, h) = (desc.width as i32, desc.height as i32);
            match format {
                TexFormat::Plain { internal, format, ty } if levels.is_empty() => {
                    gl.tex_image_2d(glow::TEXTURE_2D, 0, internal as i32, w, h, 0, format, ty, PixelUnpackData::Slice(None));
                }
                TexFormat::Plain { internal, format, ty } => {
                    for (level, data) in levels.iter().enumerate() {
                        let (lw, lh) = ((w >> level).max(1), (h >> level).max(1));
                        gl.tex_image_2d(
                            glow::TEXTURE_2D,
                            level as i32,
                            internal as i32,
                            lw,
                            lh,
                            0,
                            format,
                            ty,
                            PixelUnpackData::Slice(Some(data)),
                        );
                    }
                }
                TexFormat::Compressed(internal) => {
                    for (level, data) in levels.iter().enumerate() {
                        let (lw, lh) = ((w >> level).max(1), (h >> level).max(1));
                        gl.compressed_tex_image_2d(
                            glow::TEXTURE_2D,
                            level as i32,
                            internal as i32,
                            lw,
                            lh,
                            0,
                            data.len() as i32,
                            data,
                        );
                    }
                }
            }

            if self.caps.profile == GlProfile::CoreProfile {
                gl.tex_parameter_i32(glow::TEXTURE_2D, glow::TEXTURE_MAX_LEVEL, levels.len().saturating_sub(1) as i32);
                if desc.format == PixelFormat::Grayscale {
                    gl.tex_parameter_i32_slice(
                        glow::TEXTURE_2D,
                        glow::TEXTURE_SWIZZLE_RGBA,
                        &[glow::RED as i32, glow::RED as i32, glow::RED as i32, glow::ONE as i32],
                    );
                } else if desc.format == PixelFormat::GrayAlpha {
                    gl.tex_parameter_i32_slice(
                        glow::TEXTURE_2D,
                        glow::TEXTURE_SWIZZLE_RGBA,
                        &[glow::RED as i32, glow::RED as i32, glow::RED as i32, glow::GREEN as i32],
                    );
                }
            }
            gl.bind_texture(glow::TEXTURE_2D, None);
            Ok(id.0.get())
        }
    }

    fn set_texture_param(&mut self, id: u32, param: TextureParam) {
        let gl = &self.gl;
        unsafe {
            gl.bind_texture(glow::TEXTURE_2D, texture(id));
            match param {
                TextureParam::WrapS(w) => gl.tex_parameter_i32(glow::TEXTURE_2D, glow::TEXTURE_WRAP_S, wrap_enum(w) as i32),
                TextureParam::WrapT(w) => gl.tex_parameter_i32(glow::TEXTURE_2D, glow::TEXTURE_WRAP_T, wrap_enum(w) as i32),
                TextureParam::MinFilter(f) => {
                    gl.tex_parameter_i32(glow::TEXTURE_2D, glow::TEXTURE_MIN_FILTER, filter_enum(f) as i32)
                }
                TextureParam::MagFilter(f) => {
                    gl.tex_parameter_i32(glow::TEXTURE_2D, glow::TEXTURE_MAG_FILTER, filter_enum(f) as i32)
                }
                TextureParam::Anisotropy(level) => gl.tex_parameter_f32(glow::TEXTURE_2D, TEXTURE_MAX_ANISOTROPY, level),
            }
            gl.bind_texture(glow::TEXTURE_2D, None);
        }
    }

    fn generate_mipmaps(&mut self, id: u32) -> Result<(), BackendError> {
        if self.caps.profile == GlProfile::FixedFunction {
            return Err(BackendError::Unsupported("glGenerateMipmap"));
        }
        unsafe {
            self.gl.bind_texture(glow::TEXTURE_2D, texture(id));
            self.gl.generate_mipmap(glow::TEXTURE_2D);
            self.gl.bind_texture(glow::TEXTURE_2D, None);
        }
        Ok(())
    }

    fn read_texture_rgba(&mut self, id: u32, width: u32, height: u32) -> Result<Vec<u8>, BackendError> {
        if self.caps.profile == GlProfile::Es2 {
            return self.read_via_framebuffer(id, width, height);
        }
        let mut out = vec![0u8; width as usize * height as usize * 4];
        unsafe {
            self.gl.bind_texture(glow::TEXTURE_2D, texture(id));
            self.gl.pixel_store_i32(glow::PACK_ALIGNMENT, 1);
            self.gl.get_tex_image(
                glow::TEXTURE_2D,
                0,
                glow::RGBA,
                glow::UNSIGNED_BYTE,
                PixelPackData::Slice(Some(out.as_mut_slice())),
            );
            self.gl.bind_texture(glow::TEXTURE_2D, None);
        }
        Ok(out)
    }

    fn upload_texture_level(&mut self, id: u32, level: u32, width: u32, height: u32, rgba: &[u8]) {
        let internal = if self.caps.profile == GlProfile::CoreProfile { glow::RGBA8 } else { glow::RGBA };
        unsafe {
            self.gl.bind_texture(glow::TEXTURE_2D, texture(id));
            self.gl.tex_image_2d(
                glow::TEXTURE_2D,
                level as i32,
                internal as i32,
                width as i32,
                height as i32,
                0,
                glow::RGBA,
                glow::UNSIGNED_BYTE,
                PixelUnpackData::Slice(Some(rgba)),
            );
            self.gl.bind_texture(glow::TEXTURE_2D, None);
        }
    }

    fn bind_texture(&mut self, id: u32) {
        unsafe { self.gl.bind_texture(glow::TEXTURE_2D, texture(id)) };
    }

    fn bind_texture_unit(&mut self, unit: u32, id: u32) {
        unsafe {
            self.gl.active_texture(glow::TEXTURE0 + unit);
            self.gl.bind_texture(glow::TEXTURE_2D, texture(id));
            self.gl.active_texture(glow::TEXTURE0);
        }
    }

    fn delete_texture(&mut self, id: u32) {
        if let Some(t) = texture(id) {
            unsafe { self.gl.delete_texture(t) };
        }
    }

    fn read_pixels_rgba(&mut self, x: i32, y: i32, width: u32, height: u32) -> Vec<u8> {
        let mut out = vec![0u8; width as usize * height as usize * 4];
        unsafe {
            self.gl.pixel_store_i32(glow::PACK_ALIGNMENT, 1);
            self.gl.read_pixels(
                x,
                y,
                width as i32,
                height as i32,
                glow::RGBA,
                glow::UNSIGNED_BYTE,
                PixelPackData::Slice(Some(out.as_mut_slice())),
            );
        }
        out
    }

    // ── shaders ───────────────────────────────────────────────────────────

    fn compile_shader(&mut self, stage: ShaderStage, source: &str) -> Result<u32, BackendError> {
        if !self.caps.profile.has_shaders() {
            return Err(BackendError::Unsupported("shaders"));
        }
        let kind = match stage {
            ShaderStage::Vertex => glow::VERTEX_SHADER,
            ShaderStage::Fragment => glow::FRAGMENT_SHADER,
        };
        let gl = &self.gl;
        unsafe {
            let sh = gl.create_shader(kind).map_err(allocation("shader"))?;
            gl.shader_source(sh, source);
            gl.compile_shader(sh);
            if !gl.get_shader_compile_status(sh) {
                let log = gl.get_shader_info_log(sh);
                gl.delete_shader(sh);
                return Err(BackendError::ShaderCompile { stage, log });
            }
            Ok(sh.0.get())
        }
    }

    fn link_program(&mut self, vertex: u32, fragment: u32, attributes: &[(u32, &str)]) -> Result<u32, BackendError> {
        let (Some(vs), Some(fs)) = (shader(vertex), shader(fragment)) else {
            return Err(BackendError::ProgramLink {
                log: format!("missing shader object ({vertex}, {fragment})"),
            });
        };
        let gl = &self.gl;
        unsafe {
            let prog = gl.create_program().map_err(allocation("program"))?;
            gl.attach_shader(prog, vs);
            gl.attach_shader(prog, fs);
            for (slot, name) in attributes {
                gl.bind_attrib_location(prog, *slot, name);
            }
            gl.link_program(prog);
            let linked = gl.get_program_link_status(prog);
            gl.detach_shader(prog, vs);
            gl.detach_shader(prog, fs);
            if !linked {
                let log = gl.get_program_info_log(prog);
                gl.delete_program(prog);
                return Err(BackendError::ProgramLink { log });
            }
            Ok(prog.0.get())
        }
    }

    fn delete_shader(&mut self, id: u32) {
        if let Some(sh) = shader(id) {
            unsafe { self.gl.delete_shader(sh) };
        }
    }

    fn delete_program(&mut self, id: u32) {
        if let Some(p) = program(id) {
            unsafe { self.gl.delete_program(p) };
        }
    }

    fn uniform_location(&mut self, id: u32, name: &str) -> i32 {
        let Some(p) = program(id) else {
            return -1;
        };
        unsafe { self.gl.get_uniform_location(p, name) }.map_or(-1, |loc| loc.0 as i32)
    }

    fn use_program(&mut self, id: u32) {
        unsafe { self.gl.use_program(program(id)) };
    }

    fn set_uniform(&mut self, location: i32, value: UniformValue) {
        if location < 0 {
            return;
        }
        let loc = glow::NativeUniformLocation(location as u32);
        let loc = Some(&loc);
        let gl = &self.gl;
        unsafe {
            match value {
                UniformValue::Float(x) => gl.uniform_1_f32(loc, x),
                UniformValue::Vec2([x, y]) => gl.uniform_2_f32(loc, x, y),
                UniformValue::Vec3([x, y, z]) => gl.uniform_3_f32(loc, x, y, z),
                UniformValue::Vec4([x, y, z, w]) => gl.uniform_4_f32(loc, x, y, z, w),
                UniformValue::Int(i) => gl.uniform_1_i32(loc, i),
                UniformValue::Mat4(m) => gl.uniform_matrix_4_f32_slice(loc, false, &m),
            }
        }
    }

    // ── framebuffers ──────────────────────────────────────────────────────

    fn create_framebuffer(&mut self) -> Result<u32, BackendError> {
        if !self.caps.profile.has_shaders() {
            return Err(BackendError::Unsupported("framebuffer objects"));
        }
        let fbo = unsafe { self.gl.create_framebuffer() }.map_err(allocation("framebuffer"))?;
        Ok(fbo.0.get())
    }

    fn create_depth_renderbuffer(&mut self, width: u32, height: u32) -> Result<u32, BackendError> {
        if !self.caps.profile.has_shaders() {
            return Err(BackendError::Unsupported("renderbuffer objects"));
        }
        let format = if self.caps.profile == GlProfile::Es2 {
            glow::DEPTH_COMPONENT16
        } else {
            glow::DEPTH_COMPONENT24
        };
        unsafe {
            let rb = self.gl.create_renderbuffer().map_err(allocation("depth renderbuffer"))?;
            self.gl.bind_renderbuffer(glow::RENDERBUFFER, Some(rb));
            self.gl
                .renderbuffer_storage(glow::RENDERBUFFER, format, width as i32, height as i32);
            self.gl.bind_renderbuffer(glow::RENDERBUFFER, None);
            Ok(rb.0.get())
        }
    }

    /// Leaves `fb` bound.
    fn attach_color_texture(&mut self, fb: u32, id: u32) {
        unsafe {
            self.gl.bind_framebuffer(glow::FRAMEBUFFER, framebuffer(fb));
            self.gl
                .framebuffer_texture_2d(glow::FRAMEBUFFER, glow::COLOR_ATTACHMENT0, glow::TEXTURE_2D, texture(id), 0);
        }
    }

    /// Leaves `fb` bound.
    fn attach_depth_renderbuffer(&mut self, fb: u32, rb: u32) {
        unsafe {
            self.gl.bind_framebuffer(glow::FRAMEBUFFER, framebuffer(fb));
            self.gl.framebuffer_renderbuffer(
                glow::FRAMEBUFFER,
                glow::DEPTH_ATTACHMENT,
                glow::RENDERBUFFER,
                renderbuffer(rb),
            );
        }
    }

    fn framebuffer_status(&mut self, fb: u32) -> FramebufferStatus {
        let status = unsafe {
            self.gl.bind_framebuffer(glow::FRAMEBUFFER, framebuffer(fb));
            self.gl.check_framebuffer_status(glow::FRAMEBUFFER)
        };
        if status == glow::FRAMEBUFFER_COMPLETE {
            FramebufferStatus::Complete
        } else {
            FramebufferStatus::Incomplete(format!("{} (0x{status:04X})", framebuffer_reason(status)))
        }
    }

    fn bind_framebuffer(&mut self, fb: u32) {
        unsafe { self.gl.bind_framebuffer(glow::FRAMEBUFFER, framebuffer(fb)) };
    }

    fn delete_framebuffer(&mut self, fb: u32) {
        if let Some(f) = framebuffer(fb) {
            unsafe { self.gl.delete_framebuffer(f) };
        }
    }

    fn delete_renderbuffer(&mut self, rb: u32) {
        if let Some(r) = renderbuffer(rb) {
            unsafe { self.gl.delete_renderbuffer(r) };
        }
    }

    // ── geometry ──────────────────────────────────────────────────────────

    fn create_vertex_buffers(&mut self, arrays: &VertexArrays<'_>, usage: BufferUsage) -> Result<VertexBuffers, BackendError> {
        if !self.strategy.uses_buffers() {
            return Ok(VertexBuffers::default());
        }

        let mut buffers = VertexBuffers::default();
        if self.strategy == Strategy::VertexArrayObjects {
            let vao = unsafe { self.gl.create_vertex_array() }.map_err(allocation("vertex array"))?;
            unsafe { self.gl.bind_vertex_array(Some(vao)) };
            buffers.vao = vao.0.get();
        }

        let result = (|| -> Result<(), BackendError> {
            buffers.positions = self.new_buffer(glow::ARRAY_BUFFER, bytemuck::cast_slice(arrays.vertices), usage)?;
            if let Some(t) = arrays.texcoords {
                buffers.texcoords = self.new_buffer(glow::ARRAY_BUFFER, bytemuck::cast_slice(t), usage)?;
            }
            if let Some(n) = arrays.normals {
                buffers.normals = self.new_buffer(glow::ARRAY_BUFFER, bytemuck::cast_slice(n), usage)?;
            }
            if let Some(c) = arrays.colors {
                buffers.colors = self.new_buffer(glow::ARRAY_BUFFER, c, usage)?;
            }
            if let Some(indices) = arrays.indices {
                // indices never change after creation
                buffers.indices = if self.short_indices() {
                    let short: Vec<u16> = indices.iter().map(|&i| i as u16).collect();
                    self.new_buffer(glow::ELEMENT_ARRAY_BUFFER, bytemuck::cast_slice(&short), BufferUsage::Static)?
                } else {
                    self.new_buffer(glow::ELEMENT_ARRAY_BUFFER, bytemuck::cast_slice(indices), BufferUsage::Static)?
                };
            }
            Ok(())
        })();

        if self.strategy == Strategy::VertexArrayObjects {
            if result.is_ok() {
                self.bind_attributes(&buffers);
            }
            unsafe { self.gl.bind_vertex_array(None) };
        }
        unsafe { self.gl.bind_buffer(glow::ARRAY_BUFFER, None) };

        match result {
            Ok(()) => {
                log::debug!("GL: vertex buffers created {buffers:?}");
                Ok(buffers)
            }
            Err(e) => {
                self.delete_vertex_buffers(&buffers);
                Err(e)
            }
        }
    }

    fn update_vertex_buffers(&mut self, buffers: &VertexBuffers, arrays: &VertexArrays<'_>) {
        if !self.strategy.uses_buffers() {
            return;
        }
        let gl = &self.gl;
        let sub = |id: u32, bytes: &[u8]| {
            if id == 0 || bytes.is_empty() {
                return;
            }
            unsafe {
                gl.bind_buffer(glow::ARRAY_BUFFER, buffer(id));
                gl.buffer_sub_data_u8_slice(glow::ARRAY_BUFFER, 0, bytes);
            }
        };
        sub(buffers.positions, bytemuck::cast_slice(arrays.vertices));
        if let Some(t) = arrays.texcoords {
            sub(buffers.texcoords, bytemuck::cast_slice(t));
        }
        if let Some(n) = arrays.normals {
            sub(buffers.normals, bytemuck::cast_slice(n));
        }
        if let Some(c) = arrays.colors {
            sub(buffers.colors, c);
        }
        unsafe { gl.bind_buffer(glow::ARRAY_BUFFER, None) };
    }

    fn draw_vertex_buffers(&mut self, buffers: &VertexBuffers, arrays: &VertexArrays<'_>, mode: DrawMode, range: DrawRange) {
        if !self.strategy.uses_buffers() {
            self.draw_client_arrays(arrays, mode, range);
            return;
        }

        match self.strategy {
            Strategy::VertexArrayObjects => unsafe { self.gl.bind_vertex_array(vertex_array(buffers.vao)) },
            _ => self.bind_attributes(buffers),
        }

        let gl_mode = match mode {
            DrawMode::Lines => glow::LINES,
            DrawMode::Triangles | DrawMode::Quads => glow::TRIANGLES,
        };
        unsafe {
            match range {
                DrawRange::Arrays { first, count } => self.gl.draw_arrays(gl_mode, first as i32, count as i32),
                DrawRange::Indexed { count, byte_offset } => {
                    let (ty, offset) = if self.short_indices() {
                        (glow::UNSIGNED_SHORT, byte_offset / 2)
                    } else {
                        (glow::UNSIGNED_INT, byte_offset)
                    };
                    self.gl.draw_elements(gl_mode, count as i32, ty, offset as i32);
                }
            }
            if self.strategy == Strategy::VertexArrayObjects {
                self.gl.bind_vertex_array(None);
            } else {
                self.gl.bind_buffer(glow::ARRAY_BUFFER, None);
                self.gl.bind_buffer(glow::ELEMENT_ARRAY_BUFFER, None);
            }
        }
    }

    fn delete_vertex_buffers(&mut self, buffers: &VertexBuffers) {
        let gl = &self.gl;
        unsafe {
            for id in [buffers.positions, buffers.texcoords, buffers.normals, buffers.colors, buffers.indices] {
                if let Some(b) = buffer(id) {
                    gl.delete_buffer(b);
                }
            }
            if let Some(vao) = vertex_array(buffers.vao) {
                gl.delete_vertex_array(vao);
            }
        }
    }

    fn load_fixed_function_matrices(&mut self, projection: &Mat4, modelview: &Mat4) {
        if let Some(legacy) = &self.legacy {
            unsafe { legacy.load_matrices(projection, modelview) };
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn core_profile_uses_sized_internal_formats() {
        assert_eq!(
            tex_format(PixelFormat::R8G8B8A8, GlProfile::CoreProfile),
            TexFormat::Plain {
                internal: glow::RGBA8,
                format: glow::RGBA,
                ty: glow::UNSIGNED_BYTE
            }
        );
        assert_eq!(
            tex_format(PixelFormat::Grayscale, GlProfile::CoreProfile),
            TexFormat::Plain {
                internal: glow::R8,
                format: glow::RED,
                ty: glow::UNSIGNED_BYTE
            }
        );
    }

    #[test]
    fn es2_internal_format_matches_pixel_format() {
        assert_eq!(
            tex_format(PixelFormat::R5G6B5, GlProfile::Es2),
            TexFormat::Plain {
                internal: glow::RGB,
                format: glow::RGB,
                ty: glow::UNSIGNED_SHORT_5_6_5
            }
        );
        assert_eq!(
            tex_format(PixelFormat::GrayAlpha, GlProfile::Es2),
            TexFormat::Plain {
                internal: glow::LUMINANCE_ALPHA,
                format: glow::LUMINANCE_ALPHA,
                ty: glow::UNSIGNED_BYTE
            }
        );
    }

    #[test]
    fn compressed_formats_map_to_driver_enums() {
        assert_eq!(tex_format(PixelFormat::Dxt1Rgb, GlProfile::Es2), TexFormat::Compressed(0x83F0));
        assert_eq!(tex_format(PixelFormat::Etc1Rgb, GlProfile::Es2), TexFormat::Compressed(0x8D64));
        assert_eq!(tex_format(PixelFormat::Astc8x8Rgba, GlProfile::CoreProfile), TexFormat::Compressed(0x93B7));
    }

    #[test]
    fn null_handles_map_to_none() {
        assert!(texture(0).is_none());
        assert!(program(0).is_none());
        assert_eq!(texture(5).map(|t| t.0.get()), Some(5));
    }
}
