//! Headless backend that records every call.
//!
//! Handles are allocated from one counter starting at 1. Shader sources are
//! checked just enough to exercise failure paths: a stage without a `main`
//! entry point fails to compile, and uniform locations resolve only for names
//! that appear in the linked sources.

use std::collections::{HashMap, HashSet};

use crate::batch::DrawMode;
use crate::caps::{Capabilities, GlProfile};
use crate::math::Mat4;

use super::{
    BackendError, BufferUsage, Capability, DrawRange, FramebufferStatus, GpuBackend, ShaderStage,
    TextureDesc, TextureParam, UniformValue, VertexArrays, VertexBuffers,
};

/// One recorded backend call.
#[derive(Debug, Clone, PartialEq)]
pub enum Command {
    Viewport { x: i32, y: i32, width: i32, height: i32 },
    ClearColor([f32; 4]),
    Clear { color: bool, depth: bool },
    SetCapability(Capability, bool),
    AlphaBlending,
    DepthLessEqual,
    CullBackFaces,

    CreateTexture { id: u32, desc: TextureDesc, levels: usize },
    TextureParam { texture: u32, param: TextureParam },
    GenerateMipmaps(u32),
    UploadTextureLevel { texture: u32, level: u32, width: u32, height: u32 },
    BindTexture(u32),
    BindTextureUnit { unit: u32, texture: u32 },
    DeleteTexture(u32),
    ReadPixels { width: u32, height: u32 },

    /// `id` is 0 when compilation failed.
    CompileShader { id: u32, stage: ShaderStage },
    LinkProgram { id: u32, attributes: Vec<(u32, String)> },
    DeleteShader(u32),
    DeleteProgram(u32),
    UseProgram(u32),
    SetUniform { location: i32, value: UniformValue },

    CreateFramebuffer(u32),
    CreateDepthRenderbuffer { id: u32, width: u32, height: u32 },
    AttachColorTexture { framebuffer: u32, texture: u32 },
    AttachDepthRenderbuffer { framebuffer: u32, renderbuffer: u32 },
    BindFramebuffer(u32),
    DeleteFramebuffer(u32),
    DeleteRenderbuffer(u32),

    CreateVertexBuffers(VertexBuffers),
    UpdateVertexBuffers { buffers: VertexBuffers, vertex_floats: usize, texcoord_floats: usize, color_bytes: usize },
    Draw { buffers: VertexBuffers, mode: DrawMode, range: DrawRange },
    DeleteVertexBuffers(VertexBuffers),

    LoadMatrices { projection: Mat4, modelview: Mat4 },
}

#[derive(Debug)]
struct TextureRecord {
    width: u32,
    height: u32,
    rgba: Vec<u8>,
}

#[derive(Debug)]
pub struct RecordingBackend {
    caps: Capabilities,
    commands: Vec<Command>,
    next_handle: u32,

    textures: HashMap<u32, TextureRecord>,
    shaders: HashMap<u32, String>,
    programs: HashMap<u32, String>,
    locations: HashMap<(u32, String), i32>,
    next_location: i32,
    current_program: u32,

    framebuffers: HashSet<u32>,
    renderbuffers: HashSet<u32>,
    incomplete_framebuffers: bool,
}

impl Default for RecordingBackend {
    fn default() -> Self {
        Self::new(Capabilities::all(GlProfile::CoreProfile))
    }
}

impl RecordingBackend {
    pub fn new(caps: Capabilities) -> Self {
        Self {
            caps,
            commands: Vec::new(),
            next_handle: 1,
            textures: HashMap::new(),
            shaders: HashMap::new(),
            programs: HashMap::new(),
            locations: HashMap::new(),
            next_location: 0,
            current_program: 0,
            framebuffers: HashSet::new(),
            renderbuffers: HashSet::new(),
            incomplete_framebuffers: false,
        }
    }

    /// Convenience for a backend with every feature of `profile`.
    pub fn with_profile(profile: GlProfile) -> Self {
        Self::new(Capabilities::all(profile))
    }

    #[inline]
    pub fn commands(&self) -> &[Command] {
        &self.commands
    }

    #[inline]
    pub fn clear_commands(&mut self) {
        self.commands.clear();
    }

    /// Recorded draws in issue order.
    pub fn draws(&self) -> Vec<(DrawMode, DrawRange)> {
        self.commands
            .iter()
            .filter_map(|c| match c {
                Command::Draw { mode, range, .. } => Some((*mode, *range)),
                _ => None,
            })
            .collect()
    }

    /// Textures created and not yet deleted.
    #[inline]
    pub fn live_textures(&self) -> usize {
        self.textures.len()
    }

    #[inline]
    pub fn is_live_texture(&self, id: u32) -> bool {
        self.textures.contains_key(&id)
    }

    #[inline]
    pub fn live_framebuffers(&self) -> usize {
        self.framebuffers.len()
    }

    #[inline]
    pub fn live_renderbuffers(&self) -> usize {
        self.renderbuffers.len()
    }

    #[inline]
    pub fn current_program(&self) -> u32 {
        self.current_program
    }

    /// Makes every following `framebuffer_status` report incomplete.
    #[inline]
    pub fn set_incomplete_framebuffers(&mut self, incomplete: bool) {
        self.incomplete_framebuffers = incomplete;
    }

    /// Location previously handed out for `name` in `program`, if any.
    pub fn location_of(&self, program: u32, name: &str) -> Option<i32> {
        self.locations.get(&(program, name.to_owned())).copied()
    }

    #[inline]
    fn alloc(&mut self) -> u32 {
        let id = self.next_handle;
        self.next_handle += 1;
        id
    }
}

/// True when every identifier in `name` (`lights[0].position` →
/// `lights`, `position`) appears in `source`.
fn declares(source: &str, name: &str) -> bool {
    name.split(['.', '['])
        .map(|part| part.trim_end_matches(']'))
        .filter(|part| !part.is_empty() && !part.chars().all(|c| c.is_ascii_digit()))
        .all(|ident| source.contains(ident))
}

impl GpuBackend for RecordingBackend {
    fn capabilities(&self) -> &Capabilities {
        &self.caps
    }

    // ── state ─────────────────────────────────────────────────────────────

    fn viewport(&mut self, x: i32, y: i32, width: i32, height: i32) {
        self.commands.push(Command::Viewport { x, y, width, height });
    }

    fn clear_color(&mut self, rgba: [f32; 4]) {
        self.commands.push(Command::ClearColor(rgba));
    }

    fn clear(&mut self, color: bool, depth: bool) {
        self.commands.push(Command::Clear { color, depth });
    }

    fn set_capability(&mut self, cap: Capability, enabled: bool) {
        self.commands.push(Command::SetCapability(cap, enabled));
    }

    fn set_alpha_blending(&mut self) {
        self.commands.push(Command::AlphaBlending);
    }

    fn set_depth_less_equal(&mut self) {
        self.commands.push(Command::DepthLessEqual);
    }

    fn set_cull_back_faces(&mut self) {
        self.commands.push(Command::CullBackFaces);
    }

    // ── textures ──────────────────────────────────────────────────────────

    fn create_texture(&mut self, desc: &TextureDesc, levels: &[&[u8]]) -> Result<u32, BackendError> {
        let id = self.alloc();
        let rgba = match levels.first() {
            Some(base) => base.to_vec(),
            None => vec![0; (desc.width * desc.height * 4) as usize],
        };
        self.textures.insert(
            id,
            TextureRecord {
                width: desc.width,
                height: desc.height,
                rgba,
            },
        );
        self.commands.push(Command::CreateTexture {
            id,
            desc: *desc,
            levels: levels.len(),
        });
        Ok(id)
    }

    fn set_texture_param(&mut self, texture: u32, param: TextureParam) {
        self.commands.push(Command::TextureParam { texture, param });
    }

    fn generate_mipmaps(&mut self, texture: u32) -> Result<(), BackendError> {
        if self.caps.profile == GlProfile::FixedFunction {
            return Err(BackendError::Unsupported("glGenerateMipmap"));
        }
        self.commands.push(Command::GenerateMipmaps(texture));
        Ok(())
    }

    fn read_texture_rgba(&mut self, texture: u32, width: u32, height: u32) -> Result<Vec<u8>, BackendError> {
        let Some(tex) = self.textures.get(&texture) else {
            return Err(BackendError::Allocation {
                what: "texture readback",
                reason: format!("unknown texture {texture}"),
            });
        };
        let wanted = (width * height * 4) as usize;
        if tex.width != width || tex.height != height || tex.rgba.len() != wanted {
            return Err(BackendError::Unsupported("readback of non-RGBA texture"));
        }
        Ok(tex.rgba.clone())
    }

    fn upload_texture_level(&mut self, texture: u32, level: u32, width: u32, height: u32, _rgba: &[u8]) {
        self.commands.push(Command::UploadTextureLevel {
            texture,
            level,
            width,
            height,
        });
    }

    fn bind_texture(&mut self, texture: u32) {
        self.commands.push(Command::BindTexture(texture));
    }

    fn bind_texture_unit(&mut self, unit: u32, texture: u32) {
        self.commands.push(Command::BindTextureUnit { unit, texture });
    }

    fn delete_texture(&mut self, texture: u32) {
        if texture == 0 {
            return;
        }
        self.textures.remove(&texture);
        self.commands.push(Command::DeleteTexture(texture));
    }

    /// Every pixel of row `y` (bottom-up) reads `[y, 0, 0, 255]`.
    fn read_pixels_rgba(&mut self, _x: i32, _y: i32, width: u32, height: u32) -> Vec<u8> {
        self.commands.push(Command::ReadPixels { width, height });
        let mut out = Vec::with_capacity((width * height * 4) as usize);
        for row in 0..height {
            for _ in 0..width {
                out.extend_from_slice(&[row as u8, 0, 0, 255]);
            }
        }
        out
    }

    // ── shaders ───────────────────────────────────────────────────────────

    fn compile_shader(&mut self, stage: ShaderStage, source: &str) -> Result<u32, BackendError> {
        if !self.caps.profile.has_shaders() {
            return Err(BackendError::Unsupported("shaders"));
        }
        if !source.contains("main") {
            self.commands.push(Command::CompileShader { id: 0, stage });
            return Err(BackendError::ShaderCompile {
                stage,
                log: "0:1(1): error: no function `main` defined".to_owned(),
            });
        }
        let id = self.alloc();
        self.shaders.insert(id, source.to_owned());
        self.commands.push(Command::CompileShader { id, stage });
        Ok(id)
    }

    fn link_program(&mut self, vertex: u32, fragment: u32, attributes: &[(u32, &str)]) -> Result<u32, BackendError> {
        let (Some(vs), Some(fs)) = (self.shaders.get(&vertex), self.shaders.get(&fragment)) else {
            return Err(BackendError::ProgramLink {
                log: format!("missing shader object ({vertex}, {fragment})"),
            });
        };
        let combined = format!("{vs}\n{fs}");
        let id = self.alloc();
        self.programs.insert(id, combined);
        self.commands.push(Command::LinkProgram {
            id,
            attributes: attributes.iter().map(|(i, n)| (*i, (*n).to_owned())).collect(),
        });
        Ok(id)
    }

    fn delete_shader(&mut self, shader: u32) {
        if shader == 0 {
            return;
        }
        self.shaders.remove(&shader);
        self.commands.push(Command::DeleteShader(shader));
    }

    fn delete_program(&mut self, program: u32) {
        if program == 0 {
            return;
        }
        self.programs.remove(&program);
        self.commands.push(Command::DeleteProgram(program));
    }

    fn uniform_location(&mut self, program: u32, name: &str) -> i32 {
        let key = (program, name.to_owned());
        if let Some(loc) = self.locations.get(&key) {
            return *loc;
        }
        let Some(source) = self.programs.get(&program) else {
            return -1;
        };
        if !declares(source, name) {
            return -1;
        }
        let loc = self.next_location;
        self.next_location += 1;
        self.locations.insert(key, loc);
        loc
    }

    fn use_program(&mut self, program: u32) {
        self.current_program = program;
        self.commands.push(Command::UseProgram(program));
    }

    fn set_uniform(&mut self, location: i32, value: UniformValue) {
        if location < 0 {
            return;
        }
        self.commands.push(Command::SetUniform { location, value });
    }

    // ── framebuffers ──────────────────────────────────────────────────────

    fn create_framebuffer(&mut self) -> Result<u32, BackendError> {
        let id = self.alloc();
        self.framebuffers.insert(id);
        self.commands.push(Command::CreateFramebuffer(id));
        Ok(id)
    }

    fn create_depth_renderbuffer(&mut self, width: u32, height: u32) -> Result<u32, BackendError> {
        let id = self.alloc();
        self.renderbuffers.insert(id);
        self.commands.push(Command::CreateDepthRenderbuffer { id, width, height });
        Ok(id)
    }

    fn attach_color_texture(&mut self, framebuffer: u32, texture: u32) {
        self.commands.push(Command::AttachColorTexture { framebuffer, texture });
    }

    fn attach_depth_renderbuffer(&mut self, framebuffer: u32, renderbuffer: u32) {
        self.commands.push(Command::AttachDepthRenderbuffer {
            framebuffer,
            renderbuffer,
        });
    }

    fn framebuffer_status(&mut self, framebuffer: u32) -> FramebufferStatus {
        if self.incomplete_framebuffers || !self.framebuffers.contains(&framebuffer) {
            FramebufferStatus::Incomplete("incomplete attachment".to_owned())
        } else {
            FramebufferStatus::Complete
        }
    }

    fn bind_framebuffer(&mut self, framebuffer: u32) {
        self.commands.push(Command::BindFramebuffer(framebuffer));
    }

    fn delete_framebuffer(&mut self, framebuffer: u32) {
        if framebuffer == 0 {
            return;
        }
        self.framebuffers.remove(&framebuffer);
        self.commands.push(Command::DeleteFramebuffer(framebuffer));
    }

    fn delete_renderbuffer(&mut self, renderbuffer: u32) {
        if renderbuffer == 0 {
            return;
        }
        self.renderbuffers.remove(&renderbuffer);
        self.commands.push(Command::DeleteRenderbuffer(renderbuffer));
    }

    // ── geometry ──────────────────────────────────────────────────────────

    fn create_vertex_buffers(&mut self, arrays: &VertexArrays<'_>, _usage: BufferUsage) -> Result<VertexBuffers, BackendError> {
        if self.caps.profile == GlProfile::FixedFunction {
            return Ok(VertexBuffers::default());
        }
        let vao = if self.caps.vao { self.alloc() } else { 0 };
        let positions = self.alloc();
        let texcoords = if arrays.texcoords.is_some() { self.alloc() } else { 0 };
        let normals = if arrays.normals.is_some() { self.alloc() } else { 0 };
        let colors = if arrays.colors.is_some() { self.alloc() } else { 0 };
        let indices = if arrays.indices.is_some() { self.alloc() } else { 0 };
        let buffers = VertexBuffers {
            vao,
            positions,
            texcoords,
            normals,
            colors,
            indices,
        };
        self.commands.push(Command::CreateVertexBuffers(buffers));
        Ok(buffers)
    }

    fn update_vertex_buffers(&mut self, buffers: &VertexBuffers, arrays: &VertexArrays<'_>) {
        self.commands.push(Command::UpdateVertexBuffers {
            buffers: *buffers,
            vertex_floats: arrays.vertices.len(),
            texcoord_floats: arrays.texcoords.map_or(0, <[f32]>::len),
            color_bytes: arrays.colors.map_or(0, <[u8]>::len),
        });
    }

    fn draw_vertex_buffers(&mut self, buffers: &VertexBuffers, _arrays: &VertexArrays<'_>, mode: DrawMode, range: DrawRange) {
        self.commands.push(Command::Draw {
            buffers: *buffers,
            mode,
            range,
        });
    }

    fn delete_vertex_buffers(&mut self, buffers: &VertexBuffers) {
        if buffers.is_null() {
            return;
        }
        self.commands.push(Command::DeleteVertexBuffers(*buffers));
    }

    fn load_fixed_function_matrices(&mut self, projection: &Mat4, modelview: &Mat4) {
        self.commands.push(Command::LoadMatrices {
            projection: *projection,
            modelview: *modelview,
        });
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn declares_splits_struct_array_names() {
        let src = "struct Light { int enabled; vec3 position; }; uniform Light lights[8];";
        assert!(declares(src, "lights[3].position"));
        assert!(!declares(src, "lights[3].coneAngle"));
        assert!(!declares(src, "mvpMatrix"));
    }

    #[test]
    fn shader_without_main_fails() {
        let mut b = RecordingBackend::default();
        let err = b.compile_shader(ShaderStage::Fragment, "void mian() {}").unwrap_err();
        assert!(matches!(err, BackendError::ShaderCompile { .. }));
        assert!(b.compile_shader(ShaderStage::Fragment, "void main() {}").is_ok());
    }

    #[test]
    fn uniform_locations_are_stable_and_absent_is_negative() {
        let mut b = RecordingBackend::default();
        let vs = b.compile_shader(ShaderStage::Vertex, "uniform mat4 mvpMatrix; void main() {}").unwrap();
        let fs = b.compile_shader(ShaderStage::Fragment, "void main() {}").unwrap();
        let p = b.link_program(vs, fs, &[]).unwrap();

        let a = b.uniform_location(p, "mvpMatrix");
        assert!(a >= 0);
        assert_eq!(b.uniform_location(p, "mvpMatrix"), a);
        assert_eq!(b.uniform_location(p, "colDiffuse"), -1);
    }

    #[test]
    fn deleting_null_handles_records_nothing() {
        let mut b = RecordingBackend::default();
        b.delete_texture(0);
        b.delete_program(0);
        b.delete_framebuffer(0);
        b.delete_vertex_buffers(&VertexBuffers::default());
        assert!(b.commands().is_empty());
    }
}
