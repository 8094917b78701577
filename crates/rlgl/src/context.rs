//! The rlgl context: every piece of batching state in one owned value.

use anyhow::{Context as _, Result};

use crate::backend::{BufferUsage, Capability, GpuBackend, TextureDesc};
use crate::batch::{BatchStats, DrawCallTracker, DrawMode, DynamicBuffer, VertexRouting, MAX_SHORT_INDEX_QUADS};
use crate::caps::{Capabilities, GlProfile};
use crate::config::RlglConfig;
use crate::math::{self, Mat4};
use crate::matrix_stack::{MatrixMode, MatrixStack};
use crate::resources::{BuiltinShader, LightLocations, LightPool, PixelFormat, RenderTexture, Shader};
use crate::vr::StereoView;

/// Immediate-mode batching context over a [`GpuBackend`].
///
/// Owns the three dynamic buffers, the quads draw-call list, the matrix
/// stack and the default resources (1×1 white texture, default shader). All
/// operations take `&mut self`; the context is meant to live on the thread
/// that owns the graphics context.
///
/// Per-frame operations never fail: they log and degrade, or return a null
/// handle. Only construction returns an error.
pub struct Rlgl<B: GpuBackend = Box<dyn GpuBackend>> {
    pub(crate) backend: B,
    pub(crate) config: RlglConfig,
    pub(crate) caps: Capabilities,

    pub(crate) matrices: MatrixStack,
    pub(crate) routing: VertexRouting,

    pub(crate) mode: DrawMode,
    pub(crate) lines: DynamicBuffer,
    pub(crate) triangles: DynamicBuffer,
    pub(crate) quads: DynamicBuffer,
    pub(crate) draws: DrawCallTracker,

    pub(crate) current_depth: f32,
    /// Last colour submitted; pads primitives that supplied none.
    pub(crate) current_color: [u8; 4],

    pub(crate) default_texture: u32,
    pub(crate) default_shader: Shader,
    pub(crate) standard_shader: Shader,
    /// Shader new quads draw calls are opened with; null = default.
    pub(crate) current_shader: Shader,

    pub(crate) lights: LightPool,
    pub(crate) light_locations: Vec<LightLocations>,

    pub(crate) stereo: Option<StereoView>,
    pub(crate) render_target: Option<RenderTexture>,

    pub(crate) screen_width: u32,
    pub(crate) screen_height: u32,

    pub(crate) stats: BatchStats,
    pub(crate) warned_texcoord_mode: bool,
}

impl<B: GpuBackend> Rlgl<B> {
    /// Creates the default resources and GPU buffers.
    ///
    /// Fails when the white texture, the default shader (shader strategies
    /// only) or the batch buffers cannot be created.
    pub fn new(backend: B, config: RlglConfig) -> Result<Self> {
        anyhow::ensure!(
            config.max_lines_batch > 0 && config.max_triangles_batch > 0 && config.max_quads_batch > 0,
            "batch capacities must be non-zero"
        );
        anyhow::ensure!(config.matrix_stack_size > 0, "matrix stack size must be non-zero");

        let mut caps = backend.capabilities().clone();
        if let Some(profile) = config.profile_override {
            caps.profile = profile;
        }
        caps.log_summary();
        anyhow::ensure!(
            caps.profile != GlProfile::Es2 || config.max_quads_batch <= MAX_SHORT_INDEX_QUADS,
            "{} quads per batch exceed 16-bit indices on ES2 (max {MAX_SHORT_INDEX_QUADS})",
            config.max_quads_batch
        );

        let mut rl = Rlgl {
            matrices: MatrixStack::new(config.matrix_stack_size),
            routing: VertexRouting::Direct,
            mode: DrawMode::Quads,
            lines: DynamicBuffer::new(DrawMode::Lines, config.max_lines_batch),
            triangles: DynamicBuffer::new(DrawMode::Triangles, config.max_triangles_batch),
            quads: DynamicBuffer::new(DrawMode::Quads, config.max_quads_batch),
            draws: DrawCallTracker::new(0),
            current_depth: config.initial_depth,
            current_color: [255; 4],
            default_texture: 0,
            default_shader: Shader::null(),
            standard_shader: Shader::null(),
            current_shader: Shader::null(),
            lights: LightPool::new(config.max_lights),
            light_locations: Vec::new(),
            stereo: None,
            render_target: None,
            screen_width: 0,
            screen_height: 0,
            stats: BatchStats::default(),
            warned_texcoord_mode: false,
            backend,
            caps,
            config,
        };

        let white = rl
            .backend
            .create_texture(
                &TextureDesc {
                    width: 1,
                    height: 1,
                    format: PixelFormat::R8G8B8A8,
                },
                &[&[255u8; 4]],
            )
            .context("failed to create default white texture")?;
        log::info!("TEXTURE: [ID {white}] default white texture loaded");
        rl.default_texture = white;
        rl.draws.reset(white, Shader::null());

        if rl.caps.profile.has_shaders() {
            rl.default_shader = rl.load_builtin_shader(BuiltinShader::Default);
            anyhow::ensure!(!rl.default_shader.is_null(), "default shader failed to load");
            log::info!("SHADER: [ID {}] default shader loaded", rl.default_shader.id);

            rl.standard_shader = rl.load_builtin_shader(BuiltinShader::Standard);
            if rl.standard_shader.is_null() {
                log::warn!("SHADER: standard shader failed to load; meshes fall back to the default shader");
            } else {
                rl.light_locations = rl.resolve_light_locations(rl.standard_shader.id);
                log::info!("SHADER: [ID {}] standard shader loaded", rl.standard_shader.id);
            }
            rl.current_shader = rl.default_shader;
        }

        let usage = BufferUsage::Dynamic;
        rl.lines.gpu = rl
            .backend
            .create_vertex_buffers(&rl.lines.arrays(), usage)
            .context("failed to create lines buffers")?;
        rl.triangles.gpu = rl
            .backend
            .create_vertex_buffers(&rl.triangles.arrays(), usage)
            .context("failed to create triangles buffers")?;
        rl.quads.gpu = rl
            .backend
            .create_vertex_buffers(&rl.quads.arrays(), usage)
            .context("failed to create quads buffers")?;
        log::info!(
            "RLGL: batch buffers ready (lines {}, triangles {}, quads {} vertices)",
            rl.lines.capacity(),
            rl.triangles.capacity(),
            rl.quads.capacity()
        );

        Ok(rl)
    }

    // ── accessors ─────────────────────────────────────────────────────────

    #[inline]
    pub fn backend(&self) -> &B {
        &self.backend
    }

    #[inline]
    pub fn backend_mut(&mut self) -> &mut B {
        &mut self.backend
    }

    #[inline]
    pub fn capabilities(&self) -> &Capabilities {
        &self.caps
    }

    #[inline]
    pub fn profile(&self) -> GlProfile {
        self.caps.profile
    }

    #[inline]
    pub fn config(&self) -> &RlglConfig {
        &self.config
    }

    #[inline]
    pub fn stats(&self) -> BatchStats {
        self.stats
    }

    #[inline]
    pub fn default_texture(&self) -> u32 {
        self.default_texture
    }

    #[inline]
    pub fn matrices(&self) -> &MatrixStack {
        &self.matrices
    }

    #[inline]
    pub fn buffer(&self, mode: DrawMode) -> &DynamicBuffer {
        match mode {
            DrawMode::Lines => &self.lines,
            DrawMode::Triangles => &self.triangles,
            DrawMode::Quads => &self.quads,
        }
    }

    #[inline]
    pub(crate) fn buffer_mut(&mut self, mode: DrawMode) -> &mut DynamicBuffer {
        match mode {
            DrawMode::Lines => &mut self.lines,
            DrawMode::Triangles => &mut self.triangles,
            DrawMode::Quads => &mut self.quads,
        }
    }

    #[inline]
    pub fn draw_calls(&self) -> &DrawCallTracker {
        &self.draws
    }

    #[inline]
    pub fn current_depth(&self) -> f32 {
        self.current_depth
    }

    // ── matrix stack ──────────────────────────────────────────────────────

    pub fn matrix_mode(&mut self, mode: MatrixMode) {
        self.matrices.set_mode(mode);
    }

    /// Saves the active matrix and resets it to identity.
    ///
    /// On modelview, vertices are held back from here on so the transforms
    /// issued after the push can be applied to them at `end()`.
    pub fn push_matrix(&mut self) {
        if !self.matrices.push() {
            return;
        }
        if self.matrices.mode() == MatrixMode::ModelView && !self.routing.is_buffering() {
            self.routing = VertexRouting::Buffering {
                base_depth: self.matrices.depth() - 1,
                vertices: Vec::with_capacity(self.config.temp_vertex_buffer_size),
            };
        }
    }

    pub fn pop_matrix(&mut self) {
        if self.matrices.mode() == MatrixMode::ModelView {
            if let VertexRouting::Buffering { base_depth, .. } = self.routing {
                if self.routing.pending() > 0 {
                    log::warn!("RLGL: matrix popped with vertices outside begin/end; emitting them");
                    self.replay_buffered();
                }
                if self.matrices.depth() <= base_depth + 1 {
                    self.routing = VertexRouting::Direct;
                }
            }
        }
        self.matrices.pop();
    }

    pub fn load_identity(&mut self) {
        self.matrices.load_identity();
    }

    pub fn translatef(&mut self, x: f32, y: f32, z: f32) {
        self.matrices.translate(x, y, z);
    }

    /// `angle` in degrees around `(x, y, z)`, normalized internally.
    pub fn rotatef(&mut self, angle: f32, x: f32, y: f32, z: f32) {
        self.matrices.rotate(angle, x, y, z);
    }

    pub fn scalef(&mut self, x: f32, y: f32, z: f32) {
        self.matrices.scale(x, y, z);
    }

    /// Multiplies by a column-major matrix.
    pub fn mult_matrixf(&mut self, m: &[f32; 16]) {
        self.matrices.multiply(&Mat4::from_cols_array(m));
    }

    pub fn frustum(&mut self, left: f64, right: f64, bottom: f64, top: f64, near: f64, far: f64) {
        self.matrices
            .multiply(&math::frustum(left, right, bottom, top, near, far));
    }

    pub fn ortho(&mut self, left: f64, right: f64, bottom: f64, top: f64, near: f64, far: f64) {
        self.matrices
            .multiply(&math::ortho(left, right, bottom, top, near, far));
    }

    /// Dumps both matrices at debug level.
    pub fn log_matrices(&self) {
        for (name, m) in [("projection", self.matrices.projection()), ("modelview", self.matrices.modelview())] {
            log::debug!("RLGL: {name} matrix:");
            for r in 0..4 {
                let row = m.row(r);
                log::debug!("RLGL:   [{:>9.4} {:>9.4} {:>9.4} {:>9.4}]", row.x, row.y, row.z, row.w);
            }
        }
    }

    // ── device state ──────────────────────────────────────────────────────

    /// Viewport, depth/blend/cull state and a screen-space projection.
    pub fn init_graphics_device(&mut self, width: u32, height: u32) {
        self.screen_width = width;
        self.screen_height = height;

        self.backend.viewport(0, 0, width as i32, height as i32);
        self.backend.clear_color([0.0, 0.0, 0.0, 1.0]);
        self.backend.clear(true, true);

        self.backend.set_capability(Capability::DepthTest, true);
        self.backend.set_depth_less_equal();
        self.backend.set_capability(Capability::Blend, true);
        self.backend.set_alpha_blending();
        self.backend.set_capability(Capability::CullFace, true);
        self.backend.set_cull_back_faces();

        self.matrices.set_mode(MatrixMode::Projection);
        self.matrices.load_identity();
        self.matrices
            .multiply(&math::ortho(0.0, width as f64, height as f64, 0.0, 0.0, 1.0));
        self.matrices.set_mode(MatrixMode::ModelView);
        self.matrices.load_identity();

        log::info!("RLGL: graphics device initialized ({width}x{height})");
    }

    #[inline]
    pub fn screen_size(&self) -> (u32, u32) {
        (self.screen_width, self.screen_height)
    }

    pub fn viewport(&mut self, x: i32, y: i32, width: i32, height: i32) {
        self.backend.viewport(x, y, width, height);
    }

    /// Colour components in bytes; stored normalized.
    pub fn clear_color(&mut self, r: u8, g: u8, b: u8, a: u8) {
        let n = |c: u8| c as f32 / 255.0;
        self.backend.clear_color([n(r), n(g), n(b), n(a)]);
    }

    pub fn clear_screen_buffers(&mut self) {
        self.backend.clear(true, true);
    }

    pub fn enable_depth_test(&mut self) {
        self.backend.set_capability(Capability::DepthTest, true);
    }

    pub fn disable_depth_test(&mut self) {
        self.backend.set_capability(Capability::DepthTest, false);
    }

    /// RGBA screen contents with the first row at the top.
    pub fn read_screen_pixels(&mut self, width: u32, height: u32) -> Vec<u8> {
        let raw = self.backend.read_pixels_rgba(0, 0, width, height);
        let row = width as usize * 4;
        if row == 0 || raw.len() != row * height as usize {
            log::warn!("RLGL: screen readback returned {} bytes for {width}x{height}", raw.len());
            return raw;
        }
        raw.chunks_exact(row).rev().flatten().copied().collect()
    }

    /// Stereo rendering for the following flushes.
    pub fn enable_stereo(&mut self, view: StereoView) {
        self.stereo = Some(view);
    }

    pub fn disable_stereo(&mut self) {
        self.stereo = None;
    }

    #[inline]
    pub fn is_stereo(&self) -> bool {
        self.stereo.is_some()
    }

    fn release(&mut self) {
        self.backend.delete_vertex_buffers(&self.lines.gpu);
        self.backend.delete_vertex_buffers(&self.triangles.gpu);
        self.backend.delete_vertex_buffers(&self.quads.gpu);
        self.lines.gpu = Default::default();
        self.triangles.gpu = Default::default();
        self.quads.gpu = Default::default();

        let default_shader = std::mem::replace(&mut self.default_shader, Shader::null());
        let standard_shader = std::mem::replace(&mut self.standard_shader, Shader::null());
        self.unload_shader(default_shader);
        self.unload_shader(standard_shader);

        self.backend.delete_texture(self.default_texture);
        self.default_texture = 0;
        log::info!("RLGL: context resources released");
    }

    /// Releases the default resources; same as dropping the context.
    pub fn close(self) {}
}

impl<B: GpuBackend> Drop for Rlgl<B> {
    fn drop(&mut self) {
        self.release();
    }
}
