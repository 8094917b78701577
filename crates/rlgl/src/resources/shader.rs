use crate::backend::{DEFAULT_ATTRIBUTES, GpuBackend, ShaderStage, UniformValue};
use crate::caps::GlProfile;
use crate::context::Rlgl;

const DEFAULT_VS_330: &str = include_str!("../shaders/default_330.vert");
const DEFAULT_FS_330: &str = include_str!("../shaders/default_330.frag");
const DEFAULT_VS_100: &str = include_str!("../shaders/default_100.vert");
const DEFAULT_FS_100: &str = include_str!("../shaders/default_100.frag");
const STANDARD_VS_330: &str = include_str!("../shaders/standard_330.vert");
const STANDARD_FS_330: &str = include_str!("../shaders/standard_330.frag");
const STANDARD_VS_100: &str = include_str!("../shaders/standard_100.vert");
const STANDARD_FS_100: &str = include_str!("../shaders/standard_100.frag");
const DISTORTION_FS_330: &str = include_str!("../shaders/distortion_330.frag");
const DISTORTION_FS_100: &str = include_str!("../shaders/distortion_100.frag");

/// Uniform locations every shader is probed for at load time. `-1` = absent.
#[derive(Debug, Copy, Clone, Eq, PartialEq)]
pub struct ShaderLocations {
    pub mvp: i32,
    pub model: i32,
    pub col_diffuse: i32,
    pub col_ambient: i32,
    pub col_specular: i32,
    pub texture0: i32,
    pub texture1: i32,
    pub texture2: i32,
}

impl ShaderLocations {
    pub const ABSENT: Self = Self {
        mvp: -1,
        model: -1,
        col_diffuse: -1,
        col_ambient: -1,
        col_specular: -1,
        texture0: -1,
        texture1: -1,
        texture2: -1,
    };
}

/// A linked program and its standard uniform locations.
#[derive(Debug, Copy, Clone, Eq, PartialEq)]
pub struct Shader {
    pub id: u32,
    pub locs: ShaderLocations,
}

impl Shader {
    #[inline]
    pub const fn null() -> Self {
        Self {
            id: 0,
            locs: ShaderLocations::ABSENT,
        }
    }

    #[inline]
    pub fn is_null(&self) -> bool {
        self.id == 0
    }
}

/// Shaders shipped with the crate.
#[derive(Debug, Copy, Clone, Eq, PartialEq)]
pub enum BuiltinShader {
    /// Batches: texture × diffuse × vertex colour.
    Default,
    /// Meshes with the light pool.
    Standard,
    /// Stereo lens distortion post-pass.
    Distortion,
}

impl BuiltinShader {
    /// Version-prefixed vertex and fragment sources, `None` without shaders.
    pub fn sources(self, profile: GlProfile) -> Option<(String, String)> {
        let version = profile.glsl_version_line()?;
        let core = profile == GlProfile::CoreProfile;
        let (vs, fs) = match (self, core) {
            (BuiltinShader::Default, true) => (DEFAULT_VS_330, DEFAULT_FS_330),
            (BuiltinShader::Default, false) => (DEFAULT_VS_100, DEFAULT_FS_100),
            (BuiltinShader::Standard, true) => (STANDARD_VS_330, STANDARD_FS_330),
            (BuiltinShader::Standard, false) => (STANDARD_VS_100, STANDARD_FS_100),
            (BuiltinShader::Distortion, true) => (DEFAULT_VS_330, DISTORTION_FS_330),
            (BuiltinShader::Distortion, false) => (DEFAULT_VS_100, DISTORTION_FS_100),
        };
        Some((format!("{version}{vs}"), format!("{version}{fs}")))
    }
}

impl<B: GpuBackend> Rlgl<B> {
    /// Compiles and links a program from complete GLSL sources.
    ///
    /// The fixed attribute slots are bound before linking. Returns `0` on
    /// any failure, with the driver log written out.
    pub fn load_shader_program(&mut self, vs_source: &str, fs_source: &str) -> u32 {
        if !self.caps.profile.has_shaders() {
            log::warn!("SHADER: shaders not available on {}", self.caps.profile);
            return 0;
        }

        let vs = match self.backend.compile_shader(ShaderStage::Vertex, vs_source) {
            Ok(id) => id,
            Err(e) => {
                log::warn!("SHADER: {e}");
                return 0;
            }
        };
        let fs = match self.backend.compile_shader(ShaderStage::Fragment, fs_source) {
            Ok(id) => id,
            Err(e) => {
                log::warn!("SHADER: {e}");
                self.backend.delete_shader(vs);
                return 0;
            }
        };

        let program = self.backend.link_program(vs, fs, &DEFAULT_ATTRIBUTES);
        self.backend.delete_shader(vs);
        self.backend.delete_shader(fs);

        match program {
            Ok(id) => {
                log::info!("SHADER: [ID {id}] program loaded");
                id
            }
            Err(e) => {
                log::warn!("SHADER: {e}");
                0
            }
        }
    }

    /// Loads a shader; `None` stages use the default batch shader's source.
    ///
    /// A failed load returns [`Shader::null`], which draws with the default
    /// shader.
    pub fn load_shader(&mut self, vs_source: Option<&str>, fs_source: Option<&str>) -> Shader {
        let defaults = BuiltinShader::Default.sources(self.caps.profile);
        let (default_vs, default_fs) = match &defaults {
            Some((vs, fs)) => (vs.as_str(), fs.as_str()),
            None => ("", ""),
        };
        let id = self.load_shader_program(vs_source.unwrap_or(default_vs), fs_source.unwrap_or(default_fs));
        if id == 0 {
            return Shader::null();
        }
        Shader {
            id,
            locs: self.resolve_locations(id),
        }
    }

    pub(crate) fn load_builtin_shader(&mut self, kind: BuiltinShader) -> Shader {
        let Some((vs, fs)) = kind.sources(self.caps.profile) else {
            return Shader::null();
        };
        let id = self.load_shader_program(&vs, &fs);
        if id == 0 {
            log::warn!("SHADER: built-in {kind:?} shader failed to load");
            return Shader::null();
        }
        Shader {
            id,
            locs: self.resolve_locations(id),
        }
    }

    fn resolve_locations(&mut self, program: u32) -> ShaderLocations {
        let mut loc = |name: &str| self.backend.uniform_location(program, name);
        ShaderLocations {
            mvp: loc("mvpMatrix"),
            model: loc("modelMatrix"),
            col_diffuse: loc("colDiffuse"),
            col_ambient: loc("colAmbient"),
            col_specular: loc("colSpecular"),
            texture0: loc("texture0"),
            texture1: loc("texture1"),
            texture2: loc("texture2"),
        }
    }

    /// Null-safe. The built-in shaders are owned by the context and are
    /// released on close.
    pub fn unload_shader(&mut self, shader: Shader) {
        if shader.is_null() {
            return;
        }
        if shader.id == self.default_shader.id || shader.id == self.standard_shader.id {
            log::warn!("SHADER: [ID {}] built-in shader is released with the context", shader.id);
            return;
        }
        if self.draws.calls().iter().any(|c| c.shader.id == shader.id && c.vertex_count > 0) {
            self.draw();
        }
        if self.current_shader.id == shader.id {
            self.set_shader(Shader::null());
        }
        self.backend.delete_program(shader.id);
        log::info!("SHADER: [ID {}] unloaded", shader.id);
    }

    /// `-1` when the uniform does not exist or was optimized out.
    pub fn shader_location(&mut self, shader: &Shader, name: &str) -> i32 {
        if shader.is_null() {
            return -1;
        }
        let loc = self.backend.uniform_location(shader.id, name);
        if loc < 0 {
            log::warn!("SHADER: [ID {}] uniform {name} not found", shader.id);
        }
        loc
    }

    /// Skipped for null shaders and absent locations.
    pub fn set_shader_value(&mut self, shader: &Shader, location: i32, value: UniformValue) {
        if shader.is_null() || location < 0 {
            return;
        }
        self.backend.use_program(shader.id);
        self.backend.set_uniform(location, value);
        self.backend.use_program(0);
    }

    #[inline]
    pub fn default_shader(&self) -> Shader {
        self.default_shader
    }

    /// Null when the profile has no shaders or the standard shader failed.
    #[inline]
    pub fn standard_shader(&self) -> Shader {
        self.standard_shader
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::backend::recording::{Command, RecordingBackend};
    use crate::batch::DrawMode;
    use crate::config::RlglConfig;
    use crate::context::tests::context;

    const VS: &str = "in vec3 vertexPosition; uniform mat4 mvpMatrix; void main() {}";
    const FS: &str = "uniform vec4 colDiffuse; uniform float fade; void main() {}";

    // ── sources ───────────────────────────────────────────────────────────

    #[test]
    fn builtin_sources_carry_profile_version() {
        let (vs, fs) = BuiltinShader::Default.sources(GlProfile::CoreProfile).unwrap();
        assert!(vs.starts_with("#version 330\n"));
        assert!(fs.starts_with("#version 330\n"));

        let (_, fs) = BuiltinShader::Distortion.sources(GlProfile::Es2).unwrap();
        assert!(fs.starts_with("#version 100\n"));
        assert!(fs.contains("chromaAbParam"));

        assert!(BuiltinShader::Standard.sources(GlProfile::FixedFunction).is_none());
    }

    // ── loading ───────────────────────────────────────────────────────────

    #[test]
    fn attributes_bound_before_link_and_stages_released() {
        let mut rl = context();
        rl.backend_mut().clear_commands();
        let id = rl.load_shader_program(VS, FS);
        assert_ne!(id, 0);

        let cmds = rl.backend().commands();
        let link = cmds
            .iter()
            .position(|c| matches!(c, Command::LinkProgram { .. }))
            .unwrap();
        let Command::LinkProgram { attributes, .. } = &cmds[link] else {
            unreachable!()
        };
        let names: Vec<&str> = attributes.iter().map(|(_, n)| n.as_str()).collect();
        assert_eq!(
            names,
            vec!["vertexPosition", "vertexTexCoord", "vertexNormal", "vertexColor", "vertexTangent", "vertexTexCoord2"]
        );
        assert_eq!(attributes[3].0, 3);

        let deletes = cmds[link..]
            .iter()
            .filter(|c| matches!(c, Command::DeleteShader(_)))
            .count();
        assert_eq!(deletes, 2);
    }

    #[test]
    fn invalid_fragment_returns_null_and_frees_vertex_stage() {
        let mut rl = context();
        rl.backend_mut().clear_commands();
        let id = rl.load_shader_program(VS, "uniform vec4 colDiffuse;");
        assert_eq!(id, 0);

        let cmds = rl.backend().commands();
        assert!(!cmds.iter().any(|c| matches!(c, Command::LinkProgram { .. })));
        let Some(Command::CompileShader { id: vs, .. }) = cmds.first() else {
            panic!("expected vertex compile first, got {cmds:?}");
        };
        assert!(cmds.contains(&Command::DeleteShader(*vs)));
    }

    #[test]
    fn fixed_function_has_no_programs() {
        let mut rl = Rlgl::new(RecordingBackend::with_profile(GlProfile::FixedFunction), RlglConfig::default()).unwrap();
        assert!(rl.load_shader(None, None).is_null());
    }

    #[test]
    fn default_shader_locations_resolved() {
        let rl = context();
        let locs = rl.default_shader().locs;
        assert!(locs.mvp >= 0 && locs.col_diffuse >= 0 && locs.texture0 >= 0);
        assert_eq!(locs.model, -1);

        let std_locs = rl.standard_shader().locs;
        assert!(std_locs.model >= 0 && std_locs.texture2 >= 0);
    }

    // ── uniforms ──────────────────────────────────────────────────────────

    #[test]
    fn uniform_helpers_skip_absent_locations() {
        let mut rl = context();
        let shader = rl.load_shader(Some(VS), Some(FS));
        let fade = rl.shader_location(&shader, "fade");
        assert!(fade >= 0);
        assert_eq!(rl.shader_location(&shader, "missing"), -1);

        rl.backend_mut().clear_commands();
        rl.set_shader_value(&shader, -1, UniformValue::Float(0.5));
        assert!(rl.backend().commands().is_empty());

        rl.set_shader_value(&shader, fade, UniformValue::Float(0.5));
        assert!(rl.backend().commands().contains(&Command::SetUniform {
            location: fade,
            value: UniformValue::Float(0.5),
        }));
    }

    // ── unloading ─────────────────────────────────────────────────────────

    #[test]
    fn unload_is_null_safe_and_resets_current_shader() {
        let mut rl = context();
        rl.backend_mut().clear_commands();
        rl.unload_shader(Shader::null());
        assert!(rl.backend().commands().is_empty());

        let shader = rl.load_shader(None, None);
        rl.set_shader(shader);
        rl.unload_shader(shader);
        assert!(rl.current_shader.is_null());
        assert!(rl.backend().commands().contains(&Command::DeleteProgram(shader.id)));
    }

    #[test]
    fn unload_draws_pending_quads_before_deleting() {
        let mut rl = context();
        let custom = rl.load_shader(None, None);
        rl.set_shader(custom);
        rl.begin(DrawMode::Quads);
        rl.vertex2f(0.0, 0.0);
        rl.vertex2f(0.0, 1.0);
        rl.vertex2f(1.0, 1.0);
        rl.vertex2f(1.0, 0.0);
        rl.end();
        rl.backend_mut().clear_commands();

        rl.unload_shader(custom);
        rl.draw();

        let cmds = rl.backend().commands();
        let used = cmds.iter().position(|c| *c == Command::UseProgram(custom.id));
        let deleted = cmds.iter().position(|c| *c == Command::DeleteProgram(custom.id));
        assert!(used.is_some() && deleted.is_some());
        assert!(used < deleted);
        assert_eq!(cmds.iter().filter(|c| **c == Command::UseProgram(custom.id)).count(), 1);
        assert!(rl.draw_calls().calls().iter().all(|c| c.shader.id != custom.id));
    }

    #[test]
    fn builtin_shaders_survive_unload() {
        let mut rl = context();
        let default = rl.default_shader();
        rl.backend_mut().clear_commands();
        rl.unload_shader(default);
        assert!(!rl.backend().commands().contains(&Command::DeleteProgram(default.id)));
    }
}
