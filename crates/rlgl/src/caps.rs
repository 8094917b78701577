//! Capability prober.
//!
//! Turns the driver's version string and extension list into a flat set of
//! feature flags. Probing happens once, when a backend is created; nothing
//! re-queries the driver afterwards.

use std::fmt;

/// GPU API generation the batching layer drives.
#[derive(Debug, Copy, Clone, Eq, PartialEq, Hash)]
pub enum GlProfile {
    /// OpenGL 1.1: client arrays, fixed-function matrices, no shaders.
    FixedFunction,
    /// OpenGL 3.3 core: shaders, VBOs, VAOs always available.
    CoreProfile,
    /// OpenGL ES 2.0 (and WebGL): shaders, VAOs only through an extension.
    Es2,
}

impl GlProfile {
    #[inline]
    pub fn has_shaders(self) -> bool {
        !matches!(self, GlProfile::FixedFunction)
    }

    /// `#version` line prepended to built-in shader sources.
    pub fn glsl_version_line(self) -> Option<&'static str> {
        match self {
            GlProfile::FixedFunction => None,
            GlProfile::CoreProfile => Some("#version 330\n"),
            GlProfile::Es2 => Some("#version 100\n"),
        }
    }
}

impl fmt::Display for GlProfile {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            GlProfile::FixedFunction => "OpenGL 1.1 (fixed function)",
            GlProfile::CoreProfile => "OpenGL 3.3 core",
            GlProfile::Es2 => "OpenGL ES 2.0",
        };
        f.write_str(name)
    }
}

/// Feature flags discovered at init.
#[derive(Debug, Clone, PartialEq)]
pub struct Capabilities {
    pub profile: GlProfile,
    pub vao: bool,
    pub npot: bool,
    pub dxt: bool,
    pub etc1: bool,
    pub etc2: bool,
    pub pvrt: bool,
    pub astc: bool,
    pub anisotropic: bool,
    /// Highest anisotropy level the driver accepts; `0.0` when unsupported.
    pub max_anisotropy: f32,
    pub mirror_clamp: bool,
    pub depth_texture: bool,
}

impl Capabilities {
    /// Baseline for a profile before any extension is considered.
    pub fn baseline(profile: GlProfile) -> Self {
        let core = profile == GlProfile::CoreProfile;
        Self {
            profile,
            vao: core,
            npot: core,
            dxt: false,
            etc1: false,
            etc2: false,
            pvrt: false,
            astc: false,
            anisotropic: false,
            max_anisotropy: 0.0,
            mirror_clamp: false,
            depth_texture: core,
        }
    }

    /// Everything supported. Handy for headless backends.
    pub fn all(profile: GlProfile) -> Self {
        Self {
            profile,
            vao: profile != GlProfile::FixedFunction,
            npot: true,
            dxt: true,
            etc1: true,
            etc2: true,
            pvrt: true,
            astc: true,
            anisotropic: true,
            max_anisotropy: 16.0,
            mirror_clamp: true,
            depth_texture: true,
        }
    }

    /// Builds the capability set from driver strings.
    ///
    /// `max_anisotropy` is only kept when the anisotropic extension is present.
    pub fn probe<S: AsRef<str>>(version: &str, extensions: &[S], max_anisotropy: f32) -> Self {
        let profile = profile_from_version(version);
        let mut caps = Self::baseline(profile);

        for ext in extensions {
            caps.apply_extension(ext.as_ref());
        }

        // Fixed-function paths never use VAOs even if the driver exposes them.
        if profile == GlProfile::FixedFunction {
            caps.vao = false;
        }

        if caps.anisotropic {
            caps.max_anisotropy = max_anisotropy;
        }

        caps
    }

    fn apply_extension(&mut self, ext: &str) {
        match ext {
            "GL_OES_vertex_array_object" | "GL_ARB_vertex_array_object" => self.vao = true,

            "GL_OES_texture_npot" | "GL_ARB_texture_non_power_of_two" => self.npot = true,

            "GL_EXT_texture_compression_s3tc"
            | "GL_WEBGL_compressed_texture_s3tc"
            | "GL_WEBKIT_WEBGL_compressed_texture_s3tc" => self.dxt = true,

            "GL_OES_compressed_ETC1_RGB8_texture" | "GL_WEBGL_compressed_texture_etc1" => {
                self.etc1 = true
            }

            "GL_ARB_ES3_compatibility" => self.etc2 = true,

            "GL_IMG_texture_compression_pvrtc" => self.pvrt = true,

            "GL_KHR_texture_compression_astc_hdr" | "GL_KHR_texture_compression_astc_ldr" => {
                self.astc = true
            }

            "GL_EXT_texture_filter_anisotropic" => self.anisotropic = true,

            "GL_EXT_texture_mirror_clamp" => self.mirror_clamp = true,

            "GL_OES_depth_texture" | "GL_WEBGL_depth_texture" => self.depth_texture = true,

            _ => {}
        }
    }

    /// Logs the probed set at info level, one feature per line.
    pub fn log_summary(&self) {
        log::info!("RLGL: profile: {}", self.profile);
        log::info!("RLGL: VAO support: {}", yes_no(self.vao));
        log::info!("RLGL: NPOT textures: {}", yes_no(self.npot));
        log::info!("RLGL: DXT compressed textures: {}", yes_no(self.dxt));
        log::info!("RLGL: ETC1 compressed textures: {}", yes_no(self.etc1));
        log::info!("RLGL: ETC2/EAC compressed textures: {}", yes_no(self.etc2));
        log::info!("RLGL: PVRT compressed textures: {}", yes_no(self.pvrt));
        log::info!("RLGL: ASTC compressed textures: {}", yes_no(self.astc));
        if self.anisotropic {
            log::info!("RLGL: anisotropic filtering: max {:.1}x", self.max_anisotropy);
        } else {
            log::info!("RLGL: anisotropic filtering: no");
        }
        log::info!("RLGL: mirror clamp wrap: {}", yes_no(self.mirror_clamp));
    }
}

#[inline]
fn yes_no(v: bool) -> &'static str {
    if v { "yes" } else { "no" }
}

/// Picks the profile from a `GL_VERSION` string.
///
/// ES / WebGL strings map to [`GlProfile::Es2`]; desktop 3.3 or newer maps to
/// [`GlProfile::CoreProfile`]; anything older (or unparsable) is treated as
/// fixed function.
pub fn profile_from_version(version: &str) -> GlProfile {
    let v = version.trim();
    if v.starts_with("OpenGL ES") || v.starts_with("WebGL") {
        return GlProfile::Es2;
    }

    let Some((major, minor)) = parse_major_minor(v) else {
        return GlProfile::FixedFunction;
    };

    if (major, minor) >= (3, 3) {
        GlProfile::CoreProfile
    } else {
        GlProfile::FixedFunction
    }
}

fn parse_major_minor(v: &str) -> Option<(u32, u32)> {
    let numeric = v.split_whitespace().next()?;
    let mut parts = numeric.split('.');
    let major = parts.next()?.parse().ok()?;
    let minor = parts
        .next()
        .and_then(|m| m.chars().take_while(char::is_ascii_digit).collect::<String>().parse().ok())
        .unwrap_or(0);
    Some((major, minor))
}

#[cfg(test)]
mod tests {
    use super::*;

    // ── version parsing ───────────────────────────────────────────────────

    #[test]
    fn desktop_versions() {
        assert_eq!(profile_from_version("3.3.0 NVIDIA 535.54"), GlProfile::CoreProfile);
        assert_eq!(profile_from_version("4.6 (Core Profile) Mesa 23.1"), GlProfile::CoreProfile);
        assert_eq!(profile_from_version("2.1 Mesa 10.0"), GlProfile::FixedFunction);
        assert_eq!(profile_from_version("1.1.0"), GlProfile::FixedFunction);
    }

    #[test]
    fn es_versions() {
        assert_eq!(profile_from_version("OpenGL ES 2.0 ANGLE"), GlProfile::Es2);
        assert_eq!(profile_from_version("OpenGL ES 3.2 V@415.0"), GlProfile::Es2);
        assert_eq!(profile_from_version("WebGL 1.0"), GlProfile::Es2);
    }

    #[test]
    fn garbage_is_fixed_function() {
        assert_eq!(profile_from_version(""), GlProfile::FixedFunction);
        assert_eq!(profile_from_version("banana"), GlProfile::FixedFunction);
    }

    // ── extensions ────────────────────────────────────────────────────────

    #[test]
    fn es2_extensions_enable_flags() {
        let caps = Capabilities::probe(
            "OpenGL ES 2.0",
            &[
                "GL_OES_vertex_array_object",
                "GL_OES_texture_npot",
                "GL_WEBKIT_WEBGL_compressed_texture_s3tc",
                "GL_OES_compressed_ETC1_RGB8_texture",
                "GL_EXT_texture_filter_anisotropic",
            ],
            8.0,
        );
        assert!(caps.vao && caps.npot && caps.dxt && caps.etc1 && caps.anisotropic);
        assert!(!caps.etc2 && !caps.pvrt && !caps.astc && !caps.mirror_clamp);
        assert_eq!(caps.max_anisotropy, 8.0);
    }

    #[test]
    fn core_profile_has_vao_and_npot_without_extensions() {
        let caps = Capabilities::probe::<&str>("3.3.0", &[], 16.0);
        assert!(caps.vao && caps.npot);
        assert!(!caps.anisotropic);
        assert_eq!(caps.max_anisotropy, 0.0);
    }

    #[test]
    fn fixed_function_never_uses_vao() {
        let caps = Capabilities::probe("2.1", &["GL_ARB_vertex_array_object"], 0.0);
        assert!(!caps.vao);
    }
}
