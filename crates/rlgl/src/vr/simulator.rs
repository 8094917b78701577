//! Stereo rendering without a headset: both eyes go side by side into one
//! render texture, which is then drawn to the screen through the lens
//! distortion shader.

use anyhow::Result;

use crate::backend::{GpuBackend, UniformValue};
use crate::batch::DrawMode;
use crate::context::Rlgl;
use crate::math::{self, Mat4};
use crate::resources::{BuiltinShader, RenderTexture, Shader};

use super::stereo::{StereoConfig, VrDeviceInfo};

#[derive(Debug)]
pub struct VrSimulator {
    info: VrDeviceInfo,
    config: StereoConfig,
    target: RenderTexture,
    distortion: Shader,
    in_frame: bool,
}

impl VrSimulator {
    /// Loads the stereo target and the distortion shader and uploads the
    /// lens parameters once.
    pub fn new<B: GpuBackend>(rl: &mut Rlgl<B>, info: VrDeviceInfo) -> Result<Self> {
        anyhow::ensure!(
            rl.profile().has_shaders(),
            "VR simulator needs a shader profile, context runs {}",
            rl.profile()
        );
        anyhow::ensure!(info.h_resolution > 1 && info.v_resolution > 0, "VR device resolution is empty");

        let config = StereoConfig::from_device(&info, rl.config.cull_distance_near, rl.config.cull_distance_far);

        let target = rl.load_render_texture(info.h_resolution, info.v_resolution);
        anyhow::ensure!(!target.is_null(), "failed to create {}x{} stereo target", info.h_resolution, info.v_resolution);

        let distortion = rl.load_builtin_shader(BuiltinShader::Distortion);
        if distortion.is_null() {
            rl.unload_render_texture(target);
            anyhow::bail!("distortion shader failed to load");
        }

        let d = config.distortion;
        let uniforms = [
            ("leftLensCenter", UniformValue::Vec2(d.left_lens_center)),
            ("rightLensCenter", UniformValue::Vec2(d.right_lens_center)),
            ("leftScreenCenter", UniformValue::Vec2(d.left_screen_center)),
            ("rightScreenCenter", UniformValue::Vec2(d.right_screen_center)),
            ("scale", UniformValue::Vec2(d.scale)),
            ("scaleIn", UniformValue::Vec2(d.scale_in)),
            ("deviceWarpParam", UniformValue::Vec4(d.device_warp)),
            ("chromaAbParam", UniformValue::Vec4(d.chroma_ab)),
        ];
        for (name, value) in uniforms {
            let loc = rl.shader_location(&distortion, name);
            rl.set_shader_value(&distortion, loc, value);
        }

        log::info!(
            "VR: simulator ready ({}x{}, target FBO {}, distortion shader {})",
            info.h_resolution,
            info.v_resolution,
            target.id,
            distortion.id
        );

        Ok(Self {
            info,
            config,
            target,
            distortion,
            in_frame: false,
        })
    }

    #[inline]
    pub fn config(&self) -> &StereoConfig {
        &self.config
    }

    #[inline]
    pub fn target(&self) -> RenderTexture {
        self.target
    }

    #[inline]
    pub fn distortion_shader(&self) -> Shader {
        self.distortion
    }

    /// Redirects drawing into the stereo target with per-eye matrices.
    pub fn begin_frame<B: GpuBackend>(&mut self, rl: &mut Rlgl<B>) {
        if self.in_frame {
            log::warn!("VR: begin_frame called twice without end_frame");
            return;
        }
        rl.enable_render_texture(self.target);
        rl.clear_screen_buffers();
        rl.enable_stereo(self.config.view);
        self.in_frame = true;
    }

    /// Flushes both eyes into the target, then draws it to the screen
    /// through the distortion shader. The modelview matrix is left at
    /// identity.
    pub fn end_frame<B: GpuBackend>(&mut self, rl: &mut Rlgl<B>) {
        if !std::mem::take(&mut self.in_frame) {
            log::warn!("VR: end_frame called without begin_frame");
            return;
        }
        rl.disable_render_texture();
        rl.disable_stereo();

        let (sw, sh) = rl.screen_size();
        let (w, h) = if sw == 0 || sh == 0 {
            (self.info.h_resolution, self.info.v_resolution)
        } else {
            (sw, sh)
        };
        rl.viewport(0, 0, w as i32, h as i32);
        rl.clear_screen_buffers();

        let saved_projection = *rl.matrices.projection();
        rl.matrices
            .set_projection(math::ortho(0.0, w as f64, h as f64, 0.0, 0.0, 1.0));
        rl.matrices.set_modelview(Mat4::IDENTITY);
        rl.disable_depth_test();

        let previous_shader = rl.current_shader;
        rl.set_shader(self.distortion);
        rl.enable_texture(self.target.texture);
        let (w, h) = (w as f32, h as f32);

        // render targets are stored bottom-up; sample with v flipped
        rl.begin(DrawMode::Quads);
        rl.color4ub(255, 255, 255, 255);
        rl.tex_coord2f(0.0, 1.0);
        rl.vertex2f(0.0, 0.0);
        rl.tex_coord2f(0.0, 0.0);
        rl.vertex2f(0.0, h);
        rl.tex_coord2f(1.0, 0.0);
        rl.vertex2f(w, h);
        rl.tex_coord2f(1.0, 1.0);
        rl.vertex2f(w, 0.0);
        rl.end();

        rl.disable_texture();
        rl.draw();

        rl.set_shader(previous_shader);
        rl.matrices.set_projection(saved_projection);
        rl.enable_depth_test();
    }

    pub fn unload<B: GpuBackend>(mut self, rl: &mut Rlgl<B>) {
        if self.in_frame {
            self.end_frame(rl);
        }
        rl.unload_render_texture(self.target);
        rl.unload_shader(self.distortion);
        log::info!("VR: simulator unloaded");
    }
}
