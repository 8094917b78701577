//! Batch flush.
//!
//! Uploads the filled part of each buffer, then issues lines, triangles and
//! one indexed draw per quads draw call, once per eye when stereo is on.
//! Everything is reset afterwards so the next frame starts empty.

use crate::backend::{DrawRange, GpuBackend, UniformValue};
use crate::context::Rlgl;
use crate::math::Mat4;
use crate::resources::Shader;
use crate::vr::Eye;

impl<B: GpuBackend> Rlgl<B> {
    /// Flushes all three buffers to the GPU.
    pub fn draw(&mut self) {
        self.upload_buffers();

        let projection = *self.matrices.projection();
        // Vertices ended under a push already carry the local transform.
        let modelview = self
            .routing
            .base_depth()
            .and_then(|base| self.matrices.saved(base).copied())
            .unwrap_or(*self.matrices.modelview());

        let issued = match self.stereo {
            Some(view) => {
                let mut issued = 0;
                for eye in Eye::BOTH {
                    let [x, y, w, h] = view.viewports[eye.index()];
                    self.backend.viewport(x, y, w, h);
                    let (eye_projection, eye_modelview) = view.apply(eye, &modelview);
                    issued += self.draw_buffers(&eye_projection, &eye_modelview);
                }
                let [x, y, w, h] = view.full_viewport;
                self.backend.viewport(x, y, w, h);
                issued
            }
            None => self.draw_buffers(&projection, &modelview),
        };

        self.reset_batch();
        self.stats.flushes += 1;
        self.stats.last_flush_draws = issued;
        log::trace!("RLGL: flush issued {issued} draws");
    }

    fn upload_buffers(&mut self) {
        for buf in [&self.lines, &self.triangles, &self.quads] {
            if buf.is_empty() || buf.gpu.is_null() {
                continue;
            }
            self.backend.update_vertex_buffers(&buf.gpu, &buf.dirty_arrays());
        }
    }

    /// Issues every non-empty batch with one projection/modelview pair.
    /// Returns the number of draws.
    fn draw_buffers(&mut self, projection: &Mat4, modelview: &Mat4) -> usize {
        let has_shaders = self.caps.profile.has_shaders();
        if !has_shaders {
            self.backend.load_fixed_function_matrices(projection, modelview);
        }

        let mvp = *projection * *modelview;
        let default_shader = self.default_shader;
        let default_texture = self.default_texture;
        let batch_shader = effective_shader(self.current_shader, default_shader);
        let mut bound = 0;
        let mut issued = 0;

        for buf in [&self.lines, &self.triangles] {
            if buf.is_empty() {
                continue;
            }
            if has_shaders {
                bind_program(&mut self.backend, &batch_shader, &mvp, &mut bound);
            }
            self.backend.bind_texture(default_texture);
            self.backend.draw_vertex_buffers(
                &buf.gpu,
                &buf.arrays(),
                buf.mode(),
                DrawRange::Arrays {
                    first: 0,
                    count: buf.vertex_count() as u32,
                },
            );
            issued += 1;
        }

        if !self.quads.is_empty() {
            let quads = &self.quads;
            let arrays = quads.arrays();
            let mut indices_offset = 0;

            for call in self.draws.calls() {
                let count = call.index_count();
                if count == 0 {
                    continue;
                }
                if has_shaders {
                    let shader = effective_shader(call.shader, default_shader);
                    bind_program(&mut self.backend, &shader, &mvp, &mut bound);
                }
                let texture = if call.texture == 0 { default_texture } else { call.texture };
                self.backend.bind_texture(texture);
                self.backend.draw_vertex_buffers(
                    &quads.gpu,
                    &arrays,
                    quads.mode(),
                    DrawRange::Indexed {
                        count: count as u32,
                        byte_offset: indices_offset * size_of::<u32>(),
                    },
                );
                indices_offset += count;
                issued += 1;
            }
        }

        if issued > 0 {
            self.backend.bind_texture(0);
            if has_shaders {
                self.backend.use_program(0);
            }
        }
        issued
    }

    fn reset_batch(&mut self) {
        self.lines.reset();
        self.triangles.reset();
        self.quads.reset();
        self.draws.reset(self.default_texture, self.current_shader);
        self.current_depth = self.config.initial_depth;
    }
}

#[inline]
fn effective_shader(shader: Shader, default: Shader) -> Shader {
    if shader.is_null() { default } else { shader }
}

/// Switches program and sets the per-draw uniforms when `shader` is not
/// already bound.
fn bind_program<B: GpuBackend>(backend: &mut B, shader: &Shader, mvp: &Mat4, bound: &mut u32) {
    if *bound == shader.id {
        return;
    }
    backend.use_program(shader.id);
    backend.set_uniform(shader.locs.mvp, UniformValue::Mat4(mvp.to_cols_array()));
    backend.set_uniform(shader.locs.col_diffuse, UniformValue::Vec4([1.0; 4]));
    backend.set_uniform(shader.locs.texture0, UniformValue::Int(0));
    *bound = shader.id;
}
