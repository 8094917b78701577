use crate::backend::{BufferUsage, DrawRange, GpuBackend, UniformValue, VertexArrays, VertexBuffers};
use crate::batch::DrawMode;
use crate::context::Rlgl;
use crate::math::Mat4;
use crate::vr::Eye;

use super::Shader;

/// Triangle list with per-vertex attributes. Optional streams are empty.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Mesh {
    /// 3 floats per vertex.
    pub vertices: Vec<f32>,
    /// 2 floats per vertex.
    pub texcoords: Vec<f32>,
    /// 3 floats per vertex.
    pub normals: Vec<f32>,
    /// RGBA bytes per vertex.
    pub colors: Vec<u8>,
    /// Null until [`Rlgl::load_mesh`] succeeds on a buffer-capable profile.
    pub gpu: VertexBuffers,
}

impl Mesh {
    #[inline]
    pub fn vertex_count(&self) -> usize {
        self.vertices.len() / 3
    }

    pub(crate) fn arrays(&self) -> VertexArrays<'_> {
        let present = |len: usize| len > 0;
        VertexArrays {
            vertices: &self.vertices,
            texcoords: present(self.texcoords.len()).then_some(self.texcoords.as_slice()),
            normals: present(self.normals.len()).then_some(self.normals.as_slice()),
            colors: present(self.colors.len()).then_some(self.colors.as_slice()),
            indices: None,
        }
    }

    fn check_streams(&self) -> Result<(), String> {
        let n = self.vertex_count();
        if self.vertices.len() % 3 != 0 {
            return Err(format!("{} position floats is not a multiple of 3", self.vertices.len()));
        }
        for (name, len, per_vertex) in [
            ("texcoord", self.texcoords.len(), 2),
            ("normal", self.normals.len(), 3),
            ("colour", self.colors.len(), 4),
        ] {
            if len != 0 && len != n * per_vertex {
                return Err(format!("{name} stream has {len} values for {n} vertices"));
            }
        }
        Ok(())
    }
}

/// Surface description for [`Rlgl::draw_mesh`]. Zero maps are unused.
#[derive(Debug, Copy, Clone, PartialEq)]
pub struct Material {
    /// Null selects the standard shader (or the default one without it).
    pub shader: Shader,
    pub diffuse_map: u32,
    pub normal_map: u32,
    pub specular_map: u32,
    pub color_diffuse: [u8; 4],
    pub color_ambient: [u8; 4],
    pub color_specular: [u8; 4],
    pub glossiness: f32,
}

impl Default for Material {
    fn default() -> Self {
        Self {
            shader: Shader::null(),
            diffuse_map: 0,
            normal_map: 0,
            specular_map: 0,
            color_diffuse: [255; 4],
            color_ambient: [255; 4],
            color_specular: [255; 4],
            glossiness: 100.0,
        }
    }
}

#[inline]
fn normalized(rgba: [u8; 4]) -> UniformValue {
    UniformValue::Vec4(rgba.map(|c| c as f32 / 255.0))
}

impl<B: GpuBackend> Rlgl<B> {
    /// Uploads `mesh` into static (or dynamic) GPU buffers.
    ///
    /// The fixed-function profile draws from client memory and leaves
    /// `mesh.gpu` null. Returns `false` if the streams are inconsistent or
    /// allocation fails.
    pub fn load_mesh(&mut self, mesh: &mut Mesh, dynamic: bool) -> bool {
        if let Err(reason) = mesh.check_streams() {
            log::warn!("RLGL: mesh rejected: {reason}");
            return false;
        }
        let usage = if dynamic { BufferUsage::Dynamic } else { BufferUsage::Static };
        let created = self.backend.create_vertex_buffers(&mesh.arrays(), usage);
        match created {
            Ok(buffers) => {
                mesh.gpu = buffers;
                if buffers.is_null() {
                    log::info!("RLGL: mesh kept in client memory ({} vertices)", mesh.vertex_count());
                } else {
                    log::info!(
                        "RLGL: [VAO {}] mesh uploaded ({} vertices)",
                        buffers.vao,
                        mesh.vertex_count()
                    );
                }
                true
            }
            Err(e) => {
                log::warn!("RLGL: mesh upload failed: {e}");
                false
            }
        }
    }

    /// Null-safe.
    pub fn delete_vertex_arrays(&mut self, buffers: &VertexBuffers) {
        if buffers.is_null() {
            return;
        }
        self.backend.delete_vertex_buffers(buffers);
    }

    /// Releases GPU buffers; CPU streams are kept.
    pub fn unload_mesh(&mut self, mesh: &mut Mesh) {
        self.delete_vertex_arrays(&mesh.gpu);
        mesh.gpu = VertexBuffers::default();
    }

    /// Draws `mesh` right away with `transform` applied on top of the
    /// current modelview. Batched primitives are not flushed first.
    pub fn draw_mesh(&mut self, mesh: &Mesh, material: &Material, transform: &Mat4) {
        let count = mesh.vertex_count();
        if count == 0 {
            return;
        }

        let projection = *self.matrices.projection();
        let view = *self.matrices.modelview();
        let modelview = view * *transform;
        let passes: Vec<(Option<[i32; 4]>, Mat4, Mat4)> = match self.stereo {
            Some(stereo) => Eye::BOTH
                .iter()
                .map(|&eye| {
                    let (p, mv) = stereo.apply(eye, &modelview);
                    (Some(stereo.viewports[eye.index()]), p, mv)
                })
                .collect(),
            None => vec![(None, projection, modelview)],
        };

        let diffuse_map = if material.diffuse_map == 0 { self.default_texture } else { material.diffuse_map };
        let has_shaders = self.caps.profile.has_shaders();
        let arrays = mesh.arrays();
        let range = DrawRange::Arrays {
            first: 0,
            count: count as u32,
        };

        let shader = if !has_shaders {
            None
        } else if !material.shader.is_null() {
            Some(material.shader)
        } else if !self.standard_shader.is_null() {
            Some(self.standard_shader)
        } else {
            Some(self.default_shader)
        };

        if let Some(shader) = shader {
            self.backend.use_program(shader.id);
            self.backend.set_uniform(shader.locs.col_diffuse, normalized(material.color_diffuse));
            self.backend.set_uniform(shader.locs.col_ambient, normalized(material.color_ambient));
            self.backend.set_uniform(shader.locs.col_specular, normalized(material.color_specular));
            self.backend.set_uniform(shader.locs.model, UniformValue::Mat4(transform.to_cols_array()));

            if shader.id == self.standard_shader.id {
                let glossiness = self.backend.uniform_location(shader.id, "glossiness");
                let use_normal = self.backend.uniform_location(shader.id, "useNormal");
                let use_specular = self.backend.uniform_location(shader.id, "useSpecular");
                let view_dir = self.backend.uniform_location(shader.id, "viewDir");
                self.backend.set_uniform(glossiness, UniformValue::Float(material.glossiness));
                self.backend
                    .set_uniform(use_normal, UniformValue::Int((material.normal_map != 0) as i32));
                self.backend
                    .set_uniform(use_specular, UniformValue::Int((material.specular_map != 0) as i32));
                self.backend
                    .set_uniform(view_dir, UniformValue::Vec3(view.z_axis.truncate().to_array()));
                self.upload_lights();
            }

            self.backend.bind_texture_unit(0, diffuse_map);
            self.backend.set_uniform(shader.locs.texture0, UniformValue::Int(0));
            if material.normal_map != 0 {
                self.backend.bind_texture_unit(1, material.normal_map);
                self.backend.set_uniform(shader.locs.texture1, UniformValue::Int(1));
            }
            if material.specular_map != 0 {
                self.backend.bind_texture_unit(2, material.specular_map);
                self.backend.set_uniform(shader.locs.texture2, UniformValue::Int(2));
            }

            for (viewport, p, mv) in &passes {
                if let Some([x, y, w, h]) = viewport {
                    self.backend.viewport(*x, *y, *w, *h);
                }
                let mvp = *p * *mv;
                self.backend.set_uniform(shader.locs.mvp, UniformValue::Mat4(mvp.to_cols_array()));
                self.backend.draw_vertex_buffers(&mesh.gpu, &arrays, DrawMode::Triangles, range);
            }

            if material.normal_map != 0 {
                self.backend.bind_texture_unit(1, 0);
            }
            if material.specular_map != 0 {
                self.backend.bind_texture_unit(2, 0);
            }
            self.backend.bind_texture(0);
            self.backend.use_program(0);
        } else {
            self.backend.bind_texture(diffuse_map);
            for (viewport, p, mv) in &passes {
                if let Some([x, y, w, h]) = viewport {
                    self.backend.viewport(*x, *y, *w, *h);
                }
                self.backend.load_fixed_function_matrices(p, mv);
                self.backend.draw_vertex_buffers(&mesh.gpu, &arrays, DrawMode::Triangles, range);
            }
            self.backend.bind_texture(0);
        }

        if let Some(stereo) = self.stereo {
            let [x, y, w, h] = stereo.full_viewport;
            self.backend.viewport(x, y, w, h);
        }
    }
}
