//! Immediate-mode vertex submission.
//!
//! `begin` selects a buffer, `vertex*` / `color*` / `tex_coord2f` append to
//! it, `end` pads the attribute arrays and advances the 2D depth counter.

use crate::backend::GpuBackend;
use crate::batch::{DrawMode, VertexRouting};
use crate::context::Rlgl;
use crate::math::Vec3;
use crate::resources::Shader;

impl<B: GpuBackend> Rlgl<B> {
    /// Selects the primitive kind for the following vertices.
    #[inline]
    pub fn begin(&mut self, mode: DrawMode) {
        self.mode = mode;
    }

    /// Finishes the current primitive.
    ///
    /// Vertices held back by a modelview push are transformed and emitted
    /// first; then colours and texcoords are padded to the vertex count.
    pub fn end(&mut self) {
        if self.routing.is_buffering() {
            self.replay_buffered();
        }

        let fallback = self.current_color;
        let mode = self.mode;
        self.buffer_mut(mode).pad(fallback);

        self.current_depth += self.config.depth_step;
    }

    pub fn vertex3f(&mut self, x: f32, y: f32, z: f32) {
        let v = Vec3::new(x, y, z);

        if let VertexRouting::Buffering { vertices, .. } = &mut self.routing {
            if vertices.len() >= self.config.temp_vertex_buffer_size {
                self.stats.dropped_vertices += 1;
                log::error!(
                    "RLGL: temp vertex buffer full ({} vertices), vertex dropped",
                    self.config.temp_vertex_buffer_size
                );
                return;
            }
            vertices.push(v);
            return;
        }

        self.push_vertex_direct(v);
    }

    /// 2D vertex at the current depth.
    #[inline]
    pub fn vertex2f(&mut self, x: f32, y: f32) {
        self.vertex3f(x, y, self.current_depth);
    }

    #[inline]
    pub fn vertex2i(&mut self, x: i32, y: i32) {
        self.vertex3f(x as f32, y as f32, self.current_depth);
    }

    pub fn color4ub(&mut self, r: u8, g: u8, b: u8, a: u8) {
        let rgba = [r, g, b, a];
        self.current_color = rgba;
        let mode = self.mode;
        if !self.buffer_mut(mode).push_color(rgba) {
            log::error!("RLGL: {mode:?} colour array full, colour dropped");
        }
    }

    /// Components in `[0, 1]`, scaled by 255 and truncated.
    pub fn color4f(&mut self, r: f32, g: f32, b: f32, a: f32) {
        self.color4ub((r * 255.0) as u8, (g * 255.0) as u8, (b * 255.0) as u8, (a * 255.0) as u8);
    }

    #[inline]
    pub fn color3f(&mut self, r: f32, g: f32, b: f32) {
        self.color4f(r, g, b, 1.0);
    }

    /// Only quads carry texcoords; other modes ignore the call.
    pub fn tex_coord2f(&mut self, u: f32, v: f32) {
        if self.mode != DrawMode::Quads {
            if !self.warned_texcoord_mode {
                log::warn!("RLGL: texcoords are only stored for quads; ignored for {:?}", self.mode);
                self.warned_texcoord_mode = true;
            }
            return;
        }
        if !self.quads.push_texcoord(u, v) {
            log::error!("RLGL: quads texcoord array full, texcoord dropped");
        }
    }

    /// Batches carry no normals; accepted for source compatibility.
    #[inline]
    pub fn normal3f(&mut self, _x: f32, _y: f32, _z: f32) {}

    /// Texture for the following quads. Opens a new draw call when the
    /// current one already has vertices.
    pub fn enable_texture(&mut self, texture: u32) {
        let texture = if texture == 0 { self.default_texture } else { texture };
        self.draws.set_texture(texture);
    }

    /// Back to the default white texture.
    pub fn disable_texture(&mut self) {
        self.draws.set_texture(self.default_texture);
    }

    /// Shader for the following quads; a null shader selects the default.
    pub fn set_shader(&mut self, shader: Shader) {
        self.current_shader = shader;
        self.draws.set_shader(shader);
    }

    /// Flushes when `n` more vertices would not fit in `mode`'s buffer.
    /// Returns `true` if a flush happened.
    pub fn check_buffer_limit(&mut self, mode: DrawMode, n: usize) -> bool {
        if self.buffer(mode).would_overflow(n) {
            self.draw();
            true
        } else {
            false
        }
    }

    pub(crate) fn push_vertex_direct(&mut self, v: Vec3) {
        let mode = self.mode;
        let buf = self.buffer_mut(mode);
        if buf.push_vertex(v) {
            if mode == DrawMode::Quads {
                self.draws.add_vertex();
            }
        } else {
            let capacity = buf.capacity();
            self.stats.dropped_vertices += 1;
            log::error!("RLGL: {mode:?} batch buffer full ({capacity} vertices), vertex dropped");
        }
    }

    /// Emits held vertices through the modelview accumulated since the
    /// buffering push.
    pub(crate) fn replay_buffered(&mut self) {
        let VertexRouting::Buffering { base_depth, .. } = self.routing else {
            return;
        };
        let local = self.matrices.local_transform(base_depth);
        for v in self.routing.drain() {
            self.push_vertex_direct(local.transform_point3(v));
        }
    }
}

#[cfg(test)]
mod tests {
    use crate::batch::DrawMode;
    use crate::context::tests::{context, small_context};
    use crate::math::Vec3;

    const RED: [u8; 4] = [255, 0, 0, 255];

    // ── padding ───────────────────────────────────────────────────────────

    #[test]
    fn end_pads_colors_and_texcoords_to_vertex_count() {
        let mut rl = context();
        rl.begin(DrawMode::Quads);
        rl.color4ub(255, 0, 0, 255);
        rl.tex_coord2f(0.0, 0.0);
        rl.vertex3f(0.0, 0.0, 0.0);
        rl.tex_coord2f(1.0, 0.0);
        rl.vertex3f(1.0, 0.0, 0.0);
        rl.vertex3f(1.0, 1.0, 0.0);
        rl.vertex3f(0.0, 1.0, 0.0);
        rl.vertex3f(2.0, 1.0, 0.0);
        rl.end();

        let q = rl.buffer(DrawMode::Quads);
        assert_eq!(q.vertex_count(), 5);
        assert_eq!(q.color_count(), 5);
        assert_eq!(q.texcoord_count(), 5);
        assert_eq!(q.color(4), Some(RED));
        assert_eq!(q.texcoord(4), Some([0.0, 0.0]));
    }

    #[test]
    fn trailing_vertices_reuse_last_color_across_primitives() {
        let mut rl = context();
        rl.begin(DrawMode::Triangles);
        rl.color4ub(1, 2, 3, 4);
        for i in 0..3 {
            rl.vertex2f(i as f32, 0.0);
        }
        rl.end();

        rl.begin(DrawMode::Triangles);
        for i in 0..3 {
            rl.vertex2f(i as f32, 1.0);
        }
        rl.end();

        let t = rl.buffer(DrawMode::Triangles);
        assert_eq!(t.color_count(), 6);
        assert_eq!(t.color(5), Some([1, 2, 3, 4]));
    }

    #[test]
    fn color4f_scales_and_truncates() {
        let mut rl = context();
        rl.begin(DrawMode::Lines);
        rl.color4f(1.0, 0.5, 0.0, 0.999);
        assert_eq!(rl.buffer(DrawMode::Lines).last_color(), Some([255, 127, 0, 254]));
    }

    #[test]
    fn texcoords_ignored_outside_quads() {
        let mut rl = context();
        rl.begin(DrawMode::Lines);
        rl.tex_coord2f(0.5, 0.5);
        assert_eq!(rl.buffer(DrawMode::Quads).texcoord_count(), 0);
    }

    // ── depth ─────────────────────────────────────────────────────────────

    #[test]
    fn each_end_nudges_depth_used_by_2d_vertices() {
        let mut rl = context();
        let step = rl.config().depth_step;
        let start = rl.current_depth();

        rl.begin(DrawMode::Lines);
        rl.vertex2f(0.0, 0.0);
        rl.vertex2f(1.0, 0.0);
        rl.end();
        rl.begin(DrawMode::Lines);
        rl.vertex2i(0, 1);
        rl.vertex2i(1, 1);
        rl.end();

        let l = rl.buffer(DrawMode::Lines);
        assert_eq!(l.vertex(0).unwrap().z, start);
        assert!((l.vertex(2).unwrap().z - (start + step)).abs() < 1e-7);
        assert!((rl.current_depth() - (start + 2.0 * step)).abs() < 1e-7);
    }

    // ── capacity ──────────────────────────────────────────────────────────

    #[test]
    fn vertices_beyond_capacity_are_dropped_one_error_each() {
        let mut rl = small_context(1);
        rl.begin(DrawMode::Quads);
        for i in 0..7 {
            rl.vertex3f(i as f32, 0.0, 0.0);
        }
        rl.end();

        let q = rl.buffer(DrawMode::Quads);
        assert_eq!(q.vertex_count(), 4);
        assert_eq!(q.color_count(), 4);
        assert_eq!(rl.stats().dropped_vertices, 3);
        assert_eq!(rl.draw_calls().total_vertices(), 4);
        // neighbours untouched
        assert!(rl.buffer(DrawMode::Lines).is_empty());
        assert!(rl.buffer(DrawMode::Triangles).is_empty());
    }

    #[test]
    fn check_buffer_limit_flushes_before_overflow() {
        let mut rl = small_context(1);
        rl.begin(DrawMode::Quads);
        for i in 0..4 {
            rl.vertex2f(i as f32, 0.0);
        }
        rl.end();

        assert!(!rl.check_buffer_limit(DrawMode::Lines, 2));
        assert!(rl.check_buffer_limit(DrawMode::Quads, 4));
        assert!(rl.buffer(DrawMode::Quads).is_empty());
        assert_eq!(rl.stats().flushes, 1);
    }

    // ── draw calls ────────────────────────────────────────────────────────

    #[test]
    fn texture_changes_split_draw_calls_in_order() {
        let (a, b) = (100, 200);
        let mut rl = context();
        rl.begin(DrawMode::Quads);

        rl.enable_texture(a);
        for _ in 0..4 {
            rl.vertex2f(0.0, 0.0);
        }
        rl.enable_texture(b);
        for _ in 0..8 {
            rl.vertex2f(0.0, 0.0);
        }
        rl.enable_texture(a);
        for _ in 0..12 {
            rl.vertex2f(0.0, 0.0);
        }
        rl.end();

        let calls = rl.draw_calls().calls();
        let textures: Vec<u32> = calls.iter().map(|c| c.texture).collect();
        let counts: Vec<usize> = calls.iter().map(|c| c.vertex_count).collect();
        assert_eq!(textures, vec![a, b, a]);
        assert_eq!(counts, vec![4, 8, 12]);
        assert_eq!(rl.draw_calls().total_vertices(), rl.buffer(DrawMode::Quads).vertex_count());
    }

    #[test]
    fn disable_texture_selects_white() {
        let mut rl = context();
        rl.enable_texture(55);
        rl.disable_texture();
        assert_eq!(rl.draw_calls().current().texture, rl.default_texture());
    }

    // ── push / pop buffering ──────────────────────────────────────────────

    #[test]
    fn transforms_after_push_apply_to_whole_primitive() {
        let mut rl = context();
        rl.push_matrix();
        rl.begin(DrawMode::Lines);
        rl.vertex3f(1.0, 0.0, 0.0);
        rl.vertex3f(2.0, 0.0, 0.0);
        // issued after the vertices, still applies to them
        rl.translatef(10.0, 0.0, 0.0);
        rl.end();
        rl.pop_matrix();

        let l = rl.buffer(DrawMode::Lines);
        assert_eq!(l.vertex_count(), 2);
        assert!((l.vertex(0).unwrap() - Vec3::new(11.0, 0.0, 0.0)).length() < 1e-5);
        assert!((l.vertex(1).unwrap() - Vec3::new(12.0, 0.0, 0.0)).length() < 1e-5);
        assert_eq!(l.color_count(), 2);
    }

    #[test]
    fn nested_push_composes_outer_local_transform() {
        let mut rl = context();
        rl.push_matrix();
        rl.translatef(10.0, 0.0, 0.0);
        rl.push_matrix();
        rl.scalef(2.0, 2.0, 2.0);
        rl.begin(DrawMode::Lines);
        rl.vertex3f(1.0, 0.0, 0.0);
        rl.vertex3f(0.0, 1.0, 0.0);
        rl.end();
        rl.pop_matrix();
        rl.pop_matrix();

        let l = rl.buffer(DrawMode::Lines);
        assert!((l.vertex(0).unwrap() - Vec3::new(12.0, 0.0, 0.0)).length() < 1e-5);
        assert!((l.vertex(1).unwrap() - Vec3::new(10.0, 2.0, 0.0)).length() < 1e-5);
    }

    #[test]
    fn quads_under_push_count_into_draw_call() {
        let mut rl = context();
        rl.push_matrix();
        rl.begin(DrawMode::Quads);
        for _ in 0..4 {
            rl.vertex2f(0.0, 0.0);
        }
        rl.end();
        rl.pop_matrix();
        assert_eq!(rl.draw_calls().current().vertex_count, 4);
    }
}
