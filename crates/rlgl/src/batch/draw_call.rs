use crate::resources::Shader;

/// A contiguous run of quads vertices sharing one texture and one shader.
///
/// A null shader means the context's default shader at flush time.
#[derive(Debug, Copy, Clone, Eq, PartialEq)]
pub struct DrawCall {
    pub vertex_count: usize,
    pub texture: u32,
    pub shader: Shader,
}

impl DrawCall {
    /// Indices consumed by this call (two triangles per quad).
    #[inline]
    pub fn index_count(&self) -> usize {
        self.vertex_count / 4 * 6
    }
}

/// Ordered draw calls for the quads buffer.
///
/// Always holds at least one record; the last one is current. A new record
/// is opened only when the texture or shader changes after the current one
/// received vertices, so records stay homogeneous without sorting.
#[derive(Debug)]
pub struct DrawCallTracker {
    calls: Vec<DrawCall>,
}

impl DrawCallTracker {
    pub fn new(default_texture: u32) -> Self {
        Self {
            calls: vec![DrawCall {
                vertex_count: 0,
                texture: default_texture,
                shader: Shader::null(),
            }],
        }
    }

    #[inline]
    pub fn calls(&self) -> &[DrawCall] {
        &self.calls
    }

    #[inline]
    pub fn current(&self) -> &DrawCall {
        // Never empty: `new` and `reset` both leave one record.
        &self.calls[self.calls.len() - 1]
    }

    #[inline]
    fn current_mut(&mut self) -> &mut DrawCall {
        let last = self.calls.len() - 1;
        &mut self.calls[last]
    }

    /// Selects `texture` for the following quads vertices.
    pub fn set_texture(&mut self, texture: u32) {
        let cur = *self.current();
        if cur.texture == texture {
            return;
        }
        if cur.vertex_count > 0 {
            self.calls.push(DrawCall {
                vertex_count: 0,
                texture,
                shader: cur.shader,
            });
        } else {
            self.current_mut().texture = texture;
        }
    }

    /// Selects `shader` for the following quads vertices.
    pub fn set_shader(&mut self, shader: Shader) {
        let cur = *self.current();
        if cur.shader.id == shader.id {
            return;
        }
        if cur.vertex_count > 0 {
            self.calls.push(DrawCall {
                vertex_count: 0,
                texture: cur.texture,
                shader,
            });
        } else {
            self.current_mut().shader = shader;
        }
    }

    #[inline]
    pub fn add_vertex(&mut self) {
        self.current_mut().vertex_count += 1;
    }

    /// Sum over all records; equals the quads buffer's vertex count.
    pub fn total_vertices(&self) -> usize {
        self.calls.iter().map(|c| c.vertex_count).sum()
    }

    /// Back to a single empty record on `default_texture`, keeping `shader`.
    pub fn reset(&mut self, default_texture: u32, shader: Shader) {
        self.calls.clear();
        self.calls.push(DrawCall {
            vertex_count: 0,
            texture: default_texture,
            shader,
        });
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::resources::ShaderLocations;

    const WHITE: u32 = 1;

    fn shader(id: u32) -> Shader {
        Shader {
            id,
            locs: ShaderLocations::ABSENT,
        }
    }

    fn add(t: &mut DrawCallTracker, n: usize) {
        for _ in 0..n {
            t.add_vertex();
        }
    }

    #[test]
    fn texture_change_on_empty_record_retargets_it() {
        let mut t = DrawCallTracker::new(WHITE);
        t.set_texture(7);
        assert_eq!(t.calls().len(), 1);
        assert_eq!(t.current().texture, 7);
    }

    #[test]
    fn same_texture_does_not_split() {
        let mut t = DrawCallTracker::new(WHITE);
        t.set_texture(7);
        add(&mut t, 4);
        t.set_texture(7);
        add(&mut t, 4);
        assert_eq!(t.calls().len(), 1);
        assert_eq!(t.current().vertex_count, 8);
    }

    #[test]
    fn shader_change_splits_like_texture_change() {
        let mut t = DrawCallTracker::new(WHITE);
        add(&mut t, 4);
        t.set_shader(shader(9));
        add(&mut t, 4);
        let calls = t.calls();
        assert_eq!(calls.len(), 2);
        assert_eq!((calls[0].shader.id, calls[1].shader.id), (0, 9));
        assert_eq!(calls[1].texture, WHITE);
    }

    #[test]
    fn index_count_rounds_down_to_whole_quads() {
        let call = DrawCall {
            vertex_count: 10,
            texture: WHITE,
            shader: Shader::null(),
        };
        assert_eq!(call.index_count(), 12);
    }

    #[test]
    fn reset_leaves_one_empty_default_record() {
        let mut t = DrawCallTracker::new(WHITE);
        t.set_texture(3);
        add(&mut t, 4);
        t.set_texture(4);
        add(&mut t, 4);
        t.reset(WHITE, Shader::null());
        assert_eq!(
            t.calls(),
            &[DrawCall {
                vertex_count: 0,
                texture: WHITE,
                shader: Shader::null()
            }]
        );
    }
}
