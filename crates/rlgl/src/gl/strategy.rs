use crate::caps::{Capabilities, GlProfile};

/// How vertex data reaches the driver. Chosen once from the probed
/// capabilities; the backend never switches at runtime.
#[derive(Debug, Copy, Clone, Eq, PartialEq)]
pub enum Strategy {
    /// OpenGL 1.1: client-side arrays and `glVertexPointer`, fixed-function
    /// matrices, no buffer objects.
    ClientArrays,
    /// Buffer objects without VAOs: attributes are re-bound before every
    /// draw (ES2 without `OES_vertex_array_object`).
    AttribBinding,
    /// Buffer objects recorded in a VAO at creation.
    VertexArrayObjects,
}

impl Strategy {
    pub fn select(caps: &Capabilities) -> Self {
        match caps.profile {
            GlProfile::FixedFunction => Strategy::ClientArrays,
            _ if caps.vao => Strategy::VertexArrayObjects,
            _ => Strategy::AttribBinding,
        }
    }

    pub fn description(self) -> &'static str {
        match self {
            Strategy::ClientArrays => "client-side vertex arrays (fixed function)",
            Strategy::AttribBinding => "buffer objects, attributes bound per draw",
            Strategy::VertexArrayObjects => "buffer objects in vertex array objects",
        }
    }

    #[inline]
    pub fn uses_buffers(self) -> bool {
        self != Strategy::ClientArrays
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn selection_follows_profile_and_vao_flag() {
        assert_eq!(
            Strategy::select(&Capabilities::baseline(GlProfile::FixedFunction)),
            Strategy::ClientArrays
        );
        assert_eq!(
            Strategy::select(&Capabilities::baseline(GlProfile::CoreProfile)),
            Strategy::VertexArrayObjects
        );
        assert_eq!(Strategy::select(&Capabilities::baseline(GlProfile::Es2)), Strategy::AttribBinding);

        let es2_vao = Capabilities::probe("OpenGL ES 2.0", &["GL_OES_vertex_array_object"], 0.0);
        assert_eq!(Strategy::select(&es2_vao), Strategy::VertexArrayObjects);
    }

    #[test]
    fn only_client_arrays_skip_buffers() {
        assert!(!Strategy::ClientArrays.uses_buffers());
        assert!(Strategy::AttribBinding.uses_buffers());
    }
}
