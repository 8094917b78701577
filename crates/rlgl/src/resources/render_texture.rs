use crate::backend::{FilterMode, FramebufferStatus, GpuBackend, TextureDesc, TextureParam, TextureWrap};
use crate::context::Rlgl;

use super::PixelFormat;

/// Framebuffer with an RGBA colour texture and a depth renderbuffer.
#[derive(Debug, Copy, Clone, Default, Eq, PartialEq)]
pub struct RenderTexture {
    pub id: u32,
    pub texture: u32,
    pub depth: u32,
    pub width: u32,
    pub height: u32,
}

impl RenderTexture {
    #[inline]
    pub fn is_null(&self) -> bool {
        self.id == 0
    }
}

impl<B: GpuBackend> Rlgl<B> {
    /// Creates a render target. Anything created before a failure is
    /// deleted again; the result is then null.
    pub fn load_render_texture(&mut self, width: u32, height: u32) -> RenderTexture {
        if !self.caps.profile.has_shaders() {
            log::warn!("FBO: render textures not available on {}", self.caps.profile);
            return RenderTexture::default();
        }

        let desc = TextureDesc {
            width,
            height,
            format: PixelFormat::R8G8B8A8,
        };
        let texture = match self.backend.create_texture(&desc, &[]) {
            Ok(id) => id,
            Err(e) => {
                log::warn!("FBO: colour texture creation failed: {e}");
                return RenderTexture::default();
            }
        };
        for param in [
            TextureParam::WrapS(TextureWrap::Clamp),
            TextureParam::WrapT(TextureWrap::Clamp),
            TextureParam::MinFilter(FilterMode::Linear),
            TextureParam::MagFilter(FilterMode::Linear),
        ] {
            self.backend.set_texture_param(texture, param);
        }

        let depth = match self.backend.create_depth_renderbuffer(width, height) {
            Ok(id) => id,
            Err(e) => {
                log::warn!("FBO: depth renderbuffer creation failed: {e}");
                self.backend.delete_texture(texture);
                return RenderTexture::default();
            }
        };

        let id = match self.backend.create_framebuffer() {
            Ok(id) => id,
            Err(e) => {
                log::warn!("FBO: framebuffer creation failed: {e}");
                self.backend.delete_renderbuffer(depth);
                self.backend.delete_texture(texture);
                return RenderTexture::default();
            }
        };

        self.backend.bind_framebuffer(id);
        self.backend.attach_color_texture(id, texture);
        self.backend.attach_depth_renderbuffer(id, depth);
        let status = self.backend.framebuffer_status(id);
        self.backend.bind_framebuffer(0);

        if let FramebufferStatus::Incomplete(reason) = status {
            log::warn!("FBO: [ID {id}] framebuffer incomplete: {reason}");
            self.backend.delete_framebuffer(id);
            self.backend.delete_renderbuffer(depth);
            self.backend.delete_texture(texture);
            return RenderTexture::default();
        }

        log::info!("FBO: [ID {id}] render texture created ({width}x{height}, texture {texture}, depth {depth})");
        RenderTexture {
            id,
            texture,
            depth,
            width,
            height,
        }
    }

    /// Null-safe.
    pub fn unload_render_texture(&mut self, target: RenderTexture) {
        if target.is_null() {
            return;
        }
        if self.render_target.is_some_and(|t| t.id == target.id) {
            self.disable_render_texture();
        }
        self.backend.delete_framebuffer(target.id);
        self.backend.delete_renderbuffer(target.depth);
        self.backend.delete_texture(target.texture);
        log::info!("FBO: [ID {}] unloaded", target.id);
    }

    /// Directs the following flushes into `target`. Pending batch data is
    /// flushed to the previous target first.
    pub fn enable_render_texture(&mut self, target: RenderTexture) {
        if target.is_null() {
            log::warn!("FBO: cannot render into a null render texture");
            return;
        }
        self.draw();
        self.backend.bind_framebuffer(target.id);
        self.backend.viewport(0, 0, target.width as i32, target.height as i32);
        self.render_target = Some(target);
    }

    /// Back to the default framebuffer and the screen viewport.
    pub fn disable_render_texture(&mut self) {
        if self.render_target.take().is_none() {
            return;
        }
        self.draw();
        self.backend.bind_framebuffer(0);
        self.backend
            .viewport(0, 0, self.screen_width as i32, self.screen_height as i32);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::backend::recording::Command;
    use crate::batch::DrawMode;
    use crate::context::tests::context;

    #[test]
    fn complete_framebuffer_yields_all_handles() {
        let mut rl = context();
        let target = rl.load_render_texture(320, 240);
        assert!(!target.is_null());
        assert_ne!(target.texture, 0);
        assert_ne!(target.depth, 0);
        assert_eq!((target.width, target.height), (320, 240));
        assert_eq!(rl.backend().commands().last(), Some(&Command::BindFramebuffer(0)));
    }

    #[test]
    fn incomplete_framebuffer_frees_everything() {
        let mut rl = context();
        rl.backend_mut().set_incomplete_framebuffers(true);
        let textures = rl.backend().live_textures();

        let target = rl.load_render_texture(320, 240);

        assert!(target.is_null());
        assert_eq!(target, RenderTexture::default());
        assert_eq!(rl.backend().live_textures(), textures);
        assert_eq!(rl.backend().live_framebuffers(), 0);
        assert_eq!(rl.backend().live_renderbuffers(), 0);
    }

    #[test]
    fn unload_is_null_safe() {
        let mut rl = context();
        rl.backend_mut().clear_commands();
        rl.unload_render_texture(RenderTexture::default());
        assert!(rl.backend().commands().is_empty());

        let target = rl.load_render_texture(64, 64);
        rl.unload_render_texture(target);
        assert_eq!(rl.backend().live_framebuffers(), 0);
        assert!(!rl.backend().is_live_texture(target.texture));
    }

    #[test]
    fn switching_targets_flushes_pending_batch() {
        let mut rl = context();
        rl.init_graphics_device(800, 600);
        let target = rl.load_render_texture(64, 64);

        rl.begin(DrawMode::Lines);
        rl.vertex2f(0.0, 0.0);
        rl.vertex2f(1.0, 1.0);
        rl.end();
        rl.backend_mut().clear_commands();
        rl.enable_render_texture(target);

        let cmds = rl.backend().commands();
        let draw = cmds.iter().position(|c| matches!(c, Command::Draw { .. })).unwrap();
        let bind = cmds
            .iter()
            .position(|c| *c == Command::BindFramebuffer(target.id))
            .unwrap();
        assert!(draw < bind);
        assert!(cmds.contains(&Command::Viewport { x: 0, y: 0, width: 64, height: 64 }));

        rl.backend_mut().clear_commands();
        rl.disable_render_texture();
        assert!(rl.backend().commands().contains(&Command::BindFramebuffer(0)));
        assert!(rl.backend().commands().contains(&Command::Viewport { x: 0, y: 0, width: 800, height: 600 }));
    }
}
