use crate::backend::{FilterMode, GpuBackend, TextureDesc, TextureParam, TextureWrap};
use crate::caps::{Capabilities, GlProfile};
use crate::context::Rlgl;

use super::mipmap::mip_chain;

/// Pixel layouts a texture can be created from.
///
/// Compressed formats are stored in 4×4 blocks; whether they can be used
/// depends on the probed capabilities.
#[derive(Debug, Copy, Clone, Eq, PartialEq, Hash)]
pub enum PixelFormat {
    Grayscale,
    GrayAlpha,
    R5G6B5,
    R8G8B8,
    R5G5B5A1,
    R4G4B4A4,
    R8G8B8A8,
    Dxt1Rgb,
    Dxt1Rgba,
    Dxt3Rgba,
    Dxt5Rgba,
    Etc1Rgb,
    Etc2Rgb,
    Etc2EacRgba,
    PvrtRgb,
    PvrtRgba,
    Astc4x4Rgba,
    Astc8x8Rgba,
}

impl PixelFormat {
    /// Bytes per pixel of an uncompressed format.
    pub fn bytes_per_pixel(self) -> Option<usize> {
        use PixelFormat::*;
        match self {
            Grayscale => Some(1),
            GrayAlpha | R5G6B5 | R5G5B5A1 | R4G4B4A4 => Some(2),
            R8G8B8 => Some(3),
            R8G8B8A8 => Some(4),
            _ => None,
        }
    }

    /// Bytes per 4×4 block of a compressed format.
    ///
    /// ASTC 8×8 is 2 bpp, which spreads to 4 bytes per 4×4 area.
    pub fn block_size(self) -> Option<usize> {
        use PixelFormat::*;
        match self {
            Dxt1Rgb | Dxt1Rgba | Etc1Rgb | Etc2Rgb | PvrtRgb | PvrtRgba => Some(8),
            Dxt3Rgba | Dxt5Rgba | Etc2EacRgba | Astc4x4Rgba => Some(16),
            Astc8x8Rgba => Some(4),
            _ => None,
        }
    }

    #[inline]
    pub fn is_compressed(self) -> bool {
        self.block_size().is_some()
    }

    /// Size in bytes of one `width`×`height` mip level.
    pub fn level_size(self, width: u32, height: u32) -> usize {
        let (w, h) = (width as usize, height as usize);
        match (self.bytes_per_pixel(), self.block_size()) {
            (Some(bpp), _) => w * h * bpp,
            (_, Some(block)) => w.div_ceil(4) * h.div_ceil(4) * block,
            _ => 0,
        }
    }

    pub fn is_supported(self, caps: &Capabilities) -> bool {
        use PixelFormat::*;
        match self {
            Dxt1Rgb | Dxt1Rgba | Dxt3Rgba | Dxt5Rgba => caps.dxt,
            Etc1Rgb => caps.etc1,
            Etc2Rgb | Etc2EacRgba => caps.etc2,
            PvrtRgb | PvrtRgba => caps.pvrt,
            Astc4x4Rgba | Astc8x8Rgba => caps.astc,
            _ => true,
        }
    }
}

/// Sampling presets.
#[derive(Debug, Copy, Clone, PartialEq)]
pub enum TextureFilter {
    Point,
    Bilinear,
    Trilinear,
    /// Level is clamped to the probed maximum.
    Anisotropic(f32),
}

/// Splits `data` into consecutive mip levels, halving down to 1×1.
///
/// Stops early when `data` runs out; returns the slices found.
fn split_levels(data: &[u8], width: u32, height: u32, format: PixelFormat, mipmaps: u32) -> Vec<&[u8]> {
    let mut levels = Vec::with_capacity(mipmaps as usize);
    let (mut w, mut h) = (width, height);
    let mut offset = 0;
    for _ in 0..mipmaps.max(1) {
        let size = format.level_size(w, h);
        let Some(level) = data.get(offset..offset + size) else {
            break;
        };
        levels.push(level);
        offset += size;
        w = (w / 2).max(1);
        h = (h / 2).max(1);
    }
    levels
}

impl<B: GpuBackend> Rlgl<B> {
    /// Uploads pixel data as a new texture.
    ///
    /// `data` holds `mipmaps` levels back to back. Empty `data` allocates
    /// an uninitialized base level. Returns `0` if the format is not
    /// supported or the upload fails.
    pub fn load_texture(&mut self, data: &[u8], width: u32, height: u32, format: PixelFormat, mipmaps: u32) -> u32 {
        if width == 0 || height == 0 {
            log::warn!("TEXTURE: refusing {width}x{height} texture");
            return 0;
        }
        if !format.is_supported(&self.caps) {
            log::warn!("TEXTURE: {format:?} compressed texture format not supported");
            return 0;
        }
        if !self.caps.npot && !(width.is_power_of_two() && height.is_power_of_two()) {
            log::warn!("TEXTURE: NPOT texture {width}x{height} on a driver without NPOT support");
        }

        let levels = if data.is_empty() {
            Vec::new()
        } else {
            let levels = split_levels(data, width, height, format, mipmaps);
            if levels.is_empty() {
                log::warn!(
                    "TEXTURE: {} bytes do not cover a {width}x{height} {format:?} base level",
                    data.len()
                );
                return 0;
            }
            if levels.len() < mipmaps as usize {
                log::warn!("TEXTURE: data ends after {} of {mipmaps} mip levels", levels.len());
            }
            levels
        };

        let desc = TextureDesc { width, height, format };
        let id = match self.backend.create_texture(&desc, &levels) {
            Ok(id) => id,
            Err(e) => {
                log::warn!("TEXTURE: failed to create {width}x{height} {format:?} texture: {e}");
                return 0;
            }
        };

        let mipmapped = levels.len() > 1;
        self.backend.set_texture_param(id, TextureParam::WrapS(TextureWrap::Repeat));
        self.backend.set_texture_param(id, TextureParam::WrapT(TextureWrap::Repeat));
        if mipmapped {
            self.backend.set_texture_param(id, TextureParam::MagFilter(FilterMode::Linear));
            self.backend.set_texture_param(id, TextureParam::MinFilter(FilterMode::LinearMipmapLinear));
        } else {
            self.backend.set_texture_param(id, TextureParam::MagFilter(FilterMode::Nearest));
            self.backend.set_texture_param(id, TextureParam::MinFilter(FilterMode::Nearest));
        }

        log::info!(
            "TEXTURE: [ID {id}] texture loaded ({width}x{height}, {format:?}, {} mipmaps)",
            levels.len().max(1)
        );
        id
    }

    /// Null-safe.
    pub fn delete_texture(&mut self, id: u32) {
        if id == 0 {
            return;
        }
        self.backend.delete_texture(id);
        log::info!("TEXTURE: [ID {id}] unloaded");
    }

    /// Builds the mip chain of an RGBA texture. Returns the number of levels
    /// in the texture afterwards (`1` if nothing was generated).
    pub fn generate_mipmaps(&mut self, id: u32, width: u32, height: u32) -> u32 {
        if id == 0 {
            return 0;
        }
        let pot = width.is_power_of_two() && height.is_power_of_two();
        if !pot && !self.caps.npot {
            log::warn!("TEXTURE: [ID {id}] NPOT {width}x{height} texture, mipmaps not generated");
            return 1;
        }

        if self.caps.profile == GlProfile::FixedFunction {
            return self.generate_mipmaps_cpu(id, width, height);
        }

        match self.backend.generate_mipmaps(id) {
            Ok(()) => {
                self.backend.set_texture_param(id, TextureParam::MinFilter(FilterMode::LinearMipmapLinear));
                let levels = super::mip_level_count(width, height);
                log::info!("TEXTURE: [ID {id}] mipmaps generated ({levels} levels)");
                levels
            }
            Err(e) => {
                log::warn!("TEXTURE: [ID {id}] mipmap generation failed: {e}");
                1
            }
        }
    }

    fn generate_mipmaps_cpu(&mut self, id: u32, width: u32, height: u32) -> u32 {
        let base = match self.backend.read_texture_rgba(id, width, height) {
            Ok(base) => base,
            Err(e) => {
                log::warn!("TEXTURE: [ID {id}] cannot read back base level for mipmaps: {e}");
                return 1;
            }
        };
        let chain = mip_chain(&base, width, height);
        for (level, (w, h, texels)) in chain.iter().enumerate() {
            self.backend.upload_texture_level(id, level as u32 + 1, *w, *h, texels);
        }
        self.backend.set_texture_param(id, TextureParam::MinFilter(FilterMode::LinearMipmapLinear));
        let levels = chain.len() as u32 + 1;
        log::info!("TEXTURE: [ID {id}] mipmaps generated on CPU ({levels} levels)");
        levels
    }

    /// Applies `wrap` on both axes. Mirror-clamp without driver support is
    /// skipped.
    pub fn set_texture_wrap(&mut self, id: u32, wrap: TextureWrap) {
        if wrap == TextureWrap::MirrorClamp && !self.caps.mirror_clamp {
            log::warn!("TEXTURE: [ID {id}] mirror-clamp wrap not supported");
            return;
        }
        self.backend.set_texture_param(id, TextureParam::WrapS(wrap));
        self.backend.set_texture_param(id, TextureParam::WrapT(wrap));
    }

    /// `mipmapped` selects the mipmap-aware minification filter.
    pub fn set_texture_filter(&mut self, id: u32, filter: TextureFilter, mipmapped: bool) {
        let (min, mag) = match filter {
            TextureFilter::Point if mipmapped => (FilterMode::NearestMipmapNearest, FilterMode::Nearest),
            TextureFilter::Point => (FilterMode::Nearest, FilterMode::Nearest),
            TextureFilter::Bilinear if mipmapped => (FilterMode::LinearMipmapNearest, FilterMode::Linear),
            TextureFilter::Bilinear => (FilterMode::Linear, FilterMode::Linear),
            TextureFilter::Trilinear | TextureFilter::Anisotropic(_) if mipmapped => {
                (FilterMode::LinearMipmapLinear, FilterMode::Linear)
            }
            TextureFilter::Trilinear | TextureFilter::Anisotropic(_) => {
                if filter == TextureFilter::Trilinear {
                    log::warn!("TEXTURE: [ID {id}] trilinear filter needs mipmaps, using bilinear");
                }
                (FilterMode::Linear, FilterMode::Linear)
            }
        };
        self.backend.set_texture_param(id, TextureParam::MinFilter(min));
        self.backend.set_texture_param(id, TextureParam::MagFilter(mag));

        if let TextureFilter::Anisotropic(level) = filter {
            if !self.caps.anisotropic {
                log::warn!("TEXTURE: [ID {id}] anisotropic filtering not supported");
            } else if level > self.caps.max_anisotropy {
                log::warn!(
                    "TEXTURE: [ID {id}] anisotropy {level} clamped to {}",
                    self.caps.max_anisotropy
                );
                self.backend
                    .set_texture_param(id, TextureParam::Anisotropy(self.caps.max_anisotropy));
            } else {
                self.backend.set_texture_param(id, TextureParam::Anisotropy(level));
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::backend::recording::{Command, RecordingBackend};
    use crate::config::RlglConfig;
    use crate::context::tests::context;

    fn context_with(caps: Capabilities) -> Rlgl<RecordingBackend> {
        Rlgl::new(RecordingBackend::new(caps), RlglConfig::default()).unwrap()
    }

    fn created_textures(rl: &Rlgl<RecordingBackend>) -> usize {
        rl.backend()
            .commands()
            .iter()
            .filter(|c| matches!(c, Command::CreateTexture { .. }))
            .count()
    }

    // ── sizes ─────────────────────────────────────────────────────────────

    #[test]
    fn level_sizes() {
        assert_eq!(PixelFormat::R8G8B8A8.level_size(4, 2), 32);
        assert_eq!(PixelFormat::R5G6B5.level_size(3, 3), 18);
        assert_eq!(PixelFormat::Dxt1Rgb.level_size(4, 4), 8);
        assert_eq!(PixelFormat::Dxt5Rgba.level_size(5, 5), 64);
        assert_eq!(PixelFormat::Dxt1Rgba.level_size(1, 1), 8);
        assert_eq!(PixelFormat::Astc8x8Rgba.level_size(8, 8), 16);
    }

    #[test]
    fn split_levels_walks_block_chain() {
        // 8x8 DXT1: 32 + 8 + 8 + 8 bytes
        let data = vec![0u8; 56];
        let levels = split_levels(&data, 8, 8, PixelFormat::Dxt1Rgb, 4);
        let sizes: Vec<usize> = levels.iter().map(|l| l.len()).collect();
        assert_eq!(sizes, vec![32, 8, 8, 8]);
    }

    #[test]
    fn split_levels_stops_when_data_runs_out() {
        let data = vec![0u8; 4 * 4 * 4 + 10];
        let levels = split_levels(&data, 4, 4, PixelFormat::R8G8B8A8, 3);
        assert_eq!(levels.len(), 1);
    }

    // ── loading ───────────────────────────────────────────────────────────

    #[test]
    fn unsupported_compressed_format_returns_null_without_gpu_work() {
        let mut caps = Capabilities::all(GlProfile::CoreProfile);
        caps.etc2 = false;
        let mut rl = context_with(caps);
        let before = rl.backend().live_textures();
        rl.backend_mut().clear_commands();

        let id = rl.load_texture(&[0u8; 8], 4, 4, PixelFormat::Etc2Rgb, 1);

        assert_eq!(id, 0);
        assert_eq!(created_textures(&rl), 0);
        assert_eq!(rl.backend().live_textures(), before);
    }

    #[test]
    fn supported_compressed_format_uploads_all_levels() {
        let mut rl = context();
        rl.backend_mut().clear_commands();
        let id = rl.load_texture(&[0u8; 56], 8, 8, PixelFormat::Dxt1Rgb, 4);

        assert_ne!(id, 0);
        assert!(rl.backend().commands().iter().any(|c| matches!(
            c,
            Command::CreateTexture { id: i, levels: 4, .. } if *i == id
        )));
        assert!(rl.backend().commands().contains(&Command::TextureParam {
            texture: id,
            param: TextureParam::MinFilter(FilterMode::LinearMipmapLinear),
        }));
    }

    #[test]
    fn short_data_is_rejected() {
        let mut rl = context();
        assert_eq!(rl.load_texture(&[0u8; 10], 4, 4, PixelFormat::R8G8B8A8, 1), 0);
    }

    #[test]
    fn delete_texture_is_null_safe() {
        let mut rl = context();
        rl.backend_mut().clear_commands();
        rl.delete_texture(0);
        assert!(rl.backend().commands().is_empty());

        let id = rl.load_texture(&[255u8; 16], 2, 2, PixelFormat::R8G8B8A8, 1);
        rl.delete_texture(id);
        assert!(!rl.backend().is_live_texture(id));
    }

    // ── mipmaps ───────────────────────────────────────────────────────────

    #[test]
    fn npot_mipmaps_refused_without_capability() {
        let mut caps = Capabilities::all(GlProfile::Es2);
        caps.npot = false;
        let mut rl = context_with(caps);
        let id = rl.load_texture(&[0u8; 3 * 5 * 4], 3, 5, PixelFormat::R8G8B8A8, 1);
        rl.backend_mut().clear_commands();

        assert_eq!(rl.generate_mipmaps(id, 3, 5), 1);
        assert!(!rl
            .backend()
            .commands()
            .iter()
            .any(|c| matches!(c, Command::GenerateMipmaps(_))));
    }

    #[test]
    fn gpu_mipmaps_report_full_chain() {
        let mut rl = context();
        let id = rl.load_texture(&[0u8; 16 * 16 * 4], 16, 16, PixelFormat::R8G8B8A8, 1);
        assert_eq!(rl.generate_mipmaps(id, 16, 16), 5);
        assert!(rl.backend().commands().contains(&Command::GenerateMipmaps(id)));
    }

    #[test]
    fn fixed_function_mipmaps_are_built_on_cpu() {
        let mut rl = context_with(Capabilities::all(GlProfile::FixedFunction));
        let id = rl.load_texture(&[128u8; 4 * 4 * 4], 4, 4, PixelFormat::R8G8B8A8, 1);
        rl.backend_mut().clear_commands();

        assert_eq!(rl.generate_mipmaps(id, 4, 4), 3);
        let uploads: Vec<(u32, u32)> = rl
            .backend()
            .commands()
            .iter()
            .filter_map(|c| match c {
                Command::UploadTextureLevel { level, width, .. } => Some((*level, *width)),
                _ => None,
            })
            .collect();
        assert_eq!(uploads, vec![(1, 2), (2, 1)]);
    }

    // ── parameters ────────────────────────────────────────────────────────

    #[test]
    fn mirror_clamp_skipped_without_capability() {
        let mut caps = Capabilities::all(GlProfile::CoreProfile);
        caps.mirror_clamp = false;
        let mut rl = context_with(caps);
        rl.backend_mut().clear_commands();
        rl.set_texture_wrap(5, TextureWrap::MirrorClamp);
        assert!(rl.backend().commands().is_empty());

        rl.set_texture_wrap(5, TextureWrap::MirrorRepeat);
        assert_eq!(rl.backend().commands().len(), 2);
    }

    #[test]
    fn anisotropy_is_clamped_to_probed_maximum() {
        let mut rl = context();
        let max = rl.capabilities().max_anisotropy;
        rl.backend_mut().clear_commands();
        rl.set_texture_filter(5, TextureFilter::Anisotropic(max * 4.0), true);
        assert!(rl.backend().commands().contains(&Command::TextureParam {
            texture: 5,
            param: TextureParam::Anisotropy(max),
        }));
    }

    #[test]
    fn anisotropy_skipped_without_extension() {
        let mut caps = Capabilities::all(GlProfile::CoreProfile);
        caps.anisotropic = false;
        let mut rl = context_with(caps);
        rl.backend_mut().clear_commands();
        rl.set_texture_filter(5, TextureFilter::Anisotropic(4.0), true);
        assert!(!rl
            .backend()
            .commands()
            .iter()
            .any(|c| matches!(c, Command::TextureParam { param: TextureParam::Anisotropy(_), .. })));
    }
}
