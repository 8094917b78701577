/// Levels in a full mip chain down to 1×1, base level included.
#[inline]
pub fn mip_level_count(width: u32, height: u32) -> u32 {
    32 - width.max(height).max(1).leading_zeros()
}

/// 2×2 box filter over an RGBA8 image. Odd edges reuse the last texel.
fn halve(src: &[u8], width: u32, height: u32) -> (Vec<u8>, u32, u32) {
    let (nw, nh) = ((width / 2).max(1), (height / 2).max(1));
    let mut out = vec![0u8; (nw * nh * 4) as usize];
    let texel = |x: u32, y: u32, c: u32| src[((y * width + x) * 4 + c) as usize] as u32;

    for y in 0..nh {
        for x in 0..nw {
            let (x0, y0) = (x * 2, y * 2);
            let (x1, y1) = ((x0 + 1).min(width - 1), (y0 + 1).min(height - 1));
            for c in 0..4 {
                let sum = texel(x0, y0, c) + texel(x1, y0, c) + texel(x0, y1, c) + texel(x1, y1, c);
                out[((y * nw + x) * 4 + c) as usize] = (sum / 4) as u8;
            }
        }
    }
    (out, nw, nh)
}

/// Levels 1.. of the chain for an RGBA8 `base`, as `(width, height, texels)`.
///
/// Empty when `base` does not hold `width * height` texels.
pub fn mip_chain(base: &[u8], width: u32, height: u32) -> Vec<(u32, u32, Vec<u8>)> {
    if width == 0 || height == 0 || base.len() != (width * height * 4) as usize {
        return Vec::new();
    }

    let mut levels = Vec::new();
    let (mut w, mut h) = (width, height);
    let mut current = base.to_vec();
    while w > 1 || h > 1 {
        let (next, nw, nh) = halve(&current, w, h);
        levels.push((nw, nh, next.clone()));
        current = next;
        w = nw;
        h = nh;
    }
    levels
}
