//! GX texture formats: sizes and decoding to linear RGBA8.
//!
//! All formats store texels in tiles ("blocks") laid out row-major; the
//! texels inside a block are row-major too. CMPR blocks are 8x8 made of
//! four DXT1-like 4x4 sub-blocks.

use super::{PaletteFormat, TextureFormat};
use crate::errors::Result;
use crate::util::bits::BitField;

/// Describes properties of a GX texture format.
pub struct FormatDesc {
    pub bits_per_pixel: usize,
    pub block_width: usize,
    pub block_height: usize,
    pub requires_palette: bool,
}

impl TextureFormat {
    pub fn desc(self) -> FormatDesc {
        use super::TextureFormat as F;
        let (bits_per_pixel, block_width, block_height) = match self {
            F::I4 | F::CI4 | F::CMPR => (4, 8, 8),
            F::I8 | F::IA4 | F::CI8 => (8, 8, 4),
            F::IA8 | F::RGB565 | F::RGB5A3 | F::CI14 => (16, 4, 4),
            F::RGBA8 => (32, 4, 4),
        };
        let requires_palette = match self {
            F::CI4 | F::CI8 | F::CI14 => true,
            _ => false,
        };
        FormatDesc { bits_per_pixel, block_width, block_height, requires_palette }
    }

    /// How many bytes one image of the given size takes up in this format.
    pub fn byte_len(self, width: usize, height: usize) -> usize {
        let desc = self.desc();
        let w = round_up(width.max(1), desc.block_width);
        let h = round_up(height.max(1), desc.block_height);
        w * h * desc.bits_per_pixel / 8
    }

    /// Byte length of each level of a mipmap chain.
    pub fn level_lens(self, width: usize, height: usize, levels: usize) -> Vec<usize> {
        (0..levels)
            .map(|l| self.byte_len((width >> l).max(1), (height >> l).max(1)))
            .collect()
    }
}

fn round_up(x: usize, n: usize) -> usize {
    (x + n - 1) / n * n
}

/// Pixel data stored in R8G8B8A8 format.
pub struct RGBABuf(pub Vec<u8>);

impl RGBABuf {
    fn for_dimensions(width: usize, height: usize) -> RGBABuf {
        RGBABuf(vec![0; 4 * width * height])
    }

    fn put(&mut self, width: usize, x: usize, y: usize, pixel: [u8; 4]) {
        let i = 4 * (y * width + x);
        self.0[i..i + 4].copy_from_slice(&pixel);
    }
}

/// Decodes one image (mip level) to RGBA.
pub fn decode_image(
    format: TextureFormat,
    width: usize,
    height: usize,
    data: &[u8],
    palette: Option<(PaletteFormat, &[u8])>,
) -> Result<RGBABuf> {
    let desc = format.desc();
    let needed = format.byte_len(width, height);
    if data.len() < needed {
        bail!("image data too short: have {} bytes, need {}", data.len(), needed);
    }
    if desc.requires_palette && palette.is_none() {
        bail!("texture requires a palette");
    }

    let mut buf = RGBABuf::for_dimensions(width, height);

    use super::TextureFormat as F;
    match format {
        F::CMPR => decode_cmpr(&mut buf, width, height, data),
        F::RGBA8 => decode_rgba8(&mut buf, width, height, data),
        _ => {
            let texel = |n: usize| -> u16 {
                match desc.bits_per_pixel {
                    4 => {
                        let b = data[n / 2];
                        (if n % 2 == 0 { b >> 4 } else { b & 0xF }) as u16
                    }
                    8 => data[n] as u16,
                    _ => u16::from_be_bytes([data[2 * n], data[2 * n + 1]]),
                }
            };
            let convert = |t: u16| -> [u8; 4] {
                match format {
                    F::I4 => { let i = (t as u8) * 0x11; [i, i, i, i] }
                    F::I8 => { let i = t as u8; [i, i, i, i] }
                    F::IA4 => {
                        let i = (t as u8).bits(0, 4) * 0x11;
                        let a = (t as u8).bits(4, 8) * 0x11;
                        [i, i, i, a]
                    }
                    F::IA8 => ia8(t),
                    F::RGB565 => rgb565(t),
                    F::RGB5A3 => rgb5a3(t),
                    F::CI4 | F::CI8 | F::CI14 => {
                        let index = if format == F::CI14 { t.bits(0, 14) } else { t };
                        palette.map(|(pf, pd)| palette_color(pf, pd, index as usize))
                            .unwrap_or([0, 0, 0, 0])
                    }
                    F::RGBA8 | F::CMPR => unreachable!(),
                }
            };
            for_each_block_texel(width, height, desc.block_width, desc.block_height, |n, x, y| {
                buf.put(width, x, y, convert(texel(n)));
            });
        }
    }

    Ok(buf)
}

/// Calls `f(n, x, y)` for the `n`th texel in storage order when it lands
/// inside the image.
fn for_each_block_texel<F>(width: usize, height: usize, bw: usize, bh: usize, mut f: F)
where
    F: FnMut(usize, usize, usize),
{
    let mut n = 0;
    for by in (0..height).step_by(bh) {
        for bx in (0..width).step_by(bw) {
            for y in by..by + bh {
                for x in bx..bx + bw {
                    if x < width && y < height {
                        f(n, x, y);
                    }
                    n += 1;
                }
            }
        }
    }
}

fn decode_rgba8(buf: &mut RGBABuf, width: usize, height: usize, data: &[u8]) {
    // 4x4 blocks of 64 bytes: AR pairs for all 16 texels, then GB pairs
    let mut block = 0;
    for by in (0..height).step_by(4) {
        for bx in (0..width).step_by(4) {
            let blk = &data[64 * block..64 * block + 64];
            for i in 0..16 {
                let (x, y) = (bx + i % 4, by + i / 4);
                if x < width && y < height {
                    let a = blk[2 * i];
                    let r = blk[2 * i + 1];
                    let g = blk[32 + 2 * i];
                    let b = blk[32 + 2 * i + 1];
                    buf.put(width, x, y, [r, g, b, a]);
                }
            }
            block += 1;
        }
    }
}

fn decode_cmpr(buf: &mut RGBABuf, width: usize, height: usize, data: &[u8]) {
    let mut pos = 0;
    for by in (0..height).step_by(8) {
        for bx in (0..width).step_by(8) {
            for sub in 0..4 {
                let sx = bx + 4 * (sub % 2);
                let sy = by + 4 * (sub / 2);
                let blk = &data[pos..pos + 8];
                pos += 8;

                let c0 = u16::from_be_bytes([blk[0], blk[1]]);
                let c1 = u16::from_be_bytes([blk[2], blk[3]]);
                let palette = dxt1_palette(c0, c1);
                for row in 0..4 {
                    let bits = blk[4 + row];
                    for col in 0..4 {
                        let (x, y) = (sx + col, sy + row);
                        if x < width && y < height {
                            let idx = bits.bits(6 - 2 * col as u32, 8 - 2 * col as u32);
                            buf.put(width, x, y, palette[idx as usize]);
                        }
                    }
                }
            }
        }
    }
}

fn dxt1_palette(c0: u16, c1: u16) -> [[u8; 4]; 4] {
    let p0 = rgb565(c0);
    let p1 = rgb565(c1);
    let mix = |a: u8, b: u8, wa: u32, wb: u32| ((a as u32 * wa + b as u32 * wb) / (wa + wb)) as u8;
    if c0 > c1 {
        [
            p0,
            p1,
            [mix(p0[0], p1[0], 2, 1), mix(p0[1], p1[1], 2, 1), mix(p0[2], p1[2], 2, 1), 0xFF],
            [mix(p0[0], p1[0], 1, 2), mix(p0[1], p1[1], 1, 2), mix(p0[2], p1[2], 1, 2), 0xFF],
        ]
    } else {
        [
            p0,
            p1,
            [mix(p0[0], p1[0], 1, 1), mix(p0[1], p1[1], 1, 1), mix(p0[2], p1[2], 1, 1), 0xFF],
            [0, 0, 0, 0],
        ]
    }
}

fn palette_color(format: PaletteFormat, data: &[u8], index: usize) -> [u8; 4] {
    if 2 * index + 1 >= data.len() {
        return [0, 0, 0, 0];
    }
    let x = u16::from_be_bytes([data[2 * index], data[2 * index + 1]]);
    match format {
        PaletteFormat::IA8 => ia8(x),
        PaletteFormat::RGB565 => rgb565(x),
        PaletteFormat::RGB5A3 => rgb5a3(x),
    }
}

fn extend(x: u16, bits: u32) -> u8 {
    // replicate high bits into the low ones so max maps to 0xFF
    let x = x as u32;
    ((x << (8 - bits)) | (x >> (2 * bits - 8).min(bits))) as u8
}

fn ia8(x: u16) -> [u8; 4] {
    let a = x.bits(8, 16) as u8;
    let i = x.bits(0, 8) as u8;
    [i, i, i, a]
}

fn rgb565(x: u16) -> [u8; 4] {
    [extend(x.bits(11, 16), 5), extend(x.bits(5, 11), 6), extend(x.bits(0, 5), 5), 0xFF]
}

fn rgb5a3(x: u16) -> [u8; 4] {
    if x.bits(15, 16) == 1 {
        [extend(x.bits(10, 15), 5), extend(x.bits(5, 10), 5), extend(x.bits(0, 5), 5), 0xFF]
    } else {
        let n = |v: u16| (v as u8) * 0x11;
        let a = x.bits(12, 15) as u8;
        [n(x.bits(8, 12)), n(x.bits(4, 8)), n(x.bits(0, 4)), (a << 5) | (a << 2) | (a >> 1)]
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn sizes() {
        assert_eq!(TextureFormat::I4.byte_len(8, 8), 32);
        assert_eq!(TextureFormat::CMPR.byte_len(4, 4), 32);
        assert_eq!(TextureFormat::RGBA8.byte_len(4, 4), 64);
        assert_eq!(TextureFormat::CI8.byte_len(10, 3), 16 * 4);
        assert_eq!(TextureFormat::RGB565.level_lens(8, 8, 3), vec![128, 32, 32]);
    }

    #[test]
    fn color_expansion() {
        assert_eq!(rgb565(0xFFFF), [0xFF, 0xFF, 0xFF, 0xFF]);
        assert_eq!(rgb565(0xF800), [0xFF, 0, 0, 0xFF]);
        assert_eq!(rgb5a3(0x7FFF), [0xFF, 0xFF, 0xFF, 0xFF]);
        assert_eq!(rgb5a3(0x0F00), [0xFF, 0, 0, 0]);
        assert_eq!(rgb5a3(0x7F00), [0xFF, 0, 0, 0xFF]);
        assert_eq!(ia8(0x80FF), [0xFF, 0xFF, 0xFF, 0x80]);
    }

    #[test]
    fn i8_tiles() {
        // one 8x4 block, texel value = storage index
        let data: Vec<u8> = (0..32).collect();
        let img = decode_image(TextureFormat::I8, 8, 4, &data, None).unwrap();
        // pixel (1, 2) is the 17th texel of the block
        let i = 4 * (2 * 8 + 1);
        assert_eq!(img.0[i], 17);
    }

    #[test]
    fn palette_lookup() {
        let data = [1u8; 32];
        let palette = [0x00, 0x00, 0xF8, 0x00];
        let img = decode_image(TextureFormat::CI8, 8, 4,
            &data, Some((PaletteFormat::RGB565, &palette))).unwrap();
        assert_eq!(&img.0[0..4], &[0xFF, 0, 0, 0xFF]);
        assert!(decode_image(TextureFormat::CI8, 8, 4, &data, None).is_err());
    }

    #[test]
    fn short_data_fails() {
        assert!(decode_image(TextureFormat::RGBA8, 4, 4, &[0; 63], None).is_err());
    }
}
