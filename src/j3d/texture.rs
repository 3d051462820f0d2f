//! Textures and their BTI record, shared by TEX1 and `.bti` files.
//!
//! Palettes and image data are reference-counted: textures read from a
//! file that share data on disk share it in memory, and shared data is
//! written once.

use crate::binary::fixed::{Lod, LodBias};
use crate::binary::pool::{OffsetPacker, OffsetUnpacker};
use crate::binary::{Cur, FixedSize, Out, Padding};
use crate::errors::Result;
use crate::gx::texture::{decode_image, RGBABuf};
use crate::gx::{AnisotropyMax, FilterMode, PaletteFormat, TextureFormat, WrapMode};
use std::rc::Rc;

record! {
    pub struct BtiRecord {
        image_format: TextureFormat,
        alpha_setting: u8,
        width: u16,
        height: u16,
        wrap_s: WrapMode,
        wrap_t: WrapMode,
        use_palette: u8,
        palette_format: PaletteFormat,
        palette_entry_count: u16,
        palette_offset: u32,
        use_mipmapping: bool,
        edge_lod: bool,
        bias_clamp: bool,
        max_anisotropy: AnisotropyMax,
        minification_filter: FilterMode,
        magnification_filter: FilterMode,
        minimum_lod: Lod,
        maximum_lod: Lod,
        level_count: u8,
        unknown0: u8,
        lod_bias: LodBias,
        image_offset: u32,
    }
}

/// Raw palette entries (two bytes each).
#[derive(Clone, Debug, PartialEq, Eq, Hash)]
pub struct Palette(pub Vec<u8>);

impl Palette {
    pub fn entry_count(&self) -> usize {
        self.0.len() / 2
    }
}

/// Raw image data for each mipmap level, largest first.
#[derive(Clone, Debug, PartialEq, Eq, Hash)]
pub struct Images(pub Vec<Vec<u8>>);

#[derive(Clone, Debug, PartialEq)]
pub struct Texture {
    pub name: String,
    pub image_format: TextureFormat,
    pub alpha_setting: u8,
    pub width: u16,
    pub height: u16,
    pub wrap_s: WrapMode,
    pub wrap_t: WrapMode,
    pub palette_format: PaletteFormat,
    pub palette: Option<Rc<Palette>>,
    pub use_mipmapping: bool,
    pub edge_lod: bool,
    pub bias_clamp: bool,
    pub max_anisotropy: AnisotropyMax,
    pub minification_filter: FilterMode,
    pub magnification_filter: FilterMode,
    pub minimum_lod: f32,
    pub maximum_lod: f32,
    pub lod_bias: f32,
    pub unknown0: u8,
    pub images: Rc<Images>,
}

impl Texture {
    pub fn level_count(&self) -> usize {
        self.images.0.len()
    }

    /// Size of mipmap level `level`.
    pub fn level_size(&self, level: usize) -> (usize, usize) {
        ((self.width as usize >> level).max(1), (self.height as usize >> level).max(1))
    }

    pub fn decode_level(&self, level: usize) -> Result<RGBABuf> {
        let (w, h) = self.level_size(level);
        let data = self.images.0.get(level)
            .ok_or_else(|| format!("texture {:?} has no level {}", self.name, level))?;
        let palette = self.palette.as_ref().map(|p| (self.palette_format, &p.0[..]));
        decode_image(self.image_format, w, h, data, palette)
    }

    fn from_record(name: String, r: &BtiRecord, palette: Option<Rc<Palette>>, images: Rc<Images>) -> Texture {
        Texture {
            name,
            image_format: r.image_format,
            alpha_setting: r.alpha_setting,
            width: r.width,
            height: r.height,
            wrap_s: r.wrap_s,
            wrap_t: r.wrap_t,
            palette_format: r.palette_format,
            palette,
            use_mipmapping: r.use_mipmapping,
            edge_lod: r.edge_lod,
            bias_clamp: r.bias_clamp,
            max_anisotropy: r.max_anisotropy,
            minification_filter: r.minification_filter,
            magnification_filter: r.magnification_filter,
            minimum_lod: r.minimum_lod.0,
            maximum_lod: r.maximum_lod.0,
            lod_bias: r.lod_bias.0,
            unknown0: r.unknown0,
            images,
        }
    }

    fn to_record(&self, palette_offset: u32, image_offset: u32) -> Result<BtiRecord> {
        let palette_entry_count = self.palette.as_ref().map(|p| p.entry_count()).unwrap_or(0);
        check!(palette_entry_count <= 0xFFFF)?;
        check!(self.images.0.len() <= 0xFF)?;
        Ok(BtiRecord {
            image_format: self.image_format,
            alpha_setting: self.alpha_setting,
            width: self.width,
            height: self.height,
            wrap_s: self.wrap_s,
            wrap_t: self.wrap_t,
            use_palette: self.palette.is_some() as u8,
            palette_format: self.palette_format,
            palette_entry_count: palette_entry_count as u16,
            palette_offset,
            use_mipmapping: self.use_mipmapping,
            edge_lod: self.edge_lod,
            bias_clamp: self.bias_clamp,
            max_anisotropy: self.max_anisotropy,
            minification_filter: self.minification_filter,
            magnification_filter: self.magnification_filter,
            minimum_lod: Lod(self.minimum_lod),
            maximum_lod: Lod(self.maximum_lod),
            level_count: self.images.0.len() as u8,
            unknown0: self.unknown0,
            lod_bias: LodBias(self.lod_bias),
            image_offset,
        })
    }
}

/// Reads BTI records whose data is shared through a common pool.
pub struct TextureReader<'a> {
    palettes: OffsetUnpacker<'a, usize, Rc<Palette>>,
    images: OffsetUnpacker<'a, (TextureFormat, u16, u16, u8), Rc<Images>>,
    base: usize,
}

impl<'a> TextureReader<'a> {
    /// `base` is where shared-data offsets are measured from (the TEX1
    /// section start, or the start of a BTI file).
    pub fn new(base: Cur<'a>) -> TextureReader<'a> {
        TextureReader {
            palettes: OffsetUnpacker::new(base),
            images: OffsetUnpacker::new(base),
            base: base.pos(),
        }
    }

    /// Reads the BTI record at `cur`.
    pub fn read(&mut self, cur: Cur<'a>, name: String) -> Result<Texture> {
        let record: BtiRecord = cur.peek()?;
        let record_offset = cur.pos() - self.base;

        let palette = if record.use_palette != 0 && record.palette_entry_count != 0 {
            let offset = (record_offset + record.palette_offset as usize) as u32;
            let count = record.palette_entry_count as usize;
            Some(self.palettes.unpack(offset, count, |c, &count| {
                Ok(Rc::new(Palette(c.next_n_u8s(2 * count)?.to_vec())))
            })?)
        } else {
            None
        };

        let offset = (record_offset + record.image_offset as usize) as u32;
        let args = (record.image_format, record.width, record.height, record.level_count);
        let images = self.images.unpack(offset, args, |c, &(format, w, h, levels)| {
            let lens = format.level_lens(w as usize, h as usize, levels.max(1) as usize);
            let mut data = Vec::with_capacity(lens.len());
            for len in lens {
                data.push(c.next_n_u8s(len)?.to_vec());
            }
            Ok(Rc::new(Images(data)))
        })?;

        debug!("texture {:?}: {:?} {}x{}, {} levels", name, record.image_format,
            record.width, record.height, images.0.len());
        Ok(Texture::from_record(name, &record, palette, images))
    }
}

/// Writes BTI records followed by their deduplicated data.
pub struct TextureWriter {
    palettes: OffsetPacker<Palette>,
    images: OffsetPacker<Images>,
    base: usize,
}

impl TextureWriter {
    pub fn new(base: usize) -> TextureWriter {
        TextureWriter {
            palettes: OffsetPacker::new(base),
            images: OffsetPacker::new(base),
            base,
        }
    }

    /// Writes the data for `textures` at the current position and then
    /// the records at `records_at` (space for which must already exist).
    pub fn write(&mut self, out: &mut Out, records_at: usize, textures: &[Texture]) -> Result<()> {
        let base = self.base;
        for (i, texture) in textures.iter().enumerate() {
            let record_at = records_at + i * BtiRecord::SIZE - base;

            let palette_offset = match texture.palette {
                Some(ref palette) => {
                    let offset = self.palettes.pack(out, (**palette).clone(), |out| {
                        out.write_bytes(&palette.0);
                        out.align_from(base, 32, Padding::Zero);
                        Ok(())
                    })?;
                    offset as usize - record_at
                }
                None => 0,
            };

            let image_offset = self.images.pack(out, (*texture.images).clone(), |out| {
                for level in &texture.images.0 {
                    out.write_bytes(level);
                }
                out.align_from(base, 32, Padding::Zero);
                Ok(())
            })?;
            let image_offset = image_offset as usize - record_at;

            let record = texture.to_record(palette_offset as u32, image_offset as u32)?;
            out.write_at(records_at + i * BtiRecord::SIZE, &record)?;
        }
        Ok(())
    }
}

/// Reads a standalone `.bti` file.
pub fn unpack_bti(buf: &[u8], name: String) -> Result<Texture> {
    let cur = Cur::new(buf);
    TextureReader::new(cur).read(cur, name)
}

pub fn pack_bti(texture: &Texture) -> Result<Vec<u8>> {
    let mut out = Out::new();
    out.reserve(BtiRecord::SIZE);
    TextureWriter::new(0).write(&mut out, 0, std::slice::from_ref(texture))?;
    Ok(out.into_inner())
}

#[cfg(test)]
pub mod tests {
    use super::*;

    /// A small texture for tests elsewhere.
    pub fn sample(name: &str, format: TextureFormat, palette: Option<Rc<Palette>>, images: Rc<Images>) -> Texture {
        Texture {
            name: name.to_string(),
            image_format: format,
            alpha_setting: 0,
            width: 8,
            height: 8,
            wrap_s: WrapMode::Repeat,
            wrap_t: WrapMode::Clamp,
            palette_format: PaletteFormat::RGB565,
            palette,
            use_mipmapping: false,
            edge_lod: false,
            bias_clamp: false,
            max_anisotropy: AnisotropyMax::One,
            minification_filter: FilterMode::Linear,
            magnification_filter: FilterMode::Linear,
            minimum_lod: 0.0,
            maximum_lod: 0.0,
            lod_bias: 0.5,
            unknown0: 0,
            images,
        }
    }

    #[test]
    fn record_size() {
        assert_eq!(BtiRecord::SIZE, 32);
    }

    #[test]
    fn bti_round_trip() {
        let images = Rc::new(Images(vec![(0..64).collect()]));
        let texture = sample("a", TextureFormat::I8, None, images);
        let buf = pack_bti(&texture).unwrap();
        assert_eq!(buf.len(), 32 + 64);
        assert_eq!(&buf[0x1C..0x20], &[0, 0, 0, 0x20]);
        assert_eq!(unpack_bti(&buf, "a".into()).unwrap(), texture);
        assert_eq!(texture.decode_level(0).unwrap().0.len(), 8 * 8 * 4);
    }

    #[test]
    fn lod_bias_out_of_range() {
        let images = Rc::new(Images(vec![vec![0; 64]]));
        let mut texture = sample("a", TextureFormat::I8, None, images);
        texture.lod_bias = 1000.0;
        assert!(pack_bti(&texture).is_err());
    }
}
