//! Writing texture images out as PNGs.

use crate::errors::Result;
use crate::j3d::texture::Texture;
use crate::util::uniq::{sanitize, UniqueNamer};
use std::fs::{self, File};
use std::io::{BufWriter, ErrorKind, Write};
use std::path::{Path, PathBuf};

/// Encodes an RGBA8 image as a PNG.
pub fn encode_png<W: Write>(w: W, rgba: &[u8], width: u32, height: u32) -> Result<()> {
    check!(rgba.len() == 4 * width as usize * height as usize)?;
    let mut enc = png::Encoder::new(w, width, height);
    enc.set_color(png::ColorType::Rgba);
    enc.set_depth(png::BitDepth::Eight);
    let mut writer = enc.write_header()?;
    writer.write_image_data(rgba)?;
    Ok(())
}

pub fn write_png(path: &Path, rgba: &[u8], width: u32, height: u32) -> Result<()> {
    let f = BufWriter::new(File::create(path)?);
    encode_png(f, rgba, width, height)
}

/// Writes mipmap level `level` of `texture` to `path`.
pub fn export_texture(texture: &Texture, level: usize, path: &Path) -> Result<()> {
    let rgba = texture.decode_level(level)?;
    let (w, h) = texture.level_size(level);
    write_png(path, &rgba.0, w as u32, h as u32)?;
    info!("wrote {:?} level {} to {}", texture.name, level, path.display());
    Ok(())
}

/// Writes the first level of every texture into `dir`, which is created
/// if it doesn't exist. Textures with the same name get distinct file
/// names. Returns the paths written.
pub fn export_textures(textures: &[Texture], dir: &Path) -> Result<Vec<PathBuf>> {
    match fs::create_dir_all(dir) {
        Ok(()) => (),
        Err(e) if e.kind() == ErrorKind::AlreadyExists => (),
        Err(e) => Err(e)?,
    }
    let mut namer = UniqueNamer::new();
    let mut written = Vec::with_capacity(textures.len());
    for texture in textures {
        let name = namer.name(&sanitize(&texture.name));
        let path = dir.join(format!("{}.png", name));
        export_texture(texture, 0, &path)?;
        written.push(path);
    }
    Ok(written)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::gx::TextureFormat;
    use crate::j3d::texture::tests::sample;
    use crate::j3d::texture::Images;
    use std::rc::Rc;

    #[test]
    fn png_decodes_back() {
        let rgba: Vec<u8> = (0..2 * 3 * 4).map(|x| x as u8).collect();
        let mut buf = vec![];
        encode_png(&mut buf, &rgba, 2, 3).unwrap();
        assert_eq!(&buf[..8], b"\x89PNG\r\n\x1a\n");

        let decoder = png::Decoder::new(&buf[..]);
        let mut reader = decoder.read_info().unwrap();
        let mut out = vec![0; reader.output_buffer_size()];
        let info = reader.next_frame(&mut out).unwrap();
        assert_eq!((info.width, info.height), (2, 3));
        assert_eq!(&out[..info.buffer_size()], &rgba[..]);
    }

    #[test]
    fn wrong_size() {
        assert!(encode_png(vec![], &[0; 12], 2, 2).is_err());
    }

    #[test]
    fn same_names_dont_collide() {
        let dir = std::env::temp_dir().join(format!("j3dview-export-{}", std::process::id()));
        let images = Rc::new(Images(vec![vec![0x80; 64]]));
        let textures = vec![
            sample("skin", TextureFormat::I8, None, images.clone()),
            sample("skin", TextureFormat::I8, None, images),
        ];
        let written = export_textures(&textures, &dir).unwrap();
        assert_eq!(written, vec![dir.join("skin.png"), dir.join("skin.1.png")]);
        assert!(written.iter().all(|p| p.exists()));
        fs::remove_dir_all(&dir).unwrap();
    }
}
