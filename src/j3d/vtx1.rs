//! VTX1: vertex attribute arrays.
//!
//! The arrays are kept as raw bytes together with their format, so they
//! survive a round trip untouched. Array lengths aren't stored in the
//! file; each array runs up to the next array (or the section end).

use super::{open_section, SectionWriter};
use crate::binary::list::{pack_terminated, unpack_terminated};
use crate::binary::{Cur, FixedSize, Out, Padding};
use crate::errors::Result;
use crate::gx::Attribute;
use smallvec::SmallVec;

const ARRAY_SLOTS: usize = 13;

record! {
    pub struct Header {
        tag: [u8; 4],
        section_size: u32,
        vertex_format_offset: u32,
        array_offsets: [u32; 13],
    }
}

record! {
    #[derive(Copy, Clone, Debug, PartialEq, Eq, Hash)]
    pub struct VertexFormat {
        attribute: Attribute,
        component_count: u32,
        component_type: u32,
        scale_exponent: u8,
        pad(3),
    }
}

impl VertexFormat {
    fn terminator() -> VertexFormat {
        VertexFormat {
            attribute: Attribute::Null,
            component_count: 1,
            component_type: 0,
            scale_exponent: 0,
        }
    }

    fn is_color(&self) -> bool {
        self.attribute == Attribute::Color0 || self.attribute == Attribute::Color1
    }

    /// Components per element, or None if the format is invalid.
    pub fn components(&self) -> Option<usize> {
        use crate::gx::Attribute::*;
        Some(match (self.attribute, self.component_count) {
            (Position, 0) => 2,
            (Position, 1) => 3,
            (Normal, 0) => 3,
            (Normal, 1) | (Normal, 2) | (NormalBinormalTangent, _) => 9,
            (Color0, 0) | (Color1, 0) => 3,
            (Color0, 1) | (Color1, 1) => 4,
            (a, 0) if is_texcoord(a) => 1,
            (a, 1) if is_texcoord(a) => 2,
            _ => return None,
        })
    }

    /// Bytes per element, or None if the format is invalid.
    pub fn stride(&self) -> Option<usize> {
        if self.is_color() {
            // Colors are packed; the component type names the packing.
            let size = match self.component_type {
                0 | 3 => 2, // RGB565, RGBA4
                1 | 4 => 3, // RGB8, RGBA6
                2 | 5 => 4, // RGBX8, RGBA8
                _ => return None,
            };
            self.components()?;
            return Some(size);
        }
        let size = match self.component_type {
            0 | 1 => 1,
            2 | 3 => 2,
            4 => 4,
            _ => return None,
        };
        Some(size * self.components()?)
    }
}

fn is_texcoord(a: Attribute) -> bool {
    let raw = a.raw();
    raw >= Attribute::TexCoord0.raw() && raw <= Attribute::TexCoord7.raw()
}

/// Header slot holding the offset of an attribute's array.
fn slot(attribute: Attribute) -> Option<usize> {
    use crate::gx::Attribute::*;
    Some(match attribute {
        Position => 0,
        Normal => 1,
        NormalBinormalTangent => 2,
        Color0 => 3,
        Color1 => 4,
        a if is_texcoord(a) => 5 + (a.raw() - TexCoord0.raw()) as usize,
        _ => return None,
    })
}

#[derive(Clone, Debug, PartialEq)]
pub struct VertexArray {
    pub format: VertexFormat,
    pub data: Vec<u8>,
}

impl VertexArray {
    pub fn stride(&self) -> usize {
        self.format.stride().unwrap_or(1)
    }

    /// Number of whole elements in the array.
    pub fn len(&self) -> usize {
        self.data.len() / self.stride()
    }

    /// Decodes element `i`. Integer components are scaled by the format's
    /// exponent; colors come out in 0..1.
    pub fn element(&self, i: usize) -> Option<SmallVec<[f32; 9]>> {
        let stride = self.format.stride()?;
        let bytes = self.data.get(i * stride..(i + 1) * stride)?;
        let mut v = SmallVec::new();

        if self.format.is_color() {
            let rgba = decode_color(self.format.component_type, bytes)?;
            v.extend_from_slice(&rgba);
            return Some(v);
        }

        let n = self.format.components()?;
        let scale = 1.0 / (1u32 << self.format.scale_exponent.min(31)) as f32;
        for k in 0..n {
            let x = match self.format.component_type {
                0 => bytes[k] as f32 * scale,
                1 => bytes[k] as i8 as f32 * scale,
                2 => u16::from_be_bytes([bytes[2 * k], bytes[2 * k + 1]]) as f32 * scale,
                3 => i16::from_be_bytes([bytes[2 * k], bytes[2 * k + 1]]) as f32 * scale,
                _ => f32::from_be_bytes([
                    bytes[4 * k], bytes[4 * k + 1], bytes[4 * k + 2], bytes[4 * k + 3],
                ]),
            };
            v.push(x);
        }
        Some(v)
    }
}

fn decode_color(component_type: u32, b: &[u8]) -> Option<[f32; 4]> {
    let f = |x: u32, max: u32| x as f32 / max as f32;
    Some(match component_type {
        0 => {
            let x = u16::from_be_bytes([b[0], b[1]]) as u32;
            [f(x >> 11, 31), f((x >> 5) & 63, 63), f(x & 31, 31), 1.0]
        }
        1 | 2 => [f(b[0] as u32, 255), f(b[1] as u32, 255), f(b[2] as u32, 255), 1.0],
        3 => {
            let x = u16::from_be_bytes([b[0], b[1]]) as u32;
            [f(x >> 12, 15), f((x >> 8) & 15, 15), f((x >> 4) & 15, 15), f(x & 15, 15)]
        }
        4 => {
            let x = (b[0] as u32) << 16 | (b[1] as u32) << 8 | b[2] as u32;
            [f(x >> 18, 63), f((x >> 12) & 63, 63), f((x >> 6) & 63, 63), f(x & 63, 63)]
        }
        5 => [
            f(b[0] as u32, 255), f(b[1] as u32, 255), f(b[2] as u32, 255), f(b[3] as u32, 255),
        ],
        _ => return None,
    })
}

/// All vertex arrays of a model, in the order of the format list.
#[derive(Clone, Debug, Default, PartialEq)]
pub struct VertexArrays {
    pub arrays: Vec<VertexArray>,
}

impl VertexArrays {
    pub fn get(&self, attribute: Attribute) -> Option<&VertexArray> {
        self.arrays.iter().find(|a| a.format.attribute == attribute)
    }

    pub fn position_count(&self) -> usize {
        self.get(Attribute::Position).map(|a| a.len()).unwrap_or(0)
    }
}

pub fn unpack(cur: Cur) -> Result<VertexArrays> {
    let size = open_section(cur, b"VTX1")?;
    let header: Header = cur.peek()?;
    let end = cur.pos() + size;

    let mut c = cur + header.vertex_format_offset;
    let formats = unpack_terminated::<VertexFormat, _>(&mut c, end, |f| {
        f.attribute == Attribute::Null
    })?;

    let mut offsets: Vec<u32> = header.array_offsets.iter()
        .cloned()
        .filter(|&o| o != 0)
        .collect();
    offsets.push(size as u32);
    offsets.sort();

    let mut arrays = Vec::with_capacity(formats.len());
    for format in formats {
        let pos = c.pos();
        let slot = slot(format.attribute)
            .ok_or_else(|| c.error_at(pos, format!("no array for {:?}", format.attribute)))?;
        if format.stride().is_none() {
            return Err(c.error_at(pos, format!("invalid vertex format {:?}", format)));
        }
        let offset = header.array_offsets[slot];
        if offset == 0 {
            return Err(c.error_at(pos, format!("{:?} array offset missing", format.attribute)));
        }
        let next = offsets.iter().cloned().find(|&o| o > offset).unwrap_or(size as u32);
        let data = (cur + offset).next_n_u8s((next - offset) as usize)?.to_vec();
        debug!("{:?} array: {:#x} bytes", format.attribute, data.len());
        arrays.push(VertexArray { format, data });
    }

    Ok(VertexArrays { arrays })
}

pub fn pack(out: &mut Out, arrays: &VertexArrays) -> Result<()> {
    let w = SectionWriter::begin(out, Header::SIZE);

    let vertex_format_offset = w.offset(out)?;
    let formats: Vec<VertexFormat> = arrays.arrays.iter().map(|a| a.format).collect();
    pack_terminated(out, &formats, &VertexFormat::terminator())?;

    let mut order: Vec<(usize, &VertexArray)> = vec![];
    for array in &arrays.arrays {
        let s = slot(array.format.attribute)
            .ok_or_else(|| format!("no array slot for {:?}", array.format.attribute))?;
        order.push((s, array));
    }
    order.sort_by_key(|&(s, _)| s);

    let mut array_offsets = [0u32; ARRAY_SLOTS];
    for (s, array) in order {
        out.align_from(w.base(), 32, Padding::Ff);
        array_offsets[s] = w.offset(out)?;
        out.write_bytes(&array.data);
    }

    let section_size = w.end(out)?;
    w.write_header(out, &Header {
        tag: *b"VTX1",
        section_size,
        vertex_format_offset,
        array_offsets,
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    fn format(attribute: Attribute, component_count: u32, component_type: u32, exp: u8) -> VertexFormat {
        VertexFormat { attribute, component_count, component_type, scale_exponent: exp }
    }

    #[test]
    fn strides() {
        assert_eq!(format(Attribute::Position, 1, 4, 0).stride(), Some(12));
        assert_eq!(format(Attribute::Position, 1, 3, 8).stride(), Some(6));
        assert_eq!(format(Attribute::TexCoord3, 1, 3, 8).stride(), Some(4));
        assert_eq!(format(Attribute::Color0, 1, 5, 0).stride(), Some(4));
        assert_eq!(format(Attribute::Color0, 0, 0, 0).stride(), Some(2));
        assert_eq!(format(Attribute::Normal, 1, 4, 0).stride(), Some(36));
        assert_eq!(format(Attribute::Position, 7, 4, 0).stride(), None);
    }

    #[test]
    fn decode_elements() {
        let a = VertexArray {
            format: format(Attribute::Position, 1, 3, 8),
            data: vec![0x01, 0x00, 0xFF, 0x00, 0x00, 0x80],
        };
        assert_eq!(a.len(), 1);
        assert_eq!(&a.element(0).unwrap()[..], &[1.0, -1.0, 0.5]);
        assert!(a.element(1).is_none());

        let c = VertexArray {
            format: format(Attribute::Color0, 1, 5, 0),
            data: vec![0xFF, 0, 0xFF, 0],
        };
        assert_eq!(&c.element(0).unwrap()[..], &[1.0, 0.0, 1.0, 0.0]);
    }

    #[test]
    fn round_trip() {
        let arrays = VertexArrays {
            arrays: vec![
                VertexArray {
                    format: format(Attribute::Position, 1, 4, 0),
                    data: (0..36).collect(),
                },
                VertexArray {
                    format: format(Attribute::TexCoord0, 1, 4, 0),
                    data: (0..8).collect(),
                },
            ],
        };
        let mut out = Out::new();
        pack(&mut out, &arrays).unwrap();
        let buf = out.into_inner();
        assert_eq!(buf.len() % 32, 0);

        let read = unpack(Cur::new(&buf)).unwrap();
        assert_eq!(read.arrays.len(), 2);
        // Lengths are inferred, so the padding after each array comes along.
        assert_eq!(&read.arrays[0].data[..36], &arrays.arrays[0].data[..]);
        assert_eq!(read.arrays[0].data.len(), 64);
        assert_eq!(read.position_count(), 5);

        let mut again = Out::new();
        pack(&mut again, &read).unwrap();
        assert_eq!(again.into_inner(), buf);
    }
}
