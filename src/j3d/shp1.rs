//! SHP1: shapes, the drawable geometry.
//!
//! A shape is split into batches (packets), each with its own table of up
//! to ten matrix slots and a display list of primitives. Vertices in the
//! display list are tuples of array indices laid out according to the
//! shape's attribute descriptor list.

use super::{open_section, pack_identity_array, unpack_index_array, SectionWriter};
use crate::binary::list::{pack_terminated, unpack_terminated};
use crate::binary::pool::{OffsetPacker, OffsetUnpacker};
use crate::binary::{Cur, FixedSize, Out, Pack, Padding};
use crate::errors::Result;
use crate::gx::{Attribute, InputType, PrimitiveType};
use smallvec::SmallVec;
use std::rc::Rc;

record! {
    pub struct Header {
        tag: [u8; 4],
        section_size: u32,
        count: u16,
        pad(2),
        shape_offset: u32,
        index_offset: u32,
        unknown0_offset: u32,
        attribute_descriptor_offset: u32,
        matrix_index_offset: u32,
        packet_offset: u32,
        matrix_selection_offset: u32,
        packet_location_offset: u32,
    }
}

gx_enum! {
    /// How a shape's vertices pick their matrix.
    pub enum ShapeTransformation: u8 {
        SingleMatrix = 0,
        Billboard = 1,
        BillboardY = 2,
        MultiMatrix = 3,
    }
}

record! {
    pub struct ShapeRecord {
        transformation_type: ShapeTransformation,
        pad(1),
        batch_count: u16,
        attribute_descriptor_offset: u16,
        first_matrix_selection: u16,
        first_packet: u16,
        pad(2),
        bounding_radius: f32,
        min: [f32; 3],
        max: [f32; 3],
    }
}

record! {
    #[derive(Copy, Clone, Debug, PartialEq, Eq, Hash)]
    pub struct AttributeDescriptor {
        attribute: Attribute,
        input_type: InputType,
    }
}

impl AttributeDescriptor {
    fn terminator() -> AttributeDescriptor {
        AttributeDescriptor { attribute: Attribute::Null, input_type: InputType::None }
    }
}

record! {
    pub struct MatrixSelection {
        use_matrix_index: u16,
        count: u16,
        first: u32,
    }
}

record! {
    pub struct PacketLocation {
        size: u32,
        offset: u32,
    }
}

/// One value per attribute descriptor: an array index, or for the
/// matrix-index attributes the matrix slot itself.
pub type Vertex = SmallVec<[u16; 8]>;

#[derive(Clone, Debug, PartialEq)]
pub struct Primitive {
    pub primitive_type: PrimitiveType,
    pub vertices: Vec<Vertex>,
}

#[derive(Clone, Debug, PartialEq)]
pub struct Batch {
    pub use_matrix_index: u16,
    /// Matrix slots for this batch; 0xFFFF keeps the previous batch's
    /// entry.
    pub matrix_table: Vec<u16>,
    pub primitives: Vec<Primitive>,
}

#[derive(Clone, Debug, PartialEq)]
pub struct Shape {
    pub transformation_type: ShapeTransformation,
    pub attribute_descriptors: Rc<Vec<AttributeDescriptor>>,
    pub batches: Vec<Batch>,
    pub bounding_radius: f32,
    pub min: [f32; 3],
    pub max: [f32; 3],
}

impl Shape {
    /// Position of `attribute` in each vertex tuple.
    pub fn attribute_position(&self, attribute: Attribute) -> Option<usize> {
        self.attribute_descriptors.iter().position(|d| d.attribute == attribute)
    }
}

fn unpack_packet(cur: Cur, size: usize, descriptors: &[AttributeDescriptor]) -> Result<Vec<Primitive>> {
    let end = cur.pos() + size;
    let mut c = cur;
    let mut primitives = vec![];
    while c.pos() < end {
        let pos = c.pos();
        let opcode = c.next::<u8>()?;
        if opcode == 0 {
            continue;
        }
        let primitive_type = PrimitiveType::from_raw(opcode)
            .ok_or_else(|| c.error_at(pos, format!("invalid packet opcode {:#x}", opcode)))?;
        let count = c.next::<u16>()? as usize;
        let mut vertices = Vec::with_capacity(count);
        for _ in 0..count {
            let mut vertex = Vertex::new();
            for d in descriptors {
                let value = match d.input_type {
                    InputType::None => 0,
                    InputType::Index8 => c.next::<u8>()? as u16,
                    InputType::Index16 => c.next::<u16>()?,
                    InputType::Direct if d.attribute.is_matrix_index() => c.next::<u8>()? as u16,
                    InputType::Direct => {
                        return Err(c.error(format!("direct {:?} data is not supported", d.attribute)));
                    }
                };
                vertex.push(value);
            }
            vertices.push(vertex);
        }
        if c.pos() > end {
            return Err(c.error_at(pos, "primitive runs past the end of its packet"));
        }
        primitives.push(Primitive { primitive_type, vertices });
    }
    Ok(primitives)
}

fn pack_packet(out: &mut Out, primitives: &[Primitive], descriptors: &[AttributeDescriptor]) -> Result<()> {
    for primitive in primitives {
        check!(primitive.vertices.len() <= 0xFFFF)?;
        primitive.primitive_type.pack(out)?;
        (primitive.vertices.len() as u16).pack(out)?;
        for vertex in &primitive.vertices {
            check!(vertex.len() == descriptors.len())?;
            for (d, &value) in descriptors.iter().zip(vertex.iter()) {
                match d.input_type {
                    InputType::None => (),
                    InputType::Index8 | InputType::Direct => {
                        check!(value <= 0xFF)?;
                        (value as u8).pack(out)?;
                    }
                    InputType::Index16 => value.pack(out)?,
                }
            }
        }
    }
    Ok(())
}

pub fn unpack(cur: Cur) -> Result<Vec<Shape>> {
    let size = open_section(cur, b"SHP1")?;
    let header: Header = cur.peek()?;
    let n = header.count as usize;
    let end = cur.pos() + size;

    let indices = unpack_index_array(cur + header.index_offset, n, n)?;
    let records: Vec<ShapeRecord> = (cur + header.shape_offset).next_n(n)?;

    let descriptor_base = cur + header.attribute_descriptor_offset;
    let mut descriptor_lists = OffsetUnpacker::new(descriptor_base);

    let mut shapes = Vec::with_capacity(n);
    for i in indices {
        let record = &records[i];
        let attribute_descriptors = descriptor_lists.unpack(
            record.attribute_descriptor_offset as u32,
            (),
            |c, _| {
                let list = unpack_terminated(c, end, |d: &AttributeDescriptor| {
                    d.attribute == Attribute::Null
                })?;
                Ok(Rc::new(list))
            },
        )?;

        let mut batches = Vec::with_capacity(record.batch_count as usize);
        for b in 0..record.batch_count as usize {
            let selection: MatrixSelection = (cur + header.matrix_selection_offset
                + (record.first_matrix_selection as usize + b) * MatrixSelection::SIZE).peek()?;
            let location: PacketLocation = (cur + header.packet_location_offset
                + (record.first_packet as usize + b) * PacketLocation::SIZE).peek()?;

            let matrix_table = (cur + header.matrix_index_offset + selection.first as usize * 2)
                .next_n::<u16>(selection.count as usize)?;
            let packet = cur + header.packet_offset + location.offset;
            if packet.pos() + location.size as usize > end {
                return Err(packet.error("packet runs past the end of SHP1"));
            }
            let primitives = unpack_packet(packet, location.size as usize, &attribute_descriptors)?;

            batches.push(Batch {
                use_matrix_index: selection.use_matrix_index,
                matrix_table,
                primitives,
            });
        }

        shapes.push(Shape {
            transformation_type: record.transformation_type,
            attribute_descriptors,
            batches,
            bounding_radius: record.bounding_radius,
            min: record.min,
            max: record.max,
        });
    }

    debug!("{} shapes", shapes.len());
    Ok(shapes)
}

pub fn pack(out: &mut Out, shapes: &[Shape]) -> Result<()> {
    check!(shapes.len() <= 0xFFFF)?;
    let w = SectionWriter::begin(out, Header::SIZE);
    let base = w.base();

    let shape_offset = w.offset(out)?;
    out.reserve(shapes.len() * ShapeRecord::SIZE);

    let index_offset = w.offset(out)?;
    pack_identity_array(out, shapes.len())?;

    out.align_from(base, 32, Padding::Ff);
    let attribute_descriptor_offset = w.offset(out)?;
    let mut descriptor_lists = OffsetPacker::new(out.tell());
    let mut descriptor_offsets = Vec::with_capacity(shapes.len());
    for shape in shapes {
        let list = &shape.attribute_descriptors;
        let offset = descriptor_lists.pack(out, (**list).clone(), |out| {
            pack_terminated(out, list, &AttributeDescriptor::terminator())
        })?;
        check!(offset <= 0xFFFF)?;
        descriptor_offsets.push(offset as u16);
    }

    out.align_from(base, 32, Padding::Ff);
    let matrix_index_offset = w.offset(out)?;
    let mut selections = vec![];
    let mut first = 0;
    for batch in shapes.iter().flat_map(|s| s.batches.iter()) {
        check!(batch.matrix_table.len() <= 0xFFFF)?;
        for &i in &batch.matrix_table {
            i.pack(out)?;
        }
        selections.push(MatrixSelection {
            use_matrix_index: batch.use_matrix_index,
            count: batch.matrix_table.len() as u16,
            first,
        });
        first += batch.matrix_table.len() as u32;
    }

    out.align_from(base, 32, Padding::Ff);
    let packet_offset = w.offset(out)?;
    let mut locations = vec![];
    for shape in shapes {
        for batch in &shape.batches {
            let start = out.tell();
            pack_packet(out, &batch.primitives, &shape.attribute_descriptors)?;
            out.align_from(base, 32, Padding::Zero);
            locations.push(PacketLocation {
                size: (out.tell() - start) as u32,
                offset: (start - base) as u32 - packet_offset,
            });
        }
    }

    let matrix_selection_offset = w.offset(out)?;
    for selection in &selections {
        out.write(selection)?;
    }

    let packet_location_offset = w.offset(out)?;
    for location in &locations {
        out.write(location)?;
    }

    let section_size = w.end(out)?;

    let mut first_batch = 0;
    for (i, (shape, &descriptor_offset)) in shapes.iter().zip(&descriptor_offsets).enumerate() {
        check!(first_batch + shape.batches.len() <= 0xFFFF)?;
        let record = ShapeRecord {
            transformation_type: shape.transformation_type,
            batch_count: shape.batches.len() as u16,
            attribute_descriptor_offset: descriptor_offset,
            first_matrix_selection: first_batch as u16,
            first_packet: first_batch as u16,
            bounding_radius: shape.bounding_radius,
            min: shape.min,
            max: shape.max,
        };
        out.write_at(base + shape_offset as usize + i * ShapeRecord::SIZE, &record)?;
        first_batch += shape.batches.len();
    }

    w.write_header(out, &Header {
        tag: *b"SHP1",
        section_size,
        count: shapes.len() as u16,
        shape_offset,
        index_offset,
        unknown0_offset: 0,
        attribute_descriptor_offset,
        matrix_index_offset,
        packet_offset,
        matrix_selection_offset,
        packet_location_offset,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use smallvec::smallvec;

    fn descriptors() -> Rc<Vec<AttributeDescriptor>> {
        Rc::new(vec![
            AttributeDescriptor { attribute: Attribute::PositionMatrixIndex, input_type: InputType::Direct },
            AttributeDescriptor { attribute: Attribute::Position, input_type: InputType::Index16 },
            AttributeDescriptor { attribute: Attribute::TexCoord0, input_type: InputType::Index8 },
        ])
    }

    fn sample_shape() -> Shape {
        Shape {
            transformation_type: ShapeTransformation::MultiMatrix,
            attribute_descriptors: descriptors(),
            batches: vec![
                Batch {
                    use_matrix_index: 0xFFFF,
                    matrix_table: vec![0, 1, 0xFFFF],
                    primitives: vec![Primitive {
                        primitive_type: PrimitiveType::TriangleStrip,
                        vertices: vec![smallvec![0, 0, 0], smallvec![3, 1, 1], smallvec![6, 0x102, 2]],
                    }],
                },
                Batch {
                    use_matrix_index: 0xFFFF,
                    matrix_table: vec![2],
                    primitives: vec![
                        Primitive {
                            primitive_type: PrimitiveType::Triangles,
                            vertices: vec![smallvec![0, 4, 0], smallvec![0, 5, 1], smallvec![0, 6, 2]],
                        },
                        Primitive {
                            primitive_type: PrimitiveType::Quads,
                            vertices: vec![smallvec![0, 1, 0]; 4],
                        },
                    ],
                },
            ],
            bounding_radius: 10.0,
            min: [-1.0, -2.0, -3.0],
            max: [1.0, 2.0, 3.0],
        }
    }

    #[test]
    fn round_trip_shares_descriptor_lists() {
        let shapes = vec![sample_shape(), sample_shape()];
        let mut out = Out::new();
        pack(&mut out, &shapes).unwrap();
        let buf = out.into_inner();
        assert_eq!(buf.len() % 32, 0);

        let read = unpack(Cur::new(&buf)).unwrap();
        assert_eq!(read, shapes);
        assert!(Rc::ptr_eq(&read[0].attribute_descriptors, &read[1].attribute_descriptors));

        let mut again = Out::new();
        pack(&mut again, &read).unwrap();
        assert_eq!(again.into_inner(), buf);
    }

    #[test]
    fn empty_shape() {
        let shape = Shape {
            transformation_type: ShapeTransformation::SingleMatrix,
            attribute_descriptors: Rc::new(vec![]),
            batches: vec![],
            bounding_radius: 0.0,
            min: [0.0; 3],
            max: [0.0; 3],
        };
        let mut out = Out::new();
        pack(&mut out, &[shape.clone()]).unwrap();
        let buf = out.into_inner();

        let header: Header = Cur::new(&buf).next().unwrap();
        let record: ShapeRecord = (Cur::new(&buf) + header.shape_offset).next().unwrap();
        assert_eq!(record.batch_count, 0);
        assert_eq!(record.first_matrix_selection, 0);
        assert_eq!(record.first_packet, 0);

        // The descriptor list is just the terminator.
        let mut c = Cur::new(&buf) + header.attribute_descriptor_offset + record.attribute_descriptor_offset;
        let terminator: AttributeDescriptor = c.next().unwrap();
        assert_eq!(terminator.attribute, Attribute::Null);

        // No matrix indices, packets, selections or locations.
        assert_eq!(header.matrix_index_offset, header.packet_offset);
        assert_eq!(header.matrix_selection_offset, header.packet_location_offset);
        assert_eq!(header.packet_location_offset as usize, buf.len());

        assert_eq!(unpack(Cur::new(&buf)).unwrap(), vec![shape]);
    }

    #[test]
    fn packet_nops_are_skipped() {
        let d = descriptors();
        let buf = [0x00, 0x90, 0x00, 0x01, 0x02, 0x00, 0x07, 0x03, 0x00, 0x00];
        let primitives = unpack_packet(Cur::new(&buf), buf.len(), &d).unwrap();
        assert_eq!(primitives.len(), 1);
        assert_eq!(&primitives[0].vertices[0][..], &[2, 7, 3]);

        let short = [0x90, 0x00, 0x02, 0x02, 0x00, 0x07, 0x03];
        assert!(unpack_packet(Cur::new(&short), short.len(), &d).is_err());
    }
}
