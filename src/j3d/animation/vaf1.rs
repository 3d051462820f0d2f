//! VAF1 (`.bva`): per-frame shape visibility.

use super::{pack_pool, pool_insert, unpack_pool, LoopMode};
use crate::binary::{Cur, FixedSize, Out, Padding};
use crate::errors::Result;
use crate::j3d::{open_section, SectionWriter};

record! {
    pub struct Header {
        tag: [u8; 4],
        section_size: u32,
        loop_mode: LoopMode,
        pad(1),
        duration: u16,
        shape_count: u16,
        visibility_count: u16,
        shape_offset: u32,
        visibility_offset: u32,
    }
}

record! {
    pub struct Entry {
        count: u16,
        first: u16,
    }
}

/// One list of per-frame visibility flags per shape, in shape order.
#[derive(Clone, Debug, Default, PartialEq)]
pub struct VisibilityAnimation {
    pub loop_mode: LoopMode,
    pub duration: u16,
    pub shapes: Vec<Vec<bool>>,
}

impl VisibilityAnimation {
    /// Visibility of shape `i` at `time`; the last flag holds and an empty
    /// list means visible.
    pub fn sample(&self, i: usize, time: f32) -> bool {
        match self.shapes.get(i) {
            Some(flags) if !flags.is_empty() => {
                flags[(time.max(0.0) as usize).min(flags.len() - 1)]
            }
            _ => true,
        }
    }
}

pub fn unpack(cur: Cur) -> Result<VisibilityAnimation> {
    open_section(cur, b"VAF1")?;
    let h: Header = cur.peek()?;
    let pool: Vec<bool> = unpack_pool(cur + h.visibility_offset, h.visibility_count as usize)?;

    let mut c = cur + h.shape_offset;
    let mut shapes = Vec::with_capacity(h.shape_count as usize);
    for _ in 0..h.shape_count {
        let pos = c.pos();
        let e: Entry = c.next()?;
        let range = e.first as usize..e.first as usize + e.count as usize;
        let flags = pool.get(range).ok_or_else(|| c.error_at(pos, format!(
            "{} visibility flags at {} run past end of a pool of {}", e.count, e.first, pool.len(),
        )))?;
        shapes.push(flags.to_vec());
    }
    Ok(VisibilityAnimation { loop_mode: h.loop_mode, duration: h.duration, shapes })
}

pub fn pack(out: &mut Out, anim: &VisibilityAnimation) -> Result<()> {
    check!(anim.shapes.len() <= 0xFFFF)?;
    let w = SectionWriter::begin(out, Header::SIZE);

    let mut pool = vec![];
    let mut entries = Vec::with_capacity(anim.shapes.len());
    for flags in &anim.shapes {
        check!(flags.len() <= 0xFFFF)?;
        entries.push(Entry { count: flags.len() as u16, first: pool_insert(&mut pool, flags)? });
    }

    out.align_from(w.base(), 32, Padding::Ff);
    let shape_offset = w.offset(out)?;
    for e in &entries {
        out.write(e)?;
    }
    let visibility_offset = pack_pool(out, &w, &pool)?;

    let section_size = w.end(out)?;
    w.write_header(out, &Header {
        tag: *b"VAF1",
        section_size,
        loop_mode: anim.loop_mode,
        duration: anim.duration,
        shape_count: anim.shapes.len() as u16,
        visibility_count: pool.len() as u16,
        shape_offset,
        visibility_offset,
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn round_trip() {
        assert_eq!(Header::SIZE, 24);
        let anim = VisibilityAnimation {
            loop_mode: LoopMode::Repeat,
            duration: 3,
            shapes: vec![vec![true, false, true], vec![false, true], vec![]],
        };
        let mut out = Out::new();
        pack(&mut out, &anim).unwrap();
        let buf = out.into_inner();
        assert_eq!(buf.len() % 32, 0);
        assert_eq!(unpack(Cur::new(&buf)).unwrap(), anim);
        assert!(!anim.sample(0, 1.0));
        assert!(anim.sample(1, 7.0));
        assert!(anim.sample(2, 0.0));
        assert!(anim.sample(5, 0.0));
    }
}
