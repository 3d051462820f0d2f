//! Seekable output buffer for packing sections.

use super::Pack;
use crate::errors::Result;

/// Byte pattern used to fill gaps.
#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub enum Padding {
    Zero,
    Ff,
    /// Repeats "This is padding data to align".
    Text,
}

pub const PADDING_TEXT: &[u8] = b"This is padding data to align";

impl Padding {
    fn byte(self, i: usize) -> u8 {
        match self {
            Padding::Zero => 0x00,
            Padding::Ff => 0xFF,
            Padding::Text => PADDING_TEXT[i % PADDING_TEXT.len()],
        }
    }
}

/// A growable byte buffer with a write position. Writes at a position
/// before the end overwrite; writes past the end grow the buffer (holes
/// are zero-filled).
#[derive(Default)]
pub struct Out {
    buf: Vec<u8>,
    pos: usize,
}

impl Out {
    pub fn new() -> Out {
        Out::default()
    }

    pub fn tell(&self) -> usize {
        self.pos
    }

    pub fn len(&self) -> usize {
        self.buf.len()
    }

    pub fn seek(&mut self, pos: usize) {
        self.pos = pos;
    }

    pub fn seek_end(&mut self) {
        self.pos = self.buf.len();
    }

    pub fn bytes(&self) -> &[u8] {
        &self.buf
    }

    pub fn into_inner(self) -> Vec<u8> {
        self.buf
    }

    pub fn write<T: Pack + ?Sized>(&mut self, x: &T) -> Result<()> {
        x.pack(self)
    }

    pub fn write_bytes(&mut self, bytes: &[u8]) {
        let end = self.pos + bytes.len();
        if self.buf.len() < end {
            self.buf.resize(end, 0);
        }
        self.buf[self.pos..end].copy_from_slice(bytes);
        self.pos = end;
    }

    pub fn write_c_string(&mut self, s: &str) {
        self.write_bytes(s.as_bytes());
        self.write_bytes(&[0]);
    }

    /// Writes `n` bytes of `0xFF`, used for padding fields inside records.
    pub fn pad(&mut self, n: usize) {
        for _ in 0..n {
            self.write_bytes(&[0xFF]);
        }
    }

    /// Reserves `n` zero bytes to be overwritten later (eg. a header).
    pub fn reserve(&mut self, n: usize) {
        self.write_bytes(&vec![0; n]);
    }

    /// Pads with `padding` until the position is a multiple of `n`
    /// relative to `base`.
    pub fn align_from(&mut self, base: usize, n: usize, padding: Padding) {
        let mut i = 0;
        while (self.pos - base) % n != 0 {
            let b = padding.byte(i);
            self.write_bytes(&[b]);
            i += 1;
        }
    }

    pub fn align(&mut self, n: usize, padding: Padding) {
        self.align_from(0, n, padding)
    }

    /// Packs `x` at `pos` and returns to the current position.
    pub fn write_at<T: Pack + ?Sized>(&mut self, pos: usize, x: &T) -> Result<()> {
        let saved = self.pos;
        self.pos = pos;
        let res = x.pack(self);
        self.pos = saved;
        res
    }
}

#[test]
fn test() {
    let mut out = Out::new();
    out.write_bytes(b"abc");
    out.align(8, Padding::Text);
    assert_eq!(out.bytes(), b"abcThis ");

    out.seek(1);
    out.write_bytes(b"X");
    assert_eq!(out.tell(), 2);
    assert_eq!(out.len(), 8);

    out.seek(9);
    out.write_bytes(b"Z");
    assert_eq!(out.bytes(), b"aXcThis \0Z");
}
