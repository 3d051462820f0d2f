use super::Unpack;
use crate::errors::{format_error, Error, Result};
use std::fmt;
use std::ops::Add;

/// A pointer into a buffer of bytes. Used for binary file parsing.
///
/// Positions are absolute offsets into the whole buffer, so a `Cur` can
/// be cloned and jumped around freely while errors still report where in
/// the file they happened.
#[derive(Copy, Clone)]
pub struct Cur<'a> {
    buf_: &'a [u8],
    pos_: usize,
}

impl<'a> Cur<'a> {
    pub fn new(buf: &[u8]) -> Cur {
        Cur { buf_: buf, pos_: 0 }
    }

    pub fn pos(&self) -> usize {
        self.pos_
    }

    pub fn len(&self) -> usize {
        self.buf_.len()
    }

    pub fn bytes_remaining(&self) -> usize {
        self.buf_.len().saturating_sub(self.pos_)
    }

    pub fn next<T: Unpack>(&mut self) -> Result<T> {
        T::unpack(self)
    }

    /// Reads a value without advancing.
    pub fn peek<T: Unpack>(&self) -> Result<T> {
        self.clone().next()
    }

    pub fn next_n<T: Unpack>(&mut self, n: usize) -> Result<Vec<T>> {
        let mut v = Vec::with_capacity(n.min(self.bytes_remaining()));
        for _ in 0..n {
            v.push(self.next()?);
        }
        Ok(v)
    }

    pub fn next_n_u8s(&mut self, n: usize) -> Result<&'a [u8]> {
        let end_pos = self.pos_.checked_add(n);
        match end_pos {
            Some(end) if end <= self.buf_.len() => {
                let res = &self.buf_[self.pos_..end];
                self.pos_ = end;
                Ok(res)
            }
            _ => Err(self.error(format!("buffer too short for {} bytes", n))),
        }
    }

    pub fn slice_from_cur_to_end(&self) -> &'a [u8] {
        &self.buf_[self.pos_.min(self.buf_.len())..]
    }

    pub fn jump_forward(&mut self, amt: usize) {
        let pos = self.pos_;
        self.jump_to(pos + amt);
    }

    pub fn jump_to(&mut self, pos: usize) {
        self.pos_ = pos;
    }

    /// Reads a NUL-terminated string.
    pub fn next_c_string(&mut self) -> Result<String> {
        let start = self.pos_;
        let rest = self.slice_from_cur_to_end();
        let len = rest.iter().position(|&b| b == 0)
            .ok_or_else(|| self.error("unterminated string"))?;
        let bytes = self.next_n_u8s(len + 1)?;
        String::from_utf8(bytes[..len].to_vec())
            .map_err(|_| self.error_at(start, "string is not valid UTF-8"))
    }

    pub fn error<S: Into<String>>(&self, reason: S) -> Error {
        format_error(self.pos_, reason)
    }

    pub fn error_at<S: Into<String>>(&self, pos: usize, reason: S) -> Error {
        format_error(pos, reason)
    }
}

impl<'a> Add<usize> for Cur<'a> {
    type Output = Cur<'a>;

    fn add(self, amt: usize) -> Cur<'a> {
        let mut cur = self;
        cur.jump_forward(amt);
        cur
    }
}

impl<'a> Add<u32> for Cur<'a> {
    type Output = Cur<'a>;
    fn add(self, amt: u32) -> Cur<'a> { self + amt as usize }
}

impl<'a> Add<u16> for Cur<'a> {
    type Output = Cur<'a>;
    fn add(self, amt: u16) -> Cur<'a> { self + amt as usize }
}

impl<'a> fmt::Debug for Cur<'a> {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        write!(f, "Cur {{ pos: {:#x} }}", self.pos())
    }
}
