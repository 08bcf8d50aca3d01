//! Octet-level reader/writer helpers for the NAS codec

use thiserror::Error;

/// NAS codec failures.
#[derive(Debug, Error)]
pub enum CodecError {
    /// The buffer ended before the structure was complete.
    #[error("truncated NAS message")]
    Truncated,

    /// The message type octet is not one this tester models.
    #[error("unknown NAS message type {0:#04x}")]
    UnknownMessageType(u8),

    /// Structurally invalid content.
    #[error("invalid NAS content: {0}")]
    Invalid(String),

    /// The NAS MAC did not verify against the local security context.
    #[error("NAS integrity check failed")]
    IntegrityFailure,
}

/// Growable octet writer.
#[derive(Debug, Default)]
pub struct Writer {
    buf: Vec<u8>,
}

impl Writer {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn u8(&mut self, v: u8) {
        self.buf.push(v);
    }

    pub fn u16(&mut self, v: u16) {
        self.buf.extend_from_slice(&v.to_be_bytes());
    }

    pub fn bytes(&mut self, v: &[u8]) {
        self.buf.extend_from_slice(v);
    }

    /// Length-value with a one-octet length.
    pub fn lv(&mut self, v: &[u8]) {
        debug_assert!(v.len() <= u8::MAX as usize);
        self.u8(v.len() as u8);
        self.bytes(v);
    }

    /// Length-value with a two-octet length (LV-E).
    pub fn lv16(&mut self, v: &[u8]) {
        debug_assert!(v.len() <= u16::MAX as usize);
        self.u16(v.len() as u16);
        self.bytes(v);
    }

    /// Tag-length-value with a one-octet length.
    pub fn tlv(&mut self, tag: u8, v: &[u8]) {
        self.u8(tag);
        self.lv(v);
    }

    /// Tag-length-value with a two-octet length (TLV-E).
    pub fn tlv16(&mut self, tag: u8, v: &[u8]) {
        self.u8(tag);
        self.lv16(v);
    }

    pub fn finish(self) -> Vec<u8> {
        self.buf
    }
}

/// Cursor over a received octet buffer.
#[derive(Debug)]
pub struct Reader<'a> {
    data: &'a [u8],
    pos: usize,
}

impl<'a> Reader<'a> {
    pub fn new(data: &'a [u8]) -> Self {
        Self { data, pos: 0 }
    }

    pub fn remaining(&self) -> usize {
        self.data.len() - self.pos
    }

    pub fn is_empty(&self) -> bool {
        self.remaining() == 0
    }

    pub fn u8(&mut self) -> Result<u8, CodecError> {
        let v = *self.data.get(self.pos).ok_or(CodecError::Truncated)?;
        self.pos += 1;
        Ok(v)
    }

    /// Returns the next octet without consuming it.
    pub fn peek(&self) -> Option<u8> {
        self.data.get(self.pos).copied()
    }

    pub fn u16(&mut self) -> Result<u16, CodecError> {
        let hi = self.u8()?;
        let lo = self.u8()?;
        Ok(u16::from_be_bytes([hi, lo]))
    }

    pub fn take(&mut self, n: usize) -> Result<&'a [u8], CodecError> {
        if self.remaining() < n {
            return Err(CodecError::Truncated);
        }
        let out = &self.data[self.pos..self.pos + n];
        self.pos += n;
        Ok(out)
    }

    /// Length-value with a one-octet length.
    pub fn lv(&mut self) -> Result<&'a [u8], CodecError> {
        let len = self.u8()? as usize;
        self.take(len)
    }

    /// Length-value with a two-octet length (LV-E).
    pub fn lv16(&mut self) -> Result<&'a [u8], CodecError> {
        let len = self.u16()? as usize;
        self.take(len)
    }
}
