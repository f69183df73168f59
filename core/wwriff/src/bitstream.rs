//! Byte-packed, LSB-first bit stream readers and writer (component C1).
//!
//! All wire integers in a Wwise-RIFF file and in the Vorbis bitstreams it is
//! reconstructed into are little-endian, and bit fields are packed LSB-first
//! within each byte. The readers and the writer here are the common surface
//! every higher-level parser in this crate is built on.

use crate::error::{WwriffError, WwriffResult};
use std::io::Read;

/// Source of individual bits, LSB-first.
pub trait BitRead {
    /// Read a single bit.
    fn read_bit(&mut self) -> WwriffResult<bool>;

    /// Total number of bits consumed so far.
    fn total_bits_read(&self) -> u64;

    /// Read `count` bits (up to 32) and return them as a `u32`, LSB-first.
    fn read_bits(&mut self, count: u8) -> WwriffResult<u32> {
        if count > 32 {
            return Err(WwriffError::internal("cannot read more than 32 bits at once"));
        }

        let mut result = 0u32;
        for i in 0..count {
            if self.read_bit()? {
                result |= 1u32 << i;
            }
        }
        Ok(result)
    }
}

/// Reads bits LSB-first from any [`Read`] source.
pub struct BitReader<R: Read> {
    reader: R,
    current_byte: u8,
    bit_pos: u8,
    bytes_read: u64,
}

impl<R: Read> BitReader<R> {
    /// Wrap a byte source for bit-level reading.
    pub fn new(reader: R) -> Self {
        Self {
            reader,
            current_byte: 0,
            bit_pos: 0,
            bytes_read: 0,
        }
    }

    /// Total number of bits consumed so far.
    pub fn total_bits_read(&self) -> u64 {
        if self.bit_pos == 0 {
            self.bytes_read * 8
        } else {
            (self.bytes_read - 1) * 8 + self.bit_pos as u64
        }
    }

    /// Read a single bit, refilling the current byte from the source when
    /// the previous one has been exhausted.
    pub fn read_bit(&mut self) -> WwriffResult<bool> {
        if self.bit_pos == 0 {
            let mut buf = [0u8; 1];
            self.reader
                .read_exact(&mut buf)
                .map_err(|_| WwriffError::bad_packet("unexpected end of bit stream"))?;
            self.current_byte = buf[0];
            self.bytes_read += 1;
        }

        let bit = (self.current_byte & (1 << self.bit_pos)) != 0;
        self.bit_pos += 1;
        if self.bit_pos == 8 {
            self.bit_pos = 0;
        }
        Ok(bit)
    }

    /// Read `count` bits (up to 32) as a `u32`.
    pub fn read_bits(&mut self, count: u8) -> WwriffResult<u32> {
        BitRead::read_bits(self, count)
    }
}

impl<R: Read> BitRead for BitReader<R> {
    fn read_bit(&mut self) -> WwriffResult<bool> {
        BitReader::read_bit(self)
    }

    fn total_bits_read(&self) -> u64 {
        BitReader::total_bits_read(self)
    }
}

/// Reads bits LSB-first from an in-memory byte slice, with no I/O.
pub struct BitSliceReader<'a> {
    data: &'a [u8],
    byte_pos: usize,
    bit_pos: u8,
}

impl<'a> BitSliceReader<'a> {
    /// Wrap a byte slice for bit-level reading.
    pub fn new(data: &'a [u8]) -> Self {
        Self {
            data,
            byte_pos: 0,
            bit_pos: 0,
        }
    }

    /// Total number of bits consumed so far.
    pub fn total_bits_read(&self) -> u64 {
        self.byte_pos as u64 * 8 + self.bit_pos as u64
    }

    /// Read a single bit.
    pub fn read_bit(&mut self) -> WwriffResult<bool> {
        if self.byte_pos >= self.data.len() {
            return Err(WwriffError::bad_packet("unexpected end of bit stream"));
        }

        let bit = (self.data[self.byte_pos] & (1 << self.bit_pos)) != 0;
        self.bit_pos += 1;
        if self.bit_pos == 8 {
            self.bit_pos = 0;
            self.byte_pos += 1;
        }
        Ok(bit)
    }
}

impl BitRead for BitSliceReader<'_> {
    fn read_bit(&mut self) -> WwriffResult<bool> {
        BitSliceReader::read_bit(self)
    }

    fn total_bits_read(&self) -> u64 {
        BitSliceReader::total_bits_read(self)
    }
}

/// Accumulates bits LSB-first into a byte buffer.
///
/// `close`/[`into_inner`](Self::into_inner) pads the final partial byte
/// with zero bits, matching how a Vorbis packet's trailing bits are
/// defined to be read back (zero-extended).
#[derive(Default)]
pub struct BitWriter {
    buffer: Vec<u8>,
    bit_buffer: u8,
    bits_stored: u8,
}

impl BitWriter {
    /// Create an empty writer.
    pub fn new() -> Self {
        Self::default()
    }

    /// Write a single bit.
    pub fn write_bit(&mut self, bit: bool) {
        if bit {
            self.bit_buffer |= 1 << self.bits_stored;
        }
        self.bits_stored += 1;

        if self.bits_stored == 8 {
            self.buffer.push(self.bit_buffer);
            self.bit_buffer = 0;
            self.bits_stored = 0;
        }
    }

    /// Write the low `count` bits of `value`, LSB-first.
    pub fn write_bits(&mut self, value: u32, count: u8) {
        for i in 0..count {
            self.write_bit((value & (1 << i)) != 0);
        }
    }

    /// The bytes written so far, not including any unflushed partial byte.
    pub fn content(&self) -> &[u8] {
        &self.buffer
    }

    /// Consume the writer, padding and flushing any partial trailing byte.
    pub fn into_inner(mut self) -> Vec<u8> {
        if self.bits_stored > 0 {
            self.buffer.push(self.bit_buffer);
        }
        self.buffer
    }
}
