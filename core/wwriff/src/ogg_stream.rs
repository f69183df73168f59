//! Ogg page framing (component C4) and the Ogg-aware bit writer built on
//! top of it (the second surface of component C1).
//!
//! Low-level page mechanics — capture pattern, CRC32, segment-table lacing,
//! beginning/end-of-stream flags — are delegated to the `ogg` crate, which
//! implements exactly the framing this crate's output must conform to.
//! What this module adds is the per-conversion serial number and the
//! granule-position bookkeeping the Wwise-RIFF reconstruction needs:
//! −1 for the header pages, 0 for the setup header, real sample counts for
//! audio pages.

use crate::error::WwriffResult;
use ogg::{PacketWriteEndInfo, PacketWriter};
use rand::Rng;
use std::io::Write;

/// How a packet being handed to the framer relates to page boundaries.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PageEnd {
    /// The packet does not end the current page.
    Continue,
    /// The packet ends the current page; a new page starts after it.
    EndPage,
    /// The packet ends the current page and the stream itself.
    EndStream,
}

/// Granule position carried by a page that is not yet defined in terms of
/// decoded samples (the three header pages).
pub const HEADER_GRANULE: i64 = -1;

/// Groups packets into CRC-checked, sequentially-numbered Ogg pages.
pub struct OggPageFramer<W: Write> {
    writer: PacketWriter<'static, W>,
    serial: u32,
}

impl<W: Write> OggPageFramer<W> {
    /// Create a framer with a randomly chosen serial number.
    pub fn new(output: W) -> Self {
        let serial = rand::rng().random::<u32>();
        Self::with_serial(output, serial)
    }

    /// Create a framer with an explicit serial number (useful for
    /// reproducing byte-identical output across runs in tests).
    pub fn with_serial(output: W, serial: u32) -> Self {
        Self {
            writer: PacketWriter::new(output),
            serial,
        }
    }

    /// The serial number assigned to every page this framer emits.
    pub fn serial(&self) -> u32 {
        self.serial
    }

    /// Hand one packet's bytes to the framer.
    pub fn write_packet(&mut self, data: Vec<u8>, end: PageEnd, granule: i64) -> WwriffResult<()> {
        let end_info = match end {
            PageEnd::Continue => PacketWriteEndInfo::NormalPacket,
            PageEnd::EndPage => PacketWriteEndInfo::EndPage,
            PageEnd::EndStream => PacketWriteEndInfo::EndStream,
        };
        self.writer
            .write_packet(data, self.serial, end_info, granule as u64)?;
        Ok(())
    }
}

/// Wraps a [`BitWriter`](crate::bitstream::BitWriter) together with an
/// [`OggPageFramer`]. Bits accumulate into the current packet buffer;
/// `flush_packet` freezes it; `flush_page` hands accumulated packets to
/// the framer.
pub struct OggBitWriter<W: Write> {
    bits: crate::bitstream::BitWriter,
    framer: OggPageFramer<W>,
    pending: Vec<Vec<u8>>,
}

impl<W: Write> OggBitWriter<W> {
    /// Wrap an output stream with a freshly randomized serial number.
    pub fn new(output: W) -> Self {
        Self {
            bits: crate::bitstream::BitWriter::new(),
            framer: OggPageFramer::new(output),
            pending: Vec::new(),
        }
    }

    /// Wrap an output stream with a fixed serial number.
    pub fn with_serial(output: W, serial: u32) -> Self {
        Self {
            bits: crate::bitstream::BitWriter::new(),
            framer: OggPageFramer::with_serial(output, serial),
            pending: Vec::new(),
        }
    }

    /// The serial number assigned to this stream.
    pub fn serial(&self) -> u32 {
        self.framer.serial()
    }

    /// Write the low `count` bits of `value` into the current packet.
    pub fn write_bits(&mut self, value: u32, count: u8) {
        self.bits.write_bits(value, count);
    }

    /// Freeze the bits written so far into a complete packet, queued for
    /// the next `flush_page`.
    pub fn flush_packet(&mut self) {
        let finished = std::mem::take(&mut self.bits).into_inner();
        self.pending.push(finished);
    }

    /// Deliver all packets queued since the last `flush_page` to the
    /// framer as one Ogg page. `granule` is stamped on the page (the
    /// granule position associated with its last completed packet).
    pub fn flush_page(&mut self, last: bool, granule: i64) -> WwriffResult<()> {
        let packets = std::mem::take(&mut self.pending);
        let count = packets.len();
        for (i, packet) in packets.into_iter().enumerate() {
            let is_last_in_page = i + 1 == count;
            let end = if !is_last_in_page {
                PageEnd::Continue
            } else if last {
                PageEnd::EndStream
            } else {
                PageEnd::EndPage
            };
            self.framer.write_packet(packet, end, granule)?;
        }
        Ok(())
    }
}
