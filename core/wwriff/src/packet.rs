//! Wwise compact audio packet header (part of component C5/C7).
//!
//! Each packet in the audio region is prefixed by a 2-byte little-endian
//! length, optionally followed by a 4-byte granule position when the
//! packet begins a new Ogg page in the source encoding.

use crate::error::WwriffResult;
use byteorder::{BigEndian, LittleEndian, ReadBytesExt};
use std::io::{Read, Seek, SeekFrom};

/// A parsed compact packet header: 2 bytes (length only) or 6 bytes
/// (length + granule), depending on `carries_granule`.
pub struct Packet {
    /// Size of the header itself, in bytes (2 or 6).
    pub header_size: u64,
    /// Offset of the packet payload, immediately following the header.
    pub offset: u64,
    /// Size of the packet payload in bytes.
    pub size: u32,
    /// Granule position carried by the header, or 0 when `carries_granule`
    /// was false.
    pub granule: u32,
    /// Offset of the next packet's header.
    pub next_offset: u64,
}

impl Packet {
    /// Read a packet header at `offset`.
    ///
    /// `carries_granule` selects the 6-byte form (length + granule) over
    /// the 2-byte form (length only, granule computed by the caller from
    /// running block-size accumulation).
    pub fn read<R: Read + Seek>(
        stream: &mut R,
        offset: u64,
        little_endian: bool,
        carries_granule: bool,
    ) -> WwriffResult<Self> {
        stream.seek(SeekFrom::Start(offset))?;

        if carries_granule {
            let size = read_u16(stream, little_endian)? as u32;
            let granule = read_u32(stream, little_endian)?;
            Ok(Self {
                header_size: 6,
                offset: offset + 6,
                size,
                granule,
                next_offset: offset + 6 + size as u64,
            })
        } else {
            let size = read_u16(stream, little_endian)? as u32;
            Ok(Self {
                header_size: 2,
                offset: offset + 2,
                size,
                granule: 0,
                next_offset: offset + 2 + size as u64,
            })
        }
    }
}

fn read_u16<R: Read>(stream: &mut R, little_endian: bool) -> WwriffResult<u16> {
    Ok(if little_endian {
        stream.read_u16::<LittleEndian>()?
    } else {
        stream.read_u16::<BigEndian>()?
    })
}

fn read_u32<R: Read>(stream: &mut R, little_endian: bool) -> WwriffResult<u32> {
    Ok(if little_endian {
        stream.read_u32::<LittleEndian>()?
    } else {
        stream.read_u32::<BigEndian>()?
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Cursor;

    #[test]
    fn short_header_little_endian() {
        let data = vec![0x02, 0x01]; // size = 258
        let mut cursor = Cursor::new(data);
        let packet = Packet::read(&mut cursor, 0, true, false).unwrap();
        assert_eq!(packet.header_size, 2);
        assert_eq!(packet.size, 258);
        assert_eq!(packet.granule, 0);
        assert_eq!(packet.next_offset, 2 + 258);
    }

    #[test]
    fn long_header_carries_granule() {
        let data = vec![0x00, 0x01, 0x01, 0x02, 0x03, 0x04]; // size=256, granule=0x04030201
        let mut cursor = Cursor::new(data);
        let packet = Packet::read(&mut cursor, 0, true, true).unwrap();
        assert_eq!(packet.header_size, 6);
        assert_eq!(packet.size, 256);
        assert_eq!(packet.granule, 0x04030201);
        assert_eq!(packet.next_offset, 6 + 256);
    }

    #[test]
    fn big_endian_header() {
        let data = vec![0x01, 0x00]; // size = 256
        let mut cursor = Cursor::new(data);
        let packet = Packet::read(&mut cursor, 0, false, false).unwrap();
        assert_eq!(packet.size, 256);
    }

    #[test]
    fn header_at_nonzero_offset() {
        let mut data = vec![0u8; 16];
        data[10] = 0x80;
        data[11] = 0x00;
        let mut cursor = Cursor::new(data);
        let packet = Packet::read(&mut cursor, 10, true, false).unwrap();
        assert_eq!(packet.offset, 12);
        assert_eq!(packet.size, 128);
    }

    #[test]
    fn truncated_header_is_an_error() {
        let data = vec![0x00u8];
        let mut cursor = Cursor::new(data);
        assert!(Packet::read(&mut cursor, 0, true, false).is_err());
    }
}
