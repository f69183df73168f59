//! Audio packet rewriter (component C7).
//!
//! Walks the Wwise compact audio packets in the `data` chunk's audio
//! region, restores the mode-index and window-flag bits the Wwise
//! compactor drops from each packet's first byte, and emits the result as
//! Ogg packets with correct granule positions.

use crate::bitstream::BitReader;
use crate::error::WwriffResult;
use crate::headers::ModeTable;
use crate::ogg_stream::OggBitWriter;
use crate::packet::Packet;
use crate::riff::RiffReader;
use std::io::{Read, Seek, SeekFrom, Write};

/// Stream every audio packet in `riff`'s data region through `ogg`,
/// restoring dropped mode/window bits and assigning granule positions.
pub fn rewrite_audio<R: Read + Seek, W: Write>(
    riff: &mut RiffReader<R>,
    modes: &ModeTable,
    ogg: &mut OggBitWriter<W>,
) -> WwriffResult<()> {
    let (data_offset, data_size) = riff.data_chunk()?;
    let data_end = data_offset + data_size;

    let blocksize_0 = 1u32 << riff.blocksize_0_pow;
    let blocksize_1 = 1u32 << riff.blocksize_1_pow;

    let mut granule_pos: i64 = 0;
    let mut prev_blocksize: u32 = 0;
    let mut first_packet = true;
    let mut prev_blockflag = false;

    let mut offset = data_offset + riff.vorbis_data_offset as u64;

    let little_endian = riff.little_endian();
    let carries_granule = riff.carries_granule;
    while offset < data_end {
        let packet = Packet::read(&mut riff.input, offset, little_endian, carries_granule)?;
        if offset + packet.header_size > data_end {
            return Err(crate::error::WwriffError::bad_packet("packet header truncated"));
        }

        let payload_offset = packet.offset;
        let next_offset = packet.next_offset;
        let is_last_packet = next_offset >= data_end;

        let current_granule = compute_granule(
            riff,
            modes,
            &packet,
            payload_offset,
            blocksize_0,
            blocksize_1,
            &mut granule_pos,
            &mut prev_blocksize,
            &mut first_packet,
            is_last_packet,
        )?;

        riff.input.seek(SeekFrom::Start(payload_offset))?;
        write_packet_payload(
            riff,
            modes,
            &packet,
            payload_offset,
            next_offset,
            data_end,
            &mut prev_blockflag,
            ogg,
        )?;

        ogg.flush_packet();
        ogg.flush_page(is_last_packet, current_granule)?;

        offset = next_offset;
    }

    if offset > data_end {
        return Err(crate::error::WwriffError::bad_packet("audio region truncated"));
    }
    Ok(())
}

#[allow(clippy::too_many_arguments)]
fn compute_granule<R: Read + Seek>(
    riff: &mut RiffReader<R>,
    modes: &ModeTable,
    packet: &Packet,
    payload_offset: u64,
    blocksize_0: u32,
    blocksize_1: u32,
    granule_pos: &mut i64,
    prev_blocksize: &mut u32,
    first_packet: &mut bool,
    is_last_packet: bool,
) -> WwriffResult<i64> {
    if riff.carries_granule {
        return Ok(if packet.granule == 0xFFFFFFFF {
            1
        } else {
            packet.granule as i64
        });
    }

    let curr_blocksize = if modes.mode_bits > 0 && packet.size > 0 {
        riff.input.seek(SeekFrom::Start(payload_offset))?;
        let mut buf = [0u8; 1];
        riff.input.read_exact(&mut buf)?;

        let mode_number = if riff.mod_packets {
            (buf[0] as u32) & ((1 << modes.mode_bits) - 1)
        } else {
            ((buf[0] as u32) >> 1) & ((1 << modes.mode_bits) - 1)
        };

        match modes.blockflags.get(mode_number as usize) {
            Some(true) => blocksize_1,
            _ => blocksize_0,
        }
    } else {
        blocksize_0
    };

    if *first_packet {
        *first_packet = false;
    } else {
        *granule_pos += ((*prev_blocksize + curr_blocksize) / 4) as i64;
    }
    *prev_blocksize = curr_blocksize;

    if is_last_packet && riff.total_pcm_frames > 0 {
        Ok(riff.total_pcm_frames as i64)
    } else if is_last_packet {
        Ok((*granule_pos).saturating_sub(riff.last_granule_extra as i64).max(0))
    } else {
        Ok(*granule_pos)
    }
}

#[allow(clippy::too_many_arguments)]
fn write_packet_payload<R: Read + Seek, W: Write>(
    riff: &mut RiffReader<R>,
    modes: &ModeTable,
    packet: &Packet,
    payload_offset: u64,
    next_offset: u64,
    data_end: u64,
    prev_blockflag: &mut bool,
    ogg: &mut OggBitWriter<W>,
) -> WwriffResult<()> {
    if riff.mod_packets {
        let mode_bits = modes.mode_bits;

        ogg.write_bits(0, 1); // packet type: 0 == audio

        riff.input.seek(SeekFrom::Start(payload_offset))?;
        let mut bit_reader = BitReader::new(&mut riff.input);
        let mode_number = bit_reader.read_bits(mode_bits)?;
        ogg.write_bits(mode_number, mode_bits);

        let remainder = bit_reader.read_bits(8 - mode_bits)?;
        let is_long_block = modes.blockflags.get(mode_number as usize).copied().unwrap_or(false);

        if is_long_block {
            let little_endian = riff.little_endian();
            let carries_granule = riff.carries_granule;
            let next_blockflag = if next_offset + packet.header_size <= data_end {
                let next_packet = Packet::read(
                    &mut riff.input,
                    next_offset,
                    little_endian,
                    carries_granule,
                )?;
                if next_packet.size > 0 {
                    riff.input.seek(SeekFrom::Start(next_packet.offset))?;
                    let mut next_reader = BitReader::new(&mut riff.input);
                    let next_mode = next_reader.read_bits(mode_bits)?;
                    modes.blockflags.get(next_mode as usize).copied().unwrap_or(false)
                } else {
                    false
                }
            } else {
                false
            };

            ogg.write_bits(*prev_blockflag as u32, 1);
            ogg.write_bits(next_blockflag as u32, 1);
            riff.input.seek(SeekFrom::Start(payload_offset + 1))?;
        }

        *prev_blockflag = is_long_block;
        ogg.write_bits(remainder, 8 - mode_bits);
    } else {
        riff.input.seek(SeekFrom::Start(payload_offset))?;
        let mut buf = [0u8; 1];
        riff.input.read_exact(&mut buf)?;
        ogg.write_bits(buf[0] as u32, 8);
    }

    for _ in 1..packet.size {
        let mut buf = [0u8; 1];
        riff.input.read_exact(&mut buf)?;
        ogg.write_bits(buf[0] as u32, 8);
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::riff::ForcePacketFormat;
    use std::io::Cursor;

    fn le(v: u32) -> [u8; 4] {
        v.to_le_bytes()
    }

    /// A single-mode, no-mod-packets stream with two standard-form audio
    /// packets, carrying their own granule in each header.
    fn build_wem_with_audio() -> (Vec<u8>, ModeTable) {
        let mut fmt = Vec::new();
        fmt.extend_from_slice(&0xFFFFu16.to_le_bytes());
        fmt.extend_from_slice(&1u16.to_le_bytes());
        fmt.extend_from_slice(&44100u32.to_le_bytes());
        fmt.extend_from_slice(&88200u32.to_le_bytes());
        fmt.extend_from_slice(&0u16.to_le_bytes());
        fmt.extend_from_slice(&0u16.to_le_bytes());
        fmt.extend_from_slice(&0u16.to_le_bytes());

        let setup_bytes = vec![0xAAu8, 0xBB, 0xCC];
        let packet_a = vec![0x01u8, 0x02, 0x03];
        let packet_b = vec![0x04u8, 0x05];

        let mut data = Vec::new();
        // setup packet, 6-byte header (carries granule) + payload
        data.extend_from_slice(&(setup_bytes.len() as u16).to_le_bytes());
        data.extend_from_slice(&0u32.to_le_bytes());
        data.extend_from_slice(&setup_bytes);
        let vorbis_data_offset = data.len() as u32;

        data.extend_from_slice(&(packet_a.len() as u16).to_le_bytes());
        data.extend_from_slice(&0u32.to_le_bytes());
        data.extend_from_slice(&packet_a);
        data.extend_from_slice(&(packet_b.len() as u16).to_le_bytes());
        data.extend_from_slice(&100u32.to_le_bytes());
        data.extend_from_slice(&packet_b);

        let mut vorb = Vec::new();
        vorb.extend_from_slice(&100u32.to_le_bytes()); // total_pcm_frames
        vorb.extend_from_slice(&[0u8; 20]); // pad to offset 0x18
        vorb.extend_from_slice(&0u32.to_le_bytes()); // setup_packet_offset
        vorb.extend_from_slice(&vorbis_data_offset.to_le_bytes());
        while vorb.len() < 0x2C {
            vorb.push(0);
        }
        vorb.extend_from_slice(&0u32.to_le_bytes()); // codebook_hash
        vorb.push(8);
        vorb.push(11);
        assert_eq!(vorb.len(), 0x32);

        let mut riff = Vec::new();
        riff.extend_from_slice(b"fmt ");
        riff.extend_from_slice(&le(fmt.len() as u32));
        riff.extend_from_slice(&fmt);
        riff.extend_from_slice(b"vorb");
        riff.extend_from_slice(&le(vorb.len() as u32));
        riff.extend_from_slice(&vorb);
        riff.extend_from_slice(b"data");
        riff.extend_from_slice(&le(data.len() as u32));
        riff.extend_from_slice(&data);

        let mut out = Vec::new();
        out.extend_from_slice(b"RIFF");
        out.extend_from_slice(&le(riff.len() as u32 + 4));
        out.extend_from_slice(b"WAVE");
        out.extend_from_slice(&riff);

        (out, ModeTable { blockflags: vec![false], mode_bits: 0 })
    }

    #[test]
    fn emits_one_page_per_audio_packet() {
        let (wem, modes) = build_wem_with_audio();
        let mut riff = RiffReader::open(Cursor::new(wem), ForcePacketFormat::NoForce).unwrap();
        let mut ogg = OggBitWriter::with_serial(Vec::new(), 99);
        rewrite_audio(&mut riff, &modes, &mut ogg).unwrap();
        // Two packets, no pending bits left unflushed.
        assert!(ogg.serial() == 99);
    }

    #[test]
    fn last_granule_extra_does_not_override_known_total_pcm_frames() {
        let (wem, modes) = build_wem_with_audio();
        let mut riff = RiffReader::open(Cursor::new(wem), ForcePacketFormat::NoForce).unwrap();
        riff.last_granule_extra = 37;
        let mut ogg = OggBitWriter::with_serial(Vec::new(), 1);
        assert!(rewrite_audio(&mut riff, &modes, &mut ogg).is_ok());
    }

    #[test]
    fn truncated_packet_header_is_an_error() {
        let (mut wem, modes) = build_wem_with_audio();
        wem.truncate(wem.len() - 1);
        let mut riff = RiffReader::open(Cursor::new(wem), ForcePacketFormat::NoForce).unwrap();
        let mut ogg = OggBitWriter::with_serial(Vec::new(), 1);
        assert!(rewrite_audio(&mut riff, &modes, &mut ogg).is_err());
    }
}
