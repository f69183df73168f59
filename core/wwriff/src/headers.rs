//! Vorbis header synthesis (component C6).
//!
//! Builds the three standard Vorbis headers — identification, comment,
//! setup — from the metadata [`RiffReader`](crate::riff::RiffReader)
//! exposes and the codebooks [`CodebookLibrary`](crate::codebook::CodebookLibrary)
//! supplies, and flushes each as its own Ogg page.

use crate::bitstream::{BitRead, BitReader, BitWriter};
use crate::codebook::CodebookLibrary;
use crate::error::{WwriffError, WwriffResult};
use crate::ogg_stream::{OggBitWriter, HEADER_GRANULE};
use crate::packet::Packet;
use crate::riff::RiffReader;
use crate::vorbis_helpers::ilog;
use std::io::{Read, Seek, SeekFrom, Write};

const VORBIS_SIGNATURE: &[u8] = b"vorbis";
const VENDOR_STRING: &str = "converted from Wwise RIFF by wwriff";

/// Per-mode block-flag table recovered from the setup header, needed by
/// the audio packet rewriter to restore mode/window bits.
pub struct ModeTable {
    pub blockflags: Vec<bool>,
    pub mode_bits: u8,
}

fn write_packet_header(writer: &mut BitWriter, packet_type: u8) {
    writer.write_bits(packet_type as u32, 8);
    for b in VORBIS_SIGNATURE {
        writer.write_bits(*b as u32, 8);
    }
}

/// Emit the identification, comment and setup headers onto `ogg`, one
/// page each, and return the mode table the packet rewriter needs.
pub fn write_headers<R: Read + Seek, W: Write>(
    riff: &mut RiffReader<R>,
    codebooks: &CodebookLibrary,
    inline_codebooks: bool,
    full_setup: bool,
    ogg: &mut OggBitWriter<W>,
) -> WwriffResult<ModeTable> {
    write_identification_packet(riff, ogg)?;
    ogg.flush_page(false, HEADER_GRANULE)?;

    write_comment_packet(riff, ogg)?;
    ogg.flush_page(false, HEADER_GRANULE)?;

    let modes = write_setup_packet(riff, codebooks, inline_codebooks, full_setup, ogg)?;
    ogg.flush_page(false, 0)?;

    Ok(modes)
}

fn write_identification_packet<R: Read + Seek, W: Write>(
    riff: &RiffReader<R>,
    ogg: &mut OggBitWriter<W>,
) -> WwriffResult<()> {
    let mut writer = BitWriter::new();
    write_packet_header(&mut writer, 1);
    writer.write_bits(0, 32); // vorbis_version
    writer.write_bits(riff.channels as u32, 8);
    writer.write_bits(riff.sample_rate, 32);
    writer.write_bits(0, 32); // bitrate_maximum
    writer.write_bits(riff.avg_bytes_per_second * 8, 32); // bitrate_nominal
    writer.write_bits(0, 32); // bitrate_minimum
    writer.write_bits(riff.blocksize_0_pow as u32, 4);
    writer.write_bits(riff.blocksize_1_pow as u32, 4);
    writer.write_bits(1, 1); // framing
    write_bytes(ogg, writer.into_inner());
    ogg.flush_packet();
    Ok(())
}

fn write_comment_packet<R: Read + Seek, W: Write>(
    riff: &RiffReader<R>,
    ogg: &mut OggBitWriter<W>,
) -> WwriffResult<()> {
    let mut writer = BitWriter::new();
    write_packet_header(&mut writer, 3);

    writer.write_bits(VENDOR_STRING.len() as u32, 32);
    for b in VENDOR_STRING.bytes() {
        writer.write_bits(b as u32, 8);
    }

    if riff.loop_count == 0 {
        writer.write_bits(0, 32);
    } else {
        writer.write_bits(2, 32);
        for comment in [
            format!("LoopStart={}", riff.loop_start),
            format!("LoopEnd={}", riff.loop_end),
        ] {
            writer.write_bits(comment.len() as u32, 32);
            for b in comment.bytes() {
                writer.write_bits(b as u32, 8);
            }
        }
    }

    writer.write_bits(1, 1); // framing
    write_bytes(ogg, writer.into_inner());
    ogg.flush_packet();
    Ok(())
}

fn write_setup_packet<R: Read + Seek, W: Write>(
    riff: &mut RiffReader<R>,
    codebooks: &CodebookLibrary,
    inline_codebooks: bool,
    full_setup: bool,
    ogg: &mut OggBitWriter<W>,
) -> WwriffResult<ModeTable> {
    let mut writer = BitWriter::new();
    write_packet_header(&mut writer, 5);

    let (data_offset, _) = riff.data_chunk()?;
    let little_endian = riff.little_endian();
    let carries_granule = riff.carries_granule;
    let setup_packet = Packet::read(
        &mut riff.input,
        data_offset + riff.setup_packet_offset as u64,
        little_endian,
        carries_granule,
    )?;
    if setup_packet.granule != 0 {
        return Err(WwriffError::bad_container("setup packet granule must be zero"));
    }

    riff.input.seek(SeekFrom::Start(setup_packet.offset))?;
    let mut reader = BitReader::new(&mut riff.input);

    let codebook_count_less1 = reader.read_bits(8)?;
    let codebook_count = codebook_count_less1 + 1;
    writer.write_bits(codebook_count_less1, 8);

    if inline_codebooks {
        for _ in 0..codebook_count {
            if full_setup {
                codebooks.copy(&mut reader, &mut writer)?;
            } else {
                codebooks.rebuild_from_reader(&mut reader, &mut writer)?;
            }
        }
    } else {
        for _ in 0..codebook_count {
            let codebook_id = reader.read_bits(10)?;
            codebooks.rebuild(codebook_id as usize, &mut writer)?;
        }
    }

    writer.write_bits(0, 6); // time-domain transform count - 1
    writer.write_bits(0, 16); // transform 0 is the only one Vorbis I defines

    let modes = if full_setup {
        while reader.total_bits_read() < setup_packet.size as u64 * 8 {
            writer.write_bits(reader.read_bits(1)?, 1);
        }
        writer.write_bits(1, 1); // framing
        ModeTable { blockflags: Vec::new(), mode_bits: 0 }
    } else {
        rebuild_setup(riff.channels, &mut reader, &mut writer, codebook_count)?
    };

    write_bytes(ogg, writer.into_inner());
    ogg.flush_packet();
    Ok(modes)
}

fn rebuild_setup<B: BitRead>(
    channels: u16,
    reader: &mut B,
    writer: &mut BitWriter,
    codebook_count: u32,
) -> WwriffResult<ModeTable> {
    let floor_count_less1 = reader.read_bits(6)?;
    let floor_count = floor_count_less1 + 1;
    writer.write_bits(floor_count_less1, 6);
    for _ in 0..floor_count {
        writer.write_bits(1, 16); // floor type 1
        rebuild_floor(reader, codebook_count, writer)?;
    }

    let residue_count_less1 = reader.read_bits(6)?;
    let residue_count = residue_count_less1 + 1;
    writer.write_bits(residue_count_less1, 6);
    for _ in 0..residue_count {
        rebuild_residue(reader, codebook_count, writer)?;
    }

    let mapping_count_less1 = reader.read_bits(6)?;
    let mapping_count = mapping_count_less1 + 1;
    writer.write_bits(mapping_count_less1, 6);
    for _ in 0..mapping_count {
        rebuild_mapping(channels, reader, floor_count, residue_count, writer)?;
    }

    let mode_count_less1 = reader.read_bits(6)?;
    let mode_count = mode_count_less1 + 1;
    writer.write_bits(mode_count_less1, 6);

    let mode_bits = ilog(mode_count - 1);
    let mut blockflags = Vec::with_capacity(mode_count as usize);

    for _ in 0..mode_count {
        let blockflag = reader.read_bits(1)?;
        writer.write_bits(blockflag, 1);
        blockflags.push(blockflag != 0);

        writer.write_bits(0, 16); // windowtype
        writer.write_bits(0, 16); // transformtype

        let mapping = reader.read_bits(8)?;
        writer.write_bits(mapping, 8);
        if mapping >= mapping_count {
            return Err(WwriffError::bad_container("mode references out-of-range mapping"));
        }
    }

    writer.write_bits(1, 1); // framing
    Ok(ModeTable { blockflags, mode_bits })
}

fn rebuild_floor<B: BitRead>(
    reader: &mut B,
    codebook_count: u32,
    writer: &mut BitWriter,
) -> WwriffResult<()> {
    let partitions = reader.read_bits(5)?;
    writer.write_bits(partitions, 5);

    let mut partition_classes = vec![0u32; partitions as usize];
    let mut max_class = 0u32;
    for class in partition_classes.iter_mut() {
        let c = reader.read_bits(4)?;
        writer.write_bits(c, 4);
        *class = c;
        max_class = max_class.max(c);
    }

    let mut class_dimensions = vec![0u32; (max_class + 1) as usize];
    for dimensions in class_dimensions.iter_mut() {
        let dims_less1 = reader.read_bits(3)?;
        writer.write_bits(dims_less1, 3);
        *dimensions = dims_less1 + 1;

        let subclasses = reader.read_bits(2)?;
        writer.write_bits(subclasses, 2);

        if subclasses != 0 {
            let masterbook = reader.read_bits(8)?;
            writer.write_bits(masterbook, 8);
            if masterbook >= codebook_count {
                return Err(WwriffError::bad_container("floor masterbook out of range"));
            }
        }

        for _ in 0..(1u32 << subclasses) {
            let subclass_book_plus1 = reader.read_bits(8)?;
            writer.write_bits(subclass_book_plus1, 8);
            let subclass_book = subclass_book_plus1 as i32 - 1;
            if subclass_book >= 0 && subclass_book as u32 >= codebook_count {
                return Err(WwriffError::bad_container("floor subclass book out of range"));
            }
        }
    }

    let multiplier_less1 = reader.read_bits(2)?;
    writer.write_bits(multiplier_less1, 2);

    let rangebits = reader.read_bits(4)?;
    writer.write_bits(rangebits, 4);

    for &class in &partition_classes {
        for _ in 0..class_dimensions[class as usize] {
            let x = reader.read_bits(rangebits as u8)?;
            writer.write_bits(x, rangebits as u8);
        }
    }

    Ok(())
}

fn rebuild_residue<B: BitRead>(
    reader: &mut B,
    codebook_count: u32,
    writer: &mut BitWriter,
) -> WwriffResult<()> {
    let residue_type = reader.read_bits(2)?;
    writer.write_bits(residue_type, 16);
    if residue_type > 2 {
        return Err(WwriffError::bad_container("reserved residue type"));
    }

    let begin = reader.read_bits(24)?;
    let end = reader.read_bits(24)?;
    let partition_size_less1 = reader.read_bits(24)?;
    let classifications_less1 = reader.read_bits(6)?;
    let classbook = reader.read_bits(8)?;

    writer.write_bits(begin, 24);
    writer.write_bits(end, 24);
    writer.write_bits(partition_size_less1, 24);
    writer.write_bits(classifications_less1, 6);
    writer.write_bits(classbook, 8);

    if classbook >= codebook_count {
        return Err(WwriffError::bad_container("residue classbook out of range"));
    }

    let classifications = classifications_less1 + 1;
    let mut cascades = vec![0u32; classifications as usize];
    for cascade in cascades.iter_mut() {
        let low = reader.read_bits(3)?;
        writer.write_bits(low, 3);
        let has_high = reader.read_bits(1)?;
        writer.write_bits(has_high, 1);
        let high = if has_high != 0 {
            let h = reader.read_bits(5)?;
            writer.write_bits(h, 5);
            h
        } else {
            0
        };
        *cascade = high * 8 + low;
    }

    for &cascade in &cascades {
        for bit in 0..8 {
            if cascade & (1 << bit) != 0 {
                let book = reader.read_bits(8)?;
                writer.write_bits(book, 8);
                if book >= codebook_count {
                    return Err(WwriffError::bad_container("residue book out of range"));
                }
            }
        }
    }

    Ok(())
}

fn rebuild_mapping<B: BitRead>(
    channels: u16,
    reader: &mut B,
    floor_count: u32,
    residue_count: u32,
    writer: &mut BitWriter,
) -> WwriffResult<()> {
    writer.write_bits(0, 16); // mapping type 0

    let submaps_flag = reader.read_bits(1)?;
    writer.write_bits(submaps_flag, 1);
    let submaps = if submaps_flag != 0 {
        let less1 = reader.read_bits(4)?;
        writer.write_bits(less1, 4);
        less1 + 1
    } else {
        1
    };

    let square_polar_flag = reader.read_bits(1)?;
    writer.write_bits(square_polar_flag, 1);
    if square_polar_flag != 0 {
        let steps_less1 = reader.read_bits(8)?;
        let steps = steps_less1 + 1;
        writer.write_bits(steps_less1, 8);

        let coupling_bits = ilog(channels as u32 - 1);
        for _ in 0..steps {
            let magnitude = reader.read_bits(coupling_bits)?;
            let angle = reader.read_bits(coupling_bits)?;
            writer.write_bits(magnitude, coupling_bits);
            writer.write_bits(angle, coupling_bits);
            if angle == magnitude || magnitude >= channels as u32 || angle >= channels as u32 {
                return Err(WwriffError::bad_container("invalid channel coupling"));
            }
        }
    }

    let reserved = reader.read_bits(2)?;
    writer.write_bits(reserved, 2);
    if reserved != 0 {
        return Err(WwriffError::bad_container("nonzero reserved mapping bits"));
    }

    if submaps > 1 {
        for _ in 0..channels {
            let mux = reader.read_bits(4)?;
            writer.write_bits(mux, 4);
            if mux >= submaps {
                return Err(WwriffError::bad_container("mapping mux out of range"));
            }
        }
    }

    for _ in 0..submaps {
        let time_config = reader.read_bits(8)?;
        writer.write_bits(time_config, 8);

        let floor_number = reader.read_bits(8)?;
        writer.write_bits(floor_number, 8);
        if floor_number >= floor_count {
            return Err(WwriffError::bad_container("submap floor out of range"));
        }

        let residue_number = reader.read_bits(8)?;
        writer.write_bits(residue_number, 8);
        if residue_number >= residue_count {
            return Err(WwriffError::bad_container("submap residue out of range"));
        }
    }

    Ok(())
}

fn write_bytes<W: Write>(ogg: &mut OggBitWriter<W>, bytes: Vec<u8>) {
    for b in bytes {
        ogg.write_bits(b as u32, 8);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::riff::ForcePacketFormat;
    use std::io::Cursor;

    fn le(v: u32) -> [u8; 4] {
        v.to_le_bytes()
    }

    /// Builds a minimal Wwise-RIFF file with a trivial external-codebooks
    /// setup packet: no codebooks, a single floor/residue/mapping/mode.
    fn build_minimal_wem() -> Vec<u8> {
        let mut fmt = Vec::new();
        fmt.extend_from_slice(&0xFFFFu16.to_le_bytes());
        fmt.extend_from_slice(&1u16.to_le_bytes()); // channels
        fmt.extend_from_slice(&44100u32.to_le_bytes());
        fmt.extend_from_slice(&88200u32.to_le_bytes());
        fmt.extend_from_slice(&0u16.to_le_bytes());
        fmt.extend_from_slice(&0u16.to_le_bytes());
        fmt.extend_from_slice(&0u16.to_le_bytes()); // no extra fmt bytes

        let mut setup = BitWriter::new();
        setup.write_bits(0, 8); // codebook_count_less1 -> 1 inline codebook follows

        // One trivial compact codebook: 1 dimension, 1 entry, unordered,
        // non-sparse, a single 1-bit codeword, no lookup table.
        setup.write_bits(1, 4); // dimensions
        setup.write_bits(1, 14); // entries
        setup.write_bits(0, 1); // ordered = false
        setup.write_bits(5, 3); // codeword_length_length
        setup.write_bits(0, 1); // sparse = false
        setup.write_bits(0, 5); // codeword length - 1 (length 1)
        setup.write_bits(0, 1); // lookup_type = 0

        setup.write_bits(0, 6); // floor_count_less1
        setup.write_bits(0, 5); // floor1_partitions = 0
        setup.write_bits(0, 2); // floor1_multiplier_less1
        setup.write_bits(0, 4); // rangebits
        setup.write_bits(0, 6); // residue_count_less1
        setup.write_bits(0, 2); // residue_type
        setup.write_bits(0, 24); // residue_begin
        setup.write_bits(0, 24); // residue_end
        setup.write_bits(0, 24); // partition_size_less1
        setup.write_bits(0, 6); // classifications_less1 -> 1 classification
        setup.write_bits(0, 8); // classbook (valid: < codebook_count == 1)
        setup.write_bits(0, 3); // cascade low bits
        setup.write_bits(0, 1); // no high bits
        setup.write_bits(0, 6); // mapping_count_less1
        setup.write_bits(0, 1); // submaps_flag = 0
        setup.write_bits(0, 1); // square_polar_flag = 0
        setup.write_bits(0, 2); // mapping reserved
        setup.write_bits(0, 8); // time_config
        setup.write_bits(0, 8); // floor_number
        setup.write_bits(0, 8); // residue_number
        setup.write_bits(0, 6); // mode_count_less1
        setup.write_bits(0, 1); // blockflag
        setup.write_bits(0, 8); // mapping index
        let setup_bytes = setup.into_inner();

        let mut data = Vec::new();
        data.extend_from_slice(&(setup_bytes.len() as u16).to_le_bytes());
        data.extend_from_slice(&setup_bytes);

        let mut vorb = Vec::new();
        vorb.extend_from_slice(&88200u32.to_le_bytes()); // total_pcm_frames
        vorb.extend_from_slice(&0x4Au32.to_le_bytes());
        vorb.extend_from_slice(&[0u8; 8]);
        vorb.extend_from_slice(&0u32.to_le_bytes()); // setup_packet_offset
        vorb.extend_from_slice(&(data.len() as u32).to_le_bytes()); // vorbis_data_offset
        while vorb.len() < 0x24 {
            vorb.push(0);
        }
        vorb.extend_from_slice(&0u32.to_le_bytes()); // codebook_hash
        vorb.push(8);
        vorb.push(11);

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
        out
    }

    #[test]
    fn identification_packet_has_expected_layout() {
        let wem = build_minimal_wem();
        let mut riff = RiffReader::open(Cursor::new(wem), ForcePacketFormat::NoForce).unwrap();
        let mut ogg = OggBitWriter::with_serial(Vec::new(), 1);
        let modes = write_headers(&mut riff, &CodebookLibrary::empty(), true, false, &mut ogg)
            .unwrap();
        assert_eq!(modes.blockflags, vec![false]);
        assert_eq!(modes.mode_bits, 0);
    }
}
