//! Wwise-RIFF container reader (component C5).
//!
//! Parses the `RIFF`/`RIFX`+`WAVE` envelope, locates `fmt `, `cue `, `smpl`,
//! `vorb` and `data` chunks, and exposes the scattered Wwise Vorbis
//! metadata needed by the header synthesizer and packet rewriter. Only the
//! Wwise Vorbis variant (`fmt` tag `0xFFFF`) is handled here; PCM and ADPCM
//! pass-through are out of scope.

use crate::error::{WwriffError, WwriffResult};
use byteorder::{BigEndian, LittleEndian, ReadBytesExt};
use std::io::{Read, Seek, SeekFrom};

/// Whether to treat ambiguous packet formats as carrying injected
/// mode/window bits.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum ForcePacketFormat {
    /// Detect from the `vorb` chunk's mod-signal field.
    #[default]
    NoForce,
    /// Always treat audio packets as missing mode/window bits.
    ForceModPackets,
    /// Always treat audio packets as standard Vorbis packets.
    ForceNoModPackets,
}

#[derive(Debug, Clone, Copy, Default)]
struct ChunkLocation {
    offset: u64,
    size: u64,
}

#[derive(Debug, Clone, Default)]
struct ChunkInfo {
    fmt: Option<ChunkLocation>,
    cue: Option<ChunkLocation>,
    smpl: Option<ChunkLocation>,
    vorb: Option<ChunkLocation>,
    data: Option<ChunkLocation>,
}

/// Parsed Wwise-RIFF Vorbis container.
///
/// Holds the input stream for the lifetime of a conversion and exposes the
/// metadata fields [`headers`](crate::headers) and
/// [`rewriter`](crate::rewriter) need. Construct with [`RiffReader::open`].
#[allow(dead_code)]
#[derive(Debug)]
pub struct RiffReader<R: Read + Seek> {
    pub(crate) input: R,
    little_endian: bool,
    file_size: u64,
    riff_size: u64,
    chunks: ChunkInfo,

    pub(crate) channels: u16,
    pub(crate) sample_rate: u32,
    pub(crate) avg_bytes_per_second: u32,

    cue_count: u32,

    pub(crate) loop_count: u32,
    pub(crate) loop_start: u32,
    pub(crate) loop_end: u32,

    pub(crate) total_pcm_frames: u32,
    pub(crate) codebook_hash: u32,
    pub(crate) blocksize_0_pow: u8,
    pub(crate) blocksize_1_pow: u8,
    /// Offset, within the `data` chunk, of the setup packet.
    pub(crate) setup_packet_offset: u32,
    /// Offset, within the `data` chunk, where the audio region begins.
    /// Corresponds to the specification's `vorbis_data_offset`.
    pub(crate) vorbis_data_offset: u32,
    /// Trailing sample count to trim from the final page's granule.
    /// Present only in the newest `vorb` chunk layout; defaults to 0.
    pub(crate) last_granule_extra: u32,

    /// True when each audio packet header carries its own 4-byte granule
    /// (the opposite of the compact 2-byte-only header form).
    pub(crate) carries_granule: bool,
    /// True when audio packets are missing their mode/window bits and the
    /// rewriter must restore them.
    pub(crate) mod_packets: bool,
    prefetch: bool,
}

impl<R: Read + Seek> RiffReader<R> {
    /// Parse a Wwise-RIFF Vorbis stream, locating all chunks and metadata
    /// needed for conversion.
    pub fn open(input: R, force_packet_format: ForcePacketFormat) -> WwriffResult<Self> {
        let mut reader = Self::new_unparsed(input)?;
        reader.read_chunks()?;
        reader.parse_fmt_chunk()?;
        reader.parse_cue_chunk()?;
        reader.parse_smpl_chunk()?;
        reader.parse_vorb_chunk(force_packet_format)?;
        reader.rescale_for_prefetch()?;
        reader.validate_loops()?;
        Ok(reader)
    }

    fn new_unparsed(mut input: R) -> WwriffResult<Self> {
        input.seek(SeekFrom::End(0))?;
        let file_size = input.stream_position()?;
        input.seek(SeekFrom::Start(0))?;

        let mut riff_head = [0u8; 4];
        input.read_exact(&mut riff_head)?;
        let little_endian = match &riff_head {
            b"RIFF" => true,
            b"RIFX" => false,
            _ => return Err(WwriffError::bad_container("missing RIFF/RIFX magic")),
        };

        let riff_size = read_u32(&mut input, little_endian)? as u64 + 8;

        let mut wave_head = [0u8; 4];
        input.read_exact(&mut wave_head)?;
        if &wave_head != b"WAVE" {
            return Err(WwriffError::bad_container("missing WAVE magic"));
        }

        Ok(Self {
            input,
            little_endian,
            file_size,
            riff_size,
            chunks: ChunkInfo::default(),
            channels: 0,
            sample_rate: 0,
            avg_bytes_per_second: 0,
            cue_count: 0,
            loop_count: 0,
            loop_start: 0,
            loop_end: 0,
            total_pcm_frames: 0,
            codebook_hash: 0,
            blocksize_0_pow: 0,
            blocksize_1_pow: 0,
            setup_packet_offset: 0,
            vorbis_data_offset: 0,
            last_granule_extra: 0,
            carries_granule: false,
            mod_packets: false,
            prefetch: false,
        })
    }

    fn read_u32(&mut self) -> WwriffResult<u32> {
        read_u32(&mut self.input, self.little_endian)
    }

    fn read_u16(&mut self) -> WwriffResult<u16> {
        Ok(if self.little_endian {
            self.input.read_u16::<LittleEndian>()?
        } else {
            self.input.read_u16::<BigEndian>()?
        })
    }

    fn read_byte(&mut self) -> WwriffResult<u8> {
        Ok(self.input.read_u8()?)
    }

    fn read_chunks(&mut self) -> WwriffResult<()> {
        let mut chunk_offset: u64 = 12;

        while chunk_offset < self.riff_size && chunk_offset < self.file_size {
            self.input.seek(SeekFrom::Start(chunk_offset))?;

            let mut chunk_type = [0u8; 4];
            if self.input.read_exact(&mut chunk_type).is_err() {
                break;
            }
            let chunk_size = match self.read_u32() {
                Ok(s) => s as u64,
                Err(_) => break,
            };

            let data_offset = chunk_offset + 8;
            match &chunk_type {
                b"fmt " => self.chunks.fmt = Some(ChunkLocation { offset: data_offset, size: chunk_size }),
                b"cue " => self.chunks.cue = Some(ChunkLocation { offset: data_offset, size: chunk_size }),
                b"smpl" => self.chunks.smpl = Some(ChunkLocation { offset: data_offset, size: chunk_size }),
                b"vorb" => self.chunks.vorb = Some(ChunkLocation { offset: data_offset, size: chunk_size }),
                b"data" => {
                    if data_offset + chunk_size > self.file_size {
                        self.prefetch = true;
                        let available = self.file_size.saturating_sub(data_offset);
                        self.chunks.data = Some(ChunkLocation { offset: data_offset, size: available });
                    } else {
                        self.chunks.data = Some(ChunkLocation { offset: data_offset, size: chunk_size });
                    }
                }
                _ => {}
            }

            chunk_offset += 8 + chunk_size;
        }

        if self.chunks.fmt.is_none() || self.chunks.data.is_none() {
            return Err(WwriffError::bad_container("missing fmt or data chunk"));
        }
        Ok(())
    }

    fn parse_fmt_chunk(&mut self) -> WwriffResult<()> {
        let fmt = self.chunks.fmt.expect("checked in read_chunks");
        let fmt_size = fmt.size;

        if self.chunks.vorb.is_none() && fmt_size != 0x42 {
            return Err(WwriffError::bad_container("expected 0x42 fmt chunk when vorb is absent"));
        }
        if self.chunks.vorb.is_some() && fmt_size != 0x28 && fmt_size != 0x18 && fmt_size != 0x12 {
            return Err(WwriffError::bad_container("unexpected fmt chunk size"));
        }

        if self.chunks.vorb.is_none() && fmt_size == 0x42 {
            self.chunks.vorb = Some(ChunkLocation { offset: fmt.offset + 0x18, size: fmt_size - 0x18 });
        }

        self.input.seek(SeekFrom::Start(fmt.offset))?;
        if self.read_u16()? != 0xFFFF {
            return Err(WwriffError::unsupported_format("fmt tag is not Wwise Vorbis (0xFFFF)"));
        }

        self.channels = self.read_u16()?;
        self.sample_rate = self.read_u32()?;
        self.avg_bytes_per_second = self.read_u32()?;

        if self.read_u16()? != 0 {
            return Err(WwriffError::bad_container("expected zero block align"));
        }
        if self.read_u16()? != 0 {
            return Err(WwriffError::bad_container("expected zero bits per sample"));
        }
        let extra_fmt_len = fmt_size - 0x12;
        if self.read_u16()? != extra_fmt_len as u16 {
            return Err(WwriffError::bad_container("inconsistent extra fmt length"));
        }

        // Extra fmt bytes (channel-mask/subtype extensible fields) carry
        // nothing this crate needs; skip past however many are present.
        self.input
            .seek(SeekFrom::Current(extra_fmt_len.min(6) as i64))?;

        if fmt_size == 0x28 {
            let expected: [u8; 16] = [
                1, 0, 0, 0, 0, 0, 0x10, 0, 0x80, 0, 0, 0xAA, 0, 0x38, 0x9b, 0x71,
            ];
            let mut signature = [0u8; 16];
            self.input.read_exact(&mut signature)?;
            if signature != expected {
                return Err(WwriffError::bad_container("unexpected extensible fmt signature"));
            }
        }
        Ok(())
    }

    fn parse_cue_chunk(&mut self) -> WwriffResult<()> {
        if let Some(cue) = self.chunks.cue {
            self.input.seek(SeekFrom::Start(cue.offset))?;
            self.cue_count = self.read_u32()?;
        }
        Ok(())
    }

    fn parse_smpl_chunk(&mut self) -> WwriffResult<()> {
        if let Some(smpl) = self.chunks.smpl {
            self.input.seek(SeekFrom::Start(smpl.offset + 0x1C))?;
            self.loop_count = self.read_u32()?;
            if self.loop_count != 1 {
                return Err(WwriffError::bad_container("expected exactly one sample loop"));
            }
            self.input.seek(SeekFrom::Start(smpl.offset + 0x2C))?;
            self.loop_start = self.read_u32()?;
            self.loop_end = self.read_u32()?;
        }
        Ok(())
    }

    fn parse_vorb_chunk(&mut self, force_packet_format: ForcePacketFormat) -> WwriffResult<()> {
        let vorb = self
            .chunks
            .vorb
            .ok_or_else(|| WwriffError::bad_container("missing vorb chunk"))?;

        match vorb.size {
            0x28 | 0x2C => {
                return Err(WwriffError::unsupported_format(
                    "legacy vorb layout (old packet headers) is not a supported Vorbis variant",
                ));
            }
            0x2A | 0x32 | 0x34 => {}
            _ => return Err(WwriffError::bad_container("unrecognized vorb chunk size")),
        }

        self.input.seek(SeekFrom::Start(vorb.offset))?;
        self.total_pcm_frames = self.read_u32()?;

        if vorb.size == 0x2A {
            self.carries_granule = false;
            self.input.seek(SeekFrom::Start(vorb.offset + 0x4))?;
            let mod_signal = self.read_u32()?;
            self.mod_packets = !matches!(mod_signal, 0x4A | 0x4B | 0x69 | 0x70);
            self.input.seek(SeekFrom::Start(vorb.offset + 0x10))?;
        } else {
            self.carries_granule = true;
            self.input.seek(SeekFrom::Start(vorb.offset + 0x18))?;
        }

        match force_packet_format {
            ForcePacketFormat::ForceModPackets => self.mod_packets = true,
            ForcePacketFormat::ForceNoModPackets => self.mod_packets = false,
            ForcePacketFormat::NoForce => {}
        }

        self.setup_packet_offset = self.read_u32()?;
        self.vorbis_data_offset = self.read_u32()?;

        match vorb.size {
            0x2A => self.input.seek(SeekFrom::Start(vorb.offset + 0x24))?,
            0x32 | 0x34 => self.input.seek(SeekFrom::Start(vorb.offset + 0x2C))?,
            _ => unreachable!(),
        };

        self.codebook_hash = self.read_u32()?;
        self.blocksize_0_pow = self.read_byte()?;
        self.blocksize_1_pow = self.read_byte()?;

        if vorb.size == 0x34 {
            self.input.seek(SeekFrom::Start(vorb.offset + 0x32))?;
            self.last_granule_extra = self.read_u16()? as u32;
        }

        Ok(())
    }

    fn rescale_for_prefetch(&mut self) -> WwriffResult<()> {
        if !self.prefetch {
            return Ok(());
        }
        let Some(data_loc) = self.chunks.data else {
            return Ok(());
        };
        self.input.seek(SeekFrom::Start(data_loc.offset - 4))?;
        let original_size = self.read_u32()? as u64;
        if original_size > 0 {
            self.total_pcm_frames =
                ((self.total_pcm_frames as u64 * data_loc.size) / original_size) as u32;
        }
        Ok(())
    }

    fn validate_loops(&mut self) -> WwriffResult<()> {
        if self.loop_count == 0 {
            return Ok(());
        }
        if self.loop_end == 0 {
            self.loop_end = self.total_pcm_frames;
        } else {
            self.loop_end += 1;
        }

        if self.loop_start >= self.total_pcm_frames
            || self.loop_end > self.total_pcm_frames
            || self.loop_start > self.loop_end
        {
            return Err(WwriffError::bad_container("loop points out of range"));
        }
        Ok(())
    }

    /// Whether RIFF words in this file are little-endian (`RIFF`) or
    /// big-endian (`RIFX`).
    pub fn little_endian(&self) -> bool {
        self.little_endian
    }

    /// Channel count from the `fmt` chunk.
    pub fn channels(&self) -> u16 {
        self.channels
    }

    /// Sample rate in Hz.
    pub fn sample_rate(&self) -> u32 {
        self.sample_rate
    }

    /// Total decoded PCM frame count, the expected final granule position.
    pub fn total_pcm_frames(&self) -> u32 {
        self.total_pcm_frames
    }

    /// Identifies which bundled codebook library this file's compact
    /// codebooks were compacted against.
    pub fn codebook_hash(&self) -> u32 {
        self.codebook_hash
    }

    /// Offset and size of the `data` chunk.
    pub(crate) fn data_chunk(&self) -> WwriffResult<(u64, u64)> {
        let data = self
            .chunks
            .data
            .ok_or_else(|| WwriffError::internal("data chunk location lost after open"))?;
        Ok((data.offset, data.size))
    }
}

fn read_u32<R: Read>(input: &mut R, little_endian: bool) -> WwriffResult<u32> {
    Ok(if little_endian {
        input.read_u32::<LittleEndian>()?
    } else {
        input.read_u32::<BigEndian>()?
    })
}
