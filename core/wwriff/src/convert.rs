//! Top-level conversion pipeline: wires C5 (RIFF reader) through C6
//! (header synthesizer) and C7 (audio rewriter) onto C1+C4 (bit-packed,
//! Ogg-framed output).
//!
//! There is no module-level state: every value involved in a conversion —
//! the input stream, the codebook library, the Ogg writer — is owned by
//! the [`Converter`] the caller constructs and drops when done.

use crate::codebook::CodebookLibrary;
use crate::error::{WwriffError, WwriffResult};
use crate::headers::write_headers;
use crate::ogg_stream::OggBitWriter;
use crate::rewriter::rewrite_audio;
use crate::riff::{ForcePacketFormat, RiffReader};
use std::io::{Read, Seek, Write};

/// Configuration for a single Wwise-RIFF to Ogg/Vorbis conversion.
#[derive(Debug, Clone, Default)]
pub struct ConversionOptions {
    /// Codebooks are embedded inline in the setup packet rather than
    /// referenced by ID from an external [`CodebookLibrary`].
    pub inline_codebooks: bool,
    /// The setup packet already contains the full (non-compact) Vorbis
    /// setup structures, so floor/residue/mapping/mode need only be
    /// copied rather than reinflated.
    pub full_setup: bool,
    /// Override automatic mod-packet detection.
    pub force_packet_format: ForcePacketFormat,
}

impl ConversionOptions {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_inline_codebooks(mut self, value: bool) -> Self {
        self.inline_codebooks = value;
        self
    }

    pub fn with_full_setup(mut self, value: bool) -> Self {
        self.full_setup = value;
        self
    }

    pub fn with_force_packet_format(mut self, format: ForcePacketFormat) -> Self {
        self.force_packet_format = format;
        self
    }
}

/// Owns a parsed Wwise-RIFF input and a codebook library for the duration
/// of one conversion to Ogg/Vorbis.
pub struct Converter<R: Read + Seek> {
    riff: RiffReader<R>,
    codebooks: CodebookLibrary,
    options: ConversionOptions,
}

impl<R: Read + Seek> Converter<R> {
    /// Parse `input` and prepare to convert it with `codebooks` and
    /// `options`.
    pub fn new(input: R, codebooks: CodebookLibrary, options: ConversionOptions) -> WwriffResult<Self> {
        let riff = RiffReader::open(input, options.force_packet_format)?;

        if !options.inline_codebooks
            && let Some(expected) = codebooks.identity_hash()
            && expected != riff.codebook_hash()
        {
            return Err(WwriffError::bad_codebook(format!(
                "codebook hash mismatch: library is {expected:#010x}, file expects {:#010x}",
                riff.codebook_hash()
            )));
        }

        Ok(Self {
            riff,
            codebooks,
            options,
        })
    }

    /// The channel count of the source audio.
    pub fn channels(&self) -> u16 {
        self.riff.channels()
    }

    /// The sample rate of the source audio, in Hz.
    pub fn sample_rate(&self) -> u32 {
        self.riff.sample_rate()
    }

    /// The decoded PCM frame count the output stream should end at.
    pub fn total_pcm_frames(&self) -> u32 {
        self.riff.total_pcm_frames()
    }

    /// Write a complete Ogg/Vorbis stream to `output`: identification,
    /// comment and setup headers, each on their own page, followed by
    /// every audio packet with a restored mode/window prefix and a
    /// correct granule position.
    pub fn convert<W: Write>(&mut self, output: W) -> WwriffResult<()> {
        let mut ogg = OggBitWriter::new(output);
        let modes = write_headers(
            &mut self.riff,
            &self.codebooks,
            self.options.inline_codebooks,
            self.options.full_setup,
            &mut ogg,
        )?;
        rewrite_audio(&mut self.riff, &modes, &mut ogg)
    }

    /// Same as [`convert`](Self::convert) but with a fixed Ogg serial
    /// number, for reproducing byte-identical output across runs.
    pub fn convert_with_serial<W: Write>(&mut self, output: W, serial: u32) -> WwriffResult<()> {
        let mut ogg = OggBitWriter::with_serial(output, serial);
        let modes = write_headers(
            &mut self.riff,
            &self.codebooks,
            self.options.inline_codebooks,
            self.options.full_setup,
            &mut ogg,
        )?;
        rewrite_audio(&mut self.riff, &modes, &mut ogg)
    }
}
