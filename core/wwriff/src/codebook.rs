//! Codebook library access and codebook rebuilding (components C2, C3).
//!
//! Wwise-RIFF Vorbis audio references precomputed codebooks by index into a
//! companion codebook library file, instead of embedding the full codebook
//! description. This module loads that library (a fixed binary asset, not
//! specified further here) and reconstructs spec-conformant Vorbis
//! codebooks from either a library entry or an inline compact codebook.

use crate::bitstream::{BitRead, BitSliceReader, BitWriter};
use crate::error::{WwriffError, WwriffResult};
use crate::vorbis_helpers::ilog;
use std::path::Path;

const CODEBOOK_SYNC: u32 = 0x564342; // "BCV" little-endian

/// Packed asset of the form `data_blob || offsets[0..N]`: the last four
/// bytes of the file locate the offset table, and codebook `i` spans
/// `[offsets[i], offsets[i+1])`. Index `N-1` is a sentinel, not an
/// addressable codebook.
///
/// A library file carries no self-describing identity of its own; which
/// `codebook_hash` value it answers for is something the caller that
/// bundled it knows (one hash per shipped library asset). [`with_identity_hash`](Self::with_identity_hash)
/// records that association so [`Converter::new`](crate::convert::Converter::new)
/// can catch a library/RIFF mismatch before any header is written.
#[derive(Clone)]
pub struct CodebookLibrary {
    data: Vec<u8>,
    offsets: Vec<usize>,
    identity_hash: Option<u32>,
}

impl CodebookLibrary {
    /// An empty library; every lookup fails with [`WwriffError::BadCodebook`].
    pub fn empty() -> Self {
        Self {
            data: Vec::new(),
            offsets: Vec::new(),
            identity_hash: None,
        }
    }

    /// Load a codebook library from a file on disk.
    pub fn from_file<P: AsRef<Path>>(path: P) -> WwriffResult<Self> {
        let data = std::fs::read(path)?;
        Self::from_bytes(&data)
    }

    /// Parse a codebook library already read into memory.
    pub fn from_bytes(data: &[u8]) -> WwriffResult<Self> {
        if data.len() < 4 {
            return Err(WwriffError::bad_codebook("codebook library too short"));
        }

        let len = data.len();
        let table_offset_bytes: [u8; 4] = data[len - 4..].try_into().unwrap();
        let table_offset = u32::from_le_bytes(table_offset_bytes) as usize;

        if table_offset >= len {
            return Err(WwriffError::bad_codebook("invalid codebook offset table"));
        }

        let table_len = len - 4 - table_offset;
        if !table_len.is_multiple_of(4) {
            return Err(WwriffError::bad_codebook("invalid codebook table size"));
        }

        let count = table_len / 4;
        let mut offsets = Vec::with_capacity(count);
        let table_bytes = &data[table_offset..len - 4];

        for i in 0..count {
            let entry_bytes: [u8; 4] = table_bytes[i * 4..(i + 1) * 4].try_into().unwrap();
            let offset = u32::from_le_bytes(entry_bytes) as usize;
            if offset > table_offset {
                return Err(WwriffError::bad_codebook("codebook offset out of range"));
            }
            offsets.push(offset);
        }

        Ok(Self {
            data: data[..table_offset].to_vec(),
            offsets,
            identity_hash: None,
        })
    }

    /// Record which `codebook_hash` this library answers for.
    pub fn with_identity_hash(mut self, hash: u32) -> Self {
        self.identity_hash = Some(hash);
        self
    }

    /// The `codebook_hash` this library was bundled under, if the caller
    /// that loaded it recorded one via [`with_identity_hash`](Self::with_identity_hash).
    pub fn identity_hash(&self) -> Option<u32> {
        self.identity_hash
    }

    /// Number of addressable codebooks (`N - 1`).
    pub fn codebook_count(&self) -> usize {
        self.offsets.len().saturating_sub(1)
    }

    /// Raw bytes of codebook `index` in its compact on-disk form.
    pub fn get_codebook(&self, index: usize) -> WwriffResult<&[u8]> {
        if index >= self.codebook_count() {
            return Err(WwriffError::bad_codebook(format!(
                "invalid codebook id {index}, try inline codebooks"
            )));
        }

        let start = self.offsets[index];
        let end = self.offsets[index + 1];
        if start > end || end > self.data.len() {
            return Err(WwriffError::bad_codebook("invalid codebook range"));
        }
        Ok(&self.data[start..end])
    }

    /// Size in bytes of codebook `index`, or -1 if out of range.
    pub fn get_codebook_size(&self, index: usize) -> i32 {
        if index >= self.codebook_count() {
            return -1;
        }
        (self.offsets[index + 1] - self.offsets[index]) as i32
    }

    /// Rebuild the library's codebook `index` onto `output`.
    pub fn rebuild(&self, index: usize, output: &mut BitWriter) -> WwriffResult<()> {
        let codebook = self.get_codebook(index)?;
        let mut reader = BitSliceReader::new(codebook);
        self.rebuild_internal(&mut reader, Some(codebook.len() as u32), output)
    }

    /// Copy a full (non-compact) codebook verbatim from `input` to `output`,
    /// for the inline/full-setup variant.
    pub fn copy<B: BitRead>(&self, input: &mut B, output: &mut BitWriter) -> WwriffResult<()> {
        let id = input.read_bits(24)?;
        let dimensions = input.read_bits(16)?;
        let entries = input.read_bits(24)?;

        if id != CODEBOOK_SYNC {
            return Err(WwriffError::bad_codebook("bad codebook sync pattern"));
        }

        output.write_bits(id, 24);
        output.write_bits(dimensions, 16);
        output.write_bits(entries, 24);

        self.rebuild_codeword_lengths(input, output, entries, true)?;

        let lookup_type = input.read_bits(4)?;
        output.write_bits(lookup_type, 4);
        Self::rebuild_lookup_table(input, output, entries, dimensions, lookup_type)
    }

    /// Rebuild a codebook from a raw compact bit stream not in the library
    /// (the inline-codebooks variant).
    pub fn rebuild_from_reader<B: BitRead>(
        &self,
        input: &mut B,
        output: &mut BitWriter,
    ) -> WwriffResult<()> {
        self.rebuild_internal(input, None, output)
    }

    fn rebuild_internal<B: BitRead>(
        &self,
        input: &mut B,
        codebook_size: Option<u32>,
        output: &mut BitWriter,
    ) -> WwriffResult<()> {
        let dimensions = input.read_bits(4)?;
        let entries = input.read_bits(14)?;

        output.write_bits(CODEBOOK_SYNC, 24);
        output.write_bits(dimensions, 16);
        output.write_bits(entries, 24);

        self.rebuild_codeword_lengths(input, output, entries, false)?;

        let lookup_type = input.read_bits(1)?;
        output.write_bits(lookup_type, 4);
        Self::rebuild_lookup_table(input, output, entries, dimensions, lookup_type)?;

        if let Some(size) = codebook_size
            && size != 0
        {
            let bytes_read = input.total_bits_read() / 8 + 1;
            if bytes_read != size as u64 {
                return Err(WwriffError::bad_codebook(format!(
                    "expected {size} bytes, read {bytes_read} - likely wrong codebook library"
                )));
            }
        }

        Ok(())
    }

    /// Shared ordered/sparse codeword-length rebuild, for both the compact
    /// form (read via `rebuild_internal`, which carries its own 3-bit
    /// `codeword_length_length` field) and the full form (read via `copy`,
    /// which always uses a fixed 5-bit width).
    fn rebuild_codeword_lengths<B: BitRead>(
        &self,
        input: &mut B,
        output: &mut BitWriter,
        entries: u32,
        is_full_form: bool,
    ) -> WwriffResult<()> {
        let ordered = input.read_bits(1)?;
        output.write_bits(ordered, 1);

        if ordered != 0 {
            let initial_length = input.read_bits(5)?;
            output.write_bits(initial_length, 5);

            let mut current_entry = 0u32;
            while current_entry < entries {
                let num_bits = ilog(entries - current_entry);
                let number = input.read_bits(num_bits)?;
                output.write_bits(number, num_bits);
                current_entry += number;
            }

            if current_entry > entries {
                return Err(WwriffError::bad_codebook("codeword run exceeds entry count"));
            }
            return Ok(());
        }

        let length_bits = if is_full_form {
            5
        } else {
            let codeword_length_length = input.read_bits(3)?;
            if codeword_length_length == 0 || codeword_length_length > 5 {
                return Err(WwriffError::bad_codebook("nonsense codeword length width"));
            }
            codeword_length_length as u8
        };

        let sparse = input.read_bits(1)?;
        output.write_bits(sparse, 1);

        for _ in 0..entries {
            let mut present = true;
            if sparse != 0 {
                let bit = input.read_bits(1)?;
                output.write_bits(bit, 1);
                present = bit != 0;
            }

            if present {
                let codeword_length = input.read_bits(length_bits)?;
                output.write_bits(codeword_length, 5);
            }
        }

        Ok(())
    }

    /// The quantval count for a type-1 codebook lookup table: the unique
    /// `v >= 1` such that `v^dimensions <= entries < (v+1)^dimensions`.
    ///
    /// Scans upward from 1 rather than refining a heuristic starting
    /// guess, since `v` is small in every real Vorbis codebook and a
    /// `checked_pow` per step avoids the overflow a saturating
    /// accumulator would otherwise need to guard against.
    fn book_map_type1_quantvals(entries: u32, dimensions: u32) -> u32 {
        if dimensions == 0 {
            return 0;
        }

        let entries = entries as u64;
        let mut v: u64 = 1;
        while let Some(next) = (v + 1).checked_pow(dimensions)
            && next <= entries
        {
            v += 1;
        }
        v as u32
    }

    /// Rebuild the lookup table following a codebook's codeword lengths.
    /// The caller has already written the spec-width 4-bit `lookup_type`
    /// field; this only handles what follows it.
    fn rebuild_lookup_table<B: BitRead>(
        input: &mut B,
        output: &mut BitWriter,
        entries: u32,
        dimensions: u32,
        lookup_type: u32,
    ) -> WwriffResult<()> {
        match lookup_type {
            0 => Ok(()),
            1 => {
                let min = input.read_bits(32)?;
                let delta = input.read_bits(32)?;
                let value_length = input.read_bits(4)?;
                let sequence_p = input.read_bits(1)?;
                output.write_bits(min, 32);
                output.write_bits(delta, 32);
                output.write_bits(value_length, 4);
                output.write_bits(sequence_p, 1);

                let quantvals = Self::book_map_type1_quantvals(entries, dimensions);
                for _ in 0..quantvals {
                    let val = input.read_bits((value_length + 1) as u8)?;
                    output.write_bits(val, (value_length + 1) as u8);
                }
                Ok(())
            }
            2 => {
                let min = input.read_bits(32)?;
                let delta = input.read_bits(32)?;
                let value_length = input.read_bits(4)?;
                let sequence_p = input.read_bits(1)?;
                output.write_bits(min, 32);
                output.write_bits(delta, 32);
                output.write_bits(value_length, 4);
                output.write_bits(sequence_p, 1);

                let quantvals = entries * dimensions;
                for _ in 0..quantvals {
                    let val = input.read_bits((value_length + 1) as u8)?;
                    output.write_bits(val, (value_length + 1) as u8);
                }
                Ok(())
            }
            _ => Err(WwriffError::bad_codebook(format!(
                "reserved lookup type {lookup_type}"
            ))),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn toy_library() -> Vec<u8> {
        // Two one-byte codebooks, no actual valid codebook content - just
        // exercises the offset-table framing.
        let mut data = vec![0xAAu8, 0xBBu8];
        let offsets_start = data.len() as u32;
        data.extend_from_slice(&0u32.to_le_bytes());
        data.extend_from_slice(&1u32.to_le_bytes());
        data.extend_from_slice(&2u32.to_le_bytes());
        data.extend_from_slice(&offsets_start.to_le_bytes());
        data
    }

    #[test]
    fn empty_library_has_no_codebooks() {
        let lib = CodebookLibrary::empty();
        assert_eq!(lib.codebook_count(), 0);
        assert_eq!(lib.get_codebook_size(0), -1);
        assert!(lib.get_codebook(0).is_err());
    }

    #[test]
    fn from_bytes_rejects_short_input() {
        assert!(CodebookLibrary::from_bytes(&[0, 1, 2]).is_err());
    }

    #[test]
    fn from_bytes_rejects_offset_past_table() {
        let mut data = vec![0u8; 8];
        data[4..8].copy_from_slice(&100u32.to_le_bytes());
        assert!(CodebookLibrary::from_bytes(&data).is_err());
    }

    #[test]
    fn from_bytes_parses_offset_table() {
        let raw = toy_library();
        let lib = CodebookLibrary::from_bytes(&raw).unwrap();
        assert_eq!(lib.codebook_count(), 2);
        assert_eq!(lib.get_codebook(0).unwrap(), &[0xAA]);
        assert_eq!(lib.get_codebook(1).unwrap(), &[0xBB]);
        assert_eq!(lib.get_codebook_size(0), 1);
        assert!(lib.get_codebook(2).is_err());
    }

    fn compact_codebook_bits(
        dimensions: u32,
        entries: u32,
        lengths: &[u32],
        lookup_type: u32,
    ) -> BitWriter {
        let mut w = BitWriter::new();
        w.write_bits(dimensions, 4);
        w.write_bits(entries, 14);
        w.write_bits(0, 1); // unordered
        w.write_bits(5, 3); // codeword_length_length
        w.write_bits(0, 1); // not sparse
        for &l in lengths {
            w.write_bits(l - 1, 5);
        }
        w.write_bits(lookup_type, 1);
        w
    }

    #[test]
    fn rebuild_lookup_type_0_produces_sync_and_widths() {
        let bits = compact_codebook_bits(2, 4, &[1, 2, 3, 3], 0);
        let bytes = bits.into_inner();
        let mut reader = BitSliceReader::new(&bytes);

        let lib = CodebookLibrary::empty();
        let mut out = BitWriter::new();
        lib.rebuild_from_reader(&mut reader, &mut out).unwrap();

        let out_bytes = out.into_inner();
        let mut check = BitSliceReader::new(&out_bytes);
        assert_eq!(check.read_bits(24).unwrap(), CODEBOOK_SYNC);
        assert_eq!(check.read_bits(16).unwrap(), 2);
        assert_eq!(check.read_bits(24).unwrap(), 4);
    }

    #[test]
    fn quantvals_bracket_entries() {
        assert_eq!(CodebookLibrary::book_map_type1_quantvals(8, 2), 2);
        assert_eq!(CodebookLibrary::book_map_type1_quantvals(27, 3), 3);
        assert_eq!(CodebookLibrary::book_map_type1_quantvals(16, 2), 4);
        assert_eq!(CodebookLibrary::book_map_type1_quantvals(9, 2), 3);
        assert_eq!(CodebookLibrary::book_map_type1_quantvals(1, 1), 1);
    }

    #[test]
    fn quantvals_inverse_holds_for_many_inputs() {
        for entries in 1..200u32 {
            for dimensions in 1..6u32 {
                let v = CodebookLibrary::book_map_type1_quantvals(entries, dimensions);
                let lo = (v as u64).pow(dimensions);
                let hi = (v as u64 + 1).pow(dimensions);
                assert!(lo <= entries as u64, "entries={entries} dims={dimensions}");
                assert!(hi > entries as u64, "entries={entries} dims={dimensions}");
            }
        }
    }

    #[test]
    fn rebuild_lookup_type_2_reads_entries_times_dimensions_multiplicands() {
        // Type 2 is only reachable through the full (`copy`) form in
        // practice (the compact form's 1-bit lookup_type field can only
        // encode 0 or 1), so exercise the lookup-table rebuild directly.
        let entries = 3u32;
        let dimensions = 2u32;
        let value_length = 3u32;
        let quantvals = entries * dimensions;

        let mut src = BitWriter::new();
        src.write_bits(0, 32); // min
        src.write_bits(0, 32); // delta
        src.write_bits(value_length, 4);
        src.write_bits(0, 1); // sequence_p
        for _ in 0..quantvals {
            src.write_bits(1, (value_length + 1) as u8);
        }
        let src_bytes = src.into_inner();
        let mut reader = BitSliceReader::new(&src_bytes);

        let mut out = BitWriter::new();
        CodebookLibrary::rebuild_lookup_table(&mut reader, &mut out, entries, dimensions, 2)
            .unwrap();

        let out_bytes = out.into_inner();
        let mut check = BitSliceReader::new(&out_bytes);
        assert_eq!(check.read_bits(32).unwrap(), 0); // min
        assert_eq!(check.read_bits(32).unwrap(), 0); // delta
        assert_eq!(check.read_bits(4).unwrap(), value_length);
        assert_eq!(check.read_bits(1).unwrap(), 0); // sequence_p
        for _ in 0..quantvals {
            assert_eq!(check.read_bits((value_length + 1) as u8).unwrap(), 1);
        }
    }

    #[test]
    fn rebuild_rejects_reserved_lookup_type() {
        let mut w = BitWriter::new();
        w.write_bits(0, 32);
        let bytes = w.into_inner();
        let mut reader = BitSliceReader::new(&bytes);
        let mut out = BitWriter::new();
        let err = CodebookLibrary::rebuild_lookup_table(&mut reader, &mut out, 4, 2, 3).unwrap_err();
        assert!(matches!(err, WwriffError::BadCodebook { .. }));
    }
}
