//! Wwise-RIFF to Ogg/Vorbis reconstruction.
//!
//! Wwise compacts Vorbis headers, codebooks and packet framing into a
//! custom RIFF container (`.wem`) to save space in a sound bank. This
//! crate reverses that compaction, parsing a `.wem` stream and emitting a
//! standards-conformant Ogg/Vorbis file any Vorbis decoder can play.
//!
//! ```no_run
//! use std::fs::File;
//! use std::io::BufReader;
//! use wwriff::{CodebookLibrary, ConversionOptions, Converter};
//!
//! # fn main() -> Result<(), wwriff::WwriffError> {
//! let input = BufReader::new(File::open("voice.wem")?);
//! let codebooks = CodebookLibrary::from_file("packed_codebooks.bin")?;
//! let mut converter = Converter::new(input, codebooks, ConversionOptions::new())?;
//!
//! let mut output = File::create("voice.ogg")?;
//! converter.convert(&mut output)?;
//! # Ok(())
//! # }
//! ```

pub mod bitstream;
pub mod codebook;
pub mod convert;
pub mod error;
pub mod headers;
pub mod ogg_stream;
pub mod packet;
pub mod rewriter;
pub mod riff;
pub mod vorbis_helpers;

pub use codebook::CodebookLibrary;
pub use convert::{ConversionOptions, Converter};
pub use error::{WwriffError, WwriffResult};
pub use riff::ForcePacketFormat;
