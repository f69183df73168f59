use anyhow::{Context, Result};
use clap::Subcommand;
use std::fs::File;
use std::io::BufReader;
use std::path::PathBuf;
use wwriff::{CodebookLibrary, ConversionOptions, Converter, ForcePacketFormat};

#[derive(Subcommand)]
pub enum ConvertCommands {
    /// Reconstruct an Ogg/Vorbis stream from a Wwise-RIFF (.wem) file
    Wem {
        /// Input .wem file
        input: PathBuf,
        /// Output .ogg file (defaults to the input path with an .ogg extension)
        #[arg(short, long)]
        output: Option<PathBuf>,
        /// External packed codebooks library, required unless the setup
        /// packet embeds its codebooks inline
        #[arg(short, long)]
        codebooks: Option<PathBuf>,
        /// `codebook_hash` the codebooks library above was bundled under
        /// (hex, e.g. 0xDEADBEEF); aborts before writing anything if it
        /// doesn't match the input file's own `codebook_hash`
        #[arg(long, value_parser = parse_hash)]
        expect_codebook_hash: Option<u32>,
        /// Codebooks are embedded inline in the setup packet
        #[arg(long)]
        inline_codebooks: bool,
        /// The setup packet already contains full (non-compact) Vorbis
        /// setup structures
        #[arg(long)]
        full_setup: bool,
        /// Treat audio packets as missing mode/window bits, overriding
        /// detection from the vorb chunk
        #[arg(long, conflicts_with = "force_no_mod_packets")]
        force_mod_packets: bool,
        /// Treat audio packets as standard Vorbis packets, overriding
        /// detection from the vorb chunk
        #[arg(long)]
        force_no_mod_packets: bool,
    },
}

fn parse_hash(s: &str) -> Result<u32, std::num::ParseIntError> {
    u32::from_str_radix(s.trim_start_matches("0x").trim_start_matches("0X"), 16)
}

pub fn handle(cmd: ConvertCommands) -> Result<()> {
    match cmd {
        ConvertCommands::Wem {
            input,
            output,
            codebooks,
            expect_codebook_hash,
            inline_codebooks,
            full_setup,
            force_mod_packets,
            force_no_mod_packets,
        } => {
            let output = output.unwrap_or_else(|| input.with_extension("ogg"));

            let codebooks = match codebooks {
                Some(path) => CodebookLibrary::from_file(&path)
                    .with_context(|| format!("loading codebooks from {}", path.display()))?,
                None => CodebookLibrary::empty(),
            };
            let codebooks = match expect_codebook_hash {
                Some(hash) => codebooks.with_identity_hash(hash),
                None => codebooks,
            };

            let force_packet_format = if force_mod_packets {
                ForcePacketFormat::ForceModPackets
            } else if force_no_mod_packets {
                ForcePacketFormat::ForceNoModPackets
            } else {
                ForcePacketFormat::NoForce
            };

            let options = ConversionOptions::new()
                .with_inline_codebooks(inline_codebooks)
                .with_full_setup(full_setup)
                .with_force_packet_format(force_packet_format);

            let reader = BufReader::new(
                File::open(&input).with_context(|| format!("opening {}", input.display()))?,
            );
            let mut converter = Converter::new(reader, codebooks, options)
                .with_context(|| format!("parsing {}", input.display()))?;

            let mut out = File::create(&output)
                .with_context(|| format!("creating {}", output.display()))?;
            converter
                .convert(&mut out)
                .with_context(|| format!("converting {}", input.display()))?;

            Ok(())
        }
    }
}
