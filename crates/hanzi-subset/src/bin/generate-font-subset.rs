//! Generates a font subset covering the curated Hanzi set.

use std::path::PathBuf;

use anyhow::Context;
use clap::{ArgAction, Parser, ValueEnum};
use hanzi_subset::{
    init_logging, Generator, GeneratorConfig, DEFAULT_INPUT_FONT, DEFAULT_OUTPUT_FONT,
};
use sfnt_subset::{Flavor, LayoutFeatures, SubsetOptions};

/// Output wrapping of the generated font.
#[derive(Debug, Clone, Copy, Default, ValueEnum)]
enum OutputFlavor {
    /// Raw OpenType data.
    #[default]
    None,
    /// WOFF2 container.
    Woff2,
}

impl From<OutputFlavor> for Flavor {
    fn from(flavor: OutputFlavor) -> Self {
        match flavor {
            OutputFlavor::None => Self::None,
            OutputFlavor::Woff2 => Self::Woff2,
        }
    }
}

/// Subsets a CJK font to the curated set of simplified and traditional Hanzi.
#[derive(Debug, Parser)]
#[command(version, about)]
struct Args {
    /// Path to the source font (TrueType outlines; raw or WOFF2).
    #[arg(long, default_value = DEFAULT_INPUT_FONT)]
    input: PathBuf,
    /// Path to write the subset to. Parent directories are created if necessary.
    #[arg(long, default_value = DEFAULT_OUTPUT_FONT)]
    output: PathBuf,
    /// Output flavor.
    #[arg(long, value_enum, default_value_t)]
    flavor: OutputFlavor,
    /// Drop OpenType Layout tables and renumber glyphs compactly.
    #[arg(long)]
    no_layout_features: bool,
    /// UTF-8 text file with extra chars to include.
    #[arg(long)]
    text_file: Option<PathBuf>,
    /// Increases log verbosity; can be repeated.
    #[arg(short, long, action = ArgAction::Count)]
    verbose: u8,
}

impl Args {
    fn into_config(self) -> GeneratorConfig {
        let layout_features = if self.no_layout_features {
            LayoutFeatures::None
        } else {
            LayoutFeatures::All
        };
        GeneratorConfig {
            input: self.input,
            output: self.output,
            options: SubsetOptions::default()
                .with_layout_features(layout_features)
                .with_flavor(self.flavor.into()),
            text_file: self.text_file,
            temp_dir: None,
        }
    }
}

fn main() -> anyhow::Result<()> {
    let args = Args::parse();
    init_logging(args.verbose);

    let generator = Generator::new(args.into_config()).context("failed preparing char set")?;
    println!("{}", generator.charset().stats());
    println!();

    let input = generator.config().input.display().to_string();
    let input_font = generator
        .check_input()
        .with_context(|| format!("failed generating subset of `{input}`"))?;
    println!("{input_font}");
    println!("Generating font subset...");
    let summary = generator
        .run()
        .with_context(|| format!("failed generating subset of `{input}`"))?;
    if !summary.missing_chars.is_empty() {
        println!(
            "⚠️  {} chars are not supported by the source font",
            summary.missing_chars.len()
        );
    }
    println!("{summary}");
    Ok(())
}
