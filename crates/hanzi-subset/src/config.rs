//! Configuration shared by the library and binaries.

use std::path::PathBuf;

use log::LevelFilter;
use sfnt_subset::{Flavor, LayoutFeatures, SubsetOptions};

/// Default path to the source font.
pub const DEFAULT_INPUT_FONT: &str = "NotoSerifTC-Regular.woff2";
/// Default path to the generated subset. This is also the font checked by the verifier.
pub const DEFAULT_OUTPUT_FONT: &str = "public/fonts/NotoSerifTC-Subset.ttf";

/// Configuration of a [`Generator`](crate::Generator).
#[derive(Debug, Clone)]
pub struct GeneratorConfig {
    /// Path to the source font (sfnt or WOFF2).
    pub input: PathBuf,
    /// Path to the generated subset. Parent directories are created if necessary.
    pub output: PathBuf,
    /// Subsetting options.
    pub options: SubsetOptions,
    /// Optional UTF-8 text file with chars added to the curated set.
    pub text_file: Option<PathBuf>,
    /// Directory for the intermediate char list. If not set, the system temp dir is used.
    pub temp_dir: Option<PathBuf>,
}

impl Default for GeneratorConfig {
    fn default() -> Self {
        Self {
            input: DEFAULT_INPUT_FONT.into(),
            output: DEFAULT_OUTPUT_FONT.into(),
            options: SubsetOptions::default()
                .with_layout_features(LayoutFeatures::All)
                .with_flavor(Flavor::None),
            text_file: None,
            temp_dir: None,
        }
    }
}

/// Initializes logging to stderr. `verbosity` of 0 logs warnings and errors, 1 adds info messages,
/// and 2+ adds debug messages. The `RUST_LOG` env var overrides these defaults.
pub fn init_logging(verbosity: u8) {
    let level = match verbosity {
        0 => LevelFilter::Warn,
        1 => LevelFilter::Info,
        _ => LevelFilter::Debug,
    };
    env_logger::Builder::new()
        .filter_level(level)
        .format_timestamp(None)
        .parse_default_env()
        .init();
}
