//! Font subset generation.

use std::{
    collections::BTreeSet,
    fmt, fs,
    io::Write,
    path::{Path, PathBuf},
};

use sfnt_subset::{to_sfnt, Font};
use tempfile::NamedTempFile;

use crate::{charset::CharSet, config::GeneratorConfig, errors::GenerateError};

/// Summary of a successful [`Generator::run()`].
#[derive(Debug, Clone, PartialEq, Eq)]
#[non_exhaustive]
pub struct GenerateSummary {
    /// Path the subset was written to.
    pub output_path: PathBuf,
    /// Size of the subset in bytes.
    pub output_len: usize,
    /// Size of the source font in bytes.
    pub input_len: usize,
    /// Number of requested chars.
    pub char_count: usize,
    /// Number of non-empty glyphs in the subset.
    pub glyph_count: usize,
    /// Requested chars not supported by the source font.
    pub missing_chars: Vec<char>,
}

impl fmt::Display for GenerateSummary {
    #[allow(clippy::cast_precision_loss)] // font sizes are far below 2^52 bytes
    fn fmt(&self, formatter: &mut fmt::Formatter<'_>) -> fmt::Result {
        writeln!(formatter, "✅ Font subset generation complete!")?;
        writeln!(formatter, "   Output: {}", self.output_path.display())?;
        write!(
            formatter,
            "   Size: {:.2} KB",
            self.output_len as f64 / 1_024.0
        )
    }
}

/// Source font located by [`Generator::check_input()`].
#[derive(Debug, Clone, PartialEq, Eq)]
#[non_exhaustive]
pub struct InputFont {
    /// Path to the font.
    pub path: PathBuf,
    /// Size of the font file in bytes.
    pub len: u64,
}

impl fmt::Display for InputFont {
    #[allow(clippy::cast_precision_loss)] // font sizes are far below 2^52 bytes
    fn fmt(&self, formatter: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            formatter,
            "Using font: {} ({:.2} MB)",
            self.path.display(),
            self.len as f64 / 1_024.0 / 1_024.0
        )
    }
}

/// Generator of a font subset covering a [`CharSet`].
#[derive(Debug)]
pub struct Generator {
    config: GeneratorConfig,
    charset: CharSet,
}

impl Generator {
    /// Creates a generator for the curated char set extended with chars from
    /// [`GeneratorConfig::text_file`], if any.
    ///
    /// # Errors
    ///
    /// Returns an error if the text file cannot be read.
    pub fn new(config: GeneratorConfig) -> Result<Self, GenerateError> {
        let mut charset = CharSet::curated();
        if let Some(text_file) = &config.text_file {
            let text = fs::read_to_string(text_file).map_err(GenerateError::io(text_file))?;
            let len_before = charset.len();
            charset.extend_text(&text);
            log::info!(
                "added {} chars from `{}`",
                charset.len() - len_before,
                text_file.display()
            );
        }
        Ok(Self::with_charset(config, charset))
    }

    /// Creates a generator for the specified char set.
    pub fn with_charset(config: GeneratorConfig, charset: CharSet) -> Self {
        Self { config, charset }
    }

    /// Returns the char set covered by the generated subset.
    pub fn charset(&self) -> &CharSet {
        &self.charset
    }

    /// Returns the generator configuration.
    pub fn config(&self) -> &GeneratorConfig {
        &self.config
    }

    /// Checks that [`GeneratorConfig::input`] is an existing file. [`Self::run()`] performs
    /// the same check before writing anything.
    ///
    /// # Errors
    ///
    /// Returns [`GenerateError::InputNotFound`] if the input font is missing.
    pub fn check_input(&self) -> Result<InputFont, GenerateError> {
        let input = &self.config.input;
        let metadata = fs::metadata(input)
            .ok()
            .filter(fs::Metadata::is_file)
            .ok_or_else(|| GenerateError::InputNotFound {
                path: input.clone(),
            })?;
        Ok(InputFont {
            path: input.clone(),
            len: metadata.len(),
        })
    }

    /// Generates the subset and writes it to [`GeneratorConfig::output`].
    ///
    /// # Errors
    ///
    /// Returns an error if the input font is missing or malformed, or on I/O errors.
    /// The input font is checked before any files are written.
    pub fn run(&self) -> Result<GenerateSummary, GenerateError> {
        self.check_input()?;
        let input = &self.config.input;
        let input_bytes = fs::read(input).map_err(GenerateError::io(input))?;
        log::info!("read source font `{}` ({} bytes)", input.display(), input_bytes.len());

        // Removed on drop, including on error paths.
        let chars_file = self.write_chars_file()?;
        let chars = Self::read_chars_file(chars_file.path())?;
        log::debug!(
            "read {} chars from `{}`",
            chars.len(),
            chars_file.path().display()
        );

        let font_err = |source| GenerateError::Font {
            path: input.clone(),
            source,
        };
        let sfnt = to_sfnt(&input_bytes).map_err(font_err)?;
        let font = Font::new(&sfnt).map_err(font_err)?;
        let subset = font
            .subset(&chars, self.config.options)
            .map_err(font_err)?;
        drop(chars_file);

        let missing_chars = subset.missing_chars().to_vec();
        if !missing_chars.is_empty() {
            let missing: String = missing_chars.iter().collect();
            log::warn!(
                "source font doesn't support {} chars: {missing}",
                missing_chars.len()
            );
        }
        let output_bytes = subset.to_bytes();

        let output = &self.config.output;
        if let Some(parent) = output.parent().filter(|path| !path.as_os_str().is_empty()) {
            fs::create_dir_all(parent).map_err(GenerateError::io(parent))?;
        }
        fs::write(output, &output_bytes).map_err(GenerateError::io(output))?;
        log::info!("wrote subset to `{}` ({} bytes)", output.display(), output_bytes.len());

        Ok(GenerateSummary {
            output_path: output.clone(),
            output_len: output_bytes.len(),
            input_len: input_bytes.len(),
            char_count: chars.len(),
            glyph_count: subset.glyph_count(),
            missing_chars,
        })
    }

    fn write_chars_file(&self) -> Result<NamedTempFile, GenerateError> {
        let mut builder = tempfile::Builder::new();
        builder.prefix("subset_chars").suffix(".txt");
        let file = match &self.config.temp_dir {
            Some(dir) => builder.tempfile_in(dir).map_err(GenerateError::io(dir))?,
            None => builder
                .tempfile()
                .map_err(GenerateError::io(std::env::temp_dir()))?,
        };

        let path = file.path().to_owned();
        let text = self.charset.to_text();
        let mut writer = file.as_file();
        writer
            .write_all(text.as_bytes())
            .and_then(|()| writer.flush())
            .map_err(GenerateError::io(&path))?;
        log::debug!("wrote {} bytes of chars to `{}`", text.len(), path.display());
        Ok(file)
    }

    fn read_chars_file(path: &Path) -> Result<BTreeSet<char>, GenerateError> {
        let text = fs::read_to_string(path).map_err(GenerateError::io(path))?;
        Ok(CharSet::from_text(&text).as_set().clone())
    }
}
