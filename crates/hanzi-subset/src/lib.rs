//! Curated Hanzi char set with font subset generation and verification.
//!
//! The crate bundles a curated set of Chinese chars (simplified and traditional) needed for
//! memorial tablet templates and personal names, and two pipeline steps working on it:
//!
//! - [`Generator`] subsets a large CJK font (e.g., Noto Serif TC) to the curated set.
//! - [`Verifier`] checks that a generated font supports predefined test phrases.
//!
//! Both steps are available as binaries: `generate-font-subset` and `verify-font-chars`.
//!
//! # Examples
//!
//! ```no_run
//! use hanzi_subset::{Generator, GeneratorConfig, Verifier};
//!
//! # fn main() -> anyhow::Result<()> {
//! let generator = Generator::new(GeneratorConfig::default())?;
//! println!("{}", generator.charset().stats());
//! let summary = generator.run()?;
//! println!("{summary}");
//!
//! let report = Verifier::new(&summary.output_path).run()?;
//! assert!(report.is_success(), "{report}");
//! # Ok(())
//! # }
//! ```

mod charset;
mod config;
mod errors;
mod generate;
mod verify;

pub use crate::{
    charset::{Category, CharSet, CharSetStats},
    config::{init_logging, GeneratorConfig, DEFAULT_INPUT_FONT, DEFAULT_OUTPUT_FONT},
    errors::{GenerateError, VerifyError},
    generate::{GenerateSummary, Generator, InputFont},
    verify::{
        verify_chars, CategoryReport, FontInfo, TestCase, VerificationReport, Verifier, TEST_CASES,
    },
};
