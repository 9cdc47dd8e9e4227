//! OpenType font subsetting for fonts with TrueType outlines.
//!
//! A [`Font`] is parsed from sfnt data (WOFF2 containers, including ones with transformed
//! `glyf` / `loca` / `hmtx` tables, can be unpacked with [`to_sfnt()`]) and reduced to a [`FontSubset`] covering the specified chars. Depending on
//! [`SubsetOptions`], the subset either retains glyph IDs together with OpenType Layout tables,
//! or renumbers glyphs compactly and drops layout data. The subset can be serialized as raw
//! OpenType data or as a WOFF2 container.
//!
//! # Examples
//!
//! ```no_run
//! use std::collections::BTreeSet;
//! use sfnt_subset::{Flavor, Font, SubsetOptions};
//!
//! # fn main() -> Result<(), Box<dyn std::error::Error>> {
//! let bytes = std::fs::read("NotoSerifTC-Regular.ttf")?;
//! let font = Font::new(&bytes)?;
//! let chars: BTreeSet<char> = "佛光注照".chars().collect();
//! let options = SubsetOptions::default().with_flavor(Flavor::Woff2);
//! let subset = font.subset(&chars, options)?;
//! assert!(subset.missing_chars().is_empty());
//! std::fs::write("subset.woff2", subset.to_bytes())?;
//! # Ok(())
//! # }
//! ```

mod errors;
mod font;
mod subset;
#[cfg(any(test, feature = "testing"))]
pub mod testing;
#[cfg(test)]
pub(crate) mod tests;
mod write;

pub use crate::{
    errors::{MapError, ParseError, ParseErrorKind},
    font::{woff2::to_sfnt, Font, TableTag},
    subset::{Flavor, FontSubset, LayoutFeatures, SubsetOptions},
};
