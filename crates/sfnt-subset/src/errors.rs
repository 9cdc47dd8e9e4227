use core::{fmt, ops};

use crate::TableTag;

/// Kind of a font [`ParseError`].
#[derive(Debug)]
#[non_exhaustive]
pub enum ParseErrorKind {
    /// Unexpected end of the font data.
    UnexpectedEof,
    /// Unexpected sfnt version (the first 4 bytes of the font data).
    UnexpectedFontVersion(u32),
    /// Font uses CFF outlines (`OTTO` sfnt version), which cannot be subset.
    CffOutlines,
    /// Font is a WOFF2 container and must be unpacked with [`to_sfnt()`](crate::to_sfnt) first.
    Woff2Container,
    /// Font collections are not supported.
    FontCollection,
    /// A WOFF2 table uses a transform that cannot be reversed, such as a transformed `glyf` table
    /// without a transformed `loca` table.
    UnsupportedWoff2Transform,
    /// WOFF2 table data cannot be decompressed.
    Decompression,
    /// Missing required font table (e.g., `head`).
    MissingTable,
    /// No supported subtable in the `cmap` table.
    NoSupportedCmap,
    /// Range inferred from the table data is out of bounds.
    RangeOutOfBounds {
        /// Inferred range.
        range: ops::Range<usize>,
        /// Length of the indexed data.
        len: usize,
    },
    /// Unexpected table version.
    UnexpectedTableVersion {
        /// Version read from the table.
        version: u32,
    },
    /// Unexpected table length.
    UnexpectedTableLen {
        /// Expected length.
        expected: usize,
        /// Actual length.
        actual: usize,
    },
    /// Unexpected table format (e.g., for a `cmap` subtable).
    UnexpectedTableFormat {
        /// Format read from the table.
        format: u16,
    },
    /// Unexpected `loca` format specified in the `head` table.
    UnexpectedLocaFormat(u16),
    /// Glyph index is not less than the number of glyphs in the font.
    GlyphOutOfBounds {
        /// Glyph index.
        glyph_idx: u16,
        /// Number of glyphs in the font.
        glyph_count: u16,
    },
    /// Glyph data cannot be restored from a transformed WOFF2 `glyf` table.
    MalformedGlyph {
        /// Glyph index.
        glyph_idx: u16,
    },
    /// Character mapping could not be resolved.
    Map(MapError),
}

impl fmt::Display for ParseErrorKind {
    fn fmt(&self, formatter: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::UnexpectedEof => formatter.write_str("unexpected end of the font data"),
            Self::UnexpectedFontVersion(version) => {
                write!(formatter, "unexpected font version ({version:#010x})")
            }
            Self::CffOutlines => {
                formatter.write_str("font uses CFF outlines; only TrueType outlines are supported")
            }
            Self::Woff2Container => {
                formatter.write_str("font is a WOFF2 container; unpack it to sfnt data first")
            }
            Self::FontCollection => formatter.write_str("font collections are not supported"),
            Self::UnsupportedWoff2Transform => {
                formatter.write_str("WOFF2 table uses an unsupported transform")
            }
            Self::Decompression => formatter.write_str("cannot decompress WOFF2 table data"),
            Self::MissingTable => formatter.write_str("missing required font table"),
            Self::NoSupportedCmap => {
                formatter.write_str("no supported subtable in the `cmap` table")
            }
            Self::RangeOutOfBounds { range, len } => {
                write!(
                    formatter,
                    "range ({range:?}) inferred from the table data is out of bounds (..{len})"
                )
            }
            Self::UnexpectedTableVersion { version } => {
                write!(formatter, "unexpected table version ({version:#x})")
            }
            Self::UnexpectedTableLen { expected, actual } => {
                write!(
                    formatter,
                    "unexpected table length: expected {expected}, got {actual}"
                )
            }
            Self::UnexpectedTableFormat { format } => {
                write!(formatter, "unexpected table format ({format})")
            }
            Self::UnexpectedLocaFormat(format) => {
                write!(formatter, "unexpected `loca` format ({format})")
            }
            Self::GlyphOutOfBounds {
                glyph_idx,
                glyph_count,
            } => {
                write!(
                    formatter,
                    "glyph #{glyph_idx} is out of bounds (font has {glyph_count} glyphs)"
                )
            }
            Self::MalformedGlyph { glyph_idx } => {
                write!(formatter, "glyph #{glyph_idx} is malformed")
            }
            Self::Map(err) => fmt::Display::fmt(err, formatter),
        }
    }
}

impl std::error::Error for ParseErrorKind {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            Self::Map(err) => Some(err),
            _ => None,
        }
    }
}

/// Errors that can occur when parsing an OpenType [`Font`](crate::Font).
#[derive(Debug)]
pub struct ParseError {
    pub(crate) kind: ParseErrorKind,
    pub(crate) offset: usize,
    pub(crate) table: Option<TableTag>,
}

impl fmt::Display for ParseError {
    fn fmt(&self, formatter: &mut fmt::Formatter<'_>) -> fmt::Result {
        if let Some(table) = self.table {
            write!(formatter, "[{table}] ")?;
        }
        if self.offset > 0 {
            write!(formatter, "{}: ", self.offset)?;
        }
        fmt::Display::fmt(&self.kind, formatter)
    }
}

impl std::error::Error for ParseError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match &self.kind {
            ParseErrorKind::Map(err) => Some(err),
            _ => None,
        }
    }
}

impl From<ParseErrorKind> for ParseError {
    fn from(kind: ParseErrorKind) -> Self {
        Self {
            kind,
            offset: 0,
            table: None,
        }
    }
}

impl ParseError {
    pub(crate) fn missing_table(tag: TableTag) -> Self {
        Self {
            kind: ParseErrorKind::MissingTable,
            offset: 0,
            table: Some(tag),
        }
    }

    pub(crate) fn with_table(mut self, tag: TableTag) -> Self {
        self.table.get_or_insert(tag);
        self
    }

    /// Gets the error kind.
    pub fn kind(&self) -> &ParseErrorKind {
        &self.kind
    }

    /// Gets the table this error relates to.
    pub fn table(&self) -> Option<TableTag> {
        self.table
    }

    /// Gets the offset in the table data (or in the font data if the error is not attributed to a table).
    pub fn offset(&self) -> usize {
        self.offset
    }
}

/// Errors that can occur when mapping a char to a glyph index.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[non_exhaustive]
pub enum MapError {
    /// Offset into the glyph ID array of a format-4 `cmap` subtable is out of bounds.
    InvalidOffset,
    /// Glyph ID from a format-12 `cmap` subtable exceeds `u16::MAX`.
    GlyphIdOverflow(u32),
}

impl fmt::Display for MapError {
    fn fmt(&self, formatter: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::InvalidOffset => formatter.write_str("invalid offset into the glyph ID array"),
            Self::GlyphIdOverflow(id) => write!(formatter, "glyph ID {id} exceeds u16::MAX"),
        }
    }
}

impl std::error::Error for MapError {}

impl From<MapError> for ParseError {
    fn from(err: MapError) -> Self {
        Self {
            kind: ParseErrorKind::Map(err),
            offset: 0,
            table: Some(TableTag::CMAP),
        }
    }
}
