//! OpenType parsing logic.

use core::{fmt, ops};
use std::collections::{BTreeMap, BTreeSet};

pub(crate) use self::{
    cmap::{CmapTable, SegmentDeltas, SegmentWithDelta, SegmentedCoverage, SequentialMapGroup},
    glyph::{Glyph, GlyphComponent, GlyphComponentArgs, GlyphWithMetrics, TransformData},
    gsub::SubstitutionClosure,
};
use crate::{
    errors::{MapError, ParseErrorKind},
    FontSubset, ParseError, SubsetOptions,
};

mod cmap;
mod glyph;
mod gsub;
pub(crate) mod woff2;

/// Tag of an OpenType table, such as `cmap` or `glyf`.
#[derive(Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct TableTag(pub(crate) [u8; 4]);

impl fmt::Debug for TableTag {
    fn fmt(&self, formatter: &mut fmt::Formatter<'_>) -> fmt::Result {
        formatter
            .debug_tuple("TableTag")
            .field(&self.to_string())
            .finish()
    }
}

impl fmt::Display for TableTag {
    fn fmt(&self, formatter: &mut fmt::Formatter<'_>) -> fmt::Result {
        for &byte in &self.0 {
            if byte.is_ascii_graphic() || byte == b' ' {
                write!(formatter, "{}", char::from(byte))?;
            } else {
                write!(formatter, "\\x{byte:02x}")?;
            }
        }
        Ok(())
    }
}

impl TableTag {
    /// Character to glyph mapping.
    pub const CMAP: Self = Self(*b"cmap");
    /// Font header.
    pub const HEAD: Self = Self(*b"head");
    /// Horizontal header.
    pub const HHEA: Self = Self(*b"hhea");
    /// Horizontal metrics.
    pub const HMTX: Self = Self(*b"hmtx");
    /// Maximum profile.
    pub const MAXP: Self = Self(*b"maxp");
    /// Naming table.
    pub const NAME: Self = Self(*b"name");
    /// OS/2 and Windows-specific metrics.
    pub const OS2: Self = Self(*b"OS/2");
    /// PostScript information.
    pub const POST: Self = Self(*b"post");
    /// Index to location.
    pub const LOCA: Self = Self(*b"loca");
    /// Glyph data.
    pub const GLYF: Self = Self(*b"glyf");
    /// Control value table.
    pub const CVT: Self = Self(*b"cvt ");
    /// Font program.
    pub const FPGM: Self = Self(*b"fpgm");
    /// Control value program.
    pub const PREP: Self = Self(*b"prep");
    /// Grid-fitting / scan-conversion procedure.
    pub const GASP: Self = Self(*b"gasp");
    /// Baseline data.
    pub const BASE: Self = Self(*b"BASE");
    /// Glyph definition data.
    pub const GDEF: Self = Self(*b"GDEF");
    /// Glyph positioning data.
    pub const GPOS: Self = Self(*b"GPOS");
    /// Glyph substitution data.
    pub const GSUB: Self = Self(*b"GSUB");
    /// Vertical header.
    pub const VHEA: Self = Self(*b"vhea");
    /// Vertical metrics.
    pub const VMTX: Self = Self(*b"vmtx");

    /// Creates a tag from its bytes.
    pub const fn new(bytes: [u8; 4]) -> Self {
        Self(bytes)
    }

    /// Returns bytes of this tag.
    pub const fn as_bytes(&self) -> &[u8; 4] {
        &self.0
    }
}

/// Read-only view into table data that tracks the offset for error reporting.
#[derive(Debug, Clone, Copy)]
pub(crate) struct Cursor<'a> {
    pub(crate) bytes: &'a [u8],
    offset: usize,
    table: Option<TableTag>,
}

impl<'a> Cursor<'a> {
    pub(crate) fn new(bytes: &'a [u8]) -> Self {
        Self {
            bytes,
            offset: 0,
            table: None,
        }
    }

    pub(crate) fn for_table(tag: TableTag, bytes: &'a [u8]) -> Self {
        Self {
            bytes,
            offset: 0,
            table: Some(tag),
        }
    }

    pub(crate) fn err(&self, kind: ParseErrorKind) -> ParseError {
        ParseError {
            kind,
            offset: self.offset,
            table: self.table,
        }
    }

    fn out_of_bounds(&self, range: ops::Range<usize>) -> ParseError {
        let len = self.bytes.len();
        self.err(ParseErrorKind::RangeOutOfBounds { range, len })
    }

    pub(crate) fn skip(&mut self, len: usize) -> Result<(), ParseError> {
        if self.bytes.len() < len {
            return Err(self.err(ParseErrorKind::UnexpectedEof));
        }
        self.bytes = &self.bytes[len..];
        self.offset += len;
        Ok(())
    }

    pub(crate) fn read_byte_array<const N: usize>(&mut self) -> Result<[u8; N], ParseError> {
        let Some((head, tail)) = self.bytes.split_first_chunk::<N>() else {
            return Err(self.err(ParseErrorKind::UnexpectedEof));
        };
        self.bytes = tail;
        self.offset += N;
        Ok(*head)
    }

    pub(crate) fn read_u16(&mut self) -> Result<u16, ParseError> {
        self.read_byte_array().map(u16::from_be_bytes)
    }

    pub(crate) fn read_u32(&mut self) -> Result<u32, ParseError> {
        self.read_byte_array().map(u32::from_be_bytes)
    }

    /// Reads a `u16` and checks it. Errors are attributed to the start of the value.
    pub(crate) fn read_u16_checked<T>(
        &mut self,
        check: impl FnOnce(u16) -> Result<T, ParseErrorKind>,
    ) -> Result<T, ParseError> {
        let start = *self;
        let value = self.read_u16()?;
        check(value).map_err(|kind| start.err(kind))
    }

    pub(crate) fn read_u32_checked<T>(
        &mut self,
        check: impl FnOnce(u32) -> Result<T, ParseErrorKind>,
    ) -> Result<T, ParseError> {
        let start = *self;
        let value = self.read_u32()?;
        check(value).map_err(|kind| start.err(kind))
    }

    /// Splits off the first `len` bytes and advances this cursor past them.
    pub(crate) fn split_at(&mut self, len: usize) -> Result<Self, ParseError> {
        let head = self.range(0..len)?;
        self.skip(len)?;
        Ok(head)
    }

    /// Returns a sub-cursor for the specified range relative to the current position.
    pub(crate) fn range(&self, range: ops::Range<usize>) -> Result<Self, ParseError> {
        let Some(bytes) = self.bytes.get(range.clone()) else {
            return Err(self.out_of_bounds(range));
        };
        Ok(Self {
            bytes,
            offset: self.offset + range.start,
            table: self.table,
        })
    }

    /// Returns a sub-cursor starting at the specified offset relative to the current position.
    pub(crate) fn at(&self, offset: usize) -> Result<Self, ParseError> {
        self.range(offset..self.bytes.len())
    }
}

#[derive(Debug, Clone, Copy)]
pub(crate) struct HheaTable<'a> {
    pub(crate) raw: &'a [u8],
    pub(crate) number_of_h_metrics: u16,
}

impl<'a> HheaTable<'a> {
    pub(crate) const EXPECTED_LEN: usize = 36; // 18 words

    fn parse(mut cursor: Cursor<'a>) -> Result<Self, ParseError> {
        let raw = cursor.bytes;
        if raw.len() != Self::EXPECTED_LEN {
            return Err(cursor.err(ParseErrorKind::UnexpectedTableLen {
                expected: Self::EXPECTED_LEN,
                actual: raw.len(),
            }));
        }
        cursor.skip(Self::EXPECTED_LEN - 2)?;
        let number_of_h_metrics = cursor.read_u16()?;
        Ok(Self {
            raw,
            number_of_h_metrics,
        })
    }
}

#[derive(Debug)]
pub(crate) struct HmtxTable<'a> {
    pub(crate) raw: &'a [u8],
    number_of_h_metrics: u16,
}

impl HmtxTable<'_> {
    fn advance_and_lsb(&self, glyph_idx: u16) -> Result<(u16, u16), ParseError> {
        let cursor = Cursor::for_table(TableTag::HMTX, self.raw);
        if glyph_idx < self.number_of_h_metrics {
            let mut metric = cursor.at(usize::from(glyph_idx) * 4)?;
            Ok((metric.read_u16()?, metric.read_u16()?))
        } else {
            // Glyphs after the last long metric share its advance.
            let last_metric_idx = self
                .number_of_h_metrics
                .checked_sub(1)
                .ok_or_else(|| cursor.err(ParseErrorKind::UnexpectedEof))?;
            let last_metric_offset = usize::from(last_metric_idx) * 4;
            let advance = cursor.at(last_metric_offset)?.read_u16()?;

            let lsb_offset = usize::from(self.number_of_h_metrics) * 4
                + usize::from(glyph_idx - self.number_of_h_metrics) * 2;
            let lsb = cursor.at(lsb_offset)?.read_u16()?;
            Ok((advance, lsb))
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum LocaFormat {
    Short,
    Long,
}

impl LocaFormat {
    const fn bytes_per_offset(self) -> usize {
        match self {
            Self::Short => 2,
            Self::Long => 4,
        }
    }
}

#[derive(Debug)]
pub(crate) struct LocaTable<'a> {
    format: LocaFormat,
    bytes: &'a [u8],
}

impl<'a> LocaTable<'a> {
    fn new(format: LocaFormat, glyph_count: u16, bytes: &'a [u8]) -> Result<Self, ParseError> {
        let expected_len = format.bytes_per_offset() * (usize::from(glyph_count) + 1);
        if bytes.len() < expected_len {
            let cursor = Cursor::for_table(TableTag::LOCA, bytes);
            return Err(cursor.err(ParseErrorKind::UnexpectedTableLen {
                expected: expected_len,
                actual: bytes.len(),
            }));
        }
        Ok(Self { format, bytes })
    }

    fn glyph_range(&self, glyph_idx: u16) -> Result<ops::Range<usize>, ParseError> {
        let per_offset = self.format.bytes_per_offset();
        let mut cursor =
            Cursor::for_table(TableTag::LOCA, self.bytes).at(usize::from(glyph_idx) * per_offset)?;
        Ok(match self.format {
            LocaFormat::Short => {
                let start = usize::from(cursor.read_u16()?) * 2;
                let end = usize::from(cursor.read_u16()?) * 2;
                start..end
            }
            LocaFormat::Long => {
                let start = cursor.read_u32()? as usize;
                let end = cursor.read_u32()? as usize;
                start..end
            }
        })
    }
}

/// OpenType font with TrueType outlines.
#[derive(Debug)]
pub struct Font<'a> {
    tables: BTreeMap<TableTag, &'a [u8]>,
    pub(crate) cmap: CmapTable<'a>,
    pub(crate) head: &'a [u8],
    pub(crate) hhea: HheaTable<'a>,
    pub(crate) hmtx: HmtxTable<'a>,
    pub(crate) maxp: &'a [u8],
    pub(crate) loca: LocaTable<'a>,
    pub(crate) glyf: &'a [u8],
    glyph_count: u16,
}

impl<'a> Font<'a> {
    pub(crate) const SFNT_VERSION: u32 = 0x_0001_0000;
    pub(crate) const SFNT_CHECKSUM: u32 = 0x_b1b0_afba;
    pub(crate) const HEAD_CHECKSUM_OFFSET: usize = 8;
    pub(crate) const HEAD_LOCA_FORMAT_OFFSET: usize = 50;
    const HEAD_LEN: usize = 54;
    const MAXP_GLYPH_COUNT_OFFSET: usize = 4;

    /// Parses a font from the provided sfnt data.
    ///
    /// WOFF2 containers must be unpacked with [`to_sfnt()`](crate::to_sfnt) beforehand.
    ///
    /// # Errors
    ///
    /// Returns an error if the font is malformed, uses unsupported outlines (e.g., CFF),
    /// or misses one of the required tables (`cmap`, `head`, `hhea`, `hmtx`, `maxp`, `loca` or `glyf`).
    pub fn new(bytes: &'a [u8]) -> Result<Self, ParseError> {
        let mut cursor = Cursor::new(bytes);
        cursor.read_u32_checked(|version| match &version.to_be_bytes() {
            b"true" => Ok(()),
            b"OTTO" => Err(ParseErrorKind::CffOutlines),
            b"wOF2" => Err(ParseErrorKind::Woff2Container),
            b"ttcf" => Err(ParseErrorKind::FontCollection),
            _ if version == Self::SFNT_VERSION => Ok(()),
            _ => Err(ParseErrorKind::UnexpectedFontVersion(version)),
        })?;
        let table_count = cursor.read_u16()?;
        cursor.skip(6)?; // searchRange, entrySelector, rangeShift

        let mut tables = BTreeMap::new();
        for _ in 0..table_count {
            let tag = TableTag(cursor.read_byte_array()?);
            cursor.skip(4)?; // checksum
            let offset = cursor.read_u32()? as usize;
            let len = cursor.read_u32()? as usize;
            let table_bytes = Cursor::new(bytes).range(offset..offset + len)?;
            tables.insert(tag, table_bytes.bytes);
        }
        log::debug!("font contains {} tables: {:?}", tables.len(), tables.keys());

        let required = |tag: TableTag| {
            tables
                .get(&tag)
                .map(|&bytes| Cursor::for_table(tag, bytes))
                .ok_or_else(|| ParseError::missing_table(tag))
        };

        let head = required(TableTag::HEAD)?;
        let loca_format = Self::parse_loca_format(head)?;
        let glyph_count = Self::parse_glyph_count(required(TableTag::MAXP)?)?;
        let loca = LocaTable::new(loca_format, glyph_count, required(TableTag::LOCA)?.bytes)?;
        let hhea = HheaTable::parse(required(TableTag::HHEA)?)?;
        let hmtx = HmtxTable {
            raw: required(TableTag::HMTX)?.bytes,
            number_of_h_metrics: hhea.number_of_h_metrics,
        };
        let cmap = CmapTable::parse(required(TableTag::CMAP)?)?;

        Ok(Self {
            cmap,
            head: head.bytes,
            hhea,
            hmtx,
            maxp: required(TableTag::MAXP)?.bytes,
            loca,
            glyf: required(TableTag::GLYF)?.bytes,
            glyph_count,
            tables,
        })
    }

    fn parse_loca_format(mut head: Cursor<'_>) -> Result<LocaFormat, ParseError> {
        if head.bytes.len() < Self::HEAD_LEN {
            return Err(head.err(ParseErrorKind::UnexpectedTableLen {
                expected: Self::HEAD_LEN,
                actual: head.bytes.len(),
            }));
        }
        head.read_u32_checked(|version| {
            if version == 0x_0001_0000 {
                Ok(())
            } else {
                Err(ParseErrorKind::UnexpectedTableVersion { version })
            }
        })?;
        head.skip(Self::HEAD_LOCA_FORMAT_OFFSET - 4)?;
        // ^ fontRevision, checksumAdjustment, magicNumber, flags, unitsPerEm, created, modified,
        // bounding box, macStyle, lowestRecPPEM, fontDirectionHint

        head.read_u16_checked(|format| match format {
            0 => Ok(LocaFormat::Short),
            1 => Ok(LocaFormat::Long),
            _ => Err(ParseErrorKind::UnexpectedLocaFormat(format)),
        })
    }

    fn parse_glyph_count(mut maxp: Cursor<'_>) -> Result<u16, ParseError> {
        maxp.read_u32_checked(|version| {
            if version == 0x_0000_5000 || version == 0x_0001_0000 {
                Ok(())
            } else {
                Err(ParseErrorKind::UnexpectedTableVersion { version })
            }
        })?;
        maxp.read_u16()
    }

    /// Computes the OpenType checksum of the provided data.
    pub(crate) fn checksum(data: &[u8]) -> u32 {
        let mut chunks = data.chunks_exact(4);
        let mut checksum = chunks.by_ref().fold(0_u32, |acc, chunk| {
            // `unwrap()` is safe: chunks have exactly 4 bytes
            acc.wrapping_add(u32::from_be_bytes(chunk.try_into().unwrap()))
        });
        let remainder = chunks.remainder();
        if !remainder.is_empty() {
            let mut padded = [0_u8; 4];
            padded[..remainder.len()].copy_from_slice(remainder);
            checksum = checksum.wrapping_add(u32::from_be_bytes(padded));
        }
        checksum
    }

    pub(crate) fn maxp_glyph_count_range() -> ops::Range<usize> {
        Self::MAXP_GLYPH_COUNT_OFFSET..Self::MAXP_GLYPH_COUNT_OFFSET + 2
    }

    /// Returns the number of glyphs in this font.
    pub fn glyph_count(&self) -> u16 {
        self.glyph_count
    }

    /// Returns raw data of the table with the specified tag, if the font contains it.
    pub fn table(&self, tag: TableTag) -> Option<&'a [u8]> {
        self.tables.get(&tag).copied()
    }

    /// Iterates over tags of all tables in this font in alphabetic order.
    pub fn table_tags(&self) -> impl Iterator<Item = TableTag> + '_ {
        self.tables.keys().copied()
    }

    /// Maps a char to a glyph index using the best `cmap` subtable. Returns 0 (the missing glyph)
    /// if the char is not mapped.
    ///
    /// # Errors
    ///
    /// Returns an error if the `cmap` subtable is malformed.
    pub fn map_char(&self, ch: char) -> Result<u16, MapError> {
        self.cmap.map_char(ch)
    }

    /// Returns the mapping of all chars supported by the font to glyph indices. Chars mapped to
    /// the missing glyph are not included.
    ///
    /// # Errors
    ///
    /// Returns an error if the `cmap` subtable is malformed.
    pub fn char_map(&self) -> Result<BTreeMap<char, u16>, MapError> {
        self.cmap.char_map()
    }

    /// Returns all chars supported by the font.
    ///
    /// # Errors
    ///
    /// Returns an error if the `cmap` subtable is malformed.
    pub fn chars(&self) -> Result<BTreeSet<char>, MapError> {
        Ok(self.char_map()?.into_keys().collect())
    }

    /// Creates a subset of this font containing glyphs for the specified chars.
    ///
    /// # Errors
    ///
    /// Returns an error if glyph data needed for the subset is malformed.
    pub fn subset(
        self,
        chars: &BTreeSet<char>,
        options: SubsetOptions,
    ) -> Result<FontSubset<'a>, ParseError> {
        FontSubset::new(self, chars, options)
    }

    fn check_glyph_idx(&self, glyph_idx: u16) -> Result<(), ParseError> {
        if glyph_idx < self.glyph_count {
            Ok(())
        } else {
            let cursor = Cursor::for_table(TableTag::GLYF, self.glyf);
            Err(cursor.err(ParseErrorKind::GlyphOutOfBounds {
                glyph_idx,
                glyph_count: self.glyph_count,
            }))
        }
    }

    pub(crate) fn glyph_data(&self, glyph_idx: u16) -> Result<Cursor<'a>, ParseError> {
        self.check_glyph_idx(glyph_idx)?;
        let range = self.loca.glyph_range(glyph_idx)?;
        Cursor::for_table(TableTag::GLYF, self.glyf).range(range)
    }

    pub(crate) fn glyph(&self, glyph_idx: u16) -> Result<GlyphWithMetrics<'a>, ParseError> {
        let inner = Glyph::new(self.glyph_data(glyph_idx)?)?;
        let (advance, lsb) = self.hmtx.advance_and_lsb(glyph_idx)?;
        Ok(GlyphWithMetrics {
            inner,
            advance,
            lsb,
        })
    }

    pub(crate) fn substitution_closure(&self) -> Result<Option<SubstitutionClosure>, ParseError> {
        self.table(TableTag::GSUB)
            .map(|gsub| SubstitutionClosure::parse(Cursor::for_table(TableTag::GSUB, gsub)))
            .transpose()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn checksum_pads_trailing_bytes() {
        assert_eq!(Font::checksum(&[]), 0);
        assert_eq!(Font::checksum(&[0, 0, 0, 1]), 1);
        assert_eq!(Font::checksum(&[0, 0, 0, 1, 1]), 0x_0100_0001);
        assert_eq!(Font::checksum(&[0xff; 8]), 0x_ffff_fffe);
    }

    #[test]
    fn table_tag_display() {
        assert_eq!(TableTag::OS2.to_string(), "OS/2");
        assert_eq!(TableTag::CVT.to_string(), "cvt ");
        assert_eq!(TableTag::new([0, b'a', b'b', b'c']).to_string(), "\\x00abc");
        assert_eq!(format!("{:?}", TableTag::GSUB), "TableTag(\"GSUB\")");
    }

    #[test]
    fn cursor_reports_table_and_offset() {
        let mut cursor = Cursor::for_table(TableTag::HEAD, &[0, 1, 2]);
        assert_eq!(cursor.read_u16().unwrap(), 1);
        let err = cursor.read_u16().unwrap_err();
        assert!(matches!(err.kind(), ParseErrorKind::UnexpectedEof));
        assert_eq!(err.table(), Some(TableTag::HEAD));
        assert_eq!(err.offset(), 2);
        assert_eq!(err.to_string(), "[head] 2: unexpected end of the font data");
    }

    #[test]
    fn cursor_ranges_are_checked() {
        let cursor = Cursor::new(&[1, 2, 3, 4]);
        let sub = cursor.range(1..3).unwrap();
        assert_eq!(sub.bytes, [2, 3]);
        let err = cursor.range(2..6).unwrap_err();
        assert!(matches!(
            err.kind(),
            ParseErrorKind::RangeOutOfBounds { len: 4, .. }
        ));
    }

    #[test]
    fn rejecting_unsupported_containers() {
        for (header, expected) in [
            (*b"OTTO", "CFF outlines"),
            (*b"wOF2", "WOFF2 container"),
            (*b"ttcf", "collections"),
        ] {
            let mut bytes = header.to_vec();
            bytes.resize(12, 0);
            let err = Font::new(&bytes).unwrap_err();
            assert!(err.to_string().contains(expected), "{err}");
        }
    }
}
