//! `cmap` table processing.

use std::collections::BTreeMap;

use super::Cursor;
use crate::{
    errors::{MapError, ParseErrorKind},
    ParseError,
};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) struct SegmentWithDelta {
    pub(crate) start_code: u16,
    pub(crate) end_code: u16,
    pub(crate) id_delta: u16,
    pub(crate) id_range_offset: u16,
}

/// Segment mapping to delta values (format 4) subtable of the `cmap` table.
#[derive(Debug, Clone)]
pub(crate) struct SegmentDeltas<'a> {
    pub(crate) segments: Vec<SegmentWithDelta>,
    pub(crate) glyph_id_array: &'a [u8],
}

impl<'a> SegmentDeltas<'a> {
    fn parse(mut cursor: Cursor<'a>) -> Result<Self, ParseError> {
        cursor.read_u16_checked(|format| {
            if format != 4 {
                return Err(ParseErrorKind::UnexpectedTableFormat { format });
            }
            Ok(())
        })?;

        let remaining_len = cursor.read_u16_checked(|subtable_len| {
            Ok(subtable_len
                .checked_sub(4)
                .ok_or(ParseErrorKind::UnexpectedEof)? as usize)
        })?;
        // Some fonts declare a length exceeding the table for large format-4 subtables.
        let remaining_len = remaining_len.min(cursor.bytes.len());
        cursor = cursor.range(0..remaining_len)?;

        cursor.skip(2)?; // language
        let segment_count = cursor.read_u16()? / 2;
        cursor.skip(6)?; // searchRange, entrySelector, rangeShift

        let vec_len = 2 * usize::from(segment_count);
        let mut end_codes = cursor.split_at(vec_len)?;
        cursor.skip(2)?; // reserved padding
        let mut start_codes = cursor.split_at(vec_len)?;
        let mut id_deltas = cursor.split_at(vec_len)?;
        let mut id_range_offsets = cursor.split_at(vec_len)?;

        let segments = (0..segment_count).map(|_| {
            Ok(SegmentWithDelta {
                start_code: start_codes.read_u16()?,
                end_code: end_codes.read_u16()?,
                id_delta: id_deltas.read_u16()?,
                id_range_offset: id_range_offsets.read_u16()?,
            })
        });

        Ok(Self {
            segments: segments.collect::<Result<_, ParseError>>()?,
            glyph_id_array: cursor.bytes,
        })
    }

    fn map_code(&self, segment_idx: usize, code: u16) -> Result<u16, MapError> {
        let segment = &self.segments[segment_idx];
        if segment.id_range_offset == 0 {
            return Ok(segment.id_delta.wrapping_add(code));
        }

        // Offset is counted from the `idRangeOffsets` entry of the segment
        let mut byte_offset = 2 * segment_idx;
        byte_offset += usize::from(segment.id_range_offset);
        byte_offset += 2 * usize::from(code - segment.start_code);

        // Shift the offset to count from the start of `glyphIdArray`
        byte_offset = byte_offset
            .checked_sub(2 * self.segments.len())
            .ok_or(MapError::InvalidOffset)?;
        let glyph_id = self
            .glyph_id_array
            .get(byte_offset..)
            .and_then(<[u8]>::first_chunk::<2>)
            .ok_or(MapError::InvalidOffset)?;
        let glyph_id = u16::from_be_bytes(*glyph_id);
        if glyph_id == 0 {
            Ok(0) // missing glyph; `idDelta` is not applied
        } else {
            Ok(segment.id_delta.wrapping_add(glyph_id))
        }
    }

    fn map_char(&self, ch: char) -> Result<u16, MapError> {
        let Ok(code) = u16::try_from(u32::from(ch)) else {
            return Ok(0); // format 4 only covers the BMP
        };

        let segment_idx = self
            .segments
            .binary_search_by_key(&code, |segment| segment.end_code)
            .unwrap_or_else(|pos| pos);
        let Some(segment) = self.segments.get(segment_idx) else {
            return Ok(0);
        };
        if segment.start_code > code {
            return Ok(0); // missing glyph
        }
        self.map_code(segment_idx, code)
    }

    fn extend_char_map(&self, map: &mut BTreeMap<char, u16>) -> Result<(), MapError> {
        for (segment_idx, segment) in self.segments.iter().enumerate() {
            if segment.start_code > segment.end_code {
                continue;
            }
            for code in segment.start_code..=segment.end_code {
                if code == u16::MAX {
                    continue; // terminating segment
                }
                let Some(ch) = char::from_u32(code.into()) else {
                    continue; // surrogates
                };
                let glyph_id = self.map_code(segment_idx, code)?;
                if glyph_id != 0 {
                    map.insert(ch, glyph_id);
                }
            }
        }
        Ok(())
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) struct SequentialMapGroup {
    pub(crate) start_char_code: u32,
    pub(crate) end_char_code: u32,
    pub(crate) start_glyph_id: u32,
}

impl SequentialMapGroup {
    pub(crate) fn map_unchecked(&self, ch: char) -> u32 {
        u32::from(ch) - self.start_char_code + self.start_glyph_id
    }
}

/// Segmented coverage (format 12) subtable of the `cmap` table.
#[derive(Debug, Default, Clone)]
pub(crate) struct SegmentedCoverage {
    pub(crate) groups: Vec<SequentialMapGroup>,
}

impl SegmentedCoverage {
    fn parse(mut cursor: Cursor<'_>) -> Result<Self, ParseError> {
        cursor.read_u16_checked(|format| {
            if format != 12 {
                return Err(ParseErrorKind::UnexpectedTableFormat { format });
            }
            Ok(())
        })?;

        cursor.skip(2)?; // reserved

        let remaining_len = cursor.read_u32_checked(|subtable_len| {
            Ok(subtable_len
                .checked_sub(8)
                .ok_or(ParseErrorKind::UnexpectedEof)? as usize)
        })?;
        cursor = cursor.range(0..remaining_len)?;

        cursor.skip(4)?; // language
        let num_groups = cursor.read_u32()?;
        let groups = (0..num_groups).map(|_| {
            Ok(SequentialMapGroup {
                start_char_code: cursor.read_u32()?,
                end_char_code: cursor.read_u32()?,
                start_glyph_id: cursor.read_u32()?,
            })
        });

        Ok(Self {
            groups: groups.collect::<Result<_, ParseError>>()?,
        })
    }

    fn map_char(&self, ch: char) -> Result<u16, MapError> {
        let code = u32::from(ch);
        let group_idx = self
            .groups
            .binary_search_by_key(&code, |group| group.end_char_code)
            .unwrap_or_else(|pos| pos);
        let Some(group) = self.groups.get(group_idx) else {
            return Ok(0); // `ch` exceeds `end_char_code` for the last group
        };
        if group.start_char_code > code {
            return Ok(0); // missing glyph
        }
        let glyph_id = group.map_unchecked(ch);
        glyph_id
            .try_into()
            .map_err(|_| MapError::GlyphIdOverflow(glyph_id))
    }

    fn extend_char_map(&self, map: &mut BTreeMap<char, u16>) -> Result<(), MapError> {
        for group in &self.groups {
            if group.start_char_code > group.end_char_code {
                continue;
            }
            for code in group.start_char_code..=group.end_char_code {
                let Some(ch) = char::from_u32(code) else {
                    continue;
                };
                let glyph_id = group.map_unchecked(ch);
                let glyph_id =
                    u16::try_from(glyph_id).map_err(|_| MapError::GlyphIdOverflow(glyph_id))?;
                if glyph_id != 0 {
                    map.insert(ch, glyph_id);
                }
            }
        }
        Ok(())
    }
}

/// The best `cmap` subtable found in the font.
#[derive(Debug, Clone)]
pub(crate) enum CmapTable<'a> {
    Deltas(SegmentDeltas<'a>),
    Coverage(SegmentedCoverage),
}

impl<'a> CmapTable<'a> {
    pub(crate) const UNICODE_PLATFORM: u16 = 0;
    const WINDOWS_PLATFORM: u16 = 3;

    pub(super) fn parse(mut cursor: Cursor<'a>) -> Result<Self, ParseError> {
        let table_cursor = cursor;
        cursor.read_u16_checked(|version| {
            if version != 0 {
                return Err(ParseErrorKind::UnexpectedTableVersion {
                    version: version.into(),
                });
            }
            Ok(())
        })?;

        let num_tables = cursor.read_u16()?;
        let (mut deltas_offset, mut coverage_offset) = (None, None);
        for _ in 0..num_tables {
            let platform_id = cursor.read_u16()?;
            let encoding_id = cursor.read_u16()?;
            let offset = cursor.read_u32()? as usize;
            // Unicode encoding 5 is for variation sequences (format 14).
            let is_unicode_encoding = matches!(
                (platform_id, encoding_id),
                (Self::UNICODE_PLATFORM, 0..=4 | 6) | (Self::WINDOWS_PLATFORM, 1 | 10)
            );
            if !is_unicode_encoding {
                continue;
            }
            match table_cursor.at(offset)?.read_u16()? {
                4 => {
                    deltas_offset.get_or_insert(offset);
                }
                12 => {
                    coverage_offset.get_or_insert(offset);
                }
                _ => { /* unsupported format, e.g. format 13 for the last resort font */ }
            }
        }

        // The full-repertoire subtable is a superset of the BMP one, so it's preferred.
        if let Some(offset) = coverage_offset {
            let coverage = SegmentedCoverage::parse(table_cursor.at(offset)?)?;
            log::debug!(
                "using format-12 cmap subtable with {} groups",
                coverage.groups.len()
            );
            Ok(Self::Coverage(coverage))
        } else if let Some(offset) = deltas_offset {
            let deltas = SegmentDeltas::parse(table_cursor.at(offset)?)?;
            log::debug!(
                "using format-4 cmap subtable with {} segments",
                deltas.segments.len()
            );
            Ok(Self::Deltas(deltas))
        } else {
            Err(cursor.err(ParseErrorKind::NoSupportedCmap))
        }
    }

    pub(super) fn map_char(&self, ch: char) -> Result<u16, MapError> {
        match self {
            Self::Deltas(deltas) => deltas.map_char(ch),
            Self::Coverage(coverage) => coverage.map_char(ch),
        }
    }

    pub(super) fn char_map(&self) -> Result<BTreeMap<char, u16>, MapError> {
        let mut map = BTreeMap::new();
        match self {
            Self::Deltas(deltas) => deltas.extend_char_map(&mut map)?,
            Self::Coverage(coverage) => coverage.extend_char_map(&mut map)?,
        }
        Ok(map)
    }
}
