//! Serializing `FontSubset`s to OpenType and WOFF2 data.

use core::{iter, mem};

use crate::{
    font::{
        woff2::{ARBITRARY_TAG_INDEX, GLYF_NULL_TRANSFORM, KNOWN_TAGS, SIGNATURE},
        CmapTable, Glyph, GlyphComponent, GlyphComponentArgs, GlyphWithMetrics, HheaTable,
        HmtxTable, LocaFormat, LocaTable, SegmentDeltas, SegmentWithDelta, SegmentedCoverage,
        SequentialMapGroup, TransformData,
    },
    subset::SubsetGlyphs,
    Flavor, Font, FontSubset, TableTag,
};

mod brotli;

pub(crate) fn write_u16(writer: &mut Vec<u8>, value: u16) {
    writer.extend_from_slice(&value.to_be_bytes());
}

pub(crate) fn write_u32(writer: &mut Vec<u8>, value: u32) {
    writer.extend_from_slice(&value.to_be_bytes());
}

fn uint_base128_len(val: u32) -> usize {
    if val == 0 {
        1
    } else {
        val.ilog2() as usize / 7 + 1
    }
}

#[allow(clippy::cast_possible_truncation)] // intentional
pub(crate) fn write_uint_base128(buffer: &mut Vec<u8>, val: u32) {
    for shift in [28, 21, 14, 7] {
        if val >= 1 << shift {
            buffer.push(0x80 | (val >> shift) as u8);
        }
    }
    buffer.push((val & 0x7f) as u8);
}

impl CmapTable<'static> {
    /// Creates a table from a mapping ordered by chars. Chars outside the BMP, or too many
    /// segments for the 16-bit subtable length, require a format-12 subtable; otherwise,
    /// a more compact format-4 subtable is used.
    pub(crate) fn from_map(map: &[(char, u16)]) -> Self {
        let coverage = Self::create_coverage(map);
        let fits_into_bmp = map
            .last()
            .is_none_or(|&(ch, _)| u32::from(ch) < u32::from(u16::MAX));
        // +1 for the terminating segment
        let deltas_len = SegmentDeltas::HEADER_LEN
            + SegmentDeltas::SEGMENT_LEN * (coverage.groups.len() + 1);
        if !fits_into_bmp || deltas_len > usize::from(u16::MAX) {
            return Self::Coverage(coverage);
        }

        #[allow(clippy::cast_possible_truncation)] // checked via `fits_into_bmp`
        let segments = coverage.groups.iter().map(|group| {
            let start_code = group.start_char_code as u16;
            SegmentWithDelta {
                start_code,
                end_code: group.end_char_code as u16,
                id_delta: (group.start_glyph_id as u16).wrapping_sub(start_code),
                id_range_offset: 0,
            }
        });
        // The last segment must map 0xffff; it's mapped to the missing glyph.
        let terminator = SegmentWithDelta {
            start_code: u16::MAX,
            end_code: u16::MAX,
            id_delta: 1,
            id_range_offset: 0,
        };
        Self::Deltas(SegmentDeltas {
            segments: segments.chain([terminator]).collect(),
            glyph_id_array: &[],
        })
    }

    fn create_coverage(map: &[(char, u16)]) -> SegmentedCoverage {
        let [(first_char, first_idx), rest @ ..] = map else {
            return SegmentedCoverage::default();
        };
        let mut groups = vec![];
        let mut current_group = SequentialMapGroup {
            start_char_code: (*first_char).into(),
            end_char_code: (*first_char).into(),
            start_glyph_id: (*first_idx).into(),
        };

        for &(ch, glyph_idx) in rest {
            let continues_group = u32::from(ch) == current_group.end_char_code + 1
                && u32::from(glyph_idx) == current_group.map_unchecked(ch);
            if continues_group {
                current_group.end_char_code += 1;
            } else {
                let new_group = SequentialMapGroup {
                    start_char_code: ch.into(),
                    end_char_code: ch.into(),
                    start_glyph_id: glyph_idx.into(),
                };
                groups.push(mem::replace(&mut current_group, new_group));
            }
        }
        groups.push(current_group);
        SegmentedCoverage { groups }
    }
}

impl CmapTable<'_> {
    pub(crate) fn write(&self, writer: &mut Vec<u8>) {
        write_u16(writer, 0); // version
        write_u16(writer, 1); // numTables
        write_u16(writer, Self::UNICODE_PLATFORM);
        let encoding_id = match self {
            Self::Deltas(_) => 3,
            Self::Coverage(_) => 4,
        };
        write_u16(writer, encoding_id);
        write_u32(writer, 12); // subtable offset

        match self {
            Self::Deltas(deltas) => deltas.write(writer),
            Self::Coverage(coverage) => coverage.write(writer),
        }
    }
}

impl SegmentDeltas<'_> {
    const HEADER_LEN: usize = 16;
    /// `endCode`, `startCode`, `idDelta` and `idRangeOffset` entries.
    const SEGMENT_LEN: usize = 8;

    #[allow(clippy::cast_possible_truncation)] // the subtable length is checked in `from_map()`
    fn write(&self, writer: &mut Vec<u8>) {
        let segment_count = self.segments.len() as u16;
        write_u16(writer, 4); // format
        let subtable_len =
            Self::HEADER_LEN + Self::SEGMENT_LEN * self.segments.len() + self.glyph_id_array.len();
        write_u16(writer, subtable_len as u16);
        write_u16(writer, 0); // language

        write_u16(writer, 2 * segment_count);
        let entry_selector = segment_count.ilog2() as u16;
        let search_range = 1 << (entry_selector + 1);
        write_u16(writer, search_range);
        write_u16(writer, entry_selector);
        write_u16(writer, 2 * segment_count - search_range);

        for segment in &self.segments {
            write_u16(writer, segment.end_code);
        }
        write_u16(writer, 0); // reservedPad
        for segment in &self.segments {
            write_u16(writer, segment.start_code);
        }
        for segment in &self.segments {
            write_u16(writer, segment.id_delta);
        }
        for segment in &self.segments {
            write_u16(writer, segment.id_range_offset);
        }
        writer.extend_from_slice(self.glyph_id_array);
    }
}

impl SegmentedCoverage {
    #[allow(clippy::cast_possible_truncation)] // group count is bounded by the glyph count
    fn write(&self, writer: &mut Vec<u8>) {
        write_u16(writer, 12); // format
        write_u16(writer, 0); // reserved
        write_u32(writer, (16 + 12 * self.groups.len()) as u32);
        write_u32(writer, 0); // language
        write_u32(writer, self.groups.len() as u32);
        for group in &self.groups {
            write_u32(writer, group.start_char_code);
            write_u32(writer, group.end_char_code);
            write_u32(writer, group.start_glyph_id);
        }
    }
}

impl FontSubset<'_> {
    /// Serializes this subset according to the [`Flavor`] in its options.
    pub fn to_bytes(&self) -> Vec<u8> {
        match self.options.flavor {
            Flavor::None => self.to_truetype(),
            Flavor::Woff2 => self.to_woff2(),
        }
    }

    /// Serializes this subset to the OpenType (sfnt) format.
    pub fn to_truetype(&self) -> Vec<u8> {
        self.to_writer().into_opentype()
    }

    /// Serializes this subset to the WOFF2 format.
    pub fn to_woff2(&self) -> Vec<u8> {
        self.to_writer().into_woff2()
    }

    pub(crate) fn to_writer(&self) -> FontWriter {
        let mut writer = FontWriter::default();
        let cmap = CmapTable::from_map(&self.char_map);
        writer.write_table(TableTag::CMAP, |buffer| cmap.write(buffer));

        match &self.glyphs {
            SubsetGlyphs::Compact { glyphs } => self.write_compact_metrics(glyphs, &mut writer),
            SubsetGlyphs::Retained { .. } => {
                writer.write_raw_table(TableTag::HMTX, self.font.hmtx.raw);
                writer.write_raw_table(TableTag::HHEA, self.font.hhea.raw);
                writer.write_raw_table(TableTag::MAXP, self.font.maxp);
            }
        }

        for &tag in self.passthrough_tables() {
            if let Some(table) = self.font.table(tag) {
                writer.write_raw_table(tag, table);
            }
        }
        if let Some(post) = self.font.table(TableTag::POST) {
            Self::write_post_table(post, &mut writer);
        }

        let locations = writer.write_table(TableTag::GLYF, |buffer| self.write_glyphs(buffer));
        let loca_format =
            writer.write_table(TableTag::LOCA, |buffer| LocaTable::write(&locations, buffer));
        writer.write_table(TableTag::HEAD, |buffer| {
            Self::write_head_table(self.font.head, loca_format, buffer);
        });
        writer
    }

    fn write_compact_metrics(&self, glyphs: &[GlyphWithMetrics<'_>], writer: &mut FontWriter) {
        let number_of_h_metrics = writer.write_table(TableTag::HMTX, |buffer| {
            HmtxTable::write_for_glyphs(glyphs, buffer)
        });
        let mut hhea = self.font.hhea;
        hhea.number_of_h_metrics = number_of_h_metrics;
        writer.write_table(TableTag::HHEA, |buffer| hhea.write(buffer));

        let maxp = self.font.maxp;
        let glyph_count_range = Font::maxp_glyph_count_range();
        writer.write_table(TableTag::MAXP, |buffer| {
            buffer.extend_from_slice(&maxp[..glyph_count_range.start]);
            // The subset cannot contain more glyphs than the original font.
            #[allow(clippy::cast_possible_truncation)]
            write_u16(buffer, glyphs.len() as u16);
            buffer.extend_from_slice(&maxp[glyph_count_range.end..]);
        });
    }

    /// Writes `post` without glyph names, since glyph indices may change.
    fn write_post_table(post: &[u8], writer: &mut FontWriter) {
        const HEADER_LEN: usize = 32;

        if post.len() < HEADER_LEN {
            log::warn!("`post` table is truncated ({} bytes); copying it as is", post.len());
            writer.write_raw_table(TableTag::POST, post);
            return;
        }
        writer.write_table(TableTag::POST, |buffer| {
            write_u32(buffer, 0x_0003_0000); // version
            buffer.extend_from_slice(&post[4..HEADER_LEN]);
        });
    }

    /// Returns glyph locations relative to the `glyf` table start.
    fn write_glyphs(&self, buffer: &mut Vec<u8>) -> Vec<usize> {
        let initial_offset = buffer.len();
        let mut locations = vec![0];
        match &self.glyphs {
            SubsetGlyphs::Compact { glyphs } => {
                for glyph in glyphs {
                    glyph.inner.write(buffer);
                    locations.push(buffer.len() - initial_offset);
                }
            }
            SubsetGlyphs::Retained { glyphs } => {
                for glyph_idx in 0..self.font.glyph_count() {
                    if let Some(data) = glyphs.get(&glyph_idx) {
                        buffer.extend_from_slice(data);
                    }
                    locations.push(buffer.len() - initial_offset);
                }
            }
        }
        locations
    }

    fn write_head_table(original: &[u8], loca_format: LocaFormat, writer: &mut Vec<u8>) {
        let format_offset = Font::HEAD_LOCA_FORMAT_OFFSET;
        writer.extend_from_slice(&original[..format_offset]);
        write_u16(
            writer,
            match loca_format {
                LocaFormat::Short => 0,
                LocaFormat::Long => 1,
            },
        );
        writer.extend_from_slice(&original[format_offset + 2..]);
    }
}

impl HmtxTable<'_> {
    /// Returns `numberOfHMetrics`: trailing glyphs with the same advance only store their LSB.
    #[allow(clippy::cast_possible_truncation)] // bounded by the glyph count
    fn write_for_glyphs(glyphs: &[GlyphWithMetrics<'_>], writer: &mut Vec<u8>) -> u16 {
        let mut number_of_h_metrics = glyphs.len();
        while let Some([prev, current]) = glyphs[..number_of_h_metrics].last_chunk::<2>() {
            if prev.advance != current.advance {
                break;
            }
            number_of_h_metrics -= 1;
        }

        for (i, glyph) in glyphs.iter().enumerate() {
            if i < number_of_h_metrics {
                write_u16(writer, glyph.advance);
            }
            write_u16(writer, glyph.lsb);
        }

        number_of_h_metrics as u16
    }
}

impl HheaTable<'_> {
    fn write(&self, writer: &mut Vec<u8>) {
        writer.extend_from_slice(&self.raw[..Self::EXPECTED_LEN - 2]);
        write_u16(writer, self.number_of_h_metrics);
    }
}

impl LocaTable<'_> {
    pub(crate) fn write(locations: &[usize], writer: &mut Vec<u8>) -> LocaFormat {
        let all_even = locations.iter().all(|&loc| loc % 2 == 0);
        let fits_short = locations
            .last()
            .is_none_or(|&loc| loc <= usize::from(u16::MAX) * 2);
        if all_even && fits_short {
            for &loc in locations {
                #[allow(clippy::cast_possible_truncation)] // checked via `fits_short`
                write_u16(writer, (loc / 2) as u16);
            }
            LocaFormat::Short
        } else {
            for &loc in locations {
                #[allow(clippy::cast_possible_truncation)] // font data is limited to 4 GiB
                write_u32(writer, loc as u32);
            }
            LocaFormat::Long
        }
    }
}

impl Glyph<'_> {
    pub(crate) fn write(&self, writer: &mut Vec<u8>) {
        match self {
            Self::Empty => { /* no data */ }
            Self::Simple(bytes) => writer.extend_from_slice(bytes),
            Self::Composite {
                header,
                components,
                instructions,
            } => {
                write_u16(writer, u16::MAX); // numberOfContours = -1
                writer.extend_from_slice(header);
                for component in components {
                    component.write(writer);
                }
                writer.extend_from_slice(instructions);
            }
        }
    }
}

impl GlyphComponent {
    fn write(&self, writer: &mut Vec<u8>) {
        write_u16(writer, self.flags);
        write_u16(writer, self.glyph_idx);
        match self.args {
            GlyphComponentArgs::Bytes(args) => write_u16(writer, args),
            GlyphComponentArgs::Words(args) => write_u32(writer, args),
        }
        let transform: &[u16] = match &self.transform {
            TransformData::None => &[],
            TransformData::Scale(scale) => core::slice::from_ref(scale),
            TransformData::TwoScales(scales) => scales,
            TransformData::Affine(matrix) => matrix,
        };
        for &value in transform {
            write_u16(writer, value);
        }
    }
}

#[derive(Debug, Clone, Copy)]
struct TableRecord {
    tag: TableTag,
    checksum: u32,
    /// Offset relative to the table data start until [`FontWriter::adjust_data()`] is called.
    /// It's always 4-byte aligned.
    offset: u32,
    length: u32,
}

impl TableRecord {
    const BYTE_LEN: usize = 16;

    fn write_opentype(&self, writer: &mut Vec<u8>) {
        writer.extend_from_slice(&self.tag.0);
        write_u32(writer, self.checksum);
        write_u32(writer, self.offset);
        write_u32(writer, self.length);
    }

    fn self_checksum(&self) -> u32 {
        u32::from_be_bytes(self.tag.0)
            .wrapping_add(self.checksum)
            .wrapping_add(self.offset)
            .wrapping_add(self.length)
    }

    fn known_tag_index(&self) -> Option<u8> {
        let idx = KNOWN_TAGS.iter().position(|&tag| tag == self.tag)?;
        u8::try_from(idx).ok()
    }

    fn woff2_len(&self) -> usize {
        let tag_len = if self.known_tag_index().is_some() { 0 } else { 4 };
        1 /* flags */ + tag_len + uint_base128_len(self.length)
    }

    fn write_woff2(&self, buffer: &mut Vec<u8>) {
        let transform_version = if self.tag == TableTag::GLYF || self.tag == TableTag::LOCA {
            GLYF_NULL_TRANSFORM
        } else {
            0
        };
        let tag_index = self.known_tag_index();
        buffer.push(tag_index.unwrap_or(ARBITRARY_TAG_INDEX) | (transform_version << 6));
        if tag_index.is_none() {
            buffer.extend_from_slice(&self.tag.0);
        }
        write_uint_base128(buffer, self.length);
    }
}

/// Accumulates tables and serializes them to OpenType or WOFF2 data.
#[derive(Debug, Clone, Default)]
pub(crate) struct FontWriter {
    tables: Vec<TableRecord>,
    /// Contains *aligned* table data.
    table_data: Vec<u8>,
}

impl FontWriter {
    const SFNT_HEADER_LEN: usize = 12;
    const WOFF2_HEADER_LEN: usize = 48;

    #[allow(clippy::cast_possible_truncation)] // font data is limited to 4 GiB
    pub(crate) fn write_table<T>(
        &mut self,
        tag: TableTag,
        with: impl FnOnce(&mut Vec<u8>) -> T,
    ) -> T {
        let offset = self.table_data.len();
        debug_assert_eq!(offset % 4, 0, "unaligned offset: {offset}");

        let output = with(&mut self.table_data);
        let length = self.table_data.len() - offset;
        if length % 4 > 0 {
            let zero_padding = 4 - length % 4;
            self.table_data.extend(iter::repeat_n(0_u8, zero_padding));
        }

        if tag == TableTag::HEAD {
            // `checksumAdjustment` is zero during checksum computation; it's patched later.
            let range = offset + Font::HEAD_CHECKSUM_OFFSET..offset + Font::HEAD_CHECKSUM_OFFSET + 4;
            if let Some(adjustment) = self.table_data.get_mut(range) {
                adjustment.fill(0);
            }
        }
        let checksum = Font::checksum(&self.table_data[offset..]);
        self.tables.push(TableRecord {
            tag,
            checksum,
            offset: offset as u32,
            length: length as u32,
        });
        output
    }

    pub(crate) fn write_raw_table(&mut self, tag: TableTag, content: &[u8]) {
        self.write_table(tag, |buffer| buffer.extend_from_slice(content));
    }

    #[allow(clippy::cast_possible_truncation)] // the number of tables is small
    fn write_sfnt_header(&self) -> Vec<u8> {
        let mut buffer = vec![];
        write_u32(&mut buffer, Font::SFNT_VERSION);

        let table_count = self.tables.len() as u16;
        write_u16(&mut buffer, table_count);
        let entry_selector = table_count.checked_ilog2().unwrap_or(0) as u16;
        let search_range = 1 << (4 + entry_selector);
        write_u16(&mut buffer, search_range);
        write_u16(&mut buffer, entry_selector);
        write_u16(&mut buffer, (16 * table_count).saturating_sub(search_range));

        debug_assert_eq!(buffer.len(), Self::SFNT_HEADER_LEN);
        buffer
    }

    /// Returns the starting offset of table data in the sfnt file.
    fn data_offset(&self) -> usize {
        Self::SFNT_HEADER_LEN + self.tables.len() * TableRecord::BYTE_LEN
    }

    pub(crate) fn into_opentype(mut self) -> Vec<u8> {
        let mut buffer = self.write_sfnt_header();
        self.adjust_data(Font::checksum(&buffer));

        self.tables.sort_unstable_by_key(|record| record.tag);
        for record in &self.tables {
            record.write_opentype(&mut buffer);
        }
        buffer.extend(self.table_data);
        buffer
    }

    /// Shifts table offsets by the data offset and patches `checksumAdjustment` in `head`.
    #[allow(clippy::cast_possible_truncation)] // font data is limited to 4 GiB
    fn adjust_data(&mut self, sfnt_header_checksum: u32) {
        let data_offset = self.data_offset();
        let mut file_checksum = sfnt_header_checksum;
        for record in &mut self.tables {
            record.offset += data_offset as u32;
            file_checksum = file_checksum
                .wrapping_add(record.self_checksum())
                .wrapping_add(record.checksum);
        }

        let head_offset = self
            .tables
            .iter()
            .find(|record| record.tag == TableTag::HEAD)
            .map(|record| record.offset as usize - data_offset);
        let Some(head_offset) = head_offset else {
            log::warn!("font has no `head` table; checksum adjustment is skipped");
            return;
        };
        let checksum_adjustment = Font::SFNT_CHECKSUM.wrapping_sub(file_checksum);
        let start = head_offset + Font::HEAD_CHECKSUM_OFFSET;
        if let Some(adjustment) = self.table_data.get_mut(start..start + 4) {
            adjustment.copy_from_slice(&checksum_adjustment.to_be_bytes());
        }
    }

    #[allow(clippy::cast_possible_truncation)] // font data is limited to 4 GiB
    pub(crate) fn into_woff2(mut self) -> Vec<u8> {
        self.adjust_data(Font::checksum(&self.write_sfnt_header()));

        let compressed_data = self.compress_data();
        let directory_len: usize = self.tables.iter().map(TableRecord::woff2_len).sum();
        let unpadded_len = Self::WOFF2_HEADER_LEN + directory_len + compressed_data.len();
        let file_len = unpadded_len.next_multiple_of(4);
        log::debug!(
            "compressed {} bytes of table data into {} bytes",
            self.table_data.len(),
            compressed_data.len()
        );

        let mut buffer = Vec::with_capacity(file_len);
        buffer.extend_from_slice(&SIGNATURE);
        write_u32(&mut buffer, Font::SFNT_VERSION); // flavor
        write_u32(&mut buffer, file_len as u32);
        write_u16(&mut buffer, self.tables.len() as u16);
        write_u16(&mut buffer, 0); // reserved
        let sfnt_len = self.data_offset() + self.table_data.len();
        write_u32(&mut buffer, sfnt_len as u32); // totalSfntSize
        write_u32(&mut buffer, compressed_data.len() as u32);
        // WOFF version, metadata offset / length / original length, private block offset / length
        buffer.extend_from_slice(&[0; 24]);
        debug_assert_eq!(buffer.len(), Self::WOFF2_HEADER_LEN);

        for record in &self.tables {
            record.write_woff2(&mut buffer);
        }
        buffer.extend(compressed_data);
        // The file must be 4-byte aligned even without metadata or private blocks.
        buffer.resize(file_len, 0);
        buffer
    }
}

#[cfg(test)]
mod tests {
    use std::{borrow::Cow, collections::BTreeSet};

    use allsorts::{binary::read::ReadScope, font_data::FontData, tables::FontTableProvider};
    use test_casing::{test_casing, Product};

    use super::*;
    use crate::{testing::TestFontBuilder, LayoutFeatures, SubsetOptions};

    const LAYOUT_FEATURES: [LayoutFeatures; 2] = [LayoutFeatures::None, LayoutFeatures::All];
    const CHAR_SUBSETS: [&str; 3] = ["", "永", "佛光注照長生祿位"];

    #[test]
    fn uint_base128_encoding() {
        let samples: [(u32, &[u8]); 7] = [
            (0, &[0]),
            (1, &[1]),
            (127, &[127]),
            (128, &[0x81, 0]),
            (129, &[0x81, 1]),
            (16_383, &[0xff, 0x7f]),
            (16_384, &[0x81, 0x80, 0]),
        ];
        for (val, expected) in samples {
            assert_eq!(uint_base128_len(val), expected.len());
            let mut buffer = vec![];
            write_uint_base128(&mut buffer, val);
            assert_eq!(buffer, expected);
        }
    }

    #[test]
    fn cmap_format_depends_on_chars() {
        let bmp = CmapTable::from_map(&[('A', 1), ('B', 2), ('永', 3)]);
        let CmapTable::Deltas(deltas) = &bmp else {
            panic!("unexpected table: {bmp:?}");
        };
        // 'A'..='B', '永' and the terminating segment
        assert_eq!(deltas.segments.len(), 3);
        assert_eq!(deltas.segments[2].start_code, u16::MAX);

        let astral = CmapTable::from_map(&[('A', 1), ('𠀀', 2)]);
        assert!(matches!(astral, CmapTable::Coverage(_)), "{astral:?}");
    }

    /// Chars with gaps between them, so that each char gets a separate segment.
    fn sparse_bmp_chars(count: u32) -> Vec<char> {
        (0..count)
            .map(|i| char::from_u32(0x4e00 + 2 * i).unwrap())
            .collect()
    }

    #[test]
    fn cmap_with_many_segments_uses_full_coverage() {
        let map: Vec<(char, u16)> = sparse_bmp_chars(8_000).into_iter().zip(1..).collect();
        let table = CmapTable::from_map(&map);
        assert!(matches!(table, CmapTable::Deltas(_)), "{table:?}");

        let map: Vec<(char, u16)> = sparse_bmp_chars(8_200).into_iter().zip(1..).collect();
        let table = CmapTable::from_map(&map);
        let CmapTable::Coverage(coverage) = &table else {
            panic!("unexpected table: {table:?}");
        };
        assert_eq!(coverage.groups.len(), 8_200);
    }

    #[test]
    fn subsetting_to_many_sparse_bmp_chars() {
        let bmp_chars = sparse_bmp_chars(8_200);
        let text: String = bmp_chars.iter().chain(['𠀀'].iter()).collect();
        let font_bytes = TestFontBuilder::new().with_chars(&text).build();
        let font = Font::new(&font_bytes).unwrap();

        let chars: BTreeSet<char> = bmp_chars.into_iter().collect();
        let options = SubsetOptions::default().with_layout_features(LayoutFeatures::None);
        let subset = font.subset(&chars, options).unwrap().to_truetype();
        let subset = Font::new(&subset).unwrap();
        assert_eq!(subset.chars().unwrap(), chars);
        assert_eq!(subset.map_char('丂').unwrap(), 2);
        assert_eq!(subset.map_char('丁').unwrap(), 0);
    }

    #[test]
    fn file_checksum_is_adjusted() {
        let font_bytes = TestFontBuilder::new().with_chars("永和").build();
        let font = Font::new(&font_bytes).unwrap();
        let chars = BTreeSet::from(['永']);
        let subset = font.subset(&chars, SubsetOptions::default()).unwrap();
        let data = subset.to_truetype();
        assert_eq!(data.len() % 4, 0);
        assert_eq!(Font::checksum(&data), Font::SFNT_CHECKSUM);
    }

    #[test_casing(6, Product((LAYOUT_FEATURES, CHAR_SUBSETS)))]
    fn woff2_tables_are_written_correctly(layout_features: LayoutFeatures, chars: &str) {
        let font_bytes = TestFontBuilder::new()
            .with_chars("佛光注照長生位")
            .with_composite('祿', "光生")
            .with_substitute('永')
            .build();
        let font = Font::new(&font_bytes).unwrap();
        let chars: BTreeSet<char> = chars.chars().collect();
        let options = SubsetOptions::default().with_layout_features(layout_features);
        let writer = font.subset(&chars, options).unwrap().to_writer();
        let FontWriter { tables, table_data } = writer.clone();
        let woff2 = writer.into_woff2();
        assert_eq!(woff2.len() % 4, 0);

        let font_file = ReadScope::new(&woff2).read::<FontData<'_>>().unwrap();
        let font_provider = font_file.table_provider(0).unwrap();
        for record in &tables {
            let mut table_contents = font_provider
                .read_table_data(u32::from_be_bytes(record.tag.0))
                .unwrap();
            let start = record.offset as usize;
            let end = start + record.length as usize;

            if record.tag == TableTag::HEAD {
                let mut patched = table_contents.into_owned();
                patched[Font::HEAD_CHECKSUM_OFFSET..Font::HEAD_CHECKSUM_OFFSET + 4]
                    .copy_from_slice(&[0; 4]);
                table_contents = Cow::Owned(patched);
            }
            assert_eq!(table_contents.as_ref(), &table_data[start..end], "{:?}", record.tag);
        }
    }

    #[test]
    fn unknown_tags_are_written_explicitly() {
        let record = TableRecord {
            tag: TableTag::new(*b"ZZZZ"),
            checksum: 0,
            offset: 0,
            length: 200,
        };
        let mut buffer = vec![];
        record.write_woff2(&mut buffer);
        assert_eq!(buffer, [ARBITRARY_TAG_INDEX, b'Z', b'Z', b'Z', b'Z', 0x81, 0x48]);
        assert_eq!(record.woff2_len(), buffer.len());

        let glyf = TableRecord {
            tag: TableTag::GLYF,
            ..record
        };
        let mut buffer = vec![];
        glyf.write_woff2(&mut buffer);
        assert_eq!(buffer, [10 | 0xc0, 0x81, 0x48]);
    }
}
