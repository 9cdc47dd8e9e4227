//! Synthetic fonts for testing.
//!
//! The fonts contain the tables required by [`Font::new()`](crate::Font::new) together with
//! minimal `name`, `OS/2` and `post` tables, so they can be read by other OpenType parsers as well.

use crate::{
    font::{
        woff2::{ARBITRARY_TAG_INDEX, KNOWN_TAGS, SIGNATURE},
        CmapTable, LocaFormat, LocaTable,
    },
    write::{write_u16, write_u32, write_uint_base128, FontWriter},
    Flavor, Font, LayoutFeatures, SubsetOptions, TableTag,
};

const UNITS_PER_EM: u16 = 1_000;
const ADVANCE: u16 = 1_000;
const SQUARE_SIZE: i16 = 700;
const COMPOSITE_BBOX: [i16; 4] = [0, 0, SQUARE_SIZE, SQUARE_SIZE];

/// Point of a simple glyph outline: x and y coordinates, and whether the point is on the curve.
pub type OutlinePoint = (i16, i16, bool);

#[derive(Debug, Clone)]
enum TestGlyph {
    Simple {
        contours: Vec<Vec<OutlinePoint>>,
        instructions: Vec<u8>,
    },
    Composite(Vec<u16>),
}

impl TestGlyph {
    fn square() -> Self {
        Self::Simple {
            contours: vec![vec![
                (0, 0, true),
                (0, SQUARE_SIZE, true),
                (SQUARE_SIZE, SQUARE_SIZE, true),
                (SQUARE_SIZE, 0, true),
            ]],
            instructions: vec![],
        }
    }

    fn points(&self) -> impl Iterator<Item = OutlinePoint> + '_ {
        let contours: &[Vec<OutlinePoint>] = match self {
            Self::Simple { contours, .. } => contours,
            Self::Composite(_) => &[],
        };
        contours.iter().flatten().copied()
    }

    fn bbox(&self) -> [i16; 4] {
        if let Self::Composite(_) = self {
            return COMPOSITE_BBOX;
        }
        self.points()
            .map(|(x, y, _)| [x, y, x, y])
            .reduce(union_bbox)
            .unwrap_or_default()
    }

    #[allow(clippy::cast_possible_truncation)] // test glyphs are small
    fn write(&self, buffer: &mut Vec<u8>) {
        match self {
            Self::Simple {
                contours,
                instructions,
            } => {
                write_u16(buffer, contours.len() as u16); // numberOfContours
                for bound in self.bbox() {
                    buffer.extend_from_slice(&bound.to_be_bytes());
                }
                let mut point_count = 0;
                for contour in contours {
                    point_count += contour.len();
                    write_u16(buffer, (point_count - 1) as u16); // endPtsOfContours
                }
                write_u16(buffer, instructions.len() as u16);
                buffer.extend_from_slice(instructions);

                // All coordinates are written as words.
                buffer.extend(self.points().map(|(.., on_curve)| u8::from(on_curve)));
                let mut prev_x = 0_i16;
                for (x, ..) in self.points() {
                    buffer.extend_from_slice(&x.wrapping_sub(prev_x).to_be_bytes());
                    prev_x = x;
                }
                let mut prev_y = 0_i16;
                for (_, y, _) in self.points() {
                    buffer.extend_from_slice(&y.wrapping_sub(prev_y).to_be_bytes());
                    prev_y = y;
                }
            }
            Self::Composite(components) => {
                write_u16(buffer, u16::MAX); // numberOfContours = -1
                for bound in COMPOSITE_BBOX {
                    buffer.extend_from_slice(&bound.to_be_bytes());
                }
                for (i, &glyph_idx) in components.iter().enumerate() {
                    const ARG_1_AND_2_ARE_WORDS: u16 = 0x0001;
                    const ARGS_ARE_XY_VALUES: u16 = 0x0002;
                    const MORE_COMPONENTS: u16 = 0x0020;

                    let mut flags = ARG_1_AND_2_ARE_WORDS | ARGS_ARE_XY_VALUES;
                    if i + 1 < components.len() {
                        flags |= MORE_COMPONENTS;
                    }
                    write_u16(buffer, flags);
                    write_u16(buffer, glyph_idx);
                    write_u32(buffer, 0); // dx, dy
                }
            }
        }
    }
}

fn union_bbox(lhs: [i16; 4], rhs: [i16; 4]) -> [i16; 4] {
    [
        lhs[0].min(rhs[0]),
        lhs[1].min(rhs[1]),
        lhs[2].max(rhs[2]),
        lhs[3].max(rhs[3]),
    ]
}

#[allow(clippy::cast_possible_truncation)] // intentional
fn write_255_u16(buffer: &mut Vec<u8>, value: u16) {
    match value {
        0..253 => buffer.push(value as u8),
        253..506 => buffer.extend_from_slice(&[255, (value - 253) as u8]),
        506..762 => buffer.extend_from_slice(&[254, (value - 506) as u8]),
        _ => {
            buffer.push(253);
            write_u16(buffer, value);
        }
    }
}

/// Encodes point deltas as a flag and a triplet in the glyph stream of a transformed `glyf` table.
#[allow(clippy::cast_possible_truncation)] // values are checked by branches
fn write_triplet(
    (dx, dy): (i32, i32),
    on_curve: bool,
    flags: &mut Vec<u8>,
    glyph_stream: &mut Vec<u8>,
) {
    let on_curve_bit = if on_curve { 0 } else { 0x80 };
    let (x, y) = (dx.unsigned_abs(), dy.unsigned_abs());
    let x_sign = u8::from(dx >= 0);
    let y_sign = u8::from(dy >= 0);
    let xy_signs = x_sign + 2 * y_sign;

    let flag = if x == 0 && y < 1_280 {
        glyph_stream.push(y as u8);
        ((y & 0xf00) >> 7) as u8 + y_sign
    } else if y == 0 && x < 1_280 {
        glyph_stream.push(x as u8);
        10 + ((x & 0xf00) >> 7) as u8 + x_sign
    } else if x < 65 && y < 65 {
        glyph_stream.push(((((x - 1) & 0xf) << 4) | ((y - 1) & 0xf)) as u8);
        20 + ((x - 1) & 0x30) as u8 + (((y - 1) & 0x30) >> 2) as u8 + xy_signs
    } else if x < 769 && y < 769 {
        glyph_stream.extend_from_slice(&[(x - 1) as u8, (y - 1) as u8]);
        84 + 12 * (((x - 1) & 0x300) >> 8) as u8 + (((y - 1) & 0x300) >> 6) as u8 + xy_signs
    } else if x < 4_096 && y < 4_096 {
        let middle = ((x & 0xf) << 4) | (y >> 8);
        glyph_stream.extend_from_slice(&[(x >> 4) as u8, middle as u8, y as u8]);
        120 + xy_signs
    } else {
        write_u16(glyph_stream, x as u16);
        write_u16(glyph_stream, y as u16);
        124 + xy_signs
    };
    flags.push(on_curve_bit | flag);
}

/// Builder of synthetic TrueType fonts. Each mapped char gets a distinct glyph; glyph #0
/// is the missing glyph.
#[derive(Debug, Clone)]
pub struct TestFontBuilder {
    glyphs: Vec<TestGlyph>,
    /// Ordered by char.
    char_map: Vec<(char, u16)>,
    /// Single substitutions, ordered by input glyph.
    substitutions: Vec<(u16, u16)>,
}

impl Default for TestFontBuilder {
    fn default() -> Self {
        Self::new()
    }
}

impl TestFontBuilder {
    /// Creates a builder for a font with only the missing glyph.
    pub fn new() -> Self {
        Self {
            glyphs: vec![TestGlyph::square()],
            char_map: vec![],
            substitutions: vec![],
        }
    }

    fn glyph_idx(&self, ch: char) -> Option<u16> {
        let pos = self.char_map.binary_search_by_key(&ch, |&(ch, _)| ch).ok()?;
        Some(self.char_map[pos].1)
    }

    fn push_glyph(&mut self, glyph: TestGlyph) -> u16 {
        self.glyphs.push(glyph);
        u16::try_from(self.glyphs.len() - 1).expect("too many glyphs")
    }

    fn map_char(&mut self, ch: char, glyph: TestGlyph) -> u16 {
        let glyph_idx = self.push_glyph(glyph);
        match self.char_map.binary_search_by_key(&ch, |&(ch, _)| ch) {
            Ok(pos) => self.char_map[pos].1 = glyph_idx,
            Err(pos) => self.char_map.insert(pos, (ch, glyph_idx)),
        }
        glyph_idx
    }

    /// Adds simple glyphs for the chars in `text`. Already mapped chars are skipped.
    #[must_use]
    pub fn with_chars(mut self, text: &str) -> Self {
        for ch in text.chars() {
            if self.glyph_idx(ch).is_none() {
                self.map_char(ch, TestGlyph::square());
            }
        }
        self
    }

    /// Maps `ch` to a composite glyph referencing the glyphs of `components`.
    /// Unmapped components are added as simple glyphs first.
    #[must_use]
    pub fn with_composite(mut self, ch: char, components: &str) -> Self {
        self = self.with_chars(components);
        let component_ids = components
            .chars()
            .filter_map(|component| self.glyph_idx(component))
            .collect();
        self.map_char(ch, TestGlyph::Composite(component_ids));
        self
    }

    /// Maps `ch` to a simple glyph with the specified contours and instructions.
    #[must_use]
    pub fn with_outline(
        mut self,
        ch: char,
        contours: &[&[OutlinePoint]],
        instructions: &[u8],
    ) -> Self {
        let glyph = TestGlyph::Simple {
            contours: contours.iter().map(|contour| contour.to_vec()).collect(),
            instructions: instructions.to_vec(),
        };
        self.map_char(ch, glyph);
        self
    }

    /// Adds an unmapped glyph substituting the glyph of `ch` via a single `GSUB` substitution.
    /// `ch` is mapped to a simple glyph if necessary.
    #[must_use]
    pub fn with_substitute(mut self, ch: char) -> Self {
        self = self.with_chars(&ch.to_string());
        let Some(input) = self.glyph_idx(ch) else {
            unreachable!("char was mapped above");
        };
        let output = self.push_glyph(TestGlyph::square());
        let pos = self
            .substitutions
            .partition_point(|&(existing, _)| existing < input);
        self.substitutions.insert(pos, (input, output));
        self
    }

    /// Builds a TrueType font.
    pub fn build(&self) -> Vec<u8> {
        self.writer().into_opentype()
    }

    /// Builds a WOFF2-wrapped font.
    pub fn build_woff2(&self) -> Vec<u8> {
        self.writer().into_woff2()
    }

    /// Builds a WOFF2-wrapped font with transformed `glyf`, `loca` and `hmtx` tables, similar
    /// to the fonts produced by common WOFF2 encoders.
    pub fn build_woff2_transformed(&self) -> Vec<u8> {
        let sfnt = self.build();
        let font = Font::new(&sfnt).expect("built font is valid");
        let head = font.table(TableTag::HEAD).expect("built font has `head`");
        let offset = Font::HEAD_LOCA_FORMAT_OFFSET;
        let index_format = u16::from_be_bytes([head[offset], head[offset + 1]]);

        let mut directory = vec![];
        let mut table_data = vec![];
        for tag in font.table_tags() {
            let table = font.table(tag).expect("tag is obtained from the font");
            let (transform_version, transformed) = match tag {
                TableTag::GLYF => (0, Some(self.transformed_glyf(index_format))),
                TableTag::LOCA => (0, Some(vec![])),
                TableTag::HMTX => (1, Some(self.transformed_hmtx())),
                _ => (0, None),
            };

            let tag_index = KNOWN_TAGS.iter().position(|&known| known == tag);
            let tag_index = tag_index.and_then(|idx| u8::try_from(idx).ok());
            directory.push(tag_index.unwrap_or(ARBITRARY_TAG_INDEX) | (transform_version << 6));
            if tag_index.is_none() {
                directory.extend_from_slice(tag.as_bytes());
            }
            let table_len = u32::try_from(table.len()).expect("table is too large");
            write_uint_base128(&mut directory, table_len);
            if let Some(transformed) = transformed {
                let transformed_len =
                    u32::try_from(transformed.len()).expect("table is too large");
                write_uint_base128(&mut directory, transformed_len);
                table_data.extend_from_slice(&transformed);
            } else {
                table_data.extend_from_slice(table);
            }
        }

        let mut compressed = vec![];
        let params = brotli::enc::BrotliEncoderParams::default();
        brotli::BrotliCompress(&mut table_data.as_slice(), &mut compressed, &params)
            .expect("compressing in-memory data never fails");

        let table_count = font.table_tags().count();
        let file_len = (48 + directory.len() + compressed.len()).next_multiple_of(4);
        let mut buffer = Vec::with_capacity(file_len);
        buffer.extend_from_slice(&SIGNATURE);
        write_u32(&mut buffer, Font::SFNT_VERSION); // flavor
        write_u32(&mut buffer, u32::try_from(file_len).expect("font is too large"));
        write_u16(&mut buffer, u16::try_from(table_count).expect("too many tables"));
        write_u16(&mut buffer, 0); // reserved
        write_u32(&mut buffer, u32::try_from(sfnt.len()).expect("font is too large"));
        write_u32(&mut buffer, u32::try_from(compressed.len()).expect("font is too large"));
        buffer.extend_from_slice(&[0; 24]); // version, metadata and private blocks
        buffer.extend_from_slice(&directory);
        buffer.extend_from_slice(&compressed);
        buffer.resize(file_len, 0);
        buffer
    }

    #[allow(clippy::cast_possible_truncation)] // test fonts are small
    fn transformed_glyf(&self, index_format: u16) -> Vec<u8> {
        let mut contour_counts = vec![];
        let mut point_counts = vec![];
        let mut flags = vec![];
        let mut glyph_stream = vec![];
        let mut composites = vec![];
        let mut bboxes = vec![0; 4 * self.glyphs.len().div_ceil(32)];
        let mut instructions_stream = vec![];

        let mut explicit_bboxes = vec![];
        for (glyph_idx, glyph) in self.glyphs.iter().enumerate() {
            match glyph {
                TestGlyph::Simple {
                    contours,
                    instructions,
                } => {
                    write_u16(&mut contour_counts, contours.len() as u16);
                    let (mut prev_x, mut prev_y) = (0_i32, 0_i32);
                    for contour in contours {
                        write_255_u16(&mut point_counts, contour.len() as u16);
                        for &(x, y, on_curve) in contour {
                            let (x, y) = (i32::from(x), i32::from(y));
                            let delta = (x - prev_x, y - prev_y);
                            write_triplet(delta, on_curve, &mut flags, &mut glyph_stream);
                            (prev_x, prev_y) = (x, y);
                        }
                    }
                    write_255_u16(&mut glyph_stream, instructions.len() as u16);
                    instructions_stream.extend_from_slice(instructions);
                }
                TestGlyph::Composite(_) => {
                    write_u16(&mut contour_counts, u16::MAX);
                    let mut glyph_data = vec![];
                    glyph.write(&mut glyph_data);
                    // Skip `numberOfContours` and the bounding box.
                    composites.extend_from_slice(&glyph_data[10..]);
                    bboxes[glyph_idx >> 3] |= 0x80 >> (glyph_idx & 7);
                    explicit_bboxes.extend_from_slice(&glyph_data[2..10]);
                }
            }
        }
        bboxes.extend_from_slice(&explicit_bboxes);

        let mut buffer = vec![];
        write_u16(&mut buffer, 0); // reserved
        write_u16(&mut buffer, 0); // optionFlags
        write_u16(&mut buffer, self.glyphs.len() as u16);
        write_u16(&mut buffer, index_format);
        let streams = [
            contour_counts,
            point_counts,
            flags,
            glyph_stream,
            composites,
            bboxes,
            instructions_stream,
        ];
        for stream in &streams {
            write_u32(&mut buffer, stream.len() as u32);
        }
        for stream in &streams {
            buffer.extend_from_slice(stream);
        }
        buffer
    }

    /// Writes `hmtx` with all left side bearings omitted; they are equal to `xMin` of glyphs.
    fn transformed_hmtx(&self) -> Vec<u8> {
        const NO_LSBS: u8 = 3;

        let mut buffer = vec![NO_LSBS];
        for _ in &self.glyphs {
            write_u16(&mut buffer, ADVANCE);
        }
        buffer
    }

    /// Builds a font by subsetting a built font to all its chars. Useful to check that subsetting
    /// with the provided options is lossless.
    pub fn build_subset(&self, layout_features: LayoutFeatures, flavor: Flavor) -> Vec<u8> {
        let bytes = self.build();
        let font = Font::new(&bytes).expect("built font is valid");
        let chars = self.char_map.iter().map(|&(ch, _)| ch).collect();
        let options = SubsetOptions {
            layout_features,
            flavor,
        };
        let subset = font.subset(&chars, options).expect("built font is valid");
        subset.to_bytes()
    }

    #[allow(clippy::cast_possible_truncation)] // test fonts are small
    fn writer(&self) -> FontWriter {
        let glyph_count = self.glyphs.len() as u16;
        let mut writer = FontWriter::default();

        let cmap = CmapTable::from_map(&self.char_map);
        writer.write_table(TableTag::CMAP, |buffer| cmap.write(buffer));
        writer.write_table(TableTag::HHEA, |buffer| {
            write_u32(buffer, 0x_0001_0000); // version
            // ascender, descender, lineGap, advanceWidthMax, minLeftSideBearing,
            // minRightSideBearing, xMaxExtent, caretSlopeRise, caretSlopeRun, caretOffset
            let x_max_extent = SQUARE_SIZE.unsigned_abs();
            for value in [800, 200_u16.wrapping_neg(), 0, ADVANCE, 0, 300, x_max_extent, 1, 0, 0] {
                write_u16(buffer, value);
            }
            buffer.extend_from_slice(&[0; 8]); // reserved
            write_u16(buffer, 0); // metricDataFormat
            write_u16(buffer, glyph_count); // numberOfHMetrics
        });
        writer.write_table(TableTag::HMTX, |buffer| {
            for glyph in &self.glyphs {
                write_u16(buffer, ADVANCE);
                buffer.extend_from_slice(&glyph.bbox()[0].to_be_bytes()); // lsb
            }
        });
        writer.write_table(TableTag::MAXP, |buffer| {
            write_u32(buffer, 0x_0001_0000); // version
            write_u16(buffer, glyph_count);
            let [max_points, max_contours, max_instructions] = self.simple_glyph_limits();
            // maxPoints, maxContours, maxCompositePoints, maxCompositeContours, maxZones,
            // maxTwilightPoints, maxStorage, maxFunctionDefs, maxInstructionDefs,
            // maxStackElements, maxSizeOfInstructions, maxComponentElements, maxComponentDepth
            let values = [
                max_points, max_contours, 32, 8, 2, 0, 0, 0, 0, 0, max_instructions, 8, 1,
            ];
            for value in values {
                write_u16(buffer, value);
            }
        });
        writer.write_table(TableTag::NAME, |buffer| {
            for value in [0, 0, 6] {
                write_u16(buffer, value); // version, count, storageOffset
            }
        });
        writer.write_table(TableTag::OS2, |buffer| {
            write_u16(buffer, 4); // version
            write_u16(buffer, ADVANCE); // xAvgCharWidth
            write_u16(buffer, 400); // usWeightClass
            write_u16(buffer, 5); // usWidthClass
            buffer.resize(buffer.len() + 88, 0);
        });
        writer.write_table(TableTag::POST, |buffer| {
            write_u32(buffer, 0x_0003_0000); // version
            write_u32(buffer, 0); // italicAngle
            write_u16(buffer, 100_u16.wrapping_neg()); // underlinePosition
            write_u16(buffer, 50); // underlineThickness
            buffer.extend_from_slice(&[0; 20]); // isFixedPitch, memory usage
        });
        if !self.substitutions.is_empty() {
            writer.write_table(TableTag::GSUB, |buffer| self.write_gsub(buffer));
        }

        let locations = writer.write_table(TableTag::GLYF, |buffer| {
            let start = buffer.len();
            let mut locations = vec![0];
            for glyph in &self.glyphs {
                glyph.write(buffer);
                locations.push(buffer.len() - start);
            }
            locations
        });
        let loca_format =
            writer.write_table(TableTag::LOCA, |buffer| LocaTable::write(&locations, buffer));
        let bbox = self.glyphs.iter().map(TestGlyph::bbox).reduce(union_bbox);
        let bbox = bbox.unwrap_or_default();
        writer.write_table(TableTag::HEAD, |buffer| Self::write_head(bbox, loca_format, buffer));
        writer
    }

    /// Returns the max number of points, contours and instruction bytes in simple glyphs.
    #[allow(clippy::cast_possible_truncation)] // test fonts are small
    fn simple_glyph_limits(&self) -> [u16; 3] {
        let mut limits = [0_u16; 3];
        for glyph in &self.glyphs {
            if let TestGlyph::Simple {
                contours,
                instructions,
            } = glyph
            {
                let point_count = glyph.points().count() as u16;
                let glyph_limits = [point_count, contours.len() as u16, instructions.len() as u16];
                for (limit, value) in limits.iter_mut().zip(glyph_limits) {
                    *limit = (*limit).max(value);
                }
            }
        }
        limits
    }

    fn write_head(bbox: [i16; 4], loca_format: LocaFormat, buffer: &mut Vec<u8>) {
        write_u32(buffer, 0x_0001_0000); // version
        write_u32(buffer, 0x_0001_0000); // fontRevision
        write_u32(buffer, 0); // checksumAdjustment
        write_u32(buffer, 0x_5f0f_3cf5); // magicNumber
        write_u16(buffer, 0x000b); // flags
        write_u16(buffer, UNITS_PER_EM);
        buffer.extend_from_slice(&[0; 16]); // created, modified
        for bound in bbox {
            buffer.extend_from_slice(&bound.to_be_bytes());
        }
        write_u16(buffer, 0); // macStyle
        write_u16(buffer, 8); // lowestRecPPEM
        write_u16(buffer, 2); // fontDirectionHint
        write_u16(
            buffer,
            match loca_format {
                LocaFormat::Short => 0,
                LocaFormat::Long => 1,
            },
        );
        write_u16(buffer, 0); // glyphDataFormat
        debug_assert_eq!(buffer.len() % 4, 2); // 54 bytes
    }

    /// Writes a `GSUB` table with a single lookup containing all substitutions.
    #[allow(clippy::cast_possible_truncation)] // test fonts are small
    fn write_gsub(&self, buffer: &mut Vec<u8>) {
        let count = self.substitutions.len() as u16;
        // Header; empty script list at 10, empty feature list at 12, lookup list at 14.
        for value in [1, 0, 10, 12, 14, 0, 0] {
            write_u16(buffer, value);
        }
        // Lookup list with a single lookup at offset 4.
        write_u16(buffer, 1);
        write_u16(buffer, 4);
        // Single substitution lookup with a single subtable at offset 8.
        for value in [1, 0, 1, 8] {
            write_u16(buffer, value);
        }
        // Subtable (format 2) with the coverage right after substitute glyphs.
        write_u16(buffer, 2);
        write_u16(buffer, 6 + 2 * count);
        write_u16(buffer, count);
        for &(_, output) in &self.substitutions {
            write_u16(buffer, output);
        }
        // Coverage (format 1)
        write_u16(buffer, 1);
        write_u16(buffer, count);
        for &(input, _) in &self.substitutions {
            write_u16(buffer, input);
        }
    }
}
