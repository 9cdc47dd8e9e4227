//! Reversing WOFF2 transforms of `glyf` / `loca` and `hmtx` tables.

use crate::{
    errors::ParseErrorKind,
    font::{Cursor, GlyphComponent, LocaFormat},
    write::{write_u16, write_u32},
    ParseError,
};

/// Reads a `255UInt16` value.
pub(crate) fn read_255_u16(cursor: &mut Cursor<'_>) -> Result<u16, ParseError> {
    const WORD_CODE: u8 = 253;
    const ONE_MORE_BYTE_CODE2: u8 = 254;
    const ONE_MORE_BYTE_CODE1: u8 = 255;
    const LOWEST_U_CODE: u16 = 253;

    let [code] = cursor.read_byte_array()?;
    match code {
        WORD_CODE => cursor.read_u16(),
        ONE_MORE_BYTE_CODE1 => {
            let [byte] = cursor.read_byte_array()?;
            Ok(u16::from(byte) + LOWEST_U_CODE)
        }
        ONE_MORE_BYTE_CODE2 => {
            let [byte] = cursor.read_byte_array()?;
            Ok(u16::from(byte) + LOWEST_U_CODE * 2)
        }
        _ => Ok(code.into()),
    }
}

/// Reads the coordinate deltas of a point encoded as a triplet. The on-curve bit of `flag`
/// is ignored.
fn read_triplet(flag: u8, glyph_stream: &mut Cursor<'_>) -> Result<(i32, i32), ParseError> {
    fn with_sign(flag: u8, value: i32) -> i32 {
        if flag & 1 == 0 {
            -value
        } else {
            value
        }
    }

    let flag = flag & 0x7f;
    Ok(if flag < 10 {
        let [b0] = glyph_stream.read_byte_array()?;
        let dy = (i32::from(flag & 14) << 7) + i32::from(b0);
        (0, with_sign(flag, dy))
    } else if flag < 20 {
        let [b0] = glyph_stream.read_byte_array()?;
        let dx = (i32::from((flag - 10) & 14) << 7) + i32::from(b0);
        (with_sign(flag, dx), 0)
    } else if flag < 84 {
        let [b0] = glyph_stream.read_byte_array()?;
        let (b, b0) = (i32::from(flag - 20), i32::from(b0));
        let dx = 1 + (b & 0x30) + (b0 >> 4);
        let dy = 1 + ((b & 0x0c) << 2) + (b0 & 0x0f);
        (with_sign(flag, dx), with_sign(flag >> 1, dy))
    } else if flag < 120 {
        let [b0, b1] = glyph_stream.read_byte_array()?;
        let b = i32::from(flag - 84);
        let dx = 1 + ((b / 12) << 8) + i32::from(b0);
        let dy = 1 + (((b % 12) >> 2) << 8) + i32::from(b1);
        (with_sign(flag, dx), with_sign(flag >> 1, dy))
    } else if flag < 124 {
        let [b0, b1, b2] = glyph_stream
            .read_byte_array::<3>()
            .map(|bytes| bytes.map(i32::from))?;
        let dx = (b0 << 4) + (b1 >> 4);
        let dy = ((b1 & 0x0f) << 8) + b2;
        (with_sign(flag, dx), with_sign(flag >> 1, dy))
    } else {
        let dx = i32::from(glyph_stream.read_u16()?);
        let dy = i32::from(glyph_stream.read_u16()?);
        (with_sign(flag, dx), with_sign(flag >> 1, dy))
    })
}

fn is_bit_set(bitmap: &[u8], glyph_idx: u16) -> bool {
    bitmap
        .get(usize::from(glyph_idx >> 3))
        .is_some_and(|&byte| byte & (0x80 >> (glyph_idx & 7)) != 0)
}

#[derive(Debug, Clone, Copy)]
struct Point {
    dx: i32,
    dy: i32,
    on_curve: bool,
}

/// `glyf` and `loca` tables restored from a transformed `glyf` table.
#[derive(Debug)]
pub(super) struct GlyfTables {
    pub(super) glyf: Vec<u8>,
    pub(super) loca: Vec<u8>,
    /// `xMin` of each glyph; 0 for empty glyphs.
    pub(super) x_mins: Vec<i16>,
}

/// Substreams of a transformed `glyf` table.
#[derive(Debug)]
struct GlyfStreams<'a> {
    contour_counts: Cursor<'a>,
    point_counts: Cursor<'a>,
    flags: Cursor<'a>,
    glyphs: Cursor<'a>,
    composites: Cursor<'a>,
    bbox_bitmap: &'a [u8],
    bboxes: Cursor<'a>,
    instructions: Cursor<'a>,
    overlap_bitmap: Option<&'a [u8]>,
}

impl<'a> GlyfStreams<'a> {
    const OVERLAP_SIMPLE_BITMAP: u16 = 1;

    // Flags of simple glyph points in the `glyf` table
    const ON_CURVE_POINT: u8 = 0x01;
    const X_SHORT_VECTOR: u8 = 0x02;
    const Y_SHORT_VECTOR: u8 = 0x04;
    const REPEAT_FLAG: u8 = 0x08;
    const X_IS_SAME_OR_POSITIVE: u8 = 0x10;
    const Y_IS_SAME_OR_POSITIVE: u8 = 0x20;
    const OVERLAP_SIMPLE: u8 = 0x40;

    fn parse(cursor: &mut Cursor<'a>) -> Result<(Self, u16, LocaFormat), ParseError> {
        cursor.skip(2)?; // reserved
        let option_flags = cursor.read_u16()?;
        let glyph_count = cursor.read_u16()?;
        let loca_format = cursor.read_u16_checked(|format| match format {
            0 => Ok(LocaFormat::Short),
            1 => Ok(LocaFormat::Long),
            _ => Err(ParseErrorKind::UnexpectedLocaFormat(format)),
        })?;

        let mut stream_lens = [0_u32; 7];
        for len in &mut stream_lens {
            *len = cursor.read_u32()?;
        }
        let [contour_counts, point_counts, flags, glyphs, composites, bboxes, instructions] =
            stream_lens;
        let mut next_stream = |len: u32| cursor.split_at(len as usize);
        let contour_counts = next_stream(contour_counts)?;
        let point_counts = next_stream(point_counts)?;
        let flags = next_stream(flags)?;
        let glyphs = next_stream(glyphs)?;
        let composites = next_stream(composites)?;
        let mut bboxes = next_stream(bboxes)?;
        let instructions = next_stream(instructions)?;

        let bbox_bitmap_len = 4 * usize::from(glyph_count).div_ceil(32);
        let bbox_bitmap = bboxes.split_at(bbox_bitmap_len)?.bytes;
        let overlap_bitmap = if option_flags & Self::OVERLAP_SIMPLE_BITMAP != 0 {
            let bitmap_len = usize::from(glyph_count).div_ceil(8);
            Some(cursor.split_at(bitmap_len)?.bytes)
        } else {
            None
        };

        let this = Self {
            contour_counts,
            point_counts,
            flags,
            glyphs,
            composites,
            bbox_bitmap,
            bboxes,
            instructions,
            overlap_bitmap,
        };
        Ok((this, glyph_count, loca_format))
    }

    fn read_bbox(&mut self) -> Result<[i16; 4], ParseError> {
        let mut bbox = [0_i16; 4];
        for bound in &mut bbox {
            *bound = i16::from_be_bytes(self.bboxes.read_byte_array()?);
        }
        Ok(bbox)
    }

    /// Writes the glyph in the `glyf` table format and returns its `xMin`.
    fn write_glyph(&mut self, glyph_idx: u16, buffer: &mut Vec<u8>) -> Result<i16, ParseError> {
        let contours_start = self.contour_counts;
        let contour_count = i16::from_be_bytes(self.contour_counts.read_byte_array()?);
        let has_bbox = is_bit_set(self.bbox_bitmap, glyph_idx);
        match contour_count {
            0 => Ok(0),
            -1 => {
                if !has_bbox {
                    let err = ParseErrorKind::MalformedGlyph { glyph_idx };
                    return Err(self.bboxes.err(err));
                }
                self.write_composite_glyph(buffer)
            }
            1.. => {
                let contour_count = contour_count.unsigned_abs();
                self.write_simple_glyph(glyph_idx, contour_count, has_bbox, buffer)
            }
            _ => Err(contours_start.err(ParseErrorKind::MalformedGlyph { glyph_idx })),
        }
    }

    fn write_simple_glyph(
        &mut self,
        glyph_idx: u16,
        contour_count: u16,
        has_bbox: bool,
        buffer: &mut Vec<u8>,
    ) -> Result<i16, ParseError> {
        let mut end_points = Vec::with_capacity(usize::from(contour_count));
        let mut point_count = 0_u16;
        for _ in 0..contour_count {
            let start = self.point_counts;
            let contour_len = read_255_u16(&mut self.point_counts)?;
            point_count = point_count
                .checked_add(contour_len)
                .filter(|&count| count > 0)
                .ok_or_else(|| start.err(ParseErrorKind::MalformedGlyph { glyph_idx }))?;
            end_points.push(point_count - 1);
        }

        let mut points = Vec::with_capacity(usize::from(point_count));
        for _ in 0..point_count {
            let [flag] = self.flags.read_byte_array()?;
            let (dx, dy) = read_triplet(flag, &mut self.glyphs)?;
            let on_curve = flag & 0x80 == 0;
            points.push(Point { dx, dy, on_curve });
        }
        let instructions_len = read_255_u16(&mut self.glyphs)?;
        let instructions = self.instructions.split_at(usize::from(instructions_len))?;
        let bbox = if has_bbox {
            self.read_bbox()?
        } else {
            Self::compute_bbox(&points)
        };

        buffer.extend_from_slice(&contour_count.to_be_bytes());
        for bound in bbox {
            buffer.extend_from_slice(&bound.to_be_bytes());
        }
        for end_point in end_points {
            write_u16(buffer, end_point);
        }
        write_u16(buffer, instructions_len);
        buffer.extend_from_slice(instructions.bytes);

        let overlaps = self
            .overlap_bitmap
            .is_some_and(|bitmap| is_bit_set(bitmap, glyph_idx));
        Self::write_points(&points, overlaps, buffer);
        Ok(bbox[0])
    }

    #[allow(clippy::cast_possible_truncation)] // coordinates in valid fonts fit into `i16`
    fn compute_bbox(points: &[Point]) -> [i16; 4] {
        let Some(first) = points.first() else {
            return [0; 4];
        };
        let (mut x, mut y) = (first.dx, first.dy);
        let mut bbox = [x, y, x, y];
        for point in &points[1..] {
            x += point.dx;
            y += point.dy;
            bbox = [bbox[0].min(x), bbox[1].min(y), bbox[2].max(x), bbox[3].max(y)];
        }
        bbox.map(|bound| bound as i16)
    }

    #[allow(clippy::cast_possible_truncation)] // coordinates in valid fonts fit into `i16`
    fn write_points(points: &[Point], overlaps: bool, buffer: &mut Vec<u8>) {
        let mut flags = Vec::with_capacity(points.len());
        let mut x_coords = vec![];
        let mut y_coords = vec![];
        for point in points {
            let mut flag = if point.on_curve {
                Self::ON_CURVE_POINT
            } else {
                0
            };
            flag |= Self::write_coordinate(
                point.dx,
                [Self::X_SHORT_VECTOR, Self::X_IS_SAME_OR_POSITIVE],
                &mut x_coords,
            );
            flag |= Self::write_coordinate(
                point.dy,
                [Self::Y_SHORT_VECTOR, Self::Y_IS_SAME_OR_POSITIVE],
                &mut y_coords,
            );
            flags.push(flag);
        }
        if overlaps {
            if let Some(first) = flags.first_mut() {
                *first |= Self::OVERLAP_SIMPLE;
            }
        }

        let mut remaining = flags.as_slice();
        while let Some((&flag, tail)) = remaining.split_first() {
            let repeats = tail
                .iter()
                .take(usize::from(u8::MAX))
                .take_while(|&&next| next == flag)
                .count();
            if repeats > 0 {
                buffer.push(flag | Self::REPEAT_FLAG);
                buffer.push(repeats as u8);
            } else {
                buffer.push(flag);
            }
            remaining = &tail[repeats..];
        }
        buffer.extend_from_slice(&x_coords);
        buffer.extend_from_slice(&y_coords);
    }

    /// Writes a coordinate delta and returns the corresponding point flags.
    #[allow(clippy::cast_possible_truncation)] // coordinates in valid fonts fit into `i16`
    fn write_coordinate(
        delta: i32,
        [short_flag, same_or_positive_flag]: [u8; 2],
        buffer: &mut Vec<u8>,
    ) -> u8 {
        if delta == 0 {
            same_or_positive_flag
        } else if delta.unsigned_abs() <= u32::from(u8::MAX) {
            buffer.push(delta.unsigned_abs() as u8);
            if delta > 0 {
                short_flag | same_or_positive_flag
            } else {
                short_flag
            }
        } else {
            buffer.extend_from_slice(&(delta as i16).to_be_bytes());
            0
        }
    }

    fn write_composite_glyph(&mut self, buffer: &mut Vec<u8>) -> Result<i16, ParseError> {
        let start = self.composites;
        let mut has_instructions = false;
        loop {
            let flags = self.composites.read_u16()?;
            has_instructions |= flags & GlyphComponent::WE_HAVE_INSTRUCTIONS != 0;
            let args_len = if flags & GlyphComponent::ARG_1_AND_2_ARE_WORDS != 0 {
                4
            } else {
                2
            };
            let transform_len = if flags & GlyphComponent::WE_HAVE_A_SCALE != 0 {
                2
            } else if flags & GlyphComponent::WE_HAVE_AN_X_AND_Y_SCALE != 0 {
                4
            } else if flags & GlyphComponent::WE_HAVE_A_TWO_BY_TWO != 0 {
                8
            } else {
                0
            };
            self.composites.skip(2 + args_len + transform_len)?; // glyphIndex, args, transform
            if flags & GlyphComponent::MORE_COMPONENTS == 0 {
                break;
            }
        }
        let components_len = start.bytes.len() - self.composites.bytes.len();
        let components = start.range(0..components_len)?;

        let bbox = self.read_bbox()?;
        write_u16(buffer, u16::MAX); // numberOfContours = -1
        for bound in bbox {
            buffer.extend_from_slice(&bound.to_be_bytes());
        }
        buffer.extend_from_slice(components.bytes);
        if has_instructions {
            let instructions_len = read_255_u16(&mut self.glyphs)?;
            let instructions = self.instructions.split_at(usize::from(instructions_len))?;
            write_u16(buffer, instructions_len);
            buffer.extend_from_slice(instructions.bytes);
        }
        Ok(bbox[0])
    }
}

/// Restores `glyf` and `loca` tables. Glyphs are padded according to the `loca` format
/// specified in the transformed data, which must match the one in the `head` table.
pub(super) fn restore_glyf(mut cursor: Cursor<'_>) -> Result<GlyfTables, ParseError> {
    let start = cursor;
    let (mut streams, glyph_count, loca_format) = GlyfStreams::parse(&mut cursor)?;
    let alignment = loca_format.bytes_per_offset();

    let mut glyf = vec![];
    let mut locations = Vec::with_capacity(usize::from(glyph_count) + 1);
    locations.push(0);
    let mut x_mins = Vec::with_capacity(usize::from(glyph_count));
    for glyph_idx in 0..glyph_count {
        x_mins.push(streams.write_glyph(glyph_idx, &mut glyf)?);
        glyf.resize(glyf.len().next_multiple_of(alignment), 0);
        locations.push(glyf.len());
    }

    let mut loca = Vec::with_capacity(alignment * locations.len());
    match loca_format {
        LocaFormat::Short => {
            for loc in locations {
                let loc = u16::try_from(loc / 2)
                    .map_err(|_| start.err(ParseErrorKind::UnexpectedLocaFormat(0)))?;
                write_u16(&mut loca, loc);
            }
        }
        LocaFormat::Long => {
            for loc in locations {
                let loc = u32::try_from(loc)
                    .map_err(|_| start.err(ParseErrorKind::UnexpectedLocaFormat(1)))?;
                write_u32(&mut loca, loc);
            }
        }
    }
    log::debug!(
        "restored {glyph_count} glyphs ({} bytes) from transformed `glyf` table",
        glyf.len()
    );
    Ok(GlyfTables { glyf, loca, x_mins })
}

/// Restores the `hmtx` table. Omitted left side bearings are equal to `xMin` of the
/// corresponding glyphs.
pub(super) fn restore_hmtx(
    mut cursor: Cursor<'_>,
    number_of_h_metrics: u16,
    x_mins: &[i16],
) -> Result<Vec<u8>, ParseError> {
    const NO_PROPORTIONAL_LSBS: u8 = 1;
    const NO_MONOSPACED_LSBS: u8 = 2;

    let start = cursor;
    let [flags] = cursor.read_byte_array()?;
    let metrics_count = usize::from(number_of_h_metrics);
    if metrics_count == 0 || metrics_count > x_mins.len() {
        return Err(start.err(ParseErrorKind::UnexpectedTableLen {
            expected: x_mins.len(),
            actual: metrics_count,
        }));
    }

    let mut advances = cursor.split_at(2 * metrics_count)?;
    let mut proportional_lsbs = if flags & NO_PROPORTIONAL_LSBS == 0 {
        Some(cursor.split_at(2 * metrics_count)?)
    } else {
        None
    };
    let mut monospaced_lsbs = if flags & NO_MONOSPACED_LSBS == 0 {
        Some(cursor.split_at(2 * (x_mins.len() - metrics_count))?)
    } else {
        None
    };

    let mut buffer = Vec::with_capacity(4 * metrics_count + 2 * (x_mins.len() - metrics_count));
    for (i, x_min) in x_mins.iter().enumerate() {
        let lsbs = if i < metrics_count {
            write_u16(&mut buffer, advances.read_u16()?);
            &mut proportional_lsbs
        } else {
            &mut monospaced_lsbs
        };
        match lsbs {
            Some(lsbs) => write_u16(&mut buffer, lsbs.read_u16()?),
            None => buffer.extend_from_slice(&x_min.to_be_bytes()),
        }
    }
    Ok(buffer)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::TableTag;

    #[test]
    fn reading_255_u16() {
        let samples: &[(&[u8], u16)] = &[
            (&[0], 0),
            (&[252], 252),
            (&[255, 0], 253),
            (&[255, 252], 505),
            (&[254, 0], 506),
            (&[254, 255], 761),
            (&[253, 0x12, 0x34], 0x1234),
        ];
        for &(bytes, expected) in samples {
            let mut cursor = Cursor::new(bytes);
            assert_eq!(read_255_u16(&mut cursor).unwrap(), expected, "{bytes:?}");
            assert!(cursor.bytes.is_empty());
        }
        read_255_u16(&mut Cursor::new(&[253, 0])).unwrap_err();
    }

    #[test]
    fn reading_triplets() {
        let samples: &[(u8, &[u8], (i32, i32))] = &[
            (1, &[0], (0, 0)),
            (0, &[5], (0, -5)),
            (3, &[0x10], (0, 256 + 16)),
            (11, &[0x20], (32, 0)),
            (20, &[0x12], (-2, -3)),
            (23, &[0x12], (2, 3)),
            (0x80 | 99, &[4, 5], (261, 6)),
            (120, &[0x10, 0x23, 0x45], (-258, -837)),
            (127, &[0x12, 0x34, 0x00, 0x10], (0x1234, 16)),
        ];
        for &(flag, bytes, expected) in samples {
            let mut cursor = Cursor::new(bytes);
            assert_eq!(read_triplet(flag, &mut cursor).unwrap(), expected, "{flag}");
            assert!(cursor.bytes.is_empty());
        }
    }

    fn glyf_stream(streams: [&[u8]; 7], option_flags: u16, trailer: &[u8]) -> Vec<u8> {
        let mut data = vec![];
        write_u16(&mut data, 0); // reserved
        write_u16(&mut data, option_flags);
        write_u16(&mut data, 1); // numGlyphs
        write_u16(&mut data, 0); // indexFormat
        for stream in streams {
            write_u32(&mut data, stream.len() as u32);
        }
        for stream in streams {
            data.extend_from_slice(stream);
        }
        data.extend_from_slice(trailer);
        data
    }

    #[test]
    fn restoring_simple_glyph() {
        let mut bbox_stream = vec![0x80, 0, 0, 0];
        for bound in [-5_i16, -5, 105, 55] {
            bbox_stream.extend_from_slice(&bound.to_be_bytes());
        }
        let data = glyf_stream(
            [
                &[0, 1],            // 1 contour
                &[3],               // 3 points
                &[1, 0x80 | 87, 0], // (0, 0), off-curve (100, 50), (0, -50)
                &[0, 99, 49, 50, 2],
                &[],
                &bbox_stream,
                &[0xb0, 0x01],
            ],
            GlyfStreams::OVERLAP_SIMPLE_BITMAP,
            &[0x80],
        );
        let tables = restore_glyf(Cursor::for_table(TableTag::GLYF, &data)).unwrap();

        let expected_glyph = [
            0, 1, // numberOfContours
            0xff, 0xfb, 0xff, 0xfb, 0, 105, 0, 55, // bbox
            0, 2, // endPtsOfContours
            0, 2, 0xb0, 0x01, // instructions
            0x71, 0x36, 0x15, // flags
            100, // x coordinates
            50, 50, // y coordinates
        ];
        assert_eq!(tables.glyf, expected_glyph);
        assert_eq!(tables.loca, [0, 0, 0, 11]);
        assert_eq!(tables.x_mins, [-5]);
    }

    #[test]
    fn restoring_simple_glyph_with_computed_bbox() {
        let data = glyf_stream(
            [
                &[0, 1],
                &[2],
                &[0x80 | 87, 1],
                &[99, 49, 0, 0],
                &[],
                &[0; 4],
                &[],
            ],
            0,
            &[],
        );
        let tables = restore_glyf(Cursor::for_table(TableTag::GLYF, &data)).unwrap();
        assert_eq!(tables.glyf[2..10], [0, 100, 0, 50, 0, 100, 0, 50]);
        // Flags: off-curve with short positive coordinates, then on-curve with same coordinates
        assert_eq!(tables.glyf[14..16], [0x36, 0x31]);
        assert_eq!(tables.x_mins, [100]);
    }

    #[test]
    fn composite_glyph_requires_bbox() {
        let composite: [u8; 6] = [0, 0x02, 0, 1, 0, 0]; // XY args in bytes, glyph #1
        let data = glyf_stream([&[0xff, 0xff], &[], &[], &[], &composite, &[0; 4], &[]], 0, &[]);
        let err = restore_glyf(Cursor::for_table(TableTag::GLYF, &data)).unwrap_err();
        assert!(
            matches!(err.kind(), ParseErrorKind::MalformedGlyph { glyph_idx: 0 }),
            "{err:?}"
        );
    }

    #[test]
    fn restoring_hmtx() {
        let x_mins = [-5, 7, 0];
        let hmtx = restore_hmtx(Cursor::new(&[3, 0x03, 0xe8]), 1, &x_mins).unwrap();
        assert_eq!(hmtx, [0x03, 0xe8, 0xff, 0xfb, 0, 7, 0, 0]);

        // Only proportional LSBs are omitted.
        let data = [1, 0x03, 0xe8, 0x02, 0x00, 0, 1];
        let hmtx = restore_hmtx(Cursor::new(&data), 2, &x_mins).unwrap();
        assert_eq!(hmtx, [0x03, 0xe8, 0xff, 0xfb, 0x02, 0x00, 0, 7, 0, 1]);

        restore_hmtx(Cursor::new(&[3, 0x03, 0xe8]), 4, &x_mins).unwrap_err();
    }
}
