//! `Glyph` and related types.

use super::Cursor;
use crate::ParseError;

#[derive(Debug)]
pub(crate) enum Glyph<'a> {
    Empty,
    Simple(&'a [u8]),
    Composite {
        /// xMin, yMin, xMax, yMax
        header: [u8; 8],
        components: Vec<GlyphComponent>,
        /// Optional instructions after the last component descriptor
        instructions: &'a [u8],
    },
}

impl<'a> Glyph<'a> {
    pub(crate) fn new(raw: Cursor<'a>) -> Result<Self, ParseError> {
        if raw.bytes.is_empty() {
            return Ok(Self::Empty);
        }

        let mut cursor = raw;
        let number_of_contours = cursor.read_u16()?;
        if number_of_contours <= i16::MAX as u16 {
            return Ok(Self::Simple(raw.bytes));
        }

        let header = cursor.read_byte_array::<8>()?;
        let mut components = Vec::with_capacity(1);
        loop {
            let (component, has_more_components) = GlyphComponent::new(&mut cursor)?;
            components.push(component);
            if !has_more_components {
                break;
            }
        }
        Ok(Self::Composite {
            header,
            components,
            instructions: cursor.bytes,
        })
    }

    /// Iterates over glyph indices referenced by this glyph.
    pub(crate) fn component_ids(&self) -> impl Iterator<Item = u16> + '_ {
        let components: &[GlyphComponent] = match self {
            Self::Composite { components, .. } => components.as_slice(),
            Self::Empty | Self::Simple(_) => &[],
        };
        components.iter().map(|component| component.glyph_idx)
    }
}

#[derive(Debug)]
pub(crate) struct GlyphComponent {
    pub(crate) flags: u16,
    pub(crate) glyph_idx: u16,
    pub(crate) args: GlyphComponentArgs,
    pub(crate) transform: TransformData,
}

impl GlyphComponent {
    pub(crate) const ARG_1_AND_2_ARE_WORDS: u16 = 0x0001;
    pub(crate) const WE_HAVE_A_SCALE: u16 = 0x0008;
    pub(crate) const MORE_COMPONENTS: u16 = 0x0020;
    pub(crate) const WE_HAVE_AN_X_AND_Y_SCALE: u16 = 0x0040;
    pub(crate) const WE_HAVE_A_TWO_BY_TWO: u16 = 0x0080;
    pub(crate) const WE_HAVE_INSTRUCTIONS: u16 = 0x0100;

    fn new(cursor: &mut Cursor<'_>) -> Result<(Self, bool), ParseError> {
        let flags = cursor.read_u16()?;
        let glyph_idx = cursor.read_u16()?;
        let args = if flags & Self::ARG_1_AND_2_ARE_WORDS != 0 {
            GlyphComponentArgs::Words(cursor.read_u32()?)
        } else {
            GlyphComponentArgs::Bytes(cursor.read_u16()?)
        };

        let transform = if flags & Self::WE_HAVE_A_SCALE != 0 {
            TransformData::Scale(cursor.read_u16()?)
        } else if flags & Self::WE_HAVE_AN_X_AND_Y_SCALE != 0 {
            TransformData::TwoScales([cursor.read_u16()?, cursor.read_u16()?])
        } else if flags & Self::WE_HAVE_A_TWO_BY_TWO != 0 {
            TransformData::Affine([
                cursor.read_u16()?,
                cursor.read_u16()?,
                cursor.read_u16()?,
                cursor.read_u16()?,
            ])
        } else {
            TransformData::None
        };

        let this = Self {
            flags,
            glyph_idx,
            args,
            transform,
        };
        Ok((this, flags & Self::MORE_COMPONENTS != 0))
    }
}

/// Component offsets or anchor point indices, stored verbatim.
#[derive(Debug)]
pub(crate) enum GlyphComponentArgs {
    Bytes(u16),
    Words(u32),
}

#[derive(Debug)]
pub(crate) enum TransformData {
    None,
    Scale(u16),
    TwoScales([u16; 2]),
    Affine([u16; 4]),
}

/// [`Glyph`] together with metrics read from the `hmtx` table.
#[derive(Debug)]
pub(crate) struct GlyphWithMetrics<'a> {
    pub(crate) inner: Glyph<'a>,
    pub(crate) advance: u16,
    pub(crate) lsb: u16,
}
