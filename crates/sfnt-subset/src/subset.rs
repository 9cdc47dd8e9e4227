use std::collections::{BTreeMap, BTreeSet};

use crate::{
    font::{Font, Glyph, GlyphWithMetrics},
    ParseError, TableTag,
};

/// Handling of OpenType Layout tables (`GSUB`, `GPOS`, etc.) during subsetting.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
#[non_exhaustive]
pub enum LayoutFeatures {
    /// Drop layout tables. Glyphs are renumbered compactly.
    None,
    /// Retain all layout features. Glyph IDs are preserved so that layout tables stay valid;
    /// glyphs reachable via `GSUB` substitutions are kept together with mapped glyphs.
    #[default]
    All,
}

/// Output wrapping of a [`FontSubset`].
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
#[non_exhaustive]
pub enum Flavor {
    /// Raw OpenType (sfnt) data.
    #[default]
    None,
    /// WOFF2 container with Brotli-compressed table data.
    Woff2,
}

/// Options for [`Font::subset()`].
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct SubsetOptions {
    /// Layout table handling.
    pub layout_features: LayoutFeatures,
    /// Output flavor.
    pub flavor: Flavor,
}

impl SubsetOptions {
    /// Sets layout table handling.
    #[must_use]
    pub fn with_layout_features(mut self, layout_features: LayoutFeatures) -> Self {
        self.layout_features = layout_features;
        self
    }

    /// Sets the output flavor.
    #[must_use]
    pub fn with_flavor(mut self, flavor: Flavor) -> Self {
        self.flavor = flavor;
        self
    }
}

/// Glyphs included into a subset.
#[derive(Debug)]
pub(crate) enum SubsetGlyphs<'a> {
    /// Glyphs are renumbered; a glyph is placed at its new index.
    Compact { glyphs: Vec<GlyphWithMetrics<'a>> },
    /// Glyph indices are retained; glyphs not in the map are emptied.
    Retained { glyphs: BTreeMap<u16, &'a [u8]> },
}

/// Subset of a [`Font`] produced by removing some of its glyphs and related data.
#[derive(Debug)]
pub struct FontSubset<'a> {
    pub(crate) font: Font<'a>,
    pub(crate) options: SubsetOptions,
    /// Mapping from chars to glyph indices in the subset, ordered by char.
    pub(crate) char_map: Vec<(char, u16)>,
    pub(crate) glyphs: SubsetGlyphs<'a>,
    missing_chars: Vec<char>,
}

impl<'a> FontSubset<'a> {
    pub(crate) fn new(
        font: Font<'a>,
        chars: &BTreeSet<char>,
        options: SubsetOptions,
    ) -> Result<Self, ParseError> {
        let mut char_map = Vec::with_capacity(chars.len());
        let mut missing_chars = vec![];
        for &ch in chars {
            match font.map_char(ch)? {
                0 => missing_chars.push(ch),
                glyph_idx => char_map.push((ch, glyph_idx)),
            }
        }
        if !missing_chars.is_empty() {
            log::info!(
                "{} of {} requested chars are not mapped by the font",
                missing_chars.len(),
                chars.len()
            );
        }

        let glyphs = match options.layout_features {
            LayoutFeatures::None => Self::compact_glyphs(&font, &mut char_map)?,
            LayoutFeatures::All => Self::retained_glyphs(&font, &char_map)?,
        };
        let this = Self {
            font,
            options,
            char_map,
            glyphs,
            missing_chars,
        };
        log::debug!(
            "subset contains {} chars and {} non-empty glyphs",
            this.char_map.len(),
            this.glyph_count()
        );
        Ok(this)
    }

    /// Renumbers glyphs, updating `char_map` in place.
    fn compact_glyphs(
        font: &Font<'a>,
        char_map: &mut [(char, u16)],
    ) -> Result<SubsetGlyphs<'a>, ParseError> {
        let mut builder = CompactBuilder {
            font,
            // The 0th glyph must always be mapped to itself
            old_to_new_glyph_idx: BTreeMap::from([(0, 0)]),
            glyphs: vec![font.glyph(0)?],
        };
        for (_, glyph_idx) in char_map {
            *glyph_idx = builder.ensure_glyph(*glyph_idx)?;
        }
        Ok(SubsetGlyphs::Compact {
            glyphs: builder.glyphs,
        })
    }

    fn retained_glyphs(
        font: &Font<'a>,
        char_map: &[(char, u16)],
    ) -> Result<SubsetGlyphs<'a>, ParseError> {
        let substitutions = font.substitution_closure()?;
        let mut glyph_ids: BTreeSet<u16> = char_map.iter().map(|&(_, idx)| idx).collect();
        glyph_ids.insert(0);

        let mut glyphs = BTreeMap::new();
        loop {
            let mut pending: Vec<_> = glyph_ids
                .iter()
                .copied()
                .filter(|idx| !glyphs.contains_key(idx))
                .collect();
            while let Some(glyph_idx) = pending.pop() {
                let data = font.glyph_data(glyph_idx)?;
                for component_idx in Glyph::new(data)?.component_ids() {
                    if glyph_ids.insert(component_idx) {
                        pending.push(component_idx);
                    }
                }
                glyphs.insert(glyph_idx, data.bytes);
            }

            let Some(substitutions) = &substitutions else {
                break;
            };
            if !substitutions.close_over(&mut glyph_ids) {
                break;
            }
            let glyph_count = font.glyph_count();
            if let Some(&invalid_idx) = glyph_ids.range(glyph_count..).next() {
                log::warn!("GSUB references glyph #{invalid_idx} outside the font; ignoring");
                glyph_ids.retain(|&idx| idx < glyph_count);
            }
        }
        Ok(SubsetGlyphs::Retained { glyphs })
    }

    /// Returns the options this subset was created with.
    pub fn options(&self) -> SubsetOptions {
        self.options
    }

    /// Iterates over chars mapped by this subset in increasing order.
    pub fn chars(&self) -> impl Iterator<Item = char> + '_ {
        self.char_map.iter().map(|&(ch, _)| ch)
    }

    /// Returns requested chars that the original font doesn't map, in increasing order.
    pub fn missing_chars(&self) -> &[char] {
        &self.missing_chars
    }

    /// Returns the number of non-empty glyphs in this subset, including the missing glyph.
    pub fn glyph_count(&self) -> usize {
        match &self.glyphs {
            SubsetGlyphs::Compact { glyphs } => glyphs.len(),
            SubsetGlyphs::Retained { glyphs } => glyphs.len(),
        }
    }

    /// Tables copied from the original font without changes.
    pub(crate) fn passthrough_tables(&self) -> &'static [TableTag] {
        const COMMON: &[TableTag] = &[
            TableTag::NAME,
            TableTag::OS2,
            TableTag::CVT,
            TableTag::FPGM,
            TableTag::PREP,
            TableTag::GASP,
        ];
        const WITH_LAYOUT: &[TableTag] = &[
            TableTag::NAME,
            TableTag::OS2,
            TableTag::CVT,
            TableTag::FPGM,
            TableTag::PREP,
            TableTag::GASP,
            TableTag::BASE,
            TableTag::GDEF,
            TableTag::GPOS,
            TableTag::GSUB,
            TableTag::VHEA,
            TableTag::VMTX,
        ];

        match &self.glyphs {
            SubsetGlyphs::Compact { .. } => COMMON,
            SubsetGlyphs::Retained { .. } => WITH_LAYOUT,
        }
    }
}

#[derive(Debug)]
struct CompactBuilder<'f, 'a> {
    font: &'f Font<'a>,
    old_to_new_glyph_idx: BTreeMap<u16, u16>,
    glyphs: Vec<GlyphWithMetrics<'a>>,
}

impl CompactBuilder<'_, '_> {
    fn ensure_glyph(&mut self, old_idx: u16) -> Result<u16, ParseError> {
        if let Some(new_idx) = self.old_to_new_glyph_idx.get(&old_idx) {
            return Ok(*new_idx);
        }

        let glyph = self.font.glyph(old_idx)?;
        let component_ids: Vec<_> = glyph.inner.component_ids().collect();
        // `expect()` is safe: the subset cannot contain more glyphs than the original font.
        let new_idx = u16::try_from(self.glyphs.len()).expect("too many glyphs");
        // Register the glyph before its components so that cyclic references terminate.
        self.old_to_new_glyph_idx.insert(old_idx, new_idx);
        self.glyphs.push(glyph);

        for (i, component_idx) in component_ids.into_iter().enumerate() {
            let new_component_idx = self.ensure_glyph(component_idx)?;
            if let Glyph::Composite { components, .. } =
                &mut self.glyphs[usize::from(new_idx)].inner
            {
                components[i].glyph_idx = new_component_idx;
            }
        }
        Ok(new_idx)
    }
}
