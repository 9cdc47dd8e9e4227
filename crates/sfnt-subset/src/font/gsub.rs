//! Glyph closure over `GSUB` lookups.
//!
//! The closure is conservative: it ignores scripts, features and lookup contexts, so it may keep
//! more glyphs than strictly necessary, but never drops a glyph reachable by a substitution.

use std::collections::BTreeSet;

use super::Cursor;
use crate::{errors::ParseErrorKind, ParseError};

#[derive(Debug, Clone, PartialEq, Eq)]
enum Substitution {
    /// Single, multiple and alternate substitutions: `input` may be replaced with `outputs`.
    Replace { input: u16, outputs: Vec<u16> },
    /// Ligature substitution: `components` (in order, including the first one) form `glyph`.
    Ligature { components: Vec<u16>, glyph: u16 },
}

/// Substitution rules extracted from the `GSUB` table.
#[derive(Debug, Default)]
pub(crate) struct SubstitutionClosure {
    rules: Vec<Substitution>,
}

impl SubstitutionClosure {
    const SINGLE: u16 = 1;
    const MULTIPLE: u16 = 2;
    const ALTERNATE: u16 = 3;
    const LIGATURE: u16 = 4;
    const EXTENSION: u16 = 7;

    pub(crate) fn parse(mut cursor: Cursor<'_>) -> Result<Self, ParseError> {
        let table = cursor;
        cursor.read_u16_checked(|major_version| {
            if major_version == 1 {
                Ok(())
            } else {
                Err(ParseErrorKind::UnexpectedTableVersion {
                    version: major_version.into(),
                })
            }
        })?;
        cursor.skip(6)?; // minorVersion, scriptListOffset, featureListOffset
        let lookup_list = table.at(cursor.read_u16()?.into())?;

        let mut this = Self::default();
        let mut offsets = lookup_list;
        let lookup_count = offsets.read_u16()?;
        for _ in 0..lookup_count {
            let lookup = lookup_list.at(offsets.read_u16()?.into())?;
            this.parse_lookup(lookup)?;
        }
        log::debug!(
            "extracted {} substitution rules from {lookup_count} GSUB lookups",
            this.rules.len()
        );
        Ok(this)
    }

    fn parse_lookup(&mut self, lookup: Cursor<'_>) -> Result<(), ParseError> {
        let mut cursor = lookup;
        let lookup_type = cursor.read_u16()?;
        cursor.skip(2)?; // lookupFlag
        let subtable_count = cursor.read_u16()?;
        for _ in 0..subtable_count {
            let subtable = lookup.at(cursor.read_u16()?.into())?;
            self.parse_subtable(lookup_type, subtable)?;
        }
        Ok(())
    }

    fn parse_subtable(&mut self, lookup_type: u16, subtable: Cursor<'_>) -> Result<(), ParseError> {
        match lookup_type {
            Self::SINGLE => self.parse_single(subtable),
            Self::MULTIPLE | Self::ALTERNATE => self.parse_sequences(subtable),
            Self::LIGATURE => self.parse_ligatures(subtable),
            Self::EXTENSION => {
                let mut cursor = subtable;
                read_format(&mut cursor, &[1])?;
                let extension_type = cursor.read_u16_checked(|ty| {
                    if ty == Self::EXTENSION {
                        Err(ParseErrorKind::UnexpectedTableFormat { format: ty })
                    } else {
                        Ok(ty)
                    }
                })?;
                let offset = cursor.read_u32()? as usize;
                self.parse_subtable(extension_type, subtable.at(offset)?)
            }
            // Contextual lookups only invoke other lookups, which are processed on their own.
            _ => Ok(()),
        }
    }

    fn parse_single(&mut self, subtable: Cursor<'_>) -> Result<(), ParseError> {
        let mut cursor = subtable;
        let format = read_format(&mut cursor, &[1, 2])?;
        let coverage = read_coverage(subtable.at(cursor.read_u16()?.into())?)?;
        if format == 1 {
            let delta = cursor.read_u16()?;
            self.rules
                .extend(coverage.into_iter().map(|input| Substitution::Replace {
                    input,
                    outputs: vec![input.wrapping_add(delta)],
                }));
        } else {
            let glyph_count = cursor.read_u16()?;
            let substitutes = read_glyph_array(&mut cursor, glyph_count)?;
            let rules = coverage
                .into_iter()
                .zip(substitutes)
                .map(|(input, output)| Substitution::Replace {
                    input,
                    outputs: vec![output],
                });
            self.rules.extend(rules);
        }
        Ok(())
    }

    /// Parses multiple and alternate substitution subtables; they share the same layout.
    fn parse_sequences(&mut self, subtable: Cursor<'_>) -> Result<(), ParseError> {
        let mut cursor = subtable;
        read_format(&mut cursor, &[1])?;
        let coverage = read_coverage(subtable.at(cursor.read_u16()?.into())?)?;
        let sequence_count = cursor.read_u16()?;
        for input in coverage.into_iter().take(sequence_count.into()) {
            let mut sequence = subtable.at(cursor.read_u16()?.into())?;
            let glyph_count = sequence.read_u16()?;
            let outputs = read_glyph_array(&mut sequence, glyph_count)?;
            self.rules.push(Substitution::Replace { input, outputs });
        }
        Ok(())
    }

    fn parse_ligatures(&mut self, subtable: Cursor<'_>) -> Result<(), ParseError> {
        let mut cursor = subtable;
        read_format(&mut cursor, &[1])?;
        let coverage = read_coverage(subtable.at(cursor.read_u16()?.into())?)?;
        let set_count = cursor.read_u16()?;
        for first in coverage.into_iter().take(set_count.into()) {
            let ligature_set = subtable.at(cursor.read_u16()?.into())?;
            let mut offsets = ligature_set;
            let ligature_count = offsets.read_u16()?;
            for _ in 0..ligature_count {
                let mut ligature = ligature_set.at(offsets.read_u16()?.into())?;
                let glyph = ligature.read_u16()?;
                let component_count = ligature.read_u16()?.saturating_sub(1);
                let mut components = vec![first];
                components.extend(read_glyph_array(&mut ligature, component_count)?);
                self.rules
                    .push(Substitution::Ligature { components, glyph });
            }
        }
        Ok(())
    }

    /// Extends `glyphs` with all glyphs reachable via substitutions. Returns `true` if any glyphs
    /// were added.
    pub(crate) fn close_over(&self, glyphs: &mut BTreeSet<u16>) -> bool {
        let initial_len = glyphs.len();
        loop {
            let len_before_pass = glyphs.len();
            for rule in &self.rules {
                match rule {
                    Substitution::Replace { input, outputs } => {
                        if glyphs.contains(input) {
                            glyphs.extend(outputs);
                        }
                    }
                    Substitution::Ligature { components, glyph } => {
                        if components.iter().all(|id| glyphs.contains(id)) {
                            glyphs.insert(*glyph);
                        }
                    }
                }
            }
            if glyphs.len() == len_before_pass {
                break;
            }
        }
        glyphs.len() > initial_len
    }
}

fn read_format(cursor: &mut Cursor<'_>, supported: &[u16]) -> Result<u16, ParseError> {
    cursor.read_u16_checked(|format| {
        if supported.contains(&format) {
            Ok(format)
        } else {
            Err(ParseErrorKind::UnexpectedTableFormat { format })
        }
    })
}

fn read_glyph_array(cursor: &mut Cursor<'_>, len: u16) -> Result<Vec<u16>, ParseError> {
    (0..len).map(|_| cursor.read_u16()).collect()
}

/// Reads a coverage table, returning glyphs ordered by their coverage index.
fn read_coverage(mut cursor: Cursor<'_>) -> Result<Vec<u16>, ParseError> {
    let format = read_format(&mut cursor, &[1, 2])?;
    let count = cursor.read_u16()?;
    if format == 1 {
        return read_glyph_array(&mut cursor, count);
    }

    let mut indexed_glyphs = vec![];
    for _ in 0..count {
        let start = cursor.read_u16()?;
        let end = cursor.read_u16()?;
        let start_index = cursor.read_u16()?;
        if start > end {
            continue;
        }
        let indexed = (start..=end).map(|glyph| (start_index.wrapping_add(glyph - start), glyph));
        indexed_glyphs.extend(indexed);
    }
    indexed_glyphs.sort_unstable();
    Ok(indexed_glyphs.into_iter().map(|(_, glyph)| glyph).collect())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::TableTag;

    fn words(values: &[u16]) -> Vec<u8> {
        values.iter().flat_map(|value| value.to_be_bytes()).collect()
    }

    /// Wraps lookups (each given as `(lookup_type, subtable)`) into a `GSUB` table.
    fn gsub_table(lookups: &[(u16, Vec<u8>)]) -> Vec<u8> {
        // Header, then empty script and feature lists.
        let mut table = words(&[1, 0, 10, 12, 14, 0, 0]);
        let lookup_list_start = table.len();
        let lookup_count = u16::try_from(lookups.len()).unwrap();
        table.extend(words(&[lookup_count]));
        let offsets_start = table.len();
        table.extend(words(&vec![0; lookups.len()]));

        for (i, (lookup_type, subtable)) in lookups.iter().enumerate() {
            let lookup_offset = u16::try_from(table.len() - lookup_list_start).unwrap();
            let pos = offsets_start + 2 * i;
            table[pos..pos + 2].copy_from_slice(&lookup_offset.to_be_bytes());
            // Single subtable following the 8-byte lookup header.
            table.extend(words(&[*lookup_type, 0, 1, 8]));
            table.extend_from_slice(subtable);
        }
        table
    }

    #[test]
    fn reading_range_coverage() {
        let bytes = words(&[2, 2, 10, 11, 2, 20, 20, 0]);
        let coverage = read_coverage(Cursor::new(&bytes)).unwrap();
        assert_eq!(coverage, [20, 10, 11]);
    }

    #[test]
    fn closure_over_single_substitutions() {
        // Format 2: 3 -> 7, 4 -> 8; coverage (format 1) follows the substitutes at offset 10.
        let single = words(&[2, 10, 2, 7, 8, 1, 2, 3, 4]);
        // Format 1 with delta: 7 -> 9
        let delta = words(&[1, 6, 2, 1, 1, 7]);
        let table = gsub_table(&[(1, single), (1, delta)]);
        let closure = SubstitutionClosure::parse(Cursor::for_table(TableTag::GSUB, &table)).unwrap();
        assert_eq!(closure.rules.len(), 3);

        let mut glyphs = BTreeSet::from([0, 3]);
        assert!(closure.close_over(&mut glyphs));
        assert_eq!(glyphs, BTreeSet::from([0, 3, 7, 9]));
        assert!(!closure.close_over(&mut glyphs));
    }

    #[test]
    fn closure_over_ligatures_in_extension() {
        // Ligature subtable: coverage at 8, one ligature set at 14 with one ligature (1 + 2 -> 5).
        let ligatures = words(&[1, 8, 1, 14, 1, 1, 1, 1, 4, 5, 2, 2]);
        // Extension subtable pointing to the ligature subtable right after its 8-byte header.
        let mut extension = words(&[1, 4]);
        extension.extend_from_slice(&8_u32.to_be_bytes());
        extension.extend(ligatures);
        let table = gsub_table(&[(7, extension)]);

        let closure = SubstitutionClosure::parse(Cursor::for_table(TableTag::GSUB, &table)).unwrap();
        assert_eq!(
            closure.rules,
            [Substitution::Ligature {
                components: vec![1, 2],
                glyph: 5,
            }]
        );

        let mut glyphs = BTreeSet::from([1]);
        assert!(!closure.close_over(&mut glyphs));
        glyphs.insert(2);
        assert!(closure.close_over(&mut glyphs));
        assert!(glyphs.contains(&5));
    }

    #[test]
    fn closure_over_alternates() {
        // Alternate subtable: coverage at 8, one alternate set at 14 with glyphs 6, 7.
        let alternates = words(&[1, 8, 1, 14, 1, 1, 2, 2, 6, 7]);
        let table = gsub_table(&[(3, alternates)]);
        let closure = SubstitutionClosure::parse(Cursor::for_table(TableTag::GSUB, &table)).unwrap();
        let mut glyphs = BTreeSet::from([2]);
        closure.close_over(&mut glyphs);
        assert_eq!(glyphs, BTreeSet::from([2, 6, 7]));
    }

    #[test]
    fn unsupported_subtable_format() {
        let single = words(&[3, 6, 0]);
        let table = gsub_table(&[(1, single)]);
        let err = SubstitutionClosure::parse(Cursor::for_table(TableTag::GSUB, &table)).unwrap_err();
        assert!(matches!(
            err.kind(),
            ParseErrorKind::UnexpectedTableFormat { format: 3 }
        ));
        assert_eq!(err.table(), Some(TableTag::GSUB));
    }
}
