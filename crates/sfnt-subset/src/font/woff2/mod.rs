//! Unpacking WOFF2 containers into sfnt data.

use std::borrow::Cow;

use super::{Cursor, HheaTable, TableTag};
use crate::{errors::ParseErrorKind, write::FontWriter, ParseError};

mod transform;

/// Tags encoded by their index in the flags byte of a WOFF2 table directory entry.
pub(crate) const KNOWN_TAGS: [TableTag; 63] = [
    TableTag(*b"cmap"),
    TableTag(*b"head"),
    TableTag(*b"hhea"),
    TableTag(*b"hmtx"),
    TableTag(*b"maxp"),
    TableTag(*b"name"),
    TableTag(*b"OS/2"),
    TableTag(*b"post"),
    TableTag(*b"cvt "),
    TableTag(*b"fpgm"),
    TableTag(*b"glyf"),
    TableTag(*b"loca"),
    TableTag(*b"prep"),
    TableTag(*b"CFF "),
    TableTag(*b"VORG"),
    TableTag(*b"EBDT"),
    TableTag(*b"EBLC"),
    TableTag(*b"gasp"),
    TableTag(*b"hdmx"),
    TableTag(*b"kern"),
    TableTag(*b"LTSH"),
    TableTag(*b"PCLT"),
    TableTag(*b"VDMX"),
    TableTag(*b"vhea"),
    TableTag(*b"vmtx"),
    TableTag(*b"BASE"),
    TableTag(*b"GDEF"),
    TableTag(*b"GPOS"),
    TableTag(*b"GSUB"),
    TableTag(*b"EBSC"),
    TableTag(*b"JSTF"),
    TableTag(*b"MATH"),
    TableTag(*b"CBDT"),
    TableTag(*b"CBLC"),
    TableTag(*b"COLR"),
    TableTag(*b"CPAL"),
    TableTag(*b"SVG "),
    TableTag(*b"sbix"),
    TableTag(*b"acnt"),
    TableTag(*b"avar"),
    TableTag(*b"bdat"),
    TableTag(*b"bloc"),
    TableTag(*b"bsln"),
    TableTag(*b"cvar"),
    TableTag(*b"fdsc"),
    TableTag(*b"feat"),
    TableTag(*b"fmtx"),
    TableTag(*b"fvar"),
    TableTag(*b"gvar"),
    TableTag(*b"hsty"),
    TableTag(*b"just"),
    TableTag(*b"lcar"),
    TableTag(*b"mort"),
    TableTag(*b"morx"),
    TableTag(*b"opbd"),
    TableTag(*b"prop"),
    TableTag(*b"trak"),
    TableTag(*b"Zapf"),
    TableTag(*b"Silf"),
    TableTag(*b"Glat"),
    TableTag(*b"Gloc"),
    TableTag(*b"Feat"),
    TableTag(*b"Sill"),
];

/// Index in the flags byte signalling that the tag is stored explicitly.
pub(crate) const ARBITRARY_TAG_INDEX: u8 = 63;
pub(crate) const SIGNATURE: [u8; 4] = *b"wOF2";
const HEADER_LEN: usize = 48;

/// Transform version that means "no transform" for `glyf` and `loca` tables.
pub(crate) const GLYF_NULL_TRANSFORM: u8 = 3;

fn read_uint_base128(cursor: &mut Cursor<'_>) -> Result<u32, ParseError> {
    let mut value = 0_u32;
    for i in 0..5 {
        let start = *cursor;
        let [byte] = cursor.read_byte_array::<1>()?;
        if i == 0 && byte == 0x80 {
            return Err(start.err(ParseErrorKind::UnexpectedTableFormat { format: 0x80 }));
        }
        if value & 0xfe00_0000 != 0 {
            return Err(start.err(ParseErrorKind::UnexpectedEof));
        }
        value = (value << 7) | u32::from(byte & 0x7f);
        if byte & 0x80 == 0 {
            return Ok(value);
        }
    }
    Err(cursor.err(ParseErrorKind::UnexpectedEof))
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Transform {
    None,
    Glyf,
    Loca,
    Hmtx,
}

#[derive(Debug)]
struct TableEntry {
    tag: TableTag,
    transform: Transform,
    /// Length of the table data in the decompressed stream.
    len: usize,
}

fn read_table_entry(cursor: &mut Cursor<'_>) -> Result<TableEntry, ParseError> {
    let start = *cursor;
    let [flags] = cursor.read_byte_array::<1>()?;
    let tag_index = flags & 0x3f;
    let tag = if tag_index == ARBITRARY_TAG_INDEX {
        TableTag(cursor.read_byte_array()?)
    } else {
        KNOWN_TAGS[usize::from(tag_index)]
    };
    let transform = match (tag, flags >> 6) {
        (TableTag::GLYF | TableTag::LOCA, GLYF_NULL_TRANSFORM) => Transform::None,
        (TableTag::GLYF, 0) => Transform::Glyf,
        (TableTag::LOCA, 0) => Transform::Loca,
        (TableTag::HMTX, 1) => Transform::Hmtx,
        (_, 0) => Transform::None,
        _ => {
            let err = start.err(ParseErrorKind::UnsupportedWoff2Transform);
            return Err(err.with_table(tag));
        }
    };

    let orig_len = read_uint_base128(cursor)? as usize;
    let len = if transform == Transform::None {
        orig_len
    } else {
        read_uint_base128(cursor)? as usize
    };
    Ok(TableEntry {
        tag,
        transform,
        len,
    })
}

/// Converts font data to the sfnt format.
///
/// sfnt data is returned as-is. WOFF2 containers are unpacked; transformed `glyf` / `loca`
/// and `hmtx` tables are restored.
///
/// # Errors
///
/// Returns an error if the WOFF2 data is malformed, uses unsupported transforms,
/// or is a font collection.
pub fn to_sfnt(bytes: &[u8]) -> Result<Cow<'_, [u8]>, ParseError> {
    if !bytes.starts_with(&SIGNATURE) {
        return Ok(Cow::Borrowed(bytes));
    }

    let mut cursor = Cursor::new(bytes);
    cursor.skip(4)?; // signature
    cursor.read_u32_checked(|flavor| match &flavor.to_be_bytes() {
        b"ttcf" => Err(ParseErrorKind::FontCollection),
        b"OTTO" => Err(ParseErrorKind::CffOutlines),
        _ => Ok(()),
    })?;
    cursor.skip(4)?; // length
    let table_count = cursor.read_u16()?;
    cursor.skip(6)?; // reserved, totalSfntSize
    let compressed_len = cursor.read_u32()? as usize;
    cursor.skip(HEADER_LEN - 24)?; // version, metadata and private block locations

    let directory = cursor;
    let entries = (0..table_count)
        .map(|_| read_table_entry(&mut cursor))
        .collect::<Result<Vec<_>, _>>()?;
    let compressed = cursor.split_at(compressed_len)?;

    let mut data = vec![];
    let mut compressed_bytes = compressed.bytes;
    brotli::BrotliDecompress(&mut compressed_bytes, &mut data).map_err(|err| {
        log::debug!("failed decompressing WOFF2 table data: {err}");
        compressed.err(ParseErrorKind::Decompression)
    })?;
    log::debug!(
        "decompressed {compressed_len} bytes of WOFF2 table data into {} bytes",
        data.len()
    );

    let mut data_cursor = Cursor::new(&data);
    let mut tables = Vec::with_capacity(entries.len());
    for entry in &entries {
        let table = data_cursor
            .split_at(entry.len)
            .map_err(|err| err.with_table(entry.tag))?;
        tables.push((entry, Cursor::for_table(entry.tag, table.bytes)));
    }
    let find_table = |transform: Transform| {
        tables
            .iter()
            .find_map(|&(entry, table)| (entry.transform == transform).then_some(table))
    };
    let unsupported_transform = |tag: TableTag| {
        let err = directory.err(ParseErrorKind::UnsupportedWoff2Transform);
        err.with_table(tag)
    };

    let glyf = match (find_table(Transform::Glyf), find_table(Transform::Loca)) {
        (Some(glyf), Some(_)) => Some(transform::restore_glyf(glyf)?),
        (None, None) => None,
        (Some(_), None) => return Err(unsupported_transform(TableTag::GLYF)),
        (None, Some(_)) => return Err(unsupported_transform(TableTag::LOCA)),
    };
    let hmtx = if let Some(hmtx) = find_table(Transform::Hmtx) {
        let Some(glyf) = &glyf else {
            return Err(unsupported_transform(TableTag::HMTX));
        };
        let hhea = tables
            .iter()
            .find_map(|&(entry, table)| (entry.tag == TableTag::HHEA).then_some(table))
            .ok_or_else(|| {
                let err = directory.err(ParseErrorKind::MissingTable);
                err.with_table(TableTag::HHEA)
            })?;
        let hhea = HheaTable::parse(hhea)?;
        Some(transform::restore_hmtx(hmtx, hhea.number_of_h_metrics, &glyf.x_mins)?)
    } else {
        None
    };

    let mut writer = FontWriter::default();
    for (entry, table) in &tables {
        let content: &[u8] = match (entry.transform, &glyf, &hmtx) {
            (Transform::Glyf, Some(glyf), _) => &glyf.glyf,
            (Transform::Loca, Some(glyf), _) => &glyf.loca,
            (Transform::Hmtx, _, Some(hmtx)) => hmtx,
            _ => table.bytes,
        };
        writer.write_raw_table(entry.tag, content);
    }
    Ok(Cow::Owned(writer.into_opentype()))
}
