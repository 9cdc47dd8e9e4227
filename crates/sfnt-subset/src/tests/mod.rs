use std::{collections::BTreeSet, env, io::Write, iter, process::Command, sync::OnceLock};

use allsorts::{binary::read::ReadScope, font::MatchingPresentation, font_data::FontData};
use test_casing::{test_casing, Product};

use crate::{
    font::Glyph,
    testing::{OutlinePoint, TestFontBuilder},
    to_sfnt, Flavor, Font, LayoutFeatures, ParseErrorKind, SubsetOptions, TableTag,
};

const LAYOUT_FEATURES: [LayoutFeatures; 2] = [LayoutFeatures::None, LayoutFeatures::All];
const FLAVORS: [Flavor; 2] = [Flavor::None, Flavor::Woff2];
const SUBSET_CHARS: [&str; 4] = ["", "佛", "佛光注照長生祿位", "往生蓮位陽上敬薦"];

fn test_font() -> TestFontBuilder {
    TestFontBuilder::new()
        .with_chars("佛光注照長生位往蓮陽上敬薦")
        .with_composite('祿', "示彔")
        .with_substitute('位')
}

/// Outline with point deltas of all sizes, both positive and negative.
const OUTLINE: [&[OutlinePoint]; 2] = [
    &[
        (0, 0, true),
        (-40, 300, false),
        (2_000, 700, true),
        (2_030, 700, true),
        (2_040, 710, false),
    ],
    &[
        (10, 10, true),
        (4_500, -5_000, false),
        (300, 1_200, true),
        (300, 1_300, true),
    ],
];

fn outline_font() -> TestFontBuilder {
    test_font().with_outline('永', &OUTLINE, &[0xb0, 0x01])
}

#[derive(Debug)]
struct OpenTypeSanitizer {
    path: Option<String>,
}

impl Default for OpenTypeSanitizer {
    fn default() -> Self {
        let Ok(path) = env::var("OTS_SANITIZER") else {
            return Self { path: None };
        };
        let output = Command::new(&path)
            .arg("--version")
            .output()
            .unwrap_or_else(|err| {
                panic!("failed getting version for ots-sanitize at {path}: {err}");
            });
        assert!(
            output.status.success(),
            "failed getting version for ots-sanitize at {path}: non-zero exit code"
        );
        println!("ots-sanitize version: {}", String::from_utf8_lossy(&output.stdout));
        Self { path: Some(path) }
    }
}

impl OpenTypeSanitizer {
    fn get() -> &'static Self {
        static SANITIZER: OnceLock<OpenTypeSanitizer> = OnceLock::new();
        SANITIZER.get_or_init(Self::default)
    }

    fn validate(&self, content: &[u8]) {
        let Some(path) = &self.path else {
            println!("OTS_SANITIZER env var is missing; skipping checks");
            return;
        };

        let mut file = tempfile::NamedTempFile::new().unwrap();
        file.as_file_mut().write_all(content).unwrap();
        file.as_file_mut().flush().unwrap();
        let file_path = file.into_temp_path();

        let output = Command::new(path)
            .arg(&file_path)
            .output()
            .expect("failed running ots-sanitize");
        if !output.status.success() {
            let stdout = String::from_utf8_lossy(&output.stdout);
            let stderr = String::from_utf8_lossy(&output.stderr);
            panic!("ots-sanitize failed:\n--- stdout ---\n{stdout}\n--- stderr ---\n{stderr}");
        }
    }
}

fn assert_valid_font(raw: &[u8], expected_chars: &BTreeSet<char>) {
    let sfnt = to_sfnt(raw).unwrap();
    let font = Font::new(&sfnt).unwrap();
    assert_eq!(font.chars().unwrap(), *expected_chars);

    let font_file = ReadScope::new(raw).read::<FontData>().unwrap();
    let font_provider = font_file.table_provider(0).unwrap();
    let mut reference_font = allsorts::Font::new(font_provider).unwrap();
    for &ch in expected_chars {
        let (glyph_id, _) =
            reference_font.lookup_glyph_index(ch, MatchingPresentation::NotRequired, None);
        assert_eq!(glyph_id, font.map_char(ch).unwrap(), "{ch:?}");
        assert_ne!(glyph_id, 0);
    }

    OpenTypeSanitizer::get().validate(raw);
}

#[test]
fn reading_font() {
    let bytes = test_font().build();
    let font = Font::new(&bytes).unwrap();
    assert_eq!(font.glyph_count(), 18);
    let tags: Vec<_> = font.table_tags().collect();
    assert!(tags.contains(&TableTag::GSUB), "{tags:?}");

    let font_file = ReadScope::new(&bytes).read::<FontData>().unwrap();
    let font_provider = font_file.table_provider(0).unwrap();
    let mut reference_font = allsorts::Font::new(font_provider).unwrap();
    for ch in "佛光祿位示彔無".chars() {
        let glyph_id = font.map_char(ch).unwrap();
        let (expected_idx, _) =
            reference_font.lookup_glyph_index(ch, MatchingPresentation::NotRequired, None);
        assert_eq!(glyph_id, expected_idx, "{ch:?}");
    }
    assert_eq!(font.map_char('無').unwrap(), 0);
}

#[test_casing(16, Product((LAYOUT_FEATURES, FLAVORS, SUBSET_CHARS)))]
fn subsetting_font(layout_features: LayoutFeatures, flavor: Flavor, chars: &str) {
    let bytes = test_font().build();
    let font = Font::new(&bytes).unwrap();
    let chars: BTreeSet<char> = chars.chars().collect();
    let options = SubsetOptions::default()
        .with_layout_features(layout_features)
        .with_flavor(flavor);
    let subset = font.subset(&chars, options).unwrap();
    assert!(subset.missing_chars().is_empty());
    assert_eq!(subset.chars().collect::<BTreeSet<_>>(), chars);

    let output = subset.to_bytes();
    assert_eq!(output.starts_with(b"wOF2"), flavor == Flavor::Woff2);
    assert_valid_font(&output, &chars);
}

#[test]
fn retained_subset_keeps_glyph_ids() {
    let bytes = test_font().build();
    let font = Font::new(&bytes).unwrap();
    let original_idx = font.map_char('照').unwrap();
    let glyph_count = font.glyph_count();

    let chars = BTreeSet::from(['照']);
    let subset = font.subset(&chars, SubsetOptions::default()).unwrap();
    assert_eq!(subset.glyph_count(), 2); // missing glyph + '照'
    let output = subset.to_truetype();

    let subset_font = Font::new(&output).unwrap();
    assert_eq!(subset_font.glyph_count(), glyph_count);
    assert_eq!(subset_font.map_char('照').unwrap(), original_idx);
    assert!(subset_font.table(TableTag::GSUB).is_some());
    for glyph_idx in 0..glyph_count {
        let data = subset_font.glyph_data(glyph_idx).unwrap();
        let is_kept = glyph_idx == 0 || glyph_idx == original_idx;
        assert_eq!(!data.bytes.is_empty(), is_kept, "glyph #{glyph_idx}");
    }
}

#[test]
fn compact_subset_renumbers_glyphs() {
    let bytes = test_font().build();
    let font = Font::new(&bytes).unwrap();
    let chars = BTreeSet::from(['照', '薦']);
    let options = SubsetOptions::default().with_layout_features(LayoutFeatures::None);
    let output = font.subset(&chars, options).unwrap().to_truetype();

    let subset_font = Font::new(&output).unwrap();
    assert_eq!(subset_font.glyph_count(), 3);
    assert_eq!(subset_font.map_char('照').unwrap(), 1);
    assert_eq!(subset_font.map_char('薦').unwrap(), 2);
    assert_eq!(subset_font.table(TableTag::GSUB), None);
    assert_eq!(subset_font.table(TableTag::NAME).map(<[u8]>::len), Some(6));
}

#[test_casing(2, LAYOUT_FEATURES)]
fn composite_glyph_components_are_included(layout_features: LayoutFeatures) {
    let bytes = test_font().build();
    let font = Font::new(&bytes).unwrap();
    let chars = BTreeSet::from(['祿']);
    let options = SubsetOptions::default().with_layout_features(layout_features);
    let subset = font.subset(&chars, options).unwrap();
    assert_eq!(subset.glyph_count(), 4);
    let output = subset.to_truetype();

    let subset_font = Font::new(&output).unwrap();
    // Component chars are not mapped, but their glyphs are retained.
    assert_eq!(subset_font.chars().unwrap(), chars);
    let composite_idx = subset_font.map_char('祿').unwrap();
    let glyph = subset_font.glyph(composite_idx).unwrap();
    let component_ids: Vec<_> = glyph.inner.component_ids().collect();
    assert_eq!(component_ids.len(), 2);
    for component_idx in component_ids {
        let component = subset_font.glyph(component_idx).unwrap();
        assert!(matches!(component.inner, Glyph::Simple(_)), "{component:?}");
    }
}

#[test]
fn substituted_glyphs_are_retained() {
    let bytes = test_font().build();
    let font = Font::new(&bytes).unwrap();
    let substitute_idx = font.glyph_count() - 1;
    let chars = BTreeSet::from(['位']);

    let options = SubsetOptions::default().with_layout_features(LayoutFeatures::All);
    let subset = font.subset(&chars, options).unwrap();
    // Missing glyph, '位' and its substitute
    assert_eq!(subset.glyph_count(), 3);
    let output = subset.to_truetype();
    let subset_font = Font::new(&output).unwrap();
    assert!(!subset_font.glyph_data(substitute_idx).unwrap().bytes.is_empty());

    let font = Font::new(&bytes).unwrap();
    let options = SubsetOptions::default().with_layout_features(LayoutFeatures::None);
    let subset = font.subset(&chars, options).unwrap();
    assert_eq!(subset.glyph_count(), 2);
}

#[test]
fn missing_chars_are_reported() {
    let bytes = test_font().build();
    let font = Font::new(&bytes).unwrap();
    let chars = BTreeSet::from(['佛', '無', '嬰']);
    let subset = font.subset(&chars, SubsetOptions::default()).unwrap();
    assert_eq!(subset.missing_chars(), ['嬰', '無']);
    assert_eq!(subset.chars().collect::<Vec<_>>(), ['佛']);
    assert_valid_font(&subset.to_truetype(), &BTreeSet::from(['佛']));
}

#[test]
fn chars_outside_bmp_are_supported() {
    let builder = TestFontBuilder::new().with_chars("A𠀀𠮷");
    let expected_chars: BTreeSet<_> = "A𠀀𠮷".chars().collect();
    for layout_features in LAYOUT_FEATURES {
        let output = builder.build_subset(layout_features, Flavor::None);
        assert_valid_font(&output, &expected_chars);
    }
}

#[test]
fn unpacking_woff2_font() {
    let builder = test_font();
    let woff2 = builder.build_woff2();
    let err = Font::new(&woff2).unwrap_err();
    assert!(matches!(err.kind(), ParseErrorKind::Woff2Container));

    let sfnt = to_sfnt(&woff2).unwrap();
    let font = Font::new(&sfnt).unwrap();
    let original = builder.build();
    let original = Font::new(&original).unwrap();
    assert_eq!(font.chars().unwrap(), original.chars().unwrap());
    assert_eq!(font.glyph_count(), original.glyph_count());
    for tag in original.table_tags() {
        let expected = original.table(tag).unwrap();
        let actual = font.table(tag).unwrap();
        if tag == TableTag::HEAD {
            assert_eq!(actual.len(), expected.len());
        } else {
            assert_eq!(actual, expected, "{tag}");
        }
    }
    assert_eq!(Font::checksum(&sfnt), Font::SFNT_CHECKSUM);
}

#[test]
fn subsetting_unpacked_woff2_font() {
    let woff2 = test_font().build_woff2();
    let sfnt = to_sfnt(&woff2).unwrap();
    let font = Font::new(&sfnt).unwrap();
    let chars: BTreeSet<_> = "往生蓮位".chars().collect();
    let options = SubsetOptions::default().with_flavor(Flavor::Woff2);
    let subset = font.subset(&chars, options).unwrap();
    assert_valid_font(&subset.to_bytes(), &chars);
}

/// Simple glyph with absolute point coordinates.
#[derive(Debug, PartialEq)]
struct DecodedOutline {
    bbox: [i16; 4],
    end_points: Vec<u16>,
    instructions: Vec<u8>,
    points: Vec<(i32, i32, bool)>,
}

fn read_coordinates(
    data: &[u8],
    pos: &mut usize,
    flags: &[u8],
    [short_flag, same_flag]: [u8; 2],
) -> Vec<i32> {
    let mut value = 0;
    flags
        .iter()
        .map(|&flag| {
            if flag & short_flag != 0 {
                let delta = i32::from(data[*pos]);
                *pos += 1;
                value += if flag & same_flag != 0 { delta } else { -delta };
            } else if flag & same_flag == 0 {
                value += i32::from(i16::from_be_bytes([data[*pos], data[*pos + 1]]));
                *pos += 2;
            }
            value
        })
        .collect()
}

fn decode_simple_glyph(data: &[u8]) -> DecodedOutline {
    let read_u16 = |pos: usize| u16::from_be_bytes([data[pos], data[pos + 1]]);
    let contour_count = usize::from(read_u16(0));
    let bbox = [2, 4, 6, 8].map(|pos| i16::from_be_bytes([data[pos], data[pos + 1]]));
    let end_points: Vec<_> = (0..contour_count).map(|i| read_u16(10 + 2 * i)).collect();
    let mut pos = 10 + 2 * contour_count;
    let instructions_len = usize::from(read_u16(pos));
    pos += 2;
    let instructions = data[pos..pos + instructions_len].to_vec();
    pos += instructions_len;

    let point_count = end_points.last().map_or(0, |&end| usize::from(end) + 1);
    let mut flags = Vec::with_capacity(point_count);
    while flags.len() < point_count {
        let flag = data[pos];
        pos += 1;
        let mut count = 1;
        if flag & 0x08 != 0 {
            count += usize::from(data[pos]);
            pos += 1;
        }
        flags.extend(iter::repeat_n(flag, count));
    }
    let xs = read_coordinates(data, &mut pos, &flags, [0x02, 0x10]);
    let ys = read_coordinates(data, &mut pos, &flags, [0x04, 0x20]);
    let points = flags
        .iter()
        .zip(xs)
        .zip(ys)
        .map(|((&flag, x), y)| (x, y, flag & 1 != 0))
        .collect();
    DecodedOutline {
        bbox,
        end_points,
        instructions,
        points,
    }
}

#[test]
fn decoding_test_outline() {
    let bytes = TestFontBuilder::new()
        .with_outline('永', &OUTLINE, &[0xb0, 0x01])
        .build();
    let font = Font::new(&bytes).unwrap();
    let glyph = font.glyph(font.map_char('永').unwrap()).unwrap();
    assert_eq!(glyph.lsb, 0xffd8); // -40
    let Glyph::Simple(data) = &glyph.inner else {
        panic!("unexpected glyph: {glyph:?}");
    };
    let outline = decode_simple_glyph(data);
    assert_eq!(outline.bbox, [-40, -5_000, 4_500, 1_300]);
    assert_eq!(outline.end_points, [4, 8]);
    assert_eq!(outline.instructions, [0xb0, 0x01]);
    assert_eq!(outline.points.len(), 9);
    assert_eq!(outline.points[1], (-40, 300, false));
    assert_eq!(outline.points[5], (10, 10, true));
}

#[test]
fn unpacking_transformed_woff2_font() {
    let builder = outline_font();
    let woff2 = builder.build_woff2_transformed();
    assert!(woff2.starts_with(b"wOF2"));
    let sfnt = to_sfnt(&woff2).unwrap();
    let font = Font::new(&sfnt).unwrap();

    let original = builder.build();
    let original = Font::new(&original).unwrap();
    assert_eq!(font.glyph_count(), original.glyph_count());
    let chars = original.chars().unwrap();
    assert_eq!(font.chars().unwrap(), chars);
    for tag in original.table_tags() {
        // `glyf` and `loca` may be encoded differently, and `head` has another checksum.
        if ![TableTag::GLYF, TableTag::LOCA, TableTag::HEAD].contains(&tag) {
            assert_eq!(font.table(tag), original.table(tag), "{tag}");
        }
    }

    for glyph_idx in 0..original.glyph_count() {
        let expected = original.glyph(glyph_idx).unwrap();
        let actual = font.glyph(glyph_idx).unwrap();
        assert_eq!(actual.advance, expected.advance);
        assert_eq!(actual.lsb, expected.lsb);
        match (&actual.inner, &expected.inner) {
            (Glyph::Simple(actual), Glyph::Simple(expected)) => {
                let expected = decode_simple_glyph(expected);
                assert_eq!(decode_simple_glyph(actual), expected, "glyph #{glyph_idx}");
            }
            (
                Glyph::Composite { header, .. },
                Glyph::Composite {
                    header: expected_header,
                    ..
                },
            ) => {
                assert_eq!(header, expected_header);
                let component_ids: Vec<_> = actual.inner.component_ids().collect();
                let expected_ids: Vec<_> = expected.inner.component_ids().collect();
                assert_eq!(component_ids, expected_ids);
            }
            _ => panic!("glyph #{glyph_idx} differs: {actual:?}, expected {expected:?}"),
        }
    }

    assert_eq!(Font::checksum(&sfnt), Font::SFNT_CHECKSUM);
    assert_valid_font(&sfnt, &chars);
}

#[test_casing(4, Product((LAYOUT_FEATURES, FLAVORS)))]
fn subsetting_transformed_woff2_font(layout_features: LayoutFeatures, flavor: Flavor) {
    let woff2 = outline_font().build_woff2_transformed();
    let sfnt = to_sfnt(&woff2).unwrap();
    let font = Font::new(&sfnt).unwrap();
    let chars: BTreeSet<_> = "佛永祿".chars().collect();
    let options = SubsetOptions::default()
        .with_layout_features(layout_features)
        .with_flavor(flavor);
    let subset = font.subset(&chars, options).unwrap();
    assert!(subset.missing_chars().is_empty());
    assert_valid_font(&subset.to_bytes(), &chars);
}
