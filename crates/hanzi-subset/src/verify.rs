//! Verification of generated font subsets against predefined test phrases.

use std::{
    borrow::Cow,
    collections::BTreeSet,
    fmt, fs,
    path::{Path, PathBuf},
};

use sfnt_subset::{to_sfnt, Font, ParseError};

use crate::{charset::CharSet, errors::VerifyError};

/// Named phrase whose chars must all be supported by a font.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TestCase {
    /// Human-readable category label.
    pub label: Cow<'static, str>,
    /// Chars to check. Each occurrence is checked separately.
    pub chars: Cow<'static, str>,
}

impl TestCase {
    /// Creates a test case from static strings.
    pub const fn new(label: &'static str, chars: &'static str) -> Self {
        Self {
            label: Cow::Borrowed(label),
            chars: Cow::Borrowed(chars),
        }
    }

    /// Creates a test case checking every char in `charset`.
    pub fn from_charset(charset: &CharSet) -> Self {
        Self {
            label: Cow::Borrowed("精选字符集"),
            chars: Cow::Owned(charset.to_text()),
        }
    }
}

/// Traditional-script test phrases; the fonts the subsets are generated from are traditional ones.
pub const TEST_CASES: &[TestCase] = &[
    TestCase::new(
        "核心业务字（繁体）",
        "佛光注照長生祿位往生蓮位陽上敬薦叩薦氏歷代祖先累劫冤親債主之地基主嬰靈菩薩父母孝孫兒女媳",
    ),
    TestCase::new(
        "常见姓氏（繁体）",
        "王李張劉陳楊黃趙週吳徐孫朱馬胡郭林何高羅鄭梁謝宋唐許韓馮鄧曹彭曾蕭田董袁潘於蔣蔡餘杜葉程蘇魏呂丁任",
    ),
    TestCase::new("复姓（繁体）", "歐陽上官皇甫令狐諸葛"),
    TestCase::new("关键测试字（繁体）", "唯弘華正法師闔"),
    TestCase::new("男性名字（繁体）", "偉強勇明志傑峰濤浩宇軒昊博文輝"),
    TestCase::new("女性名字（繁体）", "秀娟英華慧美靜芳燕娜麗雲琳玉萍紅"),
    TestCase::new("少数民族（繁体）", "買提熱迪麗巴黎"),
];

/// Verification outcome for a single [`TestCase`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CategoryReport {
    /// Label of the test case.
    pub label: Cow<'static, str>,
    /// Number of checked chars (with repetitions).
    pub tested: usize,
    /// Unsupported chars in the order of their occurrence in the phrase.
    pub missing: Vec<char>,
}

impl CategoryReport {
    /// Checks whether all chars of the test case are supported.
    pub fn is_success(&self) -> bool {
        self.missing.is_empty()
    }
}

/// Information about a verified font file.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FontInfo {
    /// Path to the file.
    pub path: PathBuf,
    /// File size in bytes.
    pub len: usize,
}

/// Result of verifying a font.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct VerificationReport {
    /// Verified font file, if the report was produced by a [`Verifier`].
    pub font: Option<FontInfo>,
    /// Number of chars supported by the font.
    pub available_chars: usize,
    categories: Vec<CategoryReport>,
}

impl VerificationReport {
    /// Checks whether no tested chars are missing.
    pub fn is_success(&self) -> bool {
        self.categories.iter().all(CategoryReport::is_success)
    }

    /// Returns the total number of tested chars.
    pub fn total_tested(&self) -> usize {
        self.categories.iter().map(|category| category.tested).sum()
    }

    /// Returns the total number of missing chars.
    pub fn total_missing(&self) -> usize {
        self.categories
            .iter()
            .map(|category| category.missing.len())
            .sum()
    }

    /// Returns per-category reports in the order of test cases.
    pub fn categories(&self) -> &[CategoryReport] {
        &self.categories
    }
}

#[allow(clippy::cast_precision_loss)] // font sizes are far below 2^52 bytes
fn kilobytes(len: usize) -> f64 {
    len as f64 / 1_024.0
}

impl fmt::Display for VerificationReport {
    fn fmt(&self, formatter: &mut fmt::Formatter<'_>) -> fmt::Result {
        if let Some(font) = &self.font {
            writeln!(formatter, "📊 字体文件信息:")?;
            writeln!(formatter, "   路径: {}", font.path.display())?;
            writeln!(formatter, "   大小: {:.2} KB", kilobytes(font.len))?;
            writeln!(formatter, "   字符数: {}", self.available_chars)?;
            writeln!(formatter)?;
        }

        for category in &self.categories {
            if category.is_success() {
                let label = &category.label;
                writeln!(formatter, "✅ {label}: 全部包含 ({} 个字符)", category.tested)?;
            } else {
                let label = &category.label;
                let missing_count = category.missing.len();
                writeln!(formatter, "❌ {label}: 缺失 {missing_count} 个字符")?;
                let missing: String = category.missing.iter().collect();
                writeln!(formatter, "   缺失字符: {missing}")?;
            }
        }

        writeln!(formatter)?;
        writeln!(formatter, "{}", "=".repeat(50))?;
        let total_tested = self.total_tested();
        if self.is_success() {
            write!(
                formatter,
                "🎉 验证通过！所有 {total_tested} 个测试字符都已包含在字体中"
            )
        } else {
            writeln!(
                formatter,
                "⚠️  验证失败：{}/{total_tested} 个字符缺失",
                self.total_missing()
            )?;
            write!(
                formatter,
                "   请更新字符集并使用 generate-font-subset 重新生成字体"
            )
        }
    }
}

/// Checks which chars of `cases` are contained in `available_chars`.
pub fn verify_chars(available_chars: &BTreeSet<char>, cases: &[TestCase]) -> VerificationReport {
    let categories = cases
        .iter()
        .map(|case| {
            let mut tested = 0;
            let mut missing = vec![];
            for ch in case.chars.chars() {
                tested += 1;
                if !available_chars.contains(&ch) {
                    missing.push(ch);
                }
            }
            log::debug!(
                "checked {tested} chars for `{}`, {} missing",
                case.label,
                missing.len()
            );
            CategoryReport {
                label: case.label.clone(),
                tested,
                missing,
            }
        })
        .collect();

    VerificationReport {
        font: None,
        available_chars: available_chars.len(),
        categories,
    }
}

/// Verifier of a font file.
#[derive(Debug, Clone)]
pub struct Verifier {
    path: PathBuf,
    cases: Vec<TestCase>,
}

impl Verifier {
    /// Creates a verifier for the font at `path` using [`TEST_CASES`].
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self {
            path: path.into(),
            cases: TEST_CASES.to_vec(),
        }
    }

    /// Replaces test cases.
    #[must_use]
    pub fn with_cases(mut self, cases: impl IntoIterator<Item = TestCase>) -> Self {
        self.cases = cases.into_iter().collect();
        self
    }

    /// Adds a test case.
    #[must_use]
    pub fn with_case(mut self, case: TestCase) -> Self {
        self.cases.push(case);
        self
    }

    /// Returns the path to the verified font.
    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Loads the font and checks test cases against its best `cmap` subtable.
    ///
    /// # Errors
    ///
    /// Returns an error if the font file doesn't exist, cannot be read, or cannot be parsed.
    pub fn run(&self) -> Result<VerificationReport, VerifyError> {
        if !self.path.is_file() {
            return Err(VerifyError::FontNotFound {
                path: self.path.clone(),
            });
        }
        let bytes = fs::read(&self.path).map_err(|source| VerifyError::Io {
            path: self.path.clone(),
            source,
        })?;
        log::info!("loaded font `{}` ({} bytes)", self.path.display(), bytes.len());

        let available_chars = Self::read_chars(&bytes).map_err(|source| VerifyError::Font {
            path: self.path.clone(),
            source,
        })?;
        log::info!("font supports {} chars", available_chars.len());

        let mut report = verify_chars(&available_chars, &self.cases);
        report.font = Some(FontInfo {
            path: self.path.clone(),
            len: bytes.len(),
        });
        Ok(report)
    }

    fn read_chars(bytes: &[u8]) -> Result<BTreeSet<char>, ParseError> {
        let sfnt = to_sfnt(bytes)?;
        let font = Font::new(&sfnt)?;
        Ok(font.chars()?)
    }
}

#[cfg(test)]
mod tests {
    use sfnt_subset::{testing::TestFontBuilder, Flavor, LayoutFeatures};
    use test_casing::test_casing;

    use super::*;

    #[test]
    fn all_chars_are_found() {
        let available_chars = BTreeSet::from(['A', 'B', 'C']);
        let report = verify_chars(&available_chars, &[TestCase::new("test", "ABC")]);
        assert!(report.is_success());
        assert_eq!(report.total_tested(), 3);
        assert_eq!(report.total_missing(), 0);
        assert_eq!(report.categories()[0].missing, []);

        let rendered = report.to_string();
        assert!(rendered.contains("✅ test: 全部包含 (3 个字符)"), "{rendered}");
        assert!(rendered.ends_with("🎉 验证通过！所有 3 个测试字符都已包含在字体中"), "{rendered}");
    }

    #[test]
    fn missing_char_is_reported() {
        let available_chars = BTreeSet::from(['A', 'B', 'C']);
        let cases = [TestCase::new("ok", "CBA"), TestCase::new("test", "ABD")];
        let report = verify_chars(&available_chars, &cases);
        assert!(!report.is_success());
        assert_eq!(report.total_tested(), 6);
        assert_eq!(report.total_missing(), 1);
        assert!(report.categories()[0].is_success());
        assert_eq!(report.categories()[1].missing, ['D']);

        let rendered = report.to_string();
        assert!(rendered.contains("❌ test: 缺失 1 个字符\n   缺失字符: D"), "{rendered}");
        assert!(rendered.contains("验证失败：1/6 个字符缺失"), "{rendered}");
    }

    #[test]
    fn repeated_chars_are_counted_per_occurrence() {
        let report = verify_chars(&BTreeSet::from(['A']), &[TestCase::new("test", "ADAD")]);
        assert_eq!(report.total_tested(), 4);
        assert_eq!(report.categories()[0].missing, ['D', 'D']);
    }

    #[test]
    fn test_cases_are_covered_by_curated_charset() {
        let charset = CharSet::curated();
        let report = verify_chars(charset.as_set(), TEST_CASES);
        assert!(report.is_success(), "{report}");
        assert_eq!(report.total_tested(), 148);
    }

    #[test]
    fn charset_case_checks_every_char() {
        let charset = CharSet::from_text("佛光 注照");
        let case = TestCase::from_charset(&charset);
        let report = verify_chars(&BTreeSet::from(['佛', '光']), &[case]);
        assert_eq!(report.total_tested(), 4);
        assert_eq!(report.categories()[0].missing, ['注', '照']);
    }

    #[test]
    fn missing_font_is_error() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("missing.ttf");
        let err = Verifier::new(&path).run().unwrap_err();
        assert!(matches!(&err, VerifyError::FontNotFound { path: p } if *p == path), "{err:?}");
    }

    #[test]
    fn malformed_font_is_error() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("font.ttf");
        fs::write(&path, b"not a font").unwrap();
        let err = Verifier::new(&path).run().unwrap_err();
        assert!(matches!(err, VerifyError::Font { .. }), "{err:?}");
    }

    #[test_casing(2, [Flavor::None, Flavor::Woff2])]
    fn verifying_font_file(flavor: Flavor) {
        let font = TestFontBuilder::new()
            .with_chars("買提熱迪麗巴")
            .build_subset(LayoutFeatures::All, flavor);
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("font.bin");
        fs::write(&path, &font).unwrap();

        let report = Verifier::new(&path)
            .with_cases([TestCase::new("少数民族（繁体）", "買提熱迪麗巴黎")])
            .run()
            .unwrap();
        assert_eq!(report.available_chars, 6);
        assert_eq!(report.categories()[0].missing, ['黎']);
        let font_info = report.font.as_ref().unwrap();
        assert_eq!(font_info.len, font.len());

        let rendered = report.to_string();
        assert!(rendered.starts_with("📊 字体文件信息:"), "{rendered}");
        assert!(rendered.contains("   字符数: 6\n"), "{rendered}");
    }
}
