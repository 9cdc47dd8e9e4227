//! Curated set of Hanzi used in memorial tablet and application texts.
//!
//! The set is assembled from six literal blocks, each covering both simplified and traditional
//! variants. Whitespace in blocks is insignificant.

use std::{collections::BTreeSet, fmt};

/// Core template text, simplified and traditional.
const CORE: &str = "
佛光注照長生祿位佛力超薦往生蓮位
陽上敬薦叩薦氏歷代祖先累劫冤親債主
之地基主嬰靈菩薩父母孝孫兒女媳
长生禄位佛力超荐往生莲位
阳上敬荐叩荐氏历代祖先累劫冤亲债主
之地基主婴灵菩萨父母孝孙儿女媳
";

/// The Hundred Family Surnames, simplified and traditional.
const SURNAMES: &str = "
赵钱孙李周吴郑王冯陈褚卫蒋沈韩杨朱秦尤许何吕施张孔曹严华金魏陶姜戚谢邹喻柏水窦章云苏潘葛奚范彭郎鲁韦昌马苗凤花方俞任袁柳酆鲍史唐费廉岑薛雷贺倪汤滕殷罗毕郝邓安常乐于时傅皮卞齐康伍余元卜顾孟平黄和穆萧尹姚邵湛汪祁毛禹狄米贝明臧计伏成戴谈宋茅庞熊纪舒屈项祝董梁杜阮蓝闵席季麻强贾路娄危江童颜郭梅盛林刁钟徐邱骆高夏蔡田樊胡凌霍虞万支柯昝管卢莫经房裘缪干解应宗丁宣贲郁单杭洪包诸左石崔吉纽龚程嵇邢滑裴陆荣翁荀羊於惠甄曲家封芮羿储靳汲邴糜松井段富巫乌焦巴弓牧隗山谷车侯宓蓬全郗班仰秋仲伊宫宁仇栾暴甘钭厉戎祖武符刘景詹束龙叶幸司韶郜黎蓟薄印宿白怀蒲台从鄂索咸籍赖卓蔺屠蒙池乔阴鬱胥能苍双闻莘党翟谭贡劳逄姬申扶堵冉宰郦雍郤璩桑桂濮牛寿通边扈燕冀郏浦尚农温别庄晏柴瞿阎充慕连茹习宦艾鱼容向古易慎戈廖庾终暨居衡步都耿满弘匡国文寇广禄阙东欧阳上官皇甫令狐诸葛曾
趙錢孫李週吳鄭王馮陳褚衛蔣沈韓楊朱秦尤許何呂施張孔曹嚴華金魏陶姜戚謝鄒喻柏水竇章雲蘇潘葛奚范彭郎魯韋昌馬苗鳳花方俞任袁柳酆鮑史唐費廉岑薛雷賀倪湯滕殷羅畢郝鄧安常樂於時傅皮卞齊康伍餘元卜顧孟平黃和穆蕭尹姚邵湛汪祁毛禹狄米貝明臧計伏成戴談宋茅龐熊紀舒屈項祝董梁杜阮藍閔席季麻強賈路婁危江童顏郭梅盛林刁鐘徐邱駱高夏蔡田樊胡凌霍虞萬支柯昝管盧莫經房裘繆干解應宗丁宣賁郁單杭洪包諸左石崔吉鈕龔程嵇邢滑裴陸榮翁荀羊於惠甄曲家封芮羿儲靳汲邴糜松井段富巫烏焦巴弓牧隗山谷車侯宓蓬全郗班仰秋仲伊宮寧仇欒暴甘鐸厲戎祖武符劉景詹束龍葉幸司韶郜黎薊薄印宿白懷蒲台從鄂索咸籍賴卓藺屠蒙池喬陰鬱胥能蒼雙聞莘黨翟譚貢勞逄姬申扶堵冉宰酈雍郤璩桑桂濮牛壽通邊扈燕冀郟浦尚農溫別莊晏柴瞿閻充慕連茹習宦艾魚容向古易慎戈廖庾終暨居衡步都耿滿弘匡國文寇廣祿闕東歐陽上官皇甫令狐諸葛曾
";

/// Frequent given-name characters (male and female names).
const NAMES: &str = "
伟刚勇毅俊峰强军平保东文辉力明永健世广志义兴良海山仁波宁贵福生龙元全国胜学祥才发武新利清飞彬富顺信子杰涛昌成康星光天达安岩中茂进林有坚和彪博诚先敬震振壮会思群豪心邦承乐绍功松善厚庆磊民友裕河哲江超浩亮政谦亨奇固之轮翰朗伯宏言若鸣朋斌梁栋维启克伦翔旭鹏泽晨辰士以建家致树炎德行时泰盛雄琛钧冠策腾楠榕风航弘宇轩昊
秀娟英华慧巧美娜静淑惠珠翠雅芝玉萍红娥玲芬芳燕彩春菊兰凤洁梅琳素云莲真环雪荣爱妹霞香月莺媛艳瑞凡佳嘉琼勤珍贞莉桂娣叶璧璐娅琦晶妍茜秋珊莎锦黛青倩婷姣婉娴瑾颖露瑶怡婵雁蓓纨仪荷丹蓉眉君琴蕊薇菁梦岚苑婕馨瑗琰韵融园艺咏卿聪澜纯毓悦昭冰爽琬茗羽希欣飘育滢馥筠柔竹霭凝晓欢霄枫芸菲寒伊亚宜可姬舒影荔枝思丽琪瑜珺璃琨珀
偉剛勇毅俊峰強軍平保東文輝力明永健世廣志義興良海山仁波寧貴福生龍元全國勝學祥才發武新利清飛彬富順信子傑濤昌成康星光天達安岩中茂進林有堅和彪博誠先敬震振壯會思群豪心邦承樂紹功松善厚慶磊民友裕河哲江超浩亮政謙亨奇固之輪翰朗伯宏言若鳴朋斌梁棟維啟克倫翔旭鵬澤晨辰士以建家致樹炎德行時泰盛雄琛鈞冠策騰楠榕風航弘宇軒昊
秀娟英華慧巧美娜靜淑惠珠翠雅芝玉萍紅娥玲芬芳燕彩春菊蘭鳳潔梅琳素雲蓮真環雪榮愛妹霞香月鶯媛艷瑞凡佳嘉瓊勤珍貞莉桂娣葉璧璐娅琦晶妍茜秋珊莎錦黛青倩婷姣婉嫻瑾穎露瑤怡嬋雁蓓紈儀荷丹蓉眉君琴蕊薇菁夢嵐苑婕馨瑗琰韻融園藝詠卿聰瀾純毓悅昭冰爽琬茗羽希欣飄育瀅馥筠柔竹靄凝曉歡霄楓芸菲寒伊亞宜可姬舒影荔枝思麗琪瑜珺璃琨珀
";

/// Characters with auspicious meanings, numerals and calendar words.
const AUSPICIOUS: &str = "
福禄寿喜财吉祥如意康宁团圆满盈丰盛兴旺荣华富贵安健智慧真善美仁义礼智信忠孝廉耻温良恭俭让天地日月春夏秋冬金木水火土年月日时分秒一二三四五六七八九十百千万亿
福祿壽喜財吉祥如意康寧團圓滿盈豐盛興旺榮華富貴安健智慧真善美仁義禮智信忠孝廉恥溫良恭儉讓天地日月春夏秋冬金木水火土年月日時分秒一二三四五六七八九十百千萬億
";

/// Religious and ethnic-minority name characters, and key test characters.
const SPECIAL: &str = "
龢䒟瑂靉阖买提热迪丽巴黎唯法师正哈
龢䒟瑂靉闔買提熱迪麗巴黎唯法師正哈
上下中大小高低新老前后內外左右近远
";

/// Address and family-relation characters.
const ADDRESS_RELATION: &str = "
东南西北省市区县州台湾北京人民共和深圳湾座楼叔相科觉溥锋故妙音姓流产孩朝拉舅甥姑奥侄莲
東南西北省市區縣州台灣北京人民共和深圳灣座樓叔相科覺溥鋒故妙音姓流產孩朝拉舅甥姑奧姪蓮
";

/// Thematic block of the curated character set.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
#[non_exhaustive]
pub enum Category {
    /// Core template words printed on every tablet.
    Core,
    /// Common surnames, including compound ones.
    Surnames,
    /// Common given-name characters.
    Names,
    /// Characters with auspicious meanings.
    Auspicious,
    /// Religious, ethnic-minority and other special characters.
    Special,
    /// Address and family-relation characters.
    AddressRelation,
}

impl Category {
    /// All categories in the order they are reported.
    pub const ALL: [Self; 6] = [
        Self::Core,
        Self::Surnames,
        Self::Names,
        Self::Auspicious,
        Self::Special,
        Self::AddressRelation,
    ];

    /// Returns the human-readable label of this category.
    pub fn label(self) -> &'static str {
        match self {
            Self::Core => "核心业务字",
            Self::Surnames => "百家姓",
            Self::Names => "人名用字",
            Self::Auspicious => "美好寓意字",
            Self::Special => "特殊字符",
            Self::AddressRelation => "地址关系字",
        }
    }

    /// Returns the literal text of this category, including insignificant whitespace.
    pub fn text(self) -> &'static str {
        match self {
            Self::Core => CORE,
            Self::Surnames => SURNAMES,
            Self::Names => NAMES,
            Self::Auspicious => AUSPICIOUS,
            Self::Special => SPECIAL,
            Self::AddressRelation => ADDRESS_RELATION,
        }
    }

    /// Returns distinct chars of this category.
    pub fn chars(self) -> BTreeSet<char> {
        significant_chars(self.text()).collect()
    }
}

impl fmt::Display for Category {
    fn fmt(&self, formatter: &mut fmt::Formatter<'_>) -> fmt::Result {
        formatter.write_str(self.label())
    }
}

fn significant_chars(text: &str) -> impl Iterator<Item = char> + '_ {
    text.chars().filter(|ch| !ch.is_whitespace())
}

/// Deduplicated set of chars ordered by code point.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct CharSet {
    chars: BTreeSet<char>,
}

impl CharSet {
    /// Returns the union of all [`Category`] blocks.
    pub fn curated() -> Self {
        let mut this = Self::default();
        for category in Category::ALL {
            this.extend_text(category.text());
        }
        this
    }

    /// Creates a set from the non-whitespace chars in `text`.
    pub fn from_text(text: &str) -> Self {
        let mut this = Self::default();
        this.extend_text(text);
        this
    }

    /// Adds the non-whitespace chars in `text` to this set.
    pub fn extend_text(&mut self, text: &str) {
        self.chars.extend(significant_chars(text));
    }

    /// Returns the number of chars in this set.
    pub fn len(&self) -> usize {
        self.chars.len()
    }

    /// Checks whether this set is empty.
    pub fn is_empty(&self) -> bool {
        self.chars.is_empty()
    }

    /// Checks whether this set contains the specified char.
    pub fn contains(&self, ch: char) -> bool {
        self.chars.contains(&ch)
    }

    /// Iterates over chars in increasing code point order.
    pub fn iter(&self) -> impl Iterator<Item = char> + '_ {
        self.chars.iter().copied()
    }

    /// Returns the underlying set.
    pub fn as_set(&self) -> &BTreeSet<char> {
        &self.chars
    }

    /// Concatenates chars in increasing code point order.
    pub fn to_text(&self) -> String {
        self.chars.iter().collect()
    }

    /// Returns the number of distinct chars in each category block. The counts do not depend
    /// on the contents of this set.
    pub fn category_counts() -> Vec<(Category, usize)> {
        Category::ALL
            .into_iter()
            .map(|category| (category, category.chars().len()))
            .collect()
    }

    /// Returns per-category statistics for this set.
    pub fn stats(&self) -> CharSetStats {
        let category_chars: BTreeSet<char> = Category::ALL
            .into_iter()
            .flat_map(|category| significant_chars(category.text()))
            .collect();
        let extra_count = self
            .iter()
            .filter(|ch| !category_chars.contains(ch))
            .count();
        CharSetStats {
            categories: Self::category_counts(),
            extra_count,
            total: self.len(),
        }
    }
}

impl FromIterator<char> for CharSet {
    fn from_iter<I: IntoIterator<Item = char>>(iter: I) -> Self {
        Self {
            chars: iter.into_iter().filter(|ch| !ch.is_whitespace()).collect(),
        }
    }
}

/// Per-category statistics of a [`CharSet`], displayed in a human-readable form.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CharSetStats {
    /// Distinct char counts for each category.
    pub categories: Vec<(Category, usize)>,
    /// Number of chars not belonging to any category (e.g., added from a text file).
    pub extra_count: usize,
    /// Total number of distinct chars.
    pub total: usize,
}

impl fmt::Display for CharSetStats {
    fn fmt(&self, formatter: &mut fmt::Formatter<'_>) -> fmt::Result {
        const HEAVY_RULE: &str = "==================================================";
        const LIGHT_RULE: &str = "--------------------------------------------------";

        writeln!(formatter, "✨ 字符集统计 (简体 + 繁体双覆盖)")?;
        writeln!(formatter, "{HEAVY_RULE}")?;
        for (category, count) in &self.categories {
            writeln!(formatter, "  {category}: {count} 个")?;
        }
        if self.extra_count > 0 {
            writeln!(formatter, "  附加字符: {} 个", self.extra_count)?;
        }
        writeln!(formatter, "{LIGHT_RULE}")?;
        writeln!(formatter, "  总计（去重后）: {} 个精选字符", self.total)?;
        write!(formatter, "{HEAVY_RULE}")
    }
}

#[cfg(test)]
mod tests {
    use test_casing::test_casing;

    use super::*;

    #[test_casing(6, Category::ALL)]
    fn every_category_char_is_in_curated_set(category: Category) {
        let charset = CharSet::curated();
        for ch in significant_chars(category.text()) {
            assert!(charset.contains(ch), "{category}: {ch:?}");
        }
    }

    #[test]
    fn curated_set_has_expected_size() {
        let counts: Vec<_> = CharSet::category_counts()
            .into_iter()
            .map(|(_, count)| count)
            .collect();
        assert_eq!(counts, [55, 480, 392, 95, 39, 52]);
        assert_eq!(CharSet::curated().len(), 977);
    }

    #[test]
    fn curated_set_is_deterministic_and_sorted() {
        let text = CharSet::curated().to_text();
        assert_eq!(text, CharSet::curated().to_text());

        let chars: Vec<_> = text.chars().collect();
        assert!(chars.windows(2).all(|pair| pair[0] < pair[1]));
        assert!(!chars.iter().any(|ch| ch.is_whitespace()));
        assert_eq!(CharSet::from_text(&text), CharSet::curated());
    }

    #[test]
    fn building_set_from_text() {
        let mut charset = CharSet::from_text("長生 祿位\n長生");
        assert_eq!(charset.len(), 4);
        assert_eq!(charset.to_text(), "位生祿長");
        charset.extend_text("\t佛光\r\n");
        assert_eq!(charset.len(), 6);
        assert!(charset.contains('佛'));
        assert!(!charset.contains(' '));

        let collected: CharSet = "佛 光".chars().collect();
        assert_eq!(collected.to_text(), "佛光");
    }

    #[test]
    fn displaying_stats() {
        let stats = CharSet::curated().stats();
        assert_eq!(stats.extra_count, 0);
        assert_eq!(stats.total, 977);
        let rendered = stats.to_string();
        assert!(rendered.contains("  核心业务字: 55 个\n"), "{rendered}");
        assert!(rendered.contains("  总计（去重后）: 977 个精选字符"), "{rendered}");
        assert!(!rendered.contains("附加字符"), "{rendered}");

        let mut charset = CharSet::curated();
        charset.extend_text("😀");
        let rendered = charset.stats().to_string();
        assert!(rendered.contains("  附加字符: 1 个\n"), "{rendered}");
        assert!(rendered.contains("978 个精选字符"), "{rendered}");
    }
}
