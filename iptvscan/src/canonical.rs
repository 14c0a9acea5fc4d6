//! Channel name canonicalization.
//!
//! Names pass through an ordered, immutable list of rewrite rules. Rules are
//! grouped into five stages that always run in this order:
//!
//! 1. [`RewriteStage::Fold`]: alternate broadcaster prefixes become `CCTV`
//! 2. [`RewriteStage::Strip`]: resolution tags, whitespace, dashes and
//!    parentheses are deleted
//! 3. [`RewriteStage::Suffix`]: `CCTV<n>台` becomes `CCTV<n>`
//! 4. [`RewriteStage::Synonym`]: verbose or legacy labels map to one label
//! 5. [`RewriteStage::Trailing`]: the suffix rule again, for `CCTV<n>台`
//!    forms a synonym has just produced (`CCTV新闻台` -> `CCTV13台`)
//!
//! Within a stage, rules run in insertion order. Synonym entries may overlap
//! (`梨园` is a prefix of `梨园春`), so their order is significant and is
//! kept exactly as listed.

use std::fmt;

use regex::Regex;
use thiserror::Error;

use iptvscan_protocol::ChannelRecord;

#[derive(Debug, Error)]
pub enum CanonicalError {
    #[error("Invalid rewrite pattern {pattern:?}: {source}")]
    InvalidPattern {
        pattern: String,
        #[source]
        source: regex::Error,
    },
}

/// Pipeline stage a rule belongs to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum RewriteStage {
    Fold,
    Strip,
    Suffix,
    Synonym,
    Trailing,
}

/// A single substring or regex rewrite.
#[derive(Clone)]
pub enum RewriteRule {
    /// Replace every occurrence of `from` with `to`.
    Literal { from: String, to: String },
    /// Replace every match of `regex` with `replacement` (`$1` expands groups).
    Pattern { regex: Regex, replacement: String },
}

impl RewriteRule {
    pub fn literal(from: impl Into<String>, to: impl Into<String>) -> Self {
        RewriteRule::Literal {
            from: from.into(),
            to: to.into(),
        }
    }

    pub fn pattern(pattern: &str, replacement: impl Into<String>) -> Result<Self, CanonicalError> {
        let regex = Regex::new(pattern).map_err(|source| CanonicalError::InvalidPattern {
            pattern: pattern.to_string(),
            source,
        })?;
        Ok(RewriteRule::Pattern {
            regex,
            replacement: replacement.into(),
        })
    }

    /// Apply this rule alone.
    ///
    /// A literal whose replacement contains its own key (`ICS` ->
    /// `上视ICS外语`) leaves names that already contain the replacement
    /// untouched, so canonical output stays fixed under re-application.
    pub fn apply(&self, name: &str) -> String {
        match self {
            RewriteRule::Literal { from, to } => {
                if from.is_empty() || !name.contains(from.as_str()) {
                    return name.to_string();
                }
                if to.contains(from.as_str()) && name.contains(to.as_str()) {
                    return name.to_string();
                }
                name.replace(from.as_str(), to)
            }
            RewriteRule::Pattern { regex, replacement } => {
                regex.replace_all(name, replacement.as_str()).into_owned()
            }
        }
    }
}

impl fmt::Debug for RewriteRule {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            RewriteRule::Literal { from, to } => write!(f, "Literal({:?} -> {:?})", from, to),
            RewriteRule::Pattern { regex, replacement } => {
                write!(f, "Pattern({:?} -> {:?})", regex.as_str(), replacement)
            }
        }
    }
}

/// Broadcaster prefix spellings folded to `CCTV`.
const FOLD_PREFIXES: &[(&str, &str)] = &[("cctv", "CCTV"), ("中央", "CCTV"), ("央视", "CCTV")];

/// Decorative tokens deleted outright.
const STRIP_PATTERN: &str = r"(高清|超清|超高|HD|标清|频道|-| |PLUS|＋|\(|\)|（|）)";

const SUFFIX_PATTERN: &str = r"CCTV(\d+)台";
const SUFFIX_REPLACEMENT: &str = "CCTV$1";

/// Legacy and verbose labels, applied in this order.
const SYNONYMS: &[(&str, &str)] = &[
    ("CCTV1综合", "CCTV1"),
    ("CCTV2财经", "CCTV2"),
    ("CCTV3综艺", "CCTV3"),
    ("CCTV4国际", "CCTV4"),
    ("CCTV4中文国际", "CCTV4"),
    ("CCTV4欧洲", "CCTV4"),
    ("CCTV5体育", "CCTV5"),
    ("CCTV6电影", "CCTV6"),
    ("CCTV7军事", "CCTV7"),
    ("CCTV7军农", "CCTV7"),
    ("CCTV7农业", "CCTV7"),
    ("CCTV7国防军事", "CCTV7"),
    ("CCTV8电视剧", "CCTV8"),
    ("CCTV9记录", "CCTV9"),
    ("CCTV9纪录", "CCTV9"),
    ("CCTV10科教", "CCTV10"),
    ("CCTV11戏曲", "CCTV11"),
    ("CCTV12社会与法", "CCTV12"),
    ("CCTV13新闻", "CCTV13"),
    ("CCTV新闻", "CCTV13"),
    ("CCTV14少儿", "CCTV14"),
    ("CCTV15音乐", "CCTV15"),
    ("CCTV16奥林匹克", "CCTV16"),
    ("CCTV17农业农村", "CCTV17"),
    ("CCTV17农业", "CCTV17"),
    ("CCTV5+体育赛视", "CCTV5+"),
    ("CCTV5+体育赛事", "CCTV5+"),
    ("CCTV5+体育", "CCTV5+"),
    ("CCTV足球", "CCTV风云足球"),
    ("CCTV赛事", "CCTV5+"),
    ("上海卫视", "东方卫视"),
    ("全纪实", "乐游纪实"),
    ("金鹰动画", "金鹰卡通"),
    ("河南新农村", "河南乡村"),
    ("河南法制", "河南法治"),
    ("文物宝库", "河南收藏天下"),
    ("梨园", "河南戏曲"),
    ("梨园春", "河南戏曲"),
    ("吉林综艺", "吉视综艺文化"),
    ("BRTVKAKU", "BRTV卡酷少儿"),
    ("kaku少儿", "BRTV卡酷少儿"),
    ("北京卡通", "BRTV卡酷少儿"),
    ("卡酷卡通", "BRTV卡酷少儿"),
    ("卡酷动画", "BRTV卡酷少儿"),
    ("佳佳动画", "嘉佳卡通"),
    ("CGTN今日世界", "CGTN"),
    ("CGTN英语", "CGTN"),
    ("ICS", "上视ICS外语"),
    ("法制天地", "法治天地"),
    ("都市时尚", "都市剧场"),
    ("上海炫动卡通", "哈哈炫动"),
    ("炫动卡通", "哈哈炫动"),
    ("旅游卫视", "海南卫视"),
    ("福建东南卫视", "东南卫视"),
    ("福建东南", "东南卫视"),
    ("南方卫视粤语节目9", "广东大湾区"),
    ("内蒙古蒙语卫视", "内蒙古蒙语"),
    ("南方卫视", "广东大湾区"),
    ("家庭影院", "CHC家庭影院"),
    ("动作电影", "CHC动作电影"),
    ("影迷电影", "CHC影迷电影"),
    ("中国教育1", "CETV1"),
    ("CETV1中教", "CETV1"),
    ("中国教育2", "CETV2"),
    ("中国教育4", "CETV4"),
    ("CCTVnews", "CGTN"),
    ("1资讯", "凤凰资讯台"),
    ("2中文", "凤凰台"),
    ("3XG", "香港台"),
];

/// Collects rules per stage; [`RuleSetBuilder::build`] fixes the order.
#[derive(Debug, Default)]
pub struct RuleSetBuilder {
    rules: Vec<(RewriteStage, RewriteRule)>,
}

impl RuleSetBuilder {
    pub fn push(mut self, stage: RewriteStage, rule: RewriteRule) -> Self {
        self.rules.push((stage, rule));
        self
    }

    pub fn synonym(self, from: impl Into<String>, to: impl Into<String>) -> Self {
        self.push(RewriteStage::Synonym, RewriteRule::literal(from, to))
    }

    pub fn build(mut self) -> Canonicalizer {
        // Stable: insertion order is kept within a stage.
        self.rules.sort_by_key(|(stage, _)| *stage);
        Canonicalizer {
            rules: self.rules.into_iter().map(|(_, rule)| rule).collect(),
        }
    }
}

/// Deterministic `name -> canonical name` rewriter.
#[derive(Debug, Clone)]
pub struct Canonicalizer {
    rules: Vec<RewriteRule>,
}

impl Canonicalizer {
    pub fn builder() -> RuleSetBuilder {
        RuleSetBuilder::default()
    }

    /// Builder preloaded with the built-in rules of every stage.
    pub fn standard_builder() -> Result<RuleSetBuilder, CanonicalError> {
        let mut builder = Self::builder();
        for (from, to) in FOLD_PREFIXES {
            builder = builder.push(RewriteStage::Fold, RewriteRule::literal(*from, *to));
        }
        builder = builder
            .push(RewriteStage::Strip, RewriteRule::pattern(STRIP_PATTERN, "")?)
            .push(
                RewriteStage::Suffix,
                RewriteRule::pattern(SUFFIX_PATTERN, SUFFIX_REPLACEMENT)?,
            );
        for (from, to) in SYNONYMS {
            builder = builder.synonym(*from, *to);
        }
        builder = builder.push(
            RewriteStage::Trailing,
            RewriteRule::pattern(SUFFIX_PATTERN, SUFFIX_REPLACEMENT)?,
        );
        Ok(builder)
    }

    pub fn canonicalize(&self, name: &str) -> String {
        self.rules
            .iter()
            .fold(name.to_string(), |current, rule| rule.apply(&current))
    }

    pub fn canonicalize_record(&self, record: ChannelRecord) -> ChannelRecord {
        ChannelRecord {
            name: self.canonicalize(&record.name),
            url: record.url,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn canon() -> Canonicalizer {
        Canonicalizer::standard_builder().unwrap().build()
    }

    #[test]
    fn test_scenario_names() {
        let c = canon();
        assert_eq!(c.canonicalize("CCTV1综合"), "CCTV1");
        assert_eq!(c.canonicalize("cctv2财经"), "CCTV2");
    }

    #[test]
    fn test_fold_strip_and_suffix() {
        let c = canon();
        assert_eq!(c.canonicalize("中央5台"), "CCTV5");
        assert_eq!(c.canonicalize("央视-13 新闻 高清"), "CCTV13");
        assert_eq!(c.canonicalize("CCTV-5+ 体育赛事 HD"), "CCTV5+");
        assert_eq!(c.canonicalize("湖南卫视(高清)"), "湖南卫视");
        assert_eq!(c.canonicalize("浙江卫视（标清）"), "浙江卫视");
        assert_eq!(c.canonicalize("CCTV4 中文国际"), "CCTV4");
    }

    #[test]
    fn test_synonym_table() {
        let c = canon();
        assert_eq!(c.canonicalize("上海卫视"), "东方卫视");
        assert_eq!(c.canonicalize("福建东南卫视"), "东南卫视");
        assert_eq!(c.canonicalize("南方卫视"), "广东大湾区");
        assert_eq!(c.canonicalize("CCTV足球"), "CCTV风云足球");
        assert_eq!(c.canonicalize("中国教育1"), "CETV1");
    }

    #[test]
    fn test_overlapping_synonyms_follow_table_order() {
        // `梨园` fires before `梨园春`, leaving the trailing character.
        assert_eq!(canon().canonicalize("梨园春"), "河南戏曲春");
    }

    #[test]
    fn test_self_embedding_rule_is_stable() {
        let c = canon();
        assert_eq!(c.canonicalize("ICS"), "上视ICS外语");
        assert_eq!(c.canonicalize("上视ICS外语频道"), "上视ICS外语");
        assert_eq!(c.canonicalize("家庭影院"), "CHC家庭影院");
        assert_eq!(c.canonicalize("CHC家庭影院"), "CHC家庭影院");
    }

    #[test]
    fn test_reapplication_is_stable() {
        let c = canon();
        let samples = [
            "CCTV1综合",
            "cctv2财经",
            "CCTV-5+ 体育赛事",
            "中央新闻",
            "CCTV7国防军事",
            "CCTV17农业农村",
            "湖南卫视 HD",
            "上海卫视",
            "南方卫视粤语节目9",
            "内蒙古蒙语卫视",
            "ICS",
            "家庭影院",
            "动作电影",
            "影迷电影",
            "CETV1中教",
            "卡酷动画",
            "CGTN英语",
            "梨园春",
            "1资讯",
            "CCTVnews",
            "CCTV新闻台",
            "央视新闻台",
            "CCTV1综合台",
            "中央5体育台",
            "测试频道",
            "",
        ];
        for sample in samples {
            let once = c.canonicalize(sample);
            let twice = c.canonicalize(&once);
            assert_eq!(once, twice, "unstable for {:?}", sample);
        }
    }

    #[test]
    fn test_suffix_uncovered_by_synonym() {
        let c = canon();
        assert_eq!(c.canonicalize("CCTV新闻台"), "CCTV13");
        assert_eq!(c.canonicalize("央视新闻台"), "CCTV13");
        assert_eq!(c.canonicalize("CCTV1综合台"), "CCTV1");
        assert_eq!(c.canonicalize("中央5体育台"), "CCTV5");
    }

    #[test]
    fn test_rules_are_isolated() {
        let rule = RewriteRule::pattern(SUFFIX_PATTERN, SUFFIX_REPLACEMENT).unwrap();
        assert_eq!(rule.apply("CCTV12台"), "CCTV12");
        assert_eq!(rule.apply("湖南台"), "湖南台");

        let rule = RewriteRule::literal("中央", "CCTV");
        assert_eq!(rule.apply("中央1"), "CCTV1");
    }

    #[test]
    fn test_stage_order_is_enforced() {
        // Pushed out of order: the synonym must still see the stripped name.
        let c = Canonicalizer::builder()
            .synonym("AB", "X")
            .push(RewriteStage::Strip, RewriteRule::pattern("-", "").unwrap())
            .build();
        assert_eq!(c.canonicalize("A-B"), "X");
    }

    #[test]
    fn test_extra_synonyms_run_after_builtins() {
        let c = Canonicalizer::standard_builder()
            .unwrap()
            .synonym("CCTV1", "CCTV-1")
            .build();
        assert_eq!(c.canonicalize("CCTV1综合"), "CCTV-1");
    }

    #[test]
    fn test_invalid_pattern() {
        assert!(RewriteRule::pattern("(", "").is_err());
    }
}
