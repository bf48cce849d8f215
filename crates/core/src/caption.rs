//! Figure and table caption grammar and renumbering.
//!
//! A caption is a block starting with a kind keyword, a `major.minor`
//! number and a separator (`.`, a hyphen or a long dash) before the
//! free-text description:
//!
//! ```text
//! Рисунок 3.1 - Архітектура системи
//! Таблиця 2.4. Функціональні вимоги
//! ```
//!
//! "Рисунок 3.2 показує ..." has no separator and is a sentence, not a caption.

use crate::config::CaptionConfig;
use crate::mutation::replace_text;
use crate::types::Block;
use crate::{Error, Result};
use regex::Regex;
use serde::{Deserialize, Serialize};
use std::ops::Range;
use std::sync::LazyLock;

const KEYWORDS: &str = r"Рисунок|Рис\.|Figure|Fig\.|Таблиця|Table";

static CAPTION_REGEX: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(&format!(
        r"(?s)^\s*(?P<kw>{KEYWORDS})\s*(?P<major>\d+)\.(?P<minor>\d+)(?P<rest>(?:\.(?:\D|$)|\s*[-\x{{2010}}-\x{{2015}}\x{{2212}}]|\s*$).*)$"
    ))
    .unwrap()
});

/// Keyword followed by a number: caption-like, whether or not well-formed.
static CAPTION_LIKE_REGEX: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(&format!(r"^\s*(?:{KEYWORDS})\s*\d")).unwrap());

/// Keyword followed by a full `major.minor` pair.
static NUMBER_PAIR_REGEX: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(&format!(r"^\s*(?:{KEYWORDS})\s*\d+\.\d+")).unwrap());

/// Keyword followed by a three-level number such as `3.1.2`.
static DEEP_NUMBER_REGEX: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(&format!(r"^\s*(?:{KEYWORDS})\s*\d+\.\d+\.\d")).unwrap());

static WHITESPACE_COLLAPSE_REGEX: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"\s+").unwrap());

/// Kind of a captioned object.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum CaptionKind {
    Figure,
    Table,
}

impl CaptionKind {
    fn from_keyword(keyword: &str) -> Self {
        match keyword {
            "Таблиця" | "Table" => Self::Table,
            _ => Self::Figure,
        }
    }
}

impl std::str::FromStr for CaptionKind {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        match s.to_lowercase().as_str() {
            "figure" | "fig" | "рисунок" => Ok(Self::Figure),
            "table" | "таблиця" => Ok(Self::Table),
            other => Err(Error::ConfigError(format!("Unknown caption kind: {}", other))),
        }
    }
}

/// A parsed caption.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Caption {
    pub kind: CaptionKind,

    /// Keyword as written in the document.
    pub keyword: String,

    pub major: usize,
    pub minor: usize,

    /// Description with numbering and separator removed.
    pub remainder: String,
}

impl Caption {
    /// Render as `{label} {major}.{minor}. {remainder}`.
    pub fn render(&self, label: &str, minor: usize) -> String {
        if self.remainder.is_empty() {
            format!("{} {}.{}.", label, self.major, minor)
        } else {
            format!("{} {}.{}. {}", label, self.major, minor, self.remainder)
        }
    }
}

/// Result of classifying a caption-like block.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum CaptionMatch {
    Caption(Caption),
    /// Keyword and a number that is not exactly a `major.minor` pair.
    Malformed,
}

/// Classify a block text. `None` when the text is not caption-like at all.
pub fn classify(text: &str) -> Option<CaptionMatch> {
    if DEEP_NUMBER_REGEX.is_match(text) {
        return Some(CaptionMatch::Malformed);
    }

    if let Some(caps) = CAPTION_REGEX.captures(text) {
        let (Ok(major), Ok(minor)) = (caps["major"].parse::<usize>(), caps["minor"].parse::<usize>()) else {
            return Some(CaptionMatch::Malformed);
        };
        return Some(CaptionMatch::Caption(Caption {
            kind: CaptionKind::from_keyword(&caps["kw"]),
            keyword: caps["kw"].to_string(),
            major,
            minor,
            remainder: normalize_remainder(&caps["rest"]),
        }));
    }

    if CAPTION_LIKE_REGEX.is_match(text) && !NUMBER_PAIR_REGEX.is_match(text) {
        return Some(CaptionMatch::Malformed);
    }

    None
}

/// Parse a well-formed caption.
pub fn parse(text: &str) -> Option<Caption> {
    match classify(text) {
        Some(CaptionMatch::Caption(caption)) => Some(caption),
        _ => None,
    }
}

fn is_dash(c: char) -> bool {
    c == '-' || ('\u{2010}'..='\u{2015}').contains(&c) || c == '\u{2212}'
}

/// Strip the separator, collapse whitespace and repeated terminal periods.
fn normalize_remainder(rest: &str) -> String {
    let stripped = rest.trim_start_matches(|c: char| c == '.' || c.is_whitespace() || is_dash(c));
    let collapsed = WHITESPACE_COLLAPSE_REGEX.replace_all(stripped, " ");
    let collapsed = collapsed.trim();

    let body = collapsed.trim_end_matches('.').trim_end();
    if body.len() != collapsed.len() && !body.is_empty() {
        format!("{}.", body)
    } else {
        body.to_string()
    }
}

/// One rewritten caption.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct CaptionChange {
    pub index: usize,
    pub before: String,
    pub after: String,
}

/// Outcome of a renumbering pass.
#[derive(Debug, Clone, Default, Serialize)]
pub struct RenumberReport {
    /// Captions of the requested kind found in the range.
    pub captions: usize,

    /// Captions whose text changed.
    pub changed: Vec<CaptionChange>,

    /// Indices of caption-like blocks that could not be parsed.
    pub malformed: Vec<usize>,

    /// Minor number the next caption would receive.
    pub next: usize,
}

/// Caption renumbering and separator normalization.
#[derive(Debug, Clone)]
pub struct CaptionNumberer {
    figure_label: String,
    table_label: String,
}

impl Default for CaptionNumberer {
    fn default() -> Self {
        Self::from_config(&CaptionConfig::default())
    }
}

impl CaptionNumberer {
    /// Create a numberer writing the default labels.
    pub fn new() -> Self {
        Self::default()
    }

    pub fn from_config(config: &CaptionConfig) -> Self {
        Self {
            figure_label: config.figure_label.clone(),
            table_label: config.table_label.clone(),
        }
    }

    /// Label written for a kind.
    pub fn label(&self, kind: CaptionKind) -> &str {
        match kind {
            CaptionKind::Figure => &self.figure_label,
            CaptionKind::Table => &self.table_label,
        }
    }

    /// Renumber every caption of `kind` in `range` so minors run from `offset`.
    ///
    /// Malformed captions are logged and skipped. Block count and positions
    /// never change.
    pub fn renumber(
        &self,
        blocks: &mut [Block],
        range: Range<usize>,
        kind: CaptionKind,
        offset: usize,
    ) -> Result<RenumberReport> {
        if range.start > range.end || range.end > blocks.len() {
            return Err(Error::InvalidRange {
                start: range.start,
                end: range.end,
                len: blocks.len(),
            });
        }

        let mut report = RenumberReport {
            next: offset,
            ..RenumberReport::default()
        };

        for index in range {
            let text = blocks[index].text();
            let caption = match classify(&text) {
                Some(CaptionMatch::Caption(caption)) if caption.kind == kind => caption,
                Some(CaptionMatch::Malformed) => {
                    log::warn!("{}", Error::MalformedCaption { index, text });
                    report.malformed.push(index);
                    continue;
                }
                _ => continue,
            };

            let after = caption.render(self.label(kind), report.next);
            report.captions += 1;
            report.next += 1;

            if after != text {
                log::info!("Caption [{}]: {:?} -> {:?}", index, text, after);
                replace_text(blocks, index, &after)?;
                report.changed.push(CaptionChange {
                    index,
                    before: text,
                    after,
                });
            }
        }

        Ok(report)
    }

    /// One past the highest minor of `kind`/`major` captions before `before`.
    pub fn next_minor(&self, blocks: &[Block], before: usize, kind: CaptionKind, major: usize) -> usize {
        blocks[..before.min(blocks.len())]
            .iter()
            .filter_map(|b| parse(&b.text()))
            .filter(|c| c.kind == kind && c.major == major)
            .map(|c| c.minor)
            .max()
            .map_or(1, |m| m + 1)
    }
}

/// Rewrite `Таблиця 3.1 - Опис` as `Таблиця 3.1. Опис`, keeping keyword and number.
///
/// Returns `None` when the text is not a caption or is already normalized.
pub fn normalize_separator(text: &str) -> Option<String> {
    let caption = parse(text)?;
    let normalized = caption.render(&caption.keyword, caption.minor);
    (normalized != text).then_some(normalized)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::Document;

    #[test]
    fn test_classify_caption() {
        let caption = parse("Рисунок 3.1 - Старий підпис").unwrap();
        assert_eq!(caption.kind, CaptionKind::Figure);
        assert_eq!(caption.major, 3);
        assert_eq!(caption.minor, 1);
        assert_eq!(caption.remainder, "Старий підпис");

        let caption = parse("Таблиця 2.4. Функціональні вимоги").unwrap();
        assert_eq!(caption.kind, CaptionKind::Table);
        assert_eq!(caption.remainder, "Функціональні вимоги");

        let caption = parse("Рис. 1.2 — Схема").unwrap();
        assert_eq!(caption.keyword, "Рис.");
        assert_eq!(caption.remainder, "Схема");
    }

    #[test]
    fn test_classify_non_captions() {
        assert_eq!(classify("Рисунок 3.2 показує архітектуру"), None);
        assert_eq!(classify("На рисунку 3.2 зображено"), None);
        assert_eq!(classify("Звичайний текст"), None);
        assert_eq!(classify("Рисунок показує"), None);
    }

    #[test]
    fn test_classify_malformed() {
        assert_eq!(classify("Рисунок 3 - Схема"), Some(CaptionMatch::Malformed));
        assert_eq!(classify("Таблиця 12"), Some(CaptionMatch::Malformed));
        assert_eq!(classify("Рисунок 3.1.2 – Схема бази даних"), Some(CaptionMatch::Malformed));
        assert_eq!(classify("Таблиця 2.3.1. Вимоги"), Some(CaptionMatch::Malformed));
        assert_eq!(parse("Рисунок 3.1.2"), None);
    }

    #[test]
    fn test_renumber_skips_three_level_numbers() {
        let mut doc = Document::from_lines(["Рисунок 3.1.2 – Схема бази даних", "Рисунок 3.2 - Інша"]);
        let report = CaptionNumberer::new()
            .renumber(&mut doc.body, 0..2, CaptionKind::Figure, 5)
            .unwrap();
        assert_eq!(report.malformed, vec![0]);
        assert_eq!(doc.body[0].text(), "Рисунок 3.1.2 – Схема бази даних");
        assert_eq!(doc.body[1].text(), "Рисунок 3.5. Інша");
    }

    #[test]
    fn test_remainder_normalization() {
        assert_eq!(parse("Рисунок 3.1.").unwrap().remainder, "");
        assert_eq!(parse("Рисунок 3.1 -").unwrap().remainder, "");
        assert_eq!(parse("Рисунок 3.1").unwrap().remainder, "");
        assert_eq!(parse("Рисунок 3.1 -  Схема   бази  даних..").unwrap().remainder, "Схема бази даних.");
        assert_eq!(parse("Рисунок 3.1. - Схема").unwrap().remainder, "Схема");
    }

    #[test]
    fn test_renumber_scenario() {
        let mut doc = Document::from_lines([
            "3.6 Огляд",
            "Рисунок 3.1 - Старий підпис",
            "текст",
            "Рисунок 3.2 - Інший підпис",
        ]);

        let report = CaptionNumberer::new()
            .renumber(&mut doc.body, 1..4, CaptionKind::Figure, 5)
            .unwrap();

        assert_eq!(
            doc.body_lines(),
            vec![
                "3.6 Огляд",
                "Рисунок 3.5. Старий підпис",
                "текст",
                "Рисунок 3.6. Інший підпис"
            ]
        );
        assert_eq!(report.captions, 2);
        assert_eq!(report.changed.len(), 2);
        assert_eq!(report.next, 7);
    }

    #[test]
    fn test_renumber_sequence_from_offset() {
        let mut doc = Document::from_lines([
            "Рисунок 2.9 - a",
            "Таблиця 2.1 - t",
            "Рисунок 2.1 - b",
            "Рисунок 2.1 - c",
            "Рисунок 2.7.",
        ]);
        CaptionNumberer::new()
            .renumber(&mut doc.body, 0..5, CaptionKind::Figure, 3)
            .unwrap();

        let minors: Vec<usize> = doc
            .body
            .iter()
            .filter_map(|b| parse(&b.text()))
            .filter(|c| c.kind == CaptionKind::Figure)
            .map(|c| c.minor)
            .collect();
        assert_eq!(minors, vec![3, 4, 5, 6]);
        assert_eq!(doc.body[1].text(), "Таблиця 2.1 - t");
        assert_eq!(doc.body[4].text(), "Рисунок 2.6.");
    }

    #[test]
    fn test_renumber_skips_malformed() {
        let mut doc = Document::from_lines(["Рисунок 3 - зламаний", "Рисунок 3.4 - добрий"]);
        let report = CaptionNumberer::new()
            .renumber(&mut doc.body, 0..2, CaptionKind::Figure, 1)
            .unwrap();
        assert_eq!(report.malformed, vec![0]);
        assert_eq!(doc.body[0].text(), "Рисунок 3 - зламаний");
        assert_eq!(doc.body[1].text(), "Рисунок 3.1. добрий");
    }

    #[test]
    fn test_renumber_unchanged_caption_not_reported() {
        let mut doc = Document::from_lines(["Рисунок 1.1. Схема"]);
        let report = CaptionNumberer::new()
            .renumber(&mut doc.body, 0..1, CaptionKind::Figure, 1)
            .unwrap();
        assert_eq!(report.captions, 1);
        assert!(report.changed.is_empty());
    }

    #[test]
    fn test_renumber_invalid_range() {
        let mut doc = Document::from_lines(["a"]);
        let err = CaptionNumberer::new()
            .renumber(&mut doc.body, 0..3, CaptionKind::Figure, 1)
            .unwrap_err();
        assert!(matches!(err, Error::InvalidRange { end: 3, len: 1, .. }));
    }

    #[test]
    fn test_renumber_uses_configured_label() {
        let numberer = CaptionNumberer::from_config(&CaptionConfig {
            figure_label: "Figure".to_string(),
            table_label: "Table".to_string(),
        });
        let mut doc = Document::from_lines(["Рис. 1.3 - Схема"]);
        numberer
            .renumber(&mut doc.body, 0..1, CaptionKind::Figure, 1)
            .unwrap();
        assert_eq!(doc.body[0].text(), "Figure 1.1. Схема");
    }

    #[test]
    fn test_next_minor() {
        let doc = Document::from_lines([
            "Рисунок 3.1. a",
            "Рисунок 3.4. b",
            "Рисунок 2.9. c",
            "Таблиця 3.7. t",
            "Рисунок 3.9. later",
        ]);
        let numberer = CaptionNumberer::new();
        assert_eq!(numberer.next_minor(&doc.body, 4, CaptionKind::Figure, 3), 5);
        assert_eq!(numberer.next_minor(&doc.body, 4, CaptionKind::Table, 3), 8);
        assert_eq!(numberer.next_minor(&doc.body, 4, CaptionKind::Figure, 1), 1);
        assert_eq!(numberer.next_minor(&doc.body, 99, CaptionKind::Figure, 3), 10);
    }

    #[test]
    fn test_normalize_separator() {
        assert_eq!(
            normalize_separator("Таблиця 3.1 – Опис"),
            Some("Таблиця 3.1. Опис".to_string())
        );
        assert_eq!(
            normalize_separator("Рис. 2.2 - Схема"),
            Some("Рис. 2.2. Схема".to_string())
        );
        assert_eq!(normalize_separator("Таблиця 3.1. Опис"), None);
        assert_eq!(normalize_separator("Звичайний текст"), None);
        assert_eq!(normalize_separator("Таблиця 2.3.1 - Вимоги"), None);
    }

    #[test]
    fn test_kind_from_str() {
        assert_eq!("figure".parse::<CaptionKind>().unwrap(), CaptionKind::Figure);
        assert_eq!("Таблиця".parse::<CaptionKind>().unwrap(), CaptionKind::Table);
        assert!("chart".parse::<CaptionKind>().is_err());
    }
}
