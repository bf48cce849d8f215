//! Section lookup over a flat block sequence.
//!
//! A section is a half-open range `[start, end)` whose first block is a
//! heading. It ends at the next heading of the same or a shallower depth.
//! Sections are never stored: any insertion invalidates their ranges, so
//! callers locate again after mutating.

use crate::config::OutlineConfig;
use crate::types::Block;
use crate::{Error, Result};
use regex::Regex;
use serde::Serialize;
use std::ops::Range;
use std::sync::LazyLock;
use unicode_normalization::UnicodeNormalization;

/// "3.6 Огляд", "2.3.1. Вимоги". At least two components: a lone number
/// starts list items ("1. Джерело") and quantities ("2 ГБ пам'яті").
static NUMBERED_HEADING_REGEX: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^(\d{1,2}(?:\.\d{1,2})+\.?)\s+\p{Lu}").unwrap());

/// Text compared against patterns: trimmed and NFC-composed.
pub(crate) fn match_text(block: &Block) -> String {
    block.text().trim().nfc().collect()
}

/// A located section.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Section {
    /// Index of the heading block.
    pub start: usize,

    /// One past the last block of the section.
    pub end: usize,

    /// Outline depth (1 for chapters).
    pub depth: usize,

    /// Heading text.
    pub heading: String,
}

impl Section {
    /// Whole section including its heading.
    pub fn range(&self) -> Range<usize> {
        self.start..self.end
    }

    /// Blocks after the heading.
    pub fn body(&self) -> Range<usize> {
        self.start + 1..self.end
    }

    pub fn is_empty_body(&self) -> bool {
        self.end == self.start + 1
    }
}

/// An outline heading found in a story.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Heading {
    pub index: usize,
    pub depth: usize,
    pub text: String,
}

/// Describes which blocks start a section.
#[derive(Debug, Clone)]
pub struct HeadingPredicate {
    pattern: Regex,
    style: Option<String>,
    depth: Option<usize>,
}

impl HeadingPredicate {
    /// Match headings whose text matches a regex.
    pub fn new(pattern: &str) -> Result<Self> {
        let pattern = Regex::new(pattern)
            .map_err(|e| Error::ConfigError(format!("Invalid heading pattern {:?}: {}", pattern, e)))?;
        Ok(Self::from_regex(pattern))
    }

    pub fn from_regex(pattern: Regex) -> Self {
        Self {
            pattern,
            style: None,
            depth: None,
        }
    }

    /// Only match blocks at this outline depth.
    ///
    /// Blocks the outline does not consider headings at all still match, and
    /// the section then takes this depth.
    pub fn at_depth(mut self, depth: usize) -> Self {
        self.depth = Some(depth.max(1));
        self
    }

    /// Only match blocks whose style name contains this text (case-insensitive).
    pub fn with_style(mut self, style: impl Into<String>) -> Self {
        self.style = Some(style.into().to_lowercase());
        self
    }

    fn matches(&self, outline: &Outline, block: &Block) -> bool {
        if let Some(ref style) = self.style {
            if !block.style.to_lowercase().contains(style.as_str()) {
                return false;
            }
        }
        if let (Some(want), Some(have)) = (self.depth, outline.depth(block)) {
            if want != have {
                return false;
            }
        }
        self.pattern.is_match(&match_text(block))
    }
}

/// Heading grammar of a document.
#[derive(Debug, Clone)]
pub struct Outline {
    chapter: Regex,
    numbered: bool,
}

impl Default for Outline {
    fn default() -> Self {
        Self::from_config(&OutlineConfig::default())
            .unwrap_or_else(|_| unreachable!("default chapter pattern is valid"))
    }
}

impl Outline {
    /// Create an outline with the default heading grammar.
    pub fn new() -> Self {
        Self::default()
    }

    /// Build the heading grammar from configuration.
    pub fn from_config(config: &OutlineConfig) -> Result<Self> {
        let chapter = Regex::new(&config.chapter_pattern).map_err(|e| {
            Error::ConfigError(format!(
                "Invalid chapter pattern {:?}: {}",
                config.chapter_pattern, e
            ))
        })?;
        Ok(Self {
            chapter,
            numbered: config.numbered_headings,
        })
    }

    /// Outline depth of a block, or `None` for non-heading blocks.
    ///
    /// Heading styles win; unstyled chapter titles count as depth 1 and
    /// numbered titles (`2.1`, `2.1.3`) as their number of components.
    pub fn depth(&self, block: &Block) -> Option<usize> {
        if let Some(level) = block.heading_level() {
            return Some(level);
        }

        let text = match_text(block);
        if text.is_empty() {
            return None;
        }
        if self.chapter.is_match(&text) {
            return Some(1);
        }
        if self.numbered {
            if let Some(caps) = NUMBERED_HEADING_REGEX.captures(&text) {
                let number = caps[1].trim_end_matches('.');
                return Some(number.split('.').count());
            }
        }
        None
    }

    /// All headings of a story, in order.
    pub fn headings(&self, blocks: &[Block]) -> Vec<Heading> {
        blocks
            .iter()
            .enumerate()
            .filter_map(|(index, block)| {
                self.depth(block).map(|depth| Heading {
                    index,
                    depth,
                    text: match_text(block),
                })
            })
            .collect()
    }

    /// Every section started by a block matching `predicate`.
    ///
    /// An empty result is not an error.
    pub fn locate(&self, blocks: &[Block], predicate: &HeadingPredicate) -> Vec<Section> {
        let mut sections = Vec::new();
        let mut i = 0;

        while i < blocks.len() {
            if !predicate.matches(self, &blocks[i]) {
                i += 1;
                continue;
            }

            let depth = predicate
                .depth
                .or_else(|| self.depth(&blocks[i]))
                .unwrap_or(1);
            let end = self.section_end(blocks, i, depth, predicate);

            log::debug!("Section {}..{} (depth {}): {}", i, end, depth, match_text(&blocks[i]));
            sections.push(Section {
                start: i,
                end,
                depth,
                heading: match_text(&blocks[i]),
            });
            i = end;
        }

        sections
    }

    /// Like [`Outline::locate`], but fails with `NotFound` on no match.
    pub fn require(&self, blocks: &[Block], predicate: &HeadingPredicate) -> Result<Vec<Section>> {
        let sections = self.locate(blocks, predicate);
        if sections.is_empty() {
            return Err(Error::NotFound(format!(
                "no heading matches {:?}",
                predicate.pattern.as_str()
            )));
        }
        Ok(sections)
    }

    /// First matching section, if any.
    pub fn find_first(&self, blocks: &[Block], predicate: &HeadingPredicate) -> Option<Section> {
        self.locate(blocks, predicate).into_iter().next()
    }

    /// First matching section, or `NotFound`.
    pub fn require_first(&self, blocks: &[Block], predicate: &HeadingPredicate) -> Result<Section> {
        self.require(blocks, predicate).map(|mut s| s.swap_remove(0))
    }

    fn section_end(
        &self,
        blocks: &[Block],
        start: usize,
        depth: usize,
        predicate: &HeadingPredicate,
    ) -> usize {
        blocks[start + 1..]
            .iter()
            .position(|block| {
                self.depth(block).is_some_and(|d| d <= depth) || predicate.matches(self, block)
            })
            .map(|offset| start + 1 + offset)
            .unwrap_or(blocks.len())
    }
}
