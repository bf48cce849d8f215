//! Reference list normalization.
//!
//! Every entry of the reference list section is rewritten as
//!
//! ```text
//! {n}. {description} URL: {url} (дата звернення: {date}).
//! {n}. {description}.
//! ```
//!
//! An access date already present in the entry is kept. Entries with a URL
//! and no date get the date chosen by the caller ([`AccessDate`]).

use crate::config::BibliographyConfig;
use crate::mutation::replace_text;
use crate::outline::{HeadingPredicate, Outline, Section};
use crate::types::{Block, Document};
use crate::{Error, Result};
use chrono::{Local, NaiveDate};
use regex::Regex;
use serde::Serialize;
use std::sync::LazyLock;

/// Leading "12." prefixes, possibly repeated by earlier numbering passes.
static LEADING_NUMBERS_REGEX: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^(?:\d+\.\s*)+").unwrap());

static FIRST_NUMBER_REGEX: LazyLock<Regex> = LazyLock::new(|| Regex::new(r"^(\d+)\.").unwrap());

static URL_REGEX: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"(?i)https?://[^\s\)\]]+|www\.[^\s\)\]]+").unwrap());

static URL_LABEL_REGEX: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"(?i)\s*URL\s*:\s*$").unwrap());

static REPEATED_PERIOD_REGEX: LazyLock<Regex> = LazyLock::new(|| Regex::new(r"\.{2,}").unwrap());

static WHITESPACE_COLLAPSE_REGEX: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"\s+").unwrap());

const DATE_FORMAT: &str = "%d.%m.%Y";

/// Where the access date of an undated URL entry comes from.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AccessDate {
    /// A date supplied by the caller.
    Fixed(NaiveDate),
    /// The local date at the time of the run.
    Today,
}

impl AccessDate {
    fn resolve(&self) -> NaiveDate {
        match self {
            AccessDate::Fixed(date) => *date,
            AccessDate::Today => Local::now().date_naive(),
        }
    }
}

/// One reference list entry.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ReferenceEntry {
    /// Block index in the story.
    pub index: usize,

    /// Entry number (after normalization, or as found when inspecting).
    pub number: Option<usize>,

    pub description: String,
    pub url: Option<String>,

    /// Access date as written, `DD.MM.YYYY`.
    pub accessed: Option<String>,

    /// Whether the access date came from the caller rather than the entry.
    pub date_assigned: bool,
}

/// Outcome of a normalization pass.
#[derive(Debug, Clone, Serialize)]
pub struct BibliographyReport {
    pub section: Section,
    pub entries: Vec<ReferenceEntry>,

    /// Block indices left untouched because no description was recognized.
    pub flagged: Vec<usize>,

    /// Number of blocks whose text changed.
    pub changed: usize,
}

/// An entry split into its parts.
#[derive(Debug, Clone, PartialEq, Eq)]
struct ParsedEntry {
    description: String,
    url: Option<String>,
    after: String,
    accessed: Option<String>,
}

/// Rewrites reference list entries into one canonical form.
#[derive(Debug, Clone)]
pub struct BibliographyNormalizer {
    heading: Regex,
    label: String,
    date_regex: Regex,
    annotation_regex: Regex,
    access_date: AccessDate,
}

impl BibliographyNormalizer {
    /// Create a normalizer from configuration.
    ///
    /// Undated URL entries get the configured date, or today when none is set.
    pub fn from_config(config: &BibliographyConfig) -> Result<Self> {
        let heading = Regex::new(&config.heading).map_err(|e| {
            Error::ConfigError(format!("Invalid bibliography heading {:?}: {}", config.heading, e))
        })?;

        let label = regex::escape(config.access_label.trim());
        let date_regex = Regex::new(&format!(
            r"(?i)\(\s*{label}\s*:?\s*(\d{{2}}\.\d{{2}}\.\d{{4}})\s*\)"
        ))
        .map_err(|e| Error::ConfigError(e.to_string()))?;
        let annotation_regex = Regex::new(&format!(r"(?i)\(\s*{label}[^)]*\)\.?"))
            .map_err(|e| Error::ConfigError(e.to_string()))?;

        let access_date = config
            .access_date
            .map(AccessDate::Fixed)
            .unwrap_or(AccessDate::Today);

        Ok(Self {
            heading,
            label: config.access_label.trim().to_string(),
            date_regex,
            annotation_regex,
            access_date,
        })
    }

    /// Override where undated entries take their access date from.
    pub fn with_access_date(mut self, access_date: AccessDate) -> Self {
        self.access_date = access_date;
        self
    }

    /// Predicate locating the reference list heading.
    pub fn heading_predicate(&self) -> HeadingPredicate {
        HeadingPredicate::from_regex(self.heading.clone()).at_depth(1)
    }

    /// Locate the reference list. Its last occurrence wins, so a plain-text
    /// table of contents before it is skipped.
    pub fn find_section(&self, blocks: &[Block], outline: &Outline) -> Result<Section> {
        let predicate = self.heading_predicate();
        outline
            .require(blocks, &predicate)?
            .pop()
            .ok_or_else(|| Error::NotFound("reference list".to_string()))
    }

    /// Normalize the reference list of a document body.
    pub fn normalize_document(&self, doc: &mut Document, outline: &Outline) -> Result<BibliographyReport> {
        let section = self.find_section(&doc.body, outline)?;
        self.normalize_section(&mut doc.body, &section)
    }

    /// Normalize every non-empty block after the section heading.
    pub fn normalize_section(&self, blocks: &mut [Block], section: &Section) -> Result<BibliographyReport> {
        if section.end > blocks.len() || section.start >= section.end {
            return Err(Error::InvalidRange {
                start: section.start,
                end: section.end,
                len: blocks.len(),
            });
        }

        let mut report = BibliographyReport {
            section: section.clone(),
            entries: Vec::new(),
            flagged: Vec::new(),
            changed: 0,
        };
        let mut number = 0;

        for index in section.body() {
            let original = blocks[index].text();
            let text = original.trim();
            if text.is_empty() {
                continue;
            }

            let Some(parsed) = self.parse_entry(text) else {
                log::warn!("Reference [{}] has no description, left unchanged: {:?}", index, text);
                report.flagged.push(index);
                continue;
            };

            number += 1;
            let (rendered, entry) = self.render(parsed, number, index);

            if rendered != original {
                log::info!("Reference [{}] -> {}", index, rendered);
                replace_text(blocks, index, &rendered)?;
                report.changed += 1;
            }
            report.entries.push(entry);
        }

        log::debug!(
            "Reference list: {} entries, {} changed, {} flagged",
            report.entries.len(),
            report.changed,
            report.flagged.len()
        );
        Ok(report)
    }

    /// Normalize a single entry text as entry number `number`.
    ///
    /// Returns `None` when no description remains after stripping numbers.
    pub fn normalize_entry(&self, text: &str, number: usize) -> Option<String> {
        let parsed = self.parse_entry(text.trim())?;
        Some(self.render(parsed, number, 0).0)
    }

    /// Read entries without changing them.
    pub fn inspect(&self, blocks: &[Block], section: &Section) -> Vec<ReferenceEntry> {
        let end = section.end.min(blocks.len());
        (section.start + 1..end)
            .filter_map(|index| {
                let text = blocks[index].text();
                let text = text.trim();
                let parsed = self.parse_entry(text)?;
                let number = FIRST_NUMBER_REGEX
                    .captures(text)
                    .and_then(|c| c[1].parse().ok());
                Some(ReferenceEntry {
                    index,
                    number,
                    description: parsed.description,
                    url: parsed.url,
                    accessed: parsed.accessed,
                    date_assigned: false,
                })
            })
            .collect()
    }

    fn parse_entry(&self, text: &str) -> Option<ParsedEntry> {
        let stripped = LEADING_NUMBERS_REGEX.replace(text, "");
        let stripped = stripped.trim();
        if stripped.is_empty() {
            return None;
        }

        let without_annotation = self.annotation_regex.replace_all(stripped, "");
        let Some(m) = URL_REGEX.find(&without_annotation) else {
            return Some(ParsedEntry {
                description: stripped.to_string(),
                url: None,
                after: String::new(),
                accessed: None,
            });
        };

        let accessed = self
            .date_regex
            .captures(stripped)
            .map(|c| c[1].to_string());

        let url = m.as_str().trim_end_matches(['.', ',']);
        let before = URL_LABEL_REGEX.replace(&without_annotation[..m.start()], "");
        let after = without_annotation[m.start() + url.len()..]
            .trim_start_matches(|c: char| matches!(c, '.' | ',' | ';') || c.is_whitespace())
            .trim_end()
            .trim_end_matches('.');

        Some(ParsedEntry {
            description: before.trim().to_string(),
            url: Some(url.to_string()),
            after: after.trim().to_string(),
            accessed,
        })
    }

    fn render(&self, parsed: ParsedEntry, number: usize, index: usize) -> (String, ReferenceEntry) {
        let ParsedEntry {
            description,
            url,
            after,
            accessed,
        } = parsed;

        let (text, accessed, date_assigned) = match url {
            Some(ref url) => {
                let (date, assigned) = match accessed {
                    Some(date) => (date, false),
                    None => (self.access_date.resolve().format(DATE_FORMAT).to_string(), true),
                };
                let mut text = format!(
                    "{}. {} URL: {} ({}: {}).",
                    number, description, url, self.label, date
                );
                if !after.is_empty() {
                    text.push_str(&format!(" {}.", after));
                }
                (text, Some(date), assigned)
            }
            None => (
                format!("{}. {}.", number, description.trim_end_matches('.')),
                None,
                false,
            ),
        };

        let text = REPEATED_PERIOD_REGEX.replace_all(&text, ".");
        let text = WHITESPACE_COLLAPSE_REGEX.replace_all(&text, " ").trim().to_string();

        let entry = ReferenceEntry {
            index,
            number: Some(number),
            description,
            url,
            accessed,
            date_assigned,
        };
        (text, entry)
    }
}
