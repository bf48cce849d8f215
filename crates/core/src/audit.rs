//! Read-only document audit.
//!
//! Reports what the editing passes would still find to fix.

use crate::bibliography::{BibliographyNormalizer, ReferenceEntry};
use crate::caption::{self, CaptionMatch};
use crate::config::Config;
use crate::dashes::{DashNormalizer, StoryDashes};
use crate::outline::{match_text, Outline};
use crate::types::{Document, StoryId};
use crate::Result;
use regex::Regex;
use serde::Serialize;
use std::sync::LazyLock;

/// Numbered chapters, the only top-level sections expected to end with conclusions.
static NUMBERED_CHAPTER_REGEX: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"(?i)^(?:розділ|chapter)\s+\d+").unwrap());

static CHAPTER_CONCLUSION_REGEX: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"(?i)^(?:висновки\s+до\s+розділу|conclusions?\s+(?:to|of)\s+chapter)").unwrap());

/// A caption-like block somewhere in the document.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct CaptionIssue {
    pub story: StoryId,
    pub index: usize,
    pub text: String,
}

#[derive(Debug, Clone, Default, Serialize)]
pub struct CaptionAudit {
    pub figures: usize,
    pub tables: usize,

    /// Captions whose separator is not yet `major.minor. `.
    pub unnormalized: Vec<CaptionIssue>,

    pub malformed: Vec<CaptionIssue>,
}

#[derive(Debug, Clone, Serialize)]
pub struct BibliographyAudit {
    pub heading: String,
    pub entries: usize,

    /// Entries with a URL and no well-formed access date.
    pub undated: Vec<ReferenceEntry>,
}

/// Everything the audit found.
#[derive(Debug, Clone, Default, Serialize)]
pub struct AuditReport {
    pub dashes: Vec<StoryDashes>,
    pub captions: CaptionAudit,

    /// Numbered chapters with no chapter conclusion.
    pub chapters_without_conclusions: Vec<String>,

    /// `None` when no reference list was found.
    pub bibliography: Option<BibliographyAudit>,
}

impl AuditReport {
    /// Whether any pass would still change the document.
    pub fn is_clean(&self) -> bool {
        self.dashes.is_empty()
            && self.captions.unnormalized.is_empty()
            && self.captions.malformed.is_empty()
            && self.chapters_without_conclusions.is_empty()
            && self.bibliography.as_ref().map_or(true, |b| b.undated.is_empty())
    }
}

/// Audit a document under the given configuration.
pub fn audit(doc: &Document, config: &Config) -> Result<AuditReport> {
    let outline = Outline::from_config(&config.outline)?;
    let dashes = DashNormalizer::from_config(&config.dashes);
    let bibliography = BibliographyNormalizer::from_config(&config.bibliography)?;

    let report = AuditReport {
        dashes: dashes.count(doc),
        captions: audit_captions(doc),
        chapters_without_conclusions: chapters_without_conclusions(doc, &outline),
        bibliography: bibliography.find_section(&doc.body, &outline).ok().map(|section| {
            let entries = bibliography.inspect(&doc.body, &section);
            BibliographyAudit {
                heading: section.heading.clone(),
                entries: entries.len(),
                undated: entries
                    .into_iter()
                    .filter(|e| e.url.is_some() && e.accessed.is_none())
                    .collect(),
            }
        }),
    };

    log::debug!(
        "Audit: {} stories with dashes, {} malformed captions",
        report.dashes.len(),
        report.captions.malformed.len()
    );
    Ok(report)
}

fn audit_captions(doc: &Document) -> CaptionAudit {
    let mut audit = CaptionAudit::default();

    for (story, blocks) in doc.stories() {
        for (index, block) in blocks.iter().enumerate() {
            let text = block.text();
            let issue = || CaptionIssue {
                story,
                index,
                text: text.trim().to_string(),
            };

            match caption::classify(&text) {
                Some(CaptionMatch::Caption(c)) => {
                    match c.kind {
                        caption::CaptionKind::Figure => audit.figures += 1,
                        caption::CaptionKind::Table => audit.tables += 1,
                    }
                    if caption::normalize_separator(&text).is_some() {
                        audit.unnormalized.push(issue());
                    }
                }
                Some(CaptionMatch::Malformed) => audit.malformed.push(issue()),
                None => {}
            }
        }
    }

    audit
}

fn chapters_without_conclusions(doc: &Document, outline: &Outline) -> Vec<String> {
    let headings = outline.headings(&doc.body);
    let chapters: Vec<_> = headings.iter().filter(|h| h.depth == 1).collect();

    chapters
        .iter()
        .enumerate()
        .filter(|(_, h)| NUMBERED_CHAPTER_REGEX.is_match(&h.text))
        .filter(|(i, h)| {
            let end = chapters.get(i + 1).map_or(doc.body.len(), |next| next.index);
            !doc.body[h.index + 1..end]
                .iter()
                .any(|b| CHAPTER_CONCLUSION_REGEX.is_match(&match_text(b)))
        })
        .map(|(_, h)| h.text.clone())
        .collect()
}
