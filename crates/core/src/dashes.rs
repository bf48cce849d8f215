//! Dash normalization.
//!
//! Long dashes are replaced with a plain hyphen run by run, so character
//! formatting survives. Captions are the exception: their separator is
//! rewritten as a period (`Рисунок 3.1 – Опис` becomes `Рисунок 3.1. Опис`).

use crate::caption;
use crate::config::DashConfig;
use crate::mutation::replace_text;
use crate::types::{Block, Document, StoryId};
use crate::Result;
use serde::{Deserialize, Serialize};

/// Em dash, en dash, figure dash, horizontal bar.
const LONG_DASHES: &[char] = &['\u{2014}', '\u{2013}', '\u{2012}', '\u{2015}'];

/// Long dashes plus hyphen, non-breaking hyphen and minus sign.
const ALL_DASHES: &[char] = &[
    '\u{2014}', '\u{2013}', '\u{2012}', '\u{2015}', // Long dashes
    '\u{2010}', '\u{2011}', '\u{2212}', // Hyphen variants
];

/// Which characters count as dashes.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum DashSet {
    #[default]
    Long,
    All,
}

impl DashSet {
    pub fn chars(&self) -> &'static [char] {
        match self {
            DashSet::Long => LONG_DASHES,
            DashSet::All => ALL_DASHES,
        }
    }

    pub fn count(&self, text: &str) -> usize {
        text.chars().filter(|c| self.chars().contains(c)).count()
    }
}

/// Replace every dash of `set` with '-'. Returns the new text and the count.
pub fn replace_dashes(text: &str, set: DashSet) -> (String, usize) {
    let mut count = 0;
    let replaced = text
        .chars()
        .map(|c| {
            if set.chars().contains(&c) {
                count += 1;
                '-'
            } else {
                c
            }
        })
        .collect();
    (replaced, count)
}

/// Counts for one story.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct StoryDashes {
    pub story: StoryId,
    pub dashes: usize,
}

/// Outcome of a dash normalization pass.
#[derive(Debug, Clone, Default, Serialize)]
pub struct DashReport {
    /// Dash characters replaced.
    pub replaced: usize,

    /// Captions whose separator was rewritten.
    pub captions_fixed: usize,

    /// Stories where anything was replaced.
    pub stories: Vec<StoryDashes>,
}

/// Normalizes dashes across every story of a document.
#[derive(Debug, Clone, Default)]
pub struct DashNormalizer {
    set: DashSet,
}

impl DashNormalizer {
    pub fn new(set: DashSet) -> Self {
        Self { set }
    }

    pub fn from_config(config: &DashConfig) -> Self {
        Self::new(config.set)
    }

    /// Normalize body, table cells, headers and footers.
    pub fn normalize_document(&self, doc: &mut Document) -> Result<DashReport> {
        let mut report = DashReport::default();

        for (story, blocks) in doc.stories_mut() {
            let (replaced, captions_fixed) = self.normalize_blocks(blocks)?;
            if replaced > 0 || captions_fixed > 0 {
                log::debug!("{}: {} dashes, {} captions", story, replaced, captions_fixed);
                report.stories.push(StoryDashes {
                    story,
                    dashes: replaced,
                });
            }
            report.replaced += replaced;
            report.captions_fixed += captions_fixed;
        }

        Ok(report)
    }

    /// Normalize one story. Returns (dashes replaced, captions fixed).
    pub fn normalize_blocks(&self, blocks: &mut [Block]) -> Result<(usize, usize)> {
        let mut replaced = 0;
        let mut captions_fixed = 0;

        for index in 0..blocks.len() {
            let text = blocks[index].text();

            if caption::parse(&text).is_some() {
                let (dashless, count) = replace_dashes(&text, self.set);
                let fixed = caption::normalize_separator(&dashless).unwrap_or(dashless);
                if fixed != text {
                    replace_text(blocks, index, &fixed)?;
                    captions_fixed += 1;
                    replaced += count;
                }
                continue;
            }

            for run in &mut blocks[index].runs {
                let (new_text, count) = replace_dashes(&run.text, self.set);
                if count > 0 {
                    run.text = new_text;
                    replaced += count;
                }
            }
        }

        Ok((replaced, captions_fixed))
    }

    /// Remaining dashes per story, without changing anything.
    pub fn count(&self, doc: &Document) -> Vec<StoryDashes> {
        doc.stories()
            .into_iter()
            .map(|(story, blocks)| StoryDashes {
                story,
                dashes: blocks.iter().map(|b| self.set.count(&b.text())).sum(),
            })
            .filter(|s| s.dashes > 0)
            .collect()
    }
}
