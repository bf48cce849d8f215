//! Chapter conclusions.
//!
//! Inserts a titled block of paragraphs at the end of each configured
//! chapter. All positions are computed on the unmodified story and applied
//! as one [`InsertionBatch`].

use crate::config::ConclusionConfig;
use crate::mutation::InsertionBatch;
use crate::outline::{match_text, HeadingPredicate, Outline};
use crate::types::Block;
use crate::{Error, Result};
use serde::Serialize;

#[derive(Debug, Clone)]
struct Conclusion {
    predicate: HeadingPredicate,
    chapter: String,
    title: String,
    paragraphs: Vec<String>,
    heading_style: String,
    body_style: String,
    required: bool,
}

/// One inserted conclusion.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct InsertedConclusion {
    pub chapter: String,

    /// Index (before insertion) the conclusion was placed at.
    pub at: usize,

    pub blocks: usize,
}

#[derive(Debug, Clone, Default, Serialize)]
pub struct ConclusionReport {
    pub inserted: Vec<InsertedConclusion>,

    /// Titles already present in their chapter.
    pub skipped: Vec<String>,

    /// Chapter patterns that matched nothing.
    pub missing: Vec<String>,
}

/// Inserts configured conclusions at chapter ends.
#[derive(Debug, Clone, Default)]
pub struct ConclusionInserter {
    conclusions: Vec<Conclusion>,
}

impl ConclusionInserter {
    pub fn from_config(configs: &[ConclusionConfig]) -> Result<Self> {
        let conclusions = configs
            .iter()
            .map(|c| {
                if c.title.trim().is_empty() {
                    return Err(Error::ConfigError(format!(
                        "Conclusion for chapter {:?} has no title",
                        c.chapter
                    )));
                }
                Ok(Conclusion {
                    predicate: HeadingPredicate::new(&c.chapter)?.at_depth(1),
                    chapter: c.chapter.clone(),
                    title: c.title.trim().to_string(),
                    paragraphs: c.paragraphs.clone(),
                    heading_style: c.heading_style.clone(),
                    body_style: c.body_style.clone(),
                    required: c.required,
                })
            })
            .collect::<Result<Vec<_>>>()?;

        Ok(Self { conclusions })
    }

    pub fn is_empty(&self) -> bool {
        self.conclusions.is_empty()
    }

    /// Insert every conclusion whose chapter exists and lacks it.
    pub fn apply(&self, blocks: &mut Vec<Block>, outline: &Outline) -> Result<ConclusionReport> {
        let mut report = ConclusionReport::default();
        let mut batch = InsertionBatch::new();

        for conclusion in &self.conclusions {
            let Some(section) = outline.find_first(blocks, &conclusion.predicate) else {
                if conclusion.required {
                    return Err(Error::NotFound(format!("chapter {:?}", conclusion.chapter)));
                }
                log::warn!("Chapter {:?} not found, conclusion skipped", conclusion.chapter);
                report.missing.push(conclusion.chapter.clone());
                continue;
            };

            let present = blocks[section.body()]
                .iter()
                .any(|b| match_text(b).starts_with(&conclusion.title));
            if present {
                log::info!("{:?} already present in {:?}", conclusion.title, section.heading);
                report.skipped.push(conclusion.title.clone());
                continue;
            }

            let at = section.end;
            batch.insert_text(at, conclusion.title.clone(), conclusion.heading_style.clone());
            for paragraph in conclusion.paragraphs.iter().map(|p| p.trim()).filter(|p| !p.is_empty()) {
                batch.insert_text(at, paragraph, conclusion.body_style.clone());
            }
            batch.insert_text(at, "", conclusion.body_style.clone());

            log::info!("Conclusion {:?} goes before block {}", conclusion.title, at);
            report.inserted.push(InsertedConclusion {
                chapter: section.heading.clone(),
                at,
                blocks: conclusion.paragraphs.iter().filter(|p| !p.trim().is_empty()).count() + 2,
            });
        }

        batch.apply(blocks)?;
        Ok(report)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn config(chapter: &str, title: &str) -> ConclusionConfig {
        ConclusionConfig {
            chapter: chapter.to_string(),
            title: title.to_string(),
            paragraphs: vec!["Перший абзац.".to_string(), "  ".to_string(), "Другий абзац.".to_string()],
            ..ConclusionConfig::default()
        }
    }

    fn thesis() -> Vec<Block> {
        vec![
            Block::new("Heading 1", "РОЗДІЛ 1 АНАЛІЗ"),
            Block::new("Normal", "Текст 1."),
            Block::new("Heading 1", "РОЗДІЛ 2 ПРОЄКТУВАННЯ"),
            Block::new("Normal", "Текст 2."),
            Block::new("Heading 1", "ВИСНОВКИ"),
        ]
    }

    #[test]
    fn test_inserts_at_chapter_ends() {
        let inserter = ConclusionInserter::from_config(&[
            config("^РОЗДІЛ 1", "Висновки до розділу 1"),
            config("^РОЗДІЛ 2", "Висновки до розділу 2"),
        ])
        .unwrap();
        let mut blocks = thesis();
        let report = inserter.apply(&mut blocks, &Outline::new()).unwrap();

        let lines: Vec<String> = blocks.iter().map(Block::text).collect();
        assert_eq!(
            lines,
            vec![
                "РОЗДІЛ 1 АНАЛІЗ",
                "Текст 1.",
                "Висновки до розділу 1",
                "Перший абзац.",
                "Другий абзац.",
                "",
                "РОЗДІЛ 2 ПРОЄКТУВАННЯ",
                "Текст 2.",
                "Висновки до розділу 2",
                "Перший абзац.",
                "Другий абзац.",
                "",
                "ВИСНОВКИ",
            ]
        );
        assert_eq!(blocks[2].style, "Heading 3");
        assert_eq!(blocks[3].style, "Normal");
        assert_eq!(report.inserted.len(), 2);
        assert_eq!(report.inserted[0].at, 2);
        assert_eq!(report.inserted[0].blocks, 4);
    }

    #[test]
    fn test_inserts_after_sentences_mentioning_chapters() {
        let inserter =
            ConclusionInserter::from_config(&[config("^РОЗДІЛ 1", "Висновки до розділу 1")]).unwrap();
        let mut blocks = vec![
            Block::new("Normal", "РОЗДІЛ 1 АНАЛІЗ"),
            Block::new("Normal", "Текст 1."),
            Block::new("Normal", "Додатково було реалізовано кешування запитів."),
            Block::new("Normal", "Розділ 2 присвячено проєктуванню."),
            Block::new("Normal", "РОЗДІЛ 2 ПРОЄКТУВАННЯ"),
        ];
        let report = inserter.apply(&mut blocks, &Outline::new()).unwrap();

        assert_eq!(report.inserted[0].at, 4);
        assert_eq!(blocks[4].text(), "Висновки до розділу 1");
        assert_eq!(blocks[8].text(), "РОЗДІЛ 2 ПРОЄКТУВАННЯ");
    }

    #[test]
    fn test_second_run_is_a_no_op() {
        let inserter =
            ConclusionInserter::from_config(&[config("^РОЗДІЛ 1", "Висновки до розділу 1")]).unwrap();
        let mut blocks = thesis();
        inserter.apply(&mut blocks, &Outline::new()).unwrap();
        let len = blocks.len();

        let report = inserter.apply(&mut blocks, &Outline::new()).unwrap();
        assert_eq!(blocks.len(), len);
        assert_eq!(report.skipped, vec!["Висновки до розділу 1"]);
    }

    #[test]
    fn test_missing_chapter() {
        let mut optional = config("^РОЗДІЛ 9", "Висновки до розділу 9");
        let inserter = ConclusionInserter::from_config(&[optional.clone()]).unwrap();
        let report = inserter.apply(&mut thesis(), &Outline::new()).unwrap();
        assert_eq!(report.missing, vec!["^РОЗДІЛ 9"]);

        optional.required = true;
        let inserter = ConclusionInserter::from_config(&[optional]).unwrap();
        assert!(matches!(
            inserter.apply(&mut thesis(), &Outline::new()),
            Err(Error::NotFound(_))
        ));
    }

    #[test]
    fn test_title_required() {
        assert!(ConclusionInserter::from_config(&[config("^РОЗДІЛ 1", " ")]).is_err());
    }
}
