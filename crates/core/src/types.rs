//! Domain types for representing an editable document.

use regex::Regex;
use serde::{Deserialize, Serialize};
use std::sync::LazyLock;

/// Matches built-in heading style names in English and Ukrainian Word installs.
static HEADING_STYLE_REGEX: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"(?i)^\s*(?:heading|заголовок)\s*(\d)\s*$").unwrap());

/// Style label given to blocks whose paragraph carries no explicit style.
pub const DEFAULT_STYLE: &str = "Normal";

/// A whole document as an ordered set of stories.
///
/// The body is the main story. Table cells, headers and footers are
/// separate stories with their own block sequences.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Document {
    /// Top-level paragraphs of the main story, in document order.
    pub body: Vec<Block>,

    /// Top-level tables of the main story, in document order.
    pub tables: Vec<Table>,

    /// Header and footer stories.
    pub furniture: Vec<Furniture>,
}

impl Document {
    /// Create a document whose body holds the given blocks.
    pub fn from_blocks(body: Vec<Block>) -> Self {
        Self {
            body,
            ..Self::default()
        }
    }

    /// Create a body-only document with one default-styled block per line.
    pub fn from_lines<I, S>(lines: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self::from_blocks(lines.into_iter().map(|l| Block::new(DEFAULT_STYLE, l)).collect())
    }

    /// Body text lines, one per block.
    pub fn body_lines(&self) -> Vec<String> {
        self.body.iter().map(Block::text).collect()
    }

    /// All stories with their identifiers, body first.
    pub fn stories(&self) -> Vec<(StoryId, &[Block])> {
        let mut stories: Vec<(StoryId, &[Block])> = vec![(StoryId::Body, self.body.as_slice())];
        for (t, table) in self.tables.iter().enumerate() {
            for (r, row) in table.rows.iter().enumerate() {
                for (c, cell) in row.cells.iter().enumerate() {
                    stories.push((StoryId::Cell { table: t, row: r, cell: c }, cell.blocks.as_slice()));
                }
            }
        }
        for (i, part) in self.furniture.iter().enumerate() {
            stories.push((StoryId::Furniture(i), part.blocks.as_slice()));
        }
        stories
    }

    /// All stories, mutably, body first.
    pub fn stories_mut(&mut self) -> Vec<(StoryId, &mut Vec<Block>)> {
        let mut stories = vec![(StoryId::Body, &mut self.body)];
        for (t, table) in self.tables.iter_mut().enumerate() {
            for (r, row) in table.rows.iter_mut().enumerate() {
                for (c, cell) in row.cells.iter_mut().enumerate() {
                    stories.push((StoryId::Cell { table: t, row: r, cell: c }, &mut cell.blocks));
                }
            }
        }
        for (i, part) in self.furniture.iter_mut().enumerate() {
            stories.push((StoryId::Furniture(i), &mut part.blocks));
        }
        stories
    }
}

/// Identifies one story of a document.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum StoryId {
    /// The main story.
    Body,
    /// One cell of a top-level table.
    Cell { table: usize, row: usize, cell: usize },
    /// A header or footer, by position in `Document::furniture`.
    Furniture(usize),
}

impl std::fmt::Display for StoryId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            StoryId::Body => write!(f, "body"),
            StoryId::Cell { table, row, cell } => {
                write!(f, "table {} row {} cell {}", table + 1, row + 1, cell + 1)
            }
            StoryId::Furniture(i) => write!(f, "header/footer {}", i + 1),
        }
    }
}

/// Opaque handle assigned by the document backend to blocks it loaded.
///
/// Blocks created by the editing operations carry no origin.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct BlockOrigin(pub usize);

/// One paragraph-like unit of text with a style label.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Block {
    /// Resolved style name, e.g. "Heading 1" or "Normal".
    pub style: String,

    /// Character runs, in reading order.
    pub runs: Vec<Run>,

    /// Backend handle, if the block was loaded from a file.
    pub origin: Option<BlockOrigin>,
}

impl Block {
    /// Create a new block with a single run.
    pub fn new(style: impl Into<String>, text: impl Into<String>) -> Self {
        let text = text.into();
        let runs = if text.is_empty() {
            Vec::new()
        } else {
            vec![Run::new(text)]
        };
        Self {
            style: style.into(),
            runs,
            origin: None,
        }
    }

    /// Create a block from pre-split runs.
    pub fn with_runs(style: impl Into<String>, runs: Vec<Run>) -> Self {
        Self {
            style: style.into(),
            runs,
            origin: None,
        }
    }

    /// Attach a backend handle.
    pub fn with_origin(mut self, origin: BlockOrigin) -> Self {
        self.origin = Some(origin);
        self
    }

    /// Full text of the block.
    pub fn text(&self) -> String {
        self.runs.iter().map(|r| r.text.as_str()).collect()
    }

    /// Whether the block holds only whitespace.
    pub fn is_blank(&self) -> bool {
        self.runs.iter().all(|r| r.text.trim().is_empty())
    }

    /// Heading level derived from the style name, if it is a heading style.
    pub fn heading_level(&self) -> Option<usize> {
        HEADING_STYLE_REGEX
            .captures(&self.style)
            .and_then(|c| c[1].parse().ok())
    }
}

/// A run of text sharing one character format.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Run {
    pub text: String,
}

impl Run {
    pub fn new(text: impl Into<String>) -> Self {
        Self { text: text.into() }
    }
}

/// A top-level table.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Table {
    pub rows: Vec<TableRow>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct TableRow {
    pub cells: Vec<TableCell>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct TableCell {
    pub blocks: Vec<Block>,
}

/// Kind of a header/footer story.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum FurnitureKind {
    Header,
    Footer,
}

/// A header or footer story.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Furniture {
    pub kind: FurnitureKind,

    /// Package part the story was loaded from, e.g. "word/header1.xml".
    pub part: String,

    pub blocks: Vec<Block>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_block_text_joins_runs() {
        let block = Block::with_runs("Normal", vec![Run::new("Рисунок "), Run::new("3.1")]);
        assert_eq!(block.text(), "Рисунок 3.1");
    }

    #[test]
    fn test_empty_block_has_no_runs() {
        let block = Block::new("Normal", "");
        assert!(block.runs.is_empty());
        assert!(block.is_blank());
    }

    #[test]
    fn test_heading_level() {
        assert_eq!(Block::new("Heading 1", "").heading_level(), Some(1));
        assert_eq!(Block::new("heading 3", "").heading_level(), Some(3));
        assert_eq!(Block::new("Заголовок 2", "").heading_level(), Some(2));
        assert_eq!(Block::new("Normal", "").heading_level(), None);
        assert_eq!(Block::new("Heading 1 Char", "").heading_level(), None);
    }

    #[test]
    fn test_stories_order() {
        let mut doc = Document::from_lines(["a"]);
        doc.tables.push(Table {
            rows: vec![TableRow {
                cells: vec![TableCell::default(), TableCell::default()],
            }],
        });
        doc.furniture.push(Furniture {
            kind: FurnitureKind::Footer,
            part: "word/footer1.xml".to_string(),
            blocks: Vec::new(),
        });

        let ids: Vec<StoryId> = doc.stories().into_iter().map(|(id, _)| id).collect();
        assert_eq!(
            ids,
            vec![
                StoryId::Body,
                StoryId::Cell { table: 0, row: 0, cell: 0 },
                StoryId::Cell { table: 0, row: 0, cell: 1 },
                StoryId::Furniture(0),
            ]
        );
        assert_eq!(doc.stories_mut().len(), 4);
    }
}
