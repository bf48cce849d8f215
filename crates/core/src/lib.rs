//! Core document model and editing passes for thesis documents:
//! section lookup, caption renumbering, reference list and dash
//! normalization, chapter conclusions.

pub mod audit;
pub mod bibliography;
pub mod caption;
pub mod conclusions;
pub mod config;
pub mod dashes;
pub mod error;
pub mod mutation;
pub mod outline;
pub mod types;

pub use audit::{audit, AuditReport};
pub use bibliography::{AccessDate, BibliographyNormalizer, BibliographyReport, ReferenceEntry};
pub use caption::{Caption, CaptionKind, CaptionNumberer, RenumberReport};
pub use conclusions::{ConclusionInserter, ConclusionReport};
pub use config::Config;
pub use dashes::{DashNormalizer, DashReport, DashSet};
pub use error::{Error, Result};
pub use mutation::{insert_before, replace_text, InsertionBatch};
pub use outline::{Heading, HeadingPredicate, Outline, Section};
pub use types::{
    Block, BlockOrigin, Document, Furniture, FurnitureKind, Run, StoryId, Table, TableCell, TableRow,
    DEFAULT_STYLE,
};
