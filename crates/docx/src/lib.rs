//! DOCX (Office Open XML) backend for the thesis document model.
//!
//! Loads a .docx package (a ZIP archive of XML parts) into a
//! [`thesis_core::Document`] and writes edits back, leaving everything the
//! edits did not touch as it was.

mod paragraph;
pub mod package;
mod styles;
mod xml;

pub use package::DocxPackage;
