//! DOCX package loading and saving.

use crate::paragraph::{apply_block, new_paragraph, to_block};
use crate::styles::StyleMap;
use crate::xml::{self, Element, Node};
use std::collections::HashMap;
use std::fs::{self, File};
use std::io::{BufReader, Cursor, Read, Seek, Write};
use std::path::{Path, PathBuf};
use thesis_core::{
    Block, BlockOrigin, Document, Error, Furniture, FurnitureKind, Result, StoryId, Table, TableCell,
    TableRow,
};
use zip::write::FileOptions;
use zip::{CompressionMethod, ZipArchive, ZipWriter};

const DOCUMENT_PART: &str = "word/document.xml";
const STYLES_PART: &str = "word/styles.xml";

/// A raw archive entry.
#[derive(Debug, Clone)]
struct Entry {
    name: String,
    data: Vec<u8>,
}

/// A parsed XML part holding one or more stories.
#[derive(Debug, Clone)]
struct XmlPart {
    name: String,
    nodes: Vec<Node>,
}

/// A paragraph loaded from the package, addressed by its [`BlockOrigin`].
#[derive(Debug, Clone)]
struct LoadedParagraph {
    element: Element,
    story: StoryId,
    block: Block,
}

/// An opened .docx package.
///
/// The package keeps every archive entry in memory. [`DocxPackage::document`]
/// hands out an editable [`Document`]; [`DocxPackage::save`] writes it back,
/// rewriting only the paragraphs whose text or style changed.
#[derive(Debug, Clone)]
pub struct DocxPackage {
    entries: Vec<Entry>,
    document_part: XmlPart,
    furniture_parts: Vec<XmlPart>,
    paragraphs: Vec<LoadedParagraph>,
    styles: StyleMap,
    document: Document,
}

impl DocxPackage {
    /// Open a .docx file.
    pub fn open(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        log::info!("Opening {}", path.display());
        let file = File::open(path)?;
        Self::from_reader(BufReader::new(file))
    }

    /// Read a package from any seekable source.
    pub fn from_reader<R: Read + Seek>(reader: R) -> Result<Self> {
        let mut archive =
            ZipArchive::new(reader).map_err(|e| Error::ZipError(format!("Failed to open ZIP: {}", e)))?;

        let mut entries = Vec::with_capacity(archive.len());
        for i in 0..archive.len() {
            let mut file = archive
                .by_index(i)
                .map_err(|e| Error::ZipError(format!("Failed to read entry {}: {}", i, e)))?;
            let mut data = Vec::with_capacity(file.size() as usize);
            file.read_to_end(&mut data)
                .map_err(|e| Error::ZipError(format!("Failed to read '{}': {}", file.name(), e)))?;
            entries.push(Entry {
                name: file.name().to_string(),
                data,
            });
        }

        Self::from_entries(entries)
    }

    fn from_entries(entries: Vec<Entry>) -> Result<Self> {
        let styles = match entries.iter().find(|e| e.name == STYLES_PART) {
            Some(entry) => StyleMap::parse(part_text(entry)?)?,
            None => {
                log::warn!("{} missing, using default style names", STYLES_PART);
                StyleMap::default()
            }
        };

        let entry = entries
            .iter()
            .find(|e| e.name == DOCUMENT_PART)
            .ok_or_else(|| Error::CorruptedFile(format!("{} not found", DOCUMENT_PART)))?;

        let mut loader = Loader {
            styles: &styles,
            paragraphs: Vec::new(),
        };

        let mut document_part = XmlPart {
            name: entry.name.clone(),
            nodes: xml::parse(part_text(entry)?)?,
        };
        let body = find_body(&mut document_part.nodes)?;
        let body_blocks = loader.take_story(body, StoryId::Body);
        let tables = loader.take_tables(body);

        let mut furniture_entries: Vec<(&Entry, FurnitureKind)> = entries
            .iter()
            .filter_map(|e| furniture_kind(&e.name).map(|kind| (e, kind)))
            .collect();
        furniture_entries.sort_by(|a, b| a.0.name.cmp(&b.0.name));

        let mut furniture_parts = Vec::with_capacity(furniture_entries.len());
        let mut furniture = Vec::with_capacity(furniture_entries.len());
        for (i, (entry, kind)) in furniture_entries.into_iter().enumerate() {
            let mut nodes = xml::parse(part_text(entry)?)?;
            let Some(root) = xml_root(&mut nodes) else {
                log::warn!("{} has no root element, skipped", entry.name);
                continue;
            };
            let blocks = loader.take_story(root, StoryId::Furniture(furniture.len()));
            log::debug!("{} [{}]: {} blocks", entry.name, i, blocks.len());
            furniture.push(Furniture {
                kind,
                part: entry.name.clone(),
                blocks,
            });
            furniture_parts.push(XmlPart {
                name: entry.name.clone(),
                nodes,
            });
        }

        let document = Document {
            body: body_blocks,
            tables,
            furniture,
        };
        log::info!(
            "Loaded {} body blocks, {} tables, {} headers/footers",
            document.body.len(),
            document.tables.len(),
            document.furniture.len()
        );

        let paragraphs = loader.paragraphs;
        Ok(Self {
            entries,
            document_part,
            furniture_parts,
            paragraphs,
            styles,
            document,
        })
    }

    /// The document as loaded.
    pub fn document(&self) -> Document {
        self.document.clone()
    }

    /// Write `document` to `path` through a temporary sibling file.
    ///
    /// `path` may be the file the package was opened from.
    pub fn save(&self, document: &Document, path: impl AsRef<Path>) -> Result<()> {
        let path = path.as_ref();
        let bytes = self.to_bytes(document)?;

        let temp = temp_path(path);
        fs::write(&temp, &bytes)?;
        if let Err(e) = fs::rename(&temp, path) {
            let _ = fs::remove_file(&temp);
            return Err(e.into());
        }

        log::info!("Saved {} ({} bytes)", path.display(), bytes.len());
        Ok(())
    }

    /// Serialize the package with `document` applied.
    pub fn to_bytes(&self, document: &Document) -> Result<Vec<u8>> {
        let mut rendered: HashMap<&str, Vec<u8>> = HashMap::new();

        let mut nodes = self.document_part.nodes.clone();
        let body = find_body(&mut nodes)?;
        let mut dirty = self.restore(body, Some(&document.body), StoryId::Body);
        for (t, table) in top_level_tables(body).enumerate() {
            for (r, row) in table.elements_mut().filter(|e| e.is(b"tr")).enumerate() {
                for (c, cell) in row.elements_mut().filter(|e| e.is(b"tc")).enumerate() {
                    let blocks = document
                        .tables
                        .get(t)
                        .and_then(|table| table.rows.get(r))
                        .and_then(|row| row.cells.get(c))
                        .map(|cell| cell.blocks.as_slice());
                    let story = StoryId::Cell {
                        table: t,
                        row: r,
                        cell: c,
                    };
                    dirty |= self.restore(cell, blocks, story);
                }
            }
        }
        if dirty {
            rendered.insert(&self.document_part.name, xml::write(&nodes)?);
        }

        for (i, part) in self.furniture_parts.iter().enumerate() {
            let mut nodes = part.nodes.clone();
            let Some(root) = xml_root(&mut nodes) else {
                continue;
            };
            let blocks = document
                .furniture
                .iter()
                .find(|f| f.part == part.name)
                .map(|f| f.blocks.as_slice());
            if self.restore(root, blocks, StoryId::Furniture(i)) {
                rendered.insert(&part.name, xml::write(&nodes)?);
            }
        }

        log::debug!("Rewriting {} parts", rendered.len());

        let mut zip = ZipWriter::new(Cursor::new(Vec::new()));
        let options = FileOptions::default().compression_method(CompressionMethod::Deflated);
        for entry in &self.entries {
            if entry.name.ends_with('/') {
                zip.add_directory(entry.name.as_str(), options)
                    .map_err(|e| Error::ZipError(format!("Failed to write '{}': {}", entry.name, e)))?;
                continue;
            }
            zip.start_file(entry.name.as_str(), options)
                .map_err(|e| Error::ZipError(format!("Failed to write '{}': {}", entry.name, e)))?;
            let data = rendered
                .get(entry.name.as_str())
                .map_or(entry.data.as_slice(), Vec::as_slice);
            zip.write_all(data)?;
        }
        let cursor = zip
            .finish()
            .map_err(|e| Error::ZipError(format!("Failed to finish ZIP: {}", e)))?;

        Ok(cursor.into_inner())
    }

    /// Put paragraphs back into `container` as `blocks` describe them.
    ///
    /// Blocks without an origin from this story are new and go before the
    /// next loaded block, or at the end of the story. Loaded paragraphs
    /// missing from `blocks` are dropped. With `blocks` absent the story is
    /// restored unchanged. Returns whether anything differs from the original.
    fn restore(&self, container: &mut Element, blocks: Option<&[Block]>, story: StoryId) -> bool {
        let Some(blocks) = blocks else {
            for child in container.children.iter_mut() {
                if let Node::Paragraph(id) = *child {
                    if let Some(loaded) = self.paragraphs.get(id) {
                        *child = Node::Element(loaded.element.clone());
                    }
                }
            }
            return false;
        };

        let mut kept: HashMap<usize, &Block> = HashMap::new();
        let mut before: HashMap<usize, Vec<&Block>> = HashMap::new();
        let mut pending: Vec<&Block> = Vec::new();
        for block in blocks {
            let origin = block
                .origin
                .map(|BlockOrigin(id)| id)
                .filter(|id| self.paragraphs.get(*id).is_some_and(|p| p.story == story))
                .filter(|id| !kept.contains_key(id));
            match origin {
                Some(id) => {
                    before.insert(id, std::mem::take(&mut pending));
                    kept.insert(id, block);
                }
                None => pending.push(block),
            }
        }

        let children = std::mem::take(&mut container.children);
        let len = children.len();
        let tail = match story {
            StoryId::Body => children
                .iter()
                .rposition(|n| n.is_element(b"sectPr"))
                .unwrap_or(len),
            _ => len,
        };

        let mut dirty = false;
        let mut restored = Vec::with_capacity(children.len() + pending.len());
        for (i, child) in children.into_iter().enumerate() {
            if i == tail {
                dirty |= self.push_new(&mut restored, &pending);
            }
            let Node::Paragraph(id) = child else {
                restored.push(child);
                continue;
            };
            let Some(loaded) = self.paragraphs.get(id) else {
                continue;
            };

            if let Some(new_blocks) = before.get(&id) {
                dirty |= self.push_new(&mut restored, new_blocks);
            }

            match kept.get(&id) {
                Some(block) => {
                    let mut element = loaded.element.clone();
                    if block.style != loaded.block.style || block.runs != loaded.block.runs {
                        apply_block(&mut element, &loaded.block, block, &self.styles);
                        dirty = true;
                    }
                    restored.push(Node::Element(element));
                }
                None => {
                    log::debug!("{}: dropping paragraph {:?}", story, loaded.block.text());
                    dirty = true;
                }
            }
        }
        if tail == len {
            dirty |= self.push_new(&mut restored, &pending);
        }

        if matches!(story, StoryId::Cell { .. }) && !restored.iter().any(|n| n.is_element(b"p")) {
            restored.push(Node::Element(Element::new("w:p")));
        }

        container.children = restored;
        dirty
    }

    fn push_new(&self, nodes: &mut Vec<Node>, blocks: &[&Block]) -> bool {
        for block in blocks {
            nodes.push(Node::Element(new_paragraph(block, &self.styles)));
        }
        !blocks.is_empty()
    }
}

/// Collects blocks while moving paragraphs out of the tree.
struct Loader<'a> {
    styles: &'a StyleMap,
    paragraphs: Vec<LoadedParagraph>,
}

impl Loader<'_> {
    /// Replace the `w:p` children of `container` with arena placeholders.
    fn take_story(&mut self, container: &mut Element, story: StoryId) -> Vec<Block> {
        let mut blocks = Vec::new();

        for child in container.children.iter_mut() {
            if !child.is_element(b"p") {
                continue;
            }
            let id = self.paragraphs.len();
            let Node::Element(element) = std::mem::replace(child, Node::Paragraph(id)) else {
                continue;
            };
            let block = to_block(&element, self.styles).with_origin(BlockOrigin(id));
            blocks.push(block.clone());
            self.paragraphs.push(LoadedParagraph {
                element,
                story,
                block,
            });
        }

        blocks
    }

    fn take_tables(&mut self, body: &mut Element) -> Vec<Table> {
        let mut tables = Vec::new();

        for (t, table) in top_level_tables(body).enumerate() {
            let mut rows = Vec::new();
            for (r, row) in table.elements_mut().filter(|e| e.is(b"tr")).enumerate() {
                let mut cells = Vec::new();
                for (c, cell) in row.elements_mut().filter(|e| e.is(b"tc")).enumerate() {
                    let story = StoryId::Cell {
                        table: t,
                        row: r,
                        cell: c,
                    };
                    cells.push(TableCell {
                        blocks: self.take_story(cell, story),
                    });
                }
                rows.push(TableRow { cells });
            }
            tables.push(Table { rows });
        }

        tables
    }
}

fn top_level_tables(body: &mut Element) -> impl Iterator<Item = &mut Element> {
    body.elements_mut().filter(|e| e.is(b"tbl"))
}

fn xml_root(nodes: &mut [Node]) -> Option<&mut Element> {
    nodes.iter_mut().find_map(|n| match n {
        Node::Element(e) => Some(e),
        _ => None,
    })
}

fn find_body(nodes: &mut [Node]) -> Result<&mut Element> {
    xml::find_mut(nodes, b"document")
        .and_then(|document| document.child_mut(b"body"))
        .ok_or_else(|| Error::CorruptedFile(format!("{} has no w:body", DOCUMENT_PART)))
}

fn part_text(entry: &Entry) -> Result<&str> {
    std::str::from_utf8(&entry.data)
        .map(|text| text.trim_start_matches('\u{feff}'))
        .map_err(|e| Error::CorruptedFile(format!("{} is not UTF-8: {}", entry.name, e)))
}

fn furniture_kind(name: &str) -> Option<FurnitureKind> {
    let file = name.strip_prefix("word/")?.strip_suffix(".xml")?;
    let (kind, number) = if let Some(number) = file.strip_prefix("header") {
        (FurnitureKind::Header, number)
    } else if let Some(number) = file.strip_prefix("footer") {
        (FurnitureKind::Footer, number)
    } else {
        return None;
    };
    number.chars().all(|c| c.is_ascii_digit()).then_some(kind)
}

fn temp_path(path: &Path) -> PathBuf {
    let name = path
        .file_name()
        .map(|n| n.to_string_lossy().into_owned())
        .unwrap_or_else(|| "document.docx".to_string());
    path.with_file_name(format!(".{}.tmp", name))
}

#[cfg(test)]
mod tests {
    use super::*;
    use thesis_core::{insert_before, replace_text, DashNormalizer, DashSet};

    const CONTENT_TYPES: &str = r#"<?xml version="1.0" encoding="UTF-8" standalone="yes"?><Types xmlns="http://schemas.openxmlformats.org/package/2006/content-types"><Default Extension="xml" ContentType="application/xml"/></Types>"#;

    const STYLES: &str = r#"<?xml version="1.0" encoding="UTF-8" standalone="yes"?><w:styles xmlns:w="http://schemas.openxmlformats.org/wordprocessingml/2006/main"><w:style w:type="paragraph" w:default="1" w:styleId="Normal"><w:name w:val="Normal"/></w:style><w:style w:type="paragraph" w:styleId="Heading1"><w:name w:val="heading 1"/></w:style><w:style w:type="paragraph" w:styleId="Heading3"><w:name w:val="heading 3"/></w:style></w:styles>"#;

    const DOCUMENT: &str = r#"<?xml version="1.0" encoding="UTF-8" standalone="yes"?>
<w:document xmlns:w="http://schemas.openxmlformats.org/wordprocessingml/2006/main" xmlns:r="http://schemas.openxmlformats.org/officeDocument/2006/relationships"><w:body>
<w:p><w:pPr><w:pStyle w:val="Heading1"/></w:pPr><w:r><w:t>РОЗДІЛ 1 АНАЛІЗ</w:t></w:r></w:p>
<w:p><w:r><w:rPr><w:b/></w:rPr><w:t xml:space="preserve">Рисунок 1.1 </w:t></w:r><w:r><w:t>– Схема</w:t></w:r></w:p>
<w:tbl><w:tr><w:tc><w:p><w:r><w:t>1–2</w:t></w:r></w:p></w:tc><w:tc><w:p><w:r><w:t>Клітинка</w:t></w:r></w:p></w:tc></w:tr></w:tbl>
<w:p><w:hyperlink r:id="rId5"><w:r><w:t>https://example.com</w:t></w:r></w:hyperlink></w:p>
<w:sectPr><w:pgSz w:w="11906" w:h="16838"/></w:sectPr>
</w:body></w:document>"#;

    const FOOTER: &str = r#"<?xml version="1.0" encoding="UTF-8" standalone="yes"?><w:ftr xmlns:w="http://schemas.openxmlformats.org/wordprocessingml/2006/main"><w:p><w:r><w:t>Київ — 2025</w:t></w:r></w:p></w:ftr>"#;

    fn build_docx() -> Vec<u8> {
        let mut zip = ZipWriter::new(Cursor::new(Vec::new()));
        let options = FileOptions::default();
        for (name, content) in [
            ("[Content_Types].xml", CONTENT_TYPES),
            ("word/document.xml", DOCUMENT),
            ("word/styles.xml", STYLES),
            ("word/footer1.xml", FOOTER),
        ] {
            zip.start_file(name, options).unwrap();
            zip.write_all(content.as_bytes()).unwrap();
        }
        zip.finish().unwrap().into_inner()
    }

    fn open(bytes: Vec<u8>) -> DocxPackage {
        DocxPackage::from_reader(Cursor::new(bytes)).unwrap()
    }

    fn part(bytes: &[u8], name: &str) -> String {
        let mut archive = ZipArchive::new(Cursor::new(bytes)).unwrap();
        let mut file = archive.by_name(name).unwrap();
        let mut content = String::new();
        file.read_to_string(&mut content).unwrap();
        content
    }

    #[test]
    fn test_load_stories() {
        let doc = open(build_docx()).document();

        assert_eq!(
            doc.body_lines(),
            vec!["РОЗДІЛ 1 АНАЛІЗ", "Рисунок 1.1 – Схема", "https://example.com"]
        );
        assert_eq!(doc.body[0].style, "Heading 1");
        assert_eq!(doc.body[1].style, "Normal");
        assert_eq!(doc.body[1].runs.len(), 2);
        assert!(doc.body.iter().all(|b| b.origin.is_some()));

        assert_eq!(doc.tables.len(), 1);
        assert_eq!(doc.tables[0].rows[0].cells.len(), 2);
        assert_eq!(doc.tables[0].rows[0].cells[1].blocks[0].text(), "Клітинка");

        assert_eq!(doc.furniture.len(), 1);
        assert_eq!(doc.furniture[0].kind, FurnitureKind::Footer);
        assert_eq!(doc.furniture[0].blocks[0].text(), "Київ — 2025");
    }

    #[test]
    fn test_unchanged_parts_are_copied() {
        let package = open(build_docx());
        let bytes = package.to_bytes(&package.document()).unwrap();

        assert_eq!(part(&bytes, "word/document.xml"), DOCUMENT);
        assert_eq!(part(&bytes, "word/footer1.xml"), FOOTER);
        assert_eq!(part(&bytes, "word/styles.xml"), STYLES);
    }

    #[test]
    fn test_replaced_text_keeps_run_format() {
        let package = open(build_docx());
        let mut doc = package.document();
        replace_text(&mut doc.body, 1, "Рисунок 1.1. Схема").unwrap();

        let bytes = package.to_bytes(&doc).unwrap();
        let xml = part(&bytes, "word/document.xml");
        assert!(xml.contains(r#"<w:r><w:rPr><w:b/></w:rPr><w:t xml:space="preserve">Рисунок 1.1. Схема</w:t></w:r><w:r/>"#));
        assert!(xml.contains(r#"<w:pStyle w:val="Heading1"/>"#));
        assert_eq!(part(&bytes, "word/footer1.xml"), FOOTER);

        let reloaded = open(bytes).document();
        assert_eq!(reloaded.body[1].text(), "Рисунок 1.1. Схема");
        assert_eq!(reloaded.body_lines().len(), 3);
    }

    #[test]
    fn test_inserted_blocks() {
        let package = open(build_docx());
        let mut doc = package.document();
        insert_before(&mut doc.body, 3, "Висновки до розділу 1", "Heading 3").unwrap();
        insert_before(&mut doc.body, 1, "Вступний абзац", "Normal").unwrap();

        let bytes = package.to_bytes(&doc).unwrap();
        let xml = part(&bytes, "word/document.xml");
        let appended = xml.find("Висновки до розділу 1").unwrap();
        assert!(appended < xml.find("<w:sectPr>").unwrap());
        assert!(xml.contains(r#"<w:p><w:pPr><w:pStyle w:val="Heading3"/></w:pPr><w:r><w:t xml:space="preserve">Висновки до розділу 1</w:t></w:r></w:p>"#));

        let reloaded = open(bytes).document();
        assert_eq!(
            reloaded.body_lines(),
            vec![
                "РОЗДІЛ 1 АНАЛІЗ",
                "Вступний абзац",
                "Рисунок 1.1 – Схема",
                "https://example.com",
                "Висновки до розділу 1",
            ]
        );
        assert_eq!(reloaded.body[4].style, "Heading 3");
        assert_eq!(reloaded.tables[0].rows[0].cells[1].blocks[0].text(), "Клітинка");
    }

    #[test]
    fn test_dashes_in_every_story() {
        let package = open(build_docx());
        let mut doc = package.document();
        let report = DashNormalizer::new(DashSet::Long)
            .normalize_document(&mut doc)
            .unwrap();
        assert_eq!(report.captions_fixed, 1);

        let reloaded = open(package.to_bytes(&doc).unwrap()).document();
        assert_eq!(reloaded.body[1].text(), "Рисунок 1.1. Схема");
        assert_eq!(reloaded.tables[0].rows[0].cells[0].blocks[0].text(), "1-2");
        assert_eq!(reloaded.furniture[0].blocks[0].text(), "Київ - 2025");
    }

    #[test]
    fn test_save_in_place() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("thesis.docx");
        fs::write(&path, build_docx()).unwrap();

        let package = DocxPackage::open(&path).unwrap();
        let mut doc = package.document();
        replace_text(&mut doc.body, 0, "РОЗДІЛ 1 ОГЛЯД").unwrap();
        package.save(&doc, &path).unwrap();

        let reloaded = DocxPackage::open(&path).unwrap().document();
        assert_eq!(reloaded.body[0].text(), "РОЗДІЛ 1 ОГЛЯД");
        assert_eq!(reloaded.body[0].style, "Heading 1");
        assert_eq!(fs::read_dir(dir.path()).unwrap().count(), 1);
    }

    #[test]
    fn test_missing_document_part() {
        let mut zip = ZipWriter::new(Cursor::new(Vec::new()));
        zip.start_file("[Content_Types].xml", FileOptions::default()).unwrap();
        zip.write_all(CONTENT_TYPES.as_bytes()).unwrap();
        let bytes = zip.finish().unwrap().into_inner();

        assert!(matches!(
            DocxPackage::from_reader(Cursor::new(bytes)),
            Err(Error::CorruptedFile(_))
        ));
        assert!(matches!(
            DocxPackage::from_reader(Cursor::new(b"not a zip".to_vec())),
            Err(Error::ZipError(_))
        ));
    }

    #[test]
    fn test_furniture_kind() {
        assert_eq!(furniture_kind("word/header1.xml"), Some(FurnitureKind::Header));
        assert_eq!(furniture_kind("word/footer12.xml"), Some(FurnitureKind::Footer));
        assert_eq!(furniture_kind("word/footnotes.xml"), None);
        assert_eq!(furniture_kind("word/_rels/header1.xml.rels"), None);
    }
}
