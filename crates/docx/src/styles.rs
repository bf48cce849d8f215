//! Paragraph style names from `word/styles.xml`.
//!
//! Paragraphs reference styles by id (`Heading1`); blocks carry the display
//! name (`Heading 1`). Built-in styles store lowercase names ("heading 1")
//! that Word shows capitalized.

use crate::xml::{attribute, local_name};
use quick_xml::events::Event;
use quick_xml::Reader;
use std::collections::HashMap;
use thesis_core::{Error, Result, DEFAULT_STYLE};

#[derive(Debug, Clone, Default)]
pub(crate) struct StyleMap {
    /// Style id to display name.
    names: HashMap<String, String>,

    /// Lowercased display name to style id.
    ids: HashMap<String, String>,

    default_id: Option<String>,
}

impl StyleMap {
    pub fn parse(xml: &str) -> Result<Self> {
        let mut map = Self::default();
        let mut reader = Reader::from_str(xml);
        reader.trim_text(true);

        let mut current: Option<String> = None;

        loop {
            match reader.read_event() {
                Ok(Event::Start(ref e)) | Ok(Event::Empty(ref e)) => {
                    let name = e.name();
                    match local_name(name.as_ref()) {
                        b"style" => {
                            current = None;
                            if attribute(e, b"type").as_deref() != Some("paragraph") {
                                continue;
                            }
                            let Some(id) = attribute(e, b"styleId") else {
                                continue;
                            };
                            if matches!(attribute(e, b"default").as_deref(), Some("1") | Some("true")) {
                                map.default_id = Some(id.clone());
                            }
                            current = Some(id);
                        }
                        b"name" => {
                            if let (Some(id), Some(val)) = (current.as_ref(), attribute(e, b"val")) {
                                map.insert(id.clone(), &val);
                            }
                        }
                        _ => {}
                    }
                }
                Ok(Event::End(ref e)) => {
                    let name = e.name();
                    if local_name(name.as_ref()) == b"style" {
                        current = None;
                    }
                }
                Ok(Event::Eof) => break,
                Err(e) => {
                    return Err(Error::XmlError(format!("Error parsing styles: {}", e)));
                }
                _ => {}
            }
        }

        log::debug!("Loaded {} paragraph styles", map.names.len());
        Ok(map)
    }

    fn insert(&mut self, id: String, name: &str) {
        let display = display_name(name);
        self.ids.insert(display.to_lowercase(), id.clone());
        self.names.insert(id, display);
    }

    /// Display name for a paragraph's style id (`None` when the paragraph has no pStyle).
    pub fn name(&self, id: Option<&str>) -> String {
        match id {
            Some(id) => self.names.get(id).cloned().unwrap_or_else(|| id.to_string()),
            None => self
                .default_id
                .as_ref()
                .and_then(|id| self.names.get(id))
                .cloned()
                .unwrap_or_else(|| DEFAULT_STYLE.to_string()),
        }
    }

    /// Style id for a display name. Style ids are accepted as-is.
    pub fn id(&self, name: &str) -> Option<&str> {
        self.ids
            .get(&name.to_lowercase())
            .map(String::as_str)
            .or_else(|| self.names.get_key_value(name).map(|(id, _)| id.as_str()))
    }
}

fn display_name(name: &str) -> String {
    let mut chars = name.trim().chars();
    match chars.next() {
        Some(first) => first.to_uppercase().chain(chars).collect(),
        None => String::new(),
    }
}
