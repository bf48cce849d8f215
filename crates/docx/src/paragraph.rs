//! Mapping between `w:p` elements and blocks.
//!
//! Runs are the `w:r` elements of a paragraph, including those nested in
//! hyperlinks, tracked insertions, smart tags, simple fields and content
//! controls. Deleted text (`w:del`, `w:moveFrom`) is not part of any run.
//! A run's text is its `w:t` content, with `w:tab` read as '\t' and line
//! breaks as '\n'.

use crate::styles::StyleMap;
use crate::xml::{Element, Node};
use thesis_core::{Block, Run, DEFAULT_STYLE};

const RUN_CONTAINERS: &[&[u8]] = &[
    b"hyperlink",
    b"ins",
    b"smartTag",
    b"fldSimple",
    b"customXml",
    b"sdt",
    b"sdtContent",
    b"moveTo",
];

/// Build the block for a paragraph element.
pub(crate) fn to_block(paragraph: &Element, styles: &StyleMap) -> Block {
    let runs = run_paths(paragraph)
        .iter()
        .filter_map(|path| element_at(paragraph, path))
        .map(|run| Run::new(run_text(run)))
        .collect();
    Block::with_runs(styles.name(style_id(paragraph).as_deref()), runs)
}

/// Build a new paragraph element for a block created by an edit.
pub(crate) fn new_paragraph(block: &Block, styles: &StyleMap) -> Element {
    let mut paragraph = Element::new("w:p");

    match styles.id(&block.style) {
        Some(id) => {
            paragraph = paragraph.with_child(
                Element::new("w:pPr").with_child(Element::new("w:pStyle").with_attribute("w:val", id)),
            );
        }
        None if block.style == DEFAULT_STYLE => {}
        None => log::warn!("Unknown style {:?}, inserted paragraph left unstyled", block.style),
    }

    for run in block.runs.iter().filter(|r| !r.text.is_empty()) {
        paragraph = paragraph.with_child(new_run(&run.text));
    }
    paragraph
}

/// Rewrite `paragraph` (loaded as `loaded`) so it reads as `block`.
///
/// Only runs whose text changed are touched; their properties stay.
pub(crate) fn apply_block(paragraph: &mut Element, loaded: &Block, block: &Block, styles: &StyleMap) {
    if block.style != loaded.style {
        match styles.id(&block.style) {
            Some(id) => set_style(paragraph, id),
            None => log::warn!("Unknown style {:?}, paragraph style unchanged", block.style),
        }
    }

    let paths = run_paths(paragraph);
    for (i, path) in paths.iter().enumerate() {
        let old = loaded.runs.get(i).map_or("", |r| r.text.as_str());
        let new = block.runs.get(i).map_or("", |r| r.text.as_str());
        if old == new {
            continue;
        }
        if let Some(run) = element_at_mut(paragraph, path) {
            set_run_text(run, new);
        }
    }

    for run in block.runs.iter().skip(paths.len()).filter(|r| !r.text.is_empty()) {
        paragraph.children.push(Node::Element(new_run(&run.text)));
    }
}

fn style_id(paragraph: &Element) -> Option<String> {
    paragraph
        .child(b"pPr")
        .and_then(|ppr| ppr.child(b"pStyle"))
        .and_then(|style| style.attribute(b"val"))
}

fn set_style(paragraph: &mut Element, id: &str) {
    let properties = paragraph.ensure_first_child(b"pPr", "w:pPr");
    let style = properties.ensure_first_child(b"pStyle", "w:pStyle");
    *style = Element::new("w:pStyle").with_attribute("w:val", id);
}

/// Child-index paths from the paragraph to each of its runs, in reading order.
fn run_paths(paragraph: &Element) -> Vec<Vec<usize>> {
    let mut paths = Vec::new();
    collect_runs(&paragraph.children, &mut Vec::new(), &mut paths);
    paths
}

fn collect_runs(children: &[Node], prefix: &mut Vec<usize>, paths: &mut Vec<Vec<usize>>) {
    for (i, child) in children.iter().enumerate() {
        let Node::Element(element) = child else {
            continue;
        };
        prefix.push(i);
        if element.is(b"r") {
            paths.push(prefix.clone());
        } else if RUN_CONTAINERS.iter().any(|name| element.is(name)) {
            collect_runs(&element.children, prefix, paths);
        }
        prefix.pop();
    }
}

fn element_at<'a>(mut element: &'a Element, path: &[usize]) -> Option<&'a Element> {
    for &i in path {
        match element.children.get(i) {
            Some(Node::Element(child)) => element = child,
            _ => return None,
        }
    }
    Some(element)
}

fn element_at_mut<'a>(mut element: &'a mut Element, path: &[usize]) -> Option<&'a mut Element> {
    for &i in path {
        match element.children.get_mut(i) {
            Some(Node::Element(child)) => element = child,
            _ => return None,
        }
    }
    Some(element)
}

/// Run children that carry text. Page and column breaks do not.
fn is_text_child(element: &Element) -> bool {
    match element.local_name() {
        b"t" | b"tab" | b"cr" | b"noBreakHyphen" => true,
        b"br" => is_line_break(element),
        _ => false,
    }
}

fn is_line_break(element: &Element) -> bool {
    element
        .attribute(b"type")
        .map_or(true, |kind| kind == "textWrapping")
}

fn run_text(run: &Element) -> String {
    let mut text = String::new();
    for child in run.elements().filter(|e| is_text_child(e)) {
        match child.local_name() {
            b"t" => text.push_str(&child.text()),
            b"tab" => text.push('\t'),
            b"noBreakHyphen" => text.push('\u{2011}'),
            _ => text.push('\n'),
        }
    }
    text
}

/// Replace the text children of a run, in place of the first one.
fn set_run_text(run: &mut Element, text: &str) {
    let at = run
        .children
        .iter()
        .position(|n| matches!(n, Node::Element(e) if is_text_child(e)));
    run.children
        .retain(|n| !matches!(n, Node::Element(e) if is_text_child(e)));
    let at = at.unwrap_or(run.children.len());
    run.children.splice(at..at, text_nodes(text));
}

fn new_run(text: &str) -> Element {
    let mut run = Element::new("w:r");
    run.children = text_nodes(text);
    run
}

fn text_nodes(text: &str) -> Vec<Node> {
    let mut nodes = Vec::new();
    let mut segment = String::new();

    for c in text.chars() {
        let name = match c {
            '\t' => "w:tab",
            '\n' => "w:br",
            _ => {
                segment.push(c);
                continue;
            }
        };
        push_text(&mut nodes, &mut segment);
        nodes.push(Node::Element(Element::new(name)));
    }
    push_text(&mut nodes, &mut segment);

    nodes
}

fn push_text(nodes: &mut Vec<Node>, segment: &mut String) {
    if segment.is_empty() {
        return;
    }
    let t = Element::new("w:t")
        .with_attribute("xml:space", "preserve")
        .with_text(segment);
    nodes.push(Node::Element(t));
    segment.clear();
}
