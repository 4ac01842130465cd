//! Text runs out of Office Open XML parts.

use std::io::{Read, Seek};

use anyhow::{anyhow, Context};
use quick_xml::events::Event;
use quick_xml::Reader;
use zip::ZipArchive;

/// Element names for one OOXML dialect.
pub(super) struct Markup {
    pub text: &'static [u8],
    pub paragraph: &'static [u8],
    pub tab: Option<&'static [u8]>,
    pub line_break: Option<&'static [u8]>,
}

pub(super) const WORDPROCESSING: Markup = Markup {
    text: b"w:t",
    paragraph: b"w:p",
    tab: Some(b"w:tab"),
    line_break: Some(b"w:br"),
};

pub(super) const DRAWING: Markup = Markup {
    text: b"a:t",
    paragraph: b"a:p",
    tab: None,
    line_break: Some(b"a:br"),
};

pub(super) fn read_part<R: Read + Seek>(archive: &mut ZipArchive<R>, name: &str) -> anyhow::Result<String> {
    let file = archive
        .by_name(name)
        .map_err(|e| anyhow!("part {} not found: {}", name, e))?;
    std::io::read_to_string(file).with_context(|| format!("reading part {}", name))
}

/// Paragraph texts of one XML part, empty paragraphs dropped.
pub(super) fn paragraphs(xml: &str, markup: &Markup) -> anyhow::Result<Vec<String>> {
    let mut reader = Reader::from_str(xml);
    let mut out = Vec::new();
    let mut current = String::new();
    let mut in_text = false;

    loop {
        match reader.read_event().context("XML parsing error")? {
            Event::Start(e) if e.name().as_ref() == markup.text => in_text = true,
            Event::End(e) if e.name().as_ref() == markup.text => in_text = false,
            Event::Empty(e) if Some(e.name().as_ref()) == markup.tab => current.push('\t'),
            Event::Empty(e) if Some(e.name().as_ref()) == markup.line_break => current.push('\n'),
            Event::End(e) if e.name().as_ref() == markup.paragraph => {
                let paragraph = current.trim();
                if !paragraph.is_empty() {
                    out.push(paragraph.to_string());
                }
                current.clear();
            }
            Event::Text(t) if in_text => current.push_str(&t.unescape().context("unescaping text run")?),
            Event::Eof => break,
            _ => {}
        }
    }

    let tail = current.trim();
    if !tail.is_empty() {
        out.push(tail.to_string());
    }
    Ok(out)
}
