use blobflow_core::{BlobError, BlobResult, DocumentFormat};
use pulldown_cmark::{Event, Options, Parser, Tag, TagEnd};

use super::{describe, FormatExtractor};

/// Markdown rendered to plain text: one line per block element, inline
/// markup dropped.
pub struct MarkdownExtractor;

impl FormatExtractor for MarkdownExtractor {
    fn format(&self) -> DocumentFormat {
        DocumentFormat::Markdown
    }

    fn extract(&self, bytes: &[u8], filename_hint: Option<&str>) -> BlobResult<String> {
        if bytes.is_empty() {
            return Ok(String::new());
        }
        let source = std::str::from_utf8(bytes).map_err(|e| {
            BlobError::extraction(self.format(), format!("{}: {}", describe(filename_hint), e))
        })?;

        let mut elements: Vec<String> = Vec::new();
        let mut current = String::new();
        let mut flush = |current: &mut String| {
            let text = current.trim();
            if !text.is_empty() {
                elements.push(text.to_string());
            }
            current.clear();
        };

        for event in Parser::new_ext(source, Options::ENABLE_TABLES) {
            match event {
                Event::Text(text) | Event::Code(text) => current.push_str(&text),
                Event::SoftBreak => current.push(' '),
                Event::HardBreak => current.push('\n'),
                Event::End(TagEnd::TableCell) => current.push('\t'),
                Event::End(
                    TagEnd::Paragraph
                    | TagEnd::Heading(_)
                    | TagEnd::Item
                    | TagEnd::CodeBlock
                    | TagEnd::TableHead
                    | TagEnd::TableRow,
                ) => flush(&mut current),
                Event::Start(Tag::List(_)) => {
                    // A nested block starts (e.g. a sub-list); close the text before it.
                    flush(&mut current)
                }
                _ => {}
            }
        }
        flush(&mut current);
        Ok(elements.join("\n"))
    }
}
