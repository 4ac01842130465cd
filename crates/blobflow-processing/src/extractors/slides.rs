use std::fs::File;
use std::io::Write;
use std::path::{Path, PathBuf};

use anyhow::Context;
use blobflow_core::{BlobError, BlobResult, DocumentFormat};
use tempfile::NamedTempFile;
use zip::ZipArchive;

use super::ooxml::{paragraphs, read_part, DRAWING};
use super::{describe, FormatExtractor};

const SLIDE_PREFIX: &str = "ppt/slides/slide";
const TEMP_PREFIX: &str = "blobflow-slides-";

/// `.pptx` text, slides in presentation order separated by blank lines.
///
/// The package is read from a path, so the payload is first written to a
/// named temporary file. The file is deleted when the handle drops, on
/// success and on every error path.
pub struct SlideDeckExtractor {
    temp_dir: Option<PathBuf>,
}

impl SlideDeckExtractor {
    pub fn new(temp_dir: Option<PathBuf>) -> Self {
        Self { temp_dir }
    }

    fn spill(&self, bytes: &[u8]) -> anyhow::Result<NamedTempFile> {
        let mut builder = tempfile::Builder::new();
        builder.prefix(TEMP_PREFIX).suffix(".pptx");
        let mut temp = match &self.temp_dir {
            Some(dir) => builder.tempfile_in(dir),
            None => builder.tempfile(),
        }
        .context("Failed to create temp file for slide deck")?;

        temp.write_all(bytes)
            .context("Failed to write slide deck to temp file")?;
        temp.flush().context("Failed to flush temp file")?;
        Ok(temp)
    }
}

fn slide_number(name: &str) -> Option<u32> {
    name.strip_prefix(SLIDE_PREFIX)?
        .strip_suffix(".xml")?
        .parse()
        .ok()
}

fn read_deck(path: &Path) -> anyhow::Result<String> {
    let file = File::open(path).context("Failed to reopen slide deck temp file")?;
    let mut archive = ZipArchive::new(file).context("Failed to open PPTX archive")?;

    let mut slides: Vec<(u32, String)> = archive
        .file_names()
        .filter_map(|name| slide_number(name).map(|n| (n, name.to_string())))
        .collect();
    slides.sort_by_key(|(n, _)| *n);

    let mut texts = Vec::with_capacity(slides.len());
    for (_, name) in slides {
        let xml = read_part(&mut archive, &name)?;
        let lines = paragraphs(&xml, &DRAWING).with_context(|| format!("parsing {}", name))?;
        if !lines.is_empty() {
            texts.push(lines.join("\n"));
        }
    }
    Ok(texts.join("\n\n"))
}

impl FormatExtractor for SlideDeckExtractor {
    fn format(&self) -> DocumentFormat {
        DocumentFormat::SlideDeck
    }

    fn extract(&self, bytes: &[u8], filename_hint: Option<&str>) -> BlobResult<String> {
        if bytes.is_empty() {
            return Ok(String::new());
        }

        // `temp` is dropped (and the file removed) when this closure returns.
        let result = self.spill(bytes).and_then(|temp| {
            tracing::debug!(
                path = %temp.path().display(),
                size_bytes = bytes.len(),
                "Slide deck spilled to temp file"
            );
            read_deck(temp.path())
        });

        result.map_err(|e| {
            BlobError::extraction(self.format(), format!("{}: {:#}", describe(filename_hint), e))
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::fixtures::pptx_fixture;

    fn leftover_files(dir: &Path) -> Vec<PathBuf> {
        std::fs::read_dir(dir)
            .unwrap()
            .map(|entry| entry.unwrap().path())
            .collect()
    }

    #[test]
    fn slides_are_read_in_order() {
        let dir = tempfile::tempdir().unwrap();
        let extractor = SlideDeckExtractor::new(Some(dir.path().to_path_buf()));

        let mut deck: Vec<Vec<&str>> = (1..=11).map(|_| vec![]).collect();
        deck[0] = vec!["Welcome", "Agenda"];
        deck[1] = vec!["Second slide"];
        deck[10] = vec!["Eleventh slide"];
        let bytes = pptx_fixture(&deck);

        let text = extractor.extract(&bytes, Some("deck.pptx")).unwrap();
        assert_eq!(text, "Welcome\nAgenda\n\nSecond slide\n\nEleventh slide");
        assert!(leftover_files(dir.path()).is_empty());
    }

    #[test]
    fn temp_file_is_removed_when_parsing_fails() {
        let dir = tempfile::tempdir().unwrap();
        let extractor = SlideDeckExtractor::new(Some(dir.path().to_path_buf()));

        let err = extractor.extract(b"PK\x03\x04 truncated", Some("broken.pptx")).unwrap_err();
        assert!(matches!(
            err,
            BlobError::ExtractionFailed { format: DocumentFormat::SlideDeck, .. }
        ));
        assert!(leftover_files(dir.path()).is_empty());
    }

    #[test]
    fn missing_temp_dir_is_an_extraction_error() {
        let dir = tempfile::tempdir().unwrap();
        let extractor = SlideDeckExtractor::new(Some(dir.path().join("does-not-exist")));
        let bytes = pptx_fixture(&[vec!["x"]]);
        assert!(extractor.extract(&bytes, None).is_err());
    }

    #[test]
    fn slide_numbers_ignore_other_parts() {
        assert_eq!(slide_number("ppt/slides/slide12.xml"), Some(12));
        assert_eq!(slide_number("ppt/slides/_rels/slide1.xml.rels"), None);
        assert_eq!(slide_number("ppt/slideLayouts/slideLayout1.xml"), None);
    }
}
