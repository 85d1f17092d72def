//! The local (vector-PDF) token path.
//!
//! The low-level positioned-word extractor is an external collaborator
//! behind the [`WordExtractor`] trait; this module wraps any implementation
//! in the normalization the core demands: non-breaking spaces stripped,
//! blank words dropped, and tokens sorted into reading order.

use std::fs;
use std::path::Path;

use serde::{Deserialize, Serialize};

use fiscus_core::error::{FiscusError, FiscusResult};
use fiscus_core::token::{normalize_text, sort_reading_order, Token};
use fiscus_core::traits::TokenProvider;

/// Intra-word glue distances forwarded to the word extractor.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct GlueTolerance {
    /// Horizontal distance below which glyphs glue into one word.
    pub x_tolerance: f64,
    /// Vertical distance below which glyphs glue into one word.
    pub y_tolerance: f64,
    /// Keep interior blank characters instead of splitting on them.
    pub keep_blank_chars: bool,
}

impl Default for GlueTolerance {
    fn default() -> Self {
        Self {
            x_tolerance: 2.0,
            y_tolerance: 2.0,
            keep_blank_chars: false,
        }
    }
}

/// One positioned word as reported by the extractor, before normalization.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RawWord {
    pub x0: f64,
    pub x1: f64,
    pub top: f64,
    pub bottom: f64,
    pub text: String,
}

/// The pluggable low-level word extractor.
pub trait WordExtractor {
    fn words_of_page(
        &self,
        source: &Path,
        page: usize,
        glue: &GlueTolerance,
    ) -> FiscusResult<Vec<RawWord>>;

    fn page_count(&self, source: &Path) -> FiscusResult<usize>;
}

/// Token provider over a local word extractor.
pub struct LocalTokens<E> {
    extractor: E,
    glue: GlueTolerance,
}

impl<E: WordExtractor> LocalTokens<E> {
    pub fn new(extractor: E) -> Self {
        Self {
            extractor,
            glue: GlueTolerance::default(),
        }
    }

    pub fn with_glue(mut self, glue: GlueTolerance) -> Self {
        self.glue = glue;
        self
    }
}

impl<E: WordExtractor> TokenProvider for LocalTokens<E> {
    fn tokens_of_page(&self, source: &Path, page: usize) -> FiscusResult<Vec<Token>> {
        let raw = self.extractor.words_of_page(source, page, &self.glue)?;
        let mut tokens = Vec::with_capacity(raw.len());
        for word in raw {
            if normalize_text(&word.text).is_empty() {
                continue;
            }
            tokens.push(Token::new(
                word.x0,
                word.x1,
                word.top,
                word.bottom,
                &word.text,
            )?);
        }
        sort_reading_order(&mut tokens);
        Ok(tokens)
    }

    fn page_count(&self, source: &Path) -> FiscusResult<usize> {
        self.extractor.page_count(source)
    }
}

/// A word extractor reading pre-extracted sidecar files.
///
/// For a source `report.pdf`, page `n` lives in `report-pg-{n}.words.json`
/// next to the source: a JSON array of [`RawWord`]. Useful wherever word
/// extraction ran ahead of time (test fixtures, archived extractions) and
/// as the reference implementation of the sidecar contract.
#[derive(Debug, Default)]
pub struct JsonWordExtractor;

impl JsonWordExtractor {
    fn sidecar_path(source: &Path, page: usize) -> FiscusResult<std::path::PathBuf> {
        let stem = source
            .file_stem()
            .and_then(|s| s.to_str())
            .ok_or_else(|| FiscusError::provider(format!("bad source path {source:?}")))?;
        let dir = source.parent().unwrap_or_else(|| Path::new("."));
        Ok(dir.join(format!("{stem}-pg-{page}.words.json")))
    }
}

impl WordExtractor for JsonWordExtractor {
    fn words_of_page(
        &self,
        source: &Path,
        page: usize,
        _glue: &GlueTolerance,
    ) -> FiscusResult<Vec<RawWord>> {
        let path = Self::sidecar_path(source, page)?;
        if !path.exists() {
            return Err(FiscusError::file_not_found(&path));
        }
        let contents = fs::read_to_string(&path)?;
        serde_json::from_str(&contents)
            .map_err(|e| FiscusError::provider(format!("bad words sidecar {path:?}: {e}")))
    }

    fn page_count(&self, source: &Path) -> FiscusResult<usize> {
        let stem = source
            .file_stem()
            .and_then(|s| s.to_str())
            .ok_or_else(|| FiscusError::provider(format!("bad source path {source:?}")))?;
        let dir = source.parent().unwrap_or_else(|| Path::new("."));
        let prefix = format!("{stem}-pg-");
        let mut pages = 0;
        for entry in fs::read_dir(dir)? {
            let name = entry?.file_name();
            let Some(name) = name.to_str() else { continue };
            if name.starts_with(&prefix) && name.ends_with(".words.json") {
                pages += 1;
            }
        }
        Ok(pages)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    struct FixedWords(Vec<RawWord>);

    impl WordExtractor for FixedWords {
        fn words_of_page(
            &self,
            _source: &Path,
            _page: usize,
            _glue: &GlueTolerance,
        ) -> FiscusResult<Vec<RawWord>> {
            Ok(self.0.clone())
        }

        fn page_count(&self, _source: &Path) -> FiscusResult<usize> {
            Ok(1)
        }
    }

    fn word(x0: f64, top: f64, text: &str) -> RawWord {
        RawWord {
            x0,
            x1: x0 + 10.0,
            top,
            bottom: top + 10.0,
            text: text.to_string(),
        }
    }

    #[test]
    fn test_local_tokens_normalize_and_sort() {
        let provider = LocalTokens::new(FixedWords(vec![
            word(50.0, 100.0, " later "),
            word(0.0, 0.0, "\u{a0}first\u{a0}"),
            word(10.0, 50.0, "  \u{a0} "),
        ]));
        let tokens = provider
            .tokens_of_page(Path::new("report.pdf"), 1)
            .unwrap();
        assert_eq!(tokens.len(), 2);
        assert_eq!(tokens[0].text(), "first");
        assert_eq!(tokens[1].text(), "later");
    }

    #[test]
    fn test_json_sidecar_round_trip() {
        let dir = TempDir::new().unwrap();
        let source = dir.path().join("2021_03.pdf");
        let words = vec![word(0.0, 0.0, "Wage"), word(100.0, 0.0, "1,234")];
        std::fs::write(
            dir.path().join("2021_03-pg-1.words.json"),
            serde_json::to_string(&words).unwrap(),
        )
        .unwrap();

        let provider = LocalTokens::new(JsonWordExtractor);
        let tokens = provider.tokens_of_page(&source, 1).unwrap();
        assert_eq!(tokens.len(), 2);
        assert_eq!(provider.page_count(&source).unwrap(), 1);

        assert!(provider.tokens_of_page(&source, 2).is_err());
    }
}
