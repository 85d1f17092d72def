//! Provider seams for page content.
//!
//! Report pipelines never touch a PDF engine or an OCR backend directly;
//! they ask a provider for the tokens (or, for layouts that defeat
//! geometric reconstruction, the ready-made tables) of one page. Local and
//! remote implementations share the same output contract, so a report does
//! not care which path produced its tokens.

use std::path::Path;

use crate::error::FiscusResult;
use crate::grid::Grid;
use crate::token::Token;

/// Yields positioned text tokens for pages of a source document.
///
/// Tokens satisfy the [`Token`](crate::token::Token) invariants: normalized
/// non-empty text and a well-formed bounding box in top-left PDF space.
/// Pages are numbered from 1.
pub trait TokenProvider {
    fn tokens_of_page(&self, source: &Path, page: usize) -> FiscusResult<Vec<Token>>;

    /// Number of pages in the source document.
    fn page_count(&self, source: &Path) -> FiscusResult<usize>;
}

/// Yields reconstructed tables for pages of a source document.
///
/// Used by report families whose layouts defeat geometric reconstruction;
/// in practice this is the OCR path.
pub trait TableProvider {
    fn tables_of_page(&self, source: &Path, page: usize) -> FiscusResult<Vec<Grid>>;

    fn page_count(&self, source: &Path) -> FiscusResult<usize>;
}
