//! The OCR backend's block document and its interpretation.
//!
//! A completed analysis is a flat list of blocks: WORD blocks with
//! page-relative geometry, TABLE blocks whose children are CELL blocks, and
//! CELL blocks whose children are the words (or selection marks) inside the
//! cell. Geometry arrives as ratios of the page box and is scaled into
//! top-left PDF coordinates using the page dimensions carried alongside.

use std::collections::HashMap;

use serde::{Deserialize, Serialize};

use fiscus_core::error::{FiscusError, FiscusResult};
use fiscus_core::grid::Grid;
use fiscus_core::token::{normalize_text, sort_reading_order, Token};

/// One completed page analysis.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "PascalCase")]
pub struct BlockDocument {
    /// Page width in PDF points.
    pub page_width: f64,
    /// Page height in PDF points.
    pub page_height: f64,
    pub blocks: Vec<Block>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "PascalCase")]
pub struct Block {
    pub id: String,
    pub block_type: BlockType,
    #[serde(default)]
    pub text: Option<String>,
    #[serde(default)]
    pub geometry: Option<Geometry>,
    #[serde(default)]
    pub row_index: Option<usize>,
    #[serde(default)]
    pub column_index: Option<usize>,
    #[serde(default)]
    pub relationships: Vec<Relationship>,
    #[serde(default)]
    pub selection_status: Option<String>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum BlockType {
    Page,
    Word,
    Line,
    Table,
    Cell,
    SelectionElement,
    #[serde(other)]
    Other,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "PascalCase")]
pub struct Geometry {
    pub bounding_box: BoundingBox,
}

/// Page-relative bounding box: all fields are ratios in `[0, 1]`.
#[derive(Debug, Clone, Copy, Serialize, Deserialize)]
#[serde(rename_all = "PascalCase")]
pub struct BoundingBox {
    pub left: f64,
    pub top: f64,
    pub width: f64,
    pub height: f64,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "PascalCase")]
pub struct Relationship {
    #[serde(rename = "Type")]
    pub kind: String,
    pub ids: Vec<String>,
}

impl Block {
    /// Child block ids, in document order.
    fn child_ids(&self) -> impl Iterator<Item = &str> {
        self.relationships
            .iter()
            .filter(|r| r.kind == "CHILD")
            .flat_map(|r| r.ids.iter().map(String::as_str))
    }
}

/// Extract positioned tokens from the document's WORD blocks, scaled into
/// PDF coordinates.
pub fn document_tokens(doc: &BlockDocument) -> FiscusResult<Vec<Token>> {
    let mut tokens = Vec::new();
    for block in &doc.blocks {
        if block.block_type != BlockType::Word {
            continue;
        }
        let Some(text) = block.text.as_deref() else {
            continue;
        };
        if normalize_text(text).is_empty() {
            continue;
        }
        let bbox = block
            .geometry
            .as_ref()
            .map(|g| g.bounding_box)
            .ok_or_else(|| {
                FiscusError::provider(format!("word block {} has no geometry", block.id))
            })?;
        tokens.push(Token::new(
            bbox.left * doc.page_width,
            (bbox.left + bbox.width) * doc.page_width,
            bbox.top * doc.page_height,
            (bbox.top + bbox.height) * doc.page_height,
            text,
        )?);
    }
    sort_reading_order(&mut tokens);
    Ok(tokens)
}

/// Assemble the document's tables, top to bottom.
pub fn document_tables(doc: &BlockDocument) -> FiscusResult<Vec<Grid>> {
    let by_id: HashMap<&str, &Block> =
        doc.blocks.iter().map(|b| (b.id.as_str(), b)).collect();

    let mut tables: Vec<&Block> = doc
        .blocks
        .iter()
        .filter(|b| b.block_type == BlockType::Table)
        .collect();
    tables.sort_by(|a, b| {
        let top = |blk: &Block| {
            blk.geometry
                .as_ref()
                .map(|g| g.bounding_box.top)
                .unwrap_or_default()
        };
        top(a).total_cmp(&top(b))
    });

    let mut grids = Vec::with_capacity(tables.len());
    for table in tables {
        let cells: Vec<&Block> = table
            .child_ids()
            .filter_map(|id| by_id.get(id).copied())
            .filter(|b| b.block_type == BlockType::Cell)
            .collect();

        let nrows = cells.iter().filter_map(|c| c.row_index).max().unwrap_or(0);
        let ncols = cells
            .iter()
            .filter_map(|c| c.column_index)
            .max()
            .unwrap_or(0);
        let mut grid = Grid::new(nrows, ncols);

        for cell in cells {
            let (Some(row), Some(col)) = (cell.row_index, cell.column_index) else {
                return Err(FiscusError::provider(format!(
                    "table cell {} lacks row/column indices",
                    cell.id
                )));
            };
            if row == 0 || col == 0 {
                return Err(FiscusError::provider(format!(
                    "table cell {} has zero-based indices",
                    cell.id
                )));
            }
            let words: Vec<&str> = cell
                .child_ids()
                .filter_map(|id| by_id.get(id).copied())
                .filter_map(|child| match child.block_type {
                    BlockType::Word => child.text.as_deref(),
                    BlockType::SelectionElement => child.selection_status.as_deref(),
                    _ => None,
                })
                .collect();
            // Indices are 1-based in the block structure.
            grid.set(row - 1, col - 1, words.join(" "));
        }
        grids.push(grid);
    }
    Ok(grids)
}
