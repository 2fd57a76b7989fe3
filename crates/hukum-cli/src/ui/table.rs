//! Table rendering with comfy-table.
//!
//! | Command | Table Function |
//! |---------|----------------|
//! | `hukum search` | `render_results_table()` |
//! | `hukum ask` | `render_sources_table()` |

use comfy_table::presets::NOTHING;
use comfy_table::{Cell, CellAlignment, ColumnConstraint, Table, Width};

use super::format::preview;

/// One retrieved chunk for display.
#[derive(Debug, Clone)]
pub struct ResultRow {
    pub source: String,
    pub page: Option<String>,
    pub score: f32,
    /// `bm25`, `semantic` or `fused`
    pub via: String,
    pub content: String,
}

/// One cited source for display.
#[derive(Debug, Clone)]
pub struct SourceRow {
    pub source: String,
    pub page: Option<String>,
    pub doc_type: Option<String>,
    pub score: f32,
}

/// Search results with a content preview sized to `width`.
///
/// ```text
/// #   SCORE   SOURCE           PAGE  VIA       PREVIEW
/// 1   0.033   kuhperdata.pdf     88  fused     Pasal 1365 KUHPerdata: tiap perbuatan...
/// ```
pub fn render_results_table(rows: &[ResultRow], width: usize) -> String {
    if rows.is_empty() {
        return String::new();
    }

    let mut table = Table::new();
    table.load_preset(NOTHING);
    table.set_header(vec![
        Cell::new("#").set_alignment(CellAlignment::Right),
        Cell::new("SCORE").set_alignment(CellAlignment::Right),
        Cell::new("SOURCE"),
        Cell::new("PAGE").set_alignment(CellAlignment::Right),
        Cell::new("VIA"),
        Cell::new("PREVIEW"),
    ]);
    table.set_constraints(vec![
        ColumnConstraint::LowerBoundary(Width::Fixed(3)),
        ColumnConstraint::LowerBoundary(Width::Fixed(7)),
        ColumnConstraint::LowerBoundary(Width::Fixed(12)),
        ColumnConstraint::LowerBoundary(Width::Fixed(5)),
        ColumnConstraint::LowerBoundary(Width::Fixed(8)),
    ]);

    // Fixed columns take roughly 50 chars.
    let preview_width = width.saturating_sub(50).max(20);

    for (i, row) in rows.iter().enumerate() {
        table.add_row(vec![
            Cell::new(i + 1).set_alignment(CellAlignment::Right),
            Cell::new(format!("{:.3}", row.score)).set_alignment(CellAlignment::Right),
            Cell::new(preview(&row.source, 24)),
            Cell::new(row.page.as_deref().unwrap_or("-")).set_alignment(CellAlignment::Right),
            Cell::new(&row.via),
            Cell::new(preview(&row.content, preview_width)),
        ]);
    }

    table.trim_fmt().to_string()
}

/// Cited sources of an answer.
pub fn render_sources_table(rows: &[SourceRow]) -> String {
    if rows.is_empty() {
        return String::new();
    }

    let mut table = Table::new();
    table.load_preset(NOTHING);
    table.set_header(vec![
        Cell::new("#").set_alignment(CellAlignment::Right),
        Cell::new("SOURCE"),
        Cell::new("PAGE").set_alignment(CellAlignment::Right),
        Cell::new("TYPE"),
        Cell::new("SCORE").set_alignment(CellAlignment::Right),
    ]);

    for (i, row) in rows.iter().enumerate() {
        table.add_row(vec![
            Cell::new(i + 1).set_alignment(CellAlignment::Right),
            Cell::new(preview(&row.source, 40)),
            Cell::new(row.page.as_deref().unwrap_or("-")).set_alignment(CellAlignment::Right),
            Cell::new(row.doc_type.as_deref().unwrap_or("-")),
            Cell::new(format!("{:.3}", row.score)).set_alignment(CellAlignment::Right),
        ]);
    }

    table.trim_fmt().to_string()
}
