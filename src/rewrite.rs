//! Paragraph rewriting and document walking.
//!
//! The walker folds forward over `word/document.xml` once: paragraphs
//! outside tables are rewritten unconstrained, table-cell paragraphs with
//! the cell's width and row's height as fitting constraints, and everything
//! else is copied through verbatim. A paragraph is only touched when its
//! text actually contains an image link.
//!
//! Rebuilding a paragraph is clear-and-rebuild: the `<w:p>` open tag and
//! `<w:pPr>` block survive, the original runs do not. Run-level formatting
//! inside a rewritten paragraph is an accepted loss.

use crate::docx::{self, Docx, DocxError};
use crate::fetch::{self, Fetcher};
use crate::fit;
use crate::segment::{self, Segment};

/// Per-document rewrite counters.
#[derive(Debug, Default, Clone, Copy)]
pub struct WalkStats {
    pub paragraphs_rewritten: usize,
    pub images_embedded: usize,
    pub images_failed: usize,
}

impl WalkStats {
    pub fn changed(&self) -> bool {
        self.paragraphs_rewritten > 0
    }
}

/// Rewrite every paragraph of `doc` that contains image links.
///
/// Returns the counters; the body is only replaced when something changed,
/// so an untouched document round-trips byte-identically.
pub fn walk(doc: &mut Docx, fetcher: &dyn Fetcher) -> Result<WalkStats, DocxError> {
    let mut stats = WalkStats::default();
    let body = doc.body().to_string();
    let rebuilt = walk_block(&body, doc, fetcher, None, None, &mut stats)?;
    if stats.changed() {
        doc.set_body(rebuilt);
    }
    Ok(stats)
}

/// Rewrite one paragraph's XML, or return `None` when it has no links.
///
/// `cell_w`/`cell_h` are the container constraints in EMU. Image segments
/// that fail to resolve fall back to a text run holding the original tag.
pub fn rewrite_paragraph(
    para_xml: &str,
    doc: &mut Docx,
    fetcher: &dyn Fetcher,
    cell_w: Option<i64>,
    cell_h: Option<i64>,
    stats: &mut WalkStats,
) -> Result<Option<String>, DocxError> {
    let text = docx::para_text(para_xml);
    let matches = segment::scan_links(&text);
    if matches.is_empty() {
        return Ok(None);
    }

    let mut rebuilt = paragraph_prefix(para_xml).to_string();
    for seg in segment::build_segments(&text, &matches) {
        match seg {
            Segment::Text(content) => rebuilt.push_str(&docx::text_run(&content)),
            Segment::Image { url, original } => match fetch::resolve(fetcher, &url) {
                Ok(img) => {
                    let fitted = fit::fit_image(img.width, img.height, cell_w, cell_h);
                    let extension = img.extension();
                    let mime_type = img.mime_type();
                    let rid = doc.add_image(img.bytes, extension, mime_type)?;
                    let drawing_id = doc.next_drawing_id();
                    log::info!(
                        "embedded {} ({}x{} px) at {}x{} EMU",
                        url,
                        img.width,
                        img.height,
                        fitted.width_emu,
                        fitted.height_emu
                    );
                    rebuilt.push_str(&docx::image_run(
                        &rid,
                        drawing_id,
                        fitted.width_emu,
                        fitted.height_emu,
                    ));
                    stats.images_embedded += 1;
                }
                Err(e) => {
                    log::warn!("{}: {}; keeping the original tag as text", url, e);
                    rebuilt.push_str(&docx::text_run(&original));
                    stats.images_failed += 1;
                }
            },
        }
    }
    rebuilt.push_str("</w:p>");
    Ok(Some(rebuilt))
}

/// The part of a paragraph that survives a rebuild: the `<w:p ...>` open tag
/// and, when present, the `<w:pPr>` properties block.
fn paragraph_prefix(para_xml: &str) -> &str {
    let open_end = match para_xml.find('>') {
        Some(i) => i + 1,
        None => return para_xml,
    };
    let rest = &para_xml[open_end..];
    if rest.starts_with("<w:pPr/>") {
        return &para_xml[..open_end + "<w:pPr/>".len()];
    }
    if rest.starts_with("<w:pPr>") {
        if let Some(pr_end) = rest.find("</w:pPr>") {
            return &para_xml[..open_end + pr_end + "</w:pPr>".len()];
        }
    }
    &para_xml[..open_end]
}

/// Rewrite a stretch of body markup: non-table paragraphs directly, each
/// top-level table row by row and cell by cell.
fn walk_block(
    xml: &str,
    doc: &mut Docx,
    fetcher: &dyn Fetcher,
    cell_w: Option<i64>,
    cell_h: Option<i64>,
    stats: &mut WalkStats,
) -> Result<String, DocxError> {
    let tables = docx::element_ranges(xml, "w:tbl");
    let mut out = String::with_capacity(xml.len());
    let mut cursor = 0;
    for &(t_start, t_end) in &tables {
        rewrite_region(&xml[cursor..t_start], doc, fetcher, cell_w, cell_h, stats, &mut out)?;
        walk_table(&xml[t_start..t_end], doc, fetcher, stats, &mut out)?;
        cursor = t_end;
    }
    rewrite_region(&xml[cursor..], doc, fetcher, cell_w, cell_h, stats, &mut out)?;
    Ok(out)
}

/// Rewrite the paragraphs of a table-free region into `out`.
fn rewrite_region(
    xml: &str,
    doc: &mut Docx,
    fetcher: &dyn Fetcher,
    cell_w: Option<i64>,
    cell_h: Option<i64>,
    stats: &mut WalkStats,
    out: &mut String,
) -> Result<(), DocxError> {
    let mut cursor = 0;
    for &(p_start, p_end) in &docx::element_ranges(xml, "w:p") {
        out.push_str(&xml[cursor..p_start]);
        let para = &xml[p_start..p_end];
        match rewrite_paragraph(para, doc, fetcher, cell_w, cell_h, stats)? {
            Some(rebuilt) => {
                out.push_str(&rebuilt);
                stats.paragraphs_rewritten += 1;
            }
            None => out.push_str(para),
        }
        cursor = p_end;
    }
    out.push_str(&xml[cursor..]);
    Ok(())
}

/// Walk a table into `out`, deriving each cell's constraints from its
/// `w:tcW` and the row's `w:trHeight`. Nested tables recurse through
/// `walk_block` with their own cells' constraints.
fn walk_table(
    table_xml: &str,
    doc: &mut Docx,
    fetcher: &dyn Fetcher,
    stats: &mut WalkStats,
    out: &mut String,
) -> Result<(), DocxError> {
    let mut cursor = 0;
    for &(r_start, r_end) in &docx::element_ranges(table_xml, "w:tr") {
        out.push_str(&table_xml[cursor..r_start]);
        let row = &table_xml[r_start..r_end];
        let height = docx::row_height_twips(row).map(fit::twips_to_emu);

        let mut row_cursor = 0;
        for &(c_start, c_end) in &docx::element_ranges(row, "w:tc") {
            out.push_str(&row[row_cursor..c_start]);
            let cell = &row[c_start..c_end];
            let width = docx::cell_width_twips(cell).map(fit::twips_to_emu);
            let rebuilt = walk_block(cell, doc, fetcher, width, height, stats)?;
            out.push_str(&rebuilt);
            row_cursor = c_end;
        }
        out.push_str(&row[row_cursor..]);
        cursor = r_end;
    }
    out.push_str(&table_xml[cursor..]);
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_paragraph_prefix_plain() {
        assert_eq!(paragraph_prefix("<w:p><w:r/></w:p>"), "<w:p>");
        assert_eq!(
            paragraph_prefix(r#"<w:p w:rsidR="00AB"><w:r/></w:p>"#),
            r#"<w:p w:rsidR="00AB">"#
        );
    }

    #[test]
    fn test_paragraph_prefix_keeps_ppr() {
        let para = r#"<w:p><w:pPr><w:jc w:val="center"/></w:pPr><w:r><w:t>x</w:t></w:r></w:p>"#;
        assert_eq!(
            paragraph_prefix(para),
            r#"<w:p><w:pPr><w:jc w:val="center"/></w:pPr>"#
        );
        assert_eq!(paragraph_prefix("<w:p><w:pPr/><w:r/></w:p>"), "<w:p><w:pPr/>");
    }
}
