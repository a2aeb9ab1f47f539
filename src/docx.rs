//! DOCX package access.
//!
//! A document is held as its ordered list of zip entries plus the
//! `word/document.xml` body as a string. Structural work — paragraph and
//! table range discovery, run text extraction, run emission — is
//! regex-driven string surgery over that body, with range pairing kept
//! depth-aware so self-closing tags, nested tables, and prefix-sharing tags
//! (`<w:pPr>`, `<w:tcPr>`, ...) never corrupt the open/close matching.
//!
//! Media files are written back with STORED compression and everything else
//! DEFLATED, matching the layout Word produces itself.

use lazy_static::lazy_static;
use regex::Regex;
use std::io::{Read, Write};
use std::path::Path;

const DOCUMENT: &str = "word/document.xml";
const CONTENT_TYPES: &str = "[Content_Types].xml";
const DOCUMENT_RELS: &str = "word/_rels/document.xml.rels";

const IMAGE_REL_TYPE: &str =
    "http://schemas.openxmlformats.org/officeDocument/2006/relationships/image";

const EMPTY_RELS: &str = concat!(
    r#"<?xml version="1.0" encoding="UTF-8" standalone="yes"?>"#,
    r#"<Relationships xmlns="http://schemas.openxmlformats.org/package/2006/relationships">"#,
    r#"</Relationships>"#,
);

lazy_static! {
    static ref WT_RE: Regex = Regex::new(r#"<w:t(?: [^>]*)?>([^<]*)</w:t>"#).expect("invalid regex");
    static ref DOC_PR_ID_RE: Regex = Regex::new(r#"<wp:docPr id="(\d+)""#).expect("invalid regex");
    static ref MEDIA_NUM_RE: Regex =
        Regex::new(r"^word/media/image(\d+)\.").expect("invalid regex");
    static ref RID_NUM_RE: Regex = Regex::new(r#"Id="rId(\d+)""#).expect("invalid regex");
    static ref TCW_RE: Regex = Regex::new(r"<w:tcW[^>]*>").expect("invalid regex");
    static ref TR_HEIGHT_RE: Regex =
        Regex::new(r#"<w:trHeight[^>]*\bw:val="(\d+)""#).expect("invalid regex");
    static ref ATTR_W_RE: Regex = Regex::new(r#"w:w="(\d+)""#).expect("invalid regex");
    static ref ATTR_TYPE_RE: Regex = Regex::new(r#"w:type="([^"]+)""#).expect("invalid regex");
}

#[derive(Debug, thiserror::Error)]
pub enum DocxError {
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
    #[error("not a readable DOCX archive: {0}")]
    Zip(#[from] zip::result::ZipError),
    #[error("missing required part: {0}")]
    MissingPart(String),
    #[error("malformed part {0}: {1}")]
    MalformedPart(String, String),
}

/// An open DOCX package.
pub struct Docx {
    entries: Vec<(String, Vec<u8>)>,
    body: String,
    next_drawing_id: u32,
}

impl Docx {
    /// Read a DOCX zip into an ordered list of (entry_name, bytes),
    /// validating that the parts every Word document carries are present.
    pub fn open(path: &Path) -> Result<Self, DocxError> {
        let file = std::fs::File::open(path)?;
        let mut archive = zip::ZipArchive::new(file)?;
        let mut entries = Vec::new();
        for i in 0..archive.len() {
            let mut entry = archive.by_index(i)?;
            let name = entry.name().to_string();
            let mut data = Vec::new();
            entry.read_to_end(&mut data)?;
            entries.push((name, data));
        }

        if !entries.iter().any(|(name, _)| name == CONTENT_TYPES) {
            return Err(DocxError::MissingPart(CONTENT_TYPES.to_string()));
        }
        let body_bytes = entries
            .iter()
            .find(|(name, _)| name == DOCUMENT)
            .map(|(_, data)| data.clone())
            .ok_or_else(|| DocxError::MissingPart(DOCUMENT.to_string()))?;
        let body = String::from_utf8(body_bytes)
            .map_err(|e| DocxError::MalformedPart(DOCUMENT.to_string(), e.to_string()))?;

        // Allocate drawing ids above anything already in the document so
        // multi-image output validates cleanly.
        let next_drawing_id = DOC_PR_ID_RE
            .captures_iter(&body)
            .filter_map(|c| c[1].parse::<u32>().ok())
            .max()
            .unwrap_or(0)
            + 1;

        Ok(Docx {
            entries,
            body,
            next_drawing_id,
        })
    }

    /// Write the package back out, STORED for media and DEFLATED otherwise.
    pub fn save(&self, path: &Path) -> Result<(), DocxError> {
        let file = std::fs::File::create(path)?;
        let mut zip = zip::ZipWriter::new(file);
        let deflated = zip::write::SimpleFileOptions::default()
            .compression_method(zip::CompressionMethod::Deflated);
        let stored = zip::write::SimpleFileOptions::default()
            .compression_method(zip::CompressionMethod::Stored);
        for (name, data) in &self.entries {
            let opts = if name.starts_with("word/media/") {
                stored
            } else {
                deflated
            };
            zip.start_file(name, opts)?;
            if name == DOCUMENT {
                zip.write_all(self.body.as_bytes())?;
            } else {
                zip.write_all(data)?;
            }
        }
        zip.finish()?;
        Ok(())
    }

    /// The `word/document.xml` markup.
    pub fn body(&self) -> &str {
        &self.body
    }

    pub fn set_body(&mut self, body: String) {
        self.body = body;
    }

    /// Fresh `wp:docPr` id for an inline drawing.
    pub fn next_drawing_id(&mut self) -> u32 {
        let id = self.next_drawing_id;
        self.next_drawing_id += 1;
        id
    }

    /// Store image bytes as a new media part, register its content type and
    /// relationship, and return the `r:id` to embed.
    pub fn add_image(
        &mut self,
        bytes: Vec<u8>,
        extension: &str,
        mime_type: &str,
    ) -> Result<String, DocxError> {
        let media_name = self.next_media_name(extension);
        self.register_content_type(extension, mime_type)?;
        let rid = self.add_image_relationship(&media_name)?;
        self.entries.push((format!("word/media/{}", media_name), bytes));
        Ok(rid)
    }

    fn part_string(&self, name: &str) -> Option<String> {
        self.entries
            .iter()
            .find(|(entry_name, _)| entry_name == name)
            .map(|(_, data)| String::from_utf8_lossy(data).into_owned())
    }

    fn set_part(&mut self, name: &str, data: Vec<u8>) {
        if let Some((_, existing)) = self.entries.iter_mut().find(|(n, _)| n == name) {
            *existing = data;
        } else {
            self.entries.push((name.to_string(), data));
        }
    }

    /// Next free `imageN.<ext>` name under `word/media/`.
    fn next_media_name(&self, extension: &str) -> String {
        let max = self
            .entries
            .iter()
            .filter_map(|(name, _)| MEDIA_NUM_RE.captures(name))
            .filter_map(|c| c[1].parse::<u32>().ok())
            .max()
            .unwrap_or(0);
        format!("image{}.{}", max + 1, extension)
    }

    /// Ensure `[Content_Types].xml` carries a Default for `extension`.
    fn register_content_type(&mut self, extension: &str, mime_type: &str) -> Result<(), DocxError> {
        let xml = self
            .part_string(CONTENT_TYPES)
            .ok_or_else(|| DocxError::MissingPart(CONTENT_TYPES.to_string()))?;
        let needle = format!("Extension=\"{}\"", extension);
        if xml.contains(&needle) {
            return Ok(());
        }
        let close = xml.rfind("</Types>").ok_or_else(|| {
            DocxError::MalformedPart(CONTENT_TYPES.to_string(), "no </Types> close".to_string())
        })?;
        let mut updated = xml;
        updated.insert_str(
            close,
            &format!(
                r#"<Default Extension="{}" ContentType="{}"/>"#,
                extension, mime_type
            ),
        );
        self.set_part(CONTENT_TYPES, updated.into_bytes());
        Ok(())
    }

    /// Insert an image relationship for `media_name`, creating the rels part
    /// if the document has none yet.
    fn add_image_relationship(&mut self, media_name: &str) -> Result<String, DocxError> {
        let xml = self
            .part_string(DOCUMENT_RELS)
            .unwrap_or_else(|| EMPTY_RELS.to_string());
        let max = RID_NUM_RE
            .captures_iter(&xml)
            .filter_map(|c| c[1].parse::<u32>().ok())
            .max()
            .unwrap_or(0);
        let rid = format!("rId{}", max + 1);
        let close = xml.rfind("</Relationships>").ok_or_else(|| {
            DocxError::MalformedPart(
                DOCUMENT_RELS.to_string(),
                "no </Relationships> close".to_string(),
            )
        })?;
        let mut updated = xml;
        updated.insert_str(
            close,
            &format!(
                r#"<Relationship Id="{}" Type="{}" Target="media/{}"/>"#,
                rid, IMAGE_REL_TYPE, media_name
            ),
        );
        self.set_part(DOCUMENT_RELS, updated.into_bytes());
        Ok(rid)
    }
}

// ─── XML text helpers ───────────────────────────────────────────────────────

pub fn escape_xml(s: &str) -> String {
    s.replace('&', "&amp;")
        .replace('<', "&lt;")
        .replace('>', "&gt;")
        .replace('"', "&quot;")
        .replace('\'', "&apos;")
}

pub fn unescape_xml(s: &str) -> String {
    s.replace("&lt;", "<")
        .replace("&gt;", ">")
        .replace("&quot;", "\"")
        .replace("&apos;", "'")
        .replace("&amp;", "&")
}

/// Concatenated, unescaped `<w:t>` content of a paragraph.
pub fn para_text(para_xml: &str) -> String {
    WT_RE
        .captures_iter(para_xml)
        .map(|caps| unescape_xml(&caps[1]))
        .collect()
}

// ─── Run emission ───────────────────────────────────────────────────────────

/// A literal text run. `xml:space="preserve"` keeps leading/trailing spaces
/// from being eaten by Word.
pub fn text_run(content: &str) -> String {
    format!(
        r#"<w:r><w:t xml:space="preserve">{}</w:t></w:r>"#,
        escape_xml(content)
    )
}

/// An inline drawing run referencing an image relationship, with extents in
/// EMU. The `wp:` and `r:` namespaces are declared on the drawing itself so
/// the run is valid even in packages with minimal root declarations.
pub fn image_run(r_id: &str, doc_pr_id: u32, width_emu: i64, height_emu: i64) -> String {
    format!(
        concat!(
            r#"<w:r><w:drawing>"#,
            r#"<wp:inline distT="0" distB="0" distL="0" distR="0" xmlns:wp="http://schemas.openxmlformats.org/drawingml/2006/wordprocessingDrawing">"#,
            r#"<wp:extent cx="{cx}" cy="{cy}"/>"#,
            r#"<wp:effectExtent l="0" t="0" r="0" b="0"/>"#,
            r#"<wp:docPr id="{id}" name="Picture {id}"/>"#,
            r#"<wp:cNvGraphicFramePr><a:graphicFrameLocks xmlns:a="http://schemas.openxmlformats.org/drawingml/2006/main" noChangeAspect="1"/></wp:cNvGraphicFramePr>"#,
            r#"<a:graphic xmlns:a="http://schemas.openxmlformats.org/drawingml/2006/main">"#,
            r#"<a:graphicData uri="http://schemas.openxmlformats.org/drawingml/2006/picture">"#,
            r#"<pic:pic xmlns:pic="http://schemas.openxmlformats.org/drawingml/2006/picture">"#,
            r#"<pic:nvPicPr><pic:cNvPr id="0" name="Picture {id}"/><pic:cNvPicPr/></pic:nvPicPr>"#,
            r#"<pic:blipFill><a:blip r:embed="{rid}" xmlns:r="http://schemas.openxmlformats.org/officeDocument/2006/relationships"/><a:stretch><a:fillRect/></a:stretch></pic:blipFill>"#,
            r#"<pic:spPr><a:xfrm><a:off x="0" y="0"/><a:ext cx="{cx}" cy="{cy}"/></a:xfrm><a:prstGeom prst="rect"><a:avLst/></a:prstGeom></pic:spPr>"#,
            r#"</pic:pic></a:graphicData></a:graphic></wp:inline></w:drawing></w:r>"#,
        ),
        cx = width_emu,
        cy = height_emu,
        id = doc_pr_id,
        rid = r_id,
    )
}

// ─── Element range discovery ────────────────────────────────────────────────

/// Byte ranges (tags included) of the top-level `tag` elements in `xml`.
///
/// Nested occurrences (a table in a table cell, a paragraph in a text box)
/// are folded into their enclosing range; callers recurse where they need
/// the inner structure. Self-closing elements form their own range.
/// Prefix-sharing tags never match: looking for `w:p` will not pair with
/// `<w:pPr>`.
pub fn element_ranges(xml: &str, tag: &str) -> Vec<(usize, usize)> {
    let open_re =
        Regex::new(&format!(r"<{}(?: [^>]*)?/?>", regex::escape(tag))).expect("invalid tag regex");
    let close_tag = format!("</{}>", tag);

    enum Event {
        Open { end: usize, self_closing: bool },
        Close { end: usize },
    }

    let mut events: Vec<(usize, Event)> = open_re
        .find_iter(xml)
        .map(|m| {
            (
                m.start(),
                Event::Open {
                    end: m.end(),
                    self_closing: m.as_str().ends_with("/>"),
                },
            )
        })
        .collect();
    events.extend(
        xml.match_indices(&close_tag)
            .map(|(start, matched)| (start, Event::Close { end: start + matched.len() })),
    );
    events.sort_by_key(|(pos, _)| *pos);

    let mut ranges = Vec::new();
    let mut depth = 0usize;
    let mut span_start = 0usize;
    for (pos, event) in events {
        match event {
            Event::Open { end, self_closing: true } => {
                if depth == 0 {
                    ranges.push((pos, end));
                }
            }
            Event::Open { .. } => {
                if depth == 0 {
                    span_start = pos;
                }
                depth += 1;
            }
            Event::Close { end } => {
                depth = depth.saturating_sub(1);
                if depth == 0 {
                    ranges.push((span_start, end));
                }
            }
        }
    }
    ranges
}

// ─── Table measurements ─────────────────────────────────────────────────────

/// Row height in twips from the row's own `<w:trPr>`, if set.
pub fn row_height_twips(row_xml: &str) -> Option<i64> {
    // Restrict to before the first cell so a nested table's rows cannot
    // contribute their heights.
    let limit = row_xml.find("<w:tc").unwrap_or(row_xml.len());
    let head = &row_xml[..limit];
    let pr_start = head.find("<w:trPr>")?;
    let pr_end = head[pr_start..].find("</w:trPr>")? + pr_start;
    let value: i64 = TR_HEIGHT_RE.captures(&head[pr_start..pr_end])?[1].parse().ok()?;
    (value > 0).then_some(value)
}

/// Cell width in twips from the cell's `<w:tcPr>`, if it is a physical
/// width. `pct`/`auto` widths and zero values are not constraints; a missing
/// type attribute defaults to `dxa`.
pub fn cell_width_twips(cell_xml: &str) -> Option<i64> {
    let limit = cell_xml
        .find("<w:p")
        .into_iter()
        .chain(cell_xml.find("<w:tbl"))
        .min()
        .unwrap_or(cell_xml.len());
    let head = &cell_xml[..limit];
    let pr_start = head.find("<w:tcPr>")?;
    let pr_end = head[pr_start..].find("</w:tcPr>")? + pr_start;
    let tcw = TCW_RE.find(&head[pr_start..pr_end])?.as_str();
    if let Some(caps) = ATTR_TYPE_RE.captures(tcw) {
        if &caps[1] != "dxa" {
            return None;
        }
    }
    let value: i64 = ATTR_W_RE.captures(tcw)?[1].parse().ok()?;
    (value > 0).then_some(value)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_escape_unescape_round_trip() {
        let raw = r#"a < b && "c" > 'd'"#;
        assert_eq!(unescape_xml(&escape_xml(raw)), raw);
        assert_eq!(escape_xml("&"), "&amp;");
        assert_eq!(unescape_xml("&amp;lt;"), "&lt;");
    }

    #[test]
    fn test_para_text_concatenates_runs() {
        let para = r#"<w:p><w:pPr><w:jc w:val="left"/></w:pPr><w:r><w:t>A </w:t></w:r><w:r><w:t xml:space="preserve">&amp; B</w:t></w:r></w:p>"#;
        assert_eq!(para_text(para), "A & B");
    }

    #[test]
    fn test_para_text_empty_paragraph() {
        assert_eq!(para_text("<w:p/>"), "");
        assert_eq!(para_text(r#"<w:p><w:pPr/></w:p>"#), "");
    }

    #[test]
    fn test_text_run_escapes_and_preserves_space() {
        let run = text_run(" a & b ");
        assert_eq!(
            run,
            r#"<w:r><w:t xml:space="preserve"> a &amp; b </w:t></w:r>"#
        );
    }

    #[test]
    fn test_image_run_extents_and_ids() {
        let run = image_run("rId7", 3, 1_828_800, 365_760);
        assert!(run.contains(r#"<wp:extent cx="1828800" cy="365760"/>"#));
        assert!(run.contains(r#"<a:ext cx="1828800" cy="365760"/>"#));
        assert!(run.contains(r#"r:embed="rId7""#));
        assert!(run.contains(r#"<wp:docPr id="3" name="Picture 3"/>"#));
        assert!(run.starts_with("<w:r><w:drawing>"));
        assert!(run.ends_with("</w:drawing></w:r>"));
    }

    #[test]
    fn test_element_ranges_simple() {
        let xml = "<w:body><w:p>a</w:p><w:p>b</w:p></w:body>";
        let ranges = element_ranges(xml, "w:p");
        assert_eq!(ranges.len(), 2);
        assert_eq!(&xml[ranges[0].0..ranges[0].1], "<w:p>a</w:p>");
        assert_eq!(&xml[ranges[1].0..ranges[1].1], "<w:p>b</w:p>");
    }

    #[test]
    fn test_element_ranges_skips_prefix_sharing_tags() {
        let xml = r#"<w:p><w:pPr><w:jc/></w:pPr><w:r/></w:p>"#;
        let ranges = element_ranges(xml, "w:p");
        assert_eq!(ranges, vec![(0, xml.len())]);
    }

    #[test]
    fn test_element_ranges_self_closing() {
        let xml = r#"<w:p/><w:p w:rsidR="1"/><w:p>x</w:p>"#;
        let ranges = element_ranges(xml, "w:p");
        assert_eq!(ranges.len(), 3);
        assert_eq!(&xml[ranges[0].0..ranges[0].1], "<w:p/>");
        assert_eq!(&xml[ranges[1].0..ranges[1].1], r#"<w:p w:rsidR="1"/>"#);
    }

    #[test]
    fn test_element_ranges_nested_tables() {
        let xml = "<w:tbl>outer<w:tbl>inner</w:tbl>rest</w:tbl><w:tbl>two</w:tbl>";
        let ranges = element_ranges(xml, "w:tbl");
        assert_eq!(ranges.len(), 2);
        assert_eq!(
            &xml[ranges[0].0..ranges[0].1],
            "<w:tbl>outer<w:tbl>inner</w:tbl>rest</w:tbl>"
        );
        assert_eq!(&xml[ranges[1].0..ranges[1].1], "<w:tbl>two</w:tbl>");
    }

    #[test]
    fn test_row_height_from_trpr() {
        let row = r#"<w:tr><w:trPr><w:trHeight w:val="720" w:hRule="atLeast"/></w:trPr><w:tc><w:p/></w:tc></w:tr>"#;
        assert_eq!(row_height_twips(row), Some(720));
    }

    #[test]
    fn test_row_height_absent_or_zero() {
        assert_eq!(row_height_twips("<w:tr><w:tc><w:p/></w:tc></w:tr>"), None);
        let zero = r#"<w:tr><w:trPr><w:trHeight w:val="0"/></w:trPr><w:tc/></w:tr>"#;
        assert_eq!(row_height_twips(zero), None);
    }

    #[test]
    fn test_row_height_ignores_nested_rows() {
        // The outer row has no trPr; the nested table's row must not leak
        let row = r#"<w:tr><w:tc><w:tbl><w:tr><w:trPr><w:trHeight w:val="500"/></w:trPr><w:tc/></w:tr></w:tbl></w:tc></w:tr>"#;
        assert_eq!(row_height_twips(row), None);
    }

    #[test]
    fn test_cell_width_dxa() {
        let cell = r#"<w:tc><w:tcPr><w:tcW w:w="2880" w:type="dxa"/></w:tcPr><w:p/></w:tc>"#;
        assert_eq!(cell_width_twips(cell), Some(2880));
    }

    #[test]
    fn test_cell_width_default_type_is_dxa() {
        let cell = r#"<w:tc><w:tcPr><w:tcW w:w="1440"/></w:tcPr><w:p/></w:tc>"#;
        assert_eq!(cell_width_twips(cell), Some(1440));
    }

    #[test]
    fn test_cell_width_pct_auto_zero_unconstrained() {
        let pct = r#"<w:tc><w:tcPr><w:tcW w:w="2500" w:type="pct"/></w:tcPr><w:p/></w:tc>"#;
        assert_eq!(cell_width_twips(pct), None);
        let auto = r#"<w:tc><w:tcPr><w:tcW w:w="0" w:type="auto"/></w:tcPr><w:p/></w:tc>"#;
        assert_eq!(cell_width_twips(auto), None);
        let zero = r#"<w:tc><w:tcPr><w:tcW w:w="0" w:type="dxa"/></w:tcPr><w:p/></w:tc>"#;
        assert_eq!(cell_width_twips(zero), None);
        assert_eq!(cell_width_twips("<w:tc><w:p/></w:tc>"), None);
    }
}
