//! Markdown image-link detection and paragraph segmentation.
//!
//! A paragraph's text is scanned for `![alt](url)` tokens and split into an
//! ordered list of segments: literal text runs and image references. The
//! segment list carries enough information (the original full tag) to put a
//! link back verbatim when its image cannot be fetched.

use lazy_static::lazy_static;
use regex::Regex;

lazy_static! {
    // Group 0: the full tag, e.g. ![](http://x/a.png)
    // Group 1: the URL itself
    static ref LINK_PATTERN: Regex = Regex::new(r"!\[.*?\]\((.*?)\)").expect("invalid regex");
}

/// One detected image link inside a text block.
///
/// Offsets are byte positions into the scanned text; matches are
/// non-overlapping and ordered by `start`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LinkMatch {
    /// The complete tag as it appears in the text.
    pub full: String,
    /// The captured URL between the parentheses.
    pub url: String,
    pub start: usize,
    pub end: usize,
}

/// One atomic unit of a rebuilt paragraph.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Segment {
    /// Literal text between (or around) image links.
    Text(String),
    /// An image reference. `original` is the full tag, kept for the
    /// fallback path when the URL cannot be resolved.
    Image { url: String, original: String },
}

/// Find all image-link tokens in `text`, in order.
///
/// An empty result is not an error — it means the block has no links and
/// should be left untouched. Blocks without a `!` cannot contain a token,
/// so they are skipped without running the regex.
pub fn scan_links(text: &str) -> Vec<LinkMatch> {
    if !text.contains('!') {
        return Vec::new();
    }
    LINK_PATTERN
        .captures_iter(text)
        .map(|caps| {
            let full = caps.get(0).expect("no match");
            let url = caps.get(1).expect("no group 1");
            LinkMatch {
                full: full.as_str().to_string(),
                url: url.as_str().to_string(),
                start: full.start(),
                end: full.end(),
            }
        })
        .collect()
}

/// Split `text` into segments around `matches`.
///
/// Empty gaps produce no Text segment. Concatenating the Text contents with
/// each Image segment's `original` in place reconstructs `text` exactly.
pub fn build_segments(text: &str, matches: &[LinkMatch]) -> Vec<Segment> {
    let mut segments = Vec::with_capacity(matches.len() * 2 + 1);
    let mut last_end = 0;
    for m in matches {
        if m.start > last_end {
            segments.push(Segment::Text(text[last_end..m.start].to_string()));
        }
        segments.push(Segment::Image {
            url: m.url.clone(),
            original: m.full.clone(),
        });
        last_end = m.end;
    }
    if last_end < text.len() {
        segments.push(Segment::Text(text[last_end..].to_string()));
    }
    segments
}

#[cfg(test)]
mod tests {
    use super::*;

    /// Reassemble the original text from a segment list.
    fn reassemble(segments: &[Segment]) -> String {
        segments
            .iter()
            .map(|s| match s {
                Segment::Text(t) => t.as_str(),
                Segment::Image { original, .. } => original.as_str(),
            })
            .collect()
    }

    #[test]
    fn test_scan_single_link() {
        let matches = scan_links("before ![alt](http://x/a.png) after");
        assert_eq!(matches.len(), 1);
        assert_eq!(matches[0].full, "![alt](http://x/a.png)");
        assert_eq!(matches[0].url, "http://x/a.png");
        assert_eq!(matches[0].start, 7);
        assert_eq!(matches[0].end, 29);
    }

    #[test]
    fn test_scan_multiple_links() {
        let matches = scan_links("![](http://a) mid ![x](http://b)![](http://c)");
        assert_eq!(matches.len(), 3);
        assert_eq!(matches[0].url, "http://a");
        assert_eq!(matches[1].url, "http://b");
        assert_eq!(matches[2].url, "http://c");
        // Non-overlapping and ordered
        assert!(matches[0].end <= matches[1].start);
        assert!(matches[1].end <= matches[2].start);
    }

    #[test]
    fn test_scan_no_false_positives() {
        // A plain markdown link is not an image link
        assert!(scan_links("[alt](http://x/a.png)").is_empty());
        // Bang without the bracket structure
        assert!(scan_links("hello! http://x/a.png").is_empty());
        // Unterminated tag
        assert!(scan_links("![alt](http://x/a.png").is_empty());
        assert!(scan_links("").is_empty());
    }

    #[test]
    fn test_scan_non_greedy() {
        // Two adjacent tags must not be swallowed into one match
        let matches = scan_links("![a](u1)![b](u2)");
        assert_eq!(matches.len(), 2);
        assert_eq!(matches[0].url, "u1");
        assert_eq!(matches[1].url, "u2");
    }

    #[test]
    fn test_scan_non_http_url_still_matches() {
        // The fast-skip must not change results: a local path link is still
        // a match (it fails later at fetch time instead).
        let matches = scan_links("see ![pic](images/local.png)");
        assert_eq!(matches.len(), 1);
        assert_eq!(matches[0].url, "images/local.png");
    }

    #[test]
    fn test_scan_empty_alt_and_url() {
        let matches = scan_links("![]()");
        assert_eq!(matches.len(), 1);
        assert_eq!(matches[0].url, "");
        assert_eq!(matches[0].full, "![]()");
    }

    #[test]
    fn test_build_segments_interleaved() {
        let text = "A: ![](http://x/a.png) B ![](http://x/b.png)";
        let matches = scan_links(text);
        let segments = build_segments(text, &matches);
        assert_eq!(
            segments,
            vec![
                Segment::Text("A: ".to_string()),
                Segment::Image {
                    url: "http://x/a.png".to_string(),
                    original: "![](http://x/a.png)".to_string(),
                },
                Segment::Text(" B ".to_string()),
                Segment::Image {
                    url: "http://x/b.png".to_string(),
                    original: "![](http://x/b.png)".to_string(),
                },
            ]
        );
        assert_eq!(reassemble(&segments), text);
    }

    #[test]
    fn test_build_segments_omits_empty_gaps() {
        let text = "![a](u1)![b](u2)";
        let segments = build_segments(text, &scan_links(text));
        // No empty Text segments between, before, or after the images
        assert_eq!(segments.len(), 2);
        assert!(matches!(segments[0], Segment::Image { .. }));
        assert!(matches!(segments[1], Segment::Image { .. }));
        assert_eq!(reassemble(&segments), text);
    }

    #[test]
    fn test_build_segments_round_trip_multibyte() {
        let text = "图片：![示例](http://x/图.png)，完";
        let segments = build_segments(text, &scan_links(text));
        assert_eq!(reassemble(&segments), text);
    }
}
