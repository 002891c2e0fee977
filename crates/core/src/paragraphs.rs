//! Paragraph segmentation for raw-text extraction paths.

use crate::config::{MAX_PARAGRAPHS, PARAGRAPH_MAX_LINES, PARAGRAPH_SHORT_LINE};

/// Group lines into paragraphs.
///
/// A line of at most two characters acts as a break when something is
/// buffered, and is itself dropped. Buffers are also flushed every eight
/// lines and at the end of input. Output is capped at 200 paragraphs.
pub fn to_paragraphs<I, S>(lines: I) -> Vec<String>
where
    I: IntoIterator<Item = S>,
    S: AsRef<str>,
{
    let mut paragraphs = Vec::new();
    let mut buf: Vec<String> = Vec::new();

    for line in lines {
        let line = line.as_ref();
        if line.chars().count() <= PARAGRAPH_SHORT_LINE && !buf.is_empty() {
            paragraphs.push(buf.join(" "));
            buf.clear();
            continue;
        }
        buf.push(line.to_string());
        if buf.len() >= PARAGRAPH_MAX_LINES {
            paragraphs.push(buf.join(" "));
            buf.clear();
        }
    }

    if !buf.is_empty() {
        paragraphs.push(buf.join(" "));
    }

    paragraphs.truncate(MAX_PARAGRAPHS);
    paragraphs
}

/// Split raw text on line breaks, keep the non-empty trimmed lines, then
/// segment them.
pub fn text_to_paragraphs(text: &str) -> Vec<String> {
    to_paragraphs(text.lines().map(str::trim).filter(|l| !l.is_empty()))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_short_line_breaks_paragraph() {
        let out = to_paragraphs(["alpha", "beta", "", "gamma"]);
        assert_eq!(out, vec!["alpha beta", "gamma"]);
    }

    #[test]
    fn test_eight_line_flush() {
        let lines: Vec<String> = (0..10).map(|i| format!("line {i}")).collect();
        let out = to_paragraphs(&lines);
        assert_eq!(out.len(), 2);
        assert!(out[0].starts_with("line 0") && out[0].ends_with("line 7"));
        assert_eq!(out[1], "line 8 line 9");
    }

    #[test]
    fn test_leading_short_line_is_kept() {
        // Nothing is buffered yet, so the short line becomes content.
        let out = to_paragraphs(["--", "text"]);
        assert_eq!(out, vec!["-- text"]);
    }

    #[test]
    fn test_cap() {
        let lines: Vec<&str> = std::iter::repeat(["word", ""]).take(300).flatten().collect();
        assert_eq!(to_paragraphs(lines).len(), 200);
    }

    #[test]
    fn test_text_to_paragraphs() {
        let out = text_to_paragraphs("  first line \nsecond\n\nthird\n");
        assert_eq!(out, vec!["first line second third"]);
    }

    #[test]
    fn test_blank_lines_are_not_content() {
        assert_eq!(text_to_paragraphs("\nalpha\n\nbeta\n"), vec!["alpha beta"]);
        assert_eq!(text_to_paragraphs("alpha\nxy\nbeta"), vec!["alpha", "beta"]);
        assert!(text_to_paragraphs(" \n\n").is_empty());
    }
}
