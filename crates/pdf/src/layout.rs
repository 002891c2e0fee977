//! Group positioned characters into word tokens and text blocks.

use docshield_core::geometry::union;
use docshield_core::{BBox, BlockKind, ContentBlock, Token};
use std::collections::BTreeMap;

/// A positioned character in top-left page coordinates, or a run boundary.
#[derive(Debug, Clone, PartialEq)]
pub enum Glyph {
    Char { ch: char, bbox: BBox },
    Break,
}

/// Horizontal gap, in glyph heights, that starts a new word.
const WORD_GAP: f64 = 0.25;
/// Vertical shift, in glyph heights, that starts a new line.
const LINE_SHIFT: f64 = 0.5;
/// Gap between lines, in glyph heights, that starts a new block.
const BLOCK_GAP: f64 = 1.2;

#[derive(Default)]
struct Builder {
    tokens: Vec<Token>,
    text: String,
    boxes: Vec<BBox>,
    block: u32,
    line: u32,
    word: u32,
}

impl Builder {
    fn flush(&mut self) {
        if self.text.is_empty() {
            return;
        }
        let text = std::mem::take(&mut self.text);
        if let Some(bbox) = union(&self.boxes) {
            self.tokens.push(Token {
                bbox,
                text,
                block_index: self.block,
                line_index: self.line,
                word_index: self.word,
            });
            self.word += 1;
        }
        self.boxes.clear();
    }
}

fn mid_y(b: &BBox) -> f64 {
    (b.y0 + b.y1) / 2.0
}

/// Build word tokens from characters in reading order.
pub fn glyphs_to_tokens(glyphs: &[Glyph]) -> Vec<Token> {
    let mut builder = Builder::default();
    let mut last: Option<BBox> = None;

    for glyph in glyphs {
        let (ch, bbox) = match glyph {
            Glyph::Break => {
                builder.flush();
                continue;
            }
            Glyph::Char { ch, bbox } => (*ch, *bbox),
        };
        if ch.is_whitespace() || ch.is_control() {
            builder.flush();
            continue;
        }

        if let Some(prev) = last {
            let h = prev.height().max(bbox.height()).max(1.0);
            let new_line =
                (mid_y(&bbox) - mid_y(&prev)).abs() > LINE_SHIFT * h || bbox.x1 <= prev.x0;
            if new_line {
                builder.flush();
                let gap = bbox.y0 - prev.y1;
                if gap > BLOCK_GAP * h || bbox.y1 < prev.y0 - h {
                    builder.block += 1;
                    builder.line = 0;
                } else {
                    builder.line += 1;
                }
                builder.word = 0;
            } else if bbox.x0 - prev.x1 > WORD_GAP * h {
                builder.flush();
            }
        }

        builder.text.push(ch);
        builder.boxes.push(bbox);
        last = Some(bbox);
    }

    builder.flush();
    builder.tokens
}

/// One text block per block index, enclosing its tokens.
pub fn text_blocks(tokens: &[Token]) -> Vec<ContentBlock> {
    let mut by_block: BTreeMap<u32, Vec<BBox>> = BTreeMap::new();
    for token in tokens {
        by_block.entry(token.block_index).or_default().push(token.bbox);
    }
    by_block
        .values()
        .filter_map(|boxes| union(boxes))
        .map(|bbox| ContentBlock {
            bbox,
            kind: BlockKind::Text,
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    /// Lay out `text` as 6pt-wide, 10pt-tall characters starting at (x, y).
    fn run(text: &str, x: f64, y: f64) -> Vec<Glyph> {
        text.chars()
            .enumerate()
            .map(|(i, ch)| {
                let x0 = x + i as f64 * 6.0;
                Glyph::Char {
                    ch,
                    bbox: BBox::new(x0, y, x0 + 6.0, y + 10.0).unwrap(),
                }
            })
            .collect()
    }

    fn texts(tokens: &[Token]) -> Vec<&str> {
        tokens.iter().map(|t| t.text.as_str()).collect()
    }

    #[test]
    fn test_spaces_split_words() {
        let tokens = glyphs_to_tokens(&run("Jane Doe", 72.0, 100.0));
        assert_eq!(texts(&tokens), vec!["Jane", "Doe"]);
        assert_eq!(tokens[1].word_index, 1);
        assert_eq!(tokens[0].bbox, BBox::new(72.0, 100.0, 96.0, 110.0).unwrap());
    }

    #[test]
    fn test_gap_splits_words() {
        let mut glyphs = run("ab", 0.0, 0.0);
        glyphs.extend(run("cd", 30.0, 0.0));
        assert_eq!(texts(&glyphs_to_tokens(&glyphs)), vec!["ab", "cd"]);
    }

    #[test]
    fn test_lines_and_blocks() {
        let mut glyphs = run("one", 72.0, 100.0);
        glyphs.push(Glyph::Break);
        glyphs.extend(run("two", 72.0, 112.0));
        glyphs.push(Glyph::Break);
        glyphs.extend(run("three", 72.0, 200.0));

        let tokens = glyphs_to_tokens(&glyphs);
        let keys: Vec<_> = tokens.iter().map(|t| t.order_key()).collect();
        assert_eq!(keys, vec![(0, 0, 0), (0, 1, 0), (1, 0, 0)]);

        let blocks = text_blocks(&tokens);
        assert_eq!(blocks.len(), 2);
        assert_eq!(blocks[0].bbox, BBox::new(72.0, 100.0, 90.0, 122.0).unwrap());
        assert_eq!(blocks[1].kind, BlockKind::Text);
    }

    #[test]
    fn test_break_without_move_keeps_line() {
        let mut glyphs = run("Name:", 72.0, 100.0);
        glyphs.push(Glyph::Break);
        glyphs.extend(run("Jane", 110.0, 100.0));
        let tokens = glyphs_to_tokens(&glyphs);
        assert_eq!(texts(&tokens), vec!["Name:", "Jane"]);
        assert!(tokens[0].same_line(&tokens[1]));
    }

    #[test]
    fn test_empty_input() {
        assert!(glyphs_to_tokens(&[]).is_empty());
        assert!(text_blocks(&[]).is_empty());
    }
}
