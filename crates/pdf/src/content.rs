//! Content stream walking.
//!
//! Tracks the graphics and text state needed to place each shown byte on the
//! page. Glyph widths are estimated (half an em for ASCII, a full em
//! otherwise) since font metrics are not consulted.

use lopdf::content::{Content, Operation};
use lopdf::{Document, Object, ObjectId};
use std::collections::HashSet;

use crate::utils::{get_number, get_page_content, page_image_xobjects};
use crate::Result;

pub type Matrix = [f64; 6];

pub const IDENTITY: Matrix = [1.0, 0.0, 0.0, 1.0, 0.0, 0.0];

/// `m1` followed by `m2`.
pub fn multiply(m1: &Matrix, m2: &Matrix) -> Matrix {
    [
        m1[0] * m2[0] + m1[1] * m2[2],
        m1[0] * m2[1] + m1[1] * m2[3],
        m1[2] * m2[0] + m1[3] * m2[2],
        m1[2] * m2[1] + m1[3] * m2[3],
        m1[4] * m2[0] + m1[5] * m2[2] + m2[4],
        m1[4] * m2[1] + m1[5] * m2[3] + m2[5],
    ]
}

pub fn transform(m: &Matrix, x: f64, y: f64) -> (f64, f64) {
    (m[0] * x + m[2] * y + m[4], m[1] * x + m[3] * y + m[5])
}

fn translate(tx: f64, ty: f64) -> Matrix {
    [1.0, 0.0, 0.0, 1.0, tx, ty]
}

/// Bounding box of a transformed rectangle, in user space.
fn transform_rect(m: &Matrix, x0: f64, y0: f64, x1: f64, y1: f64) -> [f64; 4] {
    let corners = [
        transform(m, x0, y0),
        transform(m, x1, y0),
        transform(m, x0, y1),
        transform(m, x1, y1),
    ];
    let mut out = [f64::MAX, f64::MAX, f64::MIN, f64::MIN];
    for (x, y) in corners {
        out[0] = out[0].min(x);
        out[1] = out[1].min(y);
        out[2] = out[2].max(x);
        out[3] = out[3].max(y);
    }
    out
}

/// Estimated advance of one byte, in em.
fn estimate_char_width(byte: u8) -> f64 {
    if byte < 128 {
        0.55
    } else {
        1.0
    }
}

/// One shown byte placed in user space (`x0, y0, x1, y1`, y up).
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct GlyphBox {
    pub byte: u8,
    pub rect: [f64; 4],
}

impl GlyphBox {
    pub fn intersects(&self, rect: &[f64; 4]) -> bool {
        self.rect[0] < rect[2]
            && rect[0] < self.rect[2]
            && self.rect[1] < rect[3]
            && rect[1] < self.rect[3]
    }
}

/// Where a shown string lives inside its operation.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StringSlot {
    Operand(usize),
    ArrayItem(usize),
}

#[derive(Debug, Clone)]
pub struct ShownString {
    pub slot: StringSlot,
    pub glyphs: Vec<GlyphBox>,
}

#[derive(Debug, Clone, Copy)]
struct GraphicsState {
    ctm: Matrix,
    font_size: f64,
    char_spacing: f64,
    word_spacing: f64,
    h_scale: f64,
    leading: f64,
    rise: f64,
}

impl Default for GraphicsState {
    fn default() -> Self {
        Self {
            ctm: IDENTITY,
            font_size: 12.0,
            char_spacing: 0.0,
            word_spacing: 0.0,
            h_scale: 1.0,
            leading: 0.0,
            rise: 0.0,
        }
    }
}

fn numbers<const N: usize>(op: &Operation) -> Option<[f64; N]> {
    if op.operands.len() < N {
        return None;
    }
    let mut out = [0.0; N];
    for (slot, obj) in out.iter_mut().zip(&op.operands) {
        *slot = get_number(obj)?;
    }
    Some(out)
}

/// Interprets operators one at a time and reports where shown text lands.
#[derive(Debug, Default)]
pub struct ContentWalker {
    state: GraphicsState,
    stack: Vec<GraphicsState>,
    text_matrix: Matrix,
    line_matrix: Matrix,
}

impl ContentWalker {
    pub fn new() -> Self {
        Self {
            text_matrix: IDENTITY,
            line_matrix: IDENTITY,
            ..Default::default()
        }
    }

    pub fn ctm(&self) -> Matrix {
        self.state.ctm
    }

    fn move_line(&mut self, tx: f64, ty: f64) {
        self.line_matrix = multiply(&translate(tx, ty), &self.line_matrix);
        self.text_matrix = self.line_matrix;
    }

    fn advance(&mut self, tx: f64) {
        self.text_matrix = multiply(&translate(tx, 0.0), &self.text_matrix);
    }

    fn show(&mut self, bytes: &[u8]) -> Vec<GlyphBox> {
        let fs = self.state.font_size;
        let th = self.state.h_scale;
        let low = self.state.rise - 0.2 * fs;
        let high = self.state.rise + 0.8 * fs;

        bytes
            .iter()
            .map(|&byte| {
                let width = estimate_char_width(byte) * fs * th;
                let m = multiply(&self.text_matrix, &self.state.ctm);
                let rect = transform_rect(&m, 0.0, low, width, high);

                let spacing = if byte == b' ' {
                    self.state.char_spacing + self.state.word_spacing
                } else {
                    self.state.char_spacing
                };
                self.advance(width + spacing * th);
                GlyphBox { byte, rect }
            })
            .collect()
    }

    /// Apply one operator. Text-showing operators return the placed strings.
    pub fn visit(&mut self, op: &Operation) -> Vec<ShownString> {
        match op.operator.as_str() {
            "q" => self.stack.push(self.state),
            "Q" => {
                if let Some(saved) = self.stack.pop() {
                    self.state = saved;
                }
            }
            "cm" => {
                if let Some(m) = numbers::<6>(op) {
                    self.state.ctm = multiply(&m, &self.state.ctm);
                }
            }
            "BT" => {
                self.text_matrix = IDENTITY;
                self.line_matrix = IDENTITY;
            }
            "Tf" if op.operands.len() >= 2 => {
                if let Some(size) = get_number(&op.operands[1]) {
                    self.state.font_size = size;
                }
            }
            "Tc" => {
                if let Some([v]) = numbers::<1>(op) {
                    self.state.char_spacing = v;
                }
            }
            "Tw" => {
                if let Some([v]) = numbers::<1>(op) {
                    self.state.word_spacing = v;
                }
            }
            "Tz" => {
                if let Some([v]) = numbers::<1>(op) {
                    self.state.h_scale = v / 100.0;
                }
            }
            "TL" => {
                if let Some([v]) = numbers::<1>(op) {
                    self.state.leading = v;
                }
            }
            "Ts" => {
                if let Some([v]) = numbers::<1>(op) {
                    self.state.rise = v;
                }
            }
            "Td" => {
                if let Some([tx, ty]) = numbers::<2>(op) {
                    self.move_line(tx, ty);
                }
            }
            "TD" => {
                if let Some([tx, ty]) = numbers::<2>(op) {
                    self.state.leading = -ty;
                    self.move_line(tx, ty);
                }
            }
            "Tm" => {
                if let Some(m) = numbers::<6>(op) {
                    self.text_matrix = m;
                    self.line_matrix = m;
                }
            }
            "T*" => self.move_line(0.0, -self.state.leading),
            "Tj" => return self.show_operand(op, 0),
            "'" => {
                self.move_line(0.0, -self.state.leading);
                return self.show_operand(op, 0);
            }
            "\"" => {
                if let Some([aw, ac]) = numbers::<2>(op) {
                    self.state.word_spacing = aw;
                    self.state.char_spacing = ac;
                }
                self.move_line(0.0, -self.state.leading);
                return self.show_operand(op, 2);
            }
            "TJ" => return self.show_array(op),
            _ => {}
        }
        Vec::new()
    }

    fn show_operand(&mut self, op: &Operation, index: usize) -> Vec<ShownString> {
        match op.operands.get(index) {
            Some(Object::String(bytes, _)) => vec![ShownString {
                slot: StringSlot::Operand(index),
                glyphs: self.show(bytes),
            }],
            _ => Vec::new(),
        }
    }

    fn show_array(&mut self, op: &Operation) -> Vec<ShownString> {
        let Some(Object::Array(items)) = op.operands.first() else {
            return Vec::new();
        };
        let mut shown = Vec::new();
        for (i, item) in items.iter().enumerate() {
            match item {
                Object::String(bytes, _) => shown.push(ShownString {
                    slot: StringSlot::ArrayItem(i),
                    glyphs: self.show(bytes),
                }),
                other => {
                    if let Some(adjust) = get_number(other) {
                        let tx = -adjust / 1000.0 * self.state.font_size * self.state.h_scale;
                        self.advance(tx);
                    }
                }
            }
        }
        shown
    }
}

/// Text and image placements of one page, in user space.
#[derive(Debug, Clone, Default)]
pub struct PageContent {
    /// Shown characters in content order, decoded as single bytes. A `None`
    /// separates strings that came from different show operations.
    pub glyphs: Vec<Option<(char, [f64; 4])>>,
    pub images: Vec<[f64; 4]>,
}

/// Walk a page's content stream collecting glyph and image placements.
pub fn scan_page(doc: &Document, page_id: ObjectId) -> Result<PageContent> {
    let data = get_page_content(doc, page_id)?;
    let image_names: HashSet<Vec<u8>> = page_image_xobjects(doc, page_id).into_iter().collect();
    scan_content(&data, &image_names)
}

pub fn scan_content(data: &[u8], image_names: &HashSet<Vec<u8>>) -> Result<PageContent> {
    let content = Content::decode(data)?;
    let mut walker = ContentWalker::new();
    let mut page = PageContent::default();

    for op in &content.operations {
        if op.operator == "Do" {
            if let Some(Object::Name(name)) = op.operands.first() {
                if image_names.contains(name) {
                    page.images
                        .push(transform_rect(&walker.ctm(), 0.0, 0.0, 1.0, 1.0));
                }
            }
            continue;
        }

        let shown = walker.visit(op);
        if shown.is_empty() {
            continue;
        }
        for s in shown {
            page.glyphs
                .extend(s.glyphs.iter().map(|g| Some((g.byte as char, g.rect))));
        }
        page.glyphs.push(None);
    }

    log::debug!(
        "[Content] {} glyphs, {} images",
        page.glyphs.iter().flatten().count(),
        page.images.len()
    );
    Ok(page)
}
