//! Synthesized PDFs for unit tests.

use lopdf::content::{Content, Operation};
use lopdf::{dictionary, Document, Object, Stream};

/// One page of a fixture: text lines at `(x, y)` user-space baselines and an
/// optional image placed at `(x0, y0, x1, y1)`.
#[derive(Debug, Clone, Default)]
pub struct PageFixture {
    pub lines: Vec<(f64, f64, String)>,
    pub image: Option<(f64, f64, f64, f64)>,
}

impl PageFixture {
    pub fn text(text: &str) -> Self {
        Self::lines(&[(72.0, 700.0, text)])
    }

    pub fn lines(lines: &[(f64, f64, &str)]) -> Self {
        Self {
            lines: lines
                .iter()
                .map(|(x, y, t)| (*x, *y, t.to_string()))
                .collect(),
            image: None,
        }
    }

    pub fn image(rect: (f64, f64, f64, f64)) -> Self {
        Self {
            lines: Vec::new(),
            image: Some(rect),
        }
    }

    fn operations(&self) -> Vec<Operation> {
        let mut ops = Vec::new();
        if let Some((x0, y0, x1, y1)) = self.image {
            ops.push(Operation::new("q", vec![]));
            ops.push(Operation::new(
                "cm",
                vec![
                    Object::Real((x1 - x0) as f32),
                    0.into(),
                    0.into(),
                    Object::Real((y1 - y0) as f32),
                    Object::Real(x0 as f32),
                    Object::Real(y0 as f32),
                ],
            ));
            ops.push(Operation::new("Do", vec![Object::Name(b"Im1".to_vec())]));
            ops.push(Operation::new("Q", vec![]));
        }
        for (x, y, text) in &self.lines {
            ops.push(Operation::new("BT", vec![]));
            ops.push(Operation::new("Tf", vec!["F1".into(), 12.into()]));
            ops.push(Operation::new(
                "Td",
                vec![Object::Real(*x as f32), Object::Real(*y as f32)],
            ));
            ops.push(Operation::new("Tj", vec![Object::string_literal(text.as_str())]));
            ops.push(Operation::new("ET", vec![]));
        }
        ops
    }
}

/// Build a document with Letter pages inheriting their box and resources.
pub fn simple_pdf(fixtures: &[PageFixture]) -> Document {
    let mut doc = Document::with_version("1.5");
    let pages_id = doc.new_object_id();

    let font_id = doc.add_object(dictionary! {
        "Type" => "Font",
        "Subtype" => "Type1",
        "BaseFont" => "Helvetica",
    });
    let image_id = doc.add_object(Stream::new(
        dictionary! {
            "Type" => "XObject",
            "Subtype" => "Image",
            "Width" => 1,
            "Height" => 1,
            "ColorSpace" => "DeviceGray",
            "BitsPerComponent" => 8,
        },
        vec![0u8],
    ));
    let resources_id = doc.add_object(dictionary! {
        "Font" => dictionary! { "F1" => font_id },
        "XObject" => dictionary! { "Im1" => image_id },
    });

    let mut kids: Vec<Object> = Vec::new();
    for fixture in fixtures {
        let content = Content {
            operations: fixture.operations(),
        };
        let content_id = doc.add_object(Stream::new(
            dictionary! {},
            content.encode().expect("fixture content encodes"),
        ));
        let page_id = doc.add_object(dictionary! {
            "Type" => "Page",
            "Parent" => pages_id,
            "Contents" => content_id,
        });
        kids.push(page_id.into());
    }

    let pages = dictionary! {
        "Type" => "Pages",
        "Kids" => kids,
        "Count" => fixtures.len() as i64,
        "Resources" => resources_id,
        "MediaBox" => vec![0.into(), 0.into(), 612.into(), 792.into()],
    };
    doc.objects.insert(pages_id, Object::Dictionary(pages));

    let catalog_id = doc.add_object(dictionary! {
        "Type" => "Catalog",
        "Pages" => pages_id,
    });
    doc.trailer.set("Root", catalog_id);
    doc
}

pub fn pdf_bytes(fixtures: &[PageFixture]) -> Vec<u8> {
    let mut doc = simple_pdf(fixtures);
    let mut out = Vec::new();
    doc.save_to(&mut out).expect("fixture saves");
    out
}
