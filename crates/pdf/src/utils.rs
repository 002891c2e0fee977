use lopdf::{Dictionary, Document, Object, ObjectId, Stream};

use crate::{PdfError, Result};

/// Effective page box in PDF user space (`llx, lly, urx, ury`).
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct PageBox {
    pub llx: f64,
    pub lly: f64,
    pub urx: f64,
    pub ury: f64,
}

impl PageBox {
    pub const LETTER: PageBox = PageBox {
        llx: 0.0,
        lly: 0.0,
        urx: 612.0,
        ury: 792.0,
    };

    pub fn width(&self) -> f64 {
        (self.urx - self.llx).abs()
    }

    pub fn height(&self) -> f64 {
        (self.ury - self.lly).abs()
    }

    /// User-space point to top-left page coordinates.
    pub fn to_page(&self, x: f64, y: f64) -> (f64, f64) {
        (x - self.llx, self.ury - y)
    }

    /// Top-left page rectangle to a user-space `(x, y, w, h)` rectangle.
    pub fn to_user_rect(&self, x0: f64, y0: f64, x1: f64, y1: f64) -> (f64, f64, f64, f64) {
        (self.llx + x0, self.ury - y1, x1 - x0, y1 - y0)
    }
}

/// Read a number operand.
pub fn get_number(obj: &Object) -> Option<f64> {
    match obj {
        Object::Integer(i) => Some(*i as f64),
        Object::Real(r) => Some(*r as f64),
        _ => None,
    }
}

fn extract_box_values(arr: &[Object]) -> Option<PageBox> {
    let values: Vec<f64> = arr.iter().filter_map(get_number).collect();
    if values.len() != 4 {
        return None;
    }
    Some(PageBox {
        llx: values[0].min(values[2]),
        lly: values[1].min(values[3]),
        urx: values[0].max(values[2]),
        ury: values[1].max(values[3]),
    })
}

fn resolve<'a>(doc: &'a Document, obj: &'a Object) -> Option<&'a Object> {
    match obj {
        Object::Reference(id) => doc.get_object(*id).ok(),
        other => Some(other),
    }
}

fn resolve_dict<'a>(doc: &'a Document, obj: &'a Object) -> Option<&'a Dictionary> {
    resolve(doc, obj)?.as_dict().ok()
}

/// Look up a page attribute, following the `Parent` chain for inheritable keys.
fn inherited<'a>(doc: &'a Document, page_id: ObjectId, key: &[u8]) -> Option<&'a Object> {
    let mut current = doc.get_dictionary(page_id).ok()?;
    for _ in 0..32 {
        if let Ok(value) = current.get(key) {
            return resolve(doc, value);
        }
        current = resolve_dict(doc, current.get(b"Parent").ok()?)?;
    }
    None
}

/// Effective page box: CropBox, then MediaBox (both inheritable), then Letter.
pub fn get_page_box(doc: &Document, page_id: ObjectId) -> PageBox {
    for key in [&b"CropBox"[..], &b"MediaBox"[..]] {
        if let Some(Object::Array(arr)) = inherited(doc, page_id, key) {
            if let Some(page_box) = extract_box_values(arr) {
                return page_box;
            }
        }
    }
    log::warn!("[PageBox] no usable box on page {:?}, using Letter", page_id);
    PageBox::LETTER
}

pub fn get_page_rotation(doc: &Document, page_id: ObjectId) -> i64 {
    match inherited(doc, page_id, b"Rotate") {
        Some(Object::Integer(r)) => r.rem_euclid(360),
        _ => 0,
    }
}

/// Image XObject names available to a page.
pub fn page_image_xobjects(doc: &Document, page_id: ObjectId) -> Vec<Vec<u8>> {
    let Some(resources) = inherited(doc, page_id, b"Resources").and_then(|o| o.as_dict().ok())
    else {
        return Vec::new();
    };
    let Some(xobjects) = resources
        .get(b"XObject")
        .ok()
        .and_then(|o| resolve_dict(doc, o))
    else {
        return Vec::new();
    };

    xobjects
        .iter()
        .filter_map(|(name, obj)| {
            let stream = resolve(doc, obj)?.as_stream().ok()?;
            match stream.dict.get(b"Subtype") {
                Ok(Object::Name(n)) if n == b"Image" => Some(name.clone()),
                _ => None,
            }
        })
        .collect()
}

/// Get stream content, compressed or not.
pub fn get_stream_content(stream: &Stream) -> Vec<u8> {
    match stream.decompressed_content() {
        Ok(data) => data,
        Err(_) => stream.content.clone(),
    }
}

/// Concatenated content stream data of a page.
pub fn get_page_content(doc: &Document, page_id: ObjectId) -> Result<Vec<u8>> {
    let dict = doc.get_dictionary(page_id)?;
    let contents = match dict.get(b"Contents") {
        Ok(c) => c,
        Err(_) => return Ok(Vec::new()),
    };

    match resolve(doc, contents) {
        Some(Object::Stream(stream)) => Ok(get_stream_content(stream)),
        Some(Object::Array(arr)) => {
            let mut all_content = Vec::new();
            for item in arr {
                if let Some(Object::Stream(stream)) = resolve(doc, item) {
                    all_content.extend(get_stream_content(stream));
                    all_content.push(b'\n');
                }
            }
            Ok(all_content)
        }
        _ => Err(PdfError::Content(format!(
            "page {:?} has unreadable contents",
            page_id
        ))),
    }
}

/// Replace a page's contents with a single new stream.
pub fn set_page_content(doc: &mut Document, page_id: ObjectId, data: Vec<u8>) -> Result<()> {
    let stream = Stream::new(Dictionary::new(), data);
    let stream_id = doc.add_object(stream);
    let dict = doc.get_dictionary_mut(page_id)?;
    dict.set("Contents", Object::Reference(stream_id));
    Ok(())
}
