//! lopdf-backed document engine
//!
//! Page copying uses "construction by whitelist": starting from the page
//! dictionary, every object reachable from it is imported into the
//! destination under a fresh object id. The page tree itself (`Parent`
//! links, other pages) is never followed, so copying one page does not drag
//! the rest of the source document along.

use std::collections::BTreeMap;

use lopdf::content::{Content, Operation};
use lopdf::{dictionary, Dictionary, Document, Object, ObjectId, Stream, StringFormat};

use crate::engine::{DocumentEngine, DocumentMetadata, TextStamp};
use crate::error::EngineError;

/// Page attributes a page may inherit from its ancestors in the page tree
const INHERITABLE_KEYS: [&[u8]; 4] = [b"Resources", b"MediaBox", b"CropBox", b"Rotate"];

/// Guard against cyclic `Parent` chains in malformed files
const MAX_TREE_DEPTH: usize = 32;

/// US Letter, used when a page has no usable MediaBox
const DEFAULT_PAGE_SIZE: (f64, f64) = (612.0, 792.0);

#[derive(Debug, Clone, Copy, Default)]
pub struct LopdfEngine;

/// A parsed or freshly created document
#[derive(Debug, Clone)]
pub struct LopdfDocument {
    inner: Document,
    /// Page tree root of a document made by `create_empty`
    append_root: Option<ObjectId>,
    /// Helvetica font object, created on first text stamp
    stamp_font: Option<ObjectId>,
}

impl LopdfDocument {
    fn page_id(&self, page: u32) -> Result<ObjectId, EngineError> {
        self.inner
            .get_pages()
            .get(&page)
            .copied()
            .ok_or_else(|| EngineError::MissingObject(format!("page {}", page)))
    }
}

/// A page dictionary copied out of a source document. Its dependencies are
/// already present in the destination; the dictionary itself is inserted on
/// append.
#[derive(Debug, Clone)]
pub struct LopdfPage {
    id: ObjectId,
    dict: Dictionary,
}

impl LopdfPage {
    pub fn rotation(&self) -> Option<i64> {
        self.dict.get(b"Rotate").and_then(Object::as_i64).ok()
    }
}

impl DocumentEngine for LopdfEngine {
    type Document = LopdfDocument;
    type Page = LopdfPage;

    fn parse(&self, bytes: &[u8]) -> Result<LopdfDocument, EngineError> {
        if !bytes.starts_with(b"%PDF-") {
            return Err(EngineError::NotAPdf);
        }
        let inner = Document::load_mem(bytes).map_err(|e| EngineError::Parse(e.to_string()))?;
        Ok(LopdfDocument {
            inner,
            append_root: None,
            stamp_font: None,
        })
    }

    fn page_count(&self, doc: &LopdfDocument) -> u32 {
        doc.inner.get_pages().len() as u32
    }

    fn metadata(&self, doc: &LopdfDocument) -> DocumentMetadata {
        let info = info_dictionary(&doc.inner);
        let field = |key: &[u8]| info.and_then(|dict| text_field(dict, key));
        DocumentMetadata {
            version: doc.inner.version.clone(),
            encrypted: doc.inner.is_encrypted(),
            title: field(b"Title"),
            author: field(b"Author"),
            subject: field(b"Subject"),
            creator: field(b"Creator"),
            producer: field(b"Producer"),
        }
    }

    fn create_empty(&self) -> LopdfDocument {
        let mut inner = Document::with_version("1.7");
        let pages_id = inner.add_object(dictionary! {
            "Type" => "Pages",
            "Kids" => Vec::<Object>::new(),
            "Count" => 0,
        });
        let catalog_id = inner.add_object(dictionary! {
            "Type" => "Catalog",
            "Pages" => Object::Reference(pages_id),
        });
        inner.trailer.set("Root", Object::Reference(catalog_id));
        LopdfDocument {
            inner,
            append_root: Some(pages_id),
            stamp_font: None,
        }
    }

    fn copy_pages(
        &self,
        source: &LopdfDocument,
        dest: &mut LopdfDocument,
        pages: &[u32],
    ) -> Result<Vec<LopdfPage>, EngineError> {
        let page_ids = source.inner.get_pages();
        let mut remap: BTreeMap<ObjectId, ObjectId> = BTreeMap::new();
        let mut copied = Vec::with_capacity(pages.len());

        for &page in pages {
            let page_id = *page_ids.get(&page).ok_or_else(|| {
                EngineError::MissingObject(format!(
                    "page {} (document has {} pages)",
                    page,
                    page_ids.len()
                ))
            })?;

            let mut dict = source
                .inner
                .get_dictionary(page_id)
                .map_err(|e| EngineError::MissingObject(format!("page {}: {}", page, e)))?
                .clone();
            inherit_attributes(&source.inner, &mut dict);
            dict.remove(b"Parent");

            // Reserve the id up front so self-references (e.g. annotation /P)
            // resolve to the copy instead of importing the page twice.
            let new_id = dest.inner.new_object_id();
            remap.insert(page_id, new_id);

            let dict = import_dictionary(&source.inner, &mut dest.inner, dict, &mut remap);
            copied.push(LopdfPage { id: new_id, dict });
        }

        Ok(copied)
    }

    fn set_page_rotation(&self, page: &mut LopdfPage, degrees: i32) {
        page.dict.set("Rotate", Object::Integer(degrees as i64));
    }

    fn page_rotation(&self, doc: &LopdfDocument, page: u32) -> Result<i32, EngineError> {
        let page_id = doc.page_id(page)?;
        let value = inherited_value(&doc.inner, page_id, b"Rotate");
        Ok(value
            .and_then(|obj| obj.as_i64().ok())
            .map(|angle| angle as i32)
            .unwrap_or(0))
    }

    fn append_pages(
        &self,
        dest: &mut LopdfDocument,
        pages: Vec<LopdfPage>,
    ) -> Result<(), EngineError> {
        let root = dest.append_root.ok_or_else(|| {
            EngineError::InvalidStructure(
                "pages can only be appended to a document created empty".into(),
            )
        })?;

        let mut new_kids = Vec::with_capacity(pages.len());
        for page in pages {
            let mut dict = page.dict;
            dict.set("Parent", Object::Reference(root));
            dest.inner.objects.insert(page.id, Object::Dictionary(dict));
            new_kids.push(Object::Reference(page.id));
        }

        let node = dest
            .inner
            .get_dictionary_mut(root)
            .map_err(|e| EngineError::InvalidStructure(e.to_string()))?;
        let count = match node.get_mut(b"Kids") {
            Ok(Object::Array(kids)) => {
                kids.extend(new_kids);
                kids.len()
            }
            _ => {
                return Err(EngineError::InvalidStructure(
                    "output page tree has no Kids array".into(),
                ))
            }
        };
        node.set("Count", Object::Integer(count as i64));
        Ok(())
    }

    fn page_size(&self, doc: &LopdfDocument, page: u32) -> Result<(f64, f64), EngineError> {
        let page_id = doc.page_id(page)?;
        let media_box = inherited_value(&doc.inner, page_id, b"MediaBox")
            .and_then(|obj| resolve(&doc.inner, obj).as_array().ok())
            .and_then(|array| parse_box_array(&doc.inner, array));

        Ok(match media_box {
            Some([x1, y1, x2, y2]) => ((x2 - x1).abs(), (y2 - y1).abs()),
            None => DEFAULT_PAGE_SIZE,
        })
    }

    fn draw_text(
        &self,
        doc: &mut LopdfDocument,
        page: u32,
        stamp: &TextStamp,
    ) -> Result<(), EngineError> {
        let page_id = doc.page_id(page)?;

        let font_id = match doc.stamp_font {
            Some(id) => id,
            None => {
                let id = doc.inner.add_object(dictionary! {
                    "Type" => "Font",
                    "Subtype" => "Type1",
                    "BaseFont" => "Helvetica",
                    "Encoding" => "WinAnsiEncoding",
                });
                doc.stamp_font = Some(id);
                id
            }
        };
        let opacity = stamp.opacity.clamp(0.0, 1.0) as f32;
        let gs_id = doc.inner.add_object(dictionary! {
            "Type" => "ExtGState",
            "ca" => Object::Real(opacity),
            "CA" => Object::Real(opacity),
        });

        let mut resources = page_resources(&doc.inner, page_id);
        let font_name = add_resource(&doc.inner, &mut resources, b"Font", "FStamp", font_id);
        let gs_name = add_resource(&doc.inner, &mut resources, b"ExtGState", "GSStamp", gs_id);

        let gray = stamp.gray.clamp(0.0, 1.0) as f32;
        let content = Content {
            operations: vec![
                Operation::new("q", vec![]),
                Operation::new("gs", vec![Object::Name(gs_name.into_bytes())]),
                Operation::new(
                    "rg",
                    vec![Object::Real(gray), Object::Real(gray), Object::Real(gray)],
                ),
                Operation::new("BT", vec![]),
                Operation::new(
                    "Tf",
                    vec![
                        Object::Name(font_name.into_bytes()),
                        Object::Real(stamp.font_size as f32),
                    ],
                ),
                Operation::new(
                    "Td",
                    vec![Object::Real(stamp.x as f32), Object::Real(stamp.y as f32)],
                ),
                Operation::new(
                    "Tj",
                    vec![Object::String(
                        win_ansi_bytes(&stamp.text),
                        StringFormat::Literal,
                    )],
                ),
                Operation::new("ET", vec![]),
                Operation::new("Q", vec![]),
            ],
        };
        let encoded = content
            .encode()
            .map_err(|e| EngineError::InvalidStructure(e.to_string()))?;

        let save_id = doc
            .inner
            .add_object(Stream::new(Dictionary::new(), b"q\n".to_vec()));
        let restore_id = doc
            .inner
            .add_object(Stream::new(Dictionary::new(), b"\nQ\n".to_vec()));
        let stamp_id = doc.inner.add_object(Stream::new(Dictionary::new(), encoded));

        let page_dict = doc
            .inner
            .get_dictionary_mut(page_id)
            .map_err(|e| EngineError::MissingObject(format!("page {}: {}", page, e)))?;
        page_dict.set("Resources", Object::Dictionary(resources));

        // Existing content is wrapped in q/Q so a leftover graphics state
        // cannot displace the stamp.
        let mut contents = vec![Object::Reference(save_id)];
        match page_dict.get(b"Contents") {
            Ok(Object::Reference(id)) => contents.push(Object::Reference(*id)),
            Ok(Object::Array(existing)) => contents.extend(existing.iter().cloned()),
            _ => {}
        }
        contents.push(Object::Reference(restore_id));
        contents.push(Object::Reference(stamp_id));
        page_dict.set("Contents", Object::Array(contents));

        Ok(())
    }

    fn serialize(&self, doc: LopdfDocument) -> Result<Vec<u8>, EngineError> {
        let mut inner = doc.inner;
        inner.prune_objects();
        inner.compress();

        let mut buffer = Vec::new();
        inner
            .save_to(&mut buffer)
            .map_err(|e| EngineError::Save(e.to_string()))?;
        Ok(buffer)
    }
}

/// Follow a reference one level, returning the object itself otherwise
fn resolve<'a>(doc: &'a Document, obj: &'a Object) -> &'a Object {
    match obj {
        Object::Reference(id) => doc.get_object(*id).unwrap_or(obj),
        other => other,
    }
}

/// Look a key up on the page, then on its ancestors
fn inherited_value<'a>(doc: &'a Document, page_id: ObjectId, key: &[u8]) -> Option<&'a Object> {
    let mut current = Some(page_id);
    let mut depth = 0;
    while let Some(node_id) = current {
        if depth > MAX_TREE_DEPTH {
            break;
        }
        let node = doc.get_dictionary(node_id).ok()?;
        if let Ok(value) = node.get(key) {
            return Some(value);
        }
        current = node.get(b"Parent").and_then(Object::as_reference).ok();
        depth += 1;
    }
    None
}

/// Copy inheritable attributes from the page tree onto the page itself so it
/// stays complete once detached from its original parent.
fn inherit_attributes(doc: &Document, page: &mut Dictionary) {
    let mut parent = page.get(b"Parent").and_then(Object::as_reference).ok();
    let mut depth = 0;
    while let Some(parent_id) = parent {
        if depth > MAX_TREE_DEPTH {
            break;
        }
        let Ok(node) = doc.get_dictionary(parent_id) else {
            break;
        };
        for key in INHERITABLE_KEYS {
            if !page.has(key) {
                if let Ok(value) = node.get(key) {
                    page.set(key.to_vec(), value.clone());
                }
            }
        }
        parent = node.get(b"Parent").and_then(Object::as_reference).ok();
        depth += 1;
    }
}

fn is_page_tree_node(obj: &Object) -> bool {
    match obj.as_dict().and_then(|dict| dict.get(b"Type")) {
        Ok(Object::Name(name)) => name == b"Page" || name == b"Pages",
        _ => false,
    }
}

fn import_object(
    source: &Document,
    dest: &mut Document,
    object: Object,
    remap: &mut BTreeMap<ObjectId, ObjectId>,
) -> Object {
    match object {
        Object::Reference(id) => import_reference(source, dest, id, remap),
        Object::Array(items) => Object::Array(
            items
                .into_iter()
                .map(|item| import_object(source, dest, item, remap))
                .collect(),
        ),
        Object::Dictionary(dict) => Object::Dictionary(import_dictionary(source, dest, dict, remap)),
        Object::Stream(mut stream) => {
            stream.dict = import_dictionary(source, dest, stream.dict, remap);
            Object::Stream(stream)
        }
        other => other,
    }
}

fn import_dictionary(
    source: &Document,
    dest: &mut Document,
    mut dict: Dictionary,
    remap: &mut BTreeMap<ObjectId, ObjectId>,
) -> Dictionary {
    for (_, value) in dict.iter_mut() {
        *value = import_object(source, dest, value.clone(), remap);
    }
    dict
}

fn import_reference(
    source: &Document,
    dest: &mut Document,
    id: ObjectId,
    remap: &mut BTreeMap<ObjectId, ObjectId>,
) -> Object {
    if let Some(&new_id) = remap.get(&id) {
        return Object::Reference(new_id);
    }
    let Ok(object) = source.get_object(id) else {
        return Object::Null;
    };
    // Links to other pages or the page tree are dropped rather than copied
    if is_page_tree_node(object) {
        return Object::Null;
    }

    let new_id = dest.new_object_id();
    remap.insert(id, new_id);
    let imported = import_object(source, dest, object.clone(), remap);
    dest.objects.insert(new_id, imported);
    Object::Reference(new_id)
}

/// Parse a box array [x1, y1, x2, y2]
fn parse_box_array(doc: &Document, array: &[Object]) -> Option<[f64; 4]> {
    if array.len() != 4 {
        return None;
    }
    let mut result = [0.0; 4];
    for (i, obj) in array.iter().enumerate() {
        result[i] = match resolve(doc, obj) {
            Object::Integer(n) => *n as f64,
            Object::Real(n) => *n as f64,
            _ => return None,
        };
    }
    Some(result)
}

/// The page's effective resource dictionary as an owned, inline copy
fn page_resources(doc: &Document, page_id: ObjectId) -> Dictionary {
    inherited_value(doc, page_id, b"Resources")
        .and_then(|obj| resolve(doc, obj).as_dict().ok())
        .cloned()
        .unwrap_or_default()
}

/// Register `id` under a fresh name in one resource category and return the
/// name used.
fn add_resource(
    doc: &Document,
    resources: &mut Dictionary,
    category: &[u8],
    base_name: &str,
    id: ObjectId,
) -> String {
    let mut entries = resources
        .get(category)
        .ok()
        .and_then(|obj| resolve(doc, obj).as_dict().ok())
        .cloned()
        .unwrap_or_default();

    let mut name = base_name.to_string();
    let mut suffix = 1;
    while entries.has(name.as_bytes()) {
        suffix += 1;
        name = format!("{}{}", base_name, suffix);
    }

    entries.set(name.clone(), Object::Reference(id));
    resources.set(category.to_vec(), Object::Dictionary(entries));
    name
}

/// Encode text for a WinAnsi Type1 font; characters outside Latin-1 become '?'
fn win_ansi_bytes(text: &str) -> Vec<u8> {
    text.chars()
        .map(|c| match c as u32 {
            0x20..=0x7E | 0xA0..=0xFF => c as u32 as u8,
            _ => b'?',
        })
        .collect()
}

fn info_dictionary(doc: &Document) -> Option<&Dictionary> {
    let info = doc.trailer.get(b"Info").ok()?;
    resolve(doc, info).as_dict().ok()
}

/// Decode a PDF text string (UTF-16BE with BOM, otherwise byte text)
fn text_field(dict: &Dictionary, key: &[u8]) -> Option<String> {
    let bytes = dict.get(key).and_then(Object::as_str).ok()?;
    let decoded = if bytes.starts_with(&[0xFE, 0xFF]) {
        let units: Vec<u16> = bytes[2..]
            .chunks_exact(2)
            .map(|pair| u16::from_be_bytes([pair[0], pair[1]]))
            .collect();
        String::from_utf16_lossy(&units)
    } else {
        String::from_utf8_lossy(bytes).into_owned()
    };
    let trimmed = decoded.trim();
    if trimmed.is_empty() {
        None
    } else {
        Some(trimmed.to_string())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testing::{create_test_pdf, page_labels};

    fn parse(bytes: &[u8]) -> LopdfDocument {
        LopdfEngine.parse(bytes).unwrap()
    }

    #[test]
    fn test_parse_rejects_missing_header() {
        let result = LopdfEngine.parse(b"not a valid pdf");
        assert_eq!(result.unwrap_err(), EngineError::NotAPdf);
    }

    #[test]
    fn test_parse_rejects_truncated_pdf() {
        let result = LopdfEngine.parse(b"%PDF-1.7\ngarbage");
        assert!(matches!(result, Err(EngineError::Parse(_))));
    }

    #[test]
    fn test_page_count() {
        let doc = parse(&create_test_pdf(4, "Count"));
        assert_eq!(LopdfEngine.page_count(&doc), 4);
    }

    #[test]
    fn test_create_empty_has_no_pages() {
        let doc = LopdfEngine.create_empty();
        assert_eq!(LopdfEngine.page_count(&doc), 0);
    }

    #[test]
    fn test_copy_and_append_preserves_requested_order() {
        let engine = LopdfEngine;
        let source = parse(&create_test_pdf(5, "Src"));
        let mut dest = engine.create_empty();

        let pages = engine.copy_pages(&source, &mut dest, &[4, 2]).unwrap();
        engine.append_pages(&mut dest, pages).unwrap();
        assert_eq!(engine.page_count(&dest), 2);

        let bytes = engine.serialize(dest).unwrap();
        assert_eq!(page_labels(&bytes), vec!["Src-Page-4", "Src-Page-2"]);
    }

    #[test]
    fn test_copy_does_not_pull_whole_source() {
        let engine = LopdfEngine;
        let source = parse(&create_test_pdf(20, "Big"));
        let mut dest = engine.create_empty();

        let pages = engine.copy_pages(&source, &mut dest, &[1]).unwrap();
        engine.append_pages(&mut dest, pages).unwrap();
        let bytes = engine.serialize(dest).unwrap();

        let doc = Document::load_mem(&bytes).unwrap();
        assert_eq!(doc.get_pages().len(), 1);
        assert!(doc.objects.len() < 10, "copied {} objects", doc.objects.len());
    }

    #[test]
    fn test_copy_missing_page_fails() {
        let engine = LopdfEngine;
        let source = parse(&create_test_pdf(2, "Short"));
        let mut dest = engine.create_empty();
        let result = engine.copy_pages(&source, &mut dest, &[3]);
        assert!(matches!(result, Err(EngineError::MissingObject(_))));
    }

    #[test]
    fn test_append_to_parsed_document_fails() {
        let engine = LopdfEngine;
        let source = parse(&create_test_pdf(2, "A"));
        let mut target = parse(&create_test_pdf(1, "B"));
        let pages = engine.copy_pages(&source, &mut target, &[1]).unwrap();
        let result = engine.append_pages(&mut target, pages);
        assert!(matches!(result, Err(EngineError::InvalidStructure(_))));
    }

    #[test]
    fn test_rotation_is_absolute() {
        let engine = LopdfEngine;
        let source = parse(&create_test_pdf(1, "Rot"));
        let mut dest = engine.create_empty();
        let mut pages = engine.copy_pages(&source, &mut dest, &[1]).unwrap();

        engine.set_page_rotation(&mut pages[0], 90);
        engine.set_page_rotation(&mut pages[0], 180);
        assert_eq!(pages[0].rotation(), Some(180));

        engine.append_pages(&mut dest, pages).unwrap();
        assert_eq!(engine.page_rotation(&dest, 1).unwrap(), 180);
    }

    #[test]
    fn test_inherited_media_box_is_materialized() {
        let engine = LopdfEngine;
        let mut doc = Document::with_version("1.7");
        let pages_id = doc.new_object_id();
        let page_id = doc.add_object(dictionary! {
            "Type" => "Page",
            "Parent" => Object::Reference(pages_id),
        });
        doc.objects.insert(
            pages_id,
            Object::Dictionary(dictionary! {
                "Type" => "Pages",
                "Kids" => vec![Object::Reference(page_id)],
                "Count" => 1,
                "MediaBox" => vec![0.into(), 0.into(), 300.into(), 400.into()],
                "Rotate" => 90,
            }),
        );
        let catalog_id = doc.add_object(dictionary! {
            "Type" => "Catalog",
            "Pages" => Object::Reference(pages_id),
        });
        doc.trailer.set("Root", Object::Reference(catalog_id));
        let mut bytes = Vec::new();
        doc.save_to(&mut bytes).unwrap();

        let source = parse(&bytes);
        assert_eq!(engine.page_size(&source, 1).unwrap(), (300.0, 400.0));
        assert_eq!(engine.page_rotation(&source, 1).unwrap(), 90);

        let mut dest = engine.create_empty();
        let pages = engine.copy_pages(&source, &mut dest, &[1]).unwrap();
        engine.append_pages(&mut dest, pages).unwrap();
        assert_eq!(engine.page_size(&dest, 1).unwrap(), (300.0, 400.0));
        assert_eq!(engine.page_rotation(&dest, 1).unwrap(), 90);
    }

    #[test]
    fn test_draw_text_adds_stamp_and_keeps_original_content() {
        let engine = LopdfEngine;
        let mut doc = parse(&create_test_pdf(1, "Stamp"));
        let stamp = TextStamp {
            text: "CONFIDENTIAL".into(),
            x: 306.0,
            y: 396.0,
            font_size: 30.6,
            gray: 0.5,
            opacity: 0.3,
        };
        engine.draw_text(&mut doc, 1, &stamp).unwrap();
        let bytes = engine.serialize(doc).unwrap();

        let out = Document::load_mem(&bytes).unwrap();
        let page_id = *out.get_pages().get(&1).unwrap();
        let content = String::from_utf8_lossy(&out.get_page_content(page_id).unwrap()).into_owned();
        assert!(content.contains("Stamp-Page-1"));
        assert!(content.contains("CONFIDENTIAL"));
        assert!(content.contains("/GSStamp gs"));
    }

    #[test]
    fn test_metadata_reads_info_dictionary() {
        let mut doc = Document::load_mem(&create_test_pdf(1, "Meta")).unwrap();
        let info_id = doc.add_object(dictionary! {
            "Title" => Object::string_literal("Quarterly Report"),
            "Author" => Object::String(
                vec![0xFE, 0xFF, 0x00, 0x41, 0x00, 0x64, 0x00, 0x61],
                StringFormat::Hexadecimal,
            ),
        });
        doc.trailer.set("Info", Object::Reference(info_id));
        let mut bytes = Vec::new();
        doc.save_to(&mut bytes).unwrap();

        let metadata = LopdfEngine.metadata(&parse(&bytes));
        assert_eq!(metadata.version, "1.7");
        assert_eq!(metadata.title.as_deref(), Some("Quarterly Report"));
        assert_eq!(metadata.author.as_deref(), Some("Ada"));
        assert_eq!(metadata.subject, None);
        assert!(!metadata.encrypted);
    }

    #[test]
    fn test_win_ansi_bytes_replaces_unmappable() {
        assert_eq!(win_ansi_bytes("Draft"), b"Draft".to_vec());
        assert_eq!(win_ansi_bytes("café"), vec![b'c', b'a', b'f', 0xE9]);
        assert_eq!(win_ansi_bytes("日本"), b"??".to_vec());
    }
}
