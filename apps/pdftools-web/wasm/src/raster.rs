//! Page rasterizer backed by a JavaScript renderer (typically pdf.js)
//!
//! The renderer is registered with `PdfToolsSession.setPageRenderer` and is
//! called as `render(documentId, bytes, pageNumber, scale)`. It must return
//! (or resolve to) an `ImageData`-like object `{ width, height, data }` where
//! `data` holds RGBA bytes.
//!
//! An optional release callback (`setReleaseCallback`) is called as
//! `release(documentId)` when a document leaves the session, so the renderer
//! can destroy its cached copy.

use std::cell::RefCell;

use async_trait::async_trait;
use image::RgbaImage;
use pdftools_core::{EngineError, LoadedDocument, PageRasterizer};

#[derive(Default)]
pub struct JsRasterizer {
    render: RefCell<Option<js_sys::Function>>,
    release: RefCell<Option<js_sys::Function>>,
}

impl JsRasterizer {
    pub fn set_renderer(&self, render: js_sys::Function) {
        *self.render.borrow_mut() = Some(render);
    }

    pub fn set_release_callback(&self, release: js_sys::Function) {
        *self.release.borrow_mut() = Some(release);
    }

    pub fn has_renderer(&self) -> bool {
        self.render.borrow().is_some()
    }

    fn renderer(&self) -> Result<js_sys::Function, EngineError> {
        self.render
            .borrow()
            .clone()
            .ok_or_else(|| EngineError::Render("no page renderer registered".into()))
    }
}

/// Wrap raw RGBA bytes, checking they match the reported dimensions
pub fn bitmap_from_rgba(width: u32, height: u32, data: Vec<u8>) -> Result<RgbaImage, EngineError> {
    let expected = width as usize * height as usize * 4;
    if data.len() != expected {
        return Err(EngineError::Render(format!(
            "renderer returned {} bytes for a {}x{} bitmap",
            data.len(),
            width,
            height
        )));
    }
    RgbaImage::from_raw(width, height, data)
        .ok_or_else(|| EngineError::Render("invalid bitmap".into()))
}

#[cfg(target_arch = "wasm32")]
#[async_trait(?Send)]
impl PageRasterizer for JsRasterizer {
    async fn render_page(
        &self,
        document: &LoadedDocument,
        page: u32,
        scale: f32,
    ) -> Result<RgbaImage, EngineError> {
        use js_sys::{Array, Promise, Reflect, Uint8Array};
        use wasm_bindgen::JsValue;
        use wasm_bindgen_futures::JsFuture;

        let render = self.renderer()?;
        let args = Array::of4(
            &JsValue::from_str(&document.id().to_string()),
            &Uint8Array::from(document.content()),
            &JsValue::from(page),
            &JsValue::from(scale),
        );
        let returned = render
            .apply(&JsValue::NULL, &args)
            .map_err(|e| EngineError::Render(format!("renderer threw: {:?}", e)))?;
        let bitmap = JsFuture::from(Promise::resolve(&returned))
            .await
            .map_err(|e| EngineError::Render(format!("renderer rejected: {:?}", e)))?;

        let dimension = |key: &str| -> Result<u32, EngineError> {
            Reflect::get(&bitmap, &JsValue::from_str(key))
                .ok()
                .and_then(|v| v.as_f64())
                .map(|v| v as u32)
                .ok_or_else(|| EngineError::Render(format!("renderer result has no {}", key)))
        };
        let width = dimension("width")?;
        let height = dimension("height")?;
        let data = Reflect::get(&bitmap, &JsValue::from_str("data"))
            .map_err(|_| EngineError::Render("renderer result has no data".into()))?;

        bitmap_from_rgba(width, height, Uint8Array::new(&data).to_vec())
    }

    fn release(&self, document: pdftools_core::DocumentId) {
        use wasm_bindgen::JsValue;

        let Some(release) = self.release.borrow().clone() else {
            return;
        };
        if let Err(e) = release.call1(&JsValue::NULL, &JsValue::from_str(&document.to_string())) {
            tracing::warn!(document = %document, error = ?e, "Release callback threw");
        }
    }
}

#[cfg(not(target_arch = "wasm32"))]
#[async_trait(?Send)]
impl PageRasterizer for JsRasterizer {
    async fn render_page(
        &self,
        _document: &LoadedDocument,
        page: u32,
        _scale: f32,
    ) -> Result<RgbaImage, EngineError> {
        self.renderer()?;
        Err(EngineError::Render(format!(
            "page {} cannot be rendered outside the browser",
            page
        )))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_bitmap_size_is_checked() {
        assert!(bitmap_from_rgba(2, 2, vec![0; 16]).is_ok());
        assert!(matches!(
            bitmap_from_rgba(2, 2, vec![0; 15]),
            Err(EngineError::Render(_))
        ));
    }

    #[test]
    fn test_missing_renderer() {
        let rasterizer = JsRasterizer::default();
        assert!(!rasterizer.has_renderer());
        assert!(rasterizer.renderer().is_err());
    }
}

#[cfg(all(test, target_arch = "wasm32"))]
mod wasm_tests {
    use std::rc::Rc;

    use wasm_bindgen::closure::Closure;
    use wasm_bindgen::JsCast;
    use wasm_bindgen_test::*;

    use super::*;

    #[wasm_bindgen_test]
    fn test_release_reaches_js_callback() {
        let released = Rc::new(RefCell::new(Vec::<String>::new()));
        let sink = Rc::clone(&released);
        let callback = Closure::wrap(Box::new(move |id: String| sink.borrow_mut().push(id))
            as Box<dyn FnMut(String)>);

        let rasterizer = JsRasterizer::default();
        let id = pdftools_core::DocumentId::new();
        // Without a callback, release is a no-op
        rasterizer.release(id);

        rasterizer.set_release_callback(callback.as_ref().unchecked_ref::<js_sys::Function>().clone());
        rasterizer.release(id);
        assert_eq!(*released.borrow(), vec![id.to_string()]);
    }
}
