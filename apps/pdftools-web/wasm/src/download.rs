//! Browser download trigger

use wasm_bindgen::prelude::*;

/// Offer `bytes` to the user as a file download
#[wasm_bindgen(js_name = downloadBytes)]
pub fn download_bytes(bytes: &[u8], filename: &str, mime_type: &str) -> Result<(), JsValue> {
    if filename.trim().is_empty() {
        return Err(JsValue::from_str("Download file name cannot be empty"));
    }
    trigger_download(bytes, filename, mime_type)
}

#[cfg(target_arch = "wasm32")]
fn trigger_download(bytes: &[u8], filename: &str, mime_type: &str) -> Result<(), JsValue> {
    use wasm_bindgen::JsCast;

    let window = web_sys::window().ok_or_else(|| JsValue::from_str("No window object"))?;
    let document = window
        .document()
        .ok_or_else(|| JsValue::from_str("No document object"))?;
    let body = document
        .body()
        .ok_or_else(|| JsValue::from_str("Document has no body"))?;

    let parts = js_sys::Array::of1(&js_sys::Uint8Array::from(bytes));
    let options = web_sys::BlobPropertyBag::new();
    options.set_type(mime_type);
    let blob = web_sys::Blob::new_with_u8_array_sequence_and_options(&parts, &options)?;
    let url = web_sys::Url::create_object_url_with_blob(&blob)?;

    let anchor = document.create_element("a")?;
    anchor.set_attribute("href", &url)?;
    anchor.set_attribute("download", filename)?;
    body.append_child(&anchor)?;
    let clicked = anchor
        .dyn_ref::<web_sys::HtmlElement>()
        .map(|a| a.click())
        .ok_or_else(|| JsValue::from_str("Anchor is not an HTML element"));
    body.remove_child(&anchor)?;
    web_sys::Url::revoke_object_url(&url)?;
    clicked
}

#[cfg(not(target_arch = "wasm32"))]
fn trigger_download(_bytes: &[u8], _filename: &str, _mime_type: &str) -> Result<(), JsValue> {
    Err(JsValue::from_str("Downloads require a browser"))
}

#[cfg(all(test, target_arch = "wasm32"))]
mod wasm_tests {
    use super::*;
    use wasm_bindgen_test::*;

    wasm_bindgen_test_configure!(run_in_browser);

    #[wasm_bindgen_test]
    fn test_blank_name_rejected() {
        assert!(download_bytes(b"%PDF-1.7", "  ", "application/pdf").is_err());
    }

    #[wasm_bindgen_test]
    fn test_download_leaves_no_anchor_behind() {
        download_bytes(b"%PDF-1.7\n%%EOF", "out.pdf", "application/pdf").unwrap();
        let body = web_sys::window().unwrap().document().unwrap().body().unwrap();
        assert_eq!(body.get_elements_by_tag_name("a").length(), 0);
    }
}
