//! Stateful tools session
//!
//! Holds the document registry, the page selection and the running
//! operation in Rust. JavaScript only keeps a handle to the session.

use std::cell::{Cell, RefCell};
use std::rc::Rc;

use pdftools_core::registry::{DocumentSummary, LoadOutcome};
use pdftools_core::{
    CancellationToken, DocumentId, LopdfEngine, OperationContext, OperationOutput, Orchestrator,
    PageIndex, PendingFile, ProcessMetrics, ProgressReporter, Registry, Selection, ToolCommand,
    ToolsConfig,
};
use serde::Serialize;
use wasm_bindgen::prelude::*;

use crate::raster::JsRasterizer;

struct SessionState {
    registry: RefCell<Registry>,
    selection: RefCell<Selection>,
    orchestrator: Orchestrator<LopdfEngine, JsRasterizer>,
    processing: Cell<bool>,
    cancel: RefCell<Option<CancellationToken>>,
    progress_callback: RefCell<Option<js_sys::Function>>,
}

/// Clears the processing flag when an operation ends, however it ends
struct ProcessingGuard<'a>(&'a SessionState);

impl Drop for ProcessingGuard<'_> {
    fn drop(&mut self) {
        self.0.processing.set(false);
        self.0.cancel.borrow_mut().take();
    }
}

/// Per-file result of `addDocuments`
#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct LoadReport {
    name: String,
    id: Option<String>,
    error: Option<String>,
}

impl From<LoadOutcome> for LoadReport {
    fn from(outcome: LoadOutcome) -> Self {
        match outcome.result {
            Ok(id) => Self {
                name: outcome.name,
                id: Some(id.to_string()),
                error: None,
            },
            Err(e) => Self {
                name: outcome.name,
                id: None,
                error: Some(e.to_string()),
            },
        }
    }
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct PageLocation {
    document_id: String,
    page: u32,
}

/// Browser session over the PDF tools
#[wasm_bindgen]
pub struct PdfToolsSession {
    state: Rc<SessionState>,
}

impl PdfToolsSession {
    fn with_config(config: ToolsConfig) -> Self {
        let registry = Registry::new(&config);
        Self {
            state: Rc::new(SessionState {
                registry: RefCell::new(registry),
                selection: RefCell::new(Selection::new()),
                orchestrator: Orchestrator::new(LopdfEngine, JsRasterizer::default(), config),
                processing: Cell::new(false),
                cancel: RefCell::new(None),
                progress_callback: RefCell::new(None),
            }),
        }
    }

    fn new_internal(config_json: Option<&str>) -> Result<Self, String> {
        let config = match config_json {
            Some(json) => ToolsConfig::from_json(json).map_err(|e| e.to_string())?,
            None => ToolsConfig::default(),
        };
        Ok(Self::with_config(config))
    }

    /// Registry mutations are refused while an operation holds it
    fn ensure_idle(&self) -> Result<(), String> {
        if self.state.processing.get() {
            return Err("An operation is in progress".to_string());
        }
        Ok(())
    }

    /// Apply a registry change and carry the selection over to the new
    /// page numbering
    fn mutate_registry<T>(
        &self,
        change: impl FnOnce(&mut Registry) -> Result<T, String>,
    ) -> Result<T, String> {
        self.ensure_idle()?;
        let mut registry = self.state.registry.borrow_mut();
        let before: PageIndex = registry.page_index().clone();
        let result = change(&mut registry)?;
        let mut selection = self.state.selection.borrow_mut();
        *selection = selection.remap(&before, registry.page_index());
        Ok(result)
    }

    fn add_document_internal(
        &self,
        name: &str,
        mime_type: Option<&str>,
        bytes: Vec<u8>,
    ) -> Result<DocumentSummary, String> {
        let engine = *self.state.orchestrator.engine();
        let mut file = PendingFile::new(name, bytes);
        if let Some(mime) = mime_type {
            file = file.with_mime_type(mime);
        }
        self.mutate_registry(|registry| {
            registry
                .load_file(&engine, file)
                .map(|doc| doc.summary())
                .map_err(|e| e.to_string())
        })
    }

    fn add_documents_internal(&self, files: Vec<PendingFile>) -> Result<Vec<LoadReport>, String> {
        let engine = *self.state.orchestrator.engine();
        self.mutate_registry(|registry| {
            Ok(registry
                .load_all(&engine, files)
                .into_iter()
                .map(LoadReport::from)
                .collect())
        })
    }

    fn remove_document_internal(&self, id: &str) -> Result<bool, String> {
        let id = parse_id(id)?;
        let orchestrator = &self.state.orchestrator;
        self.mutate_registry(|registry| Ok(orchestrator.remove_document(registry, id)))
    }

    fn reorder_internal(&self, new_order: &[usize]) -> Result<(), String> {
        self.mutate_registry(|registry| registry.reorder(new_order).map_err(|e| e.to_string()))
    }

    fn rename_internal(&self, id: &str, name: &str) -> Result<(), String> {
        let id = parse_id(id)?;
        self.ensure_idle()?;
        self.state
            .registry
            .borrow_mut()
            .rename(id, name)
            .map_err(|e| e.to_string())
    }

    fn clear_internal(&self) -> Result<(), String> {
        let orchestrator = &self.state.orchestrator;
        self.mutate_registry(|registry| {
            orchestrator.clear_documents(registry);
            Ok(())
        })
    }

    fn summaries(&self) -> Vec<DocumentSummary> {
        self.state
            .registry
            .borrow()
            .list()
            .iter()
            .map(|d| d.summary())
            .collect()
    }

    fn global_index_internal(&self, id: &str, page: u32) -> Result<u32, String> {
        let id = parse_id(id)?;
        self.state
            .registry
            .borrow()
            .page_index()
            .global_index(id, page)
            .map_err(|e| e.to_string())
    }

    fn resolve_page_internal(&self, global: u32) -> Result<PageLocation, String> {
        let (document, page) = self
            .state
            .registry
            .borrow()
            .page_index()
            .resolve(global)
            .map_err(|e| e.to_string())?;
        Ok(PageLocation {
            document_id: document.to_string(),
            page,
        })
    }

    fn toggle_page_internal(&self, global: u32) -> Result<bool, String> {
        let total = self.state.registry.borrow().total_pages();
        if global == 0 || global > total {
            return Err(format!("Page {} is out of range (1-{})", global, total));
        }
        Ok(self.state.selection.borrow_mut().toggle(global))
    }

    fn select_range_internal(&self, id: &str, expression: &str) -> Result<usize, String> {
        let id = parse_id(id)?;
        let registry = self.state.registry.borrow();
        self.state
            .selection
            .borrow_mut()
            .select_expression(registry.page_index(), id, expression)
            .map_err(|e| e.to_string())
    }

    fn select_document_internal(&self, id: &str) -> Result<(), String> {
        let id = parse_id(id)?;
        let registry = self.state.registry.borrow();
        self.state
            .selection
            .borrow_mut()
            .select_document(registry.page_index(), id)
            .map_err(|e| e.to_string())
    }

    fn selected_pages(&self) -> Vec<u32> {
        self.state.selection.borrow().iter().collect()
    }

    fn cancel_internal(&self) -> bool {
        match self.state.cancel.borrow().as_ref() {
            Some(token) => {
                token.cancel();
                true
            }
            None => false,
        }
    }

    fn spawn(&self, command: Result<ToolCommand, String>) -> js_sys::Promise {
        let state = Rc::clone(&self.state);
        let input_size = self.input_size();

        wasm_bindgen_futures::future_to_promise(async move {
            let command = command.map_err(|e| JsValue::from_str(&e))?;
            let started = js_sys::Date::now();
            let outputs = run(state, command)
                .await
                .map_err(|e| JsValue::from_str(&e))?;
            let elapsed = (js_sys::Date::now() - started).max(0.0) as u64;
            let metrics = ProcessMetrics::new(input_size, &outputs).with_elapsed_ms(elapsed);

            let result = js_sys::Object::new();
            js_sys::Reflect::set(&result, &"outputs".into(), &outputs_to_js(&outputs)?)?;
            js_sys::Reflect::set(&result, &"metrics".into(), &to_js(&metrics)?)?;
            Ok(result.into())
        })
    }

    fn input_size(&self) -> u64 {
        self.state
            .registry
            .borrow()
            .list()
            .iter()
            .map(|d| d.byte_size())
            .sum()
    }
}

/// Run one command against the session's registry. Only one command runs
/// at a time; the registry stays borrowed until it finishes.
async fn run(
    state: Rc<SessionState>,
    mut command: ToolCommand,
) -> Result<Vec<OperationOutput>, String> {
    if state.processing.replace(true) {
        return Err("An operation is in progress".to_string());
    }
    let _guard = ProcessingGuard(&state);

    // Page commands sent without a selection act on the session's
    if let Some(selection) = command.selection_mut() {
        if selection.is_empty() {
            *selection = state.selection.borrow().clone();
        }
    }
    tracing::debug!(command = command.name(), "Dispatching command");

    let token = CancellationToken::new();
    *state.cancel.borrow_mut() = Some(token.clone());

    let callback = state.progress_callback.borrow().clone();
    let reporter = ProgressReporter::callback(move |progress| {
        if let Some(ref callback) = callback {
            let _ = callback.call2(
                &JsValue::NULL,
                &JsValue::from(progress.percent),
                &JsValue::from_str(&progress.label),
            );
        }
    });
    let ctx = OperationContext::with_cancellation(reporter, token);

    let registry = state.registry.borrow();
    state
        .orchestrator
        .execute(&registry, command, &ctx)
        .await
        .map_err(|e| e.to_string())
}

fn parse_id(id: &str) -> Result<DocumentId, String> {
    id.parse()
        .map_err(|_| format!("Invalid document id: {}", id))
}

fn parse_command_json(json: &str) -> Result<ToolCommand, String> {
    serde_json::from_str(json).map_err(|e| format!("Invalid command: {}", e))
}

fn to_js<T: Serialize>(value: &T) -> Result<JsValue, JsValue> {
    serde_wasm_bindgen::to_value(value)
        .map_err(|e| JsValue::from_str(&format!("Serialization error: {}", e)))
}

fn outputs_to_js(outputs: &[OperationOutput]) -> Result<JsValue, JsValue> {
    let array = js_sys::Array::new();
    for output in outputs {
        let entry = js_sys::Object::new();
        js_sys::Reflect::set(&entry, &"name".into(), &JsValue::from_str(&output.name))?;
        js_sys::Reflect::set(
            &entry,
            &"mimeType".into(),
            &JsValue::from_str(&output.mime_type),
        )?;
        js_sys::Reflect::set(
            &entry,
            &"data".into(),
            &js_sys::Uint8Array::from(output.data.as_slice()),
        )?;
        array.push(&entry);
    }
    Ok(array.into())
}

#[wasm_bindgen]
impl PdfToolsSession {
    /// Create a session. `config` is an optional JSON object with any of
    /// `max_file_size`, `copy_batch_size`, `render_batch_size`,
    /// `render_scale` and `save_reserve_percent`.
    #[wasm_bindgen(constructor)]
    pub fn new(config: Option<String>) -> Result<PdfToolsSession, JsValue> {
        Self::new_internal(config.as_deref()).map_err(|e| JsValue::from_str(&e))
    }

    /// Callback signature: (percent: number, label: string) => void
    #[wasm_bindgen(js_name = setProgressCallback)]
    pub fn set_progress_callback(&self, callback: js_sys::Function) {
        *self.state.progress_callback.borrow_mut() = Some(callback);
    }

    /// Register the page renderer used by image export. See [`JsRasterizer`].
    #[wasm_bindgen(js_name = setPageRenderer)]
    pub fn set_page_renderer(&self, render: js_sys::Function) {
        self.state.orchestrator.rasterizer().set_renderer(render);
    }

    /// Called as `release(documentId)` when a document is removed or the
    /// session is cleared
    #[wasm_bindgen(js_name = setReleaseCallback)]
    pub fn set_release_callback(&self, release: js_sys::Function) {
        self.state.orchestrator.rasterizer().set_release_callback(release);
    }

    #[wasm_bindgen(getter, js_name = isProcessing)]
    pub fn is_processing(&self) -> bool {
        self.state.processing.get()
    }

    /// Add one PDF. Returns its summary.
    #[wasm_bindgen(js_name = addDocument)]
    pub fn add_document(
        &self,
        name: &str,
        mime_type: Option<String>,
        bytes: Vec<u8>,
    ) -> Result<JsValue, JsValue> {
        let summary = self
            .add_document_internal(name, mime_type.as_deref(), bytes)
            .map_err(|e| JsValue::from_str(&e))?;
        to_js(&summary)
    }

    /// Add several files at once. `buffers` holds one `Uint8Array` per name.
    /// Each file loads or fails on its own; returns `{ name, id, error }`
    /// per file.
    #[wasm_bindgen(js_name = addDocuments)]
    pub fn add_documents(
        &self,
        names: Vec<String>,
        mime_types: Vec<String>,
        buffers: js_sys::Array,
    ) -> Result<JsValue, JsValue> {
        if names.len() != buffers.length() as usize {
            return Err(JsValue::from_str("Each file needs a name and a buffer"));
        }
        let files = names
            .into_iter()
            .enumerate()
            .map(|(i, name)| {
                let bytes = js_sys::Uint8Array::new(&buffers.get(i as u32)).to_vec();
                let file = PendingFile::new(name, bytes);
                match mime_types.get(i).filter(|m| !m.is_empty()) {
                    Some(mime) => file.with_mime_type(mime.clone()),
                    None => file,
                }
            })
            .collect();
        let reports = self
            .add_documents_internal(files)
            .map_err(|e| JsValue::from_str(&e))?;
        to_js(&reports)
    }

    #[wasm_bindgen(js_name = removeDocument)]
    pub fn remove_document(&self, id: &str) -> Result<bool, JsValue> {
        self.remove_document_internal(id)
            .map_err(|e| JsValue::from_str(&e))
    }

    /// `new_order` lists current positions in the desired order
    #[wasm_bindgen(js_name = reorderDocuments)]
    pub fn reorder_documents(&self, new_order: &[usize]) -> Result<(), JsValue> {
        self.reorder_internal(new_order)
            .map_err(|e| JsValue::from_str(&e))
    }

    #[wasm_bindgen(js_name = renameDocument)]
    pub fn rename_document(&self, id: &str, name: &str) -> Result<(), JsValue> {
        self.rename_internal(id, name)
            .map_err(|e| JsValue::from_str(&e))
    }

    #[wasm_bindgen(js_name = clearDocuments)]
    pub fn clear_documents(&self) -> Result<(), JsValue> {
        self.clear_internal().map_err(|e| JsValue::from_str(&e))
    }

    #[wasm_bindgen(js_name = getDocuments)]
    pub fn get_documents(&self) -> Result<JsValue, JsValue> {
        to_js(&self.summaries())
    }

    #[wasm_bindgen(js_name = getDocumentCount)]
    pub fn get_document_count(&self) -> usize {
        self.state.registry.borrow().len()
    }

    #[wasm_bindgen(js_name = getTotalPageCount)]
    pub fn get_total_page_count(&self) -> u32 {
        self.state.registry.borrow().total_pages()
    }

    #[wasm_bindgen(js_name = globalIndex)]
    pub fn global_index(&self, id: &str, page: u32) -> Result<u32, JsValue> {
        self.global_index_internal(id, page)
            .map_err(|e| JsValue::from_str(&e))
    }

    /// Returns `{ documentId, page }`
    #[wasm_bindgen(js_name = resolvePage)]
    pub fn resolve_page(&self, global: u32) -> Result<JsValue, JsValue> {
        let location = self
            .resolve_page_internal(global)
            .map_err(|e| JsValue::from_str(&e))?;
        to_js(&location)
    }

    /// Returns whether the page is now selected
    #[wasm_bindgen(js_name = togglePage)]
    pub fn toggle_page(&self, global: u32) -> Result<bool, JsValue> {
        self.toggle_page_internal(global)
            .map_err(|e| JsValue::from_str(&e))
    }

    /// Select local pages of one document, e.g. "1-3, 5". Returns how many
    /// pages were newly selected.
    #[wasm_bindgen(js_name = selectRange)]
    pub fn select_range(&self, id: &str, expression: &str) -> Result<usize, JsValue> {
        self.select_range_internal(id, expression)
            .map_err(|e| JsValue::from_str(&e))
    }

    #[wasm_bindgen(js_name = selectDocument)]
    pub fn select_document(&self, id: &str) -> Result<(), JsValue> {
        self.select_document_internal(id)
            .map_err(|e| JsValue::from_str(&e))
    }

    #[wasm_bindgen(js_name = selectAll)]
    pub fn select_all(&self) {
        let registry = self.state.registry.borrow();
        self.state
            .selection
            .borrow_mut()
            .select_all(registry.page_index());
    }

    #[wasm_bindgen(js_name = clearSelection)]
    pub fn clear_selection(&self) {
        self.state.selection.borrow_mut().clear();
    }

    /// Selected global page indices, ascending
    #[wasm_bindgen(js_name = getSelection)]
    pub fn get_selection(&self) -> Vec<u32> {
        self.selected_pages()
    }

    /// Run a command such as
    /// `{ type: "Merge", documents: [], selection: [] }`.
    ///
    /// Merge, RemovePages, Rotate and ExportImages commands with an empty
    /// `selection` use the session's current page selection.
    ///
    /// Resolves to `{ outputs: [{ name, mimeType, data }], metrics }`.
    /// Rejects with an error message on failure or cancellation.
    pub fn execute(&self, command: JsValue) -> js_sys::Promise {
        let command = serde_wasm_bindgen::from_value::<ToolCommand>(command)
            .map_err(|e| format!("Invalid command: {}", e));
        self.spawn(command)
    }

    /// Same as `execute`, with the command given as a JSON string
    #[wasm_bindgen(js_name = executeJson)]
    pub fn execute_json(&self, json: &str) -> js_sys::Promise {
        self.spawn(parse_command_json(json))
    }

    /// Request cancellation of the running operation. It stops at its next
    /// batch boundary. Returns false when nothing is running.
    pub fn cancel(&self) -> bool {
        self.cancel_internal()
    }
}


#[cfg(all(test, target_arch = "wasm32"))]
mod wasm_tests {
    use std::cell::RefCell;
    use std::rc::Rc;

    use pdftools_core::testing::create_test_pdf;
    use wasm_bindgen::closure::Closure;
    use wasm_bindgen::JsCast;
    use wasm_bindgen_test::*;

    use super::*;

    #[wasm_bindgen_test]
    fn test_remove_and_clear_release_documents() {
        let released = Rc::new(RefCell::new(Vec::<String>::new()));
        let sink = Rc::clone(&released);
        let callback = Closure::wrap(Box::new(move |id: String| sink.borrow_mut().push(id))
            as Box<dyn FnMut(String)>);

        let session = PdfToolsSession::new_internal(None).unwrap();
        session.set_release_callback(callback.as_ref().unchecked_ref::<js_sys::Function>().clone());
        let ids: Vec<String> = (0..3)
            .map(|i| {
                session
                    .add_document_internal(&format!("d{}.pdf", i), None, create_test_pdf(1, "d"))
                    .unwrap()
                    .id
                    .to_string()
            })
            .collect();

        assert!(session.remove_document_internal(&ids[0]).unwrap());
        assert_eq!(released.borrow().len(), 1);
        session.clear_internal().unwrap();
        assert_eq!(*released.borrow(), ids);
    }
}
