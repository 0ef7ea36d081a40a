//! Browser-based file I/O using Web APIs

use std::cell::RefCell;
use std::rc::Rc;

use js_sys::{Array, Uint8Array};
use wasm_bindgen::prelude::*;
use web_sys::{Blob, BlobPropertyBag, FileReader, HtmlAnchorElement, HtmlInputElement, Url};

use sheetmark_core::{App, ExportPayload};

/// File types offered by the upload picker
const ACCEPT: &str = ".xlsx,.csv,.json";

/// Download an export as a file
pub fn download(payload: &ExportPayload) -> Result<(), JsValue> {
    let window = web_sys::window().ok_or("No window")?;
    let document = window.document().ok_or("No document")?;

    // Create a blob from the encoded bytes
    let blob_parts = Array::new();
    blob_parts.push(&Uint8Array::from(payload.bytes.as_slice()));

    let blob_options = BlobPropertyBag::new();
    blob_options.set_type(payload.content_type);

    let blob = Blob::new_with_u8_array_sequence_and_options(&blob_parts, &blob_options)?;

    // Create an object URL for the blob
    let url = Url::create_object_url_with_blob(&blob)?;

    // Create a temporary anchor element and trigger download
    let anchor: HtmlAnchorElement = document.create_element("a")?.dyn_into()?;

    anchor.set_href(&url);
    anchor.set_download(&payload.filename);
    anchor.click();

    // Clean up the object URL
    Url::revoke_object_url(&url)?;

    Ok(())
}

/// Open the browser file picker; the chosen file is uploaded into `app` once read
pub fn pick_file(app: Rc<RefCell<App>>) -> Result<(), JsValue> {
    let window = web_sys::window().ok_or("No window")?;
    let document = window.document().ok_or("No document")?;

    let input: HtmlInputElement = document.create_element("input")?.dyn_into()?;
    input.set_type("file");
    input.set_accept(ACCEPT);

    let on_change = Closure::<dyn FnMut(web_sys::Event)>::new({
        let input = input.clone();
        move |_event: web_sys::Event| {
            if let Err(e) = read_selected(&input, app.clone()) {
                app.borrow_mut()
                    .set_status(&format!("Error: could not read file ({:?})", e));
            }
        }
    });
    input.set_onchange(Some(on_change.as_ref().unchecked_ref()));
    on_change.forget();

    input.click();
    Ok(())
}

fn read_selected(input: &HtmlInputElement, app: Rc<RefCell<App>>) -> Result<(), JsValue> {
    let Some(file) = input.files().and_then(|files| files.get(0)) else {
        return Ok(());
    };
    let filename = file.name();

    let reader = FileReader::new()?;
    let on_load = Closure::<dyn FnMut()>::new({
        let reader = reader.clone();
        move || {
            let mut app = app.borrow_mut();
            match reader.result() {
                Ok(buffer) => {
                    let bytes = Uint8Array::new(&buffer).to_vec();
                    log::debug!("read {} ({} bytes)", filename, bytes.len());
                    app.upload(&filename, bytes);
                }
                Err(e) => app.set_status(&format!("Error: could not read file ({:?})", e)),
            }
        }
    });
    reader.set_onload(Some(on_load.as_ref().unchecked_ref()));
    on_load.forget();

    reader.read_as_array_buffer(&file)
}
