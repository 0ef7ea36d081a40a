//! Sheetmark Web - WebAssembly version of the spreadsheet annotation tool
//!
//! This crate provides a browser-based version of Sheetmark using Ratzilla
//! for terminal rendering in the DOM.

use std::cell::RefCell;
use std::rc::Rc;

use ratzilla::ratatui::Terminal;
use ratzilla::{event::KeyCode, DomBackend, WebRenderer};
use wasm_bindgen::prelude::*;

use sheetmark_core::{App, AnnotatorConfig, ExportFormat, InputTarget, Mode, RoleKind};

pub mod io;
mod ui;

/// Sample table for the demo
const SAMPLE_CSV: &str = r####"question,model_output,verdict,comment
What is 2+2?,"###Reasoning\nAdding two and two gives four.\n###Answer\n4",,
Capital of France?,"private_answer: Paris is the capital. public_answer: Paris",,
Is water wet?,"Depends on the definition of wet.",,
"####;

/// Initialize the Sheetmark web application
#[wasm_bindgen(start)]
pub fn main() -> Result<(), JsValue> {
    // Set up panic hook for better error messages
    console_error_panic_hook::set_once();
    console_log::init_with_level(log::Level::Info)
        .map_err(|e| JsValue::from_str(&format!("Failed to initialize logging: {}", e)))?;

    // Create app with the sample table
    let mut app = App::new(AnnotatorConfig::default());
    app.upload("demo.csv", SAMPLE_CSV.as_bytes().to_vec());
    app.set_status("Welcome to Sheetmark! Assign column roles with 0-4, '?' for help");

    // Wrap in Rc<RefCell> for shared state
    let app_state = Rc::new(RefCell::new(app));

    // Create terminal with DOM backend
    let backend = DomBackend::new()
        .map_err(|e| JsValue::from_str(&format!("Failed to create backend: {:?}", e)))?;
    let mut terminal = Terminal::new(backend)
        .map_err(|e| JsValue::from_str(&format!("Failed to create terminal: {:?}", e)))?;

    // Set up keyboard handler
    terminal.on_key_event({
        let app_state_cloned = app_state.clone();
        move |event| {
            let wants_file = {
                let mut app = app_state_cloned.borrow_mut();
                app.clear_status();

                match app.mode {
                    Mode::Normal => handle_normal_mode(&mut app, event.code),
                    Mode::Configure => handle_configure_mode(&mut app, event.code),
                    Mode::LabelPicker => {
                        handle_label_picker(&mut app, event.code);
                        false
                    }
                    Mode::ExportPicker => {
                        handle_export_picker(&mut app, event.code);
                        false
                    }
                    Mode::Input => {
                        handle_input_mode(&mut app, event.code);
                        false
                    }
                    Mode::Help => {
                        app.mode = Mode::Normal;
                        false
                    }
                }
            };

            // The picker's callbacks borrow the app again, so the borrow above must end first
            if wants_file {
                if let Err(e) = io::pick_file(app_state_cloned.clone()) {
                    app_state_cloned
                        .borrow_mut()
                        .set_status(&format!("Error: could not open file picker ({:?})", e));
                }
            }
        }
    });

    // Draw loop
    terminal.draw_web(move |frame| {
        let app = app_state.borrow();
        ui::draw(frame, &app);
    });

    log::info!("Sheetmark WASM initialized");

    Ok(())
}

fn download(app: &mut App, format: ExportFormat) {
    if let Some(payload) = app.export(format) {
        match io::download(&payload) {
            Ok(()) => app.set_status(&format!("Downloaded {}", payload.filename)),
            Err(e) => app.set_status(&format!("Export failed: {:?}", e)),
        }
    }
}

/// Returns true when the upload picker should open
fn handle_normal_mode(app: &mut App, code: KeyCode) -> bool {
    match code {
        KeyCode::Char('?') => app.mode = Mode::Help,

        // Row navigation
        KeyCode::Char('l') | KeyCode::Right | KeyCode::Char('n') => app.next_row(),
        KeyCode::Char('h') | KeyCode::Left | KeyCode::Char('p') => app.prev_row(),
        KeyCode::Char('g') => app.first_row(),
        KeyCode::Char('G') => app.last_row(),

        // Field selection
        KeyCode::Char('j') | KeyCode::Down | KeyCode::Tab => app.move_field(true),
        KeyCode::Char('k') | KeyCode::Up => app.move_field(false),
        KeyCode::Enter => app.edit_selected_field(),

        // Scroll long cells
        KeyCode::Char('J') => app.scroll_by(5),
        KeyCode::Char('K') => app.scroll_by(-5),

        KeyCode::Char('s') => {
            if app.save() {
                app.set_status("Saved");
            }
        }

        // Column roles
        KeyCode::Char('c') => app.start_configure(),

        // Export
        KeyCode::Char('e') => app.open_export_picker(),
        KeyCode::Char('E') => download(app, ExportFormat::Xlsx),

        // Upload
        KeyCode::Char('o') => return true,

        _ => {}
    }
    false
}

/// Returns true when the upload picker should open
fn handle_configure_mode(app: &mut App, code: KeyCode) -> bool {
    match code {
        KeyCode::Char('?') => app.mode = Mode::Help,
        KeyCode::Char('j') | KeyCode::Down => app.move_column(true),
        KeyCode::Char('k') | KeyCode::Up => app.move_column(false),
        KeyCode::Char('0') | KeyCode::Backspace => app.assign_role(None),
        KeyCode::Char('1') => app.assign_role(Some(RoleKind::Display)),
        KeyCode::Char('2') => app.assign_role(Some(RoleKind::FormattedDisplay)),
        KeyCode::Char('3') => app.assign_role(Some(RoleKind::SingleChoiceLabel)),
        KeyCode::Char('4') => app.assign_role(Some(RoleKind::FreeTextNote)),
        KeyCode::Enter => {
            app.confirm_roles();
        }
        KeyCode::Esc => {
            if app.view.is_some() {
                app.mode = Mode::Normal;
            }
        }
        KeyCode::Char('o') => return true,
        _ => {}
    }
    false
}

fn handle_label_picker(app: &mut App, code: KeyCode) {
    match code {
        KeyCode::Esc => {
            app.mode = Mode::Normal;
            app.pending_column = None;
        }
        KeyCode::Char('j') | KeyCode::Down => app.move_label(true),
        KeyCode::Char('k') | KeyCode::Up => app.move_label(false),
        KeyCode::Enter => app.choose_label(),
        KeyCode::Char(c @ '1'..='9') => {
            let idx = c as usize - '1' as usize;
            if idx < app.picker_options().len() {
                app.label_selected = idx;
                app.choose_label();
            }
        }
        _ => {}
    }
}

fn handle_export_picker(app: &mut App, code: KeyCode) {
    match code {
        KeyCode::Esc => app.mode = Mode::Normal,
        KeyCode::Char('j') | KeyCode::Down => app.move_export(true),
        KeyCode::Char('k') | KeyCode::Up => app.move_export(false),
        KeyCode::Enter => {
            let format = ExportFormat::all()[app.export_selected];
            download(app, format);
        }
        KeyCode::Char('1') => download(app, ExportFormat::Xlsx),
        KeyCode::Char('2') => download(app, ExportFormat::Csv),
        KeyCode::Char('3') => download(app, ExportFormat::Json),
        _ => {}
    }
}

fn handle_input_mode(app: &mut App, code: KeyCode) {
    match code {
        KeyCode::Esc => app.cancel_input(),
        KeyCode::Enter => match app.input_target {
            InputTarget::Note | InputTarget::LabelOptions => app.complete_input(),
            // Uploads go through the browser picker
            InputTarget::FilePath => app.cancel_input(),
        },
        KeyCode::Backspace => {
            app.input_buffer.pop();
        }
        KeyCode::Char(c) => app.push_input(c),
        _ => {}
    }
}
