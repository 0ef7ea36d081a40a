//! Sheetmark CLI - Terminal-based spreadsheet annotation tool

mod io;
mod logging;
mod ui;

use std::io::stdout;
use std::path::PathBuf;

use anyhow::Result;
use clap::Parser;
use crossterm::{
    event::{self, Event, KeyCode, KeyEventKind},
    execute,
    terminal::{disable_raw_mode, enable_raw_mode, EnterAlternateScreen, LeaveAlternateScreen},
};
use ratatui::prelude::*;

use sheetmark_core::{App, ExportFormat, InputTarget, Mode, RoleKind};

/// Annotate spreadsheet rows with labels and notes, then export them
#[derive(Debug, Parser)]
#[command(name = "sheetmark", version, about)]
struct Cli {
    /// Table to open (.xlsx, .csv or .json)
    file: Option<String>,

    /// Settings file (defaults to ~/.sheetmark/config.json when present)
    #[arg(long)]
    config: Option<PathBuf>,

    /// Directory for exported files (defaults to ~/.sheetmark/exports)
    #[arg(long)]
    out_dir: Option<PathBuf>,

    /// Increase log verbosity (-v, -vv, -vvv)
    #[arg(short, long, action = clap::ArgAction::Count)]
    verbose: u8,
}

fn main() -> Result<()> {
    let cli = Cli::parse();

    logging::init_logging(&io::sheetmark_dir()?.join("sheetmark.log"), cli.verbose)?;
    let config = io::load_config(cli.config.as_deref())?;

    // Setup terminal
    enable_raw_mode()?;
    let mut stdout = stdout();
    execute!(stdout, EnterAlternateScreen)?;
    let backend = CrosstermBackend::new(stdout);
    let mut terminal = Terminal::new(backend)?;

    // Create app
    let mut app = App::new(config);
    tracing::info!(session = %app.session.id(), "session started");

    // Load file if provided
    if let Some(path) = &cli.file {
        open_file(&mut app, path);
    } else {
        app.set_status("No file loaded. Press 'o' to open one.");
    }

    // Main loop
    let res = run_app(&mut terminal, &mut app, &cli);

    // Restore terminal
    disable_raw_mode()?;
    execute!(terminal.backend_mut(), LeaveAlternateScreen)?;
    terminal.show_cursor()?;

    if let Err(e) = res {
        tracing::error!(error = %e, "terminal loop failed");
        eprintln!("Error: {}", e);
    }

    Ok(())
}

fn run_app<B: Backend>(terminal: &mut Terminal<B>, app: &mut App, cli: &Cli) -> Result<()> {
    while app.running {
        terminal.draw(|f| ui::draw(f, app))?;

        if let Event::Key(key) = event::read()? {
            if key.kind != KeyEventKind::Press {
                continue;
            }
            // Clear status on any key
            app.clear_status();

            match app.mode {
                Mode::Normal => handle_normal_mode(app, key.code, cli),
                Mode::Configure => handle_configure_mode(app, key.code),
                Mode::LabelPicker => handle_label_picker(app, key.code),
                Mode::ExportPicker => handle_export_picker(app, key.code, cli),
                Mode::Input => handle_input_mode(app, key.code),
                Mode::Help => {
                    app.mode = Mode::Normal;
                }
            }
        }
    }
    Ok(())
}

fn open_file(app: &mut App, path: &str) {
    match io::load_file(path) {
        Ok(file) => {
            app.upload(&file.filename, file.bytes);
        }
        Err(e) => {
            app.set_status(&format!("Error: {:#}", e));
        }
    }
}

fn export(app: &mut App, format: ExportFormat, cli: &Cli) {
    if let Some(payload) = app.export(format) {
        match io::write_export(&payload, cli.out_dir.as_deref()) {
            Ok(path) => app.set_status(&format!("Exported to {}", path.display())),
            Err(e) => app.set_status(&format!("Export failed: {:#}", e)),
        }
    }
}

fn handle_normal_mode(app: &mut App, code: KeyCode, cli: &Cli) {
    match code {
        KeyCode::Char('q') => {
            app.save();
            app.running = false;
        }
        KeyCode::Char('?') => app.mode = Mode::Help,

        // Row navigation
        KeyCode::Char('l') | KeyCode::Right | KeyCode::Char('n') => app.next_row(),
        KeyCode::Char('h') | KeyCode::Left | KeyCode::Char('p') => app.prev_row(),
        KeyCode::Char('g') => app.first_row(),
        KeyCode::Char('G') => app.last_row(),

        // Field selection
        KeyCode::Char('j') | KeyCode::Down | KeyCode::Tab => app.move_field(true),
        KeyCode::Char('k') | KeyCode::Up | KeyCode::BackTab => app.move_field(false),
        KeyCode::Enter => app.edit_selected_field(),

        // Scroll long cells
        KeyCode::Char('J') | KeyCode::PageDown => app.scroll_by(5),
        KeyCode::Char('K') | KeyCode::PageUp => app.scroll_by(-5),

        KeyCode::Char('s') => {
            if app.save() {
                app.set_status("Saved");
            }
        }

        // Column roles
        KeyCode::Char('c') => app.start_configure(),

        // Export
        KeyCode::Char('e') => app.open_export_picker(),
        KeyCode::Char('E') => export(app, ExportFormat::Xlsx, cli),

        // Open file
        KeyCode::Char('o') => app.start_open(),

        _ => {}
    }
}

fn handle_configure_mode(app: &mut App, code: KeyCode) {
    match code {
        KeyCode::Char('q') => app.running = false,
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
        KeyCode::Char('o') => app.start_open(),
        _ => {}
    }
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
        // Quick select
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

fn handle_export_picker(app: &mut App, code: KeyCode, cli: &Cli) {
    match code {
        KeyCode::Esc => app.mode = Mode::Normal,
        KeyCode::Char('j') | KeyCode::Down => app.move_export(true),
        KeyCode::Char('k') | KeyCode::Up => app.move_export(false),
        KeyCode::Enter => {
            let format = ExportFormat::all()[app.export_selected];
            export(app, format, cli);
        }
        KeyCode::Char('1') => export(app, ExportFormat::Xlsx, cli),
        KeyCode::Char('2') => export(app, ExportFormat::Csv, cli),
        KeyCode::Char('3') => export(app, ExportFormat::Json, cli),
        _ => {}
    }
}

fn handle_input_mode(app: &mut App, code: KeyCode) {
    match code {
        KeyCode::Esc => app.cancel_input(),
        KeyCode::Enter => match app.input_target {
            InputTarget::FilePath => {
                let path = std::mem::take(&mut app.input_buffer);
                app.cancel_input();
                open_file(app, &path);
            }
            InputTarget::Note | InputTarget::LabelOptions => app.complete_input(),
        },
        KeyCode::Backspace => {
            app.input_buffer.pop();
        }
        KeyCode::Char(c) => app.push_input(c),
        _ => {}
    }
}
