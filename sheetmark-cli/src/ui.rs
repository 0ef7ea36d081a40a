//! Terminal UI rendering

use ratatui::{
    layout::{Constraint, Direction, Layout, Rect},
    style::{Color, Modifier, Style},
    text::{Line, Span},
    widgets::{Block, Borders, Cell, Clear, Gauge, List, ListItem, Paragraph, Row, Table, Wrap},
    Frame,
};

use sheetmark_core::{actions, App, ExportFormat, FieldKind, InputTarget, Mode, RoleKind};

// Catppuccin Mocha colors
const SURFACE0: Color = Color::Rgb(49, 50, 68);
const SURFACE1: Color = Color::Rgb(69, 71, 90);
const TEXT: Color = Color::Rgb(205, 214, 244);
const SUBTEXT0: Color = Color::Rgb(166, 173, 200);
const RED: Color = Color::Rgb(243, 139, 168);
const YELLOW: Color = Color::Rgb(249, 226, 175);
const GREEN: Color = Color::Rgb(166, 227, 161);
const BLUE: Color = Color::Rgb(137, 180, 250);
const MAUVE: Color = Color::Rgb(203, 166, 247);
const TEAL: Color = Color::Rgb(148, 226, 213);

const PREVIEW_CELL_CHARS: usize = 24;

pub fn draw(frame: &mut Frame, app: &App) {
    let chunks = Layout::default()
        .direction(Direction::Vertical)
        .constraints([
            Constraint::Length(1), // Title bar
            Constraint::Min(0),    // Main content
            Constraint::Length(1), // Status bar
        ])
        .split(frame.area());

    draw_title_bar(frame, app, chunks[0]);
    draw_main_area(frame, app, chunks[1]);
    draw_status_bar(frame, app, chunks[2]);

    // Draw popups/overlays
    match app.mode {
        Mode::LabelPicker => draw_label_picker(frame, app),
        Mode::ExportPicker => draw_export_picker(frame, app),
        Mode::Input => draw_input_dialog(frame, app),
        Mode::Help => draw_help(frame),
        _ => {}
    }
}

fn configuring(app: &App) -> bool {
    app.mode == Mode::Configure
        || (app.mode == Mode::Input && app.input_target == InputTarget::LabelOptions)
}

fn draw_title_bar(frame: &mut Frame, app: &App, area: Rect) {
    let progress = match &app.view {
        Some(view) if !configuring(app) => format!(
            " [{}/{}] {}",
            view.position(),
            view.total,
            actions::answered_rows(view, app.session.store().len())
        ),
        _ => String::new(),
    };

    let title_text = format!(
        " Sheetmark - {} ({}){}",
        app.title(),
        app.session.step().as_str(),
        progress
    );

    let title_bar = Paragraph::new(title_text).style(Style::default().fg(TEXT).bg(SURFACE0));
    frame.render_widget(title_bar, area);
}

fn draw_main_area(frame: &mut Frame, app: &App, area: Rect) {
    if configuring(app) || (app.view.is_none() && app.preview.is_some()) {
        draw_configure(frame, app, area);
    } else if app.view.is_some() {
        draw_row(frame, app, area);
    } else {
        draw_welcome(frame, area);
    }
}

fn draw_welcome(frame: &mut Frame, area: Rect) {
    let block = Block::default()
        .borders(Borders::ALL)
        .border_style(Style::default().fg(SUBTEXT0))
        .title("Sheetmark");

    let text = vec![
        Line::from(""),
        Line::from(Span::styled(
            "Annotate spreadsheet rows with labels and notes",
            Style::default().fg(MAUVE).add_modifier(Modifier::BOLD),
        )),
        Line::from(""),
        Line::from("  o   open an .xlsx, .csv or .json file"),
        Line::from("  ?   help"),
        Line::from("  q   quit"),
    ];

    frame.render_widget(Paragraph::new(text).block(block), area);
}

fn draw_configure(frame: &mut Frame, app: &App, area: Rect) {
    let chunks = Layout::default()
        .direction(Direction::Horizontal)
        .constraints([
            Constraint::Length(36), // Column roles
            Constraint::Min(0),     // Preview
        ])
        .split(area);

    let block = Block::default()
        .borders(Borders::ALL)
        .border_style(Style::default().fg(BLUE))
        .title("Columns (0-4 role, Enter confirm)");

    let items: Vec<ListItem> = app
        .columns()
        .iter()
        .enumerate()
        .map(|(i, column)| {
            let selected = i == app.column_selected;
            let marker = if selected { ">" } else { " " };
            let role = app.pending_roles.role(column);
            let tag = role.map(|r| r.kind().short()).unwrap_or("-");
            let color = role.map(|r| role_color(r.kind())).unwrap_or(SUBTEXT0);

            let style = if selected {
                Style::default().fg(color).bg(SURFACE1)
            } else {
                Style::default().fg(color)
            };
            ListItem::new(format!("{} [{:<5}] {}", marker, tag, column)).style(style)
        })
        .collect();

    frame.render_widget(List::new(items).block(block), chunks[0]);
    draw_preview(frame, app, chunks[1]);
}

fn draw_preview(frame: &mut Frame, app: &App, area: Rect) {
    let total = app.session.table().map(|t| t.row_count()).unwrap_or(0);
    let block = Block::default()
        .borders(Borders::ALL)
        .border_style(Style::default().fg(SUBTEXT0))
        .title(format!("Preview ({} rows)", total));

    let Some(head) = &app.preview else {
        frame.render_widget(block, area);
        return;
    };

    let header = Row::new(
        head.columns
            .iter()
            .map(|c| Cell::from(c.as_str()).style(Style::default().fg(MAUVE))),
    );
    let rows = head.rows.iter().map(|row| {
        Row::new(row.iter().map(|value| {
            let text: String = value
                .to_string()
                .replace('\n', " ")
                .chars()
                .take(PREVIEW_CELL_CHARS)
                .collect();
            Cell::from(text)
        }))
        .style(Style::default().fg(TEXT))
    });
    let widths = vec![Constraint::Min(8); head.column_count()];

    let table = Table::new(rows, widths)
        .header(header)
        .column_spacing(2)
        .block(block);
    frame.render_widget(table, area);
}

fn draw_row(frame: &mut Frame, app: &App, area: Rect) {
    let Some(view) = &app.view else {
        return;
    };

    let chunks = Layout::default()
        .direction(Direction::Vertical)
        .constraints([
            Constraint::Length(1), // Progress
            Constraint::Min(0),    // Fields
        ])
        .split(area);

    let gauge = Gauge::default()
        .gauge_style(Style::default().fg(GREEN).bg(SURFACE0))
        .ratio(view.progress().clamp(0.0, 1.0))
        .label(format!("Row {} of {}", view.position(), view.total));
    frame.render_widget(gauge, chunks[0]);

    let block = Block::default()
        .borders(Borders::ALL)
        .border_style(Style::default().fg(BLUE))
        .title(format!("Row {}", view.position()));

    let mut lines: Vec<Line> = Vec::new();
    let mut editable_idx = 0;
    for field in &view.fields {
        let kind_style = Style::default().add_modifier(Modifier::BOLD);
        let selected = field.kind.is_editable() && editable_idx == app.field_selected;
        let marker = if selected { "> " } else { "  " };

        match &field.kind {
            FieldKind::Display { text } => {
                lines.push(Line::from(Span::styled(
                    format!("{}{}", marker, field.column),
                    kind_style.fg(role_color(RoleKind::Display)),
                )));
                lines.extend(text.lines().map(|l| Line::from(format!("  {}", l))));
            }
            FieldKind::Formatted { text } => {
                lines.push(Line::from(Span::styled(
                    format!("{}{}", marker, field.column),
                    kind_style.fg(role_color(RoleKind::FormattedDisplay)),
                )));
                lines.extend(text.lines().map(|l| markdown_line(l)));
            }
            FieldKind::Label { options, selected: stored } => {
                let current = app.draft_value(&field.column).or(stored.as_deref());
                let mut spans = vec![Span::styled(
                    format!("{}{}: ", marker, field.column),
                    selected_style(kind_style.fg(role_color(RoleKind::SingleChoiceLabel)), selected),
                )];
                for option in options {
                    let style = if Some(option.as_str()) == current {
                        Style::default().fg(SURFACE0).bg(YELLOW)
                    } else {
                        Style::default().fg(SUBTEXT0)
                    };
                    spans.push(Span::styled(format!(" {} ", option), style));
                    spans.push(Span::raw(" "));
                }
                lines.push(Line::from(spans));
                editable_idx += 1;
            }
            FieldKind::Note { text, max_chars } => {
                let current = app.draft_value(&field.column).unwrap_or(text);
                let count = current.chars().count();
                lines.push(Line::from(vec![
                    Span::styled(
                        format!("{}{}: ", marker, field.column),
                        selected_style(kind_style.fg(role_color(RoleKind::FreeTextNote)), selected),
                    ),
                    Span::styled(
                        if current.is_empty() { "(empty)" } else { current },
                        Style::default().fg(TEXT),
                    ),
                    Span::styled(
                        format!("  {}/{}", count, max_chars),
                        Style::default().fg(SUBTEXT0),
                    ),
                ]));
                editable_idx += 1;
            }
        }
        lines.push(Line::from(""));
    }

    let paragraph = Paragraph::new(lines)
        .style(Style::default().fg(TEXT))
        .block(block)
        .scroll((app.scroll, 0))
        .wrap(Wrap { trim: false });
    frame.render_widget(paragraph, chunks[1]);
}

/// Bold `**heading**` lines produced by the formatter
fn markdown_line(line: &str) -> Line<'static> {
    let trimmed = line.trim();
    match trimmed
        .strip_prefix("**")
        .and_then(|rest| rest.strip_suffix("**"))
    {
        Some(heading) if !heading.is_empty() => Line::from(Span::styled(
            format!("  {}", heading),
            Style::default().fg(MAUVE).add_modifier(Modifier::BOLD),
        )),
        _ => Line::from(format!("  {}", line)),
    }
}

fn selected_style(style: Style, selected: bool) -> Style {
    if selected {
        style.bg(SURFACE1)
    } else {
        style
    }
}

fn draw_status_bar(frame: &mut Frame, app: &App, area: Rect) {
    let mode_str = match app.mode {
        Mode::Normal => "NORMAL",
        Mode::Configure => "CONFIGURE",
        Mode::LabelPicker => "LABEL",
        Mode::ExportPicker => "EXPORT",
        Mode::Input => "INPUT",
        Mode::Help => "HELP",
    };

    let status = app.status_message.as_deref().unwrap_or("");

    let help_hint = match app.mode {
        Mode::Configure => "j/k column | 0-4 role | Enter confirm | o open | ? help",
        _ => "h/l row | j/k field | Enter edit | s save | e export | c configure | ? help",
    };

    let status_text = format!(
        " {} | {}",
        mode_str,
        if status.is_empty() { help_hint } else { status },
    );

    let style = if status.starts_with("Error") {
        Style::default().fg(RED).bg(SURFACE0)
    } else if status.starts_with("Warning") {
        Style::default().fg(YELLOW).bg(SURFACE0)
    } else {
        Style::default().fg(SUBTEXT0).bg(SURFACE0)
    };

    frame.render_widget(Paragraph::new(status_text).style(style), area);
}

fn draw_label_picker(frame: &mut Frame, app: &App) {
    let options = app.picker_options();
    let area = centered_rect(40, options.len() as u16 + 2, frame.area());
    frame.render_widget(Clear, area);

    let block = Block::default()
        .borders(Borders::ALL)
        .border_style(Style::default().fg(MAUVE))
        .title("Select Label (1-9 or j/k)");

    let items: Vec<ListItem> = options
        .iter()
        .enumerate()
        .map(|(i, option)| {
            let selected = i == app.label_selected;
            let marker = if selected { ">" } else { " " };
            let style = if selected {
                Style::default().fg(YELLOW).bg(SURFACE1)
            } else {
                Style::default().fg(YELLOW)
            };
            ListItem::new(format!("{} {} {}", i + 1, marker, option)).style(style)
        })
        .collect();

    frame.render_widget(List::new(items).block(block), area);
}

fn draw_export_picker(frame: &mut Frame, app: &App) {
    let area = centered_rect(40, ExportFormat::all().len() as u16 + 2, frame.area());
    frame.render_widget(Clear, area);

    let block = Block::default()
        .borders(Borders::ALL)
        .border_style(Style::default().fg(MAUVE))
        .title("Export As (1-3 or j/k)");

    let items: Vec<ListItem> = ExportFormat::all()
        .iter()
        .enumerate()
        .map(|(i, format)| {
            let selected = i == app.export_selected;
            let marker = if selected { ">" } else { " " };
            let style = if selected {
                Style::default().fg(TEAL).bg(SURFACE1)
            } else {
                Style::default().fg(TEAL)
            };
            ListItem::new(format!("{} {} {}", i + 1, marker, format.as_str())).style(style)
        })
        .collect();

    frame.render_widget(List::new(items).block(block), area);
}

fn draw_input_dialog(frame: &mut Frame, app: &App) {
    let area = centered_rect(60, 5, frame.area());
    frame.render_widget(Clear, area);

    let title = match (app.input_target, app.input_limit()) {
        (InputTarget::Note, Some(limit)) => format!(
            "Enter note ({}/{}, then press Enter)",
            app.input_buffer.chars().count(),
            limit
        ),
        (InputTarget::Note, None) => "Enter note (then press Enter)".to_string(),
        (InputTarget::LabelOptions, _) => "Label options, comma separated".to_string(),
        (InputTarget::FilePath, _) => "Enter file path".to_string(),
    };

    let block = Block::default()
        .borders(Borders::ALL)
        .border_style(Style::default().fg(GREEN))
        .title(title);

    let inner = block.inner(area);
    frame.render_widget(block, area);

    let input = Paragraph::new(format!("{}_", app.input_buffer))
        .style(Style::default().fg(TEXT))
        .wrap(Wrap { trim: false });
    frame.render_widget(input, inner);
}

fn draw_help(frame: &mut Frame) {
    let area = centered_rect(60, 24, frame.area());
    frame.render_widget(Clear, area);

    let block = Block::default()
        .borders(Borders::ALL)
        .border_style(Style::default().fg(BLUE))
        .title("Help (press any key to close)");

    let heading = Style::default().fg(MAUVE).add_modifier(Modifier::BOLD);
    let help_text = vec![
        Line::from(Span::styled("Rows", heading)),
        Line::from("  h/l      Previous/next row (saves first)"),
        Line::from("  g/G      First/last row"),
        Line::from("  J/K      Scroll the row"),
        Line::from(""),
        Line::from(Span::styled("Annotating", heading)),
        Line::from("  j/k      Select label or note field"),
        Line::from("  Enter    Pick a label or edit a note"),
        Line::from("  s        Save the current row"),
        Line::from(""),
        Line::from(Span::styled("Columns", heading)),
        Line::from("  c        Configure column roles"),
        Line::from("  0-4      None/display/formatted/label/note"),
        Line::from(""),
        Line::from(Span::styled("File", heading)),
        Line::from("  o        Open a table"),
        Line::from("  e        Export (xlsx, csv, json)"),
        Line::from("  E        Export as xlsx"),
        Line::from("  q        Quit"),
        Line::from(""),
        Line::from(Span::styled("Press any key to close", Style::default().fg(SUBTEXT0))),
    ];

    frame.render_widget(Paragraph::new(help_text).block(block), area);
}

fn role_color(kind: RoleKind) -> Color {
    match kind {
        RoleKind::Display => TEXT,
        RoleKind::FormattedDisplay => BLUE,
        RoleKind::SingleChoiceLabel => YELLOW,
        RoleKind::FreeTextNote => GREEN,
    }
}

fn centered_rect(width: u16, height: u16, area: Rect) -> Rect {
    let x = area.x + (area.width.saturating_sub(width)) / 2;
    let y = area.y + (area.height.saturating_sub(height)) / 2;
    Rect::new(x, y, width.min(area.width), height.min(area.height))
}
