//! UI rendering functions

use ratatui::prelude::*;
use ratatui::widgets::{
    Block, Borders, Cell, Clear, List, ListItem, Paragraph, Row, Scrollbar,
    ScrollbarOrientation, ScrollbarState, Table, Tabs, Wrap,
};

use crate::app::App;
use wslm::types::*;

pub fn ui(frame: &mut Frame, app: &mut App) {
    let main_chunks = Layout::default()
        .direction(Direction::Vertical)
        .constraints([
            Constraint::Length(1),
            Constraint::Min(10),
            Constraint::Length(3),
            Constraint::Length(1),
        ])
        .split(frame.area());

    render_title(frame, app, main_chunks[0]);

    let panes = Layout::default()
        .direction(Direction::Horizontal)
        .constraints([
            Constraint::Length(22),
            Constraint::Min(40),
            Constraint::Length(38),
        ])
        .split(main_chunks[1]);

    render_filter_pane(frame, app, panes[0]);
    match app.tab {
        Tab::Installed => render_installed_table(frame, app, panes[1]),
        Tab::Available => render_available_table(frame, app, panes[1]),
    }
    render_details_pane(frame, app, panes[2]);

    match app.state {
        AppState::Listing | AppState::Searching => {}
        AppState::ConfirmDelete => render_delete_modal(frame, app, main_chunks[1]),
        AppState::EnteringRename | AppState::EnteringInstall => {
            render_name_prompt(frame, app, main_chunks[1]);
        }
        AppState::ShowingMessage => render_message_modal(frame, app, main_chunks[1]),
        AppState::ShowingHelp => render_help_modal(frame, main_chunks[1]),
        AppState::ConfirmExit => render_exit_confirm_modal(frame, app, main_chunks[1]),
    }

    let status_style = match app.state {
        AppState::Listing if app.is_busy() => Style::default().fg(Color::Cyan),
        AppState::Listing => Style::default().fg(Color::Yellow),
        AppState::Searching => Style::default().fg(Color::White),
        AppState::ConfirmDelete | AppState::ConfirmExit => Style::default().fg(Color::Red),
        AppState::EnteringRename | AppState::EnteringInstall => Style::default().fg(Color::Magenta),
        AppState::ShowingMessage | AppState::ShowingHelp => Style::default().fg(Color::Cyan),
    };

    let status_text = match app.state {
        AppState::Searching => format!("/{}_", app.search_query),
        _ if !app.search_query.is_empty() => {
            format!("[Search: {}] {}", app.search_query, app.status_message)
        }
        _ => app.status_message.clone(),
    };
    let status = Paragraph::new(status_text)
        .style(status_style)
        .block(Block::default().borders(Borders::ALL));
    frame.render_widget(status, main_chunks[2]);

    let help_text = match app.state {
        AppState::Listing => match app.tab {
            Tab::Installed => "←→:Tab │ /:Search │ d:Delete │ n:Rename │ r:Refresh │ e:Export │ ?:Help │ q:Quit",
            Tab::Available => "←→:Tab │ /:Search │ i/Enter:Install │ r:Refresh │ e:Export │ ?:Help │ q:Quit",
        },
        AppState::Searching => "Enter:Confirm │ Esc:Cancel │ Type to search...",
        AppState::ConfirmDelete => "y:Delete │ n/Esc:Cancel",
        AppState::EnteringRename | AppState::EnteringInstall => "Enter:Confirm │ Esc:Cancel",
        AppState::ShowingMessage | AppState::ShowingHelp => "Esc/Enter/q:Close",
        AppState::ConfirmExit => "y/Enter:Quit │ n/Esc:Cancel",
    };
    let help = Paragraph::new(help_text)
        .style(Style::default().fg(Color::DarkGray))
        .alignment(Alignment::Center);
    frame.render_widget(help, main_chunks[3]);

    if app.state == AppState::Searching {
        // Cursor after "/<query>" in the status bar (inside border: +1 x, +1 y)
        let cursor_x = main_chunks[2].x + 1 + 1 + app.search_query.chars().count() as u16;
        let cursor_y = main_chunks[2].y + 1;
        frame.set_cursor_position((cursor_x, cursor_y));
    }
}

fn render_title(frame: &mut Frame, app: &App, area: Rect) {
    let chunks = Layout::default()
        .direction(Direction::Horizontal)
        .constraints([Constraint::Length(16), Constraint::Length(30), Constraint::Min(10)])
        .split(area);

    let bar = Style::default().fg(Color::White).bg(Color::Blue).bold();
    frame.render_widget(Paragraph::new(" WSL Manager ").style(bar), chunks[0]);

    let titles: Vec<String> = Tab::all()
        .iter()
        .map(|tab| match tab {
            Tab::Installed => format!("{} ({})", tab.label(), app.installed.len()),
            Tab::Available => format!("{} ({})", tab.label(), app.available.len()),
        })
        .collect();
    let tabs = Tabs::new(titles)
        .select(app.tab.index())
        .style(Style::default().fg(Color::Gray).bg(Color::Blue))
        .highlight_style(Style::default().fg(Color::Yellow).bold())
        .divider("│");
    frame.render_widget(tabs, chunks[1]);

    let activity = match app.worker.status() {
        wslm::worker::ActionStatus::Running(what) => format!(" {what}... "),
        _ => String::new(),
    };
    frame.render_widget(
        Paragraph::new(activity)
            .style(Style::default().fg(Color::Black).bg(Color::Blue))
            .alignment(Alignment::Right),
        chunks[2],
    );
}

fn render_filter_pane(frame: &mut Frame, app: &mut App, area: Rect) {
    let is_focused = app.ui.focused_pane == FocusedPane::Filters;

    let chunks = Layout::default()
        .direction(Direction::Vertical)
        .constraints([Constraint::Min(6), Constraint::Length(6)])
        .split(area);

    let items: Vec<ListItem> = FilterCategory::for_tab(app.tab)
        .iter()
        .map(|filter| {
            let label = format!("{} ({})", filter.label(), app.filter_count(*filter));
            let style = if *filter == app.filter {
                Style::default().fg(Color::Yellow).bold()
            } else {
                Style::default()
            };
            ListItem::new(label).style(style)
        })
        .collect();

    let border_style = if is_focused {
        Style::default().fg(Color::Cyan)
    } else {
        Style::default().fg(Color::DarkGray)
    };

    let list = List::new(items)
        .block(
            Block::default()
                .title(" Filters ")
                .borders(Borders::ALL)
                .border_style(border_style),
        )
        .highlight_style(Style::default().bg(Color::DarkGray))
        .highlight_symbol("▶ ");

    frame.render_stateful_widget(list, chunks[0], &mut app.ui.filter_state);

    let legend = match app.tab {
        Tab::Installed => vec![
            legend_line(DistributionState::Running.symbol(), DistributionState::Running.color(), "Running"),
            legend_line(DistributionState::Stopped.symbol(), DistributionState::Stopped.color(), "Stopped"),
            legend_line(DistributionState::Installing.symbol(), DistributionState::Installing.color(), "Installing"),
            legend_line("*", Color::Yellow, "Default"),
        ],
        Tab::Available => Category::all()
            .iter()
            .map(|c| legend_line("●", c.color(), c.label()))
            .collect(),
    };

    let legend_widget = Paragraph::new(legend).block(
        Block::default()
            .title(" Legend ")
            .borders(Borders::ALL)
            .border_style(Style::default().fg(Color::DarkGray)),
    );

    frame.render_widget(legend_widget, chunks[1]);
}

fn legend_line(symbol: &'static str, color: Color, label: &'static str) -> Line<'static> {
    Line::from(vec![
        Span::styled(symbol, Style::default().fg(color)),
        Span::raw(format!(" {label}")),
    ])
}

fn list_border(app: &App) -> Style {
    if app.ui.focused_pane == FocusedPane::List {
        Style::default().fg(Color::Cyan)
    } else {
        Style::default().fg(Color::DarkGray)
    }
}

fn render_installed_table(frame: &mut Frame, app: &mut App, area: Rect) {
    let header = Row::new(
        ["", "Name", "State", "Version"]
            .into_iter()
            .map(|h| Cell::from(h).style(Style::default().fg(Color::Cyan).bold())),
    )
    .height(1);

    let visible = app.visible_installed();
    let name_width = visible.iter().map(|d| d.name.len()).max().unwrap_or(4).max(4) as u16;
    let rows: Vec<Row<'static>> = visible
        .iter()
        .map(|dist| {
            let name_style = if dist.is_default {
                Style::default().fg(Color::White).bold()
            } else {
                Style::default()
            };
            Row::new(vec![
                Cell::from(if dist.is_default { "*" } else { " " }).style(Style::default().fg(Color::Yellow)),
                Cell::from(dist.name.clone()).style(name_style),
                Cell::from(format!("{} {}", dist.state.symbol(), dist.state))
                    .style(Style::default().fg(dist.state.color())),
                Cell::from(format!("WSL{}", dist.version)),
            ])
        })
        .collect();
    let count = rows.len();

    let widths = [
        Constraint::Length(1),
        Constraint::Length(name_width),
        Constraint::Length(14),
        Constraint::Length(7),
    ];

    let title = if app.installed.is_empty() && !app.is_busy() {
        " Installed (none) ".to_string()
    } else {
        format!(" Installed ({count}) ")
    };

    let table = Table::new(rows, widths)
        .header(header)
        .block(
            Block::default()
                .title(title)
                .borders(Borders::ALL)
                .border_style(list_border(app)),
        )
        .row_highlight_style(Style::default().bg(Color::DarkGray))
        .highlight_symbol("▶ ");

    frame.render_stateful_widget(table, area, &mut app.ui.table_state);
    render_scrollbar(frame, app, area, count);
}

fn render_available_table(frame: &mut Frame, app: &mut App, area: Rect) {
    let header = Row::new(
        ["Name", "Friendly name", "Category"]
            .into_iter()
            .map(|h| Cell::from(h).style(Style::default().fg(Color::Cyan).bold())),
    )
    .height(1);

    let visible = app.visible_available();
    let name_width = visible.iter().map(|d| d.name.len()).max().unwrap_or(4).max(4) as u16;
    let rows: Vec<Row<'static>> = visible
        .iter()
        .map(|dist| {
            Row::new(vec![
                Cell::from(dist.name.clone()),
                Cell::from(dist.friendly_name.clone()),
                Cell::from(dist.category.label()).style(Style::default().fg(dist.category.color())),
            ])
        })
        .collect();
    let count = rows.len();

    let widths = [
        Constraint::Length(name_width),
        Constraint::Min(20),
        Constraint::Length(10),
    ];

    let table = Table::new(rows, widths)
        .header(header)
        .block(
            Block::default()
                .title(format!(" Available ({count}) "))
                .borders(Borders::ALL)
                .border_style(list_border(app)),
        )
        .row_highlight_style(Style::default().bg(Color::DarkGray))
        .highlight_symbol("▶ ");

    frame.render_stateful_widget(table, area, &mut app.ui.table_state);
    render_scrollbar(frame, app, area, count);
}

fn render_scrollbar(frame: &mut Frame, app: &App, area: Rect, len: usize) {
    if len == 0 {
        return;
    }

    let scrollbar = Scrollbar::new(ScrollbarOrientation::VerticalRight)
        .begin_symbol(Some("↑"))
        .end_symbol(Some("↓"));

    let mut scrollbar_state = ScrollbarState::new(len)
        .position(app.ui.table_state.selected().unwrap_or(0));

    let scrollbar_area = Rect {
        x: area.x + area.width.saturating_sub(1),
        y: area.y + 1,
        width: 1,
        height: area.height.saturating_sub(2),
    };
    frame.render_stateful_widget(scrollbar, scrollbar_area, &mut scrollbar_state);
}

fn field<'a>(label: &'a str, value: impl Into<Span<'a>>) -> Line<'a> {
    Line::from(vec![
        Span::styled(label, Style::default().fg(Color::Cyan)),
        value.into(),
    ])
}

fn render_details_pane(frame: &mut Frame, app: &App, area: Rect) {
    let mut content = Vec::new();

    match app.tab {
        Tab::Installed => {
            if let Some(dist) = app.selected_installed() {
                content.extend([
                    Line::from(vec![
                        Span::styled("Name: ", Style::default().fg(Color::Cyan).bold()),
                        Span::raw(dist.name.as_str()),
                    ]),
                    Line::from(""),
                    Line::from(vec![
                        Span::styled("State: ", Style::default().fg(Color::Cyan)),
                        Span::styled(dist.state.symbol(), Style::default().fg(dist.state.color())),
                        Span::raw(format!(" {}", dist.state)),
                    ]),
                    field("Version: ", format!("WSL {}", dist.version)),
                    field("Default: ", if dist.is_default { "yes" } else { "no" }),
                ]);
            } else {
                content.push(Line::from(Span::styled(
                    "No distribution selected",
                    Style::default().fg(Color::DarkGray),
                )));
            }

            let summary = app.installed.summary();
            content.extend([
                Line::from(""),
                Line::from(Span::styled("Summary", Style::default().fg(Color::Cyan).bold())),
                field("Total: ", summary.total.to_string()),
                field("Running: ", summary.running.to_string()),
                field("Stopped: ", summary.stopped.to_string()),
                field("Default: ", summary.default_name.unwrap_or_else(|| "None".to_string())),
            ]);
            push_warnings(&mut content, &app.installed.warnings);
        }
        Tab::Available => {
            if let Some(dist) = app.selected_available() {
                content.extend([
                    Line::from(vec![
                        Span::styled("Name: ", Style::default().fg(Color::Cyan).bold()),
                        Span::raw(dist.name.as_str()),
                    ]),
                    Line::from(""),
                    field("Friendly: ", dist.friendly_name.as_str()),
                    Line::from(vec![
                        Span::styled("Category: ", Style::default().fg(Color::Cyan)),
                        Span::styled(dist.category.label(), Style::default().fg(dist.category.color())),
                    ]),
                    Line::from(""),
                    Line::from(Span::styled("Install with:", Style::default().fg(Color::Cyan))),
                    Line::from(format!("  {}", dist.install_command())),
                ]);
                if app.installed.find_ignore_case(&dist.name).is_some() {
                    content.push(Line::from(Span::styled(
                        "Already installed",
                        Style::default().fg(Color::Green),
                    )));
                }
            } else {
                content.push(Line::from(Span::styled(
                    "No distribution selected",
                    Style::default().fg(Color::DarkGray),
                )));
            }

            let summary = app.available.summary();
            content.extend([
                Line::from(""),
                Line::from(Span::styled("Summary", Style::default().fg(Color::Cyan).bold())),
                field("Total: ", summary.total.to_string()),
                field("Ubuntu variants: ", summary.ubuntu.to_string()),
                field("Enterprise: ", summary.enterprise.to_string()),
            ]);
            push_warnings(&mut content, &app.available.warnings);
        }
    }

    let details = Paragraph::new(content)
        .block(
            Block::default()
                .title(" Details ")
                .borders(Borders::ALL)
                .border_style(Style::default().fg(Color::DarkGray)),
        )
        .wrap(Wrap { trim: false });

    frame.render_widget(details, area);
}

fn push_warnings<'a>(content: &mut Vec<Line<'a>>, warnings: &'a [RowWarning]) {
    if warnings.is_empty() {
        return;
    }
    content.push(Line::from(""));
    content.push(Line::from(Span::styled(
        format!("{} row warning(s):", warnings.len()),
        Style::default().fg(Color::Yellow).bold(),
    )));
    for warning in warnings {
        content.push(Line::from(format!("  line {}: {}", warning.line, warning.issue)));
    }
}

/// Centered rect for a modal, clamped to `area`
fn modal_area(area: Rect, width: u16, height: u16) -> Rect {
    let width = width.min(area.width.saturating_sub(4));
    let height = height.min(area.height.saturating_sub(2));
    let x = area.x + (area.width - width) / 2;
    let y = area.y + (area.height - height) / 2;
    Rect::new(x, y, width, height)
}

fn render_delete_modal(frame: &mut Frame, app: &App, area: Rect) {
    let modal_area = modal_area(area, 56, 8);
    frame.render_widget(Clear, modal_area);

    let name = app.target.as_deref().unwrap_or_default();
    let lines = vec![
        Line::from(""),
        Line::from(Span::styled(format!("Delete '{name}'?"), Style::default().bold())),
        Line::from(""),
        Line::from(Span::styled(
            "The distribution and all of its files will be removed.",
            Style::default().fg(Color::Red),
        )),
        Line::from(""),
        Line::from(Span::styled("y: Delete │ n/Esc: Cancel", Style::default().fg(Color::DarkGray))),
    ];

    let modal = Paragraph::new(lines)
        .block(
            Block::default()
                .title(" Confirm Delete ")
                .borders(Borders::ALL)
                .border_style(Style::default().fg(Color::Red)),
        )
        .alignment(Alignment::Center)
        .wrap(Wrap { trim: false });

    frame.render_widget(modal, modal_area);
}

fn render_name_prompt(frame: &mut Frame, app: &App, area: Rect) {
    let modal_area = modal_area(area, 60, 9);
    frame.render_widget(Clear, modal_area);

    let target = app.target.as_deref().unwrap_or_default();
    let (title, question, hint) = if app.state == AppState::EnteringRename {
        (
            " Rename ",
            format!("New name for '{target}':"),
            "Letters, digits, '-' and '_'",
        )
    } else {
        (
            " Install ",
            format!("Install '{target}' as:"),
            "Leave empty to keep the catalog name",
        )
    };

    let lines = vec![
        Line::from(""),
        Line::from(Span::styled(question, Style::default().bold())),
        Line::from(""),
        Line::from(vec![
            Span::styled("> ", Style::default().fg(Color::Magenta)),
            Span::raw(app.input.as_str()),
        ]),
        Line::from(""),
        Line::from(Span::styled(hint, Style::default().fg(Color::DarkGray))),
        Line::from(Span::styled("Enter: Confirm │ Esc: Cancel", Style::default().fg(Color::DarkGray))),
    ];

    let modal = Paragraph::new(lines).block(
        Block::default()
            .title(title)
            .borders(Borders::ALL)
            .border_style(Style::default().fg(Color::Magenta)),
    );
    frame.render_widget(modal, modal_area);

    // Inside border (+1) and after "> " (+2)
    let cursor_x = modal_area.x + 1 + 2 + app.input.chars().count() as u16;
    let cursor_y = modal_area.y + 1 + 3;
    frame.set_cursor_position((cursor_x, cursor_y));
}

fn render_message_modal(frame: &mut Frame, app: &App, area: Rect) {
    let Some(ref message) = app.message else {
        return;
    };

    let height = (message.lines.len() as u16).saturating_add(6).max(7);
    let modal_area = modal_area(area, 70, height);
    frame.render_widget(Clear, modal_area);

    let color = if message.is_error { Color::Red } else { Color::Green };
    let mut lines = vec![Line::from("")];
    lines.extend(message.lines.iter().map(|l| Line::from(l.as_str())));
    lines.push(Line::from(""));
    lines.push(Line::from(Span::styled(
        "Esc/Enter: Close",
        Style::default().fg(Color::DarkGray),
    )));

    let modal = Paragraph::new(lines)
        .block(
            Block::default()
                .title(format!(" {} ", message.title))
                .borders(Borders::ALL)
                .border_style(Style::default().fg(color)),
        )
        .wrap(Wrap { trim: false });

    frame.render_widget(modal, modal_area);
}

fn render_help_modal(frame: &mut Frame, area: Rect) {
    let modal_area = modal_area(area, 58, 20);
    frame.render_widget(Clear, modal_area);

    let keys = [
        ("←/→  h/l", "Switch between Installed and Available"),
        ("↑/↓  j/k", "Move selection"),
        ("PgUp/PgDn", "Move by a page"),
        ("g/G", "First / last row"),
        ("Tab", "Focus filters or list"),
        ("/", "Search by name"),
        ("Esc", "Clear search"),
        ("d", "Delete selected distribution"),
        ("n", "Rename selected distribution"),
        ("i/Enter", "Install selected catalog entry"),
        ("r", "Refresh the current tab"),
        ("e", "Export both listings to JSON"),
        ("q", "Quit"),
    ];

    let mut lines = vec![Line::from("")];
    lines.extend(keys.iter().map(|(key, action)| {
        Line::from(vec![
            Span::styled(format!("  {key:<12}"), Style::default().fg(Color::Yellow)),
            Span::raw(*action),
        ])
    }));

    let modal = Paragraph::new(lines).block(
        Block::default()
            .title(" Keys ")
            .borders(Borders::ALL)
            .border_style(Style::default().fg(Color::Cyan)),
    );
    frame.render_widget(modal, modal_area);
}

fn render_exit_confirm_modal(frame: &mut Frame, app: &App, area: Rect) {
    let modal_area = modal_area(area, 56, 7);
    frame.render_widget(Clear, modal_area);

    let running = match app.worker.status() {
        wslm::worker::ActionStatus::Running(what) => what.clone(),
        _ => "An action".to_string(),
    };

    let lines = vec![
        Line::from(""),
        Line::from(Span::styled(
            format!("{running} is still running!"),
            Style::default().fg(Color::Red).bold(),
        )),
        Line::from(""),
        Line::from("Quit anyway? wsl.exe keeps going in the background."),
        Line::from(Span::styled(
            "y/Enter: Quit │ n/Esc: Cancel",
            Style::default().fg(Color::DarkGray),
        )),
    ];

    let modal = Paragraph::new(lines)
        .block(
            Block::default()
                .title(" Confirm Exit ")
                .borders(Borders::ALL)
                .border_style(Style::default().fg(Color::Red)),
        )
        .alignment(Alignment::Center)
        .wrap(Wrap { trim: false });

    frame.render_widget(modal, modal_area);
}
