mod app;
mod ui;

use std::io;
use std::path::PathBuf;
use std::time::Duration;

use clap::Parser;
use color_eyre::Result;
use color_eyre::eyre::WrapErr;
use crossterm::ExecutableCommand;
use crossterm::event::{self, Event, KeyCode, KeyEventKind};
use crossterm::terminal::{
    EnterAlternateScreen, LeaveAlternateScreen, disable_raw_mode, enable_raw_mode,
};
use ratatui::prelude::*;
use tracing::info;

use app::App;
use ui::ui;
use wslm::config::Config;
use wslm::logging;
use wslm::types::*;

/// Rows moved by PageUp/PageDown
const PAGE: i32 = 10;

#[derive(Parser, Debug)]
#[command(name = "wslm", version, about = "Terminal UI for managing WSL distributions")]
struct Args {
    /// Configuration file (default: <config dir>/wslm/config.toml)
    #[arg(long, value_name = "FILE")]
    config: Option<PathBuf>,
}

fn main() -> Result<()> {
    color_eyre::install()?;
    let args = Args::parse();

    let config = Config::load(args.config.as_deref()).wrap_err("failed to load configuration")?;
    match logging::init_file(&config.log) {
        Ok(Some(path)) => info!(path = %path.display(), "wslm starting"),
        Ok(None) => {}
        Err(e) => eprintln!("warning: file logging disabled: {e}"),
    }

    let mut app = App::new(&config)?;

    enable_raw_mode()?;
    io::stdout().execute(EnterAlternateScreen)?;
    let mut terminal = Terminal::new(CrosstermBackend::new(io::stdout()))?;

    let result = run(&mut terminal, &mut app);

    disable_raw_mode()?;
    io::stdout().execute(LeaveAlternateScreen)?;

    result
}

fn run(terminal: &mut Terminal<CrosstermBackend<io::Stdout>>, app: &mut App) -> Result<()> {
    loop {
        app.tick();
        terminal.draw(|f| ui(f, app))?;

        if event::poll(Duration::from_millis(100))?
            && let Event::Key(key) = event::read()?
        {
            if key.kind != KeyEventKind::Press {
                continue;
            }

            match app.state {
                AppState::Listing => match key.code {
                    KeyCode::Char('q') => {
                        if app.request_quit() {
                            break;
                        }
                    }
                    KeyCode::Tab | KeyCode::BackTab => app.cycle_focus(),
                    KeyCode::Left | KeyCode::Right | KeyCode::Char('h') | KeyCode::Char('l') => {
                        app.switch_tab();
                    }
                    KeyCode::Char('/') => app.start_search(),
                    KeyCode::Esc => app.clear_search(),
                    KeyCode::Up | KeyCode::Char('k') => match app.ui.focused_pane {
                        FocusedPane::Filters => app.move_filter_selection(-1),
                        FocusedPane::List => app.move_selection(-1),
                    },
                    KeyCode::Down | KeyCode::Char('j') => match app.ui.focused_pane {
                        FocusedPane::Filters => app.move_filter_selection(1),
                        FocusedPane::List => app.move_selection(1),
                    },
                    KeyCode::PageDown => app.move_selection(PAGE),
                    KeyCode::PageUp => app.move_selection(-PAGE),
                    KeyCode::Home | KeyCode::Char('g') => app.move_selection(i32::MIN / 2),
                    KeyCode::End | KeyCode::Char('G') => app.move_selection(i32::MAX / 2),
                    KeyCode::Char('d') | KeyCode::Delete => app.start_delete(),
                    KeyCode::Char('n') => app.start_rename(),
                    KeyCode::Char('i') | KeyCode::Enter => app.start_install(),
                    KeyCode::Char('r') => app.refresh(),
                    KeyCode::Char('e') => app.export(),
                    KeyCode::Char('?') => app.show_help(),
                    _ => {}
                },
                AppState::Searching => match key.code {
                    KeyCode::Esc => app.clear_search(),
                    KeyCode::Enter => app.confirm_search(),
                    KeyCode::Backspace => app.search_pop(),
                    KeyCode::Char(c) => app.search_push(c),
                    _ => {}
                },
                AppState::ConfirmDelete => match key.code {
                    KeyCode::Char('y') | KeyCode::Char('Y') => app.confirm_delete(),
                    KeyCode::Char('n') | KeyCode::Esc => app.cancel_prompt(),
                    _ => {}
                },
                AppState::EnteringRename | AppState::EnteringInstall => match key.code {
                    KeyCode::Esc => app.cancel_prompt(),
                    KeyCode::Enter => app.submit_input(),
                    KeyCode::Backspace => {
                        app.input.pop();
                    }
                    KeyCode::Char(c) => app.input.push(c),
                    _ => {}
                },
                AppState::ShowingMessage => match key.code {
                    KeyCode::Esc | KeyCode::Enter | KeyCode::Char('q') => app.close_message(),
                    _ => {}
                },
                AppState::ShowingHelp => match key.code {
                    KeyCode::Esc | KeyCode::Enter | KeyCode::Char('q') | KeyCode::Char('?') => {
                        app.state = AppState::Listing;
                    }
                    _ => {}
                },
                AppState::ConfirmExit => match key.code {
                    KeyCode::Char('y') | KeyCode::Enter => break,
                    KeyCode::Char('n') | KeyCode::Esc => {
                        app.state = AppState::Listing;
                    }
                    _ => {}
                },
            }
        }
    }

    Ok(())
}
