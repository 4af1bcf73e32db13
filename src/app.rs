//! TUI application state and logic
//!
//! Holds the last snapshots received from the worker and the UI state around
//! them. All `wsl.exe` work goes through the worker; this module never blocks
//! on it.

use std::path::PathBuf;

use color_eyre::Result;
use ratatui::widgets::{ListState, TableState};
use tracing::{info, warn};

use wslm::config::Config;
use wslm::core::DistroManager;
use wslm::export::ExportDocument;
use wslm::types::*;
use wslm::worker::{
    ActionHandler, ActionStatus, Reply, Request, Response, Worker, WorkerError, needs_attention,
};
use wslm::wsl::SystemWsl;

/// UI widget state for the main views
pub struct UiState {
    pub table_state: TableState,
    pub filter_state: ListState,
    pub focused_pane: FocusedPane,
}

/// Content of the result/error modal
pub struct Message {
    pub title: String,
    pub lines: Vec<String>,
    pub is_error: bool,
}

pub struct App {
    pub worker: Worker,
    pub installed: Snapshot<Distribution>,
    pub available: Snapshot<AvailableDistribution>,
    /// Whether the catalog has been requested since startup or the last refresh
    available_requested: bool,
    /// Re-list installed distributions once the open error modal is closed
    refresh_on_close: bool,

    pub tab: Tab,
    pub filter: FilterCategory,
    pub ui: UiState,
    pub state: AppState,
    pub search_query: String,
    /// Text typed into the rename/install prompt
    pub input: String,
    /// Distribution the open prompt or confirmation is about
    pub target: Option<String>,
    pub message: Option<Message>,
    pub status_message: String,
    pub export_path: PathBuf,
}

impl App {
    pub fn new(config: &Config) -> Result<Self> {
        let manager = DistroManager::new(
            SystemWsl::new(config.wsl_command.clone()),
            config.lifecycle_settings(),
        );
        Self::with_handler(manager, config.export_path.clone())
    }

    pub fn with_handler<H: ActionHandler>(handler: H, export_path: PathBuf) -> Result<Self> {
        let worker = Worker::spawn(handler)?;
        let mut filter_state = ListState::default();
        filter_state.select(Some(0));

        let mut app = Self {
            worker,
            installed: Snapshot::default(),
            available: Snapshot::default(),
            available_requested: false,
            refresh_on_close: false,
            tab: Tab::Installed,
            filter: FilterCategory::All,
            ui: UiState {
                table_state: TableState::default(),
                filter_state,
                focused_pane: FocusedPane::List,
            },
            state: AppState::Listing,
            search_query: String::new(),
            input: String::new(),
            target: None,
            message: None,
            status_message: String::from("Loading..."),
            export_path,
        };
        app.submit(Request::RefreshInstalled);
        Ok(app)
    }

    // === Worker ===

    /// Hand a request to the worker; refused while another is running
    pub fn submit(&mut self, request: Request) -> bool {
        let is_catalog = request == Request::RefreshAvailable;
        match self.worker.submit(request) {
            Ok(_) => {
                if is_catalog {
                    self.available_requested = true;
                }
                if let ActionStatus::Running(what) = self.worker.status() {
                    self.status_message = format!("{what}...");
                }
                true
            }
            Err(WorkerError::Busy(what)) => {
                self.status_message = format!("Please wait: {what}");
                false
            }
            Err(e) => {
                self.status_message = e.to_string();
                false
            }
        }
    }

    pub fn is_busy(&self) -> bool {
        self.worker.is_busy()
    }

    /// Called once per event-loop iteration
    pub fn tick(&mut self) {
        match self.worker.poll() {
            Ok(Some(response)) => self.apply_response(response),
            Ok(None) => {}
            Err(e) => self.status_message = e.to_string(),
        }

        if self.tab == Tab::Available && !self.available_requested && !self.is_busy() {
            self.submit(Request::RefreshAvailable);
        }
    }

    fn apply_response(&mut self, response: Response) {
        match response.result {
            Ok(Reply::Installed(snapshot)) => {
                self.set_installed(snapshot);
                self.status_message = self.installed_status();
            }
            Ok(Reply::Available(snapshot)) => {
                self.available = snapshot;
                self.status_message = self.available_status();
                if self.tab == Tab::Available {
                    self.restore_selection(None);
                }
            }
            Ok(Reply::Completed(outcome)) => {
                let text = outcome.message();
                info!("{text}");
                self.set_installed(outcome.snapshot);
                self.status_message = text.clone();
                self.show_message("Done", vec![text], false);
            }
            Err(e) => {
                warn!(request = ?response.request, error = %e, "request failed");
                if response.request.is_lifecycle() || needs_attention(&e) {
                    let mut lines = vec![format!("{} failed.", response.request.describe())];
                    lines.push(String::new());
                    lines.push(e.to_string());
                    self.show_message("Error", lines, true);
                }
                // A partial action changed the machine; the held listing is stale
                if needs_attention(&e) {
                    self.refresh_on_close = true;
                }
                self.status_message = format!("Error: {e}");
            }
        }
        self.worker.clear_status();
    }

    fn set_installed(&mut self, snapshot: Snapshot<Distribution>) {
        let selected = self.selected_installed().map(|d| d.name.clone());
        self.installed = snapshot;
        if self.tab == Tab::Installed {
            self.restore_selection(selected);
        }
    }

    fn installed_status(&self) -> String {
        let mut text = self.installed.summary().to_string();
        if self.installed.skipped_rows() > 0 {
            text.push_str(&format!(" | {} row(s) skipped", self.installed.skipped_rows()));
        }
        text
    }

    fn available_status(&self) -> String {
        let mut text = self.available.summary().to_string();
        if self.available.skipped_rows() > 0 {
            text.push_str(&format!(" | {} row(s) skipped", self.available.skipped_rows()));
        }
        text
    }

    pub fn refresh(&mut self) {
        match self.tab {
            Tab::Installed => {
                self.submit(Request::RefreshInstalled);
            }
            Tab::Available => {
                self.submit(Request::RefreshAvailable);
            }
        }
    }

    // === Visible rows ===

    pub fn visible_installed(&self) -> Vec<&Distribution> {
        let query = self.search_query.to_lowercase();
        self.installed
            .entries
            .iter()
            .filter(|d| self.filter.matches_installed(d))
            .filter(|d| query.is_empty() || d.name.to_lowercase().contains(&query))
            .collect()
    }

    pub fn visible_available(&self) -> Vec<&AvailableDistribution> {
        let hits = if self.search_query.is_empty() {
            self.available.entries.iter().collect()
        } else {
            self.available.search(&self.search_query)
        };
        hits.into_iter()
            .filter(|d| self.filter.matches_available(d))
            .collect()
    }

    pub fn visible_len(&self) -> usize {
        match self.tab {
            Tab::Installed => self.visible_installed().len(),
            Tab::Available => self.visible_available().len(),
        }
    }

    pub fn selected_installed(&self) -> Option<&Distribution> {
        if self.tab != Tab::Installed {
            return None;
        }
        let idx = self.ui.table_state.selected()?;
        self.visible_installed().get(idx).copied()
    }

    pub fn selected_available(&self) -> Option<&AvailableDistribution> {
        if self.tab != Tab::Available {
            return None;
        }
        let idx = self.ui.table_state.selected()?;
        self.visible_available().get(idx).copied()
    }

    pub fn filter_count(&self, filter: FilterCategory) -> usize {
        match self.tab {
            Tab::Installed => self.installed.entries.iter().filter(|d| filter.matches_installed(d)).count(),
            Tab::Available => self.available.entries.iter().filter(|d| filter.matches_available(d)).count(),
        }
    }

    /// Restore selection by name, or reset to the first row
    fn restore_selection(&mut self, name: Option<String>) {
        let idx = name
            .and_then(|name| match self.tab {
                Tab::Installed => self.visible_installed().iter().position(|d| d.name == name),
                Tab::Available => self.visible_available().iter().position(|d| d.name == name),
            })
            .unwrap_or(0);

        let len = self.visible_len();
        self.ui.table_state.select((len > 0).then_some(idx));
    }

    // === Navigation ===

    pub fn switch_tab(&mut self) {
        self.tab = self.tab.toggled();
        self.filter = FilterCategory::All;
        self.ui.filter_state.select(Some(0));
        self.search_query.clear();
        self.restore_selection(None);
        self.status_message = match self.tab {
            Tab::Installed => self.installed_status(),
            Tab::Available if self.available_requested => self.available_status(),
            Tab::Available => "Loading online catalog...".to_string(),
        };
    }

    pub fn move_filter_selection(&mut self, delta: i32) {
        let filters = FilterCategory::for_tab(self.tab);
        let current = self.ui.filter_state.selected().unwrap_or(0) as i32;
        let new_idx = (current + delta).clamp(0, filters.len() as i32 - 1) as usize;
        self.ui.filter_state.select(Some(new_idx));
        self.filter = filters[new_idx];
        self.restore_selection(None);
    }

    pub fn move_selection(&mut self, delta: i32) {
        let len = self.visible_len();
        if len == 0 {
            return;
        }
        let current = self.ui.table_state.selected().unwrap_or(0) as i64;
        let new_idx = (current + i64::from(delta)).clamp(0, len as i64 - 1) as usize;
        self.ui.table_state.select(Some(new_idx));
    }

    pub fn cycle_focus(&mut self) {
        self.ui.focused_pane = match self.ui.focused_pane {
            FocusedPane::Filters => FocusedPane::List,
            FocusedPane::List => FocusedPane::Filters,
        };
    }

    // === Search ===

    pub fn start_search(&mut self) {
        self.state = AppState::Searching;
    }

    pub fn search_push(&mut self, c: char) {
        self.search_query.push(c);
        self.restore_selection(None);
    }

    pub fn search_pop(&mut self) {
        self.search_query.pop();
        self.restore_selection(None);
    }

    pub fn confirm_search(&mut self) {
        self.state = AppState::Listing;
        if !self.search_query.is_empty() {
            self.status_message = format!(
                "Found {} distribution(s) matching '{}'",
                self.visible_len(),
                self.search_query
            );
        }
    }

    pub fn clear_search(&mut self) {
        self.search_query.clear();
        self.state = AppState::Listing;
        self.restore_selection(None);
    }

    // === Lifecycle prompts ===

    /// Refuse to open a prompt while an action is running
    fn ready_for_action(&mut self) -> bool {
        if let ActionStatus::Running(what) = self.worker.status() {
            self.status_message = format!("Please wait: {what}");
            return false;
        }
        true
    }

    pub fn start_delete(&mut self) {
        let Some(name) = self.selected_installed().map(|d| d.name.clone()) else {
            self.status_message = "No distribution selected".to_string();
            return;
        };
        if self.ready_for_action() {
            self.target = Some(name);
            self.state = AppState::ConfirmDelete;
        }
    }

    pub fn confirm_delete(&mut self) {
        self.state = AppState::Listing;
        if let Some(name) = self.target.take() {
            self.submit(Request::Delete { name });
        }
    }

    pub fn start_rename(&mut self) {
        let Some(name) = self.selected_installed().map(|d| d.name.clone()) else {
            self.status_message = "No distribution selected".to_string();
            return;
        };
        if self.ready_for_action() {
            self.target = Some(name);
            self.input.clear();
            self.state = AppState::EnteringRename;
        }
    }

    pub fn start_install(&mut self) {
        let Some(name) = self.selected_available().map(|d| d.name.clone()) else {
            self.status_message = "No distribution selected".to_string();
            return;
        };
        if self.ready_for_action() {
            self.target = Some(name);
            self.input.clear();
            self.state = AppState::EnteringInstall;
        }
    }

    /// Enter in the rename or install prompt
    pub fn submit_input(&mut self) {
        let Some(target) = self.target.clone() else {
            self.cancel_prompt();
            return;
        };
        let input = self.input.trim().to_string();

        let request = match self.state {
            AppState::EnteringRename => {
                if input.is_empty() {
                    self.status_message = "Enter a new name (Esc to cancel)".to_string();
                    return;
                }
                if let Err(e) = wslm::core::validate_name(&input) {
                    self.status_message = e.to_string();
                    return;
                }
                Request::Rename { from: target, to: input }
            }
            AppState::EnteringInstall => {
                if !input.is_empty()
                    && let Err(e) = wslm::core::validate_name(&input)
                {
                    self.status_message = e.to_string();
                    return;
                }
                Request::Install {
                    name: target,
                    custom_name: (!input.is_empty()).then_some(input),
                }
            }
            _ => return,
        };

        self.target = None;
        self.input.clear();
        self.state = AppState::Listing;
        self.submit(request);
    }

    pub fn cancel_prompt(&mut self) {
        self.target = None;
        self.input.clear();
        self.state = AppState::Listing;
    }

    // === Modals ===

    pub fn show_message(&mut self, title: &str, lines: Vec<String>, is_error: bool) {
        self.message = Some(Message {
            title: title.to_string(),
            lines,
            is_error,
        });
        self.state = AppState::ShowingMessage;
    }

    pub fn close_message(&mut self) {
        self.message = None;
        self.state = AppState::Listing;
        if std::mem::take(&mut self.refresh_on_close) {
            self.submit(Request::RefreshInstalled);
        }
    }

    pub fn show_help(&mut self) {
        self.state = AppState::ShowingHelp;
    }

    /// `q` from the listing: confirm first if an action is in flight
    pub fn request_quit(&mut self) -> bool {
        if self.is_busy() {
            self.state = AppState::ConfirmExit;
            false
        } else {
            true
        }
    }

    // === Export ===

    pub fn export(&mut self) {
        let document = ExportDocument::new(&self.installed, &self.available);
        match document.write_to(&self.export_path) {
            Ok(()) => {
                info!(path = %self.export_path.display(), "exported listings");
                let mut text = format!(
                    "Exported {} installed and {} available distribution(s) to {}",
                    document.summary.installed_count,
                    document.summary.available_count,
                    self.export_path.display()
                );
                if !self.available_requested {
                    text.push_str(" (catalog not loaded yet)");
                }
                self.status_message = text;
            }
            Err(e) => {
                self.status_message = format!("Export failed: {e}");
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Mutex;
    use std::time::{Duration, Instant};
    use wslm::core::Outcome;
    use wslm::error::{PartialFailure, WslError};

    struct Scripted {
        seen: Mutex<Vec<Request>>,
    }

    fn dist(name: &str, state: DistributionState) -> Distribution {
        Distribution {
            name: name.to_string(),
            state,
            version: WslVersion::V2,
            is_default: name == "Ubuntu",
        }
    }

    fn listing() -> Snapshot<Distribution> {
        Snapshot {
            entries: vec![
                dist("Ubuntu", DistributionState::Running),
                dist("Debian", DistributionState::Stopped),
            ],
            warnings: Vec::new(),
        }
    }

    impl ActionHandler for Scripted {
        fn handle(&self, request: &Request) -> wslm::error::Result<Reply> {
            self.seen.lock().unwrap().push(request.clone());
            match request {
                Request::RefreshInstalled => Ok(Reply::Installed(listing())),
                Request::RefreshAvailable => Ok(Reply::Available(Snapshot {
                    entries: vec![AvailableDistribution {
                        name: "OracleLinux_9_1".to_string(),
                        friendly_name: "Oracle Linux 9.1".to_string(),
                        category: Category::Enterprise,
                    }],
                    warnings: Vec::new(),
                })),
                Request::Delete { name } => {
                    let mut snapshot = listing();
                    snapshot.entries.retain(|d| &d.name != name);
                    Ok(Reply::Completed(Outcome {
                        action: ActionKind::Delete,
                        name: name.clone(),
                        previous: None,
                        snapshot,
                        confirmed: true,
                    }))
                }
                Request::Rename { from, .. } => Err(WslError::NotFound(from.clone())),
                Request::Install {
                    name,
                    custom_name: Some(custom),
                } => Err(WslError::PartialLifecycleFailure(Box::new(PartialFailure {
                    action: ActionKind::Install,
                    source_name: name.clone(),
                    destination_name: custom.clone(),
                    completed: vec![LifecycleStep::Install],
                    failed: LifecycleStep::Export,
                    cause: WslError::NotFound(name.clone()),
                }))),
                Request::Install { name, .. } => Err(WslError::NotInCatalog(name.clone())),
            }
        }
    }

    fn app() -> App {
        let handler = Scripted {
            seen: Mutex::new(Vec::new()),
        };
        let dir = std::env::temp_dir().join("wslm-app-test.json");
        let mut app = App::with_handler(handler, dir).unwrap();
        settle(&mut app);
        app
    }

    /// Tick until the in-flight request has been applied
    fn settle(app: &mut App) {
        let deadline = Instant::now() + Duration::from_secs(5);
        while Instant::now() < deadline {
            app.tick();
            if !app.is_busy() {
                return;
            }
            std::thread::sleep(Duration::from_millis(5));
        }
        panic!("worker did not answer");
    }

    #[test]
    fn loads_installed_on_start() {
        let app = app();
        assert_eq!(app.installed.len(), 2);
        assert_eq!(app.selected_installed().unwrap().name, "Ubuntu");
        assert!(app.status_message.starts_with("Total: 2 | Running: 1"));
    }

    #[test]
    fn filter_and_search_narrow_the_list() {
        let mut app = app();
        app.move_filter_selection(2);
        assert_eq!(app.filter, FilterCategory::Stopped);
        assert_eq!(app.visible_len(), 1);

        app.move_filter_selection(-2);
        app.start_search();
        app.search_push('d');
        app.search_push('e');
        assert_eq!(app.visible_installed()[0].name, "Debian");
    }

    #[test]
    fn delete_flow_updates_listing_from_outcome() {
        let mut app = app();
        app.move_selection(1);
        app.start_delete();
        assert_eq!(app.state, AppState::ConfirmDelete);
        app.confirm_delete();
        settle(&mut app);

        assert_eq!(app.installed.len(), 1);
        assert_eq!(app.state, AppState::ShowingMessage);
        assert_eq!(app.message.as_ref().unwrap().lines, vec!["Deleted 'Debian'"]);
    }

    #[test]
    fn rename_prompt_validates_before_submitting() {
        let mut app = app();
        app.start_rename();
        app.input = "bad name".to_string();
        app.submit_input();
        assert_eq!(app.state, AppState::EnteringRename);
        assert!(app.status_message.contains("invalid distribution name"));

        app.input = "Dev".to_string();
        app.submit_input();
        settle(&mut app);
        let message = app.message.as_ref().unwrap();
        assert!(message.is_error);
        assert!(message.lines[0].starts_with("Renaming 'Ubuntu' to 'Dev' failed"));
    }

    #[test]
    fn available_tab_loads_catalog_lazily() {
        let mut app = app();
        app.switch_tab();
        app.tick();
        settle(&mut app);
        assert_eq!(app.available.len(), 1);
        assert_eq!(app.filter_count(FilterCategory::Category(Category::Enterprise)), 1);
        assert_eq!(app.selected_available().unwrap().name, "OracleLinux_9_1");
    }

    #[test]
    fn partial_failure_relists_after_the_modal_closes() {
        let mut app = app();
        app.switch_tab();
        app.tick();
        settle(&mut app);

        app.start_install();
        app.input = "Work".to_string();
        app.submit_input();
        settle(&mut app);
        assert!(app.message.as_ref().unwrap().is_error);

        app.close_message();
        assert_eq!(app.status_message, "Loading installed distributions...");
        settle(&mut app);
        assert_eq!(app.installed.len(), 2);

        app.close_message();
        assert!(!app.is_busy());
    }

    #[test]
    fn plain_errors_do_not_relist() {
        let mut app = app();
        app.start_rename();
        app.input = "Dev".to_string();
        app.submit_input();
        settle(&mut app);
        app.close_message();
        assert!(!app.is_busy());
    }
}
