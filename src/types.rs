//! Common types used throughout the application

use std::convert::Infallible;
use std::fmt;
use std::str::FromStr;

use ratatui::prelude::*;
use serde::{Deserialize, Serialize};

/// Distribution state as reported in the STATE column
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(from = "String", into = "String")]
pub enum DistributionState {
    Running,
    Stopped,
    Installing,
    /// Any other word the tool printed (e.g. "Converting"), kept verbatim
    Unknown(String),
}

impl DistributionState {
    pub fn as_str(&self) -> &str {
        match self {
            Self::Running => "Running",
            Self::Stopped => "Stopped",
            Self::Installing => "Installing",
            Self::Unknown(raw) => raw,
        }
    }

    pub fn symbol(&self) -> &'static str {
        match self {
            Self::Running => "▶",
            Self::Stopped => "■",
            Self::Installing => "…",
            Self::Unknown(_) => "?",
        }
    }

    pub fn color(&self) -> Color {
        match self {
            Self::Running => Color::Green,
            Self::Stopped => Color::DarkGray,
            Self::Installing => Color::Yellow,
            Self::Unknown(_) => Color::Magenta,
        }
    }
}

impl FromStr for DistributionState {
    type Err = Infallible;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Ok(match s.to_ascii_lowercase().as_str() {
            "running" => Self::Running,
            "stopped" => Self::Stopped,
            "installing" => Self::Installing,
            _ => Self::Unknown(s.to_string()),
        })
    }
}

impl From<String> for DistributionState {
    fn from(value: String) -> Self {
        match value.parse() {
            Ok(state) => state,
            Err(never) => match never {},
        }
    }
}

impl From<DistributionState> for String {
    fn from(value: DistributionState) -> Self {
        match value {
            DistributionState::Unknown(raw) => raw,
            known => known.as_str().to_string(),
        }
    }
}

impl fmt::Display for DistributionState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// WSL architecture version (VERSION column)
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub enum WslVersion {
    V1,
    V2,
}

impl FromStr for WslVersion {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim() {
            "1" => Ok(Self::V1),
            "2" => Ok(Self::V2),
            other => Err(format!("unsupported WSL version {other:?}")),
        }
    }
}

impl TryFrom<String> for WslVersion {
    type Error = String;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        value.parse()
    }
}

impl From<WslVersion> for String {
    fn from(value: WslVersion) -> Self {
        value.to_string()
    }
}

impl fmt::Display for WslVersion {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::V1 => f.write_str("1"),
            Self::V2 => f.write_str("2"),
        }
    }
}

/// An installed distribution (one row of `wsl -l -v`)
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Distribution {
    pub name: String,
    pub state: DistributionState,
    pub version: WslVersion,
    pub is_default: bool,
}

/// Catalog grouping derived from the friendly name
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Category {
    Ubuntu,
    Enterprise,
    Other,
}

impl Category {
    pub fn label(&self) -> &'static str {
        match self {
            Self::Ubuntu => "Ubuntu",
            Self::Enterprise => "Enterprise",
            Self::Other => "Other",
        }
    }

    pub fn color(&self) -> Color {
        match self {
            Self::Ubuntu => Color::LightRed,
            Self::Enterprise => Color::Cyan,
            Self::Other => Color::Gray,
        }
    }

    pub fn all() -> &'static [Category] {
        &[Self::Ubuntu, Self::Enterprise, Self::Other]
    }
}

impl fmt::Display for Category {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.label())
    }
}

impl FromStr for Category {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::all()
            .iter()
            .copied()
            .find(|c| c.label().eq_ignore_ascii_case(s))
            .ok_or_else(|| format!("unknown category {s:?} (expected Ubuntu, Enterprise or Other)"))
    }
}

/// A distribution installable from the online catalog
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AvailableDistribution {
    pub name: String,
    pub friendly_name: String,
    pub category: Category,
}

impl AvailableDistribution {
    pub fn install_command(&self) -> String {
        format!("wsl --install {}", self.name)
    }
}

/// Rows the parser could not take at face value
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RowIssue {
    TooFewFields(usize),
    /// Names with embedded whitespace are not supported
    TooManyFields(usize),
    BadVersion(String),
    DuplicateName,
    /// Row kept, but its default marker was dropped
    ExtraDefault,
}

impl RowIssue {
    /// Whether the row was left out of the snapshot
    pub fn is_skip(&self) -> bool {
        !matches!(self, Self::ExtraDefault)
    }
}

impl fmt::Display for RowIssue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::TooFewFields(n) => write!(f, "only {n} field(s)"),
            Self::TooManyFields(n) => write!(f, "found {n} fields; names with whitespace are not supported"),
            Self::BadVersion(v) => write!(f, "unsupported version {v:?}"),
            Self::DuplicateName => f.write_str("duplicate name"),
            Self::ExtraDefault => f.write_str("second default marker ignored"),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RowWarning {
    /// 1-based line number in the decoded output
    pub line: usize,
    pub text: String,
    pub issue: RowIssue,
}

/// Result of one fetch: parsed records in output order, plus row warnings.
///
/// Replaced wholesale on every refresh.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Snapshot<T> {
    pub entries: Vec<T>,
    pub warnings: Vec<RowWarning>,
}

impl<T> Default for Snapshot<T> {
    fn default() -> Self {
        Self {
            entries: Vec::new(),
            warnings: Vec::new(),
        }
    }
}

impl<T> Snapshot<T> {
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn skipped_rows(&self) -> usize {
        self.warnings.iter().filter(|w| w.issue.is_skip()).count()
    }
}

impl Snapshot<Distribution> {
    pub fn find(&self, name: &str) -> Option<&Distribution> {
        self.entries.iter().find(|d| d.name == name)
    }

    /// Case-insensitive lookup, for names typed by a user or taken from the catalog
    pub fn find_ignore_case(&self, name: &str) -> Option<&Distribution> {
        self.entries.iter().find(|d| d.name.eq_ignore_ascii_case(name))
    }

    pub fn default_distribution(&self) -> Option<&Distribution> {
        self.entries.iter().find(|d| d.is_default)
    }

    pub fn running(&self) -> impl Iterator<Item = &Distribution> {
        self.entries.iter().filter(|d| d.state == DistributionState::Running)
    }

    pub fn stopped(&self) -> impl Iterator<Item = &Distribution> {
        self.entries.iter().filter(|d| d.state == DistributionState::Stopped)
    }

    pub fn summary(&self) -> InstalledSummary {
        InstalledSummary {
            total: self.len(),
            running: self.running().count(),
            stopped: self.stopped().count(),
            default_name: self.default_distribution().map(|d| d.name.clone()),
        }
    }
}

impl Snapshot<AvailableDistribution> {
    pub fn find(&self, name: &str) -> Option<&AvailableDistribution> {
        self.entries.iter().find(|d| d.name.eq_ignore_ascii_case(name))
    }

    /// Case-insensitive substring match on name or friendly name
    pub fn search(&self, term: &str) -> Vec<&AvailableDistribution> {
        let term = term.to_lowercase();
        self.entries
            .iter()
            .filter(|d| {
                d.name.to_lowercase().contains(&term) || d.friendly_name.to_lowercase().contains(&term)
            })
            .collect()
    }

    pub fn in_category(&self, category: Category) -> impl Iterator<Item = &AvailableDistribution> {
        self.entries.iter().filter(move |d| d.category == category)
    }

    pub fn summary(&self) -> AvailableSummary {
        AvailableSummary {
            total: self.len(),
            ubuntu: self.in_category(Category::Ubuntu).count(),
            enterprise: self.in_category(Category::Enterprise).count(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct InstalledSummary {
    pub total: usize,
    pub running: usize,
    pub stopped: usize,
    pub default_name: Option<String>,
}

impl fmt::Display for InstalledSummary {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "Total: {} | Running: {} | Stopped: {} | Default: {}",
            self.total,
            self.running,
            self.stopped,
            self.default_name.as_deref().unwrap_or("None")
        )
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AvailableSummary {
    pub total: usize,
    pub ubuntu: usize,
    pub enterprise: usize,
}

impl fmt::Display for AvailableSummary {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "Total: {} | Ubuntu variants: {} | Enterprise: {}",
            self.total, self.ubuntu, self.enterprise
        )
    }
}

/// User-initiated lifecycle actions
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ActionKind {
    Delete,
    Rename,
    Install,
}

impl fmt::Display for ActionKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Self::Delete => "delete",
            Self::Rename => "rename",
            Self::Install => "install",
        })
    }
}

/// One external invocation inside a multi-step action
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum LifecycleStep {
    Install,
    Export,
    Import,
    Unregister,
}

impl fmt::Display for LifecycleStep {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Self::Install => "install",
            Self::Export => "export",
            Self::Import => "import",
            Self::Unregister => "unregister",
        })
    }
}

// ============================================================================
// TUI types
// ============================================================================

/// Top-level tabs
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Tab {
    Installed,
    Available,
}

impl Tab {
    pub fn label(&self) -> &'static str {
        match self {
            Self::Installed => "Installed",
            Self::Available => "Available",
        }
    }

    pub fn all() -> &'static [Tab] {
        &[Self::Installed, Self::Available]
    }

    pub fn index(&self) -> usize {
        match self {
            Self::Installed => 0,
            Self::Available => 1,
        }
    }

    pub fn toggled(&self) -> Self {
        match self {
            Self::Installed => Self::Available,
            Self::Available => Self::Installed,
        }
    }
}

/// Filter categories (left panel); the set depends on the tab
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FilterCategory {
    All,
    Running,
    Stopped,
    Category(Category),
}

impl FilterCategory {
    pub fn label(&self) -> &'static str {
        match self {
            Self::All => "All",
            Self::Running => "Running",
            Self::Stopped => "Stopped",
            Self::Category(c) => c.label(),
        }
    }

    pub fn for_tab(tab: Tab) -> &'static [FilterCategory] {
        match tab {
            Tab::Installed => &[Self::All, Self::Running, Self::Stopped],
            Tab::Available => &[
                Self::All,
                Self::Category(Category::Ubuntu),
                Self::Category(Category::Enterprise),
                Self::Category(Category::Other),
            ],
        }
    }

    pub fn matches_installed(&self, dist: &Distribution) -> bool {
        match self {
            Self::All => true,
            Self::Running => dist.state == DistributionState::Running,
            Self::Stopped => dist.state == DistributionState::Stopped,
            Self::Category(_) => false,
        }
    }

    pub fn matches_available(&self, dist: &AvailableDistribution) -> bool {
        match self {
            Self::All => true,
            Self::Category(c) => dist.category == *c,
            Self::Running | Self::Stopped => false,
        }
    }
}

/// Which pane has focus
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FocusedPane {
    Filters,
    List,
}

/// Application state machine
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AppState {
    Listing,
    Searching,       // User is typing a search query
    ConfirmDelete,   // y/n before unregistering
    EnteringRename,  // New name prompt
    EnteringInstall, // Optional custom name prompt
    ShowingMessage,  // Result or error details
    ShowingHelp,
    ConfirmExit,     // Quit requested while an action is in flight
}

#[cfg(test)]
mod tests {
    use super::*;

    fn dist(name: &str, state: DistributionState, is_default: bool) -> Distribution {
        Distribution {
            name: name.to_string(),
            state,
            version: WslVersion::V2,
            is_default,
        }
    }

    #[test]
    fn state_parsing_is_case_insensitive_and_keeps_unknown_words() {
        assert_eq!("RUNNING".parse::<DistributionState>(), Ok(DistributionState::Running));
        assert_eq!(
            "Converting".parse::<DistributionState>(),
            Ok(DistributionState::Unknown("Converting".to_string()))
        );
        assert_eq!(String::from(DistributionState::Unknown("Converting".into())), "Converting");
    }

    #[test]
    fn version_only_accepts_one_or_two() {
        assert_eq!("1".parse::<WslVersion>(), Ok(WslVersion::V1));
        assert_eq!("2".parse::<WslVersion>(), Ok(WslVersion::V2));
        assert!("3".parse::<WslVersion>().is_err());
    }

    #[test]
    fn distribution_serializes_state_and_version_as_strings() {
        let json = serde_json::to_value(dist("Ubuntu", DistributionState::Running, true)).unwrap();
        assert_eq!(
            json,
            serde_json::json!({"name": "Ubuntu", "state": "Running", "version": "2", "is_default": true})
        );
    }

    #[test]
    fn installed_summary_counts_states() {
        let snapshot = Snapshot {
            entries: vec![
                dist("Ubuntu", DistributionState::Running, true),
                dist("Debian", DistributionState::Stopped, false),
                dist("Alpine", DistributionState::Stopped, false),
            ],
            warnings: Vec::new(),
        };
        let summary = snapshot.summary();
        assert_eq!(summary.running, 1);
        assert_eq!(summary.stopped, 2);
        assert_eq!(summary.to_string(), "Total: 3 | Running: 1 | Stopped: 2 | Default: Ubuntu");
    }

    #[test]
    fn catalog_search_matches_friendly_name() {
        let snapshot = Snapshot {
            entries: vec![
                AvailableDistribution {
                    name: "OracleLinux_9_1".to_string(),
                    friendly_name: "Oracle Linux 9.1".to_string(),
                    category: Category::Enterprise,
                },
                AvailableDistribution {
                    name: "Debian".to_string(),
                    friendly_name: "Debian GNU/Linux".to_string(),
                    category: Category::Other,
                },
            ],
            warnings: Vec::new(),
        };
        let hits = snapshot.search("gnu");
        assert_eq!(hits.len(), 1);
        assert_eq!(hits[0].name, "Debian");
        assert!(snapshot.find("debian").is_some());
    }

    #[test]
    fn filters_depend_on_tab() {
        assert_eq!(FilterCategory::for_tab(Tab::Installed).len(), 3);
        assert!(FilterCategory::Running.matches_installed(&dist("A", DistributionState::Running, false)));
        assert!(!FilterCategory::Stopped.matches_installed(&dist("A", DistributionState::Running, false)));
    }
}
