//! Command-line front end
//!
//! Usage:
//!   wslm-cli installed [--json]
//!   wslm-cli available [--json] [--search TERM] [--category NAME]
//!   wslm-cli delete <name> [--yes]
//!   wslm-cli rename <old> <new>
//!   wslm-cli install <name> [--name CUSTOM]
//!   wslm-cli export <path>

use std::io::{self, BufRead, Write};
use std::path::PathBuf;

use clap::Parser;
use color_eyre::Result;
use color_eyre::eyre::{WrapErr, bail};

use wslm::config::Config;
use wslm::core::DistroManager;
use wslm::export::{ExportDocument, available_to_json, installed_to_json};
use wslm::logging;
use wslm::types::*;
use wslm::worker::{ActionHandler, Reply, Request};
use wslm::wsl::SystemWsl;

#[derive(Parser, Debug)]
#[command(
    name = "wslm-cli",
    version,
    about = "List, install, rename and delete WSL distributions",
    after_help = r#"Examples:
  wslm-cli installed
  wslm-cli available --category enterprise
  wslm-cli install Ubuntu-22.04 --name Work
  wslm-cli rename Ubuntu Dev
  wslm-cli export distributions.json"#
)]
struct Cli {
    /// Configuration file (default: <config dir>/wslm/config.toml)
    #[arg(long, value_name = "FILE", global = true)]
    config: Option<PathBuf>,

    /// More log output on stderr (-v info, -vv debug)
    #[arg(short, long, action = clap::ArgAction::Count, global = true)]
    verbose: u8,

    #[command(subcommand)]
    command: Commands,
}

#[derive(clap::Subcommand, Debug)]
enum Commands {
    /// List installed distributions
    Installed {
        /// Print JSON instead of a table
        #[arg(long)]
        json: bool,
    },
    /// List distributions from the online catalog
    Available {
        #[arg(long)]
        json: bool,
        /// Only entries whose name or friendly name contains TERM
        #[arg(long, value_name = "TERM")]
        search: Option<String>,
        /// Ubuntu, Enterprise or Other
        #[arg(long, value_name = "NAME")]
        category: Option<Category>,
    },
    /// Unregister a distribution (its files are deleted)
    Delete {
        name: String,
        /// Do not ask for confirmation
        #[arg(short, long)]
        yes: bool,
    },
    /// Rename a distribution (export, import under the new name, unregister the old one)
    Rename { old: String, new: String },
    /// Install a distribution from the online catalog
    Install {
        name: String,
        /// Register it under this name instead of the catalog name
        #[arg(long = "name", value_name = "CUSTOM")]
        custom_name: Option<String>,
    },
    /// Write installed and available distributions to a JSON file
    Export { path: PathBuf },
}

fn main() -> Result<()> {
    color_eyre::install()?;
    let cli = Cli::parse();

    let level = match cli.verbose {
        0 => "warn",
        1 => "info",
        _ => "debug",
    };
    logging::init_stderr(level);

    let config = Config::load(cli.config.as_deref()).wrap_err("failed to load configuration")?;
    let manager = DistroManager::new(
        SystemWsl::new(config.wsl_command.clone()),
        config.lifecycle_settings(),
    );

    run(cli.command, &manager)
}

fn run(command: Commands, handler: &impl ActionHandler) -> Result<()> {
    match command {
        Commands::Installed { json } => {
            let snapshot = installed(handler)?;
            if json {
                println!("{}", installed_to_json(&snapshot)?);
            } else {
                print!("{}", format_installed(&snapshot));
                print_skipped(snapshot.skipped_rows());
            }
        }
        Commands::Available {
            json,
            search,
            category,
        } => {
            let snapshot = narrow(available(handler)?, search.as_deref(), category);
            if json {
                println!("{}", available_to_json(&snapshot)?);
            } else {
                print!("{}", format_available(&snapshot));
                print_skipped(snapshot.skipped_rows());
            }
        }
        Commands::Delete { name, yes } => {
            if !yes && !confirm(&format!("Delete '{name}' and all of its files?"))? {
                println!("Cancelled.");
                return Ok(());
            }
            complete(handler, Request::Delete { name })?;
        }
        Commands::Rename { old, new } => {
            complete(handler, Request::Rename { from: old, to: new })?;
        }
        Commands::Install { name, custom_name } => {
            complete(handler, Request::Install { name, custom_name })?;
        }
        Commands::Export { path } => {
            let document = ExportDocument::new(&installed(handler)?, &available(handler)?);
            document.write_to(&path)?;
            println!(
                "Exported {} installed and {} available distribution(s) to {}",
                document.summary.installed_count,
                document.summary.available_count,
                path.display()
            );
        }
    }
    Ok(())
}

fn installed(handler: &impl ActionHandler) -> Result<Snapshot<Distribution>> {
    match handler.handle(&Request::RefreshInstalled)? {
        Reply::Installed(snapshot) => Ok(snapshot),
        other => bail!("unexpected reply to a listing request: {other:?}"),
    }
}

fn available(handler: &impl ActionHandler) -> Result<Snapshot<AvailableDistribution>> {
    match handler.handle(&Request::RefreshAvailable)? {
        Reply::Available(snapshot) => Ok(snapshot),
        other => bail!("unexpected reply to a catalog request: {other:?}"),
    }
}

fn complete(handler: &impl ActionHandler, request: Request) -> Result<()> {
    eprintln!("{}...", request.describe());
    let reply = handler.handle(&request)?;
    println!("{}", reply.summary());
    Ok(())
}

fn confirm(question: &str) -> Result<bool> {
    print!("{question} [y/N] ");
    io::stdout().flush()?;
    let mut answer = String::new();
    io::stdin().lock().read_line(&mut answer)?;
    Ok(matches!(answer.trim().to_lowercase().as_str(), "y" | "yes"))
}

/// Apply `--search` then `--category`
fn narrow(
    mut snapshot: Snapshot<AvailableDistribution>,
    search: Option<&str>,
    category: Option<Category>,
) -> Snapshot<AvailableDistribution> {
    if let Some(term) = search {
        let hits: Vec<AvailableDistribution> = snapshot.search(term).into_iter().cloned().collect();
        snapshot.entries = hits;
    }
    if let Some(category) = category {
        snapshot.entries.retain(|d| d.category == category);
    }
    snapshot
}

fn format_installed(snapshot: &Snapshot<Distribution>) -> String {
    let mut out = String::new();
    if snapshot.is_empty() {
        out.push_str("No distributions installed.\n");
    } else {
        let width = name_width(snapshot.entries.iter().map(|d| d.name.as_str()));
        out.push_str(&format!("  {:<width$}  {:<10}  VERSION\n", "NAME", "STATE"));
        for dist in &snapshot.entries {
            let marker = if dist.is_default { '*' } else { ' ' };
            out.push_str(&format!(
                "{marker} {:<width$}  {:<10}  {}\n",
                dist.name,
                dist.state.as_str(),
                dist.version
            ));
        }
    }
    out.push_str(&format!("\n{}\n", snapshot.summary()));
    out
}

fn format_available(snapshot: &Snapshot<AvailableDistribution>) -> String {
    let mut out = String::new();
    if snapshot.is_empty() {
        out.push_str("No matching distributions.\n");
    } else {
        let width = name_width(snapshot.entries.iter().map(|d| d.name.as_str()));
        out.push_str(&format!("{:<width$}  {:<10}  FRIENDLY NAME\n", "NAME", "CATEGORY"));
        for dist in &snapshot.entries {
            out.push_str(&format!(
                "{:<width$}  {:<10}  {}\n",
                dist.name,
                dist.category.label(),
                dist.friendly_name
            ));
        }
    }
    out.push_str(&format!("\n{}\n", snapshot.summary()));
    out
}

fn print_skipped(skipped: usize) {
    if let Some(text) = skipped_notice(skipped) {
        eprintln!("{text}");
    }
}

/// The per-row warnings are already on stderr at the default level
fn skipped_notice(skipped: usize) -> Option<String> {
    (skipped > 0).then(|| format!("warning: {skipped} row(s) could not be read and were skipped (see the warnings above)"))
}

fn name_width<'a>(names: impl Iterator<Item = &'a str>) -> usize {
    names.map(str::len).max().unwrap_or(0).max(4)
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;
    use wslm::error::{ParseError, WslError};
    use wslm::parser::{parse_available, parse_installed};

    const CATALOG: &str = "NAME               FRIENDLY NAME
Ubuntu             Ubuntu
Debian             Debian GNU/Linux
OracleLinux_9_1    Oracle Linux 9.1
OracleLinux_8_7    Oracle Linux 8.7
SUSE-Linux-Enterprise-15-SP5    SUSE Linux Enterprise 15 SP5
";

    /// Answers listings from fixed text
    struct Fixed;

    impl ActionHandler for Fixed {
        fn handle(&self, request: &Request) -> wslm::error::Result<Reply> {
            match request {
                Request::RefreshInstalled => Ok(Reply::Installed(parse_installed(
                    "  NAME      STATE      VERSION\n* Ubuntu    Running    2\n  Debian    Stopped    1\n",
                )?)),
                Request::RefreshAvailable => Ok(Reply::Available(parse_available(CATALOG)?)),
                other => Err(WslError::NotFound(format!("{other:?}"))),
            }
        }
    }

    /// Every request fails the way a broken `wsl.exe` does
    struct Broken(fn() -> WslError);

    impl ActionHandler for Broken {
        fn handle(&self, _request: &Request) -> wslm::error::Result<Reply> {
            Err((self.0)())
        }
    }

    fn command_failed() -> WslError {
        WslError::CommandFailed {
            command: "wsl".to_string(),
            args: vec!["-l".to_string(), "-v".to_string()],
            code: Some(1),
            detail: String::new(),
        }
    }

    fn bad_header() -> WslError {
        WslError::Parse(ParseError::MissingHeader {
            found: "garbage".to_string(),
        })
    }

    fn parse(args: &[&str]) -> Commands {
        Cli::try_parse_from(std::iter::once("wslm-cli").chain(args.iter().copied()))
            .unwrap()
            .command
    }

    #[test]
    fn invocation_failure_is_an_error() {
        let err = run(parse(&["installed"]), &Broken(command_failed)).unwrap_err();
        assert!(matches!(err.downcast_ref::<WslError>(), Some(WslError::CommandFailed { .. })));
        assert!(run(parse(&["available", "--json"]), &Broken(command_failed)).is_err());
    }

    #[test]
    fn parse_failure_is_an_error() {
        let err = run(parse(&["available"]), &Broken(bad_header)).unwrap_err();
        assert!(matches!(err.downcast_ref::<WslError>(), Some(WslError::Parse(_))));
    }

    #[test]
    fn listings_succeed_against_a_working_tool() {
        assert!(run(parse(&["installed"]), &Fixed).is_ok());
        assert!(run(parse(&["installed", "--json"]), &Fixed).is_ok());
        assert!(run(parse(&["available", "--category", "ubuntu"]), &Fixed).is_ok());
    }

    #[test]
    fn category_and_search_narrow_the_catalog() {
        let Commands::Available { search, category, .. } =
            parse(&["available", "--category", "enterprise", "--search", "oracle"])
        else {
            panic!("expected the available subcommand");
        };
        assert_eq!(category, Some(Category::Enterprise));

        let narrowed = narrow(available(&Fixed).unwrap(), search.as_deref(), category);
        let names: Vec<&str> = narrowed.entries.iter().map(|d| d.name.as_str()).collect();
        assert_eq!(names, vec!["OracleLinux_9_1", "OracleLinux_8_7"]);

        let enterprise = narrow(available(&Fixed).unwrap(), None, Some(Category::Enterprise));
        assert_eq!(enterprise.len(), 3);
    }

    #[test]
    fn unknown_category_is_rejected_by_the_parser() {
        let args = ["wslm-cli", "available", "--category", "gentoo"];
        assert!(Cli::try_parse_from(args).is_err());
    }

    #[test]
    fn installed_table_marks_the_default() {
        let text = format_installed(&installed(&Fixed).unwrap());
        let lines: Vec<&str> = text.lines().collect();
        assert_eq!(lines[0], "  NAME    STATE       VERSION");
        assert_eq!(lines[1], "* Ubuntu  Running     2");
        assert_eq!(lines[2], "  Debian  Stopped     1");
        assert_eq!(lines[4], "Total: 2 | Running: 1 | Stopped: 1 | Default: Ubuntu");
    }

    #[test]
    fn empty_catalog_says_so() {
        let text = format_available(&Snapshot::default());
        assert!(text.starts_with("No matching distributions."));
        assert!(text.contains("Total: 0 | Ubuntu variants: 0 | Enterprise: 0"));
    }

    #[test]
    fn skipped_rows_point_at_the_logged_warnings() {
        assert_eq!(skipped_notice(0), None);
        let notice = skipped_notice(2).unwrap();
        assert!(notice.contains("2 row(s)"));
        assert!(!notice.contains("-v"));
    }
}
