//! Core logic - listing snapshots and lifecycle actions
//!
//! `DistroManager` is the only thing that talks to `wsl.exe` on behalf of a
//! front end. Every fetch returns a fresh `Snapshot`; nothing is cached here.
//!
//! Rename and custom-name install are built from the same three steps
//! (export, import, unregister). `Transfer<S>` tracks which of those have run
//! so the steps can only be taken in order, and so a failure can say exactly
//! where the sequence stopped.

use std::fs;
use std::marker::PhantomData;
use std::path::{Path, PathBuf};
use std::thread;
use std::time::Duration;

use tempfile::TempDir;
use tracing::{info, warn};

use crate::error::{PartialFailure, Result, WslError};
use crate::parser::{parse_available, parse_installed};
use crate::types::*;
use crate::wsl::{RawOutput, Wsl, WslRunner, decode_output};

/// What `wsl -l -v` prints (with a non-zero exit) when nothing is installed
const NO_DISTRIBUTIONS: &str = "has no installed distributions";

/// Knobs for install, rename and delete
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LifecycleSettings {
    /// Parent directory for imported distributions; each gets `<root>/<name>`
    pub import_root: PathBuf,
    /// Pass `--no-launch` to plain installs
    pub install_no_launch: bool,
    /// Pause between installing and exporting a custom-named install
    pub settle: Duration,
    /// Where transfer archives are staged
    pub scratch_root: PathBuf,
}

impl Default for LifecycleSettings {
    fn default() -> Self {
        Self {
            import_root: crate::config::default_import_root(),
            install_no_launch: true,
            settle: Duration::from_secs(5),
            scratch_root: std::env::temp_dir(),
        }
    }
}

/// Result of a lifecycle action that ran to the end
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Outcome {
    pub action: ActionKind,
    /// Name the distribution is registered under afterwards
    pub name: String,
    /// Old name, for renames
    pub previous: Option<String>,
    /// Listing fetched after the action
    pub snapshot: Snapshot<Distribution>,
    /// Whether `snapshot` shows the expected result. Always true for delete
    /// and rename (they fail otherwise); installs may still be registering.
    pub confirmed: bool,
}

impl Outcome {
    pub fn message(&self) -> String {
        match (self.action, &self.previous) {
            (ActionKind::Delete, _) => format!("Deleted '{}'", self.name),
            (ActionKind::Rename, Some(previous)) => {
                format!("Renamed '{previous}' to '{}'", self.name)
            }
            (ActionKind::Rename, None) => format!("Renamed to '{}'", self.name),
            (ActionKind::Install, _) if self.confirmed => format!("Installed '{}'", self.name),
            (ActionKind::Install, _) => format!(
                "Installed '{}'; it is not listed yet. Refresh once setup has finished.",
                self.name
            ),
        }
    }
}

/// Distribution names accepted for rename and custom-name install
pub fn validate_name(name: &str) -> Result<()> {
    let reason = if name.is_empty() {
        Some("name is empty")
    } else if !name
        .chars()
        .all(|c| c.is_ascii_alphanumeric() || c == '-' || c == '_')
    {
        Some("only letters, digits, '-' and '_' are allowed")
    } else {
        None
    };

    match reason {
        Some(reason) => Err(WslError::InvalidName {
            name: name.to_string(),
            reason,
        }),
        None => Ok(()),
    }
}

// ============================================================================
// Manager
// ============================================================================

pub struct DistroManager<R> {
    wsl: Wsl<R>,
    settings: LifecycleSettings,
}

impl<R: WslRunner> DistroManager<R> {
    pub fn new(runner: R, settings: LifecycleSettings) -> Self {
        Self {
            wsl: Wsl::new(runner),
            settings,
        }
    }

    pub fn wsl(&self) -> &Wsl<R> {
        &self.wsl
    }

    /// Fetch and parse `wsl -l -v`
    pub fn installed(&self) -> Result<Snapshot<Distribution>> {
        let output = match self.wsl.list_verbose() {
            Ok(output) => output,
            Err(WslError::CommandFailed { ref detail, .. }) if detail.contains(NO_DISTRIBUTIONS) => {
                info!("no distributions installed");
                return Ok(Snapshot::default());
            }
            Err(e) => return Err(e),
        };
        let snapshot = parse_installed(&decode_output(&output.stdout))?;
        info!(count = snapshot.len(), skipped = snapshot.skipped_rows(), "installed listing");
        Ok(snapshot)
    }

    /// Fetch and parse the online catalog
    pub fn available(&self) -> Result<Snapshot<AvailableDistribution>> {
        let output = self.wsl.list_online()?;
        let snapshot = parse_available(&decode_output(&output.stdout))?;
        info!(count = snapshot.len(), skipped = snapshot.skipped_rows(), "online catalog");
        Ok(snapshot)
    }

    /// Unregister a distribution and confirm it is gone
    pub fn delete(&self, name: &str) -> Result<Outcome> {
        let before = self.installed()?;
        let name = registered_name(&before, name)?;

        info!(%name, "unregistering");
        self.wsl.unregister(&name)?;

        let after = self.installed()?;
        if after.find(&name).is_some() {
            return Err(WslError::NotConfirmed {
                action: ActionKind::Delete,
                name,
            });
        }

        Ok(Outcome {
            action: ActionKind::Delete,
            name,
            previous: None,
            snapshot: after,
            confirmed: true,
        })
    }

    /// Rename by export, import under the new name, unregister the original
    pub fn rename(&self, old: &str, new: &str) -> Result<Outcome> {
        validate_name(new)?;
        let before = self.installed()?;
        let source = registered_name(&before, old)?;
        if before.find_ignore_case(new).is_some() {
            return Err(WslError::AlreadyExists(new.to_string()));
        }

        let location = self.settings.import_root.join(new);
        Transfer::begin(&self.wsl, &self.settings.scratch_root, ActionKind::Rename, &source, new, Vec::new())?
            .export()?
            .import(&location)?
            .unregister_source()?;

        let after = self.installed()?;
        if after.find(new).is_none() {
            return Err(WslError::NotConfirmed {
                action: ActionKind::Rename,
                name: new.to_string(),
            });
        }

        Ok(Outcome {
            action: ActionKind::Rename,
            name: new.to_string(),
            previous: Some(source),
            snapshot: after,
            confirmed: true,
        })
    }

    /// Install from the online catalog, optionally under a custom name
    pub fn install(&self, name: &str, custom_name: Option<&str>) -> Result<Outcome> {
        let catalog = self.available()?;
        let name = catalog
            .find(name)
            .map(|d| d.name.clone())
            .ok_or_else(|| WslError::NotInCatalog(name.to_string()))?;

        let before = self.installed()?;
        if before.find_ignore_case(&name).is_some() {
            return Err(WslError::AlreadyExists(name));
        }

        match custom_name.map(str::trim).filter(|c| !c.is_empty()) {
            None => self.install_plain(name),
            Some(custom) => self.install_as(name, custom, &before),
        }
    }

    fn install_plain(&self, name: String) -> Result<Outcome> {
        info!(%name, no_launch = self.settings.install_no_launch, "installing");
        self.wsl.install(&name, self.settings.install_no_launch)?;

        let after = self.installed()?;
        let confirmed = after.find_ignore_case(&name).is_some();
        if !confirmed {
            warn!(%name, "install finished but the distribution is not listed yet");
        }

        Ok(Outcome {
            action: ActionKind::Install,
            name,
            previous: None,
            snapshot: after,
            confirmed,
        })
    }

    fn install_as(&self, name: String, custom: &str, before: &Snapshot<Distribution>) -> Result<Outcome> {
        validate_name(custom)?;
        if before.find_ignore_case(custom).is_some() {
            return Err(WslError::AlreadyExists(custom.to_string()));
        }
        let location = self.settings.import_root.join(custom);

        info!(%name, %custom, "installing under a custom name");
        if let Err(cause) = self.wsl.install(&name, true) {
            return Err(partial(ActionKind::Install, &name, custom, Vec::new(), LifecycleStep::Install, cause));
        }
        if !self.settings.settle.is_zero() {
            thread::sleep(self.settings.settle);
        }

        // The default-named copy exists from here on; every failure is partial
        let completed = vec![LifecycleStep::Install];
        let transfer = match Transfer::begin(
            &self.wsl,
            &self.settings.scratch_root,
            ActionKind::Install,
            &name,
            custom,
            completed.clone(),
        ) {
            Ok(transfer) => transfer,
            Err(cause) => {
                return Err(partial(ActionKind::Install, &name, custom, completed, LifecycleStep::Export, cause));
            }
        };
        transfer
            .export()?
            .import(&location)?
            .unregister_source()?;

        let after = self.installed()?;
        let confirmed = after.find(custom).is_some();
        if !confirmed {
            warn!(%custom, "custom-name install finished but the distribution is not listed");
        }

        Ok(Outcome {
            action: ActionKind::Install,
            name: custom.to_string(),
            previous: None,
            snapshot: after,
            confirmed,
        })
    }

}

/// Exact match first, then case-insensitive; returns the name as registered
fn registered_name(snapshot: &Snapshot<Distribution>, name: &str) -> Result<String> {
    snapshot
        .find(name)
        .or_else(|| snapshot.find_ignore_case(name))
        .map(|d| d.name.clone())
        .ok_or_else(|| WslError::NotFound(name.to_string()))
}

fn partial(
    action: ActionKind,
    source: &str,
    destination: &str,
    completed: Vec<LifecycleStep>,
    failed: LifecycleStep,
    cause: WslError,
) -> WslError {
    warn!(%action, %source, %destination, %failed, error = %cause, "lifecycle step failed");
    WslError::PartialLifecycleFailure(Box::new(PartialFailure {
        action,
        source_name: source.to_string(),
        destination_name: destination.to_string(),
        completed,
        failed,
        cause,
    }))
}

// ============================================================================
// Typestate transfer: export -> import -> unregister
// ============================================================================

/// Nothing exported yet
pub struct Pending;
/// Archive written
pub struct Exported;
/// Copy registered under the destination name
pub struct Imported;

/// One export/import/unregister sequence. The archive lives in a temporary
/// directory that is removed when the transfer is dropped, on success or not.
pub struct Transfer<'a, R, S> {
    wsl: &'a Wsl<R>,
    action: ActionKind,
    source: String,
    destination: String,
    workdir: TempDir,
    archive: PathBuf,
    completed: Vec<LifecycleStep>,
    _phantom: PhantomData<S>,
}

impl<'a, R: WslRunner> Transfer<'a, R, Pending> {
    fn begin(
        wsl: &'a Wsl<R>,
        scratch_root: &Path,
        action: ActionKind,
        source: &str,
        destination: &str,
        completed: Vec<LifecycleStep>,
    ) -> Result<Self> {
        let workdir = tempfile::Builder::new()
            .prefix("wslm-")
            .tempdir_in(scratch_root)
            .map_err(|e| WslError::io(scratch_root, e))?;
        let archive = workdir.path().join(format!("{source}.tar"));

        Ok(Self {
            wsl,
            action,
            source: source.to_string(),
            destination: destination.to_string(),
            workdir,
            archive,
            completed,
            _phantom: PhantomData,
        })
    }

    pub fn export(self) -> Result<Transfer<'a, R, Exported>> {
        info!(source = %self.source, archive = %self.archive.display(), "exporting");
        let result = self.wsl.export(&self.source, &self.archive);
        self.advance(LifecycleStep::Export, result)
    }
}

impl<'a, R: WslRunner> Transfer<'a, R, Exported> {
    /// Creates `location` if missing, then imports the archive into it
    pub fn import(self, location: &Path) -> Result<Transfer<'a, R, Imported>> {
        info!(destination = %self.destination, location = %location.display(), "importing");
        let result = fs::create_dir_all(location)
            .map_err(|e| WslError::io(location, e))
            .and_then(|()| self.wsl.import(&self.destination, location, &self.archive));
        self.advance(LifecycleStep::Import, result)
    }
}

impl<R: WslRunner> Transfer<'_, R, Imported> {
    /// Final step; returns the completed step list
    pub fn unregister_source(self) -> Result<Vec<LifecycleStep>> {
        info!(source = %self.source, "unregistering original");
        let result = self.wsl.unregister(&self.source);
        let done: Transfer<'_, R, Imported> = self.advance(LifecycleStep::Unregister, result)?;
        Ok(done.completed)
    }
}

impl<'a, R, S> Transfer<'a, R, S> {
    pub fn completed(&self) -> &[LifecycleStep] {
        &self.completed
    }

    pub fn workdir(&self) -> &Path {
        self.workdir.path()
    }

    fn advance<T>(mut self, step: LifecycleStep, result: Result<RawOutput>) -> Result<Transfer<'a, R, T>> {
        if let Err(cause) = result {
            return Err(partial(
                self.action,
                &self.source,
                &self.destination,
                self.completed,
                step,
                cause,
            ));
        }

        self.completed.push(step);
        Ok(Transfer {
            wsl: self.wsl,
            action: self.action,
            source: self.source,
            destination: self.destination,
            workdir: self.workdir,
            archive: self.archive,
            completed: self.completed,
            _phantom: PhantomData,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;
    use std::sync::Mutex;

    /// In-memory stand-in for `wsl.exe` that keeps a registry of names
    struct FakeWsl {
        registered: Mutex<Vec<String>>,
        catalog: &'static str,
        fail_on: Option<&'static str>,
        calls: Mutex<Vec<Vec<String>>>,
    }

    impl FakeWsl {
        fn new(registered: &[&str]) -> Self {
            Self {
                registered: Mutex::new(registered.iter().map(ToString::to_string).collect()),
                catalog: "NAME      FRIENDLY NAME\nUbuntu    Ubuntu\nDebian    Debian GNU/Linux\n",
                fail_on: None,
                calls: Mutex::new(Vec::new()),
            }
        }

        fn failing(mut self, flag: &'static str) -> Self {
            self.fail_on = Some(flag);
            self
        }

        fn calls(&self) -> Vec<String> {
            self.calls.lock().unwrap().iter().map(|c| c[0].clone()).collect()
        }
    }

    fn ok(text: &str) -> RawOutput {
        let mut stdout = vec![0xFF, 0xFE];
        for unit in text.encode_utf16() {
            stdout.extend_from_slice(&unit.to_le_bytes());
        }
        RawOutput {
            code: Some(0),
            stdout,
            stderr: Vec::new(),
        }
    }

    impl WslRunner for FakeWsl {
        fn program(&self) -> &str {
            "wsl"
        }

        fn run(&self, args: &[String]) -> Result<RawOutput> {
            self.calls.lock().unwrap().push(args.to_vec());
            if self.fail_on == Some(args[0].as_str()) {
                return Ok(RawOutput {
                    code: Some(1),
                    ..ok("The operation failed.")
                });
            }

            let mut registered = self.registered.lock().unwrap();
            Ok(match args[0].as_str() {
                "-l" if registered.is_empty() => RawOutput {
                    code: Some(1),
                    ..ok("Windows Subsystem for Linux has no installed distributions.\r\n")
                },
                "-l" => {
                    let mut text = String::from("  NAME      STATE           VERSION\r\n");
                    for name in registered.iter() {
                        text.push_str(&format!("  {name}    Stopped    2\r\n"));
                    }
                    ok(&text)
                }
                "--list" => ok(self.catalog),
                "--unregister" => {
                    registered.retain(|n| n != &args[1]);
                    ok("")
                }
                "--import" | "--install" => {
                    registered.push(args[1].clone());
                    ok("")
                }
                _ => ok(""),
            })
        }
    }

    fn manager(fake: FakeWsl) -> (DistroManager<FakeWsl>, TempDir) {
        let root = TempDir::new().unwrap();
        let settings = LifecycleSettings {
            import_root: root.path().to_path_buf(),
            install_no_launch: true,
            settle: Duration::ZERO,
            scratch_root: std::env::temp_dir(),
        };
        (DistroManager::new(fake, settings), root)
    }

    fn names(snapshot: &Snapshot<Distribution>) -> Vec<&str> {
        snapshot.entries.iter().map(|d| d.name.as_str()).collect()
    }

    #[test]
    fn empty_registry_is_an_empty_listing() {
        let (mgr, _root) = manager(FakeWsl::new(&[]));
        assert!(mgr.installed().unwrap().is_empty());
    }

    #[test]
    fn exit_one_with_empty_output_is_command_failed() {
        struct Silent;
        impl WslRunner for Silent {
            fn program(&self) -> &str {
                "wsl"
            }
            fn run(&self, _args: &[String]) -> Result<RawOutput> {
                Ok(RawOutput {
                    code: Some(1),
                    ..RawOutput::default()
                })
            }
        }

        let mgr = DistroManager::new(Silent, LifecycleSettings::default());
        assert!(matches!(
            mgr.installed(),
            Err(WslError::CommandFailed { code: Some(1), .. })
        ));
    }

    #[test]
    fn delete_confirms_removal() {
        let (mgr, _root) = manager(FakeWsl::new(&["Ubuntu", "Debian"]));
        let outcome = mgr.delete("debian").unwrap();
        assert_eq!(outcome.name, "Debian");
        assert_eq!(names(&outcome.snapshot), vec!["Ubuntu"]);
        assert_eq!(outcome.message(), "Deleted 'Debian'");
    }

    #[test]
    fn deleting_last_distribution_succeeds() {
        let (mgr, _root) = manager(FakeWsl::new(&["Ubuntu"]));
        let outcome = mgr.delete("Ubuntu").unwrap();
        assert!(outcome.snapshot.is_empty());
    }

    #[test]
    fn delete_unknown_name_is_not_found() {
        let (mgr, _root) = manager(FakeWsl::new(&["Ubuntu"]));
        assert!(matches!(mgr.delete("Arch"), Err(WslError::NotFound(name)) if name == "Arch"));
        assert_eq!(mgr.wsl().runner().calls(), vec!["-l"]);
    }

    #[test]
    fn rename_runs_export_import_unregister() {
        let (mgr, root) = manager(FakeWsl::new(&["Ubuntu"]));
        let outcome = mgr.rename("Ubuntu", "Dev").unwrap();
        assert_eq!(names(&outcome.snapshot), vec!["Dev"]);
        assert_eq!(outcome.message(), "Renamed 'Ubuntu' to 'Dev'");
        assert_eq!(
            mgr.wsl().runner().calls(),
            vec!["-l", "--export", "--import", "--unregister", "-l"]
        );
        assert!(root.path().join("Dev").is_dir());
    }

    #[test]
    fn rename_import_failure_keeps_original() {
        let (mgr, _root) = manager(FakeWsl::new(&["Ubuntu"]).failing("--import"));
        let err = mgr.rename("Ubuntu", "Dev").unwrap_err();
        let report = err.partial_failure().unwrap();
        assert_eq!(report.failed, LifecycleStep::Import);
        assert_eq!(report.completed, vec![LifecycleStep::Export]);
        assert!(report.original_retained());
        assert!(err.to_string().contains("'Ubuntu' has not been deleted"));
        assert!(!mgr.wsl().runner().calls().contains(&"--unregister".to_string()));
    }

    #[test]
    fn rename_rejects_bad_and_taken_names() {
        let (mgr, _root) = manager(FakeWsl::new(&["Ubuntu", "Debian"]));
        assert!(matches!(mgr.rename("Ubuntu", "my distro"), Err(WslError::InvalidName { .. })));
        assert!(matches!(mgr.rename("Ubuntu", "debian"), Err(WslError::AlreadyExists(_))));
        assert!(matches!(mgr.rename("Arch", "Dev"), Err(WslError::NotFound(_))));
    }

    #[test]
    fn archive_directory_is_removed_after_transfer() {
        let fake = FakeWsl::new(&["Ubuntu"]);
        let wsl = Wsl::new(fake);
        let transfer =
            Transfer::begin(&wsl, &std::env::temp_dir(), ActionKind::Rename, "Ubuntu", "Dev", Vec::new()).unwrap();
        let workdir = transfer.workdir().to_path_buf();
        assert!(workdir.is_dir());
        let exported = transfer.export().unwrap();
        assert_eq!(exported.completed(), &[LifecycleStep::Export]);
        drop(exported);
        assert!(!workdir.exists());
    }

    #[test]
    fn install_plain_uses_catalog_name() {
        let (mgr, _root) = manager(FakeWsl::new(&[]));
        let outcome = mgr.install("debian", None).unwrap();
        assert_eq!(outcome.name, "Debian");
        assert!(outcome.confirmed);
        let calls = mgr.wsl().runner().calls.lock().unwrap().clone();
        assert!(calls.contains(&vec![
            "--install".to_string(),
            "Debian".to_string(),
            "--no-launch".to_string()
        ]));
    }

    #[test]
    fn install_with_custom_name_transfers() {
        let (mgr, _root) = manager(FakeWsl::new(&[]));
        let outcome = mgr.install("Ubuntu", Some("Work")).unwrap();
        assert_eq!(names(&outcome.snapshot), vec!["Work"]);
        assert_eq!(
            mgr.wsl().runner().calls(),
            vec!["--list", "-l", "--install", "--export", "--import", "--unregister", "-l"]
        );
    }

    #[test]
    fn install_rejects_unknown_and_installed_names() {
        let (mgr, _root) = manager(FakeWsl::new(&["Ubuntu"]));
        assert!(matches!(mgr.install("Arch", None), Err(WslError::NotInCatalog(_))));
        assert!(matches!(mgr.install("ubuntu", None), Err(WslError::AlreadyExists(_))));
    }

    #[test]
    fn custom_install_export_failure_leaves_default_copy() {
        let (mgr, _root) = manager(FakeWsl::new(&[]).failing("--export"));
        let err = mgr.install("Debian", Some("Work")).unwrap_err();
        let report = err.partial_failure().unwrap();
        assert_eq!(report.completed, vec![LifecycleStep::Install]);
        assert_eq!(report.failed, LifecycleStep::Export);
        assert!(report.original_retained());
        assert!(!report.destination_created());
    }

    #[test]
    fn custom_install_without_scratch_space_is_partial() {
        let (mut mgr, root) = manager(FakeWsl::new(&[]));
        mgr.settings.scratch_root = root.path().join("missing");
        let err = mgr.install("Ubuntu", Some("Work")).unwrap_err();
        let report = err.partial_failure().unwrap();
        assert_eq!(report.completed, vec![LifecycleStep::Install]);
        assert_eq!(report.failed, LifecycleStep::Export);
        assert!(report.original_retained());
        assert!(matches!(report.cause, WslError::Io { .. }));
        assert_eq!(names(&mgr.installed().unwrap()), vec!["Ubuntu"]);
    }

    #[test]
    fn failed_export_leaves_no_import_directory() {
        let (mgr, root) = manager(FakeWsl::new(&["Ubuntu"]).failing("--export"));
        let err = mgr.rename("Ubuntu", "Dev").unwrap_err();
        let report = err.partial_failure().unwrap();
        assert_eq!(report.failed, LifecycleStep::Export);
        assert!(!report.destination_created());
        assert!(!root.path().join("Dev").exists());
    }

    #[test]
    fn name_validation() {
        assert!(validate_name("Ubuntu-22_04").is_ok());
        assert!(validate_name("").is_err());
        assert!(validate_name("a.b").is_err());
        assert!(validate_name("dev box").is_err());
    }
}
