//! `wsl.exe` invocation and output decoding
//!
//! This module is a thin wrapper around the external tool. Every call goes
//! through [`WslRunner`] so parsing and lifecycle code can run against
//! scripted output. Exit-code policy lives in [`Wsl::run_checked`].

use std::io;
use std::path::Path;
use std::process::{Command, Stdio};

use tracing::debug;

use crate::error::{Result, WslError};

/// Hides the console window that would otherwise flash up for every call.
#[cfg(windows)]
const CREATE_NO_WINDOW: u32 = 0x0800_0000;

/// What a finished child process left behind
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct RawOutput {
    /// `None` when the process was killed by a signal
    pub code: Option<i32>,
    pub stdout: Vec<u8>,
    pub stderr: Vec<u8>,
}

impl RawOutput {
    pub fn success(&self) -> bool {
        self.code == Some(0)
    }

    /// Decoded diagnostic text: stderr if present, otherwise stdout.
    /// `wsl.exe` prints most of its errors to stdout.
    pub fn diagnostic(&self) -> String {
        let stderr = decode_output(&self.stderr);
        let text = if stderr.trim().is_empty() {
            decode_output(&self.stdout)
        } else {
            stderr
        };
        text.split_whitespace().collect::<Vec<_>>().join(" ")
    }
}

/// Process-execution seam
pub trait WslRunner: Send + Sync {
    /// Program name, for error messages
    fn program(&self) -> &str;

    /// Run the program with `args` and wait for it. Only failing to start the
    /// process is an error here; exit codes are inspected by the caller.
    fn run(&self, args: &[String]) -> Result<RawOutput>;
}

/// Runs the real executable
#[derive(Debug, Clone)]
pub struct SystemWsl {
    program: String,
}

impl SystemWsl {
    pub fn new(program: impl Into<String>) -> Self {
        Self {
            program: program.into(),
        }
    }
}

impl Default for SystemWsl {
    fn default() -> Self {
        Self::new("wsl")
    }
}

impl WslRunner for SystemWsl {
    fn program(&self) -> &str {
        &self.program
    }

    fn run(&self, args: &[String]) -> Result<RawOutput> {
        let mut cmd = Command::new(&self.program);
        cmd.args(args).stdin(Stdio::null());

        #[cfg(windows)]
        {
            use std::os::windows::process::CommandExt;
            cmd.creation_flags(CREATE_NO_WINDOW);
        }

        debug!(program = %self.program, ?args, "spawning");
        let output = cmd.output().map_err(|e| match e.kind() {
            io::ErrorKind::NotFound => WslError::ToolUnavailable {
                command: self.program.clone(),
            },
            _ => WslError::Spawn {
                command: self.program.clone(),
                source: e,
            },
        })?;

        Ok(RawOutput {
            code: output.status.code(),
            stdout: output.stdout,
            stderr: output.stderr,
        })
    }
}

/// Typed commands on top of a runner
pub struct Wsl<R> {
    runner: R,
}

impl<R: WslRunner> Wsl<R> {
    pub fn new(runner: R) -> Self {
        Self { runner }
    }

    pub fn runner(&self) -> &R {
        &self.runner
    }

    /// Run and require exit code 0
    pub fn run_checked(&self, args: &[String]) -> Result<RawOutput> {
        let output = self.runner.run(args)?;
        if output.success() {
            Ok(output)
        } else {
            Err(WslError::CommandFailed {
                command: self.runner.program().to_string(),
                args: args.to_vec(),
                code: output.code,
                detail: output.diagnostic(),
            })
        }
    }

    /// `wsl -l -v`
    pub fn list_verbose(&self) -> Result<RawOutput> {
        self.run_checked(&args(&["-l", "-v"]))
    }

    /// `wsl --list --online`
    pub fn list_online(&self) -> Result<RawOutput> {
        self.run_checked(&args(&["--list", "--online"]))
    }

    pub fn unregister(&self, name: &str) -> Result<RawOutput> {
        self.run_checked(&args(&["--unregister", name]))
    }

    pub fn export(&self, name: &str, archive: &Path) -> Result<RawOutput> {
        self.run_checked(&[
            "--export".to_string(),
            name.to_string(),
            archive.display().to_string(),
        ])
    }

    pub fn import(&self, name: &str, location: &Path, archive: &Path) -> Result<RawOutput> {
        self.run_checked(&[
            "--import".to_string(),
            name.to_string(),
            location.display().to_string(),
            archive.display().to_string(),
        ])
    }

    pub fn install(&self, name: &str, no_launch: bool) -> Result<RawOutput> {
        let mut argv = args(&["--install", name]);
        if no_launch {
            argv.push("--no-launch".to_string());
        }
        self.run_checked(&argv)
    }
}

fn args(parts: &[&str]) -> Vec<String> {
    parts.iter().map(ToString::to_string).collect()
}

/// Decode tool output.
///
/// `wsl.exe` writes UTF-16LE, usually with a byte-order mark. With
/// `WSL_UTF8=1` it writes UTF-8 instead; text without NUL bytes is treated
/// as UTF-8. Invalid sequences become U+FFFD rather than failing.
pub fn decode_output(bytes: &[u8]) -> String {
    let text = if let Some(body) = bytes.strip_prefix(&[0xFF, 0xFE]) {
        decode_utf16le(body)
    } else if bytes.contains(&0) {
        decode_utf16le(bytes)
    } else {
        String::from_utf8_lossy(bytes).into_owned()
    };

    match text.strip_prefix('\u{feff}') {
        Some(rest) => rest.to_string(),
        None => text,
    }
}

fn decode_utf16le(bytes: &[u8]) -> String {
    let units = bytes
        .chunks_exact(2)
        .map(|pair| u16::from_le_bytes([pair[0], pair[1]]));
    char::decode_utf16(units)
        .map(|c| c.unwrap_or(char::REPLACEMENT_CHARACTER))
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Mutex;

    fn utf16le(text: &str, bom: bool) -> Vec<u8> {
        let mut bytes = if bom { vec![0xFF, 0xFE] } else { Vec::new() };
        for unit in text.encode_utf16() {
            bytes.extend_from_slice(&unit.to_le_bytes());
        }
        bytes
    }

    #[test]
    fn decodes_utf16_with_bom() {
        assert_eq!(decode_output(&utf16le("  NAME  STATE\r\n", true)), "  NAME  STATE\r\n");
    }

    #[test]
    fn decodes_utf16_without_bom() {
        assert_eq!(decode_output(&utf16le("* Ubuntu", false)), "* Ubuntu");
    }

    #[test]
    fn falls_back_to_utf8() {
        assert_eq!(decode_output("NAME STATE VERSION".as_bytes()), "NAME STATE VERSION");
        assert_eq!(decode_output(b"\xEF\xBB\xBFNAME"), "NAME");
    }

    #[test]
    fn odd_trailing_byte_is_ignored() {
        let mut bytes = utf16le("Ubuntu", true);
        bytes.push(0x41);
        assert_eq!(decode_output(&bytes), "Ubuntu");
    }

    #[test]
    fn empty_output_decodes_to_empty_string() {
        assert_eq!(decode_output(&[]), "");
    }

    struct Canned {
        output: RawOutput,
        seen: Mutex<Vec<Vec<String>>>,
    }

    impl WslRunner for Canned {
        fn program(&self) -> &str {
            "wsl"
        }

        fn run(&self, args: &[String]) -> Result<RawOutput> {
            self.seen.lock().unwrap().push(args.to_vec());
            Ok(self.output.clone())
        }
    }

    #[test]
    fn non_zero_exit_becomes_command_failed() {
        let wsl = Wsl::new(Canned {
            output: RawOutput {
                code: Some(1),
                stdout: utf16le("There is no distribution with the supplied name.\r\n", true),
                stderr: Vec::new(),
            },
            seen: Mutex::new(Vec::new()),
        });

        match wsl.unregister("Nope") {
            Err(WslError::CommandFailed { args, code, detail, .. }) => {
                assert_eq!(args, vec!["--unregister", "Nope"]);
                assert_eq!(code, Some(1));
                assert_eq!(detail, "There is no distribution with the supplied name.");
            }
            other => panic!("expected CommandFailed, got {other:?}"),
        }
    }

    #[test]
    fn install_appends_no_launch() {
        let wsl = Wsl::new(Canned {
            output: RawOutput {
                code: Some(0),
                ..RawOutput::default()
            },
            seen: Mutex::new(Vec::new()),
        });
        wsl.install("Debian", true).unwrap();
        wsl.install("Debian", false).unwrap();
        let seen = wsl.runner().seen.lock().unwrap();
        assert_eq!(seen[0], vec!["--install", "Debian", "--no-launch"]);
        assert_eq!(seen[1], vec!["--install", "Debian"]);
    }

    #[test]
    fn missing_program_is_tool_unavailable() {
        let runner = SystemWsl::new("wslm-test-definitely-not-a-real-program");
        match runner.run(&[]) {
            Err(WslError::ToolUnavailable { command }) => {
                assert_eq!(command, "wslm-test-definitely-not-a-real-program");
            }
            other => panic!("expected ToolUnavailable, got {other:?}"),
        }
    }
}
