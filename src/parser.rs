//! Parsers for `wsl -l -v` and `wsl --list --online` output
//!
//! Both take already-decoded text (see [`crate::wsl::decode_output`]).
//! A bad header aborts the parse; a bad row is skipped, logged and recorded
//! in the snapshot's warnings.

use std::collections::HashSet;

use tracing::warn;

use crate::error::ParseError;
use crate::types::*;

/// Characters trimmed from every field besides whitespace
const DECORATIVE: &[char] = &['*', '\0', '\u{feff}'];

/// Prose `wsl --list --online` prints around the table
const CATALOG_PROSE: &[&str] = &["The following", "Install using"];

/// Parse the installed-distribution table.
///
/// ```text
///   NAME      STATE           VERSION
/// * Ubuntu    Running         2
///   Debian    Stopped         1
/// ```
pub fn parse_installed(text: &str) -> Result<Snapshot<Distribution>, ParseError> {
    let lines = numbered_lines(text);
    let mut rows = lines.iter().filter(|(_, line)| !line.trim().is_empty());

    match rows.next() {
        Some((_, header)) if header.split_whitespace().count() >= 3 => {}
        Some((_, header)) => {
            return Err(ParseError::MissingHeader {
                found: header.trim().to_string(),
            });
        }
        None => {
            return Err(ParseError::MissingHeader {
                found: String::new(),
            });
        }
    }

    let mut snapshot = Snapshot::default();
    let mut seen = HashSet::new();
    let mut has_default = false;

    for (line_no, line) in rows {
        let line_no = *line_no;
        let mut dist = match parse_installed_row(line) {
            Ok(dist) => dist,
            Err(issue) => {
                record(&mut snapshot.warnings, line_no, line, issue);
                continue;
            }
        };

        if !seen.insert(dist.name.clone()) {
            record(&mut snapshot.warnings, line_no, line, RowIssue::DuplicateName);
            continue;
        }

        if dist.is_default {
            if has_default {
                dist.is_default = false;
                record(&mut snapshot.warnings, line_no, line, RowIssue::ExtraDefault);
            }
            has_default = true;
        }

        snapshot.entries.push(dist);
    }

    Ok(snapshot)
}

fn parse_installed_row(line: &str) -> Result<Distribution, RowIssue> {
    let line = line.trim();
    let (is_default, rest) = match line.strip_prefix('*') {
        Some(rest) => (true, rest),
        None => (false, line),
    };

    let fields: Vec<&str> = rest
        .split_whitespace()
        .map(|f| f.trim_matches(DECORATIVE))
        .filter(|f| !f.is_empty())
        .collect();

    let [name, state, version] = fields.as_slice() else {
        return Err(if fields.len() < 3 {
            RowIssue::TooFewFields(fields.len())
        } else {
            RowIssue::TooManyFields(fields.len())
        });
    };

    let version = version
        .parse::<WslVersion>()
        .map_err(|_| RowIssue::BadVersion(version.to_string()))?;

    Ok(Distribution {
        name: name.to_string(),
        state: DistributionState::from(state.to_string()),
        version,
        is_default,
    })
}

/// Parse the online catalog.
///
/// ```text
/// The following is a list of valid distributions that can be installed.
/// Install using 'wsl.exe --install <Distro>'.
///
/// NAME                            FRIENDLY NAME
/// Ubuntu                          Ubuntu
/// Debian                          Debian GNU/Linux
/// ```
pub fn parse_available(text: &str) -> Result<Snapshot<AvailableDistribution>, ParseError> {
    let lines = numbered_lines(text);

    let Some(header_at) = lines.iter().position(|(_, line)| is_catalog_header(line)) else {
        let found = lines
            .iter()
            .map(|(_, line)| line.trim())
            .find(|line| !line.is_empty())
            .unwrap_or_default();
        return Err(ParseError::MissingHeader {
            found: found.to_string(),
        });
    };

    let mut snapshot = Snapshot::default();
    let mut seen = HashSet::new();

    for (line_no, line) in &lines[header_at + 1..] {
        let line_no = *line_no;
        let trimmed = line.trim();
        if trimmed.is_empty() || CATALOG_PROSE.iter().any(|p| trimmed.starts_with(p)) {
            continue;
        }

        let fields: Vec<&str> = trimmed.split_whitespace().collect();
        let [name, friendly @ ..] = fields.as_slice() else {
            continue;
        };
        if friendly.is_empty() {
            record(&mut snapshot.warnings, line_no, line, RowIssue::TooFewFields(1));
            continue;
        }

        if !seen.insert(name.to_lowercase()) {
            record(&mut snapshot.warnings, line_no, line, RowIssue::DuplicateName);
            continue;
        }

        let friendly_name = friendly.join(" ");
        snapshot.entries.push(AvailableDistribution {
            name: (*name).to_string(),
            category: categorize(&friendly_name),
            friendly_name,
        });
    }

    Ok(snapshot)
}

fn is_catalog_header(line: &str) -> bool {
    let mut words = line.split_whitespace();
    words.next() == Some("NAME") && words.next().is_some()
}

/// Bucket a catalog entry by its friendly name
pub fn categorize(friendly_name: &str) -> Category {
    const ENTERPRISE: &[&str] = &["enterprise", "oracle", "suse"];

    let lower = friendly_name.to_lowercase();
    if lower.contains("ubuntu") {
        Category::Ubuntu
    } else if ENTERPRISE.iter().any(|k| lower.contains(k)) {
        Category::Enterprise
    } else {
        Category::Other
    }
}

/// Split on `\r\n`, `\n` or a lone `\r`, numbering lines from 1
fn numbered_lines(text: &str) -> Vec<(usize, String)> {
    text.replace("\r\n", "\n")
        .split(['\n', '\r'])
        .enumerate()
        .map(|(i, line)| (i + 1, line.to_string()))
        .collect()
}

fn record(warnings: &mut Vec<RowWarning>, line: usize, text: &str, issue: RowIssue) {
    warn!(line, text = text.trim(), %issue, "skipping listing row");
    warnings.push(RowWarning {
        line,
        text: text.trim().to_string(),
        issue,
    });
}
