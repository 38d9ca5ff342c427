//! Input file readers

use std::fs;
use std::path::Path;

use tracing::info;

use crate::error::{Error, Result};
use crate::records::Incident;

fn read_to_string(path: &Path) -> Result<String> {
    if !path.exists() {
        return Err(Error::InputNotFound(path.display().to_string()));
    }
    Ok(fs::read_to_string(path)?)
}

/// One item per line; lines are trimmed and blank lines skipped
///
/// Used for message and news feed files.
pub fn read_lines(path: impl AsRef<Path>) -> Result<Vec<String>> {
    let path = path.as_ref();
    let items: Vec<String> = read_to_string(path)?
        .lines()
        .map(str::trim)
        .filter(|line| !line.is_empty())
        .map(String::from)
        .collect();

    info!(path = %path.display(), count = items.len(), "Read input lines");
    Ok(items)
}

/// Multi-line scenarios separated by one or more blank lines
pub fn read_scenarios(path: impl AsRef<Path>) -> Result<Vec<String>> {
    let path = path.as_ref();
    let mut scenarios = Vec::new();
    let mut current: Vec<&str> = Vec::new();

    let content = read_to_string(path)?;
    for line in content.lines().map(str::trim) {
        if line.is_empty() {
            if !current.is_empty() {
                scenarios.push(current.join("\n"));
                current.clear();
            }
        } else {
            current.push(line);
        }
    }
    if !current.is_empty() {
        scenarios.push(current.join("\n"));
    }

    info!(path = %path.display(), count = scenarios.len(), "Read scenarios");
    Ok(scenarios)
}

/// One `location: description` incident per line
pub fn read_incidents(path: impl AsRef<Path>) -> Result<Vec<Incident>> {
    Ok(read_lines(path)?
        .iter()
        .map(|line| Incident::parse_line(line))
        .collect())
}
