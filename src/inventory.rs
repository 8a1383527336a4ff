//! Inventory file maintenance.
//!
//! The inventory maps node identifiers to connection addresses, one host per
//! line (`orders-node-1 ansible_host=198.51.100.7 ansible_user=rocky ...`).
//! It is generated by the provisioning run and rewritten by start when a
//! node comes back with a new public address.

use crate::error::{Error, Result};
use regex::Regex;
use std::fs;
use std::path::Path;
use std::sync::OnceLock;

static HOST_REGEX: OnceLock<Regex> = OnceLock::new();

fn get_host_regex() -> &'static Regex {
    HOST_REGEX.get_or_init(|| Regex::new(r"(ansible_host=)(\S+)").expect("static regex pattern is valid"))
}

/// Connection details for a host entry appended when the node is missing.
#[derive(Debug, Clone, Copy)]
pub struct HostEntry<'a> {
    pub node: &'a str,
    pub address: &'a str,
    pub user: &'a str,
    pub private_key: &'a str,
}

impl HostEntry<'_> {
    fn line(&self) -> String {
        format!(
            "{} ansible_host={} ansible_user={} ansible_ssh_private_key_file={}\n",
            self.node, self.address, self.user, self.private_key
        )
    }
}

fn is_host_line(line: &str, node: &str) -> bool {
    line.split_whitespace().next() == Some(node) && line.contains("ansible_host=")
}

/// Point `entry.node` at `entry.address`.
///
/// Lines for the node have their `ansible_host` value replaced and nothing
/// else touched; every other line is kept byte for byte. If no line names
/// the node a full entry is appended.
pub fn upsert_host(contents: &str, entry: &HostEntry<'_>) -> String {
    let regex = get_host_regex();
    let mut out = String::with_capacity(contents.len() + 128);
    let mut updated = false;

    for line in contents.split_inclusive('\n') {
        if is_host_line(line, entry.node) {
            let replacement = format!("${{1}}{}", entry.address);
            out.push_str(&regex.replace(line, replacement.as_str()));
            updated = true;
        } else {
            out.push_str(line);
        }
    }

    if !updated {
        if !out.is_empty() && !out.ends_with('\n') {
            out.push('\n');
        }
        out.push_str(&entry.line());
    }
    out
}

/// Address currently recorded for `node`, if any.
pub fn host_address<'a>(contents: &'a str, node: &str) -> Option<&'a str> {
    contents
        .lines()
        .find(|line| is_host_line(line, node))
        .and_then(|line| get_host_regex().captures(line))
        .and_then(|caps| caps.get(2))
        .map(|m| m.as_str())
}

/// Rewrite the inventory file at `path` in place.
pub fn update_file(path: &Path, entry: &HostEntry<'_>) -> Result<()> {
    let contents = match fs::read_to_string(path) {
        Ok(contents) => contents,
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
            return Err(Error::MissingArtifact(path.display().to_string()));
        }
        Err(e) => return Err(e.into()),
    };
    fs::write(path, upsert_host(&contents, entry))?;
    Ok(())
}
