use clap::{Args, ValueEnum};
use itertools::Itertools;
use miette::{Context, IntoDiagnostic, Result};
use nitro_archive::NitroArchive;
use owo_colors::OwoColorize;
use serde_json::Value;
use similar::{ChangeTag, TextDiff};
use std::{collections::BTreeSet, fmt::Display, path::PathBuf};
use tracing::info;

#[derive(Debug, Default, Copy, Clone, PartialEq, Eq, PartialOrd, Ord, ValueEnum)]
enum Mode {
    /// Ignore json members that only differ in formatting
    #[default]
    Semantic,
    /// Show line by line changes
    Full,
}

#[derive(Debug, Eq, PartialEq)]
enum Change {
    Added(String),
    Removed(String),
    Comparison(String, String, String),
    Context(Vec<String>),
    Modified(String, Vec<Change>),
}

impl Change {
    fn modified(name: &str) -> Change {
        Change::Modified(name.into(), Vec::new())
    }

    fn push(&mut self, related: Change) {
        if let Change::Modified(_, vec) = self {
            vec.push(related);
        }
    }
}

fn indent(text: &str) -> String {
    text.lines()
        .filter(|l| !l.trim().is_empty())
        .map(|l| "  ".to_string() + l)
        .join("\n")
}

impl Display for Change {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Change::Added(v) => writeln!(f, "✅ {}", v.green()),
            Change::Removed(v) => writeln!(f, "❌ {}", v.red()),
            Change::Comparison(key, old, new) => {
                writeln!(f, "* {}: {} vs {}", key, old.red(), new.green())
            }
            Change::Context(values) => writeln!(f, "{}", values.iter().map(|l| l.trim_end()).join("\n")),
            Change::Modified(v, related) => {
                writeln!(f, "🔃 {}", v.blue())?;
                writeln!(f, "{}", indent(&related.iter().map(|c| c.to_string()).join("")))
            }
        }
    }
}

/// Render a line diff with the changed parts of each line underlined
fn inline_diff(old: &str, new: &str) -> Vec<String> {
    let diff = TextDiff::from_lines(old, new);
    let mut lines = Vec::new();

    for op in diff.ops() {
        for change in diff.iter_inline_changes(op) {
            let mut line = match change.tag() {
                ChangeTag::Insert => "+".green().to_string(),
                ChangeTag::Delete => "-".red().to_string(),
                ChangeTag::Equal => " ".to_string(),
            };
            for (emphasized, value) in change.iter_strings_lossy() {
                if !emphasized {
                    line.push_str(&format!("{}", value.dimmed()));
                } else if change.tag() == ChangeTag::Insert {
                    line.push_str(&format!("{}", value.green().underline()));
                } else {
                    line.push_str(&format!("{}", value.red().underline()));
                }
            }
            lines.push(line);
        }
    }

    lines
}

/// Compare the top level keys of two json documents
fn json_changes(left: &Value, right: &Value) -> Vec<Change> {
    match (left, right) {
        (Value::Object(l), Value::Object(r)) => l
            .keys()
            .chain(r.keys())
            .collect::<BTreeSet<_>>()
            .into_iter()
            .filter_map(|key| match (l.get(key), r.get(key)) {
                (Some(old), Some(new)) if old != new => Some(Change::Comparison(
                    key.clone(),
                    old.to_string(),
                    new.to_string(),
                )),
                (Some(old), None) => Some(Change::Comparison(
                    key.clone(),
                    old.to_string(),
                    "missing".into(),
                )),
                (None, Some(new)) => Some(Change::Comparison(
                    key.clone(),
                    "missing".into(),
                    new.to_string(),
                )),
                _ => None,
            })
            .collect(),
        _ => vec![Change::Comparison(
            "document".into(),
            left.to_string(),
            right.to_string(),
        )],
    }
}

fn compare_member(name: &str, left: &[u8], right: &[u8], mode: Mode) -> Option<Change> {
    if left == right {
        return None;
    }

    let mut result = Change::modified(name);

    if name.ends_with(".json") {
        if let (Ok(l), Ok(r)) = (
            serde_json::from_slice::<Value>(left),
            serde_json::from_slice::<Value>(right),
        ) {
            match mode {
                Mode::Semantic if l == r => return None,
                Mode::Semantic => json_changes(&l, &r)
                    .into_iter()
                    .for_each(|c| result.push(c)),
                Mode::Full => {
                    let old = serde_json::to_string_pretty(&l).unwrap_or_default();
                    let new = serde_json::to_string_pretty(&r).unwrap_or_default();
                    result.push(Change::Context(inline_diff(&old, &new)));
                }
            }
            return Some(result);
        }
    }

    if left.len() != right.len() {
        result.push(Change::Comparison(
            "size".into(),
            left.len().to_string(),
            right.len().to_string(),
        ));
    }

    if let Some(offset) = left.iter().zip(right).position(|(l, r)| l != r) {
        result.push(Change::Comparison(
            "first difference".into(),
            format!("byte {}", offset),
            format!("byte {}", offset),
        ));
    }

    Some(result)
}

fn compare_archives(left: &NitroArchive, right: &NitroArchive, mode: Mode) -> Vec<Change> {
    let left_names = left.file_names().collect::<BTreeSet<_>>();
    let right_names = right.file_names().collect::<BTreeSet<_>>();

    let mut result = Vec::new();

    right_names
        .difference(&left_names)
        .map(|name| Change::Added(name.to_string()))
        .for_each(|c| result.push(c));

    left_names
        .difference(&right_names)
        .map(|name| Change::Removed(name.to_string()))
        .for_each(|c| result.push(c));

    for name in left_names.intersection(&right_names) {
        if let (Ok(l), Ok(r)) = (left.by_name(name), right.by_name(name)) {
            if let Some(c) = compare_member(name, l.data(), r.data(), mode) {
                result.push(c);
            }
        }
    }

    if mode == Mode::Full {
        let mut archive = Change::modified("archive");
        if left.first_json_name() != right.first_json_name() {
            archive.push(Change::Comparison(
                "metadata member".into(),
                left.first_json_name().unwrap_or("none").into(),
                right.first_json_name().unwrap_or("none").into(),
            ));
        }
        if left.first_texture_name() != right.first_texture_name() {
            archive.push(Change::Comparison(
                "texture member".into(),
                left.first_texture_name().unwrap_or("none").into(),
                right.first_texture_name().unwrap_or("none").into(),
            ));
        }
        if left.failures().len() != right.failures().len() {
            archive.push(Change::Comparison(
                "undecodable members".into(),
                left.failures().len().to_string(),
                right.failures().len().to_string(),
            ));
        }
        if archive != Change::modified("archive") {
            result.push(archive);
        }
    }

    result
}

#[derive(Args)]
pub struct DiffArgs {
    /// An input Nitro file
    #[arg(short, long, value_name = "FILE")]
    left: PathBuf,

    /// An input Nitro file
    #[arg(short, long, value_name = "FILE")]
    right: PathBuf,

    /// Comparison mode
    #[arg(short, long, value_enum, default_value_t = Mode::Semantic)]
    mode: Mode,
}

impl DiffArgs {
    pub fn handle(&self) -> Result<()> {
        let l = std::fs::read(&self.left)
            .into_diagnostic()
            .context(format!("path: {}", &self.left.display()))?;
        let left = NitroArchive::new(&l)?;

        let r = std::fs::read(&self.right)
            .into_diagnostic()
            .context(format!("path: {}", &self.right.display()))?;
        let right = NitroArchive::new(&r)?;

        let changes = compare_archives(&left, &right, self.mode);
        if changes.is_empty() {
            info!("archives are identical");
        }

        for c in changes {
            print!("{}", c);
        }

        Ok(())
    }
}
