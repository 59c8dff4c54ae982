//! Text rendering for the command line
//!
//! One-line summaries draw predecessors and successors as arrows around the
//! entity; detail views are column-aligned tables with multi-line cells.

use prov_graph::Neighbors;
use prov_store::{Experiment, File, FileId, Pipeline, Record};
use std::collections::HashMap;
use std::fmt::{self, Display, Formatter};

/// Column-aligned table; cells may span several lines
#[derive(Debug, Clone, Default)]
pub struct Table {
    headers: Vec<String>,
    rows: Vec<Vec<String>>,
}

impl Table {
    #[must_use]
    pub fn new<I, S>(headers: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self {
            headers: headers.into_iter().map(Into::into).collect(),
            rows: Vec::new(),
        }
    }

    /// Append a row; missing cells render empty
    pub fn push<I, S>(&mut self, cells: I)
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.rows.push(cells.into_iter().map(Into::into).collect());
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.rows.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.rows.is_empty()
    }

    fn widths(&self) -> Vec<usize> {
        let mut widths: Vec<usize> = self.headers.iter().map(|h| width(h)).collect();
        for row in &self.rows {
            for (i, cell) in row.iter().enumerate().take(widths.len()) {
                let widest = cell.lines().map(width).max().unwrap_or(0);
                widths[i] = widths[i].max(widest);
            }
        }
        widths
    }
}

impl Display for Table {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        let widths = self.widths();
        let line = |f: &mut Formatter<'_>, cells: &[&str]| -> fmt::Result {
            let mut text = String::new();
            for (i, w) in widths.iter().enumerate() {
                let cell = cells.get(i).copied().unwrap_or("");
                text.push_str(cell);
                if i + 1 < widths.len() {
                    text.push_str(&" ".repeat(w - width(cell) + 2));
                }
            }
            writeln!(f, "{}", text.trim_end())
        };

        let headers: Vec<&str> = self.headers.iter().map(String::as_str).collect();
        line(f, &headers)?;
        let rules: Vec<String> = widths.iter().map(|w| "─".repeat(*w)).collect();
        let rules: Vec<&str> = rules.iter().map(String::as_str).collect();
        line(f, &rules)?;

        for row in &self.rows {
            let split: Vec<Vec<&str>> = row.iter().map(|c| c.lines().collect()).collect();
            let height = split.iter().map(Vec::len).max().unwrap_or(0).max(1);
            for k in 0..height {
                let cells: Vec<&str> = split
                    .iter()
                    .map(|lines| lines.get(k).copied().unwrap_or(""))
                    .collect();
                line(f, &cells)?;
            }
        }
        Ok(())
    }
}

fn width(text: &str) -> usize {
    text.chars().count()
}

/// Abbreviate a commit id to `abc…xyz`
#[must_use]
pub fn short_commit(commit: &str) -> String {
    if commit.len() <= 8 || !commit.is_ascii() {
        return commit.to_string();
    }
    format!("{}…{}", &commit[..3], &commit[commit.len() - 3..])
}

/// `label` framed by incoming arrows on the left and outgoing on the right
#[must_use]
pub fn arrow_summary(label: &str, predecessors: &[&str], successors: &[&str]) -> String {
    let pred_width = predecessors.iter().map(|p| width(p)).max().unwrap_or(0);
    let rows = predecessors.len().max(successors.len()).max(1);

    let left = |i: usize| -> String {
        let n = predecessors.len();
        if n == 0 {
            return String::new();
        }
        let Some(id) = predecessors.get(i) else {
            return " ".repeat(pred_width + 4);
        };
        let joint = match (n, i) {
            (1, _) => "─➤─",
            (_, 0) => "─┬➤",
            (_, i) if i == n - 1 => "─┘ ",
            _ => "─┤ ",
        };
        format!("{id:<pred_width$} {joint}")
    };
    let right = |i: usize| -> String {
        let n = successors.len();
        let Some(id) = successors.get(i) else {
            return String::new();
        };
        let joint = match (n, i) {
            (1, _) => "─➤─",
            (_, 0) => "➤┬─",
            (_, i) if i == n - 1 => " └─",
            _ => " ├─",
        };
        format!("{joint} {id}")
    };

    let body = format!("[ {label} ]");
    let blank = " ".repeat(width(&body));
    let lines: Vec<String> = (0..rows)
        .map(|i| {
            let middle = if i == 0 { body.as_str() } else { blank.as_str() };
            format!("{}{middle}{}", left(i), right(i)).trim_end().to_string()
        })
        .collect();
    let rule = "─".repeat(lines.iter().map(|l| width(l)).max().unwrap_or(0));
    format!("{rule}\n{}", lines.join("\n"))
}

fn ids<I: AsRef<str>>(set: impl IntoIterator<Item = I>) -> Vec<String> {
    set.into_iter().map(|id| id.as_ref().to_string()).collect()
}

fn as_strs(items: &[String]) -> Vec<&str> {
    items.iter().map(String::as_str).collect()
}

#[must_use]
pub fn file_summary(file: &File) -> String {
    let preds = ids(&file.predecessor_ids);
    let succs = ids(&file.successor_ids);
    arrow_summary(
        &format!("ID: {} PATH: {}", file.id, file.path),
        &as_strs(&preds),
        &as_strs(&succs),
    )
}

#[must_use]
pub fn record_summary(record: &Record, path: &str) -> String {
    let preds = ids(&record.predecessor_ids);
    let succs = ids(&record.successor_ids);
    arrow_summary(
        &format!(
            "ID: {} PATH: {} COMMIT: {}",
            record.id,
            path,
            short_commit(&record.commit_id)
        ),
        &as_strs(&preds),
        &as_strs(&succs),
    )
}

/// Stages joined by arrows, e.g. `a.csv + b.csv ──➤ prep.py`
#[must_use]
pub fn pipeline_summary(pipeline: &Pipeline, stage_paths: &[Vec<String>]) -> String {
    let flow = stage_paths
        .iter()
        .map(|stage| stage.join(" + "))
        .collect::<Vec<_>>()
        .join(" ──➤ ");
    match &pipeline.description {
        Some(description) => format!("ID: {} ┃ {flow} ┃ {description}", pipeline.id),
        None => format!("ID: {} ┃ {flow}", pipeline.id),
    }
}

#[must_use]
pub fn experiment_summary(experiment: &Experiment) -> String {
    format!(
        "ID: {} ┃ PIPELINE: {} ┃ {} ┃ {}",
        experiment.id,
        experiment.pipeline_id,
        experiment.created_at.format("%Y-%m-%d %H:%M:%S"),
        experiment.description
    )
}

#[must_use]
pub fn file_details(files: &[File], records: &[Record]) -> Table {
    let mut table = Table::new(["ID", "PATH", "RECORDS", "PREDECESSORS", "SUCCESSORS"]);
    for file in files {
        let owned = records
            .iter()
            .filter(|r| r.file_id == file.id)
            .map(|r| r.id.to_string())
            .collect::<Vec<_>>();
        table.push([
            file.id.to_string(),
            file.path.clone(),
            owned.join("\n"),
            ids(&file.predecessor_ids).join("\n"),
            ids(&file.successor_ids).join("\n"),
        ]);
    }
    table
}

#[must_use]
pub fn record_details(records: &[Record], paths: &HashMap<FileId, String>) -> Table {
    let mut table = Table::new(["ID", "FILE", "FILE_ID", "COMMIT", "PREDECESSORS", "SUCCESSORS"]);
    for record in records {
        table.push([
            record.id.to_string(),
            paths.get(&record.file_id).cloned().unwrap_or_default(),
            record.file_id.to_string(),
            record.commit_id.clone(),
            ids(&record.predecessor_ids).join("\n"),
            ids(&record.successor_ids).join("\n"),
        ]);
    }
    table
}

#[must_use]
pub fn pipeline_details(
    pipelines: &[(Pipeline, Vec<Vec<String>>)],
    experiments: &[Experiment],
) -> Table {
    let mut table = Table::new(["ID", "DESCRIPTION", "FILES", "EXPERIMENTS"]);
    for (pipeline, stage_paths) in pipelines {
        let runs = experiments
            .iter()
            .filter(|e| e.pipeline_id == pipeline.id)
            .map(|e| e.id.to_string())
            .collect::<Vec<_>>();
        table.push([
            pipeline.id.to_string(),
            pipeline.description.clone().unwrap_or_default(),
            stage_paths
                .iter()
                .map(|stage| stage.join(" + "))
                .collect::<Vec<_>>()
                .join("\n↓\n"),
            runs.join("\n"),
        ]);
    }
    table
}

#[must_use]
pub fn experiment_details(experiments: &[Experiment]) -> Table {
    let mut table = Table::new([
        "ID",
        "DESCRIPTION",
        "PIPELINE",
        "RECORDS",
        "CONFIG",
        "HPARAMS",
        "METRICS",
        "CREATED",
    ]);
    for experiment in experiments {
        table.push([
            experiment.id.to_string(),
            experiment.description.clone(),
            experiment.pipeline_id.to_string(),
            experiment
                .node_id_lists
                .iter()
                .map(|stage| ids(stage).join(" + "))
                .collect::<Vec<_>>()
                .join("\n↓\n"),
            experiment.config.to_string(),
            experiment.hparams.to_string(),
            experiment.metrics.to_string(),
            experiment.created_at.to_rfc3339(),
        ]);
    }
    table
}

/// Neighbours of one node, ids mapped through `names`
#[must_use]
pub fn neighbors(label: &str, neighbors: &Neighbors, names: &HashMap<String, String>) -> String {
    let name = |id: &String| names.get(id).cloned().unwrap_or_else(|| id.clone());
    let preds: Vec<String> = neighbors.predecessors.iter().map(name).collect();
    let succs: Vec<String> = neighbors.successors.iter().map(name).collect();
    arrow_summary(label, &as_strs(&preds), &as_strs(&succs))
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    #[test]
    fn table_aligns_multiline_cells() {
        let mut table = Table::new(["ID", "NAME"]);
        table.push(["1", "alpha\nbeta"]);
        table.push(["22", ""]);
        let text = table.to_string();
        assert_eq!(
            text,
            "ID  NAME\n──  ─────\n1   alpha\n    beta\n22\n"
        );
    }

    #[test]
    fn summary_without_neighbours_is_boxed_label() {
        assert_eq!(arrow_summary("x", &[], &[]), "─────\n[ x ]");
    }

    #[test]
    fn summary_draws_fan_in_and_out() {
        let text = arrow_summary("f", &["a", "b"], &["c"]);
        let lines: Vec<&str> = text.lines().collect();
        assert_eq!(lines[1], "a ─┬➤[ f ]─➤─ c");
        assert_eq!(lines[2], "b ─┘");
        assert_eq!(lines.len(), 3);
    }

    #[test]
    fn short_commit_abbreviates() {
        assert_eq!(short_commit("0123456789abcdef"), "012…def");
        assert_eq!(short_commit("abc"), "abc");
    }
}
