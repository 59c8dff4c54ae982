//! End-to-end tests of the `prov` command tree against a project on disk.

use pretty_assertions::assert_eq;
use prov_cli::{cli, Project, ProvConfig};
use prov_test_utils::assert_symmetric;
use std::path::Path;
use std::process::Command;

fn prov(root: &Path, args: &[&str]) -> anyhow::Result<String> {
    let matches = cli::command()
        .try_get_matches_from(std::iter::once("prov").chain(args.iter().copied()))
        .unwrap();
    let mut out = Vec::new();
    cli::run(root, &matches, &mut out)?;
    Ok(String::from_utf8(out).unwrap())
}

fn project() -> (tempfile::TempDir, Project) {
    let dir = tempfile::tempdir().unwrap();
    let project = Project::init(dir.path(), ProvConfig::default()).unwrap();
    (dir, project)
}

fn git_available() -> bool {
    Command::new("git").arg("--version").output().is_ok()
}

/// Tenet: every command except init and clean needs an initialized project.
#[test]
fn commands_require_init() {
    let dir = tempfile::tempdir().unwrap();
    let err = prov(dir.path(), &["file", "ls"]).unwrap_err();
    assert!(err.to_string().contains("prov init"));
}

/// Tenet: init lays out state, data and experiment directories.
#[test]
fn init_creates_layout() {
    let (dir, project) = project();
    assert!(dir.path().join(".prov/config.yaml").exists());
    assert!(dir.path().join("data").is_dir());
    assert!(dir.path().join("experiments").is_dir());
    assert!(project.database_path().exists());
    assert!(project.log_path().exists());
}

/// Tenet: a pipeline built by one command is visible to the next.
#[test]
fn pipeline_add_persists() {
    let (dir, project) = project();
    let added = prov(
        dir.path(),
        &["pipeline", "add", "a.csv,b.csv", "prep.py", "--description", "prep"],
    )
    .unwrap();
    assert!(added.contains("a.csv + b.csv ──➤ prep.py"));
    assert!(added.contains("prep"));

    let listed = prov(dir.path(), &["pipeline", "ls"]).unwrap();
    assert_eq!(listed.trim(), added.trim());

    let again = prov(dir.path(), &["pipeline", "add", "b.csv,a.csv", "prep.py"]).unwrap();
    assert_eq!(prov(dir.path(), &["pipeline", "ls"]).unwrap().lines().count(), 1);
    assert!(again.contains("prep.py"));

    let store = project.store().unwrap();
    assert_eq!(store.all_files().unwrap().len(), 3);
    assert_symmetric(&store);
}

/// Tenet: a rejected shape leaves the store untouched.
#[test]
fn bad_shape_is_rejected() {
    let (dir, project) = project();
    let err = prov(dir.path(), &["pipeline", "add", "a,b", "c,d"]).unwrap_err();
    assert!(err.to_string().contains("invalid pipeline shape"));
    assert!(project.store().unwrap().all_files().unwrap().is_empty());
}

/// Tenet: deleting a file reports the whole cascade.
#[test]
fn file_del_cascades() {
    let (dir, project) = project();
    prov(dir.path(), &["pipeline", "add", "raw.csv", "clean.py", "out.csv"]).unwrap();

    let report = prov(dir.path(), &["file", "del", "clean.py", "--yes"]).unwrap();
    assert_eq!(
        report.trim(),
        "removed 1 file(s), 0 record(s), 1 pipeline(s), 0 experiment(s)"
    );

    let store = project.store().unwrap();
    assert!(store.all_pipelines().unwrap().is_empty());
    assert_eq!(store.all_files().unwrap().len(), 2);
    assert_symmetric(&store);
    assert_eq!(
        prov(dir.path(), &["graph", "check"]).unwrap().trim(),
        "adjacency is symmetric"
    );
}

/// Tenet: unknown ids surface as "does not exist" and fail the command.
#[test]
fn unknown_entities_are_reported() {
    let (dir, _project) = project();
    let err = prov(dir.path(), &["pipeline", "show", "nosuch"]).unwrap_err();
    assert_eq!(err.to_string(), "pipeline nosuch does not exist");

    let err = prov(dir.path(), &["file", "show", "missing.csv"]).unwrap_err();
    assert_eq!(err.to_string(), "file missing.csv does not exist");
}

/// Tenet: graph paths follows the file graph through every branch.
#[test]
fn graph_paths_lists_branches() {
    let (dir, _project) = project();
    prov(dir.path(), &["pipeline", "add", "raw.csv", "a.py,b.py", "out.csv"]).unwrap();

    let text = prov(dir.path(), &["graph", "paths", "raw.csv", "out.csv"]).unwrap();
    let mut paths: Vec<&str> = text.lines().collect();
    paths.sort_unstable();
    assert_eq!(
        paths,
        vec!["raw.csv ──➤ a.py ──➤ out.csv", "raw.csv ──➤ b.py ──➤ out.csv"]
    );

    let none = prov(dir.path(), &["graph", "paths", "out.csv", "raw.csv"]).unwrap();
    assert_eq!(none.trim(), "no path from out.csv to raw.csv");

    let neighbors = prov(dir.path(), &["graph", "neighbors", "a.py"]).unwrap();
    assert!(neighbors.contains("raw.csv"));
    assert!(neighbors.contains("out.csv"));
}

/// Tenet: clean removes all provenance state and nothing else.
#[test]
fn clean_removes_state() {
    let (dir, _project) = project();
    prov(dir.path(), &["clean", "--yes"]).unwrap();
    assert!(!dir.path().join(".prov").exists());
    assert!(dir.path().join("data").exists());
    assert_eq!(prov(dir.path(), &["clean"]).unwrap().trim(), "nothing to clean");
}

/// Tenet: experiments commit untracked inputs and reuse identical runs.
#[test]
fn experiment_round_trip_through_git() {
    if !git_available() {
        return;
    }
    let dir = tempfile::tempdir().unwrap();
    let root = dir.path();
    prov(root, &["init"]).unwrap();
    for (key, value) in [("user.email", "prov@example.com"), ("user.name", "prov")] {
        Command::new("git")
            .args(["config", key, value])
            .current_dir(root)
            .output()
            .unwrap();
    }
    std::fs::write(root.join("data/raw.csv"), "x,y\n1,2\n").unwrap();
    std::fs::write(root.join("train.py"), "print('fit')\n").unwrap();

    let args = [
        "experiment",
        "add",
        "data/raw.csv",
        "train.py",
        "-d",
        "baseline",
        "--hparams",
        r#"{"lr": 0.1}"#,
    ];
    let first = prov(root, &args).unwrap();
    let second = prov(root, &args).unwrap();
    assert_eq!(first, second);

    let project = Project::open(root).unwrap();
    let store = project.store().unwrap();
    assert_eq!(store.all_experiments().unwrap().len(), 1);
    assert_eq!(store.all_records().unwrap().len(), 2);
    assert_symmetric(&store);

    std::fs::write(root.join("train.py"), "print('fit again')\n").unwrap();
    let watched = prov(root, &["watch", "train.py", "-m", "tweak"]).unwrap();
    assert!(watched.starts_with("commit "));
    assert_eq!(project.store().unwrap().all_records().unwrap().len(), 3);

    let idle = prov(root, &["watch", "train.py"]).unwrap();
    assert!(idle.starts_with("no changes to commit"));
}
