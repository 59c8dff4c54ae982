//! Argument parsing and command dispatch for the `prov` binary
//!
//! Every command writes its report to the given writer; confirmation
//! prompts go to stderr and read stdin.

use crate::config::{ProvConfig, STATE_DIR};
use crate::project::Project;
use crate::render;
use anyhow::{Context, Result, bail};
use clap::{Arg, ArgAction, ArgMatches, Command, value_parser};
use prov_store::{
    ExperimentId, ExperimentRequest, File, FileId, JsonFileEngine, PipelineId, ProvenanceStore,
    RecordId, Removed, StageList, StoreError,
};
use serde_json::Value;
use std::collections::HashMap;
use std::io::{self, BufRead, Write};
use std::path::{Path, PathBuf};

type Store = ProvenanceStore<JsonFileEngine>;

fn yes() -> Arg {
    Arg::new("yes")
        .short('y')
        .long("yes")
        .action(ArgAction::SetTrue)
        .help("Do not ask for confirmation")
}

fn details() -> Arg {
    Arg::new("details")
        .short('d')
        .long("details")
        .action(ArgAction::SetTrue)
        .help("Print a details table instead of summaries")
}

fn target(name: &'static str, help: &'static str) -> Arg {
    Arg::new(name).required(true).help(help)
}

fn stages() -> Arg {
    Arg::new("stages")
        .required(true)
        .num_args(1..)
        .help("Stages in order; files within a stage are comma-separated")
}

fn json(name: &'static str, help: &'static str) -> Arg {
    Arg::new(name).long(name).value_name("JSON").help(help)
}

/// The full command tree
#[must_use]
pub fn command() -> Command {
    Command::new("prov")
        .version(crate::VERSION)
        .about("Track data files, pipelines and experiments across revisions")
        .subcommand_required(true)
        .arg_required_else_help(true)
        .arg(
            Arg::new("root")
                .short('C')
                .long("root")
                .global(true)
                .value_parser(value_parser!(PathBuf))
                .help("Project root (defaults to the current directory)"),
        )
        .arg(
            Arg::new("verbose")
                .short('v')
                .long("verbose")
                .global(true)
                .action(ArgAction::SetTrue)
                .help("Log debug events to stderr"),
        )
        .subcommand(
            Command::new("init")
                .about("Create the project state, directories and git repository")
                .arg(
                    Arg::new("config")
                        .long("config")
                        .value_parser(value_parser!(PathBuf))
                        .help("YAML config to start from"),
                ),
        )
        .subcommand(
            Command::new("clean")
                .about("Remove all provenance state")
                .arg(yes()),
        )
        .subcommand(
            Command::new("watch")
                .about("Commit changed files and register their records")
                .arg(
                    Arg::new("files")
                        .required(true)
                        .num_args(1..)
                        .help("Files to watch"),
                )
                .arg(
                    Arg::new("message")
                        .short('m')
                        .long("message")
                        .help("Commit message"),
                )
                .arg(
                    Arg::new("amend")
                        .short('a')
                        .long("amend")
                        .action(ArgAction::SetTrue)
                        .help("Amend the last commit instead of creating one"),
                ),
        )
        .subcommand(
            Command::new("file")
                .about("Inspect and delete files")
                .subcommand_required(true)
                .subcommand(Command::new("ls").about("List files").arg(details()))
                .subcommand(
                    Command::new("show")
                        .about("Show one file and its records")
                        .arg(target("file", "File id or path")),
                )
                .subcommand(
                    Command::new("del")
                        .about("Delete a file with its records and pipelines")
                        .arg(target("file", "File id or path"))
                        .arg(yes()),
                ),
        )
        .subcommand(
            Command::new("record")
                .about("Inspect and delete records")
                .subcommand_required(true)
                .subcommand(
                    Command::new("ls")
                        .about("List records")
                        .arg(details())
                        .arg(
                            Arg::new("file")
                                .long("file")
                                .help("Only records of this file id or path"),
                        ),
                )
                .subcommand(
                    Command::new("show")
                        .about("Show one record")
                        .arg(target("id", "Record id")),
                )
                .subcommand(
                    Command::new("del")
                        .about("Delete a record and the experiments using it")
                        .arg(target("id", "Record id"))
                        .arg(yes()),
                ),
        )
        .subcommand(
            Command::new("pipeline")
                .about("Build, inspect and delete pipelines")
                .subcommand_required(true)
                .subcommand(
                    Command::new("add")
                        .about("Build a pipeline, reusing an identical one")
                        .arg(stages())
                        .arg(
                            Arg::new("description")
                                .long("description")
                                .help("Free-text description"),
                        ),
                )
                .subcommand(Command::new("ls").about("List pipelines").arg(details()))
                .subcommand(
                    Command::new("show")
                        .about("Show one pipeline and its experiments")
                        .arg(target("id", "Pipeline id")),
                )
                .subcommand(
                    Command::new("del")
                        .about("Delete a pipeline and its experiments")
                        .arg(target("id", "Pipeline id"))
                        .arg(yes()),
                ),
        )
        .subcommand(
            Command::new("experiment")
                .about("Record, inspect and delete experiments")
                .subcommand_required(true)
                .subcommand(
                    Command::new("add")
                        .about("Record an experiment over the current file revisions")
                        .arg(stages())
                        .arg(
                            Arg::new("description")
                                .short('d')
                                .long("description")
                                .required(true)
                                .help("What the run was for; also the commit message"),
                        )
                        .arg(json("config", "Run configuration"))
                        .arg(json("hparams", "Hyperparameters"))
                        .arg(json("metrics", "Resulting metrics")),
                )
                .subcommand(
                    Command::new("ls")
                        .about("List experiments")
                        .arg(details())
                        .arg(
                            Arg::new("pipeline")
                                .long("pipeline")
                                .help("Only experiments of this pipeline id"),
                        ),
                )
                .subcommand(
                    Command::new("show")
                        .about("Show one experiment")
                        .arg(target("id", "Experiment id")),
                )
                .subcommand(
                    Command::new("del")
                        .about("Delete an experiment")
                        .arg(target("id", "Experiment id"))
                        .arg(yes()),
                ),
        )
        .subcommand(
            Command::new("graph")
                .about("Query the file graph")
                .subcommand_required(true)
                .subcommand(
                    Command::new("paths")
                        .about("Every path of files leading from one file to another")
                        .arg(target("from", "Upstream file path"))
                        .arg(target("to", "Downstream file path")),
                )
                .subcommand(
                    Command::new("neighbors")
                        .about("Direct predecessors and successors of a file")
                        .arg(target("file", "File id or path")),
                )
                .subcommand(
                    Command::new("check").about("Report edges whose mirror half is missing"),
                ),
        )
}

/// Project root from `--root`, made absolute
///
/// # Errors
/// Returns error if the current directory cannot be read
pub fn project_root(matches: &ArgMatches) -> Result<PathBuf> {
    let cwd = std::env::current_dir().context("cannot read the current directory")?;
    Ok(match matches.get_one::<PathBuf>("root") {
        Some(root) if root.is_absolute() => root.clone(),
        Some(root) => cwd.join(root),
        None => cwd,
    })
}

/// Run the parsed command against the project at `root`
///
/// # Errors
/// Any failure of the command; nothing is written to the store on error
pub fn run(root: &Path, matches: &ArgMatches, out: &mut dyn Write) -> Result<()> {
    match matches.subcommand() {
        Some(("init", m)) => init(root, m, out),
        Some(("clean", m)) => clean(root, m, out),
        Some((name, m)) => {
            let project = Project::open(root)?;
            let mut store = project.store()?;
            match name {
                "watch" => watch(&project, &mut store, m, out),
                "file" => file(&mut store, m, out),
                "record" => record(&mut store, m, out),
                "pipeline" => pipeline(&mut store, m, out),
                "experiment" => experiment(&project, &mut store, m, out),
                "graph" => graph(&store, m, out),
                other => bail!("unknown command `{other}`"),
            }
        }
        None => bail!("no command given"),
    }
}

fn init(root: &Path, m: &ArgMatches, out: &mut dyn Write) -> Result<()> {
    if ProvConfig::path_in(root).exists() {
        bail!(
            "{} is already a provenance project; run `prov clean` to start over",
            root.display()
        );
    }
    let config = match m.get_one::<PathBuf>("config") {
        Some(path) => ProvConfig::from_file(path)?,
        None => ProvConfig::default(),
    };
    let project = Project::init(root, config)?;
    project.revisions().init_repository(STATE_DIR)?;
    writeln!(out, "initialized provenance project in {}", root.display())?;
    Ok(())
}

fn clean(root: &Path, m: &ArgMatches, out: &mut dyn Write) -> Result<()> {
    let dir = root.join(STATE_DIR);
    if !dir.exists() {
        writeln!(out, "nothing to clean")?;
        return Ok(());
    }
    if !confirm(m, &format!("remove {} and all provenance data?", dir.display()))? {
        writeln!(out, "aborted")?;
        return Ok(());
    }
    Project::clean(root)?;
    writeln!(out, "removed {}", dir.display())?;
    Ok(())
}

fn watch(project: &Project, store: &mut Store, m: &ArgMatches, out: &mut dyn Write) -> Result<()> {
    let paths: Vec<String> = m
        .get_many::<String>("files")
        .into_iter()
        .flatten()
        .cloned()
        .collect();
    let message = m.get_one::<String>("message").map(String::as_str);
    let mut revisions = project.revisions();
    let outcome = store.watch(&mut revisions, &paths, message, m.get_flag("amend"))?;

    match &outcome.commit_id {
        Some(commit) => writeln!(out, "commit {}", render::short_commit(commit))?,
        None => writeln!(out, "no changes to commit")?,
    }
    for record in &outcome.records {
        let file = store.get_file(&record.file_id)?;
        writeln!(out, "{}", render::record_summary(record, &file.path))?;
    }
    Ok(())
}

fn file(store: &mut Store, m: &ArgMatches, out: &mut dyn Write) -> Result<()> {
    match m.subcommand() {
        Some(("ls", m)) => {
            let files = store.all_files()?;
            if m.get_flag("details") {
                let records = store.all_records()?;
                write!(out, "{}", render::file_details(&files, &records))?;
            } else {
                for file in &files {
                    writeln!(out, "{}", render::file_summary(file))?;
                }
            }
        }
        Some(("show", m)) => {
            let file = lookup_file(store, arg(m, "file")?)?;
            let records = store.records_of_file(&file.id)?;
            writeln!(out, "{}", render::file_summary(&file))?;
            write!(out, "{}", render::file_details(std::slice::from_ref(&file), &records))?;
        }
        Some(("del", m)) => {
            let file = lookup_file(store, arg(m, "file")?)?;
            let question = format!(
                "delete {} with its records, pipelines and experiments?",
                file.path
            );
            if confirm(m, &question)? {
                let removed = store.delete_file(&file.id)?;
                report(out, &removed)?;
            } else {
                writeln!(out, "aborted")?;
            }
        }
        _ => bail!("unknown file command"),
    }
    Ok(())
}

fn record(store: &mut Store, m: &ArgMatches, out: &mut dyn Write) -> Result<()> {
    match m.subcommand() {
        Some(("ls", m)) => {
            let records = match m.get_one::<String>("file") {
                Some(key) => {
                    let file = lookup_file(store, key)?;
                    store.records_of_file(&file.id)?
                }
                None => store.all_records()?,
            };
            let paths = file_paths(store)?;
            if m.get_flag("details") {
                write!(out, "{}", render::record_details(&records, &paths))?;
            } else {
                for record in &records {
                    let path = paths.get(&record.file_id).map_or("", String::as_str);
                    writeln!(out, "{}", render::record_summary(record, path))?;
                }
            }
        }
        Some(("show", m)) => {
            let record = store.get_record(&RecordId::from(arg(m, "id")?))?;
            let paths = file_paths(store)?;
            let path = paths.get(&record.file_id).map_or("", String::as_str);
            writeln!(out, "{}", render::record_summary(&record, path))?;
            write!(out, "{}", render::record_details(std::slice::from_ref(&record), &paths))?;
        }
        Some(("del", m)) => {
            let record = store.get_record(&RecordId::from(arg(m, "id")?))?;
            if confirm(m, &format!("delete record {} and its experiments?", record.id))? {
                let removed = store.delete_record(&record.id)?;
                report(out, &removed)?;
            } else {
                writeln!(out, "aborted")?;
            }
        }
        _ => bail!("unknown record command"),
    }
    Ok(())
}

fn pipeline(store: &mut Store, m: &ArgMatches, out: &mut dyn Write) -> Result<()> {
    match m.subcommand() {
        Some(("add", m)) => {
            let stages = stage_list(m)?;
            let description = m.get_one::<String>("description").map(String::as_str);
            let pipeline = store.build_pipeline(&stages, description)?;
            let paths = store.pipeline_paths(&pipeline)?;
            writeln!(out, "{}", render::pipeline_summary(&pipeline, &paths))?;
        }
        Some(("ls", m)) => {
            let pipelines = store.all_pipelines()?;
            let mut rows = Vec::with_capacity(pipelines.len());
            for pipeline in pipelines {
                let paths = store.pipeline_paths(&pipeline)?;
                rows.push((pipeline, paths));
            }
            if m.get_flag("details") {
                let experiments = store.all_experiments()?;
                write!(out, "{}", render::pipeline_details(&rows, &experiments))?;
            } else {
                for (pipeline, paths) in &rows {
                    writeln!(out, "{}", render::pipeline_summary(pipeline, paths))?;
                }
            }
        }
        Some(("show", m)) => {
            let pipeline = store.get_pipeline(&PipelineId::from(arg(m, "id")?))?;
            let paths = store.pipeline_paths(&pipeline)?;
            let experiments = store.experiments_of_pipeline(&pipeline.id)?;
            write!(out, "{}", render::pipeline_details(&[(pipeline, paths)], &experiments))?;
        }
        Some(("del", m)) => {
            let pipeline = store.get_pipeline(&PipelineId::from(arg(m, "id")?))?;
            if confirm(m, &format!("delete pipeline {} and its experiments?", pipeline.id))? {
                let removed = store.delete_pipeline(&pipeline.id)?;
                report(out, &removed)?;
            } else {
                writeln!(out, "aborted")?;
            }
        }
        _ => bail!("unknown pipeline command"),
    }
    Ok(())
}

fn experiment(
    project: &Project,
    store: &mut Store,
    m: &ArgMatches,
    out: &mut dyn Write,
) -> Result<()> {
    match m.subcommand() {
        Some(("add", m)) => {
            let mut request = ExperimentRequest::new(stage_list(m)?)
                .with_description(arg(m, "description")?);
            if let Some(config) = json_arg(m, "config")? {
                request = request.with_config(config);
            }
            if let Some(hparams) = json_arg(m, "hparams")? {
                request = request.with_hparams(hparams);
            }
            if let Some(metrics) = json_arg(m, "metrics")? {
                request = request.with_metrics(metrics);
            }
            let mut revisions = project.revisions();
            let experiment = store.record_experiment(&mut revisions, request)?;
            writeln!(out, "{}", render::experiment_summary(&experiment))?;
        }
        Some(("ls", m)) => {
            let experiments = match m.get_one::<String>("pipeline") {
                Some(id) => {
                    let pipeline = store.get_pipeline(&PipelineId::from(id.as_str()))?;
                    store.experiments_of_pipeline(&pipeline.id)?
                }
                None => store.all_experiments()?,
            };
            if m.get_flag("details") {
                write!(out, "{}", render::experiment_details(&experiments))?;
            } else {
                for experiment in &experiments {
                    writeln!(out, "{}", render::experiment_summary(experiment))?;
                }
            }
        }
        Some(("show", m)) => {
            let experiment = store.get_experiment(&ExperimentId::from(arg(m, "id")?))?;
            write!(
                out,
                "{}",
                render::experiment_details(std::slice::from_ref(&experiment))
            )?;
        }
        Some(("del", m)) => {
            let experiment = store.get_experiment(&ExperimentId::from(arg(m, "id")?))?;
            if confirm(m, &format!("delete experiment {}?", experiment.id))? {
                let removed = store.delete_experiment(&experiment.id)?;
                report(out, &removed)?;
            } else {
                writeln!(out, "aborted")?;
            }
        }
        _ => bail!("unknown experiment command"),
    }
    Ok(())
}

fn graph(store: &Store, m: &ArgMatches, out: &mut dyn Write) -> Result<()> {
    match m.subcommand() {
        Some(("paths", m)) => {
            let (from, to) = (arg(m, "from")?, arg(m, "to")?);
            let paths = store.downstream_paths(from, to)?;
            if paths.is_empty() {
                writeln!(out, "no path from {from} to {to}")?;
            }
            for path in &paths {
                writeln!(out, "{}", path.join(" ──➤ "))?;
            }
        }
        Some(("neighbors", m)) => {
            let file = lookup_file(store, arg(m, "file")?)?;
            let graph = store.file_graph()?;
            let neighbors = graph.neighbors(file.id.as_str())?;
            let names: HashMap<String, String> = store
                .all_files()?
                .into_iter()
                .map(|f| (f.id.to_string(), f.path))
                .collect();
            writeln!(out, "{}", render::neighbors(&file.path, &neighbors, &names))?;
        }
        Some(("check", _)) => {
            let found = store.check_symmetry()?;
            if found.is_empty() {
                writeln!(out, "adjacency is symmetric")?;
                return Ok(());
            }
            for asymmetry in &found {
                writeln!(
                    out,
                    "{} {} -> {} has no mirror",
                    asymmetry.kind, asymmetry.predecessor, asymmetry.successor
                )?;
            }
            bail!("{} asymmetric edge(s)", found.len());
        }
        _ => bail!("unknown graph command"),
    }
    Ok(())
}

fn arg<'a>(m: &'a ArgMatches, name: &str) -> Result<&'a str> {
    m.get_one::<String>(name)
        .map(String::as_str)
        .with_context(|| format!("missing argument <{name}>"))
}

fn json_arg(m: &ArgMatches, name: &str) -> Result<Option<Value>> {
    m.get_one::<String>(name)
        .map(|text| {
            serde_json::from_str(text).with_context(|| format!("--{name} is not valid JSON"))
        })
        .transpose()
}

/// Positional stages, each a comma-separated list of paths
fn stage_list(m: &ArgMatches) -> Result<StageList> {
    let stages: Vec<Vec<String>> = m
        .get_many::<String>("stages")
        .into_iter()
        .flatten()
        .map(|stage| {
            stage
                .split(',')
                .map(str::trim)
                .filter(|path| !path.is_empty())
                .map(String::from)
                .collect()
        })
        .collect();
    Ok(StageList::from_paths(stages)?)
}

/// A File by id, falling back to its path
fn lookup_file(store: &Store, key: &str) -> Result<File> {
    match store.get_file(&FileId::from(key)) {
        Ok(file) => Ok(file),
        Err(e) if e.is_not_found() => Ok(store.file_by_path(key)?),
        Err(e) => Err(e.into()),
    }
}

fn file_paths(store: &Store) -> Result<HashMap<FileId, String>, StoreError> {
    Ok(store
        .all_files()?
        .into_iter()
        .map(|f| (f.id, f.path))
        .collect())
}

fn report(out: &mut dyn Write, removed: &Removed) -> Result<()> {
    writeln!(
        out,
        "removed {} file(s), {} record(s), {} pipeline(s), {} experiment(s)",
        removed.files, removed.records, removed.pipelines, removed.experiments
    )?;
    Ok(())
}

fn confirm(m: &ArgMatches, question: &str) -> Result<bool> {
    if m.get_flag("yes") {
        return Ok(true);
    }
    let mut stderr = io::stderr();
    write!(stderr, "{question} [y/N] ")?;
    stderr.flush()?;
    let mut answer = String::new();
    io::stdin().lock().read_line(&mut answer)?;
    Ok(matches!(answer.trim().to_ascii_lowercase().as_str(), "y" | "yes"))
}
