use anyhow::{Context, Result};
use bytes::Bytes;
use clap::{Parser, Subcommand, ValueEnum};
use colored::Colorize;
use gitpie::areas::repository::Repository;
use gitpie::artifacts::objects::object_type::ObjectType;
use gitpie::artifacts::status::status_info::{ChangeSet, StatusInfo};
use gitpie::commands::plumbing::cat_file::CatFileMode;
use gitpie::commands::porcelain::log::{format_medium, format_oneline};
use std::io::Write;
use std::path::{Path, PathBuf};
use std::process::ExitCode;
use tracing_subscriber::EnvFilter;

#[derive(Parser)]
#[command(
    name = "gitpie",
    version = "0.1.0",
    about = "A minimal content-addressed version-control engine",
    long_about = "Tracks snapshots of a directory tree in a local object store \
    kept under .gitpie, with a staging index, branches, tags and checkout.",
    help_template = r"
{name} {version} - {about}

USAGE:
    {usage}

OPTIONS:
    {all-args}
",
)]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    #[command(
        name = "init",
        about = "Initialize a new repository",
        long_about = "Creates .gitpie in the current directory or at the specified path."
    )]
    Init {
        #[arg(index = 1, help = "The path to the repository")]
        path: Option<PathBuf>,
    },
    #[command(
        name = "hash-object",
        about = "Compute an object ID and optionally write the object to the store"
    )]
    HashObject {
        #[arg(short = 't', long = "type", value_enum, default_value_t = ObjectKind::Blob)]
        object_type: ObjectKind,
        #[arg(short, long, help = "Write the object to the object store")]
        write: bool,
        #[arg(index = 1)]
        file: PathBuf,
    },
    #[command(
        name = "cat-file",
        about = "Print an object's payload, size, type or pretty form",
        long_about = "Prints an object named by its hash or an unambiguous prefix of it. \
        With a type mode the object must be of that type."
    )]
    CatFile {
        #[arg(index = 1, value_enum)]
        mode: CatFileArg,
        #[arg(index = 2)]
        object: String,
    },
    #[command(name = "ls-files", about = "List the paths in the index")]
    LsFiles {
        #[arg(short, long, help = "Show mode, hash and stage for every entry")]
        stage: bool,
    },
    #[command(name = "ls-tree", about = "List the contents of a tree")]
    LsTree {
        #[arg(short, help = "Recurse into subtrees")]
        recursive: bool,
        #[arg(index = 1)]
        target: String,
    },
    #[command(name = "add", about = "Stage files for the next commit")]
    Add {
        #[arg(required = true)]
        paths: Vec<PathBuf>,
    },
    #[command(name = "rm", about = "Remove files from the index")]
    Rm {
        #[arg(long, help = "Only unstage, keeping the working tree files")]
        cached: bool,
        #[arg(required = true)]
        paths: Vec<PathBuf>,
    },
    #[command(name = "commit", about = "Record the index as a new commit")]
    Commit {
        #[arg(short, long, help = "The commit message")]
        message: String,
        #[arg(long, help = "Allow a commit with the same tree as its parent")]
        allow_empty: bool,
    },
    #[command(name = "status", about = "Show the working tree status")]
    Status {
        #[arg(long, help = "Machine-readable output")]
        porcelain: bool,
    },
    #[command(name = "log", about = "Show commit history")]
    Log {
        #[arg(long, help = "One line per commit")]
        oneline: bool,
        #[arg(index = 1)]
        revision: Option<String>,
    },
    #[command(name = "branch", about = "List, create or delete branches")]
    Branch {
        #[arg(short, long, help = "Delete the branch")]
        delete: bool,
        #[arg(index = 1)]
        name: Option<String>,
        #[arg(index = 2)]
        start: Option<String>,
    },
    #[command(name = "tag", about = "List or create lightweight tags")]
    Tag {
        #[arg(index = 1)]
        name: Option<String>,
        #[arg(index = 2)]
        target: Option<String>,
    },
    #[command(name = "checkout", about = "Check out a branch or commit")]
    Checkout {
        #[arg(short, long, help = "Overwrite local changes")]
        force: bool,
        #[arg(index = 1)]
        target: String,
    },
    #[command(name = "switch", about = "Switch to a branch")]
    Switch {
        #[arg(short, long, help = "Create the branch at HEAD first")]
        create: bool,
        #[arg(index = 1)]
        branch: String,
    },
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
enum ObjectKind {
    Blob,
    Tree,
    Commit,
}

impl From<ObjectKind> for ObjectType {
    fn from(kind: ObjectKind) -> Self {
        match kind {
            ObjectKind::Blob => ObjectType::Blob,
            ObjectKind::Tree => ObjectType::Tree,
            ObjectKind::Commit => ObjectType::Commit,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
enum CatFileArg {
    Blob,
    Tree,
    Commit,
    Size,
    Type,
    Pretty,
}

impl From<CatFileArg> for CatFileMode {
    fn from(arg: CatFileArg) -> Self {
        match arg {
            CatFileArg::Blob => CatFileMode::Typed(ObjectType::Blob),
            CatFileArg::Tree => CatFileMode::Typed(ObjectType::Tree),
            CatFileArg::Commit => CatFileMode::Typed(ObjectType::Commit),
            CatFileArg::Size => CatFileMode::Size,
            CatFileArg::Type => CatFileMode::Type,
            CatFileArg::Pretty => CatFileMode::Pretty,
        }
    }
}

#[tokio::main]
async fn main() -> ExitCode {
    tracing_subscriber::fmt()
        .with_writer(std::io::stderr)
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("warn")),
        )
        .init();

    let cli = Cli::parse();

    match run(cli.command).await {
        Ok(()) => ExitCode::SUCCESS,
        Err(error) => {
            eprintln!("fatal: {error:#}");
            ExitCode::FAILURE
        }
    }
}

async fn run(command: Commands) -> Result<()> {
    let pwd = std::env::current_dir()?.canonicalize()?;

    match command {
        Commands::Init { path } => {
            let root = match path {
                Some(path) => pwd.join(path),
                None => pwd,
            };
            let repository = Repository::new(&root)?;
            repository.init().await?;

            println!(
                "Initialized empty gitpie repository in {}",
                repository.git_path().display()
            );
        }
        Commands::HashObject {
            object_type,
            write,
            file,
        } => {
            let repository = Repository::discover(&pwd)?;
            let data = std::fs::read(pwd.join(&file))
                .with_context(|| format!("unable to read {}", file.display()))?;
            let oid = repository.hash_object(Bytes::from(data), object_type.into(), write)?;

            println!("{oid}");
        }
        Commands::CatFile { mode, object } => {
            let repository = Repository::discover(&pwd)?;
            let output = repository.cat_file(mode.into(), &object)?;

            let mut stdout = std::io::stdout().lock();
            stdout.write_all(&output)?;
            stdout.flush()?;
        }
        Commands::LsFiles { stage } => {
            let repository = Repository::discover(&pwd)?;

            for entry in repository.ls_files().await? {
                if stage {
                    println!(
                        "{} {} {}\t{}",
                        entry.mode().as_str(),
                        entry.oid,
                        entry.stage(),
                        entry.name.display()
                    );
                } else {
                    println!("{}", entry.name.display());
                }
            }
        }
        Commands::LsTree { recursive, target } => {
            let repository = Repository::discover(&pwd)?;

            for (path, entry) in repository.ls_tree(&target, recursive)? {
                println!(
                    "{:0>6} {} {}\t{}",
                    entry.mode.as_str(),
                    entry.object_type(),
                    entry.oid,
                    path.display()
                );
            }
        }
        Commands::Add { paths } => {
            let repository = Repository::discover(&pwd)?;
            let paths = relative_paths(&repository, &pwd, &paths)?;

            repository.add(&paths).await?;
        }
        Commands::Rm { cached, paths } => {
            if !cached {
                anyhow::bail!("only 'rm --cached' is supported");
            }
            let repository = Repository::discover(&pwd)?;
            let paths = relative_paths(&repository, &pwd, &paths)?;

            repository.rm_cached(&paths).await?;
        }
        Commands::Commit {
            message,
            allow_empty,
        } => {
            let repository = Repository::discover(&pwd)?;
            let outcome = repository.commit(&message, allow_empty).await?;

            println!("{outcome}");
        }
        Commands::Status { porcelain } => {
            let repository = Repository::discover(&pwd)?;
            let status = repository.status().await?;

            if porcelain {
                for line in status.porcelain_lines() {
                    println!("{line}");
                }
            } else {
                print_long_status(&repository, &status)?;
            }
        }
        Commands::Log { oneline, revision } => {
            let repository = Repository::discover(&pwd)?;
            let history = repository.log(revision.as_deref())?;

            for (position, (oid, commit)) in history.iter().enumerate() {
                if oneline {
                    println!("{}", format_oneline(oid, commit));
                } else {
                    if position > 0 {
                        println!();
                    }
                    println!("{}", format_medium(oid, commit));
                }
            }
        }
        Commands::Branch {
            delete,
            name,
            start,
        } => {
            let repository = Repository::discover(&pwd)?;

            match (delete, name) {
                (true, Some(name)) => {
                    let oid = repository.delete_branch(&name)?;
                    println!("Deleted branch {name} (was {}).", oid.to_short_oid());
                }
                (true, None) => anyhow::bail!("branch name required"),
                (false, Some(name)) => {
                    repository.create_branch(&name, start.as_deref())?;
                }
                (false, None) => {
                    for branch in repository.branches()? {
                        if branch.is_current {
                            println!("* {}", branch.name.short_name().green());
                        } else {
                            println!("  {}", branch.name.short_name());
                        }
                    }
                }
            }
        }
        Commands::Tag { name, target } => {
            let repository = Repository::discover(&pwd)?;

            match name {
                Some(name) => {
                    repository.create_tag(&name, target.as_deref())?;
                }
                None => {
                    for tag in repository.tags()? {
                        println!("{}", tag.short_name());
                    }
                }
            }
        }
        Commands::Checkout { force, target } => {
            let repository = Repository::discover(&pwd)?;
            let outcome = repository.checkout(&target, force).await?;

            for line in outcome.report() {
                eprintln!("{line}");
            }
        }
        Commands::Switch { create, branch } => {
            let repository = Repository::discover(&pwd)?;
            let outcome = repository.switch(&branch, create).await?;

            for line in outcome.report() {
                eprintln!("{line}");
            }
        }
    }

    Ok(())
}

/// Resolve command-line paths against the working directory, then make them
/// relative to the repository root
fn relative_paths(repository: &Repository, pwd: &Path, paths: &[PathBuf]) -> Result<Vec<PathBuf>> {
    paths
        .iter()
        .map(|path| repository.workspace().relative_path(&pwd.join(path)))
        .collect()
}

fn print_long_status(repository: &Repository, status: &StatusInfo) -> Result<()> {
    match repository.refs().current_branch()? {
        Some(branch) => println!("On branch {branch}"),
        None => println!("HEAD detached"),
    }

    print_changeset("Changes to be committed:", &status.index_changeset());
    print_changeset("Changes not staged for commit:", &status.workspace_changeset());

    if !status.untracked_files().is_empty() {
        println!("\nUntracked files:");
        for path in status.untracked_files() {
            println!("{:>8}{}", "", path.display().to_string().red());
        }
    }

    if status.is_clean() && status.untracked_files().is_empty() {
        println!("nothing to commit, working tree clean");
    }

    Ok(())
}

fn print_changeset(title: &str, changeset: &ChangeSet) {
    if changeset.is_empty() {
        return;
    }

    println!("\n{title}");
    for (path, change) in changeset {
        println!("{change}{}", path.display());
    }
}
