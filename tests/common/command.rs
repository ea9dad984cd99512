use crate::common::file::{FileSpec, write_file};
use crate::common::{AUTHOR_EMAIL, AUTHOR_NAME, set_author_env};
use assert_cmd::Command;
use assert_fs::TempDir;
use gitpie::areas::repository::Repository;
use gitpie::artifacts::objects::object_id::ObjectId;
use rstest::fixture;
use std::path::{Path, PathBuf};

#[fixture]
pub fn repository_dir() -> TempDir {
    TempDir::new().expect("Failed to create temp dir")
}

/// An initialized repository driven through the library
pub struct TestRepository {
    pub dir: TempDir,
    pub repository: Repository,
}

impl TestRepository {
    pub fn path(&self) -> &Path {
        self.repository.path()
    }

    pub fn write(&self, path: &str, content: &str) {
        write_file(FileSpec::new(self.path().join(path), content.to_string()));
    }

    pub async fn add(&self, paths: &[&str]) -> anyhow::Result<()> {
        let paths = paths.iter().map(PathBuf::from).collect::<Vec<_>>();
        self.repository.add(&paths).await
    }

    pub async fn commit(&self, message: &str) -> ObjectId {
        set_author_env();
        self.repository
            .commit(message, false)
            .await
            .expect("Failed to commit")
            .oid
    }

    /// Write, stage and commit files in one step
    pub async fn commit_files(&self, files: &[(&str, &str)], message: &str) -> ObjectId {
        for (path, content) in files {
            self.write(path, content);
        }
        self.add(&["."]).await.expect("Failed to add files");
        self.commit(message).await
    }
}

#[fixture]
pub async fn repository() -> TestRepository {
    let dir = TempDir::new().expect("Failed to create temp dir");
    let repository = Repository::new(dir.path()).expect("Failed to open repository");
    repository.init().await.expect("Failed to init repository");

    TestRepository { dir, repository }
}

/// Repository with one commit holding `1.txt`, `a/2.txt` and `a/b/3.txt`
#[fixture]
pub async fn committed_repository(#[future] repository: TestRepository) -> TestRepository {
    let repository = repository.await;
    repository
        .commit_files(
            &[("1.txt", "one"), ("a/2.txt", "two"), ("a/b/3.txt", "three")],
            "Initial commit",
        )
        .await;

    repository
}

#[fixture]
pub fn init_repository_dir(repository_dir: TempDir) -> TempDir {
    run_gitpie_command(repository_dir.path(), &["init"])
        .assert()
        .success();

    write_file(FileSpec::new(repository_dir.path().join("1.txt"), "one".to_string()));
    write_file(FileSpec::new(
        repository_dir.path().join("a").join("2.txt"),
        "two".to_string(),
    ));
    write_file(FileSpec::new(
        repository_dir.path().join("a").join("b").join("3.txt"),
        "three".to_string(),
    ));

    run_gitpie_command(repository_dir.path(), &["add", "."])
        .assert()
        .success();
    gitpie_commit(repository_dir.path(), "Initial commit")
        .assert()
        .success();

    repository_dir
}

pub fn run_gitpie_command(dir: &Path, args: &[&str]) -> Command {
    let mut cmd = Command::cargo_bin("gitpie").expect("Failed to find gitpie binary");
    cmd.current_dir(dir);
    cmd.env_remove("RUST_LOG");
    for arg in args {
        cmd.arg(arg);
    }
    cmd
}

pub fn gitpie_commit(dir: &Path, message: &str) -> Command {
    let mut cmd = run_gitpie_command(dir, &["commit", "-m", message]);
    cmd.envs(vec![
        ("GIT_AUTHOR_NAME", AUTHOR_NAME),
        ("GIT_AUTHOR_EMAIL", AUTHOR_EMAIL),
        ("GIT_AUTHOR_DATE", "2023-01-01 12:00:00 +0000"), // %Y-%m-%d %H:%M:%S %z
    ]);
    cmd.env_remove("GIT_COMMITTER_NAME");
    cmd
}

/// Hash HEAD resolves to, read straight from the ref files
pub fn head_commit_sha(dir: &Path) -> Result<String, Box<dyn std::error::Error>> {
    let git_dir = dir.join(".gitpie");
    let head_content = std::fs::read_to_string(git_dir.join("HEAD"))?;

    if let Some(ref_path) = head_content.strip_prefix("ref: ") {
        let commit_sha = std::fs::read_to_string(git_dir.join(ref_path.trim()))?;
        Ok(commit_sha.trim().to_string())
    } else {
        Ok(head_content.trim().to_string())
    }
}

pub fn stdout_of(cmd: &mut Command) -> Result<String, Box<dyn std::error::Error>> {
    let output = cmd.assert().success();
    Ok(String::from_utf8(output.get_output().stdout.clone())?)
}
