use crate::common::command::{
    gitpie_commit, head_commit_sha, init_repository_dir, repository_dir, run_gitpie_command,
    stdout_of,
};
use crate::common::file::{FileSpec, write_file};
use assert_fs::TempDir;
use assert_fs::prelude::*;
use predicates::prelude::predicate;
use pretty_assertions::assert_eq;
use rstest::rstest;

mod common;

const ROOT_COMMIT: &str = "03e425922bd673c1d3e73f7813110752682b0505";
const ROOT_TREE: &str = "88484bd9e7919fa9b7dfeb008fb8f6c85743d171";

#[rstest]
fn first_commit_reports_the_root_commit(
    repository_dir: TempDir,
) -> Result<(), Box<dyn std::error::Error>> {
    run_gitpie_command(repository_dir.path(), &["init"])
        .assert()
        .success();
    repository_dir.child("1.txt").write_str("one")?;
    repository_dir.child("a/2.txt").write_str("two")?;
    repository_dir.child("a/b/3.txt").write_str("three")?;
    run_gitpie_command(repository_dir.path(), &["add", "1.txt", "a"])
        .assert()
        .success();

    gitpie_commit(repository_dir.path(), "Initial commit")
        .assert()
        .success()
        .stdout("[master (root-commit) 03e4259] Initial commit\n");

    assert_eq!(head_commit_sha(repository_dir.path())?, ROOT_COMMIT);
    repository_dir
        .child(".gitpie/refs/heads/master")
        .assert(format!("{ROOT_COMMIT}\n"));

    Ok(())
}

#[rstest]
fn second_commit_is_not_a_root_commit(
    init_repository_dir: TempDir,
) -> Result<(), Box<dyn std::error::Error>> {
    let repository_dir = init_repository_dir;
    write_file(FileSpec::new(
        repository_dir.path().join("1.txt"),
        "uno".to_string(),
    ));
    run_gitpie_command(repository_dir.path(), &["add", "1.txt"])
        .assert()
        .success();

    let output = stdout_of(&mut gitpie_commit(repository_dir.path(), "Second commit"))?;

    let head = head_commit_sha(repository_dir.path())?;
    assert_eq!(output, format!("[master {}] Second commit\n", &head[..7]));
    run_gitpie_command(repository_dir.path(), &["cat-file", "commit", &head])
        .assert()
        .success()
        .stdout(predicate::str::contains(format!("parent {ROOT_COMMIT}\n")));

    Ok(())
}

#[rstest]
fn commit_without_changes_fails(init_repository_dir: TempDir) {
    gitpie_commit(init_repository_dir.path(), "Nothing changed")
        .assert()
        .failure()
        .stderr(predicate::str::starts_with("fatal: nothing to commit"));
}

#[rstest]
fn ls_files_shows_staged_entries(init_repository_dir: TempDir) {
    run_gitpie_command(init_repository_dir.path(), &["ls-files"])
        .assert()
        .success()
        .stdout("1.txt\na/2.txt\na/b/3.txt\n");

    run_gitpie_command(init_repository_dir.path(), &["ls-files", "-s"])
        .assert()
        .success()
        .stdout(
            "100644 43dd47ea691c90a5fa7827892c70241913351963 0\t1.txt\n\
             100644 64c5e5885a4b06010b3a0c20edb7900dd0311025 0\ta/2.txt\n\
             100644 1d19714ffbc272ba0da6eb419d66123c20527174 0\ta/b/3.txt\n",
        );
}

#[rstest]
fn ls_tree_lists_top_level_and_recursive_entries(init_repository_dir: TempDir) {
    run_gitpie_command(init_repository_dir.path(), &["ls-tree", "HEAD"])
        .assert()
        .success()
        .stdout(
            "100644 blob 43dd47ea691c90a5fa7827892c70241913351963\t1.txt\n\
             040000 tree 202bc192d34beb85d0301ec8c8940cd0252cc48a\ta\n",
        );

    run_gitpie_command(init_repository_dir.path(), &["ls-tree", "-r", ROOT_TREE])
        .assert()
        .success()
        .stdout(
            "100644 blob 43dd47ea691c90a5fa7827892c70241913351963\t1.txt\n\
             100644 blob 64c5e5885a4b06010b3a0c20edb7900dd0311025\ta/2.txt\n\
             100644 blob 1d19714ffbc272ba0da6eb419d66123c20527174\ta/b/3.txt\n",
        );
}

#[rstest]
fn add_from_a_subdirectory_uses_repository_paths(
    init_repository_dir: TempDir,
) -> Result<(), Box<dyn std::error::Error>> {
    let repository_dir = init_repository_dir;
    repository_dir.child("a/b/4.txt").write_str("four")?;

    run_gitpie_command(&repository_dir.path().join("a"), &["add", "b/4.txt"])
        .assert()
        .success();

    let listing = stdout_of(&mut run_gitpie_command(repository_dir.path(), &["ls-files"]))?;
    assert!(listing.lines().any(|line| line == "a/b/4.txt"));

    Ok(())
}

#[rstest]
fn rm_requires_cached(init_repository_dir: TempDir) {
    run_gitpie_command(init_repository_dir.path(), &["rm", "1.txt"])
        .assert()
        .failure()
        .stderr(predicate::str::contains("only 'rm --cached' is supported"));
    init_repository_dir
        .child("1.txt")
        .assert(predicate::path::is_file());

    run_gitpie_command(init_repository_dir.path(), &["rm", "--cached", "1.txt"])
        .assert()
        .success();
    run_gitpie_command(init_repository_dir.path(), &["status", "--porcelain"])
        .assert()
        .success()
        .stdout("D  1.txt\n?? 1.txt\n");
}

#[rstest]
fn log_prints_history_in_both_formats(
    init_repository_dir: TempDir,
) -> Result<(), Box<dyn std::error::Error>> {
    let repository_dir = init_repository_dir;

    run_gitpie_command(repository_dir.path(), &["log"])
        .assert()
        .success()
        .stdout(format!(
            "commit {ROOT_COMMIT}\n\
             Author: fake_user <fake_email@email.com>\n\
             Date:   Sun Jan 1 12:00:00 2023 +0000\n\
             \n    Initial commit\n"
        ));

    write_file(FileSpec::new(
        repository_dir.path().join("1.txt"),
        "uno".to_string(),
    ));
    run_gitpie_command(repository_dir.path(), &["add", "."])
        .assert()
        .success();
    gitpie_commit(repository_dir.path(), "Second commit")
        .assert()
        .success();
    let head = head_commit_sha(repository_dir.path())?;

    run_gitpie_command(repository_dir.path(), &["log", "--oneline"])
        .assert()
        .success()
        .stdout(format!(
            "{} Second commit\n03e4259 Initial commit\n",
            &head[..7]
        ));

    run_gitpie_command(repository_dir.path(), &["log", "--oneline", "HEAD^"])
        .assert()
        .success()
        .stdout("03e4259 Initial commit\n");

    Ok(())
}

#[rstest]
fn checkout_reports_to_stderr(init_repository_dir: TempDir) {
    run_gitpie_command(init_repository_dir.path(), &["branch", "topic"])
        .assert()
        .success();

    run_gitpie_command(init_repository_dir.path(), &["checkout", "topic"])
        .assert()
        .success()
        .stdout("")
        .stderr("Switched to branch 'topic'\n");
    init_repository_dir
        .child(".gitpie/HEAD")
        .assert("ref: refs/heads/topic\n");

    run_gitpie_command(init_repository_dir.path(), &["checkout", "03e4259"])
        .assert()
        .success()
        .stderr(predicate::str::contains(
            "HEAD is now at 03e4259 Initial commit",
        ));
    init_repository_dir
        .child(".gitpie/HEAD")
        .assert(format!("{ROOT_COMMIT}\n"));
}

#[rstest]
fn checkout_conflict_names_the_paths(
    init_repository_dir: TempDir,
) -> Result<(), Box<dyn std::error::Error>> {
    let repository_dir = init_repository_dir;
    write_file(FileSpec::new(
        repository_dir.path().join("1.txt"),
        "uno".to_string(),
    ));
    run_gitpie_command(repository_dir.path(), &["add", "."])
        .assert()
        .success();
    gitpie_commit(repository_dir.path(), "Second commit")
        .assert()
        .success();
    repository_dir.child("1.txt").write_str("local edit")?;

    run_gitpie_command(repository_dir.path(), &["checkout", "HEAD^"])
        .assert()
        .failure()
        .stderr(predicate::str::contains(
            "checkout would overwrite local changes in: 1.txt",
        ));
    repository_dir.child("1.txt").assert("local edit");

    run_gitpie_command(repository_dir.path(), &["checkout", "-f", "HEAD^"])
        .assert()
        .success();
    repository_dir.child("1.txt").assert("one");

    Ok(())
}

#[rstest]
fn switch_create_and_tag_listing(init_repository_dir: TempDir) {
    run_gitpie_command(init_repository_dir.path(), &["switch", "-c", "feature"])
        .assert()
        .success()
        .stderr("Switched to branch 'feature'\n");

    run_gitpie_command(init_repository_dir.path(), &["tag", "v1"])
        .assert()
        .success();
    run_gitpie_command(init_repository_dir.path(), &["tag", "v0", "HEAD"])
        .assert()
        .success();
    run_gitpie_command(init_repository_dir.path(), &["tag"])
        .assert()
        .success()
        .stdout("v0\nv1\n");
    init_repository_dir
        .child(".gitpie/refs/tags/v1")
        .assert(format!("{ROOT_COMMIT}\n"));
}

#[rstest]
fn long_status_describes_a_clean_tree(init_repository_dir: TempDir) {
    run_gitpie_command(init_repository_dir.path(), &["status"])
        .assert()
        .success()
        .stdout("On branch master\nnothing to commit, working tree clean\n");
}
