//! Lazy commit history traversal
//!
//! Commits are visited newest committer timestamp first, each exactly once,
//! starting from any number of tips. The walk ends when every root commit
//! has been reached.

use crate::areas::database::Database;
use crate::artifacts::objects::commit::Commit;
use crate::artifacts::objects::object_id::ObjectId;
use chrono::{DateTime, FixedOffset};
use std::collections::{BinaryHeap, HashSet};

/// A commit waiting in the queue, ordered by timestamp then hash
#[derive(Debug, Clone, PartialEq, Eq)]
struct PendingCommit {
    timestamp: DateTime<FixedOffset>,
    oid: ObjectId,
    commit: Commit,
}

impl PartialOrd for PendingCommit {
    fn partial_cmp(&self, other: &Self) -> Option<std::cmp::Ordering> {
        Some(self.cmp(other))
    }
}

impl Ord for PendingCommit {
    fn cmp(&self, other: &Self) -> std::cmp::Ordering {
        self.timestamp
            .cmp(&other.timestamp)
            .then_with(|| self.oid.cmp(&other.oid))
    }
}

pub struct RevList<'d> {
    database: &'d Database,
    starts: Vec<ObjectId>,
    queue: BinaryHeap<PendingCommit>,
    visited: HashSet<ObjectId>,
    /// Error raised while enqueueing, reported on the next call
    failed: Option<anyhow::Error>,
}

impl<'d> RevList<'d> {
    pub fn new(database: &'d Database, starts: impl IntoIterator<Item = ObjectId>) -> Self {
        let mut rev_list = RevList {
            database,
            starts: starts.into_iter().collect(),
            queue: BinaryHeap::new(),
            visited: HashSet::new(),
            failed: None,
        };
        rev_list.restart();

        rev_list
    }

    /// Rewind to the starting tips
    pub fn restart(&mut self) {
        self.queue.clear();
        self.visited.clear();
        self.failed = None;

        for oid in self.starts.clone() {
            self.enqueue(oid);
        }
    }

    fn enqueue(&mut self, oid: ObjectId) {
        if self.failed.is_some() || !self.visited.insert(oid.clone()) {
            return;
        }

        match self.database.parse_object_as_commit(&oid) {
            Ok(commit) => self.queue.push(PendingCommit {
                timestamp: commit.timestamp(),
                oid,
                commit,
            }),
            Err(error) => self.failed = Some(error),
        }
    }
}

impl Iterator for RevList<'_> {
    type Item = anyhow::Result<(ObjectId, Commit)>;

    fn next(&mut self) -> Option<Self::Item> {
        if let Some(error) = self.failed.take() {
            self.queue.clear();
            return Some(Err(error));
        }

        let PendingCommit { oid, commit, .. } = self.queue.pop()?;
        for parent in commit.parents() {
            self.enqueue(parent.clone());
        }

        Some(Ok((oid, commit)))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::artifacts::objects::commit::Author;
    use crate::artifacts::objects::tree::Tree;
    use assert_fs::TempDir;
    use pretty_assertions::assert_eq;

    struct Graph {
        _dir: TempDir,
        database: Database,
    }

    impl Graph {
        fn new() -> Self {
            let dir = TempDir::new().unwrap();
            let database = Database::new(dir.path().to_path_buf().into_boxed_path());
            Graph {
                _dir: dir,
                database,
            }
        }

        fn commit(&self, parents: &[&ObjectId], seconds: i64, message: &str) -> ObjectId {
            let tree = self.database.store(&Tree::default()).unwrap();
            let author =
                Author::try_from(format!("A <a@example.com> {seconds} +0000").as_str()).unwrap();
            let commit = Commit::new(
                parents.iter().map(|oid| (*oid).clone()).collect(),
                tree,
                author.clone(),
                author,
                message.to_string(),
            );
            self.database.store(&commit).unwrap()
        }
    }

    fn messages(rev_list: RevList<'_>) -> Vec<String> {
        rev_list
            .map(|item| item.unwrap().1.message().to_string())
            .collect()
    }

    #[test]
    fn linear_history_is_newest_first_and_finite() {
        let graph = Graph::new();
        let first = graph.commit(&[], 100, "first");
        let second = graph.commit(&[&first], 200, "second");
        let third = graph.commit(&[&second], 300, "third");

        let rev_list = RevList::new(&graph.database, [third]);

        assert_eq!(messages(rev_list), vec!["third", "second", "first"]);
    }

    #[test]
    fn shared_ancestors_are_visited_once() {
        let graph = Graph::new();
        let base = graph.commit(&[], 100, "base");
        let left = graph.commit(&[&base], 200, "left");
        let right = graph.commit(&[&base], 300, "right");
        let merge = graph.commit(&[&left, &right], 400, "merge");

        let rev_list = RevList::new(&graph.database, [merge, left]);

        assert_eq!(messages(rev_list), vec!["merge", "right", "left", "base"]);
    }

    #[test]
    fn restarting_replays_the_walk() {
        let graph = Graph::new();
        let first = graph.commit(&[], 100, "first");
        let second = graph.commit(&[&first], 200, "second");

        let mut rev_list = RevList::new(&graph.database, [second.clone()]);
        assert_eq!(rev_list.next().unwrap().unwrap().0, second);
        rev_list.restart();

        assert_eq!(messages(rev_list), vec!["second", "first"]);
    }

    #[test]
    fn ancestors_yield_hashes_only() {
        let graph = Graph::new();
        let first = graph.commit(&[], 100, "first");
        let second = graph.commit(&[&first], 200, "second");

        let ancestors = graph
            .database
            .ancestors(second.clone())
            .collect::<anyhow::Result<Vec<_>>>()
            .unwrap();

        assert_eq!(ancestors, vec![second, first]);
    }

    #[test]
    fn missing_parent_surfaces_as_error() {
        let graph = Graph::new();
        let ghost = ObjectId::digest(b"ghost");
        let orphan = graph.commit(&[&ghost], 100, "orphan");

        let items = RevList::new(&graph.database, [orphan]).collect::<Vec<_>>();

        assert_eq!(items.len(), 2);
        assert!(items[0].is_ok());
        assert!(items[1].is_err());
    }
}
