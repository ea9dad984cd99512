//! Commit object
//!
//! Commits represent snapshots of the repository at specific points in time.
//! They contain:
//! - A tree object ID (directory snapshot)
//! - Parent commit ID(s) (for history)
//! - Author and committer information
//! - Commit message
//!
//! ## Format
//!
//! On disk:
//! ```text
//! commit <size>\0
//! tree <tree-sha>
//! parent <parent-sha>
//! author <name> <email> <timestamp> <timezone>
//! committer <name> <email> <timestamp> <timezone>
//!
//! <commit message>
//! ```

use crate::artifacts::objects::object::{Object, Packable, Unpackable, frame};
use crate::artifacts::objects::object_id::ObjectId;
use crate::artifacts::objects::object_type::ObjectType;
use anyhow::{Context, anyhow};
use bytes::Bytes;
use chrono::{DateTime, FixedOffset, Timelike};
use std::io::BufRead;

/// Author or committer signature
///
/// Contains name, email, and timestamp with timezone information.
#[derive(Debug, Clone, Eq, PartialEq)]
pub struct Author {
    name: String,
    email: String,
    timestamp: DateTime<FixedOffset>,
}

impl Author {
    /// Create a new author with the current timestamp
    pub fn new(name: String, email: String) -> Self {
        Self::new_with_timestamp(name, email, chrono::Local::now().fixed_offset())
    }

    /// Signatures only carry whole seconds, and `<`, `>` and line breaks are
    /// dropped from the identity so the header line always parses back
    pub fn new_with_timestamp(name: String, email: String, timestamp: DateTime<FixedOffset>) -> Self {
        Author {
            name: strip_crud(&name),
            email: strip_crud(&email),
            timestamp: timestamp.with_nanosecond(0).unwrap_or(timestamp),
        }
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn email(&self) -> &str {
        &self.email
    }

    /// "Name <email@example.com>"
    pub fn display_name(&self) -> String {
        format!("{} <{}>", self.name, self.email)
    }

    /// "Name <email> timestamp timezone", as written in commit headers
    pub fn display(&self) -> String {
        format!(
            "{} <{}> {} {}",
            self.name,
            self.email,
            self.timestamp.timestamp(),
            self.timestamp.format("%z")
        )
    }

    /// Load the author from `GIT_AUTHOR_NAME`, `GIT_AUTHOR_EMAIL` and `GIT_AUTHOR_DATE`
    ///
    /// Without a date the current time is used.
    pub fn load_from_env() -> anyhow::Result<Self> {
        Self::load_from_env_with_prefix("GIT_AUTHOR")
    }

    /// Load the committer from `GIT_COMMITTER_*`, falling back to the author
    pub fn load_committer_from_env(author: &Author) -> anyhow::Result<Self> {
        match std::env::var("GIT_COMMITTER_NAME") {
            Ok(_) => Self::load_from_env_with_prefix("GIT_COMMITTER"),
            Err(_) => Ok(author.clone()),
        }
    }

    fn load_from_env_with_prefix(prefix: &str) -> anyhow::Result<Self> {
        let name = std::env::var(format!("{prefix}_NAME")).context(format!("{prefix}_NAME not set"))?;
        let email =
            std::env::var(format!("{prefix}_EMAIL")).context(format!("{prefix}_EMAIL not set"))?;
        let date = std::env::var(format!("{prefix}_DATE")).ok();

        Self::from_identity(name, email, date.as_deref())
            .with_context(|| format!("invalid {prefix} identity"))
    }

    fn from_identity(name: String, email: String, date: Option<&str>) -> anyhow::Result<Self> {
        let author = match date {
            Some(date) => {
                let timestamp = DateTime::parse_from_rfc2822(date)
                    .or_else(|_| DateTime::parse_from_str(date, "%Y-%m-%d %H:%M:%S %z"))
                    .context(format!("unsupported date format: {date}"))?;
                Author::new_with_timestamp(name, email, timestamp)
            }
            None => Author::new(name, email),
        };

        if author.name.is_empty() {
            anyhow::bail!("empty ident name not allowed");
        }

        Ok(author)
    }

    /// "Mon Jan 1 12:34:56 2024 +0000"
    pub fn readable_timestamp(&self) -> String {
        self.timestamp.format("%a %b %-d %H:%M:%S %Y %z").to_string()
    }

    pub fn timestamp(&self) -> DateTime<FixedOffset> {
        self.timestamp
    }
}

impl TryFrom<&str> for Author {
    type Error = anyhow::Error;

    fn try_from(value: &str) -> Result<Self, Self::Error> {
        // Split from the right: timezone and timestamp never contain spaces
        let mut parts = value.rsplitn(3, ' ');
        let (Some(timezone), Some(timestamp), Some(identity)) = (parts.next(), parts.next(), parts.next())
        else {
            return Err(anyhow!("invalid signature '{value}'"));
        };

        let email_start = identity
            .find('<')
            .ok_or_else(|| anyhow!("invalid signature '{value}': missing '<'"))?;
        let email_end = identity
            .rfind('>')
            .filter(|end| *end > email_start)
            .ok_or_else(|| anyhow!("invalid signature '{value}': missing '>'"))?;

        let name = identity[..email_start].trim_end().to_string();
        let email = identity[email_start + 1..email_end].to_string();

        let timestamp = timestamp
            .parse::<i64>()
            .map_err(|_| anyhow!("invalid timestamp in signature '{value}'"))?;
        let offset = parse_offset(timezone)?;
        let timestamp = DateTime::from_timestamp(timestamp, 0)
            .ok_or_else(|| anyhow!("timestamp out of range in signature '{value}'"))?
            .with_timezone(&offset);

        Ok(Author {
            name,
            email,
            timestamp,
        })
    }
}

fn strip_crud(value: &str) -> String {
    value
        .chars()
        .filter(|c| !matches!(c, '<' | '>' | '\n' | '\r'))
        .collect::<String>()
        .trim()
        .to_string()
}

/// Parse a `±hhmm` UTC offset
fn parse_offset(timezone: &str) -> anyhow::Result<FixedOffset> {
    let invalid = || anyhow!("invalid timezone '{timezone}'");

    let (sign, digits) = match timezone.split_at_checked(1) {
        Some(("+", digits)) => (1, digits),
        Some(("-", digits)) => (-1, digits),
        _ => return Err(invalid()),
    };
    if digits.len() != 4 || !digits.bytes().all(|b| b.is_ascii_digit()) {
        return Err(invalid());
    }

    let hours: i32 = digits[..2].parse()?;
    let minutes: i32 = digits[2..].parse()?;

    FixedOffset::east_opt(sign * (hours * 3600 + minutes * 60)).ok_or_else(invalid)
}

/// Commit object
///
/// Root commits have no parents. Commits created here have at most one, but
/// any number is accepted when reading.
#[derive(Debug, Clone, Eq, PartialEq)]
pub struct Commit {
    parents: Vec<ObjectId>,
    tree_oid: ObjectId,
    author: Author,
    committer: Author,
    message: String,
}

impl Commit {
    pub fn new(
        parents: Vec<ObjectId>,
        tree_oid: ObjectId,
        author: Author,
        committer: Author,
        message: String,
    ) -> Self {
        Commit {
            parents,
            tree_oid,
            author,
            committer,
            message,
        }
    }

    /// First line of the message, as shown by `log --oneline`
    pub fn short_message(&self) -> String {
        self.message.lines().next().unwrap_or("").to_string()
    }

    pub fn message(&self) -> &str {
        &self.message
    }

    pub fn tree_oid(&self) -> &ObjectId {
        &self.tree_oid
    }

    pub fn parent(&self) -> Option<&ObjectId> {
        self.parents.first()
    }

    pub fn parents(&self) -> &[ObjectId] {
        &self.parents
    }

    pub fn author(&self) -> &Author {
        &self.author
    }

    pub fn committer(&self) -> &Author {
        &self.committer
    }

    /// Committer time, used to order history
    pub fn timestamp(&self) -> DateTime<FixedOffset> {
        self.committer.timestamp()
    }

    fn headers(&self) -> String {
        let mut headers = format!("tree {}\n", self.tree_oid);
        for parent in &self.parents {
            headers.push_str(&format!("parent {parent}\n"));
        }
        headers.push_str(&format!("author {}\n", self.author.display()));
        headers.push_str(&format!("committer {}\n", self.committer.display()));

        headers
    }
}

impl Packable for Commit {
    fn serialize(&self) -> anyhow::Result<Bytes> {
        let content = format!("{}\n{}", self.headers(), self.message);

        Ok(frame(self.object_type(), content.as_bytes()))
    }
}

impl Unpackable for Commit {
    fn deserialize(mut reader: impl BufRead) -> anyhow::Result<Self> {
        let mut content = String::new();
        reader
            .read_to_string(&mut content)
            .context("commit object is not UTF-8")?;

        let (headers, message) = content
            .split_once("\n\n")
            .context("invalid commit object: missing message separator")?;

        let mut tree_oid = None;
        let mut parents = Vec::new();
        let mut author = None;
        let mut committer = None;

        for line in headers.lines() {
            let (key, value) = line
                .split_once(' ')
                .context(format!("invalid commit header '{line}'"))?;

            match key {
                "tree" => tree_oid = Some(ObjectId::try_parse(value.to_string())?),
                "parent" => parents.push(ObjectId::try_parse(value.to_string())?),
                "author" => author = Some(Author::try_from(value)?),
                "committer" => committer = Some(Author::try_from(value)?),
                // unknown headers are tolerated and dropped
                _ => {}
            }
        }

        Ok(Commit {
            parents,
            tree_oid: tree_oid.context("invalid commit object: missing tree")?,
            author: author.context("invalid commit object: missing author")?,
            committer: committer.context("invalid commit object: missing committer")?,
            message: message.to_string(),
        })
    }
}

impl Object for Commit {
    fn object_type(&self) -> ObjectType {
        ObjectType::Commit
    }

    fn display(&self) -> String {
        format!("{}\n{}", self.headers(), self.message)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;
    use proptest::prelude::*;
    use rstest::{fixture, rstest};

    #[fixture]
    fn author() -> Author {
        Author::try_from("Ada Lovelace <ada@example.com> 1700000000 +0130").unwrap()
    }

    #[fixture]
    fn tree_oid() -> ObjectId {
        ObjectId::digest(b"tree 0\0")
    }

    fn payload(commit: &Commit) -> Vec<u8> {
        let serialized = commit.serialize().unwrap();
        let start = serialized.iter().position(|&b| b == 0).unwrap() + 1;
        serialized[start..].to_vec()
    }

    #[rstest]
    fn signature_keeps_offset(author: Author) {
        assert_eq!(author.name(), "Ada Lovelace");
        assert_eq!(author.email(), "ada@example.com");
        assert_eq!(author.display(), "Ada Lovelace <ada@example.com> 1700000000 +0130");
    }

    #[rstest]
    #[case("Ada <ada@example.com> 1700000000")]
    #[case("Ada ada@example.com 1700000000 +0000")]
    #[case("Ada <ada@example.com> soon +0000")]
    #[case("Ada <ada@example.com> 1700000000 0100")]
    fn malformed_signatures_are_rejected(#[case] raw: &str) {
        assert!(Author::try_from(raw).is_err());
    }

    #[rstest]
    #[case("single line")]
    #[case("subject\n\nbody with trailing newlines\n\n")]
    #[case("")]
    fn message_survives_round_trip(author: Author, tree_oid: ObjectId, #[case] message: &str) {
        let committer = Author::try_from("Bob <bob@example.com> 1700000500 -0700").unwrap();
        let commit = Commit::new(
            vec![ObjectId::digest(b"parent")],
            tree_oid,
            author,
            committer,
            message.to_string(),
        );

        let parsed = Commit::deserialize(payload(&commit).as_slice()).unwrap();

        assert_eq!(parsed, commit);
        assert_eq!(parsed.message(), message);
        assert_eq!(parsed.committer().display(), "Bob <bob@example.com> 1700000500 -0700");
    }

    #[rstest]
    fn commits_stamped_now_survive_a_round_trip(tree_oid: ObjectId) {
        let author = Author::new("Ada".to_string(), "ada@example.com".to_string());
        let commit = Commit::new(Vec::new(), tree_oid, author.clone(), author, "now".to_string());

        let parsed = Commit::deserialize(payload(&commit).as_slice()).unwrap();

        assert_eq!(parsed, commit);
        assert_eq!(commit.author().timestamp().nanosecond(), 0);
    }

    #[rstest]
    #[case("Eve\nparent 0000000000000000000000000000000000000000\nx", "eve@example.com")]
    #[case("<Mallory>", "mal<lory>@example.com")]
    #[case("  Trent\r\n", "\ntrent@example.com\n")]
    fn signature_breaking_characters_are_dropped(
        tree_oid: ObjectId,
        #[case] name: &str,
        #[case] email: &str,
    ) {
        let author = Author::try_from("x <x> 1700000000 +0000").unwrap();
        let forged = Author::new_with_timestamp(name.to_string(), email.to_string(), author.timestamp());
        let commit = Commit::new(Vec::new(), tree_oid, forged.clone(), forged, "msg".to_string());

        let parsed = Commit::deserialize(payload(&commit).as_slice()).unwrap();

        assert_eq!(parsed, commit);
        assert!(parsed.parents().is_empty());
        assert!(!parsed.author().name().contains(['<', '>', '\n']));
    }

    #[test]
    fn empty_identity_names_are_rejected() {
        let error = Author::from_identity(
            "<>\n".to_string(),
            "a@example.com".to_string(),
            Some("2023-01-01 12:00:00 +0000"),
        )
        .unwrap_err();

        assert_eq!(error.to_string(), "empty ident name not allowed");
    }

    #[test]
    fn identity_dates_are_parsed() {
        let author = Author::from_identity(
            "Ada".to_string(),
            "ada@example.com".to_string(),
            Some("2023-01-01 12:00:00 +0100"),
        )
        .unwrap();

        assert_eq!(author.display(), "Ada <ada@example.com> 1672570800 +0100");
        assert!(
            Author::from_identity("Ada".to_string(), String::new(), Some("yesterday")).is_err()
        );
    }

    proptest! {
        #[test]
        fn commits_survive_a_round_trip(
            author_name in "\\PC{0,16}",
            email in "\\PC{0,16}",
            seconds in 0i64..4_102_444_800,
            offset_minutes in -(23 * 60 + 59)..=(23 * 60 + 59),
            parent_seeds in proptest::collection::vec(any::<u8>(), 0..3),
            message in "(?s).{0,64}",
        ) {
            let offset = FixedOffset::east_opt(offset_minutes * 60).unwrap();
            let timestamp = DateTime::from_timestamp(seconds, 0).unwrap().with_timezone(&offset);
            let author = Author::new_with_timestamp(author_name, email, timestamp);
            let parents = parent_seeds.iter().map(|seed| ObjectId::digest(&[*seed])).collect();
            let commit = Commit::new(
                parents,
                ObjectId::digest(b"tree"),
                author.clone(),
                author,
                message,
            );

            let parsed = Commit::deserialize(payload(&commit).as_slice()).unwrap();

            prop_assert_eq!(parsed, commit);
        }
    }

    #[rstest]
    fn multiple_parents_are_accepted(author: Author, tree_oid: ObjectId) {
        let raw = format!(
            "tree {tree_oid}\nparent {}\nparent {}\nauthor {}\ncommitter {}\n\nmerge\n",
            ObjectId::digest(b"one"),
            ObjectId::digest(b"two"),
            author.display(),
            author.display()
        );

        let commit = Commit::deserialize(raw.as_bytes()).unwrap();

        assert_eq!(commit.parents().len(), 2);
        assert_eq!(commit.short_message(), "merge");
    }
}
