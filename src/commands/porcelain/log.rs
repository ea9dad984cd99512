use crate::areas::repository::Repository;
use crate::artifacts::branch::revision::Revision;
use crate::artifacts::log::rev_list::RevList;
use crate::artifacts::objects::commit::Commit;
use crate::artifacts::objects::object_id::ObjectId;

impl Repository {
    /// History reachable from `revision` (HEAD by default), newest first
    ///
    /// An unborn HEAD has no history, which is not an error.
    pub fn log(&self, revision: Option<&str>) -> anyhow::Result<Vec<(ObjectId, Commit)>> {
        let start = match revision {
            Some(revision) => Revision::try_parse(revision)?.resolve(self)?,
            None => match self.refs().read_head()? {
                Some(_) => Revision::try_parse("HEAD")?.resolve(self)?,
                None => return Ok(Vec::new()),
            },
        };

        RevList::new(self.database(), [start]).collect()
    }
}

/// `<abbreviated hash> <subject>`
pub fn format_oneline(oid: &ObjectId, commit: &Commit) -> String {
    format!("{} {}", oid.to_short_oid(), commit.short_message())
}

pub fn format_medium(oid: &ObjectId, commit: &Commit) -> String {
    let mut lines = vec![
        format!("commit {oid}"),
        format!("Author: {}", commit.author().display_name()),
        format!("Date:   {}", commit.author().readable_timestamp()),
        String::new(),
    ];
    lines.extend(commit.message().lines().map(|line| format!("    {line}")));

    lines.join("\n")
}
