/// Reason a checkout would lose local work on a path
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum ConflictType {
    /// Unstaged modification of a tracked file
    StaleFile,
    /// Index differs from both HEAD and the target
    StagedChange,
    /// Directory holding untracked files where the target has a file
    StaleDirectory,
    /// Untracked file where the target has different content
    UntrackedOverwritten,
}

impl ConflictType {
    pub fn description(&self) -> &'static str {
        match self {
            ConflictType::StaleFile => "local changes would be overwritten",
            ConflictType::StagedChange => "staged changes would be overwritten",
            ConflictType::StaleDirectory => "untracked files in directory would be removed",
            ConflictType::UntrackedOverwritten => "untracked file would be overwritten",
        }
    }
}

impl std::fmt::Display for ConflictType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.description())
    }
}
