use predms_sql::SplitStrategy;

/// How the script runner feeds a script to the driver.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ExecutionMode {
    /// Split into units and run them one by one.
    Batched(SplitStrategy),
    /// Run the whole text as one call.
    Raw,
}

impl Default for ExecutionMode {
    fn default() -> Self {
        ExecutionMode::Batched(SplitStrategy::Batches)
    }
}

impl ExecutionMode {
    pub fn as_str(&self) -> &'static str {
        match self {
            ExecutionMode::Batched(SplitStrategy::Batches) => "batches",
            ExecutionMode::Batched(SplitStrategy::Statements) => "statements",
            ExecutionMode::Raw => "raw",
        }
    }
}

/// When the script runner commits.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum CommitPolicy {
    /// All units and the ledger entry commit together; a failure rolls back the script.
    #[default]
    PerScript,
    /// Commit after every unit; a failure keeps earlier units committed.
    PerBatch,
}

impl CommitPolicy {
    pub fn parse(value: &str) -> Option<Self> {
        match value.trim().to_ascii_lowercase().as_str() {
            "script" | "per_script" => Some(CommitPolicy::PerScript),
            "batch" | "per_batch" => Some(CommitPolicy::PerBatch),
            _ => None,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            CommitPolicy::PerScript => "script",
            CommitPolicy::PerBatch => "batch",
        }
    }
}
