use core::fmt;

/// How a preprocessing step is executed.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StepKind {
    /// Through the script runner, recorded in the ledger and skipped once applied.
    Script,
    /// Through the retrying step runner; runs on every invocation.
    Retried,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PreprocessStep {
    pub name: &'static str,
    pub path: &'static str,
    pub kind: StepKind,
}

const fn script(name: &'static str, path: &'static str) -> PreprocessStep {
    PreprocessStep {
        name,
        path,
        kind: StepKind::Script,
    }
}

const JUSTICE_STEPS: &[PreprocessStep] = &[
    script("GatherCaseIDs", "justice/gather_caseids.sql"),
    script("GatherChargeIDs", "justice/gather_chargeids.sql"),
    script("GatherPartyIDs", "justice/gather_partyids.sql"),
    script("GatherWarrantIDs", "justice/gather_warrantids.sql"),
    script("GatherHearingIDs", "justice/gather_hearingids.sql"),
    script("GatherEventIDs", "justice/gather_eventids.sql"),
];

const OPERATIONS_STEPS: &[PreprocessStep] = &[script(
    "GatherDocumentIDs",
    "operations/gather_documentids.sql",
)];

const FINANCIAL_STEPS: &[PreprocessStep] = &[PreprocessStep {
    name: "GatherFeeInstanceIDs",
    path: "financial/gather_feeinstanceids.sql",
    kind: StepKind::Retried,
}];

/// One of the three legacy source systems.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum DatabaseKind {
    Justice,
    Operations,
    Financial,
}

impl DatabaseKind {
    /// Migration order.
    pub const ALL: [DatabaseKind; 3] = [
        DatabaseKind::Justice,
        DatabaseKind::Operations,
        DatabaseKind::Financial,
    ];

    pub fn parse(value: &str) -> Option<Self> {
        match value.trim().to_ascii_lowercase().as_str() {
            "justice" => Some(DatabaseKind::Justice),
            "operations" => Some(DatabaseKind::Operations),
            "financial" => Some(DatabaseKind::Financial),
            _ => None,
        }
    }

    pub fn as_str(self) -> &'static str {
        match self {
            DatabaseKind::Justice => "Justice",
            DatabaseKind::Operations => "Operations",
            DatabaseKind::Financial => "Financial",
        }
    }

    /// Lowercase name, used for script directories and file names.
    pub fn slug(self) -> &'static str {
        match self {
            DatabaseKind::Justice => "justice",
            DatabaseKind::Operations => "operations",
            DatabaseKind::Financial => "financial",
        }
    }

    /// Table listing the tables to convert, with their drop and select-into SQL.
    pub fn tables_table(self) -> &'static str {
        match self {
            DatabaseKind::Justice => "TablesToConvert",
            DatabaseKind::Operations => "TablesToConvert_Operations",
            DatabaseKind::Financial => "TablesToConvert_Financial",
        }
    }

    /// Table of NOT NULL and primary key scripts produced by the primary key script.
    pub fn primary_key_table(self) -> &'static str {
        match self {
            DatabaseKind::Justice => "PrimaryKeyScripts",
            DatabaseKind::Operations => "PrimaryKeyScripts_Operations",
            DatabaseKind::Financial => "PrimaryKeyScripts_Financial",
        }
    }

    pub fn preprocessing(self) -> &'static [PreprocessStep] {
        match self {
            DatabaseKind::Justice => JUSTICE_STEPS,
            DatabaseKind::Operations => OPERATIONS_STEPS,
            DatabaseKind::Financial => FINANCIAL_STEPS,
        }
    }

    pub fn drop_select_script(self) -> &'static str {
        match self {
            DatabaseKind::Justice => "justice/gather_drops_and_selects.sql",
            DatabaseKind::Operations => "operations/gather_drops_and_selects_operations.sql",
            DatabaseKind::Financial => "financial/gather_drops_and_selects_financial.sql",
        }
    }

    pub fn update_joins_script(self) -> &'static str {
        match self {
            DatabaseKind::Justice => "justice/update_joins.sql",
            DatabaseKind::Operations => "operations/update_joins_operations.sql",
            DatabaseKind::Financial => "financial/update_joins_financial.sql",
        }
    }

    pub fn primary_key_script(self) -> &'static str {
        match self {
            DatabaseKind::Justice => "justice/create_primarykeys.sql",
            DatabaseKind::Operations => "operations/create_primarykeys_operations.sql",
            DatabaseKind::Financial => "financial/create_primarykeys_financial.sql",
        }
    }

    /// Name of the table a select-into statement creates for `table`.
    ///
    /// Operations and Financial tables land with a kind prefix so they do not
    /// collide with Justice tables of the same name.
    pub fn target_table(self, table: &str) -> String {
        match self {
            DatabaseKind::Justice => table.to_string(),
            DatabaseKind::Operations => format!("Operations_{table}"),
            DatabaseKind::Financial => format!("Financial_{table}"),
        }
    }

    pub fn next_step(self) -> Option<&'static str> {
        match self {
            DatabaseKind::Justice => Some("Operations migration"),
            DatabaseKind::Operations => Some("Financial migration"),
            DatabaseKind::Financial => Some("LOB column processing"),
        }
    }
}

impl fmt::Display for DatabaseKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Ledger name of a script: its file name without directory or `.sql`.
pub fn script_name(path: &str) -> &str {
    let file = path.rsplit('/').next().unwrap_or(path);
    file.strip_suffix(".sql").unwrap_or(file)
}
