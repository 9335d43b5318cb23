use crate::profile::DatabaseKind;
use std::collections::HashSet;
use tracing::debug;

/// Decides which converted tables keep their data and constraints.
#[derive(Debug, Clone)]
pub struct TableFilter {
    kind: Option<DatabaseKind>,
    db_name: String,
    include_empty: bool,
    always_include: HashSet<String>,
}

impl TableFilter {
    pub fn new<I, S>(kind: DatabaseKind, db_name: &str, include_empty: bool, always_include: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        Self {
            kind: Some(kind),
            ..Self::for_database(db_name, include_empty, always_include)
        }
    }

    /// A filter over the whole target database, without a source-kind prefix.
    pub fn for_database<I, S>(db_name: &str, include_empty: bool, always_include: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        Self {
            kind: None,
            db_name: db_name.to_string(),
            include_empty,
            always_include: always_include
                .into_iter()
                .map(|t| t.as_ref().trim().to_lowercase())
                .filter(|t| !t.is_empty())
                .collect(),
        }
    }

    pub fn include_empty(&self) -> bool {
        self.include_empty
    }

    /// Matches `schema.table`, `database.schema.table` or `kind.schema.table`,
    /// ignoring case.
    pub fn is_always_included(&self, schema: &str, table: &str) -> bool {
        let mut candidates = vec![
            format!("{schema}.{table}"),
            format!("{}.{schema}.{table}", self.db_name),
        ];
        if let Some(kind) = self.kind {
            candidates.push(format!("{}.{schema}.{table}", kind.slug()));
        }

        candidates
            .iter()
            .any(|c| self.always_include.contains(&c.to_lowercase()))
    }

    pub fn should_process(&self, schema: &str, table: &str, scope_row_count: Option<i64>) -> bool {
        if self.include_empty || self.is_always_included(schema, table) {
            return true;
        }

        let keep = scope_row_count.is_some_and(|n| n > 0);
        if !keep {
            debug!(schema, table, "skipping empty table");
        }
        keep
    }
}

#[cfg(test)]
mod tests {
    use super::TableFilter;
    use crate::profile::DatabaseKind;

    fn filter(include_empty: bool) -> TableFilter {
        TableFilter::new(
            DatabaseKind::Justice,
            "TargetDB",
            include_empty,
            ["dbo.Keep", " TARGETDB.dbo.Audit ", "justice.ref.Codes", ""],
        )
    }

    #[test]
    fn positive_row_counts_are_processed() {
        let f = filter(false);
        assert!(f.should_process("dbo", "Cases", Some(12)));
        assert!(!f.should_process("dbo", "Cases", Some(0)));
        assert!(!f.should_process("dbo", "Cases", None));
    }

    #[test]
    fn always_include_matches_every_qualified_form() {
        let f = filter(false);
        assert!(f.should_process("DBO", "keep", Some(0)));
        assert!(f.should_process("dbo", "Audit", None));
        assert!(f.should_process("ref", "Codes", Some(0)));
        assert!(!f.is_always_included("ref", "Other"));
    }

    #[test]
    fn database_filter_ignores_kind_prefixes() {
        let f = TableFilter::for_database("TargetDB", false, ["justice.ref.Codes", "main.notes"]);
        assert!(!f.is_always_included("ref", "Codes"));
        assert!(f.should_process("main", "Notes", Some(0)));
    }

    #[test]
    fn include_empty_keeps_everything() {
        assert!(filter(true).should_process("dbo", "Anything", Some(0)));
    }
}
