use crate::error::ScriptSourceError;
use std::fs;
use std::path::{Component, Path, PathBuf};

pub const DB_NAME_PLACEHOLDER: &str = "{{DB_NAME}}";

/// Resolves a relative script identifier into SQL text ready to execute.
pub trait ScriptSource: Send + Sync {
    fn load(&self, relative_path: &str) -> Result<String, ScriptSourceError>;
}

/// Scripts stored as files under one root directory.
///
/// `{{DB_NAME}}` in a script is replaced with the configured database name.
#[derive(Debug, Clone)]
pub struct DirectorySource {
    root: PathBuf,
    db_name: Option<String>,
}

impl DirectorySource {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self {
            root: root.into(),
            db_name: None,
        }
    }

    pub fn with_db_name(mut self, db_name: impl Into<String>) -> Self {
        self.db_name = Some(db_name.into());
        self
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    fn resolve(&self, relative_path: &str) -> Result<PathBuf, ScriptSourceError> {
        let rel = Path::new(relative_path);
        if rel.is_absolute() || relative_path.starts_with('/') || relative_path.starts_with('\\') {
            return Err(ScriptSourceError::AbsolutePath {
                path: relative_path.to_string(),
            });
        }

        for component in rel.components() {
            match component {
                Component::Normal(_) | Component::CurDir => {}
                _ => {
                    return Err(ScriptSourceError::Traversal {
                        path: relative_path.to_string(),
                    })
                }
            }
        }

        Ok(self.root.join(rel))
    }
}

impl ScriptSource for DirectorySource {
    fn load(&self, relative_path: &str) -> Result<String, ScriptSourceError> {
        let path = self.resolve(relative_path)?;
        if !path.is_file() {
            return Err(ScriptSourceError::NotFound {
                path: path.display().to_string(),
            });
        }

        let sql = fs::read_to_string(&path).map_err(|e| ScriptSourceError::Io {
            path: path.display().to_string(),
            message: e.to_string(),
        })?;

        Ok(match &self.db_name {
            Some(db_name) => sql.replace(DB_NAME_PLACEHOLDER, db_name),
            None => sql,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::{DirectorySource, ScriptSource};
    use crate::error::ScriptSourceError;
    use std::fs;

    #[test]
    fn substitutes_database_name() {
        let tmp = tempfile::tempdir().unwrap();
        fs::create_dir(tmp.path().join("justice")).unwrap();
        fs::write(
            tmp.path().join("justice/gather_caseids.sql"),
            "SELECT * INTO {{DB_NAME}}.dbo.CaseIDs FROM Cases",
        )
        .unwrap();

        let source = DirectorySource::new(tmp.path()).with_db_name("ELPaso_TX");
        let sql = source.load("justice/gather_caseids.sql").unwrap();
        assert_eq!(sql, "SELECT * INTO ELPaso_TX.dbo.CaseIDs FROM Cases");
    }

    #[test]
    fn rejects_paths_outside_root() {
        let tmp = tempfile::tempdir().unwrap();
        let source = DirectorySource::new(tmp.path());

        let err = source.load("../secrets.sql").unwrap_err();
        assert!(matches!(err, ScriptSourceError::Traversal { .. }));

        let err = source.load("/etc/passwd").unwrap_err();
        assert!(matches!(err, ScriptSourceError::AbsolutePath { .. }));
    }

    #[test]
    fn missing_script_is_not_found() {
        let tmp = tempfile::tempdir().unwrap();
        let source = DirectorySource::new(tmp.path());
        let err = source.load("justice/nope.sql").unwrap_err();
        assert!(matches!(err, ScriptSourceError::NotFound { .. }));
    }
}
