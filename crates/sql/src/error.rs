use thiserror::Error;

#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum ScriptSourceError {
    #[error("script path must be relative: {path}")]
    AbsolutePath { path: String },
    #[error("script path escapes the script root: {path}")]
    Traversal { path: String },
    #[error("script not found: {path}")]
    NotFound { path: String },
    #[error("failed to read script '{path}': {message}")]
    Io { path: String, message: String },
}

#[derive(Debug, Error, Clone, PartialEq, Eq)]
#[error("invalid SQL identifier '{identifier}': {reason}")]
pub struct IdentifierError {
    pub identifier: String,
    pub reason: &'static str,
}

/// Single-line, length-capped rendering of SQL for logs and error messages.
pub fn sql_snippet(sql: &str) -> String {
    const MAX_CHARS: usize = 200;
    let trimmed = sql.trim();

    let mut out = String::with_capacity(trimmed.len().min(MAX_CHARS) + 1);
    for (i, ch) in trimmed.chars().enumerate() {
        if i >= MAX_CHARS {
            out.push('…');
            break;
        }

        match ch {
            '\n' | '\r' | '\t' => out.push(' '),
            _ => out.push(ch),
        }
    }

    out
}
