use core::fmt;
use std::error::Error;
use std::sync::Arc;

/// Failure reported by a database driver.
///
/// The original driver error is kept as the source so callers can inspect or
/// log the full chain; `message` is what classification and display use.
#[derive(Debug, Clone)]
pub struct DriverError {
    message: String,
    code: Option<String>,
    source: Option<Arc<dyn Error + Send + Sync>>,
}

impl DriverError {
    pub fn new(message: impl Into<String>) -> Self {
        Self {
            message: message.into(),
            code: None,
            source: None,
        }
    }

    pub fn with_code(mut self, code: impl Into<String>) -> Self {
        self.code = Some(code.into());
        self
    }

    pub fn with_source(mut self, source: impl Error + Send + Sync + 'static) -> Self {
        self.source = Some(Arc::new(source));
        self
    }

    pub fn message(&self) -> &str {
        &self.message
    }

    pub fn code(&self) -> Option<&str> {
        self.code.as_deref()
    }
}

impl fmt::Display for DriverError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match &self.code {
            Some(code) => write!(f, "{} (code={code})", self.message),
            None => write!(f, "{}", self.message),
        }
    }
}

impl Error for DriverError {
    fn source(&self) -> Option<&(dyn Error + 'static)> {
        self.source
            .as_deref()
            .map(|e| e as &(dyn Error + 'static))
    }
}

impl From<sqlx::Error> for DriverError {
    fn from(err: sqlx::Error) -> Self {
        let code = match &err {
            sqlx::Error::Database(db) => db.code().map(|c| c.into_owned()),
            _ => None,
        };
        let out = DriverError::new(err.to_string());
        let out = match code {
            Some(code) => out.with_code(code),
            None => out,
        };
        out.with_source(err)
    }
}

impl From<tiberius::error::Error> for DriverError {
    fn from(err: tiberius::error::Error) -> Self {
        let code = match &err {
            tiberius::error::Error::Server(token) => Some(token.code().to_string()),
            _ => None,
        };
        let out = DriverError::new(err.to_string());
        let out = match code {
            Some(code) => out.with_code(code),
            None => out,
        };
        out.with_source(err)
    }
}

impl From<std::io::Error> for DriverError {
    fn from(err: std::io::Error) -> Self {
        DriverError::new(err.to_string()).with_source(err)
    }
}

#[cfg(test)]
mod tests {
    use super::DriverError;
    use std::error::Error;

    #[test]
    fn display_includes_code_when_present() {
        let err = DriverError::new("Lock request time out period exceeded").with_code("1222");
        assert_eq!(
            err.to_string(),
            "Lock request time out period exceeded (code=1222)"
        );
    }

    #[test]
    fn source_is_preserved() {
        let io = std::io::Error::new(std::io::ErrorKind::TimedOut, "socket timeout");
        let err = DriverError::from(io);
        assert!(err.source().is_some());
        assert_eq!(err.message(), "socket timeout");
    }
}
