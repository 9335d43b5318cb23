pub mod error;
pub mod ident;
pub mod model;
pub mod source;
pub mod split;

pub use error::{sql_snippet, IdentifierError, ScriptSourceError};
pub use ident::validate_identifier;
pub use model::SqlBatch;
pub use source::{DirectorySource, ScriptSource, DB_NAME_PLACEHOLDER};
pub use split::{split_script, SplitStrategy};
