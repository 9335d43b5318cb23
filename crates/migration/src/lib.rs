pub mod error;
pub mod error_log;
pub mod filter;
pub mod importer;
pub mod joins;
pub mod lob;
pub mod profile;
pub mod progress;
pub mod queries;

pub use error::{ImportError, ProgressError};
pub use error_log::ErrorLog;
pub use filter::TableFilter;
pub use importer::{ImportOptions, ImportReport, Importer};
pub use joins::{JoinImporter, NoJoinImport};
pub use lob::{alter_column_sql, LobOptions, LobProcessor, LobReport, GATHER_LOBS_SCRIPT, LOB_TABLE};
pub use profile::{script_name, DatabaseKind, PreprocessStep, StepKind};
pub use progress::{MemoryProgress, ProgressStore, ProgressTracker, PK_CREATION, TABLE_OPERATIONS};
