//! Error taxonomy for encoding, decoding, and reconciliation.
//!
//! Library operations return [`ReconcileError`]; the command-line layer wraps
//! these in `anyhow` with file and row context.

use thiserror::Error;

use crate::schema::ColumnType;

pub type Result<T> = std::result::Result<T, ReconcileError>;

#[derive(Debug, Error)]
pub enum ReconcileError {
    /// A configured column is missing from a table handed to an operation.
    #[error("Column '{column}' not found in {context}")]
    SchemaMismatch {
        column: String,
        context: &'static str,
    },

    /// Encode direction: the value has no code in the fitted code table.
    #[error("Column '{column}': value '{value}' was not seen when the codec was fitted")]
    UnseenCategory { column: String, value: String },

    /// Decode direction: the code maps to no original category.
    #[error("Column '{column}': code '{value}' has no category (fitted classes: {classes})")]
    InvalidCode {
        column: String,
        value: String,
        classes: usize,
    },

    /// Raised only when unclassified columns are configured to be rejected.
    #[error("Column '{column}' has type {datatype} which has no reconciliation cast")]
    UnclassifiedColumn { column: String, datatype: ColumnType },

    #[error("Column '{column}': cannot cast '{value}' to {target}")]
    CastFailed {
        column: String,
        value: String,
        target: &'static str,
    },

    #[error("Column '{column}': value '{value}' cannot be compared with reference bound '{bound}'")]
    IncomparableValue {
        column: String,
        value: String,
        bound: String,
    },

    #[error("Column '{column}' has {found} row(s) but the table has {expected}")]
    RaggedColumn {
        column: String,
        expected: usize,
        found: usize,
    },

    #[error("Duplicate column '{0}'")]
    DuplicateColumn(String),

    #[error("Invalid configuration: {0}")]
    InvalidConfig(String),
}
