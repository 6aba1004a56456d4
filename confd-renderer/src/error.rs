//! Error types for confd-renderer.

use std::error::Error as _;

use thiserror::Error;

/// All errors that can arise from template and data operations.
#[derive(Debug, Error)]
pub enum RenderError {
    /// Template text failed to parse.
    #[error("failed to parse template {address}: {detail}")]
    TemplateParse { address: String, detail: String },

    /// No template has been loaded under this address.
    #[error("no template loaded for {address}")]
    TemplateNotFound { address: String },

    /// Template execution failed (missing field, type mismatch, ...).
    #[error("failed to render template {address}: {detail}")]
    Execution { address: String, detail: String },

    /// A data namespace blob is not a valid JSON object.
    #[error("failed to decode data set {name}: {source}")]
    DataParse {
        name: String,
        #[source]
        source: serde_json::Error,
    },
}

/// Flatten a Tera error and its causes into one line.
///
/// Tera keeps the useful part ("Variable `x` not found") in the source chain.
pub(crate) fn describe(err: &tera::Error) -> String {
    let mut parts = vec![err.to_string()];
    let mut cause = err.source();
    while let Some(inner) = cause {
        parts.push(inner.to_string());
        cause = inner.source();
    }
    parts.join(": ")
}
