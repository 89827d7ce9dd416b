//! Error types for MOBI writer operations.

use thiserror::Error;

/// Errors that can occur while assembling a MOBI container.
///
/// Per the writer's recovery policy, only [`Error::ConfigurationError`] is
/// ever returned from [`crate::mobi::write_document`] -- every other
/// variant is a downgrade-and-log diagnostic, collected for the caller to
/// inspect but never fatal on its own.
#[derive(Error, Debug)]
pub enum Error {
    /// A TOC entry's href did not resolve to any serialized anchor.
    /// Non-fatal: downgrades the document to unindexed output.
    #[error("TOC entry '{href}' does not resolve to any anchor")]
    MissingTocTarget { href: String },

    /// Two consecutive flat TOC entries do not abut in offset space.
    /// Non-fatal: downgrades the document to unindexed output.
    #[error("TOC discontinuity between '{prev_title}' and '{node_title}'")]
    TocDiscontinuity {
        prev_title: String,
        node_title: String,
    },

    /// Periodical TOC shape, date/timestamp, or masthead guide check failed.
    /// Non-fatal: downgrades the document to a flat CTOC.
    #[error("periodical TOC does not conform: {reason}")]
    NonConformingPeriodical { reason: String },

    /// Caller configuration problem that must abort the write (e.g. a
    /// periodical document missing both `date` and `timestamp` metadata).
    #[error("configuration error: {0}")]
    ConfigurationError(String),

    /// An href placeholder could not be resolved during link fixup.
    /// Non-fatal: the placeholder is left as zeros.
    #[error("broken hyperlink: {href}")]
    BrokenHyperlink { href: String },
}

pub type Result<T> = std::result::Result<T, Error>;
