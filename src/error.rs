//! Rich diagnostic error types for ontoscope.
//!
//! Each subsystem defines its own error type with miette `#[diagnostic]` derives,
//! providing error codes, help text, and source chains so users know exactly what
//! went wrong and how to fix it.
//!
//! Missing labels or missing type triples are *not* errors: the resolver reports
//! them as [`Resolution::Unresolved`](crate::resolve::Resolution) placeholders.

use miette::Diagnostic;
use thiserror::Error;

/// Top-level error type for ontoscope.
///
/// Each variant wraps a subsystem-specific error, preserving the full diagnostic
/// chain (error codes, help text, source spans) through to the user.
#[derive(Debug, Error, Diagnostic)]
pub enum OntoError {
    #[error(transparent)]
    #[diagnostic(transparent)]
    Store(#[from] StoreError),

    #[error(transparent)]
    #[diagnostic(transparent)]
    Query(#[from] QueryError),

    #[error(transparent)]
    #[diagnostic(transparent)]
    Config(#[from] ConfigError),

    #[error(transparent)]
    #[diagnostic(transparent)]
    Export(#[from] ExportError),
}

// ---------------------------------------------------------------------------
// Store (ingestion) errors
// ---------------------------------------------------------------------------

#[derive(Debug, Error, Diagnostic)]
pub enum StoreError {
    #[error("failed to parse {format} content: {message}")]
    #[diagnostic(
        code(onto::store::parse),
        help(
            "The ontology source is not valid {format}. Check that the declared \
             format matches the content (e.g. RDF/XML for .owl files, Turtle for .ttl)."
        )
    )]
    Parse { format: String, message: String },

    #[error("failed to fetch {url}: {message}")]
    #[diagnostic(
        code(onto::store::fetch),
        help(
            "The resource URL could not be dereferenced. Check the URL, your network \
             connection, and that the server returns an RDF serialization."
        )
    )]
    Fetch { url: String, message: String },

    #[error("cannot determine RDF serialization from \"{hint}\"")]
    #[diagnostic(
        code(onto::store::unknown_format),
        help(
            "Pass an explicit format: xml, turtle, ntriples, nquads, trig or n3. \
             File extensions .owl/.rdf/.xml, .ttl, .nt, .nq, .trig and .n3 are recognized."
        )
    )]
    UnknownFormat { hint: String },

    #[error("SPARQL store error: {message}")]
    #[diagnostic(
        code(onto::store::backend),
        help("The in-memory SPARQL store could not be built from the loaded triples.")
    )]
    Backend { message: String },

    #[error("I/O error reading {path}")]
    #[diagnostic(
        code(onto::store::io),
        help("Check that the file exists and is readable.")
    )]
    Io {
        path: String,
        #[source]
        source: std::io::Error,
    },
}

// ---------------------------------------------------------------------------
// Query errors
// ---------------------------------------------------------------------------

/// Coarse classification of a [`QueryError`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum QueryErrorKind {
    Timeout,
    Transport,
    Remote,
    Syntax,
    Evaluation,
    Unavailable,
}

#[derive(Debug, Error, Diagnostic)]
pub enum QueryError {
    #[error("query timed out after {timeout_ms} ms")]
    #[diagnostic(
        code(onto::query::timeout),
        help(
            "The query did not complete within the allotted time. Increase the \
             timeout or add a LIMIT to the query."
        )
    )]
    Timeout { timeout_ms: u64 },

    #[error("transport error{}: {detail}", .status.map(|s| format!(" (HTTP {s})")).unwrap_or_default())]
    #[diagnostic(
        code(onto::query::transport),
        help(
            "The endpoint could not be reached or answered with a non-success status. \
             The detail contains the raw response body when one was returned."
        )
    )]
    Transport { status: Option<u16>, detail: String },

    #[error("endpoint returned an unusable result: {detail}")]
    #[diagnostic(
        code(onto::query::remote),
        help("The endpoint answered but not with application/sparql-results+json.")
    )]
    Remote { detail: String },

    #[error("SPARQL syntax error: {message}")]
    #[diagnostic(
        code(onto::query::syntax),
        help("Check the query syntax, in particular PREFIX declarations and braces.")
    )]
    Syntax { message: String },

    #[error("query evaluation failed: {message}")]
    #[diagnostic(
        code(onto::query::evaluation),
        help("The local SPARQL engine rejected the query at evaluation time.")
    )]
    Evaluation { message: String },

    #[error("unknown endpoint \"{name}\"")]
    #[diagnostic(
        code(onto::query::unknown_endpoint),
        help("Add it under [endpoints.{name}] in the config file, or use one of the configured names.")
    )]
    UnknownEndpoint { name: String },

    #[error("no ontology loaded in this session")]
    #[diagnostic(
        code(onto::query::not_loaded),
        help("Load a file or URL before running a query against the local store.")
    )]
    NotLoaded,
}

impl QueryError {
    pub fn kind(&self) -> QueryErrorKind {
        match self {
            Self::Timeout { .. } => QueryErrorKind::Timeout,
            Self::Transport { .. } => QueryErrorKind::Transport,
            Self::Remote { .. } => QueryErrorKind::Remote,
            Self::Syntax { .. } => QueryErrorKind::Syntax,
            Self::Evaluation { .. } => QueryErrorKind::Evaluation,
            Self::UnknownEndpoint { .. } | Self::NotLoaded => QueryErrorKind::Unavailable,
        }
    }
}

// ---------------------------------------------------------------------------
// Config errors
// ---------------------------------------------------------------------------

#[derive(Debug, Error, Diagnostic)]
pub enum ConfigError {
    #[error("failed to read config: {path}")]
    #[diagnostic(
        code(onto::config::read),
        help("Ensure the config file exists and is readable.")
    )]
    Read {
        path: String,
        #[source]
        source: std::io::Error,
    },

    #[error("failed to parse config {path}: {message}")]
    #[diagnostic(
        code(onto::config::parse),
        help("Check the TOML syntax in the config file. `ontoscope config init` writes a valid template.")
    )]
    Parse { path: String, message: String },

    #[error("failed to write config: {path}")]
    #[diagnostic(
        code(onto::config::write),
        help("Ensure you have write permissions to the config directory.")
    )]
    Write {
        path: String,
        #[source]
        source: std::io::Error,
    },

    #[error("failed to serialize config for {path}: {message}")]
    #[diagnostic(
        code(onto::config::serialize),
        help("A value cannot be represented in TOML; integers must fit in a signed 64-bit range.")
    )]
    Serialize { path: String, message: String },

    #[error("cannot determine home directory")]
    #[diagnostic(
        code(onto::config::no_home),
        help("Set the HOME environment variable or pass --config explicitly.")
    )]
    NoHome,
}

// ---------------------------------------------------------------------------
// Export errors
// ---------------------------------------------------------------------------

#[derive(Debug, Error, Diagnostic)]
pub enum ExportError {
    #[error("CSV error: {source}")]
    #[diagnostic(code(onto::export::csv))]
    Csv {
        #[from]
        source: csv::Error,
    },

    #[error("JSON error: {source}")]
    #[diagnostic(code(onto::export::json))]
    Json {
        #[from]
        source: serde_json::Error,
    },

    #[error("I/O error: {source}")]
    #[diagnostic(
        code(onto::export::io),
        help("Check that the output location is writable.")
    )]
    Io {
        #[from]
        source: std::io::Error,
    },

    #[error("invalid triple on row {row}: {message}")]
    #[diagnostic(
        code(onto::export::parse),
        help(
            "Triple tables are re-read as N-Triples terms. Tables exported with \
             plain display strings cannot be re-imported."
        )
    )]
    Parse { row: usize, message: String },
}

/// Convenience alias for functions returning ontoscope results.
pub type OntoResult<T> = std::result::Result<T, OntoError>;
