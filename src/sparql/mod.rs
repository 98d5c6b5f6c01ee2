//! SPARQL execution gateway.
//!
//! A query runs against either the session's local store ([`local::LocalStore`],
//! backed by oxigraph) or a named remote endpoint ([`remote::RemoteEndpoint`],
//! spoken to over HTTP with `ureq`). Both backends implement [`QueryBackend`]
//! and return raw [`Solutions`]; the gateway normalizes them into the same
//! [`QueryResult`] shape and optionally substitutes labels for IRIs.
//!
//! Every execution is bounded by a caller-supplied timeout. Queries are
//! read-only: abandoning one leaves the store untouched.

pub mod catalog;
pub mod local;
pub mod remote;

use std::collections::BTreeMap;
use std::fmt;
use std::time::{Duration, Instant};

use serde::Serialize;

use crate::config::Config;
use crate::error::QueryError;
use crate::resolve::{Resolution, Vocabulary};
use crate::store::{Term, TripleSet};

use self::local::LocalStore;
use self::remote::RemoteEndpoint;

pub type SparqlResult<T> = std::result::Result<T, QueryError>;

/// Raw bindings as returned by a backend, before label resolution.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Solutions {
    /// Projected variables, in engine order.
    pub variables: Vec<String>,
    /// One entry per solution: the bound (variable, term) pairs.
    pub rows: Vec<Vec<(String, Term)>>,
}

/// A query engine that can answer SPARQL within a time budget.
pub trait QueryBackend {
    /// Name used in logs.
    fn name(&self) -> &str;

    /// Evaluate `query`, giving up after `timeout`.
    fn evaluate(&self, query: &str, timeout: Duration) -> SparqlResult<Solutions>;
}

/// A result row: bound variable → display string. Unbound variables are absent.
pub type Row = BTreeMap<String, String>;

/// Normalized query result, identical in shape for local and remote execution.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct QueryResult {
    pub columns: Vec<String>,
    pub rows: Vec<Row>,
}

impl QueryResult {
    /// Normalize raw solutions. With `labels`, IRIs that have a label in the triple
    /// set are displayed by label; everything else keeps its raw term string.
    pub fn from_solutions(solutions: Solutions, labels: Option<(&TripleSet, &Vocabulary)>) -> Self {
        let display = |term: &Term| -> String {
            if let (Some((triples, vocabulary)), Term::Iri(_)) = (labels, term) {
                if let Resolution::Resolved(label) = vocabulary.label_of(triples, term) {
                    return label;
                }
            }
            term.display()
        };

        let rows = solutions
            .rows
            .iter()
            .map(|bindings| {
                bindings
                    .iter()
                    .map(|(var, term)| (var.clone(), display(term)))
                    .collect()
            })
            .collect();
        Self {
            columns: solutions.variables,
            rows,
        }
    }

    pub fn len(&self) -> usize {
        self.rows.len()
    }

    pub fn is_empty(&self) -> bool {
        self.rows.is_empty()
    }

    /// Cell value for `column` in `row`, empty when unbound.
    pub fn cell(&self, row: usize, column: &str) -> &str {
        self.rows
            .get(row)
            .and_then(|r| r.get(column))
            .map(String::as_str)
            .unwrap_or_default()
    }
}

/// Where a query runs.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Target {
    Local,
    Endpoint(String),
}

impl fmt::Display for Target {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Local => f.write_str("local"),
            Self::Endpoint(name) => f.write_str(name),
        }
    }
}

/// Per-execution options.
#[derive(Debug, Clone, Copy)]
pub struct QueryOptions {
    pub timeout: Duration,
    /// Substitute labels for IRIs using the loaded triples.
    pub resolve_labels: bool,
}

impl Default for QueryOptions {
    fn default() -> Self {
        Self {
            timeout: Duration::from_secs(30),
            resolve_labels: false,
        }
    }
}

/// Routes queries to the local store or a named endpoint.
#[derive(Debug, Clone, Default)]
pub struct Gateway {
    endpoints: BTreeMap<String, RemoteEndpoint>,
}

impl Gateway {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn from_config(config: &Config) -> Self {
        let endpoints = config
            .endpoints
            .iter()
            .map(|(name, endpoint)| {
                (
                    name.clone(),
                    RemoteEndpoint::new(name, &endpoint.url)
                        .with_method(endpoint.method)
                        .with_user_agent(&config.user_agent),
                )
            })
            .collect();
        Self { endpoints }
    }

    pub fn with_endpoint(mut self, endpoint: RemoteEndpoint) -> Self {
        self.endpoints.insert(endpoint.name().to_string(), endpoint);
        self
    }

    pub fn endpoint(&self, name: &str) -> Option<&RemoteEndpoint> {
        self.endpoints.get(name)
    }

    pub fn endpoint_names(&self) -> impl Iterator<Item = &str> {
        self.endpoints.keys().map(String::as_str)
    }

    /// Execute `query` against `target`.
    ///
    /// `local` is the session's store (required for [`Target::Local`]); `labels`
    /// supplies the triples used for label substitution when requested.
    pub fn execute(
        &self,
        query: &str,
        target: &Target,
        local: Option<&LocalStore>,
        labels: Option<(&TripleSet, &Vocabulary)>,
        options: &QueryOptions,
    ) -> SparqlResult<QueryResult> {
        let backend: &dyn QueryBackend = match target {
            Target::Local => local.ok_or(QueryError::NotLoaded)?,
            Target::Endpoint(name) => self
                .endpoints
                .get(name)
                .ok_or_else(|| QueryError::UnknownEndpoint { name: name.clone() })?,
        };

        let started = Instant::now();
        let solutions = backend.evaluate(query, options.timeout);
        let elapsed_ms = started.elapsed().as_millis() as u64;
        let solutions = match solutions {
            Ok(solutions) => solutions,
            Err(e) => {
                tracing::warn!(backend = backend.name(), elapsed_ms, error = %e, "query failed");
                return Err(e);
            }
        };
        tracing::debug!(
            backend = backend.name(),
            rows = solutions.rows.len(),
            elapsed_ms,
            "query evaluated"
        );

        let labels = if options.resolve_labels { labels } else { None };
        Ok(QueryResult::from_solutions(solutions, labels))
    }
}
