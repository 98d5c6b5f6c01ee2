//! Remote SPARQL endpoints over HTTP.
//!
//! Results are requested as `application/sparql-results+json`. A non-2xx
//! answer is a transport failure carrying the raw body; a 2xx answer that is
//! not a results document is a remote failure.

use std::collections::HashMap;
use std::time::{Duration, Instant};

use serde::Deserialize;

use crate::config::HttpMethod;
use crate::error::QueryError;
use crate::store::Term;
use crate::store::load::read_limited;
use crate::vocab;

use super::{QueryBackend, SparqlResult, Solutions};

const RESULTS_ACCEPT: &str = "application/sparql-results+json";

/// Maximum response body size (32 MB).
const MAX_RESPONSE_SIZE: u64 = 32 * 1024 * 1024;

/// Maximum number of body bytes kept in a transport error.
const MAX_DETAIL_LEN: usize = 2048;

/// A named SPARQL endpoint.
#[derive(Debug, Clone)]
pub struct RemoteEndpoint {
    name: String,
    url: String,
    method: HttpMethod,
    user_agent: Option<String>,
}

impl RemoteEndpoint {
    pub fn new(name: impl Into<String>, url: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            url: url.into(),
            method: HttpMethod::Get,
            user_agent: None,
        }
    }

    pub fn with_method(mut self, method: HttpMethod) -> Self {
        self.method = method;
        self
    }

    pub fn with_user_agent(mut self, user_agent: &str) -> Self {
        self.user_agent = Some(user_agent.to_string());
        self
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn url(&self) -> &str {
        &self.url
    }

    pub fn method(&self) -> HttpMethod {
        self.method
    }

    fn send(&self, query: &str, timeout: Duration) -> Result<ureq::Response, ureq::Error> {
        let mut builder = ureq::AgentBuilder::new().timeout(timeout);
        if let Some(user_agent) = &self.user_agent {
            builder = builder.user_agent(user_agent);
        }
        let agent = builder.build();

        match self.method {
            HttpMethod::Get => agent
                .get(&self.url)
                .query("query", query)
                .set("Accept", RESULTS_ACCEPT)
                .call(),
            HttpMethod::Post => agent
                .post(&self.url)
                .set("Accept", RESULTS_ACCEPT)
                .send_form(&[("query", query)]),
        }
    }
}

impl QueryBackend for RemoteEndpoint {
    fn name(&self) -> &str {
        &self.name
    }

    fn evaluate(&self, query: &str, timeout: Duration) -> SparqlResult<Solutions> {
        let timed_out = || QueryError::Timeout {
            timeout_ms: timeout.as_millis() as u64,
        };

        tracing::debug!(endpoint = %self.name, url = %self.url, method = ?self.method, "sending query");
        let started = Instant::now();
        let response = self.send(query, timeout).map_err(|e| match e {
            ureq::Error::Status(status, response) => QueryError::Transport {
                status: Some(status),
                detail: truncate(response.into_string().unwrap_or_default()),
            },
            ureq::Error::Transport(transport) => {
                if started.elapsed() >= timeout || is_timeout(&transport) {
                    timed_out()
                } else {
                    QueryError::Transport {
                        status: None,
                        detail: transport.to_string(),
                    }
                }
            }
        })?;

        let body = read_body(response.into_reader(), MAX_RESPONSE_SIZE, started, timeout)?;
        parse_results(&body)
    }
}

/// Read a response body of at most `limit` bytes. An oversized body is a
/// `Remote` error; read failures are `Timeout` or `Transport`.
fn read_body(
    reader: impl std::io::Read,
    limit: u64,
    started: Instant,
    timeout: Duration,
) -> SparqlResult<Vec<u8>> {
    read_limited(reader, limit).map_err(|e| {
        if e.kind() == std::io::ErrorKind::FileTooLarge {
            QueryError::Remote {
                detail: format!("response {e}"),
            }
        } else if is_timeout_io(&e) || started.elapsed() >= timeout {
            QueryError::Timeout {
                timeout_ms: timeout.as_millis() as u64,
            }
        } else {
            QueryError::Transport {
                status: None,
                detail: format!("failed to read response body: {e}"),
            }
        }
    })
}

fn is_timeout(transport: &ureq::Transport) -> bool {
    std::error::Error::source(transport)
        .and_then(|source| source.downcast_ref::<std::io::Error>())
        .is_some_and(is_timeout_io)
}

fn is_timeout_io(e: &std::io::Error) -> bool {
    matches!(
        e.kind(),
        std::io::ErrorKind::TimedOut | std::io::ErrorKind::WouldBlock
    )
}

fn truncate(mut detail: String) -> String {
    if detail.len() > MAX_DETAIL_LEN {
        let mut end = MAX_DETAIL_LEN;
        while !detail.is_char_boundary(end) {
            end -= 1;
        }
        detail.truncate(end);
        detail.push_str("...");
    }
    detail
}

// ---------------------------------------------------------------------------
// SPARQL 1.1 Query Results JSON
// ---------------------------------------------------------------------------

#[derive(Deserialize)]
struct JsonResults {
    #[serde(default)]
    head: JsonHead,
    results: Option<JsonBindings>,
    boolean: Option<bool>,
}

#[derive(Deserialize, Default)]
struct JsonHead {
    #[serde(default)]
    vars: Vec<String>,
}

#[derive(Deserialize)]
struct JsonBindings {
    bindings: Vec<HashMap<String, JsonTerm>>,
}

#[derive(Deserialize)]
#[serde(tag = "type", rename_all = "lowercase")]
enum JsonTerm {
    Uri {
        value: String,
    },
    Bnode {
        value: String,
    },
    #[serde(alias = "typed-literal")]
    Literal {
        value: String,
        #[serde(rename = "xml:lang")]
        lang: Option<String>,
        datatype: Option<String>,
    },
}

impl From<JsonTerm> for Term {
    fn from(term: JsonTerm) -> Self {
        match term {
            JsonTerm::Uri { value } => Term::iri(value),
            JsonTerm::Bnode { value } => Term::Blank(value),
            JsonTerm::Literal {
                value,
                lang: Some(lang),
                ..
            } => Term::lang_literal(value, lang),
            JsonTerm::Literal {
                value,
                datatype: Some(datatype),
                ..
            } => Term::typed_literal(value, datatype),
            JsonTerm::Literal { value, .. } => Term::literal(value),
        }
    }
}

/// Parse a results document. Bindings are ordered by the head's variable list.
fn parse_results(body: &[u8]) -> SparqlResult<Solutions> {
    let document: JsonResults = serde_json::from_slice(body).map_err(|e| QueryError::Remote {
        detail: format!("invalid SPARQL JSON results: {e}"),
    })?;

    if let Some(value) = document.boolean {
        return Ok(Solutions {
            variables: vec!["result".into()],
            rows: vec![vec![(
                "result".into(),
                Term::typed_literal(value.to_string(), vocab::XSD_BOOLEAN),
            )]],
        });
    }

    let bindings = document
        .results
        .ok_or_else(|| QueryError::Remote {
            detail: "results document has neither \"results\" nor \"boolean\"".into(),
        })?
        .bindings;

    let variables = document.head.vars;
    let rows = bindings
        .into_iter()
        .map(|mut binding| {
            variables
                .iter()
                .filter_map(|var| binding.remove(var).map(|term| (var.clone(), term.into())))
                .collect()
        })
        .collect();
    Ok(Solutions { variables, rows })
}
