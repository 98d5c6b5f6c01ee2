//! Ingestion: raw RDF content, local files and dereferenceable URLs.
//!
//! Parsing is delegated to oxigraph's `RdfParser`. Named graphs in N-Quads or
//! TriG input are flattened into the single triple set.

use std::fmt;
use std::io::Read;
use std::path::{Path, PathBuf};
use std::str::FromStr;
use std::time::Duration;

use oxigraph::io::{RdfFormat, RdfParser};

use crate::error::StoreError;

use super::{Term, Triple, TripleSet};

/// Maximum size of a dereferenced RDF document (64 MB).
const MAX_FETCH_SIZE: u64 = 64 * 1024 * 1024;

/// `Accept` header sent when dereferencing a resource URL.
const RDF_ACCEPT: &str = "text/turtle, application/rdf+xml;q=0.9, application/n-triples;q=0.8, \
                          application/n-quads;q=0.7, application/trig;q=0.7, text/n3;q=0.5";

/// Supported RDF serializations.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SourceFormat {
    RdfXml,
    Turtle,
    NTriples,
    NQuads,
    TriG,
    N3,
}

impl SourceFormat {
    /// Guess the format from a file extension. `.owl` files are RDF/XML.
    pub fn from_extension(extension: &str) -> Option<Self> {
        match extension.to_ascii_lowercase().as_str() {
            "owl" | "rdf" | "xml" => Some(Self::RdfXml),
            other => RdfFormat::from_extension(other).and_then(Self::from_oxigraph),
        }
    }

    /// Guess the format from an HTTP `Content-Type` value (parameters are ignored).
    pub fn from_media_type(media_type: &str) -> Option<Self> {
        let essence = media_type.split(';').next().unwrap_or_default().trim();
        match essence {
            "application/xml" | "text/xml" => Some(Self::RdfXml),
            other => RdfFormat::from_media_type(other).and_then(Self::from_oxigraph),
        }
    }

    /// Guess the format from a path's extension.
    pub fn from_path(path: &Path) -> Option<Self> {
        path.extension()
            .and_then(|e| e.to_str())
            .and_then(Self::from_extension)
    }

    #[allow(unreachable_patterns)]
    fn from_oxigraph(format: RdfFormat) -> Option<Self> {
        match format {
            RdfFormat::RdfXml => Some(Self::RdfXml),
            RdfFormat::Turtle => Some(Self::Turtle),
            RdfFormat::NTriples => Some(Self::NTriples),
            RdfFormat::NQuads => Some(Self::NQuads),
            RdfFormat::TriG => Some(Self::TriG),
            RdfFormat::N3 => Some(Self::N3),
            _ => None,
        }
    }

    fn to_oxigraph(self) -> RdfFormat {
        match self {
            Self::RdfXml => RdfFormat::RdfXml,
            Self::Turtle => RdfFormat::Turtle,
            Self::NTriples => RdfFormat::NTriples,
            Self::NQuads => RdfFormat::NQuads,
            Self::TriG => RdfFormat::TriG,
            Self::N3 => RdfFormat::N3,
        }
    }
}

impl FromStr for SourceFormat {
    type Err = StoreError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "xml" | "rdfxml" | "rdf/xml" | "rdf-xml" | "owl" => Ok(Self::RdfXml),
            "turtle" | "ttl" => Ok(Self::Turtle),
            "ntriples" | "n-triples" | "nt" => Ok(Self::NTriples),
            "nquads" | "n-quads" | "nq" => Ok(Self::NQuads),
            "trig" => Ok(Self::TriG),
            "n3" => Ok(Self::N3),
            _ => Err(StoreError::UnknownFormat { hint: s.to_string() }),
        }
    }
}

impl fmt::Display for SourceFormat {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.to_oxigraph().name())
    }
}

/// Where an ontology comes from.
#[derive(Debug, Clone)]
pub enum RdfSource {
    /// Raw serialized content, e.g. an uploaded file body.
    Content {
        bytes: Vec<u8>,
        format: SourceFormat,
        base_iri: Option<String>,
    },
    /// A local file; the format defaults to the one implied by the extension.
    File {
        path: PathBuf,
        format: Option<SourceFormat>,
    },
    /// A dereferenceable resource URL.
    Url {
        url: String,
        format: Option<SourceFormat>,
        timeout: Duration,
    },
    /// An already-materialized triple set.
    Triples(TripleSet),
}

impl RdfSource {
    /// Interpret a CLI argument: `http(s)://` URLs are dereferenced, anything else is a path.
    pub fn from_arg(arg: &str, format: Option<SourceFormat>, timeout: Duration) -> Self {
        if arg.starts_with("http://") || arg.starts_with("https://") {
            Self::Url {
                url: arg.to_string(),
                format,
                timeout,
            }
        } else {
            Self::File {
                path: PathBuf::from(arg),
                format,
            }
        }
    }

    /// Short human-readable description for logs and status lines.
    pub fn describe(&self) -> String {
        match self {
            Self::Content { bytes, format, .. } => format!("{} bytes of {format}", bytes.len()),
            Self::File { path, .. } => path.display().to_string(),
            Self::Url { url, .. } => url.clone(),
            Self::Triples(set) => format!("{} materialized triples", set.len()),
        }
    }
}

/// Load a source into a [`TripleSet`].
///
/// Every failure (malformed content, unreadable file, unreachable URL) is returned
/// as a [`StoreError`]; nothing panics past this boundary.
pub fn load(source: RdfSource) -> Result<TripleSet, StoreError> {
    let description = source.describe();
    let result = match source {
        RdfSource::Content {
            bytes,
            format,
            base_iri,
        } => parse(&bytes, format, base_iri.as_deref()),
        RdfSource::File { path, format } => {
            let format = match format.or_else(|| SourceFormat::from_path(&path)) {
                Some(format) => format,
                None => {
                    return Err(StoreError::UnknownFormat {
                        hint: path.display().to_string(),
                    });
                }
            };
            let bytes = std::fs::read(&path).map_err(|source| StoreError::Io {
                path: path.display().to_string(),
                source,
            })?;
            parse(&bytes, format, None)
        }
        RdfSource::Url {
            url,
            format,
            timeout,
        } => {
            let (bytes, content_type) = fetch(&url, timeout)?;
            let format = format
                .or_else(|| content_type.as_deref().and_then(SourceFormat::from_media_type))
                .or_else(|| url_extension(&url).and_then(SourceFormat::from_extension))
                .ok_or_else(|| StoreError::UnknownFormat {
                    hint: content_type.unwrap_or_else(|| url.clone()),
                })?;
            parse(&bytes, format, Some(&url))
        }
        RdfSource::Triples(set) => Ok(set),
    };

    match &result {
        Ok(set) => tracing::info!(source = %description, triples = set.len(), "loaded triples"),
        Err(e) => tracing::warn!(source = %description, error = %e, "ingestion failed"),
    }
    result
}

/// Parse serialized RDF into a triple set, in document order.
pub(crate) fn parse(bytes: &[u8], format: SourceFormat, base_iri: Option<&str>) -> Result<TripleSet, StoreError> {
    let parse_error = |message: String| StoreError::Parse {
        format: format.to_string(),
        message,
    };

    let mut parser = RdfParser::from_format(format.to_oxigraph());
    if let Some(base) = base_iri {
        parser = parser
            .with_base_iri(base)
            .map_err(|e| parse_error(format!("invalid base IRI {base}: {e}")))?;
    }

    let mut set = TripleSet::new();
    for quad in parser.for_reader(bytes) {
        let quad = quad.map_err(|e| parse_error(e.to_string()))?;
        let subject = Term::from_oxigraph(quad.subject.into());
        let object = Term::from_oxigraph(quad.object);
        if let (Some(subject), Some(object)) = (subject, object) {
            set.insert(Triple::new(
                subject,
                Term::Iri(quad.predicate.into_string()),
                object,
            ));
        }
    }
    Ok(set)
}

/// GET a URL, returning the body and its `Content-Type`.
fn fetch(url: &str, timeout: Duration) -> Result<(Vec<u8>, Option<String>), StoreError> {
    let fetch_error = |message: String| StoreError::Fetch {
        url: url.to_string(),
        message,
    };

    let agent = ureq::AgentBuilder::new().timeout(timeout).build();
    let response = agent
        .get(url)
        .set("Accept", RDF_ACCEPT)
        .call()
        .map_err(|e| match e {
            ureq::Error::Status(code, _) => fetch_error(format!("HTTP {code}")),
            ureq::Error::Transport(transport) => fetch_error(transport.to_string()),
        })?;

    let content_type = response.header("Content-Type").map(str::to_owned);
    let bytes = read_limited(response.into_reader(), MAX_FETCH_SIZE)
        .map_err(|e| fetch_error(format!("failed to read body: {e}")))?;
    Ok((bytes, content_type))
}

/// Read at most `limit` bytes. A longer body is a `FileTooLarge` error rather
/// than a silently truncated document.
pub(crate) fn read_limited(reader: impl Read, limit: u64) -> std::io::Result<Vec<u8>> {
    let mut bytes = Vec::new();
    reader.take(limit.saturating_add(1)).read_to_end(&mut bytes)?;
    if bytes.len() as u64 > limit {
        return Err(std::io::Error::new(
            std::io::ErrorKind::FileTooLarge,
            format!("body exceeds {limit} bytes"),
        ));
    }
    Ok(bytes)
}

/// The extension of the URL's last path segment, ignoring query and fragment.
fn url_extension(url: &str) -> Option<&str> {
    let path = url.split(['?', '#']).next()?;
    let segment = path.rsplit('/').next()?;
    let (_, extension) = segment.rsplit_once('.')?;
    Some(extension)
}
