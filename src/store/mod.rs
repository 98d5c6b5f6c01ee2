//! Triple store adapter: an insertion-ordered, in-memory triple collection.
//!
//! - [`TripleSet`] holds the materialized triples and answers pattern lookups
//!   ([`TripleSet::matching`]) and single-value lookups ([`TripleSet::value`]).
//! - [`load`] turns serialized RDF (file content or a dereferenced URL) into a
//!   [`TripleSet`] using oxigraph's parsers.
//!
//! Duplicates are kept as loaded, so `len()` is a row count while
//! `distinct_len()` treats the collection as a set.

pub mod load;

use std::collections::{HashMap, HashSet};
use std::fmt;

use oxigraph::model as ox;
use serde::{Deserialize, Serialize};

use crate::vocab;

pub use load::{RdfSource, SourceFormat, load};

/// An RDF term: IRI, blank node, or literal.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub enum Term {
    Iri(String),
    Blank(String),
    Literal {
        value: String,
        /// Language tag, lowercase as normalized by the parser.
        language: Option<String>,
        /// Datatype IRI; `None` for plain strings and language-tagged literals.
        datatype: Option<String>,
    },
}

impl Term {
    pub fn iri(iri: impl Into<String>) -> Self {
        Self::Iri(iri.into())
    }

    pub fn literal(value: impl Into<String>) -> Self {
        Self::Literal {
            value: value.into(),
            language: None,
            datatype: None,
        }
    }

    pub fn lang_literal(value: impl Into<String>, language: impl Into<String>) -> Self {
        Self::Literal {
            value: value.into(),
            language: Some(language.into().to_ascii_lowercase()),
            datatype: None,
        }
    }

    pub fn typed_literal(value: impl Into<String>, datatype: impl Into<String>) -> Self {
        let datatype = datatype.into();
        Self::Literal {
            value: value.into(),
            language: None,
            datatype: (datatype != vocab::XSD_STRING).then_some(datatype),
        }
    }

    pub fn as_iri(&self) -> Option<&str> {
        match self {
            Self::Iri(iri) => Some(iri),
            _ => None,
        }
    }

    pub fn is_literal(&self) -> bool {
        matches!(self, Self::Literal { .. })
    }

    pub fn language(&self) -> Option<&str> {
        match self {
            Self::Literal { language, .. } => language.as_deref(),
            _ => None,
        }
    }

    /// The raw display string: the IRI, `_:id` for blank nodes, or the literal's lexical value.
    pub fn display(&self) -> String {
        match self {
            Self::Iri(iri) => iri.clone(),
            Self::Blank(id) => format!("_:{id}"),
            Self::Literal { value, .. } => value.clone(),
        }
    }

    /// The N-Triples serialization of this term (`<iri>`, `_:b0`, `"v"@fr`).
    pub fn to_ntriples(&self) -> String {
        self.to_oxigraph().to_string()
    }

    pub(crate) fn to_oxigraph(&self) -> ox::Term {
        match self {
            Self::Iri(iri) => ox::NamedNode::new_unchecked(iri.as_str()).into(),
            Self::Blank(id) => ox::BlankNode::new_unchecked(id.as_str()).into(),
            Self::Literal {
                value,
                language: Some(language),
                ..
            } => ox::Literal::new_language_tagged_literal_unchecked(value.as_str(), language.as_str())
                .into(),
            Self::Literal {
                value,
                datatype: Some(datatype),
                ..
            } => ox::Literal::new_typed_literal(
                value.as_str(),
                ox::NamedNode::new_unchecked(datatype.as_str()),
            )
            .into(),
            Self::Literal { value, .. } => ox::Literal::new_simple_literal(value.as_str()).into(),
        }
    }

    /// Convert an oxigraph term. Returns `None` for RDF 1.2 triple terms.
    #[allow(unreachable_patterns)]
    pub(crate) fn from_oxigraph(term: ox::Term) -> Option<Self> {
        match term {
            ox::Term::NamedNode(node) => Some(Self::Iri(node.into_string())),
            ox::Term::BlankNode(node) => Some(Self::Blank(node.into_string())),
            ox::Term::Literal(literal) => {
                let language = literal.language().map(str::to_owned);
                let datatype = literal.datatype().as_str();
                let datatype = (language.is_none() && datatype != vocab::XSD_STRING)
                    .then(|| datatype.to_owned());
                Some(Self::Literal {
                    value: literal.value().to_owned(),
                    language,
                    datatype,
                })
            }
            _ => None,
        }
    }
}

impl fmt::Display for Term {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.display())
    }
}

/// A (subject, predicate, object) statement.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Triple {
    pub subject: Term,
    pub predicate: Term,
    pub object: Term,
}

impl Triple {
    pub fn new(subject: Term, predicate: Term, object: Term) -> Self {
        Self {
            subject,
            predicate,
            object,
        }
    }

    /// Convert to an oxigraph quad in the default graph.
    ///
    /// Returns `None` when the triple is not valid RDF (literal subject, non-IRI predicate).
    pub(crate) fn to_quad(&self) -> Option<ox::Quad> {
        let predicate = ox::NamedNode::new_unchecked(self.predicate.as_iri()?);
        let object = self.object.to_oxigraph();
        let quad = match &self.subject {
            Term::Iri(iri) => ox::Quad::new(
                ox::NamedNode::new_unchecked(iri.as_str()),
                predicate,
                object,
                ox::GraphName::DefaultGraph,
            ),
            Term::Blank(id) => ox::Quad::new(
                ox::BlankNode::new_unchecked(id.as_str()),
                predicate,
                object,
                ox::GraphName::DefaultGraph,
            ),
            Term::Literal { .. } => return None,
        };
        Some(quad)
    }
}

impl fmt::Display for Triple {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{} {} {} .",
            self.subject.to_ntriples(),
            self.predicate.to_ntriples(),
            self.object.to_ntriples()
        )
    }
}

/// Insertion-ordered triple collection with a subject index.
#[derive(Debug, Clone, Default)]
pub struct TripleSet {
    triples: Vec<Triple>,
    /// Subject → positions in `triples`, ascending.
    by_subject: HashMap<Term, Vec<usize>>,
}

impl TripleSet {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn insert(&mut self, triple: Triple) {
        let position = self.triples.len();
        self.by_subject
            .entry(triple.subject.clone())
            .or_default()
            .push(position);
        self.triples.push(triple);
    }

    /// Number of stored triples, duplicates included.
    pub fn len(&self) -> usize {
        self.triples.len()
    }

    pub fn is_empty(&self) -> bool {
        self.triples.is_empty()
    }

    /// Number of distinct triples.
    pub fn distinct_len(&self) -> usize {
        self.triples.iter().collect::<HashSet<_>>().len()
    }

    /// All triples in insertion order.
    pub fn iter(&self) -> std::slice::Iter<'_, Triple> {
        self.triples.iter()
    }

    /// Pattern-matched lookup; `None` in any position is a wildcard.
    ///
    /// The returned iterator is lazy and borrows the set, so the same pattern can be
    /// scanned any number of times. Results follow insertion order.
    pub fn matching<'a>(
        &'a self,
        subject: Option<&'a Term>,
        predicate: Option<&'a Term>,
        object: Option<&'a Term>,
    ) -> Box<dyn Iterator<Item = &'a Triple> + 'a> {
        let keep = move |t: &&Triple| {
            predicate.is_none_or(|p| &t.predicate == p) && object.is_none_or(|o| &t.object == o)
        };
        match subject {
            Some(subject) => {
                let positions = self.by_subject.get(subject).map(Vec::as_slice).unwrap_or(&[]);
                Box::new(positions.iter().map(|&i| &self.triples[i]).filter(keep))
            }
            None => Box::new(self.triples.iter().filter(keep)),
        }
    }

    /// The first object for (subject, predicate) in insertion order.
    ///
    /// When the source holds several objects for the same pair, which one was
    /// inserted first depends on the parser's output order.
    pub fn value(&self, subject: &Term, predicate: &Term) -> Option<&Term> {
        self.by_subject
            .get(subject)?
            .iter()
            .map(|&i| &self.triples[i])
            .find(|t| &t.predicate == predicate)
            .map(|t| &t.object)
    }

    /// All objects for (subject, predicate), in insertion order.
    pub fn objects<'a>(
        &'a self,
        subject: &'a Term,
        predicate: &'a Term,
    ) -> impl Iterator<Item = &'a Term> + 'a {
        self.matching(Some(subject), Some(predicate), None)
            .map(|t| &t.object)
    }

    /// Distinct subjects having `predicate` → `object`, in first-seen order.
    pub fn subjects<'a>(&'a self, predicate: &'a Term, object: &'a Term) -> Vec<&'a Term> {
        let mut seen = HashSet::new();
        self.matching(None, Some(predicate), Some(object))
            .map(|t| &t.subject)
            .filter(|s| seen.insert(*s))
            .collect()
    }

    /// Build an oxigraph store holding the same triples, for SPARQL evaluation.
    pub(crate) fn to_oxigraph_store(&self) -> Result<oxigraph::store::Store, String> {
        let store = oxigraph::store::Store::new()
            .map_err(|e| format!("failed to create oxigraph store: {e}"))?;
        let mut skipped = 0usize;
        for triple in &self.triples {
            match triple.to_quad() {
                Some(quad) => {
                    store
                        .insert(&quad)
                        .map_err(|e| format!("insert failed: {e}"))?;
                }
                None => skipped += 1,
            }
        }
        if skipped > 0 {
            tracing::warn!(skipped, "triples not representable as RDF were left out of the SPARQL store");
        }
        Ok(store)
    }
}

impl FromIterator<Triple> for TripleSet {
    fn from_iter<I: IntoIterator<Item = Triple>>(iter: I) -> Self {
        let mut set = Self::new();
        for triple in iter {
            set.insert(triple);
        }
        set
    }
}

impl Extend<Triple> for TripleSet {
    fn extend<I: IntoIterator<Item = Triple>>(&mut self, iter: I) {
        for triple in iter {
            self.insert(triple);
        }
    }
}

impl<'a> IntoIterator for &'a TripleSet {
    type Item = &'a Triple;
    type IntoIter = std::slice::Iter<'a, Triple>;

    fn into_iter(self) -> Self::IntoIter {
        self.triples.iter()
    }
}
