//! Local SPARQL evaluation over the loaded triples, backed by oxigraph.

use std::sync::mpsc::{self, RecvTimeoutError};
use std::time::Duration;

use oxigraph::sparql::{Query, QueryResults};
use oxigraph::store::Store;

use crate::error::{QueryError, StoreError};
use crate::store::{Term, TripleSet};
use crate::vocab;

use super::{QueryBackend, SparqlResult, Solutions};

/// An in-memory oxigraph store mirroring a [`TripleSet`].
#[derive(Clone)]
pub struct LocalStore {
    store: Store,
}

impl LocalStore {
    pub fn from_triples(triples: &TripleSet) -> Result<Self, StoreError> {
        let store = triples
            .to_oxigraph_store()
            .map_err(|message| StoreError::Backend { message })?;
        Ok(Self { store })
    }
}

impl QueryBackend for LocalStore {
    fn name(&self) -> &str {
        "local"
    }

    /// Evaluation runs on a worker thread; on timeout the worker is abandoned and
    /// finishes in the background without touching the caller's state.
    fn evaluate(&self, query: &str, timeout: Duration) -> SparqlResult<Solutions> {
        #[allow(deprecated)]
        Query::parse(query, None).map_err(|e| QueryError::Syntax {
            message: e.to_string(),
        })?;

        let store = self.store.clone();
        let query = query.to_owned();
        let (tx, rx) = mpsc::channel();
        std::thread::spawn(move || {
            let _ = tx.send(evaluate(&store, &query));
        });

        match rx.recv_timeout(timeout) {
            Ok(result) => result,
            Err(RecvTimeoutError::Timeout) => Err(QueryError::Timeout {
                timeout_ms: timeout.as_millis() as u64,
            }),
            Err(RecvTimeoutError::Disconnected) => Err(QueryError::Evaluation {
                message: "evaluation worker exited without a result".into(),
            }),
        }
    }
}

fn evaluate(store: &Store, query: &str) -> SparqlResult<Solutions> {
    let evaluation_error = |e: &dyn std::fmt::Display| QueryError::Evaluation {
        message: e.to_string(),
    };

    #[allow(deprecated)]
    let results = store.query(query).map_err(|e| evaluation_error(&e))?;

    match results {
        QueryResults::Solutions(solutions) => {
            let variables: Vec<String> = solutions
                .variables()
                .iter()
                .map(|v| v.as_str().to_string())
                .collect();
            let mut rows = Vec::new();
            for solution in solutions {
                let solution = solution.map_err(|e| evaluation_error(&e))?;
                let row = solution
                    .iter()
                    .filter_map(|(var, term)| {
                        Term::from_oxigraph(term.clone()).map(|t| (var.as_str().to_string(), t))
                    })
                    .collect();
                rows.push(row);
            }
            Ok(Solutions { variables, rows })
        }
        QueryResults::Boolean(value) => Ok(Solutions {
            variables: vec!["result".into()],
            rows: vec![vec![(
                "result".into(),
                Term::typed_literal(value.to_string(), vocab::XSD_BOOLEAN),
            )]],
        }),
        QueryResults::Graph(triples) => {
            let mut rows = Vec::new();
            for triple in triples {
                let triple = triple.map_err(|e| evaluation_error(&e))?;
                let subject = Term::from_oxigraph(triple.subject.into());
                let object = Term::from_oxigraph(triple.object);
                if let (Some(subject), Some(object)) = (subject, object) {
                    rows.push(vec![
                        ("subject".to_string(), subject),
                        ("predicate".to_string(), Term::Iri(triple.predicate.into_string())),
                        ("object".to_string(), object),
                    ]);
                }
            }
            Ok(Solutions {
                variables: vec!["subject".into(), "predicate".into(), "object".into()],
                rows,
            })
        }
    }
}

impl std::fmt::Debug for LocalStore {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("LocalStore").finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::store::Triple;

    fn ex(local: &str) -> Term {
        Term::iri(format!("http://example.org/{local}"))
    }

    fn store() -> LocalStore {
        let triples: TripleSet = [
            Triple::new(ex("u1"), Term::iri(vocab::RDF_TYPE), Term::iri(vocab::OWL_NAMED_INDIVIDUAL)),
            Triple::new(ex("u1"), Term::iri(vocab::RDFS_LABEL), Term::lang_literal("Paris", "fr")),
            Triple::new(ex("u2"), Term::iri(vocab::RDFS_LABEL), Term::literal("Lyon")),
        ]
        .into_iter()
        .collect();
        LocalStore::from_triples(&triples).unwrap()
    }

    const TIMEOUT: Duration = Duration::from_secs(10);

    #[test]
    fn select_keeps_projection_order() {
        let solutions = store()
            .evaluate(
                "SELECT ?label ?s WHERE { ?s <http://www.w3.org/2000/01/rdf-schema#label> ?label } ORDER BY ?label",
                TIMEOUT,
            )
            .unwrap();
        assert_eq!(solutions.variables, vec!["label", "s"]);
        assert_eq!(solutions.rows.len(), 2);
        let lyon = ("label".to_string(), Term::literal("Lyon"));
        assert!(solutions.rows.iter().any(|row| row.contains(&lyon)));
    }

    #[test]
    fn ask_yields_result_column() {
        let solutions = store()
            .evaluate("ASK { <http://example.org/u1> ?p ?o }", TIMEOUT)
            .unwrap();
        assert_eq!(solutions.variables, vec!["result"]);
        assert_eq!(solutions.rows[0][0].1.display(), "true");
    }

    #[test]
    fn construct_yields_triple_columns() {
        let solutions = store()
            .evaluate(
                "CONSTRUCT { ?s <http://example.org/named> ?o } WHERE { ?s <http://www.w3.org/2000/01/rdf-schema#label> ?o }",
                TIMEOUT,
            )
            .unwrap();
        assert_eq!(solutions.variables, vec!["subject", "predicate", "object"]);
        assert_eq!(solutions.rows.len(), 2);
    }

    #[test]
    fn malformed_query_is_a_syntax_error() {
        let err = store().evaluate("SELEC ?s WHERE {", TIMEOUT).unwrap_err();
        assert!(matches!(err, QueryError::Syntax { .. }));
    }

    #[test]
    fn cross_product_exceeds_budget() {
        let triples: TripleSet = (0..200)
            .map(|i| Triple::new(ex(&format!("s{i}")), ex("p"), Term::literal(i.to_string())))
            .collect();
        let store = LocalStore::from_triples(&triples).unwrap();

        // 200^3 joined rows cannot be counted within a millisecond.
        let err = store
            .evaluate(
                "SELECT (COUNT(*) AS ?n) WHERE { ?a ?b ?c . ?d ?e ?f . ?g ?h ?i }",
                Duration::from_millis(1),
            )
            .unwrap_err();
        assert!(matches!(err, QueryError::Timeout { timeout_ms: 1 }), "got {err:?}");

        // The store stays usable after an abandoned evaluation.
        let solutions = store
            .evaluate("SELECT ?s WHERE { ?s <http://example.org/p> \"7\" }", TIMEOUT)
            .unwrap();
        assert_eq!(solutions.rows.len(), 1);
    }
}
