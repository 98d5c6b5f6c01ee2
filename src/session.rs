//! Session context: the current derived model and the operations over it.
//!
//! A [`Session`] owns at most one [`DerivedModel`]. Ingestion builds a
//! complete new model and swaps it in only on success, so a failed attempt
//! leaves the previous model in place. Sessions never share mutable state;
//! [`SessionRegistry`] keeps one per id for hosts serving several users.

use std::sync::{Arc, Mutex, PoisonError};

use dashmap::DashMap;

use crate::config::Config;
use crate::error::{QueryError, StoreError};
use crate::resolve::{ResolvedModel, Vocabulary, resolve};
use crate::sparql::local::LocalStore;
use crate::sparql::{Gateway, QueryOptions, QueryResult, SparqlResult, Target};
use crate::store::{self, RdfSource, Triple, TripleSet};
use crate::table::{Statistics, TripleFilter};
use crate::view::{self, GraphView, ViewOptions};

/// Everything derived from one ingestion. Immutable once built.
#[derive(Debug)]
pub struct DerivedModel {
    source: String,
    triples: TripleSet,
    store: LocalStore,
    model: ResolvedModel,
}

impl DerivedModel {
    pub fn derive(
        source: impl Into<String>,
        triples: TripleSet,
        vocabulary: &Vocabulary,
    ) -> Result<Self, StoreError> {
        let store = LocalStore::from_triples(&triples)?;
        let model = resolve(&triples, vocabulary);
        Ok(Self {
            source: source.into(),
            triples,
            store,
            model,
        })
    }

    /// Description of where the triples came from.
    pub fn source(&self) -> &str {
        &self.source
    }

    pub fn triples(&self) -> &TripleSet {
        &self.triples
    }

    pub fn store(&self) -> &LocalStore {
        &self.store
    }

    pub fn model(&self) -> &ResolvedModel {
        &self.model
    }
}

#[derive(Debug, Clone)]
pub struct Session {
    vocabulary: Vocabulary,
    view: ViewOptions,
    gateway: Arc<Gateway>,
    timeout: std::time::Duration,
    current: Option<Arc<DerivedModel>>,
}

impl Session {
    pub fn new(config: &Config) -> Self {
        Self::with_gateway(config, Arc::new(Gateway::from_config(config)))
    }

    pub fn with_gateway(config: &Config, gateway: Arc<Gateway>) -> Self {
        Self {
            vocabulary: Vocabulary::from_config(&config.vocabulary),
            view: ViewOptions::from_config(&config.view),
            gateway,
            timeout: config.timeout(),
            current: None,
        }
    }

    pub fn vocabulary(&self) -> &Vocabulary {
        &self.vocabulary
    }

    pub fn gateway(&self) -> &Gateway {
        &self.gateway
    }

    /// View options from the configuration; callers adjust them per request.
    pub fn view_options(&self) -> ViewOptions {
        self.view.clone()
    }

    /// Default options for [`query`](Self::query).
    pub fn query_options(&self) -> QueryOptions {
        QueryOptions {
            timeout: self.timeout,
            resolve_labels: false,
        }
    }

    pub fn current(&self) -> Option<&Arc<DerivedModel>> {
        self.current.as_ref()
    }

    pub fn is_loaded(&self) -> bool {
        self.current.is_some()
    }

    /// Load and derive a new model. On failure the previous model is kept.
    pub fn ingest(&mut self, source: RdfSource) -> Result<Arc<DerivedModel>, StoreError> {
        let description = source.describe();
        let derived = store::load(source)
            .and_then(|triples| DerivedModel::derive(description.as_str(), triples, &self.vocabulary));
        match derived {
            Ok(derived) => {
                let derived = Arc::new(derived);
                self.current = Some(Arc::clone(&derived));
                Ok(derived)
            }
            Err(e) => {
                tracing::warn!(
                    source = %description,
                    kept_previous = self.current.is_some(),
                    error = %e,
                    "ingestion failed"
                );
                Err(e)
            }
        }
    }

    /// Drop the current model.
    pub fn clear(&mut self) {
        self.current = None;
    }

    /// Run a query. Label substitution uses the current model's triples when loaded.
    pub fn query(&self, query: &str, target: &Target, options: &QueryOptions) -> SparqlResult<QueryResult> {
        let current = self.current.as_deref();
        self.gateway.execute(
            query,
            target,
            current.map(DerivedModel::store),
            current.map(|c| (c.triples(), &self.vocabulary)),
            options,
        )
    }

    pub fn graph_view(&self, options: &ViewOptions) -> Result<GraphView, QueryError> {
        let current = self.current.as_deref().ok_or(QueryError::NotLoaded)?;
        Ok(view::build(current.model(), options))
    }

    pub fn filtered_triples(&self, filter: &TripleFilter) -> Vec<&Triple> {
        match &self.current {
            Some(current) => filter.apply(current.triples()),
            None => Vec::new(),
        }
    }

    /// Statistics over the filtered view, or the full view when the filter is inactive.
    pub fn statistics(&self, filter: &TripleFilter) -> Statistics {
        Statistics::compute(self.filtered_triples(filter), &self.vocabulary)
    }
}

/// Isolated sessions keyed by id.
///
/// Each session sits behind its own mutex. The map's shard lock is only held
/// while looking a session up, never while a session is in use.
#[derive(Debug)]
pub struct SessionRegistry {
    config: Config,
    gateway: Arc<Gateway>,
    sessions: DashMap<String, Arc<Mutex<Session>>>,
}

impl SessionRegistry {
    pub fn new(config: Config) -> Self {
        let gateway = Arc::new(Gateway::from_config(&config));
        Self {
            config,
            gateway,
            sessions: DashMap::new(),
        }
    }

    fn session(&self, id: &str) -> Arc<Mutex<Session>> {
        let entry = self.sessions.entry(id.to_string()).or_insert_with(|| {
            Arc::new(Mutex::new(Session::with_gateway(
                &self.config,
                Arc::clone(&self.gateway),
            )))
        });
        Arc::clone(entry.value())
    }

    /// Run `f` on the session `id`, creating it on first use.
    ///
    /// Only session `id` is locked for the duration of `f`. Calling back into
    /// the registry for the same id from inside `f` deadlocks.
    pub fn with_session<R>(&self, id: &str, f: impl FnOnce(&mut Session) -> R) -> R {
        let session = self.session(id);
        // A panic inside `f` cannot leave a half-swapped model behind, so a
        // poisoned session is still consistent.
        let mut guard = session.lock().unwrap_or_else(PoisonError::into_inner);
        f(&mut guard)
    }

    /// The current model of session `id`, if any.
    pub fn current(&self, id: &str) -> Option<Arc<DerivedModel>> {
        let session = self.sessions.get(id).map(|entry| Arc::clone(entry.value()))?;
        let guard = session.lock().unwrap_or_else(PoisonError::into_inner);
        guard.current().cloned()
    }

    pub fn remove(&self, id: &str) -> bool {
        self.sessions.remove(id).is_some()
    }

    pub fn len(&self) -> usize {
        self.sessions.len()
    }

    pub fn is_empty(&self) -> bool {
        self.sessions.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::store::SourceFormat;

    const PARIS: &str = r#"
        @prefix ex: <http://example.org/> .
        @prefix owl: <http://www.w3.org/2002/07/owl#> .
        @prefix rdfs: <http://www.w3.org/2000/01/rdf-schema#> .

        ex:u1 a owl:NamedIndividual , ex:Ville ; rdfs:label "Paris" .
        ex:Ville rdfs:label "Ville" .
    "#;

    fn turtle(text: &str) -> RdfSource {
        RdfSource::Content {
            bytes: text.as_bytes().to_vec(),
            format: SourceFormat::Turtle,
            base_iri: None,
        }
    }

    #[test]
    fn failed_ingestion_keeps_previous_model() {
        let mut session = Session::new(&Config::default());
        session.ingest(turtle(PARIS)).unwrap();
        assert_eq!(session.current().unwrap().triples().len(), 4);

        let err = session.ingest(turtle("ex:broken a")).unwrap_err();
        assert!(matches!(err, StoreError::Parse { .. }));
        assert_eq!(session.current().unwrap().triples().len(), 4);
    }

    #[test]
    fn successful_ingestion_replaces_model() {
        let mut session = Session::new(&Config::default());
        session.ingest(turtle(PARIS)).unwrap();
        session
            .ingest(turtle("<http://example.org/a> <http://example.org/b> <http://example.org/c> ."))
            .unwrap();
        assert_eq!(session.current().unwrap().triples().len(), 1);
        assert!(session.current().unwrap().model().instances().is_empty());

        session.clear();
        assert!(!session.is_loaded());
    }

    #[test]
    fn local_query_requires_a_model() {
        let session = Session::new(&Config::default());
        let err = session
            .query("SELECT * WHERE { ?s ?p ?o }", &Target::Local, &session.query_options())
            .unwrap_err();
        assert!(matches!(err, QueryError::NotLoaded));
        assert!(matches!(
            session.graph_view(&session.view_options()),
            Err(QueryError::NotLoaded)
        ));
    }

    #[test]
    fn query_with_labels() {
        let mut session = Session::new(&Config::default());
        session.ingest(turtle(PARIS)).unwrap();
        let options = QueryOptions {
            resolve_labels: true,
            ..session.query_options()
        };
        let result = session
            .query(
                "SELECT ?s WHERE { ?s a <http://www.w3.org/2002/07/owl#NamedIndividual> }",
                &Target::Local,
                &options,
            )
            .unwrap();
        assert_eq!(result.cell(0, "s"), "Paris");
    }

    #[test]
    fn statistics_follow_filter() {
        let mut session = Session::new(&Config::default());
        session.ingest(turtle(PARIS)).unwrap();
        let all = session.statistics(&TripleFilter::default());
        assert_eq!(all.subjects, 2);
        assert_eq!(all.instances, 1);
        let filtered = session.statistics(&TripleFilter::default().subject("ville"));
        assert_eq!(filtered.subjects, 1);
        assert_eq!(filtered.instances, 0);
    }

    #[test]
    fn registry_isolates_sessions() {
        let registry = SessionRegistry::new(Config::default());
        registry
            .with_session("alice", |s| s.ingest(turtle(PARIS)))
            .unwrap();
        registry.with_session("bob", |s| assert!(!s.is_loaded()));

        assert_eq!(registry.len(), 2);
        assert!(registry.current("alice").is_some());
        assert!(registry.current("bob").is_none());

        assert!(registry.remove("alice"));
        assert!(registry.current("alice").is_none());
    }

    #[test]
    fn busy_session_does_not_block_others() {
        use std::sync::mpsc;
        use std::time::{Duration, Instant};

        let registry = SessionRegistry::new(Config::default());
        let (started_tx, started_rx) = mpsc::channel();

        std::thread::scope(|scope| {
            scope.spawn(|| {
                registry.with_session("alice", |_| {
                    started_tx.send(()).unwrap();
                    std::thread::sleep(Duration::from_millis(1500));
                });
            });
            started_rx.recv().unwrap();

            // Enough ids to land in every shard, including alice's.
            let begin = Instant::now();
            for i in 0..128 {
                let id = format!("user{i}");
                registry
                    .with_session(&id, |s| s.ingest(turtle(PARIS)).map(|_| ()))
                    .unwrap();
                assert!(registry.current(&id).is_some());
            }
            assert!(
                begin.elapsed() < Duration::from_millis(1200),
                "other sessions waited {:?}",
                begin.elapsed()
            );
        });
        assert_eq!(registry.len(), 129);
    }

    #[test]
    fn session_can_consult_registry_for_another_id() {
        let registry = SessionRegistry::new(Config::default());
        registry
            .with_session("bob", |s| s.ingest(turtle(PARIS)))
            .unwrap();
        let seen = registry.with_session("alice", |_| registry.current("bob").is_some());
        assert!(seen);
    }
}
