//! End-to-end integration tests for ontoscope.
//!
//! These tests exercise the full pipeline from ontology ingestion through
//! entity resolution, graph view, tables, export and local SPARQL, validating
//! that the session keeps all of them consistent.

use ontoscope::config::Config;
use ontoscope::error::StoreError;
use ontoscope::export;
use ontoscope::resolve::{RelationCategory, Vocabulary, resolve};
use ontoscope::session::Session;
use ontoscope::sparql::{QueryOptions, Target};
use ontoscope::store::{self, RdfSource, SourceFormat, Term, Triple, TripleSet};
use ontoscope::table::{self, CellStyle, Statistics, TripleFilter};
use ontoscope::view::{self, NodeIdentity, ViewOptions};
use ontoscope::vocab;

const TOURISM_OWL: &str = r#"<?xml version="1.0"?>
<rdf:RDF xmlns="http://example.org/tourism#"
         xml:base="http://example.org/tourism"
         xmlns:rdf="http://www.w3.org/1999/02/22-rdf-syntax-ns#"
         xmlns:rdfs="http://www.w3.org/2000/01/rdf-schema#"
         xmlns:owl="http://www.w3.org/2002/07/owl#"
         xmlns:xsd="http://www.w3.org/2001/XMLSchema#">

  <owl:Class rdf:about="http://example.org/tourism#Ville">
    <rdfs:label xml:lang="fr">Ville</rdfs:label>
  </owl:Class>
  <owl:Class rdf:about="http://example.org/tourism#Stade">
    <rdfs:label xml:lang="fr">Stade</rdfs:label>
  </owl:Class>
  <owl:Class rdf:about="http://example.org/tourism#Brouillon"/>

  <owl:ObjectProperty rdf:about="http://example.org/tourism#situeDans">
    <rdfs:label xml:lang="fr">situé dans</rdfs:label>
    <rdfs:domain rdf:resource="http://example.org/tourism#Stade"/>
    <rdfs:range rdf:resource="http://example.org/tourism#Ville"/>
  </owl:ObjectProperty>
  <owl:DatatypeProperty rdf:about="http://example.org/tourism#capacite">
    <rdfs:label xml:lang="fr">capacité</rdfs:label>
    <rdfs:domain rdf:resource="http://example.org/tourism#Stade"/>
    <rdfs:range rdf:resource="http://www.w3.org/2001/XMLSchema#integer"/>
  </owl:DatatypeProperty>

  <owl:NamedIndividual rdf:about="http://example.org/tourism#Paris">
    <rdf:type rdf:resource="http://example.org/tourism#Ville"/>
    <rdfs:label>Paris</rdfs:label>
  </owl:NamedIndividual>
  <owl:NamedIndividual rdf:about="http://example.org/tourism#ParcDesPrinces">
    <rdf:type rdf:resource="http://example.org/tourism#Stade"/>
    <rdfs:label>Parc des Princes</rdfs:label>
    <situeDans rdf:resource="http://example.org/tourism#Paris"/>
    <capacite rdf:datatype="http://www.w3.org/2001/XMLSchema#integer">47929</capacite>
  </owl:NamedIndividual>
  <owl:NamedIndividual rdf:about="http://example.org/tourism#Anonyme">
    <rdf:type rdf:resource="http://example.org/tourism#Stade"/>
    <situeDans rdf:resource="http://example.org/tourism#Paris"/>
  </owl:NamedIndividual>
</rdf:RDF>
"#;

fn owl_source() -> RdfSource {
    RdfSource::Content {
        bytes: TOURISM_OWL.as_bytes().to_vec(),
        format: SourceFormat::RdfXml,
        base_iri: None,
    }
}

fn loaded_session() -> Session {
    let mut session = Session::new(&Config::default());
    session.ingest(owl_source()).unwrap();
    session
}

fn ex(local: &str) -> Term {
    Term::iri(format!("http://example.org/{local}"))
}

#[test]
fn owl_file_end_to_end() {
    let dir = tempfile::TempDir::new().unwrap();
    let path = dir.path().join("tourism.owl");
    std::fs::write(&path, TOURISM_OWL).unwrap();

    let mut session = Session::new(&Config::default());
    let derived = session
        .ingest(RdfSource::from_arg(path.to_str().unwrap(), None, Config::default().timeout()))
        .unwrap();
    let model = derived.model();

    // Unlabeled class "Brouillon" is invisible.
    assert_eq!(model.classes().len(), 3);
    assert_eq!(
        table::class_table(model).column_values("Label"),
        vec!["Ville", "Stade"]
    );

    let instances = table::instance_table(model);
    assert_eq!(instances.column_values("Label"), vec!["Paris", "Parc des Princes", "unresolved"]);
    assert_eq!(instances.column_values("Class"), vec!["Ville", "Stade", "Stade"]);

    // Only the labeled stadium yields a relation.
    let relations = table::relation_table(model);
    assert_eq!(relations.len(), 1);
    assert_eq!(relations.rows[0], vec!["Parc des Princes", "situé dans", "Paris", "instance-to-instance"]);
    assert_eq!(model.dropped_relations().count(), 1);

    let object_properties = table::object_property_table(model);
    assert_eq!(object_properties.rows[0], vec![
        "http://example.org/tourism#situeDans",
        "situé dans",
        "Stade",
        "Ville",
    ]);
    let data_properties = table::data_property_table(model);
    assert_eq!(data_properties.column_values("Label"), vec!["capacité"]);
}

#[test]
fn graph_view_of_loaded_ontology() {
    let session = loaded_session();
    let view = session.graph_view(&ViewOptions::default()).unwrap();

    assert_eq!(view.nodes.len(), 4);
    assert!(view.contains("Paris"));
    assert!(view.contains("Parc des Princes"));
    assert!(!view.contains("unresolved"));

    let categories: Vec<_> = view.edges.iter().map(|e| e.category).collect();
    assert_eq!(
        categories,
        vec![
            RelationCategory::InstanceToInstance,
            RelationCategory::InstanceOf,
            RelationCategory::InstanceOf,
        ]
    );
    assert_eq!(view.node("Paris").unwrap().color, "#FF9999");
    assert_eq!(view.node("Parc des Princes").unwrap().color, "#99FF99");
}

#[test]
fn paris_scenario() {
    let triples: TripleSet = [
        Triple::new(ex("u1"), Term::iri(vocab::RDF_TYPE), Term::iri(vocab::OWL_NAMED_INDIVIDUAL)),
        Triple::new(ex("u1"), Term::iri(vocab::RDF_TYPE), ex("Ville")),
        Triple::new(ex("u1"), Term::iri(vocab::RDFS_LABEL), Term::literal("Paris")),
        Triple::new(ex("Ville"), Term::iri(vocab::RDFS_LABEL), Term::literal("Ville")),
    ]
    .into_iter()
    .collect();

    let mut session = Session::new(&Config::default());
    let derived = session.ingest(RdfSource::Triples(triples)).unwrap();
    let instance = &derived.model().instances()[0];
    assert_eq!(instance.label.display(), "Paris");
    assert_eq!(instance.class_label.display(), "Ville");

    let view = session.graph_view(&ViewOptions::default()).unwrap();
    assert_eq!(view.nodes.len(), 2);
    assert_eq!(view.edges.len(), 1);
    assert_eq!(view.edges[0].category, RelationCategory::InstanceOf);
}

#[test]
fn same_label_different_classes_collapse() {
    let rdf_type = Term::iri(vocab::RDF_TYPE);
    let label = Term::iri(vocab::RDFS_LABEL);
    let individual = Term::iri(vocab::OWL_NAMED_INDIVIDUAL);
    let triples: TripleSet = [
        Triple::new(ex("a"), rdf_type.clone(), individual.clone()),
        Triple::new(ex("a"), rdf_type.clone(), ex("Ville")),
        Triple::new(ex("a"), label.clone(), Term::literal("Nice")),
        Triple::new(ex("b"), rdf_type.clone(), individual),
        Triple::new(ex("b"), rdf_type, ex("Stade")),
        Triple::new(ex("b"), label, Term::literal("Nice")),
    ]
    .into_iter()
    .collect();
    let model = resolve(&triples, &Vocabulary::default());

    let options = ViewOptions::default().with_classes(false);
    assert_eq!(view::build(&model, &options).nodes.len(), 1);
    let by_iri = options.with_identity(NodeIdentity::Iri);
    assert_eq!(view::build(&model, &by_iri).nodes.len(), 2);
}

#[test]
fn unlabeled_object_yields_no_edges() {
    let rdf_type = Term::iri(vocab::RDF_TYPE);
    let individual = Term::iri(vocab::OWL_NAMED_INDIVIDUAL);
    let triples: TripleSet = [
        Triple::new(ex("a"), rdf_type.clone(), individual.clone()),
        Triple::new(ex("a"), Term::iri(vocab::RDFS_LABEL), Term::literal("A")),
        Triple::new(ex("b"), rdf_type, individual),
        Triple::new(ex("a"), ex("knows"), ex("b")),
        Triple::new(ex("a"), ex("likes"), ex("b")),
    ]
    .into_iter()
    .collect();
    let model = resolve(&triples, &Vocabulary::default());
    assert!(model.relations().is_empty());
    assert_eq!(model.dropped_relations().count(), 2);
    let view = view::build(&model, &ViewOptions::default());
    assert!(view.edges.iter().all(|e| e.target != "b" && e.source != "b"));
    assert!(view.edges.is_empty());
}

#[test]
fn filter_idempotence_and_filtered_statistics() {
    let session = loaded_session();
    let filter = TripleFilter::default().predicate("LABEL").object("par");
    let once = session.filtered_triples(&filter);
    let twice = filter.apply(once.iter().copied());
    assert_eq!(once, twice);
    assert_eq!(once.len(), 2);

    let stats = session.statistics(&filter);
    assert_eq!(stats.triples, 2);
    assert_eq!(stats.subjects, 2);
    assert_eq!(stats.predicates, 1);
    assert_eq!(stats.instances, 0);

    let full = session.statistics(&TripleFilter::default());
    // "Brouillon" has no label and is not a reported class.
    assert_eq!(full.classes, 2);
    assert_eq!(full.classes, table::class_table(session.current().unwrap().model()).len());
    assert_eq!(full.instances, 3);
}

#[test]
fn csv_round_trip_preserves_cardinality() {
    let session = loaded_session();
    let current = session.current().unwrap();
    let original = current.triples();

    let dir = tempfile::TempDir::new().unwrap();
    let path = dir.path().join("triples.csv");
    let file = std::fs::File::create(&path).unwrap();
    export::write_triples_csv(file, original, CellStyle::NTriples).unwrap();

    let reread = export::read_triples_csv(std::fs::File::open(&path).unwrap()).unwrap();
    assert_eq!(reread.distinct_len(), original.distinct_len());

    let vocabulary = Vocabulary::default();
    assert_eq!(
        Statistics::compute(&reread, &vocabulary),
        Statistics::compute(original, &vocabulary)
    );
}

#[test]
fn failed_ingestion_keeps_prior_state() {
    let mut session = loaded_session();
    let before = session.current().unwrap().triples().len();

    let err = session
        .ingest(RdfSource::from_arg("/nonexistent/ontology.owl", None, Config::default().timeout()))
        .unwrap_err();
    assert!(matches!(err, StoreError::Io { .. }));

    let err = session
        .ingest(RdfSource::Content {
            bytes: b"<rdf:RDF".to_vec(),
            format: SourceFormat::RdfXml,
            base_iri: None,
        })
        .unwrap_err();
    assert!(matches!(err, StoreError::Parse { .. }));

    assert_eq!(session.current().unwrap().triples().len(), before);
}

#[test]
fn local_query_matches_tables() {
    let session = loaded_session();
    let result = session
        .query(
            "PREFIX owl: <http://www.w3.org/2002/07/owl#> SELECT ?c WHERE { ?c a owl:Class }",
            &Target::Local,
            &session.query_options(),
        )
        .unwrap();
    assert_eq!(result.columns, vec!["c"]);
    assert_eq!(result.len(), 3);

    let mut options = session.query_options();
    options.resolve_labels = true;
    let labeled = session
        .query(
            "SELECT ?s WHERE { ?s <http://example.org/tourism#situeDans> ?o } ORDER BY ?s",
            &Target::Local,
            &options,
        )
        .unwrap();
    let mut cells: Vec<_> = (0..labeled.len()).map(|i| labeled.cell(i, "s").to_string()).collect();
    cells.sort();
    assert_eq!(cells, vec!["Parc des Princes", "http://example.org/tourism#Anonyme"]);
}

#[test]
fn query_result_as_sized_graph() {
    let session = loaded_session();
    let result = session
        .query(
            "PREFIX t: <http://example.org/tourism#> \
             SELECT ?s ?cap WHERE { ?s a t:Stade . OPTIONAL { ?s t:capacite ?cap } }",
            &Target::Local,
            &QueryOptions {
                resolve_labels: true,
                ..session.query_options()
            },
        )
        .unwrap();
    let graph = view::from_query_result(&result, "s", None, Some("cap"), &session.view_options());
    assert_eq!(graph.nodes.len(), 2);
    let parc = graph.node("Parc des Princes").unwrap();
    assert_eq!(parc.value, Some(47929.0));
    assert_eq!(parc.size, (view::RESULT_MIN_SIZE + view::RESULT_MAX_SIZE) / 2);
    let anonyme = graph.node("http://example.org/tourism#Anonyme").unwrap();
    assert_eq!(anonyme.size, view::INSTANCE_NODE_SIZE);

    let dir = tempfile::TempDir::new().unwrap();
    let path = dir.path().join("graph.json");
    export::write_graph_json(std::fs::File::create(&path).unwrap(), &graph).unwrap();
    let json: serde_json::Value = serde_json::from_slice(&std::fs::read(&path).unwrap()).unwrap();
    assert_eq!(json["nodes"].as_array().unwrap().len(), 2);
    assert!(json["edges"].as_array().unwrap().is_empty());
}

#[test]
fn load_is_reentrant_and_lazy() {
    let triples = store::load(owl_source()).unwrap();
    let paris = Term::iri("http://example.org/tourism#Paris");
    let first: Vec<_> = triples.matching(Some(&paris), None, None).collect();
    let second: Vec<_> = triples.matching(Some(&paris), None, None).collect();
    assert_eq!(first, second);
    assert_eq!(
        triples.value(&paris, &Term::iri(vocab::RDFS_LABEL)),
        Some(&Term::literal("Paris"))
    );
}
