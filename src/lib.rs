// thiserror's #[error("...{field}...")] format strings reference struct fields,
// but the compiler doesn't see through the derive macro and reports false positives.
#![allow(unused_assignments)]

//! # ontoscope
//!
//! Inspect RDF/OWL ontologies: load triples from a file, URL or SPARQL
//! endpoint, derive a labeled entity/relationship model, and project it as a
//! node-link graph or as tables.
//!
//! ## Architecture
//!
//! - **Triple store** (`store`): owned RDF terms and an insertion-ordered triple set, parsed with oxigraph
//! - **SPARQL gateway** (`sparql`): local (oxigraph) and remote (HTTP) execution with timeouts
//! - **Entity resolver** (`resolve`): classes, named individuals, labels and relations
//! - **Graph view** (`view`): deduplicated nodes and edges for rendering
//! - **Tables** (`table`): class/instance/property tables, triple filters, statistics
//! - **Session** (`session`): the current derived model, isolated per user
//!
//! ## Library usage
//!
//! ```no_run
//! use ontoscope::config::Config;
//! use ontoscope::session::Session;
//! use ontoscope::store::RdfSource;
//! use ontoscope::view::ViewOptions;
//!
//! let config = Config::default();
//! let mut session = Session::new(&config);
//! session
//!     .ingest(RdfSource::from_arg("ontology.owl", None, config.timeout()))
//!     .unwrap();
//! let view = session.graph_view(&ViewOptions::default()).unwrap();
//! println!("{} nodes, {} edges", view.nodes.len(), view.edges.len());
//! ```

pub mod config;
pub mod error;
pub mod export;
pub mod resolve;
pub mod session;
pub mod sparql;
pub mod store;
pub mod table;
pub mod view;
pub mod vocab;
