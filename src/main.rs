//! ontoscope CLI: inspect RDF/OWL ontologies and SPARQL endpoints.

use std::fs::File;
use std::io::BufWriter;
use std::path::{Path, PathBuf};
use std::time::Duration;

use clap::{Parser, Subcommand, ValueEnum};
use miette::{IntoDiagnostic, Result};

use ontoscope::config::{Config, default_config_path};
use ontoscope::error::{ExportError, OntoResult};
use ontoscope::export;
use ontoscope::session::Session;
use ontoscope::sparql::{QueryResult, Target, catalog};
use ontoscope::store::{RdfSource, SourceFormat};
use ontoscope::table::{self, CellStyle, Statistics, Table, TripleFilter};
use ontoscope::view::{self, GraphView, NodeIdentity};

#[derive(Parser)]
#[command(name = "ontoscope", version, about = "Inspect RDF/OWL ontologies and SPARQL endpoints")]
struct Cli {
    /// Config file (default: $XDG_CONFIG_HOME/ontoscope/config.toml).
    #[arg(long, global = true)]
    config: Option<PathBuf>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(clap::Args)]
struct SourceArgs {
    /// Ontology file path or http(s) URL.
    source: String,

    /// RDF serialization (xml, turtle, ntriples, nquads, trig, n3).
    /// Defaults to the file extension or the HTTP Content-Type.
    #[arg(long)]
    format: Option<SourceFormat>,
}

#[derive(Subcommand)]
enum Commands {
    /// Load an ontology and print its statistics.
    Load {
        #[command(flatten)]
        source: SourceArgs,
    },

    /// Print derived tables.
    Tables {
        #[command(flatten)]
        source: SourceArgs,

        /// Table to print; all of them when omitted.
        #[arg(long, value_enum)]
        kind: Option<TableKind>,
    },

    /// List triples, optionally filtered, and export them as CSV.
    Triples {
        #[command(flatten)]
        source: SourceArgs,

        /// Case-insensitive substring the subject must contain.
        #[arg(long)]
        subject: Option<String>,

        /// Case-insensitive substring the predicate must contain.
        #[arg(long)]
        predicate: Option<String>,

        /// Case-insensitive substring the object must contain.
        #[arg(long)]
        object: Option<String>,

        /// Write the filtered triples to a CSV file.
        #[arg(long)]
        csv: Option<PathBuf>,

        /// Write display strings instead of N-Triples terms (not re-importable).
        #[arg(long)]
        plain: bool,
    },

    /// Build the graph view.
    Graph {
        #[command(flatten)]
        source: SourceArgs,

        /// Leave out class nodes and instance-of edges.
        #[arg(long)]
        no_classes: bool,

        /// Key nodes by IRI instead of label (no merging of same-label entities).
        #[arg(long)]
        by_iri: bool,

        /// Write the view as JSON to a file ("-" for stdout).
        #[arg(long)]
        json: Option<PathBuf>,
    },

    /// Run a SPARQL query against the loaded ontology or a remote endpoint.
    Query {
        /// SPARQL query text.
        query: Option<String>,

        /// Ontology to load for local execution and label substitution.
        #[arg(long)]
        source: Option<String>,

        /// Serialization of --source.
        #[arg(long)]
        format: Option<SourceFormat>,

        /// Named endpoint from the config.
        #[arg(long, conflicts_with = "local")]
        endpoint: Option<String>,

        /// Run against the loaded ontology.
        #[arg(long, requires = "source")]
        local: bool,

        /// Run a query from the catalog (see `ontoscope catalog`).
        #[arg(long, conflicts_with = "query")]
        named: Option<String>,

        /// Timeout in seconds (default from config).
        #[arg(long)]
        timeout: Option<u64>,

        /// Display labels instead of IRIs where the loaded ontology has them.
        #[arg(long)]
        labels: bool,

        /// Write the result as CSV.
        #[arg(long)]
        csv: Option<PathBuf>,

        /// Write the result as a graph in JSON, one node per distinct id ("-" for stdout).
        #[arg(long)]
        graph_json: Option<PathBuf>,

        /// Column keying graph nodes (default: the first column).
        #[arg(long, requires = "graph_json")]
        id_column: Option<String>,

        /// Column holding node labels (default: the id).
        #[arg(long, requires = "graph_json")]
        label_column: Option<String>,

        /// Numeric column scaling node sizes.
        #[arg(long, requires = "graph_json")]
        size_column: Option<String>,
    },

    /// List the named queries.
    Catalog,

    /// Inspect or create the config file.
    Config {
        #[command(subcommand)]
        action: ConfigAction,
    },
}

#[derive(Clone, Copy, ValueEnum)]
enum TableKind {
    Classes,
    Instances,
    Relations,
    ObjectProperties,
    DataProperties,
}

#[derive(Subcommand)]
enum ConfigAction {
    /// Print the effective configuration as TOML.
    Show,
    /// Write the default configuration.
    Init {
        /// Overwrite an existing file.
        #[arg(long)]
        force: bool,
    },
}

fn main() -> Result<()> {
    miette::set_hook(Box::new(|_| {
        Box::new(
            miette::MietteHandlerOpts::new()
                .terminal_links(true)
                .unicode(true)
                .context_lines(3)
                .build(),
        )
    }))
    .ok(); // Ignore error if hook already set (e.g., in tests)

    tracing_subscriber::fmt()
        .with_writer(std::io::stderr)
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("info")),
        )
        .init();

    let cli = Cli::parse();
    let config = Config::load_or_default(cli.config.as_deref())?;

    match cli.command {
        Commands::Load { source } => {
            let session = load_session(&config, &source)?;
            let stats = session.statistics(&TripleFilter::default());
            println!("{}", stats.to_table());
        }

        Commands::Tables { source, kind } => {
            let session = load_session(&config, &source)?;
            let Some(current) = session.current() else {
                miette::bail!("no ontology loaded");
            };
            let model = current.model();
            let tables: Vec<(&str, Table)> = match kind {
                Some(kind) => vec![(kind.title(), kind.build(model))],
                None => TableKind::value_variants()
                    .iter()
                    .map(|kind| (kind.title(), kind.build(model)))
                    .collect(),
            };
            for (title, table) in tables {
                println!("{title} ({}):", table.len());
                println!("{table}");
            }
        }

        Commands::Triples {
            source,
            subject,
            predicate,
            object,
            csv,
            plain,
        } => {
            let session = load_session(&config, &source)?;
            let filter = TripleFilter::new(subject.as_deref(), predicate.as_deref(), object.as_deref());
            let triples = session.filtered_triples(&filter);
            let style = if plain { CellStyle::Display } else { CellStyle::NTriples };

            match csv {
                Some(path) => {
                    let file = File::create(&path).into_diagnostic()?;
                    let written = export::write_triples_csv(BufWriter::new(file), triples, style)?;
                    println!("Wrote {written} triples to {}", path.display());
                }
                None => {
                    println!("{}", table::triple_table(triples, CellStyle::Display));
                }
            }
            println!("{}", session.statistics(&filter).to_table());
        }

        Commands::Graph {
            source,
            no_classes,
            by_iri,
            json,
        } => {
            let session = load_session(&config, &source)?;
            let identity = if by_iri { NodeIdentity::Iri } else { NodeIdentity::Label };
            let options = session
                .view_options()
                .with_classes(!no_classes)
                .with_identity(identity);
            let view = session.graph_view(&options)?;

            match json {
                Some(path) => write_graph(&view, &path)?,
                None => {
                    println!("Nodes ({}):", view.nodes.len());
                    for node in &view.nodes {
                        println!("  \"{}\" [{:?}] {}", node.id, node.kind, node.color);
                    }
                    println!("Edges ({}):", view.edges.len());
                    for edge in &view.edges {
                        println!(
                            "  \"{}\" -{}-> \"{}\" [{}]",
                            edge.source, edge.label, edge.target, edge.category
                        );
                    }
                }
            }
        }

        Commands::Query {
            query,
            source,
            format,
            endpoint,
            local,
            named,
            timeout,
            labels,
            csv,
            graph_json,
            id_column,
            label_column,
            size_column,
        } => {
            let mut session = Session::new(&config);
            if let Some(source) = &source {
                session.ingest(RdfSource::from_arg(source, format, config.timeout()))?;
            }

            let named = match named.as_deref() {
                Some(name) => match catalog::find(name) {
                    Some(entry) => Some(entry),
                    None => miette::bail!("unknown named query \"{name}\" (see `ontoscope catalog`)"),
                },
                None => None,
            };
            let text = match (&query, named) {
                (Some(text), _) => text.as_str(),
                (None, Some(entry)) => entry.text,
                (None, None) => miette::bail!("pass a query or --named NAME"),
            };
            let target = if local {
                Target::Local
            } else if let Some(name) = endpoint {
                Target::Endpoint(name)
            } else if let Some(entry) = named {
                entry.target()
            } else if source.is_some() {
                Target::Local
            } else {
                Target::Endpoint(config.default_endpoint.clone())
            };

            let mut options = session.query_options();
            options.resolve_labels = labels;
            if let Some(secs) = timeout {
                options.timeout = Duration::from_secs(secs);
            }

            tracing::info!(%target, timeout_secs = options.timeout.as_secs(), "running query");
            let result = session.query(text, &target, &options)?;
            let table = Table::from(&result);
            match csv {
                Some(path) => {
                    let file = File::create(&path).into_diagnostic()?;
                    export::write_table_csv(BufWriter::new(file), &table)?;
                    println!("Wrote {} rows to {}", table.len(), path.display());
                }
                None if graph_json.is_none() => {
                    println!("{table}");
                    println!("{} rows", table.len());
                }
                None => {}
            }

            if let Some(path) = graph_json {
                let columns = GraphColumns {
                    id: id_column,
                    label: label_column,
                    size: size_column,
                };
                let view = columns.build(&result, &session)?;
                write_graph(&view, &path)?;
            }
        }

        Commands::Catalog => {
            let session = Session::new(&config);
            let gateway = session.gateway();
            println!("Endpoints:");
            for name in gateway.endpoint_names() {
                if let Some(endpoint) = gateway.endpoint(name) {
                    println!("  {name:<26} {:?} {}", endpoint.method(), endpoint.url());
                }
            }
            println!("Named queries ({}):", catalog::all().len());
            for entry in catalog::all() {
                println!(
                    "  {:<26} [{}] {}",
                    entry.name,
                    entry.target(),
                    entry.description
                );
            }
        }

        Commands::Config { action } => match action {
            ConfigAction::Show => {
                let toml = toml::to_string_pretty(&config).into_diagnostic()?;
                println!("{toml}");
            }
            ConfigAction::Init { force } => {
                let path = match cli.config {
                    Some(path) => path,
                    None => default_config_path()?,
                };
                if path.exists() && !force {
                    miette::bail!("{} already exists (use --force to overwrite)", path.display());
                }
                Config::default().save(&path)?;
                println!("Wrote default config to {}", path.display());
            }
        },
    }

    Ok(())
}

fn load_session(config: &Config, args: &SourceArgs) -> OntoResult<Session> {
    let mut session = Session::new(config);
    let derived = session.ingest(RdfSource::from_arg(&args.source, args.format, config.timeout()))?;
    let stats = Statistics::compute(derived.triples(), session.vocabulary());
    tracing::info!(
        source = derived.source(),
        triples = stats.triples,
        classes = derived.model().labeled_classes().count(),
        instances = derived.model().instances().len(),
        "loaded ontology"
    );
    Ok(session)
}

/// Write a graph view as JSON to a file, or to stdout for "-".
fn write_graph(view: &GraphView, path: &Path) -> OntoResult<()> {
    if path.as_os_str() == "-" {
        export::write_graph_json(std::io::stdout().lock(), view)?;
        println!();
        return Ok(());
    }
    let file = File::create(path).map_err(ExportError::from)?;
    export::write_graph_json(BufWriter::new(file), view)?;
    println!(
        "Wrote {} nodes and {} edges to {}",
        view.nodes.len(),
        view.edges.len(),
        path.display()
    );
    Ok(())
}

/// Which result columns feed `query --graph-json`.
struct GraphColumns {
    id: Option<String>,
    label: Option<String>,
    size: Option<String>,
}

impl GraphColumns {
    fn build(&self, result: &QueryResult, session: &Session) -> Result<GraphView> {
        let Some(id) = self.id.as_ref().or(result.columns.first()) else {
            miette::bail!("the query returned no columns to key graph nodes by");
        };
        for column in [Some(id), self.label.as_ref(), self.size.as_ref()].into_iter().flatten() {
            if !result.columns.contains(column) {
                miette::bail!(
                    "no column \"{column}\" in the result (columns: {})",
                    result.columns.join(", ")
                );
            }
        }
        Ok(view::from_query_result(
            result,
            id,
            self.label.as_deref(),
            self.size.as_deref(),
            &session.view_options(),
        ))
    }
}

impl TableKind {
    fn title(self) -> &'static str {
        match self {
            Self::Classes => "Classes",
            Self::Instances => "Instances",
            Self::Relations => "Instance relations",
            Self::ObjectProperties => "Object properties",
            Self::DataProperties => "Data properties",
        }
    }

    fn build(self, model: &ontoscope::resolve::ResolvedModel) -> Table {
        match self {
            Self::Classes => table::class_table(model),
            Self::Instances => table::instance_table(model),
            Self::Relations => table::relation_table(model),
            Self::ObjectProperties => table::object_property_table(model),
            Self::DataProperties => table::data_property_table(model),
        }
    }
}
