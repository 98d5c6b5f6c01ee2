//! Entity resolution: classify subjects into classes and named instances,
//! resolve their labels, and collect the relations between them.
//!
//! Resolution never fails. A missing label or type is recorded as
//! [`Resolution::Unresolved`] and dropping incomplete relations is an explicit
//! step ([`ResolvedModel::relations`]) rather than a side effect of lookup.
//!
//! ## Multi-typed instances
//!
//! An instance's display class is chosen among its non-marker `rdf:type`
//! objects sorted by IRI: the first one with a resolvable label wins. All types
//! stay available on [`Instance::types`].

use std::collections::{HashMap, HashSet};
use std::fmt;

use serde::Serialize;

use crate::config::VocabularyConfig;
use crate::store::{Term, TripleSet};
use crate::vocab;

/// Placeholder shown wherever a label or class cannot be resolved.
pub const UNRESOLVED: &str = "unresolved";

/// Outcome of a label lookup.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize)]
pub enum Resolution {
    Resolved(String),
    Unresolved,
}

impl Resolution {
    pub fn label(&self) -> Option<&str> {
        match self {
            Self::Resolved(label) => Some(label),
            Self::Unresolved => None,
        }
    }

    pub fn is_resolved(&self) -> bool {
        matches!(self, Self::Resolved(_))
    }

    /// The label, or the [`UNRESOLVED`] placeholder.
    pub fn display(&self) -> &str {
        self.label().unwrap_or(UNRESOLVED)
    }
}

impl fmt::Display for Resolution {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.display())
    }
}

/// The IRIs that drive classification and labeling.
#[derive(Debug, Clone)]
pub struct Vocabulary {
    pub type_predicate: Term,
    /// Tried in order; the first predicate with a value wins.
    pub label_predicates: Vec<Term>,
    pub class_markers: Vec<Term>,
    pub instance_markers: Vec<Term>,
    /// When set, a label literal in this language beats the first-inserted one.
    pub preferred_language: Option<String>,
}

impl Default for Vocabulary {
    fn default() -> Self {
        Self::from_config(&VocabularyConfig::default())
    }
}

impl Vocabulary {
    pub fn from_config(config: &VocabularyConfig) -> Self {
        let iris = |list: &[String]| list.iter().map(Term::iri).collect::<Vec<_>>();
        Self {
            type_predicate: Term::iri(vocab::RDF_TYPE),
            label_predicates: iris(&config.label_predicates),
            class_markers: iris(&config.class_markers),
            instance_markers: iris(&config.instance_markers),
            preferred_language: config
                .preferred_language
                .as_ref()
                .map(|l| l.to_ascii_lowercase()),
        }
    }

    pub fn is_label_predicate(&self, predicate: &Term) -> bool {
        self.label_predicates.contains(predicate)
    }

    fn is_marker(&self, term: &Term) -> bool {
        self.class_markers.contains(term) || self.instance_markers.contains(term)
    }

    /// Resolve the display label of `subject`.
    ///
    /// Only literal label values count. Without a language preference this is the
    /// first value of the first label predicate that has one.
    pub fn label_of(&self, triples: &TripleSet, subject: &Term) -> Resolution {
        if let Some(language) = &self.preferred_language {
            let preferred = self.label_predicates.iter().find_map(|p| {
                triples
                    .objects(subject, p)
                    .find(|o| o.language() == Some(language.as_str()))
            });
            if let Some(term) = preferred {
                return Resolution::Resolved(term.display());
            }
        }
        self.label_predicates
            .iter()
            .find_map(|p| triples.objects(subject, p).find(|o| o.is_literal()))
            .map(|term| Resolution::Resolved(term.display()))
            .unwrap_or(Resolution::Unresolved)
    }

    /// Label of a predicate, falling back to the IRI's local name.
    pub fn predicate_label(&self, triples: &TripleSet, predicate: &Term) -> String {
        match self.label_of(triples, predicate) {
            Resolution::Resolved(label) => label,
            Resolution::Unresolved => match predicate {
                Term::Iri(iri) => vocab::local_name(iri).to_string(),
                other => other.display(),
            },
        }
    }
}

/// Classification of a subject.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum EntityKind {
    Class,
    Instance,
    Unresolved,
}

/// A class subject (typed with a class marker).
#[derive(Debug, Clone, Serialize)]
pub struct ClassEntity {
    pub iri: Term,
    pub label: Resolution,
}

/// A named individual.
#[derive(Debug, Clone, Serialize)]
pub struct Instance {
    pub iri: Term,
    pub label: Resolution,
    /// The type chosen as display class, if the instance has any non-marker type.
    pub class: Option<Term>,
    pub class_label: Resolution,
    /// All non-marker types, sorted by IRI.
    pub types: Vec<Term>,
}

impl Instance {
    pub fn is_multi_typed(&self) -> bool {
        self.types.len() > 1
    }
}

/// A uniform view over classes and instances.
#[derive(Debug, Clone, Serialize)]
pub struct Entity {
    pub iri: Term,
    pub label: Resolution,
    pub kind: EntityKind,
    /// For instances, the display class label.
    pub class_label: Option<Resolution>,
}

/// A declared object or datatype property.
#[derive(Debug, Clone, Serialize)]
pub struct Property {
    pub iri: Term,
    pub label: Resolution,
    pub domain: Option<Term>,
    pub domain_label: Resolution,
    pub range: Option<Term>,
    pub range_label: Resolution,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "kebab-case")]
pub enum RelationCategory {
    ClassToClass,
    InstanceToInstance,
    InstanceOf,
}

impl RelationCategory {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::ClassToClass => "class-to-class",
            Self::InstanceToInstance => "instance-to-instance",
            Self::InstanceOf => "instance-of",
        }
    }
}

impl fmt::Display for RelationCategory {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A relation whose endpoint labels may still be unresolved.
#[derive(Debug, Clone, Serialize)]
pub struct RelationCandidate {
    pub category: RelationCategory,
    pub source: Term,
    pub source_label: Resolution,
    pub predicate: Term,
    pub predicate_label: String,
    pub target: Term,
    pub target_label: Resolution,
}

impl RelationCandidate {
    /// Materialize the relation if both endpoints have labels.
    pub fn materialize(&self) -> Option<Relation> {
        Some(Relation {
            category: self.category,
            source: self.source.clone(),
            source_label: self.source_label.label()?.to_string(),
            predicate: self.predicate.clone(),
            predicate_label: self.predicate_label.clone(),
            target: self.target.clone(),
            target_label: self.target_label.label()?.to_string(),
        })
    }
}

/// A relation between two labeled entities.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Relation {
    pub category: RelationCategory,
    pub source: Term,
    pub source_label: String,
    pub predicate: Term,
    pub predicate_label: String,
    pub target: Term,
    pub target_label: String,
}

/// Everything derived from one triple set. Rebuilt from scratch on every ingestion.
#[derive(Debug, Clone, Default, Serialize)]
pub struct ResolvedModel {
    classes: Vec<ClassEntity>,
    instances: Vec<Instance>,
    candidates: Vec<RelationCandidate>,
    object_properties: Vec<Property>,
    data_properties: Vec<Property>,
    #[serde(skip)]
    class_index: HashMap<Term, usize>,
    #[serde(skip)]
    instance_index: HashMap<Term, usize>,
}

impl ResolvedModel {
    /// All class subjects, labeled or not, in first-seen order.
    pub fn classes(&self) -> &[ClassEntity] {
        &self.classes
    }

    /// Classes with a resolvable label. Unlabeled classes are invisible in tables and views.
    pub fn labeled_classes(&self) -> impl Iterator<Item = &ClassEntity> {
        self.classes.iter().filter(|c| c.label.is_resolved())
    }

    pub fn instances(&self) -> &[Instance] {
        &self.instances
    }

    pub fn instance(&self, iri: &Term) -> Option<&Instance> {
        self.instance_index.get(iri).map(|&i| &self.instances[i])
    }

    pub fn class(&self, iri: &Term) -> Option<&ClassEntity> {
        self.class_index.get(iri).map(|&i| &self.classes[i])
    }

    pub fn object_properties(&self) -> &[Property] {
        &self.object_properties
    }

    pub fn data_properties(&self) -> &[Property] {
        &self.data_properties
    }

    /// Every relation candidate, including those with unresolved endpoints.
    pub fn candidates(&self) -> &[RelationCandidate] {
        &self.candidates
    }

    /// Relations with both endpoint labels resolved; the rest are dropped.
    pub fn relations(&self) -> Vec<Relation> {
        self.candidates
            .iter()
            .filter_map(RelationCandidate::materialize)
            .collect()
    }

    /// Candidates dropped by [`relations`](Self::relations).
    pub fn dropped_relations(&self) -> impl Iterator<Item = &RelationCandidate> {
        self.candidates
            .iter()
            .filter(|c| !c.source_label.is_resolved() || !c.target_label.is_resolved())
    }

    /// Classify an IRI. Subjects typed both ways count as instances.
    pub fn kind_of(&self, iri: &Term) -> EntityKind {
        if self.instance_index.contains_key(iri) {
            EntityKind::Instance
        } else if self.class_index.contains_key(iri) {
            EntityKind::Class
        } else {
            EntityKind::Unresolved
        }
    }

    /// Classes followed by instances as uniform [`Entity`] records.
    pub fn entities(&self) -> impl Iterator<Item = Entity> + '_ {
        let classes = self.classes.iter().map(|c| Entity {
            iri: c.iri.clone(),
            label: c.label.clone(),
            kind: EntityKind::Class,
            class_label: None,
        });
        let instances = self.instances.iter().map(|i| Entity {
            iri: i.iri.clone(),
            label: i.label.clone(),
            kind: EntityKind::Instance,
            class_label: Some(i.class_label.clone()),
        });
        classes.chain(instances)
    }
}

/// Derive the entity/relationship model from a triple set.
pub fn resolve(triples: &TripleSet, vocabulary: &Vocabulary) -> ResolvedModel {
    let rdf_type = &vocabulary.type_predicate;
    let mut model = ResolvedModel::default();

    // Pass 1: classes.
    for marker in &vocabulary.class_markers {
        for subject in triples.subjects(rdf_type, marker) {
            if model.class_index.contains_key(subject) {
                continue;
            }
            model.class_index.insert(subject.clone(), model.classes.len());
            model.classes.push(ClassEntity {
                iri: subject.clone(),
                label: vocabulary.label_of(triples, subject),
            });
        }
    }

    // Pass 2: instances.
    for marker in &vocabulary.instance_markers {
        for subject in triples.subjects(rdf_type, marker) {
            if model.instance_index.contains_key(subject) || vocabulary.is_marker(subject) {
                continue;
            }
            let instance = resolve_instance(triples, vocabulary, subject);
            model.instance_index.insert(subject.clone(), model.instances.len());
            model.instances.push(instance);
        }
    }

    model.candidates = collect_candidates(triples, vocabulary, &model);
    model.object_properties = collect_properties(triples, vocabulary, vocab::OWL_OBJECT_PROPERTY);
    model.data_properties = collect_properties(triples, vocabulary, vocab::OWL_DATATYPE_PROPERTY);

    let dropped = model.dropped_relations().count();
    tracing::info!(
        classes = model.classes.len(),
        labeled_classes = model.labeled_classes().count(),
        instances = model.instances.len(),
        relations = model.candidates.len() - dropped,
        dropped,
        "resolved entities"
    );
    if dropped > 0 {
        tracing::warn!(dropped, "relations with an unlabeled endpoint left out of the view");
    }
    model
}

fn resolve_instance(triples: &TripleSet, vocabulary: &Vocabulary, subject: &Term) -> Instance {
    let mut types: Vec<Term> = triples
        .objects(subject, &vocabulary.type_predicate)
        .filter(|t| !vocabulary.is_marker(t))
        .cloned()
        .collect();
    types.sort();
    types.dedup();

    let labeled = types.iter().find_map(|t| match vocabulary.label_of(triples, t) {
        Resolution::Resolved(label) => Some((t.clone(), Resolution::Resolved(label))),
        Resolution::Unresolved => None,
    });
    let (class, class_label) = match labeled {
        Some((class, label)) => (Some(class), label),
        None => (types.first().cloned(), Resolution::Unresolved),
    };

    Instance {
        iri: subject.clone(),
        label: vocabulary.label_of(triples, subject),
        class,
        class_label,
        types,
    }
}

/// Instance→instance and class→class relations, each (s, p, o) once.
fn collect_candidates(
    triples: &TripleSet,
    vocabulary: &Vocabulary,
    model: &ResolvedModel,
) -> Vec<RelationCandidate> {
    let mut seen = HashSet::new();
    let mut candidates = Vec::new();
    let mut predicate_labels: HashMap<&Term, String> = HashMap::new();

    let sources = model
        .classes
        .iter()
        .map(|c| (&c.iri, &c.label, RelationCategory::ClassToClass))
        .chain(
            model
                .instances
                .iter()
                .map(|i| (&i.iri, &i.label, RelationCategory::InstanceToInstance)),
        );

    for (subject, subject_label, category) in sources {
        for triple in triples.matching(Some(subject), None, None) {
            let predicate = &triple.predicate;
            if predicate == &vocabulary.type_predicate || vocabulary.is_label_predicate(predicate) {
                continue;
            }
            let target_label = match category {
                RelationCategory::ClassToClass => model.class(&triple.object).map(|c| &c.label),
                _ => model.instance(&triple.object).map(|i| &i.label),
            };
            let Some(target_label) = target_label else {
                continue;
            };
            if !seen.insert((subject, predicate, &triple.object)) {
                continue;
            }
            let predicate_label = predicate_labels
                .entry(predicate)
                .or_insert_with(|| vocabulary.predicate_label(triples, predicate))
                .clone();
            candidates.push(RelationCandidate {
                category,
                source: subject.clone(),
                source_label: subject_label.clone(),
                predicate: predicate.clone(),
                predicate_label,
                target: triple.object.clone(),
                target_label: target_label.clone(),
            });
        }
    }
    candidates
}

fn collect_properties(triples: &TripleSet, vocabulary: &Vocabulary, marker: &str) -> Vec<Property> {
    let marker = Term::iri(marker);
    let domain_predicate = Term::iri(vocab::RDFS_DOMAIN);
    let range_predicate = Term::iri(vocab::RDFS_RANGE);
    let describe = |term: Option<&Term>| match term {
        Some(term) => vocabulary.label_of(triples, term),
        None => Resolution::Unresolved,
    };

    triples
        .subjects(&vocabulary.type_predicate, &marker)
        .into_iter()
        .map(|property| {
            let domain = triples.value(property, &domain_predicate);
            let range = triples.value(property, &range_predicate);
            Property {
                iri: property.clone(),
                label: vocabulary.label_of(triples, property),
                domain_label: describe(domain),
                domain: domain.cloned(),
                range_label: describe(range),
                range: range.cloned(),
            }
        })
        .collect()
}
