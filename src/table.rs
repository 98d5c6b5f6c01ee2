//! Tabular projections of the resolved model and of the raw triples.
//!
//! Triple filters are case-insensitive substring matches on the subject,
//! predicate and object columns, combined with AND. An empty pattern places no
//! constraint on its column. Statistics count distinct values, so repeated
//! triples are never double-counted.

use std::collections::HashSet;
use std::fmt;

use serde::Serialize;

use crate::resolve::{Property, ResolvedModel, Vocabulary};
use crate::sparql::QueryResult;
use crate::store::{Term, Triple};

/// A row/column table of display strings.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct Table {
    pub columns: Vec<String>,
    pub rows: Vec<Vec<String>>,
}

impl Table {
    pub fn new(columns: &[&str]) -> Self {
        Self {
            columns: columns.iter().map(|c| c.to_string()).collect(),
            rows: Vec::new(),
        }
    }

    pub fn push(&mut self, row: Vec<String>) {
        debug_assert_eq!(row.len(), self.columns.len());
        self.rows.push(row);
    }

    pub fn len(&self) -> usize {
        self.rows.len()
    }

    pub fn is_empty(&self) -> bool {
        self.rows.is_empty()
    }

    pub fn column(&self, name: &str) -> Option<usize> {
        self.columns.iter().position(|c| c == name)
    }

    /// All values of a column, top to bottom.
    pub fn column_values(&self, name: &str) -> Vec<&str> {
        match self.column(name) {
            Some(i) => self.rows.iter().map(|row| row[i].as_str()).collect(),
            None => Vec::new(),
        }
    }
}

impl From<&QueryResult> for Table {
    fn from(result: &QueryResult) -> Self {
        let rows = result
            .rows
            .iter()
            .map(|row| {
                result
                    .columns
                    .iter()
                    .map(|c| row.get(c).cloned().unwrap_or_default())
                    .collect()
            })
            .collect();
        Self {
            columns: result.columns.clone(),
            rows,
        }
    }
}

/// Plain-text rendering with padded columns. Multi-line cells are flattened.
impl fmt::Display for Table {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let flatten = |cell: &str| cell.replace('\n', " ");
        let mut widths: Vec<usize> = self.columns.iter().map(|c| c.chars().count()).collect();
        for row in &self.rows {
            for (width, cell) in widths.iter_mut().zip(row) {
                *width = (*width).max(flatten(cell).chars().count());
            }
        }

        let write_row = |f: &mut fmt::Formatter<'_>, cells: &[String]| -> fmt::Result {
            let line = cells
                .iter()
                .zip(&widths)
                .map(|(cell, &width)| format!("{:<width$}", flatten(cell)))
                .collect::<Vec<_>>()
                .join("  ");
            writeln!(f, "{}", line.trim_end())
        };

        write_row(f, &self.columns)?;
        let rule: Vec<String> = widths.iter().map(|&w| "-".repeat(w)).collect();
        write_row(f, &rule)?;
        for row in &self.rows {
            write_row(f, row)?;
        }
        Ok(())
    }
}

/// How RDF terms are written into table cells.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum CellStyle {
    /// IRIs as-is, literals by lexical value.
    #[default]
    Display,
    /// N-Triples term syntax, lossless.
    NTriples,
}

impl CellStyle {
    pub fn render(self, term: &Term) -> String {
        match self {
            Self::Display => term.display(),
            Self::NTriples => term.to_ntriples(),
        }
    }
}

// ---------------------------------------------------------------------------
// Model tables
// ---------------------------------------------------------------------------

/// Labeled classes. Unlabeled classes are left out.
pub fn class_table(model: &ResolvedModel) -> Table {
    let mut table = Table::new(&["URI", "Label"]);
    for class in model.labeled_classes() {
        table.push(vec![class.iri.display(), class.label.display().to_string()]);
    }
    table
}

pub fn instance_table(model: &ResolvedModel) -> Table {
    let mut table = Table::new(&["URI", "Label", "Class"]);
    for instance in model.instances() {
        table.push(vec![
            instance.iri.display(),
            instance.label.display().to_string(),
            instance.class_label.display().to_string(),
        ]);
    }
    table
}

/// Materialized relations only; candidates with an unresolved endpoint are dropped.
pub fn relation_table(model: &ResolvedModel) -> Table {
    let mut table = Table::new(&["Subject", "Predicate", "Object", "Category"]);
    for relation in model.relations() {
        table.push(vec![
            relation.source_label,
            relation.predicate_label,
            relation.target_label,
            relation.category.to_string(),
        ]);
    }
    table
}

pub fn object_property_table(model: &ResolvedModel) -> Table {
    property_table(model.object_properties())
}

pub fn data_property_table(model: &ResolvedModel) -> Table {
    property_table(model.data_properties())
}

fn property_table(properties: &[Property]) -> Table {
    let mut table = Table::new(&["URI", "Label", "Domain", "Range"]);
    for property in properties {
        table.push(vec![
            property.iri.display(),
            property.label.display().to_string(),
            property.domain_label.display().to_string(),
            property.range_label.display().to_string(),
        ]);
    }
    table
}

// ---------------------------------------------------------------------------
// Triple filtering
// ---------------------------------------------------------------------------

/// Case-insensitive substring filter over the triple columns.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct TripleFilter {
    subject: Option<String>,
    predicate: Option<String>,
    object: Option<String>,
}

fn normalize(pattern: Option<&str>) -> Option<String> {
    pattern
        .map(str::trim)
        .filter(|p| !p.is_empty())
        .map(str::to_lowercase)
}

impl TripleFilter {
    pub fn new(subject: Option<&str>, predicate: Option<&str>, object: Option<&str>) -> Self {
        Self {
            subject: normalize(subject),
            predicate: normalize(predicate),
            object: normalize(object),
        }
    }

    pub fn subject(mut self, pattern: &str) -> Self {
        self.subject = normalize(Some(pattern));
        self
    }

    pub fn predicate(mut self, pattern: &str) -> Self {
        self.predicate = normalize(Some(pattern));
        self
    }

    pub fn object(mut self, pattern: &str) -> Self {
        self.object = normalize(Some(pattern));
        self
    }

    /// Whether any column is constrained.
    pub fn is_active(&self) -> bool {
        self.subject.is_some() || self.predicate.is_some() || self.object.is_some()
    }

    /// Terms are matched by their display string.
    pub fn matches(&self, triple: &Triple) -> bool {
        let column = |pattern: &Option<String>, term: &Term| {
            pattern
                .as_deref()
                .is_none_or(|p| term.display().to_lowercase().contains(p))
        };
        column(&self.subject, &triple.subject)
            && column(&self.predicate, &triple.predicate)
            && column(&self.object, &triple.object)
    }

    /// Keep the matching triples, preserving order.
    pub fn apply<'a, I>(&self, triples: I) -> Vec<&'a Triple>
    where
        I: IntoIterator<Item = &'a Triple>,
    {
        triples.into_iter().filter(|t| self.matches(t)).collect()
    }
}

pub fn triple_table<'a, I>(triples: I, style: CellStyle) -> Table
where
    I: IntoIterator<Item = &'a Triple>,
{
    let mut table = Table::new(&["subject", "predicate", "object"]);
    for triple in triples {
        table.push(vec![
            style.render(&triple.subject),
            style.render(&triple.predicate),
            style.render(&triple.object),
        ]);
    }
    table
}

// ---------------------------------------------------------------------------
// Statistics
// ---------------------------------------------------------------------------

/// Distinct-value counts over a (possibly filtered) triple view.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct Statistics {
    pub triples: usize,
    pub subjects: usize,
    pub predicates: usize,
    pub objects: usize,
    pub classes: usize,
    pub instances: usize,
}

impl Statistics {
    /// Classes are subjects typed with a class marker that also carry a literal
    /// label within the given triples, matching [`class_table`]. Instances are
    /// subjects typed with an instance marker, labeled or not.
    pub fn compute<'a, I>(triples: I, vocabulary: &Vocabulary) -> Self
    where
        I: IntoIterator<Item = &'a Triple>,
    {
        let mut distinct = HashSet::new();
        let mut subjects = HashSet::new();
        let mut predicates = HashSet::new();
        let mut objects = HashSet::new();
        let mut classes = HashSet::new();
        let mut labeled = HashSet::new();
        let mut instances = HashSet::new();

        for triple in triples {
            if !distinct.insert(triple) {
                continue;
            }
            subjects.insert(&triple.subject);
            predicates.insert(&triple.predicate);
            objects.insert(&triple.object);
            if triple.predicate == vocabulary.type_predicate {
                if vocabulary.class_markers.contains(&triple.object) {
                    classes.insert(&triple.subject);
                }
                if vocabulary.instance_markers.contains(&triple.object) {
                    instances.insert(&triple.subject);
                }
            } else if triple.object.is_literal() && vocabulary.is_label_predicate(&triple.predicate) {
                labeled.insert(&triple.subject);
            }
        }

        Self {
            triples: distinct.len(),
            subjects: subjects.len(),
            predicates: predicates.len(),
            objects: objects.len(),
            classes: classes.intersection(&labeled).count(),
            instances: instances.len(),
        }
    }

    pub fn to_table(&self) -> Table {
        let mut table = Table::new(&["Statistic", "Count"]);
        for (name, count) in [
            ("Triples", self.triples),
            ("Subjects", self.subjects),
            ("Predicates", self.predicates),
            ("Objects", self.objects),
            ("Classes", self.classes),
            ("Instances", self.instances),
        ] {
            table.push(vec![name.to_string(), count.to_string()]);
        }
        table
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::resolve::resolve;
    use crate::store::TripleSet;
    use crate::vocab;

    fn ex(local: &str) -> Term {
        Term::iri(format!("http://example.org/{local}"))
    }

    fn fixture() -> TripleSet {
        let rdf_type = Term::iri(vocab::RDF_TYPE);
        let label = Term::iri(vocab::RDFS_LABEL);
        [
            Triple::new(ex("Ville"), rdf_type.clone(), Term::iri(vocab::OWL_CLASS)),
            Triple::new(ex("Ville"), label.clone(), Term::literal("Ville")),
            Triple::new(ex("Stade"), rdf_type.clone(), Term::iri(vocab::OWL_CLASS)),
            Triple::new(ex("u1"), rdf_type.clone(), Term::iri(vocab::OWL_NAMED_INDIVIDUAL)),
            Triple::new(ex("u1"), rdf_type.clone(), ex("Ville")),
            Triple::new(ex("u1"), label.clone(), Term::lang_literal("Paris", "fr")),
            Triple::new(ex("u2"), rdf_type.clone(), Term::iri(vocab::OWL_NAMED_INDIVIDUAL)),
            Triple::new(ex("u2"), label.clone(), Term::literal("Lyon")),
            Triple::new(ex("u2"), label.clone(), Term::literal("Lyon")),
        ]
        .into_iter()
        .collect()
    }

    #[test]
    fn class_table_skips_unlabeled_classes() {
        let model = resolve(&fixture(), &Vocabulary::default());
        let table = class_table(&model);
        assert_eq!(table.column_values("Label"), vec!["Ville"]);
    }

    #[test]
    fn instance_table_uses_placeholder() {
        let model = resolve(&fixture(), &Vocabulary::default());
        let table = instance_table(&model);
        assert_eq!(table.column_values("Class"), vec!["Ville", "unresolved"]);
    }

    #[test]
    fn filter_is_and_across_columns_and_case_insensitive() {
        let triples = fixture();
        let filter = TripleFilter::default().subject("U1").predicate("LABEL");
        let matched = filter.apply(&triples);
        assert_eq!(matched.len(), 1);
        assert_eq!(matched[0].object.display(), "Paris");

        let none = TripleFilter::default().subject("u1").object("lyon");
        assert!(none.apply(&triples).is_empty());
    }

    #[test]
    fn empty_pattern_is_no_constraint() {
        let triples = fixture();
        let filter = TripleFilter::new(Some(""), Some("  "), None);
        assert!(!filter.is_active());
        assert_eq!(filter.apply(&triples).len(), triples.len());
    }

    #[test]
    fn filtering_is_idempotent() {
        let triples = fixture();
        let filter = TripleFilter::default().object("i");
        let once = filter.apply(&triples);
        let twice = filter.apply(once.iter().copied());
        assert_eq!(once, twice);
    }

    #[test]
    fn statistics_count_sets_not_rows() {
        let triples = fixture();
        let vocabulary = Vocabulary::default();
        let stats = Statistics::compute(&triples, &vocabulary);
        assert_eq!(stats.triples, 8);
        assert_eq!(stats.subjects, 4);
        assert_eq!(stats.classes, 1);
        assert_eq!(stats.instances, 2);

        let filtered = TripleFilter::default().subject("u2").apply(&triples);
        let stats = Statistics::compute(filtered, &vocabulary);
        assert_eq!(stats.triples, 2);
        assert_eq!(stats.subjects, 1);
        assert_eq!(stats.predicates, 2);
        assert_eq!(stats.classes, 0);
        assert_eq!(stats.instances, 1);
    }

    #[test]
    fn class_count_matches_class_table() {
        let triples = fixture();
        let vocabulary = Vocabulary::default();
        let model = resolve(&triples, &vocabulary);
        let stats = Statistics::compute(&triples, &vocabulary);
        assert_eq!(stats.classes, class_table(&model).len());

        // A class whose label is filtered out of the view is not counted.
        let types_only = TripleFilter::default().predicate("type").apply(&triples);
        assert_eq!(Statistics::compute(types_only, &vocabulary).classes, 0);
    }

    #[test]
    fn triple_table_styles() {
        let triples = fixture();
        let lang = TripleFilter::default().object("paris").apply(&triples);
        let display = triple_table(lang.iter().copied(), CellStyle::Display);
        let ntriples = triple_table(lang, CellStyle::NTriples);
        assert_eq!(display.rows[0][2], "Paris");
        assert_eq!(ntriples.rows[0][2], "\"Paris\"@fr");
        assert_eq!(ntriples.rows[0][0], "<http://example.org/u1>");
    }

    #[test]
    fn renders_padded_text() {
        let mut table = Table::new(&["a", "long"]);
        table.push(vec!["xyz".into(), "1".into()]);
        let text = table.to_string();
        assert_eq!(text, "a    long\n---  ----\nxyz  1\n");
    }
}
