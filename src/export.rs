//! Export of triple tables, generic tables and graph views.
//!
//! Triple tables are CSV with `subject,predicate,object` columns. With
//! [`CellStyle::NTriples`] every cell is an N-Triples term, so the file can be
//! read back with [`read_triples_csv`] without losing literals' language tags
//! or datatypes.

use std::io::{Read, Write};

use crate::error::ExportError;
use crate::store::load::parse;
use crate::store::{SourceFormat, Triple, TripleSet};
use crate::table::{CellStyle, Table, triple_table};
use crate::view::GraphView;

pub type ExportResult<T> = std::result::Result<T, ExportError>;

/// Write triples as CSV.
pub fn write_triples_csv<'a, W, I>(writer: W, triples: I, style: CellStyle) -> ExportResult<usize>
where
    W: Write,
    I: IntoIterator<Item = &'a Triple>,
{
    let table = triple_table(triples, style);
    write_table_csv(writer, &table)?;
    Ok(table.len())
}

/// Read back a triple CSV written with [`CellStyle::NTriples`].
pub fn read_triples_csv<R: Read>(reader: R) -> ExportResult<TripleSet> {
    let mut csv = csv::Reader::from_reader(reader);
    let mut triples = TripleSet::new();
    for (index, record) in csv.records().enumerate() {
        let record = record?;
        // Row 1 is the header.
        let row = index + 2;
        let [subject, predicate, object] = [0, 1, 2].map(|i| record.get(i).unwrap_or_default());
        if record.len() != 3 || subject.is_empty() || predicate.is_empty() || object.is_empty() {
            return Err(ExportError::Parse {
                row,
                message: format!("expected 3 non-empty cells, found {}", record.len()),
            });
        }
        let line = format!("{subject} {predicate} {object} .\n");
        let parsed = parse(line.as_bytes(), SourceFormat::NTriples, None).map_err(|e| {
            ExportError::Parse {
                row,
                message: e.to_string(),
            }
        })?;
        triples.extend(parsed.iter().cloned());
    }
    Ok(triples)
}

pub fn write_table_csv<W: Write>(writer: W, table: &Table) -> ExportResult<()> {
    let mut csv = csv::Writer::from_writer(writer);
    csv.write_record(&table.columns)?;
    for row in &table.rows {
        csv.write_record(row)?;
    }
    csv.flush()?;
    Ok(())
}

/// Pretty-printed `{ "nodes": [...], "edges": [...] }`.
pub fn write_graph_json<W: Write>(writer: W, view: &GraphView) -> ExportResult<()> {
    serde_json::to_writer_pretty(writer, view)?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::store::Term;
    use crate::vocab;

    fn ex(local: &str) -> Term {
        Term::iri(format!("http://example.org/{local}"))
    }

    fn triples() -> TripleSet {
        [
            Triple::new(ex("u1"), Term::iri(vocab::RDFS_LABEL), Term::lang_literal("Paris, \"capitale\"", "fr")),
            Triple::new(
                ex("u1"),
                ex("population"),
                Term::typed_literal("2165423", "http://www.w3.org/2001/XMLSchema#integer"),
            ),
            Triple::new(ex("u1"), ex("near"), ex("u2")),
            Triple::new(ex("u1"), ex("comment"), Term::literal("line one\nline two")),
        ]
        .into_iter()
        .collect()
    }

    #[test]
    fn ntriples_csv_reads_back_identically() {
        let original = triples();
        let mut buffer = Vec::new();
        let written = write_triples_csv(&mut buffer, &original, CellStyle::NTriples).unwrap();
        assert_eq!(written, 4);

        let read = read_triples_csv(buffer.as_slice()).unwrap();
        assert_eq!(read.len(), original.len());
        for (a, b) in original.iter().zip(read.iter()) {
            assert_eq!(a, b);
        }
    }

    #[test]
    fn plain_csv_has_display_cells() {
        let mut buffer = Vec::new();
        write_triples_csv(&mut buffer, &triples(), CellStyle::Display).unwrap();
        let text = String::from_utf8(buffer).unwrap();
        assert!(text.starts_with("subject,predicate,object\n"));
        assert!(text.contains("http://example.org/u1,http://example.org/near,http://example.org/u2"));
    }

    #[test]
    fn plain_cells_do_not_read_back() {
        let mut buffer = Vec::new();
        write_triples_csv(&mut buffer, &triples(), CellStyle::Display).unwrap();
        let err = read_triples_csv(buffer.as_slice()).unwrap_err();
        assert!(matches!(err, ExportError::Parse { row: 2, .. }));
    }

    #[test]
    fn short_rows_are_rejected() {
        let err = read_triples_csv("subject,predicate,object\n<http://a>,<http://b>,\n".as_bytes())
            .unwrap_err();
        assert!(matches!(err, ExportError::Parse { row: 2, .. }));
    }

    #[test]
    fn graph_json_has_nodes_and_edges() {
        let mut buffer = Vec::new();
        write_graph_json(&mut buffer, &GraphView::default()).unwrap();
        let value: serde_json::Value = serde_json::from_slice(&buffer).unwrap();
        assert!(value["nodes"].as_array().unwrap().is_empty());
        assert!(value["edges"].as_array().unwrap().is_empty());
    }
}
