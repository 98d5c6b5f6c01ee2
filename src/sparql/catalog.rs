//! Named queries, runnable by name from the CLI.

use super::Target;

/// A stored query and the target it is meant for.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct NamedQuery {
    pub name: &'static str,
    pub description: &'static str,
    /// `None` runs against the local store; otherwise the endpoint name.
    pub endpoint: Option<&'static str>,
    pub text: &'static str,
}

impl NamedQuery {
    pub fn target(&self) -> Target {
        match self.endpoint {
            Some(name) => Target::Endpoint(name.to_string()),
            None => Target::Local,
        }
    }
}

const FRENCH_CITIES: &str = r#"PREFIX dbo: <http://dbpedia.org/ontology/>
PREFIX rdfs: <http://www.w3.org/2000/01/rdf-schema#>

SELECT DISTINCT ?city ?name ?population
WHERE {
    ?city a dbo:City ;
          dbo:country <http://dbpedia.org/resource/France> ;
          rdfs:label ?name ;
          dbo:populationTotal ?population .
    FILTER(LANG(?name) = "fr")
}
ORDER BY DESC(?population)
LIMIT 10"#;

const FRENCH_WRITERS: &str = r#"PREFIX dbo: <http://dbpedia.org/ontology/>
PREFIX rdfs: <http://www.w3.org/2000/01/rdf-schema#>

SELECT DISTINCT ?writer ?name ?birth
WHERE {
    ?writer a dbo:Writer ;
            dbo:birthPlace/dbo:country <http://dbpedia.org/resource/France> ;
            rdfs:label ?name ;
            dbo:birthDate ?birth .
    FILTER(LANG(?name) = "fr")
}
ORDER BY ?birth
LIMIT 10"#;

const WIKIDATA_FRENCH_PAINTERS: &str = r#"PREFIX wd: <http://www.wikidata.org/entity/>
PREFIX wdt: <http://www.wikidata.org/prop/direct/>
PREFIX wikibase: <http://wikiba.se/ontology#>
PREFIX bd: <http://www.bigdata.com/rdf#>

SELECT ?painter ?painterLabel ?birthDate
WHERE {
    ?painter wdt:P31 wd:Q5 ;
             wdt:P106 wd:Q1028181 ;
             wdt:P27 wd:Q142 ;
             wdt:P569 ?birthDate .
    SERVICE wikibase:label { bd:serviceParam wikibase:language "fr,en". }
}
ORDER BY ?birthDate
LIMIT 10"#;

const ALL_TRIPLES: &str = "SELECT ?subject ?predicate ?object WHERE { ?subject ?predicate ?object }";

const CLASSES: &str = r#"PREFIX owl: <http://www.w3.org/2002/07/owl#>
PREFIX rdfs: <http://www.w3.org/2000/01/rdf-schema#>

SELECT ?class ?label
WHERE {
    ?class a owl:Class .
    OPTIONAL { ?class rdfs:label ?label }
}
ORDER BY ?class"#;

const NAMED_INDIVIDUALS: &str = r#"PREFIX owl: <http://www.w3.org/2002/07/owl#>
PREFIX rdfs: <http://www.w3.org/2000/01/rdf-schema#>

SELECT ?individual ?label ?type
WHERE {
    ?individual a owl:NamedIndividual .
    OPTIONAL { ?individual rdfs:label ?label }
    OPTIONAL { ?individual a ?type . FILTER(?type != owl:NamedIndividual) }
}
ORDER BY ?individual"#;

static CATALOG: &[NamedQuery] = &[
    NamedQuery {
        name: "french_cities",
        description: "Ten most populous French cities (DBpedia)",
        endpoint: Some("dbpedia"),
        text: FRENCH_CITIES,
    },
    NamedQuery {
        name: "french_writers",
        description: "French-born writers by birth date (DBpedia)",
        endpoint: Some("dbpedia"),
        text: FRENCH_WRITERS,
    },
    NamedQuery {
        name: "wikidata_french_painters",
        description: "French painters by birth date (Wikidata)",
        endpoint: Some("wikidata"),
        text: WIKIDATA_FRENCH_PAINTERS,
    },
    NamedQuery {
        name: "all_triples",
        description: "Every triple in the loaded ontology",
        endpoint: None,
        text: ALL_TRIPLES,
    },
    NamedQuery {
        name: "classes",
        description: "owl:Class subjects with their labels",
        endpoint: None,
        text: CLASSES,
    },
    NamedQuery {
        name: "named_individuals",
        description: "owl:NamedIndividual subjects with label and type",
        endpoint: None,
        text: NAMED_INDIVIDUALS,
    },
];

pub fn all() -> &'static [NamedQuery] {
    CATALOG
}

pub fn find(name: &str) -> Option<&'static NamedQuery> {
    CATALOG.iter().find(|query| query.name == name)
}

#[cfg(test)]
mod tests {
    use super::*;
    use oxigraph::sparql::Query;

    #[test]
    #[allow(deprecated)]
    fn every_query_parses() {
        for query in all() {
            Query::parse(query.text, None)
                .unwrap_or_else(|e| panic!("{} does not parse: {e}", query.name));
        }
    }

    #[test]
    fn names_are_unique() {
        let mut names: Vec<_> = all().iter().map(|q| q.name).collect();
        names.sort_unstable();
        names.dedup();
        assert_eq!(names.len(), all().len());
    }

    #[test]
    fn find_and_target() {
        assert_eq!(
            find("french_cities").unwrap().target(),
            Target::Endpoint("dbpedia".into())
        );
        assert_eq!(find("classes").unwrap().target(), Target::Local);
        assert!(find("missing").is_none());
    }
}
