// src/rdf/mod.rs
// Quad-building helpers over oxrdf for the ragno/zpt/prov ontologies

use crate::ontology::{PROV, RAGNO, SKOS, ZPT};
use chrono::{DateTime, Utc};
use oxrdf::vocab::xsd;
use oxrdf::{GraphName, Literal, NamedNode, Quad, Subject, Term};

/// Term in the ragno ontology
pub fn ragno(local: &str) -> NamedNode {
    NamedNode::new_unchecked(format!("{RAGNO}{local}"))
}

/// Term in the zpt ontology
pub fn zpt(local: &str) -> NamedNode {
    NamedNode::new_unchecked(format!("{ZPT}{local}"))
}

/// Term in PROV-O
pub fn prov(local: &str) -> NamedNode {
    NamedNode::new_unchecked(format!("{PROV}{local}"))
}

/// Term in SKOS
pub fn skos(local: &str) -> NamedNode {
    NamedNode::new_unchecked(format!("{SKOS}{local}"))
}

/// rdf:type
pub fn rdf_type() -> NamedNode {
    oxrdf::vocab::rdf::TYPE.into_owned()
}

pub fn lit(value: &str) -> Literal {
    Literal::new_simple_literal(value)
}

pub fn lit_bool(value: bool) -> Literal {
    Literal::new_typed_literal(if value { "true" } else { "false" }, xsd::BOOLEAN)
}

pub fn lit_f32(value: f32) -> Literal {
    Literal::new_typed_literal(format!("{value}"), xsd::DOUBLE)
}

pub fn lit_u32(value: u32) -> Literal {
    Literal::new_typed_literal(format!("{value}"), xsd::INTEGER)
}

pub fn lit_dt(value: DateTime<Utc>) -> Literal {
    Literal::new_typed_literal(
        value.to_rfc3339_opts(chrono::SecondsFormat::Millis, true),
        xsd::DATE_TIME,
    )
}

/// Build a quad with a named-node subject
pub fn quad(
    subject: &NamedNode,
    predicate: NamedNode,
    object: impl Into<Term>,
    graph: &NamedNode,
) -> Quad {
    Quad::new(
        Subject::NamedNode(subject.clone()),
        predicate,
        object,
        GraphName::NamedNode(graph.clone()),
    )
}

/// Render a quad's triple part as an N-Triples statement
pub fn triple_line(q: &Quad) -> String {
    format!("{} {} {} .", q.subject, q.predicate, q.object)
}

/// Whether a predicate holds at most one value per subject.
///
/// Writers replace these rather than accumulate: re-emitting an entity or
/// relationship (same deterministic URI, fresh frequency/labels) must
/// retract the stale triple first. Multi-valued predicates (hasConcept,
/// hasMember, mentions, inDomain, the pan view terms) always accumulate.
pub fn is_functional(predicate: &NamedNode) -> bool {
    let iri = predicate.as_str();
    if let Some(local) = iri.strip_prefix(RAGNO) {
        matches!(
            local,
            "frequency"
                | "isEntryPoint"
                | "subType"
                | "normalizedLabel"
                | "summary"
                | "confidence"
                | "weight"
                | "content"
                | "relationshipType"
                | "hasSourceEntity"
                | "hasTargetEntity"
                | "hasSourceDocument"
                | "hasEmbedding"
                | "maybe"
                | "originalQuery"
        )
    } else if let Some(local) = iri.strip_prefix(SKOS) {
        local == "prefLabel"
    } else {
        false
    }
}

/// Group quads by graph, preserving encounter order of graphs and quads.
/// Feed for chunked `INSERT DATA { GRAPH <g> { … } }` updates.
pub fn group_by_graph(quads: &[Quad]) -> Vec<(String, Vec<&Quad>)> {
    let mut order: Vec<String> = Vec::new();
    let mut groups: std::collections::HashMap<String, Vec<&Quad>> =
        std::collections::HashMap::new();
    for q in quads {
        let key = match &q.graph_name {
            GraphName::NamedNode(n) => n.as_str().to_string(),
            GraphName::BlankNode(b) => b.to_string(),
            GraphName::DefaultGraph => String::new(),
        };
        if !groups.contains_key(&key) {
            order.push(key.clone());
        }
        groups.entry(key).or_default().push(q);
    }
    order
        .into_iter()
        .map(|k| {
            let quads = groups.remove(&k).unwrap_or_default();
            (k, quads)
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn g() -> NamedNode {
        NamedNode::new_unchecked("http://example.org/graph")
    }

    #[test]
    fn test_ragno_term() {
        assert_eq!(ragno("maybe").as_str(), "http://purl.org/stuff/ragno/maybe");
        assert_eq!(
            zpt("answersQuery").as_str(),
            "http://purl.org/stuff/zpt/answersQuery"
        );
        assert_eq!(
            prov("endedAtTime").as_str(),
            "http://www.w3.org/ns/prov#endedAtTime"
        );
    }

    #[test]
    fn test_triple_line_escapes() {
        let s = NamedNode::new_unchecked("http://example.org/e1");
        let q = quad(&s, skos("prefLabel"), lit("a \"quoted\" label"), &g());
        let line = triple_line(&q);
        assert!(line.starts_with("<http://example.org/e1>"));
        assert!(line.contains("\\\"quoted\\\""));
        assert!(line.ends_with(" ."));
    }

    #[test]
    fn test_typed_literals() {
        assert_eq!(lit_bool(true).value(), "true");
        assert_eq!(lit_u32(42).value(), "42");
        assert_eq!(lit_f32(0.5).value(), "0.5");
    }

    #[test]
    fn test_is_functional() {
        assert!(is_functional(&ragno("frequency")));
        assert!(is_functional(&ragno("normalizedLabel")));
        assert!(is_functional(&ragno("weight")));
        assert!(is_functional(&skos("prefLabel")));
        // multi-valued predicates accumulate
        assert!(!is_functional(&ragno("hasConcept")));
        assert!(!is_functional(&ragno("hasMember")));
        assert!(!is_functional(&ragno("mentions")));
        assert!(!is_functional(&ragno("inDomain")));
        assert!(!is_functional(&zpt("panKeyword")));
        assert!(!is_functional(&prov("generated")));
    }

    #[test]
    fn test_group_by_graph_preserves_order() {
        let s = NamedNode::new_unchecked("http://example.org/s");
        let g1 = NamedNode::new_unchecked("http://example.org/g1");
        let g2 = NamedNode::new_unchecked("http://example.org/g2");
        let quads = vec![
            quad(&s, ragno("frequency"), lit_u32(1), &g1),
            quad(&s, ragno("frequency"), lit_u32(2), &g2),
            quad(&s, ragno("frequency"), lit_u32(3), &g1),
        ];
        let groups = group_by_graph(&quads);
        assert_eq!(groups.len(), 2);
        assert_eq!(groups[0].0, "http://example.org/g1");
        assert_eq!(groups[0].1.len(), 2);
        assert_eq!(groups[1].1.len(), 1);
    }
}
