// src/zpt/navigation.rs
// NavigationView materialisation: ZPT state <-> RDF quads

use super::state::{PanFilters, TemporalRange, ZptState};
use crate::error::{MnemoError, Result};
use crate::ontology::{Namespaces, PanDomain, Tilt, UriKind, Zoom};
use crate::rdf::{lit, lit_dt, lit_f32, quad, rdf_type, zpt};
use chrono::{DateTime, Utc};
use oxrdf::{GraphName, NamedNode, Quad, Subject, Term};

/// A materialised navigation view
#[derive(Debug, Clone)]
pub struct NavigationView {
    pub uri: NamedNode,
    pub query: String,
    pub selected_corpuscles: Vec<String>,
    pub timestamp: DateTime<Utc>,
}

/// Emit the RDF view of one retrieval under the current lens.
///
/// The view records the query, the closed-vocabulary zoom/tilt/pan URIs,
/// the concrete pan filter literals (so the state can be reconstructed),
/// the owning session, and the selected corpuscles.
pub fn view_quads(
    state: &ZptState,
    query: &str,
    selected_corpuscles: &[String],
    session_uri: &NamedNode,
    ns: &Namespaces,
    graph: &NamedNode,
) -> (NavigationView, Vec<Quad>) {
    let timestamp = Utc::now();
    let view_uri = ns.mint(UriKind::View, None);
    let mut quads = vec![
        quad(&view_uri, rdf_type(), zpt("NavigationView"), graph),
        quad(&view_uri, zpt("hasQuery"), lit(query), graph),
        quad(&view_uri, zpt("hasZoomLevel"), state.zoom.uri(), graph),
        quad(&view_uri, zpt("hasTiltProjection"), state.tilt.uri(), graph),
        quad(&view_uri, zpt("partOfSession"), session_uri.clone(), graph),
        quad(&view_uri, zpt("sessionIdentifier"), lit(&state.session_id), graph),
        quad(&view_uri, zpt("threshold"), lit_f32(state.threshold), graph),
        quad(&view_uri, zpt("navigationTimestamp"), lit_dt(timestamp), graph),
    ];

    for domain in active_pan_domains(&state.pan) {
        quads.push(quad(&view_uri, zpt("hasPanDomain"), domain.uri(), graph));
    }
    for value in &state.pan.domains {
        quads.push(quad(&view_uri, zpt("panDomainValue"), lit(value), graph));
    }
    for value in &state.pan.keywords {
        quads.push(quad(&view_uri, zpt("panKeyword"), lit(value), graph));
    }
    for value in &state.pan.entities {
        quads.push(quad(&view_uri, zpt("panEntity"), lit(value), graph));
    }
    if let Some(temporal) = &state.pan.temporal {
        if let Some(start) = temporal.start {
            quads.push(quad(&view_uri, zpt("panTemporalStart"), lit_dt(start), graph));
        }
        if let Some(end) = temporal.end {
            quads.push(quad(&view_uri, zpt("panTemporalEnd"), lit_dt(end), graph));
        }
    }
    for value in &state.pan.corpuscle {
        quads.push(quad(&view_uri, zpt("panCorpuscle"), lit(value), graph));
    }
    for uri in selected_corpuscles {
        if let Ok(node) = NamedNode::new(uri.clone()) {
            quads.push(quad(&view_uri, zpt("selectedCorpuscle"), node, graph));
        }
    }

    let view = NavigationView {
        uri: view_uri,
        query: query.to_string(),
        selected_corpuscles: selected_corpuscles.to_vec(),
        timestamp,
    };
    (view, quads)
}

/// Closed-vocabulary pan domains active under the given filters
fn active_pan_domains(pan: &PanFilters) -> Vec<PanDomain> {
    let mut domains = Vec::new();
    if !pan.domains.is_empty() || !pan.keywords.is_empty() {
        domains.push(PanDomain::Topic);
    }
    if !pan.entities.is_empty() {
        domains.push(PanDomain::Entity);
    }
    if pan.temporal.is_some() {
        domains.push(PanDomain::Temporal);
    }
    domains
}

/// Reconstruct a `ZptState` from the quads of one view.
///
/// Inverse of `view_quads` modulo timestamp: zoom, tilt, pan, threshold,
/// session id, and the query (as `last_query`) all round-trip.
pub fn parse_view_quads(view_uri: &NamedNode, quads: &[Quad]) -> Result<ZptState> {
    let mut zoom = None;
    let mut tilt = None;
    let mut pan = PanFilters::default();
    let mut threshold = None;
    let mut session_id = None;
    let mut query = None;
    let mut temporal_start = None;
    let mut temporal_end = None;

    for q in quads {
        if q.subject != Subject::NamedNode(view_uri.clone()) {
            continue;
        }
        let predicate = q.predicate.as_str();
        match (predicate, &q.object) {
            (p, Term::NamedNode(n)) if p == zpt("hasZoomLevel").as_str() => {
                zoom = Zoom::from_uri(n.as_str());
            }
            (p, Term::NamedNode(n)) if p == zpt("hasTiltProjection").as_str() => {
                tilt = Tilt::from_uri(n.as_str());
            }
            (p, Term::Literal(l)) if p == zpt("threshold").as_str() => {
                threshold = l.value().parse::<f32>().ok();
            }
            (p, Term::Literal(l)) if p == zpt("sessionIdentifier").as_str() => {
                session_id = Some(l.value().to_string());
            }
            (p, Term::Literal(l)) if p == zpt("hasQuery").as_str() => {
                query = Some(l.value().to_string());
            }
            (p, Term::Literal(l)) if p == zpt("panDomainValue").as_str() => {
                pan.domains.push(l.value().to_string());
            }
            (p, Term::Literal(l)) if p == zpt("panKeyword").as_str() => {
                pan.keywords.push(l.value().to_string());
            }
            (p, Term::Literal(l)) if p == zpt("panEntity").as_str() => {
                pan.entities.push(l.value().to_string());
            }
            (p, Term::Literal(l)) if p == zpt("panCorpuscle").as_str() => {
                pan.corpuscle.push(l.value().to_string());
            }
            (p, Term::Literal(l)) if p == zpt("panTemporalStart").as_str() => {
                temporal_start = parse_dt(l.value());
            }
            (p, Term::Literal(l)) if p == zpt("panTemporalEnd").as_str() => {
                temporal_end = parse_dt(l.value());
            }
            _ => {}
        }
    }

    if temporal_start.is_some() || temporal_end.is_some() {
        pan.temporal = Some(TemporalRange {
            start: temporal_start,
            end: temporal_end,
        });
    }

    let mut state = ZptState::new(&session_id.ok_or_else(|| {
        MnemoError::MalformedResponse("navigation view missing session identifier".to_string())
    })?);
    state.zoom = zoom.ok_or_else(|| {
        MnemoError::MalformedResponse("navigation view missing zoom level".to_string())
    })?;
    state.tilt = tilt.ok_or_else(|| {
        MnemoError::MalformedResponse("navigation view missing tilt projection".to_string())
    })?;
    state.pan = pan;
    if let Some(threshold) = threshold {
        state.threshold = threshold;
    }
    state.last_query = query.filter(|q| !q.is_empty());
    Ok(state)
}

fn parse_dt(value: &str) -> Option<DateTime<Utc>> {
    DateTime::parse_from_rfc3339(value)
        .ok()
        .map(|dt| dt.with_timezone(&Utc))
}

/// Quads marking a session's start
pub fn session_quads(
    session_uri: &NamedNode,
    agent: &str,
    purpose: &str,
    graph: &NamedNode,
) -> Vec<Quad> {
    vec![
        quad(session_uri, rdf_type(), zpt("NavigationSession"), graph),
        quad(
            session_uri,
            crate::rdf::prov("wasAssociatedWith"),
            lit(agent),
            graph,
        ),
        quad(
            session_uri,
            crate::rdf::prov("startedAtTime"),
            lit_dt(Utc::now()),
            graph,
        ),
        quad(session_uri, zpt("navigationPurpose"), lit(purpose), graph),
    ]
}

/// Closing quad emitted on session eviction
pub fn session_close_quad(session_uri: &NamedNode, graph: &NamedNode) -> Quad {
    quad(
        session_uri,
        crate::rdf::prov("endedAtTime"),
        lit_dt(Utc::now()),
        graph,
    )
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::zpt::PanUpdate;

    fn ns() -> Namespaces {
        Namespaces::default()
    }

    fn graph() -> NamedNode {
        NamedNode::new_unchecked("http://example.org/navigation")
    }

    #[test]
    fn test_view_round_trip() {
        let mut state = ZptState::new("session-1");
        state.set_zoom("unit").unwrap();
        state.set_tilt("embedding").unwrap();
        state.set_threshold(0.55).unwrap();
        state
            .set_pan(PanUpdate {
                domains: Some(vec!["science".to_string()]),
                keywords: Some(vec!["tower".to_string(), "paris".to_string()]),
                entities: Some(vec!["http://example.org/e1".to_string()]),
                temporal: Some(TemporalRange {
                    start: Some("2024-01-01T00:00:00Z".parse().unwrap()),
                    end: None,
                }),
                ..Default::default()
            })
            .unwrap();
        state.record_query("where is the tower");

        let ns = ns();
        let session_uri = ns.mint(UriKind::Session, Some("session-1"));
        let (view, quads) = view_quads(
            &state,
            "where is the tower",
            &["http://example.org/e1".to_string()],
            &session_uri,
            &ns,
            &graph(),
        );

        let parsed = parse_view_quads(&view.uri, &quads).unwrap();
        assert_eq!(parsed.zoom, state.zoom);
        assert_eq!(parsed.tilt, state.tilt);
        assert_eq!(parsed.pan, state.pan);
        assert_eq!(parsed.threshold, state.threshold);
        assert_eq!(parsed.session_id, state.session_id);
        assert_eq!(parsed.last_query, state.last_query);
    }

    #[test]
    fn test_default_state_round_trip() {
        let state = ZptState::new("s");
        let ns = ns();
        let session_uri = ns.mint(UriKind::Session, Some("s"));
        let (view, quads) = view_quads(&state, "", &[], &session_uri, &ns, &graph());
        let parsed = parse_view_quads(&view.uri, &quads).unwrap();
        assert_eq!(parsed.zoom, state.zoom);
        assert_eq!(parsed.tilt, state.tilt);
        assert_eq!(parsed.pan, state.pan);
        assert_eq!(parsed.last_query, None);
    }

    #[test]
    fn test_active_pan_domains() {
        let mut pan = PanFilters::default();
        assert!(active_pan_domains(&pan).is_empty());
        pan.keywords.push("x".to_string());
        pan.entities.push("http://example.org/e".to_string());
        let domains = active_pan_domains(&pan);
        assert!(domains.contains(&PanDomain::Topic));
        assert!(domains.contains(&PanDomain::Entity));
        assert!(!domains.contains(&PanDomain::Temporal));
    }

    #[test]
    fn test_parse_missing_zoom_is_malformed() {
        let view_uri = NamedNode::new_unchecked("http://example.org/view/1");
        let quads = vec![quad(
            &view_uri,
            zpt("sessionIdentifier"),
            lit("s"),
            &graph(),
        )];
        let err = parse_view_quads(&view_uri, &quads).unwrap_err();
        assert_eq!(err.code(), "MALFORMED_RESPONSE");
    }

    #[test]
    fn test_session_quads_shape() {
        let ns = ns();
        let session_uri = ns.mint(UriKind::Session, Some("s"));
        let quads = session_quads(&session_uri, "agent-1", "semantic memory", &graph());
        assert_eq!(quads.len(), 4);
        let close = session_close_quad(&session_uri, &graph());
        assert!(close.predicate.as_str().ends_with("endedAtTime"));
    }
}
