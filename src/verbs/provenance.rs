// src/verbs/provenance.rs
// PROV-O activity records for every verb execution

use crate::error::Result;
use crate::graph::GraphStore;
use crate::ontology::{Namespaces, UriKind};
use crate::rdf::{lit, lit_dt, prov, quad, ragno, rdf_type};
use chrono::{DateTime, Utc};
use oxrdf::NamedNode;
use sha2::{Digest, Sha256};
use std::sync::Arc;

/// Record one verb execution as a `prov:Activity` linking the session,
/// the SHA-256 of the inputs, and the generated output URIs.
pub async fn record_activity(
    graph: &Arc<dyn GraphStore>,
    ns: &Namespaces,
    nav_graph: &NamedNode,
    session_uri: &NamedNode,
    verb: &str,
    inputs: &serde_json::Value,
    outputs: &[String],
    started_at: DateTime<Utc>,
) -> Result<()> {
    let activity = ns.mint(UriKind::Activity, None);
    let mut quads = vec![
        quad(&activity, rdf_type(), prov("Activity"), nav_graph),
        quad(&activity, prov("wasAssociatedWith"), session_uri.clone(), nav_graph),
        quad(&activity, ragno("verb"), lit(verb), nav_graph),
        quad(&activity, ragno("inputHash"), lit(&hash_inputs(inputs)), nav_graph),
        quad(&activity, prov("startedAtTime"), lit_dt(started_at), nav_graph),
        quad(&activity, prov("endedAtTime"), lit_dt(Utc::now()), nav_graph),
    ];
    for output in outputs {
        if let Ok(node) = NamedNode::new(output.clone()) {
            quads.push(quad(&activity, prov("generated"), node, nav_graph));
        }
    }
    graph.insert_quads(quads).await
}

/// Inputs are hashed, never stored verbatim
fn hash_inputs(inputs: &serde_json::Value) -> String {
    let mut hasher = Sha256::new();
    hasher.update(inputs.to_string().as_bytes());
    format!("{:x}", hasher.finalize())
}
