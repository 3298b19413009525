// src/ontology/mod.rs
// Namespace & URI factory: fixed prefix map, controlled ZPT vocabularies,
// deterministic seeded minting

mod vocab;

pub use vocab::{PanDomain, Tilt, Zoom};

use crate::error::{MnemoError, Result};
use oxrdf::NamedNode;
use sha2::{Digest, Sha256};
use std::collections::HashMap;
use uuid::Uuid;

/// Fixed namespace IRIs
pub const RAGNO: &str = "http://purl.org/stuff/ragno/";
pub const ZPT: &str = "http://purl.org/stuff/zpt/";
pub const PROV: &str = "http://www.w3.org/ns/prov#";
pub const SKOS: &str = "http://www.w3.org/2004/02/skos/core#";
pub const RDF_NS: &str = "http://www.w3.org/1999/02/22-rdf-syntax-ns#";
pub const RDFS: &str = "http://www.w3.org/2000/01/rdf-schema#";
pub const OWL: &str = "http://www.w3.org/2002/07/owl#";
pub const XSD: &str = "http://www.w3.org/2001/XMLSchema#";

/// Default base for instance data minted by this process
pub const DEFAULT_INSTANCE_BASE: &str = "http://purl.org/stuff/mnemo/";

/// What kind of instance URI to mint; selects the path segment under the
/// instance base
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum UriKind {
    Interaction,
    Unit,
    Entity,
    Relationship,
    Community,
    Hypothesis,
    Query,
    Session,
    View,
    Activity,
}

impl UriKind {
    pub fn segment(&self) -> &'static str {
        match self {
            Self::Interaction => "interaction",
            Self::Unit => "unit",
            Self::Entity => "entity",
            Self::Relationship => "relationship",
            Self::Community => "community",
            Self::Hypothesis => "hypothesis",
            Self::Query => "query",
            Self::Session => "session",
            Self::View => "view",
            Self::Activity => "activity",
        }
    }
}

/// Prefix map + URI factory.
///
/// Seeded minting is deterministic across processes that share the same
/// instance base; unseeded minting is UUIDv4-based.
#[derive(Debug, Clone)]
pub struct Namespaces {
    prefixes: HashMap<String, String>,
    instance_base: String,
}

impl Default for Namespaces {
    fn default() -> Self {
        Self::new(DEFAULT_INSTANCE_BASE)
    }
}

impl Namespaces {
    pub fn new(instance_base: &str) -> Self {
        let mut prefixes = HashMap::new();
        prefixes.insert("ragno".to_string(), RAGNO.to_string());
        prefixes.insert("zpt".to_string(), ZPT.to_string());
        prefixes.insert("prov".to_string(), PROV.to_string());
        prefixes.insert("skos".to_string(), SKOS.to_string());
        prefixes.insert("rdf".to_string(), RDF_NS.to_string());
        prefixes.insert("rdfs".to_string(), RDFS.to_string());
        prefixes.insert("owl".to_string(), OWL.to_string());
        prefixes.insert("xsd".to_string(), XSD.to_string());
        Self {
            prefixes,
            instance_base: instance_base.to_string(),
        }
    }

    /// Register a user-defined prefix
    pub fn register(&mut self, prefix: &str, iri: &str) {
        self.prefixes.insert(prefix.to_string(), iri.to_string());
    }

    /// Expand a `prefix:local` pair to a full IRI
    pub fn expand(&self, prefix: &str, local: &str) -> Option<NamedNode> {
        let base = self.prefixes.get(prefix)?;
        NamedNode::new(format!("{base}{local}")).ok()
    }

    /// SPARQL PREFIX header for all registered prefixes
    pub fn sparql_prefixes(&self) -> String {
        let mut entries: Vec<_> = self.prefixes.iter().collect();
        entries.sort_by(|a, b| a.0.cmp(b.0));
        entries
            .iter()
            .map(|(p, iri)| format!("PREFIX {p}: <{iri}>"))
            .collect::<Vec<_>>()
            .join("\n")
    }

    /// Resolve a controlled-vocabulary token to its URI.
    ///
    /// `kind` is one of `zoom`, `pan`, `tilt`; tokens are case-sensitive and
    /// unknown tokens return `None` (the caller decides policy).
    pub fn resolve(&self, kind: &str, token: &str) -> Option<NamedNode> {
        match kind {
            "zoom" => Zoom::from_token(token).map(|z| z.uri()),
            "tilt" => Tilt::from_token(token).map(|t| t.uri()),
            "pan" => PanDomain::from_token(token).map(|p| p.uri()),
            _ => None,
        }
    }

    /// Mint a fresh URI under the instance base.
    ///
    /// With a seed the result is SHA-256 of the canonicalised seed,
    /// truncated to 128 bits and base32-encoded; equal seeds yield
    /// byte-identical URIs within and across processes. Without a seed a
    /// UUIDv4 is used.
    pub fn mint(&self, kind: UriKind, seed: Option<&str>) -> NamedNode {
        let local = match seed {
            Some(seed) => seeded_id(kind, seed),
            None => Uuid::new_v4().to_string(),
        };
        NamedNode::new_unchecked(format!("{}{}/{}", self.instance_base, kind.segment(), local))
    }

    /// Mint, failing instead of falling back when the seed is empty
    pub fn mint_seeded(&self, kind: UriKind, seed: &str) -> Result<NamedNode> {
        if seed.is_empty() {
            return Err(MnemoError::InvalidParameter(
                "mint seed must be non-empty".to_string(),
            ));
        }
        Ok(self.mint(kind, Some(seed)))
    }

    pub fn instance_base(&self) -> &str {
        &self.instance_base
    }
}

/// Canonicalise the seed (kind-scoped, whitespace-trimmed), hash, truncate
/// to 128 bits, and base32-encode
fn seeded_id(kind: UriKind, seed: &str) -> String {
    let mut hasher = Sha256::new();
    hasher.update(kind.segment().as_bytes());
    hasher.update([0x1f]);
    hasher.update(seed.trim().as_bytes());
    let digest = hasher.finalize();
    base32_lower(&digest[..16])
}

/// RFC 4648 base32, lowercase, unpadded
fn base32_lower(bytes: &[u8]) -> String {
    const ALPHABET: &[u8; 32] = b"abcdefghijklmnopqrstuvwxyz234567";
    let mut out = String::with_capacity(bytes.len().div_ceil(5) * 8);
    let mut buffer: u64 = 0;
    let mut bits: u32 = 0;
    for &byte in bytes {
        buffer = (buffer << 8) | u64::from(byte);
        bits += 8;
        while bits >= 5 {
            bits -= 5;
            out.push(ALPHABET[((buffer >> bits) & 0x1f) as usize] as char);
        }
    }
    if bits > 0 {
        out.push(ALPHABET[((buffer << (5 - bits)) & 0x1f) as usize] as char);
    }
    out
}
