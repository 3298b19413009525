// src/ontology/vocab.rs
// Closed ZPT controlled vocabularies: zoom levels, tilt projections, pan domains

use super::ZPT;
use oxrdf::NamedNode;
use serde::{Deserialize, Serialize};
use std::fmt;

/// Zoom chooses candidate granularity
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Zoom {
    Entity,
    Unit,
    Text,
    Community,
    Corpus,
}

impl Zoom {
    pub fn from_token(token: &str) -> Option<Self> {
        match token {
            "entity" => Some(Self::Entity),
            "unit" => Some(Self::Unit),
            "text" => Some(Self::Text),
            "community" => Some(Self::Community),
            "corpus" => Some(Self::Corpus),
            _ => None,
        }
    }

    pub fn token(&self) -> &'static str {
        match self {
            Self::Entity => "entity",
            Self::Unit => "unit",
            Self::Text => "text",
            Self::Community => "community",
            Self::Corpus => "corpus",
        }
    }

    pub fn uri(&self) -> NamedNode {
        let local = match self {
            Self::Entity => "EntityLevel",
            Self::Unit => "UnitLevel",
            Self::Text => "TextLevel",
            Self::Community => "CommunityLevel",
            Self::Corpus => "CorpusLevel",
        };
        NamedNode::new_unchecked(format!("{ZPT}{local}"))
    }

    pub fn from_uri(uri: &str) -> Option<Self> {
        let local = uri.strip_prefix(ZPT)?;
        match local {
            "EntityLevel" => Some(Self::Entity),
            "UnitLevel" => Some(Self::Unit),
            "TextLevel" => Some(Self::Text),
            "CommunityLevel" => Some(Self::Community),
            "CorpusLevel" => Some(Self::Corpus),
            _ => None,
        }
    }
}

impl fmt::Display for Zoom {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.token())
    }
}

/// Tilt chooses the projection used for ranking
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Tilt {
    Keywords,
    Embedding,
    Graph,
    Temporal,
}

impl Tilt {
    pub fn from_token(token: &str) -> Option<Self> {
        match token {
            "keywords" => Some(Self::Keywords),
            "embedding" => Some(Self::Embedding),
            "graph" => Some(Self::Graph),
            "temporal" => Some(Self::Temporal),
            _ => None,
        }
    }

    pub fn token(&self) -> &'static str {
        match self {
            Self::Keywords => "keywords",
            Self::Embedding => "embedding",
            Self::Graph => "graph",
            Self::Temporal => "temporal",
        }
    }

    pub fn uri(&self) -> NamedNode {
        let local = match self {
            Self::Keywords => "KeywordProjection",
            Self::Embedding => "EmbeddingProjection",
            Self::Graph => "GraphProjection",
            Self::Temporal => "TemporalProjection",
        };
        NamedNode::new_unchecked(format!("{ZPT}{local}"))
    }

    pub fn from_uri(uri: &str) -> Option<Self> {
        let local = uri.strip_prefix(ZPT)?;
        match local {
            "KeywordProjection" => Some(Self::Keywords),
            "EmbeddingProjection" => Some(Self::Embedding),
            "GraphProjection" => Some(Self::Graph),
            "TemporalProjection" => Some(Self::Temporal),
            _ => None,
        }
    }
}

impl fmt::Display for Tilt {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.token())
    }
}

/// Pan domains scope the candidate pool
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum PanDomain {
    Topic,
    Entity,
    Temporal,
    Geographic,
}

impl PanDomain {
    pub fn from_token(token: &str) -> Option<Self> {
        match token {
            "topic" => Some(Self::Topic),
            "entity" => Some(Self::Entity),
            "temporal" => Some(Self::Temporal),
            "geographic" => Some(Self::Geographic),
            _ => None,
        }
    }

    pub fn token(&self) -> &'static str {
        match self {
            Self::Topic => "topic",
            Self::Entity => "entity",
            Self::Temporal => "temporal",
            Self::Geographic => "geographic",
        }
    }

    pub fn uri(&self) -> NamedNode {
        let local = match self {
            Self::Topic => "TopicDomain",
            Self::Entity => "EntityDomain",
            Self::Temporal => "TemporalDomain",
            Self::Geographic => "GeospatialDomain",
        };
        NamedNode::new_unchecked(format!("{ZPT}{local}"))
    }

    pub fn from_uri(uri: &str) -> Option<Self> {
        let local = uri.strip_prefix(ZPT)?;
        match local {
            "TopicDomain" => Some(Self::Topic),
            "EntityDomain" => Some(Self::Entity),
            "TemporalDomain" => Some(Self::Temporal),
            "GeospatialDomain" => Some(Self::Geographic),
            _ => None,
        }
    }
}

impl fmt::Display for PanDomain {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.token())
    }
}
