// src/sparql/results.rs
// SPARQL JSON results parsing (application/sparql-results+json)

use crate::error::{MnemoError, Result};
use chrono::{DateTime, Utc};
use std::collections::HashMap;

/// One RDF term from a result binding
#[derive(Debug, Clone, PartialEq)]
pub struct SparqlValue {
    /// "uri", "literal", or "bnode"
    pub kind: String,
    pub value: String,
    pub datatype: Option<String>,
}

/// One solution row
#[derive(Debug, Clone, Default)]
pub struct Binding(pub HashMap<String, SparqlValue>);

impl Binding {
    pub fn get(&self, var: &str) -> Option<&SparqlValue> {
        self.0.get(var)
    }

    pub fn get_str(&self, var: &str) -> Option<&str> {
        self.0.get(var).map(|v| v.value.as_str())
    }

    pub fn get_uri(&self, var: &str) -> Option<&str> {
        self.0
            .get(var)
            .filter(|v| v.kind == "uri")
            .map(|v| v.value.as_str())
    }

    pub fn get_f32(&self, var: &str) -> Option<f32> {
        self.get_str(var)?.parse().ok()
    }

    pub fn get_u32(&self, var: &str) -> Option<u32> {
        self.get_str(var)?.parse().ok()
    }

    pub fn get_bool(&self, var: &str) -> Option<bool> {
        match self.get_str(var)? {
            "true" | "1" => Some(true),
            "false" | "0" => Some(false),
            _ => None,
        }
    }

    pub fn get_datetime(&self, var: &str) -> Option<DateTime<Utc>> {
        DateTime::parse_from_rfc3339(self.get_str(var)?)
            .ok()
            .map(|dt| dt.with_timezone(&Utc))
    }
}

/// Parse a SPARQL JSON results document into bindings
pub fn parse_results(body: &serde_json::Value) -> Result<Vec<Binding>> {
    let rows = body
        .get("results")
        .and_then(|r| r.get("bindings"))
        .and_then(|b| b.as_array())
        .ok_or_else(|| {
            MnemoError::MalformedResponse("missing results.bindings in SPARQL response".to_string())
        })?;

    let mut bindings = Vec::with_capacity(rows.len());
    for row in rows {
        let obj = row.as_object().ok_or_else(|| {
            MnemoError::MalformedResponse("SPARQL binding row is not an object".to_string())
        })?;
        let mut binding = HashMap::with_capacity(obj.len());
        for (var, term) in obj {
            let kind = term
                .get("type")
                .and_then(|t| t.as_str())
                .ok_or_else(|| {
                    MnemoError::MalformedResponse(format!("binding {var} missing term type"))
                })?
                .to_string();
            let value = term
                .get("value")
                .and_then(|v| v.as_str())
                .ok_or_else(|| {
                    MnemoError::MalformedResponse(format!("binding {var} missing term value"))
                })?
                .to_string();
            let datatype = term
                .get("datatype")
                .and_then(|d| d.as_str())
                .map(str::to_string);
            binding.insert(var.clone(), SparqlValue { kind, value, datatype });
        }
        bindings.push(Binding(binding));
    }
    Ok(bindings)
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_parse_results() {
        let body = json!({
            "head": {"vars": ["s", "score"]},
            "results": {"bindings": [
                {"s": {"type": "uri", "value": "http://example.org/e1"},
                 "score": {"type": "literal", "value": "0.85",
                           "datatype": "http://www.w3.org/2001/XMLSchema#double"}}
            ]}
        });
        let bindings = parse_results(&body).unwrap();
        assert_eq!(bindings.len(), 1);
        assert_eq!(bindings[0].get_uri("s"), Some("http://example.org/e1"));
        assert_eq!(bindings[0].get_f32("score"), Some(0.85));
        assert_eq!(bindings[0].get_uri("score"), None);
    }

    #[test]
    fn test_parse_results_missing_bindings() {
        let body = json!({"head": {}});
        assert!(matches!(
            parse_results(&body),
            Err(MnemoError::MalformedResponse(_))
        ));
    }

    #[test]
    fn test_binding_datetime() {
        let mut map = HashMap::new();
        map.insert(
            "t".to_string(),
            SparqlValue {
                kind: "literal".to_string(),
                value: "2025-06-01T12:00:00Z".to_string(),
                datatype: None,
            },
        );
        let binding = Binding(map);
        assert!(binding.get_datetime("t").is_some());
        assert!(binding.get_datetime("missing").is_none());
    }
}
