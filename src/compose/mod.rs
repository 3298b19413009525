// src/compose/mod.rs
// Answer composition: named prompt templates + context assembly from
// session recency and retrieval results

use crate::config::ComposeConfig;
use crate::error::{MnemoError, Result};
use crate::memory::Interaction;
use crate::retrieval::RankedResult;
use crate::zpt::ZptState;
use once_cell::sync::Lazy;
use std::collections::HashMap;

/// Built-in templates. Slots: {query}, {context}, {memory}, {zoom},
/// {pan}, {tilt}, {maxTokens}.
static BUILTIN_TEMPLATES: Lazy<HashMap<&'static str, &'static str>> = Lazy::new(|| {
    let mut templates = HashMap::new();
    templates.insert(
        "compose-context",
        "You are answering with the help of a semantic memory.\n\
         Current lens: zoom={zoom} tilt={tilt} pan={pan}\n\n\
         Session context:\n{context}\n\n\
         Retrieved memory:\n{memory}\n\n\
         Answer the question using the context above when relevant. \
         Keep the answer under {maxTokens} tokens.\n\n\
         Question: {query}",
    );
    templates.insert(
        "chat-direct",
        "Conversation so far:\n{context}\n\nRespond to: {query}",
    );
    templates
});

/// Template registry; user templates shadow the built-ins
#[derive(Default)]
pub struct TemplateRegistry {
    user: HashMap<String, String>,
}

impl TemplateRegistry {
    pub fn register(&mut self, name: &str, template: String) {
        self.user.insert(name.to_string(), template);
    }

    /// Missing templates fail rather than fabricate a prompt
    pub fn get(&self, name: &str) -> Result<&str> {
        if let Some(t) = self.user.get(name) {
            return Ok(t);
        }
        BUILTIN_TEMPLATES
            .get(name)
            .copied()
            .ok_or_else(|| MnemoError::TemplateNotFound(name.to_string()))
    }
}

/// Assembled prompt plus the sources that fed it
#[derive(Debug, Clone)]
pub struct ComposedContext {
    pub prompt: String,
    pub sources: Vec<RankedResult>,
    pub session_items: usize,
}

pub struct Composer {
    templates: TemplateRegistry,
    cfg: ComposeConfig,
}

impl Composer {
    pub fn new(cfg: ComposeConfig) -> Self {
        Self {
            templates: TemplateRegistry::default(),
            cfg,
        }
    }

    pub fn templates_mut(&mut self) -> &mut TemplateRegistry {
        &mut self.templates
    }

    /// Build the generation prompt from session recency + retrieval.
    ///
    /// Session interactions and memory items are deduplicated by
    /// (prompt, response); memory items render as
    /// `[i] prompt (similarity: s.ss)\nresponse`.
    pub fn compose(
        &self,
        template_name: &str,
        query: &str,
        session_recent: &[Interaction],
        retrieved: &[RankedResult],
        zpt: &ZptState,
        max_tokens: u32,
    ) -> Result<ComposedContext> {
        let template = self.templates.get(template_name)?;

        let mut seen: std::collections::HashSet<(String, String)> =
            std::collections::HashSet::new();

        let session_items: Vec<&Interaction> = session_recent
            .iter()
            .rev()
            .take(self.cfg.k_session)
            .filter(|i| seen.insert(key(&i.prompt, &i.response)))
            .collect();
        let context = session_items
            .iter()
            .rev()
            .map(|i| format!("Q: {}\nA: {}", i.prompt, i.response))
            .collect::<Vec<_>>()
            .join("\n\n");

        let sources: Vec<RankedResult> = retrieved
            .iter()
            .filter(|r| seen.insert(key(&r.prompt, &r.response)))
            .take(self.cfg.k_memory)
            .cloned()
            .collect();
        let memory = sources
            .iter()
            .enumerate()
            .map(|(i, r)| {
                format!(
                    "[{}] {} (similarity: {:.2})\n{}",
                    i + 1,
                    r.prompt,
                    r.similarity,
                    r.response
                )
            })
            .collect::<Vec<_>>()
            .join("\n\n");

        let pan = if zpt.pan.is_empty() {
            "none".to_string()
        } else {
            let mut parts = Vec::new();
            if !zpt.pan.domains.is_empty() {
                parts.push(format!("domains={}", zpt.pan.domains.join(",")));
            }
            if !zpt.pan.keywords.is_empty() {
                parts.push(format!("keywords={}", zpt.pan.keywords.join(",")));
            }
            if !zpt.pan.entities.is_empty() {
                parts.push(format!("entities={}", zpt.pan.entities.len()));
            }
            if zpt.pan.temporal.is_some() {
                parts.push("temporal".to_string());
            }
            parts.join(" ")
        };

        let prompt = template
            .replace("{query}", query)
            .replace("{context}", if context.is_empty() { "(none)" } else { &context })
            .replace("{memory}", if memory.is_empty() { "(none)" } else { &memory })
            .replace("{zoom}", zpt.zoom.token())
            .replace("{tilt}", zpt.tilt.token())
            .replace("{pan}", &pan)
            .replace("{maxTokens}", &max_tokens.to_string());

        Ok(ComposedContext {
            prompt,
            sources,
            session_items: session_items.len(),
        })
    }
}

fn key(prompt: &str, response: &str) -> (String, String) {
    crate::retrieval::dedup_key(prompt, response)
}
