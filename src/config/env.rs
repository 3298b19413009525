// src/config/env.rs
// Environment variable helpers (secrets never live in config.json)

/// Parse a boolean environment variable ("1"/"true"/"yes" → true)
pub fn parse_bool_env(name: &str) -> Option<bool> {
    let raw = std::env::var(name).ok()?;
    match raw.trim().to_lowercase().as_str() {
        "1" | "true" | "yes" | "on" => Some(true),
        "0" | "false" | "no" | "off" => Some(false),
        _ => None,
    }
}

/// Resolve the API key for a provider type.
///
/// Looks up `<TYPE>_API_KEY` (e.g. `OPENAI_API_KEY`, `MISTRAL_API_KEY`),
/// falling back to the key embedded in config (discouraged outside dev).
pub fn api_key_for(provider_type: &str, configured: Option<&str>) -> Option<String> {
    let var = format!("{}_API_KEY", provider_type.to_uppercase().replace('-', "_"));
    std::env::var(&var)
        .ok()
        .filter(|v| !v.is_empty())
        .or_else(|| configured.map(str::to_string).filter(|v| !v.is_empty()))
}
