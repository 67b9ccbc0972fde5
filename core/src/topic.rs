//! Topic name resolution.
//!
//! Topic names are configured per environment. Each topic is referred to in
//! code by the environment variable that names it (`EVENT_TOPIC_PARTY_STATUS`,
//! `COMMAND_TOPIC_BUFF`, ...). When the variable is unset the variable name
//! itself is used, which keeps local setups and tests working without
//! configuration.

/// Resolve the topic named by environment variable `key`.
#[must_use]
pub fn resolve(key: &str) -> String {
    std::env::var(key)
        .ok()
        .filter(|v| !v.trim().is_empty())
        .unwrap_or_else(|| key.to_string())
}
