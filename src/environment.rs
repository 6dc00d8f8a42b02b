use std::collections::HashMap;
use std::env;

/// Read-only view of environment variables.
///
/// Argument derivation never touches the process environment directly; it goes
/// through this lookup so the whole pipeline can be driven from a plain map.
pub trait Environment {
    fn lookup(&self, key: &str) -> Option<String>;

    /// `true` only when the variable is set to `true` (any case).
    fn is_enabled(&self, key: &str) -> bool {
        self.lookup(key)
            .is_some_and(|value| value.eq_ignore_ascii_case("true"))
    }

    /// `true` when the variable is set to `false` (any case).
    fn is_disabled(&self, key: &str) -> bool {
        self.lookup(key)
            .is_some_and(|value| value.eq_ignore_ascii_case("false"))
    }
}

#[derive(Debug, Clone, Copy, Default)]
pub struct ProcessEnvironment;

impl Environment for ProcessEnvironment {
    fn lookup(&self, key: &str) -> Option<String> {
        env::var(key).ok()
    }
}

impl Environment for HashMap<String, String> {
    fn lookup(&self, key: &str) -> Option<String> {
        self.get(key).cloned()
    }
}

/// Expands `$NAME`, `${NAME}` and `${NAME:-default}` against `env`.
///
/// Unknown names expand to the empty string. Returns `None` when a `${` is
/// never closed.
pub fn expand_variables(value: &str, env: &dyn Environment) -> Option<String> {
    let mut expanded = String::with_capacity(value.len());
    let mut rest = value;

    while let Some(idx) = rest.find('$') {
        expanded.push_str(&rest[..idx]);
        let after = &rest[idx + 1..];

        if let Some(braced) = after.strip_prefix('{') {
            let end = braced.find('}')?;
            let inner = &braced[..end];
            let (name, default) = match inner.split_once(":-") {
                Some((name, default)) => (name, Some(default)),
                None => (inner, None),
            };
            match env.lookup(name).filter(|value| !value.is_empty()) {
                Some(found) => expanded.push_str(&found),
                None => expanded.push_str(default.unwrap_or("")),
            }
            rest = &braced[end + 1..];
            continue;
        }

        let name_len = if after.starts_with(|ch: char| ch.is_ascii_alphabetic() || ch == '_') {
            after
                .find(|ch: char| !(ch.is_ascii_alphanumeric() || ch == '_'))
                .unwrap_or(after.len())
        } else {
            0
        };
        if name_len == 0 {
            expanded.push('$');
            rest = after;
            continue;
        }

        let name = &after[..name_len];
        if let Some(found) = env.lookup(name) {
            expanded.push_str(&found);
        }
        rest = &after[name_len..];
    }

    expanded.push_str(rest);
    Some(expanded)
}
