//! Placeholder substitution over a merged manifest tree (spec §4.2, C2).
//!
//! Walks every string value in the merged manifest JSON tree and resolves
//! `#env:NAME[:-default]#` (primary form), legacy `${NAME[:-default]}`
//! (deprecated, one-time warning), and `${secret:NAME}` (delegates to
//! [`lucli_secrets::SecretStore`]) — skipping the two protected zones named
//! in spec §4.1: the `configuration` block and `jvm.additionalArgs`.
//!
//! A recurse-and-rewrite tree walk over a generic `serde_json::Value`,
//! since the manifest schema is itself JSON rather than a fixed struct.

use crate::CoreError;
use lucli_secrets::SecretStore;
use serde_json::Value;
use std::collections::BTreeMap;
use std::path::Path;

/// Resolves placeholders against a `.env` file (loaded once at construction)
/// and the process environment, in that precedence order (spec §4.2).
pub struct EnvironmentResolver {
    dotenv: BTreeMap<String, String>,
}

impl EnvironmentResolver {
    pub fn new(dotenv: BTreeMap<String, String>) -> Self {
        Self { dotenv }
    }

    /// Load the `.env` file from `project_dir`, if present.
    pub fn load(project_dir: &Path) -> Result<Self, CoreError> {
        let dotenv_path = project_dir.join(".env");
        let dotenv = if dotenv_path.exists() {
            parse_dotenv(&std::fs::read_to_string(&dotenv_path)?)
        } else {
            BTreeMap::new()
        };
        Ok(Self::new(dotenv))
    }

    fn lookup(&self, name: &str) -> Option<String> {
        self.dotenv
            .get(name)
            .cloned()
            .or_else(|| std::env::var(name).ok())
    }

    /// Substitute every non-protected string in `root` in place. `secrets`
    /// is required only if the manifest actually references `${secret:...}`.
    pub fn substitute(
        &self,
        root: &mut Value,
        secrets: Option<&SecretStore>,
    ) -> Result<(), CoreError> {
        let mut warned_legacy = false;
        self.walk(root, &[], secrets, &mut warned_legacy)
    }

    fn walk(
        &self,
        value: &mut Value,
        path: &[&str],
        secrets: Option<&SecretStore>,
        warned_legacy: &mut bool,
    ) -> Result<(), CoreError> {
        match value {
            Value::String(s) => {
                let (new_value, whole_token) = self.substitute_str(s, secrets, warned_legacy)?;
                *value = if whole_token {
                    coerce_scalar(&new_value)
                } else {
                    Value::String(new_value)
                };
            }
            Value::Array(items) => {
                for item in items.iter_mut() {
                    self.walk(item, path, secrets, warned_legacy)?;
                }
            }
            Value::Object(map) => {
                for (key, val) in map.iter_mut() {
                    if is_protected_zone(path, key) {
                        continue;
                    }
                    let mut child_path: Vec<&str> = path.to_vec();
                    child_path.push(key.as_str());
                    self.walk(val, &child_path, secrets, warned_legacy)?;
                }
            }
            _ => {}
        }
        Ok(())
    }

    /// Returns the substituted string plus whether the *entire* input was a
    /// single token (no literal prefix/suffix), in which case the caller
    /// retypes the result as a JSON scalar instead of leaving it a string.
    fn substitute_str(
        &self,
        s: &str,
        secrets: Option<&SecretStore>,
        warned_legacy: &mut bool,
    ) -> Result<(String, bool), CoreError> {
        let mut out = String::with_capacity(s.len());
        let mut rest = s;
        let mut token_count = 0usize;
        let mut literal_chars = 0usize;

        loop {
            let env_pos = rest.find("#env:");
            let dollar_pos = rest.find("${");
            let next = match (env_pos, dollar_pos) {
                (Some(e), Some(d)) if d < e => Some((d, true)),
                (Some(e), _) => Some((e, false)),
                (None, Some(d)) => Some((d, true)),
                (None, None) => None,
            };

            let Some((pos, is_dollar)) = next else {
                literal_chars += rest.chars().count();
                out.push_str(rest);
                break;
            };

            literal_chars += rest[..pos].chars().count();
            out.push_str(&rest[..pos]);

            if is_dollar {
                let after = &rest[pos + 2..];
                let Some(end) = after.find('}') else {
                    literal_chars += rest[pos..].chars().count();
                    out.push_str(&rest[pos..]);
                    rest = "";
                    break;
                };
                let body = &after[..end];
                let value = if let Some(secret_name) = body.strip_prefix("secret:") {
                    match secrets {
                        Some(store) => store
                            .require_utf8(secret_name)
                            .map_err(|_| CoreError::MissingSecret(secret_name.to_owned()))?,
                        None => return Err(CoreError::MissingSecret(secret_name.to_owned())),
                    }
                } else {
                    if !*warned_legacy {
                        tracing::warn!(
                            "legacy placeholder syntax '${{{body}}}' is deprecated; use #env:{body}# instead"
                        );
                        *warned_legacy = true;
                    }
                    self.resolve_env_token(body)?
                };
                token_count += 1;
                out.push_str(&value);
                rest = &after[end + 1..];
            } else {
                let after = &rest[pos + 5..];
                let Some(end) = after.find('#') else {
                    literal_chars += rest[pos..].chars().count();
                    out.push_str(&rest[pos..]);
                    rest = "";
                    break;
                };
                let body = &after[..end];
                let value = self.resolve_env_token(body)?;
                token_count += 1;
                out.push_str(&value);
                rest = &after[end + 1..];
            }
        }

        Ok((out, token_count == 1 && literal_chars == 0))
    }

    fn resolve_env_token(&self, body: &str) -> Result<String, CoreError> {
        let (name, default) = match body.find(":-") {
            Some(idx) => (&body[..idx], Some(&body[idx + 2..])),
            None => (body, None),
        };
        match self.lookup(name) {
            Some(value) => Ok(value),
            None => default
                .map(str::to_owned)
                .ok_or_else(|| CoreError::MissingVariable(name.to_owned())),
        }
    }
}

/// The two protected zones named in spec §4.1: `configuration` at the
/// manifest root, and `jvm.additionalArgs`.
fn is_protected_zone(path: &[&str], key: &str) -> bool {
    (path.is_empty() && key == "configuration") || (path == ["jvm"] && key == "additionalArgs")
}

fn coerce_scalar(raw: &str) -> Value {
    match raw {
        "true" => return Value::Bool(true),
        "false" => return Value::Bool(false),
        "null" => return Value::Null,
        _ => {}
    }
    if let Ok(n) = raw.parse::<i64>() {
        return Value::from(n);
    }
    if let Ok(f) = raw.parse::<f64>() {
        return Value::from(f);
    }
    Value::String(raw.to_owned())
}

/// Parse a `.env` file: `KEY=value` lines, `#`-prefixed comments, blank
/// lines ignored, optional matching single/double quotes stripped from the
/// value.
fn parse_dotenv(content: &str) -> BTreeMap<String, String> {
    let mut map = BTreeMap::new();
    for line in content.lines() {
        let line = line.trim();
        if line.is_empty() || line.starts_with('#') {
            continue;
        }
        let line = line.strip_prefix("export ").unwrap_or(line);
        let Some((key, value)) = line.split_once('=') else {
            continue;
        };
        let key = key.trim();
        let mut value = value.trim();
        if value.len() >= 2 {
            let bytes = value.as_bytes();
            if (bytes[0] == b'"' && bytes[value.len() - 1] == b'"')
                || (bytes[0] == b'\'' && bytes[value.len() - 1] == b'\'')
            {
                value = &value[1..value.len() - 1];
            }
        }
        if !key.is_empty() {
            map.insert(key.to_owned(), value.to_owned());
        }
    }
    map
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn resolver_with(vars: &[(&str, &str)]) -> EnvironmentResolver {
        let map = vars
            .iter()
            .map(|(k, v)| ((*k).to_owned(), (*v).to_owned()))
            .collect();
        EnvironmentResolver::new(map)
    }

    #[test]
    fn primary_form_resolves_from_dotenv() {
        let resolver = resolver_with(&[("HTTP_PORT", "9090")]);
        let mut root = json!({"port": "#env:HTTP_PORT#"});
        resolver.substitute(&mut root, None).unwrap();
        assert_eq!(root["port"], json!(9090));
    }

    #[test]
    fn primary_form_falls_back_to_default() {
        let resolver = resolver_with(&[]);
        let mut root = json!({"port": "#env:HTTP_PORT:-8080#"});
        resolver.substitute(&mut root, None).unwrap();
        assert_eq!(root["port"], json!(8080));
    }

    #[test]
    fn missing_variable_without_default_is_fatal() {
        let resolver = resolver_with(&[]);
        let mut root = json!({"port": "#env:HTTP_PORT#"});
        let err = resolver.substitute(&mut root, None).unwrap_err();
        assert!(matches!(err, CoreError::MissingVariable(name) if name == "HTTP_PORT"));
    }

    #[test]
    fn configuration_block_is_a_protected_zone() {
        let resolver = resolver_with(&[("FOO", "bar")]);
        let mut root = json!({"configuration": {"x": "#env:FOO#"}, "name": "#env:FOO#"});
        resolver.substitute(&mut root, None).unwrap();
        assert_eq!(root["configuration"]["x"], json!("#env:FOO#"));
        assert_eq!(root["name"], json!("bar"));
    }

    #[test]
    fn jvm_additional_args_is_a_protected_zone() {
        let resolver = resolver_with(&[("FOO", "bar")]);
        let mut root = json!({"jvm": {"additionalArgs": ["-D${FOO}"], "maxMemory": "#env:FOO#"}});
        resolver.substitute(&mut root, None).unwrap();
        assert_eq!(root["jvm"]["additionalArgs"][0], json!("-D${FOO}"));
        assert_eq!(root["jvm"]["maxMemory"], json!("bar"));
    }

    #[test]
    fn embedded_token_stays_a_string() {
        let resolver = resolver_with(&[("HOST", "example.test")]);
        let mut root = json!({"url": "https://#env:HOST#/app"});
        resolver.substitute(&mut root, None).unwrap();
        assert_eq!(root["url"], json!("https://example.test/app"));
    }

    #[test]
    fn legacy_form_still_resolves() {
        let resolver = resolver_with(&[("FOO", "legacy-value")]);
        let mut root = json!({"name": "${FOO}"});
        resolver.substitute(&mut root, None).unwrap();
        assert_eq!(root["name"], json!("legacy-value"));
    }

    #[test]
    fn secret_without_store_is_missing_secret() {
        let resolver = resolver_with(&[]);
        let mut root = json!({"password": "${secret:DB_PASSWORD}"});
        let err = resolver.substitute(&mut root, None).unwrap_err();
        assert!(matches!(err, CoreError::MissingSecret(name) if name == "DB_PASSWORD"));
    }

    #[test]
    fn secret_resolves_from_store() {
        let dir = tempfile::tempdir().unwrap();
        let mut store = SecretStore::open(dir.path().join("local.json"), b"pass").unwrap();
        store.put("DB_PASSWORD", b"hunter2").unwrap();

        let resolver = resolver_with(&[]);
        let mut root = json!({"password": "${secret:DB_PASSWORD}"});
        resolver.substitute(&mut root, Some(&store)).unwrap();
        assert_eq!(root["password"], json!("hunter2"));
    }

    #[test]
    fn parse_dotenv_handles_quotes_and_comments() {
        let content = "# a comment\nFOO=bar\nQUOTED=\"has spaces\"\nexport BAZ=1\n\nEMPTY=\n";
        let map = parse_dotenv(content);
        assert_eq!(map.get("FOO").unwrap(), "bar");
        assert_eq!(map.get("QUOTED").unwrap(), "has spaces");
        assert_eq!(map.get("BAZ").unwrap(), "1");
        assert_eq!(map.get("EMPTY").unwrap(), "");
    }

    #[test]
    fn open_browser_url_empty_is_not_coerced_away() {
        // Boundary behavior from spec §8: openBrowserURL = "" behaves as
        // unset; that is the caller's responsibility (engine.rs), not the
        // resolver's — substitution on a literal empty string is a no-op.
        let resolver = resolver_with(&[]);
        let mut root = json!({"openBrowserURL": ""});
        resolver.substitute(&mut root, None).unwrap();
        assert_eq!(root["openBrowserURL"], json!(""));
    }
}
