//! Rewrite rule synthesis (spec §4.6 output 3): exclude static resources,
//! the admin path, REST paths, and direct CFML URLs; forward everything
//! else to `/<routerFile>/$1`, preserving `PATH_INFO`.

use crate::{atomic_write, MaterializeError};
use std::path::Path;

/// Extensions served directly without going through the router.
const STATIC_EXTENSIONS: &[&str] = &[
    "css", "js", "png", "jpg", "jpeg", "gif", "svg", "ico", "woff", "woff2", "ttf", "map", "txt",
    "json", "xml", "pdf",
];

pub struct RewriteOptions {
    pub router_file: String,
    pub enable_rest: bool,
    pub admin_enabled: bool,
}

/// One rewrite rule: `pattern` excluded from rewriting (served as-is) or
/// the catch-all forward to the router.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RewriteRule {
    pub pattern: String,
    pub action: RewriteAction,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RewriteAction {
    PassThrough,
    Forward { target: String },
}

pub fn build_rules(opts: &RewriteOptions) -> Vec<RewriteRule> {
    let mut rules = Vec::new();

    for ext in STATIC_EXTENSIONS {
        rules.push(RewriteRule {
            pattern: format!(r"\.{ext}$"),
            action: RewriteAction::PassThrough,
        });
    }
    rules.push(RewriteRule {
        pattern: r"^/(css|js|images|assets|static)/".to_owned(),
        action: RewriteAction::PassThrough,
    });
    rules.push(RewriteRule {
        pattern: r"^/lucee/admin".to_owned(),
        action: RewriteAction::PassThrough,
    });
    if opts.admin_enabled {
        rules.push(RewriteRule {
            pattern: r"^/admin".to_owned(),
            action: RewriteAction::PassThrough,
        });
    }
    if opts.enable_rest {
        rules.push(RewriteRule {
            pattern: r"^/rest/".to_owned(),
            action: RewriteAction::PassThrough,
        });
    }
    rules.push(RewriteRule {
        pattern: r"\.(cfm|cfc|cfml)$".to_owned(),
        action: RewriteAction::PassThrough,
    });

    rules.push(RewriteRule {
        pattern: "^/(.*)$".to_owned(),
        action: RewriteAction::Forward {
            target: format!("/{}/$1", opts.router_file),
        },
    });

    rules
}

/// Render rules into the runtime's rewrite configuration format: an ordered
/// list of `pattern -> action` lines, first match wins, with an explicit
/// `[forward,qsappend,passthrough:PATH_INFO]` flag on the catch-all so
/// `PATH_INFO` survives the internal forward (no HTTP redirect is issued).
pub fn render(opts: &RewriteOptions) -> String {
    let rules = build_rules(opts);
    let mut out = String::from("# generated rewrite configuration\n");
    for rule in rules {
        match rule.action {
            RewriteAction::PassThrough => {
                out.push_str(&format!("RewriteRule {} - [L]\n", rule.pattern));
            }
            RewriteAction::Forward { target } => {
                out.push_str(&format!(
                    "RewriteRule {} {} [forward,qsappend,passthrough:PATH_INFO,L]\n",
                    rule.pattern, target
                ));
            }
        }
    }
    out
}

pub fn materialize(dest: &Path, opts: &RewriteOptions) -> Result<(), MaterializeError> {
    let rendered = render(opts);
    atomic_write(dest, rendered.as_bytes())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn base_opts() -> RewriteOptions {
        RewriteOptions {
            router_file: "index.cfm".to_owned(),
            enable_rest: false,
            admin_enabled: false,
        }
    }

    #[test]
    fn static_extensions_pass_through() {
        let rules = build_rules(&base_opts());
        assert!(rules
            .iter()
            .any(|r| r.pattern == r"\.css$" && r.action == RewriteAction::PassThrough));
    }

    #[test]
    fn direct_cfml_urls_pass_through() {
        let rules = build_rules(&base_opts());
        assert!(rules
            .iter()
            .any(|r| r.pattern.contains("cfm|cfc|cfml")));
    }

    #[test]
    fn rest_paths_pass_through_when_enabled() {
        let mut opts = base_opts();
        opts.enable_rest = true;
        let rules = build_rules(&opts);
        assert!(rules.iter().any(|r| r.pattern == r"^/rest/"));
    }

    #[test]
    fn rest_paths_absent_when_disabled() {
        let rules = build_rules(&base_opts());
        assert!(!rules.iter().any(|r| r.pattern == r"^/rest/"));
    }

    #[test]
    fn catch_all_forwards_to_router_file_preserving_path_info() {
        let rendered = render(&base_opts());
        assert!(rendered.contains("/index.cfm/$1"));
        assert!(rendered.contains("passthrough:PATH_INFO"));
        assert!(rendered.contains("forward"));
        assert!(!rendered.contains("redirect"));
    }

    #[test]
    fn catch_all_is_last_rule() {
        let rules = build_rules(&base_opts());
        assert!(matches!(
            rules.last().unwrap().action,
            RewriteAction::Forward { .. }
        ));
    }
}
