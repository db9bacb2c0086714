//! Web descriptor (XML): CFML engine servlet registration, REST servlet,
//! security constraints, and the URL-rewrite hook (spec §4.6 output 2).

use crate::{atomic_write, MaterializeError};
use std::path::Path;

const TEMPLATE_HEADER: &str = r#"<?xml version="1.0" encoding="UTF-8"?>
<web-app xmlns="http://xmlns.jcp.org/xml/ns/javaee" version="4.0">
"#;
const TEMPLATE_FOOTER: &str = "</web-app>\n";

pub struct WebDescriptorOptions {
    pub enable_lucee: bool,
    pub enable_rest: bool,
    pub url_rewrite_enabled: bool,
    pub runtime_supports_url_rewrite: bool,
    /// Set when a pre-existing rewrite file from a prior (deprecated)
    /// convention is present, so the caller can surface a warning.
    pub legacy_rewrite_file_present: bool,
}

pub struct RenderResult {
    pub xml: String,
    pub warnings: Vec<String>,
}

pub fn render(opts: &WebDescriptorOptions) -> RenderResult {
    let mut body = String::new();
    let mut warnings = Vec::new();

    if opts.enable_lucee {
        body.push_str(
            r#"  <servlet>
    <servlet-name>CFMLServlet</servlet-name>
    <servlet-class>lucee.loader.servlet.CFMLServlet</servlet-class>
  </servlet>
  <servlet-mapping>
    <servlet-name>CFMLServlet</servlet-name>
    <url-pattern>*.cfm</url-pattern>
    <url-pattern>*.cfc</url-pattern>
    <url-pattern>*.cfml</url-pattern>
  </servlet-mapping>
"#,
        );
    }

    if opts.enable_rest {
        body.push_str(
            r#"  <servlet>
    <servlet-name>RestServlet</servlet-name>
    <servlet-class>lucee.loader.servlet.RestServlet</servlet-class>
  </servlet>
  <servlet-mapping>
    <servlet-name>RestServlet</servlet-name>
    <url-pattern>/rest/*</url-pattern>
  </servlet-mapping>
"#,
        );
    }

    // Always block direct HTTP access to the project manifest and `.env`.
    body.push_str(
        r#"  <security-constraint>
    <web-resource-collection>
      <web-resource-name>lucli-protected</web-resource-name>
      <url-pattern>/lucee.json</url-pattern>
      <url-pattern>/.env</url-pattern>
    </web-resource-collection>
    <auth-constraint/>
  </security-constraint>
"#,
    );

    if opts.url_rewrite_enabled {
        if opts.runtime_supports_url_rewrite {
            body.push_str(
                r#"  <filter>
    <filter-name>LucliRewriteFilter</filter-name>
    <filter-class>lucli.runtime.RewriteFilter</filter-class>
  </filter>
  <filter-mapping>
    <filter-name>LucliRewriteFilter</filter-name>
    <url-pattern>/*</url-pattern>
  </filter-mapping>
"#,
            );
        } else {
            warnings.push(
                "urlRewrite.enabled is set but the selected runtime does not support URL rewriting; ignoring".to_owned(),
            );
        }
    }

    if opts.legacy_rewrite_file_present {
        warnings.push(
            "a legacy rewrite file was found; the legacy rewrite convention is deprecated, use urlRewrite.routerFile instead".to_owned(),
        );
    }

    RenderResult {
        xml: format!("{TEMPLATE_HEADER}{body}{TEMPLATE_FOOTER}"),
        warnings,
    }
}

pub fn materialize(dest: &Path, opts: &WebDescriptorOptions) -> Result<RenderResult, MaterializeError> {
    let result = render(opts);
    atomic_write(dest, result.xml.as_bytes())?;
    Ok(result)
}
