//! Server descriptor (XML): connector port, shutdown port, and an optional
//! HTTPS connector (spec §4.6 output 1).

use crate::{atomic_write, MaterializeError};
use std::path::Path;

/// The runtime's default server descriptor template. Real distributions
/// ship their own `server.xml`/equivalent; this is the fallback used when
/// the runtime backend hasn't already deployed one of its own.
const DEFAULT_TEMPLATE: &str = r#"<?xml version="1.0" encoding="UTF-8"?>
<Server port="{{shutdown_port}}" shutdown="SHUTDOWN">
  <Service name="lucli">
    <Connector port="{{port}}" protocol="HTTP/1.1" connectionTimeout="20000" {{redirect_attr}}/>
{{https_connector}}  </Service>
</Server>
"#;

pub struct ServerDescriptorOptions {
    pub port: u16,
    pub shutdown_port: u16,
    pub https_port: Option<u16>,
    pub https_redirect: bool,
    pub keystore_path: Option<String>,
    pub keystore_password: Option<String>,
}

pub fn render(template: Option<&str>, opts: &ServerDescriptorOptions) -> String {
    let template = template.unwrap_or(DEFAULT_TEMPLATE);

    let redirect_attr = if opts.https_port.is_some() && opts.https_redirect {
        format!(r#"redirectPort="{}" "#, opts.https_port.unwrap())
    } else {
        String::new()
    };

    let https_connector = match (opts.https_port, &opts.keystore_path, &opts.keystore_password) {
        (Some(https_port), Some(keystore_path), Some(keystore_password)) => format!(
            "    <Connector port=\"{https_port}\" protocol=\"HTTP/1.1\" SSLEnabled=\"true\" scheme=\"https\" secure=\"true\" keystoreFile=\"{keystore_path}\" keystorePass=\"{keystore_password}\"/>\n",
        ),
        _ => String::new(),
    };

    template
        .replace("{{port}}", &opts.port.to_string())
        .replace("{{shutdown_port}}", &opts.shutdown_port.to_string())
        .replace("{{redirect_attr}}", &redirect_attr)
        .replace("{{https_connector}}", &https_connector)
}

pub fn materialize(
    dest: &Path,
    template: Option<&str>,
    opts: &ServerDescriptorOptions,
) -> Result<(), MaterializeError> {
    let rendered = render(template, opts);
    atomic_write(dest, rendered.as_bytes())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn base_opts() -> ServerDescriptorOptions {
        ServerDescriptorOptions {
            port: 8080,
            shutdown_port: 8081,
            https_port: None,
            https_redirect: false,
            keystore_path: None,
            keystore_password: None,
        }
    }

    #[test]
    fn render_substitutes_ports() {
        let rendered = render(None, &base_opts());
        assert!(rendered.contains(r#"port="8080""#));
        assert!(rendered.contains(r#"shutdown="SHUTDOWN""#));
        assert!(rendered.contains(r#"port="8081""#));
    }

    #[test]
    fn render_without_https_omits_https_connector() {
        let rendered = render(None, &base_opts());
        assert!(!rendered.contains("SSLEnabled"));
    }

    #[test]
    fn render_with_https_inserts_connector_referencing_keystore() {
        let mut opts = base_opts();
        opts.https_port = Some(8443);
        opts.keystore_path = Some("/instance/keystore.p12".to_owned());
        opts.keystore_password = Some("changeit".to_owned());

        let rendered = render(None, &opts);
        assert!(rendered.contains(r#"port="8443""#));
        assert!(rendered.contains("SSLEnabled=\"true\""));
        assert!(rendered.contains("/instance/keystore.p12"));
    }

    #[test]
    fn render_with_redirect_adds_redirect_port_to_plain_connector() {
        let mut opts = base_opts();
        opts.https_port = Some(8443);
        opts.https_redirect = true;
        opts.keystore_path = Some("/instance/keystore.p12".to_owned());
        opts.keystore_password = Some("changeit".to_owned());

        let rendered = render(None, &opts);
        assert!(rendered.contains(r#"redirectPort="8443""#));
    }

    #[test]
    fn materialize_writes_file_atomically() {
        let dir = tempfile::tempdir().unwrap();
        let dest = dir.path().join("server.xml");
        materialize(&dest, None, &base_opts()).unwrap();
        assert!(dest.exists());
    }

    #[test]
    fn materialize_is_idempotent() {
        let dir = tempfile::tempdir().unwrap();
        let dest = dir.path().join("server.xml");
        let opts = base_opts();
        materialize(&dest, None, &opts).unwrap();
        let first = std::fs::read(&dest).unwrap();
        materialize(&dest, None, &opts).unwrap();
        let second = std::fs::read(&dest).unwrap();
        assert_eq!(first, second);
    }
}
