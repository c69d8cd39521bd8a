//! MCP configuration types — re-exported from `nav-domain` so the rest of
//! the workspace can depend on the config shape without pulling in the full
//! client crate (`mcp_config.json`, spec.md §6).

pub use nav_domain::config::mcp::{McpConfig, McpServerConfig, TransportKind};

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn empty_config_has_no_servers() {
        let cfg: McpConfig = serde_json::from_str("{}").unwrap();
        assert!(cfg.servers.is_empty());
    }

    #[test]
    fn precedence_is_url_over_embedded_over_pipe() {
        let url_cfg = McpServerConfig {
            url: Some("http://localhost:9".into()),
            embedded_http: Some(true),
            command: Some("node".into()),
            ..Default::default()
        };
        assert_eq!(url_cfg.transport_kind(), TransportKind::Network);

        let embedded_cfg = McpServerConfig {
            embedded_http: Some(true),
            command: Some("node".into()),
            ..Default::default()
        };
        assert_eq!(embedded_cfg.transport_kind(), TransportKind::Embedded);

        let pipe_cfg = McpServerConfig { command: Some("node".into()), ..Default::default() };
        assert_eq!(pipe_cfg.transport_kind(), TransportKind::Pipe);
    }
}
