//! # Configuration Flow
//!
//! TOML file on disk to a running control plane, and the startup failures
//! that must keep the relay from starting.

#[cfg(test)]
mod tests {
    use std::io::Write;

    use relay_core::{
        AckMode, BindError, ConfigError, ControlPlane, RelayConfig, RelayError,
    };
    use relay_runtime::handlers::default_directory;

    fn write_config(content: &str) -> tempfile::NamedTempFile {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        file.write_all(content.as_bytes()).unwrap();
        file
    }

    #[test]
    fn test_file_to_running_plane() {
        let file = write_config(
            r#"
            ack_mode = "auto"

            [[subscriptions]]
            name = "orders-sub"
            topic = "orders"
            handler = "json"

            [[subscriptions]]
            name = "audit-sub"
            handler = "log"
            "#,
        );

        let config = RelayConfig::load(file.path()).unwrap();
        assert_eq!(config.ack_mode, AckMode::Auto);

        let plane = ControlPlane::bootstrap(&config, &default_directory().unwrap()).unwrap();
        let names: Vec<_> = plane.adapters().iter().map(|a| a.name().to_string()).collect();
        assert_eq!(names, vec!["orders-sub", "audit-sub"]);

        // Topic falls back to the subscription name.
        let audit = plane.adapter("audit-sub").unwrap();
        assert_eq!(audit.subscription().topic(), "audit-sub");
        assert_eq!(plane.state_counts().running, 2);
    }

    #[test]
    fn test_unknown_handler_prevents_start() {
        let file = write_config(
            r#"
            [[subscriptions]]
            name = "orders-sub"
            topic = "orders"
            handler = "archive"
            "#,
        );

        let config = RelayConfig::load(file.path()).unwrap();
        let err = ControlPlane::bootstrap(&config, &default_directory().unwrap()).unwrap_err();
        assert_eq!(
            err,
            RelayError::Bind(BindError::UnknownHandler {
                handler: "archive".to_string(),
                subscription: "orders-sub".to_string(),
            })
        );
    }

    #[test]
    fn test_missing_handler_field_prevents_start() {
        let file = write_config(
            r#"
            [[subscriptions]]
            name = "orders-sub"
            topic = "orders"
            "#,
        );

        let config = RelayConfig::load(file.path()).unwrap();
        let err = ControlPlane::bootstrap(&config, &default_directory().unwrap()).unwrap_err();
        assert!(matches!(
            err,
            RelayError::Config(ConfigError::MissingField {
                field: "handler",
                ..
            })
        ));
    }

    #[test]
    fn test_unreadable_file() {
        let err = RelayConfig::load("/nonexistent/relay.toml").unwrap_err();
        assert!(matches!(err, ConfigError::Io { .. }));
    }
}
