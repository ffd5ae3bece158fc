use std::sync::Arc;

use axum::Router;
use tracing::{info, warn};
use wadjet_core::config::AppConfig;
use wadjet_slack::{default_registry, CommandRegistry};

use crate::{health, slash};

pub struct Application {
    pub config: AppConfig,
    pub registry: Arc<CommandRegistry>,
}

pub fn bootstrap_with_config(config: AppConfig) -> Application {
    info!(
        event_name = "system.bootstrap.start",
        correlation_id = "bootstrap",
        "starting application bootstrap"
    );

    if !config.slack.signing_enabled() {
        warn!(
            event_name = "system.bootstrap.signing_disabled",
            correlation_id = "bootstrap",
            "no Slack signing secret configured; requests will not be authenticated"
        );
    }

    let registry = Arc::new(default_registry());
    info!(
        event_name = "system.bootstrap.commands_registered",
        correlation_id = "bootstrap",
        commands = ?registry.names(),
        "slash commands registered"
    );

    Application { config, registry }
}

impl Application {
    pub fn router(&self) -> Router {
        let state = slash::SlashState::from_config(&self.config, Arc::clone(&self.registry));
        slash::router(&self.config.server.slash_path, state)
            .merge(health::router(self.registry.len()))
    }
}

#[cfg(test)]
mod tests {
    use axum::{
        body::{to_bytes, Body},
        http::{Method, Request, StatusCode},
    };
    use tower::ServiceExt;
    use wadjet_core::config::{AppConfig, ConfigError, ConfigOverrides, LoadOptions};

    use crate::bootstrap::{bootstrap_with_config, Application};

    fn bootstrap(options: LoadOptions) -> Result<Application, ConfigError> {
        AppConfig::load(options).map(bootstrap_with_config)
    }

    fn options(overrides: ConfigOverrides) -> LoadOptions {
        LoadOptions {
            config_path: Some("/nonexistent/wadjet.toml".into()),
            require_file: false,
            overrides,
        }
    }

    #[test]
    fn bootstrap_rejects_invalid_listen_address() {
        let result = bootstrap(options(ConfigOverrides {
            listen_address: Some("not an address".to_string()),
            ..ConfigOverrides::default()
        }));

        let message = result.err().expect("error").to_string();
        assert!(message.contains("listen_address"), "{message}");
    }

    #[tokio::test]
    async fn router_serves_slash_and_health_routes() {
        let app = bootstrap(options(ConfigOverrides {
            slash_path: Some("/hooks/slash".to_string()),
            ..ConfigOverrides::default()
        }))
        .expect("bootstrap should succeed");
        assert!(app.registry.contains("test"));

        let router = app.router();

        let health = Request::builder().uri("/health").body(Body::empty()).expect("request");
        let response = router.clone().oneshot(health).await.expect("response");
        assert_eq!(response.status(), StatusCode::OK);
        let bytes = to_bytes(response.into_body(), usize::MAX).await.expect("body");
        let value: serde_json::Value = serde_json::from_slice(&bytes).expect("json");
        assert_eq!(value["status"], "ready");
        assert_eq!(value["commands"], 1);

        let slash = Request::builder()
            .method(Method::POST)
            .uri("/hooks/slash")
            .header("content-type", "application/x-www-form-urlencoded")
            .body(Body::from("command=%2Ftest&text="))
            .expect("request");
        let response = router.oneshot(slash).await.expect("response");
        assert_eq!(response.status(), StatusCode::OK);
    }
}
