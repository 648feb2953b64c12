//! Integration tests for provider registration and role-based routing,
//! without any network calls.

use std::collections::HashMap;
use wd_domain::config::{
    AuthConfig, FallbackConfig, LlmConfig, ProviderConfig, ProviderKind, RoleConfig,
};
use wd_providers::registry::ProviderRegistry;
use wd_providers::router::resolve_model;

fn compat_provider(id: &str) -> ProviderConfig {
    ProviderConfig {
        id: id.to_string(),
        kind: ProviderKind::OpenaiCompat,
        base_url: "https://example.invalid/v1".into(),
        auth: AuthConfig {
            key: Some("test-key".into()),
            ..Default::default()
        },
        default_model: None,
    }
}

#[test]
fn resolve_model_splits_provider_and_model() {
    assert_eq!(resolve_model("openai/gpt-4o"), ("openai", "gpt-4o"));
    assert_eq!(resolve_model("openai"), ("openai", ""));
}

#[test]
fn registry_skips_unsupported_provider_kind() {
    let mut config = LlmConfig::default();
    config.providers.push(ProviderConfig {
        id: "claude".into(),
        kind: ProviderKind::Anthropic,
        base_url: "https://example.invalid".into(),
        auth: AuthConfig::default(),
        default_model: None,
    });

    let registry = ProviderRegistry::from_config(&config).unwrap();
    assert!(registry.is_empty());
    assert_eq!(registry.init_errors().len(), 1);
    assert_eq!(registry.init_errors()[0].provider_id, "claude");
}

#[test]
fn registry_registers_openai_compat_provider() {
    let mut config = LlmConfig::default();
    config.providers.push(compat_provider("primary"));

    let registry = ProviderRegistry::from_config(&config).unwrap();
    assert_eq!(registry.len(), 1);
    assert!(registry.get("primary").is_some());
    assert!(registry.init_errors().is_empty());
}

#[test]
fn registry_resolves_role_to_provider_and_model() {
    let mut config = LlmConfig::default();
    config.providers.push(compat_provider("primary"));
    config.roles.insert(
        "planner".into(),
        RoleConfig {
            model: "primary/gpt-4o".into(),
            require_tools: false,
            require_json: false,
            require_streaming: false,
            fallbacks: vec![FallbackConfig {
                model: "primary/gpt-4o-mini".into(),
                require_tools: false,
                require_json: false,
            }],
        },
    );

    let registry = ProviderRegistry::from_config(&config).unwrap();
    assert!(registry.for_role("planner").is_some());
    assert_eq!(registry.model_for_role("planner"), Some("primary/gpt-4o"));
    assert!(registry.for_role("missing_role").is_none());
}

#[test]
fn registry_reports_roles_map() {
    let mut config = LlmConfig::default();
    config.providers.push(compat_provider("primary"));
    let mut roles = HashMap::new();
    roles.insert(
        "executor".to_string(),
        RoleConfig {
            model: "primary/gpt-4o".into(),
            require_tools: true,
            require_json: false,
            require_streaming: true,
            fallbacks: vec![],
        },
    );
    config.roles = roles;

    let registry = ProviderRegistry::from_config(&config).unwrap();
    let listed = registry.list_roles();
    assert_eq!(listed.get("executor"), Some(&"primary/gpt-4o".to_string()));
}
