//! Registry loading from YAML/JSON sources and the built-in catalogue.

use unified_llm::{ErrorKind, ModelRegistry, ProtocolFamily, UnifiedClient};

const SMALL_YAML: &str = r#"
providers:
  acme:
    name: Acme AI
    base_url: https://llm.acme.test/v1
    uses_openai_protocol: true
    supports_streaming: false
    models:
      acme-large:
        name: Acme Large
        max_tokens: 8192
        supports_temperature: true
        supports_streaming: true
        supports_thinking: false
  moonshot:
    name: Moonshot
    base_url: https://api.moonshot.test
    protocol: anthropic
    supports_streaming: true
    models:
      kimi-think:
        name: Kimi Think
        max_tokens: 32000
        supports_temperature: false
        supports_streaming: true
        supports_thinking: true
        stream_only: true
"#;

#[test]
fn yaml_source_loads_with_effective_flags() {
    let registry = ModelRegistry::from_yaml_str(SMALL_YAML).unwrap();

    let ids: Vec<&str> = registry.list_providers().iter().map(|p| p.id.as_str()).collect();
    assert_eq!(ids, vec!["acme", "moonshot"]);

    let (provider, model) = registry.resolve("acme-large").unwrap();
    assert_eq!(provider.family, ProtocolFamily::OpenAiCompatible);
    // Provider without streaming disables it for its models.
    assert!(!model.supports_streaming);

    let (provider, model) = registry.resolve("kimi-think").unwrap();
    assert_eq!(provider.family, ProtocolFamily::AnthropicNative);
    assert!(model.stream_only);
    assert!(model.supports_thinking);
}

#[test]
fn json_source_and_file_loading() {
    let json = r#"{
        "providers": {
            "local": {
                "name": "Local",
                "base_url": "http://localhost:8000/v1",
                "uses_openai_protocol": true,
                "supports_streaming": true,
                "models": {
                    "llama-3": {
                        "name": "Llama 3",
                        "max_tokens": 4096,
                        "supports_temperature": true,
                        "supports_streaming": true,
                        "supports_thinking": false
                    }
                }
            }
        }
    }"#;
    let registry = ModelRegistry::from_json_str(json).unwrap();
    assert_eq!(registry.model("llama-3").unwrap().max_tokens, 4096);

    let path = std::env::temp_dir().join(format!("registry-{}.json", uuid::Uuid::new_v4()));
    std::fs::write(&path, json).unwrap();
    let from_file = ModelRegistry::from_path(&path).unwrap();
    std::fs::remove_file(&path).ok();
    assert_eq!(from_file.model("llama-3"), registry.model("llama-3"));

    let client = UnifiedClient::builder()
        .registry(from_file)
        .build()
        .unwrap();
    assert_eq!(client.list_models(None).unwrap().len(), 1);
}

#[test]
fn missing_capability_field_fails_schema_validation() {
    let yaml = r#"
providers:
  acme:
    name: Acme
    base_url: https://llm.acme.test
    uses_openai_protocol: true
    supports_streaming: true
    models:
      acme-1:
        name: Acme 1
        max_tokens: 100
        supports_temperature: true
        supports_thinking: false
"#;
    let err = ModelRegistry::from_yaml_str(yaml).unwrap_err();
    assert_eq!(err.kind(), ErrorKind::Configuration);
    let text = err.to_string();
    assert!(text.contains("schema"), "{text}");
    assert!(text.contains("supports_streaming"), "{text}");
}

#[test]
fn duplicate_model_ids_across_providers_are_rejected() {
    let yaml = r#"
providers:
  a:
    name: A
    base_url: https://a.test
    uses_openai_protocol: true
    supports_streaming: true
    models:
      shared:
        name: Shared
        max_tokens: 100
        supports_temperature: true
        supports_streaming: true
        supports_thinking: false
  b:
    name: B
    base_url: https://b.test
    uses_openai_protocol: true
    supports_streaming: true
    models:
      shared:
        name: Shared again
        max_tokens: 100
        supports_temperature: true
        supports_streaming: true
        supports_thinking: false
"#;
    let err = ModelRegistry::from_yaml_str(yaml).unwrap_err();
    assert_eq!(err.kind(), ErrorKind::Configuration);
    assert!(err.to_string().contains("duplicate model id 'shared'"));
}

#[test]
fn semantic_errors_are_configuration_errors() {
    let stream_only_without_streaming = r#"
providers:
  a:
    name: A
    base_url: https://a.test
    uses_openai_protocol: true
    supports_streaming: true
    models:
      m:
        name: M
        max_tokens: 100
        supports_temperature: true
        supports_streaming: false
        supports_thinking: false
        stream_only: true
"#;
    let unknown_family = r#"
providers:
  mystery:
    name: Mystery
    base_url: https://mystery.test
    supports_streaming: true
    models: {}
"#;
    let bad_url = r#"
providers:
  a:
    name: A
    base_url: "not a url"
    uses_openai_protocol: true
    supports_streaming: true
    models: {}
"#;
    for yaml in [stream_only_without_streaming, unknown_family, bad_url, "providers: [", ""] {
        let err = ModelRegistry::from_yaml_str(yaml).unwrap_err();
        assert_eq!(err.kind(), ErrorKind::Configuration, "{yaml}");
    }
}

#[test]
fn builtin_catalogue_is_consistent() {
    let registry = ModelRegistry::builtin().unwrap();
    let providers: Vec<&str> = registry.list_providers().iter().map(|p| p.id.as_str()).collect();
    for id in ["anthropic", "deepseek", "google", "openai", "qwen", "volcengine"] {
        assert!(providers.contains(&id), "missing provider {id}");
    }

    for provider in registry.list_providers() {
        for model_id in &provider.model_ids {
            let (owner, model) = registry.resolve(model_id).unwrap();
            assert_eq!(owner.id, provider.id);
            assert!(model.max_tokens > 0);
            if model.stream_only {
                assert!(model.supports_streaming, "{model_id}");
            }
        }
    }

    assert_eq!(
        registry.provider("google").unwrap().family,
        ProtocolFamily::GoogleNative
    );
    assert_eq!(
        registry.provider("qwen").unwrap().family,
        ProtocolFamily::DashScopeNative
    );
    assert_eq!(
        registry.provider("deepseek").unwrap().family,
        ProtocolFamily::OpenAiCompatible
    );
}

#[test]
fn unknown_provider_filter_on_listing() {
    let registry = ModelRegistry::builtin().unwrap();
    let err = registry.list_models(Some("nope")).unwrap_err();
    assert_eq!(err.kind(), ErrorKind::Configuration);

    let anthropic = registry.list_models(Some("anthropic")).unwrap();
    assert!(!anthropic.is_empty());
    assert!(anthropic.iter().all(|m| m.provider_id == "anthropic"));
}
