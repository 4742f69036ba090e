//! Standalone binary to validate a model registry file (or the built-in one).
//! Used by CI to ensure registry files are valid.
//!
//! Usage: `validate_registry [PATH]`; `LLM_REGISTRY_PATH` is used when no path is given.

use anyhow::Context;
use tracing_subscriber::EnvFilter;
use unified_llm::ModelRegistry;

fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("warn")))
        .with_writer(std::io::stderr)
        .init();

    let path = std::env::args()
        .nth(1)
        .or_else(|| std::env::var("LLM_REGISTRY_PATH").ok());

    let registry = match &path {
        Some(p) => {
            println!("Validating registry file: {}", p);
            ModelRegistry::from_path(p).with_context(|| format!("registry '{}' is invalid", p))
        }
        None => {
            println!("Validating built-in registry");
            ModelRegistry::builtin().context("built-in registry is invalid")
        }
    };

    let registry = match registry {
        Ok(r) => r,
        Err(e) => {
            println!("❌ {:#}", e);
            std::process::exit(1);
        }
    };

    println!("\n=== Providers ===");
    for p in registry.list_providers() {
        println!(
            "{:<12} {:<18} stream={:<5} {}",
            p.id,
            p.family.to_string(),
            p.supports_streaming,
            p.base_url
        );
    }

    println!("\n=== Models ===");
    let models = registry.list_models(None)?;
    for m in &models {
        let mut flags = Vec::new();
        if m.supports_streaming {
            flags.push("stream");
        }
        if m.stream_only {
            flags.push("stream-only");
        }
        if m.supports_temperature {
            flags.push("temperature");
        }
        if m.supports_thinking {
            flags.push("thinking");
        }
        if m.is_reasoning_model {
            flags.push("reasoning");
        }
        println!(
            "{:<12} {:<32} max_tokens={:<7} [{}]",
            m.provider_id,
            m.id,
            m.max_tokens,
            flags.join(", ")
        );
    }

    println!(
        "\n✅ {} providers, {} models",
        registry.list_providers().len(),
        models.len()
    );
    Ok(())
}
