//! Models CLI subcommands: list, running, pull, delete, unload, show.
//!
//! Talks to hosts through [`ModelAdmin`]. Operations a backend cannot perform
//! are reported as such rather than treated as success.

use std::sync::Arc;
use std::time::Duration;

use super::{truncate, EXIT_CONFIG_ERROR, EXIT_FAILURE, EXIT_SUCCESS};
use crate::config::{BenchConfig, Host};
use crate::provider::{Backend, BackendFactory, HttpBackendFactory, ModelInfo, ProviderError, RunningModel};

/// Parsed `models` invocation.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ModelsCommand {
    List,
    Running,
    Pull(String),
    Delete(String),
    Unload(String),
    Show(String),
}

impl ModelsCommand {
    /// Parse `<subcommand> [MODEL]`.
    pub fn parse(subcommand: &str, model: Option<&str>) -> Result<Self, String> {
        let need_model = |build: fn(String) -> Self| {
            model
                .map(|m| build(m.to_string()))
                .ok_or_else(|| format!("models {} requires a model name", subcommand))
        };
        match subcommand {
            "list" => Ok(Self::List),
            "running" | "ps" => Ok(Self::Running),
            "pull" => need_model(Self::Pull),
            "delete" | "rm" => need_model(Self::Delete),
            "unload" => need_model(Self::Unload),
            "show" => need_model(Self::Show),
            other => Err(format!("Unknown models subcommand: {}", other)),
        }
    }

    fn mutates(&self) -> bool {
        matches!(self, Self::Pull(_) | Self::Delete(_) | Self::Unload(_))
    }
}

/// Run a models command against one host, or every host for read-only commands.
pub async fn run(config: &BenchConfig, command: ModelsCommand, host: Option<&str>) -> i32 {
    let hosts: Vec<&Host> = match host {
        Some(name) => match config.host(name) {
            Some(h) => vec![h],
            None => {
                eprintln!("Unknown host: {}", name);
                return EXIT_CONFIG_ERROR;
            }
        },
        None if command.mutates() => {
            eprintln!("--host is required for models pull/delete/unload");
            return EXIT_CONFIG_ERROR;
        }
        None => config.hosts.iter().collect(),
    };

    let factory = HttpBackendFactory::new(Duration::from_secs(config.request_timeout_secs));
    let mut code = EXIT_SUCCESS;
    for host in hosts {
        let result = match factory.create(host) {
            Ok(backend) => run_on_host(backend, host, &command).await,
            Err(e) => Err(e),
        };
        if let Err(e) = result {
            if e.is_unsupported() {
                eprintln!("{}: {}", host.name, e);
            } else {
                tracing::error!(host = %host.name, error = %e, "models command failed");
                eprintln!("{}: Error: {}", host.name, e);
            }
            code = EXIT_FAILURE;
        }
    }
    code
}

async fn run_on_host(backend: Arc<dyn Backend>, host: &Host, command: &ModelsCommand) -> Result<(), ProviderError> {
    match command {
        ModelsCommand::List => {
            let models = backend.list_models(host).await?;
            println!("== {} ({}) ==", host.name, host.kind);
            print_models(&models);
        }
        ModelsCommand::Running => {
            let running = backend.running_models(host).await?;
            println!("== {} ({}) ==", host.name, host.kind);
            print_running(&running);
        }
        ModelsCommand::Pull(model) => {
            backend.pull_model(host, model).await?;
            println!("{}: pulled {}", host.name, model);
        }
        ModelsCommand::Delete(model) => {
            backend.delete_model(host, model).await?;
            println!("{}: deleted {}", host.name, model);
        }
        ModelsCommand::Unload(model) => {
            backend.unload_model(host, model).await?;
            println!("{}: unloaded {}", host.name, model);
        }
        ModelsCommand::Show(model) => {
            let params = backend.model_parameters(host, model).await?;
            let pretty = serde_json::to_string_pretty(&params)
                .map_err(|e| ProviderError::Callback(e.to_string()))?;
            println!("{}", pretty);
        }
    }
    Ok(())
}

/// Print a model table.
pub fn print_models(models: &[ModelInfo]) {
    if models.is_empty() {
        println!("No models available.");
        return;
    }
    println!("{:<40} {:>12} {:>10} {:>10}", "NAME", "SIZE (MB)", "PARAMS", "QUANT");
    println!("{}", "-".repeat(75));
    for m in models {
        println!(
            "{:<40} {:>12} {:>10} {:>10}",
            truncate(&m.name, 39),
            m.size_bytes / (1024 * 1024),
            m.parameter_size.as_deref().unwrap_or("-"),
            m.quantization.as_deref().unwrap_or("-"),
        );
    }
}

/// Print the resident-model table.
pub fn print_running(models: &[RunningModel]) {
    if models.is_empty() {
        println!("No models currently loaded.");
        return;
    }
    println!("{:<40} {:>12}", "NAME", "VRAM (MB)");
    println!("{}", "-".repeat(53));
    for m in models {
        println!("{:<40} {:>12}", truncate(&m.name, 39), m.size_vram_bytes / (1024 * 1024));
    }
}
