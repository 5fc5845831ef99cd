use std::future::pending;
use std::path::Path;

use hookline_ai::{ProviderId, ResponseMode};
use hookline_hooks::{Dispatcher, HookPayload, HooklineConfig, StateStore};
use tokio::io::{AsyncReadExt, stdin};
use tracing::{debug, warn};

pub(crate) async fn run_dispatch(config: &HooklineConfig, conf_dir: &Path) {
    let Some(dispatcher) = build_dispatcher(config, conf_dir) else {
        return;
    };
    let work = async {
        let raw = read_stdin().await;
        dispatcher.dispatch_raw(&raw).await
    };
    let output = tokio::select! {
        output = work => output,
        _ = shutdown_signal() => {
            warn!("dispatch cancelled by signal");
            String::new()
        }
    };
    emit(&output);
}

pub(crate) async fn run_ask(
    config: &HooklineConfig,
    provider: &str,
    mode: &str,
    system_prompt: Option<String>,
    prompt: Option<String>,
) {
    let output = tokio::select! {
        output = ask(config, provider, mode, system_prompt, prompt) => output,
        _ = shutdown_signal() => {
            warn!("ask cancelled by signal");
            String::new()
        }
    };
    emit(&output);
}

/// A lone optional argument is the prompt; two are system prompt then prompt.
async fn ask(
    config: &HooklineConfig,
    provider: &str,
    mode: &str,
    system_prompt: Option<String>,
    prompt: Option<String>,
) -> String {
    let provider = match provider.parse::<ProviderId>() {
        Ok(provider) => provider,
        Err(error) => return format!("[hookline] {error}"),
    };
    let mode = match mode.parse::<ResponseMode>() {
        Ok(mode) => mode,
        Err(error) => return format!("[hookline] {error}"),
    };
    let (system_prompt, prompt) = match (system_prompt, prompt) {
        (Some(system_prompt), Some(prompt)) => (Some(system_prompt), prompt),
        (Some(prompt), None) => (None, prompt),
        (None, _) => match HookPayload::parse(&read_stdin().await) {
            Ok(payload) => (None, payload.prompt),
            Err(error) => {
                debug!(error = %error, "no usable prompt on stdin");
                return format!("[hookline] no prompt given for {provider}");
            }
        },
    };

    config
        .orchestrator()
        .ask(provider, mode, system_prompt.as_deref(), &prompt)
        .await
}

pub(crate) async fn run_keywords(config: &HooklineConfig) -> Result<(), String> {
    let registry = match config.keyword_registry() {
        Ok(registry) => registry,
        Err(error) => {
            warn!(error = %error, "invalid configured keywords, using built-ins");
            HooklineConfig::default()
                .keyword_registry()
                .map_err(|error| error.to_string())?
        }
    };
    let output = match HookPayload::parse(&read_stdin().await) {
        Ok(payload) => registry.resolve(&payload.prompt).text,
        Err(error) => {
            debug!(error = %error, "ignoring malformed hook payload");
            String::new()
        }
    };
    emit(&output);
    Ok(())
}

pub(crate) fn show_state(conf_dir: &Path, cwd: Option<&Path>) -> Result<(), String> {
    let store = state_store(conf_dir, cwd);
    let state = store.load().map_err(|error| error.to_string())?;
    let json = serde_json::to_string_pretty(&state).map_err(|error| error.to_string())?;
    println!("{json}");
    Ok(())
}

pub(crate) fn clear_state(conf_dir: &Path, cwd: Option<&Path>) -> Result<(), String> {
    let store = state_store(conf_dir, cwd);
    if store.clear().map_err(|error| error.to_string())? {
        println!("cleared {}", store.path().display());
    } else {
        println!("no state at {}", store.path().display());
    }
    Ok(())
}

fn state_store(conf_dir: &Path, cwd: Option<&Path>) -> StateStore {
    match cwd {
        Some(cwd) => StateStore::for_workspace(cwd),
        None => StateStore::in_dir(conf_dir),
    }
}

/// Invalid configured rules or keywords are dropped rather than disabling
/// the hook.
fn build_dispatcher(config: &HooklineConfig, conf_dir: &Path) -> Option<Dispatcher> {
    match config.dispatcher(conf_dir) {
        Ok(dispatcher) => Some(dispatcher),
        Err(error) => {
            warn!(error = %error, "invalid hook configuration, using built-in rules only");
            let fallback = HooklineConfig {
                rules: Vec::new(),
                keywords: Vec::new(),
                synergies: Vec::new(),
                ..config.clone()
            };
            fallback
                .dispatcher(conf_dir)
                .inspect_err(|error| warn!(error = %error, "built-in hook table is invalid"))
                .ok()
        }
    }
}

async fn read_stdin() -> String {
    let mut raw = String::new();
    if let Err(error) = stdin().read_to_string(&mut raw).await {
        debug!(error = %error, "failed to read stdin");
        return String::new();
    }
    raw
}

fn emit(output: &str) {
    let output = output.trim_end();
    if !output.is_empty() {
        println!("{output}");
    }
}

async fn shutdown_signal() {
    let ctrl_c = async {
        if tokio::signal::ctrl_c().await.is_err() {
            pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        use tokio::signal::unix::{SignalKind, signal};
        match signal(SignalKind::terminate()) {
            Ok(mut stream) => {
                stream.recv().await;
            }
            Err(_) => pending::<()>().await,
        }
    };
    #[cfg(not(unix))]
    let terminate = pending::<()>();

    tokio::select! {
        _ = ctrl_c => {}
        _ = terminate => {}
    }
}
