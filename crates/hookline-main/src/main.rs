use std::ffi::OsString;
use std::path::PathBuf;

use clap::error::ErrorKind;
use clap::{Args, Parser, Subcommand};
use hookline_hooks::{HooklineConfig, load_config, logging::init_tracing, resolve_conf_dir};
use tracing::warn;

mod commands;

#[derive(Parser, Debug)]
#[command(name = "hookline", version, about = "prompt hook dispatcher")]
struct Cli {
    #[arg(long, global = true)]
    conf_dir: Option<PathBuf>,
    #[command(subcommand)]
    command: Option<RootCommand>,
}

#[derive(Subcommand, Debug, Clone)]
enum RootCommand {
    /// Read a hook payload from stdin and print the aggregated output.
    Dispatch,
    /// Consult a provider with retry and failover. Always exits 0.
    Ask(AskArgs),
    /// Print only the magic keyword annotation for the stdin payload.
    Keywords,
    /// Inspect or reset the session state file.
    State(StateArgs),
}

#[derive(Args, Debug, Clone)]
struct AskArgs {
    provider: String,
    mode: String,
    #[arg(allow_hyphen_values = true)]
    system_prompt: Option<String>,
    #[arg(allow_hyphen_values = true)]
    prompt: Option<String>,
}

#[derive(Args, Debug, Clone)]
struct StateArgs {
    #[command(subcommand)]
    command: StateSubcommand,
    /// Workspace whose `.hookline/state.json` to use instead of the conf dir.
    #[arg(long, global = true)]
    cwd: Option<PathBuf>,
}

#[derive(Subcommand, Debug, Clone)]
enum StateSubcommand {
    Show,
    Clear,
}

#[tokio::main]
async fn main() {
    let cli = match Cli::try_parse() {
        Ok(cli) => cli,
        Err(error) if ask_requested(std::env::args_os()) && !shows_help(&error) => {
            // `ask` keeps its exit-0 contract even for unusable arguments.
            println!("{}", ask_diagnostic(&error));
            return;
        }
        Err(error) => error.exit(),
    };
    let conf_dir = resolve_conf_dir(cli.conf_dir.as_deref());
    let (config, config_error) = match load_config(&conf_dir) {
        Ok(config) => (config, None),
        Err(error) => (HooklineConfig::default(), Some(error)),
    };
    let guard = init_tracing(&config.log_config(&conf_dir));
    if let Some(error) = config_error {
        warn!(error = %error, "falling back to default configuration");
    }

    let result = match cli.command.unwrap_or(RootCommand::Dispatch) {
        RootCommand::Dispatch => {
            commands::run_dispatch(&config, &conf_dir).await;
            Ok(())
        }
        RootCommand::Ask(args) => {
            commands::run_ask(
                &config,
                &args.provider,
                &args.mode,
                args.system_prompt,
                args.prompt,
            )
            .await;
            Ok(())
        }
        RootCommand::Keywords => commands::run_keywords(&config).await,
        RootCommand::State(args) => match args.command {
            StateSubcommand::Show => commands::show_state(&conf_dir, args.cwd.as_deref()),
            StateSubcommand::Clear => commands::clear_state(&conf_dir, args.cwd.as_deref()),
        },
    };

    drop(guard);
    if let Err(error) = result {
        eprintln!("error: {error}");
        std::process::exit(1);
    }
}

/// Whether the first subcommand word on the command line is `ask`.
fn ask_requested<I>(args: I) -> bool
where
    I: IntoIterator<Item = OsString>,
{
    let mut args = args.into_iter().skip(1);
    while let Some(arg) = args.next() {
        if arg == "--conf-dir" {
            args.next();
            continue;
        }
        if arg.to_string_lossy().starts_with('-') {
            continue;
        }
        return arg == "ask";
    }
    false
}

fn shows_help(error: &clap::Error) -> bool {
    matches!(
        error.kind(),
        ErrorKind::DisplayHelp
            | ErrorKind::DisplayVersion
            | ErrorKind::DisplayHelpOnMissingArgumentOrSubcommand
    )
}

fn ask_diagnostic(error: &clap::Error) -> String {
    let rendered = error.render().to_string();
    let message = rendered
        .lines()
        .map(str::trim)
        .take_while(|line| !line.starts_with("Usage:"))
        .filter(|line| !line.is_empty())
        .collect::<Vec<_>>()
        .join(" ");
    format!("[hookline] {}", message.trim_start_matches("error: "))
}
