use std::io::ErrorKind;
use std::path::{Path, PathBuf};
use std::process::Stdio;

use tokio::io::AsyncWriteExt;
use tokio::process::Command;
use tracing::debug;

use crate::error::ScriptError;

/// Runs one hook script without a shell and returns its stdout.
///
/// The payload JSON is written to the child's stdin. The child is killed if
/// the returned future is dropped, which is how dispatch timeouts and
/// cancellation reach it.
pub(crate) async fn run_script(
    program: &Path,
    args: &[String],
    cwd: Option<&Path>,
    stdin_payload: &str,
) -> Result<String, ScriptError> {
    let resolved = resolve_program(program, cwd);
    let mut command = Command::new(&resolved);
    command
        .args(args)
        .stdin(Stdio::piped())
        .stdout(Stdio::piped())
        .stderr(Stdio::piped())
        .kill_on_drop(true);
    if let Some(cwd) = cwd.filter(|cwd| cwd.is_dir()) {
        command.current_dir(cwd);
    }

    let mut child = command.spawn().map_err(|source| ScriptError::Spawn {
        program: resolved.clone(),
        source,
    })?;

    let stdin = child.stdin.take();
    let payload = stdin_payload.as_bytes().to_vec();
    let feed = async move {
        let Some(mut stdin) = stdin else {
            return Ok(());
        };
        match stdin.write_all(&payload).await {
            // The script is free to ignore its input and exit early.
            Err(error) if error.kind() == ErrorKind::BrokenPipe => Ok(()),
            other => other,
        }
    };
    let (fed, output) = tokio::join!(feed, child.wait_with_output());
    let output = output.map_err(|source| ScriptError::Io {
        program: resolved.clone(),
        source,
    })?;
    fed.map_err(|source| ScriptError::Io {
        program: resolved.clone(),
        source,
    })?;

    let stderr = String::from_utf8_lossy(&output.stderr).trim().to_string();
    if !stderr.is_empty() {
        debug!(program = %resolved.display(), stderr = %stderr, "script wrote to stderr");
    }
    if !output.status.success() {
        return Err(ScriptError::Exit {
            program: resolved,
            status: output.status.to_string(),
            stderr,
        });
    }
    Ok(String::from_utf8_lossy(&output.stdout).into_owned())
}

/// Relative paths like `hooks/check.sh` are taken from the session cwd; bare
/// names are left for `PATH` lookup.
fn resolve_program(program: &Path, cwd: Option<&Path>) -> PathBuf {
    let has_separator = program.components().count() > 1;
    match cwd {
        Some(cwd) if program.is_relative() && has_separator => cwd.join(program),
        _ => program.to_path_buf(),
    }
}
