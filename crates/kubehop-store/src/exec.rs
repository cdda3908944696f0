//! Invocation of provider command-line tools
//!
//! Cloud control planes and the vault are reached through their own CLIs,
//! which already carry the provider's authentication and wire format. We
//! only spawn, check the exit status, and parse stdout.

use tokio::process::Command;
use tracing::debug;

use kubehop_types::{Error, Result};

/// Run a command with extra environment variables and capture stdout,
/// failing on a nonzero exit status
pub async fn run_env(program: &str, args: &[&str], env: &[(&str, String)]) -> Result<Vec<u8>> {
    debug!(program, ?args, "running provider command");

    let mut command = Command::new(program);
    command.args(args);
    for (key, value) in env {
        command.env(key, value);
    }

    let output = command
        .output()
        .await
        .map_err(|source| Error::CommandSpawn {
            program: program.to_string(),
            source,
        })?;

    if !output.status.success() {
        let stderr = String::from_utf8_lossy(&output.stderr);
        return Err(Error::CommandFailed {
            program: program.to_string(),
            detail: format!("{}: {}", output.status, stderr.trim()),
        });
    }

    Ok(output.stdout)
}

pub async fn run(program: &str, args: &[&str]) -> Result<Vec<u8>> {
    run_env(program, args, &[]).await
}

/// Run a command and parse its stdout as JSON
pub async fn run_json(program: &str, args: &[&str]) -> Result<serde_json::Value> {
    let stdout = run(program, args).await?;
    serde_json::from_slice(&stdout).map_err(|source| Error::CommandOutput {
        program: program.to_string(),
        source,
    })
}

/// Like [`run_json`] but with extra environment variables
pub async fn run_json_env(
    program: &str,
    args: &[&str],
    env: &[(&str, String)],
) -> Result<serde_json::Value> {
    let stdout = run_env(program, args, env).await?;
    serde_json::from_slice(&stdout).map_err(|source| Error::CommandOutput {
        program: program.to_string(),
        source,
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_missing_program_is_a_spawn_error() {
        let err = run("kubehop-no-such-binary", &["--version"]).await.unwrap_err();
        assert!(matches!(err, Error::CommandSpawn { .. }));
    }

    #[tokio::test]
    async fn test_nonzero_exit_carries_stderr() {
        let err = run("sh", &["-c", "echo boom >&2; exit 3"]).await.unwrap_err();
        match err {
            Error::CommandFailed { program, detail } => {
                assert_eq!(program, "sh");
                assert!(detail.contains("boom"));
            }
            other => panic!("unexpected error: {other}"),
        }
    }

    #[tokio::test]
    async fn test_json_output_is_parsed() {
        let value = run_json("sh", &["-c", "echo '{\"clusters\": [\"a\"]}'"])
            .await
            .unwrap();
        assert_eq!(value["clusters"][0], "a");
    }
}
