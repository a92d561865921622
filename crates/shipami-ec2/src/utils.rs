//! Helpers for driving the `aws` command-line interface

use serde::de::DeserializeOwned;
use shipami_core::{Error, Result};
use tokio::process::Command;
use tracing::{debug, error};

/// Error codes the service uses for ids that do not resolve
const NOT_FOUND_CODES: &[&str] = &[
    "InvalidAMIID.NotFound",
    "InvalidAMIID.Unavailable",
    "InvalidAMIID.Malformed",
    "InvalidSnapshot.NotFound",
    "InvalidSnapshotID.Malformed",
];

/// Check if the AWS CLI is installed and get its version
pub fn check_aws_cli() -> Option<String> {
    let path = which::which("aws").ok()?;
    debug!("Found aws at: {}", path.display());

    let output = std::process::Command::new("aws")
        .arg("--version")
        .output()
        .ok()?;

    // aws v1 prints its version on stderr
    let text = if output.stdout.is_empty() {
        output.stderr
    } else {
        output.stdout
    };
    let version = String::from_utf8_lossy(&text)
        .lines()
        .next()
        .unwrap_or("unknown")
        .trim()
        .to_string();

    Some(version)
}

/// Build an `aws ec2 <operation>` command bound to a region and profile
pub fn ec2_command(operation: &str, region: &str, profile: Option<&str>) -> Command {
    let mut cmd = Command::new("aws");
    cmd.args(["ec2", operation, "--region", region, "--output", "json"]);
    if let Some(profile) = profile {
        cmd.args(["--profile", profile]);
    }
    cmd
}

/// Run a prepared command, returning stdout on success
///
/// `subject` is the id reported when the service answers with a not-found code.
pub async fn run(mut cmd: Command, operation: &str, subject: &str) -> Result<Vec<u8>> {
    debug!("aws ec2 {} ({})", operation, subject);

    let output = cmd.output().await.map_err(|e| {
        let message = format!("Failed to run aws ec2 {}: {}", operation, e);
        error!("{}", message);
        Error::remote(message)
    })?;

    if output.status.success() {
        return Ok(output.stdout);
    }

    let err = service_error(&String::from_utf8_lossy(&output.stderr), subject);
    error!("{}", err);
    Err(err)
}

/// Run a command and decode its JSON output
pub async fn run_json<T: DeserializeOwned>(cmd: Command, operation: &str, subject: &str) -> Result<T> {
    let stdout = run(cmd, operation, subject).await?;
    serde_json::from_slice(&stdout).map_err(|e| {
        let message = format!("Unexpected response from aws ec2 {}: {}", operation, e);
        error!("{}", message);
        Error::remote(message)
    })
}

/// Map CLI stderr to the error taxonomy
///
/// The CLI reports service failures as
/// `An error occurred (<Code>) when calling the <Op> operation: <message>`.
pub fn service_error(stderr: &str, subject: &str) -> Error {
    let stderr = stderr.trim();

    let Some(start) = stderr.find("An error occurred (") else {
        return Error::remote(stderr);
    };
    let rest = &stderr[start + "An error occurred (".len()..];
    let code = rest.split(')').next().unwrap_or_default();

    if NOT_FOUND_CODES.contains(&code) {
        return Error::not_found(subject);
    }

    let message = rest
        .split_once("operation: ")
        .map(|(_, message)| message.trim())
        .unwrap_or(stderr);
    Error::remote(message)
}
