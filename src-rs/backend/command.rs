use super::BackendOutcome;
use std::io;
use std::process::{Command, Stdio};
use std::time::Duration;
use tracing::debug;
use wait_timeout::ChildExt;

/// Run a helper command with a hard time limit and classify the result.
///
/// A program that cannot be spawned because it does not exist is
/// `Unsupported`; a timeout, a non-zero exit or any other spawn error is a
/// transient failure. On success the trimmed stdout is returned.
pub(crate) fn run_bounded(program: &str, args: &[String], timeout: Duration) -> BackendOutcome<String> {
    let mut cmd = Command::new(program);
    cmd.args(args);
    cmd.stdin(Stdio::null());
    cmd.stdout(Stdio::piped());
    cmd.stderr(Stdio::piped());

    let mut child = match cmd.spawn() {
        Ok(child) => child,
        Err(err) if err.kind() == io::ErrorKind::NotFound => {
            debug!(program, "helper not installed");
            return BackendOutcome::Unsupported;
        }
        Err(err) => {
            return BackendOutcome::TransientFailure(format!("{program} spawn failed: {err}"));
        }
    };

    match child.wait_timeout(timeout) {
        Ok(Some(_)) => match child.wait_with_output() {
            Ok(output) => {
                let stdout = String::from_utf8_lossy(&output.stdout).trim().to_string();
                if output.status.success() {
                    return BackendOutcome::Success(stdout);
                }
                let stderr = String::from_utf8_lossy(&output.stderr).trim().to_string();
                let code = output.status.code().unwrap_or(1);
                BackendOutcome::TransientFailure(if stderr.is_empty() {
                    format!("{program} exited with status {code}")
                } else {
                    format!("{program} exited with status {code}: {stderr}")
                })
            }
            Err(err) => BackendOutcome::TransientFailure(format!("{program} output failed: {err}")),
        },
        Ok(None) => {
            let _ = child.kill();
            let _ = child.wait();
            BackendOutcome::TransientFailure(format!(
                "{program} timed out after {}ms",
                timeout.as_millis()
            ))
        }
        Err(err) => {
            let _ = child.kill();
            let _ = child.wait();
            BackendOutcome::TransientFailure(format!("{program} wait failed: {err}"))
        }
    }
}

pub(crate) fn args<const N: usize>(items: [&str; N]) -> Vec<String> {
    items.iter().map(|s| s.to_string()).collect()
}
