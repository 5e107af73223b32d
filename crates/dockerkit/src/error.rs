//! Classification of `docker` CLI failures.
//!
//! The CLI reports every failure through stderr and a non-zero exit code.
//! These helpers map that text onto [`ErrorCategory`] so the engine can tell
//! an absent object from a daemon outage, and so reads know what to retry.

use declarative::{Error, ErrorCategory};

pub(crate) const BACKEND: &str = "docker";

/// Categorize docker stderr output.
pub fn classify(stderr: &str) -> ErrorCategory {
    let stderr_lower = stderr.to_lowercase();

    if stderr_lower.contains("cannot connect to the docker daemon")
        || stderr_lower.contains("is the docker daemon running")
        || stderr_lower.contains("docker: command not found")
    {
        return ErrorCategory::Unavailable;
    }

    if stderr_lower.contains("no such")
        || stderr_lower.contains("not found")
        || stderr_lower.contains("does not exist")
    {
        return ErrorCategory::NotFound;
    }

    if stderr_lower.contains("timeout")
        || stderr_lower.contains("timed out")
        || stderr_lower.contains("connection reset")
        || stderr_lower.contains("tls handshake")
        || stderr_lower.contains("temporary failure")
        || stderr_lower.contains("try again")
    {
        return ErrorCategory::Transient;
    }

    if stderr_lower.contains("already exists")
        || stderr_lower.contains("already in use")
        || stderr_lower.contains("conflict")
        || stderr_lower.contains("has active endpoints")
    {
        return ErrorCategory::Conflict;
    }

    if stderr_lower.contains("permission denied")
        || stderr_lower.contains("access denied")
        || stderr_lower.contains("unauthorized")
    {
        return ErrorCategory::Permission;
    }

    ErrorCategory::Other
}

/// Create an error from docker command output.
pub fn from_docker_output(stderr: &str, subject: &str) -> Error {
    let message = match stderr.trim() {
        "" => format!("docker command failed for {subject}"),
        trimmed => format!("{subject}: {trimmed}"),
    };
    Error::backend(BACKEND, classify(stderr), message)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_classify_not_found() {
        assert_eq!(
            classify("Error response from daemon: No such container: web"),
            ErrorCategory::NotFound
        );
        assert_eq!(
            classify("Error: No such network: backend"),
            ErrorCategory::NotFound
        );
    }

    #[test]
    fn test_classify_daemon_down() {
        let stderr = "Cannot connect to the Docker daemon at unix:///var/run/docker.sock. \
                      Is the docker daemon running?";
        assert_eq!(classify(stderr), ErrorCategory::Unavailable);
    }

    #[test]
    fn test_classify_transient() {
        let err = from_docker_output("net/http: TLS handshake timeout", "image pull");
        assert!(err.is_retryable());
    }

    #[test]
    fn test_classify_conflict() {
        assert_eq!(
            classify("Conflict. The container name \"/web\" is already in use"),
            ErrorCategory::Conflict
        );
        assert_eq!(
            classify("error while removing network: network backend has active endpoints"),
            ErrorCategory::Conflict
        );
    }

    #[test]
    fn test_empty_stderr_message() {
        let err = from_docker_output("  ", "Volume data");
        assert_eq!(err.to_string(), "docker: docker command failed for Volume data");
        assert_eq!(err.category(), ErrorCategory::Other);
    }
}
