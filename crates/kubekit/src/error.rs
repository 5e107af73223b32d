//! Classification of `kubectl` failures.

use declarative::{Error, ErrorCategory};

pub(crate) const BACKEND: &str = "kubernetes";

/// Categorize kubectl stderr output.
///
/// Server errors carry their reason in parentheses
/// (`Error from server (NotFound): ...`), client-side failures do not.
pub fn classify(stderr: &str) -> ErrorCategory {
    let stderr_lower = stderr.to_lowercase();

    if stderr_lower.contains("(notfound)") {
        return ErrorCategory::NotFound;
    }

    if stderr_lower.contains("(alreadyexists)") || stderr_lower.contains("(conflict)") {
        return ErrorCategory::Conflict;
    }

    if stderr_lower.contains("(forbidden)")
        || stderr_lower.contains("(unauthorized)")
        || stderr_lower.contains("you must be logged in")
    {
        return ErrorCategory::Permission;
    }

    if stderr_lower.contains("i/o timeout")
        || stderr_lower.contains("tls handshake timeout")
        || stderr_lower.contains("(serviceunavailable)")
        || stderr_lower.contains("(toomanyrequests)")
        || stderr_lower.contains("(timeout)")
        || stderr_lower.contains("(internalerror)")
        || stderr_lower.contains("etcdserver: request timed out")
        || stderr_lower.contains("connection reset by peer")
    {
        return ErrorCategory::Transient;
    }

    if stderr_lower.contains("unable to connect to the server")
        || stderr_lower.contains("connection refused")
        || stderr_lower.contains("was refused")
        || stderr_lower.contains("no configuration has been provided")
        || stderr_lower.contains("context was not found")
        || stderr_lower.contains("kubectl: command not found")
    {
        return ErrorCategory::Unavailable;
    }

    ErrorCategory::Other
}

/// Create an error from kubectl command output.
pub fn from_kubectl_output(stderr: &str, subject: &str) -> Error {
    let message = match stderr.trim() {
        "" => format!("kubectl command failed for {subject}"),
        trimmed => format!("{subject}: {trimmed}"),
    };
    Error::backend(BACKEND, classify(stderr), message)
}
