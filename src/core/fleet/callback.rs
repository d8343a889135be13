use super::backend::HostResult;

/// Receives each host's result as soon as it completes.
pub trait ResultCallback: Send + Sync {
    fn on_result(&self, result: &HostResult);
}

/// Logs `host(chg=<changed>)` followed by the message, stdout, or stderr.
pub struct LoggingCallback;

pub fn summary_line(result: &HostResult) -> String {
    let body = result
        .msg
        .as_deref()
        .filter(|_| result.stdout.is_empty() && result.stderr.is_empty())
        .map(str::to_string)
        .or_else(|| (!result.stdout.is_empty()).then(|| result.stdout.trim_end().to_string()))
        .unwrap_or_else(|| result.stderr.trim_end().to_string());
    format!("{}(chg={}) {}", result.host, result.changed, body)
}

impl ResultCallback for LoggingCallback {
    fn on_result(&self, result: &HostResult) {
        if result.is_ok() {
            log_status!("fleet", "{}", summary_line(result));
        } else {
            log_warn!("fleet", "{}", summary_line(result));
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::fleet::backend::HostResultStatus;

    fn result(stdout: &str, stderr: &str, msg: Option<&str>) -> HostResult {
        HostResult {
            host: "w0".to_string(),
            status: HostResultStatus::Ok,
            changed: true,
            rc: Some(0),
            stdout: stdout.to_string(),
            stderr: stderr.to_string(),
            msg: msg.map(str::to_string),
        }
    }

    #[test]
    fn prefers_stdout_then_stderr() {
        assert_eq!(summary_line(&result("up 3 days\n", "", None)), "w0(chg=true) up 3 days");
        assert_eq!(summary_line(&result("", "denied", None)), "w0(chg=true) denied");
    }

    #[test]
    fn message_when_no_output() {
        let mut r = result("", "", Some("unreachable"));
        r.changed = false;
        assert_eq!(summary_line(&r), "w0(chg=false) unreachable");
    }
}
