//! Child-process executor
//!
//! Runs each unit as a fresh child process. The unit's code is staged in a
//! scratch file, the merged context becomes the child's entire environment,
//! and the report travels back on stdout as a single prefixed JSON line.

use async_trait::async_trait;
use std::io::Write;
use std::path::Path;
use std::process::{ExitStatus, Stdio};
use std::sync::Mutex;
use std::time::Duration;
use tempfile::NamedTempFile;
use tokio::io::{AsyncBufReadExt, AsyncRead, BufReader};
use tokio::process::Command;
use tracing::{debug, warn};

use super::context::env_value;
use super::isolate::{ExecOutcome, ExecRequest, Executor};
use crate::models::{Fault, LogBuffer, LogStream, TestReport, Unit};

/// Prefix of the stdout line carrying the unit's JSON report
pub const REPORT_PREFIX: &str = "ISORUN_REPORT ";

/// Executes units with `program args... <staged file>`
#[derive(Clone, Debug)]
pub struct ProcessExecutor {
    program: String,
    args: Vec<String>,
}

impl ProcessExecutor {
    pub fn new(program: impl Into<String>) -> Self {
        Self {
            program: program.into(),
            args: Vec::new(),
        }
    }

    pub fn with_args(mut self, args: Vec<String>) -> Self {
        self.args = args;
        self
    }

    fn stage(unit: &Unit, code: &str) -> Result<NamedTempFile, Fault> {
        let suffix = Path::new(unit.as_str())
            .extension()
            .and_then(|e| e.to_str())
            .map(|e| format!(".{e}"))
            .unwrap_or_default();

        let mut file = tempfile::Builder::new()
            .prefix("isorun-")
            .suffix(&suffix)
            .tempfile()
            .map_err(|e| Fault::runtime(format!("Failed to stage unit code: {e}"), ""))?;

        file.write_all(code.as_bytes())
            .and_then(|_| file.flush())
            .map_err(|e| Fault::runtime(format!("Failed to stage unit code: {e}"), ""))?;

        Ok(file)
    }
}

#[async_trait]
impl Executor for ProcessExecutor {
    async fn execute(&self, request: ExecRequest<'_>) -> Result<ExecOutcome, Fault> {
        let budget_ms = request.timeout.as_millis() as u64;
        let staged = Self::stage(request.unit, request.code)?;
        let staged_path = staged.path().to_string_lossy().into_owned();

        let mut command = Command::new(&self.program);
        command
            .args(&self.args)
            .arg(&staged_path)
            .env_clear()
            .envs(request.context.iter().map(|(k, v)| (k, env_value(v))))
            .stdin(Stdio::null())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .kill_on_drop(true);

        // Own process group, so anything the unit forks dies with it.
        #[cfg(unix)]
        {
            use std::os::unix::process::CommandExt;
            command.as_std_mut().process_group(0);
        }

        let mut child = command
            .spawn()
            .map_err(|e| Fault::runtime(format!("Failed to start '{}': {e}", self.program), ""))?;
        let group = ProcessGroup::new(child.id());

        debug!("Started {} for {}", self.program, request.unit);

        let paths = Rewrite {
            from: &staged_path,
            to: request.unit.as_str(),
        };
        let captured = Captured::default();
        let stdout = child.stdout.take();
        let stderr = child.stderr.take();

        let run = async {
            let readers = async {
                tokio::join!(
                    read_stdout(stdout, request.logs, &captured, paths),
                    read_stderr(stderr, request.logs, &captured, paths)
                )
            };
            tokio::pin!(readers);

            let mut drained = false;
            let status = tokio::select! {
                _ = &mut readers => {
                    drained = true;
                    child.wait().await
                }
                status = child.wait() => status,
            };

            // Background processes may still hold the pipes open.
            if !drained && tokio::time::timeout(DRAIN_GRACE, &mut readers).await.is_err() {
                debug!("{} left output pipes open after exiting", request.unit);
            }
            status
        };

        let finished = tokio::time::timeout(request.timeout, run).await;
        let status = match finished {
            Ok(status) => status,
            Err(_) => {
                warn!("{} exceeded {}ms, killing", request.unit, budget_ms);
                group.kill();
                if let Err(e) = child.kill().await {
                    warn!("Failed to kill unit process: {}", e);
                }
                return Err(Fault::Timeout { budget_ms });
            }
        };

        let status = status
            .map_err(|e| Fault::runtime(format!("Failed to wait for unit process: {e}"), ""))?;
        let (report, stderr_lines) = captured.into_parts();

        match report {
            Some(report) => Ok(ExecOutcome {
                succeeded: status.success(),
                report: Some(report),
            }),
            None if status.success() => Ok(ExecOutcome {
                succeeded: true,
                report: None,
            }),
            None => Err(runtime_fault(&stderr_lines, status)),
        }
    }
}

/// Time allowed to collect buffered output once the unit process has exited
const DRAIN_GRACE: Duration = Duration::from_millis(100);

/// The unit's process group, killed as a whole when dropped
struct ProcessGroup {
    #[cfg_attr(not(unix), allow(dead_code))]
    pgid: Option<u32>,
}

impl ProcessGroup {
    fn new(pgid: Option<u32>) -> Self {
        Self { pgid }
    }

    fn kill(&self) {
        #[cfg(unix)]
        if let Some(pgid) = self.pgid {
            // SAFETY: kill(2) with a negative pid only signals that process group.
            unsafe { libc::kill(-(pgid as libc::pid_t), libc::SIGKILL) };
        }
    }
}

impl Drop for ProcessGroup {
    fn drop(&mut self) {
        self.kill();
    }
}

/// Output gathered while the unit runs; survives readers cut off mid-stream
#[derive(Default)]
struct Captured {
    report: Mutex<Option<TestReport>>,
    stderr: Mutex<Vec<String>>,
}

impl Captured {
    fn set_report(&self, report: TestReport) {
        *self.report.lock().unwrap_or_else(|e| e.into_inner()) = Some(report);
    }

    fn push_stderr(&self, line: String) {
        self.stderr
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .push(line);
    }

    fn into_parts(self) -> (Option<TestReport>, Vec<String>) {
        let report = self.report.into_inner().unwrap_or_else(|e| e.into_inner());
        let stderr = self.stderr.into_inner().unwrap_or_else(|e| e.into_inner());
        (report, stderr)
    }
}

/// Replaces the scratch file path with the unit path in captured output
#[derive(Clone, Copy)]
struct Rewrite<'a> {
    from: &'a str,
    to: &'a str,
}

impl Rewrite<'_> {
    fn apply(&self, line: &str) -> String {
        if self.from.is_empty() {
            line.to_string()
        } else {
            line.replace(self.from, self.to)
        }
    }
}

async fn read_stdout<R: AsyncRead + Unpin>(
    stream: Option<R>,
    logs: &LogBuffer,
    captured: &Captured,
    paths: Rewrite<'_>,
) {
    let Some(stream) = stream else {
        return;
    };
    let mut lines = BufReader::new(stream).lines();

    while let Ok(Some(line)) = lines.next_line().await {
        if let Some(json) = line.strip_prefix(REPORT_PREFIX) {
            match serde_json::from_str::<TestReport>(json) {
                Ok(parsed) => {
                    captured.set_report(parsed);
                    continue;
                }
                Err(e) => warn!("Malformed report line: {}", e),
            }
        }
        logs.push(LogStream::Stdout, paths.apply(&line));
    }
}

async fn read_stderr<R: AsyncRead + Unpin>(
    stream: Option<R>,
    logs: &LogBuffer,
    captured: &Captured,
    paths: Rewrite<'_>,
) {
    let Some(stream) = stream else {
        return;
    };
    let mut lines = BufReader::new(stream).lines();

    while let Ok(Some(line)) = lines.next_line().await {
        let line = paths.apply(&line);
        logs.push(LogStream::Stderr, line.clone());
        captured.push_stderr(line);
    }
}

/// Build a runtime fault from a crashed unit's stderr.
///
/// The message is the line right before the first `at ...` frame and the
/// trace runs from there; without frames the last non-empty line is the
/// message and all of stderr is the trace.
fn runtime_fault(stderr: &[String], status: ExitStatus) -> Fault {
    let is_frame = |line: &String| line.trim_start().starts_with("at ");
    let non_empty = |i: &usize| !stderr[*i].trim().is_empty();

    if let Some(first_frame) = stderr.iter().position(is_frame) {
        if let Some(m) = (0..first_frame).rev().find(non_empty) {
            return Fault::runtime(stderr[m].trim(), stderr[m..].join("\n"));
        }
    }

    let message = (0..stderr.len())
        .rev()
        .find(non_empty)
        .map(|i| stderr[i].trim().to_string())
        .unwrap_or_else(|| format!("Unit process exited with {status}"));

    Fault::runtime(message, stderr.join("\n"))
}

#[cfg(all(test, unix))]
mod tests {
    use super::*;
    use crate::executor::Context;
    use crate::models::UnitStatus;
    use serde_json::json;
    use std::sync::Arc;
    use std::time::{Duration, Instant};

    async fn run_sh(script: &str, timeout_ms: u64, context: Context) -> (Result<ExecOutcome, Fault>, LogBuffer) {
        let logs = LogBuffer::new();
        let unit = Unit::new("/work/unit.sh");
        let result = ProcessExecutor::new("/bin/sh")
            .execute(ExecRequest {
                unit: &unit,
                code: script,
                context: Arc::new(context),
                timeout: Duration::from_millis(timeout_ms),
                logs: &logs,
            })
            .await;
        (result, logs)
    }

    #[tokio::test]
    async fn test_report_line_is_parsed() {
        let script = r#"echo "hello"
echo 'ISORUN_REPORT {"description":"math","outcomes":[{"description":"adds","status":"passed"}]}'
"#;
        let (result, logs) = run_sh(script, 5_000, Context::new()).await;
        let outcome = result.unwrap();

        assert!(outcome.succeeded);
        let report = outcome.report.unwrap();
        assert_eq!(report.description, "math");
        assert_eq!(report.status, UnitStatus::Passed);

        let logs = logs.take();
        assert_eq!(logs.len(), 1);
        assert_eq!(logs[0].text, "hello");
    }

    #[tokio::test]
    async fn test_failing_exit_keeps_report() {
        let script = r#"echo 'ISORUN_REPORT {"description":"d","outcomes":[{"description":"x","status":"failed"}]}'
exit 1
"#;
        let (result, _) = run_sh(script, 5_000, Context::new()).await;
        let outcome = result.unwrap();
        assert!(!outcome.succeeded);
        assert_eq!(outcome.report.unwrap().status, UnitStatus::Failed);
    }

    #[tokio::test]
    async fn test_crash_becomes_runtime_fault() {
        let script = r#"echo "Error: boom" >&2
echo "    at foo (/tmp/a.ts:10:5)" >&2
exit 3
"#;
        let (result, logs) = run_sh(script, 5_000, Context::new()).await;

        match result.unwrap_err() {
            Fault::Runtime { message, stack } => {
                assert_eq!(message, "Error: boom");
                assert!(stack.contains("at foo (/tmp/a.ts:10:5)"));
            }
            other => panic!("unexpected fault: {other:?}"),
        }
        assert_eq!(logs.take().len(), 2);
    }

    #[tokio::test]
    async fn test_timeout_is_enforced() {
        let mut context = Context::new();
        if let Ok(path) = std::env::var("PATH") {
            context.insert("PATH".to_string(), json!(path));
        }

        let start = Instant::now();
        let (result, _) = run_sh("sleep 5\n", 50, context).await;

        assert_eq!(result.unwrap_err(), Fault::Timeout { budget_ms: 50 });
        assert!(start.elapsed() < Duration::from_millis(250));
    }

    #[cfg(target_os = "linux")]
    fn background_pid(logs: &LogBuffer) -> Option<i32> {
        logs.take()
            .iter()
            .find_map(|entry| entry.text.strip_prefix("bg ")?.trim().parse().ok())
    }

    /// Whether `pid` is gone or only a zombie waiting to be reaped
    #[cfg(target_os = "linux")]
    async fn wait_until_dead(pid: i32) -> bool {
        for _ in 0..40 {
            match std::fs::read_to_string(format!("/proc/{pid}/stat")) {
                Err(_) => return true,
                Ok(stat) => {
                    let state = stat.rsplit_once(") ").and_then(|(_, rest)| rest.chars().next());
                    if matches!(state, Some('Z') | Some('X')) {
                        return true;
                    }
                }
            }
            tokio::time::sleep(Duration::from_millis(50)).await;
        }
        false
    }

    #[tokio::test]
    async fn test_background_child_does_not_hold_result() {
        let script = r#"/bin/sleep 3 &
echo "bg $!"
echo 'ISORUN_REPORT {"description":"server","outcomes":[{"description":"starts","status":"passed"}]}'
exit 0
"#;
        let start = Instant::now();
        let (result, logs) = run_sh(script, 1_000, Context::new()).await;

        let outcome = result.unwrap();
        assert!(outcome.succeeded);
        assert_eq!(outcome.report.unwrap().status, UnitStatus::Passed);
        assert!(start.elapsed() < Duration::from_millis(800));

        #[cfg(target_os = "linux")]
        {
            let pid = background_pid(&logs).unwrap();
            assert!(wait_until_dead(pid).await, "background sleep {pid} survived the unit");
        }
        #[cfg(not(target_os = "linux"))]
        drop(logs);
    }

    #[tokio::test]
    async fn test_timeout_kills_process_group() {
        let script = "/bin/sleep 5 &\necho \"bg $!\"\nwait\n";
        let (result, logs) = run_sh(script, 300, Context::new()).await;

        assert_eq!(result.unwrap_err(), Fault::Timeout { budget_ms: 300 });

        #[cfg(target_os = "linux")]
        {
            let pid = background_pid(&logs).unwrap();
            assert!(wait_until_dead(pid).await, "background sleep {pid} survived the timeout");
        }
        #[cfg(not(target_os = "linux"))]
        drop(logs);
    }

    #[tokio::test]
    async fn test_context_is_the_environment() {
        let mut context = Context::new();
        context.insert("GREETING".to_string(), json!("hi"));
        context.insert("COUNT".to_string(), json!(3));

        let (result, logs) = run_sh("echo \"$GREETING $COUNT\"\necho \"[$HOME]\"\n", 5_000, context).await;
        assert!(result.unwrap().succeeded);

        let texts: Vec<_> = logs.take().into_iter().map(|e| e.text).collect();
        assert_eq!(texts, vec!["hi 3", "[]"]);
    }

    #[tokio::test]
    async fn test_missing_program_is_runtime_fault() {
        let logs = LogBuffer::new();
        let unit = Unit::new("/work/u.js");
        let err = ProcessExecutor::new("/no/such/interpreter")
            .execute(ExecRequest {
                unit: &unit,
                code: "",
                context: Arc::new(Context::new()),
                timeout: Duration::from_secs(1),
                logs: &logs,
            })
            .await
            .unwrap_err();
        assert_eq!(err.kind(), "runtime");
    }

    #[test]
    fn test_runtime_fault_without_frames() {
        let stderr = vec!["warming up".to_string(), "fatal: out of cheese".to_string(), String::new()];
        let fault = runtime_fault(&stderr, std::process::ExitStatus::default());
        assert_eq!(fault, Fault::runtime("fatal: out of cheese", stderr.join("\n")));
    }
}
