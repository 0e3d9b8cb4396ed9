// Node execution surface
//
// The core never performs network I/O: every atomic unit ultimately goes
// through a `NodeExecutor`, which may be a local shell, a remote
// transport, or a test double. The engine picks the executor per target
// node; this crate ships the local and mock implementations.

use std::process::Stdio;
use std::sync::Arc;

use async_trait::async_trait;
use parking_lot::Mutex;
use tokio::process::Command;
use tracing::debug;

use fabric_error::{TaskError, TaskResult};

use crate::command::ReturnValue;

/// Shell-command execution contract
#[async_trait]
pub trait NodeExecutor: Send + Sync {
    /// Run a command; `output` requests stdout capture, `as_root`
    /// requests privilege elevation. Transport/spawn failures are
    /// errors; a non-zero exit is a normal `ReturnValue`.
    async fn execute(&self, command: &str, output: bool, as_root: bool)
        -> TaskResult<ReturnValue>;

    /// Identity used in log attribution
    fn name(&self) -> String {
        "(local)".to_string()
    }
}

/// Executes commands on the local host through `sh -c`
#[derive(Debug, Default)]
pub struct LocalExecutor;

#[async_trait]
impl NodeExecutor for LocalExecutor {
    async fn execute(
        &self,
        command: &str,
        output: bool,
        as_root: bool,
    ) -> TaskResult<ReturnValue> {
        let commandline = if as_root {
            format!("sudo {}", command)
        } else {
            command.to_string()
        };
        debug!(command = %commandline, "spawning local command");

        let child = Command::new("sh")
            .arg("-c")
            .arg(&commandline)
            .stdout(if output { Stdio::piped() } else { Stdio::null() })
            .stderr(Stdio::piped())
            .output()
            .await
            .map_err(|e| TaskError::Executor(e.to_string()))?;

        Ok(ReturnValue::new(
            child.status.code().unwrap_or(-1),
            String::from_utf8_lossy(&child.stdout).trim().to_string(),
            String::from_utf8_lossy(&child.stderr).trim().to_string(),
        ))
    }
}

/// Scripted reply for the mock executor
enum MockReply {
    Return(ReturnValue),
    Transport(String),
}

/// Test double recording every executed command.
///
/// Replies are matched by substring, first match wins; unmatched
/// commands succeed with an empty `ReturnValue`.
#[derive(Default)]
pub struct MockExecutor {
    replies: Mutex<Vec<(String, MockReply)>>,
    log: Arc<Mutex<Vec<String>>>,
}

impl MockExecutor {
    pub fn new() -> Self {
        Self::default()
    }

    /// Commands containing `pattern` return `rv`
    pub fn reply(self, pattern: impl Into<String>, rv: ReturnValue) -> Self {
        self.replies
            .lock()
            .push((pattern.into(), MockReply::Return(rv)));
        self
    }

    /// Commands containing `pattern` fail at the transport level
    pub fn transport_failure(self, pattern: impl Into<String>, message: impl Into<String>) -> Self {
        self.replies
            .lock()
            .push((pattern.into(), MockReply::Transport(message.into())));
        self
    }

    /// Commands executed so far, in observation order
    pub fn executed(&self) -> Vec<String> {
        self.log.lock().clone()
    }

    /// Shared handle on the execution log, for asserting ordering from
    /// outside the executor
    pub fn log_handle(&self) -> Arc<Mutex<Vec<String>>> {
        Arc::clone(&self.log)
    }
}

#[async_trait]
impl NodeExecutor for MockExecutor {
    async fn execute(
        &self,
        command: &str,
        _output: bool,
        _as_root: bool,
    ) -> TaskResult<ReturnValue> {
        self.log.lock().push(command.to_string());
        let replies = self.replies.lock();
        for (pattern, reply) in replies.iter() {
            if command.contains(pattern.as_str()) {
                return match reply {
                    MockReply::Return(rv) => Ok(rv.clone()),
                    MockReply::Transport(msg) => Err(TaskError::Executor(msg.clone())),
                };
            }
        }
        Ok(ReturnValue::ok())
    }

    fn name(&self) -> String {
        "(mock)".to_string()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_mock_records_and_replies() {
        let mock = MockExecutor::new()
            .reply("exists", ReturnValue::failed(1))
            .transport_failure("unreachable", "connection refused");

        let rv = mock.execute("test -e exists", true, false).await.unwrap();
        assert_eq!(rv.return_code, 1);

        let err = mock.execute("ssh unreachable", false, false).await;
        assert!(matches!(err, Err(TaskError::Executor(_))));

        let rv = mock.execute("echo anything", false, false).await.unwrap();
        assert!(rv.success());

        assert_eq!(mock.executed().len(), 3);
    }
}
