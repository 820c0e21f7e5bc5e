//! Scoped connection to a tool-provider process.
//!
//! A [`Connection`] lives for exactly one logical operation: it spawns the
//! provider, performs the initialize handshake, carries a single
//! request/response exchange at a time and is torn down afterwards. Requests
//! take `&mut self`, so one connection can never have two requests in flight.

use std::collections::HashMap;
use std::future::Future;
use std::path::PathBuf;
use std::process::Stdio;
use std::time::Duration;

use serde::Serialize;
use serde::de::DeserializeOwned;
use serde_json::Value;
use tokio::io::{AsyncBufReadExt, AsyncReadExt, AsyncWriteExt, BufReader};
use tokio::process::{Child, ChildStdin, ChildStdout, Command};
use tokio_util::sync::CancellationToken;

use crate::error::{Error, Result, Stage};
use crate::protocol::{
    CallToolParams, CallToolResult, IncomingMessage, InitializeParams, InitializeResult,
    JsonRpcNotification, JsonRpcRequest, ListToolsResult, METHOD_CALL_TOOL, METHOD_INITIALIZE,
    METHOD_INITIALIZED, METHOD_LIST_TOOLS, RequestId, ServerInfo, WireTool,
};

/// Default bound on spawn + initialize handshake.
pub const DEFAULT_HANDSHAKE_TIMEOUT: Duration = Duration::from_secs(15);

/// Default bound on one request/response exchange.
/// Tools that fetch remote pages can be slow.
pub const DEFAULT_REQUEST_TIMEOUT: Duration = Duration::from_secs(60);

/// Maximum size of a single response line (4MB).
/// Sized for scraped page content.
pub const MAX_OUTPUT_SIZE: usize = 4 * 1024 * 1024;

/// How long a provider gets to exit on its own after stdin closes.
const CLOSE_GRACE: Duration = Duration::from_millis(250);

/// How to launch the tool provider.
#[derive(Debug, Clone)]
pub struct ProviderConfig {
    /// Interpreter or executable to run (e.g. `python`).
    pub interpreter: String,
    /// Provider entry point passed as the first argument. Must exist.
    pub entry_point: PathBuf,
    /// Extra arguments after the entry point.
    pub args: Vec<String>,
    pub env: HashMap<String, String>,
    pub handshake_timeout: Duration,
    pub request_timeout: Duration,
}

impl ProviderConfig {
    pub fn new(interpreter: impl Into<String>, entry_point: impl Into<PathBuf>) -> Self {
        Self {
            interpreter: interpreter.into(),
            entry_point: entry_point.into(),
            args: Vec::new(),
            env: HashMap::new(),
            handshake_timeout: DEFAULT_HANDSHAKE_TIMEOUT,
            request_timeout: DEFAULT_REQUEST_TIMEOUT,
        }
    }

    pub fn with_handshake_timeout(mut self, timeout: Duration) -> Self {
        self.handshake_timeout = timeout;
        self
    }

    pub fn with_request_timeout(mut self, timeout: Duration) -> Self {
        self.request_timeout = timeout;
        self
    }

    /// Fails with [`Error::EntryPointMissing`] if the entry point is absent.
    pub fn check_entry_point(&self) -> Result<()> {
        if self.entry_point.exists() {
            Ok(())
        } else {
            Err(Error::EntryPointMissing(self.entry_point.clone()))
        }
    }
}

/// Lifecycle of a [`Connection`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ConnectionState {
    Unconnected,
    Spawning,
    Handshaking,
    Ready,
    InFlight,
    Closing,
    Closed,
}

/// A live, exclusively owned connection to one provider process.
pub struct Connection {
    state: ConnectionState,
    process: Child,
    stdin: Option<ChildStdin>,
    stdout: BufReader<ChildStdout>,
    next_id: i64,
    request_timeout: Duration,
    cancel: CancellationToken,
    server_info: Option<ServerInfo>,
}

impl Connection {
    /// Spawn the provider and complete the handshake.
    ///
    /// If the handshake fails the process is torn down before the error is
    /// returned.
    pub async fn open(config: &ProviderConfig, cancel: &CancellationToken) -> Result<Self> {
        let mut conn = Self::spawn(config, cancel)?;

        let outcome = bounded(
            cancel,
            Stage::Handshake,
            config.handshake_timeout,
            conn.handshake(),
        )
        .await;
        match outcome {
            Ok(()) => Ok(conn),
            Err(e) => {
                tracing::debug!(error = %e, "handshake failed");
                conn.close().await;
                Err(e)
            }
        }
    }

    fn spawn(config: &ProviderConfig, cancel: &CancellationToken) -> Result<Self> {
        let mut state = ConnectionState::Unconnected;
        if cancel.is_cancelled() {
            return Err(Error::Cancelled);
        }
        config.check_entry_point()?;

        transition(&mut state, ConnectionState::Spawning);
        let mut process = Command::new(&config.interpreter)
            .arg(&config.entry_point)
            .args(&config.args)
            .envs(&config.env)
            .stdin(Stdio::piped())
            .stdout(Stdio::piped())
            .stderr(Stdio::inherit())
            .kill_on_drop(true)
            .spawn()
            .map_err(Error::Spawn)?;

        let stdin = process
            .stdin
            .take()
            .ok_or_else(|| Error::Spawn(std::io::Error::other("failed to capture stdin")))?;
        let stdout = process
            .stdout
            .take()
            .ok_or_else(|| Error::Spawn(std::io::Error::other("failed to capture stdout")))?;

        tracing::debug!(
            interpreter = %config.interpreter,
            entry_point = %config.entry_point.display(),
            pid = ?process.id(),
            "spawned tool provider"
        );

        Ok(Self {
            state,
            process,
            stdin: Some(stdin),
            stdout: BufReader::new(stdout),
            next_id: 1,
            request_timeout: config.request_timeout,
            cancel: cancel.clone(),
            server_info: None,
        })
    }

    async fn handshake(&mut self) -> Result<()> {
        self.set_state(ConnectionState::Handshaking);

        let params = serde_json::to_value(InitializeParams::default())?;
        let result: InitializeResult = self.exchange(METHOD_INITIALIZE, Some(params)).await?;
        self.notify(METHOD_INITIALIZED).await?;

        tracing::debug!(
            protocol_version = %result.protocol_version,
            server = ?result.server_info.as_ref().map(|s| s.name.as_str()),
            "handshake acknowledged"
        );
        self.server_info = result.server_info;
        self.set_state(ConnectionState::Ready);
        Ok(())
    }

    pub fn state(&self) -> ConnectionState {
        self.state
    }

    /// Provider identity reported during the handshake.
    pub fn server_info(&self) -> Option<&ServerInfo> {
        self.server_info.as_ref()
    }

    /// Fetch the provider's tool catalog.
    pub async fn list_tools(&mut self) -> Result<Vec<WireTool>> {
        let result: ListToolsResult = self.request(METHOD_LIST_TOOLS, None).await?;
        Ok(result.tools)
    }

    /// Invoke one tool.
    pub async fn call_tool(
        &mut self,
        name: &str,
        arguments: serde_json::Map<String, Value>,
    ) -> Result<CallToolResult> {
        let params = serde_json::to_value(CallToolParams {
            name: name.to_string(),
            arguments,
        })?;
        self.request(METHOD_CALL_TOOL, Some(params)).await
    }

    /// Send one request and await its response (`Ready -> InFlight -> Ready`).
    pub async fn request<R>(&mut self, method: &str, params: Option<Value>) -> Result<R>
    where
        R: DeserializeOwned,
    {
        if self.state != ConnectionState::Ready {
            return Err(Error::InvalidResponse(format!(
                "connection not ready for {method} (state {:?})",
                self.state
            )));
        }

        self.set_state(ConnectionState::InFlight);
        let cancel = self.cancel.clone();
        let limit = self.request_timeout;
        let result = bounded(&cancel, Stage::Request, limit, self.exchange(method, params)).await;
        if result.is_ok() {
            self.set_state(ConnectionState::Ready);
        }
        result
    }

    /// Tear the connection down. Runs on every exit path of an operation.
    pub async fn close(mut self) {
        self.set_state(ConnectionState::Closing);

        // EOF on stdin is the provider's cue to exit.
        drop(self.stdin.take());
        match tokio::time::timeout(CLOSE_GRACE, self.process.wait()).await {
            Ok(Ok(status)) => tracing::debug!(%status, "tool provider exited"),
            Ok(Err(e)) => tracing::debug!(error = %e, "failed to reap tool provider"),
            Err(_) => {
                if let Err(e) = self.process.kill().await {
                    tracing::debug!(error = %e, "failed to kill tool provider");
                }
            }
        }

        self.set_state(ConnectionState::Closed);
    }

    fn set_state(&mut self, next: ConnectionState) {
        transition(&mut self.state, next);
    }

    fn next_request_id(&mut self) -> RequestId {
        let id = self.next_id;
        self.next_id += 1;
        RequestId::Number(id)
    }

    async fn exchange<R>(&mut self, method: &str, params: Option<Value>) -> Result<R>
    where
        R: DeserializeOwned,
    {
        let id = self.next_request_id();
        let mut request = JsonRpcRequest::new(id.clone(), method);
        if let Some(p) = params {
            request = request.with_params(p);
        }
        self.write_line(&request).await?;

        let response = self.read_response(&id).await?;
        let value = response.into_result()?;
        serde_json::from_value(value)
            .map_err(|e| Error::InvalidResponse(format!("malformed {method} result: {e}")))
    }

    async fn notify(&mut self, method: &str) -> Result<()> {
        self.write_line(&JsonRpcNotification::new(method)).await
    }

    async fn write_line(&mut self, message: &impl Serialize) -> Result<()> {
        let json = serde_json::to_string(message)?;
        let stdin = self.stdin.as_mut().ok_or(Error::ServerExited)?;
        stdin.write_all(json.as_bytes()).await?;
        stdin.write_all(b"\n").await?;
        stdin.flush().await?;
        Ok(())
    }

    async fn read_response(&mut self, id: &RequestId) -> Result<IncomingMessage> {
        loop {
            // The cap bounds the read itself, so an unterminated line can
            // never buffer more than MAX_OUTPUT_SIZE + 1 bytes.
            let mut buf = Vec::new();
            let bytes_read = (&mut self.stdout)
                .take(MAX_OUTPUT_SIZE as u64 + 1)
                .read_until(b'\n', &mut buf)
                .await?;
            if bytes_read == 0 {
                return Err(Error::ServerExited);
            }

            let size = buf.len() - usize::from(buf.last() == Some(&b'\n'));
            if size > MAX_OUTPUT_SIZE {
                return Err(Error::OutputTooLarge {
                    size,
                    max: MAX_OUTPUT_SIZE,
                });
            }

            let line = std::str::from_utf8(&buf)
                .map_err(|e| Error::InvalidResponse(format!("provider output is not UTF-8: {e}")))?
                .trim();
            if line.is_empty() {
                continue;
            }

            let message: IncomingMessage = serde_json::from_str(line)
                .map_err(|e| Error::InvalidResponse(format!("not a JSON-RPC message: {e}")))?;

            match message.response_id() {
                Some(got) if got == id => return Ok(message),
                Some(got) => {
                    return Err(Error::InvalidResponse(format!(
                        "response ID mismatch: expected {id:?}, got {got:?}"
                    )));
                }
                None => {
                    tracing::debug!(method = ?message.method, "skipping provider notification");
                }
            }
        }
    }
}

impl Drop for Connection {
    fn drop(&mut self) {
        if self.state != ConnectionState::Closed {
            // Dropped mid-operation (cancelled future or panic).
            tracing::debug!(state = ?self.state, "connection dropped without close");
            let _ = self.process.start_kill();
        }
    }
}

fn transition(state: &mut ConnectionState, next: ConnectionState) {
    tracing::trace!(from = ?*state, to = ?next, "connection state");
    *state = next;
}

/// Bound `fut` by a timeout and the cancellation token.
async fn bounded<T>(
    cancel: &CancellationToken,
    stage: Stage,
    limit: Duration,
    fut: impl Future<Output = Result<T>>,
) -> Result<T> {
    tokio::select! {
        _ = cancel.cancelled() => Err(Error::Cancelled),
        res = tokio::time::timeout(limit, fut) => res.map_err(|_| Error::Timeout {
            stage,
            millis: u64::try_from(limit.as_millis()).unwrap_or(u64::MAX),
        })?,
    }
}

#[cfg(all(test, unix))]
mod tests {
    use super::*;
    use crate::testing::{INIT_REPLY, RECORD_PID, provider_alive, scripted_provider};

    #[tokio::test]
    async fn missing_entry_point_fails_before_spawn() {
        let config = ProviderConfig::new("sh", "/nonexistent/provider.py");
        let err = Connection::open(&config, &CancellationToken::new())
            .await
            .err()
            .unwrap();
        assert!(matches!(err, Error::EntryPointMissing(_)));
    }

    #[tokio::test]
    async fn handshake_reaches_ready() {
        let script = format!(
            "read -r _init\nprintf '%s\\n' '{INIT_REPLY}'\nread -r _initialized\nread -r _eof\n"
        );
        let (_dir, config) = scripted_provider(&script);

        let conn = Connection::open(&config, &CancellationToken::new())
            .await
            .unwrap();
        assert_eq!(conn.state(), ConnectionState::Ready);
        assert_eq!(conn.server_info().unwrap().name, "fake-scraper");
        conn.close().await;
    }

    #[tokio::test]
    async fn unresponsive_provider_times_out_in_handshake() {
        let (_dir, config) = scripted_provider("sleep 5\n");
        let config = config.with_handshake_timeout(Duration::from_millis(200));

        let err = Connection::open(&config, &CancellationToken::new())
            .await
            .err()
            .unwrap();
        assert!(matches!(
            err,
            Error::Timeout {
                stage: Stage::Handshake,
                ..
            }
        ));
    }

    #[tokio::test]
    async fn exiting_provider_reports_server_exited() {
        let (_dir, config) = scripted_provider("read -r _init\nexit 0\n");

        let err = Connection::open(&config, &CancellationToken::new())
            .await
            .err()
            .unwrap();
        assert!(matches!(err, Error::ServerExited | Error::Io(_)));
        assert!(err.is_transport());
    }

    #[tokio::test]
    async fn notifications_before_response_are_skipped() {
        let script = format!(
            "read -r _init\n\
             printf '%s\\n' '{{\"jsonrpc\":\"2.0\",\"method\":\"notifications/message\",\"params\":{{}}}}'\n\
             printf '\\n'\n\
             printf '%s\\n' '{INIT_REPLY}'\n\
             read -r _initialized\nread -r _eof\n"
        );
        let (_dir, config) = scripted_provider(&script);

        let conn = Connection::open(&config, &CancellationToken::new())
            .await
            .unwrap();
        assert_eq!(conn.state(), ConnectionState::Ready);
        conn.close().await;
    }

    #[tokio::test]
    async fn mismatched_response_id_is_rejected() {
        let reply = INIT_REPLY.replace("\"id\":1", "\"id\":7");
        let script = format!("read -r _init\nprintf '%s\\n' '{reply}'\nread -r _eof\n");
        let (_dir, config) = scripted_provider(&script);

        let err = Connection::open(&config, &CancellationToken::new())
            .await
            .err()
            .unwrap();
        assert!(matches!(err, Error::InvalidResponse(_)));
    }

    #[tokio::test]
    async fn cancelled_token_aborts_open() {
        let (_dir, config) = scripted_provider("sleep 5\n");
        let cancel = CancellationToken::new();
        cancel.cancel();

        let err = Connection::open(&config, &cancel).await.err().unwrap();
        assert!(matches!(err, Error::Cancelled));
    }

    #[tokio::test]
    async fn cancellation_during_handshake_is_reported() {
        let (_dir, config) = scripted_provider("sleep 5\n");
        let cancel = CancellationToken::new();
        let trigger = cancel.clone();
        tokio::spawn(async move {
            tokio::time::sleep(Duration::from_millis(100)).await;
            trigger.cancel();
        });

        let err = Connection::open(&config, &cancel).await.err().unwrap();
        assert!(matches!(err, Error::Cancelled));
    }
    #[tokio::test]
    async fn unterminated_oversized_line_is_rejected() {
        let script = "head -c 5000000 /dev/zero | tr '\\000' a\nsleep 5\n";
        let (_dir, config) = scripted_provider(script);
        let config = config.with_handshake_timeout(Duration::from_secs(4));

        let started = std::time::Instant::now();
        let err = Connection::open(&config, &CancellationToken::new())
            .await
            .err()
            .unwrap();
        assert!(matches!(
            err,
            Error::OutputTooLarge {
                max: MAX_OUTPUT_SIZE,
                ..
            }
        ));
        assert!(started.elapsed() < Duration::from_secs(4));
    }

    #[tokio::test]
    async fn provider_is_released_after_handshake_timeout() {
        let (dir, config) = scripted_provider(&format!("{RECORD_PID}sleep 5\n"));
        let config = config.with_handshake_timeout(Duration::from_millis(200));

        let err = Connection::open(&config, &CancellationToken::new())
            .await
            .err()
            .unwrap();
        assert!(matches!(err, Error::Timeout { .. }));
        assert!(!provider_alive(&dir));
    }

    #[tokio::test]
    async fn provider_is_released_after_cancellation() {
        let (dir, config) = scripted_provider(&format!("{RECORD_PID}sleep 5\n"));
        let cancel = CancellationToken::new();
        let trigger = cancel.clone();
        tokio::spawn(async move {
            tokio::time::sleep(Duration::from_millis(100)).await;
            trigger.cancel();
        });

        let err = Connection::open(&config, &cancel).await.err().unwrap();
        assert!(matches!(err, Error::Cancelled));
        assert!(!provider_alive(&dir));
    }

    #[tokio::test]
    async fn provider_is_released_after_failed_handshake() {
        // Answers with the wrong id, then ignores stdin closing.
        let reply = INIT_REPLY.replace("\"id\":1", "\"id\":7");
        let script = format!("{RECORD_PID}read -r _init\nprintf '%s\\n' '{reply}'\nsleep 5\n");
        let (dir, config) = scripted_provider(&script);

        let err = Connection::open(&config, &CancellationToken::new())
            .await
            .err()
            .unwrap();
        assert!(matches!(err, Error::InvalidResponse(_)));
        assert!(!provider_alive(&dir));
    }

    #[tokio::test]
    async fn provider_is_released_after_close() {
        let script = format!(
            "{RECORD_PID}read -r _init\nprintf '%s\\n' '{INIT_REPLY}'\n\
             read -r _initialized\nsleep 5\n"
        );
        let (dir, config) = scripted_provider(&script);

        let conn = Connection::open(&config, &CancellationToken::new())
            .await
            .unwrap();
        assert!(provider_alive(&dir));
        conn.close().await;
        assert!(!provider_alive(&dir));
    }
}
