//! Scripted fakes for orchestrator and boundary tests.

use std::collections::{HashMap, VecDeque};
use std::sync::Mutex;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::time::Duration;

use mcp::{ToolDefinition, ToolInvocationRequest, ToolInvocationResult};
use serde_json::json;
use tokio_util::sync::CancellationToken;

use crate::model::{
    ChatBackend, Completion, CompletionRequest, Message, ModelError, ToolCallInstruction, Usage,
};
use crate::schema::ToolSchemaEntry;
use crate::tools::ToolHost;

pub(crate) fn direct(text: &str) -> Completion {
    Completion {
        message: Message::assistant(text),
        usage: Usage::default(),
    }
}

/// Completion requesting `(id, tool, arguments)` calls.
pub(crate) fn tool_calls(calls: &[(&str, &str, &str)]) -> Completion {
    let mut message = Message::assistant("");
    message.tool_calls = calls
        .iter()
        .map(|(id, name, args)| ToolCallInstruction::new(*id, *name, *args))
        .collect();
    Completion {
        message,
        usage: Usage::default(),
    }
}

#[derive(Debug, Clone)]
pub(crate) struct RecordedRequest {
    pub messages: Vec<Message>,
    pub tools: Vec<ToolSchemaEntry>,
}

/// Chat backend replaying canned completions and recording requests.
pub(crate) struct ScriptedBackend {
    replies: Mutex<VecDeque<Result<Completion, ModelError>>>,
    requests: Mutex<Vec<RecordedRequest>>,
    delay: Option<Duration>,
}

impl ScriptedBackend {
    pub fn new(replies: Vec<Result<Completion, ModelError>>) -> Self {
        Self {
            replies: Mutex::new(replies.into()),
            requests: Mutex::new(Vec::new()),
            delay: None,
        }
    }

    pub fn with_delay(mut self, delay: Duration) -> Self {
        self.delay = Some(delay);
        self
    }

    pub fn requests(&self) -> Vec<RecordedRequest> {
        self.requests.lock().unwrap().clone()
    }
}

impl ChatBackend for ScriptedBackend {
    async fn complete(&self, request: CompletionRequest<'_>) -> Result<Completion, ModelError> {
        self.requests.lock().unwrap().push(RecordedRequest {
            messages: request.messages.to_vec(),
            tools: request.tools.to_vec(),
        });
        if let Some(delay) = self.delay {
            tokio::time::sleep(delay).await;
        }
        let next = self.replies.lock().unwrap().pop_front();
        next.unwrap_or_else(|| Err(ModelError::Api("no scripted reply left".into())))
    }
}

/// Tool host with a fixed catalog and canned results.
pub(crate) struct FakeToolHost {
    catalog: Vec<ToolDefinition>,
    results: HashMap<String, ToolInvocationResult>,
    invocations: Mutex<Vec<ToolInvocationRequest>>,
    catalog_fetches: AtomicUsize,
}

impl FakeToolHost {
    /// A provider exposing `scrape_url`.
    pub fn scraper() -> Self {
        Self::unreachable().with_tool("scrape_url")
    }

    /// A provider whose catalog always comes back empty.
    pub fn unreachable() -> Self {
        Self {
            catalog: Vec::new(),
            results: HashMap::new(),
            invocations: Mutex::new(Vec::new()),
            catalog_fetches: AtomicUsize::new(0),
        }
    }

    pub fn with_tool(mut self, name: &str) -> Self {
        self.catalog.push(ToolDefinition {
            name: name.into(),
            description: format!("{name} tool"),
            parameter_schema: json!({"type": "object"}),
        });
        self
    }

    pub fn with_result(mut self, name: &str, result: ToolInvocationResult) -> Self {
        self.results.insert(name.into(), result);
        self
    }

    pub fn invocations(&self) -> Vec<ToolInvocationRequest> {
        self.invocations.lock().unwrap().clone()
    }

    pub fn catalog_fetches(&self) -> usize {
        self.catalog_fetches.load(Ordering::SeqCst)
    }
}

impl ToolHost for FakeToolHost {
    async fn catalog(&self, _cancel: &CancellationToken) -> Vec<ToolDefinition> {
        self.catalog_fetches.fetch_add(1, Ordering::SeqCst);
        self.catalog.clone()
    }

    async fn invoke(
        &self,
        request: ToolInvocationRequest,
        _cancel: &CancellationToken,
    ) -> ToolInvocationResult {
        let result = self
            .results
            .get(&request.tool_name)
            .cloned()
            .unwrap_or_else(|| ToolInvocationResult::success("ok"));
        self.invocations.lock().unwrap().push(request);
        result
    }
}
