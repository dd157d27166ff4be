//! Fakes shared by unit tests.

use crate::transport::{LaunchSpec, TransportError, TransportHandle, TransportLauncher};
use async_trait::async_trait;
use serde_json::Value;
use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use toolhub_mcp::{McpError, McpToolCallResult, McpToolInfo, Transport};

pub(crate) fn tool(name: &str) -> McpToolInfo {
    McpToolInfo {
        name: name.to_string(),
        description: format!("{name} tool"),
        input_schema: serde_json::json!({"type": "object"}),
    }
}

pub(crate) struct FakeTransport {
    name: String,
    calls: Mutex<Vec<String>>,
    closes: AtomicUsize,
    closed: AtomicBool,
}

impl FakeTransport {
    pub(crate) fn new(name: &str) -> Self {
        Self {
            name: name.to_string(),
            calls: Mutex::new(Vec::new()),
            closes: AtomicUsize::new(0),
            closed: AtomicBool::new(false),
        }
    }

    pub(crate) fn calls(&self) -> Vec<String> {
        self.calls.lock().unwrap().clone()
    }

    pub(crate) fn close_count(&self) -> usize {
        self.closes.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl Transport for FakeTransport {
    fn name(&self) -> &str {
        &self.name
    }

    async fn call_tool(&self, name: &str, _arguments: Value) -> Result<McpToolCallResult, McpError> {
        if self.is_closed() {
            return Err(McpError::Closed(self.name.clone()));
        }
        self.calls.lock().unwrap().push(name.to_string());
        Ok(McpToolCallResult {
            text: format!("{}:{name}", self.name),
            structured_content: None,
            raw_content: Vec::new(),
            is_error: false,
        })
    }

    async fn close(&self) {
        self.closes.fetch_add(1, Ordering::SeqCst);
        self.closed.store(true, Ordering::SeqCst);
    }

    fn is_closed(&self) -> bool {
        self.closed.load(Ordering::SeqCst)
    }
}

/// What [`FakeLauncher`] does for a given command.
#[derive(Clone)]
pub(crate) enum Outcome {
    Tools(Vec<&'static str>),
    Fail,
    Hang,
}

/// Launcher keyed by resolved command; unknown commands fail.
#[derive(Default)]
pub(crate) struct FakeLauncher {
    outcomes: HashMap<String, Outcome>,
    launched: Mutex<Vec<(String, Arc<FakeTransport>)>>,
    attempts: AtomicUsize,
}

impl FakeLauncher {
    pub(crate) fn new() -> Self {
        Self::default()
    }

    pub(crate) fn with(mut self, command: &str, outcome: Outcome) -> Self {
        self.outcomes.insert(command.to_string(), outcome);
        self
    }

    /// Transports handed out so far, with the command that produced them.
    pub(crate) fn launched(&self) -> Vec<(String, Arc<FakeTransport>)> {
        self.launched.lock().unwrap().clone()
    }

    pub(crate) fn attempts(&self) -> usize {
        self.attempts.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl TransportLauncher for FakeLauncher {
    async fn launch(&self, spec: LaunchSpec) -> Result<TransportHandle, TransportError> {
        self.attempts.fetch_add(1, Ordering::SeqCst);
        match self.outcomes.get(&spec.command).cloned() {
            Some(Outcome::Tools(names)) => {
                let transport = Arc::new(FakeTransport::new(&spec.command));
                self.launched
                    .lock()
                    .unwrap()
                    .push((spec.command.clone(), transport.clone()));
                Ok(TransportHandle {
                    instance_id: spec.instance_id,
                    server_id: spec.server_id,
                    name: spec.name,
                    transport,
                    tools: names.into_iter().map(tool).collect(),
                })
            }
            Some(Outcome::Hang) => std::future::pending().await,
            Some(Outcome::Fail) | None => {
                Err(TransportError::ExecutableNotFound(spec.command))
            }
        }
    }
}
