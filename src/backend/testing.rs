//! In-memory transport for exercising the negotiator without a server

use async_trait::async_trait;
use parking_lot::Mutex;
use serde_json::Value;
use std::collections::VecDeque;
use std::time::Duration;

use crate::backend::traits::{AttemptResponse, Transport};
use crate::error::{AppError, Result};

/// What the fake server does with one request
#[derive(Debug, Clone)]
pub enum Reply {
    Response(AttemptResponse),
    ConnectionRefused,
    TimedOut,
}

impl Reply {
    pub fn json(status: u16, body: Value) -> Self {
        Reply::Response(AttemptResponse::new(status, body.to_string()))
    }

    pub fn text(status: u16, body: &str) -> Self {
        Reply::Response(AttemptResponse::new(status, body))
    }

    pub fn bytes(status: u16, body: &[u8]) -> Self {
        Reply::Response(AttemptResponse::new(status, body.to_vec()))
    }
}

#[derive(Debug, Clone)]
pub struct RecordedCall {
    pub url: String,
    /// `None` for GET requests
    pub body: Option<Value>,
    pub timeout: Duration,
}

type Handler = Box<dyn Fn(&str, Option<&Value>) -> Reply + Send + Sync>;

enum Script {
    Queue(Mutex<VecDeque<Reply>>),
    Handler(Handler),
}

pub struct ScriptedTransport {
    script: Script,
    calls: Mutex<Vec<RecordedCall>>,
}

impl ScriptedTransport {
    /// Replies are handed out in order; running out is a test bug and panics.
    pub fn new(replies: Vec<Reply>) -> Self {
        Self {
            script: Script::Queue(Mutex::new(replies.into())),
            calls: Mutex::new(Vec::new()),
        }
    }

    /// Every request is answered by `handler(url, body)`.
    pub fn with_handler<F>(handler: F) -> Self
    where
        F: Fn(&str, Option<&Value>) -> Reply + Send + Sync + 'static,
    {
        Self {
            script: Script::Handler(Box::new(handler)),
            calls: Mutex::new(Vec::new()),
        }
    }

    pub fn calls(&self) -> Vec<RecordedCall> {
        self.calls.lock().clone()
    }

    /// Bodies of every POST sent to a URL ending in `suffix`
    pub fn posted_to(&self, suffix: &str) -> Vec<Value> {
        self.calls
            .lock()
            .iter()
            .filter(|c| c.url.ends_with(suffix))
            .filter_map(|c| c.body.clone())
            .collect()
    }

    fn answer(&self, url: &str, body: Option<&Value>, timeout: Duration) -> Result<AttemptResponse> {
        self.calls.lock().push(RecordedCall {
            url: url.to_string(),
            body: body.cloned(),
            timeout,
        });

        let reply = match &self.script {
            Script::Queue(queue) => queue
                .lock()
                .pop_front()
                .unwrap_or_else(|| panic!("unexpected request to {}", url)),
            Script::Handler(handler) => handler(url, body),
        };

        match reply {
            Reply::Response(response) => Ok(response),
            Reply::ConnectionRefused => Err(AppError::Connection(format!("{}: connection refused", url))),
            Reply::TimedOut => Err(AppError::Timeout(format!("{}: timed out", url))),
        }
    }
}

#[async_trait]
impl Transport for ScriptedTransport {
    async fn post_json(&self, url: &str, body: &Value, timeout: Duration) -> Result<AttemptResponse> {
        self.answer(url, Some(body), timeout)
    }

    async fn get(&self, url: &str, timeout: Duration) -> Result<AttemptResponse> {
        self.answer(url, None, timeout)
    }
}
