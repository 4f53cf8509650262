//! Scripted transport for exercising the fetch path without a network.

use async_trait::async_trait;
use serde_json::Value;
use std::sync::{Arc, Mutex};
use std::time::Duration;

use super::client::UpstreamTransport;
use super::UpstreamError;

/// Replies from a queue in order and records every request.
pub struct Scripted {
    replies: Mutex<Vec<Result<Value, UpstreamError>>>,
    calls: Mutex<Vec<(String, Vec<(String, String)>)>>,
    delay: Option<Duration>,
}

impl Scripted {
    pub fn new(replies: Vec<Result<Value, UpstreamError>>) -> Arc<Self> {
        Arc::new(Scripted {
            replies: Mutex::new(replies.into_iter().rev().collect()),
            calls: Mutex::new(Vec::new()),
            delay: None,
        })
    }

    /// Like [`Scripted::new`], but every reply takes `delay` to arrive.
    pub fn delayed(replies: Vec<Result<Value, UpstreamError>>, delay: Duration) -> Arc<Self> {
        Arc::new(Scripted {
            replies: Mutex::new(replies.into_iter().rev().collect()),
            calls: Mutex::new(Vec::new()),
            delay: Some(delay),
        })
    }

    pub fn call_count(&self) -> usize {
        self.calls.lock().unwrap().len()
    }

    pub fn calls(&self) -> Vec<(String, Vec<(String, String)>)> {
        self.calls.lock().unwrap().clone()
    }
}

#[async_trait]
impl UpstreamTransport for Scripted {
    async fn get_json(&self, path: &str, query: &[(&str, String)]) -> Result<Value, UpstreamError> {
        self.calls.lock().unwrap().push((
            path.to_string(),
            query.iter().map(|(k, v)| (k.to_string(), v.clone())).collect(),
        ));
        if let Some(delay) = self.delay {
            tokio::time::sleep(delay).await;
        }
        self.replies
            .lock()
            .unwrap()
            .pop()
            .unwrap_or_else(|| Err(UpstreamError::Unavailable("script exhausted".into())))
    }
}
