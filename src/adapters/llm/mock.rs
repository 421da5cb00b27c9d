//! Mock LLM client for tests, benches, and dry runs.

use async_trait::async_trait;
use std::collections::VecDeque;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Mutex;
use tokio::time::{sleep, Duration};

use crate::domain::ports::{LlmClient, LlmError};

/// One scripted reply.
#[derive(Debug, Clone)]
pub struct MockReply {
    pub result: Result<String, LlmError>,
}

impl MockReply {
    pub fn text(output: impl Into<String>) -> Self {
        Self {
            result: Ok(output.into()),
        }
    }

    pub fn error(err: LlmError) -> Self {
        Self { result: Err(err) }
    }

    /// A fenced block in the given language.
    pub fn fenced(language: &str, code: &str) -> Self {
        Self::text(format!("```{language}\n{code}\n```"))
    }
}

/// Mock LLM client.
///
/// Replies come from a scripted queue first, then from prompt-substring
/// overrides, then from the default reply. The client tracks call counts
/// and peak concurrent entries so tests can assert the executor's
/// concurrency bound.
pub struct MockLlmClient {
    default_reply: MockReply,
    scripted: Mutex<VecDeque<MockReply>>,
    overrides: Mutex<Vec<(String, MockReply)>>,
    prompts: Mutex<Vec<String>>,
    delay: Option<Duration>,
    calls: AtomicUsize,
    in_flight: AtomicUsize,
    peak_in_flight: AtomicUsize,
}

impl MockLlmClient {
    pub fn new() -> Self {
        Self::with_default_reply(MockReply::fenced("python", "def generated():\n    pass"))
    }

    pub fn with_default_reply(default_reply: MockReply) -> Self {
        Self {
            default_reply,
            scripted: Mutex::new(VecDeque::new()),
            overrides: Mutex::new(Vec::new()),
            prompts: Mutex::new(Vec::new()),
            delay: None,
            calls: AtomicUsize::new(0),
            in_flight: AtomicUsize::new(0),
            peak_in_flight: AtomicUsize::new(0),
        }
    }

    /// Hold each call open for `delay`; makes concurrency observable.
    pub fn with_delay(mut self, delay: Duration) -> Self {
        self.delay = Some(delay);
        self
    }

    /// Queue a reply consumed before overrides and the default.
    pub fn push_reply(&self, reply: MockReply) {
        self.scripted.lock().unwrap().push_back(reply);
    }

    /// Reply with `reply` whenever the prompt contains `needle`.
    pub fn set_reply_for(&self, needle: impl Into<String>, reply: MockReply) {
        self.overrides.lock().unwrap().push((needle.into(), reply));
    }

    pub fn call_count(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }

    /// Every prompt seen so far, in call order.
    pub fn prompts(&self) -> Vec<String> {
        self.prompts.lock().unwrap().clone()
    }

    /// Highest number of concurrently executing `generate` calls seen.
    pub fn peak_concurrency(&self) -> usize {
        self.peak_in_flight.load(Ordering::SeqCst)
    }

    fn pick_reply(&self, prompt: &str) -> MockReply {
        if let Some(reply) = self.scripted.lock().unwrap().pop_front() {
            return reply;
        }
        let overrides = self.overrides.lock().unwrap();
        for (needle, reply) in overrides.iter() {
            if prompt.contains(needle.as_str()) {
                return reply.clone();
            }
        }
        self.default_reply.clone()
    }
}

impl Default for MockLlmClient {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl LlmClient for MockLlmClient {
    fn name(&self) -> &'static str {
        "mock"
    }

    async fn generate(
        &self,
        prompt: &str,
        _temperature: f64,
        _max_tokens: u32,
    ) -> Result<String, LlmError> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        self.prompts.lock().unwrap().push(prompt.to_string());
        let current = self.in_flight.fetch_add(1, Ordering::SeqCst) + 1;
        self.peak_in_flight.fetch_max(current, Ordering::SeqCst);

        if let Some(delay) = self.delay {
            sleep(delay).await;
        }

        let reply = self.pick_reply(prompt);
        self.in_flight.fetch_sub(1, Ordering::SeqCst);
        reply.result
    }
}
