// Mock implementations of kernel traits for tests.
//
// Compiled unconditionally so integration tests under tests/ can use them.

use anyhow::Result;
use async_trait::async_trait;
use std::sync::atomic::{AtomicU32, Ordering};
use std::sync::{Arc, Mutex};

use super::providers::{AiPurpose, BaseAi, BaseAiFactory, Provider};
use super::search::{BaseSearchService, SearchResult};

// =============================================================================
// Mock AI
// =============================================================================

/// Scripted AI: returns canned responses in order. Once the script is
/// exhausted it returns empty strings, which downstream code treats as a
/// failed generation.
pub struct MockAi {
    responses: Vec<String>,
    call_count: Arc<AtomicU32>,
    repeat_last: bool,
    fail: bool,
}

impl MockAi {
    pub fn new(responses: Vec<&str>) -> Self {
        Self {
            responses: responses.into_iter().map(String::from).collect(),
            call_count: Arc::new(AtomicU32::new(0)),
            repeat_last: false,
            fail: false,
        }
    }

    /// Return the same response for every call.
    pub fn always(response: &str) -> Self {
        Self {
            responses: vec![response.to_string()],
            call_count: Arc::new(AtomicU32::new(0)),
            repeat_last: true,
            fail: false,
        }
    }

    /// Fail every call with an error.
    pub fn failing() -> Self {
        Self {
            responses: Vec::new(),
            call_count: Arc::new(AtomicU32::new(0)),
            repeat_last: false,
            fail: true,
        }
    }

    pub fn calls(&self) -> u32 {
        self.call_count.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl BaseAi for MockAi {
    async fn complete(&self, _system: &str, _user: &str) -> Result<String> {
        let idx = self.call_count.fetch_add(1, Ordering::SeqCst) as usize;
        if self.fail {
            anyhow::bail!("mock AI failure");
        }
        if self.repeat_last {
            return Ok(self.responses.last().cloned().unwrap_or_default());
        }
        Ok(self.responses.get(idx).cloned().unwrap_or_default())
    }
}

// =============================================================================
// Scripted AI factory
// =============================================================================

/// Factory returning per-provider scripted AIs. A provider with no scripted
/// response fails every call, which is how tests exercise fallback.
pub struct ScriptedAiFactory {
    openai_response: Option<String>,
    anthropic_response: Option<String>,
}

impl ScriptedAiFactory {
    pub fn new(openai_response: Option<&str>, anthropic_response: Option<&str>) -> Self {
        Self {
            openai_response: openai_response.map(String::from),
            anthropic_response: anthropic_response.map(String::from),
        }
    }

    /// Both providers return the same response.
    pub fn both(response: &str) -> Self {
        Self::new(Some(response), Some(response))
    }
}

impl BaseAiFactory for ScriptedAiFactory {
    fn create(&self, provider: Provider, _api_key: &str, _purpose: AiPurpose) -> Box<dyn BaseAi> {
        let response = match provider {
            Provider::Openai => self.openai_response.as_deref(),
            Provider::Anthropic => self.anthropic_response.as_deref(),
        };
        match response {
            Some(response) => Box::new(MockAi::always(response)),
            None => Box::new(MockAi::failing()),
        }
    }
}

// =============================================================================
// Mock search
// =============================================================================

/// Scripted search service: returns the same result list for every query and
/// records the queries it was asked.
pub struct MockSearchService {
    results: Vec<SearchResult>,
    queries: Mutex<Vec<String>>,
}

impl MockSearchService {
    pub fn new(results: Vec<SearchResult>) -> Self {
        Self {
            results,
            queries: Mutex::new(Vec::new()),
        }
    }

    pub fn empty() -> Self {
        Self::new(Vec::new())
    }

    pub fn queries(&self) -> Vec<String> {
        self.queries.lock().expect("queries lock").clone()
    }
}

#[async_trait]
impl BaseSearchService for MockSearchService {
    async fn search(
        &self,
        query: &str,
        _language: &str,
        _max_results: usize,
    ) -> Result<Vec<SearchResult>> {
        self.queries
            .lock()
            .expect("queries lock")
            .push(query.to_string());
        Ok(self.results.clone())
    }
}
