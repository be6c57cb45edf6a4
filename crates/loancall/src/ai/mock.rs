//! Scripted adapters for tests and local demos.

use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;

use super::{parse_analysis, AdapterError, Extractor, Transcriber};
use crate::model::CallAnalysis;
use crate::storage::AudioClip;

/// Mock transcriber returning a fixed transcript, a failure, or nothing
/// at all until its delay elapses.
#[derive(Debug, Clone)]
pub struct MockTranscriber {
    response: Result<String, AdapterError>,
    delay: Option<Duration>,
    calls: Arc<AtomicUsize>,
}

impl MockTranscriber {
    pub fn new() -> Self {
        Self {
            response: Ok("mock transcription".to_string()),
            delay: None,
            calls: Arc::new(AtomicUsize::new(0)),
        }
    }

    pub fn with_response(mut self, text: &str) -> Self {
        self.response = Ok(text.to_string());
        self
    }

    pub fn with_failure(mut self, error: AdapterError) -> Self {
        self.response = Err(error);
        self
    }

    /// Sleeps before answering; used to exercise timeouts.
    pub fn with_delay(mut self, delay: Duration) -> Self {
        self.delay = Some(delay);
        self
    }

    /// Number of `transcribe` calls so far, shared across clones.
    pub fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }
}

impl Default for MockTranscriber {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl Transcriber for MockTranscriber {
    async fn transcribe(&self, _audio: &AudioClip) -> Result<String, AdapterError> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        if let Some(delay) = self.delay {
            tokio::time::sleep(delay).await;
        }
        self.response.clone()
    }

    fn model_name(&self) -> &str {
        "mock-transcriber"
    }
}

#[derive(Debug, Clone)]
enum MockReply {
    Analysis(CallAnalysis),
    Raw(String),
    Failure(AdapterError),
}

/// Mock extractor returning a fixed analysis, a raw model reply to parse,
/// or a failure.
#[derive(Debug, Clone)]
pub struct MockExtractor {
    reply: MockReply,
    delay: Option<Duration>,
    calls: Arc<AtomicUsize>,
}

impl MockExtractor {
    pub fn new() -> Self {
        Self {
            reply: MockReply::Analysis(CallAnalysis::default()),
            delay: None,
            calls: Arc::new(AtomicUsize::new(0)),
        }
    }

    pub fn with_analysis(mut self, analysis: CallAnalysis) -> Self {
        self.reply = MockReply::Analysis(analysis);
        self
    }

    /// Replies with `content` as if the model had returned it verbatim.
    pub fn with_raw_reply(mut self, content: &str) -> Self {
        self.reply = MockReply::Raw(content.to_string());
        self
    }

    pub fn with_failure(mut self, error: AdapterError) -> Self {
        self.reply = MockReply::Failure(error);
        self
    }

    pub fn with_delay(mut self, delay: Duration) -> Self {
        self.delay = Some(delay);
        self
    }

    pub fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }
}

impl Default for MockExtractor {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl Extractor for MockExtractor {
    async fn extract(&self, _transcript: &str) -> Result<CallAnalysis, AdapterError> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        if let Some(delay) = self.delay {
            tokio::time::sleep(delay).await;
        }
        match &self.reply {
            MockReply::Analysis(analysis) => Ok(analysis.clone()),
            MockReply::Raw(content) => parse_analysis(content),
            MockReply::Failure(error) => Err(error.clone()),
        }
    }

    fn model_name(&self) -> &str {
        "mock-extractor"
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_mock_transcriber_counts_calls_across_clones() {
        let transcriber = MockTranscriber::new().with_response("hello world");
        let clone = transcriber.clone();
        let audio = AudioClip::new(vec![1], "a.mp3");

        assert_eq!(clone.transcribe(&audio).await.unwrap(), "hello world");
        assert_eq!(transcriber.calls(), 1);
    }

    #[tokio::test]
    async fn test_mock_extractor_raw_reply_is_parsed() {
        let extractor = MockExtractor::new().with_raw_reply("not json");
        let err = extractor.extract("hello world").await.unwrap_err();
        assert!(err.is_malformed());
    }
}
