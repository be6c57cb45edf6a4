//! Test harness for isolated end-to-end runs.
//!
//! Each harness owns a temp directory for artifacts and an in-memory
//! database; adapters are scripted so no network is touched.

#![allow(dead_code)]

use std::sync::Arc;
use std::time::Duration;

use tempfile::TempDir;

use loancall::ai::{Extractor, KeywordExtractor, MockTranscriber};
use loancall::los::{LosClient, SimulatedLos};
use loancall::{
    CallIntake, CallPipeline, Database, FileArtifactStore, LosPusher, PipelineConfig,
};

pub struct TestHarness {
    temp_dir: TempDir,
    pub db: Database,
    pub artifacts: Arc<FileArtifactStore>,
    pub transcriber: MockTranscriber,
    extractor: Arc<dyn Extractor>,
    los: Arc<dyn LosClient>,
    config: PipelineConfig,
}

impl TestHarness {
    /// Keyword extraction, simulated LOS, and a transcriber that answers
    /// "mock transcription".
    pub fn new() -> Self {
        let temp_dir = TempDir::new().expect("Failed to create temp directory");
        let artifacts = Arc::new(FileArtifactStore::new(temp_dir.path().join("artifacts")));
        Self {
            temp_dir,
            db: Database::open_in_memory().expect("Failed to open database"),
            artifacts,
            transcriber: MockTranscriber::new(),
            extractor: Arc::new(KeywordExtractor::new()),
            los: Arc::new(SimulatedLos::new()),
            config: PipelineConfig {
                artifact_fetch_timeout: Duration::from_secs(5),
                transcription_timeout: Duration::from_secs(5),
                extraction_timeout: Duration::from_secs(5),
                claim_lease: Duration::from_secs(900),
            },
        }
    }

    pub fn with_transcriber(mut self, transcriber: MockTranscriber) -> Self {
        self.transcriber = transcriber;
        self
    }

    pub fn with_extractor(mut self, extractor: Arc<dyn Extractor>) -> Self {
        self.extractor = extractor;
        self
    }

    pub fn with_transcription_timeout(mut self, timeout: Duration) -> Self {
        self.config.transcription_timeout = timeout;
        self
    }

    pub fn temp_path(&self) -> &std::path::Path {
        self.temp_dir.path()
    }

    pub fn intake(&self) -> CallIntake {
        CallIntake::new(
            Arc::new(self.db.clone()),
            Arc::new(self.db.clone()),
            self.artifacts.clone(),
        )
    }

    pub fn pipeline(&self) -> CallPipeline {
        CallPipeline::new(
            Arc::new(self.config.clone()),
            Arc::new(self.db.clone()),
            self.artifacts.clone(),
            Arc::new(self.transcriber.clone()),
            self.extractor.clone(),
        )
    }

    pub fn pusher(&self) -> LosPusher {
        LosPusher::new(
            Arc::new(self.db.clone()),
            self.los.clone(),
            Duration::from_secs(5),
        )
    }
}

impl Default for TestHarness {
    fn default() -> Self {
        Self::new()
    }
}
