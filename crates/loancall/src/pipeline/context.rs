use crate::model::{CallAnalysis, CallJob};
use crate::storage::AudioClip;

pub struct PipelineContext {
    // Input: the job as read before claiming
    pub call: CallJob,
    pub claim_token: String,

    // Fetch result
    pub audio: Option<AudioClip>,

    // Transcription result; kept on the record even if extraction fails
    pub transcript: Option<String>,

    // Extraction result
    pub analysis: Option<CallAnalysis>,
}

impl PipelineContext {
    pub fn new(call: CallJob, claim_token: String) -> Self {
        Self {
            call,
            claim_token,
            audio: None,
            transcript: None,
            analysis: None,
        }
    }
}
