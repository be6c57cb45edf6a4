#![allow(dead_code)]

use loancall::intake::CallUpload;
use serde_json::{json, Value};

/// Builds a `CallUpload` with dashboard-like defaults.
pub struct UploadBuilder {
    upload: CallUpload,
}

impl UploadBuilder {
    pub fn new() -> Self {
        Self {
            upload: CallUpload {
                user_id: "officer-1".to_string(),
                title: "Purchase consultation".to_string(),
                client_name: "Dana Whitfield".to_string(),
                duration_secs: 600,
                file_name: Some("recording.webm".to_string()),
                audio: b"webm-audio-bytes".to_vec(),
            },
        }
    }

    pub fn client(mut self, name: &str) -> Self {
        self.upload.client_name = name.to_string();
        self
    }

    pub fn file_name(mut self, name: &str) -> Self {
        self.upload.file_name = Some(name.to_string());
        self
    }

    pub fn audio(mut self, bytes: &[u8]) -> Self {
        self.upload.audio = bytes.to_vec();
        self
    }

    pub fn build(self) -> CallUpload {
        self.upload
    }
}

impl Default for UploadBuilder {
    fn default() -> Self {
        Self::new()
    }
}

/// Builds a config document section by section.
pub struct ConfigBuilder {
    value: Value,
}

impl ConfigBuilder {
    pub fn new() -> Self {
        Self {
            value: json!({ "version": "1.0" }),
        }
    }

    pub fn section(mut self, name: &str, section: Value) -> Self {
        self.value[name] = section;
        self
    }

    pub fn build(self) -> String {
        serde_json::to_string_pretty(&self.value).expect("config serializes")
    }
}

impl Default for ConfigBuilder {
    fn default() -> Self {
        Self::new()
    }
}
