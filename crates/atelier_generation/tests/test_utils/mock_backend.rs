//! Scripted backend for exercising the generation pipeline without a server.

use async_trait::async_trait;
use atelier_backend::{GenerationBackend, HistoryEntry, UploadedImage};
use atelier_core::FlatGraph;
use atelier_error::{AtelierResult, BackendError, BackendErrorKind};
use serde_json::Value;
use std::sync::Mutex;

/// What `submit` does.
#[derive(Debug, Clone)]
pub enum MockSubmit {
    /// Accept with this job id
    Accept(String),
    /// Fail with this error
    Error(BackendErrorKind),
}

/// What `upload_image` does.
#[derive(Debug, Clone)]
pub enum MockUpload {
    /// Store under `refs/<filename>`
    Accept,
    /// Reject with this status
    Reject(u16),
}

/// One scripted history response.
#[derive(Debug, Clone)]
pub enum MockHistory {
    /// No record yet
    Pending,
    /// A full history entry (the value under the job id)
    Entry(Value),
    /// Transport failure
    Unreachable,
}

/// In-process backend with scripted responses and call counters.
///
/// History responses are consumed in order; once exhausted the last one repeats.
pub struct MockBackend {
    submit: MockSubmit,
    upload: MockUpload,
    history: Mutex<Vec<MockHistory>>,
    submitted: Mutex<Vec<FlatGraph>>,
    uploaded: Mutex<Vec<String>>,
    history_calls: Mutex<usize>,
    deleted: Mutex<Vec<String>>,
    interrupts: Mutex<usize>,
}

impl MockBackend {
    /// Backend that accepts everything and replays `history`.
    pub fn new(history: Vec<MockHistory>) -> Self {
        Self {
            submit: MockSubmit::Accept("job-1".to_string()),
            upload: MockUpload::Accept,
            history: Mutex::new(history),
            submitted: Mutex::new(Vec::new()),
            uploaded: Mutex::new(Vec::new()),
            history_calls: Mutex::new(0),
            deleted: Mutex::new(Vec::new()),
            interrupts: Mutex::new(0),
        }
    }

    /// Backend whose history immediately holds `entry`.
    pub fn completed_with(entry: Value) -> Self {
        Self::new(vec![MockHistory::Entry(entry)])
    }

    /// Change submission behavior.
    pub fn with_submit(mut self, submit: MockSubmit) -> Self {
        self.submit = submit;
        self
    }

    /// Change upload behavior.
    pub fn with_upload(mut self, upload: MockUpload) -> Self {
        self.upload = upload;
        self
    }

    /// Number of submit() calls.
    pub fn submit_count(&self) -> usize {
        self.submitted.lock().unwrap().len()
    }

    /// Graphs passed to submit(), in order.
    pub fn submitted(&self) -> Vec<FlatGraph> {
        self.submitted.lock().unwrap().clone()
    }

    /// Filenames passed to upload_image(), in order.
    pub fn uploaded(&self) -> Vec<String> {
        self.uploaded.lock().unwrap().clone()
    }

    /// Number of history() calls.
    pub fn history_count(&self) -> usize {
        *self.history_calls.lock().unwrap()
    }

    /// Job ids passed to delete_queued().
    pub fn deleted(&self) -> Vec<String> {
        self.deleted.lock().unwrap().clone()
    }

    /// Number of interrupt() calls.
    pub fn interrupt_count(&self) -> usize {
        *self.interrupts.lock().unwrap()
    }
}

#[async_trait]
impl GenerationBackend for MockBackend {
    async fn submit(&self, graph: &FlatGraph) -> AtelierResult<String> {
        self.submitted.lock().unwrap().push(graph.clone());
        match &self.submit {
            MockSubmit::Accept(id) => Ok(id.clone()),
            MockSubmit::Error(kind) => Err(BackendError::new(kind.clone()).into()),
        }
    }

    async fn history(&self, job_id: &str) -> AtelierResult<Option<HistoryEntry>> {
        *self.history_calls.lock().unwrap() += 1;
        let next = {
            let mut script = self.history.lock().unwrap();
            if script.len() > 1 {
                script.remove(0)
            } else {
                script.first().cloned().unwrap_or(MockHistory::Pending)
            }
        };
        match next {
            MockHistory::Pending => Ok(None),
            MockHistory::Entry(entry) => {
                let mut body = serde_json::Map::new();
                body.insert(job_id.to_string(), entry);
                Ok(HistoryEntry::from_history(&Value::Object(body), job_id).unwrap())
            }
            MockHistory::Unreachable => Err(BackendError::new(BackendErrorKind::Connection(
                "connection refused".into(),
            ))
            .into()),
        }
    }

    async fn upload_image(&self, filename: &str, _bytes: Vec<u8>) -> AtelierResult<UploadedImage> {
        self.uploaded.lock().unwrap().push(filename.to_string());
        match &self.upload {
            MockUpload::Accept => Ok(UploadedImage {
                name: filename.to_string(),
                subfolder: "refs".to_string(),
                storage_type: "input".to_string(),
            }),
            MockUpload::Reject(status) => Err(BackendError::new(BackendErrorKind::UploadRejected {
                status: *status,
                message: "upload refused".into(),
            })
            .into()),
        }
    }

    async fn delete_queued(&self, job_id: &str) -> AtelierResult<()> {
        self.deleted.lock().unwrap().push(job_id.to_string());
        Ok(())
    }

    async fn interrupt(&self) -> AtelierResult<()> {
        *self.interrupts.lock().unwrap() += 1;
        Ok(())
    }

    async fn health_check(&self) -> AtelierResult<()> {
        Ok(())
    }

    fn base_url(&self) -> &str {
        "http://mock"
    }
}
