use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::time::Duration;

use serde::{Deserialize, Serialize};

use super::types::{DocumentExtractor, ExtractedDocument};
use super::ExtractionError;
use crate::pipeline::cancel::CancelToken;

/// Blocking HTTP client for the document-processing service.
pub struct HttpDocumentExtractor {
    base_url: String,
    processor_id: String,
    client: reqwest::blocking::Client,
    timeout_secs: u64,
}

impl HttpDocumentExtractor {
    pub fn new(
        base_url: &str,
        processor_id: &str,
        timeout_secs: u64,
    ) -> Result<Self, ExtractionError> {
        let client = reqwest::blocking::Client::builder()
            .timeout(Duration::from_secs(timeout_secs))
            .build()
            .map_err(|e| ExtractionError::HttpClient(e.to_string()))?;

        Ok(Self {
            base_url: base_url.trim_end_matches('/').to_string(),
            processor_id: processor_id.to_string(),
            client,
            timeout_secs,
        })
    }

    fn process_url(&self) -> String {
        format!("{}/v1/processors/{}:process", self.base_url, self.processor_id)
    }

    /// Request timeout bounded by whatever the caller has left.
    fn effective_timeout(&self, cancel: &CancelToken) -> Duration {
        let configured = Duration::from_secs(self.timeout_secs);
        match cancel.remaining() {
            Some(left) => left.min(configured),
            None => configured,
        }
    }
}

/// Request body for `:process`
#[derive(Serialize)]
struct ProcessRequest<'a> {
    raw_document_uri: &'a str,
    mime_type: &'a str,
}

/// Response body from `:process`
#[derive(Deserialize)]
struct ProcessResponse {
    document: ExtractedDocument,
}

impl DocumentExtractor for HttpDocumentExtractor {
    fn extract_lab_report(
        &self,
        document_uri: &str,
        mime_type: &str,
        cancel: &CancelToken,
    ) -> Result<ExtractedDocument, ExtractionError> {
        if cancel.is_cancelled() {
            return Err(ExtractionError::Cancelled);
        }

        let timeout = self.effective_timeout(cancel);
        let body = ProcessRequest {
            raw_document_uri: document_uri,
            mime_type,
        };

        let response = self
            .client
            .post(self.process_url())
            .timeout(timeout)
            .json(&body)
            .send()
            .map_err(|e| {
                if e.is_connect() {
                    ExtractionError::Connection(self.base_url.clone())
                } else if e.is_timeout() {
                    ExtractionError::Timeout(timeout.as_secs())
                } else {
                    ExtractionError::HttpClient(e.to_string())
                }
            })?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().unwrap_or_default();
            return Err(ExtractionError::ServiceError {
                status: status.as_u16(),
                body,
            });
        }

        let parsed: ProcessResponse = response
            .json()
            .map_err(|e| ExtractionError::ResponseParsing(e.to_string()))?;

        tracing::debug!(
            entities = parsed.document.entities.len(),
            text_len = parsed.document.text.len(),
            "Extraction service responded"
        );
        Ok(parsed.document)
    }
}

/// Reads an already-extracted entity graph from local JSON files.
///
/// The document URI is a path (optionally `file://`), resolved against
/// `root` when relative. A URI naming the original document (`a.pdf`) reads
/// its sidecar graph `a.pdf.json`. Both a bare document and a
/// `{"document": ...}` service response are accepted.
pub struct FileDocumentExtractor {
    root: PathBuf,
}

impl FileDocumentExtractor {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    fn resolve(&self, document_uri: &str) -> PathBuf {
        let raw = document_uri.strip_prefix("file://").unwrap_or(document_uri);
        let path = Path::new(raw);
        let path = if path.is_absolute() {
            path.to_path_buf()
        } else {
            self.root.join(path)
        };
        if path.extension().is_some_and(|ext| ext.eq_ignore_ascii_case("json")) {
            path
        } else {
            let mut sidecar = path.into_os_string();
            sidecar.push(".json");
            PathBuf::from(sidecar)
        }
    }
}

impl DocumentExtractor for FileDocumentExtractor {
    fn extract_lab_report(
        &self,
        document_uri: &str,
        _mime_type: &str,
        cancel: &CancelToken,
    ) -> Result<ExtractedDocument, ExtractionError> {
        if cancel.is_cancelled() {
            return Err(ExtractionError::Cancelled);
        }

        let path = self.resolve(document_uri);
        let bytes = std::fs::read(&path)?;
        let mut value: serde_json::Value = serde_json::from_slice(&bytes)?;
        if let Some(inner) = value.get_mut("document").map(serde_json::Value::take) {
            value = inner;
        }
        Ok(serde_json::from_value(value)?)
    }
}

/// Mock extractor for testing: returns a configured graph or failure.
pub struct MockDocumentExtractor {
    document: ExtractedDocument,
    failure: Option<String>,
    calls: AtomicUsize,
}

impl MockDocumentExtractor {
    pub fn new(document: ExtractedDocument) -> Self {
        Self {
            document,
            failure: None,
            calls: AtomicUsize::new(0),
        }
    }

    /// Extractor whose every call fails with a service error.
    pub fn failing(body: &str) -> Self {
        Self {
            document: ExtractedDocument::default(),
            failure: Some(body.to_string()),
            calls: AtomicUsize::new(0),
        }
    }

    pub fn call_count(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }
}

impl DocumentExtractor for MockDocumentExtractor {
    fn extract_lab_report(
        &self,
        _document_uri: &str,
        _mime_type: &str,
        _cancel: &CancelToken,
    ) -> Result<ExtractedDocument, ExtractionError> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        match &self.failure {
            Some(body) => Err(ExtractionError::ServiceError {
                status: 503,
                body: body.clone(),
            }),
            None => Ok(self.document.clone()),
        }
    }
}
