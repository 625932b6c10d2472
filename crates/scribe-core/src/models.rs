//! Core data models for scribe.
//!
//! These types are shared across all scribe crates: the transient [`Job`]
//! handle, the durable content records whose lifecycle a job advances,
//! batches, and webhook registrations with their delivery audit trail.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::{json, Value as JsonValue};
use std::fmt;
use std::str::FromStr;
use uuid::Uuid;

use crate::error::{Error, Result};
use crate::events::WebhookEvent;

// =============================================================================
// JOB TYPES
// =============================================================================

/// Kind of work a job performs.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum JobKind {
    /// Resolve a video or PDF into text
    Extraction,
    /// Generate an AI summary of a completed transcript
    Summarization,
    /// Transcribe an uploaded audio file
    Transcription,
}

impl JobKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            JobKind::Extraction => "extraction",
            JobKind::Summarization => "summarization",
            JobKind::Transcription => "transcription",
        }
    }
}

impl fmt::Display for JobKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for JobKind {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        match s {
            "extraction" => Ok(JobKind::Extraction),
            "summarization" => Ok(JobKind::Summarization),
            "transcription" => Ok(JobKind::Transcription),
            other => Err(Error::InvalidInput(format!("unknown job kind: {other}"))),
        }
    }
}

/// What an extraction job resolves.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ExtractionTarget {
    #[default]
    Video,
    Pdf,
}

/// Payload carried by extraction jobs.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ExtractionPayload {
    #[serde(default)]
    pub target: ExtractionTarget,
}

/// A transient unit of queued work.
///
/// `id` is the id of the content record the job advances. The payload is
/// opaque to the queue and interpreted by the handler for `kind`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Job {
    pub id: Uuid,
    pub kind: JobKind,
    pub payload: JsonValue,
    pub created_at: DateTime<Utc>,
}

impl Job {
    pub fn new(kind: JobKind, id: Uuid, payload: JsonValue) -> Self {
        Self {
            id,
            kind,
            payload,
            created_at: Utc::now(),
        }
    }

    /// Extraction job for a video transcript.
    pub fn extract_video(id: Uuid) -> Self {
        Self::new(JobKind::Extraction, id, json!({ "target": "video" }))
    }

    /// Extraction job for an uploaded PDF.
    pub fn extract_pdf(id: Uuid) -> Self {
        Self::new(JobKind::Extraction, id, json!({ "target": "pdf" }))
    }

    pub fn summarize(id: Uuid) -> Self {
        Self::new(JobKind::Summarization, id, json!({}))
    }

    pub fn transcribe(id: Uuid) -> Self {
        Self::new(JobKind::Transcription, id, json!({}))
    }

    /// Decode the payload of an extraction job. Missing or null payloads mean video.
    pub fn extraction_payload(&self) -> Result<ExtractionPayload> {
        if self.payload.is_null() {
            return Ok(ExtractionPayload::default());
        }
        serde_json::from_value(self.payload.clone())
            .map_err(|e| Error::InvalidInput(format!("invalid extraction payload: {e}")))
    }
}

// =============================================================================
// CONTENT RECORD LIFECYCLE
// =============================================================================

/// Status of a content record.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ContentStatus {
    #[default]
    Pending,
    Processing,
    Completed,
    Failed,
}

impl ContentStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            ContentStatus::Pending => "pending",
            ContentStatus::Processing => "processing",
            ContentStatus::Completed => "completed",
            ContentStatus::Failed => "failed",
        }
    }

    pub fn is_terminal(&self) -> bool {
        matches!(self, ContentStatus::Completed | ContentStatus::Failed)
    }
}

impl fmt::Display for ContentStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for ContentStatus {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        match s {
            "pending" => Ok(ContentStatus::Pending),
            "processing" => Ok(ContentStatus::Processing),
            "completed" => Ok(ContentStatus::Completed),
            "failed" => Ok(ContentStatus::Failed),
            other => Err(Error::InvalidInput(format!("unknown status: {other}"))),
        }
    }
}

/// Lifecycle state shared by every content record kind.
///
/// The only reachable sequence is `pending -> processing -> {completed | failed}`;
/// every other move is rejected with [`Error::InvalidTransition`].
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RecordState {
    pub status: ContentStatus,
    pub error_message: Option<String>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
    pub completed_at: Option<DateTime<Utc>>,
}

impl Default for RecordState {
    fn default() -> Self {
        Self::new()
    }
}

impl RecordState {
    pub fn new() -> Self {
        let now = Utc::now();
        Self {
            status: ContentStatus::Pending,
            error_message: None,
            created_at: now,
            updated_at: now,
            completed_at: None,
        }
    }

    fn transition(&mut self, to: ContentStatus) -> Result<()> {
        let allowed = matches!(
            (self.status, to),
            (ContentStatus::Pending, ContentStatus::Processing)
                | (ContentStatus::Processing, ContentStatus::Completed)
                | (ContentStatus::Processing, ContentStatus::Failed)
        );
        if !allowed {
            return Err(Error::InvalidTransition {
                from: self.status.to_string(),
                to: to.to_string(),
            });
        }
        self.status = to;
        self.updated_at = Utc::now();
        Ok(())
    }

    pub fn begin_processing(&mut self) -> Result<()> {
        self.transition(ContentStatus::Processing)
    }

    pub fn complete(&mut self) -> Result<()> {
        self.transition(ContentStatus::Completed)?;
        self.error_message = None;
        self.completed_at = Some(self.updated_at);
        Ok(())
    }

    pub fn fail(&mut self, message: impl Into<String>) -> Result<()> {
        self.transition(ContentStatus::Failed)?;
        self.error_message = Some(message.into());
        self.completed_at = Some(self.updated_at);
        Ok(())
    }
}

/// The kinds of durable record a job can advance.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RecordKind {
    Transcript,
    Summary,
    AudioTranscription,
    PdfExtraction,
}

impl RecordKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            RecordKind::Transcript => "transcript",
            RecordKind::Summary => "summary",
            RecordKind::AudioTranscription => "audio_transcription",
            RecordKind::PdfExtraction => "pdf_extraction",
        }
    }

    pub fn completed_event(&self) -> WebhookEvent {
        match self {
            RecordKind::Transcript => WebhookEvent::TranscriptCompleted,
            RecordKind::Summary => WebhookEvent::SummaryCompleted,
            RecordKind::AudioTranscription => WebhookEvent::TranscriptionCompleted,
            RecordKind::PdfExtraction => WebhookEvent::PdfCompleted,
        }
    }

    pub fn failed_event(&self) -> WebhookEvent {
        match self {
            RecordKind::Transcript => WebhookEvent::TranscriptFailed,
            RecordKind::Summary => WebhookEvent::SummaryFailed,
            RecordKind::AudioTranscription => WebhookEvent::TranscriptionFailed,
            RecordKind::PdfExtraction => WebhookEvent::PdfFailed,
        }
    }
}

impl fmt::Display for RecordKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Common surface of all content records.
pub trait ContentRecord: Clone + Send + Sync + 'static {
    const KIND: RecordKind;

    fn id(&self) -> Uuid;

    /// Batch this record belongs to. Only transcripts are batched.
    fn batch_id(&self) -> Option<Uuid> {
        None
    }

    fn state(&self) -> &RecordState;
    fn state_mut(&mut self) -> &mut RecordState;

    /// Body placed under `data` in webhook payloads.
    fn event_data(&self) -> JsonValue;

    fn status(&self) -> ContentStatus {
        self.state().status
    }
}

// =============================================================================
// TRANSCRIPTS
// =============================================================================

/// How a transcript's text was obtained.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ExtractionMethod {
    ManualCaptions,
    AutoCaptions,
    AudioTranscription,
}

impl ExtractionMethod {
    pub fn as_str(&self) -> &'static str {
        match self {
            ExtractionMethod::ManualCaptions => "manual_captions",
            ExtractionMethod::AutoCaptions => "auto_captions",
            ExtractionMethod::AudioTranscription => "audio_transcription",
        }
    }
}

impl fmt::Display for ExtractionMethod {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for ExtractionMethod {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        match s {
            "manual_captions" => Ok(ExtractionMethod::ManualCaptions),
            "auto_captions" => Ok(ExtractionMethod::AutoCaptions),
            "audio_transcription" => Ok(ExtractionMethod::AudioTranscription),
            other => Err(Error::InvalidInput(format!(
                "unknown extraction method: {other}"
            ))),
        }
    }
}

/// A video transcript.
#[derive(Debug, Clone, Serialize)]
pub struct Transcript {
    pub id: Uuid,
    pub source_url: String,
    pub video_id: Option<String>,
    pub title: Option<String>,
    pub channel: Option<String>,
    pub duration_secs: Option<i32>,
    pub language: Option<String>,
    pub content: Option<String>,
    pub word_count: Option<i32>,
    pub method: Option<ExtractionMethod>,
    pub batch_id: Option<Uuid>,
    #[serde(flatten)]
    pub state: RecordState,
}

impl Transcript {
    pub fn new(source_url: impl Into<String>, batch_id: Option<Uuid>) -> Self {
        Self {
            id: Uuid::now_v7(),
            source_url: source_url.into(),
            video_id: None,
            title: None,
            channel: None,
            duration_secs: None,
            language: None,
            content: None,
            word_count: None,
            method: None,
            batch_id,
            state: RecordState::new(),
        }
    }
}

impl ContentRecord for Transcript {
    const KIND: RecordKind = RecordKind::Transcript;

    fn id(&self) -> Uuid {
        self.id
    }
    fn batch_id(&self) -> Option<Uuid> {
        self.batch_id
    }
    fn state(&self) -> &RecordState {
        &self.state
    }
    fn state_mut(&mut self) -> &mut RecordState {
        &mut self.state
    }

    fn event_data(&self) -> JsonValue {
        json!({
            "id": self.id,
            "source_url": self.source_url,
            "status": self.state.status,
            "title": self.title,
            "word_count": self.word_count,
            "method": self.method,
            "batch_id": self.batch_id,
            "error": self.state.error_message,
        })
    }
}

// =============================================================================
// SUMMARIES
// =============================================================================

/// Summary presentation style.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SummaryStyle {
    #[default]
    Brief,
    Detailed,
    Bullets,
}

impl SummaryStyle {
    pub fn as_str(&self) -> &'static str {
        match self {
            SummaryStyle::Brief => "brief",
            SummaryStyle::Detailed => "detailed",
            SummaryStyle::Bullets => "bullets",
        }
    }
}

impl FromStr for SummaryStyle {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        match s {
            "brief" => Ok(SummaryStyle::Brief),
            "detailed" => Ok(SummaryStyle::Detailed),
            "bullets" => Ok(SummaryStyle::Bullets),
            other => Err(Error::InvalidInput(format!("unknown summary style: {other}"))),
        }
    }
}

/// An AI summary of a completed transcript.
#[derive(Debug, Clone, Serialize)]
pub struct Summary {
    pub id: Uuid,
    pub transcript_id: Uuid,
    pub style: SummaryStyle,
    pub max_key_points: i32,
    pub content: Option<String>,
    pub key_points: Vec<String>,
    pub model: Option<String>,
    #[serde(flatten)]
    pub state: RecordState,
}

impl Summary {
    pub fn new(transcript_id: Uuid, style: SummaryStyle, max_key_points: i32) -> Self {
        Self {
            id: Uuid::now_v7(),
            transcript_id,
            style,
            max_key_points,
            content: None,
            key_points: Vec::new(),
            model: None,
            state: RecordState::new(),
        }
    }
}

impl ContentRecord for Summary {
    const KIND: RecordKind = RecordKind::Summary;

    fn id(&self) -> Uuid {
        self.id
    }
    fn state(&self) -> &RecordState {
        &self.state
    }
    fn state_mut(&mut self) -> &mut RecordState {
        &mut self.state
    }

    fn event_data(&self) -> JsonValue {
        json!({
            "id": self.id,
            "transcript_id": self.transcript_id,
            "status": self.state.status,
            "style": self.style,
            "key_points": self.key_points.len(),
            "model": self.model,
            "error": self.state.error_message,
        })
    }
}

// =============================================================================
// AUDIO TRANSCRIPTIONS
// =============================================================================

/// Transcription of an uploaded audio file.
#[derive(Debug, Clone, Serialize)]
pub struct AudioTranscription {
    pub id: Uuid,
    pub filename: String,
    pub mime_type: Option<String>,
    /// Staged upload path; removed once the job finishes.
    #[serde(skip_serializing)]
    pub file_path: String,
    pub size_bytes: i64,
    pub language_hint: Option<String>,
    pub content: Option<String>,
    pub language: Option<String>,
    pub duration_secs: Option<f64>,
    pub word_count: Option<i32>,
    pub model: Option<String>,
    #[serde(flatten)]
    pub state: RecordState,
}

impl AudioTranscription {
    pub fn new(
        filename: impl Into<String>,
        mime_type: Option<String>,
        file_path: impl Into<String>,
        size_bytes: i64,
        language_hint: Option<String>,
    ) -> Self {
        Self {
            id: Uuid::now_v7(),
            filename: filename.into(),
            mime_type,
            file_path: file_path.into(),
            size_bytes,
            language_hint,
            content: None,
            language: None,
            duration_secs: None,
            word_count: None,
            model: None,
            state: RecordState::new(),
        }
    }
}

impl ContentRecord for AudioTranscription {
    const KIND: RecordKind = RecordKind::AudioTranscription;

    fn id(&self) -> Uuid {
        self.id
    }
    fn state(&self) -> &RecordState {
        &self.state
    }
    fn state_mut(&mut self) -> &mut RecordState {
        &mut self.state
    }

    fn event_data(&self) -> JsonValue {
        json!({
            "id": self.id,
            "filename": self.filename,
            "status": self.state.status,
            "language": self.language,
            "duration_secs": self.duration_secs,
            "word_count": self.word_count,
            "error": self.state.error_message,
        })
    }
}

// =============================================================================
// PDF EXTRACTIONS
// =============================================================================

/// Text extracted from an uploaded PDF.
#[derive(Debug, Clone, Serialize)]
pub struct PdfExtraction {
    pub id: Uuid,
    pub filename: String,
    #[serde(skip_serializing)]
    pub file_path: String,
    pub size_bytes: i64,
    pub page_count: Option<i32>,
    pub title: Option<String>,
    pub content: Option<String>,
    pub word_count: Option<i32>,
    #[serde(flatten)]
    pub state: RecordState,
}

impl PdfExtraction {
    pub fn new(filename: impl Into<String>, file_path: impl Into<String>, size_bytes: i64) -> Self {
        Self {
            id: Uuid::now_v7(),
            filename: filename.into(),
            file_path: file_path.into(),
            size_bytes,
            page_count: None,
            title: None,
            content: None,
            word_count: None,
            state: RecordState::new(),
        }
    }
}

impl ContentRecord for PdfExtraction {
    const KIND: RecordKind = RecordKind::PdfExtraction;

    fn id(&self) -> Uuid {
        self.id
    }
    fn state(&self) -> &RecordState {
        &self.state
    }
    fn state_mut(&mut self) -> &mut RecordState {
        &mut self.state
    }

    fn event_data(&self) -> JsonValue {
        json!({
            "id": self.id,
            "filename": self.filename,
            "status": self.state.status,
            "page_count": self.page_count,
            "word_count": self.word_count,
            "error": self.state.error_message,
        })
    }
}

// =============================================================================
// BATCHES
// =============================================================================

/// Aggregate status of a batch.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum BatchStatus {
    #[default]
    Pending,
    Processing,
    /// Every member finished and at least one completed
    Completed,
    /// Every member finished and all of them failed
    Failed,
}

impl BatchStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            BatchStatus::Pending => "pending",
            BatchStatus::Processing => "processing",
            BatchStatus::Completed => "completed",
            BatchStatus::Failed => "failed",
        }
    }

    pub fn is_terminal(&self) -> bool {
        matches!(self, BatchStatus::Completed | BatchStatus::Failed)
    }
}

impl FromStr for BatchStatus {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        match s {
            "pending" => Ok(BatchStatus::Pending),
            "processing" => Ok(BatchStatus::Processing),
            "completed" => Ok(BatchStatus::Completed),
            "failed" => Ok(BatchStatus::Failed),
            other => Err(Error::InvalidInput(format!("unknown batch status: {other}"))),
        }
    }
}

/// Member status counts gathered by a full rescan of a batch.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct BatchCounts {
    pub pending: i32,
    pub processing: i32,
    pub completed: i32,
    pub failed: i32,
}

impl BatchCounts {
    pub fn total(&self) -> i32 {
        self.pending + self.processing + self.completed + self.failed
    }

    pub fn add(&mut self, status: ContentStatus, n: i32) {
        match status {
            ContentStatus::Pending => self.pending += n,
            ContentStatus::Processing => self.processing += n,
            ContentStatus::Completed => self.completed += n,
            ContentStatus::Failed => self.failed += n,
        }
    }

    pub fn status(&self) -> BatchStatus {
        let total = self.total();
        let finished = self.completed + self.failed;
        if total > 0 && finished == total {
            if self.completed > 0 {
                BatchStatus::Completed
            } else {
                BatchStatus::Failed
            }
        } else if finished > 0 || self.processing > 0 {
            BatchStatus::Processing
        } else {
            BatchStatus::Pending
        }
    }
}

/// A set of content records submitted together.
#[derive(Debug, Clone, Serialize)]
pub struct Batch {
    pub id: Uuid,
    pub total_count: i32,
    pub completed_count: i32,
    pub failed_count: i32,
    pub status: BatchStatus,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
    pub completed_at: Option<DateTime<Utc>>,
}

impl Batch {
    pub fn new(total_count: i32) -> Self {
        let now = Utc::now();
        Self {
            id: Uuid::now_v7(),
            total_count,
            completed_count: 0,
            failed_count: 0,
            status: BatchStatus::Pending,
            created_at: now,
            updated_at: now,
            completed_at: None,
        }
    }

    /// Replace the aggregate with freshly counted member states.
    ///
    /// Returns `true` only when this call moved the batch into a terminal
    /// status, so exactly one caller observes the transition.
    pub fn apply_counts(&mut self, counts: &BatchCounts) -> bool {
        let was_terminal = self.status.is_terminal();
        let total = counts.total();
        if total > 0 {
            self.total_count = total;
        }
        self.completed_count = counts.completed;
        self.failed_count = counts.failed;
        if !was_terminal {
            self.status = counts.status();
        }
        self.updated_at = Utc::now();

        let became_terminal = !was_terminal && self.status.is_terminal();
        if became_terminal {
            self.completed_at = Some(self.updated_at);
        }
        became_terminal
    }

    pub fn event_data(&self) -> JsonValue {
        json!({
            "id": self.id,
            "status": self.status,
            "total_count": self.total_count,
            "completed_count": self.completed_count,
            "failed_count": self.failed_count,
        })
    }
}

/// Result of a batch recount.
#[derive(Debug, Clone)]
pub struct BatchRecount {
    pub batch: Batch,
    pub became_terminal: bool,
}

// =============================================================================
// WEBHOOK TYPES
// =============================================================================

/// Webhook subscriber registration.
#[derive(Debug, Clone, Serialize)]
pub struct Webhook {
    pub id: Uuid,
    pub url: String,
    /// Subscribed event names. Empty means every event.
    pub events: Vec<String>,
    #[serde(skip_serializing)]
    pub secret: Option<String>,
    pub active: bool,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl Webhook {
    pub fn new(url: impl Into<String>, events: Vec<String>, secret: Option<String>) -> Self {
        let now = Utc::now();
        Self {
            id: Uuid::now_v7(),
            url: url.into(),
            events,
            secret,
            active: true,
            created_at: now,
            updated_at: now,
        }
    }

    pub fn subscribes_to(&self, event: &str) -> bool {
        self.events.is_empty() || self.events.iter().any(|e| e == event)
    }

    /// Secret used for signing, if any. Empty strings mean unsigned.
    pub fn signing_secret(&self) -> Option<&str> {
        self.secret.as_deref().filter(|s| !s.is_empty())
    }
}

/// Status of a webhook delivery.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum DeliveryStatus {
    #[default]
    Pending,
    Success,
    Failed,
}

impl DeliveryStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            DeliveryStatus::Pending => "pending",
            DeliveryStatus::Success => "success",
            DeliveryStatus::Failed => "failed",
        }
    }
}

impl FromStr for DeliveryStatus {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        match s {
            "pending" => Ok(DeliveryStatus::Pending),
            "success" => Ok(DeliveryStatus::Success),
            "failed" => Ok(DeliveryStatus::Failed),
            other => Err(Error::InvalidInput(format!(
                "unknown delivery status: {other}"
            ))),
        }
    }
}

/// Audit row for one event occurrence sent to one webhook.
#[derive(Debug, Clone, Serialize)]
pub struct WebhookDelivery {
    pub id: Uuid,
    pub webhook_id: Uuid,
    pub event: String,
    pub payload: JsonValue,
    pub status: DeliveryStatus,
    pub attempts: i32,
    pub last_error: Option<String>,
    pub response_code: Option<i32>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
    pub delivered_at: Option<DateTime<Utc>>,
}

impl WebhookDelivery {
    pub fn new(webhook_id: Uuid, event: impl Into<String>, payload: JsonValue) -> Self {
        let now = Utc::now();
        Self {
            id: Uuid::now_v7(),
            webhook_id,
            event: event.into(),
            payload,
            status: DeliveryStatus::Pending,
            attempts: 0,
            last_error: None,
            response_code: None,
            created_at: now,
            updated_at: now,
            delivered_at: None,
        }
    }

    pub fn record_success(&mut self, code: u16) {
        let now = Utc::now();
        self.attempts += 1;
        self.status = DeliveryStatus::Success;
        self.response_code = Some(i32::from(code));
        self.last_error = None;
        self.delivered_at = Some(now);
        self.updated_at = now;
    }

    /// Record a failed attempt. The row stays pending unless `exhausted`.
    pub fn record_failure(&mut self, error: impl Into<String>, code: Option<u16>, exhausted: bool) {
        self.attempts += 1;
        self.last_error = Some(error.into());
        self.response_code = code.map(i32::from);
        if exhausted {
            self.status = DeliveryStatus::Failed;
        }
        self.updated_at = Utc::now();
    }

    /// Abort without another attempt (shutdown or timeout).
    pub fn abort(&mut self, reason: impl Into<String>) {
        self.status = DeliveryStatus::Failed;
        self.last_error = Some(reason.into());
        self.updated_at = Utc::now();
    }
}

// =============================================================================
// REQUEST TYPES
// =============================================================================

/// Request to extract a video transcript.
///
/// Batch membership is fixed when a batch is created, so a single
/// transcript is always standalone.
#[derive(Debug, Clone, Deserialize)]
pub struct CreateTranscriptRequest {
    pub url: String,
}

/// Request to extract transcripts for several videos at once.
#[derive(Debug, Clone, Deserialize)]
pub struct CreateBatchRequest {
    pub urls: Vec<String>,
}

/// Request to summarize a transcript.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct CreateSummaryRequest {
    #[serde(default)]
    pub style: SummaryStyle,
    pub max_key_points: Option<i32>,
}

/// Request to register a webhook.
#[derive(Debug, Clone, Deserialize)]
pub struct CreateWebhookRequest {
    pub url: String,
    #[serde(default)]
    pub events: Vec<String>,
    pub secret: Option<String>,
}

/// Partial webhook update.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct UpdateWebhookRequest {
    pub url: Option<String>,
    pub events: Option<Vec<String>>,
    pub secret: Option<String>,
    pub active: Option<bool>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_job_kind_round_trips_through_str() {
        for kind in [
            JobKind::Extraction,
            JobKind::Summarization,
            JobKind::Transcription,
        ] {
            assert_eq!(kind.as_str().parse::<JobKind>().unwrap(), kind);
        }
        assert!("embedding".parse::<JobKind>().is_err());
    }

    #[test]
    fn test_extraction_payload_defaults_to_video() {
        let job = Job::new(JobKind::Extraction, Uuid::nil(), JsonValue::Null);
        assert_eq!(
            job.extraction_payload().unwrap().target,
            ExtractionTarget::Video
        );

        let job = Job::new(JobKind::Extraction, Uuid::nil(), json!({}));
        assert_eq!(
            job.extraction_payload().unwrap().target,
            ExtractionTarget::Video
        );

        let job = Job::extract_pdf(Uuid::nil());
        assert_eq!(
            job.extraction_payload().unwrap().target,
            ExtractionTarget::Pdf
        );
    }

    #[test]
    fn test_extraction_payload_rejects_unknown_target() {
        let job = Job::new(JobKind::Extraction, Uuid::nil(), json!({"target": "tape"}));
        assert!(matches!(
            job.extraction_payload(),
            Err(Error::InvalidInput(_))
        ));
    }

    #[test]
    fn test_record_state_happy_path() {
        let mut state = RecordState::new();
        assert_eq!(state.status, ContentStatus::Pending);
        state.begin_processing().unwrap();
        assert_eq!(state.status, ContentStatus::Processing);
        state.complete().unwrap();
        assert_eq!(state.status, ContentStatus::Completed);
        assert!(state.completed_at.is_some());
        assert!(state.error_message.is_none());
    }

    #[test]
    fn test_record_state_failure_records_message() {
        let mut state = RecordState::new();
        state.begin_processing().unwrap();
        state.fail("no captions").unwrap();
        assert_eq!(state.status, ContentStatus::Failed);
        assert_eq!(state.error_message.as_deref(), Some("no captions"));
    }

    #[test]
    fn test_record_state_rejects_skipping_processing() {
        let mut state = RecordState::new();
        assert!(matches!(
            state.complete(),
            Err(Error::InvalidTransition { .. })
        ));
        assert!(state.fail("x").is_err());
        assert_eq!(state.status, ContentStatus::Pending);
    }

    #[test]
    fn test_record_state_never_reenters_processing() {
        let mut state = RecordState::new();
        state.begin_processing().unwrap();
        assert!(state.begin_processing().is_err());
        state.complete().unwrap();
        assert!(state.begin_processing().is_err());
        assert!(state.fail("late").is_err());
        assert_eq!(state.status, ContentStatus::Completed);
    }

    #[test]
    fn test_record_kind_events() {
        assert_eq!(
            RecordKind::Transcript.completed_event().as_str(),
            "transcript.completed"
        );
        assert_eq!(
            RecordKind::AudioTranscription.failed_event().as_str(),
            "transcription.failed"
        );
        assert_eq!(
            RecordKind::PdfExtraction.completed_event().as_str(),
            "pdf.completed"
        );
    }

    #[test]
    fn test_transcript_serializes_flattened_state() {
        let t = Transcript::new("https://youtu.be/abc", None);
        let v = serde_json::to_value(&t).unwrap();
        assert_eq!(v["status"], "pending");
        assert_eq!(v["source_url"], "https://youtu.be/abc");
        assert!(v.get("state").is_none());
    }

    #[test]
    fn test_audio_file_path_not_serialized() {
        let a = AudioTranscription::new("talk.mp3", None, "/tmp/x.mp3", 10, None);
        let v = serde_json::to_value(&a).unwrap();
        assert!(v.get("file_path").is_none());
    }

    #[test]
    fn test_only_transcripts_belong_to_batches() {
        let batch = Batch::new(1);
        let t = Transcript::new("https://youtu.be/abc", Some(batch.id));
        assert_eq!(t.batch_id(), Some(batch.id));

        let s = Summary::new(t.id, SummaryStyle::Brief, 3);
        let a = AudioTranscription::new("talk.mp3", None, "/tmp/x.mp3", 10, None);
        let p = PdfExtraction::new("doc.pdf", "/tmp/x.pdf", 10);
        assert!(s.batch_id().is_none());
        assert!(a.batch_id().is_none());
        assert!(p.batch_id().is_none());
        assert!(serde_json::to_value(&s).unwrap().get("batch_id").is_none());
    }

    #[test]
    fn test_batch_counts_status() {
        let mut counts = BatchCounts::default();
        assert_eq!(counts.status(), BatchStatus::Pending);
        counts.add(ContentStatus::Pending, 2);
        assert_eq!(counts.status(), BatchStatus::Pending);

        let counts = BatchCounts {
            pending: 1,
            processing: 0,
            completed: 1,
            failed: 0,
        };
        assert_eq!(counts.status(), BatchStatus::Processing);

        let counts = BatchCounts {
            pending: 0,
            processing: 0,
            completed: 2,
            failed: 1,
        };
        assert_eq!(counts.status(), BatchStatus::Completed);

        let counts = BatchCounts {
            pending: 0,
            processing: 0,
            completed: 0,
            failed: 3,
        };
        assert_eq!(counts.status(), BatchStatus::Failed);
    }

    #[test]
    fn test_batch_apply_counts_reports_terminal_once() {
        let mut batch = Batch::new(3);
        let partial = BatchCounts {
            pending: 1,
            processing: 0,
            completed: 2,
            failed: 0,
        };
        assert!(!batch.apply_counts(&partial));
        assert_eq!(batch.status, BatchStatus::Processing);

        let done = BatchCounts {
            pending: 0,
            processing: 0,
            completed: 2,
            failed: 1,
        };
        assert!(batch.apply_counts(&done));
        assert_eq!(batch.completed_count, 2);
        assert_eq!(batch.failed_count, 1);
        assert!(batch.completed_at.is_some());

        // A second recount of the same state is not a new transition.
        assert!(!batch.apply_counts(&done));
        assert_eq!(batch.status, BatchStatus::Completed);
    }

    #[test]
    fn test_webhook_subscription_matching() {
        let all = Webhook::new("http://x", vec![], None);
        assert!(all.subscribes_to("transcript.completed"));

        let some = Webhook::new("http://x", vec!["batch.completed".into()], None);
        assert!(some.subscribes_to("batch.completed"));
        assert!(!some.subscribes_to("transcript.completed"));
    }

    #[test]
    fn test_webhook_empty_secret_is_unsigned() {
        let hook = Webhook::new("http://x", vec![], Some(String::new()));
        assert!(hook.signing_secret().is_none());
        let hook = Webhook::new("http://x", vec![], Some("s3cret".into()));
        assert_eq!(hook.signing_secret(), Some("s3cret"));
    }

    #[test]
    fn test_delivery_failure_stays_pending_until_exhausted() {
        let mut d = WebhookDelivery::new(Uuid::nil(), "transcript.completed", json!({}));
        d.record_failure("HTTP 500", Some(500), false);
        assert_eq!(d.status, DeliveryStatus::Pending);
        assert_eq!(d.attempts, 1);
        d.record_failure("HTTP 502", Some(502), true);
        assert_eq!(d.status, DeliveryStatus::Failed);
        assert_eq!(d.attempts, 2);
        assert_eq!(d.last_error.as_deref(), Some("HTTP 502"));
        assert_eq!(d.response_code, Some(502));
    }

    #[test]
    fn test_delivery_success_clears_error() {
        let mut d = WebhookDelivery::new(Uuid::nil(), "transcript.completed", json!({}));
        d.record_failure("HTTP 500", Some(500), false);
        d.record_success(204);
        assert_eq!(d.status, DeliveryStatus::Success);
        assert_eq!(d.attempts, 2);
        assert!(d.last_error.is_none());
        assert!(d.delivered_at.is_some());
    }

    #[test]
    fn test_create_summary_request_defaults() {
        let req: CreateSummaryRequest = serde_json::from_str("{}").unwrap();
        assert_eq!(req.style, SummaryStyle::Brief);
        assert!(req.max_key_points.is_none());
    }
}
