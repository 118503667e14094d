use std::collections::HashMap;
use std::fmt;
use std::time::Duration;

use serde::{Deserialize, Serialize};
use thiserror::Error;
use uuid::Uuid;

use crate::capabilities::{PickedImage, PreviewHandle, PreviewId, ValidatedUrl};
use crate::catalog;
use crate::image_processing;
use crate::{AppError, DEFAULT_TIMEOUT, MAX_TIMEOUT, MIN_TIMEOUT, USER_CAPTION};

#[derive(Serialize, Deserialize, Clone, Debug, PartialEq, Eq, Hash)]
pub struct MessageId(pub String);

impl MessageId {
    pub fn new(id: impl Into<String>) -> Self {
        Self(id.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }

    #[must_use]
    pub fn generate() -> Self {
        Self(Uuid::new_v4().to_string())
    }
}

impl fmt::Display for MessageId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// Explicit timestamp unit.
#[derive(Copy, Clone, Debug, Default, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
pub struct UnixTimeMs(pub u64);

impl UnixTimeMs {
    #[must_use]
    pub fn now() -> Self {
        Self(crate::get_current_time_ms())
    }
}

#[derive(Serialize, Deserialize, Clone, Copy, Debug, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum Role {
    User,
    Assistant,
}

/// How a placeholder was finalized.
#[derive(Serialize, Deserialize, Clone, Copy, Debug, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum SubmissionOutcome {
    Completed,
    Failed,
    TimedOut,
    NotConfigured,
}

#[derive(Serialize, Deserialize, Clone, Debug, PartialEq, Eq)]
pub struct Location {
    pub city: String,
    pub state_code: String,
}

impl Location {
    #[must_use]
    pub fn label(&self) -> String {
        format!("{}, {}", self.city, self.state_code)
    }
}

#[derive(Serialize, Deserialize, Clone, Debug, PartialEq, Eq)]
pub struct AttachedImage {
    pub preview: PreviewId,
    pub file_name: String,
}

#[derive(Serialize, Deserialize, Clone, Debug, PartialEq, Eq)]
pub struct Message {
    pub id: MessageId,
    pub role: Role,
    pub text: String,
    pub attached_image: Option<AttachedImage>,
    pub location: Option<Location>,
    pub pending: bool,
    pub outcome: Option<SubmissionOutcome>,
    pub timestamp: UnixTimeMs,
}

impl Message {
    #[must_use]
    pub fn user_submission(
        image: AttachedImage,
        location: Location,
        timestamp: UnixTimeMs,
    ) -> Self {
        Self {
            id: MessageId::generate(),
            role: Role::User,
            text: USER_CAPTION.to_string(),
            attached_image: Some(image),
            location: Some(location),
            pending: false,
            outcome: None,
            timestamp,
        }
    }

    #[must_use]
    pub fn placeholder(timestamp: UnixTimeMs) -> Self {
        Self {
            id: MessageId::generate(),
            role: Role::Assistant,
            text: String::new(),
            attached_image: None,
            location: None,
            pending: true,
            outcome: None,
            timestamp,
        }
    }
}

/// Append-only, newest-last. The only in-place change allowed is
/// finalizing a pending placeholder.
#[derive(Debug, Default)]
pub struct Transcript {
    messages: Vec<Message>,
    index: HashMap<MessageId, usize>,
}

impl Transcript {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Appends a submission and its placeholder in one step so the
    /// placeholder is never visible without the message it answers.
    pub fn push_pair(&mut self, user: Message, placeholder: Message) {
        self.push(user);
        self.push(placeholder);
    }

    fn push(&mut self, message: Message) {
        debug_assert!(!self.index.contains_key(&message.id));
        self.index.insert(message.id.clone(), self.messages.len());
        self.messages.push(message);
    }

    /// Returns false when the id is unknown or the message is already final.
    pub fn finalize(
        &mut self,
        id: &MessageId,
        text: impl Into<String>,
        outcome: SubmissionOutcome,
        at: UnixTimeMs,
    ) -> bool {
        let Some(&idx) = self.index.get(id) else {
            return false;
        };
        let message = &mut self.messages[idx];
        if !message.pending {
            return false;
        }

        message.text = text.into();
        message.pending = false;
        message.outcome = Some(outcome);
        message.timestamp = at;
        true
    }

    #[must_use]
    pub fn get(&self, id: &MessageId) -> Option<&Message> {
        self.index.get(id).map(|&idx| &self.messages[idx])
    }

    pub fn iter(&self) -> impl Iterator<Item = &Message> {
        self.messages.iter()
    }

    #[must_use]
    pub fn last(&self) -> Option<&Message> {
        self.messages.last()
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.messages.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.messages.is_empty()
    }

    #[must_use]
    pub fn pending_count(&self) -> usize {
        self.messages.iter().filter(|m| m.pending).count()
    }
}

#[derive(PartialEq, Eq)]
pub struct ImageFile {
    pub name: String,
    pub mime_type: String,
    pub bytes: Vec<u8>,
}

impl fmt::Debug for ImageFile {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ImageFile")
            .field("name", &self.name)
            .field("mime_type", &self.mime_type)
            .field("bytes", &self.bytes.len())
            .finish()
    }
}

#[derive(Debug, PartialEq, Eq)]
pub struct StagedImage {
    pub file: ImageFile,
    pub preview: PreviewHandle,
}

impl From<PickedImage> for StagedImage {
    fn from(picked: PickedImage) -> Self {
        let mime_type =
            image_processing::resolve_mime_type(&picked.bytes, picked.mime_type.as_deref());
        let name = image_processing::upload_file_name(&picked.name, &mime_type);
        Self {
            file: ImageFile {
                name,
                mime_type,
                bytes: picked.bytes,
            },
            preview: picked.preview,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Error)]
pub enum ValidationError {
    #[error("no photo selected")]
    MissingImage,
    #[error("city is empty")]
    MissingCity,
    #[error("state is empty")]
    MissingState,
    #[error("state code is not a US state")]
    UnknownState,
}

/// Everything a submission takes out of the draft.
#[derive(Debug)]
pub struct SubmissionDraft {
    pub file: ImageFile,
    pub preview: PreviewHandle,
    pub location: Location,
}

#[derive(Debug, Default)]
pub struct DraftForm {
    pub image: Option<StagedImage>,
    pub city: String,
    pub state_code: String,
}

impl DraftForm {
    pub fn validate(&self) -> Result<(), ValidationError> {
        if self.image.is_none() {
            return Err(ValidationError::MissingImage);
        }
        if self.city.trim().is_empty() {
            return Err(ValidationError::MissingCity);
        }
        if self.state_code.trim().is_empty() {
            return Err(ValidationError::MissingState);
        }
        if !catalog::is_valid_code(&self.state_code) {
            return Err(ValidationError::UnknownState);
        }
        Ok(())
    }

    #[must_use]
    pub fn is_valid(&self) -> bool {
        self.validate().is_ok()
    }

    /// Validates, then empties the draft and hands its contents over.
    /// On error the draft is left untouched.
    pub fn take_submission(&mut self) -> Result<SubmissionDraft, ValidationError> {
        self.validate()?;

        let staged = self.image.take().ok_or(ValidationError::MissingImage)?;
        let location = Location {
            city: std::mem::take(&mut self.city).trim().to_string(),
            state_code: std::mem::take(&mut self.state_code)
                .trim()
                .to_ascii_uppercase(),
        };

        Ok(SubmissionDraft {
            file: staged.file,
            preview: staged.preview,
            location,
        })
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct StateSelector {
    pub open: bool,
    pub search: String,
}

impl StateSelector {
    pub fn toggle(&mut self) {
        if self.open {
            self.close();
        } else {
            self.open = true;
        }
    }

    pub fn close(&mut self) {
        self.open = false;
        self.search.clear();
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct WebhookConfig {
    pub endpoint: ValidatedUrl,
    pub timeout: Duration,
}

impl WebhookConfig {
    #[must_use]
    pub fn new(endpoint: ValidatedUrl, timeout: Option<Duration>) -> Self {
        Self {
            endpoint,
            timeout: timeout
                .unwrap_or(DEFAULT_TIMEOUT)
                .clamp(MIN_TIMEOUT, MAX_TIMEOUT),
        }
    }
}

/// In-flight request keyed by its placeholder. Holds the preview until the
/// request settles.
#[derive(Debug)]
pub struct Submission {
    pub preview: PreviewHandle,
    pub started_at: UnixTimeMs,
}

#[derive(Debug)]
pub struct Model {
    pub draft: DraftForm,
    pub state_selector: StateSelector,
    pub transcript: Transcript,
    pub in_flight: HashMap<MessageId, Submission>,
    pub config: Result<WebhookConfig, AppError>,
    pub validation_error: Option<ValidationError>,
    pub error: Option<AppError>,
}

impl Default for Model {
    fn default() -> Self {
        Self {
            draft: DraftForm::default(),
            state_selector: StateSelector::default(),
            transcript: Transcript::new(),
            in_flight: HashMap::new(),
            config: Err(AppError::not_configured()),
            validation_error: None,
            error: None,
        }
    }
}

impl Model {
    pub fn set_error(&mut self, error: AppError) {
        self.error = Some(error);
    }

    pub fn clear_error(&mut self) {
        self.error = None;
    }

    #[must_use]
    pub fn is_configured(&self) -> bool {
        self.config.is_ok()
    }

    /// True while the draft or an in-flight submission still owns the preview.
    #[must_use]
    pub fn holds_preview(&self, id: &PreviewId) -> bool {
        let in_draft = self
            .draft
            .image
            .as_ref()
            .is_some_and(|staged| staged.preview.id() == id);

        in_draft
            || self
                .in_flight
                .values()
                .any(|s| s.preview.id() == id)
    }
}
