// lib.rs - GreenVision shared core

#![forbid(unsafe_code)]
#![deny(clippy::all)]
#![warn(clippy::pedantic)]
#![allow(clippy::module_name_repetitions)]
#![allow(clippy::too_many_lines)]

pub mod capabilities;
pub mod catalog;
pub mod event;
pub mod image_processing;
pub mod model;

use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::time::Duration;

pub use app::App;
pub use capabilities::{Capabilities, Effect};
pub use crux_core::{render::Render, App as CruxApp};
pub use event::Event;
pub use model::{
    AttachedImage, DraftForm, ImageFile, Location, Message, MessageId, Model, Role,
    StagedImage, StateSelector, SubmissionOutcome, Transcript, UnixTimeMs, ValidationError,
    WebhookConfig,
};

pub const DEFAULT_TIMEOUT: Duration = Duration::from_secs(30);
pub const MIN_TIMEOUT: Duration = Duration::from_secs(1);
pub const MAX_TIMEOUT: Duration = Duration::from_secs(300);

/// Multipart field the webhook reads the photo from.
pub const IMAGE_FIELD_NAME: &str = "image";
pub const CITY_QUERY_PARAM: &str = "city";
pub const STATE_QUERY_PARAM: &str = "state";

pub const USER_CAPTION: &str = "Find recycling options for this item";
pub const EMPTY_RESPONSE_FALLBACK: &str =
    "No recycling options found. Try a different item or location.";
pub const VALIDATION_MESSAGE: &str = "Please add a photo and enter your city and state.";
pub const UNKNOWN_STATE_MESSAGE: &str = "Please choose a valid US state.";
pub const WELCOME_MESSAGE: &str = "Hi there! I'm GreenVision, your smart recycling assistant.\n\n\
Take a photo of any item, enter your location, and I'll identify the best recycling options near you.";

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum ErrorKind {
    Validation,
    Configuration,
    Timeout,
    Network,
    Server,
    ImagePicker,
    PickerPermissionDenied,
    PickerUnavailable,
    Unknown,
}

impl ErrorKind {
    #[must_use]
    pub const fn code(self) -> &'static str {
        match self {
            Self::Validation => "VALIDATION_ERROR",
            Self::Configuration => "CONFIGURATION_ERROR",
            Self::Timeout => "TIMEOUT",
            Self::Network => "NETWORK_ERROR",
            Self::Server => "SERVER_ERROR",
            Self::ImagePicker => "IMAGE_PICKER_ERROR",
            Self::PickerPermissionDenied => "PICKER_PERMISSION_DENIED",
            Self::PickerUnavailable => "PICKER_UNAVAILABLE",
            Self::Unknown => "UNKNOWN_ERROR",
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct AppError {
    pub kind: ErrorKind,
    pub message: String,
    pub internal_message: Option<String>,
    pub context: HashMap<String, String>,
}

impl AppError {
    #[must_use]
    pub fn new(kind: ErrorKind, message: impl Into<String>) -> Self {
        Self {
            kind,
            message: message.into(),
            internal_message: None,
            context: HashMap::new(),
        }
    }

    #[must_use]
    pub fn not_configured() -> Self {
        Self::new(ErrorKind::Configuration, "Webhook URL not configured")
    }

    #[must_use]
    pub fn with_internal(mut self, internal: impl Into<String>) -> Self {
        self.internal_message = Some(internal.into());
        self
    }

    #[must_use]
    pub fn with_context(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.context.insert(key.into(), value.into());
        self
    }

    #[must_use]
    pub const fn code(&self) -> &'static str {
        self.kind.code()
    }

    #[must_use]
    pub fn user_facing_message(&self) -> String {
        match self.kind {
            ErrorKind::Validation => self.message.clone(),
            ErrorKind::Configuration => {
                "The recycling service is not configured. Please contact support.".into()
            }
            ErrorKind::Timeout => {
                "Request timed out. The server took too long to respond. Please try again.".into()
            }
            ErrorKind::Network => {
                "Unable to connect to the recycling service. Please check your internet connection."
                    .into()
            }
            ErrorKind::Server => match self.context.get("http_status") {
                Some(status) => format!(
                    "The recycling service responded with status {status}. Please try again."
                ),
                None => "The recycling service returned an error. Please try again.".into(),
            },
            ErrorKind::ImagePicker => {
                "Unable to load that photo. Please try a different one.".into()
            }
            ErrorKind::PickerPermissionDenied => {
                "Camera or photo access is required. Please enable it in Settings.".into()
            }
            ErrorKind::PickerUnavailable => {
                "No camera or photo library is available on this device.".into()
            }
            ErrorKind::Unknown => "Something went wrong. Please try again.".into(),
        }
    }

    #[must_use]
    pub fn from_http_status(status: u16) -> Self {
        Self::new(ErrorKind::Server, format!("Server responded with status {status}"))
            .with_context("http_status", status.to_string())
    }
}

impl std::fmt::Display for AppError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "[{}] {}", self.code(), self.message)?;
        if let Some(internal) = &self.internal_message {
            write!(f, " (internal: {internal})")?;
        }
        Ok(())
    }
}

impl std::error::Error for AppError {}

pub type AppResult<T> = Result<T, AppError>;

impl From<capabilities::WebhookError> for AppError {
    fn from(e: capabilities::WebhookError) -> Self {
        use capabilities::WebhookError;
        match e {
            WebhookError::Timeout { after_ms } => {
                AppError::new(ErrorKind::Timeout, "Request timed out")
                    .with_context("timeout_ms", after_ms.to_string())
            }
            WebhookError::Network(msg) => {
                AppError::new(ErrorKind::Network, "Network error").with_internal(msg)
            }
            WebhookError::Other(msg) => {
                AppError::new(ErrorKind::Unknown, "Request failed").with_internal(msg)
            }
        }
    }
}

impl From<capabilities::PickerError> for AppError {
    fn from(e: capabilities::PickerError) -> Self {
        use capabilities::PickerError;
        match e {
            PickerError::PermissionDenied => {
                AppError::new(ErrorKind::PickerPermissionDenied, "Picker permission denied")
            }
            PickerError::Unavailable => {
                AppError::new(ErrorKind::PickerUnavailable, "Picker unavailable")
            }
            PickerError::Failed(msg) => {
                AppError::new(ErrorKind::ImagePicker, "Image pick failed").with_internal(msg)
            }
        }
    }
}

impl From<capabilities::UrlError> for AppError {
    fn from(e: capabilities::UrlError) -> Self {
        AppError::new(ErrorKind::Configuration, "Webhook URL is invalid").with_internal(e.to_string())
    }
}

#[must_use]
pub fn get_current_time_ms() -> u64 {
    std::time::SystemTime::now()
        .duration_since(std::time::UNIX_EPOCH)
        .map(|d| u64::try_from(d.as_millis()).unwrap_or(u64::MAX))
        .unwrap_or(0)
}

#[derive(Clone, Debug, Serialize, Deserialize, PartialEq)]
pub struct AttachedImageView {
    pub file_name: String,
    /// Only set while the preview handle is still held.
    pub preview: Option<String>,
}

#[derive(Clone, Debug, Serialize, Deserialize, PartialEq)]
pub struct MessageView {
    pub id: String,
    pub role: Role,
    pub text: String,
    pub pending: bool,
    pub outcome: Option<SubmissionOutcome>,
    pub image: Option<AttachedImageView>,
    pub location_label: Option<String>,
    pub timestamp_ms: u64,
}

#[derive(Clone, Debug, Serialize, Deserialize, PartialEq)]
pub struct StateOption {
    pub code: String,
    pub name: String,
    pub selected: bool,
}

#[derive(Clone, Debug, Default, Serialize, Deserialize, PartialEq)]
pub struct StateSelectorView {
    pub open: bool,
    pub search: String,
    pub options: Vec<StateOption>,
    pub no_matches: bool,
}

#[derive(Clone, Debug, Default, Serialize, Deserialize, PartialEq)]
pub struct DraftView {
    pub image_name: Option<String>,
    pub image_preview: Option<String>,
    pub city: String,
    pub state_code: String,
    pub state_name: Option<String>,
    pub can_submit: bool,
}

#[derive(Clone, Debug, Serialize, Deserialize, PartialEq)]
pub struct UserFacingError {
    pub message: String,
    pub error_code: String,
}

impl From<&AppError> for UserFacingError {
    fn from(e: &AppError) -> Self {
        Self {
            message: e.user_facing_message(),
            error_code: e.code().to_string(),
        }
    }
}

#[derive(Clone, Debug, Default, Serialize, Deserialize, PartialEq)]
pub struct ViewModel {
    pub messages: Vec<MessageView>,
    /// Shown instead of the transcript while it is empty.
    pub welcome: Option<String>,
    /// Newest message; shells scroll it into view whenever it changes.
    pub scroll_to: Option<String>,
    pub draft: DraftView,
    pub state_selector: StateSelectorView,
    pub validation_error: Option<String>,
    pub error: Option<UserFacingError>,
    pub is_submitting: bool,
    pub is_configured: bool,
}

pub mod app {
    use super::*;
    use crate::capabilities::{
        ImagePicker, PickerOutput, PickerResult, Webhook, WebhookRequest, WebhookResult,
    };
    use crate::model::{Submission, SubmissionDraft};
    use tracing::{debug, info, warn};

    #[derive(Default)]
    pub struct App;

    impl App {
        fn configure(endpoint: Option<&str>, timeout_ms: Option<u64>) -> AppResult<WebhookConfig> {
            let raw = endpoint
                .map(str::trim)
                .filter(|s| !s.is_empty())
                .ok_or_else(AppError::not_configured)?;

            let endpoint = capabilities::ValidatedUrl::new(raw)?;
            Ok(WebhookConfig::new(
                endpoint,
                timeout_ms.map(Duration::from_millis),
            ))
        }

        fn build_request(config: &WebhookConfig, submission: &mut SubmissionDraft) -> WebhookRequest {
            let location = &submission.location;
            let url = config.endpoint.with_query(&[
                (CITY_QUERY_PARAM, location.city.as_str()),
                (STATE_QUERY_PARAM, location.state_code.as_str()),
            ]);

            WebhookRequest {
                url,
                field_name: IMAGE_FIELD_NAME.to_string(),
                file_name: submission.file.name.clone(),
                mime_type: submission.file.mime_type.clone(),
                image: std::mem::take(&mut submission.file.bytes),
                timeout_ms: u64::try_from(config.timeout.as_millis()).unwrap_or(u64::MAX),
            }
        }

        fn handle_image_picked(
            result: PickerResult,
            model: &mut Model,
            picker: &ImagePicker<Event>,
        ) {
            match result {
                Ok(PickerOutput::Picked(picked)) => {
                    if let Some(previous) = model.draft.image.take() {
                        picker.release(previous.preview);
                    }

                    let staged = StagedImage::from(picked);
                    info!(
                        file = %staged.file.name,
                        mime_type = %staged.file.mime_type,
                        bytes = staged.file.bytes.len(),
                        "image staged"
                    );
                    model.draft.image = Some(staged);
                    model.validation_error = None;
                }
                Ok(PickerOutput::Cancelled) => {
                    debug!("image picker cancelled");
                }
                Err(e) => {
                    warn!(error = %e, "image picker failed");
                    model.set_error(e.into());
                }
            }
        }

        fn handle_submit(
            model: &mut Model,
            webhook: &Webhook<Event>,
            picker: &ImagePicker<Event>,
        ) {
            let mut submission = match model.draft.take_submission() {
                Ok(s) => s,
                Err(e) => {
                    debug!(reason = %e, "submission rejected");
                    model.validation_error = Some(e);
                    return;
                }
            };

            model.validation_error = None;
            model.state_selector.close();

            let now = UnixTimeMs::now();
            let user = Message::user_submission(
                AttachedImage {
                    preview: submission.preview.id().clone(),
                    file_name: submission.file.name.clone(),
                },
                submission.location.clone(),
                now,
            );
            let placeholder = Message::placeholder(now);
            let placeholder_id = placeholder.id.clone();
            model.transcript.push_pair(user, placeholder);

            let config = match &model.config {
                Ok(config) => config,
                Err(e) => {
                    warn!(error = %e, "submission without a configured webhook");
                    model.transcript.finalize(
                        &placeholder_id,
                        e.user_facing_message(),
                        SubmissionOutcome::NotConfigured,
                        now,
                    );
                    picker.release(submission.preview);
                    return;
                }
            };

            let request = Self::build_request(config, &mut submission);
            info!(
                placeholder = %placeholder_id,
                city = %submission.location.city,
                state = %submission.location.state_code,
                bytes = request.image.len(),
                timeout_ms = request.timeout_ms,
                "submitting to webhook"
            );

            model.in_flight.insert(
                placeholder_id.clone(),
                Submission {
                    preview: submission.preview,
                    started_at: now,
                },
            );

            webhook.submit(request, move |result| Event::WebhookSettled {
                placeholder: placeholder_id,
                result: Box::new(result),
            });
        }

        /// Text and outcome for a settled request.
        pub(crate) fn settle(result: WebhookResult) -> (String, SubmissionOutcome) {
            match result {
                Ok(response) if response.is_success() => {
                    if response.body.trim().is_empty() {
                        (EMPTY_RESPONSE_FALLBACK.to_string(), SubmissionOutcome::Completed)
                    } else {
                        (response.body, SubmissionOutcome::Completed)
                    }
                }
                Ok(response) => (
                    AppError::from_http_status(response.status).user_facing_message(),
                    SubmissionOutcome::Failed,
                ),
                Err(e) => {
                    let error = AppError::from(e);
                    let outcome = if error.kind == ErrorKind::Timeout {
                        SubmissionOutcome::TimedOut
                    } else {
                        SubmissionOutcome::Failed
                    };
                    (error.user_facing_message(), outcome)
                }
            }
        }

        fn handle_webhook_settled(
            placeholder: &MessageId,
            result: WebhookResult,
            model: &mut Model,
            picker: &ImagePicker<Event>,
        ) {
            let Some(submission) = model.in_flight.remove(placeholder) else {
                warn!(placeholder = %placeholder, "settled request has no in-flight submission");
                return;
            };

            let now = UnixTimeMs::now();
            let status = result.as_ref().ok().map(|r| r.status);
            let (text, outcome) = Self::settle(result);

            info!(
                placeholder = %placeholder,
                ?outcome,
                ?status,
                elapsed_ms = now.0.saturating_sub(submission.started_at.0),
                "webhook settled"
            );

            if !model.transcript.finalize(placeholder, text, outcome, now) {
                warn!(placeholder = %placeholder, "placeholder already final");
            }

            picker.release(submission.preview);
        }

        fn build_message_views(model: &Model) -> Vec<MessageView> {
            model
                .transcript
                .iter()
                .map(|m| MessageView {
                    id: m.id.0.clone(),
                    role: m.role,
                    text: m.text.clone(),
                    pending: m.pending,
                    outcome: m.outcome,
                    image: m.attached_image.as_ref().map(|img| AttachedImageView {
                        file_name: img.file_name.clone(),
                        preview: model
                            .holds_preview(&img.preview)
                            .then(|| img.preview.0.clone()),
                    }),
                    location_label: m.location.as_ref().map(Location::label),
                    timestamp_ms: m.timestamp.0,
                })
                .collect()
        }

        fn build_state_selector(model: &Model) -> StateSelectorView {
            let selector = &model.state_selector;
            let options: Vec<StateOption> = if selector.open {
                catalog::filter_states(&selector.search)
                    .into_iter()
                    .map(|s| StateOption {
                        code: s.code.to_string(),
                        name: s.name.to_string(),
                        selected: s.code == model.draft.state_code,
                    })
                    .collect()
            } else {
                Vec::new()
            };

            StateSelectorView {
                open: selector.open,
                search: selector.search.clone(),
                no_matches: selector.open && options.is_empty(),
                options,
            }
        }
    }

    impl CruxApp for App {
        type Event = Event;
        type Model = Model;
        type ViewModel = ViewModel;
        type Capabilities = Capabilities;

        fn update(&self, event: Event, model: &mut Model, caps: &Capabilities) {
            debug!(event = event.name(), "update");

            match event {
                Event::Noop => return,

                Event::Configure {
                    endpoint,
                    timeout_ms,
                } => {
                    model.config = Self::configure(endpoint.as_deref(), timeout_ms);
                    match &model.config {
                        Ok(config) => info!(
                            host = config.endpoint.host(),
                            timeout_ms = u64::try_from(config.timeout.as_millis()).unwrap_or(u64::MAX),
                            "webhook configured"
                        ),
                        Err(e) => warn!(error = %e, "webhook not configured"),
                    }
                }

                Event::PickImageRequested { source } => {
                    caps.image_picker
                        .pick(source, |result| Event::ImagePicked(Box::new(result)));
                    return;
                }

                Event::ImagePicked(result) => {
                    Self::handle_image_picked(*result, model, &caps.image_picker);
                }

                Event::ClearImage => {
                    if let Some(staged) = model.draft.image.take() {
                        caps.image_picker.release(staged.preview);
                    }
                }

                Event::CityChanged(city) => {
                    model.draft.city = city;
                }

                Event::StateTyped(input) => {
                    model.draft.state_code = catalog::normalize_typed_code(&input);
                }

                Event::StateSelectorToggled => {
                    model.state_selector.toggle();
                }

                Event::StateSearchChanged(search) => {
                    model.state_selector.search = search;
                }

                Event::StateSelected(code) => {
                    match catalog::find(&code) {
                        Some(state) => model.draft.state_code = state.code.to_string(),
                        None => warn!(code = %code, "ignoring unknown state code"),
                    }
                    model.state_selector.close();
                }

                Event::StateSelectorDismissed => {
                    model.state_selector.close();
                }

                Event::Submit => {
                    Self::handle_submit(model, &caps.webhook, &caps.image_picker);
                }

                Event::DismissError => {
                    model.clear_error();
                }

                Event::WebhookSettled {
                    placeholder,
                    result,
                } => {
                    Self::handle_webhook_settled(&placeholder, *result, model, &caps.image_picker);
                }
            }

            caps.render.render();
        }

        fn view(&self, model: &Model) -> ViewModel {
            let draft = &model.draft;
            let state_name = catalog::find(&draft.state_code).map(|s| s.name.to_string());

            let validation_error = model.validation_error.map(|e| match e {
                ValidationError::UnknownState => UNKNOWN_STATE_MESSAGE.to_string(),
                _ => VALIDATION_MESSAGE.to_string(),
            });

            ViewModel {
                messages: Self::build_message_views(model),
                welcome: model
                    .transcript
                    .is_empty()
                    .then(|| WELCOME_MESSAGE.to_string()),
                scroll_to: model.transcript.last().map(|m| m.id.0.clone()),
                draft: DraftView {
                    image_name: draft.image.as_ref().map(|s| s.file.name.clone()),
                    image_preview: draft.image.as_ref().map(|s| s.preview.id().0.clone()),
                    city: draft.city.clone(),
                    state_code: draft.state_code.clone(),
                    state_name,
                    can_submit: draft.is_valid(),
                },
                state_selector: Self::build_state_selector(model),
                validation_error,
                error: model.error.as_ref().map(UserFacingError::from),
                is_submitting: !model.in_flight.is_empty(),
                is_configured: model.is_configured(),
            }
        }
    }
}
