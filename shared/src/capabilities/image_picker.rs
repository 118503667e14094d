use std::fmt;

use crux_core::capability::{CapabilityContext, Operation};
use serde::{Deserialize, Serialize};
use thiserror::Error;
use uuid::Uuid;

pub const ACCEPT_IMAGES: &str = "image/*";

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub enum ImageSource {
    /// Rear camera where the platform has one.
    #[default]
    Camera,
    Library,
}

#[derive(Serialize, Deserialize, Clone, Debug, PartialEq, Eq, Hash)]
pub struct PreviewId(pub String);

impl PreviewId {
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

impl fmt::Display for PreviewId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// Locally displayable image owned by the shell (object URL, temp file).
///
/// Not `Clone`. `ImagePicker::release` consumes it, so a handle can only be
/// given back once.
#[derive(Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct PreviewHandle {
    id: PreviewId,
}

impl PreviewHandle {
    pub fn new(id: PreviewId) -> Self {
        Self { id }
    }

    pub fn id(&self) -> &PreviewId {
        &self.id
    }

    fn into_id(self) -> PreviewId {
        self.id
    }
}

#[derive(PartialEq, Eq, Serialize, Deserialize)]
pub struct PickedImage {
    pub name: String,
    /// What the platform chooser reported, if anything.
    pub mime_type: Option<String>,
    #[serde(with = "serde_bytes")]
    pub bytes: Vec<u8>,
    pub preview: PreviewHandle,
}

impl fmt::Debug for PickedImage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("PickedImage")
            .field("name", &self.name)
            .field("mime_type", &self.mime_type)
            .field("bytes", &self.bytes.len())
            .field("preview", &self.preview)
            .finish()
    }
}

#[derive(Debug, PartialEq, Eq, Serialize, Deserialize)]
pub enum PickerOutput {
    Picked(PickedImage),
    Cancelled,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, Error)]
pub enum PickerError {
    #[error("permission to access the camera or photo library was denied")]
    PermissionDenied,
    #[error("no camera or photo library available")]
    Unavailable,
    #[error("image picker failed: {0}")]
    Failed(String),
}

pub type PickerResult = Result<PickerOutput, PickerError>;

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum ImagePickerOperation {
    Pick { source: ImageSource, accept: String },
    /// Fire-and-forget; the shell frees whatever backs the preview.
    Release { preview: PreviewId },
}

impl Operation for ImagePickerOperation {
    type Output = PickerResult;
}

#[derive(crux_core::macros::Capability)]
pub struct ImagePicker<Ev> {
    context: CapabilityContext<ImagePickerOperation, Ev>,
}

impl<Ev> ImagePicker<Ev>
where
    Ev: 'static,
{
    pub fn new(context: CapabilityContext<ImagePickerOperation, Ev>) -> Self {
        Self { context }
    }

    pub fn pick<F>(&self, source: ImageSource, callback: F)
    where
        F: FnOnce(PickerResult) -> Ev + Send + 'static,
    {
        let ctx = self.context.clone();
        self.context.spawn(async move {
            let result = ctx
                .request_from_shell(ImagePickerOperation::Pick {
                    source,
                    accept: ACCEPT_IMAGES.to_string(),
                })
                .await;
            ctx.update_app(callback(result));
        });
    }

    pub fn release(&self, preview: PreviewHandle) {
        let ctx = self.context.clone();
        let preview = preview.into_id();
        tracing::debug!(preview = %preview, "releasing image preview");
        self.context.spawn(async move {
            ctx.notify_shell(ImagePickerOperation::Release { preview })
                .await;
        });
    }
}
