mod image_picker;
mod webhook;

pub use self::image_picker::{
    ImagePicker, ImagePickerOperation, ImageSource, PickedImage, PickerError, PickerOutput,
    PickerResult, PreviewHandle, PreviewId, ACCEPT_IMAGES,
};
pub use self::webhook::{
    UrlError, ValidatedUrl, Webhook, WebhookError, WebhookOperation, WebhookRequest,
    WebhookResponse, WebhookResult, MAX_URL_LENGTH,
};

// Crux's built-in Render capability covers view updates.
pub use crux_core::render::Render;

use crate::app::App;
use crate::event::Event;

#[derive(crux_core::macros::Effect)]
#[effect(app = "App")]
pub struct Capabilities {
    pub render: Render<Event>,
    pub webhook: Webhook<Event>,
    pub image_picker: ImagePicker<Event>,
}
