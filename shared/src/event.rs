use serde::{Deserialize, Serialize};

use crate::capabilities::{ImageSource, PickerResult, WebhookResult};
use crate::model::MessageId;

#[derive(Serialize, Deserialize, Debug)]
pub enum Event {
    Noop,

    /// Sent once by the shell at startup with whatever it read from its
    /// environment.
    Configure {
        endpoint: Option<String>,
        timeout_ms: Option<u64>,
    },

    PickImageRequested {
        source: ImageSource,
    },
    ClearImage,

    CityChanged(String),
    StateTyped(String),
    StateSelectorToggled,
    StateSearchChanged(String),
    StateSelected(String),
    StateSelectorDismissed,

    Submit,
    DismissError,

    // Capability callbacks, never sent by a shell.
    #[serde(skip)]
    ImagePicked(Box<PickerResult>),
    #[serde(skip)]
    WebhookSettled {
        placeholder: MessageId,
        result: Box<WebhookResult>,
    },
}

impl Event {
    #[must_use]
    pub const fn name(&self) -> &'static str {
        match self {
            Self::Noop => "noop",
            Self::Configure { .. } => "configure",
            Self::PickImageRequested { .. } => "pick_image_requested",
            Self::ClearImage => "clear_image",
            Self::CityChanged(_) => "city_changed",
            Self::StateTyped(_) => "state_typed",
            Self::StateSelectorToggled => "state_selector_toggled",
            Self::StateSearchChanged(_) => "state_search_changed",
            Self::StateSelected(_) => "state_selected",
            Self::StateSelectorDismissed => "state_selector_dismissed",
            Self::Submit => "submit",
            Self::DismissError => "dismiss_error",
            Self::ImagePicked(_) => "image_picked",
            Self::WebhookSettled { .. } => "webhook_settled",
        }
    }
}

impl Default for Event {
    fn default() -> Self {
        Self::Noop
    }
}
