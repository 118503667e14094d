#![allow(dead_code)]

use crux_core::testing::AppTester;
use crux_core::Request;
use shared::capabilities::{
    ImagePickerOperation, ImageSource, PickedImage, PickerOutput, PreviewHandle, PreviewId,
    WebhookOperation,
};
use shared::{App, Effect, Event, Model};

pub const JPEG_BYTES: [u8; 8] = [0xFF, 0xD8, 0xFF, 0xE0, 0x00, 0x10, 0x4A, 0x46];
pub const ENDPOINT: &str = "https://hooks.example.com/webhook/recycle";

pub type Tester = AppTester<App, Effect>;

pub fn configured(app: &Tester) -> Model {
    let mut model = Model::default();
    app.update(
        Event::Configure {
            endpoint: Some(ENDPOINT.to_string()),
            timeout_ms: None,
        },
        &mut model,
    );
    model
}

/// Feeds capability callbacks back into the app and collects everything
/// they emit.
pub fn run_events(app: &Tester, model: &mut Model, events: Vec<Event>) -> Vec<Effect> {
    let mut effects = Vec::new();
    for event in events {
        let update = app.update(event, model);
        effects.extend(update.effects);
        let nested = update.events;
        effects.extend(run_events(app, model, nested));
    }
    effects
}

pub fn picker_requests(effects: Vec<Effect>) -> Vec<Request<ImagePickerOperation>> {
    effects
        .into_iter()
        .filter_map(|e| match e {
            Effect::ImagePicker(request) => Some(request),
            _ => None,
        })
        .collect()
}

pub fn released(effects: &[Effect]) -> Vec<PreviewId> {
    effects
        .iter()
        .filter_map(|e| match e {
            Effect::ImagePicker(request) => match &request.operation {
                ImagePickerOperation::Release { preview } => Some(preview.clone()),
                ImagePickerOperation::Pick { .. } => None,
            },
            _ => None,
        })
        .collect()
}

pub fn webhook_requests(effects: Vec<Effect>) -> Vec<Request<WebhookOperation>> {
    effects
        .into_iter()
        .filter_map(|e| match e {
            Effect::Webhook(request) => Some(request),
            _ => None,
        })
        .collect()
}

pub fn has_render(effects: &[Effect]) -> bool {
    effects.iter().any(|e| matches!(e, Effect::Render(_)))
}

/// Runs the pick flow with a shell that returns `preview`. Returns the
/// effects emitted while staging (including any release of an older
/// preview).
pub fn stage_image(app: &Tester, model: &mut Model, name: &str, preview: &str) -> Vec<Effect> {
    let update = app.update(
        Event::PickImageRequested {
            source: ImageSource::Camera,
        },
        model,
    );
    let mut request = picker_requests(update.effects)
        .into_iter()
        .next()
        .expect("pick request");
    assert!(matches!(
        request.operation,
        ImagePickerOperation::Pick {
            source: ImageSource::Camera,
            ..
        }
    ));

    let picked = PickedImage {
        name: name.to_string(),
        mime_type: Some("image/jpeg".to_string()),
        bytes: JPEG_BYTES.to_vec(),
        preview: PreviewHandle::new(PreviewId::new(preview)),
    };
    let update = app
        .resolve(&mut request, Ok(PickerOutput::Picked(picked)))
        .expect("pick resolves");

    run_events(app, model, update.events)
}

pub fn fill_location(app: &Tester, model: &mut Model, city: &str, state: &str) {
    app.update(Event::CityChanged(city.to_string()), model);
    app.update(Event::StateTyped(state.to_string()), model);
}
