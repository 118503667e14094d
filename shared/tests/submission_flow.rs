mod common;

use common::*;
use shared::capabilities::{PreviewId, WebhookError, WebhookOperation, WebhookResponse};
use shared::{
    Event, Model, Role, SubmissionOutcome, ValidationError, EMPTY_RESPONSE_FALLBACK,
    IMAGE_FIELD_NAME, USER_CAPTION, VALIDATION_MESSAGE,
};

fn ready_to_submit(app: &Tester) -> Model {
    let mut model = configured(app);
    stage_image(app, &mut model, "bottle.jpg", "preview-1");
    fill_location(app, &mut model, "  New York ", "ny");
    model
}

#[test]
fn valid_submit_appends_pair_before_request_resolves() {
    let app = Tester::default();
    let mut model = ready_to_submit(&app);

    let update = app.update(Event::Submit, &mut model);
    assert!(has_render(&update.effects));

    assert_eq!(model.transcript.len(), 2);
    let messages: Vec<_> = model.transcript.iter().collect();
    assert_eq!(messages[0].role, Role::User);
    assert_eq!(messages[0].text, USER_CAPTION);
    assert_eq!(
        messages[0].location.as_ref().map(shared::Location::label),
        Some("New York, NY".to_string())
    );
    assert_eq!(messages[1].role, Role::Assistant);
    assert!(messages[1].pending);

    // draft cleared right away
    assert!(model.draft.image.is_none());
    assert!(model.draft.city.is_empty());
    assert!(model.draft.state_code.is_empty());

    let requests = webhook_requests(update.effects);
    assert_eq!(requests.len(), 1);
    let WebhookOperation::Submit(request) = &requests[0].operation;
    assert_eq!(
        request.url,
        "https://hooks.example.com/webhook/recycle?city=New%20York&state=NY"
    );
    assert_eq!(request.field_name, IMAGE_FIELD_NAME);
    assert_eq!(request.file_name, "bottle.jpg");
    assert_eq!(request.mime_type, "image/jpeg");
    assert_eq!(request.image, JPEG_BYTES.to_vec());
    assert_eq!(request.timeout_ms, 30_000);

    let view = app.view(&model);
    assert!(view.is_submitting);
    assert_eq!(view.messages.len(), 2);
    assert_eq!(view.scroll_to, Some(messages[1].id.0.clone()));
    assert!(view.welcome.is_none());
}

#[test]
fn success_finalizes_placeholder_and_releases_preview_once() {
    let app = Tester::default();
    let mut model = ready_to_submit(&app);

    let update = app.update(Event::Submit, &mut model);
    assert!(released(&update.effects).is_empty(), "preview must outlive the request");
    let mut request = webhook_requests(update.effects).remove(0);

    let update = app
        .resolve(
            &mut request,
            Ok(WebhookResponse::new(200, "Rinse it and use the blue bin.")),
        )
        .expect("resolves");
    let effects = run_events(&app, &mut model, update.events);

    assert_eq!(released(&effects), vec![PreviewId::new("preview-1")]);
    assert!(has_render(&effects));

    let reply = model.transcript.last().unwrap();
    assert!(!reply.pending);
    assert_eq!(reply.text, "Rinse it and use the blue bin.");
    assert_eq!(reply.outcome, Some(SubmissionOutcome::Completed));
    assert!(model.in_flight.is_empty());

    let view = app.view(&model);
    assert!(!view.is_submitting);
    // the user bubble still names the file but its preview is gone
    let image = view.messages[0].image.as_ref().unwrap();
    assert_eq!(image.file_name, "bottle.jpg");
    assert_eq!(image.preview, None);
}

#[test]
fn empty_success_body_uses_fallback_text() {
    let app = Tester::default();
    let mut model = ready_to_submit(&app);

    let update = app.update(Event::Submit, &mut model);
    let mut request = webhook_requests(update.effects).remove(0);
    let update = app
        .resolve(&mut request, Ok(WebhookResponse::new(200, "")))
        .expect("resolves");
    let effects = run_events(&app, &mut model, update.events);

    assert_eq!(released(&effects).len(), 1);
    assert_eq!(model.transcript.last().unwrap().text, EMPTY_RESPONSE_FALLBACK);
}

#[test]
fn timeout_gets_timeout_message() {
    let app = Tester::default();
    let mut model = ready_to_submit(&app);

    let update = app.update(Event::Submit, &mut model);
    let mut request = webhook_requests(update.effects).remove(0);
    let update = app
        .resolve(&mut request, Err(WebhookError::Timeout { after_ms: 30_000 }))
        .expect("resolves");
    let effects = run_events(&app, &mut model, update.events);

    assert_eq!(released(&effects), vec![PreviewId::new("preview-1")]);
    let reply = model.transcript.last().unwrap();
    assert_eq!(reply.outcome, Some(SubmissionOutcome::TimedOut));
    assert!(reply.text.contains("timed out"));
    assert!(!reply.text.contains("Unable to connect"));
}

#[test]
fn network_failure_gets_connection_message() {
    let app = Tester::default();
    let mut model = ready_to_submit(&app);

    let update = app.update(Event::Submit, &mut model);
    let mut request = webhook_requests(update.effects).remove(0);
    let update = app
        .resolve(
            &mut request,
            Err(WebhookError::Network("connection refused".into())),
        )
        .expect("resolves");
    let effects = run_events(&app, &mut model, update.events);

    assert_eq!(released(&effects).len(), 1);
    let reply = model.transcript.last().unwrap();
    assert_eq!(reply.outcome, Some(SubmissionOutcome::Failed));
    assert!(reply.text.starts_with("Unable to connect"));
}

#[test]
fn server_error_reflects_status() {
    let app = Tester::default();
    let mut model = ready_to_submit(&app);

    let update = app.update(Event::Submit, &mut model);
    let mut request = webhook_requests(update.effects).remove(0);
    let update = app
        .resolve(&mut request, Ok(WebhookResponse::new(500, "stack trace")))
        .expect("resolves");
    let effects = run_events(&app, &mut model, update.events);

    assert_eq!(released(&effects).len(), 1);
    let reply = model.transcript.last().unwrap();
    assert_eq!(reply.outcome, Some(SubmissionOutcome::Failed));
    assert!(reply.text.contains("500"));
}

#[test]
fn empty_city_is_rejected_without_side_effects() {
    let app = Tester::default();
    let mut model = configured(&app);
    stage_image(&app, &mut model, "bottle.jpg", "preview-1");
    fill_location(&app, &mut model, "   ", "CA");

    let update = app.update(Event::Submit, &mut model);

    assert_eq!(model.transcript.len(), 0);
    assert!(webhook_requests(update.effects).is_empty());
    assert_eq!(model.validation_error, Some(ValidationError::MissingCity));
    // nothing taken out of the draft
    assert!(model.draft.image.is_some());
    assert_eq!(model.draft.state_code, "CA");

    let view = app.view(&model);
    assert_eq!(view.validation_error.as_deref(), Some(VALIDATION_MESSAGE));
    assert!(!view.draft.can_submit);
    assert!(view.welcome.is_some());
}

#[test]
fn missing_image_is_rejected() {
    let app = Tester::default();
    let mut model = configured(&app);
    fill_location(&app, &mut model, "Austin", "TX");

    let update = app.update(Event::Submit, &mut model);

    assert!(model.transcript.is_empty());
    assert!(webhook_requests(update.effects).is_empty());
    assert_eq!(model.validation_error, Some(ValidationError::MissingImage));
}

#[test]
fn unconfigured_endpoint_finalizes_without_request() {
    let app = Tester::default();
    let mut model = Model::default();
    stage_image(&app, &mut model, "bottle.jpg", "preview-1");
    fill_location(&app, &mut model, "Austin", "TX");

    let update = app.update(Event::Submit, &mut model);

    assert_eq!(released(&update.effects), vec![PreviewId::new("preview-1")]);
    assert!(webhook_requests(update.effects).is_empty());
    assert_eq!(model.transcript.len(), 2);
    let reply = model.transcript.last().unwrap();
    assert_eq!(reply.role, Role::Assistant);
    assert!(!reply.pending);
    assert_eq!(reply.outcome, Some(SubmissionOutcome::NotConfigured));
    assert!(reply.text.contains("not configured"));
    assert!(model.in_flight.is_empty());
    assert!(!app.view(&model).is_configured);
}

#[test]
fn invalid_endpoint_counts_as_unconfigured() {
    let app = Tester::default();
    let mut model = Model::default();
    app.update(
        Event::Configure {
            endpoint: Some("ftp://example.com/hook".into()),
            timeout_ms: None,
        },
        &mut model,
    );
    assert!(!model.is_configured());

    stage_image(&app, &mut model, "bottle.jpg", "preview-1");
    fill_location(&app, &mut model, "Austin", "TX");
    let update = app.update(Event::Submit, &mut model);

    assert_eq!(released(&update.effects), vec![PreviewId::new("preview-1")]);
    assert!(webhook_requests(update.effects).is_empty());
    assert_eq!(
        model.transcript.last().unwrap().outcome,
        Some(SubmissionOutcome::NotConfigured)
    );
}

#[test]
fn configured_timeout_is_forwarded() {
    let app = Tester::default();
    let mut model = Model::default();
    app.update(
        Event::Configure {
            endpoint: Some(ENDPOINT.into()),
            timeout_ms: Some(60_000),
        },
        &mut model,
    );
    stage_image(&app, &mut model, "bottle.jpg", "preview-1");
    fill_location(&app, &mut model, "Austin", "TX");

    let update = app.update(Event::Submit, &mut model);
    let requests = webhook_requests(update.effects);
    let WebhookOperation::Submit(request) = &requests[0].operation;
    assert_eq!(request.timeout_ms, 60_000);
}

#[test]
fn concurrent_submissions_settle_independently() {
    let app = Tester::default();
    let mut model = configured(&app);

    stage_image(&app, &mut model, "can.jpg", "preview-a");
    fill_location(&app, &mut model, "Austin", "TX");
    let mut first = webhook_requests(app.update(Event::Submit, &mut model).effects).remove(0);

    stage_image(&app, &mut model, "box.jpg", "preview-b");
    fill_location(&app, &mut model, "Denver", "CO");
    let mut second = webhook_requests(app.update(Event::Submit, &mut model).effects).remove(0);

    assert_eq!(model.transcript.len(), 4);
    assert_eq!(model.transcript.pending_count(), 2);
    assert_eq!(model.in_flight.len(), 2);

    let update = app
        .resolve(&mut second, Ok(WebhookResponse::new(200, "Cardboard goes curbside.")))
        .expect("resolves");
    let effects = run_events(&app, &mut model, update.events);
    assert_eq!(released(&effects), vec![PreviewId::new("preview-b")]);

    let update = app
        .resolve(&mut first, Err(WebhookError::Timeout { after_ms: 30_000 }))
        .expect("resolves");
    let effects = run_events(&app, &mut model, update.events);
    assert_eq!(released(&effects), vec![PreviewId::new("preview-a")]);

    let texts: Vec<_> = model
        .transcript
        .iter()
        .filter(|m| m.role == Role::Assistant)
        .map(|m| (m.outcome, m.text.clone()))
        .collect();
    assert_eq!(texts[0].0, Some(SubmissionOutcome::TimedOut));
    assert_eq!(
        texts[1],
        (
            Some(SubmissionOutcome::Completed),
            "Cardboard goes curbside.".to_string()
        )
    );
    assert_eq!(model.transcript.pending_count(), 0);
}

#[test]
fn duplicate_settlement_is_ignored() {
    let app = Tester::default();
    let mut model = ready_to_submit(&app);

    app.update(Event::Submit, &mut model);
    let placeholder = model.transcript.last().unwrap().id.clone();

    let effects = run_events(
        &app,
        &mut model,
        vec![Event::WebhookSettled {
            placeholder: placeholder.clone(),
            result: Box::new(Ok(WebhookResponse::new(200, "first"))),
        }],
    );
    assert_eq!(released(&effects).len(), 1);

    let effects = run_events(
        &app,
        &mut model,
        vec![Event::WebhookSettled {
            placeholder,
            result: Box::new(Ok(WebhookResponse::new(200, "second"))),
        }],
    );
    assert!(released(&effects).is_empty());
    assert_eq!(model.transcript.last().unwrap().text, "first");
}
