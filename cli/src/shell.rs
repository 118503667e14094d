//! Drives the core: feeds it events, performs the effects it asks for and
//! hands the results back.
//!
//! Webhook calls run on their own tasks and report back over a channel, so
//! renders and picker effects never wait behind a slow request. Callers
//! pull finished requests with [`Shell::next_settled`] and feed them in with
//! [`Shell::apply`].

use std::collections::{HashMap, VecDeque};
use std::io::Write;
use std::path::{Path, PathBuf};

use anyhow::Result;
use crux_core::{Core, Request};
use shared::capabilities::{
    ImagePickerOperation, ImageSource, PickedImage, PickerError, PickerOutput, PickerResult,
    WebhookOperation, WebhookResult,
};
use shared::{App, Effect, Event, ViewModel};
use tokio::sync::mpsc;
use tracing::{debug, info};

use crate::config::ShellConfig;
use crate::previews::PreviewRegistry;
use crate::render::Renderer;
use crate::webhook::WebhookExecutor;

/// A webhook call that has finished and waits to be resolved.
#[derive(Debug)]
pub struct Settled {
    id: u64,
    result: WebhookResult,
}

pub struct Shell<W: Write> {
    core: Core<Effect, App>,
    executor: WebhookExecutor,
    previews: PreviewRegistry,
    renderer: Renderer,
    /// File handed to the next picker request. A terminal has no camera, so
    /// both sources read from here.
    next_pick: Option<PathBuf>,
    in_flight: HashMap<u64, Request<WebhookOperation>>,
    next_request_id: u64,
    settled_tx: mpsc::UnboundedSender<Settled>,
    settled_rx: mpsc::UnboundedReceiver<Settled>,
    out: W,
}

impl<W: Write> Shell<W> {
    pub async fn new(config: &ShellConfig, executor: WebhookExecutor, out: W) -> Result<Self> {
        let (settled_tx, settled_rx) = mpsc::unbounded_channel();
        let mut shell = Self {
            core: Core::new::<shared::Capabilities>(),
            executor,
            previews: PreviewRegistry::default(),
            renderer: Renderer::default(),
            next_pick: None,
            in_flight: HashMap::new(),
            next_request_id: 0,
            settled_tx,
            settled_rx,
            out,
        };
        shell.dispatch(config.configure_event()).await?;
        Ok(shell)
    }

    /// Processes `event` and every effect it causes, except webhook calls,
    /// which are started and left running.
    pub async fn dispatch(&mut self, event: Event) -> Result<()> {
        debug!(event = event.name(), "dispatch");
        let effects = self.core.process_event(event);
        self.run(effects).await
    }

    pub async fn pick_file(&mut self, path: impl Into<PathBuf>) -> Result<()> {
        self.next_pick = Some(path.into());
        self.dispatch(Event::PickImageRequested {
            source: ImageSource::Library,
        })
        .await
    }

    pub fn has_pending(&self) -> bool {
        !self.in_flight.is_empty()
    }

    /// Waits for the next webhook call to finish. `None` when nothing is in
    /// flight. Cancel safe.
    pub async fn next_settled(&mut self) -> Option<Settled> {
        if self.in_flight.is_empty() {
            return None;
        }
        self.settled_rx.recv().await
    }

    pub async fn apply(&mut self, settled: Settled) -> Result<()> {
        let Some(mut request) = self.in_flight.remove(&settled.id) else {
            debug!(id = settled.id, "settled request is not in flight");
            return Ok(());
        };
        let effects = self.core.resolve(&mut request, settled.result);
        self.run(effects).await
    }

    /// Resolves webhook calls as they finish until none are left.
    pub async fn settle_all(&mut self) -> Result<()> {
        while let Some(settled) = self.next_settled().await {
            self.apply(settled).await?;
        }
        Ok(())
    }

    pub fn view(&self) -> ViewModel {
        self.core.view()
    }

    pub fn previews(&self) -> &PreviewRegistry {
        &self.previews
    }

    #[cfg(test)]
    pub fn output(&self) -> &W {
        &self.out
    }

    async fn run(&mut self, effects: Vec<Effect>) -> Result<()> {
        let mut queue = VecDeque::from(effects);

        while let Some(effect) = queue.pop_front() {
            match effect {
                Effect::Render(_) => {
                    let view = self.core.view();
                    self.renderer.render(&view, &mut self.out)?;
                }
                Effect::ImagePicker(mut request) => match request.operation.clone() {
                    ImagePickerOperation::Pick { source, accept } => {
                        let result = self.pick(source, &accept).await;
                        queue.extend(self.core.resolve(&mut request, result));
                    }
                    ImagePickerOperation::Release { preview } => {
                        self.previews.release(&preview);
                    }
                },
                Effect::Webhook(request) => self.start_webhook(request),
            }
        }

        Ok(())
    }

    fn start_webhook(&mut self, request: Request<WebhookOperation>) {
        let id = self.next_request_id;
        self.next_request_id += 1;

        let WebhookOperation::Submit(submit) = request.operation.clone();
        let executor = self.executor.clone();
        let tx = self.settled_tx.clone();
        self.in_flight.insert(id, request);
        debug!(id, in_flight = self.in_flight.len(), "webhook started");

        tokio::spawn(async move {
            let result = executor.execute(&submit).await;
            if tx.send(Settled { id, result }).is_err() {
                debug!(id, "shell gone before webhook settled");
            }
        });
    }

    async fn pick(&mut self, source: ImageSource, accept: &str) -> PickerResult {
        let Some(path) = self.next_pick.take() else {
            debug!(?source, "nothing to pick");
            return Ok(PickerOutput::Cancelled);
        };
        debug!(?source, accept, path = %path.display(), "picking file");

        let bytes = tokio::fs::read(&path).await.map_err(|e| match e.kind() {
            std::io::ErrorKind::PermissionDenied => PickerError::PermissionDenied,
            _ => PickerError::Failed(format!("{}: {e}", path.display())),
        })?;

        let name = file_name(&path);
        info!(file = %name, bytes = bytes.len(), "image read");
        Ok(PickerOutput::Picked(PickedImage {
            name,
            mime_type: None,
            bytes,
            preview: self.previews.create(&path),
        }))
    }
}

fn file_name(path: &Path) -> String {
    path.file_name()
        .map(|n| n.to_string_lossy().into_owned())
        .unwrap_or_default()
}
