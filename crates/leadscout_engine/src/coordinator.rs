//! Long-lived owner of the poller state. Clients talk to it only through
//! [`CoordinatorHandle`], which carries typed [`Request`]s over a channel.

use std::sync::Arc;

use leadscout_core::{
    update, AckStatus, Contact, Effect, JobId, Msg, PollerSettings, PollerState, Request, Response,
    StatusSnapshot, Task, TaskResult,
};
use scout_logging::{scout_debug, scout_error, scout_info, scout_warn};
use tokio::sync::{mpsc, oneshot};
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;
use url::Url;

use crate::backend::TaskBackend;
use crate::executor::TaskExecutor;
use crate::extract::{ContactExtractor, ExtractionSettings};
use crate::page::{Navigator, SearchPage};
use crate::relay::ContactSink;
use crate::session::ScrapeSession;
use crate::store::PendingStore;
use crate::DeliveryError;

const COMMAND_CAPACITY: usize = 64;

#[derive(Debug, Clone)]
pub struct CoordinatorSettings {
    pub poller: PollerSettings,
    pub search_base: Url,
    pub extraction: ExtractionSettings,
}

enum Command {
    Request {
        request: Request,
        reply: oneshot::Sender<Response>,
    },
    Shutdown,
}

enum Internal {
    Msg(Msg),
    TabOpened {
        task: Task,
        page: Arc<dyn SearchPage>,
    },
}

#[derive(Clone)]
pub struct CoordinatorHandle {
    cmd_tx: mpsc::Sender<Command>,
}

impl CoordinatorHandle {
    pub async fn request(&self, request: Request) -> Result<Response, DeliveryError> {
        let (reply, response) = oneshot::channel();
        self.cmd_tx
            .send(Command::Request { request, reply })
            .await
            .map_err(|_| DeliveryError::ChannelClosed)?;
        response.await.map_err(|_| DeliveryError::ChannelClosed)
    }

    pub async fn start(&self) -> Result<Response, DeliveryError> {
        self.request(Request::StartPolling).await
    }

    pub async fn stop(&self) -> Result<Response, DeliveryError> {
        self.request(Request::StopPolling).await
    }

    pub async fn status(&self) -> Result<StatusSnapshot, DeliveryError> {
        match self.request(Request::GetStatus).await? {
            Response::Status(snapshot) => Ok(snapshot),
            Response::Ack(_) => Ok(StatusSnapshot::default()),
        }
    }

    pub async fn trigger_scrape(&self) -> Result<Response, DeliveryError> {
        self.request(Request::TriggerScrape).await
    }

    /// Stops the coordinator loop. Later requests fail with `ChannelClosed`.
    pub async fn shutdown(&self) {
        let _ = self.cmd_tx.send(Command::Shutdown).await;
    }
}

#[async_trait::async_trait]
impl ContactSink for CoordinatorHandle {
    async fn deliver(
        &self,
        job_id: &JobId,
        contacts: Vec<Contact>,
    ) -> Result<Response, DeliveryError> {
        self.request(Request::ContactsScraped {
            contacts,
            job_id: Some(job_id.clone()),
        })
        .await
    }
}

pub struct Coordinator;

impl Coordinator {
    /// Spawns the coordinator on the current tokio runtime. Parked results
    /// from earlier runs are resubmitted first.
    pub fn spawn(
        settings: CoordinatorSettings,
        backend: Arc<dyn TaskBackend>,
        navigator: Arc<dyn Navigator>,
        store: PendingStore,
    ) -> (CoordinatorHandle, JoinHandle<()>) {
        let (cmd_tx, cmd_rx) = mpsc::channel(COMMAND_CAPACITY);
        let (internal_tx, internal_rx) = mpsc::unbounded_channel();

        let task = CoordinatorTask {
            state: PollerState::new(settings.poller),
            backend,
            executor: TaskExecutor::new(settings.search_base, navigator),
            extractor: Arc::new(ContactExtractor::new(settings.extraction)),
            store,
            self_tx: cmd_tx.downgrade(),
            internal_tx,
            scheduled_poll: None,
            active: None,
        };
        let join = tokio::spawn(task.run(cmd_rx, internal_rx));

        (CoordinatorHandle { cmd_tx }, join)
    }
}

struct ActivePage {
    task: Task,
    page: Arc<dyn SearchPage>,
    cancel: CancellationToken,
}

struct CoordinatorTask {
    state: PollerState,
    backend: Arc<dyn TaskBackend>,
    executor: TaskExecutor,
    extractor: Arc<ContactExtractor>,
    store: PendingStore,
    self_tx: mpsc::WeakSender<Command>,
    internal_tx: mpsc::UnboundedSender<Internal>,
    scheduled_poll: Option<CancellationToken>,
    active: Option<ActivePage>,
}

impl CoordinatorTask {
    async fn run(
        mut self,
        mut cmd_rx: mpsc::Receiver<Command>,
        mut internal_rx: mpsc::UnboundedReceiver<Internal>,
    ) {
        self.resubmit_parked();
        loop {
            tokio::select! {
                command = cmd_rx.recv() => match command {
                    Some(Command::Request { request, reply }) => self.handle_request(request, reply),
                    Some(Command::Shutdown) | None => break,
                },
                Some(event) = internal_rx.recv() => self.handle_internal(event),
            }
        }
        self.cancel_scheduled_poll();
        scout_info!("Coordinator stopped");
    }

    fn handle_request(&mut self, request: Request, reply: oneshot::Sender<Response>) {
        scout_debug!("Request received: {:?}", request);
        let response = match request {
            Request::StartPolling => {
                self.apply(Msg::StartPolling);
                Response::ack(AckStatus::Started)
            }
            Request::StopPolling => {
                self.apply(Msg::StopPolling);
                Response::ack(AckStatus::Stopped)
            }
            Request::GetStatus => Response::Status(self.state.status()),
            Request::ContactsScraped { contacts, job_id } => {
                self.apply(Msg::ContactsScraped { job_id, contacts });
                Response::ack(AckStatus::Submitted)
            }
            Request::TriggerScrape => {
                self.trigger_scrape(reply);
                return;
            }
        };
        let _ = reply.send(response);
    }

    fn handle_internal(&mut self, event: Internal) {
        match event {
            Internal::Msg(msg) => self.apply(msg),
            Internal::TabOpened { task, page } => {
                if let Some(previous) = self.active.take() {
                    previous.cancel.cancel();
                }
                let cancel = CancellationToken::new();
                self.active = Some(ActivePage {
                    task: task.clone(),
                    page: page.clone(),
                    cancel: cancel.clone(),
                });
                if let Some(session) = self.session() {
                    tokio::spawn(async move {
                        session.run(page, task, cancel).await;
                    });
                }
            }
        }
    }

    fn apply(&mut self, msg: Msg) {
        let state = std::mem::take(&mut self.state);
        let (state, effects) = update(state, msg);
        self.state = state;
        for effect in effects {
            self.run_effect(effect);
        }
    }

    fn run_effect(&mut self, effect: Effect) {
        match effect {
            Effect::FetchNextTask => {
                let backend = self.backend.clone();
                let internal_tx = self.internal_tx.clone();
                tokio::spawn(async move {
                    let task = match backend.next_task().await {
                        Ok(task) => task,
                        Err(err) => {
                            scout_warn!("Failed to fetch task: {}", err);
                            None
                        }
                    };
                    let _ = internal_tx.send(Internal::Msg(Msg::TaskFetched(task)));
                });
            }
            Effect::SchedulePoll { generation, after } => {
                self.cancel_scheduled_poll();
                let token = CancellationToken::new();
                self.scheduled_poll = Some(token.clone());
                let internal_tx = self.internal_tx.clone();
                tokio::spawn(async move {
                    tokio::select! {
                        _ = token.cancelled() => {}
                        _ = tokio::time::sleep(after) => {
                            let _ = internal_tx.send(Internal::Msg(Msg::PollDue { generation }));
                        }
                    }
                });
            }
            Effect::CancelScheduledPoll => self.cancel_scheduled_poll(),
            Effect::DispatchTask(task) => {
                if let Some(previous) = self.active.take() {
                    scout_debug!(
                        "Releasing tab for job_id={}; job_id={} dispatched",
                        previous.task.job_id,
                        task.job_id
                    );
                    previous.cancel.cancel();
                }
                let executor = self.executor.clone();
                let internal_tx = self.internal_tx.clone();
                tokio::spawn(async move {
                    match executor.open(&task).await {
                        Ok(page) => {
                            let _ = internal_tx.send(Internal::TabOpened { task, page });
                        }
                        Err(err) => {
                            scout_error!("Failed to open tab for job_id={}: {}", task.job_id, err);
                        }
                    }
                });
            }
            Effect::SubmitResult(result) => {
                let backend = self.backend.clone();
                tokio::spawn(submit_result(backend, result));
            }
        }
    }

    fn cancel_scheduled_poll(&mut self) {
        if let Some(token) = self.scheduled_poll.take() {
            token.cancel();
        }
    }

    fn session(&self) -> Option<ScrapeSession> {
        let Some(cmd_tx) = self.self_tx.upgrade() else {
            scout_warn!("No coordinator handles left; scrape results cannot be delivered");
            return None;
        };
        let sink: Arc<dyn ContactSink> = Arc::new(CoordinatorHandle { cmd_tx });
        Some(ScrapeSession::new(
            self.extractor.clone(),
            sink,
            self.store.clone(),
        ))
    }

    fn trigger_scrape(&mut self, reply: oneshot::Sender<Response>) {
        let target = self.active.as_ref().map(|active| {
            (active.task.clone(), active.page.clone(), active.cancel.clone())
        });
        let (Some((task, page, cancel)), Some(session)) = (target, self.session()) else {
            scout_info!("Scrape requested but no search tab is open");
            let _ = reply.send(Response::scrape_complete(None));
            return;
        };
        tokio::spawn(async move {
            let count = session.scrape_once(page.as_ref(), &task, &cancel).await;
            let _ = reply.send(Response::scrape_complete(count));
        });
    }

    fn resubmit_parked(&self) {
        let batches = match self.store.take_all() {
            Ok(batches) => batches,
            Err(err) => {
                scout_warn!("Could not read parked results: {}", err);
                return;
            }
        };
        for batch in batches {
            let backend = self.backend.clone();
            let store = self.store.clone();
            tokio::spawn(async move {
                let result = TaskResult::new(batch.job_id.clone(), batch.contacts.clone());
                if let Err(err) = backend.complete_task(&result).await {
                    scout_warn!(
                        "Resubmitting parked result for job_id={} failed: {}",
                        batch.job_id,
                        err
                    );
                    if let Err(err) = store.append(batch) {
                        scout_error!("Failed to re-park result: {}", err);
                    }
                } else {
                    scout_info!("Resubmitted parked result for job_id={}", batch.job_id);
                }
            });
        }
    }
}

async fn submit_result(backend: Arc<dyn TaskBackend>, result: TaskResult) {
    match backend.complete_task(&result).await {
        Ok(ack) => scout_info!(
            "Result submitted for job_id={} status={:?} saved={:?}",
            result.job_id,
            result.status,
            ack.contacts_saved
        ),
        Err(err) => scout_error!(
            "Failed to submit result for job_id={}; result lost: {}",
            result.job_id,
            err
        ),
    }
}
