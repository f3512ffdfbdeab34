use std::sync::Arc;

use leadscout_core::Task;
use scout_logging::{scout_debug, scout_info};
use tokio_util::sync::CancellationToken;

use crate::extract::{ContactExtractor, Extraction};
use crate::page::SearchPage;
use crate::relay::{deliver_or_park, ContactSink, Delivery};
use crate::store::PendingStore;
use crate::watch::RevealWatcher;

/// Scrape lifecycle for one opened tab: settle, extract, deliver, then
/// optionally keep watching for reveals.
#[derive(Clone)]
pub struct ScrapeSession {
    extractor: Arc<ContactExtractor>,
    sink: Arc<dyn ContactSink>,
    store: PendingStore,
}

impl ScrapeSession {
    pub fn new(
        extractor: Arc<ContactExtractor>,
        sink: Arc<dyn ContactSink>,
        store: PendingStore,
    ) -> Self {
        Self {
            extractor,
            sink,
            store,
        }
    }

    /// Full run after navigation. Returns the number of contacts first reported.
    pub async fn run(
        &self,
        page: Arc<dyn SearchPage>,
        task: Task,
        cancel: CancellationToken,
    ) -> Option<usize> {
        tokio::select! {
            _ = cancel.cancelled() => return None,
            _ = tokio::time::sleep(self.extractor.settings().initial_delay()) => {}
        }

        let count = self.scrape_once(page.as_ref(), &task, &cancel).await?;

        if let Some(window) = self.extractor.settings().watch_window() {
            let settings = self.extractor.settings();
            let watcher = RevealWatcher::new(settings.watch_poll(), settings.watch_debounce(), window);
            let sink = self.sink.as_ref();
            let store = &self.store;
            let job_id = &task.job_id;
            watcher
                .watch(page.as_ref(), &self.extractor, &task, cancel, move |contacts| async move {
                    deliver_or_park(sink, store, job_id, contacts).await;
                })
                .await;
        }
        Some(count)
    }

    /// One extraction pass plus delivery. `None` when the tab is not on the
    /// results view or the session was cancelled before delivering.
    pub async fn scrape_once(
        &self,
        page: &dyn SearchPage,
        task: &Task,
        cancel: &CancellationToken,
    ) -> Option<usize> {
        let extraction = tokio::select! {
            _ = cancel.cancelled() => None,
            extraction = self.extractor.extract(page, task) => Some(extraction),
        };
        let Some(extraction) = extraction.filter(|_| !cancel.is_cancelled()) else {
            scout_debug!("Scrape for job_id={} cancelled; tab superseded", task.job_id);
            return None;
        };
        match extraction {
            Extraction::NotResultsPage { url } => {
                scout_debug!("Skipping delivery for job_id={}: tab at {}", task.job_id, url);
                None
            }
            Extraction::Contacts(contacts) => {
                let count = contacts.len();
                if let Delivery::Delivered(_) =
                    deliver_or_park(self.sink.as_ref(), &self.store, &task.job_id, contacts).await
                {
                    scout_info!("Found {} contact(s) with emails for {}", count, task.company);
                }
                Some(count)
            }
        }
    }
}
