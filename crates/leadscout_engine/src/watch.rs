use std::collections::BTreeSet;
use std::time::Duration;

use leadscout_core::{Contact, Task};
use scout_logging::{scout_debug, scout_info};
use tokio::time::Instant;
use tokio_util::sync::CancellationToken;

use crate::extract::{revealed_emails, ContactExtractor, Extraction};
use crate::page::SearchPage;

/// Fires once changes have been quiet for `delay`.
#[derive(Debug, Clone)]
pub struct Debounce {
    delay: Duration,
    last_change: Option<Instant>,
}

impl Debounce {
    pub fn new(delay: Duration) -> Self {
        Self {
            delay,
            last_change: None,
        }
    }

    /// Records an observation; returns true when the pending change should fire.
    pub fn observe(&mut self, changed: bool, now: Instant) -> bool {
        if changed {
            self.last_change = Some(now);
            return false;
        }
        match self.last_change {
            Some(at) if now.duration_since(at) >= self.delay => {
                self.last_change = None;
                true
            }
            _ => false,
        }
    }

    pub fn is_pending(&self) -> bool {
        self.last_change.is_some()
    }
}

/// Watches a page for newly revealed emails and re-runs passive extraction.
#[derive(Debug, Clone)]
pub struct RevealWatcher {
    poll: Duration,
    debounce: Duration,
    window: Duration,
}

impl RevealWatcher {
    pub fn new(poll: Duration, debounce: Duration, window: Duration) -> Self {
        Self {
            poll,
            debounce,
            window,
        }
    }

    /// Runs until the window closes or `cancel` fires. Each debounced burst of
    /// reveals yields one extraction passed to `on_contacts`.
    pub async fn watch<F, Fut>(
        &self,
        page: &dyn SearchPage,
        extractor: &ContactExtractor,
        task: &Task,
        cancel: CancellationToken,
        mut on_contacts: F,
    ) -> usize
    where
        F: FnMut(Vec<Contact>) -> Fut,
        Fut: std::future::Future<Output = ()>,
    {
        let profile = extractor.settings().profile;
        let deadline = Instant::now() + self.window;
        let mut debounce = Debounce::new(self.debounce);
        let mut seen: BTreeSet<String> = match page.snapshot_html().await {
            Ok(html) => revealed_emails(&html, profile),
            Err(_) => BTreeSet::new(),
        };
        let mut rounds = 0;

        scout_debug!("Watching job_id={} for reveals ({:?})", task.job_id, self.window);
        while Instant::now() < deadline {
            tokio::select! {
                _ = cancel.cancelled() => break,
                _ = tokio::time::sleep(self.poll) => {}
            }

            let Ok(html) = page.snapshot_html().await else {
                continue;
            };
            let current = revealed_emails(&html, profile);
            let changed = current != seen;
            if changed {
                seen = current;
            }
            if debounce.observe(changed, Instant::now()) {
                if let Extraction::Contacts(contacts) = extractor.extract_passive(page, task).await {
                    scout_info!(
                        "Reveal detected for job_id={}; re-extracted {} contact(s)",
                        task.job_id,
                        contacts.len()
                    );
                    rounds += 1;
                    on_contacts(contacts).await;
                }
            }
        }
        rounds
    }
}
