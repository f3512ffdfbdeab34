use leadscout_core::{Contact, JobId, Response};
use scout_logging::{scout_error, scout_info, scout_warn};

use crate::store::{PendingBatch, PendingStore};
use crate::DeliveryError;

/// Receiver of scraped contacts (the coordinator, in production).
#[async_trait::async_trait]
pub trait ContactSink: Send + Sync {
    /// Delivers contacts scraped from the tab opened for `job_id`.
    async fn deliver(&self, job_id: &JobId, contacts: Vec<Contact>)
        -> Result<Response, DeliveryError>;
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Delivery {
    Delivered(Response),
    Parked,
    Lost,
}

/// Sends contacts to `sink`; parks them in `store` if the sink is gone.
pub async fn deliver_or_park(
    sink: &dyn ContactSink,
    store: &PendingStore,
    job_id: &JobId,
    contacts: Vec<Contact>,
) -> Delivery {
    let count = contacts.len();
    match sink.deliver(job_id, contacts.clone()).await {
        Ok(response) => {
            scout_info!("Sent {} contact(s) for job_id={}", count, job_id);
            Delivery::Delivered(response)
        }
        Err(err) => {
            scout_warn!("Could not deliver contacts for job_id={}: {}; parking", job_id, err);
            match store.append(PendingBatch::now(job_id.clone(), contacts)) {
                Ok(()) => Delivery::Parked,
                Err(err) => {
                    scout_error!("Failed to park contacts for job_id={}: {}", job_id, err);
                    Delivery::Lost
                }
            }
        }
    }
}
