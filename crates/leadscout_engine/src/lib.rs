//! Leadscout engine: backend client, tab automation, contact extraction and
//! the coordinator that executes core effects.
mod backend;
#[cfg(feature = "chrome")]
mod chrome;
mod coordinator;
mod executor;
mod extract;
mod page;
mod relay;
mod session;
mod store;
mod types;
mod wait;
mod watch;

pub use backend::{BackendSettings, CompletionAck, ReqwestBackend, TaskBackend, DEFAULT_BACKEND_URL};
#[cfg(feature = "chrome")]
pub use chrome::{ChromeNavigator, ChromePage, ChromeSettings};
pub use coordinator::{Coordinator, CoordinatorHandle, CoordinatorSettings};
pub use executor::{TaskExecutor, DEFAULT_SEARCH_BASE};
pub use extract::{
    company_matches, revealed_emails, scan_page, ContactExtractor, Extraction, ExtractionSettings,
    PageScan, RowData, SelectorProfile, SelectorSet,
};
pub use page::{Navigator, RevealControl, RevealTarget, SearchPage};
pub use relay::{deliver_or_park, ContactSink, Delivery};
pub use session::ScrapeSession;
pub use store::{ensure_state_dir, PendingBatch, PendingStore, PersistError};
pub use types::{BackendError, DeliveryError, FailureKind, PageError};
pub use wait::{wait_for, WaitSettings};
pub use watch::{Debounce, RevealWatcher};
