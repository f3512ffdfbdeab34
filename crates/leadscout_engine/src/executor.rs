use std::sync::Arc;

use leadscout_core::{build_search_url, Task};
use scout_logging::scout_info;
use url::Url;

use crate::page::{Navigator, SearchPage};
use crate::PageError;

pub const DEFAULT_SEARCH_BASE: &str = "https://app.apollo.io/";

/// Turns tasks into search URLs and opens them.
#[derive(Clone)]
pub struct TaskExecutor {
    search_base: Url,
    navigator: Arc<dyn Navigator>,
}

impl TaskExecutor {
    pub fn new(search_base: Url, navigator: Arc<dyn Navigator>) -> Self {
        Self {
            search_base,
            navigator,
        }
    }

    pub fn search_url(&self, task: &Task) -> Url {
        build_search_url(&self.search_base, task)
    }

    pub async fn open(&self, task: &Task) -> Result<Arc<dyn SearchPage>, PageError> {
        let url = self.search_url(task);
        scout_info!("Opening search for job_id={}: {}", task.job_id, url);
        self.navigator.open_tab(&url).await
    }
}
