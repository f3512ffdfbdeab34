//! [`Navigator`] backed by a real Chrome/Chromium over the DevTools protocol.

use std::sync::Arc;
use std::time::Duration;

use chromiumoxide::browser::{Browser, BrowserConfig};
use chromiumoxide::Page;
use futures_util::StreamExt;
use scout_logging::{scout_debug, scout_info, scout_warn};
use tokio::sync::Mutex;
use url::Url;

use crate::page::{Navigator, RevealControl, RevealTarget, SearchPage};
use crate::wait::{wait_for, WaitSettings};
use crate::PageError;

const READY_POLL: Duration = Duration::from_millis(250);
const READY_TIMEOUT: Duration = Duration::from_secs(20);

#[derive(Debug, Clone, Default)]
pub struct ChromeSettings {
    pub headless: bool,
    /// Browser binary; chromiumoxide's own lookup is used when unset.
    pub executable: Option<String>,
}

pub struct ChromeNavigator {
    browser: Mutex<Browser>,
}

impl ChromeNavigator {
    pub async fn launch(settings: &ChromeSettings) -> Result<Self, PageError> {
        let mut builder = BrowserConfig::builder()
            .arg("--no-first-run")
            .arg("--no-default-browser-check");
        if !settings.headless {
            builder = builder.with_head();
        }
        if let Some(exe) = &settings.executable {
            builder = builder.chrome_executable(exe);
        }
        let config = builder.build().map_err(PageError::Navigation)?;

        let (browser, mut handler) = Browser::launch(config)
            .await
            .map_err(|err| PageError::Navigation(format!("failed to launch browser: {err}")))?;
        tokio::spawn(async move {
            while let Some(event) = handler.next().await {
                if let Err(err) = event {
                    scout_warn!("CDP handler error: {}", err);
                }
            }
        });
        scout_info!("Browser launched (headless={})", settings.headless);

        Ok(Self {
            browser: Mutex::new(browser),
        })
    }
}

#[async_trait::async_trait]
impl Navigator for ChromeNavigator {
    async fn open_tab(&self, url: &Url) -> Result<Arc<dyn SearchPage>, PageError> {
        let page = {
            let browser = self.browser.lock().await;
            browser
                .new_page(url.as_str())
                .await
                .map_err(|err| PageError::Navigation(err.to_string()))?
        };

        let settings = WaitSettings::new(READY_POLL, READY_TIMEOUT);
        let page_ref = &page;
        let ready = wait_for(settings, move || async move {
            let state = page_ref
                .evaluate("document.readyState")
                .await
                .ok()?
                .into_value::<String>()
                .ok()?;
            (state == "complete").then_some(())
        })
        .await;
        if ready.is_none() {
            scout_warn!("Tab for {} did not finish loading; continuing", url);
        }

        Ok(Arc::new(ChromePage { page }))
    }
}

pub struct ChromePage {
    page: Page,
}

#[async_trait::async_trait]
impl SearchPage for ChromePage {
    async fn current_url(&self) -> Result<String, PageError> {
        self.page
            .url()
            .await
            .map_err(|err| PageError::Script(err.to_string()))?
            .ok_or(PageError::Closed)
    }

    async fn snapshot_html(&self) -> Result<String, PageError> {
        self.page
            .content()
            .await
            .map_err(|err| PageError::Script(err.to_string()))
    }

    async fn reveal(&self, target: &RevealTarget) -> Result<bool, PageError> {
        let script = reveal_script(target);
        scout_debug!("Revealing row {}", target.row_index);
        self.page
            .evaluate(script)
            .await
            .map_err(|err| PageError::Script(err.to_string()))?
            .into_value::<bool>()
            .map_err(|err| PageError::Script(err.to_string()))
    }
}

/// Script that clicks the reveal control of one row and reports whether it found one.
pub(crate) fn reveal_script(target: &RevealTarget) -> String {
    let row = js_string(&target.row_selector);
    let find_control = match &target.control {
        RevealControl::Selector(selector) => {
            format!("const control = row.querySelector({});", js_string(selector))
        }
        RevealControl::Labelled { candidates, labels } => format!(
            "const labels = {labels};\n  \
             const control = Array.from(row.querySelectorAll({candidates})).find((el) => {{\n    \
             const text = (el.textContent || '').trim().toLowerCase();\n    \
             return labels.some((l) => l.includes(' ') ? text.includes(l) : text === l);\n  \
             }});",
            labels = serde_json::to_string(labels).unwrap_or_else(|_| "[]".to_string()),
            candidates = js_string(candidates),
        ),
    };
    format!(
        "(() => {{\n  \
         const row = document.querySelectorAll({row})[{index}];\n  \
         if (!row) return false;\n  \
         {find_control}\n  \
         if (!control) return false;\n  \
         control.click();\n  \
         return true;\n\
         }})()",
        index = target.row_index,
    )
}

fn js_string(value: &str) -> String {
    serde_json::Value::String(value.to_string()).to_string()
}
