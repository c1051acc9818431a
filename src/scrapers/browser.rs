use std::sync::{Arc, Mutex, MutexGuard};

use anyhow::{anyhow, Context, Result};
use headless_chrome::{Browser, Tab};
use tracing::{debug, info, warn};

use crate::scrapers::types::BrowserOptions;

struct SessionState {
    browser: Browser,
    page: Arc<Tab>,
}

/// Headless Chrome session with one shared page.
///
/// Chrome is launched on first use and shut down again by `release`, so
/// nothing lingers between scheduled runs.
pub struct BrowserSession {
    options: BrowserOptions,
    state: Mutex<Option<SessionState>>,
}

impl BrowserSession {
    pub fn new(options: BrowserOptions) -> Self {
        Self {
            options,
            state: Mutex::new(None),
        }
    }

    fn state(&self) -> Result<MutexGuard<'_, Option<SessionState>>> {
        self.state
            .lock()
            .map_err(|_| anyhow!("Browser session lock poisoned"))
    }

    async fn page(&self) -> Result<Arc<Tab>> {
        {
            let state = self.state()?;
            if let Some(state) = state.as_ref() {
                return Ok(Arc::clone(&state.page));
            }
        }

        info!("Launching headless Chrome...");
        let options = self.options.clone();
        let (browser, page) = tokio::task::spawn_blocking(move || -> Result<(Browser, Arc<Tab>)> {
            let browser = Browser::new(options.launch_options()?)
                .context("Failed to launch Chrome browser")?;
            let page = browser.new_tab().context("Failed to open browser tab")?;
            Ok((browser, page))
        })
        .await
        .context("Browser launch task panicked")??;

        let mut state = self.state()?;
        if let Some(existing) = state.as_ref() {
            return Ok(Arc::clone(&existing.page));
        }
        *state = Some(SessionState {
            browser,
            page: Arc::clone(&page),
        });
        Ok(page)
    }

    /// Run blocking tab operations off the async runtime
    pub async fn with_page<T, F>(&self, f: F) -> Result<T>
    where
        F: FnOnce(&Tab) -> Result<T> + Send + 'static,
        T: Send + 'static,
    {
        let page = self.page().await?;
        tokio::task::spawn_blocking(move || f(&page))
            .await
            .context("Browser task panicked")?
    }

    pub async fn goto(&self, url: &str) -> Result<()> {
        debug!("Navigating to {}", url);
        let url = url.to_string();
        self.with_page(move |tab| {
            tab.navigate_to(&url)
                .with_context(|| format!("Failed to navigate to {url}"))?;
            tab.wait_until_navigated()?;
            Ok(())
        })
        .await
    }

    /// HTML of the page as currently rendered
    pub async fn content(&self) -> Result<String> {
        self.with_page(|tab| tab.get_content()).await
    }

    /// Close all pages and shut Chrome down
    pub async fn release(&self) -> Result<()> {
        let state = self.state()?.take();
        let Some(state) = state else {
            return Ok(());
        };

        tokio::task::spawn_blocking(move || -> Result<()> {
            let tabs = state
                .browser
                .get_tabs()
                .lock()
                .map_err(|_| anyhow!("Browser tab list lock poisoned"))?
                .clone();

            for tab in tabs {
                if let Err(e) = tab.close(true) {
                    warn!("Failed to close tab: {:#}", e);
                }
            }

            // Dropping the browser terminates the Chrome process
            drop(state);
            Ok(())
        })
        .await
        .context("Browser shutdown task panicked")??;

        debug!("Browser session released");
        Ok(())
    }
}
