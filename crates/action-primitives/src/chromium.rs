//! Chromium DevTools driver (feature `chromium`).
//!
//! Each `open` launches a dedicated browser process so sessions are never
//! shared across tasks.

use std::time::Duration;

use async_trait::async_trait;
use base64::Engine;
use chromiumoxide::browser::{Browser, BrowserConfig};
use chromiumoxide::cdp::browser_protocol::page::CaptureScreenshotFormat;
use chromiumoxide::page::ScreenshotParams;
use chromiumoxide::Page;
use futures::StreamExt;
use taskpilot_core_types::Observation;
use tokio::task::JoinHandle;
use tracing::{debug, info, warn};

use crate::errors::DriverError;
use crate::session::{BrowserSession, SessionFactory};

const USER_AGENT: &str = "Mozilla/5.0 (Windows NT 10.0; Win64; x64) AppleWebKit/537.36 (KHTML, like Gecko) Chrome/120.0.0.0 Safari/537.36";
const POLL_INTERVAL: Duration = Duration::from_millis(100);

#[derive(Clone, Debug)]
pub struct ChromiumSettings {
    pub headless: bool,
    pub window: (u32, u32),
    /// Pause after navigation so late scripts can render.
    pub settle: Duration,
}

impl Default for ChromiumSettings {
    fn default() -> Self {
        Self {
            headless: true,
            window: (1280, 800),
            settle: Duration::from_secs(2),
        }
    }
}

#[derive(Clone, Debug, Default)]
pub struct ChromiumSessionFactory {
    settings: ChromiumSettings,
}

impl ChromiumSessionFactory {
    pub fn new(settings: ChromiumSettings) -> Self {
        Self { settings }
    }
}

#[async_trait]
impl SessionFactory for ChromiumSessionFactory {
    async fn open(&self) -> Result<Box<dyn BrowserSession>, DriverError> {
        let mut builder = BrowserConfig::builder()
            .no_sandbox()
            .arg("--disable-dev-shm-usage")
            .arg(format!("--user-agent={USER_AGENT}"))
            .window_size(self.settings.window.0, self.settings.window.1);
        if !self.settings.headless {
            builder = builder.with_head();
        }
        let config = builder
            .build()
            .map_err(|err| DriverError::Io(format!("invalid browser config: {err}")))?;

        info!(headless = self.settings.headless, "launching chromium");
        let (browser, mut handler) = Browser::launch(config)
            .await
            .map_err(|err| DriverError::Io(format!("failed to launch browser: {err}")))?;
        let handler_task = tokio::spawn(async move {
            while let Some(event) = handler.next().await {
                if event.is_err() {
                    debug!("chromium handler loop ended");
                    break;
                }
            }
        });
        let page = browser
            .new_page("about:blank")
            .await
            .map_err(|err| DriverError::Io(format!("failed to open page: {err}")))?;

        Ok(Box::new(ChromiumSession {
            browser,
            page,
            handler_task,
            settle: self.settings.settle,
        }))
    }

    fn name(&self) -> &str {
        "chromium"
    }
}

pub struct ChromiumSession {
    browser: Browser,
    page: Page,
    handler_task: JoinHandle<()>,
    settle: Duration,
}

impl ChromiumSession {
    async fn eval_string(&self, script: &str) -> Result<String, DriverError> {
        self.page
            .evaluate(script)
            .await
            .map_err(|err| DriverError::Io(err.to_string()))?
            .into_value::<String>()
            .map_err(|err| DriverError::Io(err.to_string()))
    }

    /// Poll for `selector` until `wait` elapses.
    async fn find(&self, selector: &str, wait: Duration) -> Result<chromiumoxide::Element, DriverError> {
        let deadline = tokio::time::Instant::now() + wait;
        loop {
            if let Ok(element) = self.page.find_element(selector).await {
                return Ok(element);
            }
            if tokio::time::Instant::now() >= deadline {
                return Err(DriverError::TargetNotFound(selector.to_string()));
            }
            tokio::time::sleep(POLL_INTERVAL).await;
        }
    }
}

#[async_trait]
impl BrowserSession for ChromiumSession {
    async fn navigate(&mut self, url: &str) -> Result<(), DriverError> {
        self.page
            .goto(url)
            .await
            .map_err(|err| DriverError::Io(format!("navigation to {url} failed: {err}")))?;
        tokio::time::sleep(self.settle).await;
        Ok(())
    }

    async fn click(&mut self, selector: &str, wait: Duration) -> Result<(), DriverError> {
        let element = self.find(selector, wait).await?;
        element
            .click()
            .await
            .map_err(|err| DriverError::Io(format!("click on {selector} failed: {err}")))?;
        Ok(())
    }

    async fn fill(&mut self, selector: &str, text: &str, wait: Duration) -> Result<(), DriverError> {
        let element = self.find(selector, wait).await?;
        element
            .call_js_fn("function() { this.value = ''; }", false)
            .await
            .map_err(|err| DriverError::Io(format!("clearing {selector} failed: {err}")))?;
        element
            .click()
            .await
            .map_err(|err| DriverError::Io(format!("focusing {selector} failed: {err}")))?
            .type_str(text)
            .await
            .map_err(|err| DriverError::Io(format!("typing into {selector} failed: {err}")))?;
        Ok(())
    }

    async fn page_text(&mut self) -> Result<String, DriverError> {
        self.eval_string("document.body ? document.body.innerText : ''")
            .await
    }

    async fn observe(&mut self, capture_screenshot: bool) -> Result<Observation, DriverError> {
        let url = self
            .page
            .url()
            .await
            .map_err(|err| DriverError::Io(err.to_string()))?
            .unwrap_or_default();
        let title = self.eval_string("document.title").await.unwrap_or_default();
        let screenshot = if capture_screenshot {
            let params = ScreenshotParams::builder()
                .format(CaptureScreenshotFormat::Png)
                .full_page(false)
                .build();
            match self.page.screenshot(params).await {
                Ok(bytes) => Some(base64::engine::general_purpose::STANDARD.encode(bytes)),
                Err(err) => {
                    warn!(error = %err, "screenshot failed");
                    None
                }
            }
        } else {
            None
        };
        Ok(Observation {
            url,
            title,
            screenshot,
        })
    }

    async fn shutdown(&mut self) -> Result<(), DriverError> {
        let result = self
            .browser
            .close()
            .await
            .map(|_| ())
            .map_err(|err| DriverError::Io(format!("browser close failed: {err}")));
        let _ = self.browser.wait().await;
        self.handler_task.abort();
        result
    }
}
