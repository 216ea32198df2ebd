//! Headless Chromium implementation of the rendering traits.

use std::time::Duration;

use async_trait::async_trait;
use chromiumoxide::browser::{Browser, BrowserConfig};
use chromiumoxide::cdp::browser_protocol::network::SetUserAgentOverrideParams;
use chromiumoxide::cdp::browser_protocol::page::{EventLifecycleEvent, NavigateParams};
use chromiumoxide::handler::viewport::Viewport;
use chromiumoxide::page::Page;
use futures::StreamExt;
use tokio::task::JoinHandle;
use tracing::{debug, warn};

use crate::error::{RenderError, Result};
use crate::traits::{PageContext, RenderEngine, RenderSession, SessionConfig, WaitCondition};

/// Flags that keep Chromium stable in a memory-constrained container.
const CONTAINER_ARGS: &[&str] = &[
    "--disable-setuid-sandbox",
    "--disable-dev-shm-usage",
    "--disable-accelerated-2d-canvas",
    "--no-first-run",
    "--no-zygote",
    "--disable-gpu",
    "--disable-extensions",
    "--disable-background-timer-throttling",
    "--disable-backgrounding-occluded-windows",
    "--disable-renderer-backgrounding",
    "--disable-features=TranslateUI",
    "--disable-ipc-flooding-protection",
];

/// Launches a fresh headless Chromium per session.
#[derive(Debug, Clone, Default)]
pub struct ChromeEngine;

impl ChromeEngine {
    pub fn new() -> Self {
        Self
    }

    fn browser_config(config: &SessionConfig) -> Result<BrowserConfig> {
        let mut builder = BrowserConfig::builder()
            .window_size(config.viewport_width, config.viewport_height)
            .viewport(Viewport {
                width: config.viewport_width,
                height: config.viewport_height,
                ..Viewport::default()
            })
            .request_timeout(config.default_timeout)
            .args(CONTAINER_ARGS.iter().copied());

        if config.disable_sandbox {
            builder = builder.no_sandbox();
        }
        if let Some(path) = &config.executable {
            builder = builder.chrome_executable(path);
        }

        builder.build().map_err(RenderError::Launch)
    }
}

#[async_trait]
impl RenderEngine for ChromeEngine {
    async fn launch(&self, config: &SessionConfig) -> Result<Box<dyn RenderSession>> {
        let browser_config = Self::browser_config(config)?;

        let (browser, mut handler) = Browser::launch(browser_config)
            .await
            .map_err(|e| RenderError::Launch(e.to_string()))?;

        // The CDP connection only makes progress while its handler is polled
        let handler_task = tokio::spawn(async move {
            while let Some(event) = handler.next().await {
                if let Err(e) = event {
                    debug!("Browser handler event error: {}", e);
                }
            }
        });

        Ok(Box::new(ChromeSession {
            browser,
            handler_task,
            user_agent: config.user_agent.clone(),
        }))
    }
}

struct ChromeSession {
    browser: Browser,
    handler_task: JoinHandle<()>,
    user_agent: String,
}

#[async_trait]
impl RenderSession for ChromeSession {
    async fn new_page(&self) -> Result<Box<dyn PageContext>> {
        let page = self
            .browser
            .new_page("about:blank")
            .await
            .map_err(|e| RenderError::Page(e.to_string()))?;

        page.set_user_agent(SetUserAgentOverrideParams::new(self.user_agent.clone()))
            .await
            .map_err(|e| RenderError::Page(e.to_string()))?;

        Ok(Box::new(ChromePage { page }))
    }

    async fn close(self: Box<Self>) -> Result<()> {
        let Self {
            mut browser,
            handler_task,
            ..
        } = *self;

        let closed = browser
            .close()
            .await
            .map_err(|e| RenderError::Page(e.to_string()));
        if let Err(e) = browser.wait().await {
            warn!("Browser process did not exit cleanly: {}", e);
        }
        handler_task.abort();

        closed.map(|_| ())
    }
}

struct ChromePage {
    page: Page,
}

/// Lifecycle event that marks `wait` as satisfied
fn lifecycle_event(wait: WaitCondition) -> &'static str {
    match wait {
        WaitCondition::DomReady => "DOMContentLoaded",
        WaitCondition::NetworkIdle => "networkIdle",
    }
}

impl ChromePage {
    /// Send `Page.navigate` and wait for the lifecycle event of the new document.
    ///
    /// `Page::goto` would wait for the full load event regardless of `wait`,
    /// so the command is issued directly and the event stream watched instead.
    async fn navigate(&self, url: &str, wait: WaitCondition) -> Result<()> {
        let navigation_error = |message: String| RenderError::Navigation {
            url: url.to_string(),
            message,
        };

        // Subscribe first so the event cannot fire before we listen
        let mut events = self
            .page
            .event_listener::<EventLifecycleEvent>()
            .await
            .map_err(|e| navigation_error(e.to_string()))?;

        let navigated = self
            .page
            .execute(NavigateParams::new(url))
            .await
            .map_err(|e| navigation_error(e.to_string()))?;
        if let Some(error) = navigated.result.error_text.clone() {
            return Err(navigation_error(error));
        }

        let frame_id = navigated.result.frame_id.clone();
        let loader_id = navigated.result.loader_id.clone();
        let expected = lifecycle_event(wait);

        while let Some(event) = events.next().await {
            let same_document = event.frame_id == frame_id
                && loader_id.as_ref().is_none_or(|id| *id == event.loader_id);
            if same_document && event.name == expected {
                debug!("{} reached {}", url, expected);
                return Ok(());
            }
        }

        Err(RenderError::Page("page closed before navigation finished".to_string()))
    }
}

#[async_trait]
impl PageContext for ChromePage {
    async fn goto(&self, url: &str, wait: WaitCondition, timeout: Duration) -> Result<()> {
        match tokio::time::timeout(timeout, self.navigate(url, wait)).await {
            Ok(result) => result,
            Err(_) => Err(RenderError::Timeout {
                url: url.to_string(),
                after: timeout,
            }),
        }
    }

    async fn content(&self) -> Result<String> {
        self.page
            .content()
            .await
            .map_err(|e| RenderError::Page(e.to_string()))
    }

    async fn close(self: Box<Self>) -> Result<()> {
        self.page
            .close()
            .await
            .map_err(|e| RenderError::Page(e.to_string()))
    }
}
