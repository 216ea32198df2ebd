//! Traits and interfaces for engine-agnostic page rendering

use std::path::PathBuf;
use std::time::Duration;

use async_trait::async_trait;

use crate::error::Result;

/// Desktop Chrome user agent presented on every page
pub const DEFAULT_USER_AGENT: &str = "Mozilla/5.0 (Windows NT 10.0; Win64; x64) AppleWebKit/537.36 (KHTML, like Gecko) Chrome/91.0.4472.124 Safari/537.36";

/// Configuration shared by a session and every page it opens
#[derive(Debug, Clone)]
pub struct SessionConfig {
    /// User agent string applied to each page context
    pub user_agent: String,
    /// Viewport width in CSS pixels
    pub viewport_width: u32,
    /// Viewport height in CSS pixels
    pub viewport_height: u32,
    /// Browser binary; `None` lets the engine find one
    pub executable: Option<PathBuf>,
    /// Run without the browser sandbox (required inside most containers)
    pub disable_sandbox: bool,
    /// Default timeout for navigations and page operations
    pub default_timeout: Duration,
    /// Timeout for the initial listing navigation
    pub listing_timeout: Duration,
}

impl Default for SessionConfig {
    fn default() -> Self {
        Self {
            user_agent: DEFAULT_USER_AGENT.to_string(),
            viewport_width: 1920,
            viewport_height: 1080,
            executable: None,
            disable_sandbox: true,
            default_timeout: Duration::from_secs(60),
            listing_timeout: Duration::from_secs(120),
        }
    }
}

/// When a navigation counts as finished
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum WaitCondition {
    /// The DOM has been parsed; subresources may still be loading
    DomReady,
    /// The page and its network activity have settled
    NetworkIdle,
}

/// Launches rendering sessions
#[async_trait]
pub trait RenderEngine: Send + Sync {
    /// Start a new browser session
    ///
    /// # Arguments
    /// * `config` - User agent, viewport, sandbox and timeout settings
    ///
    /// # Returns
    /// * `Result<Box<dyn RenderSession>>` - The running session or a launch error
    async fn launch(&self, config: &SessionConfig) -> Result<Box<dyn RenderSession>>;
}

/// One browser lifecycle, spanning a single pipeline run
#[async_trait]
pub trait RenderSession: Send + Sync {
    /// Open an isolated page context that inherits the session's user agent and viewport
    async fn new_page(&self) -> Result<Box<dyn PageContext>>;

    /// Tear down the session and every page it still owns
    async fn close(self: Box<Self>) -> Result<()>;
}

/// An independently navigable page
#[async_trait]
pub trait PageContext: Send + Sync {
    /// Navigate to `url`, failing with a timeout error once `timeout` elapses
    async fn goto(&self, url: &str, wait: WaitCondition, timeout: Duration) -> Result<()>;

    /// Serialized DOM of the current document, including script-rendered content
    async fn content(&self) -> Result<String>;

    /// Close this page context
    async fn close(self: Box<Self>) -> Result<()>;
}
