use chromiumoxide::browser::{Browser as CrBrowser, BrowserConfig as CrBrowserConfig};
use chromiumoxide::handler::viewport::Viewport;
use futures::StreamExt;
use tracing::info;

use crate::config::{EngineBuilder, EngineConfig};
use crate::error::{Error, Result};
use crate::page::Page;
use crate::stealth;

/// Chrome flags that improve performance without affecting functionality.
const PERF_ARGS: &[&str] = &[
    "disable-gpu",
    "disable-extensions",
    "metrics-recording-only",
    "mute-audio",
    "disable-client-side-phishing-detection",
    "disable-popup-blocking",
    "disable-prompt-on-repost",
];

/// A Chromium instance prepared for form-filling work. Fingerprint
/// normalization is always on: every page gets the stealth overrides before
/// its first navigation.
pub struct FormPilot {
    browser: CrBrowser,
    config: EngineConfig,
    _handler_task: tokio::task::JoinHandle<()>,
}

impl FormPilot {
    /// Create a new EngineBuilder for configuring and launching a browser.
    pub fn builder() -> EngineBuilder {
        EngineBuilder::new()
    }

    /// Launch a browser instance with the given configuration.
    pub async fn launch(config: EngineConfig) -> Result<Self> {
        let mut builder = CrBrowserConfig::builder();

        if config.headless {
            builder = builder.new_headless_mode().no_sandbox();
        } else {
            builder = builder.with_head().no_sandbox();
        }

        for arg in PERF_ARGS {
            builder = builder.arg(*arg);
        }

        // Anti-detection flags. chromiumoxide adds the `--` prefix itself,
        // so keys must not include it.
        for arg in stealth::stealth_key_args() {
            builder = builder.arg(arg);
        }
        for arg in stealth::stealth_kv_args() {
            builder = builder.arg(arg);
        }

        if let Some(ref proxy) = config.proxy_server {
            builder = builder.arg(("proxy-server", proxy.as_str()));
        }

        if let Some(ref path) = config.chrome_path {
            builder = builder.chrome_executable(path);
        }

        builder = builder.viewport(Viewport {
            width: config.viewport_width,
            height: config.viewport_height,
            device_scale_factor: None,
            emulating_mobile: false,
            is_landscape: false,
            has_touch: false,
        });

        let cr_config = builder
            .build()
            .map_err(|e| Error::LaunchError(e.to_string()))?;

        let (browser, mut handler) = CrBrowser::launch(cr_config)
            .await
            .map_err(|e| Error::LaunchError(e.to_string()))?;

        let handler_task = tokio::spawn(async move {
            while let Some(_event) = handler.next().await {}
        });

        info!(headless = config.headless, "browser launched");

        Ok(Self {
            browser,
            config,
            _handler_task: handler_task,
        })
    }

    pub fn config(&self) -> &EngineConfig {
        &self.config
    }

    /// Open a fresh page with the fingerprint overrides installed. The page is
    /// left on about:blank; navigation (with its retry policy) belongs to the
    /// submission controller.
    pub async fn new_page(&self) -> Result<Page> {
        let cr_page = self
            .browser
            .new_page("about:blank")
            .await
            .map_err(|e| Error::NavigationError(e.to_string()))?;

        stealth::apply_stealth(&cr_page, &self.config).await?;

        Ok(Page::new(
            cr_page,
            self.config.selector_timeout,
            (self.config.viewport_width, self.config.viewport_height),
        ))
    }

    /// Shut the browser down. Callers must reach this on every exit path,
    /// including cancellation during a manual-review or inspection hold.
    pub async fn close(mut self) -> Result<()> {
        self.browser.close().await.map_err(Error::CdpError)?;
        let _ = self.browser.wait().await;
        self._handler_task.abort();
        info!("browser closed");
        Ok(())
    }
}
