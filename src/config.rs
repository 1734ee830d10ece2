use std::time::Duration;

use crate::browser::FormPilot;
use crate::error::Result;

/// How the final submit step is driven.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SubmitMode {
    /// The engine locates and clicks the submit affordance itself.
    Auto,
    /// The engine fills the form, then blocks until a human operator confirms
    /// they clicked submit in the live browser window.
    Manual,
}

/// Tunable probabilities and bounds for the behavior layer. All delays are
/// bounded so one attempt stays in the low minutes.
#[derive(Debug, Clone)]
pub struct BehaviorProfile {
    /// Probability of typing a wrong character and correcting it.
    pub typo_probability: f64,
    /// Probability of deferring a field once and returning to it later.
    pub defer_probability: f64,
    /// Probability of scrolling back up between fields to "re-read".
    pub reread_probability: f64,
    /// Probability that a pointer wander ends in a stray click.
    pub pointer_click_probability: f64,
    /// Shuffle the field visit order per run.
    pub shuffle_fields: bool,
    /// Inter-keystroke delay range in milliseconds.
    pub keystroke_delay_ms: (u64, u64),
}

impl Default for BehaviorProfile {
    fn default() -> Self {
        Self {
            typo_probability: 0.05,
            defer_probability: 0.15,
            reread_probability: 0.15,
            pointer_click_probability: 0.2,
            shuffle_fields: true,
            keystroke_delay_ms: (30, 120),
        }
    }
}

/// Engine configuration: browser launch options plus the attempt's timing and
/// submission policy.
#[derive(Clone)]
pub struct EngineConfig {
    pub headless: bool,
    pub viewport_width: u32,
    pub viewport_height: u32,
    pub chrome_path: Option<String>,
    /// Proxy server URL, e.g. "http://host:port" or "socks5://host:port".
    pub proxy_server: Option<String>,
    /// BCP 47 locale advertised by the fingerprint overrides.
    pub locale: String,
    /// Minutes returned by `Date.prototype.getTimezoneOffset`; must agree with
    /// the locale the fingerprint claims (EST is 300).
    pub timezone_offset_minutes: i32,
    /// Per-attempt timeout for a single navigation.
    pub navigation_timeout: Duration,
    /// Navigation attempts before the whole attempt fails.
    pub navigation_retries: u32,
    /// Bounded wait for the network to settle after navigation or submit.
    pub settle_timeout: Duration,
    /// Bounded wait for interactive fields to appear after revealing the form.
    pub selector_timeout: Duration,
    pub submit_mode: SubmitMode,
    /// Keep the page open after classification until the caller cancels.
    pub hold_for_inspection: bool,
    pub behavior: BehaviorProfile,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            headless: true,
            viewport_width: 1920,
            viewport_height: 1080,
            chrome_path: None,
            proxy_server: None,
            locale: "en-US".into(),
            timezone_offset_minutes: 300,
            navigation_timeout: Duration::from_secs(60),
            navigation_retries: 3,
            settle_timeout: Duration::from_secs(30),
            selector_timeout: Duration::from_secs(5),
            submit_mode: SubmitMode::Auto,
            hold_for_inspection: false,
            behavior: BehaviorProfile::default(),
        }
    }
}

pub struct EngineBuilder {
    config: EngineConfig,
}

impl EngineBuilder {
    pub fn new() -> Self {
        Self {
            config: EngineConfig::default(),
        }
    }

    pub fn headless(mut self, headless: bool) -> Self {
        self.config.headless = headless;
        self
    }

    pub fn viewport(mut self, width: u32, height: u32) -> Self {
        self.config.viewport_width = width;
        self.config.viewport_height = height;
        self
    }

    pub fn chrome_path(mut self, path: impl Into<String>) -> Self {
        self.config.chrome_path = Some(path.into());
        self
    }

    /// Route all traffic through a proxy server.
    pub fn proxy(mut self, server: impl Into<String>) -> Self {
        self.config.proxy_server = Some(server.into());
        self
    }

    /// Locale plus the matching `getTimezoneOffset` value in minutes.
    pub fn locale(mut self, locale: impl Into<String>, timezone_offset_minutes: i32) -> Self {
        self.config.locale = locale.into();
        self.config.timezone_offset_minutes = timezone_offset_minutes;
        self
    }

    pub fn navigation_timeout(mut self, timeout: Duration) -> Self {
        self.config.navigation_timeout = timeout;
        self
    }

    pub fn navigation_retries(mut self, retries: u32) -> Self {
        self.config.navigation_retries = retries;
        self
    }

    pub fn settle_timeout(mut self, timeout: Duration) -> Self {
        self.config.settle_timeout = timeout;
        self
    }

    pub fn selector_timeout(mut self, timeout: Duration) -> Self {
        self.config.selector_timeout = timeout;
        self
    }

    pub fn submit_mode(mut self, mode: SubmitMode) -> Self {
        self.config.submit_mode = mode;
        self
    }

    pub fn hold_for_inspection(mut self, hold: bool) -> Self {
        self.config.hold_for_inspection = hold;
        self
    }

    pub fn behavior(mut self, profile: BehaviorProfile) -> Self {
        self.config.behavior = profile;
        self
    }

    pub fn build_config(self) -> EngineConfig {
        self.config
    }

    pub async fn build(self) -> Result<FormPilot> {
        FormPilot::launch(self.build_config()).await
    }
}

impl Default for EngineBuilder {
    fn default() -> Self {
        Self::new()
    }
}
