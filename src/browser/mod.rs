//! Chrome-backed [`Surface`] over the DevTools protocol.
//!
//! `headless_chrome` is a blocking client, so every protocol round trip is
//! moved onto the blocking pool with `spawn_blocking`.

use std::sync::Arc;
use std::time::Duration;

use anyhow::Result;
use async_trait::async_trait;
use headless_chrome::{Browser, LaunchOptions, Tab};
use serde_json::Value;
use tokio::task::spawn_blocking;
use tokio::time::sleep;
use tracing::{debug, info, warn};

use crate::config::BrowserConfig;
use crate::traits::Surface;

const SCROLL_SETTLE: Duration = Duration::from_millis(500);
const CLICK_SETTLE: Duration = Duration::from_millis(1000);
const RETRY_PAUSE: Duration = Duration::from_millis(500);
const REVEAL_SCROLL_SETTLE: Duration = Duration::from_millis(1000);

// marks the reveal control found by one lookup so the later click hits it
const REVEAL_MARK: &str = "data-harvester-reveal";

/// Quote `value` as a JavaScript string literal.
fn js_literal(value: &str) -> Result<String> {
    Ok(serde_json::to_string(value)?)
}

/// A single browser tab the harvester drives.
///
/// The browser process lives as long as this value does.
pub struct ChromeSurface {
    _browser: Browser,
    tab: Arc<Tab>,
    reveal_text: Option<String>,
}

impl ChromeSurface {
    /// Launch Chrome and open one tab.
    pub fn launch(config: &BrowserConfig) -> Result<Self> {
        info!(
            "Launching Chrome (headless: {}, profile: {:?})",
            config.headless, config.profile_dir
        );

        let browser = Browser::new(LaunchOptions {
            headless: config.headless,
            user_data_dir: config.profile_dir.clone(),
            idle_browser_timeout: Duration::from_secs(600),
            ..LaunchOptions::default()
        })?;
        let tab = browser.new_tab()?;

        Ok(Self {
            _browser: browser,
            tab,
            reveal_text: None,
        })
    }

    /// Treat buttons whose text contains `text` as "load more" controls.
    pub fn with_reveal_text(mut self, text: Option<String>) -> Self {
        self.reveal_text = text.map(|t| t.to_lowercase());
        self
    }

    pub async fn navigate(&self, url: &str) -> Result<()> {
        info!("Navigating to {}", url);
        let tab = Arc::clone(&self.tab);
        let url = url.to_string();

        spawn_blocking(move || {
            tab.navigate_to(&url)?.wait_until_navigated()?;
            Ok::<_, anyhow::Error>(())
        })
        .await?
    }

    async fn evaluate(&self, expression: String) -> Result<Option<Value>> {
        let tab = Arc::clone(&self.tab);
        let object = spawn_blocking(move || tab.evaluate(&expression, false)).await??;
        Ok(object.value)
    }

    /// Serialised HTML of the current document.
    pub async fn html(&self) -> Result<String> {
        match self.evaluate("document.documentElement.outerHTML".to_string()).await? {
            Some(Value::String(html)) => Ok(html),
            Some(other) => anyhow::bail!("document HTML is not a string: {other}"),
            None => anyhow::bail!("document HTML evaluated to nothing"),
        }
    }

    /// Click a visible "show more" button matching `selector`, trying up to
    /// `attempts` times.
    ///
    /// # Returns
    /// * `bool` - whether a click happened; a missing button is not an error
    pub async fn expand(&self, selector: &str, attempts: u32) -> bool {
        let selector_js = match js_literal(selector) {
            Ok(selector_js) => selector_js,
            Err(e) => {
                warn!("Cannot quote selector {}: {:#}", selector, e);
                return false;
            }
        };

        for attempt in 1..=attempts {
            let found = self
                .evaluate(format!(
                    r#"(() => {{
                        const button = document.querySelector({selector_js});
                        if (!button || button.offsetParent === null) return false;
                        button.scrollIntoView({{ behavior: "smooth", block: "center" }});
                        return true;
                    }})()"#
                ))
                .await;

            match found {
                Ok(Some(Value::Bool(true))) => {
                    sleep(SCROLL_SETTLE).await;
                    let clicked = self
                        .evaluate(format!("document.querySelector({selector_js}).click()"))
                        .await;
                    match clicked {
                        Ok(_) => {
                            sleep(CLICK_SETTLE).await;
                            debug!("Expanded {}", selector);
                            return true;
                        }
                        Err(e) => warn!("Click failed for {} (attempt {}): {:#}", selector, attempt, e),
                    }
                }
                Ok(_) => {}
                Err(e) => warn!("Could not look up {}: {:#}", selector, e),
            }

            sleep(RETRY_PAUSE).await;
        }

        false
    }
}

#[async_trait]
impl Surface for ChromeSurface {
    async fn measure(&self) -> Result<i64> {
        match self.evaluate("document.body.scrollHeight".to_string()).await? {
            Some(value) => value
                .as_i64()
                .or_else(|| value.as_f64().map(|v| v as i64))
                .ok_or_else(|| anyhow::anyhow!("scroll height is not a number: {value}")),
            None => anyhow::bail!("scroll height evaluated to nothing"),
        }
    }

    async fn grow(&self) -> Result<()> {
        self.evaluate("window.scrollTo(0, document.body.scrollHeight)".to_string())
            .await?;
        Ok(())
    }

    /// Scroll a button whose text contains the reveal text into view, let
    /// the page settle, then click it. A failing click still counts as an
    /// activation.
    async fn reveal_more(&self) -> Result<bool> {
        let Some(text) = &self.reveal_text else {
            return Ok(false);
        };
        let text_js = js_literal(text)?;

        let found = self
            .evaluate(format!(
                r#"(() => {{
                    document.querySelectorAll("[{REVEAL_MARK}]").forEach(el => el.removeAttribute("{REVEAL_MARK}"));
                    const button = [...document.querySelectorAll("button")].find(btn => {{
                        const text = btn.innerText || btn.textContent || "";
                        return text.trim().toLowerCase().includes({text_js});
                    }});
                    if (!button) return false;
                    button.setAttribute("{REVEAL_MARK}", "");
                    button.scrollIntoView({{ behavior: "smooth", block: "center" }});
                    return true;
                }})()"#
            ))
            .await?;
        if !matches!(found, Some(Value::Bool(true))) {
            return Ok(false);
        }

        sleep(REVEAL_SCROLL_SETTLE).await;

        self.evaluate(format!(
            r#"(() => {{
                const button = document.querySelector("[{REVEAL_MARK}]");
                if (!button) return false;
                try {{ button.click(); }} catch (err) {{ console.warn(err); }}
                button.removeAttribute("{REVEAL_MARK}");
                return true;
            }})()"#
        ))
        .await?;

        debug!("Activated {:?} control", text);
        Ok(true)
    }
}
