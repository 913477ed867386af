// src/ingest/browser.rs
//! Browser automation boundary.
//!
//! The collector only needs `render`, `scroll_by` and `page_source`. The
//! concrete implementation speaks the W3C WebDriver protocol to a running
//! chromedriver / Selenium endpoint.

use anyhow::{anyhow, Context, Result};
use async_trait::async_trait;
use serde::Deserialize;
use serde_json::{json, Value};
use std::time::Duration;

#[async_trait]
pub trait BrowserSession: Send {
    /// Navigate to `url` and wait for the page to load.
    async fn render(&mut self, url: &str) -> Result<()>;
    /// Scroll the viewport down by `px` pixels.
    async fn scroll_by(&mut self, px: u32) -> Result<()>;
    /// Current serialized DOM.
    async fn page_source(&mut self) -> Result<String>;
    /// Release the remote session.
    async fn close(self: Box<Self>) -> Result<()>;
}

#[async_trait]
pub trait BrowserLauncher: Send + Sync {
    async fn launch(&self) -> Result<Box<dyn BrowserSession>>;
}

/// Starts Chrome sessions through a WebDriver endpoint.
pub struct WebDriverLauncher {
    http: reqwest::Client,
    endpoint: String,
    user_agent: String,
    headless: bool,
}

impl WebDriverLauncher {
    pub fn new(endpoint: &str, user_agent: &str, headless: bool) -> Result<Self> {
        let http = reqwest::Client::builder()
            .connect_timeout(Duration::from_secs(4))
            .timeout(Duration::from_secs(60))
            .build()
            .context("building webdriver http client")?;
        Ok(Self {
            http,
            endpoint: endpoint.trim_end_matches('/').to_string(),
            user_agent: user_agent.to_string(),
            headless,
        })
    }

    fn capabilities(&self) -> Value {
        let mut args = vec![
            "--start-maximized".to_string(),
            format!("user-agent={}", self.user_agent),
        ];
        if self.headless {
            args.push("--headless=new".to_string());
        }
        json!({
            "capabilities": {
                "alwaysMatch": {
                    "browserName": "chrome",
                    "goog:chromeOptions": { "args": args }
                }
            }
        })
    }
}

#[async_trait]
impl BrowserLauncher for WebDriverLauncher {
    async fn launch(&self) -> Result<Box<dyn BrowserSession>> {
        #[derive(Deserialize)]
        struct NewSession {
            #[serde(rename = "sessionId")]
            session_id: String,
        }

        let url = format!("{}/session", self.endpoint);
        let resp = self
            .http
            .post(&url)
            .json(&self.capabilities())
            .send()
            .await
            .context("webdriver new session")?;
        let value = webdriver_value(resp).await?;
        let created: NewSession =
            serde_json::from_value(value).context("webdriver new session payload")?;

        tracing::debug!(session = %created.session_id, "webdriver session started");
        Ok(Box::new(WebDriverSession {
            http: self.http.clone(),
            base: format!("{}/session/{}", self.endpoint, created.session_id),
        }))
    }
}

pub struct WebDriverSession {
    http: reqwest::Client,
    base: String,
}

#[async_trait]
impl BrowserSession for WebDriverSession {
    async fn render(&mut self, url: &str) -> Result<()> {
        let resp = self
            .http
            .post(format!("{}/url", self.base))
            .json(&json!({ "url": url }))
            .send()
            .await
            .context("webdriver navigate")?;
        webdriver_value(resp).await.map(|_| ())
    }

    async fn scroll_by(&mut self, px: u32) -> Result<()> {
        let resp = self
            .http
            .post(format!("{}/execute/sync", self.base))
            .json(&json!({
                "script": "window.scrollBy(0, arguments[0]);",
                "args": [px]
            }))
            .send()
            .await
            .context("webdriver scroll")?;
        webdriver_value(resp).await.map(|_| ())
    }

    async fn page_source(&mut self) -> Result<String> {
        let resp = self
            .http
            .get(format!("{}/source", self.base))
            .send()
            .await
            .context("webdriver page source")?;
        match webdriver_value(resp).await? {
            Value::String(html) => Ok(html),
            other => Err(anyhow!("webdriver source was not a string: {other}")),
        }
    }

    async fn close(self: Box<Self>) -> Result<()> {
        let resp = self
            .http
            .delete(&self.base)
            .send()
            .await
            .context("webdriver delete session")?;
        webdriver_value(resp).await.map(|_| ())
    }
}

/// Unwraps the `{"value": ...}` envelope, turning WebDriver errors into `Err`.
async fn webdriver_value(resp: reqwest::Response) -> Result<Value> {
    let status = resp.status();
    let body: Value = resp.json().await.context("webdriver response body")?;
    let value = body.get("value").cloned().unwrap_or(Value::Null);
    if !status.is_success() {
        let kind = value
            .get("error")
            .and_then(Value::as_str)
            .unwrap_or("unknown error");
        let message = value
            .get("message")
            .and_then(Value::as_str)
            .unwrap_or_default();
        return Err(anyhow!(
            "webdriver error (status {}): {kind}: {message}",
            status.as_u16()
        ));
    }
    Ok(value)
}
