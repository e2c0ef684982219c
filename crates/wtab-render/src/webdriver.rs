//! WebDriver-backed renderer
//!
//! Talks the W3C WebDriver JSON protocol to geckodriver or chromedriver over
//! a blocking HTTP client. A [`WebDriverRenderer`] owns one browser session
//! and, unless it was pointed at an existing driver, the driver process too;
//! both are released when the renderer is dropped.

use crate::error::{RenderError, Result};
use crate::renderer::{ElementSnapshot, Rect, Renderer, TableCapture};
use crate::settings::{Browser, RenderSettings};
use base64::engine::general_purpose::STANDARD;
use base64::Engine;
use image::ImageFormat;
use log::{debug, info, warn};
use reqwest::blocking::Client;
use reqwest::{Method, StatusCode};
use serde::Deserialize;
use serde_json::{json, Value};
use std::net::TcpListener;
use std::process::{Child, Command, Stdio};
use std::thread;
use std::time::{Duration, Instant};
use wtab_core::CellId;

/// Key of a web element reference in WebDriver responses
const ELEMENT_KEY: &str = "element-6066-11e4-a52e-4f735466cecf";

/// How long a freshly spawned driver may take to answer `/status`
const DRIVER_STARTUP: Duration = Duration::from_secs(15);

/// Delay between two element lookups while waiting for a marker
const POLL_INTERVAL: Duration = Duration::from_millis(50);

/// Per-request HTTP timeout
const REQUEST_TIMEOUT: Duration = Duration::from_secs(120);

/// A spawned WebDriver process, killed on drop
#[derive(Debug)]
pub struct DriverProcess {
    child: Child,
    url: String,
}

impl DriverProcess {
    /// Spawn `program` listening on a free local port.
    ///
    /// # Errors
    ///
    /// [`RenderError::DriverStart`] when the binary cannot be started.
    pub fn spawn(program: &str, browser: Browser) -> Result<Self> {
        let port = free_port()?;
        let port_arg = match browser {
            Browser::Firefox => vec!["--port".to_string(), port.to_string()],
            Browser::Chrome => vec![format!("--port={port}")],
        };
        let child = Command::new(program)
            .args(&port_arg)
            .stdin(Stdio::null())
            .stdout(Stdio::null())
            .stderr(Stdio::null())
            .spawn()
            .map_err(|source| RenderError::DriverStart {
                driver: program.to_string(),
                source,
            })?;
        debug!("spawned {program} (pid {}) on port {port}", child.id());

        Ok(Self {
            child,
            url: format!("http://127.0.0.1:{port}"),
        })
    }

    #[must_use]
    pub fn url(&self) -> &str {
        &self.url
    }
}

impl Drop for DriverProcess {
    fn drop(&mut self) {
        if let Err(e) = self.child.kill() {
            debug!("driver already gone: {e}");
        }
        match self.child.wait() {
            Ok(status) => debug!("driver exited: {status}"),
            Err(e) => debug!("driver did not exit cleanly: {e}"),
        }
    }
}

fn free_port() -> Result<u16> {
    let listener = TcpListener::bind("127.0.0.1:0")?;
    Ok(listener.local_addr()?.port())
}

/// A browser session rendering one table page at a time
#[derive(Debug)]
pub struct WebDriverRenderer {
    client: Client,
    base_url: String,
    session_id: String,
    // Dropped after the session is deleted
    _driver: Option<DriverProcess>,
}

impl WebDriverRenderer {
    /// Start (or connect to) a WebDriver and open a headless session.
    ///
    /// # Errors
    ///
    /// Fatal errors only: the driver cannot be spawned, does not become ready,
    /// or refuses the session.
    pub fn launch(settings: &RenderSettings) -> Result<Self> {
        let client = Client::builder().timeout(REQUEST_TIMEOUT).build()?;

        let (driver, base_url) = match &settings.driver_url {
            Some(url) => (None, url.trim_end_matches('/').to_string()),
            None => {
                let process = DriverProcess::spawn(settings.driver_program(), settings.browser)?;
                let url = process.url().to_string();
                (Some(process), url)
            }
        };

        wait_ready(&client, &base_url, DRIVER_STARTUP)?;

        let body = json!({"capabilities": {"alwaysMatch": settings.browser.capabilities()}});
        let response = send(&client, Method::POST, &format!("{base_url}/session"), Some(&body))
            .map_err(|e| RenderError::SessionStart(e.to_string()))?;
        let session_id = response["sessionId"]
            .as_str()
            .ok_or_else(|| RenderError::SessionStart("response has no sessionId".into()))?
            .to_string();
        info!("opened {:?} session {session_id} at {base_url}", settings.browser);

        Ok(Self {
            client,
            base_url,
            session_id,
            _driver: driver,
        })
    }

    fn command(&self, method: Method, path: &str, body: Option<&Value>) -> Result<Value> {
        let url = format!("{}/session/{}{path}", self.base_url, self.session_id);
        send(&self.client, method, &url, body)
    }

    fn find(&self, selector: &str) -> Result<String> {
        let body = json!({"using": "css selector", "value": selector});
        let value = self.command(Method::POST, "/element", Some(&body))?;
        element_ref(&value)
    }

    fn rect(&self, element: &str) -> Result<Rect> {
        let value = self.command(Method::GET, &format!("/element/{element}/rect"), None)?;
        let wire: WireRect = serde_json::from_value(value).map_err(invalid_response)?;
        Ok(Rect::new(wire.x, wire.y, wire.width, wire.height))
    }
}

impl Renderer for WebDriverRenderer {
    fn load(&mut self, page: &str) -> Result<()> {
        let body = json!({"url": data_url(page)});
        self.command(Method::POST, "/url", Some(&body))?;
        Ok(())
    }

    fn capture_table(&mut self) -> Result<TableCapture> {
        let table = self.find("table")?;
        let encoded = self.command(Method::GET, &format!("/element/{table}/screenshot"), None)?;
        let encoded = encoded
            .as_str()
            .ok_or_else(|| RenderError::Screenshot("screenshot is not a string".into()))?;
        let png = STANDARD
            .decode(encoded)
            .map_err(|e| RenderError::Screenshot(e.to_string()))?;
        let image = image::load_from_memory_with_format(&png, ImageFormat::Png)?.to_rgba8();

        Ok(TableCapture {
            image,
            rect: self.rect(&table)?,
        })
    }

    fn locate(&mut self, id: CellId, timeout: Duration) -> Result<ElementSnapshot> {
        let selector = format!("[id=\"{id}\"]");
        let deadline = Instant::now() + timeout;
        let element = loop {
            match self.find(&selector) {
                Ok(element) => break element,
                Err(RenderError::NoSuchElement(_)) if Instant::now() < deadline => {
                    thread::sleep(POLL_INTERVAL);
                }
                Err(RenderError::NoSuchElement(_)) => {
                    return Err(RenderError::Timeout {
                        id: id.index(),
                        timeout_ms: u64::try_from(timeout.as_millis()).unwrap_or(u64::MAX),
                    })
                }
                Err(e) => return Err(e),
            }
        };

        let text = self.command(Method::GET, &format!("/element/{element}/text"), None)?;
        Ok(ElementSnapshot {
            text: text.as_str().unwrap_or_default().to_string(),
            rect: self.rect(&element)?,
        })
    }
}

impl Drop for WebDriverRenderer {
    fn drop(&mut self) {
        if let Err(e) = self.command(Method::DELETE, "", None) {
            warn!("failed to close session {}: {e}", self.session_id);
        }
    }
}

#[derive(Deserialize)]
struct WireRect {
    x: f64,
    y: f64,
    width: f64,
    height: f64,
}

/// Page as a base64 `data:` URL.
#[must_use]
pub fn data_url(page: &str) -> String {
    format!("data:text/html;charset=utf-8;base64,{}", STANDARD.encode(page))
}

fn wait_ready(client: &Client, base_url: &str, limit: Duration) -> Result<()> {
    let started = Instant::now();
    let url = format!("{base_url}/status");
    while started.elapsed() < limit {
        if let Ok(value) = send(client, Method::GET, &url, None) {
            if value["ready"].as_bool().unwrap_or(true) {
                return Ok(());
            }
        }
        thread::sleep(Duration::from_millis(100));
    }
    Err(RenderError::DriverNotReady {
        url: base_url.to_string(),
        waited_ms: u64::try_from(limit.as_millis()).unwrap_or(u64::MAX),
    })
}

fn send(client: &Client, method: Method, url: &str, body: Option<&Value>) -> Result<Value> {
    let mut request = client.request(method, url);
    if let Some(body) = body {
        request = request.json(body);
    }
    let response = request.send()?;
    let status = response.status();
    let body: Value = response.json()?;
    check_response(status, body)
}

/// Unwrap the `value` member of a WebDriver response, mapping error objects.
fn check_response(status: StatusCode, mut body: Value) -> Result<Value> {
    let value = body.get_mut("value").map(Value::take).unwrap_or(Value::Null);
    let error = value.get("error").and_then(Value::as_str);
    if status.is_success() && error.is_none() {
        return Ok(value);
    }

    let message = value
        .get("message")
        .and_then(Value::as_str)
        .unwrap_or_default()
        .to_string();
    match error {
        Some("no such element") => Err(RenderError::NoSuchElement(message)),
        Some(error) => Err(RenderError::Protocol {
            error: error.to_string(),
            message,
        }),
        None => Err(RenderError::Protocol {
            error: format!("HTTP {status}"),
            message,
        }),
    }
}

fn element_ref(value: &Value) -> Result<String> {
    value
        .get(ELEMENT_KEY)
        .and_then(Value::as_str)
        .map(ToString::to_string)
        .ok_or_else(|| invalid_response("missing element reference"))
}

fn invalid_response(detail: impl std::fmt::Display) -> RenderError {
    RenderError::Protocol {
        error: "invalid response".to_string(),
        message: detail.to_string(),
    }
}
