//! Playwright browser automation
//!
//! A long-lived `node` process runs an embedded bridge script that owns the
//! browser and its single page. Requests go to the bridge as one JSON object
//! per line on stdin and replies come back the same way on stdout:
//!
//! ```text
//! -> {"id":7,"op":"click","selector":"#game-submit-button","click_count":3}
//! <- {"id":7,"ok":true,"value":null}
//! <- {"event":"dialog","dialog_id":1,"kind":"confirm","message":"Reset?"}
//! ```
//!
//! Dialog events are answered from the reader task through the handler
//! registered with [`Page::once_dialog`], so an action that blocks on a
//! dialog can still complete.

use std::collections::HashMap;
use std::path::PathBuf;
use std::process::{Command, Stdio};
use std::str::FromStr;
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use std::time::Duration;

use async_trait::async_trait;
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use tempfile::TempDir;
use tokio::io::{AsyncBufReadExt, AsyncWriteExt, BufReader};
use tokio::process::{Child, ChildStderr, ChildStdin, ChildStdout, Command as TokioCommand};
use tokio::sync::{mpsc, oneshot};
use tokio::task::JoinHandle;
use tokio::time::timeout;
use tracing::{debug, info, trace, warn};

use crate::error::{E2eError, E2eResult};
use crate::page::{Dialog, DialogAction, DialogHandler, Page, WaitState};

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum Browser {
    Chromium,
    #[default]
    Firefox,
    Webkit,
}

impl Browser {
    pub fn as_str(&self) -> &'static str {
        match self {
            Browser::Chromium => "chromium",
            Browser::Firefox => "firefox",
            Browser::Webkit => "webkit",
        }
    }
}

impl FromStr for Browser {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "chromium" => Ok(Browser::Chromium),
            "firefox" => Ok(Browser::Firefox),
            "webkit" => Ok(Browser::Webkit),
            other => Err(format!(
                "unknown browser '{}' (expected chromium, firefox or webkit)",
                other
            )),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct Viewport {
    pub width: u32,
    pub height: u32,
}

/// Configuration for Playwright
#[derive(Debug, Clone)]
pub struct PlaywrightConfig {
    pub browser: Browser,
    pub headless: bool,
    pub viewport: Viewport,

    /// Upper bound for a single bridge request
    pub command_timeout: Duration,

    /// Node.js executable that runs the bridge
    pub node_binary: PathBuf,
}

impl Default for PlaywrightConfig {
    fn default() -> Self {
        Self {
            browser: Browser::Firefox,
            headless: true,
            viewport: Viewport {
                width: 1280,
                height: 720,
            },
            command_timeout: Duration::from_secs(60),
            node_binary: PathBuf::from("node"),
        }
    }
}

/// Resolve playwright from the working directory first, then from the
/// regular node search path (NODE_PATH, global folders).
const RESOLVE_PLAYWRIGHT: &str = r#"
const resolvePlaywright = () => {
  try {
    return require.resolve('playwright', { paths: [process.cwd()] });
  } catch (_) {
    return require.resolve('playwright');
  }
};
"#;

const BRIDGE_BODY: &str = r#"
const readline = require('readline');
const playwright = require(resolvePlaywright());

const engines = {
  chromium: playwright.chromium,
  firefox: playwright.firefox,
  webkit: playwright.webkit,
};

let browser = null;
let page = null;
let dialogSeq = 0;
const dialogs = new Map();

const emit = (message) => {
  process.stdout.write(`${JSON.stringify(message)}\n`);
};

const takeDialog = (dialogId) => {
  const dialog = dialogs.get(dialogId);
  if (!dialog) {
    throw new Error(`no pending dialog ${dialogId}`);
  }
  dialogs.delete(dialogId);
  return dialog;
};

const ops = {
  async launch({ browser: name, headless, viewport }) {
    const engine = engines[name];
    if (!engine) {
      throw new Error(`unknown browser: ${name}`);
    }
    browser = await engine.launch({ headless });
    page = await browser.newPage({ viewport });
    page.on('dialog', (dialog) => {
      dialogSeq += 1;
      dialogs.set(dialogSeq, dialog);
      emit({ event: 'dialog', dialog_id: dialogSeq, kind: dialog.type(), message: dialog.message() });
    });
    return browser.version();
  },
  goto: ({ url, wait_until }) => page.goto(url, { waitUntil: wait_until }).then(() => null),
  click: ({ selector, click_count }) => page.click(selector, { clickCount: click_count }),
  fill: ({ selector, value }) => page.fill(selector, value),
  press: ({ selector, key }) => page.press(selector, key),
  text_content: ({ selector }) => page.textContent(selector),
  input_value: ({ selector }) => page.inputValue(selector),
  is_visible: ({ selector }) => page.locator(selector).isVisible(),
  is_hidden: ({ selector }) => page.locator(selector).isHidden(),
  get_attribute: ({ selector, name }) => page.locator(selector).getAttribute(name),
  wait_for_selector: ({ selector, state, timeout_ms }) =>
    page.waitForSelector(selector, { state, timeout: timeout_ms }).then(() => null),
  storage_get: ({ key }) => page.evaluate((k) => window.localStorage.getItem(k), key),
  dialog_accept: ({ dialog_id }) => takeDialog(dialog_id).accept(),
  dialog_dismiss: ({ dialog_id }) => takeDialog(dialog_id).dismiss(),
  async close() {
    if (browser) {
      await browser.close();
      browser = null;
    }
    setTimeout(() => process.exit(0), 0);
    return null;
  },
};

readline.createInterface({ input: process.stdin })
  .on('line', (line) => {
    let request;
    try {
      request = JSON.parse(line);
    } catch (error) {
      process.stderr.write(`unparseable request: ${line}\n`);
      return;
    }
    const handler = ops[request.op];
    Promise.resolve()
      .then(() => {
        if (!handler) {
          throw new Error(`unknown op: ${request.op}`);
        }
        return handler(request);
      })
      .then((value) => emit({ id: request.id, ok: true, value: value === undefined ? null : value }))
      .catch((error) => emit({ id: request.id, ok: false, error: String((error && error.message) || error) }));
  })
  .on('close', async () => {
    if (browser) {
      await browser.close();
    }
    process.exit(0);
  });
"#;

/// Full bridge script as written to disk
pub fn bridge_script() -> String {
    format!("{}{}", RESOLVE_PLAYWRIGHT, BRIDGE_BODY)
}

/// One bridge operation; serialized with its name under `op`
#[derive(Debug, Clone, Serialize)]
#[serde(tag = "op", rename_all = "snake_case")]
enum BridgeOp {
    Launch {
        browser: &'static str,
        headless: bool,
        viewport: Viewport,
    },
    Goto {
        url: String,
        wait_until: &'static str,
    },
    Click {
        selector: String,
        click_count: u32,
    },
    Fill {
        selector: String,
        value: String,
    },
    Press {
        selector: String,
        key: String,
    },
    TextContent {
        selector: String,
    },
    InputValue {
        selector: String,
    },
    IsVisible {
        selector: String,
    },
    IsHidden {
        selector: String,
    },
    GetAttribute {
        selector: String,
        name: String,
    },
    WaitForSelector {
        selector: String,
        state: WaitState,
        timeout_ms: u64,
    },
    StorageGet {
        key: String,
    },
    DialogAccept {
        dialog_id: u64,
    },
    DialogDismiss {
        dialog_id: u64,
    },
    Close,
}

impl BridgeOp {
    fn name(&self) -> &'static str {
        match self {
            BridgeOp::Launch { .. } => "launch",
            BridgeOp::Goto { .. } => "goto",
            BridgeOp::Click { .. } => "click",
            BridgeOp::Fill { .. } => "fill",
            BridgeOp::Press { .. } => "press",
            BridgeOp::TextContent { .. } => "text_content",
            BridgeOp::InputValue { .. } => "input_value",
            BridgeOp::IsVisible { .. } => "is_visible",
            BridgeOp::IsHidden { .. } => "is_hidden",
            BridgeOp::GetAttribute { .. } => "get_attribute",
            BridgeOp::WaitForSelector { .. } => "wait_for_selector",
            BridgeOp::StorageGet { .. } => "storage_get",
            BridgeOp::DialogAccept { .. } => "dialog_accept",
            BridgeOp::DialogDismiss { .. } => "dialog_dismiss",
            BridgeOp::Close => "close",
        }
    }
}

#[derive(Serialize)]
struct BridgeRequest<'a> {
    id: u64,
    #[serde(flatten)]
    op: &'a BridgeOp,
}

#[derive(Debug, Deserialize)]
#[serde(untagged)]
enum BridgeMessage {
    Reply(BridgeReply),
    Event(BridgeEvent),
}

#[derive(Debug, Deserialize)]
struct BridgeReply {
    id: u64,
    ok: bool,
    #[serde(default)]
    value: Value,
    #[serde(default)]
    error: Option<String>,
}

#[derive(Debug, Deserialize)]
#[serde(tag = "event", rename_all = "snake_case")]
enum BridgeEvent {
    Dialog {
        dialog_id: u64,
        kind: String,
        message: String,
    },
}

fn lock<T>(mutex: &Mutex<T>) -> MutexGuard<'_, T> {
    mutex.lock().unwrap_or_else(PoisonError::into_inner)
}

/// State shared between the handle and its reader task
struct BridgeShared {
    outgoing: mpsc::UnboundedSender<String>,
    pending: Mutex<HashMap<u64, oneshot::Sender<BridgeReply>>>,
    next_id: AtomicU64,
    dialog_handler: Mutex<Option<DialogHandler>>,
    command_timeout: Duration,

    /// Set once the bridge output has ended; nothing will reply after that
    closed: AtomicBool,
}

impl BridgeShared {
    fn new(outgoing: mpsc::UnboundedSender<String>, command_timeout: Duration) -> Self {
        Self {
            outgoing,
            pending: Mutex::new(HashMap::new()),
            next_id: AtomicU64::new(1),
            dialog_handler: Mutex::new(None),
            command_timeout,
            closed: AtomicBool::new(false),
        }
    }

    async fn request(&self, op: BridgeOp) -> E2eResult<Value> {
        let id = self.next_id.fetch_add(1, Ordering::Relaxed);
        let line = serde_json::to_string(&BridgeRequest { id, op: &op })?;
        let (reply_tx, reply_rx) = oneshot::channel();
        lock(&self.pending).insert(id, reply_tx);

        // Checked after inserting so a concurrent `abandon_pending` cannot miss it
        if self.closed.load(Ordering::Acquire) {
            lock(&self.pending).remove(&id);
            return Err(E2eError::Playwright(format!(
                "{}: bridge exited",
                op.name()
            )));
        }

        trace!("bridge <- {}", line);
        if self.outgoing.send(line).is_err() {
            lock(&self.pending).remove(&id);
            return Err(E2eError::Playwright(format!(
                "{}: bridge process is gone",
                op.name()
            )));
        }

        match timeout(self.command_timeout, reply_rx).await {
            Ok(Ok(reply)) if reply.ok => Ok(reply.value),
            Ok(Ok(reply)) => Err(E2eError::Playwright(format!(
                "{} failed: {}",
                op.name(),
                reply.error.unwrap_or_else(|| "unknown error".to_string())
            ))),
            Ok(Err(_)) => Err(E2eError::Playwright(format!(
                "{}: bridge exited before replying",
                op.name()
            ))),
            Err(_) => {
                lock(&self.pending).remove(&id);
                Err(E2eError::Timeout(format!(
                    "{} reply after {} ms",
                    op.name(),
                    self.command_timeout.as_millis()
                )))
            }
        }
    }

    fn dispatch(self: &Arc<Self>, line: &str) {
        trace!("bridge -> {}", line);
        match serde_json::from_str::<BridgeMessage>(line) {
            Ok(BridgeMessage::Reply(reply)) => match lock(&self.pending).remove(&reply.id) {
                Some(reply_tx) => {
                    let _ = reply_tx.send(reply);
                }
                None => warn!("Bridge replied to unknown request {}", reply.id),
            },
            Ok(BridgeMessage::Event(BridgeEvent::Dialog {
                dialog_id,
                kind,
                message,
            })) => self.answer_dialog(dialog_id, Dialog { kind, message }),
            Err(e) => warn!("Ignoring malformed bridge output {:?}: {}", line, e),
        }
    }

    fn answer_dialog(self: &Arc<Self>, dialog_id: u64, dialog: Dialog) {
        let handler = lock(&self.dialog_handler).take();
        let action = match handler {
            Some(handler) => handler(&dialog),
            None => {
                debug!(
                    "No dialog handler registered, dismissing {} dialog",
                    dialog.kind
                );
                DialogAction::Dismiss
            }
        };

        let op = match action {
            DialogAction::Accept => BridgeOp::DialogAccept { dialog_id },
            DialogAction::Dismiss => BridgeOp::DialogDismiss { dialog_id },
        };
        let shared = Arc::clone(self);
        tokio::spawn(async move {
            if let Err(e) = shared.request(op).await {
                warn!("Failed to answer dialog {}: {}", dialog_id, e);
            }
        });
    }

    /// Fail every request still waiting for a reply, and every later one.
    fn abandon_pending(&self) {
        self.closed.store(true, Ordering::Release);
        lock(&self.pending).clear();
    }
}

async fn write_requests(mut stdin: ChildStdin, mut outgoing: mpsc::UnboundedReceiver<String>) {
    while let Some(line) = outgoing.recv().await {
        let written = async {
            stdin.write_all(line.as_bytes()).await?;
            stdin.write_all(b"\n").await?;
            stdin.flush().await
        }
        .await;
        if let Err(e) = written {
            warn!("Failed to write to Playwright bridge: {}", e);
            break;
        }
    }
}

async fn read_replies(shared: Arc<BridgeShared>, stdout: ChildStdout) {
    let mut lines = BufReader::new(stdout).lines();
    loop {
        match lines.next_line().await {
            Ok(Some(line)) => shared.dispatch(&line),
            Ok(None) => break,
            Err(e) => {
                warn!("Failed to read from Playwright bridge: {}", e);
                break;
            }
        }
    }
    debug!("Playwright bridge closed its output");
    shared.abandon_pending();
}

async fn forward_stderr(stderr: ChildStderr) {
    let mut lines = BufReader::new(stderr).lines();
    while let Ok(Some(line)) = lines.next_line().await {
        debug!(target: "playwright", "{}", line);
    }
}

/// Playwright browser handle
pub struct PlaywrightHandle {
    shared: Arc<BridgeShared>,
    child: Child,
    tasks: Vec<JoinHandle<()>>,

    /// Holds the bridge script for the lifetime of the node process
    _script_dir: TempDir,
}

impl PlaywrightHandle {
    /// Check that node can resolve the playwright package
    pub fn check_installed(config: &PlaywrightConfig) -> E2eResult<()> {
        let probe = format!("{}\nresolvePlaywright();", RESOLVE_PLAYWRIGHT);
        let status = Command::new(&config.node_binary)
            .args(["-e", probe.as_str()])
            .stdin(Stdio::null())
            .stdout(Stdio::null())
            .stderr(Stdio::null())
            .status();

        match status {
            Ok(status) if status.success() => Ok(()),
            _ => Err(E2eError::PlaywrightNotFound),
        }
    }

    /// Start the bridge and launch the browser with one page
    pub async fn launch(config: PlaywrightConfig) -> E2eResult<Self> {
        let script_dir = tempfile::tempdir()?;
        let script_path = script_dir.path().join("bridge.js");
        std::fs::write(&script_path, bridge_script())?;
        debug!("Starting Playwright bridge: {}", script_path.display());

        let mut child = TokioCommand::new(&config.node_binary)
            .arg(&script_path)
            .stdin(Stdio::piped())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .kill_on_drop(true)
            .spawn()
            .map_err(|e| {
                E2eError::Playwright(format!(
                    "Failed to spawn {}: {}",
                    config.node_binary.display(),
                    e
                ))
            })?;

        let missing = |stream: &str| E2eError::Playwright(format!("bridge {} unavailable", stream));
        let stdin = child.stdin.take().ok_or_else(|| missing("stdin"))?;
        let stdout = child.stdout.take().ok_or_else(|| missing("stdout"))?;
        let stderr = child.stderr.take().ok_or_else(|| missing("stderr"))?;

        let (outgoing_tx, outgoing_rx) = mpsc::unbounded_channel();
        let shared = Arc::new(BridgeShared::new(outgoing_tx, config.command_timeout));
        let tasks = vec![
            tokio::spawn(write_requests(stdin, outgoing_rx)),
            tokio::spawn(read_replies(Arc::clone(&shared), stdout)),
            tokio::spawn(forward_stderr(stderr)),
        ];

        let handle = Self {
            shared,
            child,
            tasks,
            _script_dir: script_dir,
        };

        let version = handle
            .shared
            .request(BridgeOp::Launch {
                browser: config.browser.as_str(),
                headless: config.headless,
                viewport: config.viewport,
            })
            .await
            .map_err(|e| E2eError::BrowserLaunch(e.to_string()))?;

        info!(
            "Launched {} {} (headless: {})",
            config.browser.as_str(),
            version.as_str().unwrap_or("unknown version"),
            config.headless
        );
        Ok(handle)
    }

    /// Close the browser and wait for the bridge to exit
    pub async fn close(mut self) -> E2eResult<()> {
        let closed = self.shared.request(BridgeOp::Close).await;

        match timeout(Duration::from_secs(5), self.child.wait()).await {
            Ok(Ok(status)) => debug!("Playwright bridge exited with {}", status),
            Ok(Err(e)) => warn!("Failed to wait for Playwright bridge: {}", e),
            Err(_) => {
                warn!("Playwright bridge did not exit, killing it");
                self.child.kill().await?;
            }
        }

        closed.map(drop)
    }

    async fn call<T: DeserializeOwned>(&self, op: BridgeOp) -> E2eResult<T> {
        let name = op.name();
        let value = self.shared.request(op).await?;
        decode_value(name, value)
    }
}

/// Playwright's own wait timeout becomes `Timeout`; other failures
/// (closed page, bad selector) stay as they are.
fn selector_wait_error(selector: &str, err: E2eError) -> E2eError {
    match err {
        E2eError::Playwright(reason)
            if reason.contains("Timeout") && reason.contains("exceeded") =>
        {
            E2eError::Timeout(format!("{}: {}", selector, reason))
        }
        other => other,
    }
}

fn decode_value<T: DeserializeOwned>(op: &str, value: Value) -> E2eResult<T> {
    serde_json::from_value(value.clone())
        .map_err(|e| E2eError::Bridge(format!("{} returned {}: {}", op, value, e)))
}

impl Drop for PlaywrightHandle {
    fn drop(&mut self) {
        for task in &self.tasks {
            task.abort();
        }
    }
}

#[async_trait]
impl Page for PlaywrightHandle {
    async fn goto(&self, url: &str) -> E2eResult<()> {
        self.call(BridgeOp::Goto {
            url: url.to_string(),
            wait_until: "domcontentloaded",
        })
        .await
    }

    async fn click(&self, selector: &str, click_count: u32) -> E2eResult<()> {
        self.call(BridgeOp::Click {
            selector: selector.to_string(),
            click_count,
        })
        .await
    }

    async fn fill(&self, selector: &str, value: &str) -> E2eResult<()> {
        self.call(BridgeOp::Fill {
            selector: selector.to_string(),
            value: value.to_string(),
        })
        .await
    }

    async fn press(&self, selector: &str, key: &str) -> E2eResult<()> {
        self.call(BridgeOp::Press {
            selector: selector.to_string(),
            key: key.to_string(),
        })
        .await
    }

    async fn text_content(&self, selector: &str) -> E2eResult<Option<String>> {
        self.call(BridgeOp::TextContent {
            selector: selector.to_string(),
        })
        .await
    }

    async fn input_value(&self, selector: &str) -> E2eResult<String> {
        self.call(BridgeOp::InputValue {
            selector: selector.to_string(),
        })
        .await
    }

    async fn is_visible(&self, selector: &str) -> E2eResult<bool> {
        self.call(BridgeOp::IsVisible {
            selector: selector.to_string(),
        })
        .await
    }

    async fn is_hidden(&self, selector: &str) -> E2eResult<bool> {
        self.call(BridgeOp::IsHidden {
            selector: selector.to_string(),
        })
        .await
    }

    async fn get_attribute(&self, selector: &str, name: &str) -> E2eResult<Option<String>> {
        self.call(BridgeOp::GetAttribute {
            selector: selector.to_string(),
            name: name.to_string(),
        })
        .await
    }

    async fn wait_for_selector(
        &self,
        selector: &str,
        state: WaitState,
        timeout: Duration,
    ) -> E2eResult<()> {
        self.call(BridgeOp::WaitForSelector {
            selector: selector.to_string(),
            state,
            timeout_ms: timeout.as_millis() as u64,
        })
        .await
        .map_err(|e| selector_wait_error(selector, e))
    }

    async fn local_storage_item(&self, key: &str) -> E2eResult<Option<String>> {
        self.call(BridgeOp::StorageGet {
            key: key.to_string(),
        })
        .await
    }

    fn once_dialog(&self, handler: DialogHandler) {
        *lock(&self.shared.dialog_handler) = Some(handler);
    }
}
