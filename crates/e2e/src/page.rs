//! Browser page abstraction
//!
//! The scenario runner only talks to a [`Page`]. The Playwright bridge is the
//! production implementation; tests drive the runner with an in-process fake.

use std::time::Duration;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};

use crate::error::E2eResult;

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum WaitState {
    #[default]
    Visible,
    Hidden,
    Attached,
    Detached,
}

/// A native dialog (`alert`, `confirm`, `prompt`) raised by the page
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Dialog {
    pub kind: String,
    pub message: String,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DialogAction {
    Accept,
    Dismiss,
}

/// Single-fire dialog callback; consumed by the first dialog after it is set.
pub type DialogHandler = Box<dyn FnOnce(&Dialog) -> DialogAction + Send>;

#[async_trait]
pub trait Page: Send + Sync {
    async fn goto(&self, url: &str) -> E2eResult<()>;

    /// Click `click_count` times as one gesture (3 = triple click).
    async fn click(&self, selector: &str, click_count: u32) -> E2eResult<()>;

    /// Replace the value of an input.
    async fn fill(&self, selector: &str, value: &str) -> E2eResult<()>;

    async fn press(&self, selector: &str, key: &str) -> E2eResult<()>;

    async fn text_content(&self, selector: &str) -> E2eResult<Option<String>>;

    async fn input_value(&self, selector: &str) -> E2eResult<String>;

    async fn is_visible(&self, selector: &str) -> E2eResult<bool>;

    async fn is_hidden(&self, selector: &str) -> E2eResult<bool>;

    async fn get_attribute(&self, selector: &str, name: &str) -> E2eResult<Option<String>>;

    async fn wait_for_selector(
        &self,
        selector: &str,
        state: WaitState,
        timeout: Duration,
    ) -> E2eResult<()>;

    /// Read `window.localStorage.getItem(key)`.
    async fn local_storage_item(&self, key: &str) -> E2eResult<Option<String>>;

    /// Register a handler for the next dialog only. Replaces any handler that
    /// has not fired yet.
    fn once_dialog(&self, handler: DialogHandler);

    async fn wait_for_timeout(&self, duration: Duration) {
        tokio::time::sleep(duration).await;
    }

    /// Trimmed text content, empty when the element has none.
    async fn text(&self, selector: &str) -> E2eResult<String> {
        Ok(self
            .text_content(selector)
            .await?
            .map(|text| text.trim().to_string())
            .unwrap_or_default())
    }
}
