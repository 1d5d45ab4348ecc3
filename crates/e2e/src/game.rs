//! Multi-step game flows shared by scenarios

use std::time::Duration;

use tracing::debug;

use crate::contract::{selectors, storage_keys};
use crate::error::{E2eError, E2eResult};
use crate::page::{Page, WaitState};
use crate::question::compute_answer;
use crate::wait::Poll;

/// How an answer is submitted
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SubmitMethod {
    /// Enter key in the answer input
    Enter,
    /// One click on the submit button
    Click,
    /// Triple click on the submit button
    Rapid,
}

impl SubmitMethod {
    fn click_count(&self) -> u32 {
        match self {
            SubmitMethod::Rapid => 3,
            _ => 1,
        }
    }
}

/// A profile's persisted records as read back from local storage
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ProfileRecords {
    pub daily: Option<String>,
    pub rank: Option<String>,
}

impl ProfileRecords {
    /// Both records exist and are non-empty.
    pub fn is_complete(&self) -> bool {
        let present = |value: &Option<String>| value.as_deref().is_some_and(|v| !v.is_empty());
        present(&self.daily) && present(&self.rank)
    }

    pub fn is_cleared(&self) -> bool {
        self.daily.is_none() && self.rank.is_none()
    }

    pub fn is_retained(&self) -> bool {
        self.daily.is_some() && self.rank.is_some()
    }
}

/// Timing knobs for game flows
#[derive(Debug, Clone)]
pub struct GameTimings {
    /// Wait for the answer input before submitting
    pub input_timeout: Duration,
    /// Wait for the result screen after a round
    pub result_timeout: Duration,
    /// Wait for the game screen after pressing play
    pub game_start_timeout: Duration,
    /// Pause after expanding the settings details
    pub details_settle: Duration,
    /// Progress check after a submission
    pub progress_poll: Poll,
}

impl Default for GameTimings {
    fn default() -> Self {
        Self {
            input_timeout: Duration::from_secs(5),
            result_timeout: Duration::from_secs(10),
            game_start_timeout: Duration::from_secs(30),
            details_settle: Duration::from_millis(100),
            progress_poll: Poll::PROGRESS,
        }
    }
}

/// Game flows over a borrowed page
pub struct Game<'a, P: Page + ?Sized> {
    page: &'a P,
    timings: &'a GameTimings,
}

impl<'a, P: Page + ?Sized> Game<'a, P> {
    pub fn new(page: &'a P, timings: &'a GameTimings) -> Self {
        Self { page, timings }
    }

    /// Pick a profile and go straight into a free-play round.
    pub async fn start_free_game(&self, profile_id: &str) -> E2eResult<()> {
        debug!("Starting free game as profile {}", profile_id);
        self.page.click(&selectors::profile_item(profile_id), 1).await?;
        self.page.click(selectors::PROFILE_SELECT_CONTINUE, 1).await?;
        self.page.click(selectors::TITLE_FREE_BUTTON, 1).await?;
        self.page.click(selectors::SETTINGS_PLAY_BUTTON, 1).await?;
        self.page
            .wait_for_selector(
                selectors::GAME_SCREEN,
                WaitState::Visible,
                self.timings.game_start_timeout,
            )
            .await
    }

    /// Expand the settings details panel unless it is already open.
    pub async fn open_settings_details(&self) -> E2eResult<()> {
        let open = self.page.get_attribute(selectors::SETTINGS_DETAILS, "open").await?;
        if open.is_none() {
            self.page.click(selectors::SETTINGS_DETAILS_SUMMARY, 1).await?;
            self.page.wait_for_timeout(self.timings.details_settle).await;
        }
        Ok(())
    }

    /// Answer the current question correctly, then wait until the game moves
    /// on to another question or to the result screen.
    pub async fn submit_answer(&self, method: SubmitMethod) -> E2eResult<()> {
        self.page
            .wait_for_selector(
                selectors::GAME_ANSWER_INPUT,
                WaitState::Visible,
                self.timings.input_timeout,
            )
            .await?;

        let question = self.page.text(selectors::GAME_QUESTION).await?;
        let answer = compute_answer(&question)?;
        debug!("Answering {:?} with {} via {:?}", question, answer, method);

        self.page
            .fill(selectors::GAME_ANSWER_INPUT, &answer.to_string())
            .await?;
        match method {
            SubmitMethod::Enter => {
                self.page
                    .press(selectors::GAME_ANSWER_INPUT, "Enter")
                    .await?
            }
            SubmitMethod::Click | SubmitMethod::Rapid => {
                self.page
                    .click(selectors::GAME_SUBMIT_BUTTON, method.click_count())
                    .await?
            }
        }

        let page = self.page;
        let question = question.as_str();
        self.timings
            .progress_poll
            .expect("next question or result screen", || async move {
                if page.is_visible(selectors::RESULT_SCREEN).await? {
                    return Ok(true);
                }
                Ok::<_, E2eError>(page.text(selectors::GAME_QUESTION).await? != question)
            })
            .await
    }

    /// Current value of the correct-answer counter. A missing or empty
    /// counter reads as 0; whitespace alone does not.
    pub async fn correct_count(&self) -> E2eResult<u32> {
        let text = self
            .page
            .text_content(selectors::GAME_CORRECT_COUNT)
            .await?
            .unwrap_or_default();
        if text.is_empty() {
            return Ok(0);
        }
        text.trim().parse().map_err(|_| E2eError::UnexpectedText {
            selector: selectors::GAME_CORRECT_COUNT.to_string(),
            text,
        })
    }

    pub async fn wait_for_result(&self) -> E2eResult<()> {
        self.page
            .wait_for_selector(
                selectors::RESULT_SCREEN,
                WaitState::Visible,
                self.timings.result_timeout,
            )
            .await
    }

    pub async fn profile_records(&self, profile_id: &str) -> E2eResult<ProfileRecords> {
        Ok(ProfileRecords {
            daily: self
                .page
                .local_storage_item(&storage_keys::daily(profile_id))
                .await?,
            rank: self
                .page
                .local_storage_item(&storage_keys::rank(profile_id))
                .await?,
        })
    }

    /// Play one round as `profile_id` with a single correct answer and read
    /// back the records it left behind.
    pub async fn play_one_round(&self, profile_id: &str) -> E2eResult<ProfileRecords> {
        self.start_free_game(profile_id).await?;
        self.submit_answer(SubmitMethod::Click).await?;
        self.wait_for_result().await?;
        self.profile_records(profile_id).await
    }
}
