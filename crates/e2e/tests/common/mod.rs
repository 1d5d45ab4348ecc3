//! In-process stand-in for the Calc Sprint page
//!
//! Implements [`Page`] over a small model of the game's screens, timer and
//! local storage so the runner can be exercised without a browser. All time
//! is tokio time; run tests with `start_paused = true`.

#![allow(dead_code)]

use std::collections::HashMap;
use std::sync::Mutex;
use std::time::Duration;

use async_trait::async_trait;
use reqwest::Url;
use tokio::time::Instant;

use calc_sprint_e2e::contract::{selectors, storage_keys};
use calc_sprint_e2e::page::{Dialog, DialogAction, DialogHandler, Page, WaitState};
use calc_sprint_e2e::{E2eError, E2eResult};

/// Time between a submission and the next question
const FEEDBACK_DELAY: Duration = Duration::from_millis(500);

const PROFILES: [&str; 4] = ["A", "B", "C", "D"];

/// Deliberate defects the fake can be built with
#[derive(Debug, Clone, Copy, Default)]
pub struct Quirks {
    /// Submissions are not locked while feedback shows
    pub no_debounce: bool,
    /// Profile reset clears every profile
    pub reset_wipes_all: bool,
    /// Question text the driver cannot parse
    pub garbled_question: bool,
    /// The next question never loads after a submission
    pub stuck_submit: bool,
    /// Title screen stays visible behind profile select
    pub title_visible_on_profile_select: bool,
    /// Current-profile label only updates after continuing
    pub stale_profile_label: bool,
    /// Continuing does not store the last profile
    pub last_profile_not_saved: bool,
    /// Profile select reached from settings keeps its screen hidden
    pub profile_screen_hidden_from_settings: bool,
    /// Records carry no timestamp, so equal rounds save equal records
    pub identical_records: bool,
    /// A correct Enter submission counts twice
    pub enter_counts_twice: bool,
    /// A correct click submission counts twice
    pub click_counts_twice: bool,
    /// Keypad keys do not reach the answer input
    pub keypad_ignored: bool,
    /// Fixed text rendered in the correct-answer counter
    pub counter_text: Option<&'static str>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Screen {
    ProfileSelect,
    Title,
    Settings,
    Game,
    Result,
}

#[derive(Debug, Clone, Copy)]
struct Question {
    left: i64,
    symbol: char,
    right: i64,
}

impl Question {
    fn nth(n: u64) -> Self {
        let a = (n % 9 + 2) as i64;
        let b = (n * 7 % 11 + 3) as i64;
        match n % 4 {
            0 => Question { left: a * 10 + b, symbol: '+', right: b },
            1 => Question { left: a * 10 + b, symbol: '-', right: a },
            2 => Question { left: a, symbol: '×', right: b },
            _ => Question { left: a * b, symbol: '÷', right: b },
        }
    }

    fn answer(&self) -> i64 {
        match self.symbol {
            '+' => self.left + self.right,
            '-' => self.left - self.right,
            '×' => self.left * self.right,
            _ => self.left / self.right,
        }
    }

    fn text(&self) -> String {
        format!("{} {} {} = ?", self.left, self.symbol, self.right)
    }
}

struct Round {
    started: Instant,
    question: Question,
    question_seq: u64,
    correct: u32,
    answer: String,
    keypad_open: bool,
    /// Set while feedback shows; the next question loads at this instant
    next_question_at: Option<Instant>,
}

struct State {
    screen: Screen,
    time_limit: u32,
    selected_profile: String,
    active_profile: String,
    details_open: bool,
    /// Profile select was opened from the settings screen
    profile_from_settings: bool,
    storage: HashMap<String, String>,
    round: Option<Round>,
    rounds_played: u64,
    dialog_handler: Option<DialogHandler>,
    dialogs: Vec<(Dialog, DialogAction)>,
}

pub struct FakeCalcSprint {
    state: Mutex<State>,
    quirks: Quirks,
    created: Instant,
}

impl FakeCalcSprint {
    pub fn new() -> Self {
        Self::with_quirks(Quirks::default())
    }

    pub fn with_quirks(quirks: Quirks) -> Self {
        Self {
            state: Mutex::new(State {
                screen: Screen::ProfileSelect,
                time_limit: 60,
                selected_profile: "A".to_string(),
                active_profile: "A".to_string(),
                details_open: false,
                profile_from_settings: false,
                storage: HashMap::new(),
                round: None,
                rounds_played: 0,
                dialog_handler: None,
                dialogs: Vec::new(),
            }),
            quirks,
            created: Instant::now(),
        }
    }

    /// Current local storage value, without going through the page
    pub fn storage_item(&self, key: &str) -> Option<String> {
        self.state.lock().unwrap().storage.get(key).cloned()
    }

    /// Dialogs raised so far with the action taken on each
    pub fn dialogs(&self) -> Vec<(Dialog, DialogAction)> {
        self.state.lock().unwrap().dialogs.clone()
    }

    pub fn rounds_played(&self) -> u64 {
        self.state.lock().unwrap().rounds_played
    }

    /// Advance timers to `now`: load pending questions and end expired rounds.
    fn tick(&self, state: &mut State) {
        let now = Instant::now();
        let Some(round) = state.round.as_mut() else {
            return;
        };

        if let Some(at) = round.next_question_at {
            if now >= at && !self.quirks.stuck_submit {
                round.question_seq += 1;
                round.question = Question::nth(round.question_seq);
                round.answer.clear();
                round.next_question_at = None;
            }
        }

        let limit = Duration::from_secs(u64::from(state.time_limit));
        if state.screen == Screen::Game && now.duration_since(round.started) >= limit {
            let correct = round.correct;
            state.round = None;
            state.screen = Screen::Result;
            self.save_records(state, correct);
        }
    }

    fn save_records(&self, state: &mut State, correct: u32) {
        let saved_at = Instant::now().duration_since(self.created).as_millis() as u64;
        let profile = state.active_profile.clone();

        let attempts = state
            .storage
            .get(&storage_keys::daily(&profile))
            .and_then(|daily| serde_json::from_str::<serde_json::Value>(daily).ok())
            .and_then(|daily| daily["attempts"].as_u64())
            .unwrap_or(0)
            + 1;
        let mut daily = serde_json::json!({
            "attempts": attempts,
            "bestCorrect": correct,
        });
        let mut rank = serde_json::json!({ "distance": correct * 10 });
        if !self.quirks.identical_records {
            daily["savedAtMs"] = serde_json::json!(saved_at);
            rank["savedAtMs"] = serde_json::json!(saved_at);
        }
        let rank = serde_json::Value::Array(vec![rank]);

        state
            .storage
            .insert(storage_keys::daily(&profile), daily.to_string());
        state
            .storage
            .insert(storage_keys::rank(&profile), rank.to_string());
        state.rounds_played += 1;
    }

    fn visible(&self, state: &State, selector: &str) -> bool {
        let screen = state.screen;
        match selector {
            selectors::PROFILE_SELECT_SCREEN => {
                let hidden =
                    self.quirks.profile_screen_hidden_from_settings && state.profile_from_settings;
                screen == Screen::ProfileSelect && !hidden
            }
            selectors::PROFILE_SELECT_CONTINUE | selectors::PROFILE_SELECT_CURRENT => {
                screen == Screen::ProfileSelect
            }
            selectors::TITLE_SCREEN => {
                screen == Screen::Title
                    || (self.quirks.title_visible_on_profile_select
                        && screen == Screen::ProfileSelect)
            }
            selectors::TITLE_FREE_BUTTON => screen == Screen::Title,
            selectors::SETTINGS_PLAY_BUTTON
            | selectors::SETTINGS_PROFILE_BUTTON
            | selectors::SETTINGS_DETAILS
            | selectors::SETTINGS_DETAILS_SUMMARY => screen == Screen::Settings,
            selectors::SETTINGS_PROFILE_RESET => screen == Screen::Settings && state.details_open,
            selectors::GAME_SCREEN
            | selectors::GAME_QUESTION
            | selectors::GAME_TIME_LEFT
            | selectors::GAME_CORRECT_COUNT
            | selectors::GAME_ANSWER_INPUT
            | selectors::GAME_SUBMIT_BUTTON
            | selectors::GAME_KEYPAD_TOGGLE => screen == Screen::Game,
            selectors::RESULT_SCREEN | selectors::RESULT_BACK_BUTTON => screen == Screen::Result,
            other => {
                if let Some(profile) = profile_of(other) {
                    screen == Screen::ProfileSelect && PROFILES.contains(&profile)
                } else if other.starts_with("[data-keypad-key=") {
                    screen == Screen::Game && state.round.as_ref().is_some_and(|r| r.keypad_open)
                } else {
                    false
                }
            }
        }
    }

    /// Judge the answer input; true when a correct answer was counted.
    fn submit(&self, round: &mut Round) -> bool {
        let locked = round.next_question_at.is_some();
        if locked && !self.quirks.no_debounce {
            return false;
        }
        let correct = round.answer.trim().parse::<i64>().ok() == Some(round.question.answer());
        if correct {
            round.correct += 1;
        }
        round.next_question_at = Some(Instant::now() + FEEDBACK_DELAY);
        correct
    }

    fn start_round(&self, state: &mut State) {
        let seq = state.rounds_played * 10;
        state.round = Some(Round {
            started: Instant::now(),
            question: Question::nth(seq),
            question_seq: seq,
            correct: 0,
            answer: String::new(),
            keypad_open: false,
            next_question_at: None,
        });
        state.screen = Screen::Game;
    }

    fn reset_profile(&self, state: &mut State) {
        let message = format!("Reset all data for profile {}?", state.active_profile);
        let dialog = Dialog {
            kind: "confirm".to_string(),
            message,
        };
        let action = match state.dialog_handler.take() {
            Some(handler) => handler(&dialog),
            None => DialogAction::Dismiss,
        };
        state.dialogs.push((dialog, action));
        if action == DialogAction::Dismiss {
            return;
        }

        if self.quirks.reset_wipes_all {
            state.storage.retain(|key, _| !key.starts_with("calc-sprint::"));
        } else {
            let profile = state.active_profile.clone();
            state.storage.remove(&storage_keys::daily(&profile));
            state.storage.remove(&storage_keys::rank(&profile));
        }
    }
}

fn profile_of(selector: &str) -> Option<&str> {
    selector
        .strip_prefix("[data-profile-id=\"")
        .and_then(|rest| rest.strip_suffix("\"]"))
}

fn keypad_digit(selector: &str) -> Option<&str> {
    selector
        .strip_prefix("[data-keypad-key=\"")
        .and_then(|rest| rest.strip_suffix("\"]"))
}

fn not_visible(selector: &str) -> E2eError {
    E2eError::Playwright(format!("element not visible: {}", selector))
}

#[async_trait]
impl Page for FakeCalcSprint {
    async fn goto(&self, url: &str) -> E2eResult<()> {
        let url = Url::parse(url).map_err(|e| E2eError::Playwright(e.to_string()))?;
        let time_limit = url
            .query_pairs()
            .find(|(key, _)| key == "timeLimit")
            .and_then(|(_, value)| value.parse().ok())
            .unwrap_or(60);

        let mut state = self.state.lock().unwrap();
        state.time_limit = time_limit;
        state.screen = Screen::ProfileSelect;
        state.round = None;
        state.details_open = false;
        state.profile_from_settings = false;
        if let Some(last) = state.storage.get(storage_keys::LAST_PROFILE).cloned() {
            state.selected_profile = last;
        }
        Ok(())
    }

    async fn click(&self, selector: &str, click_count: u32) -> E2eResult<()> {
        let mut guard = self.state.lock().unwrap();
        let state = &mut *guard;
        self.tick(state);
        if !self.visible(state, selector) {
            return Err(not_visible(selector));
        }

        match selector {
            selectors::PROFILE_SELECT_CONTINUE => {
                state.active_profile = state.selected_profile.clone();
                if !self.quirks.last_profile_not_saved {
                    state.storage.insert(
                        storage_keys::LAST_PROFILE.to_string(),
                        state.active_profile.clone(),
                    );
                }
                state.screen = Screen::Title;
            }
            selectors::TITLE_FREE_BUTTON => state.screen = Screen::Settings,
            selectors::SETTINGS_PROFILE_BUTTON => {
                state.profile_from_settings = true;
                state.screen = Screen::ProfileSelect;
            }
            selectors::SETTINGS_DETAILS_SUMMARY => state.details_open = !state.details_open,
            selectors::SETTINGS_PLAY_BUTTON => self.start_round(state),
            selectors::SETTINGS_PROFILE_RESET => self.reset_profile(state),
            selectors::RESULT_BACK_BUTTON => state.screen = Screen::Settings,
            selectors::GAME_SUBMIT_BUTTON => {
                if let Some(round) = state.round.as_mut() {
                    for _ in 0..click_count {
                        if self.submit(round) && self.quirks.click_counts_twice {
                            round.correct += 1;
                        }
                    }
                }
            }
            selectors::GAME_KEYPAD_TOGGLE => {
                if let Some(round) = state.round.as_mut() {
                    round.keypad_open = !round.keypad_open;
                }
            }
            other => {
                if let Some(profile) = profile_of(other) {
                    state.selected_profile = profile.to_string();
                } else if let (Some(digit), Some(round)) =
                    (keypad_digit(other), state.round.as_mut())
                {
                    if !self.quirks.keypad_ignored {
                        round.answer.push_str(digit);
                    }
                }
            }
        }
        Ok(())
    }

    async fn fill(&self, selector: &str, value: &str) -> E2eResult<()> {
        let mut guard = self.state.lock().unwrap();
        self.tick(&mut guard);
        if selector != selectors::GAME_ANSWER_INPUT || !self.visible(&guard, selector) {
            return Err(not_visible(selector));
        }
        if let Some(round) = guard.round.as_mut() {
            round.answer = value.to_string();
        }
        Ok(())
    }

    async fn press(&self, selector: &str, key: &str) -> E2eResult<()> {
        let mut guard = self.state.lock().unwrap();
        self.tick(&mut guard);
        if selector != selectors::GAME_ANSWER_INPUT || !self.visible(&guard, selector) {
            return Err(not_visible(selector));
        }
        if key == "Enter" {
            if let Some(round) = guard.round.as_mut() {
                if self.submit(round) && self.quirks.enter_counts_twice {
                    round.correct += 1;
                }
            }
        }
        Ok(())
    }

    async fn text_content(&self, selector: &str) -> E2eResult<Option<String>> {
        let mut guard = self.state.lock().unwrap();
        self.tick(&mut guard);
        let state = &*guard;

        let text = match (selector, state.round.as_ref()) {
            (selectors::PROFILE_SELECT_CURRENT, _) if self.quirks.stale_profile_label => {
                Some(state.active_profile.clone())
            }
            (selectors::PROFILE_SELECT_CURRENT, _) => Some(state.selected_profile.clone()),
            (selectors::GAME_QUESTION, Some(_)) if self.quirks.garbled_question => {
                Some("what is seven and three?".to_string())
            }
            (selectors::GAME_QUESTION, Some(round)) => Some(round.question.text()),
            (selectors::GAME_CORRECT_COUNT, Some(_)) if self.quirks.counter_text.is_some() => {
                self.quirks.counter_text.map(str::to_string)
            }
            (selectors::GAME_CORRECT_COUNT, Some(round)) => Some(round.correct.to_string()),
            (selectors::GAME_TIME_LEFT, Some(round)) => {
                let elapsed = Instant::now().duration_since(round.started).as_secs();
                Some(u64::from(state.time_limit).saturating_sub(elapsed).to_string())
            }
            _ => None,
        };
        Ok(text)
    }

    async fn input_value(&self, selector: &str) -> E2eResult<String> {
        let mut guard = self.state.lock().unwrap();
        self.tick(&mut guard);
        match guard.round.as_ref() {
            Some(round) if selector == selectors::GAME_ANSWER_INPUT => Ok(round.answer.clone()),
            _ => Err(not_visible(selector)),
        }
    }

    async fn is_visible(&self, selector: &str) -> E2eResult<bool> {
        let mut guard = self.state.lock().unwrap();
        self.tick(&mut guard);
        Ok(self.visible(&guard, selector))
    }

    async fn is_hidden(&self, selector: &str) -> E2eResult<bool> {
        Ok(!self.is_visible(selector).await?)
    }

    async fn get_attribute(&self, selector: &str, name: &str) -> E2eResult<Option<String>> {
        let state = self.state.lock().unwrap();
        let open = selector == selectors::SETTINGS_DETAILS && name == "open" && state.details_open;
        Ok(open.then(String::new))
    }

    async fn wait_for_selector(
        &self,
        selector: &str,
        state: WaitState,
        timeout: Duration,
    ) -> E2eResult<()> {
        let deadline = Instant::now() + timeout;
        loop {
            let visible = self.is_visible(selector).await?;
            let reached = match state {
                WaitState::Visible | WaitState::Attached => visible,
                WaitState::Hidden | WaitState::Detached => !visible,
            };
            if reached {
                return Ok(());
            }
            if Instant::now() >= deadline {
                return Err(E2eError::Timeout(format!("{} to be {:?}", selector, state)));
            }
            tokio::time::sleep(Duration::from_millis(50)).await;
        }
    }

    async fn local_storage_item(&self, key: &str) -> E2eResult<Option<String>> {
        Ok(self.storage_item(key))
    }

    fn once_dialog(&self, handler: DialogHandler) {
        self.state.lock().unwrap().dialog_handler = Some(handler);
    }
}
