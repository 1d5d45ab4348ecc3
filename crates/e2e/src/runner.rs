//! Scenario runner that drives the game through the fixed scenario script

use std::time::{Duration, Instant};

use tracing::{debug, info, warn};

use crate::contract::{self, selectors, storage_keys};
use crate::error::E2eResult;
use crate::game::{Game, GameTimings, SubmitMethod};
use crate::page::{DialogAction, Page};
use crate::scenario::{ScenarioId, ScenarioResult};
use crate::wait::{wait_for_text, Poll};

/// Configuration for the scenario runner
#[derive(Debug, Clone)]
pub struct RunnerConfig {
    /// Where the game is served
    pub base_url: String,

    /// Round length for the navigation and profile scenarios (T1-T6)
    pub navigation_time_limit: u32,

    /// Round length for the submission scenarios (E1-E4)
    pub gameplay_time_limit: u32,

    /// Round length for the expiry scenario (E5)
    pub expiry_time_limit: u32,

    /// Pause after accepting the reset confirmation
    pub reset_settle: Duration,

    /// Wait for the countdown text in E5
    pub time_left_poll: Poll,

    pub timings: GameTimings,
}

impl Default for RunnerConfig {
    fn default() -> Self {
        Self {
            base_url: "http://127.0.0.1:8082/".to_string(),
            navigation_time_limit: 5,
            gameplay_time_limit: 20,
            expiry_time_limit: 5,
            reset_settle: Duration::from_millis(300),
            time_left_poll: Poll::TEXT,
            timings: GameTimings::default(),
        }
    }
}

/// Runs every scenario in order against one page
///
/// Scenarios share the page and build on each other's state: T3-T6 rely on
/// the profile chosen in T2, and E2-E4 continue the round started for E1.
pub struct ScenarioRunner<'a, P: Page + ?Sized> {
    page: &'a P,
    config: RunnerConfig,
    results: Vec<ScenarioResult>,
}

impl<'a, P: Page + ?Sized> ScenarioRunner<'a, P> {
    pub fn new(page: &'a P, config: RunnerConfig) -> Self {
        Self {
            page,
            config,
            results: Vec::with_capacity(ScenarioId::ALL.len()),
        }
    }

    /// Run all scenarios. Any browser or parse failure aborts the run and
    /// discards the verdicts collected so far.
    pub async fn run(mut self) -> E2eResult<Vec<ScenarioResult>> {
        let start = Instant::now();
        info!("Running {} scenario(s) against {}", ScenarioId::ALL.len(), self.config.base_url);

        self.navigation_scenarios().await?;
        self.gameplay_scenarios().await?;
        self.expiry_scenario().await?;

        let passed = self.results.iter().filter(|r| r.pass).count();
        info!(
            "Scenario results: {} passed, {} failed ({} ms)",
            passed,
            self.results.len() - passed,
            start.elapsed().as_millis()
        );
        Ok(self.results)
    }

    fn game(&self) -> Game<'_, P> {
        Game::new(self.page, &self.config.timings)
    }

    fn record(&mut self, id: ScenarioId, pass: bool) {
        if pass {
            info!("✓ {} {}", id, id.title());
        } else {
            warn!("✗ {} {}", id, id.title());
        }
        self.results.push(ScenarioResult::new(id, pass));
    }

    async fn load(&self, time_limit: u32) -> E2eResult<()> {
        let url = contract::test_mode_url(&self.config.base_url, time_limit)?;
        debug!("Loading {}", url);
        self.page.goto(&url).await
    }

    /// T1-T6 under the short navigation time limit
    async fn navigation_scenarios(&mut self) -> E2eResult<()> {
        self.load(self.config.navigation_time_limit).await?;

        let pass = self.first_screen_is_profile_select().await?;
        self.record(ScenarioId::T1, pass);

        let pass = self.choose_profile_b().await?;
        self.record(ScenarioId::T2, pass);

        let last_profile = self.page.local_storage_item(storage_keys::LAST_PROFILE).await?;
        self.record(ScenarioId::T3, last_profile.as_deref() == Some("B"));

        let pass = self.back_to_profile_select().await?;
        self.record(ScenarioId::T4, pass);

        let pass = self.profiles_keep_separate_records().await?;
        self.record(ScenarioId::T5, pass);

        let pass = self.reset_clears_only_profile_a().await?;
        self.record(ScenarioId::T6, pass);

        Ok(())
    }

    async fn first_screen_is_profile_select(&self) -> E2eResult<bool> {
        let profile_visible = self.page.is_visible(selectors::PROFILE_SELECT_SCREEN).await?;
        let title_hidden = self.page.is_hidden(selectors::TITLE_SCREEN).await?;
        Ok(profile_visible && title_hidden)
    }

    async fn choose_profile_b(&self) -> E2eResult<bool> {
        self.page.click(&selectors::profile_item("B"), 1).await?;
        let label = self.page.text(selectors::PROFILE_SELECT_CURRENT).await?;
        self.page.click(selectors::PROFILE_SELECT_CONTINUE, 1).await?;
        let title_visible = self.page.is_visible(selectors::TITLE_SCREEN).await?;
        Ok(label == "B" && title_visible)
    }

    async fn back_to_profile_select(&self) -> E2eResult<bool> {
        self.page.click(selectors::TITLE_FREE_BUTTON, 1).await?;
        self.page.click(selectors::SETTINGS_PROFILE_BUTTON, 1).await?;
        self.page.is_visible(selectors::PROFILE_SELECT_SCREEN).await
    }

    async fn profiles_keep_separate_records(&self) -> E2eResult<bool> {
        let game = self.game();

        let a = game.play_one_round("A").await?;
        self.page.click(selectors::RESULT_BACK_BUTTON, 1).await?;
        self.page.click(selectors::SETTINGS_PROFILE_BUTTON, 1).await?;

        let b = game.play_one_round("B").await?;
        self.page.click(selectors::RESULT_BACK_BUTTON, 1).await?;

        debug!("Profile A records: {:?}", a);
        debug!("Profile B records: {:?}", b);
        Ok(a.is_complete() && b.is_complete() && a != b)
    }

    async fn reset_clears_only_profile_a(&self) -> E2eResult<bool> {
        let game = self.game();

        self.page.click(selectors::SETTINGS_PROFILE_BUTTON, 1).await?;
        self.page.click(&selectors::profile_item("A"), 1).await?;
        self.page.click(selectors::PROFILE_SELECT_CONTINUE, 1).await?;
        self.page.click(selectors::TITLE_FREE_BUTTON, 1).await?;
        game.open_settings_details().await?;

        self.page.once_dialog(Box::new(|dialog| {
            debug!("Accepting {} dialog: {}", dialog.kind, dialog.message);
            DialogAction::Accept
        }));
        self.page.click(selectors::SETTINGS_PROFILE_RESET, 1).await?;
        self.page.wait_for_timeout(self.config.reset_settle).await;

        let a = game.profile_records("A").await?;
        let b = game.profile_records("B").await?;
        Ok(a.is_cleared() && b.is_retained())
    }

    /// E1-E4 within one longer round as profile C
    async fn gameplay_scenarios(&mut self) -> E2eResult<()> {
        self.load(self.config.gameplay_time_limit).await?;
        let timings = self.config.timings.clone();
        let game = Game::new(self.page, &timings);
        game.start_free_game("C").await?;

        let before = game.correct_count().await?;
        game.submit_answer(SubmitMethod::Enter).await?;
        let after_enter = game.correct_count().await?;
        self.record(ScenarioId::E1, after_enter == before + 1);

        game.submit_answer(SubmitMethod::Click).await?;
        let after_click = game.correct_count().await?;
        self.record(ScenarioId::E2, after_click == after_enter + 1);

        self.page.click(selectors::GAME_KEYPAD_TOGGLE, 1).await?;
        self.page.click(&selectors::keypad_key("1"), 1).await?;
        self.page.click(&selectors::keypad_key("2"), 1).await?;
        let keypad_value = self.page.input_value(selectors::GAME_ANSWER_INPUT).await?;
        self.record(ScenarioId::E3, keypad_value.ends_with("12"));
        game.submit_answer(SubmitMethod::Click).await?;

        let before = game.correct_count().await?;
        game.submit_answer(SubmitMethod::Rapid).await?;
        let after_rapid = game.correct_count().await?;
        self.record(ScenarioId::E4, after_rapid == before + 1);
        Ok(())
    }

    /// E5 as profile D under the short time limit
    async fn expiry_scenario(&mut self) -> E2eResult<()> {
        self.load(self.config.expiry_time_limit).await?;
        let timings = self.config.timings.clone();
        let game = Game::new(self.page, &timings);
        game.start_free_game("D").await?;

        let time_left_ready = wait_for_text(
            self.page,
            selectors::GAME_TIME_LEFT,
            "1",
            self.config.time_left_poll,
        )
        .await?;
        game.submit_answer(SubmitMethod::Click).await?;
        game.wait_for_result().await?;

        self.record(ScenarioId::E5, time_left_ready);
        Ok(())
    }
}
