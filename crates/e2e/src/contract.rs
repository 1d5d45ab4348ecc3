//! The page contract of the game: element selectors, storage keys and the
//! query flags that put it into test mode

use reqwest::Url;

use crate::error::{E2eError, E2eResult};

pub mod selectors {
    pub const PROFILE_SELECT_SCREEN: &str = "#profile-select-screen";
    pub const TITLE_SCREEN: &str = "#title-screen";
    pub const GAME_SCREEN: &str = "#game-screen";
    pub const RESULT_SCREEN: &str = "#result-screen";

    pub const PROFILE_SELECT_CONTINUE: &str = "#profile-select-continue";
    pub const PROFILE_SELECT_CURRENT: &str = "#profile-select-current";
    pub const TITLE_FREE_BUTTON: &str = "#title-free-button";
    pub const SETTINGS_PLAY_BUTTON: &str = "#settings-play-button";
    pub const SETTINGS_PROFILE_BUTTON: &str = "#settings-profile-button";
    pub const SETTINGS_PROFILE_RESET: &str = "#settings-profile-reset";
    pub const SETTINGS_DETAILS: &str = "details.settings-details";
    pub const SETTINGS_DETAILS_SUMMARY: &str = "summary.settings-details__summary";
    pub const RESULT_BACK_BUTTON: &str = "#result-back-button";

    pub const GAME_QUESTION: &str = "#game-question";
    pub const GAME_TIME_LEFT: &str = "#game-time-left";
    pub const GAME_CORRECT_COUNT: &str = "#game-correct-count";
    pub const GAME_ANSWER_INPUT: &str = "#game-answer-input";
    pub const GAME_SUBMIT_BUTTON: &str = "#game-submit-button";
    pub const GAME_KEYPAD_TOGGLE: &str = "#game-keypad-toggle";

    /// Profile picker entry
    pub fn profile_item(profile_id: &str) -> String {
        format!(r#"[data-profile-id="{}"]"#, profile_id)
    }

    /// On-screen keypad key
    pub fn keypad_key(key: &str) -> String {
        format!(r#"[data-keypad-key="{}"]"#, key)
    }
}

pub mod storage_keys {
    pub const LAST_PROFILE: &str = "calc-sprint::meta::last-profile";

    pub fn daily(profile_id: &str) -> String {
        format!("calc-sprint::{}::daily.v1", profile_id)
    }

    pub fn rank(profile_id: &str) -> String {
        format!("calc-sprint::{}::rank.distance.today.v1", profile_id)
    }
}

/// Base URL with `test=1&timeLimit=<secs>` appended. Query pairs already on
/// the base URL are kept.
pub fn test_mode_url(base_url: &str, time_limit_secs: u32) -> E2eResult<String> {
    let mut url = Url::parse(base_url).map_err(|e| E2eError::InvalidBaseUrl {
        url: base_url.to_string(),
        reason: e.to_string(),
    })?;
    if url.cannot_be_a_base() {
        return Err(E2eError::InvalidBaseUrl {
            url: base_url.to_string(),
            reason: "not a hierarchical URL".to_string(),
        });
    }

    url.query_pairs_mut()
        .append_pair("test", "1")
        .append_pair("timeLimit", &time_limit_secs.to_string());
    Ok(url.to_string())
}
