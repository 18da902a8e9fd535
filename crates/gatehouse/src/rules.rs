//! Input validation.
//!
//! Everything here is pure, so it runs before any store or hasher is
//! touched. Lengths count characters, not bytes, and nothing is trimmed:
//! `" Bob"` is rejected rather than silently turned into `"Bob"`.

use gatehouse_protocol::{CharacterName, Password, PlayerId, Username};

use crate::{AuthConfig, AuthError};

pub(crate) fn validate_username(
    username: &Username,
    config: &AuthConfig,
) -> Result<(), AuthError> {
    let raw = username.as_str();
    if raw.is_empty() {
        return Err(AuthError::Validation("username must not be empty".into()));
    }
    if raw.chars().count() > config.username_max {
        return Err(AuthError::Validation(format!(
            "username must be at most {} characters",
            config.username_max
        )));
    }
    if has_blank_or_control(raw) {
        return Err(AuthError::Validation(
            "username must not contain whitespace or control characters".into(),
        ));
    }
    Ok(())
}

pub(crate) fn validate_password(
    password: &Password,
    config: &AuthConfig,
) -> Result<(), AuthError> {
    let raw = password.expose();
    if raw.is_empty() {
        return Err(AuthError::Validation("password must not be empty".into()));
    }
    if raw.len() > config.password_max {
        return Err(AuthError::Validation(format!(
            "password must be at most {} bytes",
            config.password_max
        )));
    }
    Ok(())
}

pub(crate) fn validate_character_name(
    name: &CharacterName,
    config: &AuthConfig,
) -> Result<(), AuthError> {
    let len = name.char_len();
    if len < config.character_name_min || len > config.character_name_max {
        return Err(AuthError::Validation(format!(
            "character name must be {} to {} characters",
            config.character_name_min, config.character_name_max
        )));
    }
    if has_blank_or_control(name.as_str()) {
        return Err(AuthError::Validation(
            "character name must not contain whitespace or control characters".into(),
        ));
    }
    Ok(())
}

pub(crate) fn validate_player_id(player_id: PlayerId) -> Result<(), AuthError> {
    if !player_id.is_valid() {
        return Err(AuthError::Validation(format!(
            "player id must be positive, got {}",
            player_id.0
        )));
    }
    Ok(())
}

fn has_blank_or_control(s: &str) -> bool {
    s.chars().any(|c| c.is_whitespace() || c.is_control())
}
