//! Message validation rules.

use beacon_core::error::AppError;

/// Maximum event name length accepted from clients and the HTTP API.
pub const MAX_EVENT_NAME_LENGTH: usize = 200;

/// Validates the raw size and shape of an inbound frame.
pub fn validate_inbound(raw: &str, max_size: usize) -> Result<(), AppError> {
    if raw.len() > max_size {
        return Err(AppError::validation(format!(
            "Message exceeds maximum size of {max_size} bytes"
        )));
    }

    if raw.trim().is_empty() {
        return Err(AppError::validation("Empty message"));
    }

    Ok(())
}

/// Validates channel name format.
pub fn validate_channel_name(channel: &str, max_length: usize) -> Result<(), AppError> {
    if channel.is_empty() || channel.len() > max_length {
        return Err(AppError::validation("Invalid channel name length"));
    }

    if !channel
        .chars()
        .all(|c| c.is_ascii_alphanumeric() || "_-=@,.;".contains(c))
    {
        return Err(AppError::validation(
            "Channel name contains invalid characters",
        ));
    }

    Ok(())
}

/// Validates an event name.
pub fn validate_event_name(event: &str) -> Result<(), AppError> {
    if event.is_empty() || event.len() > MAX_EVENT_NAME_LENGTH {
        return Err(AppError::validation("Invalid event name length"));
    }
    Ok(())
}
