use chrono::{DateTime, NaiveDate, NaiveTime, TimeZone, Utc};

use super::domain::{Actor, Role, UserAccount, UserId};
use super::error::PipelineError;
use super::repository::UserDirectory;

pub(crate) const MESSAGE_MAX_CHARS: usize = 2000;
pub(crate) const LEAD_NOTE_MAX_CHARS: usize = 4000;
pub(crate) const DEAL_NOTE_MAX_CHARS: usize = 2000;

pub(crate) fn require_role(actor: &Actor, roles: &[Role]) -> Result<(), PipelineError> {
    if roles.contains(&actor.role) {
        Ok(())
    } else {
        Err(PipelineError::Forbidden)
    }
}

/// Trim free text; blank becomes `None`.
pub(crate) fn optional_text(
    field: &'static str,
    value: Option<String>,
    max_chars: usize,
) -> Result<Option<String>, PipelineError> {
    let Some(value) = value else {
        return Ok(None);
    };
    let trimmed = value.trim();
    if trimmed.is_empty() {
        return Ok(None);
    }
    if trimmed.chars().count() > max_chars {
        return Err(PipelineError::validation(
            field,
            format!("{field} must be at most {max_chars} characters"),
        ));
    }
    Ok(Some(trimmed.to_string()))
}

pub(crate) fn required_text(
    field: &'static str,
    value: &str,
    max_chars: usize,
) -> Result<String, PipelineError> {
    optional_text(field, Some(value.to_string()), max_chars)?
        .ok_or_else(|| PipelineError::validation(field, format!("{field} is required")))
}

pub(crate) fn positive_price(field: &'static str, value: f64) -> Result<f64, PipelineError> {
    if value.is_finite() && value > 0.0 {
        Ok(value)
    } else {
        Err(PipelineError::validation(
            field,
            format!("{field} must be a positive number"),
        ))
    }
}

pub(crate) fn parse_visit_date(raw: &str) -> Result<NaiveDate, PipelineError> {
    NaiveDate::parse_from_str(raw.trim(), "%Y-%m-%d")
        .map_err(|_| PipelineError::validation("visitDate", "visitDate must be YYYY-MM-DD"))
}

pub(crate) fn parse_visit_time(raw: &str) -> Result<NaiveTime, PipelineError> {
    let raw = raw.trim();
    NaiveTime::parse_from_str(raw, "%H:%M:%S")
        .or_else(|_| NaiveTime::parse_from_str(raw, "%H:%M"))
        .map_err(|_| PipelineError::validation("visitTime", "visitTime must be HH:MM or HH:MM:SS"))
}

/// Visit slots are interpreted as UTC wall-clock time.
pub(crate) fn scheduled_at(date: NaiveDate, time: NaiveTime) -> DateTime<Utc> {
    Utc.from_utc_datetime(&date.and_time(time))
}

/// Resolve an agent id for assignment, rejecting unknown, inactive, or non-agent accounts.
pub(crate) fn assignable_agent<D: UserDirectory + ?Sized>(
    directory: &D,
    agent_id: UserId,
) -> Result<UserAccount, PipelineError> {
    directory
        .user(agent_id)?
        .filter(UserAccount::is_active_agent)
        .ok_or_else(|| PipelineError::validation("agentId", "agentId must be an active agent"))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn optional_text_trims_and_drops_blank_values() {
        assert_eq!(
            optional_text("message", Some("  hello ".to_string()), 10).expect("valid"),
            Some("hello".to_string())
        );
        assert_eq!(
            optional_text("message", Some("   ".to_string()), 10).expect("valid"),
            None
        );
        assert!(optional_text("message", Some("x".repeat(11)), 10).is_err());
    }

    #[test]
    fn required_text_rejects_blank() {
        assert!(matches!(
            required_text("note", "  ", 4000),
            Err(PipelineError::Validation { field: "note", .. })
        ));
    }

    #[test]
    fn prices_must_be_positive_and_finite() {
        assert!(positive_price("offerPrice", 1.0).is_ok());
        assert!(positive_price("offerPrice", 0.0).is_err());
        assert!(positive_price("offerPrice", f64::NAN).is_err());
    }

    #[test]
    fn visit_time_accepts_minutes_or_seconds() {
        assert_eq!(
            parse_visit_time("10:00").expect("short form"),
            NaiveTime::from_hms_opt(10, 0, 0).expect("valid")
        );
        assert_eq!(
            parse_visit_time("10:00:30").expect("long form"),
            NaiveTime::from_hms_opt(10, 0, 30).expect("valid")
        );
        assert!(parse_visit_time("10am").is_err());
        assert!(parse_visit_date("2025/06/01").is_err());
    }
}
