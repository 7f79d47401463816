//! Expiration negotiation: what a subscriber asked for and what it gets.

use crate::duration::IsoDuration;
use crate::error::{Result, SubscriptionError};
use chrono::{DateTime, FixedOffset, NaiveDateTime, TimeZone, Utc};

/// Requested expiration value: a span from now, or a point in time.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum ExpirationValue {
    Duration(IsoDuration),
    Instant(DateTime<FixedOffset>),
}

impl ExpirationValue {
    /// Parse the lexical form. Text starting with `P` or `-P` is a duration,
    /// anything else must be a date-time. Date-times without an offset are
    /// taken as UTC.
    pub fn parse(text: &str) -> Result<Self> {
        let trimmed = text.trim();
        if trimmed.starts_with('P') || trimmed.starts_with("-P") {
            return Ok(ExpirationValue::Duration(trimmed.parse()?));
        }

        if let Ok(at) = DateTime::parse_from_rfc3339(trimmed) {
            return Ok(ExpirationValue::Instant(at));
        }

        NaiveDateTime::parse_from_str(trimmed, "%Y-%m-%dT%H:%M:%S%.f")
            .map(|naive| ExpirationValue::Instant(Utc.from_utc_datetime(&naive).fixed_offset()))
            .map_err(|e| SubscriptionError::invalid_expiration(text, e.to_string()))
    }
}

/// A client expiration request as it arrives with a subscribe call.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct ExpirationRequest {
    pub value: ExpirationValue,
    /// The client accepts a policy substitute for a degenerate value.
    pub best_effort: bool,
}

impl ExpirationRequest {
    pub fn parse(text: &str, best_effort: bool) -> Result<Self> {
        Ok(Self {
            value: ExpirationValue::parse(text)?,
            best_effort,
        })
    }
}

/// Outcome of expiration negotiation.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct Grant {
    pub expires_at: DateTime<FixedOffset>,
    pub non_expiring: bool,
}

impl Grant {
    fn at(expires_at: DateTime<FixedOffset>) -> Self {
        Self {
            expires_at,
            non_expiring: false,
        }
    }
}

/// Decides granted expirations from client requests.
#[derive(Clone, Copy, Debug)]
pub struct ExpirationPolicy {
    /// Granted when the client asks for nothing.
    default_grant: IsoDuration,
    /// Granted in place of a zero duration.
    max_grant: IsoDuration,
}

impl ExpirationPolicy {
    pub fn new(default_grant: IsoDuration, max_grant: IsoDuration) -> Self {
        Self {
            default_grant,
            max_grant,
        }
    }

    /// Grant for a subscribe request.
    ///
    /// Only a literal (not best-effort) zero duration marks the grant as
    /// non-expiring; the best-effort zero duration gets the same timestamp
    /// without the flag. Absolute times are granted as given either way.
    pub fn grant(&self, request: Option<&ExpirationRequest>, now: DateTime<Utc>) -> Result<Grant> {
        let now = now.fixed_offset();

        let Some(request) = request else {
            return Ok(Grant::at(self.default_grant.add_to(now)?));
        };

        match request.value {
            ExpirationValue::Instant(at) => Ok(Grant::at(at)),
            ExpirationValue::Duration(duration) => {
                if duration.is_negative() {
                    return Err(SubscriptionError::invalid_expiration(
                        &duration.to_string(),
                        "negative duration",
                    ));
                }

                if request.best_effort {
                    Ok(Grant::at(self.grant_for_duration(duration, now)?))
                } else if duration.is_zero() {
                    Ok(Grant {
                        expires_at: self.max_grant.add_to(now)?,
                        non_expiring: true,
                    })
                } else {
                    Ok(Grant::at(add_requested(duration, now)?))
                }
            }
        }
    }

    /// Zero means "as long as possible", capped by policy. Anything else is
    /// honored as asked.
    pub fn grant_for_duration(
        &self,
        duration: IsoDuration,
        now: DateTime<FixedOffset>,
    ) -> Result<DateTime<FixedOffset>> {
        if duration.is_zero() {
            self.max_grant.add_to(now)
        } else {
            add_requested(duration, now)
        }
    }

    /// New expiration for a renew request. Durations extend the current
    /// expiration, instants replace it. Always literal.
    pub fn renew(
        &self,
        current: DateTime<FixedOffset>,
        value: &ExpirationValue,
    ) -> Result<DateTime<FixedOffset>> {
        match value {
            ExpirationValue::Duration(duration) => add_requested(*duration, current),
            ExpirationValue::Instant(at) => Ok(*at),
        }
    }
}

/// Add a client-supplied duration. Running off the calendar is the
/// request's fault, so it is reported as an invalid expiration; only policy
/// durations surface as `ExpirationOverflow`.
fn add_requested(
    duration: IsoDuration,
    at: DateTime<FixedOffset>,
) -> Result<DateTime<FixedOffset>> {
    duration.add_to(at).map_err(|err| match err {
        SubscriptionError::ExpirationOverflow(_) => {
            SubscriptionError::invalid_expiration(&duration.to_string(), "out of range")
        }
        other => other,
    })
}

impl Default for ExpirationPolicy {
    fn default() -> Self {
        Self::new(IsoDuration::years(2), IsoDuration::years(5))
    }
}
