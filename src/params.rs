//! Query parameters: raw input, defaults, coercion and validation.
//!
//! [`RawQuery`] is what arrives on the wire, every field an optional string.
//! [`RawQuery::normalize`] applies defaults, coerces types and validates the
//! result into [`QueryParams`].
//!
//! The date-range rule is advisory: when it is the only failing check the
//! query is still returned (in [`CheckedQuery::advisory`]) so admission can
//! proceed while the caller is shown the error.

use std::fmt;
use std::str::FromStr;

use chrono::{DateTime, Duration, NaiveDate, NaiveDateTime, TimeZone, Utc};
use serde::{Deserialize, Serialize};
use toprank_tasks::Retention;

use crate::error::ValidationError;

/// Default number of entries returned.
pub const DEFAULT_LIMIT: u32 = 5;

/// Ranking order.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SortBy {
    /// Number of contributions (projects) or votes (contributions).
    Contributions,
    /// Computed reward total.
    Rewards,
}

/// Result granularity.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum RetrieveBy {
    /// One entry per project.
    Projects,
    /// One entry per contribution.
    Contributions,
}

impl FromStr for SortBy {
    type Err = ();

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "contributions" => Ok(Self::Contributions),
            "rewards" => Ok(Self::Rewards),
            _ => Err(()),
        }
    }
}

impl FromStr for RetrieveBy {
    type Err = ();

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "projects" => Ok(Self::Projects),
            "contributions" => Ok(Self::Contributions),
            _ => Err(()),
        }
    }
}

impl fmt::Display for SortBy {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Contributions => write!(f, "contributions"),
            Self::Rewards => write!(f, "rewards"),
        }
    }
}

impl fmt::Display for RetrieveBy {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Projects => write!(f, "projects"),
            Self::Contributions => write!(f, "contributions"),
        }
    }
}

/// Query parameters as received.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct RawQuery {
    pub limit: Option<String>,
    pub start_date: Option<String>,
    pub end_date: Option<String>,
    pub sort_by: Option<String>,
    pub retrieve_by: Option<String>,
    pub include_rewards: Option<String>,
    pub only_new: Option<String>,
}

/// Limits applied during validation.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ValidationPolicy {
    /// Largest accepted `limit`.
    pub max_limit: u32,
    /// Widest range for reward-bearing or contribution-level queries.
    pub max_span: Duration,
}

impl Default for ValidationPolicy {
    fn default() -> Self {
        Self {
            max_limit: 100,
            max_span: Duration::days(8),
        }
    }
}

/// Canonical, validated query.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct QueryParams {
    pub limit: u32,
    pub start_date: DateTime<Utc>,
    pub end_date: DateTime<Utc>,
    pub sort_by: SortBy,
    pub retrieve_by: RetrieveBy,
    pub include_rewards: bool,
    pub only_new: bool,
}

/// Output of [`RawQuery::normalize`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CheckedQuery {
    /// The canonical query.
    pub params: QueryParams,
    /// A failed advisory check. The caller is shown this error, but the
    /// query is still admitted.
    pub advisory: Option<ValidationError>,
}

impl QueryParams {
    /// Reward data or per-contribution results are needed.
    ///
    /// Such queries refresh the reward ledger, are throttled, and are
    /// subject to the date-range rule.
    pub fn is_expensive(&self) -> bool {
        self.include_rewards || self.retrieve_by == RetrieveBy::Contributions
    }

    /// Cap passed to reward enrichment.
    ///
    /// Only when ranking projects by contribution count can the top entries
    /// be known before rewards are; every other shape must enrich the full
    /// candidate set.
    pub fn enrichment_cap(&self) -> Option<usize> {
        (self.retrieve_by == RetrieveBy::Projects && self.sort_by == SortBy::Contributions)
            .then_some(self.limit as usize)
    }

    /// Retention class of the finished task.
    pub fn retention(&self) -> Retention {
        Retention::for_rewards(self.include_rewards)
    }
}

impl RawQuery {
    /// Applies defaults, coerces and validates.
    ///
    /// `today` is the start of the current UTC day and becomes the default
    /// `end_date`.
    ///
    /// # Errors
    ///
    /// - [`ValidationError::Limit`] if `limit` is not an integer in
    ///   `1..=policy.max_limit`. Checked first.
    /// - [`ValidationError::InvalidValue`] for any other unparseable field.
    pub fn normalize(
        &self,
        today: DateTime<Utc>,
        policy: &ValidationPolicy,
    ) -> Result<CheckedQuery, ValidationError> {
        let limit = match non_empty(&self.limit) {
            None => DEFAULT_LIMIT,
            Some(raw) => raw
                .parse::<u32>()
                .ok()
                .filter(|n| (1..=policy.max_limit).contains(n))
                .ok_or(ValidationError::Limit)?,
        };

        let start_date = match non_empty(&self.start_date) {
            None => DateTime::<Utc>::UNIX_EPOCH,
            Some(raw) => parse_instant(raw).ok_or_else(|| invalid("start_date", raw))?,
        };
        let end_date = match non_empty(&self.end_date) {
            None => today,
            Some(raw) => parse_instant(raw).ok_or_else(|| invalid("end_date", raw))?,
        };
        let sort_by = parse_field(&self.sort_by, "sort_by", SortBy::Contributions)?;
        let retrieve_by = parse_field(&self.retrieve_by, "retrieve_by", RetrieveBy::Projects)?;
        let include_rewards = parse_flag(&self.include_rewards, "include_rewards")?;
        let only_new = parse_flag(&self.only_new, "only_new")?;

        let params = QueryParams {
            limit,
            start_date,
            end_date,
            sort_by,
            retrieve_by,
            include_rewards,
            only_new,
        };

        let advisory = (params.is_expensive() && end_date - start_date > policy.max_span)
            .then_some(ValidationError::DateRange);

        Ok(CheckedQuery { params, advisory })
    }
}

/// Midnight UTC of the day containing `now`.
pub fn start_of_day(now: DateTime<Utc>) -> DateTime<Utc> {
    Utc.from_utc_datetime(&now.date_naive().and_time(chrono::NaiveTime::MIN))
}

/// Parses `YYYY-MM-DD`, RFC 3339, or a zone-less `YYYY-MM-DDTHH:MM:SS`
/// (taken as UTC).
pub fn parse_instant(raw: &str) -> Option<DateTime<Utc>> {
    let raw = raw.trim();
    if let Ok(dt) = DateTime::parse_from_rfc3339(raw) {
        return Some(dt.with_timezone(&Utc));
    }
    if let Ok(naive) = NaiveDateTime::parse_from_str(raw, "%Y-%m-%dT%H:%M:%S%.f") {
        return Some(Utc.from_utc_datetime(&naive));
    }
    NaiveDate::parse_from_str(raw, "%Y-%m-%d")
        .ok()
        .map(|date| Utc.from_utc_datetime(&date.and_time(chrono::NaiveTime::MIN)))
}

fn non_empty(value: &Option<String>) -> Option<&str> {
    value.as_deref().map(str::trim).filter(|v| !v.is_empty())
}

fn invalid(field: &'static str, raw: &str) -> ValidationError {
    ValidationError::InvalidValue {
        field,
        value: raw.to_string(),
    }
}

fn parse_field<T: FromStr>(
    value: &Option<String>,
    field: &'static str,
    default: T,
) -> Result<T, ValidationError> {
    match non_empty(value) {
        None => Ok(default),
        Some(raw) => raw
            .to_ascii_lowercase()
            .parse()
            .map_err(|_| invalid(field, raw)),
    }
}

fn parse_flag(value: &Option<String>, field: &'static str) -> Result<bool, ValidationError> {
    match non_empty(value).map(str::to_ascii_lowercase).as_deref() {
        None => Ok(false),
        Some("true" | "1") => Ok(true),
        Some("false" | "0") => Ok(false),
        Some(_) => Err(invalid(field, value.as_deref().unwrap_or_default())),
    }
}
