//! Query fingerprints.
//!
//! A fingerprint is the lowercase hex SHA-256 of the compact JSON encoding of
//! a normalized query, fields in declaration order and instants rendered as
//! RFC 3339 in UTC at full precision (no fraction for whole seconds, else
//! milli-, micro- or nanoseconds as needed). It depends only on the query,
//! so it is stable across restarts and identical on every instance.

use std::fmt;

use chrono::{DateTime, SecondsFormat, Utc};
use serde::Serialize;
use sha2::{Digest, Sha256};

use crate::params::{QueryParams, RetrieveBy, SortBy};

/// Cache key and task identity of a normalized query.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct Fingerprint(String);

#[derive(Serialize)]
struct Canonical {
    limit: u32,
    start_date: String,
    end_date: String,
    sort_by: SortBy,
    retrieve_by: RetrieveBy,
    include_rewards: bool,
    only_new: bool,
}

fn instant(at: DateTime<Utc>) -> String {
    at.to_rfc3339_opts(SecondsFormat::AutoSi, true)
}

impl Fingerprint {
    /// Fingerprints a normalized query.
    pub fn of(params: &QueryParams) -> Self {
        let canonical = Canonical {
            limit: params.limit,
            start_date: instant(params.start_date),
            end_date: instant(params.end_date),
            sort_by: params.sort_by,
            retrieve_by: params.retrieve_by,
            include_rewards: params.include_rewards,
            only_new: params.only_new,
        };
        // Plain strings, bools and integers always encode.
        let encoded = serde_json::to_vec(&canonical).unwrap_or_default();
        let digest = Sha256::digest(&encoded);
        Self(digest.iter().map(|b| format!("{b:02x}")).collect())
    }

    /// The hex digest.
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for Fingerprint {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl AsRef<str> for Fingerprint {
    fn as_ref(&self) -> &str {
        &self.0
    }
}
