//! Store slugs and referral codes.
//!
//! Both are a lower-case alphanumeric projection of a human name plus a
//! four-digit suffix drawn from a time-seeded counter, so no uniqueness
//! round-trip is needed in the common case.

use std::sync::atomic::{AtomicU64, Ordering};

use chrono::Utc;

const SUFFIX_SPACE: u64 = 10_000;
const MAX_SLUG_BASE: usize = 40;
const MAX_REFERRAL_BASE: usize = 8;

/// Monotonic source of disambiguating suffixes (`0000`..=`9999`).
#[derive(Debug)]
pub struct SuffixSource {
    next: AtomicU64,
}

impl SuffixSource {
    /// Seeded from the wall clock so restarts do not replay suffixes.
    pub fn time_seeded() -> Self {
        Self::starting_at(Utc::now().timestamp_millis().unsigned_abs())
    }

    pub fn starting_at(seed: u64) -> Self {
        Self {
            next: AtomicU64::new(seed),
        }
    }

    pub fn next(&self) -> u16 {
        (self.next.fetch_add(1, Ordering::Relaxed) % SUFFIX_SPACE) as u16
    }
}

impl Default for SuffixSource {
    fn default() -> Self {
        Self::time_seeded()
    }
}

/// Lower-case ASCII alphanumeric words joined by `-`.
pub fn slugify(name: &str) -> String {
    let mut out = String::with_capacity(name.len());
    for word in name
        .split(|c: char| !c.is_ascii_alphanumeric())
        .filter(|w| !w.is_empty())
    {
        if !out.is_empty() {
            out.push('-');
        }
        out.push_str(&word.to_ascii_lowercase());
    }
    out.truncate(MAX_SLUG_BASE);
    out.trim_end_matches('-').to_string()
}

/// `acme-trading-0042` from `"Acme Trading"` and `42`.
pub fn store_slug(company_name: &str, suffix: u16) -> String {
    let base = slugify(company_name);
    let base = if base.is_empty() { "store".to_string() } else { base };
    format!("{base}-{suffix:04}")
}

/// `ADALOVEL0042` from `"Ada Lovelace"` and `42`.
pub fn referral_code(name: &str, suffix: u16) -> String {
    let base: String = name
        .chars()
        .filter(char::is_ascii_alphanumeric)
        .take(MAX_REFERRAL_BASE)
        .collect::<String>()
        .to_ascii_uppercase();
    let base = if base.is_empty() { "REF".to_string() } else { base };
    format!("{base}{suffix:04}")
}
