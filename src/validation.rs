//! Input validation and submission throttling.
//!
//! Field checks mirror what the terminal forms enforce: Nigerian phone
//! formats, plain-letter customer names, bounded notes with no markup, and
//! the `CFT` receipt-number shape. The `RateLimiter` is a fixed-window
//! counter keyed per customer phone, process-local only: it resets on
//! restart and shares nothing across terminals.

use std::collections::HashMap;
use std::sync::{Mutex, OnceLock};
use std::time::{Duration, Instant};

/// Maximum settlement submissions per phone number per window.
const TRANSACTION_LIMIT: usize = 10;
const TRANSACTION_WINDOW: Duration = Duration::from_secs(60);

// ---------------------------------------------------------------------------
// Field validation
// ---------------------------------------------------------------------------

/// Validate a Nigerian phone number.
///
/// Accepts `08012345678`, `2348012345678`, and `+2348012345678` shapes;
/// spaces, dashes, and parentheses are ignored.
pub fn validate_phone_number(phone: &str) -> bool {
    let clean: String = phone
        .chars()
        .filter(|c| !matches!(c, ' ' | '-' | '(' | ')'))
        .collect();
    if clean.is_empty() {
        return false;
    }

    let digits = clean.strip_prefix('+').unwrap_or(&clean);
    if !digits.chars().all(|c| c.is_ascii_digit()) {
        return false;
    }

    let subscriber = if let Some(rest) = digits.strip_prefix("234") {
        if digits.len() != 13 {
            return false;
        }
        rest
    } else if clean.starts_with('+') {
        // A plus sign is only valid in front of the 234 country code.
        return false;
    } else if let Some(rest) = digits.strip_prefix('0') {
        if digits.len() != 11 {
            return false;
        }
        rest
    } else {
        return false;
    };

    // Network prefix: [789] then [01], followed by the 8-digit line number.
    let mut chars = subscriber.chars();
    matches!(chars.next(), Some('7' | '8' | '9')) && matches!(chars.next(), Some('0' | '1'))
}

/// Validate a customer name: letters, spaces, hyphens, and apostrophes,
/// 2–50 characters after trimming.
pub fn validate_customer_name(name: &str) -> bool {
    let trimmed = name.trim();
    let len = trimmed.chars().count();
    if !(2..=50).contains(&len) {
        return false;
    }
    trimmed
        .chars()
        .all(|c| c.is_ascii_alphabetic() || matches!(c, ' ' | '-' | '\''))
}

/// Validate a receipt number: `CFT` + 8-digit date + 3-digit sequence.
pub fn validate_receipt_number(receipt_number: &str) -> bool {
    let Some(rest) = receipt_number.strip_prefix("CFT") else {
        return false;
    };
    rest.len() == 11 && rest.chars().all(|c| c.is_ascii_digit())
}

/// Validate additional notes: optional, at most 500 characters, no markup.
pub fn validate_notes(notes: &str) -> bool {
    if notes.is_empty() {
        return true;
    }
    if notes.chars().count() > 500 {
        return false;
    }
    // Reject anything that looks like a tag: '<' with a later '>'.
    match notes.find('<') {
        Some(i) => !notes[i..].contains('>'),
        None => true,
    }
}

/// Validate a price entry: positive, finite, at most ₦1,000,000.
pub fn validate_price(price: f64) -> bool {
    price.is_finite() && price > 0.0 && price <= 1_000_000.0
}

/// Escape markup-significant characters in free-text input and trim it.
pub fn sanitize_input(input: &str) -> String {
    let mut out = String::with_capacity(input.len());
    for c in input.trim().chars() {
        match c {
            '<' => out.push_str("&lt;"),
            '>' => out.push_str("&gt;"),
            '"' => out.push_str("&quot;"),
            '\'' => out.push_str("&#x27;"),
            '/' => out.push_str("&#x2F;"),
            _ => out.push(c),
        }
    }
    out
}

// ---------------------------------------------------------------------------
// Rate limiting
// ---------------------------------------------------------------------------

/// Fixed-window event counter: at most `max_attempts` events per `window`
/// per key. Old entries are pruned on each check.
pub struct RateLimiter {
    max_attempts: usize,
    window: Duration,
    attempts: Mutex<HashMap<String, Vec<Instant>>>,
}

impl RateLimiter {
    pub fn new(max_attempts: usize, window: Duration) -> Self {
        Self {
            max_attempts,
            window,
            attempts: Mutex::new(HashMap::new()),
        }
    }

    /// Record an attempt for `key` and report whether it is allowed.
    pub fn is_allowed(&self, key: &str) -> bool {
        let now = Instant::now();
        let mut map = self.attempts.lock().unwrap_or_else(|e| e.into_inner());
        let entries = map.entry(key.to_string()).or_default();

        entries.retain(|t| now.duration_since(*t) < self.window);
        if entries.len() >= self.max_attempts {
            return false;
        }
        entries.push(now);
        true
    }

    /// Forget all attempts for `key`.
    pub fn reset(&self, key: &str) {
        let mut map = self.attempts.lock().unwrap_or_else(|e| e.into_inner());
        map.remove(key);
    }
}

/// Shared limiter for settlement submissions, keyed by customer phone.
pub fn transaction_limiter() -> &'static RateLimiter {
    static LIMITER: OnceLock<RateLimiter> = OnceLock::new();
    LIMITER.get_or_init(|| RateLimiter::new(TRANSACTION_LIMIT, TRANSACTION_WINDOW))
}

// ===========================================================================
// Tests
// ===========================================================================
