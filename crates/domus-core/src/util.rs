use std::time::Duration;

/// Strip an optional Markdown code fence from LLM or upstream output.
///
/// Contract: trim surrounding whitespace, drop one leading fence together
/// with its info string (` ```json `, ` ``` `), drop one trailing fence,
/// trim again. Text without fences is returned trimmed and otherwise
/// untouched.
pub fn strip_code_fence(raw: &str) -> &str {
    let mut s = raw.trim();

    if let Some(rest) = s.strip_prefix("```") {
        s = match rest.find('\n') {
            Some(pos) => &rest[pos + 1..],
            // Single-line fence: the info string runs straight into the body.
            None => rest.trim_start_matches(|c: char| c.is_ascii_alphanumeric()),
        };
    }

    if let Some(rest) = s.trim_end().strip_suffix("```") {
        s = rest;
    }

    s.trim()
}

// ---------------------------------------------------------------------------
// Non-cryptographic randomness based on std. Used for scroll pauses and for
// picking the per-run client identity. Uses a xorshift seeded from the clock.
// ---------------------------------------------------------------------------

/// Uniform-ish value in `[0, max)`. Returns 0 when `max` is 0.
pub fn rand_below(max: u64) -> u64 {
    if max == 0 {
        return 0;
    }
    let mut x = std::time::SystemTime::now()
        .duration_since(std::time::UNIX_EPOCH)
        .unwrap_or_default()
        .as_nanos() as u64
        | 1;
    // xorshift64
    x ^= x << 13;
    x ^= x >> 7;
    x ^= x << 17;
    x % max
}

/// Random pause in `[min, max)`.
pub fn jitter_between(min: Duration, max: Duration) -> Duration {
    if max <= min {
        return min;
    }
    let span_ms = (max - min).as_millis() as u64;
    min + Duration::from_millis(rand_below(span_ms))
}

/// Pick one element at random.
pub fn pick<T>(items: &[T]) -> Option<&T> {
    if items.is_empty() {
        return None;
    }
    items.get(rand_below(items.len() as u64) as usize)
}
