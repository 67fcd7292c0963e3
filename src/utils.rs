use chrono::{DateTime, Utc};

use crate::constants::{BODY_PREVIEW_LIMIT, FILE_TIMESTAMP_FORMAT};

/// Build a timestamped output file name, e.g. `crypto_prices_20240101_120000.json`
pub fn timestamped_filename(prefix: &str, at: DateTime<Utc>) -> String {
    format!("{}_{}.json", prefix, at.format(FILE_TIMESTAMP_FORMAT))
}

/// Truncate a response body for logging
pub fn body_preview(body: &str) -> String {
    if body.len() <= BODY_PREVIEW_LIMIT {
        return body.to_string();
    }

    let mut end = BODY_PREVIEW_LIMIT;
    while !body.is_char_boundary(end) {
        end -= 1;
    }
    format!("{}... (truncated)", &body[..end])
}

/// Match a file name against a shell-style pattern supporting `*` and `?`
pub fn wildcard_match(pattern: &str, name: &str) -> bool {
    let p: Vec<char> = pattern.chars().collect();
    let n: Vec<char> = name.chars().collect();

    let (mut pi, mut ni) = (0, 0);
    let mut star: Option<usize> = None;
    let mut star_ni = 0;

    while ni < n.len() {
        if pi < p.len() && (p[pi] == '?' || p[pi] == n[ni]) {
            pi += 1;
            ni += 1;
        } else if pi < p.len() && p[pi] == '*' {
            star = Some(pi);
            star_ni = ni;
            pi += 1;
        } else if let Some(s) = star {
            // Backtrack: let the last star swallow one more char
            pi = s + 1;
            star_ni += 1;
            ni = star_ni;
        } else {
            return false;
        }
    }

    while pi < p.len() && p[pi] == '*' {
        pi += 1;
    }

    pi == p.len()
}
