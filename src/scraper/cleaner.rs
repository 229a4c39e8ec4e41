use std::collections::HashSet;

/// Turn a listing EPIC into a quote-provider symbol.
/// "RR." → "RRL" | "III" → "III.L"
///
/// A trailing period already supplies the separator, so only the exchange
/// letter is appended.
pub fn normalise_epic(raw: &str, suffix: &str) -> String {
    let raw = raw.trim();
    if raw.ends_with('.') {
        format!("{}{}", raw, suffix)
    } else {
        format!("{}.{}", raw, suffix)
    }
}

/// Normalise every raw EPIC and drop repeats, keeping first-seen order.
pub fn clean_ticker_rows(raw: Vec<String>, suffix: &str) -> Vec<String> {
    let mut seen = HashSet::new();
    raw.iter()
        .map(|r| normalise_epic(r, suffix))
        .filter(|t| seen.insert(t.clone()))
        .collect()
}

// ── Tests ─────────────────────────────────────────────────────────────────────
