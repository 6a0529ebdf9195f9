const MOJIBAKE: [(&str, &str); 8] = [
    ("â€™", "'"),
    ("â€˜", "'"),
    ("â€œ", "\""),
    ("â€\u{9d}", "\""),
    ("â€“", "-"),
    ("â€”", "-"),
    ("â€¦", "..."),
    ("Â", ""),
];

const PILLARS: [(&str, &str); 7] = [
    ("p&m", "Planning & Monitoring"),
    ("d&t", "Design & Technical"),
    ("d&c", "Development & Construction"),
    ("ce&o", "Cost Estimation & Optimization"),
    ("ceo", "Cost Estimation & Optimization"),
    ("i&t", "Innovation & Technology"),
    ("s&o", "Strategy & Operations"),
];

/// Strip spreadsheet export noise: byte-order marks, zero-width and control characters,
/// non-breaking spaces and common UTF-8-as-Latin-1 artefacts. Whitespace is collapsed.
pub(crate) fn clean_text(value: &str) -> String {
    let mut repaired = value.to_string();
    for (broken, fixed) in MOJIBAKE {
        if repaired.contains(broken) {
            repaired = repaired.replace(broken, fixed);
        }
    }
    let visible: String = repaired
        .chars()
        .filter(|ch| !matches!(ch, '\u{feff}' | '\u{200b}' | '\u{200c}' | '\u{200d}'))
        .map(|ch| {
            if ch == '\u{a0}' || ch.is_control() {
                ' '
            } else {
                ch
            }
        })
        .collect();
    visible.split_whitespace().collect::<Vec<_>>().join(" ")
}

pub(crate) fn normalize_name(value: &str) -> String {
    clean_text(value).to_ascii_lowercase()
}

/// Expand pillar abbreviations such as `P&M`; unknown labels are returned cleaned.
pub(crate) fn expand_pillar(value: &str) -> String {
    let key = normalize_name(value).replace(' ', "");
    PILLARS
        .iter()
        .find(|(abbreviation, _)| *abbreviation == key)
        .map(|(_, full)| full.to_string())
        .unwrap_or_else(|| clean_text(value))
}
