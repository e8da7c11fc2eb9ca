use std::sync::LazyLock;

use regex::Regex;

static BLANK_LINES_RE: LazyLock<Regex> = LazyLock::new(|| Regex::new(r"\n\s*\n").unwrap());

/// Upper-case the first character and lower-case the rest.
pub fn capitalize(s: &str) -> String {
    let mut chars = s.chars();
    match chars.next() {
        Some(first) => first
            .to_uppercase()
            .chain(chars.flat_map(char::to_lowercase))
            .collect(),
        None => String::new(),
    }
}

/// Second-chance spelling of a route name query: capitalized, with the last
/// character upper-cased as well ("pik lenina" -> "Pik leninA").
///
/// Route names in the source data end in a capital letter or a roman numeral
/// grade often enough that this catches most lower-case queries. If the data
/// source changes, replace it with a documented normalization rule.
pub fn fallback_variant(query: &str) -> String {
    let Some(last) = query.chars().last() else {
        return String::new();
    };
    let mut out = capitalize(query);
    out.pop();
    out.extend(last.to_uppercase());
    out
}

/// Collapse blank-line runs into a single newline and trim the ends.
pub fn clean_description(raw: &str) -> String {
    BLANK_LINES_RE.replace_all(raw, "\n").trim().to_string()
}
