//! MASK strategy: pattern-based, type-dependent partial masking (§4.2).
//! Deterministic; empty input passes through unchanged.

use curve_types::PiiType;

const MASK_CHAR: char = '*';

/// Apply the MASK strategy to `input` for the given [`PiiType`].
pub fn mask(pii_type: PiiType, input: &str) -> String {
    if input.is_empty() {
        return String::new();
    }
    match pii_type {
        PiiType::Email => mask_email(input),
        PiiType::Phone => mask_phone(input),
        PiiType::Name => mask_prefix_chars(input, 1),
        PiiType::Address | PiiType::Generic => mask_prefix_fraction(input, 0.3),
    }
}

/// EMAIL → keep local-part first char + `***@` + domain first two chars +
/// `***` + TLD.
fn mask_email(input: &str) -> String {
    let Some((local, domain)) = input.split_once('@') else {
        // Not a well-formed email; fall back to generic prefix masking
        // rather than panicking on malformed input.
        return mask_prefix_fraction(input, 0.3);
    };

    let local_first = local.chars().next().map(String::from).unwrap_or_default();

    let Some(dot_idx) = domain.rfind('.') else {
        return format!("{local_first}***@{domain}");
    };
    let (domain_name, tld) = domain.split_at(dot_idx);
    let domain_prefix: String = domain_name.chars().take(2).collect();

    format!("{local_first}***@{domain_prefix}***{tld}")
}

/// PHONE → keep first three and last four digits, mask everything between.
fn mask_phone(input: &str) -> String {
    let chars: Vec<char> = input.chars().collect();
    let len = chars.len();
    if len <= 7 {
        // Too short to have a distinct masked middle; mask everything but
        // the first character, consistent with the "keep a visible prefix"
        // spirit of the other patterns.
        return mask_prefix_chars(input, 1);
    }

    chars
        .iter()
        .enumerate()
        .map(|(i, c)| if i < 3 || i >= len - 4 { *c } else { MASK_CHAR })
        .collect()
}

/// Keep the first `keep` code points, mask the rest.
fn mask_prefix_chars(input: &str, keep: usize) -> String {
    input
        .chars()
        .enumerate()
        .map(|(i, c)| if i < keep { c } else { MASK_CHAR })
        .collect()
}

/// Keep the first `fraction` of code points (rounded down, at least one
/// character for non-empty input), mask the rest.
fn mask_prefix_fraction(input: &str, fraction: f64) -> String {
    let total = input.chars().count();
    let keep = ((total as f64) * fraction).floor().max(1.0) as usize;
    mask_prefix_chars(input, keep)
}
