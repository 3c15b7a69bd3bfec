//! Declared command pattern syntax.
//!
//! Command patterns are written with mixed-case stems (`SYSTem:ERRor?`)
//! where the upper-case letters form the short abbreviation, and with
//! square brackets marking stem segments a sender may omit entirely
//! (`SYSTem:ERRor[:NEXT]?`). Brackets exist only on the declaration side;
//! they never appear in received commands.

/// The long and short lookup forms of one declared stem.
///
/// Long form is the fully upper-cased stem; short form is the stem with
/// its lowercase characters removed. Digits and markers (`*`, `?`) survive
/// in both forms, so `OUTput0` yields `("OUTPUT0", "OUT0")`.
pub fn stem_forms(stem: &str) -> (String, String) {
    let short: String = stem.chars().filter(|c| !c.is_ascii_lowercase()).collect();
    (stem.to_ascii_uppercase(), short)
}

/// Expand every optional `[...]` segment of a declared pattern.
///
/// Worklist algorithm: while any variant still contains a bracket pair,
/// replace it with the variant that drops the segment entirely and append
/// the variant that keeps the segment content without its brackets. The
/// result is the powerset over the optional segments — exactly `2^k`
/// variants for `k` independent bracket groups.
pub fn expand_optional(pattern: &str) -> Vec<String> {
    let mut variants = vec![pattern.to_string()];
    let mut ix = 0;
    while ix < variants.len() {
        match bracket_pair(&variants[ix]) {
            Some((open, close)) => {
                let variant = &variants[ix];
                let kept = format!(
                    "{}{}{}",
                    &variant[..open],
                    &variant[open + 1..close],
                    &variant[close + 1..]
                );
                variants[ix] = format!("{}{}", &variant[..open], &variant[close + 1..]);
                variants.push(kept);
            }
            None => ix += 1,
        }
    }
    variants
}

/// Byte offsets of the first `[` and its matching `]`, if present.
fn bracket_pair(s: &str) -> Option<(usize, usize)> {
    let open = s.find('[')?;
    let close = s[open..].find(']')? + open;
    Some((open, close))
}
