// ============================================================================
// reelrun-core/src/range.rs
// ============================================================================
//
// EPISODE RANGES: Identifier lists for batch inputs
//
// Turns user range syntax such as `"1-3,5,7-9"` into the ordered list of
// identifiers assigned to batch inputs. Parsing is forgiving: a malformed
// token is skipped on its own and never aborts the rest of the list.
// Expansion is bounded, so a range like `1-4000000000` never materializes
// more values than can be used.

/// Most values `parse_range` will expand a specification into.
pub const MAX_RANGE_VALUES: usize = 10_000;

/// Parses a range specification into positive integers.
///
/// Accepts singletons, comma-separated lists and inclusive dash ranges.
/// Whitespace around tokens is ignored. Non-numeric, zero, empty and reversed
/// tokens contribute nothing. Order and duplicates are kept as written.
/// At most [`MAX_RANGE_VALUES`] values are returned.
///
/// ```rust
/// use reelrun_core::range::parse_range;
///
/// assert_eq!(parse_range("1-3,5,7-9"), vec![1, 2, 3, 5, 7, 8, 9]);
/// assert_eq!(parse_range("2,1"), vec![2, 1]);
/// assert!(parse_range("5-3").is_empty());
/// ```
pub fn parse_range(spec: &str) -> Vec<u32> {
    let numbers = parse_range_limited(spec, MAX_RANGE_VALUES);
    if numbers.len() == MAX_RANGE_VALUES {
        log::debug!("Range '{spec}' capped at {MAX_RANGE_VALUES} values");
    }
    numbers
}

/// Expands `spec` but stops as soon as `limit` values are collected.
fn parse_range_limited(spec: &str, limit: usize) -> Vec<u32> {
    let mut numbers = Vec::new();
    for token in spec.split(',').map(str::trim) {
        let room = limit.saturating_sub(numbers.len());
        if room == 0 {
            break;
        }
        match token.split_once('-') {
            Some((start, end)) => {
                let (Some(start), Some(end)) = (parse_positive(start), parse_positive(end)) else {
                    log::debug!("Skipping malformed range token '{token}'");
                    continue;
                };
                if start > end {
                    log::debug!("Skipping reversed range '{token}'");
                    continue;
                }
                numbers.extend((start..=end).take(room));
            }
            None => match parse_positive(token) {
                Some(n) => numbers.push(n),
                None => {
                    if !token.is_empty() {
                        log::debug!("Skipping malformed range token '{token}'");
                    }
                }
            },
        }
    }
    numbers
}

fn parse_positive(text: &str) -> Option<u32> {
    text.trim().parse::<u32>().ok().filter(|n| *n > 0)
}

/// Resolves exactly `count` identifiers from `spec`.
///
/// A short list is extended by continuing the sequence from its last value
/// (an empty parse starts at 1); a long list is truncated.
pub fn resolve_identifiers(spec: &str, count: usize) -> Vec<u32> {
    let mut ids = parse_range_limited(spec, count);

    let mut next = ids.last().map_or(1, |last| last.saturating_add(1));
    while ids.len() < count {
        ids.push(next);
        next = next.saturating_add(1);
    }
    ids
}
