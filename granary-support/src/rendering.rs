//! Text rendering utilities for human-friendly error messages.
//!
//! Bean names and type names end up in nearly every container error;
//! these helpers keep their formatting consistent.

/// Renders a creation chain as a readable string.
///
/// # Examples
/// ```
/// use granary_support::rendering::render_chain;
///
/// let chain = vec!["orderService", "paymentGateway", "orderService"];
/// assert_eq!(render_chain(&chain), "orderService → paymentGateway → orderService");
/// ```
pub fn render_chain(chain: &[impl AsRef<str>]) -> String {
    chain
        .iter()
        .map(|s| s.as_ref())
        .collect::<Vec<_>>()
        .join(" → ")
}

/// Renders bean names as a quoted, comma separated list.
///
/// ```
/// use granary_support::rendering::render_names;
///
/// assert_eq!(render_names(&["a", "b"]), "'a', 'b'");
/// assert_eq!(render_names(&[] as &[&str]), "");
/// ```
pub fn render_names(names: &[impl AsRef<str>]) -> String {
    names
        .iter()
        .map(|n| format!("'{}'", n.as_ref()))
        .collect::<Vec<_>>()
        .join(", ")
}

/// Shortens a fully qualified type name for display.
///
/// ```
/// use granary_support::rendering::shorten_type_name;
///
/// assert_eq!(shorten_type_name("shop::billing::Invoice"), "Invoice");
/// assert_eq!(
///     shorten_type_name("alloc::sync::Arc<dyn shop::billing::Ledger>"),
///     "Arc<dyn Ledger>"
/// );
/// ```
pub fn shorten_type_name(full_name: &str) -> String {
    let mut result = String::with_capacity(full_name.len());
    let mut chars = full_name.chars().peekable();
    let mut segment = String::new();

    while let Some(ch) = chars.next() {
        match ch {
            ':' if chars.peek() == Some(&':') => {
                chars.next();
                segment.clear();
            }
            '<' | '>' | ',' | ' ' | '(' | ')' | '[' | ']' | ';' => {
                result.push_str(&segment);
                result.push(ch);
                segment.clear();
            }
            _ => segment.push(ch),
        }
    }

    result.push_str(&segment);
    result
}

/// Suggests registered bean names close to a requested one.
///
/// Scoring, best first: case-insensitive containment, then a shared prefix
/// of at least three characters, then names within edit distance two.
pub fn suggest_similar(requested: &str, available: &[&str], max_suggestions: usize) -> Vec<String> {
    let wanted = requested.to_lowercase();

    let mut scored: Vec<(&str, usize)> = available
        .iter()
        .filter_map(|&name| {
            let candidate = name.to_lowercase();
            if candidate == wanted {
                return None;
            }
            if !wanted.is_empty() && (candidate.contains(&wanted) || wanted.contains(&candidate)) {
                return Some((name, 100));
            }

            let common = candidate
                .chars()
                .zip(wanted.chars())
                .take_while(|(a, b)| a == b)
                .count();
            if common >= 3 {
                return Some((name, 50 + common));
            }

            (edit_distance(&candidate, &wanted) <= 2).then_some((name, 10))
        })
        .collect();

    scored.sort_by(|a, b| b.1.cmp(&a.1).then_with(|| a.0.cmp(b.0)));
    scored
        .into_iter()
        .take(max_suggestions)
        .map(|(name, _)| name.to_string())
        .collect()
}

/// Levenshtein distance over chars, two-row variant.
fn edit_distance(a: &str, b: &str) -> usize {
    let b: Vec<char> = b.chars().collect();
    let mut prev: Vec<usize> = (0..=b.len()).collect();
    let mut curr = vec![0; b.len() + 1];

    for (i, ca) in a.chars().enumerate() {
        curr[0] = i + 1;
        for (j, cb) in b.iter().enumerate() {
            let cost = usize::from(ca != *cb);
            curr[j + 1] = (prev[j] + cost).min(prev[j + 1] + 1).min(curr[j] + 1);
        }
        std::mem::swap(&mut prev, &mut curr);
    }

    prev[b.len()]
}
