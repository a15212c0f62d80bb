//! Normalized edit-distance similarity

/// Levenshtein distance over Unicode scalar values
///
/// Keeps two rows of the DP table, so memory is linear in the shorter input.
pub fn levenshtein(a: &str, b: &str) -> usize {
    let a: Vec<char> = a.chars().collect();
    let b: Vec<char> = b.chars().collect();

    let (short, long) = if a.len() <= b.len() { (&a, &b) } else { (&b, &a) };

    if short.is_empty() {
        return long.len();
    }

    let mut previous: Vec<usize> = (0..=short.len()).collect();
    let mut current = vec![0; short.len() + 1];

    for (i, lc) in long.iter().enumerate() {
        current[0] = i + 1;

        for (j, sc) in short.iter().enumerate() {
            let substitution = previous[j] + usize::from(lc != sc);
            let insertion = current[j] + 1;
            let deletion = previous[j + 1] + 1;
            current[j + 1] = substitution.min(insertion).min(deletion);
        }

        std::mem::swap(&mut previous, &mut current);
    }

    previous[short.len()]
}

/// Similarity in `[0, 1]` as `1 - distance / max(len(a), len(b))`
///
/// Two empty strings are an exact match.
pub fn similarity(a: &str, b: &str) -> f64 {
    let longest = a.chars().count().max(b.chars().count());

    if longest == 0 {
        return 1.0;
    }

    let distance = levenshtein(a, b);
    (longest - distance) as f64 / longest as f64
}
