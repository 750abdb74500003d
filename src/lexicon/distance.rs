// Copyright (c) 2025 Fabstir
// SPDX-License-Identifier: BUSL-1.1
//! String normalisation and edit distances

/// Upper-case and strip spaces and hyphens
pub fn normalize(word: &str) -> String {
    word.chars()
        .filter(|c| !c.is_whitespace() && *c != '-')
        .flat_map(char::to_uppercase)
        .collect()
}

/// Levenshtein distance over characters
pub fn levenshtein(a: &str, b: &str) -> usize {
    let a: Vec<char> = a.chars().collect();
    let b: Vec<char> = b.chars().collect();
    if a.is_empty() {
        return b.len();
    }
    if b.is_empty() {
        return a.len();
    }

    let mut previous: Vec<usize> = (0..=b.len()).collect();
    let mut current = vec![0; b.len() + 1];
    for (i, ca) in a.iter().enumerate() {
        current[0] = i + 1;
        for (j, cb) in b.iter().enumerate() {
            let substitution = previous[j] + usize::from(ca != cb);
            current[j + 1] = substitution
                .min(previous[j + 1] + 1)
                .min(current[j] + 1);
        }
        std::mem::swap(&mut previous, &mut current);
    }
    previous[b.len()]
}

/// Smallest edit distance between `query` and a prefix of `field`.
///
/// Only prefixes within `max_edits` characters of the query length are
/// considered, so "AWS" reaches "AWARDS" through "AWA" but not through "A".
pub fn prefix_distance(query: &str, field: &str, max_edits: usize) -> usize {
    let field_chars: Vec<char> = field.chars().collect();
    let query_len = query.chars().count();
    let shortest = query_len.saturating_sub(max_edits);
    let longest = (query_len + max_edits).min(field_chars.len());

    if shortest > longest {
        return levenshtein(query, field);
    }
    (shortest..=longest)
        .map(|len| {
            let prefix: String = field_chars[..len].iter().collect();
            levenshtein(query, &prefix)
        })
        .min()
        .unwrap_or(usize::MAX)
}
