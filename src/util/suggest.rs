//! Similar-name search used for "did you mean" suggestions.

/// Finds the closest candidate to a name that was not found.
///
/// Implementations return `None` when no candidate is similar enough.
pub trait SimilarityMatcher {
    fn best_match<'a>(&self, name: &str, candidates: &[&'a str]) -> Option<&'a str>;
}

/// Edit-distance matcher with a length-dependent threshold.
#[derive(Debug, Clone, Copy, Default)]
pub struct LevenshteinMatcher;

impl LevenshteinMatcher {
    fn max_distance(name: &str) -> usize {
        match name.chars().count() {
            0..=2 => 1,
            3..=5 => 2,
            _ => 3,
        }
    }
}

impl SimilarityMatcher for LevenshteinMatcher {
    fn best_match<'a>(&self, name: &str, candidates: &[&'a str]) -> Option<&'a str> {
        let max_distance = Self::max_distance(name);
        let needle = name.to_lowercase();

        let mut best: Option<(&'a str, usize)> = None;
        for &candidate in candidates {
            let dist = levenshtein_distance(&needle, &candidate.to_lowercase());
            if dist > max_distance {
                continue;
            }
            match best {
                Some((_, best_dist)) if best_dist <= dist => {}
                _ => best = Some((candidate, dist)),
            }
        }

        best.map(|(candidate, _)| candidate)
    }
}

/// Compute Levenshtein edit distance between two strings.
pub fn levenshtein_distance(a: &str, b: &str) -> usize {
    let a_chars: Vec<char> = a.chars().collect();
    let b_chars: Vec<char> = b.chars().collect();
    let m = a_chars.len();
    let n = b_chars.len();

    if m == 0 {
        return n;
    }
    if n == 0 {
        return m;
    }

    let mut prev: Vec<usize> = (0..=n).collect();
    let mut curr = vec![0usize; n + 1];

    for i in 1..=m {
        curr[0] = i;
        for j in 1..=n {
            let cost = usize::from(a_chars[i - 1] != b_chars[j - 1]);
            curr[j] = (prev[j] + 1).min(curr[j - 1] + 1).min(prev[j - 1] + cost);
        }
        std::mem::swap(&mut prev, &mut curr);
    }

    prev[n]
}
