/// Lowercase alphanumerics only, so `read-log_file` and `readlogfile` compare equal.
fn fold(value: &str) -> Vec<char> {
    value
        .chars()
        .filter(|c| c.is_ascii_alphanumeric())
        .map(|c| c.to_ascii_lowercase())
        .collect()
}

fn edit_distance(a: &[char], b: &[char]) -> usize {
    if a.is_empty() || b.is_empty() {
        return a.len().max(b.len());
    }
    let mut row: Vec<usize> = (0..=b.len()).collect();
    for (i, ca) in a.iter().enumerate() {
        let mut diagonal = row[0];
        row[0] = i + 1;
        for (j, cb) in b.iter().enumerate() {
            let substitution = diagonal + usize::from(ca != cb);
            diagonal = row[j + 1];
            row[j + 1] = substitution.min(row[j] + 1).min(row[j + 1] + 1);
        }
    }
    row[b.len()]
}

fn distance(input: &[char], candidate: &[char]) -> usize {
    if input == candidate {
        return 0;
    }
    let contains = |hay: &[char], needle: &[char]| {
        needle.len() <= hay.len() && hay.windows(needle.len()).any(|w| w == needle)
    };
    if contains(candidate, input) || contains(input, candidate) {
        return 1;
    }
    edit_distance(input, candidate)
}

fn tolerance(len: usize) -> usize {
    match len {
        0 => 0,
        1..=4 => 1,
        5..=8 => 2,
        _ => 3,
    }
}

/// Closest candidates to `input`, best first, at most `limit`.
pub fn suggest(input: &str, candidates: &[&str], limit: usize) -> Vec<String> {
    let folded = fold(input);
    let allowed = tolerance(folded.len());
    if allowed == 0 {
        return Vec::new();
    }
    let mut ranked: Vec<(usize, &str)> = candidates
        .iter()
        .filter_map(|cand| {
            let score = distance(&folded, &fold(cand));
            (score <= allowed).then_some((score, *cand))
        })
        .collect();
    ranked.sort_by(|a, b| a.0.cmp(&b.0).then_with(|| a.1.cmp(b.1)));
    ranked.dedup_by(|a, b| a.1 == b.1);
    ranked
        .into_iter()
        .take(limit)
        .map(|(_, cand)| cand.to_string())
        .collect()
}
