//! "Did you mean" suggestions for misspelled manifest keys.

/// `unknown key "x"`, naming the nearest known key when it is within half
/// the longer name's length in edits, else listing every known key.
pub(crate) fn unknown_key_message(key: &str, known: &[&str]) -> String {
    let lowered = key.to_ascii_lowercase();
    let nearest = known
        .iter()
        .map(|&k| (k, edit_distance(&lowered, &k.to_ascii_lowercase())))
        .filter(|&(k, edits)| edits <= key.len().max(k.len()) / 2)
        .min_by_key(|&(_, edits)| edits);

    match nearest {
        Some((k, _)) => format!("unknown key \"{}\" (did you mean \"{}\"?)", key, k),
        None => format!("unknown key \"{}\" (expected one of: {})", key, known.join(", ")),
    }
}

/// Insertions, deletions and substitutions turning `from` into `to`,
/// computed over a single rolling row.
fn edit_distance(from: &str, to: &str) -> usize {
    let to: Vec<char> = to.chars().collect();
    let mut row: Vec<usize> = (0..=to.len()).collect();

    for (i, a) in from.chars().enumerate() {
        let mut diagonal = row[0];
        row[0] = i + 1;
        for (j, &b) in to.iter().enumerate() {
            let above = row[j + 1];
            row[j + 1] = if a == b {
                diagonal
            } else {
                1 + diagonal.min(above).min(row[j])
            };
            diagonal = above;
        }
    }
    row[to.len()]
}
