//! Language distribution over fetched file contents.

use std::collections::BTreeMap;

use tokei::LanguageType;

use crate::inventory::RepositoryInventory;
use crate::source::extension;

/// A mapping of language names to their percentage of fetched lines.
pub type LanguageDistribution = BTreeMap<String, f64>;

/// Compute language percentages from the fetched contents using `tokei`
/// extension mappings. Prose and data formats are counted like any language.
pub fn language_distribution(inventory: &RepositoryInventory) -> LanguageDistribution {
    let mut counts: BTreeMap<String, usize> = BTreeMap::new();
    let mut total = 0usize;

    for (path, contents) in inventory.contents() {
        let Some(language) = detect_language(path) else {
            continue;
        };
        let lines = count_lines(contents);
        if lines == 0 {
            continue;
        }
        total += lines;
        *counts.entry(language.to_string()).or_insert(0) += lines;
    }

    if total == 0 {
        return BTreeMap::new();
    }

    counts
        .into_iter()
        .map(|(language, count)| (language, (count as f64 / total as f64) * 100.0))
        .collect()
}

/// Language for a repository path, based on its extension.
pub fn detect_language(path: &str) -> Option<LanguageType> {
    let ext = extension(path)?;
    LanguageType::from_file_extension(&ext)
}

/// Format language stats sorted by percentage, largest first.
pub fn format_language_stats(stats: &LanguageDistribution) -> Vec<(String, f64)> {
    let mut items: Vec<(String, f64)> = stats.iter().map(|(k, v)| (k.clone(), *v)).collect();
    items.sort_by(|a, b| b.1.partial_cmp(&a.1).unwrap_or(std::cmp::Ordering::Equal));
    items
}

fn count_lines(text: &str) -> usize {
    text.lines().filter(|line| !line.trim().is_empty()).count()
}

#[cfg(test)]
mod tests {
    use super::{format_language_stats, language_distribution};
    use crate::inventory::fixture;
    use std::collections::BTreeMap;

    #[test]
    fn distribution_splits_lines_by_language() {
        let inventory = fixture(&[
            ("src/main.rs", "fn main() {}\n"),
            ("src/app.py", "print('hi')\n"),
            ("assets/logo.png", ""),
        ]);

        let distribution = language_distribution(&inventory);

        let rust_key = tokei::LanguageType::Rust.to_string();
        let python_key = tokei::LanguageType::Python.to_string();
        assert_eq!(distribution.get(&rust_key).copied(), Some(50.0));
        assert_eq!(distribution.get(&python_key).copied(), Some(50.0));
        assert_eq!(distribution.len(), 2);
    }

    #[test]
    fn distribution_is_empty_without_lines() {
        let inventory = fixture(&[("src/empty.rs", "\n\n")]);
        assert!(language_distribution(&inventory).is_empty());
    }

    #[test]
    fn formats_language_stats_sorted() {
        let mut stats = BTreeMap::new();
        stats.insert("Go".to_string(), 10.0);
        stats.insert("Rust".to_string(), 30.0);
        let ordered = format_language_stats(&stats);
        assert_eq!(ordered[0].0, "Rust");
    }
}
