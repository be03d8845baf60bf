//! Search ranking: a BM25 variant computed over candidate rows, followed by
//! tag-priority and distance adjustments. Lower ranks sort first.

use std::collections::HashMap;
use std::sync::LazyLock;

use crate::search::query::Phrase;

/// Weights for the `name`, `name_en`, `admin` and `tags` columns.
pub const COLUMN_WEIGHTS: [f64; 4] = [2.0, 2.0, 0.5, 1.0];
const NAME_COLUMNS: usize = 2;

/// Mirrors the FTS5 unicode61 tokenizer closely enough for scoring:
/// anything non-alphanumeric separates tokens.
#[must_use]
pub fn tokenize(text: &str) -> Vec<String> {
    text.split(|c: char| !c.is_alphanumeric())
        .filter(|t| !t.is_empty())
        .map(str::to_lowercase)
        .collect()
}

fn phrase_matches_at(phrase: &Phrase, tokens: &[String], pos: usize) -> bool {
    if pos + phrase.tokens.len() > tokens.len() {
        return false;
    }
    for (i, want) in phrase.tokens.iter().enumerate() {
        let have = &tokens[pos + i];
        let last = i == phrase.tokens.len() - 1;
        let ok = if phrase.prefix && last {
            have.starts_with(want.as_str())
        } else {
            have == want
        };
        if !ok {
            return false;
        }
    }
    true
}

/// Scores candidate rows for one rewritten query.
#[derive(Debug)]
pub struct Scorer {
    phrases: Vec<Phrase>,
    idf: Vec<f64>,
}

impl Scorer {
    /// `doc_counts[i]` is the number of rows containing phrase `i`,
    /// `total_docs` the size of the index.
    #[must_use]
    pub fn new(phrases: Vec<Phrase>, doc_counts: &[u64], total_docs: u64) -> Self {
        let idf = phrases
            .iter()
            .enumerate()
            .map(|(i, _)| {
                let n = doc_counts.get(i).copied().unwrap_or(0) as f64;
                let total = total_docs as f64;
                (((total - n + 0.5) / (n + 0.5)).ln()).max(1e-6)
            })
            .collect();
        Self { phrases, idf }
    }

    /// Row score is `-Σ IDF_i · freq_i` where `freq_i` is the maximum
    /// instance weight of phrase `i`: column weight, doubled for the first
    /// phrase leading a name column, minus a small length correction.
    #[must_use]
    pub fn score(&self, columns: [&str; 4]) -> f64 {
        let tokens: Vec<Vec<String>> = columns.iter().map(|c| tokenize(c)).collect();
        let mut score = 0.0;
        for (i, phrase) in self.phrases.iter().enumerate() {
            let mut freq = 0.0_f64;
            for (c, col_tokens) in tokens.iter().enumerate() {
                if col_tokens.is_empty() {
                    continue;
                }
                let length_correction = 0.1 * (col_tokens.len() as f64).log10();
                for pos in 0..col_tokens.len() {
                    if !phrase_matches_at(phrase, col_tokens, pos) {
                        continue;
                    }
                    let mut w = COLUMN_WEIGHTS[c];
                    if i == 0 && c < NAME_COLUMNS && pos == 0 {
                        w *= 2.0; // prefix boost
                    }
                    w -= length_correction;
                    freq = freq.max(w);
                }
            }
            score -= self.idf[i] * freq;
        }
        score
    }
}

/// Priority of the leading tag of a row; tags not listed rank neutral.
static TAG_PRIORITY: LazyLock<HashMap<&'static str, i32>> = LazyLock::new(|| {
    HashMap::from([
        ("country", 90),
        ("state", 85),
        ("province", 84),
        ("city", 80),
        ("town", 75),
        ("village", 70),
        ("island", 66),
        ("suburb", 65),
        ("heritage", 64),
        ("wikipedia", 63),
        ("hamlet", 62),
        ("national_park", 62),
        ("aerodrome", 62),
        ("park", 61),
        ("peak", 61),
        ("protected_area", 60),
        ("attraction", 59),
        ("quarter", 58),
        ("museum", 58),
        ("viewpoint", 57),
        ("neighbourhood", 56),
        ("locality", 55),
        ("station", 55),
        ("university", 54),
        ("hospital", 53),
        ("zoo", 52),
        ("stadium", 50),
        ("school", 45),
        ("hotel", 42),
        ("supermarket", 41),
        ("restaurant", 40),
        ("cafe", 40),
        ("bar", 38),
        ("fast_food", 35),
        ("bus_stop", -20),
        ("toilets", -50),
        ("parking", -60),
        ("bench", -80),
        ("vending_machine", -100),
    ])
});

/// Tag adjustment: the first space-separated tag shifts the rank by its
/// priority; rows without any tag are pushed well down the list.
#[must_use]
pub fn apply_tag_score(rank: f64, tags: &str) -> f64 {
    match tags.split_whitespace().next() {
        None => rank * 0.5,
        Some(first) => {
            let priority = TAG_PRIORITY.get(first).copied().unwrap_or(0);
            rank - f64::from(priority) / 100.0
        }
    }
}

#[must_use]
pub fn apply_distance_score(rank: f64, dist_km: f64) -> f64 {
    rank + 0.01 * (0.001 + dist_km / 20_000.0).log2()
}

/// Great-circle distance in kilometers.
#[must_use]
pub fn distance_km(a: (f64, f64), b: (f64, f64)) -> f64 {
    const EARTH_RADIUS_KM: f64 = 6371.0;
    let (lng1, lat1) = (a.0.to_radians(), a.1.to_radians());
    let (lng2, lat2) = (b.0.to_radians(), b.1.to_radians());
    let dlat = lat2 - lat1;
    let dlng = lng2 - lng1;
    let h = (dlat / 2.0).sin().powi(2) + lat1.cos() * lat2.cos() * (dlng / 2.0).sin().powi(2);
    2.0 * EARTH_RADIUS_KM * h.sqrt().asin()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::search::query::rewrite;

    fn scorer_for(q: &str, doc_counts: &[u64], total: u64) -> Scorer {
        let r = rewrite(q, false);
        Scorer::new(r.phrases, doc_counts, total)
    }

    #[test]
    fn test_name_match_beats_tag_match() {
        let s = scorer_for("springfield", &[10], 1000);
        let by_name = s.score(["springfield", "", "", "city"]);
        let by_tag = s.score(["riverton", "", "", "springfield"]);
        assert!(by_name < by_tag, "{by_name} vs {by_tag}");
    }

    #[test]
    fn test_leading_position_boost() {
        let s = scorer_for("park", &[50], 1000);
        let leading = s.score(["park place", "", "", ""]);
        let trailing = s.score(["place park", "", "", ""]);
        assert!(leading < trailing);
    }

    #[test]
    fn test_rare_phrase_outweighs_common() {
        let r = rewrite("ferry building", false);
        // "ferry" is rare, "building" ubiquitous
        let s = Scorer::new(r.phrases, &[5, 900], 1000);
        let both = s.score(["ferry building", "", "", ""]);
        let only_common = s.score(["building", "", "", ""]);
        assert!(both < only_common);
    }

    #[test]
    fn test_prefix_phrase_matches() {
        let s = scorer_for("san franc", &[100, 20], 1000);
        let hit = s.score(["san francisco", "", "", "city"]);
        let miss = s.score(["santa clara", "", "", "city"]);
        assert!(hit < miss);
        assert!(miss.abs() < 1e-9, "neither phrase matches santa clara");
    }

    #[test]
    fn test_tag_priority_ordering() {
        let base = -1.0;
        let city = apply_tag_score(base, "city capital");
        let bench = apply_tag_score(base, "bench");
        let empty = apply_tag_score(base, "");
        assert!(city < bench);
        // empty tags sort after anything with non-negative priority
        assert!(empty > apply_tag_score(base, "unknown_tag"));
        assert!((apply_tag_score(base, "unknown_tag") - base).abs() < 1e-9);
    }

    #[test]
    fn test_distance_monotonic() {
        let near = apply_distance_score(-1.0, 1.0);
        let far = apply_distance_score(-1.0, 500.0);
        assert!(near < far);
    }

    #[test]
    fn test_haversine_sanity() {
        // SF to LA is roughly 560 km
        let d = distance_km((-122.42, 37.77), (-118.24, 34.05));
        assert!((d - 560.0).abs() < 20.0);
    }
}
