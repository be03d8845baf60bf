//! Search query rewriting: turns free-form user input into an FTS5 match
//! expression plus the phrase list used by the ranker.

/// One scoring phrase: consecutive tokens, optionally prefix-matched.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Phrase {
    pub tokens: Vec<String>,
    pub prefix: bool,
}

impl Phrase {
    fn exact(tokens: &[&str]) -> Self {
        Self {
            tokens: tokens.iter().map(|t| (*t).to_string()).collect(),
            prefix: false,
        }
    }
}

#[derive(Debug, Clone)]
pub struct RewrittenQuery {
    pub match_expr: String,
    pub phrases: Vec<Phrase>,
    /// `!`-prefixed queries skip rewriting and tag re-ranking tweaks.
    pub categorical: bool,
}

/// Trailing filler words users append to category searches.
const FILLERS: &[&str] = &[" me", " near", " nearby", " store", " shop"];

/// Category expansions. An alternative starting with an empty token
/// replaces the whole query with its second element, verbatim.
const CATEGORIES: &[(&str, &[&[&str]])] = &[
    ("restaurant", &[&["fast", "food"], &["food", "court"]]),
    ("restaurants", &[&["restaurant"], &["fast", "food"], &["food", "court"]]),
    ("food", &[&["restaurant"], &["fast", "food"], &["food", "court"], &["supermarket"]]),
    ("groceries", &[&["supermarket"], &["grocery"], &["convenience"]]),
    ("grocery", &[&["supermarket"], &["convenience"]]),
    ("coffee", &[&["cafe"], &["coffee", "shop"]]),
    ("gas", &[&["fuel"]]),
    ("petrol", &[&["fuel"]]),
    ("bike", &[&["", "(bike OR bicycle) NOT (rental OR parking)"]]),
    ("hotel", &[&["hostel"], &["motel"], &["guest", "house"]]),
    ("transit", &[&["station"], &["bus", "stop"], &["tram", "stop"]]),
];

/// Per-token spelling normalizations, applied as `(a OR b)`.
const REPLACEMENTS: &[(&str, &str)] = &[
    ("mt", "mount"),
    ("mtn", "mountain"),
    ("st", "saint"),
    ("ft", "fort"),
    ("center", "centre"),
    ("centre", "center"),
    ("theater", "theatre"),
    ("theatre", "theater"),
    ("harbor", "harbour"),
    ("harbour", "harbor"),
];

fn quote(token: &str) -> String {
    format!("\"{}\"", token.replace('"', ""))
}

/// Rewrites a raw query. Autocomplete queries with a single token are
/// restricted to the name columns.
#[must_use]
pub fn rewrite(raw: &str, autocomplete: bool) -> RewrittenQuery {
    let lowered = raw.trim().to_lowercase();

    if let Some(rest) = lowered.strip_prefix('!') {
        let q = rest.trim().to_string();
        // score on index tokens, so split the way the tokenizer does
        let phrases = q
            .split(|c: char| !c.is_alphanumeric())
            .filter(|t| !t.is_empty())
            .map(|t| Phrase::exact(&[t]))
            .collect();
        return RewrittenQuery {
            match_expr: q,
            phrases,
            categorical: true,
        };
    }

    let mut q = lowered;
    let mut stripped = true;
    while stripped {
        stripped = false;
        for filler in FILLERS {
            if q.ends_with(filler) {
                q.truncate(q.len() - filler.len());
                q.truncate(q.trim_end().len());
                stripped = true;
            }
        }
    }

    if let Some((_, alternatives)) = CATEGORIES.iter().find(|(key, _)| *key == q) {
        if let Some(replacement) = alternatives
            .first()
            .filter(|alt| alt.first() == Some(&""))
            .and_then(|alt| alt.get(1))
        {
            return RewrittenQuery {
                match_expr: (*replacement).to_string(),
                phrases: vec![Phrase::exact(&[q.as_str()])],
                categorical: false,
            };
        }
        let mut parts = vec![quote(&q)];
        let mut phrases = vec![Phrase::exact(&[q.as_str()])];
        for alt in *alternatives {
            parts.push(quote(&alt.join(" ")));
            phrases.push(Phrase::exact(alt));
        }
        return RewrittenQuery {
            match_expr: parts.join(" OR "),
            phrases,
            categorical: false,
        };
    }

    let tokens: Vec<&str> = q.split_whitespace().collect();
    let mut parts = Vec::with_capacity(tokens.len());
    let mut phrases = Vec::with_capacity(tokens.len());
    for &token in &tokens {
        if let Some((_, other)) = REPLACEMENTS.iter().find(|(a, _)| *a == token) {
            parts.push(format!("({} OR {})", quote(token), quote(other)));
        } else {
            parts.push(quote(token));
        }
        phrases.push(Phrase::exact(&[token]));
    }
    // prefix-match the last token so partial words still hit
    if let Some(last) = parts.last_mut() {
        if last.ends_with('"') {
            last.push('*');
            if let Some(phrase) = phrases.last_mut() {
                phrase.prefix = true;
            }
        }
    }
    let mut match_expr = parts.join(" AND ");
    if autocomplete && tokens.len() == 1 {
        match_expr = format!("{{name name_en}} : {match_expr}");
    }
    RewrittenQuery {
        match_expr,
        phrases,
        categorical: false,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_plain_tokens_joined_with_and() {
        let r = rewrite("San Francisco", false);
        assert_eq!(r.match_expr, r#""san" AND "francisco"*"#);
        assert_eq!(r.phrases.len(), 2);
        assert!(r.phrases[1].prefix);
        assert!(!r.categorical);
    }

    #[test]
    fn test_replacement_token() {
        let r = rewrite("Mt Whitney", false);
        assert_eq!(r.match_expr, r#"("mt" OR "mount") AND "whitney"*"#);
        assert_eq!(r.phrases[0].tokens, vec!["mt"]);
    }

    #[test]
    fn test_replaced_last_token_gets_no_prefix() {
        let r = rewrite("fisherman harbor", false);
        assert_eq!(r.match_expr, r#""fisherman" AND ("harbor" OR "harbour")"#);
        assert!(!r.phrases[1].prefix);
    }

    #[test]
    fn test_category_expansion_and_fillers() {
        let r = rewrite("restaurant near me", false);
        assert_eq!(r.match_expr, r#""restaurant" OR "fast food" OR "food court""#);
        assert_eq!(r.phrases[1].tokens, vec!["fast", "food"]);
    }

    #[test]
    fn test_category_replacement() {
        let r = rewrite("bike", false);
        assert_eq!(r.match_expr, "(bike OR bicycle) NOT (rental OR parking)");
    }

    #[test]
    fn test_autocomplete_single_token() {
        let r = rewrite("Oakl", true);
        assert_eq!(r.match_expr, r#"{name name_en} : "oakl"*"#);
    }

    #[test]
    fn test_categorical_passthrough() {
        let r = rewrite("! Fast_Food", false);
        assert!(r.categorical);
        assert_eq!(r.match_expr, "fast_food");
    }
}
