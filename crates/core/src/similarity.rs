use unicode_normalization::char::is_combining_mark;
use unicode_normalization::UnicodeNormalization;

/// Canonical comparison form of a name: lowercased, whitespace collapsed,
/// German umlauts expanded to their digraphs, remaining diacritics stripped.
/// "Müller" and "Mueller" normalize to the same string.
pub fn normalize_name(raw: &str) -> String {
    let lowered = raw.trim().to_lowercase();
    let mut expanded = String::with_capacity(lowered.len());
    for ch in lowered.chars() {
        match ch {
            'ä' => expanded.push_str("ae"),
            'ö' => expanded.push_str("oe"),
            'ü' => expanded.push_str("ue"),
            'ß' => expanded.push_str("ss"),
            _ => expanded.push(ch),
        }
    }
    let mut result = String::with_capacity(expanded.len());
    let mut prev_space = false;
    for ch in expanded.nfkd() {
        if is_combining_mark(ch) {
            continue;
        }
        if ch.is_whitespace() {
            if !prev_space {
                result.push(' ');
                prev_space = true;
            }
        } else {
            result.push(ch);
            prev_space = false;
        }
    }
    result.trim_end().to_string()
}

/// Similarity of two attribute strings in [0, 1]. Symmetric; 1.0 exactly
/// when the normalized forms are equal. One empty side scores 0.0.
pub fn similarity(a: &str, b: &str) -> f64 {
    let a = normalize_name(a);
    let b = normalize_name(b);
    if a.is_empty() && b.is_empty() {
        return 1.0;
    }
    if a.is_empty() || b.is_empty() {
        return 0.0;
    }
    strsim::normalized_levenshtein(&a, &b)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn normalize_folds_umlauts_and_accents() {
        assert_eq!(normalize_name("Müller"), "mueller");
        assert_eq!(normalize_name("Mueller"), "mueller");
        assert_eq!(normalize_name("  Groß  Bauer "), "gross bauer");
        assert_eq!(normalize_name("René"), "rene");
    }

    #[test]
    fn similarity_is_symmetric() {
        let pairs = [
            ("Anna", "Anne"),
            ("Müller", "Mueller"),
            ("Schmidt", "Schmitt"),
            ("", "x"),
        ];
        for (a, b) in pairs {
            assert_eq!(similarity(a, b), similarity(b, a), "{a} vs {b}");
        }
    }

    #[test]
    fn similarity_is_one_for_equal_inputs() {
        for s in ["Anna", "MÜLLER", "de la Cruz"] {
            assert_eq!(similarity(s, s), 1.0);
        }
    }

    #[test]
    fn umlaut_variants_score_as_identical() {
        assert_eq!(similarity("Müller", "Mueller"), 1.0);
        assert_eq!(similarity("Jürgen", "Juergen"), 1.0);
    }

    #[test]
    fn empty_sides_score_zero_unless_both_empty() {
        assert_eq!(similarity("", "Anna"), 0.0);
        assert_eq!(similarity("Anna", "   "), 0.0);
        assert_eq!(similarity("", ""), 1.0);
    }

    #[test]
    fn close_names_score_high_but_below_one() {
        let score = similarity("Schmidt", "Schmitt");
        assert!(score > 0.7 && score < 1.0, "score {score}");
    }
}
