use serde::Serialize;

/// A raw label with the confidence the network assigned to it.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Prediction {
    pub label: String,
    pub confidence: f32,
}

impl Prediction {
    pub fn new(label: impl Into<String>, confidence: f32) -> Self {
        Self {
            label: label.into(),
            confidence,
        }
    }
}

/// One sanitized keyword; every synonym of a prediction shares its confidence.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Keyword {
    pub keyword: String,
    pub confidence: f32,
}

impl Keyword {
    pub fn new(keyword: impl Into<String>, confidence: f32) -> Self {
        Self {
            keyword: keyword.into(),
            confidence,
        }
    }
}

fn is_blank(c: char) -> bool {
    c == ' ' || c == '\t'
}

/// Drops the leading category token (e.g. a synset id such as `n01440764`)
/// and the blank that ends it.
///
/// A label without any blank is returned whole: the search for a separator
/// comes up empty and nothing is cut.
pub fn strip_category(label: &str) -> &str {
    match label.find(is_blank) {
        Some(pos) => &label[pos + 1..],
        None => label,
    }
}

/// Splits a label such as `"n02123045 tabby, tabby cat"` into its synonyms.
///
/// Pieces are separated by commas and trimmed of spaces and tabs. An empty
/// piece after a trailing comma is dropped; empty pieces in the middle are kept.
pub fn expand_keywords(prediction: &Prediction) -> Vec<Keyword> {
    let synonyms = strip_category(&prediction.label);
    let mut pieces: Vec<&str> = synonyms.split(',').collect();
    if pieces.last() == Some(&"") {
        pieces.pop();
    }
    pieces
        .into_iter()
        .map(|piece| Keyword::new(piece.trim_matches(is_blank), prediction.confidence))
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn words(keywords: &[Keyword]) -> Vec<&str> {
        keywords.iter().map(|k| k.keyword.as_str()).collect()
    }

    #[test]
    fn test_expand_synonyms() {
        let keywords = expand_keywords(&Prediction::new("n01 cat, house cat , feline", 0.9));
        assert_eq!(
            keywords,
            vec![
                Keyword::new("cat", 0.9),
                Keyword::new("house cat", 0.9),
                Keyword::new("feline", 0.9),
            ]
        );
    }

    #[test]
    fn test_tab_separated_category() {
        let keywords = expand_keywords(&Prediction::new("n02\t\tgoldfish,\tCarassius auratus", 0.5));
        assert_eq!(words(&keywords), vec!["goldfish", "Carassius auratus"]);
    }

    #[test]
    fn test_single_token_label_is_kept_whole() {
        let keywords = expand_keywords(&Prediction::new("noCategoryOnlyOneToken", 0.3));
        assert_eq!(keywords, vec![Keyword::new("noCategoryOnlyOneToken", 0.3)]);
    }

    #[test]
    fn test_comma_edge_cases() {
        assert_eq!(words(&expand_keywords(&Prediction::new("n1 a,b,", 1.0))), vec!["a", "b"]);
        assert_eq!(words(&expand_keywords(&Prediction::new("n1 a,,b", 1.0))), vec!["a", "", "b"]);
        assert!(expand_keywords(&Prediction::new("n1 ", 1.0)).is_empty());
    }

    #[test]
    fn test_only_spaces_and_tabs_trimmed() {
        let keywords = expand_keywords(&Prediction::new("n1  padded\n, x", 1.0));
        assert_eq!(words(&keywords), vec!["padded\n", "x"]);
    }
}
