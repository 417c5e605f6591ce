//! Sentiment feature extraction for donor comments.
//!
//! Produces a VADER-style compound polarity score in [-1, 1] from a
//! built-in valence lexicon. The lexicon is built once on first use and
//! shared read-only afterwards.

use once_cell::sync::Lazy;
use std::collections::HashMap;

/// Scalar added per booster word ("very", "slightly", ...)
const BOOSTER_INCREMENT: f64 = 0.293;
/// Multiplier applied to a valence preceded by a negation
const NEGATION_SCALAR: f64 = -0.74;
/// Extra valence for an ALL-CAPS word in mixed-case text
const CAPS_INCREMENT: f64 = 0.733;
const EXCLAMATION_INCREMENT: f64 = 0.292;
const QUESTION_INCREMENT: f64 = 0.18;
/// Normalization constant for the compound score
const ALPHA: f64 = 15.0;

static LEXICON: Lazy<SentimentLexicon> = Lazy::new(SentimentLexicon::new);

/// Compound sentiment of a comment; empty or missing text scores exactly 0.
pub fn sentiment(text: Option<&str>) -> f64 {
    match text {
        Some(text) if !text.trim().is_empty() => LEXICON.compound(text),
        _ => 0.0,
    }
}

/// Feature extractor that derives the sentiment column from donor comments.
#[derive(Debug, Clone, Copy, Default)]
pub struct FeatureExtractor;

impl FeatureExtractor {
    pub fn new() -> Self {
        Self
    }

    /// Sentiment score of a donor comment
    pub fn sentiment_score(&self, comment: &str) -> f64 {
        sentiment(Some(comment))
    }
}

/// Word valences on the VADER [-4, 4] scale plus modifier word lists.
struct SentimentLexicon {
    valences: HashMap<&'static str, f64>,
    boosters: HashMap<&'static str, f64>,
    negations: Vec<&'static str>,
}

impl SentimentLexicon {
    fn new() -> Self {
        let valences: HashMap<&'static str, f64> = [
            // Positive
            ("amazing", 2.8),
            ("appreciate", 1.7),
            ("awesome", 3.1),
            ("best", 3.2),
            ("better", 1.9),
            ("bless", 1.8),
            ("blessed", 2.9),
            ("care", 2.2),
            ("cheer", 2.3),
            ("excellent", 2.7),
            ("fantastic", 2.6),
            ("generous", 2.3),
            ("glad", 2.0),
            ("good", 1.9),
            ("grateful", 2.0),
            ("great", 3.1),
            ("happy", 2.7),
            ("help", 1.7),
            ("helping", 1.2),
            ("hope", 1.9),
            ("inspiring", 2.5),
            ("kind", 2.4),
            ("like", 1.5),
            ("love", 3.2),
            ("lovely", 2.8),
            ("nice", 1.8),
            ("proud", 2.1),
            ("support", 1.7),
            ("thank", 1.5),
            ("thanks", 1.9),
            ("wonderful", 2.7),
            ("worthy", 1.9),
            // Negative
            ("angry", -2.3),
            ("awful", -2.0),
            ("bad", -2.5),
            ("cheat", -2.1),
            ("disgusting", -2.4),
            ("fake", -2.1),
            ("fraud", -2.8),
            ("hate", -2.7),
            ("horrible", -2.5),
            ("lie", -1.6),
            ("liar", -2.8),
            ("poor", -2.1),
            ("sad", -2.1),
            ("scam", -2.5),
            ("steal", -2.2),
            ("stolen", -2.2),
            ("stupid", -2.4),
            ("terrible", -2.1),
            ("useless", -1.8),
            ("waste", -1.8),
            ("worst", -3.1),
            ("wrong", -2.1),
        ]
        .into_iter()
        .collect();

        let boosters: HashMap<&'static str, f64> = [
            ("absolutely", BOOSTER_INCREMENT),
            ("extremely", BOOSTER_INCREMENT),
            ("incredibly", BOOSTER_INCREMENT),
            ("really", BOOSTER_INCREMENT),
            ("so", BOOSTER_INCREMENT),
            ("totally", BOOSTER_INCREMENT),
            ("very", BOOSTER_INCREMENT),
            ("barely", -BOOSTER_INCREMENT),
            ("hardly", -BOOSTER_INCREMENT),
            ("kinda", -BOOSTER_INCREMENT),
            ("slightly", -BOOSTER_INCREMENT),
            ("somewhat", -BOOSTER_INCREMENT),
        ]
        .into_iter()
        .collect();

        let negations = vec![
            "aint", "cannot", "cant", "didnt", "doesnt", "dont", "isnt", "never", "no",
            "nobody", "none", "not", "nothing", "wasnt", "without", "wont",
        ];

        Self {
            valences,
            boosters,
            negations,
        }
    }

    fn is_negation(&self, token: &str) -> bool {
        let bare = token.replace('\'', "");
        self.negations.contains(&bare.as_str()) || token.ends_with("n't")
    }

    fn compound(&self, text: &str) -> f64 {
        let raw_tokens: Vec<&str> = text
            .split_whitespace()
            .map(|t| t.trim_matches(|c: char| !c.is_alphanumeric() && c != '\''))
            .filter(|t| !t.is_empty())
            .collect();
        let lowered: Vec<String> = raw_tokens.iter().map(|t| t.to_lowercase()).collect();

        let mixed_case = raw_tokens.iter().any(|t| is_all_caps(t))
            && raw_tokens.iter().any(|t| !is_all_caps(t));

        let mut valences = vec![0.0; lowered.len()];
        for (i, word) in lowered.iter().enumerate() {
            let Some(&base) = self.valences.get(word.as_str()) else {
                continue;
            };
            let mut valence = base;

            if mixed_case && is_all_caps(raw_tokens[i]) {
                valence += CAPS_INCREMENT * valence.signum();
            }

            // Boosters and negations within the three preceding tokens
            for distance in 1..=3 {
                if i < distance {
                    break;
                }
                let prior = lowered[i - distance].as_str();
                if let Some(&boost) = self.boosters.get(prior) {
                    let damping = match distance {
                        1 => 1.0,
                        2 => 0.95,
                        _ => 0.9,
                    };
                    valence += boost * damping * valence.signum();
                }
                if self.is_negation(prior) {
                    valence *= NEGATION_SCALAR;
                }
            }

            valences[i] = valence;
        }

        // Contrastive "but": dampen the clause before, stress the clause after
        if let Some(pivot) = lowered.iter().position(|w| w == "but") {
            for (i, valence) in valences.iter_mut().enumerate() {
                if i < pivot {
                    *valence *= 0.5;
                } else if i > pivot {
                    *valence *= 1.5;
                }
            }
        }

        let mut sum: f64 = valences.iter().sum();
        if sum != 0.0 {
            let exclamations = text.matches('!').count().min(4) as f64;
            let questions = text.matches('?').count();
            let questions = if questions > 1 { questions.min(3) as f64 } else { 0.0 };
            let emphasis = exclamations * EXCLAMATION_INCREMENT + questions * QUESTION_INCREMENT;
            sum += emphasis * sum.signum();
        }

        let compound = (sum / (sum * sum + ALPHA).sqrt()).clamp(-1.0, 1.0);
        (compound * 10_000.0).round() / 10_000.0
    }
}

fn is_all_caps(token: &str) -> bool {
    token.chars().any(|c| c.is_alphabetic())
        && token.chars().filter(|c| c.is_alphabetic()).all(|c| c.is_uppercase())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_empty_comment_is_neutral() {
        assert_eq!(sentiment(None), 0.0);
        assert_eq!(sentiment(Some("")), 0.0);
        assert_eq!(sentiment(Some("   \t")), 0.0);
    }

    #[test]
    fn test_positive_comment() {
        let score = sentiment(Some("Great cause! Happy to help."));
        assert!(score > 0.5, "score was {}", score);
        assert!(score <= 1.0);
    }

    #[test]
    fn test_negative_comment() {
        let score = sentiment(Some("This is a scam, worst charity ever"));
        assert!(score < -0.5, "score was {}", score);
    }

    #[test]
    fn test_negation_flips_polarity() {
        let plain = sentiment(Some("good cause"));
        let negated = sentiment(Some("not a good cause"));
        assert!(plain > 0.0);
        assert!(negated < 0.0);
    }

    #[test]
    fn test_booster_and_emphasis_increase_intensity() {
        let plain = sentiment(Some("good work"));
        let boosted = sentiment(Some("very good work"));
        let shouted = sentiment(Some("very good work!!!"));
        assert!(boosted > plain);
        assert!(shouted > boosted);
    }

    #[test]
    fn test_unknown_words_score_zero() {
        assert_eq!(sentiment(Some("For a better tomorrow")), sentiment(Some("better")));
        assert_eq!(sentiment(Some("lorem ipsum dolor")), 0.0);
    }

    #[test]
    fn test_deterministic() {
        let text = "Keep up the good work!";
        let extractor = FeatureExtractor::new();
        assert_eq!(
            extractor.sentiment_score(text).to_bits(),
            extractor.sentiment_score(text).to_bits()
        );
    }
}
