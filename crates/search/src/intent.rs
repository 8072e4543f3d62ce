//! Rule-based query intent classification.
//!
//! Each intent owns a set of regex rules. Intents are tried in a fixed
//! precedence order; the first one with a matching rule wins and its
//! confidence grows with the number of its rules that match.

use codescope_protocol::{Intent, IntentType, QueryContext};
use once_cell::sync::Lazy;
use regex::Regex;
use std::sync::Arc;

/// Confidence when nothing matched
pub const DEFAULT_CONFIDENCE: f64 = 0.5;
const BASE_CONFIDENCE: f64 = 0.7;
const EXTRA_MATCH_BONUS: f64 = 0.1;
const MAX_RULE_CONFIDENCE: f64 = 0.95;
const MAX_ADVISOR_CONFIDENCE: f64 = 0.99;
const MIN_KEYWORD_LEN: usize = 3;

/// Order in which intents are tried
pub const PRECEDENCE: [IntentType; 6] = [
    IntentType::ImpactAnalysis,
    IntentType::FindDependencies,
    IntentType::FindUsage,
    IntentType::FindPattern,
    IntentType::ArchitectureSearch,
    IntentType::FindSimilar,
];

fn compile(patterns: &[&str]) -> Vec<Regex> {
    patterns
        .iter()
        .filter_map(|p| match Regex::new(&format!("(?i){p}")) {
            Ok(re) => Some(re),
            Err(err) => {
                log::error!("Invalid intent rule '{p}': {err}");
                None
            }
        })
        .collect()
}

static IMPACT_RULES: Lazy<Vec<Regex>> = Lazy::new(|| {
    compile(&[
        r"\bimpact\b",
        r"\bwhat (would|will|could) (break|change|happen)\b",
        r"\bif (i|we|you) (change|modify|remove|delete|rename|refactor)\b",
        r"\bblast radius\b",
        r"\baffect(s|ed|ing)?\b",
        r"\brisk(s|y)?\b",
    ])
});

static DEPENDENCY_RULES: Lazy<Vec<Regex>> = Lazy::new(|| {
    compile(&[
        r"\bdependenc(y|ies)\b",
        r"\bdepends? on\b",
        r"\bwhat does \S+ (use|call|import|need|require)\b",
        r"\bimports? (of|in|from)\b",
        r"\brequire[sd]? by\b",
    ])
});

static USAGE_RULES: Lazy<Vec<Regex>> = Lazy::new(|| {
    compile(&[
        r"\busages?\b",
        r"\bwhere (is|are) .+ (used|called|referenced)\b",
        r"\bwho (calls|uses|references)\b",
        r"\b(callers?|called by|used by)\b",
        r"\breferences? (to|of)\b",
    ])
});

static PATTERN_RULES: Lazy<Vec<Regex>> = Lazy::new(|| {
    compile(&[
        r"\b(design )?patterns?\b",
        r"\b(factory|factories|builders?|singletons?|observers?|strategy|strategies|adapters?|decorators?|visitors?|repositor(y|ies)|composites?)\b",
        r"\bimplementations? of\b",
        r"\bexamples? of\b",
    ])
});

static ARCHITECTURE_RULES: Lazy<Vec<Regex>> = Lazy::new(|| {
    compile(&[
        r"\barchitecture\b",
        r"\b(modules?|layers?|components?|subsystems?)\b",
        r"\bstructure[ds]?\b",
        r"\bhow (is|are) .+ organi[sz]ed\b",
        r"\boverview\b",
    ])
});

static SIMILAR_RULES: Lazy<Vec<Regex>> = Lazy::new(|| {
    compile(&[r"\bsimilar\b", r"\blike\b", r"\bsame as\b", r"\bresembl(e|es|ing)\b"])
});

const STOPWORDS: &[&str] = &[
    "the", "and", "for", "with", "what", "where", "which", "who", "how", "does", "did", "this",
    "that", "these", "those", "from", "into", "are", "was", "were", "will", "would", "could",
    "should", "can", "all", "any", "find", "show", "list", "get", "code", "there", "when",
    "why", "about", "use", "uses", "used", "using", "have", "has", "our", "its", "you",
];

fn rules(intent: IntentType) -> &'static [Regex] {
    match intent {
        IntentType::ImpactAnalysis => &IMPACT_RULES,
        IntentType::FindDependencies => &DEPENDENCY_RULES,
        IntentType::FindUsage => &USAGE_RULES,
        IntentType::FindPattern => &PATTERN_RULES,
        IntentType::ArchitectureSearch => &ARCHITECTURE_RULES,
        IntentType::FindSimilar => &SIMILAR_RULES,
    }
}

/// External free-text classifier consulted after the rules.
///
/// It may raise the confidence of the rule-selected intent when it agrees;
/// it never changes the intent.
pub trait ConfidenceAdvisor: Send + Sync {
    fn advise(&self, query: &str, context: &QueryContext) -> Option<(IntentType, f64)>;
}

#[derive(Clone, Default)]
pub struct IntentClassifier {
    advisor: Option<Arc<dyn ConfidenceAdvisor>>,
}

impl IntentClassifier {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    #[must_use]
    pub fn with_advisor(mut self, advisor: Arc<dyn ConfidenceAdvisor>) -> Self {
        self.advisor = Some(advisor);
        self
    }

    #[must_use]
    pub fn classify(&self, query: &str, context: &QueryContext) -> Intent {
        let (intent_type, mut confidence) = Self::rule_intent(query);

        if let Some((advised, advised_confidence)) = self
            .advisor
            .as_ref()
            .and_then(|advisor| advisor.advise(query, context))
        {
            if advised == intent_type && advised_confidence > confidence {
                log::debug!(
                    "Advisor raised {intent_type} confidence {confidence:.2} -> {advised_confidence:.2}"
                );
                confidence = advised_confidence.min(MAX_ADVISOR_CONFIDENCE);
            }
        }

        let mut keywords = extract_keywords(query);
        if keywords.is_empty() {
            if let Some(focus) = context.focus_symbol.as_ref().filter(|s| !s.is_empty()) {
                keywords.push(focus.clone());
            }
        }

        Intent {
            intent_type,
            confidence,
            keywords,
        }
    }

    #[allow(clippy::cast_precision_loss)]
    fn rule_intent(query: &str) -> (IntentType, f64) {
        for intent in PRECEDENCE {
            let matched = rules(intent).iter().filter(|re| re.is_match(query)).count();
            if matched > 0 {
                let confidence = (BASE_CONFIDENCE + EXTRA_MATCH_BONUS * (matched - 1) as f64)
                    .min(MAX_RULE_CONFIDENCE);
                return (intent, confidence);
            }
        }
        (IntentType::FindSimilar, DEFAULT_CONFIDENCE)
    }
}

/// Identifier-like query words: lowercased, no stopwords, first occurrence kept
#[must_use]
pub fn extract_keywords(query: &str) -> Vec<String> {
    let mut keywords: Vec<String> = Vec::new();
    let words = query
        .split(|c: char| !(c.is_alphanumeric() || c == '_'))
        .filter(|w| w.chars().next().is_some_and(|c| !c.is_ascii_digit()));
    for word in words {
        let word = word.to_lowercase();
        if word.chars().count() < MIN_KEYWORD_LEN || STOPWORDS.contains(&word.as_str()) {
            continue;
        }
        if !keywords.contains(&word) {
            keywords.push(word);
        }
    }
    keywords
}

/// Pattern tags the query asks for: keywords naming a known tag (plural allowed)
#[must_use]
pub fn requested_patterns(intent: &Intent, known_tags: &[String]) -> Vec<String> {
    let mut tags: Vec<String> = Vec::new();
    for keyword in &intent.keywords {
        let found = known_tags.iter().find(|tag| {
            let tag = tag.as_str();
            keyword == tag
                || keyword.strip_suffix('s') == Some(tag)
                || (tag.ends_with('y')
                    && keyword.strip_suffix("ies") == tag.strip_suffix('y'))
        });
        if let Some(tag) = found {
            if !tags.contains(tag) {
                tags.push(tag.clone());
            }
        }
    }
    tags
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    fn classify(query: &str) -> Intent {
        IntentClassifier::new().classify(query, &QueryContext::default())
    }

    #[test]
    fn test_rule_intents() {
        let cases = [
            ("what is the impact of changing parse_config", IntentType::ImpactAnalysis),
            ("dependencies of UserService", IntentType::FindDependencies),
            ("where is load_user used", IntentType::FindUsage),
            ("factory implementations", IntentType::FindPattern),
            ("overview of the storage layer", IntentType::ArchitectureSearch),
            ("code similar to retry_with_backoff", IntentType::FindSimilar),
        ];
        for (query, expected) in cases {
            assert_eq!(classify(query).intent_type, expected, "{query}");
        }
    }

    #[test]
    fn test_default_is_find_similar() {
        let intent = classify("parse configuration file");
        assert_eq!(intent.intent_type, IntentType::FindSimilar);
        assert!((intent.confidence - DEFAULT_CONFIDENCE).abs() < 1e-12);
        assert_eq!(intent.keywords, vec!["parse", "configuration", "file"]);
    }

    #[test]
    fn test_precedence_and_confidence() {
        // usage and impact both match; impact wins
        let intent = classify("who calls save_order and what would break if we change it");
        assert_eq!(intent.intent_type, IntentType::ImpactAnalysis);
        // two impact rules matched
        assert!((intent.confidence - 0.8).abs() < 1e-12);

        let capped = classify(
            "impact and blast radius: what will break if I change this, affected risky code",
        );
        assert!((capped.confidence - MAX_RULE_CONFIDENCE).abs() < 1e-12);
    }

    #[test]
    fn test_focus_symbol_fills_empty_keywords() {
        let context = QueryContext {
            focus_symbol: Some("parse_config".to_string()),
            ..QueryContext::default()
        };
        let intent = IntentClassifier::new().classify("who uses it?", &context);
        assert_eq!(intent.intent_type, IntentType::FindUsage);
        assert_eq!(intent.keywords, vec!["parse_config"]);
    }

    #[test]
    fn test_advisor_only_raises_agreeing_confidence() {
        struct Fixed(IntentType, f64);
        impl ConfidenceAdvisor for Fixed {
            fn advise(&self, _query: &str, _context: &QueryContext) -> Option<(IntentType, f64)> {
                Some((self.0, self.1))
            }
        }
        let ctx = QueryContext::default();

        let agree = IntentClassifier::new()
            .with_advisor(Arc::new(Fixed(IntentType::FindUsage, 1.5)))
            .classify("usages of Parser", &ctx);
        assert_eq!(agree.intent_type, IntentType::FindUsage);
        assert!((agree.confidence - MAX_ADVISOR_CONFIDENCE).abs() < 1e-12);

        let disagree = IntentClassifier::new()
            .with_advisor(Arc::new(Fixed(IntentType::FindPattern, 0.9)))
            .classify("usages of Parser", &ctx);
        assert_eq!(disagree.intent_type, IntentType::FindUsage);
        assert!((disagree.confidence - 0.7).abs() < 1e-12);
    }

    #[test]
    fn test_requested_patterns() {
        let known = vec!["factory".to_string(), "observer".to_string(), "repository".to_string()];
        let intent = classify("factories and observers over repositories");
        assert_eq!(
            requested_patterns(&intent, &known),
            vec!["factory", "observer", "repository"]
        );
    }
}
