use regex::Regex;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::sync::LazyLock;

/// Coarse purpose of a question, used to tune retrieval.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Intent {
    /// Locate something.
    File,
    /// Procedural explanation.
    How,
    /// Rationale.
    Why,
    /// General understanding.
    Explain,
    Default,
}

impl Intent {
    pub const ALL: [Intent; 5] = [
        Intent::File,
        Intent::How,
        Intent::Why,
        Intent::Explain,
        Intent::Default,
    ];

    pub fn as_str(self) -> &'static str {
        match self {
            Intent::File => "file",
            Intent::How => "how",
            Intent::Why => "why",
            Intent::Explain => "explain",
            Intent::Default => "default",
        }
    }

    pub fn from_name(name: &str) -> Option<Self> {
        Self::ALL.into_iter().find(|i| i.as_str() == name)
    }
}

impl fmt::Display for Intent {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// One row of the classification table.
#[derive(Debug, Clone)]
pub struct IntentRule {
    pub intent: Intent,
    pub pattern: Regex,
}

static DEFAULT_RULES: LazyLock<Vec<IntentRule>> = LazyLock::new(|| {
    [
        (
            Intent::File,
            r"\b(where|locate[sd]?|location of|which (files?|modules?|director(y|ies)|class|function)|what (files?|modules?))\b",
        ),
        (Intent::How, r"\bhow\b"),
        (Intent::Why, r"\b(why|rationale|reasons? (for|behind)|purpose of)\b"),
        (
            Intent::Explain,
            r"\b(explain\w*|what (does|do|is|are)|describe|walk me through|overview)\b",
        ),
    ]
    .into_iter()
    .map(|(intent, pattern)| IntentRule {
        intent,
        pattern: Regex::new(pattern).expect("invalid intent pattern"),
    })
    .collect()
});

/// Ordered `(pattern, intent)` table over the lowercased question; the
/// first matching row wins and no match means [`Intent::Default`].
#[derive(Debug, Clone)]
pub struct IntentClassifier {
    rules: Vec<IntentRule>,
}

impl Default for IntentClassifier {
    fn default() -> Self {
        Self {
            rules: DEFAULT_RULES.clone(),
        }
    }
}

impl IntentClassifier {
    /// Classifier with a custom table, evaluated in the given order.
    pub fn with_rules(rules: Vec<IntentRule>) -> Self {
        Self { rules }
    }

    pub fn classify(&self, question: &str) -> Intent {
        let question = question.to_lowercase();
        self.rules
            .iter()
            .find(|rule| rule.pattern.is_match(&question))
            .map_or(Intent::Default, |rule| rule.intent)
    }
}
