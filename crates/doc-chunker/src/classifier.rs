use crate::strategy::DEFAULT_STRATEGY;

/// Category used when no keyword matches
pub const BASELINE_CATEGORY: &str = "general";

/// Bonus applied when a keyword appears in the filename
const FILENAME_BONUS: usize = 3;

struct CategoryRule {
    name: &'static str,
    strategy: &'static str,
    keywords: &'static [&'static str],
}

/// Registration order breaks ties
const RULES: &[CategoryRule] = &[
    CategoryRule {
        name: "code_repository",
        strategy: "code_aware",
        keywords: &[
            "function", "class", "import", "module", "repository", "source code", "def ",
            "struct", "compile", "library", "src",
        ],
    },
    CategoryRule {
        name: "api_documentation",
        strategy: "api_reference",
        keywords: &[
            "api", "endpoint", "request", "response", "parameter", "http", "status code",
            "authentication", "json", "get ", "post ",
        ],
    },
    CategoryRule {
        name: "workflow_documentation",
        strategy: "workflow",
        keywords: &[
            "workflow", "pipeline", "step", "stage", "deploy", "process", "runbook", "procedure",
            "checklist",
        ],
    },
    CategoryRule {
        name: "tutorial",
        strategy: "balanced",
        keywords: &[
            "tutorial", "guide", "how to", "example", "getting started", "walkthrough", "learn",
            "lesson",
        ],
    },
    CategoryRule {
        name: "research_paper",
        strategy: "context",
        keywords: &[
            "abstract", "methodology", "results", "conclusion", "references", "experiment",
            "hypothesis", "et al", "dataset",
        ],
    },
];

/// Outcome of content classification
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Classification {
    pub category: &'static str,
    pub strategy: &'static str,
    pub score: usize,
}

/// Keyword-count heuristic mapping a document to a category and strategy name
#[derive(Debug, Default, Clone, Copy)]
pub struct ContentClassifier;

impl ContentClassifier {
    #[must_use]
    pub const fn new() -> Self {
        Self
    }

    #[must_use]
    pub fn classify(&self, text: &str, filename: &str) -> Classification {
        let lowered = text.to_lowercase();
        let filename = filename.to_lowercase();

        let mut best = Classification {
            category: BASELINE_CATEGORY,
            strategy: DEFAULT_STRATEGY,
            score: 0,
        };

        for rule in RULES {
            let score: usize = rule
                .keywords
                .iter()
                .map(|keyword| {
                    let hits = lowered.matches(keyword).count();
                    let bonus = if filename.contains(keyword.trim()) {
                        FILENAME_BONUS
                    } else {
                        0
                    };
                    hits + bonus
                })
                .sum();

            if score > best.score {
                best = Classification {
                    category: rule.name,
                    strategy: rule.strategy,
                    score,
                };
            }
        }

        log::debug!(
            "Classified '{filename}' as {} (score {}) -> {}",
            best.category,
            best.score,
            best.strategy
        );
        best
    }

    /// Every category name, baseline last
    #[must_use]
    pub fn categories() -> Vec<&'static str> {
        RULES
            .iter()
            .map(|rule| rule.name)
            .chain(std::iter::once(BASELINE_CATEGORY))
            .collect()
    }
}
