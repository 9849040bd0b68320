use serde::{Deserialize, Serialize};

/// Strategy used when neither the classifier nor the caller picks one.
pub const DEFAULT_STRATEGY: &str = "balanced";

/// Named sizing configuration resolved against the active model budget
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ChunkingStrategy {
    pub name: String,
    pub max_tokens: usize,
    pub overlap_tokens: usize,
    pub min_section_tokens: usize,
    pub description: String,
}

/// Budget-relative definition of a strategy tier
struct StrategyTemplate {
    name: &'static str,
    description: &'static str,
    /// Fraction of the model budget
    max_ratio: f64,
    /// Fraction of the tier's own max
    overlap_ratio: f64,
    min_section_ratio: f64,
}

const TEMPLATES: &[StrategyTemplate] = &[
    StrategyTemplate {
        name: "precise",
        description: "Small focused chunks for high-precision retrieval",
        max_ratio: 0.25,
        overlap_ratio: 0.125,
        min_section_ratio: 0.05,
    },
    StrategyTemplate {
        name: "balanced",
        description: "Mid-sized chunks balancing precision and context",
        max_ratio: 0.5,
        overlap_ratio: 0.125,
        min_section_ratio: 0.1,
    },
    StrategyTemplate {
        name: "context",
        description: "Chunks filling the model budget for maximum context",
        max_ratio: 1.0,
        overlap_ratio: 0.125,
        min_section_ratio: 0.2,
    },
    StrategyTemplate {
        name: "code_aware",
        description: "Large chunks that keep whole definitions together",
        max_ratio: 0.75,
        overlap_ratio: 0.0625,
        min_section_ratio: 0.05,
    },
    StrategyTemplate {
        name: "api_reference",
        description: "Endpoint-sized chunks for API references",
        max_ratio: 0.5,
        overlap_ratio: 0.1,
        min_section_ratio: 0.1,
    },
    StrategyTemplate {
        name: "workflow",
        description: "Step-preserving chunks with generous overlap",
        max_ratio: 0.5,
        overlap_ratio: 0.15,
        min_section_ratio: 0.1,
    },
];

/// Strategy table scaled to one model budget; immutable after construction
#[derive(Debug, Clone)]
pub struct StrategyRegistry {
    model_max_tokens: usize,
    strategies: Vec<ChunkingStrategy>,
}

impl StrategyRegistry {
    /// Scale every tier to `model_max_tokens`.
    ///
    /// A `max_override` replaces every tier's max (callers validate it against the model
    /// budget); an `overlap_override` replaces every tier's overlap. Overlap never exceeds half
    /// of a tier's max.
    #[must_use]
    pub fn for_budget(
        model_max_tokens: usize,
        max_override: Option<usize>,
        overlap_override: Option<usize>,
    ) -> Self {
        let model_max_tokens = model_max_tokens.max(1);
        let strategies = TEMPLATES
            .iter()
            .map(|template| {
                let scaled = scale(model_max_tokens, template.max_ratio);
                let max_tokens = max_override.unwrap_or(scaled).clamp(1, model_max_tokens);
                let overlap_tokens = overlap_override
                    .unwrap_or_else(|| scale(max_tokens, template.overlap_ratio))
                    .min(max_tokens / 2);
                ChunkingStrategy {
                    name: template.name.to_string(),
                    max_tokens,
                    overlap_tokens,
                    min_section_tokens: scale(max_tokens, template.min_section_ratio),
                    description: template.description.to_string(),
                }
            })
            .collect();

        Self {
            model_max_tokens,
            strategies,
        }
    }

    #[must_use]
    pub fn get(&self, name: &str) -> Option<&ChunkingStrategy> {
        self.strategies.iter().find(|s| s.name == name)
    }

    /// The strategy every unknown classifier mapping falls back to
    #[must_use]
    pub fn default_strategy(&self) -> &ChunkingStrategy {
        self.get(DEFAULT_STRATEGY)
            .unwrap_or(&self.strategies[0])
    }

    #[must_use]
    pub fn names(&self) -> Vec<&str> {
        self.strategies.iter().map(|s| s.name.as_str()).collect()
    }

    #[must_use]
    pub const fn model_max_tokens(&self) -> usize {
        self.model_max_tokens
    }

    pub fn iter(&self) -> impl Iterator<Item = &ChunkingStrategy> {
        self.strategies.iter()
    }
}

fn scale(base: usize, ratio: f64) -> usize {
    ((base as f64) * ratio).round().max(1.0) as usize
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn tiers_scale_with_model_budget() {
        let small = StrategyRegistry::for_budget(256, None, None);
        let large = StrategyRegistry::for_budget(26_000, None, None);

        for name in ["precise", "balanced", "context"] {
            let s = small.get(name).unwrap();
            let l = large.get(name).unwrap();
            assert!(l.max_tokens > s.max_tokens * 50, "{name} did not scale");
            assert!(s.max_tokens <= 256);
            assert!(l.max_tokens <= 26_000);
        }
        assert_eq!(large.get("balanced").unwrap().max_tokens, 13_000);
    }

    #[test]
    fn default_budget_context_tier_matches_defaults() {
        let registry = StrategyRegistry::for_budget(1024, None, None);
        let context = registry.get("context").unwrap();
        assert_eq!(context.max_tokens, 1024);
        assert_eq!(context.overlap_tokens, 128);
    }

    #[test]
    fn overrides_apply_to_every_tier() {
        let registry = StrategyRegistry::for_budget(8192, Some(300), Some(20));
        for strategy in registry.iter() {
            assert_eq!(strategy.max_tokens, 300);
            assert_eq!(strategy.overlap_tokens, 20);
        }
    }

    #[test]
    fn overlap_is_capped_at_half_of_max() {
        let registry = StrategyRegistry::for_budget(100, Some(10), Some(50));
        assert_eq!(registry.get("balanced").unwrap().overlap_tokens, 5);
    }

    #[test]
    fn default_strategy_is_balanced() {
        let registry = StrategyRegistry::for_budget(512, None, None);
        assert_eq!(registry.default_strategy().name, DEFAULT_STRATEGY);
        assert_eq!(registry.names().len(), 6);
    }
}
