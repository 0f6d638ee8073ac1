//! Per-request similarity threshold policy

use serde::{Deserialize, Serialize};

/// Lower bound of any computed threshold
pub const MIN_THRESHOLD: f64 = 0.70;
/// Upper bound of any computed threshold
pub const MAX_THRESHOLD: f64 = 0.95;

const COLD_POPULATION: usize = 100;
const WARM_POPULATION: usize = 5000;

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Complexity {
    Simple,
    Moderate,
    Complex,
    #[default]
    Unknown,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Seniority {
    Entry,
    Mid,
    Senior,
    Executive,
    #[default]
    Unknown,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Industry {
    Tech,
    Finance,
    Creative,
    Consulting,
    #[default]
    Other,
}

/// What is known about a request when choosing its threshold
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ThresholdContext {
    #[serde(default)]
    pub complexity: Complexity,
    #[serde(default)]
    pub seniority: Seniority,
    #[serde(default)]
    pub industry: Industry,
    /// Required plus preferred skills, if extracted
    #[serde(default)]
    pub skill_count: Option<usize>,
}

impl ThresholdContext {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_complexity(mut self, complexity: Complexity) -> Self {
        self.complexity = complexity;
        self
    }

    pub fn with_seniority(mut self, seniority: Seniority) -> Self {
        self.seniority = seniority;
        self
    }

    pub fn with_industry(mut self, industry: Industry) -> Self {
        self.industry = industry;
        self
    }

    pub fn with_skill_count(mut self, count: usize) -> Self {
        self.skill_count = Some(count);
        self
    }

    /// Nothing at all is known about the request
    pub fn is_empty(&self) -> bool {
        *self == Self::default()
    }
}

/// Additive threshold adjustments around a base value
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ThresholdPolicy {
    base: f64,
}

impl ThresholdPolicy {
    pub fn new(base: f64) -> Self {
        Self { base }
    }

    pub fn base(&self) -> f64 {
        self.base
    }

    /// Compute the acceptance threshold for one request
    ///
    /// An empty context yields the base value clamped to
    /// `[MIN_THRESHOLD, MAX_THRESHOLD]`. Otherwise the complexity, seniority,
    /// industry, skill-count and population adjustments are summed onto the
    /// base and the total is clamped to the same range.
    pub fn compute(&self, context: &ThresholdContext, population: usize) -> f64 {
        if context.is_empty() {
            return self.base.clamp(MIN_THRESHOLD, MAX_THRESHOLD);
        }

        let complexity = match context.complexity {
            Complexity::Simple => -0.05,
            Complexity::Moderate => -0.02,
            Complexity::Complex => 0.03,
            Complexity::Unknown => 0.0,
        };

        let seniority = match context.seniority {
            Seniority::Executive | Seniority::Senior => 0.04,
            Seniority::Entry => -0.03,
            Seniority::Mid | Seniority::Unknown => 0.0,
        };

        let industry = match context.industry {
            Industry::Tech | Industry::Finance => -0.02,
            Industry::Creative | Industry::Consulting => 0.03,
            Industry::Other => 0.0,
        };

        let skills = match context.skill_count {
            Some(n) if n >= 10 => 0.02,
            Some(n) if n <= 3 => -0.02,
            _ => 0.0,
        };

        let population = if population < COLD_POPULATION {
            -0.05
        } else if population > WARM_POPULATION {
            0.02
        } else {
            0.0
        };

        let threshold = self.base + complexity + seniority + industry + skills + population;

        tracing::trace!(
            base = self.base,
            complexity,
            seniority,
            industry,
            skills,
            population,
            threshold,
            "Computed dynamic threshold"
        );

        threshold.clamp(MIN_THRESHOLD, MAX_THRESHOLD)
    }
}

impl Default for ThresholdPolicy {
    fn default() -> Self {
        Self::new(0.85)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_empty_context_returns_base() {
        let policy = ThresholdPolicy::default();
        assert!((policy.compute(&ThresholdContext::new(), 0) - 0.85).abs() < 1e-9);
    }

    #[test]
    fn test_simple_entry_level_cold_cache_is_permissive() {
        let policy = ThresholdPolicy::default();
        let context = ThresholdContext::new()
            .with_complexity(Complexity::Simple)
            .with_seniority(Seniority::Entry)
            .with_skill_count(2);

        // 0.85 - 0.05 - 0.03 - 0.02 - 0.05 = 0.70
        assert!((policy.compute(&context, 10) - 0.70).abs() < 1e-9);
    }

    #[test]
    fn test_senior_creative_warm_cache_is_strict() {
        let policy = ThresholdPolicy::default();
        let context = ThresholdContext::new()
            .with_complexity(Complexity::Complex)
            .with_seniority(Seniority::Senior)
            .with_industry(Industry::Creative)
            .with_skill_count(12);

        // 0.85 + 0.03 + 0.04 + 0.03 + 0.02 + 0.02 clamps to 0.95
        assert!((policy.compute(&context, 10_000) - MAX_THRESHOLD).abs() < 1e-9);
    }

    #[test]
    fn test_mid_population_has_no_adjustment() {
        let policy = ThresholdPolicy::default();
        let context = ThresholdContext::new().with_industry(Industry::Tech);

        assert!((policy.compute(&context, 1000) - 0.83).abs() < 1e-9);
    }

    #[test]
    fn test_always_within_bounds() {
        let complexities = [
            Complexity::Simple,
            Complexity::Moderate,
            Complexity::Complex,
            Complexity::Unknown,
        ];
        let seniorities = [
            Seniority::Entry,
            Seniority::Mid,
            Seniority::Senior,
            Seniority::Executive,
            Seniority::Unknown,
        ];
        let industries = [
            Industry::Tech,
            Industry::Finance,
            Industry::Creative,
            Industry::Consulting,
            Industry::Other,
        ];
        let skill_counts = [None, Some(0), Some(5), Some(50)];
        let populations = [0, 99, 100, 5000, 5001, usize::MAX];

        for base in [0.0, 0.5, 0.85, 1.0, 3.0] {
            let policy = ThresholdPolicy::new(base);

            for complexity in complexities {
                for seniority in seniorities {
                    for industry in industries {
                        for skill_count in skill_counts {
                            let context = ThresholdContext {
                                complexity,
                                seniority,
                                industry,
                                skill_count,
                            };

                            for population in populations {
                                let t = policy.compute(&context, population);
                                assert!((MIN_THRESHOLD..=MAX_THRESHOLD).contains(&t));
                            }
                        }
                    }
                }
            }
        }
    }
}
