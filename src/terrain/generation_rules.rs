use rand::{Rng, RngCore};
use serde::{Deserialize, Serialize};
use std::fmt::Debug;
use std::sync::Arc;

use crate::core::error::{WorldError, WorldResult};

/// What a placement rule knows about a candidate instance.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct PlacementCandidate {
    pub x: f32,
    pub z: f32,
    // World height at the candidate
    pub height: f32,
    // The grid's own normalized noise at the candidate, in [0, 1]
    pub metric: f32,
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub enum RuleVerdict {
    Accept,
    Reject,
    // Rejected, unless a draw below the given probability lets it through
    SecondChance(f32),
}

/// Per-candidate veto hook consulted by the scatter plotters.
pub trait PlacementRule: Debug + Send + Sync {
    fn name(&self) -> &str;
    fn evaluate(&self, candidate: &PlacementCandidate) -> RuleVerdict;
}

// Rejects candidates on "paths", i.e. where the grid noise falls below the
// threshold, while letting `second_chance` of them through for soft edges.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct PathsRule {
    pub threshold: f32,
    pub second_chance: f32,
}

impl PathsRule {
    pub fn new(threshold: f32, second_chance: f32) -> Self {
        PathsRule { threshold, second_chance }
    }
}

impl PlacementRule for PathsRule {
    fn name(&self) -> &str {
        "paths"
    }

    fn evaluate(&self, candidate: &PlacementCandidate) -> RuleVerdict {
        if candidate.metric < self.threshold {
            RuleVerdict::SecondChance(self.second_chance)
        } else {
            RuleVerdict::Accept
        }
    }
}

/// Declarative form of the built-in rules, as found in world config files.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(tag = "rule", rename_all = "snake_case")]
pub enum RuleConfig {
    Paths { threshold: f32, second_chance: f32 },
}

impl RuleConfig {
    pub fn build(&self) -> Arc<dyn PlacementRule> {
        match *self {
            RuleConfig::Paths { threshold, second_chance } => Arc::new(PathsRule::new(threshold, second_chance)),
        }
    }

    pub fn validate(&self, owner: &str) -> WorldResult<()> {
        match *self {
            RuleConfig::Paths { threshold, second_chance } => {
                if !(0.0..=1.0).contains(&threshold) {
                    return Err(WorldError::invalid(format!("{owner}.paths.threshold"), "must be within 0..=1"));
                }
                if !(0.0..=1.0).contains(&second_chance) {
                    return Err(WorldError::invalid(format!("{owner}.paths.second_chance"), "must be within 0..=1"));
                }
                Ok(())
            }
        }
    }
}

// Ordered set of rules; a candidate has to pass every one of them
#[derive(Debug, Clone, Default)]
pub struct RuleChain {
    rules: Vec<Arc<dyn PlacementRule>>,
}

impl RuleChain {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn from_configs(configs: &[RuleConfig]) -> Self {
        RuleChain {
            rules: configs.iter().map(RuleConfig::build).collect(),
        }
    }

    pub fn push(&mut self, rule: Arc<dyn PlacementRule>) {
        self.rules.push(rule);
    }

    pub fn len(&self) -> usize {
        self.rules.len()
    }

    pub fn is_empty(&self) -> bool {
        self.rules.is_empty()
    }

    pub fn names(&self) -> Vec<String> {
        self.rules.iter().map(|rule| rule.name().to_string()).collect()
    }

    // Every rule is evaluated, so the number of draws per candidate does not
    // depend on which rule rejected it.
    pub fn allows(&self, candidate: &PlacementCandidate, rng: &mut dyn RngCore) -> bool {
        let mut allowed = true;
        for rule in &self.rules {
            let passed = match rule.evaluate(candidate) {
                RuleVerdict::Accept => true,
                RuleVerdict::Reject => false,
                RuleVerdict::SecondChance(probability) => rng.random::<f32>() < probability,
            };
            allowed &= passed;
        }
        allowed
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rand::SeedableRng;
    use rand_chacha::ChaCha8Rng;

    fn candidate(metric: f32) -> PlacementCandidate {
        PlacementCandidate { x: 0.0, z: 0.0, height: 20.0, metric }
    }

    #[derive(Debug)]
    struct NeverRule;

    impl PlacementRule for NeverRule {
        fn name(&self) -> &str {
            "never"
        }

        fn evaluate(&self, _: &PlacementCandidate) -> RuleVerdict {
            RuleVerdict::Reject
        }
    }

    #[test]
    fn test_empty_chain_accepts() {
        let chain = RuleChain::new();
        let mut rng = ChaCha8Rng::seed_from_u64(1);
        assert!(chain.allows(&candidate(0.0), &mut rng));
    }

    #[test]
    fn test_paths_rule_accepts_above_threshold() {
        let rule = PathsRule::new(0.1, 0.1);
        assert_eq!(rule.evaluate(&candidate(0.5)), RuleVerdict::Accept);
        assert_eq!(rule.evaluate(&candidate(0.05)), RuleVerdict::SecondChance(0.1));
    }

    #[test]
    fn test_second_chance_rate() {
        let chain = RuleChain::from_configs(&[RuleConfig::Paths { threshold: 0.1, second_chance: 0.1 }]);
        let mut rng = ChaCha8Rng::seed_from_u64(0x5eed);
        let samples = 20_000;
        let accepted = (0..samples).filter(|_| chain.allows(&candidate(0.05), &mut rng)).count();
        let rate = accepted as f64 / samples as f64;
        assert!((rate - 0.1).abs() < 0.015, "second chance rate was {rate}");
    }

    #[test]
    fn test_chain_requires_all_rules() {
        let mut chain = RuleChain::from_configs(&[RuleConfig::Paths { threshold: 0.1, second_chance: 1.0 }]);
        let mut rng = ChaCha8Rng::seed_from_u64(3);
        assert!(chain.allows(&candidate(0.9), &mut rng));
        chain.push(Arc::new(NeverRule));
        assert!(!chain.allows(&candidate(0.9), &mut rng));
        assert_eq!(chain.names(), vec!["paths".to_string(), "never".to_string()]);
    }

    #[test]
    fn test_rule_config_validation() {
        assert!(RuleConfig::Paths { threshold: 0.2, second_chance: 0.2 }.validate("Grass").is_ok());
        assert!(RuleConfig::Paths { threshold: 1.5, second_chance: 0.2 }.validate("Grass").is_err());
    }

    #[test]
    fn test_rule_config_toml() {
        #[derive(Deserialize)]
        struct Holder {
            rules: Vec<RuleConfig>,
        }
        let holder: Holder = toml::from_str(
            r#"
            [[rules]]
            rule = "paths"
            threshold = 0.1
            second_chance = 0.1
            "#,
        )
        .unwrap();
        assert_eq!(holder.rules, vec![RuleConfig::Paths { threshold: 0.1, second_chance: 0.1 }]);
    }
}
