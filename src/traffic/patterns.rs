use std::fs;
use std::path::Path;
use std::time::Duration;

use log::info;
use rand::distributions::{Distribution, WeightedIndex};
use rand::Rng;
use serde::{Deserialize, Serialize};

use super::actions::Action;
use crate::error_handling::types::ConfigError;

/// A named burst of actions.
///
/// The actions run in order with `action_delay_ms` between them; afterwards
/// the client sleeps for a uniformly random time in
/// `[min_sleep_ms, max_sleep_ms]`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TrafficPattern {
    pub name: String,
    pub weight: u32,
    pub actions: Vec<Action>,
    #[serde(default)]
    pub action_delay_ms: u64,
    #[serde(default)]
    pub min_sleep_ms: u64,
    #[serde(default)]
    pub max_sleep_ms: u64,
}

impl TrafficPattern {
    pub fn new(
        name: &str,
        weight: u32,
        actions: Vec<Action>,
        action_delay_ms: u64,
        sleep_ms: (u64, u64),
    ) -> Self {
        Self {
            name: name.to_string(),
            weight,
            actions,
            action_delay_ms,
            min_sleep_ms: sleep_ms.0,
            max_sleep_ms: sleep_ms.1,
        }
    }

    pub fn action_delay(&self) -> Duration {
        Duration::from_millis(self.action_delay_ms)
    }

    pub fn random_sleep<R: Rng + ?Sized>(&self, rng: &mut R) -> Duration {
        Duration::from_millis(rng.gen_range(self.min_sleep_ms..=self.max_sleep_ms))
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.name.trim().is_empty() {
            return Err(ConfigError::EmptyValue("pattern name".into()));
        }
        if self.actions.is_empty() {
            return Err(ConfigError::EmptyValue(format!(
                "actions of pattern {}",
                self.name
            )));
        }
        if self.min_sleep_ms > self.max_sleep_ms {
            return Err(ConfigError::NotInRange(format!(
                "pattern {}: min_sleep_ms {} exceeds max_sleep_ms {}",
                self.name, self.min_sleep_ms, self.max_sleep_ms
            )));
        }
        Ok(())
    }
}

/// Built-in table, from slow browsing to tight polling.
pub fn default_patterns() -> Vec<TrafficPattern> {
    use Action::*;
    vec![
        TrafficPattern::new(
            "casual_browsing",
            40,
            vec![HealthCheck, Root, GetData, Search, ReadMessages],
            500,
            (2000, 5000),
        ),
        TrafficPattern::new(
            "api_burst",
            20,
            vec![GetData, GetData, Echo, Search, GetData, Echo, Search],
            50,
            (500, 1500),
        ),
        TrafficPattern::new(
            "chat_session",
            20,
            vec![
                Register,
                Login,
                SendMessage,
                SendMessage,
                ReadMessages,
                GetUser,
                SendMessage,
                Logout,
            ],
            300,
            (1000, 3000),
        ),
        TrafficPattern::new(
            "bulk_download",
            10,
            vec![GetLargeData, UploadMetadata, GetLargeData, UploadMetadata],
            1000,
            (3000, 8000),
        ),
        TrafficPattern::new(
            "polling",
            10,
            vec![HealthCheck, HealthCheck, HealthCheck, HealthCheck, HealthCheck],
            2000,
            (1000, 2000),
        ),
    ]
}

#[derive(Debug, Deserialize)]
struct PatternFile {
    patterns: Vec<TrafficPattern>,
}

/// Reads a `[[patterns]]` table from a TOML file.
pub fn load_patterns(path: &Path) -> Result<Vec<TrafficPattern>, ConfigError> {
    let content = fs::read_to_string(path)?;
    let file: PatternFile = toml::from_str(&content)?;
    for pattern in &file.patterns {
        pattern.validate()?;
    }
    info!(
        "Loaded {} traffic pattern(s) from {}",
        file.patterns.len(),
        path.display()
    );
    Ok(file.patterns)
}

/// Weighted random choice over a pattern table.
#[derive(Debug, Clone)]
pub struct PatternSelector {
    patterns: Vec<TrafficPattern>,
    index: WeightedIndex<u32>,
}

impl PatternSelector {
    /// Fails when the table is empty or no pattern has a positive weight.
    pub fn new(patterns: Vec<TrafficPattern>) -> Result<Self, ConfigError> {
        for pattern in &patterns {
            pattern.validate()?;
        }
        let index = WeightedIndex::new(patterns.iter().map(|p| p.weight))
            .map_err(|_| ConfigError::PatternsEmpty)?;
        Ok(Self { patterns, index })
    }

    pub fn select<R: Rng + ?Sized>(&self, rng: &mut R) -> &TrafficPattern {
        &self.patterns[self.index.sample(rng)]
    }

    pub fn patterns(&self) -> &[TrafficPattern] {
        &self.patterns
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rand::rngs::StdRng;
    use rand::SeedableRng;
    use std::collections::HashMap;
    use std::io::Write;
    use tempfile::NamedTempFile;

    #[test]
    fn test_default_patterns_are_valid() {
        let selector = PatternSelector::new(default_patterns()).unwrap();
        assert_eq!(selector.patterns().len(), 5);
    }

    #[test]
    fn test_zero_weight_is_never_selected() {
        let patterns = vec![
            TrafficPattern::new("never", 0, vec![Action::Root], 0, (0, 0)),
            TrafficPattern::new("always", 3, vec![Action::GetData], 0, (0, 0)),
        ];
        let selector = PatternSelector::new(patterns).unwrap();
        let mut rng = StdRng::seed_from_u64(7);
        for _ in 0..500 {
            assert_eq!(selector.select(&mut rng).name, "always");
        }
    }

    #[test]
    fn test_selection_follows_weights() {
        let patterns = vec![
            TrafficPattern::new("heavy", 9, vec![Action::Root], 0, (0, 0)),
            TrafficPattern::new("light", 1, vec![Action::Root], 0, (0, 0)),
        ];
        let selector = PatternSelector::new(patterns).unwrap();
        let mut rng = StdRng::seed_from_u64(42);
        let mut counts: HashMap<String, usize> = HashMap::new();
        for _ in 0..10_000 {
            *counts.entry(selector.select(&mut rng).name.clone()).or_default() += 1;
        }
        let heavy = counts["heavy"];
        assert!(heavy > 8_500 && heavy < 9_500, "heavy picked {} times", heavy);
    }

    #[test]
    fn test_empty_or_zero_tables_rejected() {
        assert!(matches!(
            PatternSelector::new(vec![]),
            Err(ConfigError::PatternsEmpty)
        ));
        let zero = vec![TrafficPattern::new("z", 0, vec![Action::Root], 0, (0, 0))];
        assert!(matches!(
            PatternSelector::new(zero),
            Err(ConfigError::PatternsEmpty)
        ));
    }

    #[test]
    fn test_inverted_sleep_range_rejected() {
        let bad = TrafficPattern::new("bad", 1, vec![Action::Root], 0, (500, 100));
        assert!(matches!(bad.validate(), Err(ConfigError::NotInRange(_))));
    }

    #[test]
    fn test_random_sleep_within_range() {
        let pattern = TrafficPattern::new("p", 1, vec![Action::Root], 0, (100, 200));
        let mut rng = StdRng::seed_from_u64(1);
        for _ in 0..100 {
            let d = pattern.random_sleep(&mut rng);
            assert!(d >= Duration::from_millis(100) && d <= Duration::from_millis(200));
        }
    }

    #[test]
    fn test_load_patterns_from_toml() {
        let mut file = NamedTempFile::new().unwrap();
        write!(
            file,
            r#"
[[patterns]]
name = "poll"
weight = 5
actions = ["health_check", "get_data"]
action_delay_ms = 10
min_sleep_ms = 0
max_sleep_ms = 5
"#
        )
        .unwrap();

        let patterns = load_patterns(file.path()).unwrap();
        assert_eq!(patterns.len(), 1);
        assert_eq!(patterns[0].actions, vec![Action::HealthCheck, Action::GetData]);
        assert_eq!(patterns[0].action_delay(), Duration::from_millis(10));
    }
}
