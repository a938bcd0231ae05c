//! Proactive topic rotation loaded from `config/topics.yaml`.

use std::collections::HashSet;
use std::path::Path;

use serde::{Deserialize, Serialize};

use crate::ConfigError;

/// Shape of a proactive post; drives the composer tone.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ContentKind {
    Explainer,
    #[serde(rename = "how-to")]
    HowTo,
    Commentary,
    Manifesto,
    Til,
    Offmychest,
    Nightshift,
    Showandtell,
    Tip,
    Tips,
    Promo,
    Announcement,
    Technical,
    Debugging,
    Comparison,
    Checklist,
    Research,
    Recruiting,
    BuildLog,
    AgentPitch,
    StarTrade,
    JobPost,
    #[serde(other)]
    General,
}

impl ContentKind {
    #[must_use]
    pub fn tone(self) -> &'static str {
        match self {
            ContentKind::Manifesto => "direct-urgent",
            ContentKind::Til | ContentKind::Offmychest | ContentKind::Nightshift => "witty-casual",
            ContentKind::Showandtell => "celebratory",
            _ => "professional-warm",
        }
    }

    /// The name used in `topics.yaml`.
    #[must_use]
    pub fn label(self) -> &'static str {
        match self {
            ContentKind::Explainer => "explainer",
            ContentKind::HowTo => "how-to",
            ContentKind::Commentary => "commentary",
            ContentKind::Manifesto => "manifesto",
            ContentKind::Til => "til",
            ContentKind::Offmychest => "offmychest",
            ContentKind::Nightshift => "nightshift",
            ContentKind::Showandtell => "showandtell",
            ContentKind::Tip => "tip",
            ContentKind::Tips => "tips",
            ContentKind::Promo => "promo",
            ContentKind::Announcement => "announcement",
            ContentKind::Technical => "technical",
            ContentKind::Debugging => "debugging",
            ContentKind::Comparison => "comparison",
            ContentKind::Checklist => "checklist",
            ContentKind::Research => "research",
            ContentKind::Recruiting => "recruiting",
            ContentKind::BuildLog => "build_log",
            ContentKind::AgentPitch => "agent_pitch",
            ContentKind::StarTrade => "star_trade",
            ContentKind::JobPost => "job_post",
            ContentKind::General => "general",
        }
    }
}

/// How a strategy's proactive drafts are requested from the composer.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Drafting {
    /// Short conversational post; tone follows the content kind.
    #[default]
    Social,
    /// Long-form financial content shaped by the content kind.
    Financial,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Topic {
    pub title: String,
    #[serde(default = "default_kind")]
    pub kind: ContentKind,
}

fn default_kind() -> ContentKind {
    ContentKind::General
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Strategy {
    pub name: String,
    #[serde(default)]
    pub drafting: Drafting,
    pub communities: Vec<String>,
    pub topics: Vec<Topic>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct TopicsFile {
    pub strategies: Vec<Strategy>,
}

/// One concrete proactive target: who to post to, and about what.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TopicSlot {
    pub strategy: String,
    pub drafting: Drafting,
    pub community: String,
    pub title: String,
    pub kind: ContentKind,
}

/// Every community/topic pairing of every strategy, interleaved.
///
/// A strategy with `c` communities and `t` topics contributes `c * t` slots.
/// Its k-th slot targets community `k % c` with topic `(k / c + k % c) % t`,
/// so consecutive slots move to the next community and shift the topic, and
/// each pairing occurs exactly once. Strategies take turns so consecutive
/// slots never share a strategy while more than one remains.
#[derive(Debug, Clone, Default)]
pub struct TopicRotation {
    slots: Vec<TopicSlot>,
}

impl TopicRotation {
    #[must_use]
    pub fn from_strategies(strategies: &[Strategy]) -> Self {
        let pools: Vec<(&Strategy, Vec<&Topic>)> = strategies
            .iter()
            .map(|s| {
                let topics = s.topics.iter().filter(|t| !t.title.trim().is_empty()).collect();
                (s, topics)
            })
            .collect();
        let longest = pools
            .iter()
            .map(|(s, topics)| s.communities.len() * topics.len())
            .max()
            .unwrap_or(0);

        let mut slots = Vec::new();
        for k in 0..longest {
            for (strategy, topics) in &pools {
                let communities = strategy.communities.len();
                if k >= communities * topics.len() {
                    continue;
                }
                let topic = topics[(k / communities + k % communities) % topics.len()];
                slots.push(TopicSlot {
                    strategy: strategy.name.clone(),
                    drafting: strategy.drafting,
                    community: strategy.communities[k % communities].clone(),
                    title: topic.title.clone(),
                    kind: topic.kind,
                });
            }
        }

        Self { slots }
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.slots.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.slots.is_empty()
    }

    pub fn slots(&self) -> impl Iterator<Item = &TopicSlot> {
        self.slots.iter()
    }

    /// Slot for the `offset`-th proactive attempt of a run in hour `hour`,
    /// counted from the Unix epoch.
    ///
    /// A pure function of its inputs: runs within the same hour pick the
    /// same slots in the same order, and successive hours walk the whole
    /// rotation.
    #[must_use]
    pub fn pick(&self, hour: u64, offset: usize) -> Option<&TopicSlot> {
        if self.slots.is_empty() {
            return None;
        }
        let len = self.slots.len() as u64;
        let index = (hour % len + offset as u64 % len) % len;
        usize::try_from(index).ok().and_then(|i| self.slots.get(i))
    }
}

/// Load and validate the topic rotation from a YAML file.
///
/// # Errors
///
/// Returns `ConfigError` if the file cannot be read, parsed, or fails validation.
pub fn load_topics(path: &Path) -> Result<TopicRotation, ConfigError> {
    let content = std::fs::read_to_string(path).map_err(|e| ConfigError::TopicsFileIo {
        path: path.display().to_string(),
        source: e,
    })?;

    let topics_file: TopicsFile =
        serde_yaml::from_str(&content).map_err(ConfigError::TopicsFileParse)?;

    validate_topics(&topics_file)?;

    Ok(TopicRotation::from_strategies(&topics_file.strategies))
}

fn validate_topics(topics_file: &TopicsFile) -> Result<(), ConfigError> {
    let mut seen = HashSet::new();

    for strategy in &topics_file.strategies {
        if strategy.name.trim().is_empty() {
            return Err(ConfigError::Validation(
                "strategy name must be non-empty".to_string(),
            ));
        }
        if !seen.insert(strategy.name.to_uppercase()) {
            return Err(ConfigError::Validation(format!(
                "duplicate strategy: '{}'",
                strategy.name
            )));
        }
        if strategy.communities.is_empty() {
            return Err(ConfigError::Validation(format!(
                "strategy '{}' lists no communities",
                strategy.name
            )));
        }
        if strategy.topics.iter().all(|t| t.title.trim().is_empty()) {
            return Err(ConfigError::Validation(format!(
                "strategy '{}' has no usable topics",
                strategy.name
            )));
        }
    }

    Ok(())
}
