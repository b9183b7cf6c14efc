//! Configuration for the attune progression engine.
//!
//! Maps directly to `attune.toml`; every field has a default so an empty
//! file (or no file at all) yields a working setup.

use serde::{Deserialize, Serialize};

use crate::types::{LearningMode, PowerStep, Tier};

/// Top-level attune configuration, loadable from TOML.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct AttuneConfig {
    /// General settings.
    #[serde(default)]
    pub general: GeneralConfig,
    /// XP accumulation and source tuning.
    #[serde(default)]
    pub xp: XpConfig,
    /// Early-learning (pre-mastery use) settings.
    #[serde(default)]
    pub early: EarlyLearningConfig,
    /// Stepped power curve. Empty means "use the built-in six steps".
    #[serde(default)]
    pub steps: Vec<PowerStep>,
    /// Persistence / save settings.
    #[serde(default)]
    pub persistence: PersistenceConfig,
}

impl AttuneConfig {
    /// Load configuration from a TOML string.
    ///
    /// # Errors
    /// Returns `AttuneError::Config` if the TOML is invalid.
    pub fn from_toml(toml_str: &str) -> crate::error::Result<Self> {
        toml::from_str(toml_str).map_err(|e| crate::AttuneError::Config(e.to_string()))
    }

    /// Load configuration from a TOML file.
    ///
    /// # Errors
    /// Returns an error if the file cannot be read or parsed.
    pub fn from_file(path: &std::path::Path) -> crate::error::Result<Self> {
        let content = std::fs::read_to_string(path)?;
        Self::from_toml(&content)
    }

    /// The configured power steps, or the built-in curve when none were
    /// supplied.
    #[must_use]
    pub fn power_steps(&self) -> Vec<PowerStep> {
        if self.steps.is_empty() {
            default_power_steps()
        } else {
            self.steps.clone()
        }
    }
}

// ---------------------------------------------------------------------------
// Sub-configs
// ---------------------------------------------------------------------------

/// General system settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct GeneralConfig {
    /// Whether the engine is enabled at all.
    #[serde(default = "default_true")]
    pub enabled: bool,
    /// Log level: trace, debug, info, warn, error.
    #[serde(default = "default_log_level")]
    pub log_level: String,
}

impl Default for GeneralConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            log_level: "info".to_string(),
        }
    }
}

/// XP accumulation tuning.
///
/// Multipliers scale incoming XP before it lands in a source accumulator;
/// caps bound how much of an item's `required_xp` each capped source may
/// contribute (percent, 0–100). Self use is deliberately uncapped — it is
/// the only road to full mastery.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct XpConfig {
    /// Single global target, or one target per category.
    #[serde(default = "default_learning_mode")]
    pub learning_mode: LearningMode,
    /// Applied on top of every source multiplier.
    #[serde(default = "default_1_0")]
    pub global_multiplier: f32,
    /// Multiplier for XP from unrelated actions.
    #[serde(default = "default_0_5")]
    pub multiplier_any: f32,
    /// Multiplier for same-category XP.
    #[serde(default = "default_1_0")]
    pub multiplier_school: f32,
    /// Multiplier for direct-prerequisite XP. Self use shares this value.
    #[serde(default = "default_1_5")]
    pub multiplier_direct: f32,
    /// Contribution cap for the `any` source, percent of required XP.
    #[serde(default = "default_25_0")]
    pub cap_any: f32,
    /// Contribution cap for the `school` source, percent of required XP.
    #[serde(default = "default_50_0")]
    pub cap_school: f32,
    /// Contribution cap for the `direct` source, percent of required XP.
    #[serde(default = "default_75_0")]
    pub cap_direct: f32,
    /// Multiplier assigned to custom sources registered without one.
    #[serde(default = "default_1_0")]
    pub custom_default_multiplier: f32,
    /// Cap assigned to custom sources registered without one, percent.
    #[serde(default = "default_25_0")]
    pub custom_default_cap: f32,
    /// Required-XP seed per item tier.
    #[serde(default)]
    pub tier_xp: TierXpConfig,
}

impl Default for XpConfig {
    fn default() -> Self {
        Self {
            learning_mode: LearningMode::PerCategory,
            global_multiplier: 1.0,
            multiplier_any: 0.5,
            multiplier_school: 1.0,
            multiplier_direct: 1.5,
            cap_any: 25.0,
            cap_school: 50.0,
            cap_direct: 75.0,
            custom_default_multiplier: 1.0,
            custom_default_cap: 25.0,
            tier_xp: TierXpConfig::default(),
        }
    }
}

/// Default required XP per tier, used when no explicit value has been set
/// for an item.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TierXpConfig {
    /// Novice tier.
    #[serde(default = "default_100_0")]
    pub novice: f32,
    /// Apprentice tier.
    #[serde(default = "default_200_0")]
    pub apprentice: f32,
    /// Adept tier.
    #[serde(default = "default_350_0")]
    pub adept: f32,
    /// Expert tier.
    #[serde(default = "default_550_0")]
    pub expert: f32,
    /// Master tier.
    #[serde(default = "default_800_0")]
    pub master: f32,
}

impl TierXpConfig {
    /// Required XP for the given tier.
    #[must_use]
    pub fn for_tier(&self, tier: Tier) -> f32 {
        match tier {
            Tier::Novice => self.novice,
            Tier::Apprentice => self.apprentice,
            Tier::Adept => self.adept,
            Tier::Expert => self.expert,
            Tier::Master => self.master,
        }
    }
}

impl Default for TierXpConfig {
    fn default() -> Self {
        Self {
            novice: 100.0,
            apprentice: 200.0,
            adept: 350.0,
            expert: 550.0,
            master: 800.0,
        }
    }
}

/// Early-learning: targets become usable at reduced power before mastery.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EarlyLearningConfig {
    /// Master switch for the effectiveness overlay.
    #[serde(default = "default_true")]
    pub enabled: bool,
    /// Progress percent at which the target is granted in weakened form.
    #[serde(default = "default_25_0")]
    pub unlock_threshold: f32,
    /// From this percent on, only self use advances progress.
    #[serde(default = "default_75_0")]
    pub self_use_required_at: f32,
    /// Bonus multiplier on self-use XP once the item is early-granted.
    #[serde(default = "default_1_5")]
    pub self_use_xp_multiplier: f32,
    /// Binary (all-or-nothing) effects do nothing below this percent.
    #[serde(default = "default_80_0")]
    pub binary_effect_threshold: f32,
    /// Annotate item display names with the current power step.
    #[serde(default = "default_true")]
    pub modify_display: bool,
}

impl Default for EarlyLearningConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            unlock_threshold: 25.0,
            self_use_required_at: 75.0,
            self_use_xp_multiplier: 1.5,
            binary_effect_threshold: 80.0,
            modify_display: true,
        }
    }
}

/// Persistence / save configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PersistenceConfig {
    /// Use WAL mode for concurrent reads.
    #[serde(default = "default_true")]
    pub wal_mode: bool,
    /// Detect save corruption via checksums.
    #[serde(default = "default_true")]
    pub checksum_enabled: bool,
}

impl Default for PersistenceConfig {
    fn default() -> Self {
        Self {
            wal_mode: true,
            checksum_enabled: true,
        }
    }
}

/// The built-in six-step power curve.
#[must_use]
pub fn default_power_steps() -> Vec<PowerStep> {
    vec![
        PowerStep::new(25.0, 0.20, "Budding"),
        PowerStep::new(40.0, 0.35, "Developing"),
        PowerStep::new(55.0, 0.50, "Practicing"),
        PowerStep::new(70.0, 0.65, "Advancing"),
        PowerStep::new(85.0, 0.80, "Refining"),
        PowerStep::new(100.0, 1.00, "Mastered"),
    ]
}

// ---------------------------------------------------------------------------
// Serde default helpers
// ---------------------------------------------------------------------------

fn default_true() -> bool { true }
fn default_log_level() -> String { "info".to_string() }
fn default_learning_mode() -> LearningMode { LearningMode::PerCategory }
fn default_0_5() -> f32 { 0.5 }
fn default_1_0() -> f32 { 1.0 }
fn default_1_5() -> f32 { 1.5 }
fn default_25_0() -> f32 { 25.0 }
fn default_50_0() -> f32 { 50.0 }
fn default_75_0() -> f32 { 75.0 }
fn default_80_0() -> f32 { 80.0 }
fn default_100_0() -> f32 { 100.0 }
fn default_200_0() -> f32 { 200.0 }
fn default_350_0() -> f32 { 350.0 }
fn default_550_0() -> f32 { 550.0 }
fn default_800_0() -> f32 { 800.0 }

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn empty_toml_gives_working_defaults() {
        let config = AttuneConfig::from_toml("").unwrap();
        assert!(config.general.enabled);
        assert_eq!(config.early.unlock_threshold, 25.0);
        assert_eq!(config.power_steps().len(), 6);
    }

    #[test]
    fn partial_toml_overrides_only_named_fields() {
        let config = AttuneConfig::from_toml(
            r#"
            [xp]
            learning_mode = "single"
            cap_any = 10.0

            [early]
            binary_effect_threshold = 90.0
            "#,
        )
        .unwrap();
        assert_eq!(config.xp.learning_mode, LearningMode::Single);
        assert_eq!(config.xp.cap_any, 10.0);
        assert_eq!(config.xp.cap_school, 50.0);
        assert_eq!(config.early.binary_effect_threshold, 90.0);
    }

    #[test]
    fn explicit_steps_replace_builtin_curve() {
        let config = AttuneConfig::from_toml(
            r#"
            [[steps]]
            threshold = 50.0
            effectiveness = 0.5
            label = "Half"

            [[steps]]
            threshold = 100.0
            effectiveness = 1.0
            label = "Full"
            "#,
        )
        .unwrap();
        let steps = config.power_steps();
        assert_eq!(steps.len(), 2);
        assert_eq!(steps[0].label, "Half");
    }

    #[test]
    fn tier_xp_lookup_covers_every_tier() {
        let tiers = TierXpConfig::default();
        assert_eq!(tiers.for_tier(Tier::Novice), 100.0);
        assert_eq!(tiers.for_tier(Tier::Master), 800.0);
    }
}
