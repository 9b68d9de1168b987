//! Color rule building blocks
//!
//! A rule matches a key position axis by axis. Each axis is a tagged
//! variant evaluated the same way for `x` and `y`:
//!
//! | Config value   | Variant              | Matches            |
//! |----------------|----------------------|--------------------|
//! | *(absent)*     | [`AxisMatch::Any`]   | every coordinate   |
//! | `2`            | [`AxisMatch::Exact`] | exactly 2          |
//! | `[1, 2]`       | [`AxisMatch::OneOf`] | 1 or 2             |

use serde::{Deserialize, Serialize};

use crate::keypad::Rgb;

/// Match condition for one coordinate axis.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum AxisMatch {
    Any,
    Exact(u8),
    OneOf(Vec<u8>),
}

impl AxisMatch {
    pub fn matches(&self, value: u8) -> bool {
        match self {
            Self::Any => true,
            Self::Exact(v) => *v == value,
            Self::OneOf(values) => values.contains(&value),
        }
    }
}

/// What a rule resolves to: the LED color plus a human readable label
/// used in logs.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct ColorTarget {
    pub color: Rgb,
    pub label: String,
}

impl ColorTarget {
    pub fn new(color: Rgb, label: impl Into<String>) -> Self {
        Self {
            color,
            label: label.into(),
        }
    }
}

/// One positional rule of a color table.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct ColorRule {
    pub x: AxisMatch,
    pub y: AxisMatch,
    pub target: ColorTarget,
}

impl ColorRule {
    pub fn new(x: AxisMatch, y: AxisMatch, target: ColorTarget) -> Self {
        Self { x, y, target }
    }

    pub fn matches(&self, x: u8, y: u8) -> bool {
        self.x.matches(x) && self.y.matches(y)
    }
}

// ── Config file representation ──────────────────────────────

/// Axis value as written in the config file.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum AxisSpec {
    Exact(u8),
    OneOf(Vec<u8>),
}

impl From<Option<AxisSpec>> for AxisMatch {
    fn from(spec: Option<AxisSpec>) -> Self {
        match spec {
            None => Self::Any,
            Some(AxisSpec::Exact(v)) => Self::Exact(v),
            Some(AxisSpec::OneOf(values)) => Self::OneOf(values),
        }
    }
}

impl From<&AxisMatch> for Option<AxisSpec> {
    fn from(axis: &AxisMatch) -> Self {
        match axis {
            AxisMatch::Any => None,
            AxisMatch::Exact(v) => Some(AxisSpec::Exact(*v)),
            AxisMatch::OneOf(values) => Some(AxisSpec::OneOf(values.clone())),
        }
    }
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct ColorRuleConfig {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub x: Option<AxisSpec>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub y: Option<AxisSpec>,
    pub color: Rgb,
    pub label: String,
}

impl From<ColorRuleConfig> for ColorRule {
    fn from(config: ColorRuleConfig) -> Self {
        Self {
            x: config.x.into(),
            y: config.y.into(),
            target: ColorTarget::new(config.color, config.label),
        }
    }
}

impl From<&ColorRule> for ColorRuleConfig {
    fn from(rule: &ColorRule) -> Self {
        Self {
            x: (&rule.x).into(),
            y: (&rule.y).into(),
            color: rule.target.color,
            label: rule.target.label.clone(),
        }
    }
}

/// One button set's table as written in the config file.
///
/// `default` is optional here only so a missing entry can be reported as
/// a configuration error instead of a parse error.
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ColorTableConfig {
    #[serde(default)]
    pub rules: Vec<ColorRuleConfig>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub default: Option<ColorTarget>,
}
