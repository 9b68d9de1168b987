use tracing::debug;

use super::color_rules::{AxisMatch, ColorRule, ColorTableConfig, ColorTarget};
use crate::config::ConfigError;
use crate::keypad::Rgb;

/// Ordered rule list for one button set plus its mandatory fallback.
#[derive(Clone, Debug, PartialEq)]
pub struct ColorTable {
    rules: Vec<ColorRule>,
    default: ColorTarget,
}

impl ColorTable {
    pub fn new(rules: Vec<ColorRule>, default: ColorTarget) -> Self {
        Self { rules, default }
    }

    /// Build a table from its config form. A table without `default` is
    /// a startup misconfiguration.
    pub fn from_config(config: &ColorTableConfig, button_set: usize) -> Result<Self, ConfigError> {
        let default = config
            .default
            .clone()
            .ok_or(ConfigError::MissingDefaultRule { button_set })?;
        let rules = config.rules.iter().cloned().map(ColorRule::from).collect();
        Ok(Self::new(rules, default))
    }

    pub fn to_config(&self) -> ColorTableConfig {
        ColorTableConfig {
            rules: self.rules.iter().map(Into::into).collect(),
            default: Some(self.default.clone()),
        }
    }

    /// First matching rule in table order, else the default.
    pub fn resolve(&self, x: u8, y: u8) -> &ColorTarget {
        self.rules
            .iter()
            .find(|rule| rule.matches(x, y))
            .map(|rule| &rule.target)
            .unwrap_or(&self.default)
    }
}

/// Maps (button set, x, y) to a color. Pure lookup, no hidden state.
#[derive(Clone, Debug, PartialEq)]
pub struct ColorPolicy {
    tables: Vec<ColorTable>,
}

impl ColorPolicy {
    pub fn new(tables: Vec<ColorTable>) -> Self {
        Self { tables }
    }

    pub fn from_config(tables: &[ColorTableConfig]) -> Result<Self, ConfigError> {
        let tables = tables
            .iter()
            .enumerate()
            .map(|(set, table)| ColorTable::from_config(table, set))
            .collect::<Result<Vec<_>, _>>()?;
        debug!("Loaded {} color tables", tables.len());
        Ok(Self::new(tables))
    }

    pub fn to_config(&self) -> Vec<ColorTableConfig> {
        self.tables.iter().map(ColorTable::to_config).collect()
    }

    pub fn resolve(&self, button_set: u8, x: u8, y: u8) -> Result<&ColorTarget, ConfigError> {
        self.tables
            .get(button_set as usize)
            .map(|table| table.resolve(x, y))
            .ok_or(ConfigError::UnknownButtonSet(button_set))
    }

    /// Stock tables: set 0 is the single-set keypad layout, set 1 the
    /// alternate set of the dual layout.
    pub fn reference() -> Self {
        use AxisMatch::{Any, Exact, OneOf};

        let orange = ColorTarget::new(Rgb(255, 75, 0), "Orange");

        let set_0 = ColorTable::new(
            vec![
                ColorRule::new(Exact(1), Exact(0), ColorTarget::new(Rgb(0, 0, 255), "Blue")),
                ColorRule::new(Any, Exact(3), orange.clone()),
                ColorRule::new(Exact(2), Exact(0), ColorTarget::new(Rgb(120, 0, 160), "Purple")),
                ColorRule::new(Any, OneOf(vec![1, 2]), ColorTarget::new(Rgb(0, 225, 0), "Green")),
            ],
            ColorTarget::new(Rgb(255, 0, 0), "Red"),
        );

        let set_1 = ColorTable::new(
            vec![
                ColorRule::new(Exact(0), Exact(0), ColorTarget::new(Rgb(255, 200, 0), "Yellow")),
                ColorRule::new(Any, Exact(3), orange),
                ColorRule::new(
                    OneOf(vec![0, 1]),
                    OneOf(vec![1, 2]),
                    ColorTarget::new(Rgb(0, 160, 120), "Teal"),
                ),
                ColorRule::new(Any, OneOf(vec![1, 2]), ColorTarget::new(Rgb(200, 0, 160), "Magenta")),
            ],
            ColorTarget::new(Rgb(120, 120, 120), "White"),
        );

        Self::new(vec![set_0, set_1])
    }
}
