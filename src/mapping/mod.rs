//! Color mapping for inbound key states
//!
//! Decides which color a key shows when it is signalled ON. Each button
//! set has its own ordered [`ColorTable`]; the first rule whose axes match
//! the key position wins, otherwise the table's mandatory default applies.
//!
//! Tables come from the `[[colors]]` sections of the config file and are
//! validated once at startup, so resolution itself cannot fail for a
//! known button set.

pub mod color_policy;
pub mod color_rules;

pub use color_policy::{ColorPolicy, ColorTable};
pub use color_rules::{AxisMatch, AxisSpec, ColorRule, ColorRuleConfig, ColorTableConfig, ColorTarget};
