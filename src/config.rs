use crate::error::Result;
use crate::mapping::IndustryClass;
use crate::schema::StatementType;
use schemars::JsonSchema;
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, JsonSchema)]
pub struct Tolerance {
    #[schemars(description = "Smallest allowed difference, in reporting units")]
    pub absolute: f64,

    #[schemars(description = "Allowed difference as a fraction of the larger magnitude compared")]
    pub relative: f64,
}

impl Default for Tolerance {
    fn default() -> Self {
        Self {
            absolute: 0.01,
            relative: 1e-4,
        }
    }
}

impl Tolerance {
    pub fn allowed(&self, a: f64, b: f64) -> f64 {
        self.absolute.max(self.relative * a.abs().max(b.abs()))
    }

    pub fn within(&self, a: f64, b: f64) -> bool {
        (a - b).abs() <= self.allowed(a, b)
    }
}

/// A caller supplied classification rule, evaluated before the built-in tables.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, JsonSchema)]
pub struct CustomRule {
    pub statement: StatementType,

    #[schemars(description = "Label expression, e.g. [contains 'deferred' and contains 'revenue']")]
    pub pattern: String,

    #[schemars(description = "Standardized field the matching line maps onto")]
    pub field: String,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, JsonSchema)]
#[serde(default)]
pub struct ReconstructionConfig {
    pub tolerance: Tolerance,

    #[schemars(description = "Average month length used to approximate a period start date")]
    pub days_per_month: f64,

    #[schemars(
        description = "Selections further than this many days from the expected start date are reported as suspect"
    )]
    pub suspect_window_days: i64,

    #[schemars(description = "Prefer fiscal year end metadata over pure date arithmetic")]
    pub prefer_fiscal_metadata: bool,

    #[schemars(description = "Derive parent links from indentation when no calculation data exists")]
    pub indentation_fallback: bool,

    #[schemars(description = "Bind values for calculation children that are not presented")]
    pub include_unpresented_calc_children: bool,

    #[schemars(description = "Force a rule table instead of selecting one by industry code")]
    pub industry_override: Option<IndustryClass>,

    pub custom_rules: Vec<CustomRule>,
}

impl Default for ReconstructionConfig {
    fn default() -> Self {
        Self {
            tolerance: Tolerance::default(),
            days_per_month: 30.5,
            suspect_window_days: 15,
            prefer_fiscal_metadata: true,
            indentation_fallback: true,
            include_unpresented_calc_children: true,
            industry_override: None,
            custom_rules: Vec::new(),
        }
    }
}

impl ReconstructionConfig {
    pub fn from_json(json: &str) -> Result<Self> {
        Ok(serde_json::from_str(json)?)
    }

    pub fn to_json(&self) -> Result<String> {
        Ok(serde_json::to_string_pretty(self)?)
    }

    pub fn schema_json() -> Result<String> {
        let schema = schemars::schema_for!(ReconstructionConfig);
        Ok(serde_json::to_string_pretty(&schema)?)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_tolerance_scales_with_magnitude() {
        let tolerance = Tolerance::default();
        assert!(tolerance.within(100.0, 100.005));
        assert!(!tolerance.within(100.0, 100.5));
        assert!(tolerance.within(352_583_000_000.0, 352_583_010_000.0));
        assert!(!tolerance.within(352_583_000_000.0, 352_683_000_000.0));
    }

    #[test]
    fn test_partial_json_uses_defaults() {
        let config = ReconstructionConfig::from_json(r#"{"suspect_window_days": 20}"#).unwrap();
        assert_eq!(config.suspect_window_days, 20);
        assert!((config.days_per_month - 30.5).abs() < 0.01);
        assert!(config.indentation_fallback);
        assert!(config.custom_rules.is_empty());
    }

    #[test]
    fn test_config_round_trips_through_json() {
        let mut config = ReconstructionConfig::default();
        config.industry_override = Some(IndustryClass::Depository);
        config.custom_rules.push(CustomRule {
            statement: StatementType::BalanceSheet,
            pattern: "[contains 'crypto']".to_string(),
            field: "digital_assets".to_string(),
        });

        let json = config.to_json().unwrap();
        let parsed = ReconstructionConfig::from_json(&json).unwrap();
        assert_eq!(parsed, config);
    }

    #[test]
    fn test_schema_is_generated() {
        let schema = ReconstructionConfig::schema_json().unwrap();
        assert!(schema.contains("days_per_month"));
    }
}
