//! Statistical ("meta") analysis requests and results.

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

/// One statistical analysis that can be requested for a property.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum StatisticalAnalysis {
    Type,
    Count,
    TopOccurrencesValue,
    TopOccurrencesOccurs,
}

impl std::str::FromStr for StatisticalAnalysis {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "type" => Ok(Self::Type),
            "count" => Ok(Self::Count),
            "topOccurrences.value" | "topOccurrencesValue" => Ok(Self::TopOccurrencesValue),
            "topOccurrences.occurs" | "topOccurrencesOccurs" => Ok(Self::TopOccurrencesOccurs),
            _ => Err(format!(
                "Invalid analysis: {s}. Choose: type, count, topOccurrences.value, topOccurrences.occurs"
            )),
        }
    }
}

/// The analyses requested for one property.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct MetaProperty {
    pub name: String,
    pub statistical_analyses: Vec<StatisticalAnalysis>,
}

impl MetaProperty {
    pub fn new(name: impl Into<String>, analyses: &[StatisticalAnalysis]) -> Self {
        Self {
            name: name.into(),
            statistical_analyses: analyses.to_vec(),
        }
    }

    pub fn wants(&self, analysis: StatisticalAnalysis) -> bool {
        self.statistical_analyses.contains(&analysis)
    }

    /// Occurs without value is meaningless, so either one asks for both.
    pub fn wants_top_occurrences(&self) -> bool {
        self.wants(StatisticalAnalysis::TopOccurrencesValue)
            || self.wants(StatisticalAnalysis::TopOccurrencesOccurs)
    }
}

/// One entry of a top-occurrences analysis.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Occurrence {
    pub value: String,
    pub occurs: i64,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PropertyMeta {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub r#type: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub count: Option<i64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub top_occurrences: Option<Vec<Occurrence>>,
}

/// Meta analysis results keyed by property name.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct MetaResult {
    pub properties: BTreeMap<String, PropertyMeta>,
}
