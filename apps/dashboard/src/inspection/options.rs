//! Step gating — which pipeline steps the operator wants to see, and how far
//! the backend should run to produce them.

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};
use thiserror::Error;

/// One stage of the backend's curriculum pipeline, in execution order.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum InspectionStep {
    Classification,
    YearFiltering,
    LoExtraction,
}

impl InspectionStep {
    /// All steps in pipeline order.
    pub const ALL: [InspectionStep; 3] = [
        InspectionStep::Classification,
        InspectionStep::YearFiltering,
        InspectionStep::LoExtraction,
    ];

    /// Wire value used for `stop_after` and in backend call records.
    pub fn as_str(self) -> &'static str {
        match self {
            InspectionStep::Classification => "classification",
            InspectionStep::YearFiltering => "year_filtering",
            InspectionStep::LoExtraction => "lo_extraction",
        }
    }

    /// Exact match against the wire names. Anything else is not a step.
    pub fn from_wire(name: &str) -> Option<Self> {
        Self::ALL.into_iter().find(|step| step.as_str() == name)
    }

    pub fn label(self) -> &'static str {
        match self {
            InspectionStep::Classification => "Document Classification",
            InspectionStep::YearFiltering => "Year Filtering",
            InspectionStep::LoExtraction => "Extraction",
        }
    }

    pub fn description(self) -> &'static str {
        match self {
            InspectionStep::Classification => {
                "Show input text sent for classification and classification output with confidence score"
            }
            InspectionStep::YearFiltering => {
                "Show chunks before filtering and content after filtering for selected year"
            }
            InspectionStep::LoExtraction => "Show prompt sent to LLM and raw extraction output",
        }
    }
}

impl fmt::Display for InspectionStep {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Three independent toggles, one per pipeline step.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct InspectionOptions {
    pub show_classification: bool,
    pub show_year_filtering: bool,
    pub show_extraction: bool,
}

impl InspectionOptions {
    /// Every step enabled. This is what the inspector page starts with.
    pub fn all() -> Self {
        Self {
            show_classification: true,
            show_year_filtering: true,
            show_extraction: true,
        }
    }

    pub fn is_enabled(&self, step: InspectionStep) -> bool {
        match step {
            InspectionStep::Classification => self.show_classification,
            InspectionStep::YearFiltering => self.show_year_filtering,
            InspectionStep::LoExtraction => self.show_extraction,
        }
    }

    fn set(&mut self, step: InspectionStep, value: bool) {
        match step {
            InspectionStep::Classification => self.show_classification = value,
            InspectionStep::YearFiltering => self.show_year_filtering = value,
            InspectionStep::LoExtraction => self.show_extraction = value,
        }
    }

    pub fn is_empty(&self) -> bool {
        !(self.show_classification || self.show_year_filtering || self.show_extraction)
    }

    /// Steps whose toggle is on, always in pipeline order.
    /// Used only to filter what the backend returns; it does not change
    /// what the backend executes.
    pub fn enabled_steps(&self) -> Vec<InspectionStep> {
        InspectionStep::ALL
            .into_iter()
            .filter(|step| self.is_enabled(*step))
            .collect()
    }

    /// The last stage the backend should run. Later stages win; earlier
    /// stages are not required to be enabled, since the backend runs its own
    /// prerequisites. Classification is the floor: there is no "run nothing".
    pub fn stopped_after(&self) -> InspectionStep {
        if self.show_extraction {
            InspectionStep::LoExtraction
        } else if self.show_year_filtering {
            InspectionStep::YearFiltering
        } else {
            InspectionStep::Classification
        }
    }

    /// True when the enabled steps are the first N steps of the pipeline.
    /// The all-false state counts (N = 0).
    pub fn is_prefix(&self) -> bool {
        let enabled = self.enabled_steps();
        enabled == InspectionStep::ALL[..enabled.len()]
    }

    /// Submit-time guard against an all-false request.
    pub fn require_any(&self) -> Result<(), ToggleRejected> {
        if self.is_empty() {
            Err(ToggleRejected::NothingSelected)
        } else {
            Ok(())
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ToggleRejected {
    #[error("Please select at least one inspection option")]
    NothingSelected,

    #[error("Inspection options must enable steps in pipeline order")]
    NotAPrefix,
}

/// How a single checkbox flip is applied to the current options.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum OptionsPolicy {
    /// Flip only the requested step. Any combination is representable.
    #[default]
    Independent,
    /// Enabled steps always form a prefix of the pipeline, and at least one
    /// step stays enabled.
    #[serde(rename = "prefix")]
    MonotonicPrefix,
}

impl OptionsPolicy {
    pub fn as_str(self) -> &'static str {
        match self {
            OptionsPolicy::Independent => "independent",
            OptionsPolicy::MonotonicPrefix => "prefix",
        }
    }

    /// Applies one checkbox flip. Returns the new options, or a rejection when
    /// the policy forbids the resulting state.
    pub fn toggle(
        self,
        current: InspectionOptions,
        step: InspectionStep,
        checked: bool,
    ) -> Result<InspectionOptions, ToggleRejected> {
        let mut next = current;
        match self {
            OptionsPolicy::Independent => next.set(step, checked),
            OptionsPolicy::MonotonicPrefix => {
                if !current.is_prefix() {
                    return Err(ToggleRejected::NotAPrefix);
                }
                for other in InspectionStep::ALL {
                    if checked && other <= step {
                        next.set(other, true);
                    } else if !checked && other >= step {
                        next.set(other, false);
                    }
                }
                next.require_any()?;
            }
        }
        Ok(next)
    }
}

#[derive(Debug, Error)]
#[error("unknown options policy '{0}'")]
pub struct UnknownPolicy(String);

impl FromStr for OptionsPolicy {
    type Err = UnknownPolicy;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "independent" => Ok(OptionsPolicy::Independent),
            "prefix" | "monotonic_prefix" => Ok(OptionsPolicy::MonotonicPrefix),
            other => Err(UnknownPolicy(other.to_string())),
        }
    }
}
