//! Result assembly — turns the backend's raw per-step call records into what
//! the results panel displays.

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

use crate::inspection::options::{InspectionOptions, InspectionStep};

/// Key removed from every processed-data object before display.
const TERM_METADATA_KEY: &str = "term_metadata";

/// One call record as the backend reports it. `step` is free-form here.
#[derive(Debug, Clone, PartialEq)]
pub struct RawLlmCall {
    pub step: String,
    pub model: String,
    pub input: Option<String>,
    pub output: String,
}

impl RawLlmCall {
    /// Reads one record from the backend's `llm_calls` array. Returns `None`
    /// when the record is not an object or has no string `step`; other fields
    /// are coerced to text instead of failing.
    pub fn from_value(value: &Value) -> Option<Self> {
        let record = value.as_object()?;
        let step = record.get("step")?.as_str()?.to_string();
        Some(Self {
            step,
            model: record.get("model").and_then(text).unwrap_or_default(),
            input: record.get("input").and_then(text),
            output: record.get("output").and_then(text).unwrap_or_default(),
        })
    }
}

fn text(value: &Value) -> Option<String> {
    match value {
        Value::Null => None,
        Value::String(s) => Some(s.clone()),
        other => Some(other.to_string()),
    }
}

/// A call record whose step is one of the known pipeline stages.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LlmCall {
    pub step: InspectionStep,
    pub model: String,
    pub input: Option<String>,
    pub output: String,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct InspectionResponse {
    pub llm_calls: Vec<LlmCall>,
    pub processed_data: Option<Map<String, Value>>,
}

/// Builds an `InspectionResponse` from the backend payload.
/// Records with an unknown step name are dropped; the rest are kept only if
/// the caller enabled their step, in the order the backend sent them.
pub fn assemble(
    raw_calls: Vec<RawLlmCall>,
    processed_data: Option<Map<String, Value>>,
    options: &InspectionOptions,
) -> InspectionResponse {
    let calls = raw_calls
        .into_iter()
        .filter_map(|raw| {
            let step = InspectionStep::from_wire(&raw.step)?;
            Some(LlmCall {
                step,
                model: raw.model,
                input: raw.input,
                output: raw.output,
            })
        })
        .collect();

    InspectionResponse {
        llm_calls: filter_calls(calls, options),
        processed_data,
    }
}

/// Keeps calls whose step is enabled in `options`. Idempotent.
pub fn filter_calls(calls: Vec<LlmCall>, options: &InspectionOptions) -> Vec<LlmCall> {
    let enabled = options.enabled_steps();
    calls
        .into_iter()
        .filter(|call| enabled.contains(&call.step))
        .collect()
}

/// Drops `term_metadata` from each top-level object value. Arrays, scalars
/// and nulls pass through untouched.
pub fn clean_processed_data(data: &Map<String, Value>) -> Map<String, Value> {
    data.iter()
        .map(|(key, value)| {
            let cleaned = match value {
                Value::Object(fields) => {
                    let mut fields = fields.clone();
                    fields.remove(TERM_METADATA_KEY);
                    Value::Object(fields)
                }
                other => other.clone(),
            };
            (key.clone(), cleaned)
        })
        .collect()
}

/// Strips ```json ... ``` or ``` ... ``` fences. Either side may be missing.
fn strip_fences(text: &str) -> &str {
    let text = text.trim();
    let text = text
        .strip_prefix("```json")
        .or_else(|| text.strip_prefix("```"))
        .unwrap_or(text);
    text.strip_suffix("```").unwrap_or(text).trim()
}

fn parse_output(output: &str) -> Option<Value> {
    serde_json::from_str(strip_fences(output)).ok()
}

/// Pretty-prints the output when it is JSON (fenced or not). Otherwise the
/// original string comes back verbatim, fences included.
pub fn format_output(output: &str) -> String {
    parse_output(output)
        .and_then(|value| serde_json::to_string_pretty(&value).ok())
        .unwrap_or_else(|| output.to_string())
}

pub fn is_json_output(output: &str) -> bool {
    parse_output(output).is_some()
}

/// One call as the results panel shows it.
#[derive(Debug, Clone, Serialize)]
pub struct CallView {
    pub step: InspectionStep,
    pub label: &'static str,
    pub model: String,
    /// `None` means the step had no input (internal processing).
    pub input: Option<String>,
    pub formatted_output: String,
    pub is_json: bool,
}

impl From<&LlmCall> for CallView {
    fn from(call: &LlmCall) -> Self {
        Self {
            step: call.step,
            label: call.step.label(),
            model: call.model.clone(),
            input: call.input.clone(),
            formatted_output: format_output(&call.output),
            is_json: is_json_output(&call.output),
        }
    }
}

/// Display projection of an `InspectionResponse`.
#[derive(Debug, Clone, Serialize)]
pub struct InspectionView {
    pub calls: Vec<CallView>,
    /// Tab selected first: the first returned step, else classification.
    pub default_step: InspectionStep,
    /// Processed learning objectives are only shown next to an extraction call.
    pub show_processed: bool,
    pub lo_extraction_output: Option<String>,
    pub processed_data: Option<Map<String, Value>>,
}

impl From<&InspectionResponse> for InspectionView {
    fn from(response: &InspectionResponse) -> Self {
        let calls: Vec<CallView> = response.llm_calls.iter().map(CallView::from).collect();
        let default_step = calls
            .first()
            .map(|call| call.step)
            .unwrap_or(InspectionStep::Classification);
        let lo_extraction_output = calls
            .iter()
            .find(|call| call.step == InspectionStep::LoExtraction)
            .map(|call| call.formatted_output.clone());
        let processed_data = response.processed_data.as_ref().map(clean_processed_data);

        Self {
            show_processed: processed_data.is_some() && lo_extraction_output.is_some(),
            calls,
            default_step,
            lo_extraction_output,
            processed_data,
        }
    }
}
