use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// A system prompt record as stored by the backend.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SystemPrompt {
    pub id: u32,
    pub name: String,
    pub content: String,
    pub updated_at: DateTime<Utc>,
}

/// The prompts the backend knows about. Ids are fixed on the backend side.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SystemPromptId {
    TimetableExtraction,
    TimetableValidation,
    TimetableLookup,
    CurriculumExtraction,
    LlmVisualOcr,
    TimetableEventDetection,
}

impl SystemPromptId {
    pub const ALL: [SystemPromptId; 6] = [
        SystemPromptId::TimetableExtraction,
        SystemPromptId::TimetableValidation,
        SystemPromptId::TimetableLookup,
        SystemPromptId::CurriculumExtraction,
        SystemPromptId::LlmVisualOcr,
        SystemPromptId::TimetableEventDetection,
    ];

    pub fn id(self) -> u32 {
        match self {
            SystemPromptId::TimetableExtraction => 1001,
            SystemPromptId::TimetableValidation => 1002,
            SystemPromptId::TimetableLookup => 1003,
            SystemPromptId::CurriculumExtraction => 1004,
            SystemPromptId::LlmVisualOcr => 1005,
            SystemPromptId::TimetableEventDetection => 1006,
        }
    }

    pub fn from_id(id: u32) -> Option<Self> {
        Self::ALL.into_iter().find(|known| known.id() == id)
    }

    pub fn display_name(self) -> &'static str {
        match self {
            SystemPromptId::TimetableExtraction => "Timetable Extraction",
            SystemPromptId::TimetableValidation => "Timetable Validation",
            SystemPromptId::TimetableLookup => "Timetable Lookup",
            SystemPromptId::CurriculumExtraction => "Curriculum Extraction",
            SystemPromptId::LlmVisualOcr => "LLM Visual OCR",
            SystemPromptId::TimetableEventDetection => "Timetable Event Detection",
        }
    }
}
