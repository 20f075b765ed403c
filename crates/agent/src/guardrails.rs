use sekretarz_core::config::Language;

use crate::prompts::language_pack;

/// What a tool touches. Guardrails decide on capability, not on tool name.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum ToolCapability {
    Clock,
    Retrieval,
    FileWrite,
}

impl ToolCapability {
    pub fn action_key(&self) -> &'static str {
        match self {
            Self::Clock => "tool.clock",
            Self::Retrieval => "tool.retrieval",
            Self::FileWrite => "tool.file_write",
        }
    }
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct GuardrailIntent {
    pub capability: ToolCapability,
    pub knowledge_available: bool,
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub enum GuardrailDecision {
    Allow,
    Deny { reason_code: &'static str, user_message: String, fallback_path: &'static str },
    Degrade { reason_code: &'static str, user_message: String, fallback_path: &'static str },
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct GuardrailPolicy {
    pub report_writes_enabled: bool,
    pub language: Language,
}

impl Default for GuardrailPolicy {
    fn default() -> Self {
        Self { report_writes_enabled: true, language: Language::Polish }
    }
}

impl GuardrailPolicy {
    pub fn evaluate(&self, intent: &GuardrailIntent) -> GuardrailDecision {
        match intent.capability {
            ToolCapability::Clock => GuardrailDecision::Allow,
            ToolCapability::Retrieval if intent.knowledge_available => GuardrailDecision::Allow,
            ToolCapability::Retrieval => GuardrailDecision::Degrade {
                reason_code: "knowledge_base_empty",
                user_message: language_pack(self.language).no_data.to_string(),
                fallback_path: "add_record",
            },
            ToolCapability::FileWrite if self.report_writes_enabled => GuardrailDecision::Allow,
            ToolCapability::FileWrite => GuardrailDecision::Deny {
                reason_code: "report_writes_disabled",
                user_message: language_pack(self.language).report_disabled.to_string(),
                fallback_path: "answer_inline",
            },
        }
    }

    /// Whether a tool with this capability may be offered to the model at all.
    pub fn offers(&self, capability: ToolCapability) -> bool {
        !matches!(capability, ToolCapability::FileWrite if !self.report_writes_enabled)
    }
}
