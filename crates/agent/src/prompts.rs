//! Per-language prompts and canned replies.

use serde::Serialize;
use tera::{Context, Tera};
use thiserror::Error;

use sekretarz_core::config::{GroundingMode, Language};

use crate::context::ScoredDocument;

#[derive(Debug, Error)]
#[error("could not render prompt template: {0}")]
pub struct PromptError(String);

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct LanguagePack {
    pub system_prompt: &'static str,
    pub greeting: &'static str,
    pub not_found: &'static str,
    pub no_data: &'static str,
    pub failure: &'static str,
    pub llm_unavailable: &'static str,
    pub report_saved: &'static str,
    pub report_disabled: &'static str,
    strict_template: &'static str,
    loose_template: &'static str,
}

const POLISH: LanguagePack = LanguagePack {
    system_prompt: "Jesteś ekspertem, asystentem Product Managera. Analizujesz dane i tworzysz konkretne, wykonalne zadania. Zawsze odpowiadaj TYLKO w języku polskim. Używaj formatowania Markdown. Na pytania o klientów, projekty i feedback odpowiadaj wyłącznie na podstawie wyników narzędzia analizator_danych i nie dopowiadaj danych, których narzędzie nie zwróciło.",
    greeting: "Cześć! Jestem gotów do analizy.",
    not_found: "Nie znalazłem tej informacji w bazie wiedzy.",
    no_data: "Brak danych w bazie wiedzy. Dodaj pierwszego klienta, aby rozpocząć analizę.",
    failure: "Nie udało mi się ukończyć tej prośby. Spróbuj sformułować pytanie inaczej.",
    llm_unavailable: "Model językowy jest chwilowo niedostępny. Spróbuj ponownie za chwilę.",
    report_saved: "Zapisano raport",
    report_disabled: "Zapisywanie raportów jest wyłączone w tej sesji.",
    strict_template: "Poniżej znajdują się fragmenty bazy wiedzy.\n\
---------------------\n\
{% for document in documents %}{{ document }}\n{% endfor %}\
---------------------\n\
Odpowiedz na pytanie, korzystając WYŁĄCZNIE z powyższych fragmentów. \
Jeśli odpowiedzi nie ma we fragmentach, odpowiedz dokładnie: {{ not_found }}\n\
Pytanie: {{ question }}\n\
Odpowiedź:",
    loose_template: "Poniżej znajdują się fragmenty bazy wiedzy.\n\
---------------------\n\
{% for document in documents %}{{ document }}\n{% endfor %}\
---------------------\n\
Odpowiedz na pytanie na podstawie fragmentów. Możesz uzupełnić odpowiedź wiedzą ogólną \
oraz wskazać ryzyka i szanse, ale zaznacz, co nie pochodzi z bazy wiedzy.\n\
Pytanie: {{ question }}\n\
Odpowiedź:",
};

const ENGLISH: LanguagePack = LanguagePack {
    system_prompt: "You are an expert Product Manager assistant. You analyze data and create specific, actionable tasks. Always respond ONLY in English. Use Markdown formatting. Answer questions about clients, projects and feedback only from the results of the analizator_danych tool and never add record data the tool did not return.",
    greeting: "Hi! I'm ready to analyse.",
    not_found: "I could not find this information in the knowledge base.",
    no_data: "The knowledge base is empty. Add a client record to start the analysis.",
    failure: "I could not complete this request. Please try rephrasing the question.",
    llm_unavailable: "The language model is temporarily unavailable. Please try again shortly.",
    report_saved: "Report saved",
    report_disabled: "Report writing is disabled in this session.",
    strict_template: "Context from the knowledge base is below.\n\
---------------------\n\
{% for document in documents %}{{ document }}\n{% endfor %}\
---------------------\n\
Answer the question using ONLY the context above. \
If the answer is not in the context, reply exactly: {{ not_found }}\n\
Question: {{ question }}\n\
Answer:",
    loose_template: "Context from the knowledge base is below.\n\
---------------------\n\
{% for document in documents %}{{ document }}\n{% endfor %}\
---------------------\n\
Answer the question based on the context. You may add general knowledge and point out \
risks and opportunities, but say which parts do not come from the knowledge base.\n\
Question: {{ question }}\n\
Answer:",
};

pub fn language_pack(language: Language) -> &'static LanguagePack {
    match language {
        Language::Polish => &POLISH,
        Language::English => &ENGLISH,
    }
}

#[derive(Serialize)]
struct ContextPromptData<'a> {
    question: &'a str,
    documents: Vec<&'a str>,
    not_found: &'a str,
}

/// Question-answering prompt over retrieved documents.
pub fn render_context_prompt(
    language: Language,
    grounding: GroundingMode,
    question: &str,
    documents: &[ScoredDocument],
) -> Result<String, PromptError> {
    let pack = language_pack(language);
    let template = match grounding {
        GroundingMode::Strict => pack.strict_template,
        GroundingMode::Loose => pack.loose_template,
    };

    let data = ContextPromptData {
        question,
        documents: documents.iter().map(|hit| hit.document.text.as_str()).collect(),
        not_found: pack.not_found,
    };
    let context = Context::from_serialize(&data).map_err(|error| PromptError(error.to_string()))?;

    Tera::one_off(template, &context, false).map_err(|error| PromptError(error.to_string()))
}
