use std::sync::{Arc, Mutex};

use async_trait::async_trait;
use serde_json::json;

use sekretarz_agent::conversation::AnswerKind;
use sekretarz_agent::llm::{ChatCompletion, ChatMessage, ChatRole, LlmClient, LlmError, ToolCall};
use sekretarz_agent::prompts::language_pack;
use sekretarz_agent::tools::{
    ToolDescriptor, CONTEXT_TOOL_NAME, DATE_TOOL_NAME, REPORT_TOOL_NAME,
};
use sekretarz_agent::AgentRuntime;
use sekretarz_core::config::{AppConfig, Language};
use sekretarz_core::domain::record::{ProjectStatus, Record};
use sekretarz_db::{InMemoryRecordRepository, RecordRepository};

/// Routes date questions to the date tool and everything else to the context tool,
/// then returns the tool result as the final answer.
#[derive(Default)]
struct RoutingLlm {
    always_call_date: bool,
    chats: Mutex<Vec<Vec<ChatMessage>>>,
    offered: Mutex<Vec<Vec<&'static str>>>,
}

impl RoutingLlm {
    fn looping() -> Self {
        Self { always_call_date: true, ..Self::default() }
    }
}

fn is_date_question(text: &str) -> bool {
    let lowered = text.to_lowercase();
    ["dzisiaj", "data", "today", "date"].iter().any(|word| lowered.contains(word))
}

#[async_trait]
impl LlmClient for RoutingLlm {
    async fn complete(&self, _system: &str, prompt: &str) -> Result<String, LlmError> {
        let context: Vec<&str> = prompt.lines().filter(|line| line.starts_with('{')).collect();
        Ok(format!("Znalezione dane: {}", context.join(" ")))
    }

    async fn chat(
        &self,
        messages: &[ChatMessage],
        tools: &[ToolDescriptor],
    ) -> Result<ChatCompletion, LlmError> {
        self.chats.lock().expect("lock").push(messages.to_vec());
        self.offered.lock().expect("lock").push(tools.iter().map(|tool| tool.name).collect());

        let last = messages.last().map(|message| message.content.as_str()).unwrap_or_default();
        if self.always_call_date {
            return Ok(ChatCompletion::calls(vec![call(DATE_TOOL_NAME, json!({}))]));
        }
        if last.starts_with("[Tool ") {
            let result = last.split_once("]: ").map(|(_, rest)| rest).unwrap_or(last);
            return Ok(ChatCompletion::text(result));
        }
        if is_date_question(last) {
            return Ok(ChatCompletion::calls(vec![call(DATE_TOOL_NAME, json!({}))]));
        }
        Ok(ChatCompletion::calls(vec![call(CONTEXT_TOOL_NAME, json!({ "query": last }))]))
    }
}

fn call(name: &str, arguments: serde_json::Value) -> ToolCall {
    ToolCall { id: format!("call_{name}"), name: name.to_string(), arguments }
}

fn acme() -> Record {
    Record::new("Acme", "PL", "Widget", ProjectStatus::InProgress, "Dostawa opóźniona")
}

fn borealis() -> Record {
    Record::new("Borealis", "NO", "Gadget", ProjectStatus::Planned, "Pytają o cennik")
}

async fn open(
    config: &AppConfig,
    records: Vec<Record>,
    llm: Arc<RoutingLlm>,
) -> (AgentRuntime, Arc<InMemoryRecordRepository>) {
    let repository = Arc::new(InMemoryRecordRepository::with_records(records));
    let runtime = AgentRuntime::open(config, repository.clone(), llm).await.expect("open session");
    (runtime, repository)
}

#[tokio::test]
async fn acme_status_question_uses_the_context_tool_once() {
    let llm = Arc::new(RoutingLlm::default());
    let (mut runtime, _) = open(&AppConfig::default(), vec![acme(), borealis()], llm).await;

    let answer = runtime.handle_message("Jaki jest status projektu Acme?").await;

    assert_eq!(answer.kind, AnswerKind::Final);
    assert!(answer.text.contains("W Trakcie"), "answer was {}", answer.text);
    assert_eq!(answer.calls_to(CONTEXT_TOOL_NAME), 1);
    assert_eq!(answer.calls_to(DATE_TOOL_NAME), 0);
    assert_eq!(runtime.history().len(), 2);
}

#[tokio::test]
async fn date_question_routes_to_the_date_tool() {
    let llm = Arc::new(RoutingLlm::default());
    let (mut runtime, _) = open(&AppConfig::default(), vec![acme()], llm).await;

    let answer = runtime.handle_message("Jaka jest dzisiaj data?").await;

    assert_eq!(answer.calls_to(DATE_TOOL_NAME), 1);
    assert_eq!(answer.calls_to(CONTEXT_TOOL_NAME), 0);
    assert!(chrono::NaiveDate::parse_from_str(&answer.text, "%Y-%m-%d").is_ok());
}

#[tokio::test]
async fn empty_knowledge_base_degrades_but_date_still_works() {
    let llm = Arc::new(RoutingLlm::default());
    let (mut runtime, _) = open(&AppConfig::default(), Vec::new(), llm).await;

    let answer = runtime.handle_message("Jaki jest status projektu Acme?").await;

    assert_eq!(answer.kind, AnswerKind::Degraded);
    assert_eq!(answer.text, language_pack(Language::Polish).no_data);
    assert_eq!(runtime.index_rebuilds(), 0);

    let date = runtime.handle_message("Jaka jest dzisiaj data?").await;
    assert_eq!(date.kind, AnswerKind::Final);
    assert_eq!(date.calls_to(DATE_TOOL_NAME), 1);
}

#[tokio::test]
async fn appended_record_is_visible_on_the_next_turn() {
    let llm = Arc::new(RoutingLlm::default());
    let (mut runtime, repository) = open(&AppConfig::default(), Vec::new(), llm).await;

    runtime.add_record(acme()).await.expect("append");
    let answer = runtime.handle_message("Jaki jest status projektu Acme?").await;

    assert!(answer.text.contains("W Trakcie"), "answer was {}", answer.text);
    assert_eq!(runtime.index_rebuilds(), 1);
    assert_eq!(repository.load_all().await.expect("load"), vec![acme()]);

    runtime.handle_message("A projekt Acme?").await;
    assert_eq!(runtime.index_rebuilds(), 1, "unchanged records must reuse the index");

    runtime.add_record(borealis()).await.expect("append");
    let answer = runtime.handle_message("Co z Borealis?").await;
    assert!(answer.text.contains("Borealis"), "answer was {}", answer.text);
    assert_eq!(runtime.index_rebuilds(), 2);
}

#[tokio::test]
async fn iteration_limit_fails_the_turn_without_touching_history() {
    let mut config = AppConfig::default();
    config.agent.max_tool_iterations = 2;
    let llm = Arc::new(RoutingLlm::looping());
    let (mut runtime, _) = open(&config, vec![acme()], llm.clone()).await;

    let answer = runtime.handle_message("Jaki jest status projektu Acme?").await;

    assert_eq!(answer.kind, AnswerKind::Failed);
    assert_eq!(answer.text, language_pack(Language::Polish).failure);
    assert_eq!(answer.calls_to(DATE_TOOL_NAME), 1);
    assert!(runtime.history().is_empty());
    assert_eq!(llm.chats.lock().expect("lock").len(), 2);
}

#[tokio::test]
async fn earlier_turns_are_sent_as_memory() {
    let llm = Arc::new(RoutingLlm::default());
    let (mut runtime, _) = open(&AppConfig::default(), vec![acme()], llm.clone()).await;

    runtime.handle_message("Jaki jest status projektu Acme?").await;
    runtime.handle_message("Jaka jest dzisiaj data?").await;

    let chats = llm.chats.lock().expect("lock");
    let second_turn_first_call = &chats[2];
    assert_eq!(second_turn_first_call[0].role, ChatRole::System);
    assert_eq!(second_turn_first_call[1].content, "Jaki jest status projektu Acme?");
    assert_eq!(second_turn_first_call[2].role, ChatRole::Assistant);
    assert_eq!(
        second_turn_first_call.last().map(|message| message.content.as_str()),
        Some("Jaka jest dzisiaj data?")
    );
}

#[tokio::test]
async fn disabled_report_tool_is_not_offered() {
    let mut config = AppConfig::default();
    config.agent.report_tool_enabled = false;
    let llm = Arc::new(RoutingLlm::default());
    let (mut runtime, _) = open(&config, vec![acme()], llm.clone()).await;

    runtime.handle_message("Jaka jest dzisiaj data?").await;

    let offered = llm.offered.lock().expect("lock");
    assert_eq!(offered[0], vec![DATE_TOOL_NAME, CONTEXT_TOOL_NAME]);
    assert!(!offered[0].contains(&REPORT_TOOL_NAME));
    assert_eq!(runtime.registry().len(), 3);
}

#[tokio::test]
async fn english_session_greets_and_answers_in_english() {
    let mut config = AppConfig::default();
    config.agent.language = Language::English;
    let llm = Arc::new(RoutingLlm::default());
    let (mut runtime, _) = open(&config, Vec::new(), llm).await;

    assert_eq!(runtime.greeting(), "Hi! I'm ready to analyse.");
    let answer = runtime.handle_message("What is the status of Acme?").await;
    assert_eq!(answer.text, language_pack(Language::English).no_data);
}
