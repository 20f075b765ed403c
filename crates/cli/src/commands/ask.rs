use serde_json::{json, Value};

use sekretarz_agent::conversation::{Answer, AnswerKind};
use sekretarz_agent::AgentRuntime;

use crate::bootstrap::{async_runtime, load_config, open_session, GlobalArgs};
use crate::commands::CommandResult;

const COMMAND: &str = "ask";

pub fn run(global: &GlobalArgs, question: &str) -> CommandResult {
    let config = match load_config(global) {
        Ok(config) => config,
        Err(error) => return error.into_result(COMMAND),
    };
    let runtime = match async_runtime() {
        Ok(runtime) => runtime,
        Err(error) => return error.into_result(COMMAND),
    };

    runtime.block_on(async {
        match open_session(&config).await {
            Ok(mut session) => answer(&mut session, question).await,
            Err(error) => error.into_result(COMMAND),
        }
    })
}

/// Runs a single turn and reports the answer with its tool trace.
pub async fn answer(session: &mut AgentRuntime, question: &str) -> CommandResult {
    if question.trim().is_empty() {
        return CommandResult::failure(COMMAND, "validation", "question must not be blank", 1);
    }

    let answer = session.handle_message(question).await;
    match answer.kind {
        AnswerKind::Failed => CommandResult::failure(COMMAND, "turn_failed", answer.text, 1),
        AnswerKind::Final | AnswerKind::Degraded => {
            let details = trace_details(&answer);
            CommandResult::success_with(COMMAND, answer.text, details)
        }
    }
}

fn trace_details(answer: &Answer) -> Value {
    let kind = match answer.kind {
        AnswerKind::Final => "final",
        AnswerKind::Degraded => "degraded",
        AnswerKind::Failed => "failed",
    };
    let tools: Vec<Value> = answer
        .trace
        .iter()
        .map(|entry| {
            json!({
                "tool": entry.tool,
                "input": entry.input,
                "outcome": entry.outcome.label(),
            })
        })
        .collect();

    json!({ "kind": kind, "tools": tools })
}
