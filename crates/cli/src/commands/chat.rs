use std::io::Write;

use anyhow::{Context, Result};
use tokio::io::{AsyncBufRead, AsyncBufReadExt, BufReader, Lines};
use tracing::warn;

use sekretarz_agent::AgentRuntime;
use sekretarz_core::domain::record::{ProjectStatus, Record};
use sekretarz_core::errors::ApplicationError;

use crate::bootstrap::{async_runtime, load_config, open_session, GlobalArgs};
use crate::commands::{records, CommandResult};

const COMMAND: &str = "chat";
const HELP: &str = "commands: /add, /records, /history, /quit";

pub fn run(global: &GlobalArgs) -> CommandResult {
    let config = match load_config(global) {
        Ok(config) => config,
        Err(error) => return error.into_result(COMMAND),
    };
    let runtime = match async_runtime() {
        Ok(runtime) => runtime,
        Err(error) => return error.into_result(COMMAND),
    };

    runtime.block_on(async {
        let mut session = match open_session(&config).await {
            Ok(session) => session,
            Err(error) => return error.into_result(COMMAND),
        };

        let stdin = BufReader::new(tokio::io::stdin());
        let mut stdout = std::io::stdout();
        match run_session(&mut session, stdin, &mut stdout).await {
            Ok(()) => CommandResult::text(String::new()),
            Err(error) => CommandResult::failure(COMMAND, "io", format!("{error:#}"), 1),
        }
    })
}

/// Reads utterances line by line until `/quit` or end of input.
pub async fn run_session<R, W>(session: &mut AgentRuntime, input: R, output: &mut W) -> Result<()>
where
    R: AsyncBufRead + Unpin,
    W: Write,
{
    let mut lines = input.lines();
    writeln!(output, "{}", session.greeting()).context("failed to write greeting")?;
    writeln!(output, "{HELP}").context("failed to write help")?;

    loop {
        prompt(output, "> ")?;
        let Some(line) = lines.next_line().await.context("failed to read input")? else {
            break;
        };
        let line = line.trim();

        match line {
            "" => continue,
            "/quit" | "/exit" => break,
            "/help" => writeln!(output, "{HELP}")?,
            "/records" => writeln!(output, "{}", records::render_human(session.records()))?,
            "/history" => {
                for turn in session.history() {
                    writeln!(output, "{}: {}", turn.role.as_str(), turn.text)?;
                }
            }
            "/add" => {
                let Some(record) = read_record(&mut lines, output).await? else {
                    continue;
                };
                match session.add_record(record).await {
                    Ok(all) => writeln!(output, "record added ({} total)", all.len())?,
                    Err(error) => {
                        let error = ApplicationError::from(error);
                        warn!(
                            event_name = "cli.chat.add_failed",
                            error_class = error.error_class(),
                            error = %error,
                            "record was not added"
                        );
                        writeln!(output, "{} ({error})", error.user_message())?;
                    }
                }
            }
            utterance if utterance.starts_with('/') => {
                writeln!(output, "unknown command `{utterance}`; {HELP}")?;
            }
            utterance => {
                let answer = session.handle_message(utterance).await;
                writeln!(output, "{}", answer.text)?;
            }
        }
    }

    output.flush().context("failed to flush output")?;
    Ok(())
}

/// Field-by-field form; `None` when input ends or the status is not recognised.
async fn read_record<R, W>(
    lines: &mut Lines<R>,
    output: &mut W,
) -> Result<Option<Record>>
where
    R: AsyncBufRead + Unpin,
    W: Write,
{
    let options: Vec<&str> = ProjectStatus::ALL.iter().map(|status| status.label()).collect();
    let status_label = format!("StatusProjektu ({})", options.join("|"));

    let Some(client) = read_field(lines, output, "Klient").await? else { return Ok(None) };
    let Some(country) = read_field(lines, output, "Kraj").await? else { return Ok(None) };
    let Some(product) = read_field(lines, output, "Produkt").await? else { return Ok(None) };
    let Some(status) = read_field(lines, output, &status_label).await? else { return Ok(None) };
    let Some(feedback) = read_field(lines, output, "Feedback").await? else { return Ok(None) };

    match status.parse::<ProjectStatus>() {
        Ok(status) => Ok(Some(Record::new(client, country, product, status, feedback))),
        Err(error) => {
            writeln!(output, "{error}")?;
            Ok(None)
        }
    }
}

async fn read_field<R, W>(lines: &mut Lines<R>, output: &mut W, label: &str) -> Result<Option<String>>
where
    R: AsyncBufRead + Unpin,
    W: Write,
{
    prompt(output, &format!("{label}: "))?;
    let value = lines.next_line().await.context("failed to read record field")?;
    Ok(value.map(|value| value.trim().to_string()))
}

fn prompt<W: Write>(output: &mut W, text: &str) -> Result<()> {
    write!(output, "{text}").context("failed to write prompt")?;
    output.flush().context("failed to flush prompt")
}
