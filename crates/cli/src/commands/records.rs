use serde_json::json;

use sekretarz_core::domain::record::Record;

use crate::bootstrap::{async_runtime, load_config, open_store, BootstrapError, GlobalArgs};
use crate::commands::CommandResult;

const COMMAND: &str = "records";

pub fn run(global: &GlobalArgs, json_output: bool) -> CommandResult {
    let records = match load(global) {
        Ok(records) => records,
        Err(error) => return error.into_result(COMMAND),
    };

    if json_output {
        return CommandResult::success_with(
            COMMAND,
            format!("{} records", records.len()),
            json!({ "records": records }),
        );
    }

    CommandResult::text(render_human(&records))
}

fn load(global: &GlobalArgs) -> Result<Vec<Record>, BootstrapError> {
    let config = load_config(global)?;
    let runtime = async_runtime()?;
    runtime.block_on(async {
        let store = open_store(&config).await?;
        Ok::<_, BootstrapError>(store.records().to_vec())
    })
}

pub fn render_human(records: &[Record]) -> String {
    if records.is_empty() {
        return "no records yet".to_string();
    }

    let mut lines = vec![format!("{} records:", records.len())];
    lines.extend(records.iter().enumerate().map(|(position, record)| {
        format!(
            "{:>3}. {} | {} | {} | {} | {}",
            position + 1,
            record.client,
            record.country,
            record.product,
            record.status,
            record.feedback
        )
    }));
    lines.join("\n")
}
