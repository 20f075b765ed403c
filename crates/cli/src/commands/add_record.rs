use clap::Args;
use serde_json::json;
use tracing::info;

use sekretarz_core::domain::record::{ProjectStatus, Record};

use crate::bootstrap::{async_runtime, load_config, open_store, BootstrapError, GlobalArgs};
use crate::commands::CommandResult;

const COMMAND: &str = "add-record";

#[derive(Clone, Debug, Args)]
pub struct AddRecordArgs {
    #[arg(long, help = "Client name (Klient)")]
    pub client: String,
    #[arg(long, default_value = "", help = "Country (Kraj)")]
    pub country: String,
    #[arg(long, default_value = "", help = "Product (Produkt)")]
    pub product: String,
    #[arg(long, help = "Project status: Planowany|W Trakcie|Zakończony|Pytanie")]
    pub status: String,
    #[arg(long, default_value = "", help = "Customer feedback")]
    pub feedback: String,
}

pub fn run(global: &GlobalArgs, args: AddRecordArgs) -> CommandResult {
    let status = match args.status.parse::<ProjectStatus>() {
        Ok(status) => status,
        Err(error) => return CommandResult::failure(COMMAND, "validation", error.to_string(), 1),
    };
    let record = Record::new(args.client, args.country, args.product, status, args.feedback);

    match append(global, record) {
        Ok((record, total)) => {
            info!(event_name = "cli.record.added", client = %record.client, total, "record added");
            CommandResult::success_with(
                COMMAND,
                format!("added record for `{}` ({total} records)", record.client),
                json!({ "record": record, "total": total }),
            )
        }
        Err(error) => error.into_result(COMMAND),
    }
}

fn append(global: &GlobalArgs, record: Record) -> Result<(Record, usize), BootstrapError> {
    let config = load_config(global)?;
    let runtime = async_runtime()?;

    runtime.block_on(async {
        let mut store = open_store(&config).await?;
        let total = store.append(record.clone()).await?.len();
        Ok::<_, BootstrapError>((record, total))
    })
}
