use clap::Subcommand;
use zeppctl::{Event, InterpreterChanges, InterpreterRequest};

use crate::cli::GlobalFlags;

#[derive(Subcommand, Debug)]
pub enum InterpreterCommand {
    /// Merge property changes into a named interpreter and restart the daemon
    Set {
        /// Interpreter name as listed by the daemon (e.g. `spark`)
        name: String,

        /// Property to set, repeatable
        #[arg(long = "property", value_name = "KEY=VALUE", required = true)]
        properties: Vec<String>,
    },
}

pub async fn execute(command: InterpreterCommand, global: &GlobalFlags) -> anyhow::Result<()> {
    let InterpreterCommand::Set { name, properties } = command;

    let mut map = serde_json::Map::new();
    for pair in &properties {
        let (key, value) = pair
            .split_once('=')
            .ok_or_else(|| anyhow::anyhow!("expected KEY=VALUE, got '{pair}'"))?;
        // Values that parse as JSON keep their type; everything else is a
        // plain string.
        let value = serde_json::from_str(value)
            .unwrap_or_else(|_| serde_json::Value::String(value.to_string()));
        map.insert(key.to_string(), value);
    }

    let controller = global.controller(None)?;
    let outcome = controller
        .handle(Event::ChangeInterpreters(vec![InterpreterRequest {
            name,
            changes: InterpreterChanges::properties(map),
        }]))
        .await?;

    super::report_acks(&outcome.acks)
}
