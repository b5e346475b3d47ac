use crate::utils;
use colored::Colorize;
use stackflow_cloud::{StateManager, resolve_outputs};
use std::path::Path;

pub async fn handle(project_root: &Path, name: Option<&str>, json: bool) -> anyhow::Result<()> {
    let stack = stackflow_core::load_stack_from_root(project_root)?;
    let state = StateManager::new(project_root).load().await?;
    let outputs = resolve_outputs(&stack, &state);

    match name {
        Some(name) => {
            let value = outputs
                .get(name)
                .ok_or_else(|| anyhow::anyhow!("出力 '{}' は定義されていません", name))?;

            if value.is_null() {
                eprintln!(
                    "{} 出力 '{}' はまだ作成されていません（{} を実行してください）",
                    "✗".red().bold(),
                    name,
                    "stack up".cyan()
                );
                std::process::exit(1);
            }

            if json {
                println!("{}", serde_json::to_string_pretty(value)?);
            } else {
                println!("{}", utils::display_value(value));
            }
        }
        None => {
            if json {
                println!("{}", serde_json::to_string_pretty(&outputs)?);
            } else if outputs.is_empty() {
                println!("{}", "出力は定義されていません".dimmed());
            } else {
                for (name, value) in &outputs {
                    println!("{} = {}", name.cyan(), utils::display_value(value));
                }
            }
        }
    }

    Ok(())
}
