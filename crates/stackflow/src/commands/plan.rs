use crate::GlobalArgs;
use crate::utils;
use colored::Colorize;
use stackflow_cloud::{Engine, StateManager};
use std::path::Path;

pub async fn handle(project_root: &Path, global: &GlobalArgs) -> anyhow::Result<()> {
    let stack = utils::load_stack(project_root)?;
    let provider = utils::connect_provider(&stack, global).await?;
    let state = StateManager::new(project_root);
    let engine = Engine::new(&provider, &state);

    println!(
        "{}",
        format!("スタック '{}' の実行計画", stack.name).bold()
    );
    println!();

    let plan = engine.plan(&stack).await?;
    utils::print_plan(&plan);

    if !plan.has_changes {
        println!();
        println!("{}", "✓ 変更はありません".green());
    }

    Ok(())
}
