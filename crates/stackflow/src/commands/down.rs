use crate::GlobalArgs;
use crate::utils;
use colored::Colorize;
use stackflow_cloud::{Engine, StateManager};
use std::path::Path;

pub async fn handle(project_root: &Path, global: &GlobalArgs, yes: bool) -> anyhow::Result<()> {
    let stack = stackflow_core::load_stack_from_root(project_root)?;
    let state = StateManager::new(project_root);
    let recorded = state.load().await?;

    if recorded.is_empty() {
        println!("{}", "削除するリソースはありません".dimmed());
        return Ok(());
    }

    let stack_name = recorded.stack.as_deref().unwrap_or(&stack.name);
    println!(
        "{}",
        format!("スタック '{}' を削除します", stack_name).red().bold()
    );
    println!();
    for name in recorded.full_deletion_order() {
        if let Some(resource) = recorded.get_resource(&name) {
            println!(
                "  {} {} {} ({})",
                "-".red().bold(),
                resource.resource_type,
                name.red(),
                resource.id.dimmed()
            );
        }
    }

    println!();
    if !yes && !utils::confirm("これらのリソースを完全に削除しますか？")? {
        println!("{}", "キャンセルしました".yellow());
        return Ok(());
    }

    let provider = utils::connect_provider(&stack, global).await?;
    let engine = Engine::new(&provider, &state);

    println!();
    let result = engine.destroy().await?;
    utils::print_apply_result(&result);

    if !result.is_success() {
        eprintln!();
        eprintln!(
            "{}",
            "✗ 削除を中断しました。残りのリソースは状態ファイルに記録されています"
                .red()
                .bold()
        );
        std::process::exit(1);
    }

    println!(
        "{}",
        format!("✓ スタック '{}' を削除しました", stack_name)
            .green()
            .bold()
    );

    Ok(())
}
