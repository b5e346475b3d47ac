use crate::utils;
use colored::Colorize;
use stackflow_cloud::StateManager;
use std::path::Path;

pub async fn handle(project_root: &Path) -> anyhow::Result<()> {
    let manager = StateManager::new(project_root);
    let state = manager.load().await?;

    if state.is_empty() {
        println!("{}", "記録されているリソースはありません".dimmed());
        return Ok(());
    }

    println!(
        "{} ({})",
        format!("スタック '{}'", state.stack.as_deref().unwrap_or("-")).bold(),
        manager.state_path().display().to_string().dimmed()
    );
    println!(
        "最終更新: {}",
        state.updated_at.format("%Y-%m-%d %H:%M:%S UTC")
    );
    println!();

    for (name, resource) in &state.resources {
        println!(
            "  {} {} [{}]",
            name.cyan(),
            resource.resource_type.to_string().dimmed(),
            resource.status
        );
        println!("      id: {}", resource.id);
        for (key, value) in &resource.attributes {
            println!("      {}: {}", key, utils::display_value(value));
        }
    }

    utils::print_outputs(&state.outputs);

    Ok(())
}
