use colored::Colorize;
use std::path::Path;

pub fn handle(project_root: &Path) -> anyhow::Result<()> {
    println!("{}", "スタック定義を検証中...".blue());
    println!(
        "プロジェクトルート: {}",
        project_root.display().to_string().cyan()
    );

    let result = stackflow_core::load_stack_from_root(project_root).and_then(|stack| {
        let order = stackflow_core::validate_stack(&stack)?;
        Ok((stack, order))
    });

    let (stack, order) = match result {
        Ok(loaded) => loaded,
        Err(e) => {
            eprintln!();
            eprintln!("{}", "✗ 定義エラー".red().bold());
            eprintln!("  {}", e);
            std::process::exit(1);
        }
    };

    println!("{}", "✓ スタック定義は正常です！".green().bold());
    println!();
    println!("サマリー:");
    println!("  スタック: {}", stack.name.cyan());
    println!(
        "  プロバイダー: {} (region: {})",
        stack.provider.name,
        stack.provider.region.as_deref().unwrap_or("(未設定)")
    );
    println!("  リソース: {}個（作成順）", order.len());
    for name in order.iter() {
        if let Some(resource) = stack.get(name) {
            println!("    - {} ({})", name.cyan(), resource.kind());
        }
    }
    if !stack.outputs.is_empty() {
        println!("  出力: {}個", stack.outputs.len());
        for output in &stack.outputs {
            println!(
                "    - {} ← {}.{}",
                output.name.cyan(),
                output.resource,
                output.attribute
            );
        }
    }

    Ok(())
}
