use crate::GlobalArgs;
use crate::utils;
use colored::Colorize;
use stackflow_cloud::{CloudProvider, Engine, StateManager};
use std::path::Path;

pub async fn handle(project_root: &Path, global: &GlobalArgs, yes: bool) -> anyhow::Result<()> {
    let stack = utils::load_stack(project_root)?;
    let provider = utils::connect_provider(&stack, global).await?;
    let state = StateManager::new(project_root);
    let engine = Engine::new(&provider, &state);

    println!(
        "{}",
        format!("スタック '{}' を適用中...", stack.name).blue().bold()
    );
    println!();

    let plan = engine.plan(&stack).await?;
    utils::print_plan(&plan);

    if !plan.has_changes {
        println!();
        println!("{}", "✓ 変更はありません".green());
        utils::print_outputs(&engine.outputs(&stack).await?);
        return Ok(());
    }

    println!();
    if !yes && !utils::confirm("この計画を適用しますか？")? {
        println!("{}", "キャンセルしました".yellow());
        return Ok(());
    }

    // 認証確認
    let auth = provider.check_auth().await?;
    if !auth.authenticated {
        eprintln!(
            "{} {} の認証に失敗しました",
            "✗".red().bold(),
            provider.display_name()
        );
        if let Some(error) = auth.error {
            eprintln!("  {}", error);
        }
        std::process::exit(1);
    }
    tracing::info!(
        "Authenticated: {}",
        auth.account_info.as_deref().unwrap_or("-")
    );

    println!();
    let result = engine.apply(&stack, &plan).await?;
    utils::print_apply_result(&result);

    if !result.is_success() {
        eprintln!();
        eprintln!(
            "{}",
            "✗ 適用を中断しました。作成済みのリソースは状態ファイルに記録されています"
                .red()
                .bold()
        );
        eprintln!("  再度 {} を実行すると残りから再開します", "stack up".cyan());
        std::process::exit(1);
    }

    println!(
        "{}",
        format!("✓ スタック '{}' を適用しました！", stack.name)
            .green()
            .bold()
    );
    utils::print_outputs(&engine.outputs(&stack).await?);

    Ok(())
}
