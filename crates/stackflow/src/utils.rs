use crate::GlobalArgs;
use colored::Colorize;
use stackflow_cloud::{ActionType, ApplyResult, Plan};
use stackflow_cloud_aws::{AwsProvider, PROVIDER_NAME};
use stackflow_core::Stack;
use std::collections::BTreeMap;
use std::io::Write;
use std::path::Path;

/// stack.kdl をロードして検証済みのスタックを返す
pub fn load_stack(project_root: &Path) -> anyhow::Result<Stack> {
    let stack = stackflow_core::load_stack_from_root(project_root)?;
    stackflow_core::validate_stack(&stack)?;
    Ok(stack)
}

/// スタックの provider 設定と CLI オプションからプロバイダーを構築
///
/// --region / --profile はスタックの設定より優先される。
pub async fn connect_provider(stack: &Stack, global: &GlobalArgs) -> anyhow::Result<AwsProvider> {
    if stack.provider.name != PROVIDER_NAME {
        anyhow::bail!(
            "未対応のプロバイダーです: '{}'（対応: {}）",
            stack.provider.name,
            PROVIDER_NAME
        );
    }

    let region = global.region.as_deref().or(stack.provider.region.as_deref());
    let profile = global
        .profile
        .as_deref()
        .or(stack.provider.profile.as_deref());

    Ok(AwsProvider::connect(region, profile).await)
}

/// 実行計画を表示
pub fn print_plan(plan: &Plan) {
    for action in &plan.actions {
        let line = format!("{} {}", action.resource_type, action.resource_id);
        match action.action_type {
            ActionType::Create => println!("  {} {}", "+".green().bold(), line.green()),
            ActionType::Update => println!("  {} {}", "~".yellow().bold(), line.yellow()),
            ActionType::Replace => println!("  {} {}", "±".magenta().bold(), line.magenta()),
            ActionType::Delete => println!("  {} {}", "-".red().bold(), line.red()),
            ActionType::NoOp => println!("    {}", line.dimmed()),
        }
        if action.action_type != ActionType::NoOp {
            println!("      {}", action.description.dimmed());
        }
    }

    let summary = plan.summary();
    println!();
    println!(
        "計画: 作成 {} / 更新 {} / 置換 {} / 削除 {} / 変更なし {}",
        summary.create.to_string().green(),
        summary.update.to_string().yellow(),
        summary.replace.to_string().magenta(),
        summary.delete.to_string().red(),
        summary.no_change
    );
}

/// 実行結果を表示
pub fn print_apply_result(result: &ApplyResult) {
    for action in &result.succeeded {
        println!("  {} {}", "✓".green(), action.message);
    }
    for action in &result.failed {
        eprintln!(
            "  {} {}: {}",
            "✗".red().bold(),
            action.action_id,
            action.error.as_deref().unwrap_or("不明なエラー")
        );
    }
    println!();
    println!(
        "{} 件成功 / {} 件失敗 ({:.1} 秒)",
        result.succeeded.len(),
        result.failed.len(),
        result.duration_ms as f64 / 1000.0
    );
}

/// 出力値を表示
pub fn print_outputs(outputs: &BTreeMap<String, serde_json::Value>) {
    if outputs.is_empty() {
        return;
    }
    println!();
    println!("{}", "出力:".bold());
    for (name, value) in outputs {
        println!("  {} = {}", name.cyan(), display_value(value));
    }
}

/// 出力値を人間向けの文字列に変換（文字列は引用符なし）
pub fn display_value(value: &serde_json::Value) -> String {
    match value {
        serde_json::Value::String(s) => s.clone(),
        serde_json::Value::Null => "(未作成)".to_string(),
        other => other.to_string(),
    }
}

/// y/N の確認プロンプト
///
/// 入力が閉じている場合は No として扱う。
pub fn confirm(message: &str) -> anyhow::Result<bool> {
    print!("{} [y/N]: ", message);
    std::io::stdout().flush()?;

    let mut answer = String::new();
    if std::io::stdin().read_line(&mut answer)? == 0 {
        println!();
        return Ok(false);
    }
    Ok(matches!(answer.trim().to_lowercase().as_str(), "y" | "yes"))
}
