use colored::Colorize;
use stackflow_core::templates::{builtin_template_names, get_builtin_template};
use std::path::Path;

pub fn handle(target_dir: &Path, template: &str, force: bool) -> anyhow::Result<()> {
    let files = get_builtin_template(template).ok_or_else(|| {
        anyhow::anyhow!(
            "テンプレート '{}' が見つかりません。利用可能: {}",
            template,
            builtin_template_names().join(", ")
        )
    })?;

    // 上書き確認
    if !force {
        let existing: Vec<_> = files
            .iter()
            .map(|file| target_dir.join(file.path))
            .filter(|path| path.exists())
            .collect();
        if !existing.is_empty() {
            eprintln!("{}", "✗ ファイルが既に存在します:".red().bold());
            for path in &existing {
                eprintln!("  {}", path.display());
            }
            eprintln!();
            eprintln!("上書きするには --force を指定してください");
            std::process::exit(1);
        }
    }

    for file in files {
        let path = target_dir.join(file.path);
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)?;
        }
        std::fs::write(&path, file.content)?;
        println!("  {} {}", "作成".green(), file.path);
    }

    println!();
    println!(
        "{}",
        format!("✓ テンプレート '{}' を展開しました！", template)
            .green()
            .bold()
    );
    println!();
    println!("{}", "次のコマンドで確認できます:".bold());
    println!("  {} validate", "stack".cyan());
    println!("  {} plan", "stack".cyan());

    Ok(())
}
