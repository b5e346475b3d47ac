mod commands;
mod utils;

use clap::{Parser, Subcommand};
use colored::Colorize;
use tracing_subscriber::EnvFilter;

#[derive(Parser)]
#[command(name = "stack")]
#[command(about = "宣言したネットワークとインスタンスを、そのままクラウドに。", long_about = None)]
struct Cli {
    #[command(flatten)]
    global: GlobalArgs,

    #[command(subcommand)]
    command: Commands,
}

/// 全コマンド共通のオプション
#[derive(clap::Args, Debug, Clone, Default)]
pub struct GlobalArgs {
    /// リージョン（stack.kdl の provider 設定より優先）
    #[arg(long, global = true, env = "STACKFLOW_REGION")]
    pub region: Option<String>,

    /// AWS 認証プロファイル名
    #[arg(long, global = true, env = "AWS_PROFILE")]
    pub profile: Option<String>,

    /// ログを詳細に出力（-v: info, -vv: debug）
    #[arg(short, long, global = true, action = clap::ArgAction::Count)]
    pub verbose: u8,
}

#[derive(Subcommand)]
enum Commands {
    /// テンプレートから stack.kdl を作成
    Init {
        /// テンプレート名
        #[arg(short, long, default_value = stackflow_core::templates::DEFAULT_TEMPLATE)]
        template: String,
        /// 既存のファイルを上書きする
        #[arg(short, long)]
        force: bool,
    },
    /// スタック定義を検証
    Validate,
    /// 変更内容（作成・更新・置換・削除）を表示
    Plan,
    /// スタックを作成・更新
    Up {
        /// 確認なしで実行
        #[arg(short, long)]
        yes: bool,
    },
    /// スタックの全リソースを削除
    Down {
        /// 確認なしで実行
        #[arg(short, long)]
        yes: bool,
    },
    /// 出力値を表示
    Output {
        /// 出力名（省略時はすべて）
        name: Option<String>,
        /// JSON で出力
        #[arg(long)]
        json: bool,
    },
    /// 記録されているリソースの状態を表示
    State,
    /// バージョン情報を表示
    Version,
}

fn init_tracing(verbose: u8) {
    let default_level = match verbose {
        0 => "warn",
        1 => "info",
        _ => "debug",
    };
    let filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default_level));

    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .init();
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();

    // ログは stderr に出力（stdout は output --json 用）
    init_tracing(cli.global.verbose);

    // プロジェクトルート不要のコマンド
    match &cli.command {
        Commands::Version => {
            println!("stackflow {}", env!("CARGO_PKG_VERSION"));
            return Ok(());
        }
        Commands::Init { template, force } => {
            let current_dir = std::env::current_dir()?;
            return commands::init::handle(&current_dir, template, *force);
        }
        _ => {}
    }

    // プロジェクトルートを検索
    let project_root = match stackflow_core::find_project_root() {
        Ok(root) => root,
        Err(e @ stackflow_core::StackError::ProjectRootNotFound(_)) => {
            eprintln!("{} {}", "✗".red().bold(), e);
            eprintln!();
            eprintln!("新しく始める場合: {} init", "stack".cyan());
            std::process::exit(1);
        }
        Err(e) => return Err(e.into()),
    };

    // コマンドディスパッチ
    match cli.command {
        Commands::Validate => {
            commands::validate::handle(&project_root)?;
        }
        Commands::Plan => {
            commands::plan::handle(&project_root, &cli.global).await?;
        }
        Commands::Up { yes } => {
            commands::up::handle(&project_root, &cli.global, yes).await?;
        }
        Commands::Down { yes } => {
            commands::down::handle(&project_root, &cli.global, yes).await?;
        }
        Commands::Output { name, json } => {
            commands::output::handle(&project_root, name.as_deref(), json).await?;
        }
        Commands::State => {
            commands::state::handle(&project_root).await?;
        }
        Commands::Version | Commands::Init { .. } => {
            unreachable!("handled before project root discovery");
        }
    }

    Ok(())
}
