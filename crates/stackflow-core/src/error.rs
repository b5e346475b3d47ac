use std::fmt;
use std::path::PathBuf;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum StackError {
    #[error("KDLパースエラー: {0}")]
    KdlParse(#[from] kdl::KdlError),

    #[error("ファイル読み込みエラー: {0}")]
    Io(#[from] std::io::Error),

    #[error("IO エラー: {path}\n理由: {message}")]
    IoError { path: PathBuf, message: String },

    #[error("無効な設定: {0}")]
    InvalidConfig(String),

    #[error("無効なCIDR: {0}")]
    InvalidCidr(String),

    #[error("スタック定義に {} 件の問題があります:\n{}", .issues.len(), format_issues(.issues))]
    Validation { issues: Vec<ValidationIssue> },

    #[error("循環依存が検出されました: {0}")]
    CircularDependency(String),

    #[error(
        "プロジェクトルートが見つかりません\n探索開始位置: {0}\nヒント: stack.kdl ファイルを含むディレクトリで実行してください"
    )]
    ProjectRootNotFound(PathBuf),
}

pub type Result<T> = std::result::Result<T, StackError>;

/// 検証で見つかった問題（リソース名 + 内容）
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ValidationIssue {
    /// 問題のあるリソース名（スタック全体の場合は "stack"）
    pub resource: String,
    pub message: String,
}

impl ValidationIssue {
    pub fn new(resource: impl Into<String>, message: impl Into<String>) -> Self {
        Self {
            resource: resource.into(),
            message: message.into(),
        }
    }
}

impl fmt::Display for ValidationIssue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}: {}", self.resource, self.message)
    }
}

fn format_issues(issues: &[ValidationIssue]) -> String {
    issues
        .iter()
        .map(|issue| format!("  - {}", issue))
        .collect::<Vec<_>>()
        .join("\n")
}
