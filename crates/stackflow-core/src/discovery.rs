//! プロジェクトルートとスタック定義ファイルの発見

use crate::error::{Result, StackError};
use std::path::{Path, PathBuf};
use tracing::{debug, info, warn};

/// スタック定義ファイル名
pub const STACK_FILE: &str = "stack.kdl";

/// StackFlowの作業ディレクトリ（状態ファイルもここに置かれる）
pub const STACKFLOW_DIR: &str = ".stackflow";

/// プロジェクトルートを指定する環境変数
pub const PROJECT_ROOT_ENV: &str = "STACKFLOW_PROJECT_ROOT";

/// プロジェクトルートを検出
///
/// 以下の優先順位で検索:
/// 1. 環境変数 STACKFLOW_PROJECT_ROOT
/// 2. カレントディレクトリから上に向かって以下を探す:
///    - stack.kdl
///    - .stackflow/stack.kdl
#[tracing::instrument]
pub fn find_project_root() -> Result<PathBuf> {
    // 1. 環境変数
    if let Ok(root) = std::env::var(PROJECT_ROOT_ENV) {
        let path = PathBuf::from(&root);
        debug!(env_root = %root, "Checking STACKFLOW_PROJECT_ROOT");
        if find_stack_file(&path).is_some() {
            info!(project_root = %path.display(), "Found project root from environment variable");
            return Ok(path);
        }
    }

    // 2. カレントディレクトリから上に向かって探す
    let start_dir = std::env::current_dir()?;
    find_project_root_from(&start_dir)
}

/// 指定ディレクトリから上に向かってプロジェクトルートを探す
pub fn find_project_root_from(start_dir: &Path) -> Result<PathBuf> {
    let mut current = start_dir.to_path_buf();
    debug!(start_dir = %start_dir.display(), "Searching for project root");

    loop {
        if find_stack_file(&current).is_some() {
            info!(project_root = %current.display(), "Found project root");
            return Ok(current);
        }

        // 親ディレクトリへ
        if !current.pop() {
            break;
        }
    }

    warn!(start_dir = %start_dir.display(), "Project root not found");
    Err(StackError::ProjectRootNotFound(start_dir.to_path_buf()))
}

/// プロジェクトルート内のスタック定義ファイル
///
/// ./stack.kdl が .stackflow/stack.kdl より優先される。
pub fn find_stack_file(project_root: &Path) -> Option<PathBuf> {
    let root_file = project_root.join(STACK_FILE);
    if root_file.is_file() {
        return Some(root_file);
    }

    let dir_file = project_root.join(STACKFLOW_DIR).join(STACK_FILE);
    if dir_file.is_file() {
        return Some(dir_file);
    }

    None
}
