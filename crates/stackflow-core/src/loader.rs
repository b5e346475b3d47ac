//! 統合ローダー
//!
//! ファイル発見、パース、起動スクリプトの解決を統合

use crate::discovery::find_stack_file;
use crate::error::{Result, StackError};
use crate::model::{ResourceSpec, Stack, UserData};
use crate::parser::parse_kdl_string;
use std::path::Path;
use tracing::{debug, info, instrument};

/// 指定されたルートディレクトリからスタックをロード
///
/// 以下の処理を実行:
/// 1. stack.kdl の発見
/// 2. KDLパース
/// 3. user-data-file の読み込み（プロジェクトルートからの相対パス）
#[instrument(skip(project_root), fields(project_root = %project_root.display()))]
pub fn load_stack_from_root(project_root: &Path) -> Result<Stack> {
    let stack_file = find_stack_file(project_root)
        .ok_or_else(|| StackError::ProjectRootNotFound(project_root.to_path_buf()))?;
    debug!(file = %stack_file.display(), "Reading stack file");

    let content = std::fs::read_to_string(&stack_file).map_err(|e| StackError::IoError {
        path: stack_file.clone(),
        message: e.to_string(),
    })?;

    let default_name = project_root
        .file_name()
        .and_then(|n| n.to_str())
        .unwrap_or("unnamed")
        .to_string();
    let mut stack = parse_kdl_string(&content, default_name)?;

    resolve_user_data(&mut stack, project_root)?;

    info!(
        stack = %stack.name,
        resources = stack.resources.len(),
        "Stack loaded successfully"
    );
    Ok(stack)
}

/// user-data-file をスクリプト本文に置き換える
pub fn resolve_user_data(stack: &mut Stack, project_root: &Path) -> Result<()> {
    for resource in &mut stack.resources {
        if let ResourceSpec::Instance(instance) = &mut resource.spec {
            if let Some(UserData::File(relative)) = &instance.user_data {
                let path = project_root.join(relative);
                debug!(resource = %resource.name, file = %path.display(), "Reading user data file");
                let content =
                    std::fs::read_to_string(&path).map_err(|e| StackError::IoError {
                        path: path.clone(),
                        message: e.to_string(),
                    })?;
                instance.user_data = Some(UserData::Inline(content));
            }
        }
    }
    Ok(())
}
