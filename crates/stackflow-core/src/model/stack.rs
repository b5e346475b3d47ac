use super::resource::{Reference, Resource, ResourceKind};
use serde::{Deserialize, Serialize};

/// サポートするプロバイダー名
pub const AWS_PROVIDER: &str = "aws";

/// スタック全体の定義
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Stack {
    /// スタック名（タグ stackflow:stack に使われる）
    pub name: String,

    pub provider: ProviderConfig,

    /// 宣言順のリソース
    pub resources: Vec<Resource>,

    pub outputs: Vec<Output>,
}

impl Stack {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            provider: ProviderConfig::default(),
            resources: Vec::new(),
            outputs: Vec::new(),
        }
    }

    /// 論理名でリソースを取得
    pub fn get(&self, name: &str) -> Option<&Resource> {
        self.resources.iter().find(|r| r.name == name)
    }

    /// 指定種類のリソース一覧（宣言順）
    pub fn resources_of(&self, kind: ResourceKind) -> impl Iterator<Item = &Resource> {
        self.resources.iter().filter(move |r| r.kind() == kind)
    }

    pub fn output(&self, name: &str) -> Option<&Output> {
        self.outputs.iter().find(|o| o.name == name)
    }
}

/// プロバイダー設定
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ProviderConfig {
    /// プロバイダー名（現在は aws のみ）
    pub name: String,

    /// リージョン（eu-central-1 など）
    pub region: Option<String>,

    /// 認証プロファイル名
    pub profile: Option<String>,
}

impl Default for ProviderConfig {
    fn default() -> Self {
        Self {
            name: AWS_PROVIDER.to_string(),
            region: None,
            profile: None,
        }
    }
}

/// スタックが外部に公開する値
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Output {
    pub name: String,
    pub resource: Reference,
    /// 参照する属性（public_ip など）
    pub attribute: String,
}
