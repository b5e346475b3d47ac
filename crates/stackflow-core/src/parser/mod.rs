//! KDLパーサー
//!
//! StackFlowのKDL設定ファイル（stack.kdl）をパースします。
//! 各ノードタイプのパース処理はモジュールに分離されています。

mod instance;
mod network;
mod security;


use crate::error::{Result, StackError};
use crate::model::{Output, ProviderConfig, Reference, Stack, Tags};
use kdl::{KdlDocument, KdlNode, KdlValue};

/// KDL文字列をパース
///
/// `stack` ノードが無い場合は `default_name` がスタック名になる。
pub fn parse_kdl_string(content: &str, default_name: String) -> Result<Stack> {
    let doc: KdlDocument = content.parse()?;

    let mut stack = Stack::new(default_name);
    let mut stack_node_seen = false;
    let mut provider_seen = false;

    for node in doc.nodes() {
        match node_key(node).as_str() {
            "stack" => {
                if stack_node_seen {
                    return Err(StackError::InvalidConfig(
                        "stack may only be declared once".to_string(),
                    ));
                }
                stack.name = node_label(node, "stack")?;
                stack_node_seen = true;
            }
            "provider" => {
                if provider_seen {
                    return Err(StackError::InvalidConfig(
                        "provider may only be declared once".to_string(),
                    ));
                }
                stack.provider = parse_provider(node)?;
                provider_seen = true;
            }
            "vpc" => stack.resources.push(network::parse_vpc(node)?),
            "internet-gateway" => stack.resources.push(network::parse_internet_gateway(node)?),
            "subnet" => stack.resources.push(network::parse_subnet(node)?),
            "route-table" => stack.resources.push(network::parse_route_table(node)?),
            "route-table-association" => stack
                .resources
                .push(network::parse_route_table_association(node)?),
            "security-group" => stack.resources.push(security::parse_security_group(node)?),
            "instance" => stack.resources.push(instance::parse_instance(node)?),
            "output" => stack.outputs.push(parse_output(node)?),
            other => {
                return Err(StackError::InvalidConfig(format!(
                    "unknown node '{}'",
                    other
                )));
            }
        }
    }

    tracing::debug!(
        stack = %stack.name,
        resources = stack.resources.len(),
        outputs = stack.outputs.len(),
        "Parsed stack definition"
    );
    Ok(stack)
}

/// provider ノードをパース
fn parse_provider(node: &KdlNode) -> Result<ProviderConfig> {
    let mut provider = ProviderConfig {
        name: node_label(node, "provider")?,
        ..Default::default()
    };

    for child in child_nodes(node) {
        match node_key(child).as_str() {
            "region" => provider.region = Some(required_string(child, "provider")?),
            "profile" => provider.profile = Some(required_string(child, "provider")?),
            other => return Err(unknown_attribute("provider", other)),
        }
    }

    Ok(provider)
}

/// output ノードをパース
///
/// 例: output "public_ip" { from "app-instance" "public_ip" }
fn parse_output(node: &KdlNode) -> Result<Output> {
    let name = node_label(node, "output")?;
    let mut from: Option<(String, String)> = None;

    for child in child_nodes(node) {
        match node_key(child).as_str() {
            "from" => {
                let args = string_args(child);
                match args.as_slice() {
                    [resource, attribute] => from = Some((resource.clone(), attribute.clone())),
                    _ => {
                        return Err(StackError::InvalidConfig(format!(
                            "output '{}': from requires a resource name and an attribute",
                            name
                        )));
                    }
                }
            }
            other => return Err(unknown_attribute(&name, other)),
        }
    }

    let (resource, attribute) = from.ok_or_else(|| missing_attribute(&name, "from"))?;
    Ok(Output {
        name,
        resource: Reference::new(resource),
        attribute,
    })
}

// ---------------------------------------------------------------------------
// 共通ヘルパー
// ---------------------------------------------------------------------------

/// ノード名（snake_case は kebab-case に正規化）
pub(crate) fn node_key(node: &KdlNode) -> String {
    node.name().value().replace('_', "-")
}

/// 子ノード一覧
pub(crate) fn child_nodes(node: &KdlNode) -> impl Iterator<Item = &KdlNode> {
    node.children()
        .map(|doc| doc.nodes())
        .unwrap_or_default()
        .iter()
}

/// 位置引数の値一覧
pub(crate) fn positional_args(node: &KdlNode) -> impl Iterator<Item = &KdlValue> {
    node.entries()
        .iter()
        .filter(|e| e.name().is_none())
        .map(|e| e.value())
}

/// プロパティ値
pub(crate) fn property<'a>(node: &'a KdlNode, key: &str) -> Option<&'a KdlValue> {
    node.entries()
        .iter()
        .find(|e| e.name().map(|n| n.value()) == Some(key))
        .map(|e| e.value())
}

/// 位置引数の文字列一覧
pub(crate) fn string_args(node: &KdlNode) -> Vec<String> {
    positional_args(node)
        .filter_map(|v| v.as_string().map(|s| s.to_string()))
        .collect()
}

/// リソースノードの名前（最初の引数）
pub(crate) fn node_label(node: &KdlNode, kind: &str) -> Result<String> {
    positional_args(node)
        .next()
        .and_then(|v| v.as_string())
        .map(|s| s.to_string())
        .ok_or_else(|| StackError::InvalidConfig(format!("{} requires a name", kind)))
}

/// 最初の引数を文字列として取得（必須）
pub(crate) fn required_string(node: &KdlNode, resource: &str) -> Result<String> {
    positional_args(node)
        .next()
        .and_then(|v| v.as_string())
        .map(|s| s.to_string())
        .ok_or_else(|| {
            StackError::InvalidConfig(format!(
                "{}: {} requires a string value",
                resource,
                node.name().value()
            ))
        })
}

/// 真偽値を取得（引数なしの場合は true）
pub(crate) fn bool_value(node: &KdlNode, resource: &str) -> Result<bool> {
    match positional_args(node).next() {
        None => Ok(true),
        Some(value) => value.as_bool().ok_or_else(|| {
            StackError::InvalidConfig(format!(
                "{}: {} requires a boolean value (#true / #false)",
                resource,
                node.name().value()
            ))
        }),
    }
}

/// 整数プロパティを取得
pub(crate) fn int_property(node: &KdlNode, key: &str, resource: &str) -> Result<Option<i32>> {
    match property(node, key) {
        None => Ok(None),
        Some(value) => value
            .as_integer()
            .and_then(|v| i32::try_from(v).ok())
            .map(Some)
            .ok_or_else(|| {
                StackError::InvalidConfig(format!(
                    "{}: {}={} is not a valid integer",
                    resource, key, value
                ))
            }),
    }
}

/// tags ブロックをパース
///
/// 例: tags { Name "app-vpc" }
pub(crate) fn parse_tags(node: &KdlNode, resource: &str) -> Result<Tags> {
    let mut tags = Tags::new();
    for child in child_nodes(node) {
        let key = child.name().value().to_string();
        let value = required_string(child, resource)?;
        tags.insert(key, value);
    }
    Ok(tags)
}

pub(crate) fn missing_attribute(resource: &str, attribute: &str) -> StackError {
    StackError::InvalidConfig(format!("{}: {} is required", resource, attribute))
}

pub(crate) fn unknown_attribute(resource: &str, attribute: &str) -> StackError {
    StackError::InvalidConfig(format!("{}: unknown attribute '{}'", resource, attribute))
}
