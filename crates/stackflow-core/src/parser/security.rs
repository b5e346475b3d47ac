//! セキュリティグループノードのパース

use super::{
    child_nodes, int_property, missing_attribute, node_key, node_label, parse_tags,
    positional_args, required_string, unknown_attribute,
};
use crate::error::{Result, StackError};
use crate::model::{ALL_PROTOCOLS, Reference, Resource, SecurityGroup, SecurityRule, Tags};
use kdl::KdlNode;

/// ルールに指定できるプロパティ
const RULE_PROPERTIES: [&str; 3] = ["port", "from", "to"];

/// security-group ノードをパース
pub fn parse_security_group(node: &KdlNode) -> Result<Resource> {
    let name = node_label(node, "security-group")?;
    let mut tags = Tags::new();
    let mut description = None;
    let mut vpc = None;
    let mut ingress = Vec::new();
    let mut egress = Vec::new();

    for child in child_nodes(node) {
        match node_key(child).as_str() {
            "description" => description = Some(required_string(child, &name)?),
            "vpc" => vpc = Some(Reference::new(required_string(child, &name)?)),
            "ingress" => ingress.push(parse_rule(child, &name)?),
            "egress" => egress.push(parse_rule(child, &name)?),
            "tags" => tags = parse_tags(child, &name)?,
            other => return Err(unknown_attribute(&name, other)),
        }
    }

    let group = SecurityGroup {
        // AWS はグループ作成時に説明を必須とする
        description: description.unwrap_or_else(|| format!("Managed by StackFlow: {}", name)),
        vpc: vpc.ok_or_else(|| missing_attribute(&name, "vpc"))?,
        ingress,
        egress,
    };

    Ok(Resource {
        name,
        tags,
        spec: group.into(),
    })
}

/// ingress / egress ルールをパース
///
/// 第1引数がプロトコル、残りの引数がCIDRブロック。
/// ポートは `port=N`（両端）または `from=N to=M` で指定する。
///
/// ```kdl
/// ingress "tcp" "0.0.0.0/0" port=9898
/// egress "-1" "0.0.0.0/0"
/// ```
fn parse_rule(node: &KdlNode, resource: &str) -> Result<SecurityRule> {
    let direction = node.name().value();
    let mut args = positional_args(node);

    let protocol = args
        .next()
        .and_then(|v| v.as_string())
        .map(normalize_protocol)
        .ok_or_else(|| {
            StackError::InvalidConfig(format!("{}: {} requires a protocol", resource, direction))
        })?;

    let cidr_blocks = args
        .map(|v| {
            v.as_string().map(|s| s.to_string()).ok_or_else(|| {
                StackError::InvalidConfig(format!(
                    "{}: {} cidr blocks must be strings",
                    resource, direction
                ))
            })
        })
        .collect::<Result<Vec<_>>>()?;

    if cidr_blocks.is_empty() {
        return Err(StackError::InvalidConfig(format!(
            "{}: {} {} requires at least one cidr block",
            resource, direction, protocol
        )));
    }

    if let Some(key) = node
        .entries()
        .iter()
        .filter_map(|e| e.name().map(|n| n.value()))
        .find(|key| !RULE_PROPERTIES.contains(key))
    {
        return Err(StackError::InvalidConfig(format!(
            "{}: {} has unknown property '{}'",
            resource, direction, key
        )));
    }

    let port = int_property(node, "port", resource)?;
    let from = int_property(node, "from", resource)?.or(port);
    let to = int_property(node, "to", resource)?.or(port);

    // tcp/udp で省略すると 0 番ポートのルールになってしまう
    if from.is_none() && to.is_none() && matches!(protocol.as_str(), "tcp" | "udp") {
        return Err(StackError::InvalidConfig(format!(
            "{}: {} {} requires port=N or from=N to=M",
            resource, direction, protocol
        )));
    }

    let from_port = from.unwrap_or(0);
    let to_port = to.unwrap_or(from_port);

    Ok(SecurityRule {
        protocol,
        from_port,
        to_port,
        cidr_blocks,
    })
}

fn normalize_protocol(protocol: &str) -> String {
    match protocol {
        "all" | "-1" => ALL_PROTOCOLS.to_string(),
        other => other.to_ascii_lowercase(),
    }
}
