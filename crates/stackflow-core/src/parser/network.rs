//! ネットワークリソースノードのパース

use super::{
    bool_value, child_nodes, missing_attribute, node_key, node_label, parse_tags, property,
    required_string, string_args, unknown_attribute,
};
use crate::error::{Result, StackError};
use crate::model::{
    InternetGateway, Reference, Resource, Route, RouteTable, RouteTableAssociation, Subnet, Tags,
    Vpc,
};
use kdl::KdlNode;

/// vpc ノードをパース
pub fn parse_vpc(node: &KdlNode) -> Result<Resource> {
    let name = node_label(node, "vpc")?;
    let mut tags = Tags::new();
    let mut cidr_block = None;
    let mut enable_dns_hostnames = false;
    let mut enable_dns_support = true;

    for child in child_nodes(node) {
        match node_key(child).as_str() {
            "cidr-block" => cidr_block = Some(required_string(child, &name)?),
            "enable-dns-hostnames" => enable_dns_hostnames = bool_value(child, &name)?,
            "enable-dns-support" => enable_dns_support = bool_value(child, &name)?,
            "tags" => tags = parse_tags(child, &name)?,
            other => return Err(unknown_attribute(&name, other)),
        }
    }

    let vpc = Vpc {
        cidr_block: cidr_block.ok_or_else(|| missing_attribute(&name, "cidr-block"))?,
        enable_dns_hostnames,
        enable_dns_support,
    };

    Ok(Resource {
        name,
        tags,
        spec: vpc.into(),
    })
}

/// internet-gateway ノードをパース
pub fn parse_internet_gateway(node: &KdlNode) -> Result<Resource> {
    let name = node_label(node, "internet-gateway")?;
    let mut tags = Tags::new();
    let mut vpc = None;

    for child in child_nodes(node) {
        match node_key(child).as_str() {
            "vpc" => vpc = Some(Reference::new(required_string(child, &name)?)),
            "tags" => tags = parse_tags(child, &name)?,
            other => return Err(unknown_attribute(&name, other)),
        }
    }

    let gateway = InternetGateway {
        vpc: vpc.ok_or_else(|| missing_attribute(&name, "vpc"))?,
    };

    Ok(Resource {
        name,
        tags,
        spec: gateway.into(),
    })
}

/// subnet ノードをパース
pub fn parse_subnet(node: &KdlNode) -> Result<Resource> {
    let name = node_label(node, "subnet")?;
    let mut tags = Tags::new();
    let mut vpc = None;
    let mut cidr_block = None;
    let mut availability_zone = None;
    let mut map_public_ip_on_launch = false;

    for child in child_nodes(node) {
        match node_key(child).as_str() {
            "vpc" => vpc = Some(Reference::new(required_string(child, &name)?)),
            "cidr-block" => cidr_block = Some(required_string(child, &name)?),
            "availability-zone" => availability_zone = Some(required_string(child, &name)?),
            "map-public-ip-on-launch" => map_public_ip_on_launch = bool_value(child, &name)?,
            "tags" => tags = parse_tags(child, &name)?,
            other => return Err(unknown_attribute(&name, other)),
        }
    }

    let subnet = Subnet {
        vpc: vpc.ok_or_else(|| missing_attribute(&name, "vpc"))?,
        cidr_block: cidr_block.ok_or_else(|| missing_attribute(&name, "cidr-block"))?,
        availability_zone: availability_zone
            .ok_or_else(|| missing_attribute(&name, "availability-zone"))?,
        map_public_ip_on_launch,
    };

    Ok(Resource {
        name,
        tags,
        spec: subnet.into(),
    })
}

/// route-table ノードをパース
///
/// 例: route "0.0.0.0/0" gateway="app-gateway"
pub fn parse_route_table(node: &KdlNode) -> Result<Resource> {
    let name = node_label(node, "route-table")?;
    let mut tags = Tags::new();
    let mut vpc = None;
    let mut routes = Vec::new();

    for child in child_nodes(node) {
        match node_key(child).as_str() {
            "vpc" => vpc = Some(Reference::new(required_string(child, &name)?)),
            "route" => routes.push(parse_route(child, &name)?),
            "tags" => tags = parse_tags(child, &name)?,
            other => return Err(unknown_attribute(&name, other)),
        }
    }

    let table = RouteTable {
        vpc: vpc.ok_or_else(|| missing_attribute(&name, "vpc"))?,
        routes,
    };

    Ok(Resource {
        name,
        tags,
        spec: table.into(),
    })
}

fn parse_route(node: &KdlNode, resource: &str) -> Result<Route> {
    let destination_cidr_block = string_args(node).into_iter().next().ok_or_else(|| {
        StackError::InvalidConfig(format!("{}: route requires a destination block", resource))
    })?;

    let gateway = property(node, "gateway")
        .and_then(|v| v.as_string())
        .ok_or_else(|| {
            StackError::InvalidConfig(format!(
                "{}: route {} requires gateway=\"<name>\"",
                resource, destination_cidr_block
            ))
        })?;

    Ok(Route {
        destination_cidr_block,
        gateway: Reference::new(gateway),
    })
}

/// route-table-association ノードをパース
pub fn parse_route_table_association(node: &KdlNode) -> Result<Resource> {
    let name = node_label(node, "route-table-association")?;
    let mut route_table = None;
    let mut subnet = None;

    for child in child_nodes(node) {
        match node_key(child).as_str() {
            "route-table" => route_table = Some(Reference::new(required_string(child, &name)?)),
            "subnet" => subnet = Some(Reference::new(required_string(child, &name)?)),
            other => return Err(unknown_attribute(&name, other)),
        }
    }

    let association = RouteTableAssociation {
        route_table: route_table.ok_or_else(|| missing_attribute(&name, "route-table"))?,
        subnet: subnet.ok_or_else(|| missing_attribute(&name, "subnet"))?,
    };

    // 関連付けはタグを持たない
    Ok(Resource {
        name,
        tags: Tags::new(),
        spec: association.into(),
    })
}
