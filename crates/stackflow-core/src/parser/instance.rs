//! instance ノードのパース

use super::{
    bool_value, child_nodes, missing_attribute, node_key, node_label, parse_tags,
    required_string, string_args, unknown_attribute,
};
use crate::error::{Result, StackError};
use crate::model::{Instance, Reference, Resource, Tags, UserData};
use kdl::KdlNode;
use std::path::PathBuf;

/// instance ノードをパース
pub fn parse_instance(node: &KdlNode) -> Result<Resource> {
    let name = node_label(node, "instance")?;
    let mut tags = Tags::new();
    let mut ami = None;
    let mut instance_type = None;
    let mut security_groups = Vec::new();
    let mut subnet = None;
    let mut associate_public_ip_address = false;
    let mut user_data = None;

    for child in child_nodes(node) {
        match node_key(child).as_str() {
            "ami" => ami = Some(required_string(child, &name)?),
            "instance-type" => instance_type = Some(required_string(child, &name)?),
            "security-groups" | "security-group" | "vpc-security-group-ids" => {
                // 複数のセキュリティグループを引数として受け取る
                security_groups.extend(string_args(child).into_iter().map(Reference::new));
            }
            "subnet" => subnet = Some(Reference::new(required_string(child, &name)?)),
            "associate-public-ip-address" => {
                associate_public_ip_address = bool_value(child, &name)?
            }
            "user-data" => {
                if user_data.is_some() {
                    return Err(duplicate_user_data(&name));
                }
                user_data = Some(UserData::Inline(required_string(child, &name)?));
            }
            "user-data-file" => {
                if user_data.is_some() {
                    return Err(duplicate_user_data(&name));
                }
                user_data = Some(UserData::File(PathBuf::from(required_string(
                    child, &name,
                )?)));
            }
            "tags" => tags = parse_tags(child, &name)?,
            other => return Err(unknown_attribute(&name, other)),
        }
    }

    let instance = Instance {
        ami: ami.ok_or_else(|| missing_attribute(&name, "ami"))?,
        instance_type: instance_type.ok_or_else(|| missing_attribute(&name, "instance-type"))?,
        security_groups,
        subnet: subnet.ok_or_else(|| missing_attribute(&name, "subnet"))?,
        associate_public_ip_address,
        user_data,
    };

    Ok(Resource {
        name,
        tags,
        spec: instance.into(),
    })
}

fn duplicate_user_data(resource: &str) -> StackError {
    StackError::InvalidConfig(format!(
        "{}: specify either user-data or user-data-file, not both",
        resource
    ))
}
