//! Conversions between stack resources and EC2 request types

use aws_sdk_ec2::types::{IpPermission, IpRange, ResourceType, Tag, TagSpecification};
use base64::Engine as _;
use base64::engine::general_purpose::STANDARD;
use stackflow_core::{Resource, ResourceSpec, Route, SecurityRule, Tags};

/// EC2 tags from a tag map
pub fn to_tags(tags: &Tags) -> Vec<Tag> {
    tags.iter()
        .map(|(key, value)| Tag::builder().key(key).value(value).build())
        .collect()
}

/// Tag specification applied at creation time
pub fn tag_specification(resource_type: ResourceType, tags: &Tags) -> TagSpecification {
    TagSpecification::builder()
        .resource_type(resource_type)
        .set_tags(Some(to_tags(tags)))
        .build()
}

/// IP permission for one security group rule
///
/// Ports are omitted for the all-traffic protocol.
pub fn ip_permission(rule: &SecurityRule) -> IpPermission {
    let ranges = rule
        .cidr_blocks
        .iter()
        .map(|cidr| IpRange::builder().cidr_ip(cidr).build())
        .collect();

    let builder = IpPermission::builder()
        .ip_protocol(&rule.protocol)
        .set_ip_ranges(Some(ranges));

    if rule.is_all_traffic() {
        builder.build()
    } else {
        builder
            .from_port(rule.from_port)
            .to_port(rule.to_port)
            .build()
    }
}

/// The egress rule every new security group starts with
pub fn default_egress() -> IpPermission {
    ip_permission(&SecurityRule::all_traffic("0.0.0.0/0"))
}

/// Boot script in the encoding RunInstances expects
pub fn encode_user_data(script: &str) -> String {
    STANDARD.encode(script.as_bytes())
}

/// Tag updates needed to go from `old` to `new`
#[derive(Debug, Default, PartialEq, Eq)]
pub struct TagChanges {
    /// Tags to create or overwrite
    pub set: Tags,
    /// Keys to delete
    pub removed: Vec<String>,
}

impl TagChanges {
    pub fn between(old: &Tags, new: &Tags) -> Self {
        let set = new
            .iter()
            .filter(|(key, value)| old.get(*key) != Some(*value))
            .map(|(key, value)| (key.clone(), value.clone()))
            .collect();
        let removed = old
            .keys()
            .filter(|key| !new.contains_key(*key))
            .cloned()
            .collect();
        Self { set, removed }
    }

    pub fn is_empty(&self) -> bool {
        self.set.is_empty() && self.removed.is_empty()
    }
}

/// Items present only in `old` and only in `new`, in their declared order
pub fn list_changes<'a, T: PartialEq>(old: &'a [T], new: &'a [T]) -> (Vec<&'a T>, Vec<&'a T>) {
    let removed = old.iter().filter(|item| !new.contains(item)).collect();
    let added = new.iter().filter(|item| !old.contains(item)).collect();
    (removed, added)
}

/// Routes to delete and create; a route whose gateway changed appears in both
pub fn route_changes<'a>(old: &'a [Route], new: &'a [Route]) -> (Vec<&'a Route>, Vec<&'a Route>) {
    list_changes(old, new)
}

/// Whether EC2 cannot move `previous` to `desired` in place
pub fn requires_replacement(previous: &Resource, desired: &Resource) -> bool {
    match (&previous.spec, &desired.spec) {
        (ResourceSpec::Vpc(a), ResourceSpec::Vpc(b)) => a.cidr_block != b.cidr_block,
        (ResourceSpec::InternetGateway(a), ResourceSpec::InternetGateway(b)) => a.vpc != b.vpc,
        (ResourceSpec::Subnet(a), ResourceSpec::Subnet(b)) => {
            a.vpc != b.vpc
                || a.cidr_block != b.cidr_block
                || a.availability_zone != b.availability_zone
        }
        (ResourceSpec::RouteTable(a), ResourceSpec::RouteTable(b)) => a.vpc != b.vpc,
        (ResourceSpec::RouteTableAssociation(a), ResourceSpec::RouteTableAssociation(b)) => a != b,
        (ResourceSpec::SecurityGroup(a), ResourceSpec::SecurityGroup(b)) => {
            a.vpc != b.vpc || a.description != b.description
        }
        (ResourceSpec::Instance(a), ResourceSpec::Instance(b)) => {
            a.ami != b.ami
                || a.instance_type != b.instance_type
                || a.subnet != b.subnet
                || a.associate_public_ip_address != b.associate_public_ip_address
                || a.user_data != b.user_data
        }
        _ => true,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use stackflow_core::{Instance, Reference, RouteTableAssociation, SecurityGroup, Vpc};

    fn instance() -> Instance {
        Instance {
            ami: "ami-0f673487d7e5f89ca".to_string(),
            instance_type: "t2.micro".to_string(),
            security_groups: vec![Reference::new("app-sg")],
            subnet: Reference::new("app-subnet"),
            associate_public_ip_address: true,
            user_data: None,
        }
    }

    #[test]
    fn test_tcp_rule_permission() {
        let permission = ip_permission(&SecurityRule::tcp(9898, "0.0.0.0/0"));
        assert_eq!(permission.ip_protocol(), Some("tcp"));
        assert_eq!(permission.from_port(), Some(9898));
        assert_eq!(permission.to_port(), Some(9898));
        assert_eq!(permission.ip_ranges().len(), 1);
        assert_eq!(permission.ip_ranges()[0].cidr_ip(), Some("0.0.0.0/0"));
    }

    #[test]
    fn test_all_traffic_permission_has_no_ports() {
        let permission = default_egress();
        assert_eq!(permission.ip_protocol(), Some("-1"));
        assert_eq!(permission.from_port(), None);
        assert_eq!(permission.to_port(), None);
    }

    #[test]
    fn test_tag_specification() {
        let mut tags = Tags::new();
        tags.insert("Name".to_string(), "app-vpc".to_string());
        tags.insert("stackflow:stack".to_string(), "app".to_string());

        let spec = tag_specification(ResourceType::Vpc, &tags);
        assert_eq!(spec.resource_type(), Some(&ResourceType::Vpc));
        let keys: Vec<_> = spec.tags().iter().filter_map(|t| t.key()).collect();
        assert_eq!(keys, vec!["Name", "stackflow:stack"]);
    }

    #[test]
    fn test_user_data_is_base64() {
        assert_eq!(encode_user_data("#!/bin/bash\n"), "IyEvYmluL2Jhc2gK");
    }

    #[test]
    fn test_tag_changes() {
        let mut old = Tags::new();
        old.insert("Name".to_string(), "app".to_string());
        old.insert("Env".to_string(), "dev".to_string());
        let mut new = Tags::new();
        new.insert("Name".to_string(), "app-vpc".to_string());
        new.insert("Team".to_string(), "platform".to_string());

        let changes = TagChanges::between(&old, &new);
        assert_eq!(changes.set.len(), 2);
        assert_eq!(changes.set["Name"], "app-vpc");
        assert_eq!(changes.removed, vec!["Env".to_string()]);
        assert!(TagChanges::between(&new, &new).is_empty());
    }

    #[test]
    fn test_route_with_new_gateway_is_recreated() {
        let old = vec![Route {
            destination_cidr_block: "0.0.0.0/0".to_string(),
            gateway: Reference::new("old-gateway"),
        }];
        let new = vec![Route {
            destination_cidr_block: "0.0.0.0/0".to_string(),
            gateway: Reference::new("app-gateway"),
        }];

        let (removed, added) = route_changes(&old, &new);
        assert_eq!(removed, vec![&old[0]]);
        assert_eq!(added, vec![&new[0]]);
    }

    #[test]
    fn test_rule_changes_keep_unchanged_rules() {
        let old = vec![
            SecurityRule::tcp(22, "0.0.0.0/0"),
            SecurityRule::tcp(80, "0.0.0.0/0"),
        ];
        let new = vec![
            SecurityRule::tcp(80, "0.0.0.0/0"),
            SecurityRule::tcp(9898, "0.0.0.0/0"),
        ];

        let (removed, added) = list_changes(&old, &new);
        assert_eq!(removed, vec![&old[0]]);
        assert_eq!(added, vec![&new[1]]);
    }

    #[test]
    fn test_vpc_replacement_triggers() {
        let base = Resource::new("app-vpc", Vpc::new("10.0.0.0/16"));

        let mut dns = Vpc::new("10.0.0.0/16");
        dns.enable_dns_hostnames = true;
        assert!(!requires_replacement(&base, &Resource::new("app-vpc", dns)));

        let moved = Resource::new("app-vpc", Vpc::new("10.1.0.0/16"));
        assert!(requires_replacement(&base, &moved));
    }

    #[test]
    fn test_instance_replacement_triggers() {
        let base = Resource::new("app-instance", instance());

        let mut groups = instance();
        groups.security_groups.push(Reference::new("admin-sg"));
        assert!(!requires_replacement(
            &base,
            &Resource::new("app-instance", groups)
        ));

        let tagged = base.clone().with_tag("Name", "app-instance");
        assert!(!requires_replacement(&base, &tagged));

        let mut resized = instance();
        resized.instance_type = "t3.small".to_string();
        assert!(requires_replacement(
            &base,
            &Resource::new("app-instance", resized)
        ));

        let mut script = instance();
        script.user_data = Some(stackflow_core::UserData::Inline("echo hi".to_string()));
        assert!(requires_replacement(
            &base,
            &Resource::new("app-instance", script)
        ));
    }

    #[test]
    fn test_security_group_description_forces_replacement() {
        let group = |description: &str| {
            Resource::new(
                "app-sg",
                SecurityGroup {
                    description: description.to_string(),
                    vpc: Reference::new("app-vpc"),
                    ingress: vec![],
                    egress: vec![],
                },
            )
        };
        assert!(requires_replacement(&group("a"), &group("b")));

        let mut with_rule = group("a");
        if let ResourceSpec::SecurityGroup(sg) = &mut with_rule.spec {
            sg.ingress.push(SecurityRule::tcp(22, "0.0.0.0/0"));
        }
        assert!(!requires_replacement(&group("a"), &with_rule));
    }

    #[test]
    fn test_association_change_always_replaces() {
        let association = |subnet: &str| {
            Resource::new(
                "assoc",
                RouteTableAssociation {
                    route_table: Reference::new("app-route-table"),
                    subnet: Reference::new(subnet),
                },
            )
        };
        assert!(requires_replacement(
            &association("a"),
            &association("b")
        ));
    }

    #[test]
    fn test_kind_change_replaces() {
        let vpc = Resource::new("x", Vpc::new("10.0.0.0/16"));
        let igw = Resource::new(
            "x",
            stackflow_core::InternetGateway {
                vpc: Reference::new("app-vpc"),
            },
        );
        assert!(requires_replacement(&vpc, &igw));
    }
}
