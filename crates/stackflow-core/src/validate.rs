//! スタック定義の構造検証と依存順序の計算
//!
//! 検証は全ての問題を収集してから [`StackError::Validation`] として返す。

use crate::cidr::Ipv4Cidr;
use crate::error::{Result, StackError, ValidationIssue};
use crate::model::{Resource, ResourceKind, ResourceSpec, SecurityRule, Stack};
use std::collections::{HashMap, HashSet};
use tracing::debug;

/// プロトコルとして受け付ける値
const PROTOCOLS: &[&str] = &["tcp", "udp", "icmp", "-1"];

/// 依存関係を満たす作成順（論理名）
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DependencyOrder(Vec<String>);

impl DependencyOrder {
    /// 作成順
    pub fn iter(&self) -> impl DoubleEndedIterator<Item = &str> {
        self.0.iter().map(|s| s.as_str())
    }

    pub fn position(&self, name: &str) -> Option<usize> {
        self.0.iter().position(|n| n == name)
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }
}

/// スタックを検証し、依存順序を返す
pub fn validate_stack(stack: &Stack) -> Result<DependencyOrder> {
    let mut issues = Vec::new();

    check_names(stack, &mut issues);
    check_references(stack, &mut issues);
    check_network(stack, &mut issues);
    check_security_groups(stack, &mut issues);
    check_instances(stack, &mut issues);
    check_outputs(stack, &mut issues);

    if !issues.is_empty() {
        debug!(count = issues.len(), "Stack validation failed");
        return Err(StackError::Validation { issues });
    }

    dependency_order(stack)
}

/// 依存順序を計算（Kahnのアルゴリズム、同順位は宣言順）
///
/// 未宣言の参照は無視する（検出は [`validate_stack`] の責務）。
pub fn dependency_order(stack: &Stack) -> Result<DependencyOrder> {
    let names: HashSet<&str> = stack.resources.iter().map(|r| r.name.as_str()).collect();

    let mut in_degree: HashMap<&str, usize> = HashMap::new();
    let mut dependents: HashMap<&str, Vec<&str>> = HashMap::new();
    for resource in &stack.resources {
        let deps: Vec<&str> = resource
            .dependencies()
            .into_iter()
            .filter(|d| names.contains(d))
            .collect();
        in_degree.insert(resource.name.as_str(), deps.len());
        for dep in deps {
            dependents.entry(dep).or_default().push(resource.name.as_str());
        }
    }

    let mut order: Vec<String> = Vec::with_capacity(stack.resources.len());
    let mut done: HashSet<&str> = HashSet::new();

    // 宣言順に走査し、依存が解決済みのものから確定させる
    while order.len() < stack.resources.len() {
        let next = stack
            .resources
            .iter()
            .map(|r| r.name.as_str())
            .find(|name| !done.contains(name) && in_degree.get(name) == Some(&0));

        let Some(name) = next else {
            let remaining: Vec<&str> = stack
                .resources
                .iter()
                .map(|r| r.name.as_str())
                .filter(|name| !done.contains(name))
                .collect();
            return Err(StackError::CircularDependency(remaining.join(" -> ")));
        };

        done.insert(name);
        order.push(name.to_string());
        for dependent in dependents.get(name).into_iter().flatten() {
            if let Some(degree) = in_degree.get_mut(dependent) {
                *degree = degree.saturating_sub(1);
            }
        }
    }

    Ok(DependencyOrder(order))
}

fn check_names(stack: &Stack, issues: &mut Vec<ValidationIssue>) {
    let mut seen = HashSet::new();
    for resource in &stack.resources {
        if resource.name.trim().is_empty() {
            issues.push(ValidationIssue::new("stack", "resource name must not be empty"));
        }
        if !seen.insert(resource.name.as_str()) {
            issues.push(ValidationIssue::new(
                &resource.name,
                "resource name is declared more than once",
            ));
        }
    }

    let mut outputs = HashSet::new();
    for output in &stack.outputs {
        if !outputs.insert(output.name.as_str()) {
            issues.push(ValidationIssue::new(
                &output.name,
                "output is declared more than once",
            ));
        }
    }
}

fn check_references(stack: &Stack, issues: &mut Vec<ValidationIssue>) {
    for resource in &stack.resources {
        for reference in resource.spec.references() {
            match stack.get(reference.target.name()) {
                None => issues.push(ValidationIssue::new(
                    &resource.name,
                    format!(
                        "{} refers to undeclared resource '{}'",
                        reference.attribute, reference.target
                    ),
                )),
                Some(target) if target.kind() != reference.expected => {
                    issues.push(ValidationIssue::new(
                        &resource.name,
                        format!(
                            "{} must refer to a {}, but '{}' is a {}",
                            reference.attribute,
                            reference.expected,
                            reference.target,
                            target.kind()
                        ),
                    ))
                }
                Some(_) => {}
            }
        }
    }
}

/// CIDRをパースし、失敗したら問題として記録
fn parse_cidr(
    resource: &str,
    attribute: &str,
    value: &str,
    issues: &mut Vec<ValidationIssue>,
) -> Option<Ipv4Cidr> {
    match value.parse::<Ipv4Cidr>() {
        Ok(cidr) => Some(cidr),
        Err(e) => {
            issues.push(ValidationIssue::new(resource, format!("{}: {}", attribute, e)));
            None
        }
    }
}

fn vpc_block(stack: &Stack, name: &str) -> Option<Ipv4Cidr> {
    match stack.get(name).map(|r| &r.spec) {
        Some(ResourceSpec::Vpc(vpc)) => vpc.cidr_block.parse().ok(),
        _ => None,
    }
}

fn check_network(stack: &Stack, issues: &mut Vec<ValidationIssue>) {
    let region = stack.provider.region.as_deref();
    // VPCごとのサブネットブロック（重複検出用）
    let mut subnet_blocks: HashMap<&str, Vec<(&str, Ipv4Cidr)>> = HashMap::new();
    let mut associated_subnets: HashMap<&str, &str> = HashMap::new();

    for resource in &stack.resources {
        let name = resource.name.as_str();
        match &resource.spec {
            ResourceSpec::Vpc(vpc) => {
                parse_cidr(name, "cidr-block", &vpc.cidr_block, issues);
                if vpc.enable_dns_hostnames && !vpc.enable_dns_support {
                    issues.push(ValidationIssue::new(
                        name,
                        "enable-dns-hostnames requires enable-dns-support",
                    ));
                }
            }
            ResourceSpec::Subnet(subnet) => {
                if let Some(block) = parse_cidr(name, "cidr-block", &subnet.cidr_block, issues) {
                    if let Some(network) = vpc_block(stack, subnet.vpc.name()) {
                        if !network.contains(&block) {
                            issues.push(ValidationIssue::new(
                                name,
                                format!(
                                    "cidr-block {} is not inside {} of vpc '{}'",
                                    block, network, subnet.vpc
                                ),
                            ));
                        }
                    }

                    let siblings = subnet_blocks.entry(subnet.vpc.name()).or_default();
                    for (other, other_block) in siblings.iter() {
                        if other_block.overlaps(&block) {
                            issues.push(ValidationIssue::new(
                                name,
                                format!("cidr-block {} overlaps subnet '{}'", block, other),
                            ));
                        }
                    }
                    siblings.push((name, block));
                }

                if let Some(region) = region {
                    let az = subnet.availability_zone.as_str();
                    if !(az.starts_with(region) && az.len() > region.len()) {
                        issues.push(ValidationIssue::new(
                            name,
                            format!(
                                "availability-zone {} is not in region {}",
                                az, region
                            ),
                        ));
                    }
                }
            }
            ResourceSpec::RouteTable(table) => {
                let mut destinations = HashSet::new();
                for route in &table.routes {
                    parse_cidr(name, "route", &route.destination_cidr_block, issues);
                    if !destinations.insert(route.destination_cidr_block.as_str()) {
                        issues.push(ValidationIssue::new(
                            name,
                            format!(
                                "route {} is declared more than once",
                                route.destination_cidr_block
                            ),
                        ));
                    }
                }
                check_same_vpc(stack, resource, issues);
            }
            ResourceSpec::RouteTableAssociation(assoc) => {
                if let Some(previous) = associated_subnets.insert(assoc.subnet.name(), name) {
                    issues.push(ValidationIssue::new(
                        name,
                        format!(
                            "subnet '{}' is already associated by '{}'",
                            assoc.subnet, previous
                        ),
                    ));
                }
                check_same_vpc(stack, resource, issues);
            }
            _ => {}
        }
    }
}

/// 参照先が属するVPC
fn vpc_of<'a>(stack: &'a Stack, name: &str) -> Option<&'a str> {
    match stack.get(name).map(|r| &r.spec) {
        Some(ResourceSpec::Vpc(_)) => Some(stack.get(name)?.name.as_str()),
        Some(ResourceSpec::InternetGateway(igw)) => Some(igw.vpc.name()),
        Some(ResourceSpec::Subnet(subnet)) => Some(subnet.vpc.name()),
        Some(ResourceSpec::RouteTable(table)) => Some(table.vpc.name()),
        Some(ResourceSpec::SecurityGroup(group)) => Some(group.vpc.name()),
        _ => None,
    }
}

/// ネットワーク参照が全て同じVPCに属することを確認
fn check_same_vpc(stack: &Stack, resource: &Resource, issues: &mut Vec<ValidationIssue>) {
    let vpcs: Vec<(&str, &str)> = resource
        .spec
        .references()
        .iter()
        .filter_map(|r| vpc_of(stack, r.target.name()).map(|vpc| (r.target.name(), vpc)))
        .collect();

    if let Some((_, first)) = vpcs.first() {
        for (target, vpc) in &vpcs {
            if vpc != first {
                issues.push(ValidationIssue::new(
                    &resource.name,
                    format!("'{}' belongs to vpc '{}', expected '{}'", target, vpc, first),
                ));
            }
        }
    }
}

fn check_rule(
    resource: &str,
    direction: &str,
    rule: &SecurityRule,
    issues: &mut Vec<ValidationIssue>,
) {
    if !PROTOCOLS.contains(&rule.protocol.as_str()) {
        issues.push(ValidationIssue::new(
            resource,
            format!(
                "{} protocol '{}' must be one of tcp, udp, icmp, -1",
                direction, rule.protocol
            ),
        ));
        return;
    }

    match rule.protocol.as_str() {
        "-1" => {
            if rule.from_port != 0 || rule.to_port != 0 {
                issues.push(ValidationIssue::new(
                    resource,
                    format!("{} all-traffic rule must use ports 0-0", direction),
                ));
            }
        }
        "icmp" => {
            // ICMP では from/to が type/code を表す（-1 は全て）
            if !(-1..=255).contains(&rule.from_port) || !(-1..=255).contains(&rule.to_port) {
                issues.push(ValidationIssue::new(
                    resource,
                    format!("{} icmp type/code must be -1..255", direction),
                ));
            }
        }
        _ => {
            let valid = (0..=65535).contains(&rule.from_port)
                && (0..=65535).contains(&rule.to_port)
                && rule.from_port <= rule.to_port;
            if !valid {
                issues.push(ValidationIssue::new(
                    resource,
                    format!(
                        "{} port range {}-{} is invalid",
                        direction, rule.from_port, rule.to_port
                    ),
                ));
            }
        }
    }

    for block in &rule.cidr_blocks {
        parse_cidr(resource, direction, block, issues);
    }
}

fn check_security_groups(stack: &Stack, issues: &mut Vec<ValidationIssue>) {
    for resource in stack.resources_of(ResourceKind::SecurityGroup) {
        if let ResourceSpec::SecurityGroup(group) = &resource.spec {
            if group.description.trim().is_empty() {
                issues.push(ValidationIssue::new(
                    &resource.name,
                    "description must not be empty",
                ));
            }
            for rule in &group.ingress {
                check_rule(&resource.name, "ingress", rule, issues);
            }
            for rule in &group.egress {
                check_rule(&resource.name, "egress", rule, issues);
            }
        }
    }
}

fn check_instances(stack: &Stack, issues: &mut Vec<ValidationIssue>) {
    for resource in stack.resources_of(ResourceKind::Instance) {
        if let ResourceSpec::Instance(instance) = &resource.spec {
            if !instance.ami.starts_with("ami-") {
                issues.push(ValidationIssue::new(
                    &resource.name,
                    format!("ami '{}' is not an image identifier (ami-...)", instance.ami),
                ));
            }
            if instance.instance_type.trim().is_empty() {
                issues.push(ValidationIssue::new(
                    &resource.name,
                    "instance-type must not be empty",
                ));
            }
            check_same_vpc(stack, resource, issues);
        }
    }
}

fn check_outputs(stack: &Stack, issues: &mut Vec<ValidationIssue>) {
    for output in &stack.outputs {
        match stack.get(output.resource.name()) {
            None => issues.push(ValidationIssue::new(
                &output.name,
                format!("output refers to undeclared resource '{}'", output.resource),
            )),
            Some(resource) => {
                let attributes = resource.kind().output_attributes();
                if !attributes.contains(&output.attribute.as_str()) {
                    issues.push(ValidationIssue::new(
                        &output.name,
                        format!(
                            "{} '{}' has no attribute '{}' (available: {})",
                            resource.kind(),
                            resource.name,
                            output.attribute,
                            attributes.join(", ")
                        ),
                    ));
                }
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::{
        Instance, InternetGateway, Output, Reference, Route, RouteTable, RouteTableAssociation,
        SecurityGroup, Subnet, Vpc,
    };

    fn app_stack() -> Stack {
        let mut stack = Stack::new("app");
        stack.provider.region = Some("eu-central-1".to_string());
        stack.resources = vec![
            Resource::new("app-vpc", Vpc::new("10.0.0.0/16")),
            Resource::new(
                "app-gateway",
                InternetGateway {
                    vpc: Reference::new("app-vpc"),
                },
            ),
            Resource::new(
                "app-subnet",
                Subnet {
                    vpc: Reference::new("app-vpc"),
                    cidr_block: "10.0.1.0/24".to_string(),
                    availability_zone: "eu-central-1a".to_string(),
                    map_public_ip_on_launch: true,
                },
            ),
            Resource::new(
                "app-route-table",
                RouteTable {
                    vpc: Reference::new("app-vpc"),
                    routes: vec![Route {
                        destination_cidr_block: "0.0.0.0/0".to_string(),
                        gateway: Reference::new("app-gateway"),
                    }],
                },
            ),
            Resource::new(
                "app-route-table-assoc",
                RouteTableAssociation {
                    route_table: Reference::new("app-route-table"),
                    subnet: Reference::new("app-subnet"),
                },
            ),
            Resource::new(
                "app-sg",
                SecurityGroup {
                    description: "Allow access to My App".to_string(),
                    vpc: Reference::new("app-vpc"),
                    ingress: vec![
                        SecurityRule::tcp(80, "0.0.0.0/0"),
                        SecurityRule::tcp(22, "0.0.0.0/0"),
                        SecurityRule::tcp(9898, "0.0.0.0/0"),
                    ],
                    egress: vec![SecurityRule::all_traffic("0.0.0.0/0")],
                },
            ),
            Resource::new(
                "app-instance",
                Instance {
                    ami: "ami-0f673487d7e5f89ca".to_string(),
                    instance_type: "t2.micro".to_string(),
                    security_groups: vec![Reference::new("app-sg")],
                    subnet: Reference::new("app-subnet"),
                    associate_public_ip_address: true,
                    user_data: None,
                },
            ),
        ];
        stack.outputs = vec![Output {
            name: "public_ip".to_string(),
            resource: Reference::new("app-instance"),
            attribute: "public_ip".to_string(),
        }];
        stack
    }

    fn issues(stack: &Stack) -> Vec<String> {
        match validate_stack(stack) {
            Err(StackError::Validation { issues }) => {
                issues.into_iter().map(|i| i.to_string()).collect()
            }
            Err(e) => panic!("unexpected error: {}", e),
            Ok(_) => Vec::new(),
        }
    }

    fn spec_mut<'a>(stack: &'a mut Stack, name: &str) -> &'a mut ResourceSpec {
        &mut stack
            .resources
            .iter_mut()
            .find(|r| r.name == name)
            .unwrap()
            .spec
    }

    #[test]
    fn test_valid_stack() {
        let order = validate_stack(&app_stack()).unwrap();
        assert_eq!(order.len(), 7);
    }

    #[test]
    fn test_dependency_order_respects_references() {
        let stack = app_stack();
        let order = dependency_order(&stack).unwrap();

        for resource in &stack.resources {
            let pos = order.position(&resource.name).unwrap();
            for dep in resource.dependencies() {
                assert!(
                    order.position(dep).unwrap() < pos,
                    "{} must come before {}",
                    dep,
                    resource.name
                );
            }
        }
    }

    #[test]
    fn test_dependency_order_for_reversed_declarations() {
        let mut stack = app_stack();
        stack.resources.reverse();

        let order = dependency_order(&stack).unwrap();
        let names: Vec<_> = order.iter().collect();
        assert_eq!(names.first(), Some(&"app-vpc"));
        // 依存が解決した時点で宣言順の早いものが先に来る
        assert_eq!(names.get(1), Some(&"app-sg"));
    }

    #[test]
    fn test_undeclared_reference() {
        let mut stack = app_stack();
        if let ResourceSpec::Instance(instance) = spec_mut(&mut stack, "app-instance") {
            instance.subnet = Reference::new("missing-subnet");
        }

        let found = issues(&stack);
        assert!(found
            .iter()
            .any(|i| i.contains("undeclared resource 'missing-subnet'")));
    }

    #[test]
    fn test_reference_of_wrong_kind() {
        let mut stack = app_stack();
        if let ResourceSpec::RouteTableAssociation(assoc) =
            spec_mut(&mut stack, "app-route-table-assoc")
        {
            assoc.subnet = Reference::new("app-vpc");
        }

        let found = issues(&stack);
        assert!(found
            .iter()
            .any(|i| i.contains("subnet must refer to a subnet, but 'app-vpc' is a vpc")));
    }

    #[test]
    fn test_subnet_outside_vpc() {
        let mut stack = app_stack();
        if let ResourceSpec::Subnet(subnet) = spec_mut(&mut stack, "app-subnet") {
            subnet.cidr_block = "10.1.1.0/24".to_string();
        }

        let found = issues(&stack);
        assert!(found.iter().any(|i| i.contains("is not inside 10.0.0.0/16")));
    }

    #[test]
    fn test_overlapping_subnets() {
        let mut stack = app_stack();
        stack.resources.push(Resource::new(
            "other-subnet",
            Subnet {
                vpc: Reference::new("app-vpc"),
                cidr_block: "10.0.1.128/25".to_string(),
                availability_zone: "eu-central-1b".to_string(),
                map_public_ip_on_launch: false,
            },
        ));

        let found = issues(&stack);
        assert!(found.iter().any(|i| i.contains("overlaps subnet 'app-subnet'")));
    }

    #[test]
    fn test_malformed_cidr() {
        let mut stack = app_stack();
        if let ResourceSpec::Vpc(vpc) = spec_mut(&mut stack, "app-vpc") {
            vpc.cidr_block = "10.0.0.0/40".to_string();
        }

        let found = issues(&stack);
        assert!(found.iter().any(|i| i.starts_with("app-vpc: cidr-block")));
    }

    #[test]
    fn test_availability_zone_outside_region() {
        let mut stack = app_stack();
        if let ResourceSpec::Subnet(subnet) = spec_mut(&mut stack, "app-subnet") {
            subnet.availability_zone = "us-east-1a".to_string();
        }

        let found = issues(&stack);
        assert!(found
            .iter()
            .any(|i| i.contains("availability-zone us-east-1a is not in region eu-central-1")));
    }

    #[test]
    fn test_invalid_rules() {
        let mut stack = app_stack();
        if let ResourceSpec::SecurityGroup(group) = spec_mut(&mut stack, "app-sg") {
            group.ingress.push(SecurityRule {
                protocol: "tcp".to_string(),
                from_port: 90,
                to_port: 80,
                cidr_blocks: vec!["0.0.0.0/0".to_string()],
            });
            group.ingress.push(SecurityRule {
                protocol: "sctp".to_string(),
                from_port: 1,
                to_port: 1,
                cidr_blocks: vec!["0.0.0.0/0".to_string()],
            });
            group.egress.push(SecurityRule {
                protocol: "-1".to_string(),
                from_port: 0,
                to_port: 65535,
                cidr_blocks: vec!["0.0.0.0/0".to_string()],
            });
        }

        let found = issues(&stack);
        assert_eq!(found.len(), 3, "{:?}", found);
        assert!(found.iter().any(|i| i.contains("port range 90-80 is invalid")));
        assert!(found.iter().any(|i| i.contains("protocol 'sctp'")));
        assert!(found.iter().any(|i| i.contains("all-traffic rule must use ports 0-0")));
    }

    #[test]
    fn test_duplicate_names() {
        let mut stack = app_stack();
        stack
            .resources
            .push(Resource::new("app-vpc", Vpc::new("10.1.0.0/16")));

        let found = issues(&stack);
        assert!(found
            .iter()
            .any(|i| i == "app-vpc: resource name is declared more than once"));
    }

    #[test]
    fn test_subnet_associated_twice() {
        let mut stack = app_stack();
        stack.resources.push(Resource::new(
            "second-assoc",
            RouteTableAssociation {
                route_table: Reference::new("app-route-table"),
                subnet: Reference::new("app-subnet"),
            },
        ));

        let found = issues(&stack);
        assert!(found.iter().any(|i| i.contains("already associated")));
    }

    #[test]
    fn test_instance_across_vpcs() {
        let mut stack = app_stack();
        stack
            .resources
            .push(Resource::new("other-vpc", Vpc::new("10.1.0.0/16")));
        if let ResourceSpec::SecurityGroup(group) = spec_mut(&mut stack, "app-sg") {
            group.vpc = Reference::new("other-vpc");
        }

        let found = issues(&stack);
        assert!(found
            .iter()
            .any(|i| i.contains("'app-sg' belongs to vpc 'other-vpc'")));
    }

    #[test]
    fn test_unknown_output_attribute() {
        let mut stack = app_stack();
        stack.outputs[0].attribute = "mac_address".to_string();

        let found = issues(&stack);
        assert!(found.iter().any(|i| i.contains("no attribute 'mac_address'")));
    }

    #[test]
    fn test_output_to_undeclared_resource() {
        let mut stack = app_stack();
        stack.outputs[0].resource = Reference::new("ghost");

        let found = issues(&stack);
        assert!(found.iter().any(|i| i.contains("undeclared resource 'ghost'")));
    }

    #[test]
    fn test_all_issues_are_collected() {
        let mut stack = app_stack();
        if let ResourceSpec::Instance(instance) = spec_mut(&mut stack, "app-instance") {
            instance.ami = "ubuntu".to_string();
        }
        stack.outputs[0].attribute = "nope".to_string();

        assert_eq!(issues(&stack).len(), 2);
    }

    #[test]
    fn test_cycle_detected() {
        // 参照の種類は不正だが、循環の検出自体は依存順序計算が行う
        let mut stack = Stack::new("cycle");
        stack.resources = vec![
            Resource::new(
                "a",
                InternetGateway {
                    vpc: Reference::new("b"),
                },
            ),
            Resource::new(
                "b",
                InternetGateway {
                    vpc: Reference::new("a"),
                },
            ),
        ];

        let err = dependency_order(&stack).unwrap_err();
        assert!(matches!(err, StackError::CircularDependency(_)));
    }
}
