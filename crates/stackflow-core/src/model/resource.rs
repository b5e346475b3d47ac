//! クラウドリソースモデル
//!
//! スタックで宣言するリソース（VPC、サブネット、ルーティング、セキュリティグループ、
//! インスタンス）の定義。各リソースはリテラル値と他リソースへの参照だけを持つ。

use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fmt;
use std::path::PathBuf;

/// リソースに付与するタグ
pub type Tags = BTreeMap<String, String>;

/// 同じスタック内の別リソースへの参照（論理名）
///
/// 適用時にプロバイダーが払い出したIDに解決される。
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Reference(String);

impl Reference {
    pub fn new(name: impl Into<String>) -> Self {
        Self(name.into())
    }

    pub fn name(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for Reference {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// リソースの種類
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum ResourceKind {
    Vpc,
    InternetGateway,
    Subnet,
    RouteTable,
    RouteTableAssociation,
    SecurityGroup,
    Instance,
}

impl ResourceKind {
    /// KDLのノード名
    pub fn as_str(&self) -> &'static str {
        match self {
            ResourceKind::Vpc => "vpc",
            ResourceKind::InternetGateway => "internet-gateway",
            ResourceKind::Subnet => "subnet",
            ResourceKind::RouteTable => "route-table",
            ResourceKind::RouteTableAssociation => "route-table-association",
            ResourceKind::SecurityGroup => "security-group",
            ResourceKind::Instance => "instance",
        }
    }

    /// output で参照できる属性
    pub fn output_attributes(&self) -> &'static [&'static str] {
        match self {
            ResourceKind::Instance => &["id", "public_ip", "private_ip", "public_dns"],
            _ => &["id"],
        }
    }
}

impl fmt::Display for ResourceKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// 宣言された1つのリソース
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Resource {
    /// 論理名（スタック内で一意）
    pub name: String,

    #[serde(default)]
    pub tags: Tags,

    pub spec: ResourceSpec,
}

impl Resource {
    pub fn new(name: impl Into<String>, spec: impl Into<ResourceSpec>) -> Self {
        Self {
            name: name.into(),
            tags: Tags::new(),
            spec: spec.into(),
        }
    }

    pub fn with_tag(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.tags.insert(key.into(), value.into());
        self
    }

    pub fn kind(&self) -> ResourceKind {
        self.spec.kind()
    }

    /// 依存先の論理名（重複なし、宣言順）
    pub fn dependencies(&self) -> Vec<&str> {
        let mut deps: Vec<&str> = Vec::new();
        for r in self.spec.references() {
            if !deps.contains(&r.target.name()) {
                deps.push(r.target.name());
            }
        }
        deps
    }
}

/// 他リソースへの参照1件
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ResourceRef<'a> {
    /// 参照している属性名
    pub attribute: &'static str,
    pub target: &'a Reference,
    /// 参照先に期待される種類
    pub expected: ResourceKind,
}

/// リソース種類ごとの属性
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "kebab-case")]
pub enum ResourceSpec {
    Vpc(Vpc),
    InternetGateway(InternetGateway),
    Subnet(Subnet),
    RouteTable(RouteTable),
    RouteTableAssociation(RouteTableAssociation),
    SecurityGroup(SecurityGroup),
    Instance(Instance),
}

impl ResourceSpec {
    pub fn kind(&self) -> ResourceKind {
        match self {
            ResourceSpec::Vpc(_) => ResourceKind::Vpc,
            ResourceSpec::InternetGateway(_) => ResourceKind::InternetGateway,
            ResourceSpec::Subnet(_) => ResourceKind::Subnet,
            ResourceSpec::RouteTable(_) => ResourceKind::RouteTable,
            ResourceSpec::RouteTableAssociation(_) => ResourceKind::RouteTableAssociation,
            ResourceSpec::SecurityGroup(_) => ResourceKind::SecurityGroup,
            ResourceSpec::Instance(_) => ResourceKind::Instance,
        }
    }

    /// このリソースが持つ参照の一覧
    pub fn references(&self) -> Vec<ResourceRef<'_>> {
        fn vpc_ref(vpc: &Reference) -> ResourceRef<'_> {
            ResourceRef {
                attribute: "vpc",
                target: vpc,
                expected: ResourceKind::Vpc,
            }
        }

        match self {
            ResourceSpec::Vpc(_) => Vec::new(),
            ResourceSpec::InternetGateway(igw) => vec![vpc_ref(&igw.vpc)],
            ResourceSpec::Subnet(subnet) => vec![vpc_ref(&subnet.vpc)],
            ResourceSpec::RouteTable(table) => {
                let mut refs = vec![vpc_ref(&table.vpc)];
                refs.extend(table.routes.iter().map(|route| ResourceRef {
                    attribute: "route.gateway",
                    target: &route.gateway,
                    expected: ResourceKind::InternetGateway,
                }));
                refs
            }
            ResourceSpec::RouteTableAssociation(assoc) => vec![
                ResourceRef {
                    attribute: "route-table",
                    target: &assoc.route_table,
                    expected: ResourceKind::RouteTable,
                },
                ResourceRef {
                    attribute: "subnet",
                    target: &assoc.subnet,
                    expected: ResourceKind::Subnet,
                },
            ],
            ResourceSpec::SecurityGroup(group) => vec![vpc_ref(&group.vpc)],
            ResourceSpec::Instance(instance) => {
                let mut refs = vec![ResourceRef {
                    attribute: "subnet",
                    target: &instance.subnet,
                    expected: ResourceKind::Subnet,
                }];
                refs.extend(instance.security_groups.iter().map(|group| ResourceRef {
                    attribute: "security-groups",
                    target: group,
                    expected: ResourceKind::SecurityGroup,
                }));
                refs
            }
        }
    }
}

macro_rules! impl_from_spec {
    ($($variant:ident),*) => {
        $(
            impl From<$variant> for ResourceSpec {
                fn from(spec: $variant) -> Self {
                    ResourceSpec::$variant(spec)
                }
            }
        )*
    };
}

impl_from_spec!(
    Vpc,
    InternetGateway,
    Subnet,
    RouteTable,
    RouteTableAssociation,
    SecurityGroup,
    Instance
);

/// VPC（ネットワーク）
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Vpc {
    pub cidr_block: String,
    #[serde(default)]
    pub enable_dns_hostnames: bool,
    #[serde(default = "default_true")]
    pub enable_dns_support: bool,
}

fn default_true() -> bool {
    true
}

impl Vpc {
    pub fn new(cidr_block: impl Into<String>) -> Self {
        Self {
            cidr_block: cidr_block.into(),
            enable_dns_hostnames: false,
            enable_dns_support: true,
        }
    }
}

/// インターネットゲートウェイ
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct InternetGateway {
    pub vpc: Reference,
}

/// サブネット
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Subnet {
    pub vpc: Reference,
    pub cidr_block: String,
    pub availability_zone: String,
    #[serde(default)]
    pub map_public_ip_on_launch: bool,
}

/// ルートテーブル
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RouteTable {
    pub vpc: Reference,
    /// 宣言順を保持
    #[serde(default)]
    pub routes: Vec<Route>,
}

/// ルート1件（宛先ブロック → ゲートウェイ）
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Route {
    pub destination_cidr_block: String,
    pub gateway: Reference,
}

/// ルートテーブルとサブネットの関連付け
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RouteTableAssociation {
    pub route_table: Reference,
    pub subnet: Reference,
}

/// セキュリティグループ
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SecurityGroup {
    pub description: String,
    pub vpc: Reference,
    #[serde(default)]
    pub ingress: Vec<SecurityRule>,
    #[serde(default)]
    pub egress: Vec<SecurityRule>,
}

/// 全トラフィックを表すプロトコル値
pub const ALL_PROTOCOLS: &str = "-1";

/// セキュリティグループのルール
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SecurityRule {
    /// tcp / udp / icmp / -1（全トラフィック）
    pub protocol: String,
    pub from_port: i32,
    pub to_port: i32,
    pub cidr_blocks: Vec<String>,
}

impl SecurityRule {
    /// 単一ポートのTCPルール
    pub fn tcp(port: i32, cidr_block: impl Into<String>) -> Self {
        Self {
            protocol: "tcp".to_string(),
            from_port: port,
            to_port: port,
            cidr_blocks: vec![cidr_block.into()],
        }
    }

    /// 全トラフィックを許可するルール
    pub fn all_traffic(cidr_block: impl Into<String>) -> Self {
        Self {
            protocol: ALL_PROTOCOLS.to_string(),
            from_port: 0,
            to_port: 0,
            cidr_blocks: vec![cidr_block.into()],
        }
    }

    pub fn is_all_traffic(&self) -> bool {
        self.protocol == ALL_PROTOCOLS
    }

    /// ルールが許可するポート範囲に `port` が含まれるか
    pub fn covers_port(&self, port: i32) -> bool {
        self.is_all_traffic() || (self.from_port <= port && port <= self.to_port)
    }
}

/// 起動スクリプト
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum UserData {
    /// スクリプト本文
    Inline(String),
    /// プロジェクトルートからの相対パス（ロード時に Inline へ解決される）
    File(PathBuf),
}

impl UserData {
    /// 解決済みのスクリプト本文
    pub fn content(&self) -> Option<&str> {
        match self {
            UserData::Inline(content) => Some(content),
            UserData::File(_) => None,
        }
    }
}

/// コンピュートインスタンス
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Instance {
    pub ami: String,
    pub instance_type: String,
    #[serde(default)]
    pub security_groups: Vec<Reference>,
    pub subnet: Reference,
    #[serde(default)]
    pub associate_public_ip_address: bool,
    pub user_data: Option<UserData>,
}
