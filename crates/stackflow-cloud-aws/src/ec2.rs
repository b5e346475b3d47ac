//! EC2 API wrapper
//!
//! One method per EC2 call used by the provider. Every created resource
//! gets its tags at creation time through a tag specification.

use crate::convert::{tag_specification, to_tags};
use crate::error::{AwsError, Result};
use aws_sdk_ec2::Client;
use aws_sdk_ec2::client::Waiters;
use aws_sdk_ec2::types::{
    AttributeBooleanValue, InstanceNetworkInterfaceSpecification, InstanceType, IpPermission,
    ResourceType, Tag,
};
use stackflow_core::Tags;
use std::time::Duration;

/// Upper bound for instance state waiters
const INSTANCE_WAIT: Duration = Duration::from_secs(600);

/// Parameters for launching a single instance
#[derive(Debug, Clone)]
pub struct RunInstance<'a> {
    pub ami: &'a str,
    pub instance_type: &'a str,
    pub subnet_id: &'a str,
    pub security_group_ids: Vec<String>,
    pub associate_public_ip_address: bool,
    /// base64 encoded boot script
    pub user_data: Option<String>,
    pub tags: &'a Tags,
}

/// Addresses reported for a running instance
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct InstanceAddresses {
    pub public_ip: Option<String>,
    pub private_ip: Option<String>,
    pub public_dns: Option<String>,
}

/// EC2 client wrapper
#[derive(Debug, Clone)]
pub struct Ec2 {
    client: Client,
}

fn flag(value: bool) -> AttributeBooleanValue {
    AttributeBooleanValue::builder().value(value).build()
}

impl Ec2 {
    pub fn new(client: Client) -> Self {
        Self { client }
    }

    /// Cheap authenticated call used to verify credentials
    pub async fn describe_account(&self) -> Result<usize> {
        let output = self
            .client
            .describe_account_attributes()
            .send()
            .await
            .map_err(|e| AwsError::sdk("DescribeAccountAttributes", e))?;
        Ok(output.account_attributes().len())
    }

    // VPC

    pub async fn create_vpc(&self, cidr_block: &str, tags: &Tags) -> Result<String> {
        let output = self
            .client
            .create_vpc()
            .cidr_block(cidr_block)
            .tag_specifications(tag_specification(ResourceType::Vpc, tags))
            .send()
            .await
            .map_err(|e| AwsError::sdk("CreateVpc", e))?;

        output
            .vpc()
            .and_then(|vpc| vpc.vpc_id())
            .map(str::to_string)
            .ok_or_else(|| AwsError::missing("CreateVpc", "VpcId"))
    }

    pub async fn set_vpc_dns_support(&self, vpc_id: &str, enabled: bool) -> Result<()> {
        self.client
            .modify_vpc_attribute()
            .vpc_id(vpc_id)
            .enable_dns_support(flag(enabled))
            .send()
            .await
            .map_err(|e| AwsError::sdk("ModifyVpcAttribute", e))?;
        Ok(())
    }

    pub async fn set_vpc_dns_hostnames(&self, vpc_id: &str, enabled: bool) -> Result<()> {
        self.client
            .modify_vpc_attribute()
            .vpc_id(vpc_id)
            .enable_dns_hostnames(flag(enabled))
            .send()
            .await
            .map_err(|e| AwsError::sdk("ModifyVpcAttribute", e))?;
        Ok(())
    }

    pub async fn delete_vpc(&self, vpc_id: &str) -> Result<()> {
        self.client
            .delete_vpc()
            .vpc_id(vpc_id)
            .send()
            .await
            .map_err(|e| AwsError::sdk("DeleteVpc", e))?;
        Ok(())
    }

    // Internet gateway

    pub async fn create_internet_gateway(&self, tags: &Tags) -> Result<String> {
        let output = self
            .client
            .create_internet_gateway()
            .tag_specifications(tag_specification(ResourceType::InternetGateway, tags))
            .send()
            .await
            .map_err(|e| AwsError::sdk("CreateInternetGateway", e))?;

        output
            .internet_gateway()
            .and_then(|igw| igw.internet_gateway_id())
            .map(str::to_string)
            .ok_or_else(|| AwsError::missing("CreateInternetGateway", "InternetGatewayId"))
    }

    pub async fn attach_internet_gateway(&self, gateway_id: &str, vpc_id: &str) -> Result<()> {
        self.client
            .attach_internet_gateway()
            .internet_gateway_id(gateway_id)
            .vpc_id(vpc_id)
            .send()
            .await
            .map_err(|e| AwsError::sdk("AttachInternetGateway", e))?;
        Ok(())
    }

    pub async fn detach_internet_gateway(&self, gateway_id: &str, vpc_id: &str) -> Result<()> {
        self.client
            .detach_internet_gateway()
            .internet_gateway_id(gateway_id)
            .vpc_id(vpc_id)
            .send()
            .await
            .map_err(|e| AwsError::sdk("DetachInternetGateway", e))?;
        Ok(())
    }

    pub async fn delete_internet_gateway(&self, gateway_id: &str) -> Result<()> {
        self.client
            .delete_internet_gateway()
            .internet_gateway_id(gateway_id)
            .send()
            .await
            .map_err(|e| AwsError::sdk("DeleteInternetGateway", e))?;
        Ok(())
    }

    // Subnet

    pub async fn create_subnet(
        &self,
        vpc_id: &str,
        cidr_block: &str,
        availability_zone: &str,
        tags: &Tags,
    ) -> Result<String> {
        let output = self
            .client
            .create_subnet()
            .vpc_id(vpc_id)
            .cidr_block(cidr_block)
            .availability_zone(availability_zone)
            .tag_specifications(tag_specification(ResourceType::Subnet, tags))
            .send()
            .await
            .map_err(|e| AwsError::sdk("CreateSubnet", e))?;

        output
            .subnet()
            .and_then(|subnet| subnet.subnet_id())
            .map(str::to_string)
            .ok_or_else(|| AwsError::missing("CreateSubnet", "SubnetId"))
    }

    pub async fn set_map_public_ip_on_launch(&self, subnet_id: &str, enabled: bool) -> Result<()> {
        self.client
            .modify_subnet_attribute()
            .subnet_id(subnet_id)
            .map_public_ip_on_launch(flag(enabled))
            .send()
            .await
            .map_err(|e| AwsError::sdk("ModifySubnetAttribute", e))?;
        Ok(())
    }

    pub async fn delete_subnet(&self, subnet_id: &str) -> Result<()> {
        self.client
            .delete_subnet()
            .subnet_id(subnet_id)
            .send()
            .await
            .map_err(|e| AwsError::sdk("DeleteSubnet", e))?;
        Ok(())
    }

    // Route table

    pub async fn create_route_table(&self, vpc_id: &str, tags: &Tags) -> Result<String> {
        let output = self
            .client
            .create_route_table()
            .vpc_id(vpc_id)
            .tag_specifications(tag_specification(ResourceType::RouteTable, tags))
            .send()
            .await
            .map_err(|e| AwsError::sdk("CreateRouteTable", e))?;

        output
            .route_table()
            .and_then(|table| table.route_table_id())
            .map(str::to_string)
            .ok_or_else(|| AwsError::missing("CreateRouteTable", "RouteTableId"))
    }

    pub async fn create_route(
        &self,
        route_table_id: &str,
        destination_cidr_block: &str,
        gateway_id: &str,
    ) -> Result<()> {
        self.client
            .create_route()
            .route_table_id(route_table_id)
            .destination_cidr_block(destination_cidr_block)
            .gateway_id(gateway_id)
            .send()
            .await
            .map_err(|e| AwsError::sdk("CreateRoute", e))?;
        Ok(())
    }

    pub async fn delete_route(
        &self,
        route_table_id: &str,
        destination_cidr_block: &str,
    ) -> Result<()> {
        self.client
            .delete_route()
            .route_table_id(route_table_id)
            .destination_cidr_block(destination_cidr_block)
            .send()
            .await
            .map_err(|e| AwsError::sdk("DeleteRoute", e))?;
        Ok(())
    }

    pub async fn delete_route_table(&self, route_table_id: &str) -> Result<()> {
        self.client
            .delete_route_table()
            .route_table_id(route_table_id)
            .send()
            .await
            .map_err(|e| AwsError::sdk("DeleteRouteTable", e))?;
        Ok(())
    }

    pub async fn associate_route_table(
        &self,
        route_table_id: &str,
        subnet_id: &str,
    ) -> Result<String> {
        let output = self
            .client
            .associate_route_table()
            .route_table_id(route_table_id)
            .subnet_id(subnet_id)
            .send()
            .await
            .map_err(|e| AwsError::sdk("AssociateRouteTable", e))?;

        output
            .association_id()
            .map(str::to_string)
            .ok_or_else(|| AwsError::missing("AssociateRouteTable", "AssociationId"))
    }

    pub async fn disassociate_route_table(&self, association_id: &str) -> Result<()> {
        self.client
            .disassociate_route_table()
            .association_id(association_id)
            .send()
            .await
            .map_err(|e| AwsError::sdk("DisassociateRouteTable", e))?;
        Ok(())
    }

    // Security group

    pub async fn create_security_group(
        &self,
        group_name: &str,
        description: &str,
        vpc_id: &str,
        tags: &Tags,
    ) -> Result<String> {
        let output = self
            .client
            .create_security_group()
            .group_name(group_name)
            .description(description)
            .vpc_id(vpc_id)
            .tag_specifications(tag_specification(ResourceType::SecurityGroup, tags))
            .send()
            .await
            .map_err(|e| AwsError::sdk("CreateSecurityGroup", e))?;

        output
            .group_id()
            .map(str::to_string)
            .ok_or_else(|| AwsError::missing("CreateSecurityGroup", "GroupId"))
    }

    pub async fn authorize_ingress(
        &self,
        group_id: &str,
        permissions: Vec<IpPermission>,
    ) -> Result<()> {
        if permissions.is_empty() {
            return Ok(());
        }
        self.client
            .authorize_security_group_ingress()
            .group_id(group_id)
            .set_ip_permissions(Some(permissions))
            .send()
            .await
            .map_err(|e| AwsError::sdk("AuthorizeSecurityGroupIngress", e))?;
        Ok(())
    }

    pub async fn authorize_egress(
        &self,
        group_id: &str,
        permissions: Vec<IpPermission>,
    ) -> Result<()> {
        if permissions.is_empty() {
            return Ok(());
        }
        self.client
            .authorize_security_group_egress()
            .group_id(group_id)
            .set_ip_permissions(Some(permissions))
            .send()
            .await
            .map_err(|e| AwsError::sdk("AuthorizeSecurityGroupEgress", e))?;
        Ok(())
    }

    pub async fn revoke_ingress(
        &self,
        group_id: &str,
        permissions: Vec<IpPermission>,
    ) -> Result<()> {
        if permissions.is_empty() {
            return Ok(());
        }
        self.client
            .revoke_security_group_ingress()
            .group_id(group_id)
            .set_ip_permissions(Some(permissions))
            .send()
            .await
            .map_err(|e| AwsError::sdk("RevokeSecurityGroupIngress", e))?;
        Ok(())
    }

    pub async fn revoke_egress(
        &self,
        group_id: &str,
        permissions: Vec<IpPermission>,
    ) -> Result<()> {
        if permissions.is_empty() {
            return Ok(());
        }
        self.client
            .revoke_security_group_egress()
            .group_id(group_id)
            .set_ip_permissions(Some(permissions))
            .send()
            .await
            .map_err(|e| AwsError::sdk("RevokeSecurityGroupEgress", e))?;
        Ok(())
    }

    pub async fn delete_security_group(&self, group_id: &str) -> Result<()> {
        self.client
            .delete_security_group()
            .group_id(group_id)
            .send()
            .await
            .map_err(|e| AwsError::sdk("DeleteSecurityGroup", e))?;
        Ok(())
    }

    // Instance

    /// Launch one instance with a single network interface
    pub async fn run_instance(&self, params: &RunInstance<'_>) -> Result<String> {
        let interface = InstanceNetworkInterfaceSpecification::builder()
            .device_index(0)
            .subnet_id(params.subnet_id)
            .associate_public_ip_address(params.associate_public_ip_address)
            .set_groups(Some(params.security_group_ids.clone()))
            .build();

        let output = self
            .client
            .run_instances()
            .image_id(params.ami)
            .instance_type(InstanceType::from(params.instance_type))
            .min_count(1)
            .max_count(1)
            .network_interfaces(interface)
            .set_user_data(params.user_data.clone())
            .tag_specifications(tag_specification(ResourceType::Instance, params.tags))
            .send()
            .await
            .map_err(|e| AwsError::sdk("RunInstances", e))?;

        output
            .instances()
            .first()
            .and_then(|instance| instance.instance_id())
            .map(str::to_string)
            .ok_or_else(|| AwsError::missing("RunInstances", "InstanceId"))
    }

    pub async fn wait_until_running(&self, instance_id: &str) -> Result<()> {
        self.client
            .wait_until_instance_running()
            .instance_ids(instance_id)
            .wait(INSTANCE_WAIT)
            .await
            .map_err(|e| AwsError::sdk("WaitUntilInstanceRunning", e))?;
        Ok(())
    }

    pub async fn describe_addresses(&self, instance_id: &str) -> Result<InstanceAddresses> {
        let output = self
            .client
            .describe_instances()
            .instance_ids(instance_id)
            .send()
            .await
            .map_err(|e| AwsError::sdk("DescribeInstances", e))?;

        let instance = output
            .reservations()
            .iter()
            .flat_map(|reservation| reservation.instances())
            .find(|instance| instance.instance_id() == Some(instance_id))
            .ok_or_else(|| AwsError::missing("DescribeInstances", "Instance"))?;

        Ok(InstanceAddresses {
            public_ip: instance.public_ip_address().map(str::to_string),
            private_ip: instance.private_ip_address().map(str::to_string),
            public_dns: instance
                .public_dns_name()
                .filter(|name| !name.is_empty())
                .map(str::to_string),
        })
    }

    pub async fn set_instance_security_groups(
        &self,
        instance_id: &str,
        group_ids: Vec<String>,
    ) -> Result<()> {
        self.client
            .modify_instance_attribute()
            .instance_id(instance_id)
            .set_groups(Some(group_ids))
            .send()
            .await
            .map_err(|e| AwsError::sdk("ModifyInstanceAttribute", e))?;
        Ok(())
    }

    pub async fn terminate_instance(&self, instance_id: &str) -> Result<()> {
        self.client
            .terminate_instances()
            .instance_ids(instance_id)
            .send()
            .await
            .map_err(|e| AwsError::sdk("TerminateInstances", e))?;
        Ok(())
    }

    pub async fn wait_until_terminated(&self, instance_id: &str) -> Result<()> {
        self.client
            .wait_until_instance_terminated()
            .instance_ids(instance_id)
            .wait(INSTANCE_WAIT)
            .await
            .map_err(|e| AwsError::sdk("WaitUntilInstanceTerminated", e))?;
        Ok(())
    }

    // Tags

    pub async fn create_tags(&self, resource_id: &str, tags: &Tags) -> Result<()> {
        if tags.is_empty() {
            return Ok(());
        }
        self.client
            .create_tags()
            .resources(resource_id)
            .set_tags(Some(to_tags(tags)))
            .send()
            .await
            .map_err(|e| AwsError::sdk("CreateTags", e))?;
        Ok(())
    }

    pub async fn delete_tags(&self, resource_id: &str, keys: &[String]) -> Result<()> {
        if keys.is_empty() {
            return Ok(());
        }
        let tags = keys.iter().map(|key| Tag::builder().key(key).build()).collect();
        self.client
            .delete_tags()
            .resources(resource_id)
            .set_tags(Some(tags))
            .send()
            .await
            .map_err(|e| AwsError::sdk("DeleteTags", e))?;
        Ok(())
    }
}
