//! AWS provider implementation

use crate::convert::{
    TagChanges, default_egress, encode_user_data, ip_permission, list_changes,
    requires_replacement, route_changes,
};
use crate::ec2::{Ec2, InstanceAddresses, RunInstance};
use crate::error::{AwsError, Result};
use async_trait::async_trait;
use aws_config::{BehaviorVersion, Region};
use serde_json::json;
use stackflow_cloud::{
    AuthStatus, CloudProvider, ProvisionResult, ResolvedResource, ResourceState,
};
use stackflow_core::{Resource, ResourceSpec};
use tracing::{debug, info};

pub const PROVIDER_NAME: &str = "aws";

/// AWS EC2 provider
pub struct AwsProvider {
    ec2: Ec2,
    region: Option<String>,
}

impl AwsProvider {
    /// Load credentials through the default AWS chain
    ///
    /// `region` and `profile` override the environment when given.
    pub async fn connect(region: Option<&str>, profile: Option<&str>) -> Self {
        let mut loader = aws_config::defaults(BehaviorVersion::latest());
        if let Some(region) = region {
            loader = loader.region(Region::new(region.to_string()));
        }
        if let Some(profile) = profile {
            loader = loader.profile_name(profile);
        }
        let config = loader.load().await;

        let region = config.region().map(|r| r.to_string());
        debug!("AWS provider configured for region {:?}", region);

        Self {
            ec2: Ec2::new(aws_sdk_ec2::Client::new(&config)),
            region,
        }
    }

    async fn create_resource(&self, resolved: &ResolvedResource<'_>) -> Result<ProvisionResult> {
        let tags = resolved.tags();

        match &resolved.resource.spec {
            ResourceSpec::Vpc(vpc) => {
                let id = self.ec2.create_vpc(&vpc.cidr_block, &tags).await?;
                info!("Created VPC {} ({})", resolved.name(), id);

                if !vpc.enable_dns_support {
                    self.ec2.set_vpc_dns_support(&id, false).await?;
                }
                if vpc.enable_dns_hostnames {
                    self.ec2.set_vpc_dns_hostnames(&id, true).await?;
                }

                Ok(ProvisionResult::new(id).with_attribute("cidr_block", json!(vpc.cidr_block)))
            }

            ResourceSpec::InternetGateway(gateway) => {
                let vpc_id = resolved.id_of(&gateway.vpc)?;
                let id = self.ec2.create_internet_gateway(&tags).await?;
                self.ec2.attach_internet_gateway(&id, vpc_id).await?;
                info!("Created internet gateway {} ({}) on {}", resolved.name(), id, vpc_id);

                Ok(ProvisionResult::new(id).with_attribute("vpc_id", json!(vpc_id)))
            }

            ResourceSpec::Subnet(subnet) => {
                let vpc_id = resolved.id_of(&subnet.vpc)?;
                let id = self
                    .ec2
                    .create_subnet(vpc_id, &subnet.cidr_block, &subnet.availability_zone, &tags)
                    .await?;
                info!("Created subnet {} ({})", resolved.name(), id);

                if subnet.map_public_ip_on_launch {
                    self.ec2.set_map_public_ip_on_launch(&id, true).await?;
                }

                Ok(ProvisionResult::new(id)
                    .with_attribute("vpc_id", json!(vpc_id))
                    .with_attribute("cidr_block", json!(subnet.cidr_block))
                    .with_attribute("availability_zone", json!(subnet.availability_zone)))
            }

            ResourceSpec::RouteTable(table) => {
                let vpc_id = resolved.id_of(&table.vpc)?;
                let id = self.ec2.create_route_table(vpc_id, &tags).await?;
                info!("Created route table {} ({})", resolved.name(), id);

                for route in &table.routes {
                    let gateway_id = resolved.id_of(&route.gateway)?;
                    self.ec2
                        .create_route(&id, &route.destination_cidr_block, gateway_id)
                        .await?;
                    debug!("Route {} -> {}", route.destination_cidr_block, gateway_id);
                }

                Ok(ProvisionResult::new(id).with_attribute("vpc_id", json!(vpc_id)))
            }

            ResourceSpec::RouteTableAssociation(association) => {
                let route_table_id = resolved.id_of(&association.route_table)?;
                let subnet_id = resolved.id_of(&association.subnet)?;
                let id = self
                    .ec2
                    .associate_route_table(route_table_id, subnet_id)
                    .await?;
                info!(
                    "Associated route table {} with subnet {} ({})",
                    route_table_id, subnet_id, id
                );

                Ok(ProvisionResult::new(id)
                    .with_attribute("route_table_id", json!(route_table_id))
                    .with_attribute("subnet_id", json!(subnet_id)))
            }

            ResourceSpec::SecurityGroup(group) => {
                let vpc_id = resolved.id_of(&group.vpc)?;
                let id = self
                    .ec2
                    .create_security_group(resolved.name(), &group.description, vpc_id, &tags)
                    .await?;
                info!("Created security group {} ({})", resolved.name(), id);

                // new groups allow all outbound traffic until told otherwise
                self.ec2.revoke_egress(&id, vec![default_egress()]).await?;
                self.ec2
                    .authorize_ingress(&id, group.ingress.iter().map(ip_permission).collect())
                    .await?;
                self.ec2
                    .authorize_egress(&id, group.egress.iter().map(ip_permission).collect())
                    .await?;

                Ok(ProvisionResult::new(id)
                    .with_attribute("vpc_id", json!(vpc_id))
                    .with_attribute("group_name", json!(resolved.name())))
            }

            ResourceSpec::Instance(instance) => {
                let subnet_id = resolved.id_of(&instance.subnet)?;
                let security_group_ids = instance
                    .security_groups
                    .iter()
                    .map(|group| resolved.id_of(group).map(str::to_string))
                    .collect::<stackflow_cloud::Result<Vec<_>>>()?;

                let user_data = match &instance.user_data {
                    Some(data) => Some(encode_user_data(data.content().ok_or_else(|| {
                        AwsError::Unsupported(format!(
                            "{}: user data file was not loaded",
                            resolved.name()
                        ))
                    })?)),
                    None => None,
                };

                let id = self
                    .ec2
                    .run_instance(&RunInstance {
                        ami: &instance.ami,
                        instance_type: &instance.instance_type,
                        subnet_id,
                        security_group_ids,
                        associate_public_ip_address: instance.associate_public_ip_address,
                        user_data,
                        tags: &tags,
                    })
                    .await?;
                info!("Launched instance {} ({}), waiting for running", resolved.name(), id);

                self.ec2.wait_until_running(&id).await?;
                let addresses = self.ec2.describe_addresses(&id).await?;
                info!(
                    "Instance {} is running at {}",
                    id,
                    addresses.public_ip.as_deref().unwrap_or("-")
                );

                Ok(with_addresses(
                    ProvisionResult::new(id).with_attribute("subnet_id", json!(subnet_id)),
                    addresses,
                ))
            }
        }
    }

    async fn update_resource(
        &self,
        resolved: &ResolvedResource<'_>,
        current: &ResourceState,
    ) -> Result<ProvisionResult> {
        let id = current.id.as_str();
        let mut result = ProvisionResult {
            id: current.id.clone(),
            attributes: current.attributes.clone(),
        };

        match (&current.resource.spec, &resolved.resource.spec) {
            (ResourceSpec::Vpc(old), ResourceSpec::Vpc(new)) => {
                if old.enable_dns_support != new.enable_dns_support {
                    self.ec2.set_vpc_dns_support(id, new.enable_dns_support).await?;
                }
                if old.enable_dns_hostnames != new.enable_dns_hostnames {
                    self.ec2
                        .set_vpc_dns_hostnames(id, new.enable_dns_hostnames)
                        .await?;
                }
            }

            (ResourceSpec::InternetGateway(_), ResourceSpec::InternetGateway(_)) => {}

            (ResourceSpec::Subnet(old), ResourceSpec::Subnet(new)) => {
                if old.map_public_ip_on_launch != new.map_public_ip_on_launch {
                    self.ec2
                        .set_map_public_ip_on_launch(id, new.map_public_ip_on_launch)
                        .await?;
                }
            }

            (ResourceSpec::RouteTable(old), ResourceSpec::RouteTable(new)) => {
                let (removed, added) = route_changes(&old.routes, &new.routes);
                for route in removed {
                    self.ec2
                        .delete_route(id, &route.destination_cidr_block)
                        .await?;
                    debug!("Removed route {}", route.destination_cidr_block);
                }
                for route in added {
                    let gateway_id = resolved.id_of(&route.gateway)?;
                    self.ec2
                        .create_route(id, &route.destination_cidr_block, gateway_id)
                        .await?;
                    debug!("Added route {} -> {}", route.destination_cidr_block, gateway_id);
                }
            }

            (ResourceSpec::SecurityGroup(old), ResourceSpec::SecurityGroup(new)) => {
                let (revoked, authorized) = list_changes(&old.ingress, &new.ingress);
                self.ec2
                    .revoke_ingress(id, revoked.into_iter().map(ip_permission).collect())
                    .await?;
                self.ec2
                    .authorize_ingress(id, authorized.into_iter().map(ip_permission).collect())
                    .await?;

                let (revoked, authorized) = list_changes(&old.egress, &new.egress);
                self.ec2
                    .revoke_egress(id, revoked.into_iter().map(ip_permission).collect())
                    .await?;
                self.ec2
                    .authorize_egress(id, authorized.into_iter().map(ip_permission).collect())
                    .await?;
            }

            (ResourceSpec::Instance(old), ResourceSpec::Instance(new)) => {
                if old.security_groups != new.security_groups {
                    let group_ids = new
                        .security_groups
                        .iter()
                        .map(|group| resolved.id_of(group).map(str::to_string))
                        .collect::<stackflow_cloud::Result<Vec<_>>>()?;
                    self.ec2.set_instance_security_groups(id, group_ids).await?;
                }
                let addresses = self.ec2.describe_addresses(id).await?;
                result = with_addresses(result, addresses);
            }

            _ => {
                return Err(AwsError::Unsupported(format!(
                    "{} {} cannot be updated in place",
                    current.resource_type,
                    resolved.name()
                )));
            }
        }

        if current.resource.tags != resolved.resource.tags {
            let changes = TagChanges::between(&current.resource.tags, &resolved.resource.tags);
            self.ec2.create_tags(id, &changes.set).await?;
            self.ec2.delete_tags(id, &changes.removed).await?;
        }

        info!("Updated {} {} ({})", current.resource_type, resolved.name(), id);
        Ok(result)
    }

    async fn delete_resource(&self, current: &ResourceState) -> Result<()> {
        let id = current.id.as_str();

        match &current.resource.spec {
            ResourceSpec::Vpc(_) => self.ec2.delete_vpc(id).await?,
            ResourceSpec::InternetGateway(_) => {
                if let Some(vpc_id) = current.get_attribute::<String>("vpc_id") {
                    self.ec2.detach_internet_gateway(id, &vpc_id).await?;
                }
                self.ec2.delete_internet_gateway(id).await?;
            }
            ResourceSpec::Subnet(_) => self.ec2.delete_subnet(id).await?,
            ResourceSpec::RouteTable(_) => self.ec2.delete_route_table(id).await?,
            ResourceSpec::RouteTableAssociation(_) => {
                self.ec2.disassociate_route_table(id).await?
            }
            ResourceSpec::SecurityGroup(_) => self.ec2.delete_security_group(id).await?,
            ResourceSpec::Instance(_) => {
                self.ec2.terminate_instance(id).await?;
                info!("Terminating instance {}, waiting for terminated", id);
                self.ec2.wait_until_terminated(id).await?;
            }
        }

        info!(
            "Deleted {} {} ({})",
            current.resource_type, current.resource.name, id
        );
        Ok(())
    }
}

fn with_addresses(result: ProvisionResult, addresses: InstanceAddresses) -> ProvisionResult {
    result
        .with_optional("public_ip", addresses.public_ip)
        .with_optional("private_ip", addresses.private_ip)
        .with_optional("public_dns", addresses.public_dns)
}

#[async_trait]
impl CloudProvider for AwsProvider {
    fn name(&self) -> &str {
        PROVIDER_NAME
    }

    fn display_name(&self) -> &str {
        "Amazon Web Services"
    }

    async fn check_auth(&self) -> stackflow_cloud::Result<AuthStatus> {
        match self.ec2.describe_account().await {
            Ok(_) => Ok(AuthStatus::ok(format!(
                "EC2 ({})",
                self.region.as_deref().unwrap_or("default region")
            ))),
            Err(e) => Ok(AuthStatus::failed(e.to_string())),
        }
    }

    async fn create(
        &self,
        resource: &ResolvedResource<'_>,
    ) -> stackflow_cloud::Result<ProvisionResult> {
        Ok(self.create_resource(resource).await?)
    }

    async fn update(
        &self,
        resource: &ResolvedResource<'_>,
        current: &ResourceState,
    ) -> stackflow_cloud::Result<ProvisionResult> {
        Ok(self.update_resource(resource, current).await?)
    }

    async fn delete(&self, current: &ResourceState) -> stackflow_cloud::Result<()> {
        Ok(self.delete_resource(current).await?)
    }

    fn requires_replacement(&self, previous: &Resource, desired: &Resource) -> bool {
        requires_replacement(previous, desired)
    }
}
