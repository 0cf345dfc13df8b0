///! Resource provisioning commands

use std::time::Duration;

use anyhow::Result;

use reelstack_common::retry::RetryPolicy;
use reelstack_common::{Error, ProvisioningState, Resource, ResourceDescriptor, ResourceKind};

use crate::client::{
    ClientError, ControlPlaneClient, CreateCollectionRequest, CreateResourceRequest,
    StaticSiteRequest,
};
use crate::commands::Targets;
use crate::output;
use crate::poller::{self, PollOutcome};
use crate::retry;

/// Retry budget for sub-resource creation on a freshly provisioned parent.
fn sub_resource_policy() -> RetryPolicy {
    RetryPolicy::new(5, Duration::from_secs(5), 2.0).with_jitter()
}

/// Resources available after a successful provisioning pass
pub struct Provisioned {
    pub storage: Resource,
    pub database: Resource,
}

pub async fn handle_provision_command(
    group: &str,
    region: &str,
    poll_interval: Duration,
    timeout: Duration,
    api: &ControlPlaneClient,
) -> Result<Provisioned> {
    let targets = Targets::for_group(group);

    // Descriptors are fixed at invocation start and only re-read afterwards.
    let storage_desc = ResourceDescriptor::new(&targets.storage, ResourceKind::Storage, region);
    let database_desc = ResourceDescriptor::new(&targets.database, ResourceKind::Database, region);

    output::print_info(&format!(
        "Provisioning resource group '{}' in {}...",
        group, region
    ));

    let storage = ensure_resource(api, group, &storage_desc).await?;
    let database = ensure_resource(api, group, &database_desc).await?;

    // Dependent operations require a Succeeded parent; wait on each resource
    // in turn (the storage wait is usually a single query).
    let storage = wait_until_ready(api, group, storage, poll_interval, timeout).await?;
    let database = wait_until_ready(api, group, database, poll_interval, timeout).await?;

    let policy = sub_resource_policy();

    let database_name = database.name.as_str();
    let collection = targets.collection.as_str();
    retry::retry("collection creation", &policy, move || async move {
        let request = CreateCollectionRequest {
            name: collection.to_string(),
            partition_key: Some("/Genre".to_string()),
        };
        match api.create_collection(group, database_name, &request).await {
            Ok(_) => Ok(()),
            // A collection left behind by an earlier run is fine.
            Err(ClientError::AlreadyExists(_)) => Ok(()),
            Err(e) => Err(Error::from(e)),
        }
    })
    .await?;
    output::print_success(&format!(
        "Collection '{}' ready in database '{}'",
        targets.collection, database.name
    ));

    let storage_name = storage.name.as_str();
    let site = retry::retry("static site enablement", &policy, move || async move {
        let request = StaticSiteRequest {
            index_document: "index.html".to_string(),
            error_document: "error.html".to_string(),
        };
        match api.enable_static_site(group, storage_name, &request).await {
            Ok(info) => Ok(Some(info)),
            Err(ClientError::AlreadyExists(_)) => Ok(None),
            Err(e) => Err(Error::from(e)),
        }
    })
    .await?;
    output::print_success(&format!(
        "Static hosting enabled on storage '{}'",
        storage.name
    ));
    if let Some(info) = site {
        if info.enabled {
            if let Some(url) = info.url {
                output::print_info(&format!("Site will be served at {}", url));
            }
        }
    }

    Ok(Provisioned { storage, database })
}

/// Idempotent create: a resource that already exists is re-read, never
/// duplicated.
async fn ensure_resource(
    api: &ControlPlaneClient,
    group: &str,
    desc: &ResourceDescriptor,
) -> Result<Resource> {
    let request = CreateResourceRequest::from(desc);

    match api.create_resource(group, &request).await {
        Ok(resource) => {
            output::print_created(&desc.kind.to_string(), &resource.name, &resource.id);
            Ok(resource)
        }
        Err(ClientError::AlreadyExists(_)) => {
            tracing::info!("{} '{}' already exists, reusing it", desc.kind, desc.name);
            let resource = api.get_resource(group, &desc.name).await?;
            Ok(resource)
        }
        Err(e) => Err(e.into()),
    }
}

/// Block until the resource reports Succeeded. Failed and TimedOut are both
/// fatal to the invocation, with distinct messages.
async fn wait_until_ready(
    api: &ControlPlaneClient,
    group: &str,
    resource: Resource,
    poll_interval: Duration,
    timeout: Duration,
) -> Result<Resource> {
    if resource.state == ProvisioningState::Succeeded {
        return Ok(resource);
    }

    let spinner = output::wait_spinner(format!(
        "Waiting for {} '{}' to become ready...",
        resource.kind, resource.name
    ));

    let name = resource.name.as_str();
    let outcome = poller::await_ready(
        move || async move {
            let current = api.get_resource(group, name).await.map_err(Error::from)?;
            Ok(current.state)
        },
        poll_interval,
        timeout,
    )
    .await?;

    spinner.finish_and_clear();

    match outcome {
        PollOutcome::Succeeded => {
            output::print_success(&format!("{} '{}' is ready", resource.kind, resource.name));
            // Re-read so callers see the final endpoint.
            Ok(api.get_resource(group, &resource.name).await?)
        }
        PollOutcome::Failed => Err(Error::ProvisioningFailed(resource.name.clone()).into()),
        PollOutcome::TimedOut => Err(anyhow::anyhow!(
            "{} '{}' did not become ready within {}",
            resource.kind,
            resource.name,
            output::format_duration(timeout.as_secs())
        )),
    }
}
