///! Deployment status reporting

use anyhow::Result;
use serde::Serialize;
use tabled::Tabled;

use reelstack_common::Resource;

use crate::client::{ClientError, ControlPlaneClient};
use crate::commands::Targets;
use crate::output::{self, OutputFormat};

#[derive(Tabled, Serialize)]
struct ResourceRow {
    name: String,
    kind: String,
    region: String,
    state: String,
    endpoint: String,
}

impl From<Resource> for ResourceRow {
    fn from(resource: Resource) -> Self {
        Self {
            name: resource.name,
            kind: resource.kind.to_string(),
            region: resource.region,
            state: resource.state.to_string(),
            endpoint: resource.endpoint.unwrap_or_else(|| "-".to_string()),
        }
    }
}

pub async fn handle_status_command(
    group: &str,
    api: &ControlPlaneClient,
    output_format: &str,
) -> Result<()> {
    let targets = Targets::for_group(group);

    let mut rows = Vec::new();
    for name in [&targets.storage, &targets.database] {
        match api.get_resource(group, name).await {
            Ok(resource) => rows.push(ResourceRow::from(resource)),
            Err(ClientError::NotFound(_)) => {
                output::print_warning(&format!("Resource '{}' not provisioned yet", name));
            }
            Err(e) => return Err(e.into()),
        }
    }

    let format = OutputFormat::from_str(output_format);
    output::print_output(rows, format)?;

    Ok(())
}
