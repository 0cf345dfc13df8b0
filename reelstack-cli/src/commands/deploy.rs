///! End-to-end deployment: provision, import, publish

use std::path::Path;
use std::time::{Duration, Instant};

use anyhow::Result;

use crate::client::ControlPlaneClient;
use crate::commands::{import, provision, publish};
use crate::output;

pub struct DeployOptions<'a> {
    pub region: &'a str,
    pub csv_path: &'a Path,
    pub site_dir: &'a Path,
    pub skip_import: bool,
    pub skip_publish: bool,
    pub poll_interval: Duration,
    pub timeout: Duration,
}

pub async fn handle_deploy_command(
    group: &str,
    options: DeployOptions<'_>,
    api: &ControlPlaneClient,
) -> Result<()> {
    let started = Instant::now();

    let provisioned = provision::handle_provision_command(
        group,
        options.region,
        options.poll_interval,
        options.timeout,
        api,
    )
    .await?;
    tracing::debug!(
        "resources ready: storage {}, database {}",
        provisioned.storage.id,
        provisioned.database.id
    );

    if options.skip_import {
        output::print_info("Skipping catalog import");
    } else {
        import::handle_import_command(group, options.csv_path, api).await?;
    }

    if options.skip_publish {
        output::print_info("Skipping site publish");
    } else {
        publish::handle_publish_command(group, options.site_dir, api).await?;
    }

    output::print_success(&format!(
        "Deployment of '{}' finished in {}",
        group,
        output::format_duration(started.elapsed().as_secs())
    ));

    Ok(())
}
