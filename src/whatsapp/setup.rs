//! Bridge sidecar: container lifecycle.
//!
//! Follows the inspect → start if stopped → pull and create if missing
//! pattern. The session directories are bind-mounted from the host so that
//! [`SessionStore::wipe`](super::session_store::SessionStore::wipe) resets the
//! bridge's credentials as well.

use std::collections::HashMap;
use std::path::Path;

use bollard::container::{
    Config as ContainerConfig, CreateContainerOptions, StartContainerOptions,
};
use bollard::image::CreateImageOptions;
use bollard::models::{HostConfig, PortBinding, RestartPolicy, RestartPolicyNameEnum};
use bollard::Docker;
use tokio_stream::StreamExt;
use tracing::{info, warn};

use super::client::BridgeClient;
use super::session_store::SessionStore;
use super::WhatsAppError;
use crate::config::SidecarConfig;

/// Container name for the bridge sidecar.
pub const CONTAINER_NAME: &str = "whatsapp-gateway-bridge";

/// Port the bridge listens on inside the container.
pub const CONTAINER_PORT: u16 = 3000;

/// Mount point of the auth directory inside the container.
const CONTAINER_AUTH_DIR: &str = "/app/.wwebjs_auth";

/// Mount point of the cache directory inside the container.
const CONTAINER_CACHE_DIR: &str = "/app/.wwebjs_cache";

/// Memory limit for the bridge (headless browser included, 1 GB).
const MEMORY_LIMIT_BYTES: i64 = 1024 * 1024 * 1024;

/// Ensure the bridge container is running.
///
/// # Errors
///
/// Returns [`WhatsAppError::SetupFailed`] if Docker rejects any step.
pub async fn ensure_container(
    docker: &Docker,
    sidecar: &SidecarConfig,
    store: &SessionStore,
) -> Result<(), WhatsAppError> {
    match docker.inspect_container(CONTAINER_NAME, None).await {
        Ok(info) => {
            let running = info.state.as_ref().and_then(|s| s.running).unwrap_or(false);
            if running {
                info!(container = CONTAINER_NAME, "bridge sidecar already running");
                return Ok(());
            }
            docker
                .start_container(CONTAINER_NAME, None::<StartContainerOptions<String>>)
                .await
                .map_err(|e| {
                    WhatsAppError::SetupFailed(format!("failed to start container: {e}"))
                })?;
            info!(container = CONTAINER_NAME, "bridge sidecar started");
            return Ok(());
        }
        Err(bollard::errors::Error::DockerResponseServerError {
            status_code: 404, ..
        }) => {
            // Not created yet.
        }
        Err(e) => {
            return Err(WhatsAppError::SetupFailed(format!(
                "failed to inspect container: {e}"
            )));
        }
    }

    let pull_opts = CreateImageOptions {
        from_image: sidecar.image.as_str(),
        ..Default::default()
    };
    let mut pull_stream = docker.create_image(Some(pull_opts), None, None);
    while let Some(result) = pull_stream.next().await {
        if let Err(e) = result {
            warn!(error = %e, "image pull warning");
        }
    }
    info!(image = %sidecar.image, "bridge image pulled");

    let port_key = format!("{CONTAINER_PORT}/tcp");
    let mut port_bindings = HashMap::new();
    port_bindings.insert(
        port_key.clone(),
        Some(vec![PortBinding {
            host_ip: Some("127.0.0.1".to_owned()),
            host_port: Some(sidecar.host_port.to_string()),
        }]),
    );

    let host_config = HostConfig {
        port_bindings: Some(port_bindings),
        binds: Some(session_binds(store)?),
        restart_policy: Some(RestartPolicy {
            name: Some(RestartPolicyNameEnum::ON_FAILURE),
            maximum_retry_count: Some(5),
        }),
        memory: Some(MEMORY_LIMIT_BYTES),
        ..Default::default()
    };

    let mut labels = HashMap::new();
    labels.insert("whatsapp-gateway".to_owned(), "true".to_owned());

    let mut exposed_ports = HashMap::new();
    exposed_ports.insert(port_key, HashMap::new());

    let container_config = ContainerConfig {
        image: Some(sidecar.image.clone()),
        labels: Some(labels),
        exposed_ports: Some(exposed_ports),
        host_config: Some(host_config),
        env: Some(vec![format!("PORT={CONTAINER_PORT}")]),
        ..Default::default()
    };

    let create_opts = CreateContainerOptions {
        name: CONTAINER_NAME.to_owned(),
        platform: None,
    };
    docker
        .create_container(Some(create_opts), container_config)
        .await
        .map_err(|e| WhatsAppError::SetupFailed(format!("failed to create container: {e}")))?;

    docker
        .start_container(CONTAINER_NAME, None::<StartContainerOptions<String>>)
        .await
        .map_err(|e| WhatsAppError::SetupFailed(format!("failed to start container: {e}")))?;

    info!(
        container = CONTAINER_NAME,
        image = %sidecar.image,
        "bridge sidecar created and started"
    );
    Ok(())
}

/// Ensure the container is up and wait until the bridge answers.
///
/// # Errors
///
/// Returns [`WhatsAppError::SetupFailed`] if the container cannot be started
/// or never becomes healthy.
pub async fn ensure_bridge(
    docker: &Docker,
    sidecar: &SidecarConfig,
    store: &SessionStore,
) -> Result<(), WhatsAppError> {
    ensure_container(docker, sidecar, store).await?;
    BridgeClient::with_port(sidecar.host_port)
        .wait_healthy()
        .await
}

/// `host:container` bind specs for the session directories.
///
/// # Errors
///
/// Returns [`WhatsAppError::SessionStore`] if a directory cannot be created
/// or resolved to an absolute path.
pub fn session_binds(store: &SessionStore) -> Result<Vec<String>, WhatsAppError> {
    Ok(vec![
        bind_spec(store.auth_dir(), CONTAINER_AUTH_DIR)?,
        bind_spec(store.cache_dir(), CONTAINER_CACHE_DIR)?,
    ])
}

fn bind_spec(host: &Path, container: &str) -> Result<String, WhatsAppError> {
    std::fs::create_dir_all(host)?;
    let absolute = std::path::absolute(host)?;
    Ok(format!("{}:{container}", absolute.display()))
}
