//! Waits for an ECS service to settle on a newly deployed release.

use std::collections::{HashMap, HashSet};
use std::thread;
use std::time::{Duration, Instant};

use anyhow::{Context, Result};
use sha1::{Digest, Sha1};
use thiserror::Error;
use tracing::{info, instrument};

use crate::aws::AwsSession;

const MAX_SERVICE_NAME_LENGTH: usize = 32;

#[derive(Debug, Error)]
pub enum MonitorError {
    #[error("deployed image {actual} does not match release {expected}")]
    ImageDoesNotMatch { expected: String, actual: String },
    #[error("deployment did not complete within {0:?}")]
    Timeout(Duration),
    #[error("service {0} has no PRIMARY deployment")]
    NoPrimaryDeployment(String),
}

/// The ECS service name Terraform gives `<env>-<component>`, hashed down to
/// 32 characters when longer.
pub fn build_service_name(environment: &str, component: &str) -> String {
    let name = format!("{environment}-{component}");
    if name.chars().count() <= MAX_SERVICE_NAME_LENGTH {
        return name;
    }
    let digest = format!("{:x}", Sha1::digest(name.as_bytes()));
    let head: String = name.chars().take(24).collect();
    format!("{}tf{}", head, &digest[..4])
}

pub struct EcsMonitor<'a> {
    session: &'a dyn AwsSession,
    cluster: &'a str,
    component: &'a str,
    version: &'a str,
    service: String,
    interval: Duration,
    timeout: Duration,
}

impl<'a> EcsMonitor<'a> {
    pub fn new(
        session: &'a dyn AwsSession,
        cluster: &'a str,
        environment: &str,
        component: &'a str,
        version: &'a str,
    ) -> Self {
        Self {
            session,
            cluster,
            component,
            version,
            service: build_service_name(environment, component),
            interval: Duration::from_secs(5),
            timeout: Duration::from_secs(600),
        }
    }

    pub fn with_timing(mut self, interval: Duration, timeout: Duration) -> Self {
        self.interval = interval;
        self.timeout = timeout;
        self
    }

    pub fn service_name(&self) -> &str {
        &self.service
    }

    fn release_image(&self, images: &mut HashMap<String, String>, task: &str) -> Result<String> {
        if let Some(image) = images.get(task) {
            return Ok(image.clone());
        }
        let image = self
            .session
            .ecs()
            .task_definition_image(task)
            .with_context(|| format!("failed to describe task definition {}", task))?;
        let image = image
            .split_once('/')
            .map(|(_, name)| name.to_string())
            .unwrap_or(image);
        images.insert(task.to_string(), image.clone());
        Ok(image)
    }

    #[instrument(skip(self), fields(cluster = self.cluster, service = %self.service))]
    pub fn wait(&self) -> Result<()> {
        let expected = format!("{}:{}", self.component, self.version);
        let started = Instant::now();
        let mut images = HashMap::new();
        let mut seen_events = HashSet::new();

        loop {
            let service = self
                .session
                .ecs()
                .describe_service(self.cluster, &self.service)
                .with_context(|| format!("failed to describe service {}", self.service))?;

            for event in service.events.iter().rev() {
                if seen_events.insert(event.clone()) {
                    info!("ECS service event - {}", event);
                }
            }

            let primary = service
                .deployments
                .iter()
                .find(|d| d.status == "PRIMARY")
                .ok_or_else(|| MonitorError::NoPrimaryDeployment(self.service.clone()))?;

            let actual = self.release_image(&mut images, &primary.task_definition)?;
            if actual != expected {
                return Err(MonitorError::ImageDoesNotMatch { expected, actual }.into());
            }

            let previous: i32 = service
                .deployments
                .iter()
                .filter(|d| d.status != "PRIMARY")
                .map(|d| d.running_count)
                .sum();
            info!(
                "ECS service tasks - desired: {} pending: {} running: {} previous: {}",
                primary.desired_count, primary.pending_count, primary.running_count, previous
            );

            if primary.running_count == primary.desired_count && previous == 0 {
                info!("Deployment complete");
                return Ok(());
            }
            if started.elapsed() >= self.timeout {
                return Err(MonitorError::Timeout(self.timeout).into());
            }
            thread::sleep(self.interval);
        }
    }
}
