//! Deployment file loading and application deployment.

use std::collections::{BTreeMap, HashSet};
use std::path::Path;
use std::sync::Arc;

use anyhow::{bail, Context, Result};
use serde::{Deserialize, Serialize};
use tracing::{info, warn};

use crate::application::Application;
use crate::container::{BeanContainer, PersistenceUnits, DEFAULT_MAX_SESSIONS};
use crate::epb::descriptor::{ObjectDescriptor, ReferenceDescriptors, SessionType};
use crate::epb::registrar::{ReferenceRegistrar, RegistrationReport};

/// One application entry of the deployment file.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ApplicationDescriptor {
    pub name: String,
    #[serde(default)]
    pub unique_name: Option<String>,
    /// Literal values bound below the application's global context.
    #[serde(default)]
    pub resources: BTreeMap<String, String>,
    #[serde(default)]
    pub beans: Vec<ObjectDescriptor>,
    #[serde(default)]
    pub persistence_units: Vec<String>,
    /// Cap on stateful bean instances kept across sessions.
    #[serde(default)]
    pub max_sessions: Option<usize>,
    #[serde(default)]
    pub references: ReferenceDescriptors,
}

impl ApplicationDescriptor {
    pub fn unique_name(&self) -> &str {
        self.unique_name.as_deref().unwrap_or(&self.name)
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct DeploymentFile {
    #[serde(default)]
    pub applications: Vec<ApplicationDescriptor>,
}

impl DeploymentFile {
    pub fn load(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        let content = std::fs::read_to_string(path)
            .with_context(|| format!("Failed to read deployment file {}", path.display()))?;
        Self::from_yaml(&content)
            .with_context(|| format!("Invalid deployment file {}", path.display()))
    }

    pub fn from_yaml(content: &str) -> Result<Self> {
        let file: DeploymentFile = serde_yaml::from_str(content)?;
        file.validate()?;
        Ok(file)
    }

    pub fn validate(&self) -> Result<()> {
        let mut names = HashSet::new();
        let mut unique_names = HashSet::new();
        for application in &self.applications {
            if application.name.trim().is_empty() {
                bail!("Application without a name");
            }
            if !names.insert(application.name.as_str()) {
                bail!("Application {} is declared twice", application.name);
            }
            if !unique_names.insert(application.unique_name()) {
                bail!("Unique name {} is used twice", application.unique_name());
            }
        }
        Ok(())
    }
}

/// A deployed application together with the container backing its beans.
pub struct Deployment {
    pub application: Arc<Application>,
    pub container: Arc<BeanContainer>,
    pub report: RegistrationReport,
}

impl Deployment {
    /// Registers `references` again, as a hot redeploy does.
    pub fn redeploy_references(&self, references: &ReferenceDescriptors) -> RegistrationReport {
        ReferenceRegistrar::new(&self.application).register_references(references)
    }

    /// Unbinds the application and drops every bean instance its container holds.
    pub fn undeploy(&self) -> crate::errors::Result<()> {
        self.application.undeploy()?;
        self.container.clear();
        Ok(())
    }
}

pub fn deploy(descriptor: &ApplicationDescriptor) -> Result<Deployment> {
    let container = Arc::new(
        BeanContainer::new(descriptor.beans.iter().cloned())
            .with_max_sessions(descriptor.max_sessions.unwrap_or(DEFAULT_MAX_SESSIONS)),
    );

    let mut application = Application::new(&descriptor.name, container.clone())
        .with_unique_name(descriptor.unique_name())
        .with_bean_manager(container.clone());
    if !descriptor.persistence_units.is_empty() {
        application = application.with_persistence_manager(Arc::new(PersistenceUnits::new(
            descriptor.persistence_units.iter().cloned(),
        )));
    }

    for bean in &descriptor.beans {
        application.object_manager().add(bean.clone());
        if bean.session_type != SessionType::MessageDriven {
            application.register_component(&bean.name, container.shared_instance(&bean.name)?);
        }
    }

    for (name, value) in &descriptor.resources {
        let uri = application.global_uri(name)?;
        application
            .naming_directory()
            .bind_value(&uri.to_string(), value.as_str())
            .with_context(|| format!("Failed to bind resource {}", uri))?;
    }

    let report = ReferenceRegistrar::new(&application).register_references(&descriptor.references);
    for problem in report.problems() {
        warn!("{} {} left unresolved: {:?}", problem.kind, problem.uri, problem.outcome);
    }
    info!(
        "Deployed application {} as {} ({} of {} references bound)",
        application.name(),
        application.unique_name(),
        report.bound(),
        descriptor.references.len()
    );

    Ok(Deployment {
        application: Arc::new(application),
        container,
        report,
    })
}

pub fn deploy_all(file: &DeploymentFile) -> Result<Vec<Deployment>> {
    file.applications
        .iter()
        .map(|descriptor| {
            deploy(descriptor).with_context(|| format!("Failed to deploy application {}", descriptor.name))
        })
        .collect()
}
