use std::fmt;

use tracing::{debug, error};

use super::descriptor::{
    BeanReference, EpbReference, PersistenceUnitReference, ReferenceDescriptors, ResReference,
};
use crate::application::Application;
use crate::errors::{NamingError, Result};
use crate::naming::{Binding, CallbackTarget, DeferredCallback, NamingUri};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ReferenceKind {
    Epb,
    Resource,
    Bean,
    PersistenceUnit,
}

impl fmt::Display for ReferenceKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            ReferenceKind::Epb => "Enterprise bean reference",
            ReferenceKind::Resource => "Resource reference",
            ReferenceKind::Bean => "Bean reference",
            ReferenceKind::PersistenceUnit => "Persistence unit reference",
        };
        f.write_str(name)
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RegistrationOutcome {
    Bound,
    AlreadyBound,
    /// The descriptor lacks what is needed to pick a binding target.
    Misconfigured(String),
    Failed(NamingError),
}

impl RegistrationOutcome {
    pub fn is_success(&self) -> bool {
        matches!(self, RegistrationOutcome::Bound | RegistrationOutcome::AlreadyBound)
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Registration {
    pub kind: ReferenceKind,
    /// Binding URI, or the raw ref name when no URI could be built.
    pub uri: String,
    pub outcome: RegistrationOutcome,
}

#[derive(Debug, Clone, Default)]
pub struct RegistrationReport {
    registrations: Vec<Registration>,
}

impl RegistrationReport {
    pub fn registrations(&self) -> &[Registration] {
        &self.registrations
    }

    pub fn outcome(&self, uri: &str) -> Option<&RegistrationOutcome> {
        self.registrations
            .iter()
            .find(|registration| registration.uri == uri)
            .map(|registration| &registration.outcome)
    }

    pub fn bound(&self) -> usize {
        self.registrations
            .iter()
            .filter(|r| r.outcome == RegistrationOutcome::Bound)
            .count()
    }

    pub fn problems(&self) -> impl Iterator<Item = &Registration> {
        self.registrations.iter().filter(|r| !r.outcome.is_success())
    }

    fn push(&mut self, registration: Registration) {
        self.registrations.push(registration);
    }
}

/// What a reference descriptor asks to be bound.
enum Plan {
    Bind(Binding),
    Skip(String),
}

fn callback(target: CallbackTarget, name: String) -> Plan {
    Plan::Bind(Binding::Callback(DeferredCallback::new(target, [name])))
}

/// Binds an application's declared references into its naming directory.
///
/// Registration is best effort: a reference that can't be bound is logged
/// and reported, and the remaining references are still registered.
/// References that are already bound are skipped, so redeploying is safe.
pub struct ReferenceRegistrar<'a> {
    application: &'a Application,
}

impl<'a> ReferenceRegistrar<'a> {
    pub fn new(application: &'a Application) -> Self {
        Self { application }
    }

    pub fn register_references(&self, references: &ReferenceDescriptors) -> RegistrationReport {
        let mut report = RegistrationReport::default();

        for reference in &references.epb_references {
            report.push(self.register_epb_reference(reference));
        }
        for reference in &references.res_references {
            report.push(self.register_res_reference(reference));
        }
        for reference in &references.bean_references {
            report.push(self.register_bean_reference(reference));
        }
        for reference in &references.persistence_unit_references {
            report.push(self.register_persistence_unit_reference(reference));
        }

        report
    }

    pub fn register_epb_reference(&self, reference: &EpbReference) -> Registration {
        self.register(ReferenceKind::Epb, &reference.ref_name, || {
            if let Some(lookup) = reference.lookup() {
                return Ok(callback(CallbackTarget::Lookup, lookup.to_string()));
            }

            let Some(bean_name) = reference.bean_name() else {
                return Ok(Plan::Skip("missing lookup/bean name".to_string()));
            };

            let interface = reference.bean_interface().unwrap_or_default();
            if interface == format!("{}Local", bean_name) {
                Ok(callback(CallbackTarget::LookupProxy, format!("{}/local", bean_name)))
            } else if interface == format!("{}Remote", bean_name) {
                Ok(callback(CallbackTarget::LookupProxy, format!("{}/remote", bean_name)))
            } else {
                Ok(Plan::Skip(format!(
                    "business interface '{}' is neither {}Local nor {}Remote",
                    interface, bean_name, bean_name
                )))
            }
        })
    }

    pub fn register_res_reference(&self, reference: &ResReference) -> Registration {
        self.register(ReferenceKind::Resource, &reference.ref_name, || {
            if let Some(lookup) = reference.lookup() {
                Ok(Plan::Bind(Binding::Reference(NamingUri::parse(lookup)?)))
            } else if let Some(res_type) = reference.res_type() {
                Ok(Plan::Bind(Binding::Reference(self.application.global_uri(res_type)?)))
            } else {
                Ok(Plan::Skip("missing lookup name/type".to_string()))
            }
        })
    }

    pub fn register_bean_reference(&self, reference: &BeanReference) -> Registration {
        self.register(ReferenceKind::Bean, &reference.ref_name, || match reference.bean_name() {
            Some(bean_name) => Ok(callback(CallbackTarget::LookupBean, bean_name.to_string())),
            None => Ok(Plan::Skip("missing bean name".to_string())),
        })
    }

    pub fn register_persistence_unit_reference(&self, reference: &PersistenceUnitReference) -> Registration {
        self.register(ReferenceKind::PersistenceUnit, &reference.ref_name, || {
            match reference.unit_name() {
                Some(unit_name) => {
                    // units resolve lazily, the manager must already be registered
                    self.application.persistence_manager()?;
                    Ok(callback(CallbackTarget::PersistenceUnitProxy, unit_name.to_string()))
                }
                None => Ok(Plan::Skip("missing unit name".to_string())),
            }
        })
    }

    fn register<F>(&self, kind: ReferenceKind, ref_name: &str, plan: F) -> Registration
    where
        F: FnOnce() -> Result<Plan>,
    {
        let uri = match self.application.global_uri(ref_name) {
            Ok(uri) => uri,
            Err(err) => {
                error!(reference = %ref_name, "Can't register {} {}: {}", kind, ref_name, err);
                return Registration {
                    kind,
                    uri: ref_name.to_string(),
                    outcome: RegistrationOutcome::Failed(err),
                };
            }
        };

        let outcome = self.bind(kind, &uri, plan);
        Registration {
            kind,
            uri: uri.to_string(),
            outcome,
        }
    }

    fn bind<F>(&self, kind: ReferenceKind, uri: &NamingUri, plan: F) -> RegistrationOutcome
    where
        F: FnOnce() -> Result<Plan>,
    {
        let directory = self.application.naming_directory();

        match directory.is_bound_uri(uri) {
            Ok(true) => {
                debug!("{} {} has already been bound to naming directory", kind, uri);
                return RegistrationOutcome::AlreadyBound;
            }
            Ok(false) => debug!("{} {} has not been bound to naming directory", kind, uri),
            Err(err) => {
                error!(reference = %uri, "Can't bind {} {} to naming directory: {}", kind, uri, err);
                return RegistrationOutcome::Failed(err);
            }
        }

        let result = plan().and_then(|plan| match plan {
            Plan::Bind(binding) => directory
                .bind_uri(uri, binding)
                .map(|()| RegistrationOutcome::Bound),
            Plan::Skip(reason) => Ok(RegistrationOutcome::Misconfigured(reason)),
        });

        match result {
            Ok(RegistrationOutcome::Misconfigured(reason)) => {
                error!(
                    reference = %uri,
                    "Can't bind {} {} to naming directory, because of {}", kind, uri, reason
                );
                RegistrationOutcome::Misconfigured(reason)
            }
            Ok(outcome) => outcome,
            Err(NamingError::AlreadyBound(_)) => {
                debug!("{} {} was bound concurrently to naming directory", kind, uri);
                RegistrationOutcome::AlreadyBound
            }
            Err(err) => {
                error!(reference = %uri, "Can't bind {} {} to naming directory: {}", kind, uri, err);
                RegistrationOutcome::Failed(err)
            }
        }
    }
}
