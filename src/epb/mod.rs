//! Enterprise bean references: declarations, registration into the naming
//! directory and resolution of the deferred bindings that registration leaves.

pub mod descriptor;
pub mod proxy;
pub mod registrar;
pub mod resolver;

pub use descriptor::{
    BeanReference, EpbReference, ObjectDescriptor, ObjectManager, PersistenceUnitReference,
    ReferenceDescriptors, ResReference, SessionType,
};
pub use proxy::LocalProxy;
pub use registrar::{ReferenceKind, ReferenceRegistrar, Registration, RegistrationOutcome, RegistrationReport};
pub use resolver::ProxyResolver;
