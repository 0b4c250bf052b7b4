//! Collaborators the host supplies to the registry
//!
//! The registry never walks a scene hierarchy, loads assets or decides
//! whether an object is still alive on its own. The host plugs those
//! capabilities in through [`RegistryBuilder`](super::RegistryBuilder); the
//! defaults here find nothing and treat everything as alive.

use std::any::Any;
use std::rc::Rc;

use super::inject::InjectFlags;
use crate::events::EventBus;
use crate::key::TypeKey;

/// Structural lookups against the live object hierarchy
pub trait SceneQuery {
    /// One object of type `target` related to `owner`
    fn find(&self, owner: &dyn Any, target: TypeKey, flags: InjectFlags) -> Option<Rc<dyn Any>>;

    /// Every object of type `target` related to `owner`
    fn find_all(&self, owner: &dyn Any, target: TypeKey, flags: InjectFlags) -> Vec<Rc<dyn Any>> {
        self.find(owner, target, flags).into_iter().collect()
    }

    /// The event bus local to `owner`, for component-scoped channel fields
    fn local_bus(&self, _owner: &dyn Any) -> Option<Rc<EventBus>> {
        None
    }
}

/// Loader for asset-backed services
pub trait AssetLoader {
    /// The pre-existing shared instance of `key`, if one exists
    fn load(&self, key: TypeKey) -> Option<Rc<dyn Any>>;
}

/// Host-side validity check for injection owners
pub trait Liveness {
    /// Whether `owner` may still receive injected values
    fn is_alive(&self, _owner: &dyn Any) -> bool {
        true
    }
}

/// A scene with nothing in it
#[derive(Debug, Default, Clone, Copy)]
pub struct NoScene;

impl SceneQuery for NoScene {
    fn find(&self, _owner: &dyn Any, _target: TypeKey, _flags: InjectFlags) -> Option<Rc<dyn Any>> {
        None
    }
}

/// An asset store with nothing in it
#[derive(Debug, Default, Clone, Copy)]
pub struct NoAssets;

impl AssetLoader for NoAssets {
    fn load(&self, _key: TypeKey) -> Option<Rc<dyn Any>> {
        None
    }
}

/// Every owner is alive for as long as it is referenced
#[derive(Debug, Default, Clone, Copy)]
pub struct AlwaysAlive;

impl Liveness for AlwaysAlive {}
