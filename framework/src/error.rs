//! Locator-wide error types
//!
//! Nothing in the core propagates these to callers of the registry or the
//! event bus: every failure surfaces as a `bool`/`Option` return plus a log
//! entry carrying one of these values. `Registry::resolve` is the one entry
//! point that hands a `LocatorError` back, for callers that prefer `?`.

use thiserror::Error;

/// Failures observed by the registry, the waiter replay and the event bus
///
/// # Example
///
/// ```rust
/// use plinth::LocatorError;
///
/// struct AudioMixer;
///
/// let err = LocatorError::not_registered::<AudioMixer>();
/// assert!(err.to_string().contains("AudioMixer"));
/// ```
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum LocatorError {
    /// No instance and no registration descriptor exist for the type
    #[error("service '{type_name}' has no registration")]
    NotRegistered {
        /// The requested type
        type_name: &'static str,
    },

    /// The type is asset-backed but the loader produced nothing
    #[error("no shared asset instance found for '{type_name}'")]
    AssetMissing {
        /// The requested type
        type_name: &'static str,
    },

    /// Creation of a type was requested again before its first construction finished
    #[error("circular construction of '{type_name}'")]
    CircularDependency {
        /// The type under construction
        type_name: &'static str,
    },

    /// An erased instance does not have the concrete type it was registered under
    #[error("instance registered as '{type_name}' has a different concrete type")]
    TypeMismatch {
        /// The key the instance was offered under
        type_name: &'static str,
    },

    /// A structural reference could not be found for an owner
    #[error("structural lookup for '{type_name}' on '{owner}' found nothing")]
    ComponentNotFound {
        /// The structural type that was searched for
        type_name: &'static str,
        /// The owner whose field was being injected
        owner: &'static str,
    },

    /// A component-scoped channel was requested for an owner without a local bus
    #[error("'{owner}' has no local event bus for '{interface}'")]
    NoLocalBus {
        /// The listener interface
        interface: &'static str,
        /// The owner whose field was being injected
        owner: &'static str,
    },

    /// A listener (or a catcher) failed during a dispatch
    #[error("listener of '{interface}' failed: {message}")]
    ListenerFailed {
        /// The listener interface being dispatched
        interface: &'static str,
        /// The panic payload or error text
        message: String,
    },

    /// A post-injection callback failed
    #[error("injection callback for '{field}' on '{owner}' failed: {message}")]
    CallbackFailed {
        /// The owner type
        owner: &'static str,
        /// The field whose binding triggered the callback
        field: &'static str,
        /// The panic payload
        message: String,
    },

    /// An update hook failed during a tick
    #[error("update of '{name}' failed: {message}")]
    UpdateFailed {
        /// The scheduled entry
        name: &'static str,
        /// The panic payload
        message: String,
    },
}

impl LocatorError {
    /// Create a NotRegistered error for a given type
    pub fn not_registered<T: ?Sized>() -> Self {
        Self::NotRegistered {
            type_name: std::any::type_name::<T>(),
        }
    }

    /// Create an AssetMissing error for a given type
    pub fn asset_missing<T: ?Sized>() -> Self {
        Self::AssetMissing {
            type_name: std::any::type_name::<T>(),
        }
    }

    /// Create a CircularDependency error for a given type
    pub fn circular<T: ?Sized>() -> Self {
        Self::CircularDependency {
            type_name: std::any::type_name::<T>(),
        }
    }
}

/// Render a caught panic payload as text
pub(crate) fn panic_message(payload: &(dyn std::any::Any + Send)) -> String {
    if let Some(message) = payload.downcast_ref::<&'static str>() {
        (*message).to_string()
    } else if let Some(message) = payload.downcast_ref::<String>() {
        message.clone()
    } else {
        "non-string panic payload".to_string()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_constructors_capture_type_names() {
        struct Mixer;

        match LocatorError::not_registered::<Mixer>() {
            LocatorError::NotRegistered { type_name } => assert!(type_name.ends_with("Mixer")),
            other => panic!("unexpected {other:?}"),
        }
        assert!(LocatorError::circular::<Mixer>()
            .to_string()
            .starts_with("circular construction"));
    }

    #[test]
    fn test_panic_message_variants() {
        let boxed: Box<dyn std::any::Any + Send> = Box::new("boom");
        assert_eq!(panic_message(boxed.as_ref()), "boom");

        let boxed: Box<dyn std::any::Any + Send> = Box::new(String::from("owned"));
        assert_eq!(panic_message(boxed.as_ref()), "owned");

        let boxed: Box<dyn std::any::Any + Send> = Box::new(7_u8);
        assert_eq!(panic_message(boxed.as_ref()), "non-string panic payload");
    }
}
