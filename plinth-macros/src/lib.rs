//! Procedural macros for plinth
//!
//! This crate provides:
//! - `#[derive(Injectable)]` to declare dependency fields, listener
//!   interfaces and the update hook of a type
//! - `#[service(...)]` to add a type to the registration table

use proc_macro::TokenStream;

mod injectable;
mod service;

/// Derive macro for the `Injectable` trait
///
/// # Field attributes
///
/// - `#[inject]`: a plain service resolved through the registry
/// - `#[inject(channel)]`: the event-bus channel of the field's interface
/// - `#[inject(component)]` / `#[inject(components)]`: structural references
///   found through the scene query
/// - `#[inject(base)]`: an embedded injectable whose fields come first
///
/// Options, combinable with the kinds above: `global`, `include_inactive`,
/// `parents`, `on_injected = method`.
///
/// # Type attributes
///
/// - `#[listens(dyn ScoreEvents, ...)]`: instances listen to these interfaces
/// - `#[updatable]`: instances join the update schedule (requires `Update`)
///
/// # Example
///
/// ```rust,ignore
/// use plinth::{Channel, Inject, Injectable};
///
/// #[derive(Default, Injectable)]
/// #[listens(dyn ScoreEvents)]
/// pub struct ScoreBoard {
///     #[inject(on_injected = clock_ready)]
///     clock: Inject<Clock>,
///     #[inject(channel)]
///     audio: Inject<Channel<dyn AudioEvents>>,
/// }
/// ```
#[proc_macro_derive(Injectable, attributes(inject, listens, updatable))]
pub fn derive_injectable(input: TokenStream) -> TokenStream {
    injectable::derive_injectable_impl(input)
}

/// Add a type to the registration table
///
/// Parameters (all optional):
/// - `order = N`: creation order during the configuration pass, lower first
/// - `lazy`: skip the configuration pass, create on first request
/// - `dynamic`: the instance may be removed and replaced at runtime
/// - `editor_only`: only created in editor mode
/// - `asset`: fetch the instance from the asset loader instead of constructing it
/// - `group = "name"`: override the group used by the group allow-list
///
/// # Example
///
/// ```rust,ignore
/// use plinth::{service, Injectable, Service};
///
/// #[service(order = 10, dynamic)]
/// #[derive(Default, Injectable)]
/// pub struct AudioMixer;
///
/// impl Service for AudioMixer {}
/// ```
#[proc_macro_attribute]
pub fn service(attr: TokenStream, input: TokenStream) -> TokenStream {
    service::service_impl(attr, input)
}
