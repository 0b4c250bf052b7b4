//! `#[service(...)]` attribute macro
//!
//! Leaves the item untouched and submits a `ServiceEntry` for it to the
//! link-time registration table.

use proc_macro::TokenStream;
use quote::quote;
use syn::parse::{Parse, ParseStream};
use syn::{parse_macro_input, DeriveInput, Expr, Ident, LitStr, Token};

/// Parsed arguments from the service attribute
#[derive(Default)]
struct ServiceArgs {
    order: Option<Expr>,
    group: Option<LitStr>,
    lazy: bool,
    dynamic: bool,
    editor_only: bool,
    asset: bool,
}

impl Parse for ServiceArgs {
    fn parse(input: ParseStream) -> syn::Result<Self> {
        let mut args = ServiceArgs::default();

        while !input.is_empty() {
            let name: Ident = input.parse()?;
            match name.to_string().as_str() {
                "order" => {
                    input.parse::<Token![=]>()?;
                    args.order = Some(input.parse()?);
                }
                "group" => {
                    input.parse::<Token![=]>()?;
                    args.group = Some(input.parse()?);
                }
                "lazy" => args.lazy = true,
                "dynamic" => args.dynamic = true,
                "editor_only" => args.editor_only = true,
                "asset" => args.asset = true,
                _ => {
                    return Err(syn::Error::new(
                        name.span(),
                        format!(
                            "unknown parameter '{}', expected one of: order, group, lazy, dynamic, editor_only, asset",
                            name
                        ),
                    ))
                }
            }

            if input.peek(Token![,]) {
                input.parse::<Token![,]>()?;
            }
        }

        Ok(args)
    }
}

/// Implements the `#[service]` attribute macro
///
/// # Example
///
/// ```rust,ignore
/// #[service(order = -10, lazy)]
/// #[derive(Default, Injectable)]
/// pub struct Clock;
/// ```
///
/// submits
///
/// ```rust,ignore
/// ::plinth::inventory::submit! {
///     ::plinth::ServiceEntry {
///         name: "Clock",
///         registration: || ::plinth::Registration::of::<Clock>().order(-10).lazy(),
///     }
/// }
/// ```
pub fn service_impl(attr: TokenStream, input: TokenStream) -> TokenStream {
    let args = parse_macro_input!(attr as ServiceArgs);
    let item = parse_macro_input!(input as DeriveInput);
    let name = &item.ident;
    let name_str = name.to_string();

    if !item.generics.params.is_empty() {
        return syn::Error::new_spanned(
            &item.generics,
            "service cannot be used on generic types; register each instantiation with Registration::of",
        )
        .to_compile_error()
        .into();
    }

    let base = if args.asset {
        quote! { ::plinth::Registration::asset::<#name>() }
    } else {
        quote! { ::plinth::Registration::of::<#name>() }
    };
    let order = args.order.as_ref().map(|order| quote! { .order(#order) });
    let group = args.group.as_ref().map(|group| quote! { .group(#group) });
    let lazy = args.lazy.then(|| quote! { .lazy() });
    let dynamic = args.dynamic.then(|| quote! { .dynamic() });
    let editor_only = args.editor_only.then(|| quote! { .editor_only() });

    let expanded = quote! {
        #item

        ::plinth::inventory::submit! {
            ::plinth::ServiceEntry {
                name: #name_str,
                registration: || #base #order #group #lazy #dynamic #editor_only,
            }
        }
    };

    TokenStream::from(expanded)
}
