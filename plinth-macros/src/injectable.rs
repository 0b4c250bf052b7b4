//! `#[derive(Injectable)]`
//!
//! Expands field and type attributes into an `Injectable::declare` body that
//! calls the matching `Declaration` builder methods.

use proc_macro::TokenStream;
use quote::quote;
use syn::punctuated::Punctuated;
use syn::{parse_macro_input, Attribute, DeriveInput, Fields, Ident, Path, Token, Type};

#[derive(Clone, Copy, PartialEq, Eq)]
enum Kind {
    Service,
    Channel,
    Component,
    Components,
    Base,
}

/// Parsed `#[inject(...)]` of one field
struct InjectArgs {
    kind: Kind,
    global: bool,
    include_inactive: bool,
    parents: bool,
    on_injected: Option<Path>,
}

impl InjectArgs {
    fn parse(attr: &Attribute) -> syn::Result<Self> {
        let mut args = InjectArgs {
            kind: Kind::Service,
            global: false,
            include_inactive: false,
            parents: false,
            on_injected: None,
        };
        // bare `#[inject]`
        if matches!(attr.meta, syn::Meta::Path(_)) {
            return Ok(args);
        }

        attr.parse_nested_meta(|meta| {
            let set_kind = |args: &mut InjectArgs, kind| {
                if args.kind != Kind::Service {
                    return Err(meta.error("only one of channel, component, components or base is allowed"));
                }
                args.kind = kind;
                Ok(())
            };

            if meta.path.is_ident("channel") {
                set_kind(&mut args, Kind::Channel)
            } else if meta.path.is_ident("component") {
                set_kind(&mut args, Kind::Component)
            } else if meta.path.is_ident("components") {
                set_kind(&mut args, Kind::Components)
            } else if meta.path.is_ident("base") {
                set_kind(&mut args, Kind::Base)
            } else if meta.path.is_ident("global") {
                args.global = true;
                Ok(())
            } else if meta.path.is_ident("include_inactive") {
                args.include_inactive = true;
                Ok(())
            } else if meta.path.is_ident("parents") {
                args.parents = true;
                Ok(())
            } else if meta.path.is_ident("on_injected") {
                args.on_injected = Some(meta.value()?.parse()?);
                Ok(())
            } else {
                Err(meta.error(
                    "unknown inject option, expected one of: channel, component, components, base, \
                     global, include_inactive, parents, on_injected",
                ))
            }
        })?;

        if args.kind == Kind::Base
            && (args.global || args.include_inactive || args.parents || args.on_injected.is_some())
        {
            return Err(syn::Error::new_spanned(
                attr,
                "inject(base) takes no other options",
            ));
        }
        Ok(args)
    }
}

/// Implements `#[derive(Injectable)]`
///
/// # Example
///
/// ```rust,ignore
/// #[derive(Default, Injectable)]
/// #[listens(dyn ScoreEvents)]
/// #[updatable]
/// pub struct ScoreBoard {
///     #[inject(global)]
///     clock: Inject<Clock>,
///     #[inject(components, parents)]
///     hitboxes: InjectMany<Hitbox>,
///     total: Cell<u32>,
/// }
/// ```
///
/// expands to
///
/// ```rust,ignore
/// impl ::plinth::Injectable for ScoreBoard {
///     fn declare(decl: &mut ::plinth::Declaration<Self>) {
///         decl.service("clock", |this| &this.clock).global();
///         decl.components("hitboxes", |this| &this.hitboxes)
///             .flags(::plinth::InjectFlags::SEARCH_PARENTS);
///         decl.listen::<dyn ScoreEvents>(|this| this as ::std::rc::Rc<dyn ScoreEvents>);
///         decl.updatable();
///     }
/// }
/// ```
pub fn derive_injectable_impl(input: TokenStream) -> TokenStream {
    let input = parse_macro_input!(input as DeriveInput);
    match expand(&input) {
        Ok(expanded) => TokenStream::from(expanded),
        Err(err) => TokenStream::from(err.to_compile_error()),
    }
}

fn expand(input: &DeriveInput) -> syn::Result<proc_macro2::TokenStream> {
    let name = &input.ident;
    let (impl_generics, ty_generics, where_clause) = input.generics.split_for_impl();

    let fields = match &input.data {
        syn::Data::Struct(data) => match &data.fields {
            Fields::Named(named) => named.named.iter().collect::<Vec<_>>(),
            Fields::Unit => Vec::new(),
            Fields::Unnamed(_) => {
                return Err(syn::Error::new_spanned(
                    input,
                    "Injectable does not support tuple structs. Use named fields instead.",
                ))
            }
        },
        _ => {
            return Err(syn::Error::new_spanned(
                input,
                "Injectable can only be derived for structs",
            ))
        }
    };

    let mut statements = Vec::new();
    for field in fields {
        let Some(attr) = field.attrs.iter().find(|a| a.path().is_ident("inject")) else {
            continue;
        };
        let args = InjectArgs::parse(attr)?;
        let Some(ident) = field.ident.as_ref() else {
            continue;
        };
        statements.push(field_statement(ident, &args));
    }

    let mut listens = Vec::new();
    let mut updatable = false;
    for attr in &input.attrs {
        if attr.path().is_ident("listens") {
            let interfaces =
                attr.parse_args_with(Punctuated::<Type, Token![,]>::parse_terminated)?;
            for interface in interfaces {
                listens.push(quote! {
                    decl.listen::<#interface>(|this| this as ::std::rc::Rc<#interface>);
                });
            }
        } else if attr.path().is_ident("updatable") {
            updatable = true;
        }
    }
    let updatable = updatable.then(|| quote! { decl.updatable(); });

    Ok(quote! {
        impl #impl_generics ::plinth::Injectable for #name #ty_generics #where_clause {
            fn declare(decl: &mut ::plinth::Declaration<Self>) {
                #(#statements)*
                #(#listens)*
                #updatable
            }
        }
    })
}

fn field_statement(ident: &Ident, args: &InjectArgs) -> proc_macro2::TokenStream {
    let name = ident.to_string();
    let method = match args.kind {
        Kind::Service => quote!(service),
        Kind::Channel => quote!(channel),
        Kind::Component => quote!(component),
        Kind::Components => quote!(components),
        // base fields land ahead of the others whatever the declaration order
        Kind::Base => return quote! { decl.extend(|this| &this.#ident); },
    };

    let mut flags = Vec::new();
    if args.include_inactive {
        flags.push(quote!(::plinth::InjectFlags::INCLUDE_INACTIVE));
    }
    if args.parents {
        flags.push(quote!(::plinth::InjectFlags::SEARCH_PARENTS));
    }
    let flags = (!flags.is_empty()).then(|| quote! { .flags(#(#flags)|*) });
    let global = args.global.then(|| quote! { .global() });
    let on_injected = args
        .on_injected
        .as_ref()
        .map(|method| quote! { .on_injected(Self::#method) });

    quote! {
        decl.#method(#name, |this| &this.#ident)#flags #global #on_injected;
    }
}
