//! `#[page_routes]` implementation.

use proc_macro2::{Span, TokenStream};
use quote::{format_ident, quote};
use syn::parse::Parser;
use syn::punctuated::Punctuated;
use syn::spanned::Spanned;
use syn::{Attribute, Ident, ImplItem, ItemImpl, LitStr, Path, Token, Type};

// ============================================================================
// Macro arguments
// ============================================================================

/// `#[page_routes(inherit = Base, crate = path)]`
pub struct PageArgs {
    krate: Path,
    inherit: Vec<Path>,
}

impl PageArgs {
    pub fn parse(attr: TokenStream) -> syn::Result<Self> {
        let mut krate: Option<Path> = None;
        let mut inherit = Vec::new();

        let parser = syn::meta::parser(|meta| {
            if meta.path.is_ident("inherit") {
                inherit.push(meta.value()?.parse::<Path>()?);
            } else if meta.path.is_ident("crate") {
                krate = Some(meta.value()?.parse::<Path>()?);
            } else {
                return Err(meta.error("expected `inherit = Type` or `crate = path`"));
            }
            Ok(())
        });
        parser.parse2(attr)?;

        Ok(Self {
            krate: krate.unwrap_or_else(|| syn::parse_quote!(::pathway_framework)),
            inherit,
        })
    }
}

// ============================================================================
// Route attributes
// ============================================================================

#[derive(Clone, Copy)]
enum TagKind {
    Before,
    After,
    Path,
    Api,
    Verbs,
    Required,
    Optional,
}

impl TagKind {
    fn of(attr: &Attribute) -> Option<Self> {
        let ident = attr.path().get_ident()?;
        Some(match ident.to_string().as_str() {
            "request_before" => Self::Before,
            "request_after" => Self::After,
            "request_path" => Self::Path,
            "api_path" => Self::Api,
            "request_type" => Self::Verbs,
            "required_variables" => Self::Required,
            "optional_variables" => Self::Optional,
            _ => return None,
        })
    }

    fn variant(self) -> Ident {
        let name = match self {
            Self::Before => "Before",
            Self::After => "After",
            Self::Path => "Path",
            Self::Api => "Api",
            Self::Verbs => "Verbs",
            Self::Required => "Required",
            Self::Optional => "Optional",
        };
        Ident::new(name, Span::call_site())
    }
}

/// Tags collected from one member.
#[derive(Default)]
struct Tags {
    tokens: Vec<TokenStream>,
    routed: bool,
    /// Span of the first metadata-only attribute.
    metadata: Option<Span>,
}

const VERBS: [(&str, &str); 9] = [
    ("GET", "Get"),
    ("POST", "Post"),
    ("PUT", "Put"),
    ("DELETE", "Delete"),
    ("PATCH", "Patch"),
    ("HEAD", "Head"),
    ("OPTIONS", "Options"),
    ("TRACE", "Trace"),
    ("CONNECT", "Connect"),
];

/// Removes route attributes from `attrs` and converts them to `RouteTag` expressions.
fn take_tags(attrs: &mut Vec<Attribute>, krate: &Path) -> syn::Result<Tags> {
    let mut tags = Tags::default();
    let mut kept = Vec::with_capacity(attrs.len());

    for attr in attrs.drain(..) {
        let Some(kind) = TagKind::of(&attr) else {
            kept.push(attr);
            continue;
        };
        let variant = kind.variant();

        match kind {
            TagKind::Before | TagKind::After | TagKind::Path | TagKind::Api => {
                for pattern in string_list(&attr)? {
                    tags.tokens.push(quote! {
                        #krate::RouteTag::#variant(::std::string::String::from(#pattern))
                    });
                }
                tags.routed = true;
            }
            TagKind::Verbs => {
                let verbs = verb_list(&attr)?;
                tags.tokens.push(quote! {
                    #krate::RouteTag::Verbs(#krate::VerbSet::new() #(.with(#krate::Verb::#verbs))*)
                });
                tags.metadata.get_or_insert(attr.span());
            }
            TagKind::Required | TagKind::Optional => {
                let names = string_list(&attr)?;
                tags.tokens.push(quote! {
                    #krate::RouteTag::#variant(::std::vec![#(::std::string::String::from(#names)),*])
                });
                tags.metadata.get_or_insert(attr.span());
            }
        }
    }

    *attrs = kept;
    Ok(tags)
}

fn string_list(attr: &Attribute) -> syn::Result<Vec<LitStr>> {
    let list = attr.parse_args_with(Punctuated::<LitStr, Token![,]>::parse_terminated)?;
    if list.is_empty() {
        return Err(syn::Error::new(attr.span(), "expected at least one string literal"));
    }
    Ok(list.into_iter().collect())
}

fn verb_list(attr: &Attribute) -> syn::Result<Vec<Ident>> {
    let list = attr.parse_args_with(Punctuated::<Ident, Token![,]>::parse_terminated)?;
    if list.is_empty() {
        return Err(syn::Error::new(attr.span(), "expected at least one request type"));
    }

    list.into_iter()
        .map(|ident| {
            let wanted = ident.to_string().to_ascii_uppercase();
            VERBS
                .iter()
                .find(|(name, _)| *name == wanted)
                .map(|(_, variant)| format_ident!("{}", variant, span = ident.span()))
                .ok_or_else(|| {
                    syn::Error::new(
                        ident.span(),
                        format!(
                            "unknown request type `{ident}`, expected one of: \
                             GET, POST, PUT, DELETE, PATCH, HEAD, OPTIONS, TRACE, CONNECT"
                        ),
                    )
                })
        })
        .collect()
}

fn is_reroute(ty: &Type) -> bool {
    match ty {
        Type::Path(path) => path
            .path
            .segments
            .last()
            .is_some_and(|segment| segment.ident == "Reroute"),
        _ => false,
    }
}

// ============================================================================
// Expansion
// ============================================================================

pub fn expand(args: &PageArgs, mut item: ItemImpl) -> syn::Result<TokenStream> {
    if let Some((_, trait_path, _)) = &item.trait_ {
        return Err(syn::Error::new(
            trait_path.span(),
            "#[page_routes] must be placed on an inherent impl block",
        ));
    }

    let krate = &args.krate;
    let mut registrations = Vec::new();

    for member in &mut item.items {
        match member {
            ImplItem::Fn(method) => {
                let tags = take_tags(&mut method.attrs, krate)?;
                if !tags.routed {
                    if let Some(span) = tags.metadata {
                        return Err(syn::Error::new(
                            span,
                            "request metadata needs a route attribute on the same method",
                        ));
                    }
                    continue;
                }
                if method.sig.receiver().is_none() {
                    return Err(syn::Error::new(
                        method.sig.ident.span(),
                        "routed methods must take `&self` or `&mut self`",
                    ));
                }

                let ident = &method.sig.ident;
                let name = ident.to_string();
                let tags = tags.tokens;
                registrations.push(quote! {
                    __descriptor.operation(#name, Self::#ident, ::std::vec![#(#tags),*]);
                });
            }
            ImplItem::Const(constant) => {
                let tags = take_tags(&mut constant.attrs, krate)?;
                if tags.tokens.is_empty() {
                    continue;
                }

                let ident = &constant.ident;
                let name = ident.to_string();
                let ty = &constant.ty;
                let tags = tags.tokens;
                registrations.push(if is_reroute(ty) {
                    quote! {
                        __descriptor.field(#name, Self::#ident, ::std::vec![#(#tags),*]);
                    }
                } else {
                    quote! {
                        __descriptor.opaque_field::<#ty>(#name, ::std::vec![#(#tags),*]);
                    }
                });
            }
            _ => {}
        }
    }

    let bases = &args.inherit;
    let self_ty = &item.self_ty;
    let (impl_generics, _, where_clause) = item.generics.split_for_impl();

    Ok(quote! {
        #item

        impl #impl_generics #krate::PageRoutes for #self_ty #where_clause {
            fn describe(__descriptor: &mut #krate::TypeDescriptor<Self>) {
                #( __descriptor.inherit::<#bases>(); )*
                #( #registrations )*
            }
        }
    })
}
