use proc_macro::TokenStream;
use proc_macro2::TokenStream as TokenStream2;
use quote::{format_ident, quote};
use syn::{
    parse_macro_input, parse_quote, DeriveInput, Expr, ExprLit, Field, FieldsNamed, GenericParam,
    Generics, Lit, LitStr, Path, Token,
};

enum DefaultFallback {
    Path(Path),
    Yes,
}

struct FieldAttrs {
    canary: bool,
    since: Option<Expr>,
    default: DefaultFallback,
    with: Option<Path>,
}

fn field_attrs(f: &Field) -> FieldAttrs {
    let mut result = FieldAttrs {
        canary: false,
        since: None,
        default: DefaultFallback::Yes,
        with: None,
    };

    for attr in f.attrs.iter().filter(|attr| attr.path().is_ident("tagsave")) {
        let parsed = attr.parse_nested_meta(|meta| {
            if meta.path.is_ident("canary") {
                result.canary = true;
            } else if meta.path.is_ident("since") {
                // since = 3 or since = "TagMinor::GhostFlies"
                let expr: Expr = meta.value()?.parse()?;
                result.since = Some(match expr {
                    Expr::Lit(ExprLit {
                        lit: Lit::Str(lit), ..
                    }) => lit.parse()?,
                    x => x,
                });
            } else if meta.path.is_ident("default") {
                if meta.input.peek(Token![=]) {
                    let lit: LitStr = meta.value()?.parse()?;
                    result.default = DefaultFallback::Path(lit.parse()?);
                }
            } else if meta.path.is_ident("with") {
                let lit: LitStr = meta.value()?.parse()?;
                result.with = Some(lit.parse()?);
            } else {
                return Err(meta.error("unrecognized tagsave attribute"));
            }
            Ok(())
        });

        if let Err(e) = parsed {
            panic!("invalid tagsave attribute: {}", e);
        }
    }

    result
}

fn named_fields(input: &DeriveInput) -> &FieldsNamed {
    let syn_struct = match &input.data {
        syn::Data::Struct(x) => x,
        _ => panic!("Expected struct"),
    };

    match &syn_struct.fields {
        syn::Fields::Named(x) => x,
        _ => panic!("Expected named fields"),
    }
}

fn add_bounds(mut generics: Generics, bound: TokenStream2) -> Generics {
    for param in &mut generics.params {
        if let GenericParam::Type(ref mut type_param) = *param {
            type_param.bounds.push(parse_quote!(#bound));
        }
    }
    generics
}

/// Creates a `tagsave::Marshal` implementation that writes each field in
/// declaration order
///
/// ```rust
/// use tagsave_derive::Marshal;
///
/// #[derive(Marshal)]
/// pub struct Ghost {
///     name: String,
///     #[tagsave(with = "tagsave::varint")]
///     experience: u64,
///     #[tagsave(canary)]
///     spells: Vec<i16>,
/// }
/// ```
///
/// Field attributes:
///
/// - `#[tagsave(canary)]`: a canary byte precedes the field
/// - `#[tagsave(with = "module")]`: call `module::marshal(&field, sink)`
///   instead of the field's own `Marshal` implementation
///
/// `since` and `default` are accepted and ignored: the writer always writes
/// the newest layout.
#[proc_macro_derive(Marshal, attributes(tagsave))]
pub fn derive_marshal(input: TokenStream) -> TokenStream {
    let dinput = parse_macro_input!(input as DeriveInput);
    let struct_ident = &dinput.ident;
    let fields = named_fields(&dinput);

    let generics = add_bounds(dinput.generics.clone(), quote! { ::tagsave::Marshal });
    let (impl_generics, ty_generics, where_clause) = generics.split_for_impl();

    let writes = fields.named.iter().map(|f| {
        let name = &f.ident;
        let attrs = field_attrs(f);
        let canary = if attrs.canary {
            quote! { ::tagsave::Canary::mark(__w); }
        } else {
            quote! {}
        };

        let write = match attrs.with {
            Some(module) => quote! { #module::marshal(&self.#name, __w); },
            None => quote! { ::tagsave::Marshal::marshal(&self.#name, __w); },
        };

        quote! {
            #canary
            #write
        }
    });

    let expanded = quote! {
        impl #impl_generics ::tagsave::Marshal for #struct_ident #ty_generics #where_clause {
            fn marshal<__W: ::tagsave::ByteSink + ?Sized>(&self, __w: &mut __W) {
                #(#writes)*
            }
        }
    };

    TokenStream::from(expanded)
}

/// Creates a `tagsave::Unmarshal` implementation that reads each field in
/// declaration order
///
/// ```rust
/// use tagsave_derive::Unmarshal;
///
/// #[derive(Unmarshal)]
/// pub struct Ghost {
///     name: String,
///     #[tagsave(since = 3)]
///     flies: bool,
///     #[tagsave(since = 4, default = "default_speed")]
///     speed: i16,
/// }
///
/// fn default_speed() -> i16 {
///     10
/// }
/// ```
///
/// Field attributes:
///
/// - `#[tagsave(canary)]`: a canary byte precedes the field and must match
/// - `#[tagsave(since = N)]` or `#[tagsave(since = "expr")]`: the field is
///   only on the wire when the decode context has minor revision `N`.
///   Older data leaves it at its default, along with its canary.
/// - `#[tagsave(default = "path")]`: function providing the value of a
///   gated field for older data instead of `Default::default`
/// - `#[tagsave(with = "module")]`: call `module::unmarshal(source, ctx)`
///   instead of the field's own `Unmarshal` implementation
#[proc_macro_derive(Unmarshal, attributes(tagsave))]
pub fn derive_unmarshal(input: TokenStream) -> TokenStream {
    let dinput = parse_macro_input!(input as DeriveInput);
    let struct_ident = &dinput.ident;
    let fields = named_fields(&dinput);

    let generics = add_bounds(dinput.generics.clone(), quote! { ::tagsave::Unmarshal });
    let (impl_generics, ty_generics, where_clause) = generics.split_for_impl();

    let reads = fields.named.iter().map(|f| {
        let name = f.ident.as_ref().expect("named field");
        let binding = format_ident!("__field_{}", name);
        let ty = &f.ty;
        let attrs = field_attrs(f);

        let canary = if attrs.canary {
            quote! { ::tagsave::Canary::expect(__r)?; }
        } else {
            quote! {}
        };

        let read = match attrs.with {
            Some(module) => quote! { #module::unmarshal(__r, __ctx)? },
            None => quote! { <#ty as ::tagsave::Unmarshal>::unmarshal(__r, __ctx)? },
        };

        match attrs.since {
            Some(minor) => {
                let fallback = match attrs.default {
                    DefaultFallback::Path(path) => quote! { #path() },
                    DefaultFallback::Yes => quote! { ::std::default::Default::default() },
                };

                quote! {
                    let #binding: #ty = if __ctx.has_minor(#minor) {
                        #canary
                        #read
                    } else {
                        #fallback
                    };
                }
            }
            None => quote! {
                #canary
                let #binding: #ty = #read;
            },
        }
    });

    let constructor = fields.named.iter().map(|f| {
        let name = f.ident.as_ref().expect("named field");
        let binding = format_ident!("__field_{}", name);
        quote! { #name: #binding }
    });

    let expanded = quote! {
        impl #impl_generics ::tagsave::Unmarshal for #struct_ident #ty_generics #where_clause {
            fn unmarshal<__R: ::tagsave::ByteSource + ?Sized>(
                __r: &mut __R,
                __ctx: &::tagsave::DecodeContext,
            ) -> ::std::result::Result<Self, ::tagsave::Error> {
                #(#reads)*
                ::std::result::Result::Ok(#struct_ident {
                    #(#constructor),*
                })
            }
        }
    };

    TokenStream::from(expanded)
}
