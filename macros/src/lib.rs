use proc_macro::TokenStream;
use quote::quote;
use std::collections::HashMap;
use syn::{Attribute, Data, DeriveInput, Fields, Meta, Token, Type, parse_macro_input};

/// Helper enum for parsed attribute values
enum MetaValue {
    Str(String),
    Expr(syn::Expr),
    Flag,
}

/// Check if the struct has #[allow(missing_docs)] attribute
fn check_allow_missing_docs(attrs: &[Attribute]) -> bool {
    attrs.iter().any(is_allow_missing_docs)
}

fn is_allow_missing_docs(attr: &Attribute) -> bool {
    attr.path().is_ident("allow")
        && attr
            .parse_args::<syn::Ident>()
            .map(|ident| ident == "missing_docs")
            .unwrap_or(false)
}

/// Defines a service configuration struct that can be loaded from a bound service
///
/// ```ignore
/// define_service! {
///     #[service(path = "credentials")]
///     #[derive(Debug, Default)]
///     pub struct Uaa {
///         #[field(key = "clientid", doc = "OAuth client id", required)]
///         pub client_id: String,
///     }
/// }
/// ```
#[proc_macro]
pub fn define_service(input: TokenStream) -> TokenStream {
    let input = parse_macro_input!(input as DeriveInput);

    match generate_service(&input) {
        Ok(tokens) => tokens.into(),
        Err(err) => err.to_compile_error().into(),
    }
}

fn generate_service(input: &DeriveInput) -> syn::Result<proc_macro2::TokenStream> {
    let struct_name = &input.ident;
    let vis = &input.vis;
    let struct_attrs = &input.attrs;

    let allow_missing_docs = check_allow_missing_docs(struct_attrs);
    let path = parse_service_path(struct_attrs)?;

    let fields = match &input.data {
        Data::Struct(data) => match &data.fields {
            Fields::Named(fields) => &fields.named,
            _ => {
                return Err(syn::Error::new_spanned(
                    input,
                    "define_service! only supports structs with named fields",
                ));
            }
        },
        _ => {
            return Err(syn::Error::new_spanned(
                input,
                "define_service! only supports structs",
            ));
        }
    };

    let mut field_defs = Vec::new();
    let mut presence_checks = Vec::new();
    let mut load_fields = Vec::new();
    let mut field_names = Vec::new();
    let mut metadata = Vec::new();

    for field in fields {
        let field_name = field
            .ident
            .as_ref()
            .ok_or_else(|| syn::Error::new_spanned(field, "expected a named field"))?;
        let field_vis = &field.vis;
        let field_type = &field.ty;

        let config = parse_field_config(&field.attrs, field_name, allow_missing_docs)?;

        // Keep doc comments and other attributes, drop our own
        let kept_attrs: Vec<&Attribute> = field
            .attrs
            .iter()
            .filter(|attr| !attr.path().is_ident("field"))
            .collect();
        field_defs.push(quote! {
            #(#kept_attrs)*
            #field_vis #field_name: #field_type
        });

        let key = &config.key;
        let description = &config.description;

        let load_code = match config.mode {
            FieldMode::Required => {
                presence_checks.push(quote! {
                    (#key, __section.get(#key).is_some_and(::service_loadr::is_present))
                });

                quote! {
                    let #field_name: #field_type = serde_json::from_value(
                        __section.remove(#key).unwrap_or_default(),
                    )
                    .map_err(::service_loadr::BindingError::Deserialize)?;
                }
            }
            FieldMode::Default(ref default_expr) => {
                quote! {
                    let #field_name: #field_type =
                        match __section.remove(#key).filter(::service_loadr::is_present) {
                            Some(value) => serde_json::from_value(value)
                                .map_err(::service_loadr::BindingError::Deserialize)?,
                            None => #default_expr,
                        };
                }
            }
            FieldMode::Optional => {
                let inner = extract_option_type(field_type).ok_or_else(|| {
                    syn::Error::new_spanned(field, "optional fields must have type Option<T>")
                })?;

                quote! {
                    let #field_name: #field_type =
                        match __section.remove(#key).filter(::service_loadr::is_present) {
                            Some(value) => Some(
                                serde_json::from_value::<#inner>(value)
                                    .map_err(::service_loadr::BindingError::Deserialize)?,
                            ),
                            None => None,
                        };
                }
            }
        };
        load_fields.push(load_code);
        field_names.push(field_name);

        let required = matches!(config.mode, FieldMode::Required);
        metadata.push(quote! {
            ::service_loadr::FieldMetadata {
                key: #key,
                description: #description,
                required: #required,
            }
        });
    }

    // Walk down the nested sections, an absent or null section reads as empty
    let descend = path.iter().map(|segment| {
        quote! {
            let mut __section: serde_json::Map<String, serde_json::Value> =
                match __section.remove(#segment) {
                    Some(value) => serde_json::from_value::<
                        Option<serde_json::Map<String, serde_json::Value>>,
                    >(value)
                    .map_err(::service_loadr::BindingError::Deserialize)?
                    .unwrap_or_default(),
                    None => serde_json::Map::new(),
                };
        }
    });

    let check_count = proc_macro2::Literal::usize_unsuffixed(presence_checks.len());

    let filtered_attrs: Vec<&Attribute> = struct_attrs
        .iter()
        .filter(|attr| !attr.path().is_ident("service") && !is_allow_missing_docs(attr))
        .collect();

    let struct_def = quote! {
        #(#filtered_attrs)*
        #vis struct #struct_name {
            #(#field_defs),*
        }
    };

    let unmarshal_impl = quote! {
        impl ::service_loadr::UnmarshalService for #struct_name {
            type Error = ::service_loadr::BindingError;

            #[allow(unused_mut)]
            fn unmarshal_service(
                &mut self,
                __raw: &::service_loadr::RawValue,
            ) -> ::std::result::Result<(), Self::Error> {
                use ::service_loadr::__private::serde_json;

                let mut __section: serde_json::Map<String, serde_json::Value> =
                    serde_json::from_str::<Option<serde_json::Map<String, serde_json::Value>>>(
                        __raw.get(),
                    )
                    .map_err(::service_loadr::BindingError::Deserialize)?
                    .unwrap_or_default();

                #(#descend)*

                ::service_loadr::check_all_fields::<[(&str, bool); #check_count], &str>([
                    #(#presence_checks),*
                ])?;

                #(#load_fields)*

                *self = Self {
                    #(#field_names),*
                };
                Ok(())
            }
        }

        impl #struct_name {
            /// Describes every field read from the service payload
            pub fn field_metadata() -> Vec<::service_loadr::FieldMetadata> {
                vec![#(#metadata),*]
            }
        }
    };

    Ok(quote! {
        #struct_def
        #unmarshal_impl
    })
}

#[derive(Debug)]
struct FieldConfig {
    key: String,
    description: String,
    mode: FieldMode,
}

#[derive(Debug)]
enum FieldMode {
    Required,
    Default(syn::Expr),
    Optional,
}

/// Parse #[service(path = "credentials")] into its dotted segments
fn parse_service_path(attrs: &[Attribute]) -> syn::Result<Vec<String>> {
    let Some(attr) = attrs.iter().find(|attr| attr.path().is_ident("service")) else {
        return Ok(Vec::new());
    };

    let mut path = Vec::new();
    attr.parse_nested_meta(|meta| {
        if meta.path.is_ident("path") {
            let value: syn::LitStr = meta.value()?.parse()?;
            path = value
                .value()
                .split('.')
                .filter(|segment| !segment.is_empty())
                .map(str::to_string)
                .collect();
            Ok(())
        } else {
            Err(meta.error("unsupported service attribute, expected path = \"...\""))
        }
    })?;

    Ok(path)
}

/// Parse #[field(key = "X", doc = "Y", required)] syntax
fn parse_field_list(meta_list: &syn::MetaList) -> syn::Result<HashMap<String, MetaValue>> {
    let mut values = HashMap::new();

    meta_list.parse_nested_meta(|meta| {
        let key = meta
            .path
            .get_ident()
            .ok_or_else(|| meta.error("expected identifier"))?
            .to_string();

        if meta.input.peek(Token![=]) {
            meta.input.parse::<Token![=]>()?;

            if key == "key" || key == "doc" {
                let value: syn::LitStr = meta.input.parse()?;
                values.insert(key, MetaValue::Str(value.value()));
            } else {
                let expr: syn::Expr = meta.input.parse()?;
                values.insert(key, MetaValue::Expr(expr));
            }
        } else {
            values.insert(key, MetaValue::Flag);
        }

        Ok(())
    })?;

    Ok(values)
}

fn parse_field_config(
    attrs: &[Attribute],
    field_name: &syn::Ident,
    allow_missing_docs: bool,
) -> syn::Result<FieldConfig> {
    let field_attr = attrs
        .iter()
        .find(|attr| attr.path().is_ident("field"))
        .ok_or_else(|| {
            syn::Error::new_spanned(
                field_name,
                "field must have #[field(...)] attribute with doc and mode (required/default/optional)",
            )
        })?;

    let parsed = match &field_attr.meta {
        Meta::List(list) => parse_field_list(list)?,
        _ => {
            return Err(syn::Error::new_spanned(
                field_attr,
                "field attribute must be a list: #[field(key = \"...\", ...)]",
            ));
        }
    };

    // Payload key falls back to the field name
    let key = match parsed.get("key") {
        Some(MetaValue::Str(s)) => s.clone(),
        None => field_name.to_string(),
        _ => {
            return Err(syn::Error::new_spanned(
                field_attr,
                "key must be a string literal",
            ));
        }
    };

    let description = match parsed.get("doc") {
        Some(MetaValue::Str(s)) => s.trim().to_string(),
        None if allow_missing_docs => String::new(),
        None => {
            return Err(syn::Error::new_spanned(
                field_attr,
                "field must have doc = \"description\" (or use #[allow(missing_docs)] on struct)",
            ));
        }
        _ => {
            return Err(syn::Error::new_spanned(
                field_attr,
                "doc must be a string literal",
            ));
        }
    };

    let mode = if parsed.contains_key("required") {
        FieldMode::Required
    } else if let Some(MetaValue::Expr(e)) = parsed.get("default") {
        FieldMode::Default(e.clone())
    } else if parsed.contains_key("optional") {
        FieldMode::Optional
    } else {
        return Err(syn::Error::new_spanned(
            field_attr,
            "field must have one of: required, optional, or default = value",
        ));
    };

    Ok(FieldConfig {
        key,
        description,
        mode,
    })
}

/// Extract the inner type from Option<T>
fn extract_option_type(ty: &Type) -> Option<&Type> {
    if let Type::Path(type_path) = ty
        && let Some(segment) = type_path.path.segments.last()
        && segment.ident == "Option"
        && let syn::PathArguments::AngleBracketed(args) = &segment.arguments
        && let Some(syn::GenericArgument::Type(inner_ty)) = args.args.first()
    {
        return Some(inner_ty);
    }
    None
}
