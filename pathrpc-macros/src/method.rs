//! `#[method]` expansion
//!
//! Input:
//! ```ignore
//! #[method(name = "say_hello")]
//! pub async fn hello(p: HelloParams) -> Result<String, HandlerError> {
//!     Ok(format!("hello {}", p.name))
//! }
//! ```
//!
//! Output:
//! ```ignore
//! pub fn hello() -> ::pathrpc_server::MethodDef {
//!     async fn __pathrpc_inner(p: HelloParams) -> Result<String, HandlerError> {
//!         Ok(format!("hello {}", p.name))
//!     }
//!     ::pathrpc_server::MethodDef::new("say_hello", ::pathrpc_server::from_typed_fn(__pathrpc_inner))
//! }
//! ```

use proc_macro2::TokenStream;
use quote::quote;
use syn::{FnArg, ItemFn, LitStr, ReturnType};

/// Arguments of the attribute
#[derive(Default)]
pub struct MethodArgs {
    pub name: Option<LitStr>,
}

impl MethodArgs {
    pub fn parse_meta(&mut self, meta: syn::meta::ParseNestedMeta) -> syn::Result<()> {
        if meta.path.is_ident("name") {
            self.name = Some(meta.value()?.parse()?);
            Ok(())
        } else {
            Err(meta.error("unsupported method argument, expected `name = \"...\"`"))
        }
    }
}

pub fn expand(args: MethodArgs, input: ItemFn) -> syn::Result<TokenStream> {
    if input.sig.asyncness.is_none() {
        return Err(syn::Error::new_spanned(
            input.sig.fn_token,
            "#[method] requires an async fn",
        ));
    }
    if input.sig.inputs.len() > 1 {
        return Err(syn::Error::new_spanned(
            &input.sig.inputs,
            "#[method] functions take at most one params argument",
        ));
    }

    let fn_name = &input.sig.ident;
    let fn_vis = &input.vis;
    let fn_block = &input.block;
    let fn_attrs = &input.attrs;
    let method_name = args
        .name
        .unwrap_or_else(|| LitStr::new(&fn_name.to_string(), fn_name.span()));

    let return_type = match &input.sig.output {
        ReturnType::Type(_, ty) => quote! { #ty },
        ReturnType::Default => quote! { () },
    };

    let handler = match input.sig.inputs.first() {
        Some(FnArg::Typed(param)) => quote! {
            async fn __pathrpc_inner(#param) -> #return_type #fn_block
            ::pathrpc_server::from_typed_fn(__pathrpc_inner)
        },
        Some(FnArg::Receiver(receiver)) => {
            return Err(syn::Error::new_spanned(
                receiver,
                "#[method] cannot be used on methods taking self",
            ))
        }
        // Params are still decoded, then ignored
        None => quote! {
            async fn __pathrpc_inner() -> #return_type #fn_block
            ::pathrpc_server::from_typed_fn(|_: ::pathrpc_server::__private::Value| __pathrpc_inner())
        },
    };

    Ok(quote! {
        #(#fn_attrs)*
        #fn_vis fn #fn_name() -> ::pathrpc_server::MethodDef {
            ::pathrpc_server::MethodDef::new(#method_name, { #handler })
        }
    })
}
