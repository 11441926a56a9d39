//! Procedural macros for callstep
//!
//! This crate provides the `#[callstep::test]` attribute macro for writing
//! async tests that step through intercepted calls.
//!
//! # Example
//!
//! ```rust,ignore
//! use callstep::StubContext;
//!
//! #[callstep::test]
//! async fn my_test(ctx: StubContext) {
//!     assert_eq!(ctx.call_count(), 0);
//! }
//! ```

use proc_macro::TokenStream;
use proc_macro2::TokenStream as TokenStream2;
use quote::quote;
use syn::{
    parse::{Parse, ParseStream},
    parse_macro_input, FnArg, Ident, ItemFn, Lit, Pat, ReturnType, Token, Type,
};

/// Configuration options for the test macro.
#[derive(Default)]
struct TestConfig {
    /// Flavor for tokio runtime ("current_thread" or "multi_thread")
    flavor: Option<String>,
}

impl Parse for TestConfig {
    fn parse(input: ParseStream) -> syn::Result<Self> {
        let mut config = TestConfig::default();

        while !input.is_empty() {
            let ident: Ident = input.parse()?;
            input.parse::<Token![=]>()?;

            match ident.to_string().as_str() {
                "flavor" => {
                    let lit: Lit = input.parse()?;
                    match lit {
                        Lit::Str(s) if s.value() == "current_thread" || s.value() == "multi_thread" => {
                            config.flavor = Some(s.value());
                        }
                        other => {
                            return Err(syn::Error::new_spanned(
                                other,
                                "flavor must be \"current_thread\" or \"multi_thread\"",
                            ));
                        }
                    }
                }
                _ => {
                    return Err(syn::Error::new(
                        ident.span(),
                        format!("unknown attribute: {ident}"),
                    ));
                }
            }

            if input.peek(Token![,]) {
                input.parse::<Token![,]>()?;
            }
        }

        Ok(config)
    }
}

/// Determines if a function parameter is requesting a `StubContext`.
fn is_context_param(arg: &FnArg) -> bool {
    if let FnArg::Typed(pat_type) = arg {
        if let Type::Path(type_path) = &*pat_type.ty {
            if let Some(segment) = type_path.path.segments.last() {
                return segment.ident == "StubContext";
            }
        }
    }
    false
}

/// Extracts the parameter pattern from a function argument.
fn param_pattern(arg: &FnArg) -> Option<&Pat> {
    if let FnArg::Typed(pat_type) = arg {
        Some(&pat_type.pat)
    } else {
        None
    }
}

/// Test attribute macro for async tests driven by a stub session.
///
/// # Basic Usage
///
/// Without parameters, the test is a plain tokio test; interceptors built
/// with `callstep::call` run in pass-through mode.
///
/// ```rust,ignore
/// #[callstep::test]
/// async fn test_basic() {
///     assert!(!callstep::is_stubbed());
/// }
/// ```
///
/// # With StubContext Injection
///
/// Add a `ctx: StubContext` parameter and the body runs inside
/// `with_stub` on the thread's default session. The session is stubbed
/// for the duration of the body and restored afterwards, even if an
/// assertion fails.
///
/// ```rust,ignore
/// use callstep::StubContext;
///
/// #[callstep::test]
/// async fn test_stubbed(ctx: StubContext) {
///     let fetch = callstep::call(fetch_user);
///     let user = ctx.spawn(async move { fetch.call(7).await });
///     ctx.expect_call(0).unwrap().resolve(String::from("ada")).unwrap();
///     ctx.advance_tick().await;
///     assert_eq!(user.await, Ok(String::from("ada")));
/// }
/// ```
///
/// # Configuration Options
///
/// - `flavor = "multi_thread"` - Tokio runtime flavor (default `"current_thread"`)
#[proc_macro_attribute]
pub fn test(attr: TokenStream, item: TokenStream) -> TokenStream {
    let config = parse_macro_input!(attr as TestConfig);
    let input = parse_macro_input!(item as ItemFn);

    expand_test(&config, &input)
        .unwrap_or_else(syn::Error::into_compile_error)
        .into()
}

fn expand_test(config: &TestConfig, input: &ItemFn) -> syn::Result<TokenStream2> {
    let name = &input.sig.ident;
    let body = &input.block;
    let attrs = &input.attrs;
    let vis = &input.vis;
    let output = &input.sig.output;

    if input.sig.asyncness.is_none() {
        return Err(syn::Error::new_spanned(
            &input.sig,
            "test function must be async",
        ));
    }

    if let Some(extra) = input.sig.inputs.iter().find(|arg| !is_context_param(arg)) {
        return Err(syn::Error::new_spanned(
            extra,
            "only a `StubContext` parameter can be injected",
        ));
    }
    if input.sig.inputs.len() > 1 {
        return Err(syn::Error::new_spanned(
            &input.sig.inputs,
            "at most one `StubContext` parameter is allowed",
        ));
    }

    let flavor_attr = match config.flavor.as_deref() {
        Some("multi_thread") => quote! { #[::tokio::test(flavor = "multi_thread")] },
        _ => quote! { #[::tokio::test] },
    };

    let Some(ctx_pat) = input.sig.inputs.first().and_then(param_pattern) else {
        return Ok(quote! {
            #flavor_attr
            #(#attrs)*
            #vis async fn #name() #output #body
        });
    };

    let body_ty = match output {
        ReturnType::Default => quote! { () },
        ReturnType::Type(_, ty) => quote! { #ty },
    };

    Ok(quote! {
        #flavor_attr
        #(#attrs)*
        #vis async fn #name() #output {
            let __callstep_session = ::callstep::Session::current();
            let __callstep_result = __callstep_session
                .with_stub(|#ctx_pat: ::callstep::StubContext| async move {
                    let __callstep_output: #body_ty = (async move #body).await;
                    __callstep_output
                })
                .await;
            match __callstep_result {
                ::core::result::Result::Ok(output) => output,
                ::core::result::Result::Err(err) => {
                    panic!("callstep: could not start stub session: {err}")
                }
            }
        }
    })
}

#[cfg(test)]
mod tests {
    use super::{expand_test, TestConfig};
    use syn::ItemFn;

    #[::core::prelude::v1::test]
    fn test_config_parse_empty() {
        let config: TestConfig = syn::parse_str("").unwrap();
        assert!(config.flavor.is_none());
    }

    #[::core::prelude::v1::test]
    fn test_config_parse_flavor() {
        let config: TestConfig = syn::parse_str("flavor = \"multi_thread\"").unwrap();
        assert_eq!(config.flavor, Some("multi_thread".to_string()));
    }

    #[::core::prelude::v1::test]
    fn test_config_rejects_unknown_flavor() {
        assert!(syn::parse_str::<TestConfig>("flavor = \"green\"").is_err());
    }

    #[::core::prelude::v1::test]
    fn test_config_rejects_unknown_key() {
        assert!(syn::parse_str::<TestConfig>("start_paused = true").is_err());
    }

    #[::core::prelude::v1::test]
    fn test_expand_rejects_sync_fn() {
        let item: ItemFn = syn::parse_str("fn not_async() {}").unwrap();
        assert!(expand_test(&TestConfig::default(), &item).is_err());
    }

    #[::core::prelude::v1::test]
    fn test_expand_rejects_other_params() {
        let item: ItemFn = syn::parse_str("async fn takes(n: u32) {}").unwrap();
        let err = expand_test(&TestConfig::default(), &item).unwrap_err();
        assert!(err.to_string().contains("StubContext"));
    }

    #[::core::prelude::v1::test]
    fn test_expand_wraps_body_in_session() {
        let item: ItemFn =
            syn::parse_str("async fn stepped(ctx: StubContext) { ctx.call_count(); }").unwrap();
        let tokens = expand_test(&TestConfig::default(), &item).unwrap().to_string();
        assert!(tokens.contains("with_stub"));
        assert!(tokens.contains("tokio :: test"));
    }
}
