use proc_macro::TokenStream;
use quote::quote;
use syn::{Fields, ItemStruct, parse_macro_input, spanned::Spanned};

extern crate proc_macro;

/// Marks a struct as a timestamped sample.
///
/// Adds the serde/compare derives every sample needs and implements `Sample`
/// by reading the struct's `stamp` field. The `Sample` trait must be in scope.
#[proc_macro_attribute]
pub fn sample(_attr: TokenStream, item: TokenStream) -> TokenStream {
    let ast = parse_macro_input!(item as ItemStruct);
    let ident = &ast.ident;

    let has_stamp = match &ast.fields {
        Fields::Named(fields) => fields
            .named
            .iter()
            .any(|f| f.ident.as_ref().is_some_and(|i| i == "stamp")),
        _ => false,
    };
    if !has_stamp {
        return syn::Error::new(
            ast.fields.span(),
            "#[sample] requires a named `stamp` field",
        )
        .to_compile_error()
        .into();
    }

    let expanded = quote! {
        #[derive(
            ::serde::Serialize,
            ::serde::Deserialize,
            ::std::cmp::PartialEq,
            ::std::fmt::Debug,
            ::std::clone::Clone
        )]
        #ast

        impl Sample for #ident {
            fn stamp(&self) -> ::std::time::Duration {
                self.stamp
            }
        }
    };

    TokenStream::from(expanded)
}

/// Adds the derives required of an aggregate: serializable, comparable and clonable.
#[proc_macro_attribute]
pub fn aggregate(_attr: TokenStream, item: TokenStream) -> TokenStream {
    let ast = parse_macro_input!(item as ItemStruct);
    let expanded = quote! {
        #[derive(
            ::serde::Serialize,
            ::serde::Deserialize,
            ::std::cmp::PartialEq,
            ::std::fmt::Debug,
            ::std::clone::Clone
        )]
        #ast
    };

    TokenStream::from(expanded)
}
