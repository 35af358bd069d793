use proc_macro::TokenStream;
use quote::quote;
use syn::{Data, DeriveInput, Field, Fields, Ident, Index};

fn is_skipped(field: &Field) -> bool {
    field.attrs.iter().any(|attr| attr.path.is_ident("skip"))
}

#[proc_macro_derive(VisitStrings, attributes(skip))]
pub fn derive_visit_strings(input: TokenStream) -> TokenStream {
    let ast = match syn::parse::<DeriveInput>(input) {
        Ok(ast) => ast,
        Err(err) => return err.to_compile_error().into(),
    };

    let ident = &ast.ident;

    let body = match &ast.data {
        Data::Struct(data) => {
            let visits = data
                .fields
                .iter()
                .enumerate()
                .filter(|(_, field)| !is_skipped(field))
                .map(|(idx, field)| match &field.ident {
                    Some(name) => quote! { self.#name.visit_strings(visitor); },
                    None => {
                        let index = Index::from(idx);
                        quote! { self.#index.visit_strings(visitor); }
                    }
                });

            quote! { #(#visits)* }
        }

        Data::Enum(data) => {
            let arms = data.variants.iter().map(|variant| {
                let variant_ident = &variant.ident;

                match &variant.fields {
                    Fields::Named(fields) => {
                        let names: Vec<&Ident> = fields
                            .named
                            .iter()
                            .map(|field| field.ident.as_ref().unwrap())
                            .collect();

                        quote! {
                            #ident::#variant_ident { #(#names),* } => {
                                #(#names.visit_strings(visitor);)*
                            }
                        }
                    }

                    Fields::Unnamed(fields) => {
                        let bindings: Vec<Ident> = (0..fields.unnamed.len())
                            .map(|idx| {
                                Ident::new(&format!("v{}", idx), proc_macro2::Span::call_site())
                            })
                            .collect();

                        quote! {
                            #ident::#variant_ident(#(#bindings),*) => {
                                #(#bindings.visit_strings(visitor);)*
                            }
                        }
                    }

                    Fields::Unit => quote! { #ident::#variant_ident => {} },
                }
            });

            quote! {
                match self {
                    #(#arms)*
                }
            }
        }

        Data::Union(_) => quote! {},
    };

    let expanded = quote! {
        impl ::kiln_utils::VisitStrings for #ident {
            fn visit_strings<V: ::kiln_utils::StringVisitor>(&mut self, visitor: &mut V) {
                #body
            }
        }
    };

    expanded.into()
}
