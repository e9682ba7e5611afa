use proc_macro::TokenStream;
use proc_macro2::{Ident, Span, TokenStream as TokenStream2};
use proc_macro_crate::{FoundCrate, crate_name};
use quote::{format_ident, quote};
use syn::{Data, DeriveInput, Fields, parse_macro_input};

#[proc_macro_derive(FormModel)]
pub fn derive_form_model(input: TokenStream) -> TokenStream {
    let input = parse_macro_input!(input as DeriveInput);

    if !input.generics.params.is_empty() {
        return syn::Error::new_spanned(
            input.ident,
            "FormModel derive currently supports only non-generic structs",
        )
        .to_compile_error()
        .into();
    }

    let model_ident = input.ident;
    let fields_struct_ident = format_ident!("{model_ident}Fields");

    let named_fields = match input.data {
        Data::Struct(data) => match data.fields {
            Fields::Named(fields) => fields.named,
            _ => {
                return syn::Error::new(
                    Span::call_site(),
                    "FormModel derive requires a struct with named fields",
                )
                .to_compile_error()
                .into();
            }
        },
        _ => {
            return syn::Error::new(
                Span::call_site(),
                "FormModel derive is only supported on structs",
            )
            .to_compile_error()
            .into();
        }
    };

    let form_machine = form_machine_path();
    let mut field_names = Vec::new();
    let mut field_idents = Vec::new();
    let mut field_tys = Vec::new();
    let mut fields_methods = Vec::new();

    for field in named_fields {
        let Some(field_ident) = field.ident else {
            continue;
        };
        let field_name = field_ident.to_string();

        fields_methods.push(quote! {
            pub fn #field_ident(&self) -> #form_machine::form::FieldKey {
                #form_machine::form::FieldKey::new(#field_name)
            }
        });
        field_names.push(field_name);
        field_idents.push(field_ident);
        field_tys.push(field.ty);
    }

    quote! {
        #[derive(Clone, Copy, Debug, Default)]
        pub struct #fields_struct_ident;

        impl #fields_struct_ident {
            #(#fields_methods)*
        }

        impl #form_machine::form::FormModel for #model_ident {
            type Fields = #fields_struct_ident;

            const FIELD_NAMES: &'static [&'static str] = &[#(#field_names),*];

            fn fields() -> Self::Fields {
                #fields_struct_ident
            }
        }

        impl #model_ident {
            pub fn into_form_values<V>(self) -> #form_machine::form::FormValues<V>
            where
                #(#field_tys: ::core::convert::Into<V>,)*
            {
                let mut values = #form_machine::form::FormValues::new();
                #(
                    values.insert(
                        #form_machine::form::FieldKey::new(#field_names),
                        ::core::convert::Into::into(self.#field_idents),
                    );
                )*
                values
            }
        }
    }
    .into()
}

fn form_machine_path() -> TokenStream2 {
    match crate_name("form_machine") {
        Ok(FoundCrate::Name(name)) => {
            let ident = Ident::new(&name, Span::call_site());
            quote!(::#ident)
        }
        Ok(FoundCrate::Itself) => quote!(crate),
        Err(_) => quote!(::form_machine),
    }
}
