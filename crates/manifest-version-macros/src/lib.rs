use proc_macro::TokenStream;
use proc_macro2::{Literal, Span};
use quote::quote;
use syn::{parse_macro_input, Fields, ItemStruct, LitStr};

// Must match manifest_version::embed::{REGION_START, REGION_END}. This crate
// cannot depend on that one; only the round trip in
// manifest-version/tests/embedded.rs catches the two drifting apart.
const REGION_START: &[u8] = b"\x17\x42MANIFEST\x42VERSION\x42START\x17";
const REGION_END: &[u8] = b"\x17\x42MANIFEST\x42VERSION\x42END\x17";
const MANIFEST_PATH: &str = "META-INF/MANIFEST.MF";

/// Embeds a manifest descriptor for the calling package into the binary.
///
/// `embed_manifest!()` uses `CARGO_PKG_NAME` as the title,
/// `embed_manifest!("My App")` a literal. The version is always the calling
/// package's `CARGO_PKG_VERSION`. Call it from a function that is linked in,
/// usually `main`.
#[proc_macro]
pub fn embed_manifest(input: TokenStream) -> TokenStream {
    let title = if input.is_empty() {
        std::env::var("CARGO_PKG_NAME").ok()
    } else {
        Some(parse_macro_input!(input as LitStr).value())
    };

    let Some(title) = title else {
        return syn::Error::new(Span::call_site(), "no title given and CARGO_PKG_NAME is not set")
            .to_compile_error()
            .into();
    };
    if title.is_empty() || title.contains(|c: char| c == '\r' || c == '\n') {
        return syn::Error::new(Span::call_site(), "title must be a single non-empty line")
            .to_compile_error()
            .into();
    }

    let mut body = format!("Manifest-Version: 1.0\r\nImplementation-Title: {title}\r\n");
    if let Ok(version) = std::env::var("CARGO_PKG_VERSION") {
        body.push_str(&format!("Implementation-Version: {version}\r\n"));
    }

    let region = match encode_region(MANIFEST_PATH, body.as_bytes()) {
        Ok(region) => region,
        Err(msg) => return syn::Error::new(Span::call_site(), msg).to_compile_error().into(),
    };
    let len = region.len();
    let bytes = Literal::byte_string(&region);

    let expanded = quote! {
        {
            #[used]
            static __MANIFEST_VERSION_REGION: [u8; #len] = *#bytes;
            // keeps the region from being dropped by the linker
            let _ = unsafe { ::core::ptr::read_volatile(__MANIFEST_VERSION_REGION.as_ptr()) };
        }
    };

    TokenStream::from(expanded)
}

/// Declares a unit struct as the version provider of a project title.
///
/// ```ignore
/// #[manifest_version::version_provider("My App")]
/// struct AppVersion;
/// ```
#[proc_macro_attribute]
pub fn version_provider(args: TokenStream, input: TokenStream) -> TokenStream {
    let project = parse_macro_input!(args as LitStr);
    let item = parse_macro_input!(input as ItemStruct);

    if !matches!(item.fields, Fields::Unit) {
        return syn::Error::new_spanned(&item.fields, "expected a unit struct")
            .to_compile_error()
            .into();
    }
    if project.value().is_empty() {
        return syn::Error::new_spanned(&project, "project title must not be empty")
            .to_compile_error()
            .into();
    }

    let ident = &item.ident;
    let (impl_generics, ty_generics, where_clause) = item.generics.split_for_impl();

    let expanded = quote! {
        #item

        impl #impl_generics #ident #ty_generics #where_clause {
            pub const PROJECT: &'static str = #project;
        }

        impl #impl_generics ::manifest_version::VersionProvider for #ident #ty_generics #where_clause {
            fn version(&self) -> ::manifest_version::Result<::std::vec::Vec<::std::string::String>> {
                ::manifest_version::ManifestVersionProvider::current(Self::PROJECT)?.version()
            }
        }
    };

    TokenStream::from(expanded)
}

fn encode_region(path: &str, body: &[u8]) -> Result<Vec<u8>, String> {
    let path_len = u16::try_from(path.len())
        .map_err(|_| format!("region path too long: {} bytes", path.len()))?;
    let body_len = u32::try_from(body.len())
        .map_err(|_| format!("manifest too long to embed: {} bytes", body.len()))?;

    let mut buf = Vec::new();
    buf.extend_from_slice(REGION_START);
    buf.extend_from_slice(&path_len.to_le_bytes());
    buf.extend_from_slice(path.as_bytes());
    buf.extend_from_slice(&body_len.to_le_bytes());
    buf.extend_from_slice(body);
    buf.extend_from_slice(REGION_END);
    Ok(buf)
}
