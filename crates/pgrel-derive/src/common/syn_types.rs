//! Type helper utilities for syn type analysis.

/// The single type argument of `Name<T>`, matched on the last path segment.
fn single_arg<'a>(ty: &'a syn::Type, name: &str) -> Option<&'a syn::Type> {
    let syn::Type::Path(type_path) = ty else {
        return None;
    };
    let seg = type_path.path.segments.last()?;
    if seg.ident != name {
        return None;
    }
    let syn::PathArguments::AngleBracketed(args) = &seg.arguments else {
        return None;
    };
    if args.args.len() != 1 {
        return None;
    }
    let syn::GenericArgument::Type(inner) = args.args.first()? else {
        return None;
    };
    Some(inner)
}

/// Extract `T` from `RelationData<T>` (any path prefix).
pub fn relation_inner(ty: &syn::Type) -> Option<&syn::Type> {
    single_arg(ty, "RelationData")
}

/// `Meta` or `pgrel::Meta`.
pub fn is_meta(ty: &syn::Type) -> bool {
    let syn::Type::Path(type_path) = ty else {
        return false;
    };
    type_path
        .path
        .segments
        .last()
        .is_some_and(|seg| seg.ident == "Meta" && seg.arguments.is_none())
}

#[cfg(test)]
mod tests {
    use super::*;
    use syn::parse_quote;

    #[test]
    fn test_relation_inner() {
        let ty: syn::Type = parse_quote!(RelationData<Album>);
        assert!(relation_inner(&ty).is_some());

        let ty: syn::Type = parse_quote!(pgrel::RelationData<crate::Album>);
        assert!(relation_inner(&ty).is_some());

        let ty: syn::Type = parse_quote!(Vec<Album>);
        assert!(relation_inner(&ty).is_none());

        let ty: syn::Type = parse_quote!(RelationData);
        assert!(relation_inner(&ty).is_none());
    }

    #[test]
    fn test_is_meta() {
        assert!(is_meta(&parse_quote!(Meta)));
        assert!(is_meta(&parse_quote!(pgrel::Meta)));
        assert!(!is_meta(&parse_quote!(Metadata)));
        assert!(!is_meta(&parse_quote!(Option<Meta>)));
    }
}
