//! Effective type resolution
//!
//! Enum types redirect to their underlying primitive, generic instantiations
//! to their definition. The walk is bounded so malformed metadata with a
//! redirect cycle fails instead of spinning.

use tether_sdk::{BridgeError, BridgeResult, PrimitiveTag, TypeDescriptor, TypeKind};

/// Conversion category of a type after redirection
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Effective {
    /// Handled by the primitive codec
    Primitive(PrimitiveTag),
    /// Managed reference (class, array, delegate, pointer, object)
    Reference,
    /// User value type (struct, nullable)
    Value,
}

/// Resolve the conversion category of `ty`, following at most `limit`
/// redirections.
pub fn effective_kind(ty: &TypeDescriptor, limit: usize) -> BridgeResult<Effective> {
    let mut current = ty;
    for _ in 0..=limit {
        match current.kind {
            TypeKind::Primitive(tag) => return Ok(Effective::Primitive(tag)),
            TypeKind::Struct | TypeKind::Nullable => return Ok(Effective::Value),
            TypeKind::Void
            | TypeKind::Object
            | TypeKind::Class
            | TypeKind::Array
            | TypeKind::Delegate
            | TypeKind::Pointer
            | TypeKind::FunctionPointer => return Ok(Effective::Reference),
            TypeKind::Enum | TypeKind::GenericInstance => {
                current = current.element().ok_or_else(|| {
                    BridgeError::InvalidOperation(format!(
                        "{} has no underlying type",
                        current.name
                    ))
                })?;
            }
        }
    }
    tracing::warn!(type_name = %ty.name, limit, "type redirection limit exceeded");
    Err(BridgeError::RedirectLimit {
        type_name: ty.name.clone(),
        limit,
    })
}

/// Primitive tag a value type decodes through, if any
pub fn primitive_tag(ty: &TypeDescriptor, limit: usize) -> BridgeResult<Option<PrimitiveTag>> {
    Ok(match effective_kind(ty, limit)? {
        Effective::Primitive(tag) => Some(tag),
        _ => None,
    })
}

/// Strip enum and nullable wrappers from the declared type of a boxed
/// value, following at most `limit` redirections.
pub fn boxed_target(ty: &TypeDescriptor, limit: usize) -> BridgeResult<&TypeDescriptor> {
    let mut current = ty;
    for _ in 0..=limit {
        match (current.kind, current.element()) {
            (TypeKind::Enum | TypeKind::Nullable, Some(inner)) => current = inner.as_ref(),
            _ => return Ok(current),
        }
    }
    tracing::warn!(type_name = %ty.name, limit, "type redirection limit exceeded");
    Err(BridgeError::RedirectLimit {
        type_name: ty.name.clone(),
        limit,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Arc;
    use tether_sdk::{ClassRef, PointerWidth};

    fn class(addr: usize) -> ClassRef {
        ClassRef::from_addr(addr).unwrap()
    }

    #[test]
    fn test_enum_redirects_to_underlying() {
        let byte = TypeDescriptor::primitive(class(1), "Byte", PrimitiveTag::U1, PointerWidth::Bits32);
        let color = TypeDescriptor::enumeration(class(2), "Color", byte);
        assert_eq!(effective_kind(&color, 4), Ok(Effective::Primitive(PrimitiveTag::U1)));
    }

    #[test]
    fn test_generic_instance_follows_definition() {
        let def = TypeDescriptor::structure(class(1), "Pair`1", 8);
        let inst = TypeDescriptor::generic_instance(class(2), "Pair<int>", def, 8);
        assert_eq!(effective_kind(&inst, 4), Ok(Effective::Value));

        let list = TypeDescriptor::class(class(3), "List`1");
        let inst = TypeDescriptor::generic_instance(class(4), "List<int>", list, 0);
        assert_eq!(effective_kind(&inst, 4), Ok(Effective::Reference));
    }

    #[test]
    fn test_redirect_limit() {
        let int = TypeDescriptor::primitive(class(1), "Int32", PrimitiveTag::I4, PointerWidth::Bits32);
        let mut ty: Arc<TypeDescriptor> = int;
        for i in 0..6 {
            ty = TypeDescriptor::generic_instance(class(10 + i), format!("G{}", i), ty, 4);
        }
        assert!(matches!(
            effective_kind(&ty, 4),
            Err(BridgeError::RedirectLimit { limit: 4, .. })
        ));
        assert_eq!(effective_kind(&ty, 6), Ok(Effective::Primitive(PrimitiveTag::I4)));
    }

    #[test]
    fn test_missing_redirect_target() {
        let broken = Arc::new(TypeDescriptor {
            class: class(1),
            name: "Broken".into(),
            kind: TypeKind::Enum,
            size: 4,
            element: None,
        });
        assert!(matches!(
            effective_kind(&broken, 4),
            Err(BridgeError::InvalidOperation(_))
        ));
    }

    #[test]
    fn test_boxed_target_strips_wrappers() {
        let int = TypeDescriptor::primitive(class(1), "Int32", PrimitiveTag::I4, PointerWidth::Bits32);
        let level = TypeDescriptor::enumeration(class(2), "Level", int);
        let maybe = TypeDescriptor::nullable(class(3), level);
        assert_eq!(boxed_target(&maybe, 4).map(|t| t.class), Ok(class(1)));

        let point = TypeDescriptor::structure(class(4), "Point", 8);
        assert_eq!(boxed_target(&point, 0).map(|t| t.class), Ok(class(4)));
    }

    #[test]
    fn test_boxed_target_limit() {
        let int = TypeDescriptor::primitive(class(1), "Int32", PrimitiveTag::I4, PointerWidth::Bits32);
        let mut ty: Arc<TypeDescriptor> = int;
        for i in 0..6 {
            ty = TypeDescriptor::enumeration(class(10 + i), format!("E{}", i), ty);
        }
        assert!(matches!(
            boxed_target(&ty, 4),
            Err(BridgeError::RedirectLimit { limit: 4, .. })
        ));
        assert_eq!(boxed_target(&ty, 6).map(|t| t.class), Ok(class(1)));
    }
}
