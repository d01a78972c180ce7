//! Type system data for the Glint IR.
//!
//! Types are interned in the program's type arena and referenced by id. The
//! [`Context`] carries the canonical handles every pass needs: `void`, the
//! scalar types, and the two placeholder literal types produced while literal
//! coercion is still pending.

use bitflags::bitflags;
use la_arena::Idx;

/// Type-safe index into the type arena.
pub type TypeId = Idx<Type>;

/// A named type in the Glint type system.
#[derive(Debug, Clone, PartialEq)]
pub struct Type {
    pub name: String,
    pub kind: TypeKind,
}

impl Type {
    pub fn new(name: impl Into<String>, kind: TypeKind) -> Self {
        Self {
            name: name.into(),
            kind,
        }
    }

    /// Array types are uniquely owned by a symbol table; everything else is
    /// freely shared by id.
    pub fn is_array(&self) -> bool {
        matches!(self.kind, TypeKind::Array { .. })
    }
}

/// The structural kind of a type.
#[derive(Debug, Clone, PartialEq)]
pub enum TypeKind {
    Void,
    Scalar(ScalarKind),
    Vector { component: TypeId, columns: u8 },
    Matrix { component: TypeId, columns: u8, rows: u8 },
    Array { component: TypeId, size: Option<usize> },
    Struct { fields: Vec<Field> },
    Other,
}

/// Scalar base kinds.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ScalarKind {
    Bool,
    Int,
    Float,
}

/// A named struct field.
#[derive(Debug, Clone, PartialEq)]
pub struct Field {
    pub name: String,
    pub ty: TypeId,
}

/// Canonical type handles, installed by `Program::new`.
///
/// The literal types `$intLiteral` and `$floatLiteral` exist only for
/// detection: they must never end up on a concrete variable declaration.
#[derive(Debug, Clone, Copy)]
pub struct Context {
    pub void_type: TypeId,
    pub bool_type: TypeId,
    pub int_type: TypeId,
    pub float_type: TypeId,
    pub int_literal_type: TypeId,
    pub float_literal_type: TypeId,
}

bitflags! {
    /// Modifier flags on variables and functions.
    #[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
    pub struct Modifiers: u8 {
        const IN = 1 << 0;
        const OUT = 1 << 1;
        const CONST = 1 << 2;
        const UNIFORM = 1 << 3;
        const INLINE = 1 << 4;
    }
}

impl Modifiers {
    /// Source-order rendering of the flag set, trailing space included when
    /// non-empty.
    pub fn description(&self) -> String {
        let mut out = String::new();
        if self.contains(Modifiers::CONST) {
            out.push_str("const ");
        }
        if self.contains(Modifiers::UNIFORM) {
            out.push_str("uniform ");
        }
        if self.contains(Modifiers::IN) && self.contains(Modifiers::OUT) {
            out.push_str("inout ");
        } else if self.contains(Modifiers::IN) {
            out.push_str("in ");
        } else if self.contains(Modifiers::OUT) {
            out.push_str("out ");
        }
        if self.contains(Modifiers::INLINE) {
            out.push_str("inline ");
        }
        out
    }
}

/// Where a variable lives.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum VariableStorage {
    Global,
    Parameter,
    Local,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_modifiers_description() {
        assert_eq!(Modifiers::empty().description(), "");
        assert_eq!(Modifiers::OUT.description(), "out ");
        assert_eq!(
            (Modifiers::IN | Modifiers::OUT).description(),
            "inout "
        );
        assert_eq!(
            (Modifiers::CONST | Modifiers::IN).description(),
            "const in "
        );
    }

    #[test]
    fn test_array_detection() {
        let mut arena: la_arena::Arena<Type> = la_arena::Arena::default();
        let int = arena.alloc(Type::new("int", TypeKind::Scalar(ScalarKind::Int)));
        let array = Type::new(
            "int[3]",
            TypeKind::Array {
                component: int,
                size: Some(3),
            },
        );
        assert!(!arena[int].is_array());
        assert!(array.is_array());
    }
}
