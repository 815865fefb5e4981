//! The fixed operator table every module starts from.

/// Type shape of a primitive.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PrimType {
    /// `(-> int int int)`
    IntIntInt,
    /// `(-> int int)`
    IntInt,
    /// `(-> int int bool)`
    IntIntBool,
    /// `(-> bool bool bool)`
    BoolBoolBool,
    /// `(-> bool bool)`
    BoolBool,
    /// `bool`
    Bool,
    /// `unit`
    Unit,
}

/// Every primitive, in registration order. Ids are assigned from 1 in
/// this order, so the table doubles as the id layout. `true`, `false`
/// and `<>` lex as literals and are never looked up by name; they are
/// registered anyway so the id ranges stay stable.
pub const PRIMITIVES: &[(&str, PrimType)] = &[
    ("+", PrimType::IntIntInt),
    ("-", PrimType::IntIntInt),
    ("*", PrimType::IntIntInt),
    ("/", PrimType::IntIntInt),
    ("%", PrimType::IntIntInt),
    ("shl", PrimType::IntIntInt),
    ("shr", PrimType::IntIntInt),
    ("lor", PrimType::IntIntInt),
    ("land", PrimType::IntIntInt),
    ("lxor", PrimType::IntIntInt),
    ("neg", PrimType::IntInt),
    ("=", PrimType::IntIntBool),
    ("!=", PrimType::IntIntBool),
    ("<", PrimType::IntIntBool),
    (">", PrimType::IntIntBool),
    ("<=", PrimType::IntIntBool),
    (">=", PrimType::IntIntBool),
    ("not", PrimType::BoolBool),
    ("or", PrimType::BoolBoolBool),
    ("and", PrimType::BoolBoolBool),
    ("xor", PrimType::BoolBoolBool),
    ("true", PrimType::Bool),
    ("false", PrimType::Bool),
    ("<>", PrimType::Unit),
];
