//! The semantic type universe.
//!
//! `Int`, `String`, `Nil`, and `Unit` are structural singletons. Records
//! and arrays are nominal: every construction mints a fresh identity from
//! a process-wide counter, so two record types with identical fields are
//! still distinct. `Name` is an indirection cell that lets mutually
//! recursive type declarations close: it is created empty, filled once the
//! group's bodies are translated, and chased by [`actual_ty`] afterwards.
use crate::symbol::Symbol;
use std::cell::RefCell;
use std::fmt;
use std::rc::Rc;
use std::sync::atomic::{AtomicU32, Ordering};

static RECORD_ID: AtomicU32 = AtomicU32::new(0);
static ARRAY_ID: AtomicU32 = AtomicU32::new(0);

#[derive(Debug, Clone, PartialEq)]
pub enum Type {
    Int,
    String,
    Nil,
    Unit,
    Record(Rc<RecordType>),
    Array(Rc<ArrayType>),
    Name(Rc<NameType>),
}

#[derive(Debug, PartialEq)]
pub struct RecordType {
    id: u32,
    fields: Vec<(Symbol, Type)>,
}

impl RecordType {
    pub fn id(&self) -> u32 {
        self.id
    }

    pub fn fields(&self) -> &[(Symbol, Type)] {
        &self.fields
    }

    pub fn field_type(&self, name: Symbol) -> Option<&Type> {
        self.fields
            .iter()
            .find(|(field, _)| *field == name)
            .map(|(_, ty)| ty)
    }
}

#[derive(Debug, PartialEq)]
pub struct ArrayType {
    id: u32,
    element: Type,
}

impl ArrayType {
    pub fn id(&self) -> u32 {
        self.id
    }

    pub fn element(&self) -> &Type {
        &self.element
    }
}

/// The indirection cell behind a declared type name. Empty between the two
/// passes over a mutually recursive group, immutable once resolved.
#[derive(Debug, PartialEq)]
pub struct NameType {
    name: Symbol,
    inner: RefCell<Option<Type>>,
}

impl NameType {
    pub fn name(&self) -> Symbol {
        self.name
    }

    pub fn resolved(&self) -> Option<Type> {
        self.inner.borrow().clone()
    }

    pub fn resolve(&self, ty: Type) {
        self.inner.replace(Some(ty));
    }
}

impl Type {
    /// A fresh record type; its identity is distinct from every other.
    pub fn record(fields: Vec<(Symbol, Type)>) -> Type {
        Type::Record(Rc::new(RecordType {
            id: RECORD_ID.fetch_add(1, Ordering::Relaxed),
            fields,
        }))
    }

    /// A fresh array type; its identity is distinct from every other.
    pub fn array(element: Type) -> Type {
        Type::Array(Rc::new(ArrayType {
            id: ARRAY_ID.fetch_add(1, Ordering::Relaxed),
            element,
        }))
    }

    /// An unresolved name cell for phase one of a declaration group.
    pub fn name(sym: Symbol) -> Type {
        Type::Name(Rc::new(NameType {
            name: sym,
            inner: RefCell::new(None),
        }))
    }

    pub fn is_int(&self) -> bool {
        matches!(self, Type::Int)
    }

    pub fn is_string(&self) -> bool {
        matches!(self, Type::String)
    }

    pub fn is_nil(&self) -> bool {
        matches!(self, Type::Nil)
    }

    pub fn is_unit(&self) -> bool {
        matches!(self, Type::Unit)
    }

    pub fn is_record(&self) -> bool {
        matches!(self, Type::Record(_))
    }
}

impl fmt::Display for Type {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Type::Int => write!(f, "int"),
            Type::String => write!(f, "string"),
            Type::Nil => write!(f, "nil"),
            Type::Unit => write!(f, "unit"),
            Type::Record(record) => {
                let mut it = record.fields().iter().peekable();

                write!(f, "{{")?;
                while let Some((name, ty)) = it.next() {
                    write!(f, " {}: {}", name, ty)?;
                    if it.peek().is_some() {
                        write!(f, ",")?;
                    }
                }
                write!(f, " }}")
            }
            Type::Array(array) => write!(f, "array of {}", array.element()),
            Type::Name(name) => write!(f, "{}", name.name()),
        }
    }
}

/// Raised when a name chain cannot be resolved to a concrete type: the
/// cell is still empty, or the chain only ever reaches other names.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct IncompleteType(pub Symbol);

/// Chases `Name` indirections until a non-name type is reached.
pub fn actual_ty(ty: &Type) -> Result<Type, IncompleteType> {
    let mut ty = ty.clone();
    let mut seen: Vec<Rc<NameType>> = vec![];

    while let Type::Name(name) = ty {
        if seen.iter().any(|n| Rc::ptr_eq(n, &name)) {
            return Err(IncompleteType(name.name()));
        }
        match name.resolved() {
            Some(inner) => {
                seen.push(name);
                ty = inner;
            }
            None => return Err(IncompleteType(name.name())),
        }
    }

    Ok(ty)
}

/// Type equality: structural for singletons, nominal for records and
/// arrays. `Nil` does not equal itself — equality implies compatibility,
/// and two `nil` expressions carry no record identity to agree on.
pub fn equals(a: &Type, b: &Type) -> Result<bool, IncompleteType> {
    let a = actual_ty(a)?;
    let b = actual_ty(b)?;

    Ok(match (&a, &b) {
        (Type::Int, Type::Int) => true,
        (Type::String, Type::String) => true,
        (Type::Unit, Type::Unit) => true,
        (Type::Nil, Type::Nil) => false,
        (Type::Record(r1), Type::Record(r2)) => r1.id() == r2.id(),
        (Type::Array(a1), Type::Array(a2)) => a1.id() == a2.id(),
        _ => false,
    })
}

/// Whether a value of type `src` may flow into a slot of type `dst`:
/// either the types are equal, or `src` is `nil` and `dst` is a record.
pub fn is_compatible(src: &Type, dst: &Type) -> Result<bool, IncompleteType> {
    if equals(src, dst)? {
        return Ok(true);
    }

    let src = actual_ty(src)?;
    let dst = actual_ty(dst)?;
    Ok(src.is_nil() && dst.is_record())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sym(s: &str) -> Symbol {
        Symbol::intern(s)
    }

    #[test]
    fn singletons_are_structurally_equal() {
        assert!(equals(&Type::Int, &Type::Int).unwrap());
        assert!(equals(&Type::String, &Type::String).unwrap());
        assert!(equals(&Type::Unit, &Type::Unit).unwrap());
        assert!(!equals(&Type::Int, &Type::String).unwrap());
    }

    #[test]
    fn nil_does_not_equal_nil() {
        assert!(!equals(&Type::Nil, &Type::Nil).unwrap());
    }

    #[test]
    fn records_are_nominal() {
        let fields = vec![(sym("x"), Type::Int)];
        let r1 = Type::record(fields.clone());
        let r2 = Type::record(fields);

        assert!(equals(&r1, &r1).unwrap());
        assert!(!equals(&r1, &r2).unwrap());
    }

    #[test]
    fn arrays_are_nominal() {
        let a1 = Type::array(Type::Int);
        let a2 = Type::array(Type::Int);

        assert!(equals(&a1, &a1).unwrap());
        assert!(!equals(&a1, &a2).unwrap());
    }

    #[test]
    fn equality_looks_through_names() {
        let record = Type::record(vec![(sym("hd"), Type::Int)]);
        let name = Type::name(sym("list"));
        if let Type::Name(cell) = &name {
            cell.resolve(record.clone());
        }

        assert!(equals(&name, &record).unwrap());
        assert!(equals(&record, &name).unwrap());
    }

    #[test]
    fn actual_ty_is_idempotent() {
        let record = Type::record(vec![(sym("hd"), Type::Int)]);
        let outer = Type::name(sym("a"));
        let inner = Type::name(sym("b"));
        if let Type::Name(cell) = &inner {
            cell.resolve(record.clone());
        }
        if let Type::Name(cell) = &outer {
            cell.resolve(inner);
        }

        let once = actual_ty(&outer).unwrap();
        let twice = actual_ty(&once).unwrap();
        assert!(equals(&once, &twice).unwrap());
        assert!(equals(&once, &record).unwrap());
    }

    #[test]
    fn unresolved_name_is_incomplete() {
        let name = Type::name(sym("ghost"));
        assert_eq!(actual_ty(&name), Err(IncompleteType(sym("ghost"))));
    }

    #[test]
    fn name_cycle_is_incomplete() {
        let a = Type::name(sym("a"));
        let b = Type::name(sym("b"));
        if let Type::Name(cell) = &a {
            cell.resolve(b.clone());
        }
        if let Type::Name(cell) = &b {
            cell.resolve(a.clone());
        }

        assert!(actual_ty(&a).is_err());
        assert!(actual_ty(&b).is_err());
    }

    #[test]
    fn nil_is_compatible_with_records_only() {
        let record = Type::record(vec![(sym("x"), Type::Int)]);
        let array = Type::array(Type::Int);

        assert!(is_compatible(&Type::Nil, &record).unwrap());
        assert!(!is_compatible(&record, &Type::Nil).unwrap());
        assert!(!is_compatible(&Type::Nil, &Type::Nil).unwrap());
        assert!(!is_compatible(&Type::Nil, &Type::Int).unwrap());
        assert!(!is_compatible(&Type::Nil, &Type::String).unwrap());
        assert!(!is_compatible(&Type::Nil, &array).unwrap());
        assert!(!is_compatible(&Type::Nil, &Type::Unit).unwrap());
    }

    #[test]
    fn nil_is_compatible_with_a_record_behind_a_name() {
        let record = Type::record(vec![(sym("x"), Type::Int)]);
        let name = Type::name(sym("r"));
        if let Type::Name(cell) = &name {
            cell.resolve(record);
        }

        assert!(is_compatible(&Type::Nil, &name).unwrap());
    }

    #[test]
    fn display() {
        let record = Type::record(vec![(sym("hd"), Type::Int), (sym("tl"), Type::String)]);

        assert_eq!(format!("{}", Type::Int), "int");
        assert_eq!(format!("{}", record), "{ hd: int, tl: string }");
        assert_eq!(format!("{}", Type::array(Type::Int)), "array of int");
    }
}
