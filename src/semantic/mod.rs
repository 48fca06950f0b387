mod binding;
mod errors;
mod loops;
mod scope;
mod translate;
mod types;

pub use binding::Binding;
pub use errors::{SemanticError, SemanticErrorKind};
pub use loops::LoopStack;
pub use scope::Environment;
pub use translate::{Analyzer, Tenv, Venv};
pub use types::{actual_ty, equals, is_compatible, ArrayType, IncompleteType, NameType, RecordType, Type};
