pub mod diagnostic;
pub mod semantics;
pub mod syntax;
