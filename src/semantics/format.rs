//! Human-readable formatting for types, regions, and locations.

use crate::syntax::Span;

use super::types::{Region, TypeInfo, TypeKind};

/// Render a type the way error messages and traces spell it.
pub fn format_type(ty: &TypeInfo) -> String {
    let base = match &ty.kind {
        TypeKind::Int => "int".to_owned(),
        TypeKind::Float => "float".to_owned(),
        TypeKind::Char => "char".to_owned(),
        TypeKind::Bool => "bool".to_owned(),
        TypeKind::Void => "void".to_owned(),
        TypeKind::Unknown => "unknown".to_owned(),
        TypeKind::Array { element, size } => {
            format!("{}[{}]", format_type(element), size)
        }
        TypeKind::Function {
            parameters,
            returns,
            ..
        } => {
            let params: Vec<String> = parameters.iter().map(|p| format_type(p)).collect();
            format!("fn({}) -> {}", params.join(", "), format_type(returns))
        }
        TypeKind::Class { name, .. } => format!("class {}", name),
    };
    if ty.pointer {
        format!("{} *", base)
    } else {
        base
    }
}

pub fn format_region(region: Region) -> &'static str {
    match region {
        Region::Global => "global",
        Region::Local => "local",
        Region::Class => "class",
        Region::Constant => "constant",
    }
}

pub fn format_span_location(span: &Span) -> String {
    format!("line {}, column {}", span.row_start, span.col_start)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::semantics::types::Primitives;
    use std::rc::Rc;

    #[test]
    fn formats_compound_types() {
        let prims = Primitives::new();
        let arr = TypeInfo::array(Rc::clone(&prims.int), 3);
        assert_eq!(format_type(&arr), "int[3]");

        let f = TypeInfo::function(
            vec![Rc::clone(&prims.int), Rc::clone(&prims.string)],
            Rc::clone(&prims.void),
            None,
            0,
        );
        assert_eq!(format_type(&f), "fn(int, char *) -> void");

        let class = TypeInfo::class("Foo");
        assert_eq!(format_type(&class), "class Foo");
    }
}
