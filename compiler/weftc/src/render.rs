//! Renders a runtime [`Value`] as the REPL wire surface expects it (spec
//! §6 `val <name> = <value> : <type>`). Grounded on the teacher's
//! `EvalOutput::from_value` (`ori_eval`'s Salsa-compatible value shadow):
//! here there is no Salsa boundary to cross, so values render straight to
//! `String` rather than through an intermediate owned shadow type.

use weft_eval::{list_to_vec, Value};
use weft_ir::StringLookup;

#[must_use]
pub fn render_value(value: &Value, interner: &dyn StringLookup) -> String {
    match value {
        Value::Unit => "()".to_string(),
        Value::Bool(b) => b.to_string(),
        Value::Int(i) => i.to_string(),
        Value::Real(r) => format!("{r}"),
        Value::Char(c) => format!("#\"{c}\""),
        Value::Str(s) => format!("\"{s}\""),
        Value::Tuple(items) => paren_list(items.iter().map(|v| render_value(v, interner))),
        Value::Record(fields) | Value::Row(fields) => {
            let rendered = fields.iter().map(|(name, v)| format!("{} = {}", interner.resolve(*name), render_value(v, interner)));
            format!("{{{}}}", rendered.collect::<Vec<_>>().join(", "))
        }
        Value::List(node) => {
            let items = list_to_vec(node);
            format!("[{}]", items.iter().map(|v| render_value(v, interner)).collect::<Vec<_>>().join(", "))
        }
        Value::Ctor(name, args) => render_applied(interner.resolve(*name), args, interner),
        Value::Closure(_) | Value::Native(_) => "<fn>".to_string(),
        Value::Exn(name, payload) => match payload {
            Some(v) => render_applied(interner.resolve(*name), std::slice::from_ref(v.as_ref()), interner),
            None => interner.resolve(*name).to_string(),
        },
        Value::Ref(cell) => format!("ref {}", render_value(&cell.borrow(), interner)),
        Value::RelSeq(cell) => {
            let rows = cell.force();
            format!("[{}]", rows.iter().map(|v| render_value(v, interner)).collect::<Vec<_>>().join(", "))
        }
    }
}

fn render_applied(name: &str, args: &[Value], interner: &dyn StringLookup) -> String {
    if args.is_empty() {
        name.to_string()
    } else {
        format!("{} {}", name, paren_list(args.iter().map(|v| render_value(v, interner))))
    }
}

fn paren_list(items: impl Iterator<Item = String>) -> String {
    format!("({})", items.collect::<Vec<_>>().join(", "))
}

#[cfg(test)]
mod tests {
    use super::*;
    use weft_eval::list_from_vec;
    use weft_ir::StringInterner;

    #[test]
    fn renders_scalars_the_same_way_the_repl_wire_format_expects() {
        let interner = StringInterner::new();
        assert_eq!(render_value(&Value::Int(5), &interner), "5");
        assert_eq!(render_value(&Value::Bool(true), &interner), "true");
        assert_eq!(render_value(&Value::Unit, &interner), "()");
        assert_eq!(render_value(&Value::Str("hi".into()), &interner), "\"hi\"");
    }

    #[test]
    fn renders_a_tuple_as_comma_separated_and_parenthesised() {
        let interner = StringInterner::new();
        let value = Value::tuple(vec![Value::Int(1), Value::Bool(false)]);
        assert_eq!(render_value(&value, &interner), "(1, false)");
    }

    #[test]
    fn renders_a_list_in_bracket_notation() {
        let interner = StringInterner::new();
        let value = Value::List(list_from_vec(vec![Value::Int(1), Value::Int(2)]));
        assert_eq!(render_value(&value, &interner), "[1, 2]");
    }

    #[test]
    fn renders_a_nullary_ctor_without_parens_and_a_unary_one_with_its_argument() {
        let mut interner = StringInterner::new();
        let none = interner.intern("None");
        let some = interner.intern("Some");
        assert_eq!(render_value(&Value::ctor(none, vec![]), &interner), "None");
        assert_eq!(render_value(&Value::ctor(some, vec![Value::Int(1)]), &interner), "Some (1)");
    }

    #[test]
    fn renders_a_ref_cell_by_dereferencing_it() {
        let interner = StringInterner::new();
        let value = Value::Ref(std::rc::Rc::new(std::cell::RefCell::new(Value::Int(9))));
        assert_eq!(render_value(&value, &interner), "ref 9");
    }
}
