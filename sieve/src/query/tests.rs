//! Tests for the expression parser.

use super::*;
use crate::attributes::{Attribute, AttributeTable, FileType, TimeSpan};
use crate::extension::tests::arithmetic_registry;
use crate::extension::Registry;
use crate::flavor::Flavor;
use crate::Error;

fn compile(text: &str) -> crate::Result<Expr> {
    parse_expression(text, &AttributeTable::builtin(), ParseOptions::default())
}

fn compile_ok(text: &str) -> Expr {
    compile(text).unwrap_or_else(|e| panic!("failed to parse {:?}: {}", text, e))
}

fn compile_with(text: &str, registry: &Registry) -> crate::Result<Expr> {
    let options = ParseOptions::default().with_registry(registry);
    parse_expression(text, &AttributeTable::builtin(), options)
}

fn attr(a: Attribute) -> Operand {
    Operand::Attribute(a)
}

fn lit(l: Literal) -> Operand {
    Operand::Literal(l)
}

fn flag(a: Attribute) -> Expr {
    Expr::Flag(a)
}

#[test]
fn test_and_binds_tighter_than_or() {
    assert_eq!(
        compile_ok("readable or writable and empty"),
        Expr::or(
            flag(Attribute::Readable),
            Expr::and(flag(Attribute::Writable), flag(Attribute::Empty))
        )
    );
}

#[test]
fn test_not_binds_tighter_than_and() {
    assert_eq!(
        compile_ok("not readable and empty"),
        Expr::and(Expr::negate(flag(Attribute::Readable)), flag(Attribute::Empty))
    );
}

#[test]
fn test_parentheses() {
    assert_eq!(
        compile_ok("(readable or writable) and empty"),
        Expr::and(
            Expr::or(flag(Attribute::Readable), flag(Attribute::Writable)),
            flag(Attribute::Empty)
        )
    );
}

#[test]
fn test_keywords_case_insensitive() {
    assert_eq!(compile_ok("readable AND NOT empty"), compile_ok("readable and not empty"));
}

#[test]
fn test_double_equals() {
    assert_eq!(compile_ok("uid == 0"), compile_ok("uid = 0"));
}

#[test]
fn test_size_units() {
    assert_eq!(
        compile_ok("size > 1kb"),
        Expr::compare(attr(Attribute::Size), CompareOp::Gt, lit(Literal::Size(1024)))
    );
    assert_eq!(
        compile_ok("size = 5 kilobytes"),
        Expr::compare(attr(Attribute::Size), CompareOp::Eq, lit(Literal::Size(5120)))
    );
}

#[test]
fn test_bare_size_is_bytes() {
    assert_eq!(
        compile_ok("size = 720"),
        Expr::compare(attr(Attribute::Size), CompareOp::Eq, lit(Literal::Size(720)))
    );
}

#[test]
fn test_time_units() {
    assert_eq!(
        compile_ok("mtime = 6days"),
        Expr::compare(
            attr(Attribute::Mtime),
            CompareOp::Eq,
            lit(Literal::Time(TimeSpan { seconds: 6 * 86_400, granularity: 86_400 }))
        )
    );
    assert_eq!(
        compile_ok("mtime > 96 hours"),
        Expr::compare(
            attr(Attribute::Mtime),
            CompareOp::Gt,
            lit(Literal::Time(TimeSpan { seconds: 96 * 3_600, granularity: 3_600 }))
        )
    );
}

#[test]
fn test_bare_time_is_minutes() {
    assert_eq!(compile_ok("atime < 2"), compile_ok("atime < 2minutes"));
    assert_ne!(compile_ok("atime < 2"), compile_ok("atime < 2days"));
}

#[test]
fn test_literal_on_left_is_mirrored() {
    assert_eq!(compile_ok("1kb < size"), compile_ok("size > 1kb"));
    assert_eq!(compile_ok("6days = mtime"), compile_ok("mtime = 6days"));
}

#[test]
fn test_negative_integer() {
    assert_eq!(
        compile_ok("uid > -1"),
        Expr::compare(attr(Attribute::Uid), CompareOp::Gt, lit(Literal::Integer(-1)))
    );
}

#[test]
fn test_file_type_literal() {
    let expected = Expr::compare(
        attr(Attribute::Type),
        CompareOp::Eq,
        lit(Literal::FileType(FileType::Directory)),
    );
    assert_eq!(compile_ok("type = directory"), expected);
    assert_eq!(compile_ok("type = \"directory\""), expected);
    assert!(matches!(compile("type = fifo"), Err(Error::TypeMismatch(_))));
}

#[test]
fn test_flag_against_bool() {
    assert_eq!(
        compile_ok("readable = false"),
        Expr::compare(attr(Attribute::Readable), CompareOp::Eq, lit(Literal::Bool(false)))
    );
}

#[test]
fn test_filesystem_alias() {
    assert_eq!(compile_ok("fs = \"ext4\""), compile_ok("filesystem = \"ext4\""));
}

#[test]
fn test_regex_records_flavor() {
    let options = ParseOptions::new(Flavor::Basic);
    let expr = parse_expression(r#"regex = "a\+""#, &AttributeTable::builtin(), options).unwrap();
    match expr {
        Expr::Comparison(Comparison { right: Operand::Literal(Literal::Pattern(p)), .. }) => {
            assert_eq!(p.source, r"a\+");
            assert_eq!(p.flavor, Flavor::Basic);
            assert!(!p.case_insensitive);
        }
        other => panic!("unexpected {:?}", other),
    }
}

#[test]
fn test_iregex_is_case_insensitive() {
    let expected = Expr::compare(
        attr(Attribute::IRegex),
        CompareOp::Eq,
        lit(Literal::Pattern(Pattern::new(".*TXT", Flavor::Extended, true))),
    );
    assert_eq!(compile_ok("iregex = \".*TXT\""), expected);
}

#[test]
fn test_unknown_attribute() {
    assert!(matches!(compile("colour = 3"), Err(Error::UnknownAttribute(n)) if n == "colour"));
    assert!(matches!(compile("colour"), Err(Error::UnknownAttribute(_))));
}

#[test]
fn test_unit_errors() {
    assert!(matches!(compile("size > 5days"), Err(Error::UnitParse { .. })));
    assert!(matches!(compile("mtime > 5kb"), Err(Error::UnitParse { .. })));
    assert!(matches!(compile("size > 5parsecs"), Err(Error::UnitParse { .. })));
    assert!(matches!(compile("uid = 5kb"), Err(Error::UnitParse { .. })));
}

#[test]
fn test_operator_type_errors() {
    assert!(matches!(compile("name > \"a\""), Err(Error::TypeMismatch(_))));
    assert!(matches!(compile("type < file"), Err(Error::TypeMismatch(_))));
    assert!(matches!(compile("readable >= true"), Err(Error::TypeMismatch(_))));
}

#[test]
fn test_operand_type_errors() {
    assert!(matches!(compile("size = \"big\""), Err(Error::TypeMismatch(_))));
    assert!(matches!(compile("name = 5"), Err(Error::TypeMismatch(_))));
    assert!(matches!(compile("regex = name"), Err(Error::TypeMismatch(_))));
    assert!(matches!(compile("user = size"), Err(Error::TypeMismatch(_))));
}

#[test]
fn test_numeric_attributes_compare() {
    assert_eq!(
        compile_ok("uid = gid"),
        Expr::compare(attr(Attribute::Uid), CompareOp::Eq, attr(Attribute::Gid))
    );
    assert!(compile("atime < mtime").is_ok());
}

#[test]
fn test_syntax_errors() {
    for text in ["", "   ", "size >", "size", "readable and", "5", "(readable", "readable)", "and readable"] {
        assert!(
            matches!(compile(text), Err(Error::Syntax { .. })),
            "expected syntax error for {:?}",
            text
        );
    }
}

#[test]
fn test_syntax_error_position() {
    match compile("(readable") {
        Err(Error::Syntax { position, .. }) => assert_eq!(position, 9),
        other => panic!("unexpected {:?}", other),
    }
}

#[test]
fn test_lexical_error() {
    assert!(matches!(
        compile("size ! 5"),
        Err(Error::Lexical { position: 5, character: '!' })
    ));
}

#[test]
fn test_deep_nesting_rejected() {
    let text = format!("{}readable{}", "(".repeat(500), ")".repeat(500));
    assert!(matches!(compile(&text), Err(Error::Syntax { .. })));
}

#[test]
fn test_long_chains_stay_flat() {
    let text = vec!["empty"; 14_000].join(" or ");
    match compile_ok(&text) {
        Expr::Or(terms) => assert_eq!(terms.len(), 14_000),
        other => panic!("unexpected {:?}", other),
    }

    let text = vec!["(readable or writable)"; 7_000].join(" and ");
    let expr = compile_ok(&text);
    match &expr {
        Expr::And(terms) => assert_eq!(terms.len(), 7_000),
        other => panic!("unexpected {:?}", other),
    }
    assert_eq!(compile_ok(&expr.to_string()), expr);
}

#[test]
fn test_grouping_flattens_same_operator() {
    assert_eq!(
        compile_ok("readable and (writable and empty)"),
        Expr::And(vec![
            flag(Attribute::Readable),
            flag(Attribute::Writable),
            flag(Attribute::Empty),
        ])
    );
}

#[test]
fn test_call_without_registry() {
    assert_eq!(
        compile_ok("c_add(19, 4) = 23"),
        Expr::compare(
            Operand::Call(FunctionCall {
                name: "c_add".into(),
                args: vec![lit(Literal::Integer(19)), lit(Literal::Integer(4))],
            }),
            CompareOp::Eq,
            lit(Literal::Integer(23))
        )
    );
}

#[test]
fn test_call_resolved_with_registry() {
    let registry = arithmetic_registry();
    assert!(compile_with("c_add(19, 4) = 23", &registry).is_ok());
    assert!(compile_with("c_add(c_sub(5, 2), 1) = 4", &registry).is_ok());
    assert!(compile_with("size > c_add(size, 1)", &registry).is_ok());
}

#[test]
fn test_bare_call_is_condition() {
    let registry = arithmetic_registry();
    assert_eq!(
        compile_with("c_name_equals(\"./x\")", &registry).unwrap(),
        Expr::Call(FunctionCall {
            name: "c_name_equals".into(),
            args: vec![lit(Literal::String("./x".into()))],
        })
    );
}

#[test]
fn test_unknown_function() {
    let registry = arithmetic_registry();
    assert!(matches!(
        compile_with("c_mul(1, 2) = 2", &registry),
        Err(Error::UnknownFunction(n)) if n == "c_mul"
    ));
}

#[test]
fn test_arity_mismatch() {
    let registry = arithmetic_registry();
    assert!(matches!(
        compile_with("c_add(1) = 1", &registry),
        Err(Error::ArityMismatch { expected: 2, found: 1, .. })
    ));
    // unchecked until evaluation without a registry
    assert!(compile("c_add(1) = 1").is_ok());
}

#[test]
fn test_call_type_errors() {
    let registry = arithmetic_registry();
    for text in [
        "c_add(\"a\", 1) = 2",
        "c_add(1, 2) = \"3\"",
        "name = c_add(1, 2)",
        "c_add(type, 1) = 1",
        "c_add(1kb, 1) = 1",
    ] {
        assert!(
            matches!(compile_with(text, &registry), Err(Error::TypeMismatch(_))),
            "expected type mismatch for {:?}",
            text
        );
    }
}

#[test]
fn test_display_reparses() {
    for text in [
        "size > 1kb and not readable",
        "mtime = 6days or name = \"*.txt\"",
        "type = link and (uid = 0 or user = \"root\")",
        "c_add(19, 4) = 23",
        r#"regex = "\./x\.1" and name = "a\"b\\""#,
    ] {
        let expr = compile_ok(text);
        assert_eq!(compile_ok(&expr.to_string()), expr, "round trip of {:?}", text);
    }
}

#[test]
fn test_display_canonical_form() {
    assert_eq!(
        compile_ok("size>1kb and not readable").to_string(),
        "(size > 1024b and not readable)"
    );
}
