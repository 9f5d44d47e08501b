use std::collections::HashMap;

use appgate_core::Version;

use super::*;

fn env() -> HashMap<String, Value> {
    let mut env = HashMap::new();
    env.insert("IDF_TARGET".to_string(), Value::from("esp32s3"));
    env.insert("SOC_WIFI_SUPPORTED".to_string(), Value::Int(1));
    env.insert("SOC_UART_NUM".to_string(), Value::Int(3));
    env.insert("IDF_VERSION".to_string(), Value::Version(Version::new(5, 1, 2)));
    env
}

fn eval(src: &str) -> bool {
    Expression::compile(src).unwrap().evaluate(&env()).unwrap()
}

// ── Compilation ─────────────────────────────────────────────────

#[test]
fn compiles_simple_comparisons() {
    for src in [
        r#"IDF_TARGET == "esp32""#,
        r#"IDF_TARGET != "esp32""#,
        "SOC_UART_NUM >= 0x2",
        r#"IDF_TARGET not in ["esp32", "esp32c3"]"#,
        r#"(IDF_TARGET == "esp32" or IDF_TARGET == "esp32s3") and SOC_WIFI_SUPPORTED == 1"#,
    ] {
        assert!(Expression::compile(src).is_ok(), "failed to compile {src}");
    }
}

#[test]
fn rejects_malformed_expressions() {
    for src in [
        "",
        "IDF_TARGET",
        r#"IDF_TARGET == "esp32" and"#,
        r#"(IDF_TARGET == "esp32""#,
        r#"IDF_TARGET == "esp32")"#,
        "IDF_TARGET == esp32",
        "IDF_TARGET = 1",
        "SOC_UART_NUM in []",
        "SOC_UART_NUM in [1, [2]]",
        "idf_target == 1",
    ] {
        let err = Expression::compile(src).unwrap_err();
        assert!(matches!(err, ExprError::Syntax { .. }), "{src}: {err}");
    }
}

#[test]
fn syntax_error_reports_offset() {
    let err = Expression::compile(r#"IDF_TARGET == "esp32" xor 1"#).unwrap_err();
    assert_eq!(
        err,
        ExprError::Syntax {
            offset: 22,
            message: "unexpected word `xor` (strings must be double-quoted)".into()
        }
    );
}

#[test]
fn nesting_depth_is_bounded() {
    let nested = |depth: usize| format!("{}A == 1{}", "(".repeat(depth), ")".repeat(depth));
    assert!(Expression::compile(&nested(parser::MAX_NESTING)).is_ok());

    let err = Expression::compile(&nested(parser::MAX_NESTING + 1)).unwrap_err();
    assert_eq!(
        err,
        ExprError::Syntax {
            offset: parser::MAX_NESTING,
            message: "expression nested too deeply".into()
        }
    );

    // Deep enough to exhaust the stack without the limit.
    let err = Expression::compile(&nested(20_000)).unwrap_err();
    assert!(matches!(err, ExprError::Syntax { .. }));
}

#[test]
fn truncated_operand_must_still_parse() {
    assert!(Expression::compile("SOC_UART_NUM == 1 and SOC_UART_NUM == 1 and SOC_UART_NUM ==").is_err());
}

// ── Evaluation ──────────────────────────────────────────────────

#[test]
fn equality_and_membership() {
    assert!(eval(r#"IDF_TARGET == "esp32s3""#));
    assert!(!eval(r#"IDF_TARGET == "esp32""#));
    assert!(eval(r#"IDF_TARGET in ["esp32", "esp32s3"]"#));
    assert!(eval(r#"IDF_TARGET not in ["esp32", "esp32c3"]"#));
    assert!(eval("SOC_UART_NUM in [1, 3]"));
}

#[test]
fn integer_ordering_and_hex() {
    assert!(eval("SOC_UART_NUM > 2"));
    assert!(eval("SOC_UART_NUM <= 0x3"));
    assert!(!eval("SOC_UART_NUM < 3"));
}

#[test]
fn unknown_identifier_is_zero() {
    assert!(eval("SOC_NOT_A_THING == 0"));
    assert!(!eval(r#"SOC_NOT_A_THING == "x""#));
}

#[test]
fn and_binds_tighter_than_or() {
    // false or (true and true)
    assert!(eval(r#"IDF_TARGET == "esp32" or SOC_WIFI_SUPPORTED == 1 and SOC_UART_NUM == 3"#));
    // (true or false) and false
    assert!(!eval(r#"(IDF_TARGET == "esp32s3" or SOC_UART_NUM == 0) and SOC_WIFI_SUPPORTED == 0"#));
}

#[test]
fn long_chains_keep_first_two_operands() {
    // Third `and` operand is false but dropped.
    assert!(eval("SOC_UART_NUM == 3 and SOC_WIFI_SUPPORTED == 1 and SOC_UART_NUM == 99"));
    // Third `or` operand is true but dropped.
    assert!(!eval("SOC_UART_NUM == 0 or SOC_UART_NUM == 1 or SOC_UART_NUM == 3"));
}

#[test]
fn version_comparisons_use_numeric_ordering() {
    assert!(eval(r#"IDF_VERSION >= "5.0""#));
    assert!(eval(r#"IDF_VERSION < "5.10.0""#));
    assert!(eval(r#"IDF_VERSION == "5.1.2""#));
    assert!(!eval(r#"IDF_VERSION > "5.1.2""#));
}

#[test]
fn incoherent_comparisons_fail_at_evaluation() {
    for src in [
        "SOC_UART_NUM < [1, 2]",
        r#"IDF_TARGET > 3"#,
        "SOC_UART_NUM in 3",
        r#"IDF_VERSION > "latest""#,
    ] {
        let expr = Expression::compile(src).unwrap();
        let err = expr.evaluate(&env()).unwrap_err();
        assert!(matches!(err, ExprError::Evaluation(_)), "{src}: {err}");
    }
}

#[test]
fn evaluation_is_deterministic() {
    let expr = Expression::compile(r#"IDF_TARGET in ["esp32s3"] and SOC_UART_NUM > 1"#).unwrap();
    let env = env();
    let first = expr.evaluate(&env).unwrap();
    for _ in 0..10 {
        assert_eq!(expr.evaluate(&env).unwrap(), first);
    }
}

#[test]
fn key_ignores_whitespace() {
    let a = Expression::compile(r#"IDF_TARGET=="esp32""#).unwrap();
    let b = Expression::compile(r#"IDF_TARGET  ==  "esp32""#).unwrap();
    assert_eq!(a, b);
    assert_eq!(a.key(), r#"IDF_TARGET=="esp32""#);
    assert_eq!(b.to_string(), r#"IDF_TARGET  ==  "esp32""#);
}

#[test]
fn collects_identifiers() {
    let expr = Expression::compile(r#"IDF_TARGET == "esp32" or (SOC_UART_NUM > 1 and IDF_TARGET != "x")"#).unwrap();
    assert_eq!(expr.root().identifiers(), vec!["IDF_TARGET", "SOC_UART_NUM"]);
}
