// Constant folding and the statement interpreter

use std::fs;

use spfront::diagnostics::{codes, Severity};
use spfront::lexer::tokenize;
use spfront::options::Options;
use spfront::parser::ast::Plugin;
use spfront::parser::Parser;
use spfront::pipeline;
use spfront::preprocess::MacroTable;
use spfront::types::{ConstValue, Evaluator, Type, TypeAndVal};

fn eval(src: &str) -> pipeline::Outcome<TypeAndVal> {
    pipeline::eval_expression(src, &Options::default(), &mut MacroTable::new())
}

fn value(src: &str) -> Option<ConstValue> {
    let out = eval(src);
    assert!(out.ok, "{src}: {}", out.render(false));
    out.value.and_then(|v| v.value)
}

fn fixture() -> Plugin {
    let source = fs::read_to_string("tests/fixtures/compute.sp").expect("Failed to read fixture");
    let mut parser = Parser::new(tokenize(&source, "compute.sp").expect("scan failed"), 5);
    let plugin = parser.parse_plugin();
    assert_eq!(parser.error_count(), 0);
    plugin
}

fn run_function(name: &str, max_iterations: usize) -> pipeline::Outcome<TypeAndVal> {
    let options = Options::default().with_max_iterations(max_iterations);
    pipeline::eval_function(&mut fixture(), name, "compute.sp", &options)
}

#[test]
fn test_precedence_and_promotion() {
    assert_eq!(value("1 + 2 * 3"), Some(ConstValue::Int(7)));
    assert_eq!(value("(1 + 2) * 3"), Some(ConstValue::Int(9)));
    assert_eq!(value("7 / 2"), Some(ConstValue::Int(3)));
    assert_eq!(value("7 / 2.0"), Some(ConstValue::Float(3.5)));
    assert_eq!(value("-7 % 3"), Some(ConstValue::Int(-1)));
    assert_eq!(value("'a' + 1"), Some(ConstValue::Int(98)));
}

#[test]
fn test_wrapping_and_bits() {
    assert_eq!(value("2147483647 + 1"), Some(ConstValue::Int(i32::MIN)));
    assert_eq!(value("~0 >>> 28"), Some(ConstValue::Int(15)));
    assert_eq!(value("-16 >> 2"), Some(ConstValue::Int(-4)));
    assert_eq!(value("0x0F & 0x3C | 0x100 ^ 1"), Some(ConstValue::Int(0x10C | 1)));
}

#[test]
fn test_chains_and_logic() {
    assert_eq!(value("1 < 2 < 3"), Some(ConstValue::Bool(true)));
    assert_eq!(value("1 < 3 < 2"), Some(ConstValue::Bool(false)));
    assert_eq!(value("3 >= 3 > 1"), Some(ConstValue::Bool(true)));
    assert_eq!(value("!0 && (1 || 1 / 0)"), Some(ConstValue::Bool(true)));
    assert_eq!(value("2 > 1 ? 10 : 20"), Some(ConstValue::Int(10)));
}

#[test]
fn test_shift_warnings() {
    let out = eval("1 << 33");
    assert!(out.ok);
    assert_eq!(out.value.unwrap().value, Some(ConstValue::Int(2)));
    assert_eq!(out.diagnostics.len(), 1);
    assert_eq!(out.diagnostics[0].code, codes::SHIFT);
    assert_eq!(out.diagnostics[0].severity, Severity::Warning);

    let out = eval("5 << 0");
    assert_eq!(out.value.unwrap().value, Some(ConstValue::Int(5)));
    assert_eq!(out.diagnostics[0].code, codes::SHIFT);

    let out = eval("-8 >> 40");
    assert_eq!(out.value.unwrap().value, Some(ConstValue::Int(-1)));
    let out = eval("-8 >>> 40");
    assert_eq!(out.value.unwrap().value, Some(ConstValue::Int(0)));
}

#[test]
fn test_runtime_and_type_errors() {
    let out = eval("10 % 0");
    assert!(!out.ok);
    assert_eq!(out.diagnostics[0].code, codes::RUNTIME);
    assert!(out.value.unwrap().ty.is_void());

    let out = eval("\"text\" * 2");
    assert_eq!(out.diagnostics[0].code, codes::NOT_ARITHMETIC);

    let out = eval("view_as<int>(\"text\")");
    assert_eq!(out.diagnostics[0].code, codes::TYPE_MISMATCH);

    let out = eval("GetMaxClients() + 1");
    assert_eq!(out.diagnostics[0].code, codes::NOT_CONSTANT);

    let out = eval("MaxClients");
    assert_eq!(out.diagnostics[0].code, codes::UNDEFINED);
}

#[test]
fn test_view_as_reinterprets() {
    let out = eval("view_as<float>(0x40000000)");
    let result = out.value.unwrap();
    assert_eq!(result.ty, Type::Float);
    assert_eq!(result.value, Some(ConstValue::Float(2.0)));
}

#[test]
fn test_fixture_loops() {
    let out = run_function("Triangle", 1000);
    assert!(out.ok, "{:?}", out.diagnostics);
    assert!(out.diagnostics.is_empty());
    assert_eq!(out.value.unwrap().value, Some(ConstValue::Int(25)));

    let out = run_function("Collatz", 10_000);
    assert_eq!(out.value.unwrap().value, Some(ConstValue::Int(111)));

    let out = run_function("Average", 100);
    let result = out.value.unwrap();
    assert_eq!(result.ty, Type::Float);
    assert_eq!(result.value, Some(ConstValue::Float(3.0)));
}

#[test]
fn test_fixture_iteration_cap() {
    let out = run_function("Spin", 500);
    assert!(!out.ok);
    assert!(out.value.unwrap().ty.is_void());
    assert_eq!(out.diagnostics.len(), 1);
    assert_eq!(out.diagnostics[0].code, codes::ITERATION_LIMIT);
}

#[test]
fn test_statement_interpreter_directly() {
    let plugin = fixture();
    let func = plugin.functions().find(|f| f.name == "Collatz").expect("function missing");
    let mut evaluator = Evaluator::new("compute.sp").with_max_iterations(50);
    let result = evaluator.run(func.body.as_ref().expect("body missing"));
    assert!(result.ty.is_void());
    assert_eq!(evaluator.into_diagnostics()[0].code, codes::ITERATION_LIMIT);
}

#[test]
fn test_missing_function() {
    let out = run_function("Nowhere", 10);
    assert!(!out.ok);
    assert!(out.value.is_none());
    assert_eq!(out.diagnostics[0].code, codes::UNDEFINED);
}
