// Preprocessor behaviour through the public entry points

use std::path::Path;

use spfront::diagnostics::{codes, Severity};
use spfront::lexer::{tokenize, Token, TokenKind};
use spfront::options::Options;
use spfront::pipeline;
use spfront::preprocess::MacroTable;

fn lexemes(tokens: &[Token]) -> Vec<&str> {
    tokens
        .iter()
        .filter(|t| t.kind != TokenKind::EoF)
        .map(|t| t.lexeme.as_str())
        .collect()
}

fn run(src: &str) -> pipeline::Outcome<Vec<Token>> {
    pipeline::lex_string(src, &Options::default(), &mut MacroTable::new())
}

#[test]
fn test_else_branch_only() {
    let out = run("#if 0\nA\n#else\nB\n#endif");
    assert!(out.ok);
    assert_eq!(lexemes(&out.value.unwrap()), vec!["B"]);
}

#[test]
fn test_elseif_chain_and_arithmetic() {
    let src = "#define LEVEL 3\n#if LEVEL < 2\nlow\n#elseif LEVEL * 2 == 6 && defined LEVEL\nmid\n#else\nhigh\n#endif";
    assert_eq!(lexemes(&run(src).value.unwrap()), vec!["mid"]);
}

#[test]
fn test_modulo_in_condition() {
    let out = run("#define COUNT 7\n#if COUNT%2 == 1\nodd\n#else\neven\n#endif");
    assert!(out.ok, "{}", out.render(false));
    assert_eq!(lexemes(&out.value.unwrap()), vec!["odd"]);
}

#[test]
fn test_macro_arity() {
    let ok = run("#define MAX(%1, %2) ((%1) > (%2) ? (%1) : (%2))\nx = MAX(1, 2);");
    assert!(ok.ok);
    assert_eq!(
        lexemes(&ok.value.unwrap()),
        vec!["x", "=", "(", "(", "1", ")", ">", "(", "2", ")", "?", "(", "1", ")", ":", "(", "2", ")", ")", ";"]
    );

    for call in ["MAX(1)", "MAX(1, 2, 3)"] {
        let out = run(&format!("#define MAX(%1, %2) %1\nx = {call};"));
        assert!(!out.ok);
        assert!(out.value.is_none());
        assert_eq!(out.diagnostics[0].code, codes::PP_ARITY);
    }
}

#[test]
fn test_stringify_and_paste() {
    let out = run("#define NAME(%1) #%1\n#define GLUE(%1, %2) %1%2\nNAME(hello) GLUE(g_,Count)");
    assert!(out.ok, "{}", out.render(false));
    assert_eq!(lexemes(&out.value.unwrap()), vec!["\"hello\"", "g_Count"]);
}

#[test]
fn test_macros_persist_across_calls() {
    let mut macros = MacroTable::new();
    let options = Options::default();
    pipeline::lex_string("#define SIZE 16", &options, &mut macros);
    let out = pipeline::lex_string("int a[SIZE];", &options, &mut macros);
    assert_eq!(lexemes(&out.value.unwrap()), vec!["int", "a", "[", "16", "]", ";"]);
}

#[test]
fn test_preprocessing_is_idempotent_without_macros() {
    let mut macros = MacroTable::new();
    let options = Options::default().with_preserve_newlines(true);
    let first = pipeline::lex_string("int a = 1;\nfloat b = 2.0;\n", &options, &mut macros)
        .value
        .unwrap();
    let second = pipeline::preprocess(first.clone(), &options, &mut macros).value.unwrap();
    assert_eq!(lexemes(&first), lexemes(&second));
}

#[test]
fn test_preprocessing_is_idempotent_with_macros() {
    let mut macros = MacroTable::new();
    let options = Options::default().with_preserve_newlines(true);
    let src = "#define SLOTS 4\n#define SQUARE(%1) ((%1) * (%1))\n#define SELF SELF\nint cells = SQUARE(SLOTS) + SLOTS;\nint s = SELF;\n";
    let first = pipeline::lex_string(src, &options, &mut macros).value.unwrap();
    assert_eq!(
        lexemes(&first).into_iter().filter(|l| !l.starts_with('\n')).collect::<Vec<_>>(),
        vec!["int", "cells", "=", "(", "(", "4", ")", "*", "(", "4", ")", ")", "+", "4", ";", "int", "s", "=", "SELF", ";"]
    );

    let second = pipeline::preprocess(first.clone(), &options, &mut macros);
    assert!(second.ok);
    assert_eq!(lexemes(&first), lexemes(&second.value.unwrap()));
    assert_eq!(macros.len(), 3);
}

#[test]
fn test_self_referential_condition_is_an_error() {
    let out = run("#define A A\n#if A\nyes\n#endif");
    assert!(!out.ok);
    assert!(out.value.is_none());
    assert_eq!(out.diagnostics[0].code, codes::PP_DEPTH);
}

#[test]
fn test_condition_macro_chain_depth() {
    fn chain(links: usize) -> String {
        let mut src = String::new();
        for i in 0..links {
            src.push_str(&format!("#define M{i} M{}\n", i + 1));
        }
        src.push_str(&format!("#define M{links} 1\n#if M0\nyes\n#endif\n"));
        src
    }

    // M0 through M63 nest 64 evaluations deep
    let out = run(&chain(63));
    assert!(out.ok, "{}", out.render(false));
    assert_eq!(lexemes(&out.value.unwrap()), vec!["yes"]);

    let out = run(&chain(64));
    assert!(!out.ok);
    assert_eq!(out.diagnostics[0].code, codes::PP_DEPTH);
}

#[test]
fn test_user_diagnostics() {
    let out = run("#warning careful now\nint a;");
    assert!(out.ok);
    assert_eq!(out.diagnostics[0].severity, Severity::Warning);

    let out = run("#if 1\n#error stop here\n#endif");
    assert!(!out.ok);
    assert_eq!(out.diagnostics[0].code, codes::PP_USER_ERROR);
    assert!(out.diagnostics[0].message.contains("stop here"));
}

#[test]
fn test_unterminated_conditional() {
    let out = run("#if 1\nint a;");
    assert!(!out.ok);
    assert_eq!(out.diagnostics[0].code, codes::PP_UNTERMINATED);
}

#[test]
fn test_includes_resolve_once() {
    let path = Path::new("tests/fixtures/plugin.sp");
    let mut macros = MacroTable::new();
    let out = pipeline::lex_file(path, &Options::default(), &mut macros);
    assert!(out.ok, "{}", out.render(false));

    let tokens = out.value.unwrap();
    assert_eq!(tokens.iter().filter(|t| t.lexeme == "Counter" && t.path.ends_with("shared.inc")).count(), 2);
    assert!(tokens.iter().any(|t| t.path.ends_with("helpers.inc") && t.lexeme == "Clamp"));
    assert!(macros.is_defined("MAX_SLOTS"));
    assert!(!macros.is_defined("DEBUG"));
    // The main file and both includes are available for rendering
    assert_eq!(out.sources.len(), 3);
}

#[test]
fn test_missing_include() {
    let out = run("#include <no_such_file>\n");
    assert!(!out.ok);
    assert_eq!(out.diagnostics[0].code, codes::PP_INCLUDE);

    let out = run("#tryinclude <no_such_file>\nint a;");
    assert!(out.ok);
    assert_eq!(lexemes(&out.value.unwrap()), vec!["int", "a", ";"]);
}

#[test]
fn test_tokens_keep_their_origin() {
    let tokens = tokenize("#define TWO 2\nx = TWO;", "main.sp").unwrap();
    let out = pipeline::preprocess(tokens, &Options::default(), &mut MacroTable::new());
    let two = out.value.unwrap().into_iter().find(|t| t.lexeme == "2").unwrap();
    assert_eq!(two.span.line_start, 2);
    assert_eq!(&*two.path, "main.sp");
}
