#[cfg(test)]
mod resolver_tests {
    use treelox as lox;

    use lox::expr::{Depth, Expr};
    use lox::parser::Parser;
    use lox::resolver::Resolver;
    use lox::scanner::Scanner;
    use lox::stmt::Stmt;
    use lox::LoxError;

    fn resolve_source(source: &str) -> Vec<LoxError> {
        let (tokens, scan_errors) = Scanner::new(source).scan_tokens();

        assert!(scan_errors.is_empty(), "scan errors: {:?}", scan_errors);

        let (statements, parse_errors) = Parser::new(tokens).parse();

        assert!(parse_errors.is_empty(), "parse errors: {:?}", parse_errors);

        Resolver::new().resolve(&statements)
    }

    fn assert_single_error(source: &str, needle: &str) {
        let errors = resolve_source(source);

        assert_eq!(errors.len(), 1, "errors for {:?}: {:?}", source, errors);

        assert!(
            matches!(&errors[0], LoxError::Resolve { message, .. } if message.contains(needle)),
            "expected message containing {:?}, got {:?}",
            needle,
            errors[0]
        );
    }

    #[test]
    fn test_use_in_own_initializer() {
        assert_single_error("{ var a = a; }", "its own initializer");
    }

    #[test]
    fn test_duplicate_declaration_in_local_scope() {
        assert_single_error("{ var a = 1; var a = 2; print a; }", "already declared");
    }

    #[test]
    fn test_global_redeclaration_is_allowed() {
        let errors = resolve_source("var a = 1; var a = 2; print a;");

        assert!(errors.is_empty(), "{:?}", errors);
    }

    #[test]
    fn test_return_outside_function() {
        assert_single_error("return 1;", "outside of a function");
    }

    #[test]
    fn test_return_value_from_initializer() {
        assert_single_error(
            "class Foo { init() { return 42; } }",
            "return a value from an initializer",
        );
    }

    #[test]
    fn test_bare_return_from_initializer_is_allowed() {
        let errors = resolve_source("class Foo { init() { return; } }");

        assert!(errors.is_empty(), "{:?}", errors);
    }

    #[test]
    fn test_this_outside_class() {
        assert_single_error("print this;", "outside of a class");
    }

    #[test]
    fn test_super_outside_class() {
        assert_single_error("print super.m;", "outside of a class");
    }

    #[test]
    fn test_super_without_superclass() {
        assert_single_error(
            "class A { m() { return super.m(); } }",
            "no superclass",
        );
    }

    #[test]
    fn test_self_inheritance() {
        assert_single_error("class A < A {}", "inherit from itself");
    }

    #[test]
    fn test_initializer_cannot_be_a_property() {
        assert_single_error(
            "class Foo { init { return; } }",
            "can't be a property",
        );
    }

    #[test]
    fn test_unused_local_variable() {
        assert_single_error("{ var a; }", "never used");
    }

    #[test]
    fn test_underscore_prefix_exempts_unused_locals() {
        let errors = resolve_source("{ var _scratch; }");

        assert!(errors.is_empty(), "{:?}", errors);
    }

    #[test]
    fn test_unused_parameter() {
        assert_single_error("fun f(a) {} f();", "never used");
    }

    #[test]
    fn test_initialized_locals_count_as_used() {
        let errors = resolve_source("{ var a = \"local\"; }");

        assert!(errors.is_empty(), "{:?}", errors);
    }

    #[test]
    fn test_globals_are_exempt_from_unused_checks() {
        let errors = resolve_source("var lonely;");

        assert!(errors.is_empty(), "{:?}", errors);
    }

    #[test]
    fn test_local_reference_depth() {
        let (tokens, _) = Scanner::new("{ var a = 1; { print a; } }").scan_tokens();
        let (statements, _) = Parser::new(tokens).parse();

        let errors = Resolver::new().resolve(&statements);
        assert!(errors.is_empty(), "{:?}", errors);

        let Stmt::Block(outer) = &statements[0] else {
            panic!("expected block");
        };

        let Stmt::Block(inner) = &outer[1] else {
            panic!("expected inner block");
        };

        let Stmt::Print(Expr::Variable { depth, .. }) = &inner[0] else {
            panic!("expected print of a variable");
        };

        assert_eq!(depth.get(), Some(Depth::Local(1)));
    }

    #[test]
    fn test_global_reference_depth() {
        let (tokens, _) = Scanner::new("var g = 1; print g;").scan_tokens();
        let (statements, _) = Parser::new(tokens).parse();

        let errors = Resolver::new().resolve(&statements);
        assert!(errors.is_empty(), "{:?}", errors);

        let Stmt::Print(Expr::Variable { depth, .. }) = &statements[1] else {
            panic!("expected print of a variable");
        };

        assert_eq!(depth.get(), Some(Depth::Global));
    }

    // Closures capture by declaration site: the body of `show` binds the
    // global `a` even though a shadowing local appears later.
    #[test]
    fn test_function_body_binds_at_declaration_site() {
        let source =
            "var a = \"global\";\n{ fun show() { print a; } show(); var a = \"local\"; show(); }";

        let errors = resolve_source(source);

        assert!(errors.is_empty(), "{:?}", errors);
    }
}
