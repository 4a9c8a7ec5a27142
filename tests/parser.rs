#[cfg(test)]
mod parser_tests {
    use treelox as lox;

    use lox::expr::Expr;
    use lox::parser::Parser;
    use lox::scanner::Scanner;
    use lox::stmt::Stmt;
    use lox::LoxError;

    fn parse_source(source: &str) -> (Vec<Stmt>, Vec<LoxError>) {
        let (tokens, scan_errors) = Scanner::new(source).scan_tokens();

        assert!(scan_errors.is_empty(), "scan errors: {:?}", scan_errors);

        Parser::new(tokens).parse()
    }

    fn parse_clean(source: &str) -> Vec<Stmt> {
        let (statements, errors) = parse_source(source);

        assert!(errors.is_empty(), "parse errors: {:?}", errors);

        statements
    }

    #[test]
    fn test_for_desugars_to_block_and_while() {
        let statements = parse_clean("for (var i = 0; i < 3; i = i + 1) print i;");

        assert_eq!(statements.len(), 1);

        let Stmt::Block(outer) = &statements[0] else {
            panic!("expected outer block, got {:?}", statements[0]);
        };

        assert_eq!(outer.len(), 2);
        assert!(matches!(outer[0], Stmt::Var { .. }));

        let Stmt::While { body, .. } = &outer[1] else {
            panic!("expected while, got {:?}", outer[1]);
        };

        let Stmt::Block(inner) = body.as_ref() else {
            panic!("expected desugared body block, got {:?}", body);
        };

        assert_eq!(inner.len(), 2);
        assert!(matches!(inner[0], Stmt::Print(_)));
        assert!(matches!(inner[1], Stmt::Expression(Expr::Assign { .. })));
    }

    #[test]
    fn test_assignment_to_property_becomes_set() {
        let statements = parse_clean("a.b = 1;");

        assert!(matches!(
            statements[0],
            Stmt::Expression(Expr::Set { .. })
        ));
    }

    #[test]
    fn test_invalid_assignment_target_is_reported_and_parsing_continues() {
        let (statements, errors) = parse_source("1 = 2;\nprint 3;");

        assert_eq!(statements.len(), 2);
        assert!(matches!(statements[1], Stmt::Print(_)));

        assert_eq!(errors.len(), 1);
        assert!(
            matches!(&errors[0], LoxError::Syntax { message, .. } if message.contains("invalid assignment target"))
        );
    }

    #[test]
    fn test_break_outside_loop_is_an_error() {
        let (_, errors) = parse_source("break;");

        assert_eq!(errors.len(), 1);
        assert!(
            matches!(&errors[0], LoxError::Syntax { message, .. } if message.contains("inside a loop"))
        );
    }

    #[test]
    fn test_break_inside_loop_parses() {
        let statements = parse_clean("while (true) break;");

        let Stmt::While { body, .. } = &statements[0] else {
            panic!("expected while");
        };

        assert!(matches!(body.as_ref(), Stmt::Break { .. }));
    }

    #[test]
    fn test_comma_is_left_associative_and_lowest_precedence() {
        let statements = parse_clean("1, 2, 3;");

        let Stmt::Expression(Expr::Comma { left, .. }) = &statements[0] else {
            panic!("expected comma expression, got {:?}", statements[0]);
        };

        assert!(matches!(left.as_ref(), Expr::Comma { .. }));
    }

    #[test]
    fn test_ternary_is_right_associative() {
        let statements = parse_clean("true ? 1 : false ? 2 : 3;");

        let Stmt::Expression(Expr::Ternary { else_branch, .. }) = &statements[0] else {
            panic!("expected ternary, got {:?}", statements[0]);
        };

        assert!(matches!(else_branch.as_ref(), Expr::Ternary { .. }));
    }

    #[test]
    fn test_class_declaration_shape() {
        let statements = parse_clean(
            "class Point < Base { init(x) { this.x = x; } area { return 1; } class origin() { return 0; } }",
        );

        let Stmt::Class {
            superclass,
            methods,
            class_methods,
            ..
        } = &statements[0]
        else {
            panic!("expected class, got {:?}", statements[0]);
        };

        assert!(matches!(superclass, Some(Expr::Variable { .. })));

        assert_eq!(methods.len(), 2);
        assert!(methods[0].is_initializer);
        assert!(!methods[0].is_property);
        assert_eq!(methods[1].name.lexeme, "area");
        assert!(methods[1].is_property);

        assert_eq!(class_methods.len(), 1);
        assert_eq!(class_methods[0].name.lexeme, "origin");
        assert!(!class_methods[0].is_initializer);
    }

    #[test]
    fn test_anonymous_function_expression() {
        let statements = parse_clean("var f = fun (a) { return a; };");

        let Stmt::Var {
            initializer: Some(Expr::Function(function)),
            ..
        } = &statements[0]
        else {
            panic!("expected var with fn initializer, got {:?}", statements[0]);
        };

        assert_eq!(function.parameters.len(), 1);
    }

    #[test]
    fn test_recovery_synchronizes_to_the_next_statement() {
        let (statements, errors) = parse_source("var = 1;\nprint 2;");

        assert_eq!(errors.len(), 1);

        assert_eq!(statements.len(), 1);
        assert!(matches!(statements[0], Stmt::Print(_)));
    }

    #[test]
    fn test_argument_cap_reports_but_continues() {
        let args: Vec<String> = (0..256).map(|i| i.to_string()).collect();
        let source = format!("f({});", args.join(", "));

        let (statements, errors) = parse_source(&source);

        assert_eq!(statements.len(), 1);
        assert_eq!(errors.len(), 1);
        assert!(
            matches!(&errors[0], LoxError::Syntax { message, .. } if message.contains("255"))
        );
    }

    #[test]
    fn test_parse_expression_rejects_trailing_input() {
        let (tokens, _) = Scanner::new("1 2").scan_tokens();
        let (expr, errors) = Parser::new(tokens).parse_expression();

        assert!(expr.is_some());
        assert_eq!(errors.len(), 1);
    }

    #[test]
    fn test_parse_expression_accepts_a_bare_expression() {
        let (tokens, _) = Scanner::new("1 + 2 * 3").scan_tokens();
        let (expr, errors) = Parser::new(tokens).parse_expression();

        assert!(errors.is_empty());
        assert!(matches!(expr, Some(Expr::Binary { .. })));
    }
}
