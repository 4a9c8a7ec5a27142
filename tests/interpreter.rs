#[cfg(test)]
mod interpreter_tests {
    use std::cell::RefCell;
    use std::rc::Rc;

    use treelox as lox;

    use lox::interpreter::Interpreter;
    use lox::parser::Parser;
    use lox::resolver::Resolver;
    use lox::scanner::Scanner;
    use lox::LoxError;

    /// Run a program through the whole pipeline, capturing stdout.
    fn run_capture(source: &str) -> (lox::Result<()>, String) {
        let (tokens, scan_errors) = Scanner::new(source).scan_tokens();
        assert!(scan_errors.is_empty(), "scan errors: {:?}", scan_errors);

        let (statements, parse_errors) = Parser::new(tokens).parse();
        assert!(parse_errors.is_empty(), "parse errors: {:?}", parse_errors);

        let resolve_errors = Resolver::new().resolve(&statements);
        assert!(
            resolve_errors.is_empty(),
            "resolver errors: {:?}",
            resolve_errors
        );

        let sink: Rc<RefCell<Vec<u8>>> = Rc::new(RefCell::new(Vec::new()));

        let mut interpreter = Interpreter::with_output(sink.clone());
        let result = interpreter.interpret(&statements);

        let output = String::from_utf8(sink.borrow().clone()).expect("print output is utf-8");

        (result, output)
    }

    fn run_program(source: &str) -> String {
        let (result, output) = run_capture(source);

        assert!(result.is_ok(), "runtime error: {:?}", result.err());

        output
    }

    // ─────────────────────────────────────────────────────────────────────
    // End-to-end scenarios
    // ─────────────────────────────────────────────────────────────────────

    #[test]
    fn test_closure_counter() {
        let source = "\
fun makeCounter() { var i = 0; fun count() { i = i + 1; print i; } return count; }
var c = makeCounter(); c(); c(); c();";

        assert_eq!(run_program(source), "1\n2\n3\n");
    }

    #[test]
    fn test_resolver_binds_at_declaration_site() {
        let source = "\
var a = \"global\";
{ fun show() { print a; } show(); var a = \"local\"; show(); }";

        assert_eq!(run_program(source), "global\nglobal\n");
    }

    #[test]
    fn test_inheritance_and_super() {
        let source = "\
class A { greet() { print \"A\"; } }
class B < A { greet() { super.greet(); print \"B\"; } }
B().greet();";

        assert_eq!(run_program(source), "A\nB\n");
    }

    #[test]
    fn test_initializer_returns_instance() {
        let source = "\
class Foo { init() { this.x = 1; } }
var f = Foo(); print f.x; print f.init().x;";

        assert_eq!(run_program(source), "1\n1\n");
    }

    #[test]
    fn test_break_out_of_while() {
        let source = "var i = 0; while (true) { i = i + 1; if (i == 3) break; } print i;";

        assert_eq!(run_program(source), "3\n");
    }

    #[test]
    fn test_runtime_error_carries_line_and_operator() {
        let (result, output) = run_capture("print \"a\" - 1;");

        assert_eq!(output, "");

        match result {
            Err(LoxError::Runtime {
                line,
                lexeme,
                message,
            }) => {
                assert_eq!(line, 1);
                assert_eq!(lexeme, "-");
                assert!(message.contains("must be numbers"), "{}", message);
            }

            other => panic!("expected a runtime error, got {:?}", other),
        }
    }

    // ─────────────────────────────────────────────────────────────────────
    // Expression semantics
    // ─────────────────────────────────────────────────────────────────────

    #[test]
    fn test_short_circuit_is_observable() {
        let source = "\
fun yes() { print \"yes\"; return true; }
fun no() { print \"no\"; return false; }
no() and yes();
yes() or no();";

        assert_eq!(run_program(source), "no\nyes\n");
    }

    #[test]
    fn test_logical_operators_return_the_deciding_operand() {
        let source = "print nil or \"fallback\"; print 1 and 2; print false or nil;";

        assert_eq!(run_program(source), "fallback\n2\nnil\n");
    }

    #[test]
    fn test_operands_evaluate_left_to_right() {
        let source = "\
fun tag(x) { print x; return x; }
print tag(1) + tag(2) * tag(3);";

        assert_eq!(run_program(source), "1\n2\n3\n7\n");
    }

    #[test]
    fn test_plus_stringifies_when_either_side_is_a_string() {
        let source = "print \"n=\" + 4; print 4 + \"!\"; print \"v\" + nil; print 1 + 2;";

        assert_eq!(run_program(source), "n=4\n4!\nvnil\n3\n");
    }

    #[test]
    fn test_division_by_zero_is_a_runtime_error() {
        let (result, _) = run_capture("print 8 / 0;");

        assert!(
            matches!(result, Err(LoxError::Runtime { ref message, .. }) if message.contains("division by zero")),
            "{:?}",
            result
        );
    }

    #[test]
    fn test_reading_an_uninitialized_variable_fails() {
        let (result, _) = run_capture("var a; print a;");

        assert!(
            matches!(result, Err(LoxError::Runtime { ref message, .. }) if message.contains("uninitialized")),
            "{:?}",
            result
        );
    }

    #[test]
    fn test_comma_yields_the_right_operand() {
        assert_eq!(run_program("print (1, 2);"), "2\n");
    }

    #[test]
    fn test_ternary() {
        let source = "print true ? \"yes\" : \"no\"; print 1 > 2 ? \"a\" : \"b\";";

        assert_eq!(run_program(source), "yes\nb\n");
    }

    #[test]
    fn test_equality_semantics() {
        let source = "\
print 1 == 1; print \"a\" == \"a\"; print nil == nil; print 1 == \"1\"; print true == 1;";

        assert_eq!(run_program(source), "true\ntrue\ntrue\nfalse\nfalse\n");
    }

    #[test]
    fn test_number_display_drops_integer_fractions() {
        assert_eq!(run_program("print 3.0; print 2.5; print 10 / 4;"), "3\n2.5\n2.5\n");
    }

    #[test]
    fn test_value_display_forms() {
        let source = "\
class Foo {}
var f = Foo();
print Foo;
print f;
fun g() {}
print g;
print clock;
print fun () {};";

        assert_eq!(
            run_program(source),
            "<class 'Foo'>\n<instance of class 'Foo'>\n<fn 'g'>\n<native fn 'clock'>\n<anonymous fn>\n"
        );
    }

    // ─────────────────────────────────────────────────────────────────────
    // Functions and calls
    // ─────────────────────────────────────────────────────────────────────

    #[test]
    fn test_closures_capture_the_defining_frame() {
        let source = "\
fun makeAdder(n) { return fun (x) { return x + n; }; }
var add2 = makeAdder(2);
print add2(5);";

        assert_eq!(run_program(source), "7\n");
    }

    #[test]
    fn test_return_unwinds_through_loops() {
        let source = "\
fun firstOver(limit) { var i = 0; while (true) { i = i + 1; if (i > limit) return i; } }
print firstOver(3);";

        assert_eq!(run_program(source), "4\n");
    }

    #[test]
    fn test_arity_mismatch() {
        let (result, _) = run_capture("fun f(a) { return a; } print f(1, 2);");

        assert!(
            matches!(result, Err(LoxError::Runtime { ref message, .. }) if message.contains("expected 1 arguments but got 2")),
            "{:?}",
            result
        );
    }

    #[test]
    fn test_calling_a_non_callable_fails() {
        let (result, _) = run_capture("\"x\"();");

        assert!(
            matches!(result, Err(LoxError::Runtime { ref message, .. }) if message.contains("can only call functions and classes")),
            "{:?}",
            result
        );
    }

    // ─────────────────────────────────────────────────────────────────────
    // Classes, properties, statics
    // ─────────────────────────────────────────────────────────────────────

    #[test]
    fn test_fields_spring_into_existence_on_first_set() {
        let source = "\
class Bag {}
var b = Bag();
b.item = \"apple\";
print b.item;";

        assert_eq!(run_program(source), "apple\n");
    }

    #[test]
    fn test_undefined_property_is_a_runtime_error() {
        let (result, _) = run_capture("class Foo {}\nvar f = Foo();\nprint f.bar;");

        assert!(
            matches!(result, Err(LoxError::Runtime { ref message, .. }) if message.contains("undefined property 'bar'")),
            "{:?}",
            result
        );
    }

    #[test]
    fn test_property_getters_are_invoked_on_access() {
        let source = "\
class Circle { init(r) { this.r = r; } area { return 3 * this.r * this.r; } }
var c = Circle(2); print c.area;";

        assert_eq!(run_program(source), "12\n");
    }

    #[test]
    fn test_super_resolves_property_getters() {
        let source = "\
class A { greeting { return \"hi\"; } }
class B < A { greet() { return super.greeting; } }
print B().greet();";

        assert_eq!(run_program(source), "hi\n");
    }

    #[test]
    fn test_class_methods_live_on_the_metaclass() {
        let source = "\
class Math { class square(n) { return n * n; } }
print Math.square(4);";

        assert_eq!(run_program(source), "16\n");
    }

    #[test]
    fn test_static_fields_through_the_class() {
        let source = "\
class Config {}
Config.limit = 10;
print Config.limit;";

        assert_eq!(run_program(source), "10\n");
    }

    #[test]
    fn test_this_in_a_class_method_is_the_class() {
        let source = "\
class Registry { class label() { return \"registry\"; } class describe() { return this.label(); } }
print Registry.describe();";

        assert_eq!(run_program(source), "registry\n");
    }

    #[test]
    fn test_class_methods_are_inherited() {
        let source = "\
class Base { class kind() { return \"base\"; } }
class Derived < Base {}
print Derived.kind();";

        assert_eq!(run_program(source), "base\n");
    }

    #[test]
    fn test_initializer_call_returns_the_same_instance() {
        let source = "\
class Foo { init() { this.x = 1; } }
var a = Foo();
print a.init() == a;";

        assert_eq!(run_program(source), "true\n");
    }

    #[test]
    fn test_instance_equality_is_identity() {
        let source = "\
class Foo {}
var a = Foo();
var b = Foo();
print a == a;
print a == b;";

        assert_eq!(run_program(source), "true\nfalse\n");
    }

    // ─────────────────────────────────────────────────────────────────────
    // REPL surface
    // ─────────────────────────────────────────────────────────────────────

    #[test]
    fn test_repl_repr_quotes_strings_only() {
        let (tokens, _) = Scanner::new("\"hi\"").scan_tokens();
        let (expr, errors) = Parser::new(tokens).parse_expression();
        let expr = expr.expect("expression");
        assert!(errors.is_empty());

        let resolve_errors = Resolver::new().resolve_expression(&expr);
        assert!(resolve_errors.is_empty());

        let mut interpreter = Interpreter::new();
        let value = interpreter.interpret_expression(&expr).expect("evaluates");

        assert_eq!(value.repr(), "\"hi\"");
        assert_eq!(value.to_string(), "hi");
    }
}
