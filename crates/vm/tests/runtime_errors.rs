//! Runtime error domain (spec.md §7): each case aborts at the outermost
//! frame with a message and a stack trace, leaving no partial state.

mod common;

#[test]
fn undefined_global_read() {
    let err = common::run("print missing;").expect_err("undefined global is a runtime error");
    assert_eq!(err.message, "Undefined variable 'missing'.");
}

#[test]
fn undefined_global_assignment() {
    let err = common::run("missing = 1;").expect_err("assigning an undefined global is a runtime error");
    assert_eq!(err.message, "Undefined variable 'missing'.");
}

#[test]
fn type_error_on_arithmetic() {
    let err = common::run(r#"print 1 + "a";"#).expect_err("mixed add is a runtime error");
    assert_eq!(err.message, "Operands must be two numbers or two strings.");
}

#[test]
fn type_error_on_negate() {
    let err = common::run(r#"print -"a";"#).expect_err("negating a string is a runtime error");
    assert_eq!(err.message, "Operand must be a number.");
}

#[test]
fn arity_mismatch() {
    let err = common::run("fun f(a, b) { return a + b; } f(1);")
        .expect_err("calling with too few arguments is a runtime error");
    assert_eq!(err.message, "Expected 2 arguments but got 1.");
}

#[test]
fn calling_a_non_callable_value() {
    let err = common::run("var x = 1; x();").expect_err("calling a number is a runtime error");
    assert_eq!(err.message, "Can only call functions and classes.");
}

#[test]
fn property_access_on_non_instance() {
    let err = common::run("var x = 1; print x.field;").expect_err("a number has no properties");
    assert_eq!(err.message, "Only instances have properties.");
}

#[test]
fn undefined_property_read() {
    let source = r#"
        class Empty {}
        print Empty().field;
    "#;
    let err = common::run(source).expect_err("no such field or method exists");
    assert_eq!(err.message, "Undefined property 'field'.");
}

#[test]
fn stack_trace_names_the_failing_frame() {
    let source = r#"
        fun boom() { print missing_global; }
        boom();
    "#;
    let err = common::run(source).expect_err("the read fails");
    assert_eq!(err.message, "Undefined variable 'missing_global'.");
    assert!(err.stack_trace.iter().any(|line| line.contains("boom")));
}
