//! Compile-time diagnostics and successful-compile smoke tests.

use corvid_core::{GcConfig, Heap};
use corvid_compiler::compile;

fn heap() -> Heap {
    Heap::new(GcConfig::default())
}

#[test]
fn compiles_arithmetic_and_print() {
    let mut heap = heap();
    let result = compile("print 1 + 2 * 3;", &mut heap);
    assert!(result.is_ok());
}

#[test]
fn compiles_closures_and_classes() {
    let mut heap = heap();
    let source = r#"
        class Greeter {
            init(name) {
                this.name = name;
            }
            hello() {
                return "hello " + this.name;
            }
        }
        var g = Greeter("world");
        print g.hello();
    "#;
    assert!(compile(source, &mut heap).is_ok());
}

#[test]
fn compiles_inheritance_with_super() {
    let mut heap = heap();
    let source = r#"
        class A {
            f() { return "A"; }
        }
        class B < A {
            f() { return "B:" + super.f(); }
        }
    "#;
    assert!(compile(source, &mut heap).is_ok());
}

#[test]
fn reports_unexpected_token() {
    let mut heap = heap();
    let err = compile("var = 1;", &mut heap).unwrap_err();
    assert!(!err.is_empty());
    assert!(err.to_string().contains("Error at '='"));
}

#[test]
fn reports_top_level_return() {
    let mut heap = heap();
    let err = compile("return 1;", &mut heap).unwrap_err();
    assert!(err.to_string().contains("Can't return from top-level code."));
}

#[test]
fn reports_this_outside_class() {
    let mut heap = heap();
    let err = compile("print this;", &mut heap).unwrap_err();
    assert!(err.to_string().contains("Can't use 'this' outside of a class."));
}

#[test]
fn reports_self_inheritance() {
    let mut heap = heap();
    let err = compile("class Oops < Oops {}", &mut heap).unwrap_err();
    assert!(err.to_string().contains("A class can't inherit from itself."));
}

#[test]
fn reports_invalid_assignment_target() {
    let mut heap = heap();
    let err = compile("1 + 2 = 3;", &mut heap).unwrap_err();
    assert!(err.to_string().contains("Invalid assignment target."));
}

#[test]
fn compiles_for_loop_and_recursion() {
    let mut heap = heap();
    let source = r#"
        fun fact(n) {
            if (n <= 1) return 1;
            return n * fact(n - 1);
        }
        for (var i = 0; i < 3; i = i + 1) {
            print fact(i);
        }
    "#;
    assert!(compile(source, &mut heap).is_ok());
}
