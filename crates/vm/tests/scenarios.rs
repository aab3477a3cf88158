//! End-to-end interpreter scenarios (spec.md §8).

mod common;

#[test]
fn arithmetic_precedence() {
    let output = common::run("print 1 + 2 * 3;").expect("program runs to completion");
    assert_eq!(output, "7\n");
}

#[test]
fn string_interning_equality() {
    let output =
        common::run(r#"var a = "hi"; var b = "hi"; print a == b;"#).expect("program runs to completion");
    assert_eq!(output, "true\n");
}

#[test]
fn closure_capture_is_shared_across_closures() {
    let source = r#"
        var getClosure = nil;
        var incClosure = nil;
        fun mk() {
            var x = 1;
            fun get() { return x; }
            fun inc() { x = x + 1; }
            getClosure = get;
            incClosure = inc;
        }
        mk();
        incClosure();
        incClosure();
        print getClosure();
    "#;
    let output = common::run(source).expect("program runs to completion");
    assert_eq!(output, "3\n");
}

#[test]
fn class_init_and_instance_methods() {
    let source = r#"
        class Greeter {
            init(n) { this.n = n; }
            hi() { print "hello " + this.n; }
        }
        Greeter("world").hi();
    "#;
    let output = common::run(source).expect("program runs to completion");
    assert_eq!(output, "hello world\n");
}

#[test]
fn single_inheritance_with_super_call() {
    let source = r#"
        class A { f() { return "A"; } }
        class B < A { f() { return "B:" + super.f(); } }
        print B().f();
    "#;
    let output = common::run(source).expect("program runs to completion");
    assert_eq!(output, "B:A\n");
}

#[test]
fn recursive_factorial() {
    let source = r#"
        fun fact(n) { if (n <= 1) return 1; return n * fact(n - 1); }
        print fact(10);
    "#;
    let output = common::run(source).expect("program runs to completion");
    assert_eq!(output, "3628800\n");
}

#[test]
fn method_inherited_unless_overridden() {
    let source = r#"
        class A { f() { return "A.f"; } g() { return "A.g"; } }
        class B < A { g() { return "B.g"; } }
        var b = B();
        print b.f();
        print b.g();
    "#;
    let output = common::run(source).expect("program runs to completion");
    assert_eq!(output, "A.f\nB.g\n");
}

#[test]
fn for_loop_and_while_loop_share_semantics() {
    let source = r#"
        var sum = 0;
        for (var i = 1; i <= 5; i = i + 1) {
            sum = sum + i;
        }
        print sum;

        var n = 5;
        var product = 1;
        while (n > 0) {
            product = product * n;
            n = n - 1;
        }
        print product;
    "#;
    let output = common::run(source).expect("program runs to completion");
    assert_eq!(output, "15\n120\n");
}
