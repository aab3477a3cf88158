//! Invariants and laws from spec.md §8 that aren't tied to one scenario.

mod common;

use corvid_core::GcConfig;

#[test]
fn division_follows_ieee754() {
    let output = common::run("print 0 / 0; print 1 / 0; print -1 / 0;").expect("program runs");
    assert_eq!(output, "NaN\ninf\n-inf\n");
}

#[test]
fn double_negation_equals_truthiness() {
    let output =
        common::run(r#"print !!nil; print !!false; print !!0; print !!"";"#).expect("program runs");
    assert_eq!(output, "false\nfalse\ntrue\ntrue\n");
}

#[test]
fn output_is_identical_under_stress_gc() {
    let source = r#"
        class Node { init(v) { this.v = v; } }
        fun build(n) {
            var total = 0;
            var i = 0;
            while (i < n) {
                var node = Node(i);
                total = total + node.v;
                i = i + 1;
            }
            return total;
        }
        print build(50);
    "#;

    let normal = common::run(source).expect("normal run completes");

    let mut stress_config = GcConfig::default();
    stress_config.stress_gc = true;
    let stressed = common::run_with_config(source, stress_config).expect("stress run completes");

    assert_eq!(normal, stressed);
}

#[test]
fn closures_over_the_same_binding_see_each_others_writes() {
    let source = r#"
        var seenByA = nil;
        var seenByB = nil;
        fun mk() {
            var shared = 0;
            fun a() { shared = shared + 1; return shared; }
            fun b() { return shared; }
            seenByA = a;
            seenByB = b;
        }
        mk();
        seenByA();
        seenByA();
        print seenByB();
    "#;
    let output = common::run(source).expect("program runs");
    assert_eq!(output, "2\n");
}
