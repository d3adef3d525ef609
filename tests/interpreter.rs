#[cfg(test)]
mod interpreter_tests {
    use pretty_assertions::assert_eq;
    use rox::interpreter::Interpreter;
    use rox::value::Value;
    use rox::{Failure, Session};

    /// Run a whole program, returning what it printed and how it ended.
    fn run(source: &str) -> (String, Result<(), Failure>) {
        let mut session: Session<Vec<u8>> = Session::with_output(Vec::new());
        let result = session.run(source);
        let printed = String::from_utf8(session.output().clone()).expect("output is UTF-8");

        (printed, result)
    }

    fn output_of(source: &str) -> String {
        let (printed, result) = run(source);

        if let Err(failure) = result {
            panic!("program failed: {:?}", failure.errors());
        }

        printed
    }

    fn runtime_error(source: &str) -> (String, String) {
        match run(source) {
            (printed, Err(failure @ Failure::Runtime(_))) => {
                assert_eq!(failure.exit_code(), 70);
                (printed, failure.errors()[0].to_string())
            }
            (_, other) => panic!("expected a runtime error, got {:?}", other),
        }
    }

    #[test]
    fn test_interpreter_01_arithmetic_and_number_formatting() {
        assert_eq!(
            output_of("print 1 + 2 * 3; print 7 / 2; print -(4 - 10); print 0.1 + 0.2 > 0.3;"),
            "7\n3.5\n6\ntrue\n"
        );
    }

    #[test]
    fn test_interpreter_02_strings_and_concatenation() {
        assert_eq!(
            output_of(r#"print "a" + "b"; print "a" + 3; print 3 + "a"; print "x" + 1.5;"#),
            "ab\na3\n3a\nx1.5\n"
        );

        let (_, message) = runtime_error(r#"print "a" + nil;"#);
        assert!(message.starts_with("[line 1] Runtime error at '+': Operands must be"));
    }

    #[test]
    fn test_interpreter_03_equality_and_truthiness() {
        assert_eq!(
            output_of(
                r#"print nil == nil;
                   print 1 == 1;
                   print "a" == "a";
                   print 1 == "1";
                   print !nil;
                   print !0;
                   print !"";
                   print nil or "fallback";
                   print false and unreachable;"#
            ),
            "false\ntrue\ntrue\nfalse\ntrue\nfalse\nfalse\nfallback\nfalse\n"
        );
    }

    #[test]
    fn test_interpreter_04_runtime_type_errors() {
        let (_, message) = runtime_error("print 1 / 0;");
        assert_eq!(message, "[line 1] Runtime error at '/': Division by zero.");

        let (_, message) = runtime_error("print -\"x\";");
        assert_eq!(message, "[line 1] Runtime error at '-': Operand must be a number.");

        let (_, message) = runtime_error("print 1 < \"2\";");
        assert_eq!(message, "[line 1] Runtime error at '<': Operands must be numbers.");

        let (_, message) = runtime_error("print undefined;");
        assert_eq!(
            message,
            "[line 1] Runtime error at 'undefined': Undefined variable 'undefined'."
        );
    }

    #[test]
    fn test_interpreter_05_first_runtime_error_stops_execution() {
        let (printed, message) = runtime_error("print 1;\nprint nil + 1;\nprint 3;");

        assert_eq!(printed, "1\n");
        assert!(message.starts_with("[line 2]"));
    }

    #[test]
    fn test_interpreter_06_static_errors_prevent_execution() {
        let (printed, result) = run("print 1;\nprint ;\nvar = 2;");

        match result {
            Err(failure @ Failure::Static(_)) => {
                assert_eq!(failure.exit_code(), 65);
                assert_eq!(failure.errors().len(), 2);
            }
            other => panic!("expected static errors, got {:?}", other),
        }
        assert_eq!(printed, "");

        let (printed, result) = run("print 1; return 2;");
        assert!(matches!(result, Err(Failure::Static(_))));
        assert_eq!(printed, "");
    }

    #[test]
    fn test_interpreter_07_block_scoping_and_shadowing() {
        assert_eq!(
            output_of(
                "var a = \"global a\";
                 var b = \"global b\";
                 {
                   var a = \"outer a\";
                   {
                     var a = \"inner a\";
                     print a;
                     print b;
                   }
                   print a;
                 }
                 print a;"
            ),
            "inner a\nglobal b\nouter a\nglobal a\n"
        );
    }

    #[test]
    fn test_interpreter_08_closures_bind_lexically() {
        assert_eq!(
            output_of(
                r#"var a = "global";
                   {
                     fun showA() { print a; }
                     showA();
                     var a = "block";
                     showA();
                   }"#
            ),
            "global\nglobal\n"
        );
    }

    #[test]
    fn test_interpreter_09_counter_closure_keeps_state() {
        assert_eq!(
            output_of(
                "fun makeCounter() {
                   var i = 0;
                   fun count() { i = i + 1; return i; }
                   return count;
                 }
                 var c = makeCounter();
                 print c();
                 print c();
                 var d = makeCounter();
                 print d();"
            ),
            "1\n2\n1\n"
        );
    }

    #[test]
    fn test_interpreter_10_loops_and_break() {
        assert_eq!(
            output_of(
                "var i = 0;
                 while (true) { i = i + 1; if (i == 3) break; }
                 print i;
                 for (var j = 0; j < 10; j = j + 1) {
                   if (j == 2) break;
                   print j;
                 }"
            ),
            "3\n0\n1\n"
        );
    }

    #[test]
    fn test_interpreter_11_return_unwinds_out_of_loops() {
        assert_eq!(
            output_of(
                "fun first(n) {
                   for (var i = 0; ; i = i + 1) {
                     while (true) { if (i == n) return i; break; }
                   }
                 }
                 print first(4);
                 fun nothing() {}
                 print nothing();"
            ),
            "4\nnil\n"
        );
    }

    #[test]
    fn test_interpreter_12_recursion() {
        assert_eq!(
            output_of(
                "fun fib(n) { if (n < 2) return n; return fib(n - 1) + fib(n - 2); }
                 print fib(15);"
            ),
            "610\n"
        );
    }

    #[test]
    fn test_interpreter_13_call_errors() {
        let (_, message) = runtime_error("\"nope\"();");
        assert_eq!(
            message,
            "[line 1] Runtime error at ')': Can only call functions and classes."
        );

        let (_, message) = runtime_error("fun f(a, b) {}\nf(1);");
        assert_eq!(
            message,
            "[line 2] Runtime error at ')': Expected 2 arguments but got 1."
        );
    }

    #[test]
    fn test_interpreter_14_stringification_of_callables_and_instances() {
        assert_eq!(
            output_of("fun f() {} class Bagel {} print f; print clock; print Bagel; print Bagel();"),
            "<fn f>\n<native fn clock>\nBagel\nBagel instance\n"
        );
    }

    #[test]
    fn test_interpreter_15_fields_and_methods() {
        assert_eq!(
            output_of(
                r#"class Cake {
                     taste() { return "The " + this.flavor + " cake is delicious!"; }
                   }
                   var cake = Cake();
                   cake.flavor = "German chocolate";
                   print cake.taste();
                   var m = cake.taste;
                   cake.flavor = "lemon";
                   print m();"#
            ),
            "The German chocolate cake is delicious!\nThe lemon cake is delicious!\n"
        );

        let (_, message) = runtime_error("class A {} print A().missing;");
        assert_eq!(
            message,
            "[line 1] Runtime error at 'missing': Undefined property 'missing'."
        );

        let (_, message) = runtime_error("var x = 1; print x.y;");
        assert_eq!(
            message,
            "[line 1] Runtime error at 'y': Only instances have properties."
        );

        let (_, message) = runtime_error("var x = 1; x.y = 2;");
        assert_eq!(
            message,
            "[line 1] Runtime error at 'y': Only instances have fields."
        );
    }

    #[test]
    fn test_interpreter_16_initializers() {
        assert_eq!(
            output_of(
                "class Point {
                   init(x, y) { this.x = x; this.y = y; if (x > 100) return; }
                   sum() { return this.x + this.y; }
                 }
                 var p = Point(1, 2);
                 print p.sum();
                 print p.init(3, 4);
                 print p.sum();
                 print Point(200, 1).x;"
            ),
            "3\nPoint instance\n7\n200\n"
        );

        let (_, message) = runtime_error("class P { init(a) {} } P();");
        assert_eq!(
            message,
            "[line 1] Runtime error at ')': Expected 1 arguments but got 0."
        );
    }

    #[test]
    fn test_interpreter_17_inheritance_and_super() {
        assert_eq!(
            output_of(
                r#"class A {
                     method() { print "A method"; }
                     say() { return "A"; }
                   }
                   class B < A {
                     method() { print "B method"; }
                     test() { super.method(); }
                     say() { return super.say() + "B"; }
                   }
                   class C < B {}
                   C().test();
                   C().method();
                   print C().say();"#
            ),
            "A method\nB method\nAB\n"
        );
    }

    #[test]
    fn test_interpreter_18_inherited_initializer() {
        assert_eq!(
            output_of(
                "class Base { init(n) { this.n = n; } }
                 class Derived < Base {
                   init(n) { super.init(n * 2); }
                 }
                 print Derived(21).n;"
            ),
            "42\n"
        );
    }

    #[test]
    fn test_interpreter_19_superclass_must_be_a_class() {
        let (_, message) = runtime_error("var NotAClass = 1;\nclass Sub < NotAClass {}");
        assert_eq!(
            message,
            "[line 2] Runtime error at 'NotAClass': Superclass must be a class."
        );
    }

    #[test]
    fn test_interpreter_20_native_clock() {
        assert_eq!(output_of("var t = clock(); print t > 0; print clock() >= t;"), "true\ntrue\n");
    }

    #[test]
    fn test_interpreter_21_register_global() {
        fn double(args: &[Value]) -> Result<Value, String> {
            match args {
                [Value::Number(n)] => Ok(Value::Number(n * 2.0)),
                _ => Err("double() takes a number.".to_string()),
            }
        }

        let mut interpreter: Interpreter<Vec<u8>> = Interpreter::with_output(Vec::new());
        interpreter.register_global("double", 1, double);

        let mut session = Session::with_interpreter(interpreter);
        session.run("print double(21);").expect("runs");

        match session.run("double(\"x\");") {
            Err(Failure::Runtime(e)) => assert_eq!(
                e.to_string(),
                "[line 1] Runtime error at ')': double() takes a number."
            ),
            other => panic!("expected a runtime error, got {:?}", other),
        }

        // Globals can also be added between runs.
        session
            .interpreter()
            .register_global("late", 0, |_| Ok(Value::Nil));
        session.run("print late();").expect("runs");

        assert_eq!(String::from_utf8_lossy(session.output()), "42\nnil\n");
    }

    #[test]
    fn test_interpreter_22_state_persists_across_runs() {
        let mut session: Session<Vec<u8>> = Session::with_output(Vec::new());

        session.run("var n = 1;").expect("runs");
        session
            .run("fun bump() { var step = 1; n = n + step; return n; }")
            .expect("runs");

        // A failing line leaves earlier definitions intact.
        assert!(session.run("print missing;").is_err());
        assert!(session.run("print ;").is_err());

        session.run("print bump(); print bump();").expect("runs");

        assert_eq!(String::from_utf8_lossy(session.output()), "2\n3\n");
    }
}
