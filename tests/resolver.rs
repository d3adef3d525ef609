#[cfg(test)]
mod resolver_tests {
    use pretty_assertions::assert_eq;
    use rox::ast::{Expr, Stmt};
    use rox::parser::Parser;
    use rox::resolver::{Locals, Resolver};
    use rox::scanner::scan;

    fn parse(source: &str) -> Vec<Stmt> {
        let (tokens, lex_errors) = scan(source);
        let (statements, parse_errors) = Parser::new(&tokens).parse();

        assert!(lex_errors.is_empty() && parse_errors.is_empty());
        statements
    }

    /// Resolve `source`, returning only the rendered diagnostics.
    fn errors(source: &str) -> Vec<String> {
        let statements = parse(source);
        let (_, errors) = Resolver::new().resolve(&statements);

        errors.iter().map(|e| e.to_string()).collect()
    }

    #[test]
    fn test_resolver_01_local_depths() {
        let statements = parse("{ var a = 1; { var b = 2; print a; print b; } }");
        let (locals, errors): (Locals, _) = Resolver::new().resolve(&statements);
        assert!(errors.is_empty());

        let Stmt::Block(outer) = &statements[0] else {
            panic!("expected a block");
        };
        let Stmt::Block(inner) = &outer[1] else {
            panic!("expected a nested block");
        };

        let depth_of = |stmt: &Stmt| match stmt {
            Stmt::Print(Expr::Variable { id, .. }) => locals.get(id).copied(),
            other => panic!("expected print of a variable, got {:?}", other),
        };

        assert_eq!(depth_of(&inner[1]), Some(1));
        assert_eq!(depth_of(&inner[2]), Some(0));
    }

    #[test]
    fn test_resolver_02_globals_stay_out_of_the_table() {
        let statements = parse("var g = 1; print g; fun f() { return g; }");
        let (locals, errors) = Resolver::new().resolve(&statements);

        assert!(errors.is_empty());
        assert!(locals.is_empty());
    }

    #[test]
    fn test_resolver_03_redeclaration() {
        assert_eq!(
            errors("{ var a = 1; var a = 2; }"),
            vec!["[line 1] Error at 'a': Already a variable with this name in this scope."]
        );

        // Shadowing in a nested scope and redeclaring a global are both fine.
        assert!(errors("{ var a = 1; { var a = 2; } }").is_empty());
        assert!(errors("var a = 1; var a = 2;").is_empty());

        assert_eq!(
            errors("fun f(x, x) {}"),
            vec!["[line 1] Error at 'x': Already a variable with this name in this scope."]
        );
    }

    #[test]
    fn test_resolver_04_own_initializer() {
        assert_eq!(
            errors("var a = 1; { var a = a; }"),
            vec!["[line 1] Error at 'a': Can't read local variable in its own initializer."]
        );

        assert!(errors("var a = a;").is_empty());
    }

    #[test]
    fn test_resolver_05_return_placement() {
        assert_eq!(
            errors("return 1;"),
            vec!["[line 1] Error at 'return': Can't return from top-level code."]
        );

        assert_eq!(
            errors("class A { init() { return 1; } }"),
            vec!["[line 1] Error at 'return': Can't return a value from an initializer."]
        );

        assert!(errors("class A { init() { return; } }").is_empty());
        assert!(errors("class A { init() { fun f() { return 1; } } }").is_empty());
    }

    #[test]
    fn test_resolver_06_break_placement() {
        assert_eq!(
            errors("break;"),
            vec!["[line 1] Error at 'break': Can't use 'break' outside of a loop."]
        );

        assert!(errors("while (true) { if (true) break; }").is_empty());
        assert!(errors("for (;;) { break; }").is_empty());

        // A function body does not inherit the enclosing loop.
        assert_eq!(
            errors("while (true) { fun f() { break; } }"),
            vec!["[line 1] Error at 'break': Can't use 'break' outside of a loop."]
        );
    }

    #[test]
    fn test_resolver_07_this_and_super_placement() {
        assert_eq!(
            errors("print this;"),
            vec!["[line 1] Error at 'this': Can't use 'this' outside of a class."]
        );

        assert_eq!(
            errors("fun f() { super.g(); }"),
            vec!["[line 1] Error at 'super': Can't use 'super' outside of a class."]
        );

        assert_eq!(
            errors("class A { f() { super.f(); } }"),
            vec!["[line 1] Error at 'super': Can't use 'super' in a class with no superclass."]
        );

        assert!(errors("class A {} class B < A { f() { return super.f; } }").is_empty());
    }

    #[test]
    fn test_resolver_08_self_inheritance() {
        assert_eq!(
            errors("class A < A {}"),
            vec!["[line 1] Error at 'A': A class can't inherit from itself."]
        );
    }

    #[test]
    fn test_resolver_09_collects_every_error() {
        let found = errors("return;\nbreak;\nprint this;");

        assert_eq!(found.len(), 3);
        assert!(found[0].starts_with("[line 1]"));
        assert!(found[1].starts_with("[line 2]"));
        assert!(found[2].starts_with("[line 3]"));
    }
}
