// lute-vm - Property-based tests for interpreter laws
// Copyright (c) 2025 Tom Waddington. MIT licensed.

//! Property-based tests for the language's algebraic laws:
//! - `+` on numbers is IEEE-754 addition
//! - `+` on strings is byte concatenation
//! - `!!v` collapses to the truthiness predicate
//! - Interning makes byte equality coincide with identity

use std::rc::Rc;

use lute_vm::{Strings, Vm};
use proptest::prelude::*;

fn run_source(source: &str) -> Result<String, String> {
    let mut vm = Vm::new();
    let mut out = Vec::new();
    match vm.interpret_with(source, &mut out) {
        Ok(()) => Ok(String::from_utf8(out).expect("output is valid UTF-8")),
        Err(e) => Err(e.to_string()),
    }
}

proptest! {
    #![proptest_config(ProptestConfig::with_cases(200))]

    /// Addition in the language equals addition on the host's doubles.
    #[test]
    fn addition_matches_ieee(a in -1e12f64..1e12f64, b in -1e12f64..1e12f64) {
        // Rust renders floats shortest-round-trip, so the literals parse
        // back to exactly `a` and `b`.
        let source = format!("print {} + {};", a, b);
        let expected = format!("{}\n", a + b);
        prop_assert_eq!(run_source(&source), Ok(expected));
    }

    /// Subtraction and multiplication follow the host's doubles too.
    #[test]
    fn other_arithmetic_matches_ieee(a in -1e6f64..1e6f64, b in -1e6f64..1e6f64) {
        let source = format!("print {} - {}; print {} * {};", a, b, a, b);
        let expected = format!("{}\n{}\n", a - b, a * b);
        prop_assert_eq!(run_source(&source), Ok(expected));
    }

    /// String addition is byte concatenation.
    #[test]
    fn concatenation_is_byte_concat(a in "[a-z0-9 ]{0,12}", b in "[a-z0-9 ]{0,12}") {
        let source = format!("print \"{}\" + \"{}\";", a, b);
        let expected = format!("{}{}\n", a, b);
        prop_assert_eq!(run_source(&source), Ok(expected));
    }

    /// Byte-equal strings compare equal however they were built.
    #[test]
    fn concatenation_hits_the_intern_table(a in "[a-z]{1,8}", b in "[a-z]{1,8}") {
        let source = format!("print \"{}\" + \"{}\" == \"{}{}\";", a, b, a, b);
        prop_assert_eq!(run_source(&source), Ok("true\n".to_string()));
    }

    /// `!!v` is true exactly when v is neither nil nor false.
    #[test]
    fn double_negation_is_truthiness(literal in prop_oneof![
        Just("nil"), Just("false"), Just("true"), Just("0"), Just("1"),
        Just("\"\""), Just("\"text\""), Just("-0.0"),
    ]) {
        let truthy = literal != "nil" && literal != "false";
        let source = format!("print !!{};", literal);
        let expected = format!("{}\n", truthy);
        prop_assert_eq!(run_source(&source), Ok(expected));
    }

    /// Interning the same bytes twice yields the same allocation.
    #[test]
    fn interning_is_idempotent(text in "[ -~]{0,16}") {
        let mut strings = Strings::new();
        let first = strings.intern(&text);
        let second = strings.intern(&text);
        prop_assert!(Rc::ptr_eq(&first, &second));
        prop_assert_eq!(&*first.text, text.as_str());
    }

    /// Distinct byte sequences intern to distinct allocations.
    #[test]
    fn interning_separates_distinct_strings(a in "[a-z]{1,8}", b in "[a-z]{1,8}") {
        prop_assume!(a != b);
        let mut strings = Strings::new();
        let first = strings.intern(&a);
        let second = strings.intern(&b);
        prop_assert!(!Rc::ptr_eq(&first, &second));
    }
}
