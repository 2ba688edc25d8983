//! Property tests for the text-variable rewrite.

use proptest::prelude::*;

use appforge::rewrite_variable;

/// Non-empty lines that can never match a `$name:` declaration prefix.
/// (Non-empty so joining and re-splitting preserves the line count.)
fn non_matching_line() -> impl Strategy<Value = String> {
    "[a-z .:;{}#-]{1,30}".prop_filter("must not start with $", |s| !s.starts_with('$'))
}

fn variable_name() -> impl Strategy<Value = String> {
    "[a-z][a-z0-9-]{0,15}"
}

fn variable_value() -> impl Strategy<Value = String> {
    "[a-z0-9#]{1,12}"
}

proptest! {
    /// With exactly one matching line, only that line changes and every
    /// output line is newline-terminated.
    #[test]
    fn single_match_replaces_exactly_one_line(
        before in prop::collection::vec(non_matching_line(), 0..8),
        after in prop::collection::vec(non_matching_line(), 0..8),
        name in variable_name(),
        old_value in variable_value(),
        new_value in variable_value(),
    ) {
        let declaration = format!("${name}: {old_value};");
        let mut lines: Vec<String> = before.clone();
        lines.push(declaration);
        lines.extend(after.clone());
        let input = lines.join("\n");

        let output = rewrite_variable(&input, &name, &new_value);
        let output_lines: Vec<&str> = output.lines().collect();

        prop_assert_eq!(output_lines.len(), lines.len());
        prop_assert!(output.ends_with('\n') || output.is_empty());

        // The matching line was replaced.
        let replaced = format!("${name}: {new_value};");
        prop_assert_eq!(output_lines[before.len()], replaced.as_str());

        // All other lines are untouched.
        for (i, line) in before.iter().enumerate() {
            prop_assert_eq!(output_lines[i], line.as_str());
        }
        for (i, line) in after.iter().enumerate() {
            prop_assert_eq!(output_lines[before.len() + 1 + i], line.as_str());
        }
    }

    /// With no matching line, output content equals input content modulo
    /// final-newline normalization.
    #[test]
    fn absent_variable_only_normalizes(
        lines in prop::collection::vec(non_matching_line(), 0..10),
        name in variable_name(),
        new_value in variable_value(),
    ) {
        let input = lines.join("\n");
        let output = rewrite_variable(&input, &name, &new_value);

        let expected: String = lines.iter().map(|l| format!("{l}\n")).collect();
        prop_assert_eq!(output, expected);
    }

    /// Rewriting is idempotent: applying the same change twice yields the
    /// same content as applying it once.
    #[test]
    fn rewrite_is_idempotent(
        lines in prop::collection::vec(non_matching_line(), 0..6),
        name in variable_name(),
        value in variable_value(),
    ) {
        let mut all = lines;
        all.push(format!("${name}: old;"));
        let input = all.join("\n");

        let once = rewrite_variable(&input, &name, &value);
        let twice = rewrite_variable(&once, &name, &value);
        prop_assert_eq!(once, twice);
    }

    /// A variable whose name extends the target (e.g. `color` vs `color2`)
    /// is never rewritten.
    #[test]
    fn longer_names_never_collide(
        name in variable_name(),
        suffix in "[a-z0-9]{1,4}",
        value in variable_value(),
    ) {
        let longer = format!("{name}{suffix}");
        let input = format!("${longer}: keep;\n${name}: old;\n");
        let output = rewrite_variable(&input, &name, &value);

        let kept = format!("${longer}: keep;");
        let rewritten = format!("${name}: {value};");
        prop_assert!(output.contains(&kept));
        prop_assert!(output.contains(&rewritten));
    }
}
