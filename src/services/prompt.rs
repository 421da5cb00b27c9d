//! Generation prompt assembly and fenced-code extraction.
//!
//! The prompt carries four sections: the unit header, the specification,
//! dependency context (bounded, rendered as labelled fenced blocks), and
//! accumulated error feedback from earlier attempts.

use crate::domain::models::Atom;

/// Build the generation prompt for one attempt.
///
/// At most `max_dependency_context` dependency excerpts are rendered, in
/// the atom's declared dependency order; the rest are omitted. This caps
/// prompt size at a deliberate cost in context precision. Dependencies
/// without generated code (failed or external) are skipped.
pub fn build_prompt(
    atom: &Atom,
    dependency_atoms: &[Atom],
    previous_errors: &[String],
    max_dependency_context: usize,
) -> String {
    let mut prompt = String::with_capacity(1024);

    prompt.push_str("You are generating one self-contained unit of code.\n\n");
    prompt.push_str("## Unit\n");
    prompt.push_str(&format!("- Identifier: {}\n", atom.id));
    prompt.push_str(&format!("- Language: {}\n\n", atom.language));
    prompt.push_str("## Specification\n");
    prompt.push_str(atom.spec.trim());
    prompt.push('\n');

    let context = render_dependency_context(dependency_atoms, max_dependency_context);
    if !context.is_empty() {
        prompt.push_str(&context);
    }

    if !previous_errors.is_empty() {
        prompt.push_str("\n## Previous Attempt Errors\n");
        prompt.push_str("Earlier attempts failed validation. Fix all of the following:\n");
        for error in previous_errors {
            prompt.push_str(&format!("- {error}\n"));
        }
    }

    prompt.push_str(&format!(
        "\n## Output\nRespond with a single fenced code block tagged `{}` containing only the complete source for this unit.\n",
        atom.language
    ));

    prompt
}

/// Render dependency excerpts as labelled fenced code blocks.
fn render_dependency_context(dependency_atoms: &[Atom], max_excerpts: usize) -> String {
    let excerpts: Vec<&Atom> = dependency_atoms
        .iter()
        .take(max_excerpts)
        .filter(|dep| dep.code.is_some())
        .collect();

    if excerpts.is_empty() {
        return String::new();
    }

    let mut context = String::from("\n## Dependency Context\n");
    context.push_str("These units are already generated; call into them as needed.\n");
    for dep in excerpts {
        context.push_str(&format!("\n### {}\n", dep.id));
        context.push_str(&format!("```{}\n", dep.language));
        if let Some(code) = &dep.code {
            context.push_str(code.trim_end());
            context.push('\n');
        }
        context.push_str("```\n");
    }
    context
}

/// Extract generated code from raw LLM output.
///
/// Preference order: the first fenced block whose info string matches the
/// atom's language (case-insensitive), then the first fenced block of any
/// language, then the raw text. The result is trimmed either way.
pub fn extract_code(output: &str, language: &str) -> String {
    if let Some(block) = find_fenced_block(output, Some(language)) {
        return block.trim().to_string();
    }
    if let Some(block) = find_fenced_block(output, None) {
        return block.trim().to_string();
    }
    output.trim().to_string()
}

/// Find the first fenced block, optionally restricted to a language tag.
///
/// An unterminated fence swallows the rest of the output; models that
/// stop mid-block still yield their partial code.
fn find_fenced_block(output: &str, language: Option<&str>) -> Option<String> {
    let mut lines = output.lines();

    while let Some(line) = lines.next() {
        let trimmed = line.trim_start();
        let Some(info) = trimmed.strip_prefix("```") else {
            continue;
        };
        let tag = info.trim();

        if let Some(wanted) = language {
            if !tag.eq_ignore_ascii_case(wanted) {
                // Skip the whole non-matching block so its body is not
                // mistaken for a fence opener.
                for inner in lines.by_ref() {
                    if inner.trim_start().starts_with("```") {
                        break;
                    }
                }
                continue;
            }
        }

        let mut body = Vec::new();
        for inner in lines.by_ref() {
            if inner.trim_start().starts_with("```") {
                return Some(body.join("\n"));
            }
            body.push(inner);
        }
        return Some(body.join("\n"));
    }

    None
}

#[cfg(test)]
mod tests {
    use super::*;

    fn dep(id: &str, code: &str) -> Atom {
        let mut atom = Atom::new(id, "spec", "python");
        atom.code = Some(code.to_string());
        atom
    }

    #[test]
    fn test_extract_matching_language_block() {
        let output = "Here you go:\n```python\ndef f():\n    return \"hi\"\n```\nDone.";
        let code = extract_code(output, "python");
        assert_eq!(code, "def f():\n    return \"hi\"");
    }

    #[test]
    fn test_extract_prefers_matching_language_over_first() {
        let output = "```text\nnot code\n```\n```rust\nfn main() {}\n```";
        assert_eq!(extract_code(output, "rust"), "fn main() {}");
    }

    #[test]
    fn test_extract_falls_back_to_first_block() {
        let output = "```js\nconsole.log(1);\n```";
        assert_eq!(extract_code(output, "python"), "console.log(1);");
    }

    #[test]
    fn test_extract_language_match_is_case_insensitive() {
        let output = "```Python\nx = 1\n```";
        assert_eq!(extract_code(output, "python"), "x = 1");
    }

    #[test]
    fn test_extract_raw_text_without_fences() {
        let output = "  def f():\n      pass  \n";
        assert_eq!(extract_code(output, "python"), "def f():\n      pass");
    }

    #[test]
    fn test_extract_unterminated_fence_takes_rest() {
        let output = "```python\ndef f():\n    return 1";
        assert_eq!(extract_code(output, "python"), "def f():\n    return 1");
    }

    #[test]
    fn test_extract_empty_output() {
        assert_eq!(extract_code("", "python"), "");
        assert_eq!(extract_code("```python\n```", "python"), "");
    }

    #[test]
    fn test_prompt_contains_spec_and_language() {
        let atom = Atom::new("a1", "return the string hi", "python");
        let prompt = build_prompt(&atom, &[], &[], 3);
        assert!(prompt.contains("return the string hi"));
        assert!(prompt.contains("- Language: python"));
        assert!(prompt.contains("tagged `python`"));
        assert!(!prompt.contains("Dependency Context"));
        assert!(!prompt.contains("Previous Attempt Errors"));
    }

    #[test]
    fn test_prompt_caps_dependency_excerpts() {
        let atom = Atom::new("a", "spec", "python");
        let deps = vec![
            dep("d1", "one"),
            dep("d2", "two"),
            dep("d3", "three"),
            dep("d4", "four"),
        ];
        let prompt = build_prompt(&atom, &deps, &[], 3);
        assert!(prompt.contains("### d1"));
        assert!(prompt.contains("### d2"));
        assert!(prompt.contains("### d3"));
        assert!(!prompt.contains("### d4"));
    }

    #[test]
    fn test_prompt_skips_dependencies_without_code() {
        let atom = Atom::new("a", "spec", "python");
        let mut failed = Atom::new("d1", "spec", "python");
        failed.code = None;
        let prompt = build_prompt(&atom, &[failed, dep("d2", "two")], &[], 3);
        assert!(!prompt.contains("### d1"));
        assert!(prompt.contains("### d2"));
    }

    #[test]
    fn test_prompt_renders_error_feedback() {
        let atom = Atom::new("a", "spec", "python");
        let errors = vec!["[critical] unbalanced braces".to_string()];
        let prompt = build_prompt(&atom, &[], &errors, 3);
        assert!(prompt.contains("Previous Attempt Errors"));
        assert!(prompt.contains("unbalanced braces"));
    }
}
