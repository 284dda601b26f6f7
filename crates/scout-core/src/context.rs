//! Prompt-ready rendering of selected files for downstream patch generators.

use std::fmt::Write;

/// Render files as `File: <path>` followed by a fenced copy of the content.
#[must_use]
pub fn format_file_context<'a, I>(files: I) -> String
where
    I: IntoIterator<Item = (&'a str, &'a str)>,
{
    let mut context = String::from("Current codebase:\n\n");
    for (path, content) in files {
        let _ = write!(context, "File: {path}\n```\n{content}\n```\n\n");
    }
    context
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn renders_each_file_fenced() {
        let out = format_file_context([("src/a.py", "print(1)"), ("b.go", "package b")]);
        assert_eq!(
            out,
            "Current codebase:\n\nFile: src/a.py\n```\nprint(1)\n```\n\nFile: b.go\n```\npackage b\n```\n\n"
        );
    }

    #[test]
    fn empty_input_keeps_header() {
        assert_eq!(format_file_context(Vec::<(&str, &str)>::new()), "Current codebase:\n\n");
    }
}
