//! Built-in stack templates
//!
//! `stack init` writes one of these into a fresh project directory.

/// A file belonging to a template, relative to the project root
#[derive(Debug, Clone, Copy)]
pub struct TemplateFile {
    pub path: &'static str,
    pub content: &'static str,
}

/// podinfo stack definition
/// VPC + public subnet + one instance running the podinfo container on port 9898
pub const PODINFO_STACK: &str = include_str!("../templates/podinfo/stack.kdl");

/// Boot script for the podinfo instance
/// Installs Docker and starts stefanprodan/podinfo
pub const PODINFO_BOOT_SCRIPT: &str = include_str!("../templates/podinfo/scripts/podinfo.sh");

const PODINFO_FILES: &[TemplateFile] = &[
    TemplateFile {
        path: "stack.kdl",
        content: PODINFO_STACK,
    },
    TemplateFile {
        path: "scripts/podinfo.sh",
        content: PODINFO_BOOT_SCRIPT,
    },
];

/// Default template name
pub const DEFAULT_TEMPLATE: &str = "podinfo";

/// Get the files for a built-in template name
pub fn get_builtin_template(name: &str) -> Option<&'static [TemplateFile]> {
    match name {
        "podinfo" => Some(PODINFO_FILES),
        _ => None,
    }
}

/// Names of all built-in templates
pub fn builtin_template_names() -> &'static [&'static str] {
    &["podinfo"]
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_template_exists() {
        let files = get_builtin_template(DEFAULT_TEMPLATE).unwrap();
        assert!(files.iter().any(|f| f.path == "stack.kdl"));
        assert!(builtin_template_names().contains(&DEFAULT_TEMPLATE));
    }

    #[test]
    fn test_boot_script_runs_podinfo() {
        assert!(PODINFO_BOOT_SCRIPT.starts_with("#!/bin/bash"));
        assert!(PODINFO_BOOT_SCRIPT.contains("docker run -dp 9898:9898 stefanprodan/podinfo"));
    }

    #[test]
    fn test_unknown_template() {
        assert!(get_builtin_template("wordpress").is_none());
    }
}
