//! Prompt builders. Every argument reaching these functions has already been
//! sanitized by the caller.

use std::fmt;

const PLAIN_TEXT: &str = "Write the answer as plain text only. Do not use markdown: \
no headers, no bold or italics, no separator lines, no bullet symbols. \
Use numbered points and blank lines between paragraphs.";

const CONCISE_ANSWER: &str = "Provide a concise answer in plain text format. \
Do not use markdown formatting. Break content into clear paragraphs when needed.";

// ---------------------------------------------------------------------------
// AnalysisType / AnalysisScope
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AnalysisType {
    Comprehensive,
    Security,
    Performance,
    Architecture,
}

impl AnalysisType {
    pub const ALL: [AnalysisType; 4] = [
        AnalysisType::Comprehensive,
        AnalysisType::Security,
        AnalysisType::Performance,
        AnalysisType::Architecture,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            AnalysisType::Comprehensive => "comprehensive",
            AnalysisType::Security => "security",
            AnalysisType::Performance => "performance",
            AnalysisType::Architecture => "architecture",
        }
    }

    pub fn parse(s: &str) -> Option<Self> {
        Self::ALL.into_iter().find(|t| t.as_str() == s)
    }

    fn instructions(&self) -> &'static str {
        match self {
            AnalysisType::Comprehensive => {
                "Cover:\n\
                 1. Critical bugs or logic errors\n\
                 2. Security vulnerabilities\n\
                 3. Performance bottlenecks\n\
                 4. Error handling and edge cases\n\
                 5. Structure, readability and maintainability\n\
                 6. Concrete recommendations for improvement"
            }
            AnalysisType::Security => {
                "Security review:\n\
                 1. Vulnerability assessment\n\
                 2. Input validation issues\n\
                 3. Authentication and authorization concerns\n\
                 4. Data protection\n\
                 5. Likely attack vectors\n\
                 Put critical issues first."
            }
            AnalysisType::Performance => {
                "Performance review:\n\
                 1. Algorithmic complexity\n\
                 2. Resource usage\n\
                 3. Bottlenecks\n\
                 4. Optimization opportunities\n\
                 5. Scalability concerns\n\
                 Prefer measurable improvements."
            }
            AnalysisType::Architecture => {
                "Architecture review:\n\
                 1. Design patterns and structure\n\
                 2. Component relationships\n\
                 3. Modularity and coupling\n\
                 4. Separation of concerns\n\
                 5. Extensibility\n\
                 Focus on structural improvements."
            }
        }
    }
}

impl fmt::Display for AnalysisType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AnalysisScope {
    Structure,
    Security,
    Performance,
    Patterns,
    All,
}

impl AnalysisScope {
    pub const ALL: [AnalysisScope; 5] = [
        AnalysisScope::Structure,
        AnalysisScope::Security,
        AnalysisScope::Performance,
        AnalysisScope::Patterns,
        AnalysisScope::All,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            AnalysisScope::Structure => "structure",
            AnalysisScope::Security => "security",
            AnalysisScope::Performance => "performance",
            AnalysisScope::Patterns => "patterns",
            AnalysisScope::All => "all",
        }
    }

    pub fn parse(s: &str) -> Option<Self> {
        Self::ALL.into_iter().find(|t| t.as_str() == s)
    }
}

impl fmt::Display for AnalysisScope {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

// ---------------------------------------------------------------------------
// Builders
// ---------------------------------------------------------------------------

pub fn quick_query(query: &str, context: &str) -> String {
    if context.is_empty() {
        format!("Question: {query}\n\n{CONCISE_ANSWER}")
    } else {
        format!("Context: {context}\n\nQuestion: {query}\n\n{CONCISE_ANSWER}")
    }
}

pub fn analyze_code(code: &str, kind: AnalysisType, focus_areas: &[String]) -> String {
    let mut prompt = format!(
        "Perform a {kind} analysis of this code:\n\n{code}\n\n{}",
        kind.instructions()
    );
    if !focus_areas.is_empty() {
        prompt.push_str("\n\nPay special attention to: ");
        prompt.push_str(&focus_areas.join(", "));
    }
    prompt.push_str("\n\n");
    prompt.push_str(PLAIN_TEXT);
    prompt
}

pub fn codebase(directory_name: &str, scope: AnalysisScope) -> String {
    let emphasis = match scope {
        AnalysisScope::All => String::new(),
        other => format!("\nGive most weight to {other}.\n"),
    };
    format!(
        "Analyze this codebase in directory '{directory_name}' (scope: {scope}):\n\n\
         1. Overall architecture and design patterns\n\
         2. Code quality and maintainability\n\
         3. Security considerations and potential vulnerabilities\n\
         4. Performance implications and bottlenecks\n\
         5. Dependencies and integration points\n\
         6. Testing coverage\n\
         7. Documentation and clarity\n\
         8. Actionable recommendations\n\
         {emphasis}\n{PLAIN_TEXT}"
    )
}

pub fn pre_edit(files: &[String]) -> String {
    format!(
        "Perform a pre-edit analysis of these files: {}\n\n\
         1. Critical bugs or security vulnerabilities\n\
         2. Performance bottlenecks\n\
         3. Architecture concerns and design patterns\n\
         4. Error handling and edge cases\n\
         5. Specific improvement recommendations\n\n\
         Focus on what will help make a correct edit on the first attempt.\n\n{PLAIN_TEXT}",
        files.join(", ")
    )
}

pub fn pre_commit(files: &[String]) -> String {
    format!(
        "Review these files before commit: {}\n\n\
         1. Bugs that would break functionality\n\
         2. Security vulnerabilities\n\
         3. Breaking changes or API compatibility issues\n\
         4. Performance regressions\n\
         5. Missing tests or validation\n\
         6. Documentation gaps\n\n\
         Focus on issues that should block this commit.\n\n{PLAIN_TEXT}",
        files.join(", ")
    )
}

pub fn session_summary(directory_name: &str) -> String {
    format!(
        "What can you see in the directory '{directory_name}'? List the main files and give \
         a brief project overview in under 200 words in plain text format."
    )
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn quick_query_includes_context_only_when_present() {
        let bare = quick_query("What is a lifetime?", "");
        assert!(bare.starts_with("Question: What is a lifetime?"));
        assert!(!bare.contains("Context:"));

        let with = quick_query("Why?", "borrowck error E0502");
        assert!(with.starts_with("Context: borrowck error E0502\n\nQuestion: Why?"));
        assert!(with.contains("plain text"));
    }

    #[test]
    fn analysis_prompt_varies_by_type_and_focus() {
        let security = analyze_code("fn main() {}", AnalysisType::Security, &[]);
        assert!(security.starts_with("Perform a security analysis"));
        assert!(security.contains("attack vectors"));
        assert!(!security.contains("Pay special attention"));

        let focused = analyze_code(
            "fn main() {}",
            AnalysisType::Performance,
            &["allocation".into(), "locking".into()],
        );
        assert!(focused.contains("Pay special attention to: allocation, locking"));
        assert!(focused.trim_end().ends_with(PLAIN_TEXT));
    }

    #[test]
    fn codebase_prompt_names_only_the_directory() {
        let p = codebase("my-service", AnalysisScope::All);
        assert!(p.starts_with("Analyze this codebase in directory 'my-service' (scope: all)"));
        assert!(!p.contains("Give most weight"));
        let p = codebase("my-service", AnalysisScope::Security);
        assert!(p.contains("Give most weight to security."));
    }

    #[test]
    fn enums_parse_known_names_only() {
        for t in AnalysisType::ALL {
            assert_eq!(AnalysisType::parse(t.as_str()), Some(t));
        }
        assert_eq!(AnalysisType::parse("Security"), None);
        assert_eq!(AnalysisScope::parse("patterns"), Some(AnalysisScope::Patterns));
        assert_eq!(AnalysisScope::parse("everything"), None);
    }

    #[test]
    fn hook_prompts_list_files() {
        let files = vec!["src/a.rs".to_string(), "src/b.rs".to_string()];
        assert!(pre_edit(&files).contains("src/a.rs, src/b.rs"));
        assert!(pre_commit(&files).contains("block this commit"));
        assert!(session_summary("app").contains("directory 'app'"));
        assert!(session_summary("app").contains("under 200 words"));
    }
}
