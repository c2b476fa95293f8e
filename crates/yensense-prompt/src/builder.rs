//! Fluent prompt builder
//!
//! [`PromptBuilder`] assembles prompts whose shape depends on the data, such
//! as numbered question lists or context digests handed to the validator.

/// A fluent builder for constructing prompts
///
/// # Examples
///
/// ```
/// use yensense_prompt::PromptBuilder;
///
/// let prompt = PromptBuilder::new()
///     .text("Answer each question.")
///     .blank_line()
///     .numbered_list(["Why is USD/JPY elevated?", "What would change that?"])
///     .when(false, "Include charts.")
///     .build();
///
/// assert!(prompt.contains("1. Why is USD/JPY elevated?"));
/// assert!(!prompt.contains("charts"));
/// ```
#[derive(Debug, Clone, Default)]
pub struct PromptBuilder {
    parts: Vec<String>,
}

impl PromptBuilder {
    /// Create a new prompt builder
    pub fn new() -> Self {
        Self::default()
    }

    /// Add static text
    pub fn text(mut self, content: impl Into<String>) -> Self {
        self.parts.push(content.into());
        self
    }

    /// Add a newline
    pub fn newline(self) -> Self {
        self.text("\n")
    }

    /// Add a blank line (two newlines)
    pub fn blank_line(self) -> Self {
        self.text("\n\n")
    }

    /// Add a section header (markdown h2)
    pub fn section(self, title: impl Into<String>) -> Self {
        self.text(format!("\n## {}\n", title.into()))
    }

    /// Add content conditionally
    pub fn when(self, condition: bool, content: impl Into<String>) -> Self {
        if condition {
            self.text(content)
        } else {
            self
        }
    }

    /// Add a bullet point
    pub fn bullet(self, content: impl Into<String>) -> Self {
        self.text(format!("- {}\n", content.into()))
    }

    /// Add multiple bullet points
    pub fn bullets<I, S>(mut self, items: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        for item in items {
            self = self.bullet(item);
        }
        self
    }

    /// Add multiple numbered items starting from 1
    pub fn numbered_list<I, S>(mut self, items: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        for (i, item) in items.into_iter().enumerate() {
            self = self.text(format!("{}. {}\n", i + 1, item.into()));
        }
        self
    }

    /// Add a `label: value` line
    pub fn field(self, label: impl Into<String>, value: impl Into<String>) -> Self {
        self.text(format!("{}: {}\n", label.into(), value.into()))
    }

    /// Build the final prompt string
    pub fn build(self) -> String {
        self.parts.join("")
    }
}
