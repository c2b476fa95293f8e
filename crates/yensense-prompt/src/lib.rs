//! Prompt construction for the YenSense pipeline
//!
//! Stage prompts are either fixed Jinja2 templates rendered with the values a
//! stage pulls out of the context ([`JinjaTemplate`]) or assembled piece by
//! piece when their shape depends on the data ([`PromptBuilder`]).
//!
//! ```
//! use yensense_prompt::{JinjaTemplate, PromptBuilder};
//! use serde_json::json;
//!
//! let template = JinjaTemplate::new("fx", "USD/JPY: {{ usd_jpy }}").unwrap();
//! assert_eq!(template.render(&json!({"usd_jpy": 147.25})).unwrap(), "USD/JPY: 147.25");
//!
//! let prompt = PromptBuilder::new()
//!     .text("Key data:")
//!     .newline()
//!     .bullet("USD/JPY 147.25")
//!     .build();
//! assert!(prompt.contains("- USD/JPY 147.25"));
//! ```

pub mod builder;
pub mod error;
pub mod jinja;

pub use builder::PromptBuilder;
pub use error::{PromptError, Result};
pub use jinja::JinjaTemplate;
