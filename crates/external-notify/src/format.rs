//! Template formatting.
//!
//! Templates contain typed placeholders that are replaced left to right:
//!
//! - `{user}` renders the acting user and consumes no argument
//! - `{type}` renders the type of the next argument (a document)
//! - `{title}` renders the title (or slug) of the next argument
//! - `{string}` renders the next argument as text, joining lists with `", "`
//!
//! Missing arguments and fields never fail; they render as `Undefined`,
//! `Unknown` or `Anonymous`.

use std::collections::{HashMap, HashSet};
use std::fmt;
use std::sync::{Arc, LazyLock};

use regex::Regex;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use tracing::debug;

use crate::config::TypeConfig;
use crate::message::{ActorContext, ANONYMOUS};

/// Type name of the global singleton document.
pub const GLOBAL_DOC_TYPE: &str = "apostrophe-global";

const UNDEFINED: &str = "Undefined";
const UNKNOWN: &str = "Unknown";

static PLACEHOLDER: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"\{(user|type|title|string)\}").unwrap());

/// A document-like format argument.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Document {
    #[serde(rename = "type", default, skip_serializing_if = "Option::is_none")]
    pub doc_type: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub title: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub slug: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub workflow_locale: Option<String>,
}

impl Document {
    #[must_use]
    pub fn new(doc_type: impl Into<String>) -> Self {
        Self {
            doc_type: Some(doc_type.into()),
            ..Self::default()
        }
    }

    #[must_use]
    pub fn with_title(mut self, title: impl Into<String>) -> Self {
        self.title = Some(title.into());
        self
    }

    #[must_use]
    pub fn with_slug(mut self, slug: impl Into<String>) -> Self {
        self.slug = Some(slug.into());
        self
    }

    #[must_use]
    pub fn with_locale(mut self, locale: impl Into<String>) -> Self {
        self.workflow_locale = Some(locale.into());
        self
    }

    /// Title, falling back to slug, falling back to `Unknown`.
    #[must_use]
    pub fn display_title(&self) -> &str {
        non_empty(self.title.as_deref())
            .or_else(|| non_empty(self.slug.as_deref()))
            .unwrap_or(UNKNOWN)
    }
}

fn non_empty(value: Option<&str>) -> Option<&str> {
    value.filter(|v| !v.is_empty())
}

/// A positional argument consumed by a placeholder.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum FormatArg {
    Doc(Document),
    Text(String),
    List(Vec<String>),
    Missing,
}

impl FormatArg {
    /// Convert an arbitrary JSON payload value.
    #[must_use]
    pub fn from_value(value: &Value) -> Self {
        match value {
            Value::Null => Self::Missing,
            Value::String(s) => Self::Text(s.clone()),
            Value::Array(items) => Self::List(items.iter().map(value_text).collect()),
            Value::Object(_) => match serde_json::from_value(value.clone()) {
                Ok(doc) => Self::Doc(doc),
                Err(e) => {
                    debug!(error = %e, "Argument is not a document, treating as missing");
                    Self::Missing
                }
            },
            Value::Bool(_) | Value::Number(_) => Self::Text(value.to_string()),
        }
    }
}

fn value_text(value: &Value) -> String {
    match value {
        Value::String(s) => s.clone(),
        other => other.to_string(),
    }
}

impl fmt::Display for FormatArg {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Doc(doc) => f.write_str(doc.display_title()),
            Self::Text(text) => f.write_str(text),
            Self::List(items) => f.write_str(&items.join(", ")),
            Self::Missing => f.write_str(UNDEFINED),
        }
    }
}

impl From<Document> for FormatArg {
    fn from(doc: Document) -> Self {
        Self::Doc(doc)
    }
}

impl From<&Document> for FormatArg {
    fn from(doc: &Document) -> Self {
        Self::Doc(doc.clone())
    }
}

impl From<String> for FormatArg {
    fn from(text: String) -> Self {
        Self::Text(text)
    }
}

impl From<&str> for FormatArg {
    fn from(text: &str) -> Self {
        Self::Text(text.to_string())
    }
}

impl From<Vec<String>> for FormatArg {
    fn from(items: Vec<String>) -> Self {
        Self::List(items)
    }
}

impl From<Vec<&str>> for FormatArg {
    fn from(items: Vec<&str>) -> Self {
        Self::List(items.into_iter().map(str::to_string).collect())
    }
}

impl<T: Into<FormatArg>> From<Option<T>> for FormatArg {
    fn from(value: Option<T>) -> Self {
        value.map_or(Self::Missing, Into::into)
    }
}

/// Document type metadata provided by the host application.
pub trait TypeRegistry: Send + Sync {
    /// Display label configured for a type.
    fn label(&self, doc_type: &str) -> Option<String>;

    /// Whether the document is page-like.
    fn is_page(&self, doc: &Document) -> bool;

    /// Whether the type is the global singleton document.
    fn is_global(&self, doc_type: &str) -> bool {
        doc_type == GLOBAL_DOC_TYPE
    }
}

/// Type metadata taken from static configuration.
///
/// A document is page-like when its type is listed as a page type or its
/// slug starts with `/`.
#[derive(Debug, Clone, Default)]
pub struct StaticTypeRegistry {
    labels: HashMap<String, String>,
    pages: HashSet<String>,
}

impl StaticTypeRegistry {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    #[must_use]
    pub fn from_config(config: &TypeConfig) -> Self {
        Self {
            labels: config.labels.clone(),
            pages: config.pages.iter().cloned().collect(),
        }
    }

    #[must_use]
    pub fn with_label(mut self, doc_type: impl Into<String>, label: impl Into<String>) -> Self {
        self.labels.insert(doc_type.into(), label.into());
        self
    }

    #[must_use]
    pub fn with_page_type(mut self, doc_type: impl Into<String>) -> Self {
        self.pages.insert(doc_type.into());
        self
    }
}

impl TypeRegistry for StaticTypeRegistry {
    fn label(&self, doc_type: &str) -> Option<String> {
        self.labels.get(doc_type).cloned()
    }

    fn is_page(&self, doc: &Document) -> bool {
        doc.doc_type
            .as_deref()
            .is_some_and(|t| self.pages.contains(t))
            || doc.slug.as_deref().is_some_and(|s| s.starts_with('/'))
    }
}

/// Renders templates into message text.
#[derive(Clone)]
pub struct Formatter {
    types: Arc<dyn TypeRegistry>,
}

impl Formatter {
    #[must_use]
    pub fn new(types: Arc<dyn TypeRegistry>) -> Self {
        Self { types }
    }

    /// Render `template`, consuming `args` left to right.
    #[must_use]
    pub fn format(
        &self,
        actor: Option<&ActorContext>,
        template: &str,
        args: &[FormatArg],
    ) -> String {
        let mut output = String::with_capacity(template.len());
        let mut args = args.iter();
        let mut last = 0;

        for caps in PLACEHOLDER.captures_iter(template) {
            let (Some(whole), Some(kind)) = (caps.get(0), caps.get(1)) else {
                continue;
            };
            output.push_str(&template[last..whole.start()]);
            last = whole.end();

            match kind.as_str() {
                "user" => match actor {
                    Some(actor) => output.push_str(&actor.user.display_name()),
                    None => output.push_str(ANONYMOUS),
                },
                "type" => output.push_str(&self.render_type(args.next())),
                "title" => output.push_str(match args.next() {
                    None => UNDEFINED,
                    Some(FormatArg::Doc(doc)) => doc.display_title(),
                    Some(_) => UNKNOWN,
                }),
                _ => match args.next() {
                    Some(arg) => output.push_str(&arg.to_string()),
                    None => output.push_str(UNDEFINED),
                },
            }
        }

        output.push_str(&template[last..]);
        output
    }

    fn render_type(&self, arg: Option<&FormatArg>) -> String {
        let Some(FormatArg::Doc(doc)) = arg else {
            return UNDEFINED.to_string();
        };
        let Some(doc_type) = non_empty(doc.doc_type.as_deref()) else {
            return UNDEFINED.to_string();
        };

        if self.types.is_global(doc_type) {
            "shared document".to_string()
        } else if let Some(label) = self.types.label(doc_type) {
            label
        } else if self.types.is_page(doc) {
            "page".to_string()
        } else {
            doc_type.to_string()
        }
    }
}

impl Default for Formatter {
    fn default() -> Self {
        Self::new(Arc::new(StaticTypeRegistry::new()))
    }
}

impl fmt::Debug for Formatter {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Formatter").finish_non_exhaustive()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::message::User;
    use serde_json::json;

    fn admin() -> ActorContext {
        ActorContext::with_request_id("req", User::new("admin").with_title("Admin Person"))
    }

    fn modified() -> Document {
        Document::new("page").with_title("Modified")
    }

    #[test]
    fn test_plain_text_passes_through() {
        let f = Formatter::default();
        for template in ["", "hello world", "{unknown} stays", "{ user }", "{user"] {
            assert_eq!(f.format(None, template, &[]), template);
        }
    }

    #[test]
    fn test_user_placeholder() {
        let f = Formatter::default();
        assert_eq!(f.format(None, "{user}", &[]), "Anonymous");
        assert_eq!(f.format(Some(&admin()), "{user}", &[]), "Admin Person (admin)");

        let plain = ActorContext::with_request_id("req", User::new("editor"));
        assert_eq!(f.format(Some(&plain), "by {user}!", &[]), "by editor!");

        let unnamed = ActorContext::with_request_id("req", User::new("").with_title("Admin Person"));
        assert_eq!(f.format(Some(&unnamed), "{user}", &[]), "Admin Person (Anonymous)");
    }

    #[test]
    fn test_user_consumes_no_argument() {
        let f = Formatter::default();
        let out = f.format(Some(&admin()), "{user} {string}", &["x".into()]);
        assert_eq!(out, "Admin Person (admin) x");
    }

    #[test]
    fn test_commit_template() {
        let f = Formatter::default();
        let out = f.format(
            Some(&admin()),
            "{user} committed the {type} {title}",
            &[modified().into(), modified().into()],
        );
        assert_eq!(out, "Admin Person (admin) committed the page Modified");
    }

    #[test]
    fn test_string_placeholder() {
        let f = Formatter::default();
        assert_eq!(f.format(None, "{string}", &[vec!["es", "us"].into()]), "es, us");
        assert_eq!(f.format(None, "{string}", &["fr".into()]), "fr");
        assert_eq!(f.format(None, "{string}", &[]), "Undefined");
        assert_eq!(f.format(None, "{string}", &[FormatArg::Missing]), "Undefined");
        assert_eq!(f.format(None, "{string}", &[modified().into()]), "Modified");
    }

    #[test]
    fn test_title_placeholder() {
        let f = Formatter::default();
        let slug_only = Document::new("page").with_slug("/about");
        assert_eq!(f.format(None, "{title}", &[modified().into()]), "Modified");
        assert_eq!(f.format(None, "{title}", &[slug_only.into()]), "/about");
        assert_eq!(f.format(None, "{title}", &[Document::default().into()]), "Unknown");
        assert_eq!(f.format(None, "{title}", &["text".into()]), "Unknown");
        assert_eq!(f.format(None, "{title}", &[FormatArg::Missing]), "Unknown");
        assert_eq!(f.format(None, "{title}", &[]), "Undefined");
    }

    #[test]
    fn test_type_placeholder() {
        let types = StaticTypeRegistry::new()
            .with_label("product", "Product")
            .with_page_type("home");
        let f = Formatter::new(Arc::new(types));

        let render = |doc: Document| f.format(None, "{type}", &[doc.into()]);
        assert_eq!(render(Document::new(GLOBAL_DOC_TYPE)), "shared document");
        assert_eq!(render(Document::new("product")), "Product");
        assert_eq!(render(Document::new("home")), "page");
        assert_eq!(render(Document::new("landing").with_slug("/landing")), "page");
        assert_eq!(render(Document::new("event")), "event");
        assert_eq!(render(Document::default()), "Undefined");

        assert_eq!(f.format(None, "{type}", &[]), "Undefined");
        assert_eq!(f.format(None, "{type}", &["page".into()]), "Undefined");
        assert_eq!(f.format(None, "{type}", &[FormatArg::Missing]), "Undefined");
    }

    #[test]
    fn test_missing_arguments_keep_consuming() {
        let f = Formatter::default();
        let out = f.format(None, "{type} {title} {string} {string}", &[modified().into()]);
        assert_eq!(out, "page Undefined Undefined Undefined");
    }

    #[test]
    fn test_from_value() {
        assert_eq!(FormatArg::from_value(&json!(null)), FormatArg::Missing);
        assert_eq!(FormatArg::from_value(&json!("fr")), FormatArg::Text("fr".into()));
        assert_eq!(FormatArg::from_value(&json!(3)), FormatArg::Text("3".into()));
        assert_eq!(
            FormatArg::from_value(&json!(["es", 1])),
            FormatArg::List(vec!["es".into(), "1".into()])
        );
        assert_eq!(
            FormatArg::from_value(&json!({"type": "page", "title": "Modified", "workflowLocale": "en-draft"})),
            FormatArg::Doc(modified().with_locale("en-draft"))
        );
    }

    #[test]
    fn test_malformed_document_is_missing() {
        let arg = FormatArg::from_value(&json!({"type": "page", "title": 5}));
        assert_eq!(arg, FormatArg::Missing);

        let f = Formatter::default();
        assert_eq!(f.format(None, "{title}", &[arg]), "Unknown");
    }
}
