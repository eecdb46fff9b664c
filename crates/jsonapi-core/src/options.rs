//! # Options
//!
//! Global settings that influence parsing, composition and link rendering.
//! All fields have defaults so a partial JSON document is enough to configure a system.

use serde::Deserialize;

/// How public attribute and relationship names derive from property names.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum NamingConvention {
    /// `author_name` becomes `authorName`.
    #[default]
    CamelCase,
    /// `author_name` becomes `author-name`.
    KebabCase,
    /// Property names are used as-is.
    AsDeclared,
}

impl NamingConvention {
    pub fn apply(&self, property: &str) -> String {
        match self {
            NamingConvention::AsDeclared => property.to_string(),
            NamingConvention::KebabCase => property.replace('_', "-").to_lowercase(),
            NamingConvention::CamelCase => {
                let mut out = String::with_capacity(property.len());
                let mut upper_next = false;
                for (i, c) in property.chars().enumerate() {
                    if c == '_' {
                        upper_next = i > 0;
                    } else if upper_next {
                        out.extend(c.to_uppercase());
                        upper_next = false;
                    } else if out.is_empty() {
                        out.extend(c.to_lowercase());
                    } else {
                        out.push(c);
                    }
                }
                out
            }
        }
    }
}

#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct JsonApiOptions {
    /// Path prefix for generated links, e.g. `api/v1`.
    pub namespace: Option<String>,
    /// Scheme and host used for absolute links.
    pub base_url: String,
    /// Render links without scheme and host.
    pub use_relative_links: bool,
    pub include_total_resource_count: bool,
    /// Page size applied when the client sends none. Zero disables paging.
    pub default_page_size: i64,
    pub maximum_page_size: Option<i64>,
    pub maximum_page_number: Option<i64>,
    pub maximum_include_depth: Option<usize>,
    pub allow_unknown_query_parameters: bool,
    /// Parameters handed through to resource definitions untouched.
    pub passthrough_query_parameters: Vec<String>,
    pub naming_convention: NamingConvention,
    pub top_level_links: bool,
    pub resource_links: bool,
    pub relationship_links: bool,
}

impl Default for JsonApiOptions {
    fn default() -> Self {
        Self {
            namespace: None,
            base_url: "http://localhost".to_string(),
            use_relative_links: false,
            include_total_resource_count: true,
            default_page_size: 10,
            maximum_page_size: None,
            maximum_page_number: None,
            maximum_include_depth: None,
            allow_unknown_query_parameters: false,
            passthrough_query_parameters: Vec::new(),
            naming_convention: NamingConvention::CamelCase,
            top_level_links: true,
            resource_links: true,
            relationship_links: true,
        }
    }
}

impl JsonApiOptions {
    /// Parses options from a JSON document; missing fields take their defaults.
    pub fn from_json(json: &str) -> Result<Self, serde_json::Error> {
        serde_json::from_str(json)
    }

    pub fn is_passthrough(&self, parameter: &str) -> bool {
        self.passthrough_query_parameters
            .iter()
            .any(|p| p == parameter)
    }
}
