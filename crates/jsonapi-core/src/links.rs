//! Links and pagination metadata for response documents.

use crate::graph::{Relationship, ResourceType};
use crate::options::JsonApiOptions;
use crate::request::RequestContext;
use serde::Serialize;
use serde_json::{json, Map, Value};
use std::sync::Arc;

#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct TopLevelLinks {
    #[serde(rename = "self", skip_serializing_if = "Option::is_none")]
    pub self_link: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub first: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub prev: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub next: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub last: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ResourceLinks {
    #[serde(rename = "self")]
    pub self_link: String,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct RelationshipLinks {
    #[serde(rename = "self")]
    pub self_link: String,
    pub related: String,
}

pub struct LinkBuilder {
    options: Arc<JsonApiOptions>,
}

impl LinkBuilder {
    pub fn new(options: Arc<JsonApiOptions>) -> Self {
        Self { options }
    }

    /// Self link of the requested collection plus paging links when the request
    /// was paginated. Paging links keep every non-paging query parameter.
    pub fn top_level_links(&self, resource: &ResourceType, request: &RequestContext) -> Option<TopLevelLinks> {
        if !self.options.top_level_links {
            return None;
        }
        let self_link = format!("{}/{}", self.base_path(), resource.public_name);
        let mut links = TopLevelLinks {
            self_link: Some(self_link.clone()),
            ..TopLevelLinks::default()
        };

        let pagination = &request.pagination;
        if pagination.page_size == 0 {
            return Some(links);
        }
        let current = pagination.page_number.max(1);
        let filters: String = request
            .query
            .iter()
            .filter(|(name, _)| !name.starts_with("page["))
            .map(|(name, value)| format!("&{name}={value}"))
            .collect();
        let page = |number: usize| {
            format!(
                "{self_link}?page[size]={}&page[number]={number}{filters}",
                pagination.page_size
            )
        };

        if current > 1 {
            links.first = Some(page(1));
            links.prev = Some(page(current - 1));
        }
        match pagination.total_pages() {
            Some(total) => {
                if current < total {
                    links.next = Some(page(current + 1));
                }
                if total > 0 {
                    links.last = Some(page(total));
                }
            }
            // Without a total count a full page may have a successor.
            None if pagination.is_page_full => links.next = Some(page(current + 1)),
            None => {}
        }
        Some(links)
    }

    pub fn resource_links(&self, resource: &ResourceType, id: &str) -> Option<ResourceLinks> {
        if !self.options.resource_links {
            return None;
        }
        Some(ResourceLinks {
            self_link: format!("{}/{}/{id}", self.base_path(), resource.public_name),
        })
    }

    pub fn relationship_links(
        &self,
        resource: &ResourceType,
        id: &str,
        relationship: &Relationship,
    ) -> Option<RelationshipLinks> {
        if !self.options.relationship_links {
            return None;
        }
        let parent = format!("{}/{}/{id}", self.base_path(), resource.public_name);
        Some(RelationshipLinks {
            self_link: format!("{parent}/relationships/{}", relationship.public_name),
            related: format!("{parent}/{}", relationship.public_name),
        })
    }

    /// Top-level `meta` carrying the total resource count, when it was computed.
    pub fn top_level_meta(&self, request: &RequestContext) -> Option<Map<String, Value>> {
        let total = request.pagination.total_resource_count?;
        let mut meta = Map::new();
        meta.insert("total-resources".to_string(), json!(total));
        Some(meta)
    }

    fn base_path(&self) -> String {
        let host = if self.options.use_relative_links {
            ""
        } else {
            self.options.base_url.trim_end_matches('/')
        };
        match self.options.namespace.as_deref().map(|n| n.trim_matches('/')) {
            Some(namespace) if !namespace.is_empty() => format!("{host}/{namespace}"),
            _ => host.to_string(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::entity::Identifiable;
    use crate::graph::ResourceGraphBuilder;
    use crate::options::NamingConvention;
    use crate::request::PaginationContext;

    #[derive(Clone, Debug, Default)]
    struct Article {
        id: i64,
        title: String,
    }

    impl Identifiable for Article {
        type Id = i64;
        fn id(&self) -> i64 {
            self.id
        }
        fn set_id(&mut self, id: i64) {
            self.id = id;
        }
    }

    fn articles() -> Arc<ResourceType> {
        let mut builder = ResourceGraphBuilder::new(NamingConvention::CamelCase);
        builder
            .add::<Article>("articles", |r| r.attribute("title", |a| a.title.clone(), |a, v| a.title = v))
            .unwrap();
        let graph = builder.build().unwrap();
        Arc::clone(graph.get_resource_type("articles").unwrap())
    }

    fn builder(options: JsonApiOptions) -> LinkBuilder {
        LinkBuilder::new(Arc::new(options))
    }

    #[test]
    fn test_paging_links_in_the_middle() {
        let resource = articles();
        let mut request = RequestContext::new().with_query(&[("page[number]", "2"), ("sort", "-title")]);
        request.pagination = PaginationContext {
            total_resource_count: Some(25),
            is_page_full: true,
            page_size: 10,
            page_number: 2,
        };

        let links = builder(JsonApiOptions::default())
            .top_level_links(&resource, &request)
            .unwrap();

        assert_eq!(links.self_link.as_deref(), Some("http://localhost/articles"));
        assert_eq!(
            links.first.as_deref(),
            Some("http://localhost/articles?page[size]=10&page[number]=1&sort=-title")
        );
        assert_eq!(
            links.next.as_deref(),
            Some("http://localhost/articles?page[size]=10&page[number]=3&sort=-title")
        );
        assert_eq!(links.last, links.next);
    }

    #[test]
    fn test_first_page_has_no_prev() {
        let resource = articles();
        let mut request = RequestContext::new();
        request.pagination = PaginationContext {
            total_resource_count: Some(5),
            is_page_full: false,
            page_size: 10,
            page_number: 1,
        };

        let links = builder(JsonApiOptions::default())
            .top_level_links(&resource, &request)
            .unwrap();
        assert!(links.prev.is_none());
        assert!(links.next.is_none());
        assert!(links.last.is_some());
    }

    #[test]
    fn test_relative_links_with_namespace() {
        let resource = articles();
        let options = JsonApiOptions {
            namespace: Some("api/v1".into()),
            use_relative_links: true,
            ..JsonApiOptions::default()
        };
        let links = builder(options).resource_links(&resource, "3").unwrap();
        assert_eq!(links.self_link, "/api/v1/articles/3");
    }

    #[test]
    fn test_disabled_links_are_omitted() {
        let resource = articles();
        let options = JsonApiOptions {
            top_level_links: false,
            resource_links: false,
            ..JsonApiOptions::default()
        };
        let builder = builder(options);
        assert!(builder.top_level_links(&resource, &RequestContext::new()).is_none());
        assert!(builder.resource_links(&resource, "1").is_none());
    }

    #[test]
    fn test_meta_total() {
        let mut request = RequestContext::new();
        assert!(builder(JsonApiOptions::default()).top_level_meta(&request).is_none());
        request.pagination.total_resource_count = Some(7);
        let meta = builder(JsonApiOptions::default()).top_level_meta(&request).unwrap();
        assert_eq!(meta["total-resources"], json!(7));
    }
}
