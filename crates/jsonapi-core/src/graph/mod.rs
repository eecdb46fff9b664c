//! # Resource Graph
//!
//! The resource graph is the immutable registry of every exposed model: its public
//! name, attributes and relationships. It is built once at startup through
//! [`ResourceGraphBuilder`] and then shared read-only (`Arc<ResourceGraph>`) by all
//! request pipelines.
//!
//! # Architecture Note
//! Construction is two-phase. All types are registered first because relationships
//! refer to each other in both directions; only once every type is known can inverse
//! relationships be paired up.

mod builder;
mod resource_type;

pub use builder::{ResourceGraphBuilder, ResourceTypeBuilder};
pub use resource_type::{
    Attribute, AttributeCapabilities, IdKind, Relationship, RelationshipKind, RelationshipValue,
    ResourceType, ThroughInfo, ThroughTargets,
};

use crate::entity::{EntityRef, Identifiable};
use crate::error::GraphError;
use std::any::TypeId;
use std::collections::HashMap;
use std::sync::Arc;

#[derive(Debug)]
pub struct ResourceGraph {
    types: Vec<Arc<ResourceType>>,
    by_name: HashMap<String, usize>,
    by_model: HashMap<TypeId, usize>,
    by_controller: HashMap<String, usize>,
}

impl ResourceGraph {
    pub(crate) fn new(types: Vec<ResourceType>) -> Self {
        let types: Vec<Arc<ResourceType>> = types.into_iter().map(Arc::new).collect();
        let mut by_name = HashMap::new();
        let mut by_model = HashMap::new();
        let mut by_controller = HashMap::new();
        for (index, resource_type) in types.iter().enumerate() {
            by_name.insert(resource_type.public_name.to_lowercase(), index);
            by_model.insert(resource_type.model, index);
            if let Some(controller) = &resource_type.controller_name {
                by_controller.insert(controller.to_lowercase(), index);
            }
        }
        Self {
            types,
            by_name,
            by_model,
            by_controller,
        }
    }

    pub fn resource_types(&self) -> &[Arc<ResourceType>] {
        &self.types
    }

    /// Looks a type up by public name, ignoring case.
    pub fn get_resource_type(&self, public_name: &str) -> Option<&Arc<ResourceType>> {
        self.by_name
            .get(&public_name.to_lowercase())
            .map(|&index| &self.types[index])
    }

    pub fn get_resource_type_by_model(&self, model: TypeId) -> Option<&Arc<ResourceType>> {
        self.by_model.get(&model).map(|&index| &self.types[index])
    }

    pub fn get_resource_type_by_controller_name(&self, controller: &str) -> Option<&Arc<ResourceType>> {
        self.by_controller
            .get(&controller.to_lowercase())
            .map(|&index| &self.types[index])
    }

    /// The resource type of model `T`.
    pub fn resource_type_of<T: Identifiable>(&self) -> Result<&Arc<ResourceType>, GraphError> {
        self.get_resource_type_by_model(TypeId::of::<T>())
            .ok_or(GraphError::UnregisteredModel(crate::entity::short_type_name::<T>()))
    }

    /// Resource type of a loaded entity.
    pub fn resource_type_of_entity(&self, entity: &EntityRef) -> Option<&Arc<ResourceType>> {
        self.get_resource_type_by_model(entity.model_type())
    }

    /// Reads a relationship navigation of `entity`.
    pub fn get_relationship_value(
        &self,
        entity: &EntityRef,
        relationship: &Relationship,
    ) -> RelationshipValue {
        relationship.get_value(entity)
    }

    /// The resolved inverse of `relationship`, if any.
    pub fn inverse_of(&self, relationship: &Relationship) -> Option<Arc<Relationship>> {
        let inverse = relationship.inverse.as_deref()?;
        self.get_resource_type_by_model(relationship.right_model)?
            .relationship_by_property(inverse)
            .cloned()
    }

    /// Target type of a relationship.
    pub fn target_of(&self, relationship: &Relationship) -> Option<&Arc<ResourceType>> {
        self.get_resource_type_by_model(relationship.right_model)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::entity::{erase, shared, Shared};
    use crate::options::NamingConvention;

    #[derive(Clone, Debug, Default)]
    struct Person {
        id: i64,
        first_name: String,
        articles: Vec<Shared<Article>>,
        reviewed: Vec<Shared<Article>>,
    }

    #[derive(Clone, Debug, Default)]
    struct Article {
        id: i64,
        title: String,
        author: Option<Shared<Person>>,
        reviewer: Option<Shared<Person>>,
        article_tags: Vec<Shared<ArticleTag>>,
    }

    #[derive(Clone, Debug, Default)]
    struct Tag {
        id: i64,
        name: String,
        article_tags: Vec<Shared<ArticleTag>>,
    }

    #[derive(Clone, Debug, Default)]
    struct ArticleTag {
        id: i64,
        article_id: i64,
        tag: Option<Shared<Tag>>,
        article: Option<Shared<Article>>,
    }

    macro_rules! identifiable {
        ($($model:ty),*) => {$(
            impl Identifiable for $model {
                type Id = i64;
                fn id(&self) -> i64 { self.id }
                fn set_id(&mut self, id: i64) { self.id = id; }
            }
        )*};
    }
    identifiable!(Person, Article, Tag, ArticleTag);

    fn builder() -> ResourceGraphBuilder {
        let mut builder = ResourceGraphBuilder::new(NamingConvention::CamelCase);
        builder
            .add::<Person>("people", |r| {
                r.attribute("first_name", |p| p.first_name.clone(), |p, v| p.first_name = v)
                    .has_many::<Article>("articles", |p| p.articles.clone(), |p, v| p.articles = v)
                    .has_many::<Article>("reviewed", |p| p.reviewed.clone(), |p, v| p.reviewed = v)
                    .controller("PeopleController")
            })
            .unwrap()
            .add::<Article>("articles", |r| {
                r.attribute("title", |a| a.title.clone(), |a, v| a.title = v)
                    .has_one::<Person>("author", |a| a.author.clone(), |a, v| a.author = v)
                    .has_one::<Person>("reviewer", |a| a.reviewer.clone(), |a, v| a.reviewer = v)
                    .inverse("author", "articles")
                    .inverse("reviewer", "reviewed")
                    .has_many_through::<Tag, ArticleTag>(
                        "tags",
                        "article_tags",
                        |a| a.article_tags.clone(),
                        |a, v| a.article_tags = v,
                        |j| j.tag.clone(),
                        |a, tag| ArticleTag {
                            article_id: a.id,
                            tag: Some(tag.clone()),
                            ..ArticleTag::default()
                        },
                    )
            })
            .unwrap()
            .add::<Tag>("tags", |r| {
                r.attribute("name", |t| t.name.clone(), |t, v| t.name = v)
                    .has_many_through::<Article, ArticleTag>(
                        "articles",
                        "article_tags",
                        |t| t.article_tags.clone(),
                        |t, v| t.article_tags = v,
                        |j| j.article.clone(),
                        |_, article| ArticleTag {
                            article: Some(article.clone()),
                            ..ArticleTag::default()
                        },
                    )
            })
            .unwrap();
        builder
    }

    #[test]
    fn test_lookup_by_public_name_ignores_case() {
        let graph = builder().build().unwrap();

        for name in ["articles", "Articles", "ARTICLES"] {
            let resource_type = graph.get_resource_type(name).expect("registered");
            assert_eq!(resource_type.model, TypeId::of::<Article>());
        }
        assert!(graph.get_resource_type("unknown").is_none());
    }

    #[test]
    fn test_lookup_by_model_and_controller() {
        let graph = builder().build().unwrap();

        assert_eq!(graph.resource_type_of::<Tag>().unwrap().public_name, "tags");
        assert_eq!(
            graph
                .get_resource_type_by_controller_name("peoplecontroller")
                .unwrap()
                .public_name,
            "people"
        );
        assert!(matches!(
            graph.resource_type_of::<ArticleTag>(),
            Err(GraphError::UnregisteredModel("ArticleTag"))
        ));
    }

    #[test]
    fn test_duplicate_public_name_is_rejected() {
        let mut builder = builder();
        let result = builder.add::<ArticleTag>("Tags", |r| r);

        assert!(matches!(
            result.err(),
            Some(GraphError::DuplicateResource { public_name }) if public_name == "Tags"
        ));
    }

    #[test]
    fn test_public_names_follow_naming_convention_and_include_id() {
        let graph = builder().build().unwrap();
        let people = graph.get_resource_type("people").unwrap();

        let names: Vec<&str> = people
            .attributes()
            .iter()
            .map(|a| a.public_name.as_str())
            .collect();
        assert_eq!(names, vec!["id", "firstName"]);
    }

    #[test]
    fn test_inverse_resolution_is_idempotent() {
        let mut builder = builder();
        builder.resolve_inverse_relationships();
        let first = builder.build().unwrap();
        builder.resolve_inverse_relationships();
        let second = builder.build().unwrap();

        for graph in [&first, &second] {
            let tags = graph.get_resource_type("tags").unwrap();
            let articles_of_tag = tags.relationship("articles").unwrap();
            assert_eq!(articles_of_tag.inverse.as_deref(), Some("tags"));

            // Only `author` pairs with `articles`; `reviewer` is pinned elsewhere.
            let people = graph.get_resource_type("people").unwrap();
            let articles_of_person = people.relationship("articles").unwrap();
            assert_eq!(articles_of_person.inverse.as_deref(), Some("author"));
        }
    }

    #[test]
    fn test_ambiguous_inverse_stays_unresolved() {
        let mut builder = ResourceGraphBuilder::new(NamingConvention::CamelCase);
        builder
            .add::<Person>("people", |r| r)
            .unwrap()
            .add::<Article>("articles", |r| {
                r.has_one::<Person>("author", |a| a.author.clone(), |a, v| a.author = v)
                    .has_one::<Person>("reviewer", |a| a.reviewer.clone(), |a, v| a.reviewer = v)
            })
            .unwrap();
        builder.resolve_inverse_relationships();
        let graph = builder.build().unwrap();

        let articles = graph.get_resource_type("articles").unwrap();
        assert!(articles.relationship("author").unwrap().inverse.is_none());
    }

    #[test]
    fn test_through_inverse_must_be_to_many() {
        let mut builder = ResourceGraphBuilder::new(NamingConvention::CamelCase);
        builder
            .add::<Person>("people", |r| {
                r.has_many_through::<Article, ArticleTag>(
                    "favorites",
                    "favorite_joins",
                    |_| Vec::new(),
                    |_, _| {},
                    |j| j.article.clone(),
                    |_, article| ArticleTag {
                        article: Some(article.clone()),
                        ..ArticleTag::default()
                    },
                )
                .inverse("favorites", "author")
            })
            .unwrap()
            .add::<Article>("articles", |r| {
                r.has_one::<Person>("author", |a| a.author.clone(), |a, v| a.author = v)
            })
            .unwrap();

        assert!(matches!(
            builder.build(),
            Err(GraphError::InvalidInverse { .. })
        ));
    }

    #[test]
    fn test_explicit_inverse_must_exist() {
        let mut builder = ResourceGraphBuilder::new(NamingConvention::CamelCase);
        builder
            .add::<Person>("people", |r| r)
            .unwrap()
            .add::<Article>("articles", |r| {
                r.has_one::<Person>("author", |a| a.author.clone(), |a, v| a.author = v)
                    .inverse("author", "missing")
            })
            .unwrap();

        assert!(matches!(
            builder.build(),
            Err(GraphError::InvalidInverse { .. })
        ));
    }

    #[test]
    fn test_through_value_is_restartable_and_writable() {
        let graph = builder().build().unwrap();
        let tags_rel = graph
            .get_resource_type("articles")
            .unwrap()
            .relationship("tags")
            .unwrap()
            .clone();

        let rust = shared(Tag { id: 1, name: "rust".into(), ..Tag::default() });
        let web = shared(Tag { id: 2, name: "web".into(), ..Tag::default() });
        let article = erase(shared(Article { id: 10, ..Article::default() }));

        tags_rel.set_value(
            &article,
            RelationshipValue::ToMany(vec![erase(rust.clone()), erase(web.clone())]),
        );
        let targets = tags_rel.through_targets(&article).unwrap();
        assert_eq!(targets.clone().count(), 2);
        assert_eq!(targets.count(), 2);

        // Keeping one target keeps its existing join row.
        let before = tags_rel.joins(&article);
        tags_rel.set_value(&article, RelationshipValue::ToMany(vec![erase(web)]));
        let after = tags_rel.joins(&article);
        assert_eq!(after.len(), 1);
        assert!(Arc::ptr_eq(&before[1], &after[0]));
        assert_eq!(
            graph.get_relationship_value(&article, &tags_rel).ids(),
            vec!["2".to_string()]
        );
    }
}
