use crate::definitions::{CarsByModel, HideDeletedPeople};
use crate::hooks::{ArticleHooks, AuditLog, PersonHooks};
use crate::model::{Article, ArticleTag, Car, Dealership, InventoryItem, Person, Tag};
use jsonapi_core::mock::InMemoryRepository;
use jsonapi_core::{
    DataStoreError, GraphError, HookRegistry, JsonApiContext, JsonApiError, JsonApiOptions,
    RelationshipIds, Repository, RequestContext, ResourceDefinitions, ResourceGraph,
    ResourceGraphBuilder, ResourceService,
};
use std::collections::BTreeSet;
use std::sync::Arc;
use thiserror::Error;
use tracing::info;

#[derive(Debug, Error)]
pub enum SetupError {
    #[error("Invalid resource graph: {0}")]
    Graph(#[from] GraphError),
    #[error("Invalid configuration: {0}")]
    Config(#[from] serde_json::Error),
    #[error("Seeding failed: {0}")]
    Seed(#[from] DataStoreError),
    #[error("Seeding failed: {0}")]
    Request(#[from] JsonApiError),
}

/// Declares the blog and dealership resources.
pub fn graph_builder(options: &JsonApiOptions) -> Result<ResourceGraphBuilder, GraphError> {
    let mut builder = ResourceGraphBuilder::new(options.naming_convention);
    builder
        .add::<Person>("people", |r| {
            r.attribute("name", |p| p.name.clone(), |p, v| p.name = v)
                .attribute("deleted", |p| p.deleted, |p, v| p.deleted = v)
                .has_many::<Article>("articles", |p| p.articles.clone(), |p, v| p.articles = v)
                .has_many::<Person>("friends", |p| p.friends.clone(), |p, v| p.friends = v)
        })?
        .add::<Article>("articles", |r| {
            r.attribute("title", |a| a.title.clone(), |a, v| a.title = v)
                .has_one::<Person>("author", |a| a.author.clone(), |a, v| a.author = v)
                .has_many_through::<Tag, ArticleTag>(
                    "tags",
                    "article_tags",
                    |a| a.article_tags.clone(),
                    |a, v| a.article_tags = v,
                    |j| j.tag.clone(),
                    |a, tag| ArticleTag {
                        article: Some(Article::stub(a.id)),
                        tag: Some(tag.clone()),
                        ..ArticleTag::default()
                    },
                )
        })?
        .add::<Tag>("tags", |r| {
            r.attribute("name", |t| t.name.clone(), |t, v| t.name = v)
                .has_many_through::<Article, ArticleTag>(
                    "articles",
                    "article_tags",
                    |t| t.article_tags.clone(),
                    |t, v| t.article_tags = v,
                    |j| j.article.clone(),
                    |t, article| ArticleTag {
                        article: Some(article.clone()),
                        tag: Some(Tag::stub(t.id)),
                        ..ArticleTag::default()
                    },
                )
        })?
        .add::<Dealership>("dealerships", |r| {
            r.attribute("name", |d| d.name.clone(), |d, v| d.name = v)
                .has_many_through::<Car, InventoryItem>(
                    "inventory",
                    "inventory_items",
                    |d| d.inventory_items.clone(),
                    |d, v| d.inventory_items = v,
                    |j| j.car.clone(),
                    |d, car| InventoryItem {
                        dealership: Some(Dealership::stub(d.id)),
                        car: Some(car.clone()),
                        ..InventoryItem::default()
                    },
                )
        })?
        .add::<Car>("cars", |r| {
            r.attribute("model", |c| c.model.clone(), |c, v| c.model = v)
                .has_many_through::<Dealership, InventoryItem>(
                    "dealerships",
                    "inventory_items",
                    |c| c.inventory_items.clone(),
                    |c, v| c.inventory_items = v,
                    |j| j.dealership.clone(),
                    |c, dealership| InventoryItem {
                        dealership: Some(dealership.clone()),
                        car: Some(Car::stub(&c.id)),
                        ..InventoryItem::default()
                    },
                )
        })?;
    Ok(builder)
}

pub fn build_graph(options: &JsonApiOptions) -> Result<ResourceGraph, GraphError> {
    graph_builder(options)?.build()
}

/// The wired application: graph, store, hooks and services.
pub struct BlogSystem {
    pub context: JsonApiContext,
    pub repository: Arc<InMemoryRepository>,
    pub audit: AuditLog,
}

impl BlogSystem {
    pub fn new() -> Result<Self, SetupError> {
        Self::with_options(JsonApiOptions::default())
    }

    /// Builds the system from a JSON options document.
    pub fn from_config(json: &str) -> Result<Self, SetupError> {
        Self::with_options(JsonApiOptions::from_json(json)?)
    }

    pub fn with_options(options: JsonApiOptions) -> Result<Self, SetupError> {
        let graph = Arc::new(build_graph(&options)?);
        let repository = Arc::new(InMemoryRepository::new(Arc::clone(&graph)));
        let audit = AuditLog::new();

        let mut definitions = ResourceDefinitions::new();
        definitions
            .register::<Person>(HideDeletedPeople)
            .register::<Car>(CarsByModel);

        let mut hooks = HookRegistry::new();
        hooks
            .register::<Article, _>(ArticleHooks::new(audit.clone()))
            .register::<Person, _>(PersonHooks::new(audit.clone()));

        let context = JsonApiContext::new(
            graph,
            options,
            definitions,
            hooks,
            Arc::clone(&repository) as Arc<dyn Repository>,
        );
        info!("Blog system ready");
        Ok(Self {
            context,
            repository,
            audit,
        })
    }

    pub fn people(&self) -> Result<ResourceService<Person>, GraphError> {
        self.context.service()
    }

    pub fn articles(&self) -> Result<ResourceService<Article>, GraphError> {
        self.context.service()
    }

    pub fn tags(&self) -> Result<ResourceService<Tag>, GraphError> {
        self.context.service()
    }

    pub fn dealerships(&self) -> Result<ResourceService<Dealership>, GraphError> {
        self.context.service()
    }

    pub fn cars(&self) -> Result<ResourceService<Car>, GraphError> {
        self.context.service()
    }

    /// Seeds a small blog and one dealership, then clears the call log and audit.
    ///
    /// People 1 and 2 are mutual friends, person 3 is soft-deleted. Articles 1 and 2
    /// carry tags; dealership 1 stocks `carX` and `carY`, `carZ` is unassigned.
    pub async fn seed_demo_data(&self) -> Result<(), SetupError> {
        let store = &self.repository;
        store.seed(Person::new(1, "Ada"))?;
        store.seed(Person::new(2, "Grace"))?;
        store.seed(Person {
            deleted: true,
            ..Person::new(3, "Linus")
        })?;
        for (id, name) in [(1, "rust"), (2, "async"), (3, "databases")] {
            store.seed(Tag::new(id, name))?;
        }
        for (id, title, author) in [(1, "Ownership", 1), (2, "Lifetimes", 1), (3, "Compilers", 2)] {
            store.seed(Article::new(id, title).written_by(author))?;
        }
        store.seed(Dealership::new(1, "Downtown Motors"))?;
        for (vin, model) in [("carX", "Civic"), ("carY", "Corolla"), ("carZ", "Golf")] {
            store.seed(Car::new(vin, model))?;
        }

        let mut request = RequestContext::new();
        let people = self.people()?;
        people.set_relationship(&1, "friends", RelationshipIds::ToMany(ids(["2"])), &mut request).await?;
        people.set_relationship(&2, "friends", RelationshipIds::ToMany(ids(["1"])), &mut request).await?;

        let articles = self.articles()?;
        articles.set_relationship(&1, "tags", RelationshipIds::ToMany(ids(["1"])), &mut request).await?;
        articles.set_relationship(&2, "tags", RelationshipIds::ToMany(ids(["1", "2"])), &mut request).await?;

        self.dealerships()?
            .set_relationship(&1, "inventory", RelationshipIds::ToMany(ids(["carX", "carY"])), &mut request)
            .await?;

        store.clear_calls();
        self.audit.clear();
        info!("Demo data seeded");
        Ok(())
    }
}

/// Relationship target ids from string literals.
pub fn ids<const N: usize>(ids: [&str; N]) -> BTreeSet<String> {
    ids.iter().map(|id| id.to_string()).collect()
}
