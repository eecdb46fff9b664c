use async_trait::async_trait;
use jsonapi_core::mock::{InMemoryRepository, Operation};
use jsonapi_core::{
    shared, HookContext, HookRegistry, Identifiable, JsonApiContext, JsonApiError, JsonApiOptions,
    NamingConvention, RelationshipIds, RequestContext, ResourceDefinitions, ResourceGraphBuilder,
    ResourceHooks, SecondaryResult, Shared, TargetedFields,
};
use std::collections::BTreeSet;
use std::sync::Arc;
use tokio_util::sync::CancellationToken;

#[derive(Clone, Debug, Default)]
struct Person {
    id: i64,
    name: String,
    articles: Vec<Shared<Article>>,
}

#[derive(Clone, Debug, Default)]
struct Article {
    id: i64,
    title: String,
    author: Option<Shared<Person>>,
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
    article: Option<Shared<Article>>,
    tag: Option<Shared<Tag>>,
}

macro_rules! identifiable {
    ($($model:ty),*) => {
        $(impl Identifiable for $model {
            type Id = i64;
            fn id(&self) -> i64 {
                self.id
            }
            fn set_id(&mut self, id: i64) {
                self.id = id;
            }
        })*
    };
}

identifiable!(Person, Article, Tag, ArticleTag);

struct Blog {
    context: JsonApiContext,
    repository: Arc<InMemoryRepository>,
}

fn blog_with(hooks: HookRegistry) -> Blog {
    let mut builder = ResourceGraphBuilder::new(NamingConvention::CamelCase);
    builder
        .add::<Person>("people", |r| {
            r.attribute("name", |p| p.name.clone(), |p, v| p.name = v)
                .has_many::<Article>("articles", |p| p.articles.clone(), |p, v| p.articles = v)
        })
        .expect("people")
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
                        article: Some(shared(Article { id: a.id, ..Article::default() })),
                        tag: Some(tag.clone()),
                        ..ArticleTag::default()
                    },
                )
        })
        .expect("articles")
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
                        tag: Some(shared(Tag { id: t.id, ..Tag::default() })),
                        ..ArticleTag::default()
                    },
                )
        })
        .expect("tags");
    let graph = Arc::new(builder.build().expect("graph"));

    let repository = Arc::new(InMemoryRepository::new(Arc::clone(&graph)));
    repository
        .seed(Person { id: 1, name: "Ada".into(), ..Person::default() })
        .expect("seed person");
    for (id, name) in [(1, "rust"), (2, "async"), (3, "db")] {
        repository
            .seed(Tag { id, name: name.into(), ..Tag::default() })
            .expect("seed tag");
    }
    for (id, title) in [(1, "Ownership"), (2, "Lifetimes"), (3, "Traits")] {
        repository
            .seed(Article {
                id,
                title: title.into(),
                author: Some(shared(Person { id: 1, ..Person::default() })),
                ..Article::default()
            })
            .expect("seed article");
    }

    let context = JsonApiContext::new(
        Arc::clone(&graph),
        JsonApiOptions::default(),
        ResourceDefinitions::new(),
        hooks,
        Arc::clone(&repository) as Arc<dyn jsonapi_core::Repository>,
    );
    Blog { context, repository }
}

fn blog() -> Blog {
    blog_with(HookRegistry::new())
}

fn targeted(blog: &Blog, resource: &str, names: &[&str]) -> TargetedFields {
    let resource = blog
        .context
        .graph()
        .get_resource_type(resource)
        .expect("resource type");
    TargetedFields::of(resource, names)
}

async fn tag_ids(blog: &Blog, article: i64) -> Vec<String> {
    let service = blog.context.service::<Article>().expect("service");
    let mut request = RequestContext::new();
    service
        .get_relationship(&article, "tags", &mut request)
        .await
        .expect("tags")
        .ids()
}

#[tokio::test]
async fn test_get_all_counts_and_pages() {
    let blog = blog();
    let service = blog.context.service::<Article>().expect("service");

    let mut request = RequestContext::new().with_query(&[("page[size]", "2"), ("sort", "-title")]);
    let articles = service.get_all(&mut request).await.expect("get all");

    let titles: Vec<String> = articles.iter().map(|a| a.read().title.clone()).collect();
    assert_eq!(titles, vec!["Traits", "Ownership"]);
    assert_eq!(request.pagination.total_resource_count, Some(3));
    assert!(request.pagination.is_page_full);

    let links = blog
        .context
        .link_builder()
        .top_level_links(service.resource_type(), &request)
        .expect("links");
    assert!(links.next.is_some());
    assert!(links.prev.is_none());
}

#[tokio::test]
async fn test_get_all_skips_query_when_nothing_matches() {
    let blog = blog();
    let service = blog.context.service::<Article>().expect("service");

    let mut request = RequestContext::new().with_query(&[("filter[title]", "Missing")]);
    let articles = service.get_all(&mut request).await.expect("get all");

    assert!(articles.is_empty());
    assert_eq!(request.pagination.total_resource_count, Some(0));
    assert_eq!(blog.repository.count_of(Operation::Get), 0);
}

#[tokio::test]
async fn test_get_includes_related_resources() {
    let blog = blog();
    let service = blog.context.service::<Article>().expect("service");

    let mut request = RequestContext::new().with_query(&[("include", "author")]);
    let article = service.get(&2, &mut request).await.expect("article");

    let author = article.read().author.clone().expect("author included");
    assert_eq!(author.read().name, "Ada");
}

#[tokio::test]
async fn test_get_missing_resource() {
    let blog = blog();
    let service = blog.context.service::<Article>().expect("service");

    let error = service.get(&99, &mut RequestContext::new()).await.unwrap_err();
    assert_eq!(
        error,
        JsonApiError::ResourceNotFound {
            id: "99".into(),
            resource: "articles".into()
        }
    );
    assert_eq!(error.status(), 404);
}

#[tokio::test]
async fn test_update_of_missing_id_is_not_found() {
    let blog = blog();
    let service = blog.context.service::<Article>().expect("service");

    let mut request = RequestContext::new().with_targeted(targeted(&blog, "articles", &["title"]));
    let changes = Article {
        title: "Renamed".into(),
        ..Article::default()
    };
    let error = service.update(&42, changes, &mut request).await.unwrap_err();

    assert_eq!(
        error,
        JsonApiError::ResourceNotFound {
            id: "42".into(),
            resource: "articles".into()
        }
    );
    assert_eq!(blog.repository.count_of(Operation::Update), 0);
}

#[tokio::test]
async fn test_update_returns_none_without_implicit_changes() {
    let blog = blog();
    let service = blog.context.service::<Article>().expect("service");

    let mut request = RequestContext::new().with_targeted(targeted(&blog, "articles", &["title"]));
    let changes = Article {
        title: "Borrowing".into(),
        ..Article::default()
    };
    let result = service.update(&2, changes, &mut request).await.expect("update");
    assert!(result.is_none());

    let stored = blog.repository.find::<Article>("2").expect("article 2");
    assert_eq!(stored.read().title, "Borrowing");
}

#[tokio::test]
async fn test_create_with_missing_related_resource() {
    let blog = blog();
    let service = blog.context.service::<Article>().expect("service");

    let mut request =
        RequestContext::new().with_targeted(targeted(&blog, "articles", &["title", "author"]));
    let article = Article {
        title: "Orphan".into(),
        author: Some(shared(Person { id: 6, ..Person::default() })),
        ..Article::default()
    };
    let error = service.create(article, &mut request).await.unwrap_err();

    let JsonApiError::ResourcesInRelationshipsNotFound(missing) = &error else {
        panic!("unexpected error: {error:?}");
    };
    assert_eq!(missing.len(), 1);
    assert_eq!(missing[0].id, "6");
    assert_eq!(missing[0].relationship, "author");
    assert_eq!(missing[0].resource_type, "people");

    let objects = error.to_error_objects();
    assert_eq!(objects.len(), 1);
    assert!(objects[0].detail.as_deref().is_some_and(|d| d.contains("'6'") && d.contains("author")));
}

#[tokio::test]
async fn test_create_with_existing_id_conflicts() {
    let blog = blog();
    let service = blog.context.service::<Article>().expect("service");

    let mut request = RequestContext::new().with_targeted(targeted(&blog, "articles", &["id", "title"]));
    let article = Article {
        id: 1,
        title: "Again".into(),
        ..Article::default()
    };
    let error = service.create(article, &mut request).await.unwrap_err();

    assert_eq!(error.status(), 409);
    assert!(matches!(error, JsonApiError::ResourceAlreadyExists { .. }));
}

#[tokio::test]
async fn test_create_returns_resource_with_generated_id() {
    let blog = blog();
    let service = blog.context.service::<Article>().expect("service");

    let mut request =
        RequestContext::new().with_targeted(targeted(&blog, "articles", &["title", "author"]));
    let article = Article {
        title: "Macros".into(),
        author: Some(shared(Person { id: 1, ..Person::default() })),
        ..Article::default()
    };
    let created = service
        .create(article, &mut request)
        .await
        .expect("create")
        .expect("server generated the id");

    assert_eq!(created.read().id, 4);
    let author = blog.repository.find::<Person>("1").expect("person");
    assert_eq!(author.read().articles.len(), 4);
}

#[tokio::test]
async fn test_create_with_client_id_returns_none() {
    let blog = blog();
    let service = blog.context.service::<Article>().expect("service");

    let mut request = RequestContext::new().with_targeted(targeted(&blog, "articles", &["id", "title"]));
    let article = Article {
        id: 50,
        title: "Exact".into(),
        ..Article::default()
    };
    let result = service.create(article, &mut request).await.expect("create");
    assert!(result.is_none());
    assert!(blog.repository.find::<Article>("50").is_some());
}

#[tokio::test]
async fn test_replace_to_many_stores_duplicates_once() {
    let blog = blog();
    let service = blog.context.service::<Article>().expect("service");

    let ids = RelationshipIds::to_many(["2", "2", "3"]);
    service
        .set_relationship(&2, "tags", ids, &mut RequestContext::new())
        .await
        .expect("set relationship");

    let stored = blog.repository.find::<Article>("2").expect("article 2");
    assert_eq!(stored.read().article_tags.len(), 2);
    assert_eq!(tag_ids(&blog, 2).await, vec!["2", "3"]);
}

#[tokio::test]
async fn test_add_to_many_to_many_skips_existing_joins() {
    let blog = blog();
    let service = blog.context.service::<Article>().expect("service");
    service
        .set_relationship(&1, "tags", RelationshipIds::to_many(["1"]), &mut RequestContext::new())
        .await
        .expect("tag article");
    blog.repository.clear_calls();

    let ids = BTreeSet::from(["1".to_string(), "2".to_string()]);
    service
        .add_to_to_many(&1, "tags", ids, &mut RequestContext::new())
        .await
        .expect("add without duplicate join");

    assert_eq!(blog.repository.count_of(Operation::AddToToMany), 1);
    assert_eq!(blog.repository.write_calls(), 1);
    assert_eq!(tag_ids(&blog, 1).await, vec!["1", "2"]);
}

#[tokio::test]
async fn test_add_only_existing_joins_writes_nothing() {
    let blog = blog();
    let service = blog.context.service::<Article>().expect("service");
    service
        .set_relationship(&1, "tags", RelationshipIds::to_many(["1"]), &mut RequestContext::new())
        .await
        .expect("tag article");
    blog.repository.clear_calls();

    service
        .add_to_to_many(&1, "tags", BTreeSet::from(["1".to_string()]), &mut RequestContext::new())
        .await
        .expect("add");

    assert_eq!(blog.repository.write_calls(), 0);
}

#[tokio::test]
async fn test_remove_from_to_many_checks_targets() {
    let blog = blog();
    let service = blog.context.service::<Article>().expect("service");

    let ids = BTreeSet::from(["1".to_string(), "99".to_string()]);
    let error = service
        .remove_from_to_many(&1, "tags", ids, &mut RequestContext::new())
        .await
        .unwrap_err();

    let JsonApiError::ResourcesInRelationshipsNotFound(missing) = error else {
        panic!("expected missing related resources");
    };
    assert_eq!(missing.len(), 1);
    assert_eq!(missing[0].id, "99");
    assert_eq!(blog.repository.count_of(Operation::RemoveFromToMany), 0);
}

#[tokio::test]
async fn test_relationship_errors() {
    let blog = blog();
    let service = blog.context.service::<Article>().expect("service");

    let error = service
        .get_secondary(&1, "reviewers", &mut RequestContext::new())
        .await
        .unwrap_err();
    assert_eq!(
        error,
        JsonApiError::RelationshipNotFound {
            relationship: "reviewers".into(),
            resource: "articles".into()
        }
    );

    let error = service
        .add_to_to_many(&1, "author", BTreeSet::from(["1".to_string()]), &mut RequestContext::new())
        .await
        .unwrap_err();
    assert_eq!(error.status(), 403);
}

#[tokio::test]
async fn test_secondary_endpoints() {
    let blog = blog();
    let people = blog.context.service::<Person>().expect("service");

    let mut request = RequestContext::new().with_query(&[("sort", "title")]);
    let articles = people
        .get_secondary(&1, "articles", &mut request)
        .await
        .expect("articles of person 1");
    let SecondaryResult::ToMany(articles) = articles else {
        panic!("expected a to-many result");
    };
    assert_eq!(articles.len(), 3);

    let service = blog.context.service::<Article>().expect("service");
    let author = service
        .get_relationship(&3, "author", &mut RequestContext::new())
        .await
        .expect("author of article 3");
    assert_eq!(author.ids(), vec!["1"]);

    let error = service
        .get_secondary(&77, "author", &mut RequestContext::new())
        .await
        .unwrap_err();
    assert_eq!(error.status(), 404);
}

#[tokio::test]
async fn test_delete_detaches_references() {
    let blog = blog();
    let service = blog.context.service::<Article>().expect("service");

    service.delete(&3, &mut RequestContext::new()).await.expect("delete");

    assert!(service.get(&3, &mut RequestContext::new()).await.is_err());
    let person = blog.repository.find::<Person>("1").expect("person");
    assert_eq!(person.read().articles.len(), 2);

    let error = service.delete(&3, &mut RequestContext::new()).await.unwrap_err();
    assert_eq!(error.status(), 404);
}

#[tokio::test]
async fn test_cancelled_request_issues_no_storage_calls() {
    let blog = blog();
    let service = blog.context.service::<Article>().expect("service");
    let token = CancellationToken::new();
    token.cancel();

    let mut request = RequestContext::new().with_cancellation(token);
    let error = service.get_all(&mut request).await.unwrap_err();

    assert_eq!(error, JsonApiError::Cancelled);
    assert!(blog.repository.calls().is_empty());
}

#[tokio::test]
async fn test_storage_failure_is_reported() {
    let blog = blog();
    let service = blog.context.service::<Article>().expect("service");
    blog.repository
        .fail_next(jsonapi_core::DataStoreError::Unavailable("connection reset".into()));

    let error = service.get_all(&mut RequestContext::new()).await.unwrap_err();
    assert_eq!(error.status(), 500);
    assert!(error.to_error_objects()[0].detail.is_none());
}

/// Drops articles whose title starts with "spam" before they are stored.
struct SpamFilter;

#[async_trait]
impl ResourceHooks<Article> for SpamFilter {
    async fn before_create(
        &self,
        entities: Vec<Shared<Article>>,
        _context: &HookContext,
    ) -> Result<Vec<Shared<Article>>, JsonApiError> {
        Ok(entities
            .into_iter()
            .filter(|a| !a.read().title.starts_with("spam"))
            .collect())
    }
}

#[tokio::test]
async fn test_hook_can_discard_create() {
    let mut hooks = HookRegistry::new();
    hooks.register::<Article, _>(SpamFilter);
    let blog = blog_with(hooks);
    let service = blog.context.service::<Article>().expect("service");

    let mut request = RequestContext::new().with_targeted(targeted(&blog, "articles", &["title"]));
    let article = Article {
        title: "spam offer".into(),
        ..Article::default()
    };
    let result = service.create(article, &mut request).await.expect("create");

    assert!(result.is_none());
    assert_eq!(blog.repository.count_of(Operation::Create), 0);
    assert_eq!(blog.repository.len_of::<Article>(), 3);
}

/// Hides the article titled "Lifetimes" and person 9 from every read.
struct ReadGate;

#[async_trait]
impl ResourceHooks<Article> for ReadGate {
    async fn after_read(
        &self,
        entities: Vec<Shared<Article>>,
        _context: &HookContext,
    ) -> Result<Vec<Shared<Article>>, JsonApiError> {
        Ok(entities.into_iter().filter(|a| a.read().title != "Lifetimes").collect())
    }
}

#[async_trait]
impl ResourceHooks<Person> for ReadGate {
    async fn after_read(
        &self,
        entities: Vec<Shared<Person>>,
        _context: &HookContext,
    ) -> Result<Vec<Shared<Person>>, JsonApiError> {
        Ok(entities.into_iter().filter(|p| p.read().id != 9).collect())
    }
}

fn gated_blog() -> Blog {
    let mut hooks = HookRegistry::new();
    hooks.register::<Article, _>(ReadGate).register::<Person, _>(ReadGate);
    blog_with(hooks)
}

#[tokio::test]
async fn test_secondary_read_drops_related_resources_filtered_by_hooks() {
    let blog = gated_blog();
    let people = blog.context.service::<Person>().expect("service");

    let articles = people
        .get_secondary(&1, "articles", &mut RequestContext::new())
        .await
        .expect("articles of person 1");
    assert_eq!(articles.ids(), vec!["1", "3"]);
}

#[tokio::test]
async fn test_secondary_read_of_hidden_primary_is_not_found() {
    let blog = gated_blog();
    blog.repository
        .seed(Person { id: 9, name: "Barbara".into(), ..Person::default() })
        .expect("seed person");
    let people = blog.context.service::<Person>().expect("service");

    let error = people
        .get_secondary(&9, "articles", &mut RequestContext::new())
        .await
        .unwrap_err();
    assert_eq!(error.status(), 404);
}
