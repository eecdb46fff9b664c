//! Blog models: people write articles, articles carry tags through [`ArticleTag`].

use jsonapi_core::{shared, Shared};

/// An author. People can befriend each other, which makes the graph cyclic.
#[derive(Debug, Clone, Default)]
pub struct Person {
    pub id: i64,
    pub name: String,
    /// Soft-delete marker; hidden from every query by [`crate::definitions::HideDeletedPeople`].
    pub deleted: bool,
    pub articles: Vec<Shared<Article>>,
    pub friends: Vec<Shared<Person>>,
}

impl Person {
    pub fn new(id: i64, name: impl Into<String>) -> Self {
        Self {
            id,
            name: name.into(),
            ..Self::default()
        }
    }

    /// An id-only reference, as used in relationship assignments.
    pub fn stub(id: i64) -> Shared<Person> {
        shared(Person {
            id,
            ..Self::default()
        })
    }
}

#[derive(Debug, Clone, Default)]
pub struct Article {
    pub id: i64,
    pub title: String,
    pub author: Option<Shared<Person>>,
    pub article_tags: Vec<Shared<ArticleTag>>,
}

impl Article {
    pub fn new(id: i64, title: impl Into<String>) -> Self {
        Self {
            id,
            title: title.into(),
            ..Self::default()
        }
    }

    pub fn written_by(mut self, author: i64) -> Self {
        self.author = Some(Person::stub(author));
        self
    }

    pub fn stub(id: i64) -> Shared<Article> {
        shared(Article {
            id,
            ..Self::default()
        })
    }
}

#[derive(Debug, Clone, Default)]
pub struct Tag {
    pub id: i64,
    pub name: String,
    pub article_tags: Vec<Shared<ArticleTag>>,
}

impl Tag {
    pub fn new(id: i64, name: impl Into<String>) -> Self {
        Self {
            id,
            name: name.into(),
            ..Self::default()
        }
    }

    pub fn stub(id: i64) -> Shared<Tag> {
        shared(Tag {
            id,
            ..Self::default()
        })
    }
}

/// Join row behind `articles.tags` and `tags.articles`.
#[derive(Debug, Clone, Default)]
pub struct ArticleTag {
    pub id: i64,
    pub article: Option<Shared<Article>>,
    pub tag: Option<Shared<Tag>>,
}

identifiable!(i64 => Person, Article, Tag, ArticleTag);
