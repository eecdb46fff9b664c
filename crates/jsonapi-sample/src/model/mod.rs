//! Plain models exposed as JSON:API resources.
//!
//! Models hold related entities behind [`Shared`](jsonapi_core::Shared) handles and
//! know nothing about the resource graph. The graph is declared separately in
//! [`crate::lifecycle::build_graph`].

/// Implements [`Identifiable`](jsonapi_core::Identifiable) for models with an `id` field.
macro_rules! identifiable {
    ($id:ty => $($model:ty),+ $(,)?) => {
        $(impl jsonapi_core::Identifiable for $model {
            type Id = $id;

            fn id(&self) -> $id {
                self.id.clone()
            }

            fn set_id(&mut self, id: $id) {
                self.id = id;
            }
        })+
    };
}

pub mod blog;
pub mod dealership;

pub use blog::*;
pub use dealership::*;
