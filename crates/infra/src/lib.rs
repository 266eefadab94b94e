//! Infrastructure layer: repository ports and their in-memory and Postgres
//! adapters.

pub mod error;
pub mod memory;
pub mod postgres;
pub mod repository;

#[cfg(test)]
mod integration_tests;

pub use error::{RepoResult, RepositoryError};
pub use memory::MemoryStore;
pub use postgres::{create_pool, PostgresStore};
pub use repository::{
    CartRepository, Mutation, OrderRepository, ProductRepository, ReviewRepository, Store, UserRepository,
    WishlistRepository,
};
