//! Persistence for sales orders: query construction, row folding, store
//! sessions and the order repository.

pub mod config;
pub mod query;
pub mod repository;
pub mod row_mapper;
pub mod store;

pub use config::{ConfigError, StoreConfig};
pub use query::{OrderFilter, Page, Pagination};
pub use repository::{ErrorKind, OrderRepository, RepositoryError};
pub use row_mapper::{JoinedRow, MappedOrders, RowMapError};
pub use store::{
    ConnectionProvider, InMemoryOrderStore, OrderSession, PostgresOrderStore, StoreError,
};
