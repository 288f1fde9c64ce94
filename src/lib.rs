pub mod adapter;
pub mod config;
pub mod driver;
pub mod error;
pub mod hydrate;
pub mod request;
pub mod value;

pub use adapter::{
    DriverRegistry, Fetch, Fields, Instances, Join, JoinSpec, Output, OutputMode, QueryOptions,
    Session, SqlAdapter,
};
pub use config::{ConfigSource, InstanceConfig};
pub use error::{ErrorCategory, Result, SqlError};
pub use hydrate::{Entity, IdentityCache, Record, Repository};
pub use request::{
    Condition, DeleteRequest, InsertRequest, SelectCursor, SelectRequest, Selection, Term,
    UpdateRequest,
};
pub use value::{Row, Value};
