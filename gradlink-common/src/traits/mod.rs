// File: gradlink-common/src/traits/mod.rs
pub mod api;

pub use api::{NotificationSink, ObjectStore, TokenVerifier, UserDirectory};
pub use api::{
    MockNotificationSink, MockObjectStore, MockTokenVerifier, MockUserDirectory,
};
