//! strand-core: Shared types, configuration, and error handling for Strand.
//!
//! This crate provides the foundational types used across all Strand components:
//! - Schema model (kinds, classes, properties) shared by the schema manager and connectors
//! - Entity types (Thing, Action) and their list/get response shapes
//! - Meta (statistical analysis) request and result types
//! - The cancellable request `Context`
//! - Configuration management
//! - Common error types

pub mod config;
pub mod context;
pub mod entity;
pub mod error;
pub mod meta;
pub mod types;

pub use context::{CancelHandle, Context};
pub use entity::{
    Action, ActionGetResponse, ActionsListResponse, Pagination, PropertyMap, PropertyValue, ScalarValue,
    Thing, ThingGetResponse, ThingsListResponse,
};
pub use error::{ErrorKind, Result, StrandError};
pub use meta::{MetaProperty, MetaResult, Occurrence, PropertyMeta, StatisticalAnalysis};
pub use types::{Class, DataType, Kind, Principal, Property, Schema, SemanticSchema};
