//! The process-wide schema and its lock discipline.
//!
//! Readers take the read side of an `RwLock` and always see a complete
//! schema. Mutations are serialized by a separate async mutex; only the
//! holder of that mutex can publish a new schema, and publishing is a single
//! write-lock swap.

use parking_lot::{RwLock, RwLockReadGuard};
use tokio::sync::{Mutex, MutexGuard};

use strand_core::{Context, Result, Schema, StrandError};

pub struct SchemaHandle {
    current: RwLock<Schema>,
    mutation: Mutex<()>,
}

/// Exclusive right to mutate the schema. Released on drop.
pub struct SchemaLockGuard<'a> {
    handle: &'a SchemaHandle,
    _guard: MutexGuard<'a, ()>,
}

impl SchemaHandle {
    pub fn new(schema: Schema) -> Self {
        Self {
            current: RwLock::new(schema),
            mutation: Mutex::new(()),
        }
    }

    /// Read access to the published schema. Do not hold across an await.
    pub fn read(&self) -> RwLockReadGuard<'_, Schema> {
        self.current.read()
    }

    /// A copy of the published schema.
    pub fn snapshot(&self) -> Schema {
        self.current.read().clone()
    }

    /// Wait for the mutation lock, giving up if `ctx` is canceled first.
    pub async fn lock_schema(&self, ctx: &Context) -> Result<SchemaLockGuard<'_>> {
        let guard = ctx
            .run(async { Ok::<_, StrandError>(self.mutation.lock().await) })
            .await?;
        Ok(SchemaLockGuard {
            handle: self,
            _guard: guard,
        })
    }
}

impl SchemaLockGuard<'_> {
    pub fn current(&self) -> Schema {
        self.handle.snapshot()
    }

    /// Replace the published schema.
    pub fn publish(&self, schema: Schema) {
        *self.handle.current.write() = schema;
    }
}
