//! Scoped access to the engine behind [`KvsBackend`].

use std::ops::{Deref, DerefMut};

use kvs_engine::{KvsBackend, KvsHandle};
use kvs_error::Result;
use tracing::debug;

use crate::params::KvsParameters;

/// An open handle owned by one scenario run. Released on drop, on every
/// exit path. Dropping never flushes.
pub struct KvsSession {
    handle: Box<dyn KvsHandle>,
    backend: &'static str,
}

impl KvsSession {
    pub fn open(backend: &dyn KvsBackend, params: &KvsParameters) -> Result<Self> {
        let handle = backend.open(&params.open_options())?;
        debug!(
            backend = backend.name(),
            instance_id = params.instance_id.0,
            "kvs handle acquired"
        );
        Ok(Self {
            handle,
            backend: backend.name(),
        })
    }
}

impl Deref for KvsSession {
    type Target = dyn KvsHandle;

    fn deref(&self) -> &Self::Target {
        self.handle.as_ref()
    }
}

impl DerefMut for KvsSession {
    fn deref_mut(&mut self) -> &mut Self::Target {
        self.handle.as_mut()
    }
}

impl Drop for KvsSession {
    fn drop(&mut self) {
        debug!(
            backend = self.backend,
            instance_id = self.handle.instance_id().0,
            "kvs handle released"
        );
    }
}
