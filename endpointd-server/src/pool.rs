//! Object pools shared by connection tasks.
//!
//! A [`Pool`] hands out exclusive objects wrapped in [`Pooled`] guards. The
//! guard resets the object and returns it to the pool when dropped, on every
//! exit path of the task that holds it.

use bytes::BytesMut;
use endpointd_protocol::EndpointBuilder;
use parking_lot::Mutex;
use std::fmt;
use std::ops::{Deref, DerefMut};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;

/// Buffers that grew past this capacity are released instead of retained.
pub const RETAINED_BUFFER_CAPACITY: usize = 1024 * 1024;

/// Default number of idle objects kept per pool.
pub const DEFAULT_MAX_IDLE: usize = 256;

/// Returns an object to a reusable state.
pub trait Reset {
    fn reset(&mut self);
}

impl Reset for EndpointBuilder {
    fn reset(&mut self) {
        EndpointBuilder::reset(self);
    }
}

impl Reset for BytesMut {
    fn reset(&mut self) {
        if self.capacity() > RETAINED_BUFFER_CAPACITY {
            *self = BytesMut::new();
        } else {
            self.clear();
        }
    }
}

struct Inner<T> {
    idle: Mutex<Vec<T>>,
    create: Box<dyn Fn() -> T + Send + Sync>,
    max_idle: usize,
    created: AtomicUsize,
}

/// A pool of reusable objects of one type.
pub struct Pool<T> {
    inner: Arc<Inner<T>>,
}

impl<T> Clone for Pool<T> {
    fn clone(&self) -> Self {
        Self {
            inner: self.inner.clone(),
        }
    }
}

impl<T> fmt::Debug for Pool<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Pool")
            .field("idle", &self.inner.idle.lock().len())
            .field("created", &self.inner.created.load(Ordering::Relaxed))
            .field("max_idle", &self.inner.max_idle)
            .finish()
    }
}

impl<T: Reset> Pool<T> {
    /// Creates a pool that builds new objects with `create` when empty.
    pub fn new<F>(max_idle: usize, create: F) -> Self
    where
        F: Fn() -> T + Send + Sync + 'static,
    {
        Self {
            inner: Arc::new(Inner {
                idle: Mutex::new(Vec::new()),
                create: Box::new(create),
                max_idle,
                created: AtomicUsize::new(0),
            }),
        }
    }

    /// Takes an idle object, or creates one if none is available.
    pub fn acquire(&self) -> Pooled<T> {
        let item = self.inner.idle.lock().pop();
        let item = match item {
            Some(item) => item,
            None => {
                self.inner.created.fetch_add(1, Ordering::Relaxed);
                (self.inner.create)()
            }
        };
        Pooled {
            item: Some(item),
            inner: self.inner.clone(),
        }
    }

    /// Number of objects waiting in the pool.
    pub fn idle(&self) -> usize {
        self.inner.idle.lock().len()
    }

    /// Number of objects created since the pool was built.
    pub fn created(&self) -> usize {
        self.inner.created.load(Ordering::Relaxed)
    }
}

impl Pool<EndpointBuilder> {
    /// Pool of serialization builders.
    pub fn builders() -> Self {
        Self::new(DEFAULT_MAX_IDLE, EndpointBuilder::new)
    }
}

impl Pool<BytesMut> {
    /// Pool of frame read buffers.
    pub fn buffers() -> Self {
        Self::new(DEFAULT_MAX_IDLE, BytesMut::new)
    }
}

/// An object borrowed from a [`Pool`].
pub struct Pooled<T: Reset> {
    item: Option<T>,
    inner: Arc<Inner<T>>,
}

impl<T: Reset> Deref for Pooled<T> {
    type Target = T;

    fn deref(&self) -> &T {
        self.item.as_ref().expect("pooled object present until drop")
    }
}

impl<T: Reset> DerefMut for Pooled<T> {
    fn deref_mut(&mut self) -> &mut T {
        self.item.as_mut().expect("pooled object present until drop")
    }
}

impl<T: Reset> Drop for Pooled<T> {
    fn drop(&mut self) {
        if let Some(mut item) = self.item.take() {
            item.reset();
            let mut idle = self.inner.idle.lock();
            if idle.len() < self.inner.max_idle {
                idle.push(item);
            }
        }
    }
}
