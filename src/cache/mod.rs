//! Rendered-page caching: the cache variants, their policy and the HTTP layer.

pub mod middleware;
pub mod pages;
pub mod policy;

pub use middleware::page_cache_layer;
pub use pages::{CacheMiss, NoCaching, PageCache, PermanentCache};
pub use policy::CachePolicy;
