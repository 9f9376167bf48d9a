//! Cache client trait

use async_trait::async_trait;
use tenantio_common::Result;

/// String key-value API of a distributed cache driver.
///
/// Keys are byte-exact; drivers must not normalize or namespace them.
/// Failures map to [`tenantio_common::Error::Cache`] or
/// [`tenantio_common::Error::CacheUnavailable`]; retry policy is the
/// caller's concern.
#[async_trait]
pub trait DistributedCache: Send + Sync {
    /// Driver name for diagnostics
    fn name(&self) -> &str;

    /// Read the value stored at `key`, if any
    async fn get_string(&self, key: &str) -> Result<Option<String>>;

    /// Store `value` at `key`, overwriting any previous value
    async fn set_string(&self, key: &str, value: &str) -> Result<()>;
}
