//! Identifiers for domains, master caches and data caches
//!
//! Identifiers are immutable, compared by value and cheap to clone. A
//! `CacheHandle` addresses a data cache without keeping it alive; looking a
//! handle up after the cache expired simply reports absence.

use std::fmt;
use std::sync::Arc;

use serde::{Deserialize, Serialize};

use crate::cache::traits::{CacheOperationError, CacheResult};

macro_rules! name_id {
    ($(#[$meta:meta])* $name:ident, $what:literal) => {
        $(#[$meta])*
        #[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
        #[serde(transparent)]
        pub struct $name(Arc<str>);

        impl $name {
            /// Create identifier, panicking on an empty name
            pub fn new(name: impl AsRef<str>) -> Self {
                match Self::try_new(name) {
                    Ok(id) => id,
                    Err(e) => panic!("{}", e),
                }
            }

            /// Create identifier, rejecting an empty name
            pub fn try_new(name: impl AsRef<str>) -> CacheResult<Self> {
                let name = name.as_ref();
                if name.trim().is_empty() {
                    return Err(CacheOperationError::invalid_argument(concat!(
                        $what,
                        " must not be empty"
                    )));
                }
                Ok(Self(Arc::from(name)))
            }

            /// Identifier text
            #[inline]
            pub fn as_str(&self) -> &str {
                &self.0
            }
        }

        impl fmt::Display for $name {
            fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                f.write_str(&self.0)
            }
        }

        impl From<&str> for $name {
            fn from(name: &str) -> Self {
                Self::new(name)
            }
        }

        impl From<String> for $name {
            fn from(name: String) -> Self {
                Self::new(name)
            }
        }
    };
}

name_id!(
    /// Names an independent factory namespace, one per logical subsystem
    DomainCacheId,
    "domain cache id"
);

name_id!(
    /// Names one cache master within a domain
    MasterCacheId,
    "master cache id"
);

name_id!(
    /// Logical type name of a data cache within its master
    Typename,
    "typename"
);

impl MasterCacheId {
    /// Fresh random session identifier
    pub fn generate() -> Self {
        Self(Arc::from(uuid::Uuid::new_v4().to_string()))
    }
}

impl Typename {
    /// Typename derived from the Rust value type
    pub fn of<V: ?Sized>() -> Self {
        Self(Arc::from(std::any::type_name::<V>()))
    }
}

/// Names one data cache: owning master plus typename
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct DataCacheId {
    master: MasterCacheId,
    typename: Typename,
}

impl DataCacheId {
    pub fn new(master: MasterCacheId, typename: Typename) -> Self {
        Self { master, typename }
    }

    #[inline]
    pub fn master(&self) -> &MasterCacheId {
        &self.master
    }

    #[inline]
    pub fn typename(&self) -> &Typename {
        &self.typename
    }
}

impl fmt::Display for DataCacheId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}/{}", self.master, self.typename)
    }
}

/// Fully-qualified, non-owning address of a data cache
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct CacheHandle {
    master: MasterCacheId,
    data_cache: DataCacheId,
}

impl CacheHandle {
    pub fn new(data_cache: DataCacheId) -> Self {
        Self {
            master: data_cache.master().clone(),
            data_cache,
        }
    }

    #[inline]
    pub fn master(&self) -> &MasterCacheId {
        &self.master
    }

    #[inline]
    pub fn data_cache(&self) -> &DataCacheId {
        &self.data_cache
    }
}

impl fmt::Display for CacheHandle {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.data_cache)
    }
}
