// Copyright 2024, The Tari Project
//
// Redistribution and use in source and binary forms, with or without modification, are permitted provided that the
// following conditions are met:
//
// 1. Redistributions of source code must retain the above copyright notice, this list of conditions and the following
// disclaimer.
//
// 2. Redistributions in binary form must reproduce the above copyright notice, this list of conditions and the
// following disclaimer in the documentation and/or other materials provided with the distribution.
//
// 3. Neither the name of the copyright holder nor the names of its contributors may be used to endorse or promote
// products derived from this software without specific prior written permission.
//
// THIS SOFTWARE IS PROVIDED BY THE COPYRIGHT HOLDERS AND CONTRIBUTORS "AS IS" AND ANY EXPRESS OR IMPLIED WARRANTIES,
// INCLUDING, BUT NOT LIMITED TO, THE IMPLIED WARRANTIES OF MERCHANTABILITY AND FITNESS FOR A PARTICULAR PURPOSE ARE
// DISCLAIMED. IN NO EVENT SHALL THE COPYRIGHT HOLDER OR CONTRIBUTORS BE LIABLE FOR ANY DIRECT, INDIRECT, INCIDENTAL,
// SPECIAL, EXEMPLARY, OR CONSEQUENTIAL DAMAGES (INCLUDING, BUT NOT LIMITED TO, PROCUREMENT OF SUBSTITUTE GOODS OR
// SERVICES; LOSS OF USE, DATA, OR PROFITS; OR BUSINESS INTERRUPTION) HOWEVER CAUSED AND ON ANY THEORY OF LIABILITY,
// WHETHER IN CONTRACT, STRICT LIABILITY, OR TORT (INCLUDING NEGLIGENCE OR OTHERWISE) ARISING IN ANY WAY OUT OF THE
// USE OF THIS SOFTWARE, EVEN IF ADVISED OF THE POSSIBILITY OF SUCH DAMAGE.

//! LMDB-backed implementation of [KeyValueStore].
//!
//! An [LMDBStore] owns one LMDB environment containing any number of named databases. Each named database is
//! reached through an [LMDBDatabase] handle, which is cheap to clone and keeps the environment open for as long as
//! it lives.
//!
//! ```no_run
//! # use tari_storage::lmdb_store::LMDBBuilder;
//! let store = LMDBBuilder::new()
//!     .set_path("/tmp/provider/")
//!     .set_environment_size(64)
//!     .add_database("provider")
//!     .build()
//!     .unwrap();
//! let db = store.get_handle("provider").unwrap();
//! ```

mod error;
pub use error::LMDBError;

use std::{
    collections::HashMap,
    fs,
    path::{Path, PathBuf},
    sync::Arc,
};

use lmdb_zero as lmdb;
use lmdb_zero::{LmdbResultExt, ReadTransaction, WriteTransaction};
use log::*;

use crate::key_val_store::{IterationResult, KeyValStoreError, KeyValueStore};

const LOG_TARGET: &str = "storage::lmdb";

/// Builds an [LMDBStore]. The default values for the environment are:
///
/// | Parameter | Default  |
/// |:----------|----------|
/// | path      | ./store/ |
/// | size      | 64 MB    |
/// | max DBs   | 8        |
/// | named DBs | none     |
pub struct LMDBBuilder {
    path: PathBuf,
    env_size_mb: usize,
    max_dbs: usize,
    db_names: Vec<String>,
}

impl LMDBBuilder {
    pub fn new() -> Self {
        Self {
            path: PathBuf::from("./store/"),
            env_size_mb: 64,
            max_dbs: 8,
            db_names: Vec::new(),
        }
    }

    /// Set the directory where the LMDB environment exists, or must be created. Missing directories are created by
    /// `build()`.
    pub fn set_path<P: AsRef<Path>>(mut self, path: P) -> Self {
        self.path = path.as_ref().to_path_buf();
        self
    }

    /// Sets the size of the environment, in MB. The memory map is only set up when `build()` is called.
    pub fn set_environment_size(mut self, size_mb: usize) -> Self {
        self.env_size_mb = size_mb;
        self
    }

    pub fn set_max_number_of_databases(mut self, max_dbs: usize) -> Self {
        self.max_dbs = max_dbs;
        self
    }

    /// Add a named database to the environment. It is created if it does not exist yet.
    pub fn add_database(mut self, name: &str) -> Self {
        self.db_names.push(name.to_string());
        self
    }

    /// Open the environment and every named database.
    pub fn build(self) -> Result<LMDBStore, LMDBError> {
        fs::create_dir_all(&self.path)?;
        let path = self.path.to_str().ok_or(LMDBError::InvalidPath)?;
        let max_dbs = self.max_dbs.max(self.db_names.len());

        let env = unsafe {
            let mut builder = lmdb::EnvBuilder::new()?;
            builder.set_mapsize(self.env_size_mb * 1024 * 1024)?;
            builder.set_maxdbs(max_dbs as u32)?;
            builder.open(path, lmdb::open::Flags::empty(), 0o600)?
        };
        let env = Arc::new(env);
        debug!(
            target: LOG_TARGET,
            "Opened LMDB environment at '{}' ({} MB, {} named database(s))",
            path,
            self.env_size_mb,
            self.db_names.len()
        );

        let mut databases = HashMap::with_capacity(self.db_names.len());
        for name in self.db_names {
            let db = lmdb::Database::open(
                env.clone(),
                Some(name.as_str()),
                &lmdb::DatabaseOptions::new(lmdb::db::CREATE),
            )?;
            databases.insert(name.clone(), LMDBDatabase {
                name,
                env: env.clone(),
                db: Arc::new(db),
            });
        }

        Ok(LMDBStore { env, databases })
    }
}

impl Default for LMDBBuilder {
    fn default() -> Self {
        Self::new()
    }
}

/// An open LMDB environment and its named databases. Create one with [LMDBBuilder].
pub struct LMDBStore {
    env: Arc<lmdb::Environment>,
    databases: HashMap<String, LMDBDatabase>,
}

impl LMDBStore {
    /// Returns a handle to the named database.
    pub fn get_handle(&self, name: &str) -> Result<LMDBDatabase, LMDBError> {
        self.databases
            .get(name)
            .cloned()
            .ok_or_else(|| LMDBError::UnknownDatabase(name.to_string()))
    }

    /// Flush all pending writes to disk.
    pub fn flush(&self) -> Result<(), LMDBError> {
        self.env.sync(true)?;
        Ok(())
    }
}

/// Handle to a single named database within an LMDB environment.
#[derive(Clone)]
pub struct LMDBDatabase {
    name: String,
    env: Arc<lmdb::Environment>,
    db: Arc<lmdb::Database<'static>>,
}

impl LMDBDatabase {
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Returns the number of records in this database.
    pub fn len(&self) -> Result<usize, LMDBError> {
        let txn = ReadTransaction::new(self.env.clone())?;
        let stat = txn.db_stat(&self.db)?;
        Ok(stat.entries)
    }

    pub fn is_empty(&self) -> Result<bool, LMDBError> {
        Ok(self.len()? == 0)
    }

    fn read_prefix(&self, prefix: &[u8]) -> Result<Vec<(Vec<u8>, Vec<u8>)>, LMDBError> {
        let txn = ReadTransaction::new(self.env.clone())?;
        let access = txn.access();
        let mut cursor = txn.cursor(self.db.clone())?;

        let mut entries = Vec::new();
        let mut current = if prefix.is_empty() {
            cursor.first::<[u8], [u8]>(&access).to_opt()?
        } else {
            cursor.seek_range_k::<[u8], [u8]>(&access, prefix).to_opt()?
        };
        while let Some((key, value)) = current {
            if !key.starts_with(prefix) {
                break;
            }
            entries.push((key.to_vec(), value.to_vec()));
            current = cursor.next::<[u8], [u8]>(&access).to_opt()?;
        }
        Ok(entries)
    }
}

impl KeyValueStore for LMDBDatabase {
    fn insert(&self, key: &[u8], value: &[u8]) -> Result<(), KeyValStoreError> {
        let txn = WriteTransaction::new(self.env.clone()).map_err(LMDBError::from)?;
        {
            let mut access = txn.access();
            access
                .put(&*self.db, key, value, lmdb::put::Flags::empty())
                .map_err(LMDBError::from)?;
        }
        txn.commit().map_err(LMDBError::from)?;
        Ok(())
    }

    fn get(&self, key: &[u8]) -> Result<Option<Vec<u8>>, KeyValStoreError> {
        let txn = ReadTransaction::new(self.env.clone()).map_err(LMDBError::from)?;
        let access = txn.access();
        let value = access
            .get::<[u8], [u8]>(&*self.db, key)
            .to_opt()
            .map_err(LMDBError::from)?
            .map(|v| v.to_vec());
        Ok(value)
    }

    fn delete(&self, key: &[u8]) -> Result<(), KeyValStoreError> {
        let txn = WriteTransaction::new(self.env.clone()).map_err(LMDBError::from)?;
        {
            let mut access = txn.access();
            // NOTFOUND maps to None: deleting a missing key is not an error
            access.del_key(&*self.db, key).to_opt().map_err(LMDBError::from)?;
        }
        txn.commit().map_err(LMDBError::from)?;
        Ok(())
    }

    fn for_each_with_prefix<F>(&self, prefix: &[u8], mut f: F) -> Result<(), KeyValStoreError>
    where F: FnMut((Vec<u8>, Vec<u8>)) -> IterationResult {
        for pair in self.read_prefix(prefix)? {
            if f(pair) == IterationResult::Break {
                break;
            }
        }
        Ok(())
    }
}
