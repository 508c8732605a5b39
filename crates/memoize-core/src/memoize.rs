//! The memoizing wrapper.
//!
//! [`Memoize`] holds configuration without a function; [`Memoize::wrap`]
//! binds one and yields a [`Memoized`], which owns the in-memory tier and,
//! when persistent, a [`DiskStore`].
//!
//! Lookup order is memory, then disk. A disk hit is not promoted into
//! memory, so repeated calls served from disk keep reporting
//! [`Source::Disk`] until the function runs again in this process.

use std::collections::HashMap;
use std::fmt;
use std::marker::PhantomData;
use std::path::PathBuf;

use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use tracing::{debug, info, warn};

use crate::args::Args;
use crate::codec::{Codec, JsonCodec};
use crate::config::MemoizeConfig;
use crate::error::{MemoizeError, MemoizeResult};
use crate::key::{derive_key, KeyDigest};
use crate::store::DiskStore;

/// Tier that produced a call's result.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Source {
    Memory,
    Disk,
    /// Cache miss; the wrapped function ran.
    Function,
}

impl Source {
    pub fn as_str(&self) -> &'static str {
        match self {
            Source::Memory => "memory",
            Source::Disk => "disk",
            Source::Function => "function",
        }
    }
}

impl fmt::Display for Source {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Result of a call together with its key and source.
#[derive(Clone, Debug, PartialEq)]
pub struct Traced<R> {
    pub value: R,
    pub key: String,
    pub source: Source,
}

impl<R> Traced<R> {
    pub fn into_parts(self) -> (R, String, Source) {
        (self.value, self.key, self.source)
    }
}

/// Configured wrapper that has no function yet.
///
/// ```
/// use memoize_core::{Args, Memoize};
///
/// let dir = tempfile::tempdir().unwrap();
/// let mut add = Memoize::new()
///     .persistent(true)
///     .key("persistent-add")
///     .folder(dir.path().join(".memoize"))
///     .wrap("add", |args: Args| {
///         args.value::<i64>(0).unwrap() + args.value::<i64>(1).unwrap()
///     })
///     .unwrap();
///
/// assert_eq!(add.call(Args::new().push(1).push(2)).unwrap(), 3);
/// assert!(dir.path().join(".memoize").join("persistent-add").is_file());
/// ```
#[derive(Clone, Debug, Default)]
pub struct Memoize<C = JsonCodec> {
    config: MemoizeConfig,
    codec: C,
}

impl Memoize<JsonCodec> {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn from_config(config: MemoizeConfig) -> Self {
        Self {
            config,
            codec: JsonCodec,
        }
    }
}

impl<C: Codec + Clone> Memoize<C> {
    pub fn key(mut self, key: impl Into<String>) -> Self {
        self.config.key = Some(key.into());
        self
    }

    pub fn persistent(mut self, persistent: bool) -> Self {
        self.config.persistent = persistent;
        self
    }

    pub fn lazy(mut self, lazy: bool) -> Self {
        self.config.lazy = lazy;
        self
    }

    pub fn debug(mut self, debug: bool) -> Self {
        self.config.debug = debug;
        self
    }

    pub fn folder(mut self, folder: impl Into<PathBuf>) -> Self {
        self.config.folder = folder.into();
        self
    }

    pub fn digest(mut self, digest: KeyDigest) -> Self {
        self.config.digest = digest;
        self
    }

    /// Swap the serialization collaborator.
    pub fn codec<D: Codec + Clone>(self, codec: D) -> Memoize<D> {
        Memoize {
            config: self.config,
            codec,
        }
    }

    pub fn config(&self) -> &MemoizeConfig {
        &self.config
    }

    /// Bind `fnc` under `name`, carrying over all configuration.
    ///
    /// `name` identifies the function in derived keys; keep it stable to
    /// reuse persisted results across runs.
    pub fn wrap<F, R>(
        &self,
        name: impl Into<String>,
        fnc: F,
    ) -> MemoizeResult<Memoized<F, R, C>>
    where
        F: FnMut(Args) -> R,
        R: Serialize + DeserializeOwned,
    {
        Memoized::with_codec(name, fnc, self.config.clone(), self.codec.clone())
    }
}

/// A function bound to its memoization cache.
pub struct Memoized<F, R, C = JsonCodec> {
    name: String,
    fnc: F,
    config: MemoizeConfig,
    codec: C,
    store: Option<DiskStore>,
    /// Cache key -> encoded return value.
    cache: HashMap<String, Vec<u8>>,
    latest_source: Option<Source>,
    _result: PhantomData<fn() -> R>,
}

impl<F, R> Memoized<F, R, JsonCodec>
where
    F: FnMut(Args) -> R,
    R: Serialize + DeserializeOwned,
{
    /// Memory-only memoization with default settings.
    pub fn new(name: impl Into<String>, fnc: F) -> MemoizeResult<Self> {
        Self::with_config(name, fnc, MemoizeConfig::default())
    }

    pub fn with_config(
        name: impl Into<String>,
        fnc: F,
        config: MemoizeConfig,
    ) -> MemoizeResult<Self> {
        Self::with_codec(name, fnc, config, JsonCodec)
    }
}

impl<F, R, C> Memoized<F, R, C>
where
    F: FnMut(Args) -> R,
    R: Serialize + DeserializeOwned,
    C: Codec,
{
    /// Validates `config` and, when persistent, creates the storage folder.
    pub fn with_codec(
        name: impl Into<String>,
        fnc: F,
        config: MemoizeConfig,
        codec: C,
    ) -> MemoizeResult<Self> {
        config.validate()?;
        let store = if config.persistent {
            Some(DiskStore::open(&config.folder)?)
        } else {
            None
        };

        let name = name.into();
        debug!(
            function = %name,
            persistent = config.persistent,
            lazy = config.lazy,
            folder = %config.folder.display(),
            "memoized function created"
        );

        Ok(Self {
            name,
            fnc,
            config,
            codec,
            store,
            cache: HashMap::new(),
            latest_source: None,
            _result: PhantomData,
        })
    }

    /// Return the cached result for `args`, or run the function and cache it.
    pub fn call(&mut self, args: Args) -> MemoizeResult<R> {
        self.call_traced(args).map(|traced| traced.value)
    }

    /// Like [`call`](Self::call), also reporting the key and the source.
    pub fn call_traced(&mut self, args: Args) -> MemoizeResult<Traced<R>> {
        let key = self.key_for(&args)?;

        if let Some((value, source)) = self.read_cache(&key)? {
            self.log_call(&key, source);
            return Ok(Traced { value, key, source });
        }

        let args = if self.config.lazy {
            args.resolve_lazy()
        } else {
            args
        };
        let computed = (self.fnc)(args);
        let value = self.write_cache(&key, &computed)?;

        self.log_call(&key, Source::Function);
        Ok(Traced {
            value,
            key,
            source: Source::Function,
        })
    }

    /// Drop every cached result, including the storage folder when
    /// persistent. Unrecoverable.
    pub fn clear(&mut self) -> MemoizeResult<()> {
        if let Some(store) = &self.store {
            store.remove_all()?;
        }
        self.init_cache()?;
        info!(
            function = %self.name,
            persistent = self.config.persistent,
            "memoization cache cleared"
        );
        Ok(())
    }

    /// Key a call with `args` would use. Does not run anything.
    pub fn key_for(&self, args: &Args) -> MemoizeResult<String> {
        match &self.config.key {
            Some(key) => Ok(key.clone()),
            None => derive_key(&self.name, args, self.config.digest),
        }
    }

    /// Whether a call with `args` would be served from a cache tier.
    pub fn is_cached(&self, args: &Args) -> MemoizeResult<bool> {
        let key = self.key_for(args)?;
        if self.cache.contains_key(&key) {
            return Ok(true);
        }
        Ok(self.store.as_ref().is_some_and(|store| store.contains(&key)))
    }

    /// Source of the most recent lookup, `None` before the first call and
    /// after [`clear`](Self::clear).
    pub fn last_source(&self) -> Option<Source> {
        self.latest_source
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn config(&self) -> &MemoizeConfig {
        &self.config
    }

    /// Number of entries in the in-memory tier.
    pub fn memory_len(&self) -> usize {
        self.cache.len()
    }

    /// Keys persisted in the storage folder; empty when not persistent.
    pub fn stored_keys(&self) -> MemoizeResult<Vec<String>> {
        match &self.store {
            Some(store) => store.keys(),
            None => Ok(Vec::new()),
        }
    }

    /// The configuration of this wrapper without its function, ready to
    /// wrap another one.
    pub fn unbound(&self) -> Memoize<C>
    where
        C: Clone,
    {
        Memoize {
            config: self.config.clone(),
            codec: self.codec.clone(),
        }
    }

    fn init_cache(&mut self) -> MemoizeResult<()> {
        self.cache = HashMap::new();
        self.latest_source = None;
        if let Some(store) = &self.store {
            store.ensure_folder()?;
        }
        Ok(())
    }

    fn read_cache(&mut self, key: &str) -> MemoizeResult<Option<(R, Source)>> {
        if let Some(blob) = self.cache.get(key) {
            self.latest_source = Some(Source::Memory);
            let value = self.codec.decode(blob)?;
            return Ok(Some((value, Source::Memory)));
        }

        if let Some(store) = &self.store {
            if let Some(bytes) = store.read(key)? {
                self.latest_source = Some(Source::Disk);
                let value = self.codec.decode(&bytes).map_err(|e| {
                    warn!(
                        key,
                        path = %store.path_for(key).display(),
                        error = %e,
                        "persisted cache entry could not be decoded"
                    );
                    e
                })?;
                return Ok(Some((value, Source::Disk)));
            }
        }

        self.latest_source = Some(Source::Function);
        Ok(None)
    }

    /// Store `value` in both tiers and return it as a later hit would see it.
    ///
    /// The blob is decoded before anything is stored, so a value the codec
    /// cannot represent (e.g. a non-finite float in JSON) fails here instead
    /// of poisoning every later lookup.
    fn write_cache(&mut self, key: &str, value: &R) -> MemoizeResult<R> {
        let blob = self.codec.encode(value)?;
        let stored: R = self
            .codec
            .decode(&blob)
            .map_err(|e| MemoizeError::Serialization {
                message: format!("return value does not survive encoding: {}", e),
            })?;
        self.cache.insert(key.to_string(), blob);

        if let Some(store) = &self.store {
            store.write_if_absent(key, &self.cache[key])?;
        }
        Ok(stored)
    }

    fn log_call(&self, key: &str, source: Source) {
        if self.config.debug {
            info!(function = %self.name, key, source = %source, "memoized call");
        } else {
            debug!(function = %self.name, key, source = %source, "memoized call");
        }
    }
}

impl<F, R, C> fmt::Debug for Memoized<F, R, C> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Memoized")
            .field("name", &self.name)
            .field("config", &self.config)
            .field("memory_entries", &self.cache.len())
            .field("latest_source", &self.latest_source)
            .finish_non_exhaustive()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::cell::Cell;
    use std::rc::Rc;
    use tempfile::TempDir;

    fn counted_add(calls: Rc<Cell<u32>>) -> impl FnMut(Args) -> i64 {
        move |args: Args| {
            calls.set(calls.get() + 1);
            args.value::<i64>(0).unwrap() + args.value::<i64>(1).unwrap()
        }
    }

    fn one_two() -> Args {
        Args::new().push(1).push(2)
    }

    #[test]
    fn test_second_call_hits_memory() {
        let calls = Rc::new(Cell::new(0));
        let mut add = Memoized::new("add", counted_add(calls.clone())).unwrap();

        assert_eq!(add.last_source(), None);
        assert_eq!(add.call(one_two()).unwrap(), 3);
        assert_eq!(add.last_source(), Some(Source::Function));
        assert_eq!(add.call(one_two()).unwrap(), 3);
        assert_eq!(add.last_source(), Some(Source::Memory));
        assert_eq!(calls.get(), 1);
        assert_eq!(add.memory_len(), 1);
    }

    #[test]
    fn test_clear_forces_recompute() {
        let calls = Rc::new(Cell::new(0));
        let mut add = Memoized::new("add", counted_add(calls.clone())).unwrap();

        add.call(one_two()).unwrap();
        add.clear().unwrap();
        assert_eq!(add.memory_len(), 0);
        assert_eq!(add.last_source(), None);

        let traced = add.call_traced(one_two()).unwrap();
        assert_eq!(traced.value, 3);
        assert_eq!(traced.source, Source::Function);
        assert_eq!(calls.get(), 2);
    }

    #[test]
    fn test_traced_reports_key() {
        let mut add = Memoized::new("add", counted_add(Rc::new(Cell::new(0)))).unwrap();
        let expected = add.key_for(&one_two()).unwrap();

        let (value, key, source) = add.call_traced(one_two()).unwrap().into_parts();
        assert_eq!((value, source), (3, Source::Function));
        assert_eq!(key, expected);

        let again = add.call_traced(one_two()).unwrap();
        assert_eq!(again.key, expected);
        assert_eq!(again.source, Source::Memory);
    }

    #[test]
    fn test_explicit_key_is_shared_by_all_arguments() {
        let calls = Rc::new(Cell::new(0));
        let config = MemoizeConfig {
            key: Some("fixed".to_string()),
            ..Default::default()
        };
        let mut add = Memoized::with_config("add", counted_add(calls.clone()), config).unwrap();

        assert_eq!(add.call(one_two()).unwrap(), 3);
        // Same key, different arguments: stale value by construction.
        assert_eq!(add.call(Args::new().push(10).push(20)).unwrap(), 3);
        assert_eq!(calls.get(), 1);
    }

    #[test]
    fn test_invalid_explicit_key_fails_construction() {
        let result = Memoize::new()
            .key("a/b")
            .wrap("add", counted_add(Rc::new(Cell::new(0))));
        assert!(result.is_err());
    }

    #[test]
    fn test_non_persistent_never_touches_disk() {
        let temp_dir = TempDir::new().unwrap();
        let folder = temp_dir.path().join("memo");
        let mut add = Memoize::new()
            .folder(&folder)
            .wrap("add", counted_add(Rc::new(Cell::new(0))))
            .unwrap();

        add.call(one_two()).unwrap();
        add.clear().unwrap();
        assert!(!folder.exists());
        assert!(add.stored_keys().unwrap().is_empty());
    }

    #[test]
    fn test_persistent_writes_one_file_per_key() {
        let temp_dir = TempDir::new().unwrap();
        let folder = temp_dir.path().join("memo");
        let mut add = Memoize::new()
            .persistent(true)
            .folder(&folder)
            .wrap("add", counted_add(Rc::new(Cell::new(0))))
            .unwrap();
        assert!(folder.is_dir());

        add.call(one_two()).unwrap();
        add.call(Args::new().push(2).push(2)).unwrap();

        let key = add.key_for(&one_two()).unwrap();
        assert_eq!(std::fs::read(folder.join(&key)).unwrap(), b"3");
        assert_eq!(add.stored_keys().unwrap().len(), 2);
        assert!(add.is_cached(&one_two()).unwrap());
        assert!(!add.is_cached(&Args::new().push(0).push(0)).unwrap());
    }

    #[test]
    fn test_lazy_disabled_passes_callable_through() {
        let evaluated = Rc::new(Cell::new(0));
        let counter = evaluated.clone();
        let mut f = Memoized::new("describe", |args: Args| {
            args.get(0).map(|arg| arg.is_lazy()).unwrap_or(false)
        })
        .unwrap();

        let was_lazy = f
            .call(Args::new().push_lazy("rows", move || {
                counter.set(counter.get() + 1);
                1
            }))
            .unwrap();
        assert!(was_lazy);
        assert_eq!(evaluated.get(), 0);
    }

    #[test]
    fn test_unbound_rewraps_with_same_config() {
        let add = Memoize::new()
            .key("k")
            .lazy(true)
            .digest(KeyDigest::Md5)
            .wrap("add", counted_add(Rc::new(Cell::new(0))))
            .unwrap();

        let mul = add
            .unbound()
            .wrap("mul", |args: Args| args.value::<i64>(0).unwrap_or(1) * 2)
            .unwrap();
        assert_eq!(mul.config(), add.config());
        assert_eq!(mul.name(), "mul");
    }

    #[test]
    fn test_source_display() {
        assert_eq!(Source::Memory.to_string(), "memory");
        assert_eq!(Source::Disk.to_string(), "disk");
        assert_eq!(Source::Function.to_string(), "function");
        assert_eq!(serde_json::to_string(&Source::Disk).unwrap(), "\"disk\"");
    }

    #[test]
    fn test_debug_output_omits_function() {
        let add = Memoized::new("add", counted_add(Rc::new(Cell::new(0)))).unwrap();
        let rendered = format!("{:?}", add);
        assert!(rendered.starts_with("Memoized { name: \"add\""));
        assert!(rendered.contains("memory_entries: 0"));
    }
}
