//! Query profiling.
//!
//! The [`Profiler`] is a registry of [`QueryProfile`]s keyed by handles that
//! only ever increase. A disabled profiler allocates nothing. Profiles that
//! fail the elapsed-time or query-type filter when they end are evicted, and
//! their handles are never handed out again.
//!
//! The adapter owns one profiler and shares it with every statement it
//! prepares through [`SharedProfiler`].

mod query;

pub use query::{QueryProfile, QueryType, QueryTypeSet};

use std::cell::{RefCell, RefMut};
use std::collections::BTreeMap;
use std::fmt;
use std::rc::Rc;
use std::time::Duration;

use dbal_core::{BindTarget, ProfilerError, ProfilerErrorKind, Result, Value};
use serde::Serialize;

/// Profiler shared between an adapter and its statements.
pub type SharedProfiler = Rc<RefCell<Profiler>>;

/// Stable identifier of a profile within one registry.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize)]
pub struct ProfileHandle(usize);

impl ProfileHandle {
    pub fn get(self) -> usize {
        self.0
    }
}

impl fmt::Display for ProfileHandle {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Outcome of [`Profiler::end`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EndStatus {
    /// Kept in the registry
    Stored,
    /// Rejected by a filter and evicted, or the profiler is disabled
    Ignored,
}

#[derive(Debug, Clone, Default)]
pub struct Profiler {
    enabled: bool,
    filter_elapsed: Option<Duration>,
    filter_types: Option<QueryTypeSet>,
    profiles: BTreeMap<usize, QueryProfile>,
    next_handle: usize,
}

impl Profiler {
    /// A disabled profiler with no filters.
    pub fn new() -> Self {
        Self::default()
    }

    pub fn enabled() -> Self {
        Self {
            enabled: true,
            ..Self::default()
        }
    }

    pub fn shared(self) -> SharedProfiler {
        Rc::new(RefCell::new(self))
    }

    pub fn is_enabled(&self) -> bool {
        self.enabled
    }

    /// Turning the profiler off stops new allocations but keeps history.
    pub fn set_enabled(&mut self, enabled: bool) {
        self.enabled = enabled;
    }

    pub fn filter_elapsed(&self) -> Option<Duration> {
        self.filter_elapsed
    }

    /// Evict profiles that run for less than `min` when they end.
    pub fn set_filter_elapsed(&mut self, min: Option<Duration>) {
        self.filter_elapsed = min;
    }

    pub fn filter_types(&self) -> Option<QueryTypeSet> {
        self.filter_types
    }

    /// Evict profiles whose type is outside `types` when they end.
    pub fn set_filter_types(&mut self, types: Option<QueryTypeSet>) {
        self.filter_types = types;
    }

    /// Remove every profile. Settings and the handle counter are kept.
    pub fn clear(&mut self) {
        self.profiles.clear();
    }

    /// Start timing `text`. The type is inferred from the SQL when `None`.
    pub fn start(&mut self, text: &str, query_type: Option<QueryType>) -> Option<ProfileHandle> {
        self.start_with_params(text, query_type, Vec::new())
    }

    /// Start timing `text` with its bound parameters recorded.
    pub fn start_with_params(
        &mut self,
        text: &str,
        query_type: Option<QueryType>,
        params: Vec<(BindTarget, Value)>,
    ) -> Option<ProfileHandle> {
        if !self.enabled {
            return None;
        }
        let query_type = query_type.unwrap_or_else(|| QueryType::infer(text));
        Some(self.push(QueryProfile::start(text, query_type, params)))
    }

    /// Start a fresh profile with the text and type of `handle`.
    ///
    /// Used when a statement executes again after its previous profile
    /// ended, so that each execution gets its own entry.
    pub fn clone_for_reuse(&mut self, handle: ProfileHandle) -> Result<Option<ProfileHandle>> {
        self.clone_for_reuse_with_params(handle, Vec::new())
    }

    pub fn clone_for_reuse_with_params(
        &mut self,
        handle: ProfileHandle,
        params: Vec<(BindTarget, Value)>,
    ) -> Result<Option<ProfileHandle>> {
        if !self.enabled {
            return Ok(None);
        }
        let fresh = self.get(handle)?.restart(params);
        Ok(Some(self.push(fresh)))
    }

    fn push(&mut self, profile: QueryProfile) -> ProfileHandle {
        let handle = self.next_handle;
        self.next_handle += 1;
        self.profiles.insert(handle, profile);
        ProfileHandle(handle)
    }

    /// Stamp the end time of `handle` and apply the filters.
    pub fn end(&mut self, handle: ProfileHandle) -> Result<EndStatus> {
        if !self.enabled {
            return Ok(EndStatus::Ignored);
        }

        let profile = self
            .profiles
            .get_mut(&handle.0)
            .ok_or_else(|| profiler_error(ProfilerErrorKind::UnknownHandle, handle))?;
        if !profile.end() {
            return Err(profiler_error(ProfilerErrorKind::AlreadyEnded, handle).into());
        }

        let elapsed = profile.elapsed().unwrap_or_default();
        let too_fast = self.filter_elapsed.is_some_and(|min| elapsed < min);
        let filtered_type = self
            .filter_types
            .is_some_and(|types| !types.contains(profile.query_type()));

        if too_fast || filtered_type {
            tracing::trace!(
                handle = handle.0,
                elapsed_us = u64::try_from(elapsed.as_micros()).unwrap_or(u64::MAX),
                too_fast,
                filtered_type,
                "Evicting query profile"
            );
            self.profiles.remove(&handle.0);
            return Ok(EndStatus::Ignored);
        }
        Ok(EndStatus::Stored)
    }

    /// Drop a profile without ending it. Returns the removed profile.
    pub fn discard(&mut self, handle: ProfileHandle) -> Option<QueryProfile> {
        self.profiles.remove(&handle.0)
    }

    pub fn contains(&self, handle: ProfileHandle) -> bool {
        self.profiles.contains_key(&handle.0)
    }

    fn get(&self, handle: ProfileHandle) -> Result<&QueryProfile> {
        self.profiles
            .get(&handle.0)
            .ok_or_else(|| profiler_error(ProfilerErrorKind::UnknownHandle, handle).into())
    }

    /// Look up a profile by handle.
    pub fn query_profile(&self, handle: ProfileHandle) -> Result<&QueryProfile> {
        self.get(handle)
    }

    /// Profiles in handle order, optionally restricted to `types`.
    ///
    /// Unfinished profiles are left out unless `include_unfinished` is set.
    pub fn query_profiles(
        &self,
        types: Option<QueryTypeSet>,
        include_unfinished: bool,
    ) -> Vec<&QueryProfile> {
        self.select(types, include_unfinished)
            .map(|(_, p)| p)
            .collect()
    }

    fn select(
        &self,
        types: Option<QueryTypeSet>,
        include_unfinished: bool,
    ) -> impl Iterator<Item = (ProfileHandle, &QueryProfile)> {
        self.profiles
            .iter()
            .filter(move |(_, p)| include_unfinished || p.has_ended())
            .filter(move |(_, p)| types.is_none_or(|t| t.contains(p.query_type())))
            .map(|(h, p)| (ProfileHandle(*h), p))
    }

    /// Number of ended profiles, optionally restricted to `types`.
    pub fn total_num_queries(&self, types: Option<QueryTypeSet>) -> usize {
        self.select(types, false).count()
    }

    /// Sum of elapsed time over ended profiles.
    pub fn total_elapsed(&self, types: Option<QueryTypeSet>) -> Duration {
        self.select(types, false)
            .filter_map(|(_, p)| p.elapsed())
            .sum()
    }

    /// Most recently started profile still in the registry, ended or not.
    pub fn last_query_profile(&self) -> Option<&QueryProfile> {
        self.profiles.values().next_back()
    }

    /// Serializable report over ended profiles.
    pub fn summary(&self) -> ProfileSummary {
        let queries: Vec<QueryReport> = self
            .select(None, false)
            .map(|(handle, p)| QueryReport {
                handle,
                query: p.query().to_string(),
                query_type: p.query_type(),
                elapsed_secs: p.elapsed_secs().unwrap_or_default(),
                params: p
                    .params()
                    .iter()
                    .map(|(t, v)| (t.to_string(), v.clone()))
                    .collect(),
            })
            .collect();
        ProfileSummary {
            query_count: queries.len(),
            total_elapsed_secs: self.total_elapsed(None).as_secs_f64(),
            queries,
        }
    }
}

fn profiler_error(kind: ProfilerErrorKind, handle: ProfileHandle) -> ProfilerError {
    ProfilerError {
        kind,
        handle: Some(handle.0),
    }
}

/// Mutably borrow a shared profiler, failing instead of panicking when the
/// caller still holds a borrow of it.
pub(crate) fn borrow_shared(profiler: &SharedProfiler) -> Result<RefMut<'_, Profiler>> {
    profiler.try_borrow_mut().map_err(|_| {
        ProfilerError {
            kind: ProfilerErrorKind::Busy,
            handle: None,
        }
        .into()
    })
}

/// Aggregate profiler report, suitable for JSON export.
#[derive(Debug, Clone, Serialize)]
pub struct ProfileSummary {
    pub query_count: usize,
    pub total_elapsed_secs: f64,
    pub queries: Vec<QueryReport>,
}

#[derive(Debug, Clone, Serialize)]
pub struct QueryReport {
    pub handle: ProfileHandle,
    pub query: String,
    pub query_type: QueryType,
    pub elapsed_secs: f64,
    pub params: Vec<(String, Value)>,
}
