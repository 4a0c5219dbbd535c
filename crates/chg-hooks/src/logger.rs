//! Registering the change logger on a model.
//!
//! [`ChangeLogger::register`] declares the two hidden fields and installs a
//! pre hook and a post hook for every [`MutationKind`]. The pre hook reads
//! the operation's attribution, merges it into the update payload for
//! updating query kinds, builds the change record and hands it to the sink.
//! The post hook clears the attribution, whatever the mutation's outcome.

use std::fmt;
use std::sync::Arc;

use chg_config::{DEFAULT_COLLECTION, DEFAULT_CONCURRENT_SAVES};
use chg_core::factory::build_record;
use chg_core::merge::merge_attribution;
use chg_core::{AuditRecord, MutationKind, MutationStyle, QueryExtra};
use chg_sink::{ChangeSink, SinkSettings};
use serde_json::Value;
use tracing::{debug, error, info, warn};

use crate::context::AttributionContext;
use crate::error::HookError;
use crate::schema::{HiddenField, ModelSchema};
use crate::target::{HookOutcome, MutationTarget};

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RegistrationParams {
    /// Logical entity type written into every record. Required.
    pub model_name: String,
    /// Name of the host model layer the hooks are installed into. Required.
    pub host: Option<String>,
    pub collection: String,
    pub concurrent_saves: usize,
}

impl Default for RegistrationParams {
    fn default() -> Self {
        Self {
            model_name: String::new(),
            host: None,
            collection: DEFAULT_COLLECTION.to_string(),
            concurrent_saves: DEFAULT_CONCURRENT_SAVES,
        }
    }
}

impl RegistrationParams {
    #[must_use]
    pub fn new(model_name: impl Into<String>, host: impl Into<String>) -> Self {
        Self {
            model_name: model_name.into(),
            host: Some(host.into()),
            ..Self::default()
        }
    }

    #[must_use]
    pub fn with_collection(mut self, collection: impl Into<String>) -> Self {
        self.collection = collection.into();
        self
    }

    #[must_use]
    pub const fn with_concurrent_saves(mut self, concurrent_saves: usize) -> Self {
        self.concurrent_saves = concurrent_saves;
        self
    }

    /// # Errors
    ///
    /// Returns `HookError::Configuration` when `model_name` is empty or `host`
    /// is missing.
    pub fn validate(&self) -> Result<(), HookError> {
        if self.model_name.trim().is_empty() {
            return Err(HookError::Configuration("model name is required".into()));
        }
        if self.host.as_deref().is_none_or(|host| host.trim().is_empty()) {
            return Err(HookError::Configuration("host is required".into()));
        }
        Ok(())
    }

    /// Sink settings matching these parameters.
    #[must_use]
    pub fn sink_settings(&self) -> SinkSettings {
        SinkSettings::default()
            .with_collection(self.collection.clone())
            .with_concurrent_saves(self.concurrent_saves)
    }
}

/// Why a record was emitted without a usable actor.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AttributionWarning {
    /// The operation was never attributed.
    Missing,
    /// The operation was attributed to a `null` actor.
    NullActor,
}

impl fmt::Display for AttributionWarning {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Missing => f.write_str("actor not set"),
            Self::NullActor => f.write_str("actor is null"),
        }
    }
}

/// A record ready to emit, with the attribution problem it has, if any.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PreparedRecord {
    pub record: AuditRecord,
    pub warning: Option<AttributionWarning>,
}

struct LoggerInner {
    model_name: String,
    host: String,
    ctx: Arc<AttributionContext>,
    sink: ChangeSink,
}

/// The change logger installed on one model.
#[derive(Clone)]
pub struct ChangeLogger {
    inner: Arc<LoggerInner>,
}

impl ChangeLogger {
    /// Install the change logger's hidden fields and hooks on `schema`.
    ///
    /// # Errors
    ///
    /// Returns `HookError::Configuration` if `params` lack a model name or
    /// host.
    pub fn register(
        schema: &mut dyn ModelSchema,
        params: RegistrationParams,
        ctx: Arc<AttributionContext>,
        sink: ChangeSink,
    ) -> Result<Self, HookError> {
        params.validate()?;

        let settings = sink.settings();
        if settings.collection != params.collection
            || settings.concurrent_saves != params.concurrent_saves
        {
            warn!(
                model = %params.model_name,
                requested_collection = %params.collection,
                sink_collection = %settings.collection,
                requested_concurrent_saves = params.concurrent_saves,
                sink_concurrent_saves = settings.concurrent_saves,
                "sink settings differ from registration parameters; using the sink's"
            );
        }

        let logger = Self {
            inner: Arc::new(LoggerInner {
                model_name: params.model_name,
                host: params.host.unwrap_or_default(),
                ctx,
                sink,
            }),
        };

        schema.add_hidden_field(HiddenField::change_id());
        schema.add_hidden_field(HiddenField::actor());

        for kind in MutationKind::ALL {
            let pre = logger.clone();
            schema.pre(
                kind,
                Arc::new(move |kind: MutationKind, target: &mut dyn MutationTarget| {
                    pre.before(kind, target);
                }),
            );
            let post = logger.clone();
            schema.post(
                kind,
                Arc::new(
                    move |kind: MutationKind, target: &dyn MutationTarget, outcome: &HookOutcome| {
                        post.after(kind, target, outcome);
                    },
                ),
            );
        }

        info!(
            model = %logger.inner.model_name,
            host = %logger.inner.host,
            kinds = MutationKind::ALL.len(),
            "change logger registered"
        );
        Ok(logger)
    }

    #[must_use]
    pub fn model_name(&self) -> &str {
        &self.inner.model_name
    }

    #[must_use]
    pub fn host(&self) -> &str {
        &self.inner.host
    }

    #[must_use]
    pub fn context(&self) -> &Arc<AttributionContext> {
        &self.inner.ctx
    }

    #[must_use]
    pub fn sink(&self) -> &ChangeSink {
        &self.inner.sink
    }

    /// Build the record for `kind` on `target`, merging attribution into the
    /// update payload first when `kind` updates documents.
    ///
    /// # Errors
    ///
    /// Returns `HookError::Core` if the filter or update cannot be
    /// serialized.
    pub fn prepare(
        &self,
        kind: MutationKind,
        target: &mut dyn MutationTarget,
    ) -> Result<PreparedRecord, HookError> {
        let attribution = self.inner.ctx.get(target.operation_id());
        let warning = match &attribution {
            None => Some(AttributionWarning::Missing),
            Some(a) if !a.is_complete() => Some(AttributionWarning::NullActor),
            Some(_) => None,
        };

        if kind.merges_attribution() {
            let complete = attribution.as_ref().filter(|a| a.is_complete());
            if let (Some(attribution), Some(update)) = (complete, target.update_mut()) {
                if !merge_attribution(update, attribution) {
                    warn!(
                        action = %kind,
                        model = %self.inner.model_name,
                        "update payload is not an object; attribution not merged"
                    );
                }
            }
        }

        let extra = match kind.style() {
            MutationStyle::Query => {
                let null = Value::Null;
                Some(QueryExtra::capture(
                    target.filter().unwrap_or(&null),
                    target.update(),
                )?)
            }
            MutationStyle::Document => None,
        };

        let record = build_record(kind, &self.inner.model_name, attribution.as_ref(), extra);
        Ok(PreparedRecord { record, warning })
    }

    /// Pre-phase: prepare the record and emit it. Never fails the mutation.
    pub fn before(&self, kind: MutationKind, target: &mut dyn MutationTarget) {
        match self.prepare(kind, target) {
            Ok(PreparedRecord { record, warning }) => {
                if let Some(warning) = warning {
                    warn!(
                        %warning,
                        action = %kind,
                        model = %self.inner.model_name,
                        target = %target.describe(),
                        "mutation is not attributed"
                    );
                }
                self.inner.sink.emit(record);
            }
            Err(err) => {
                error!(
                    error = %err,
                    action = %kind,
                    model = %self.inner.model_name,
                    "failed to build change record"
                );
            }
        }
    }

    /// Post-phase: clear the operation's attribution.
    pub fn after(&self, kind: MutationKind, target: &dyn MutationTarget, outcome: &HookOutcome) {
        let cleared = self.inner.ctx.reset(target.operation_id()).is_some();
        debug!(
            action = %kind,
            model = %self.inner.model_name,
            operation = %target.operation_id(),
            success = outcome.is_success(),
            cleared,
            "mutation finished"
        );
    }
}

impl fmt::Debug for ChangeLogger {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ChangeLogger")
            .field("model_name", &self.inner.model_name)
            .field("host", &self.inner.host)
            .field("sink", &self.inner.sink)
            .finish_non_exhaustive()
    }
}
