//! Controller - One invocation of the declarative state machine
//!
//! VALIDATE -> RESOLVE_CURRENT -> DECIDE -> submit -> TASK_WAIT ->
//! REFRESH -> SHAPE. Validation, resolution and decision failures
//! surface before any mutating call; API and task failures carry the
//! classified kind and the scrubbed server payload.

use serde_json::Value as Json;

use vela_client::error::ApiError;
use vela_client::http::ETAG_KEY;
use vela_client::query::{ApiDialect, V3Query, V4Query};
use vela_client::resolve::{EntityRef, ResolveError};
use vela_client::task::{wait_for_task, PollCadence};
use vela_core::build::{build_spec, run_pipeline, BuildMode};
use vela_core::intent::{decide, decide_subcommand, is_noop, DecisionError, Intent};
use vela_core::shape::{scrub_text, shape_response, InvocationResult};
use vela_core::validate::normalize;
use vela_core::value::{Params, Value};

use crate::context::EngineContext;
use crate::error::EngineError;
use crate::registry::{Registry, ResourceDescriptor};

/// Runs one {kind, verb} invocation against the registry's catalog
pub struct Controller<'a> {
    registry: &'a Registry,
    cadence: PollCadence,
}

impl<'a> Controller<'a> {
    pub fn new(registry: &'a Registry) -> Self {
        Self {
            registry,
            cadence: PollCadence::default(),
        }
    }

    pub fn with_cadence(mut self, cadence: PollCadence) -> Self {
        self.cadence = cadence;
        self
    }

    /// Run one invocation. Never panics and never returns an Err; every
    /// failure becomes a fail-path result map.
    pub async fn run(&self, kind: &str, verb: Option<&str>, params: &Params) -> InvocationResult {
        let Some(descriptor) = self.registry.get(kind) else {
            let err = EngineError::UnknownKind {
                kind: kind.to_string(),
            };
            return InvocationResult::failed(err.kind(), err.to_string(), Json::Null);
        };

        let normalized = match normalize(params, &descriptor.schema) {
            Ok(map) => map,
            Err(err) => {
                let err = EngineError::from(err);
                return InvocationResult::failed(err.kind(), err.to_string(), Json::Null);
            }
        };

        let ctx = match EngineContext::from_params(&normalized, &descriptor.schema) {
            Ok(ctx) => ctx,
            Err(err) => return self.fail(descriptor, &[], err),
        };

        tracing::debug!(kind, verb = verb.unwrap_or("state"), "invocation start");

        match self.execute(descriptor, verb, &normalized, &ctx).await {
            Ok(result) => result,
            Err(err) => self.fail(descriptor, &ctx.secrets, err),
        }
    }

    async fn execute(
        &self,
        d: &ResourceDescriptor,
        verb: Option<&str>,
        normalized: &Params,
        ctx: &EngineContext,
    ) -> Result<InvocationResult, EngineError> {
        let mut params = normalized.clone();
        self.resolve_references(d, &mut params, ctx).await?;

        match verb {
            Some("list") => return self.list(d, &params, ctx).await,
            Some("read") => return self.read(d, ctx).await,
            _ => {}
        }

        let ext_id = self.target_ext_id(d, &params, ctx).await?;

        // subcommand verbs bypass the decision table and the diff
        if let Some(v) = verb {
            if d.subcommand_spec(v).is_none() {
                return Err(EngineError::UnknownVerb {
                    kind: d.kind.clone(),
                    verb: v.to_string(),
                });
            }
            let intent = decide_subcommand(v, ext_id.as_deref())?;
            return self.carry_out(d, &params, ctx, intent, None).await;
        }

        let current = match &ext_id {
            Some(id) => match ctx.client.get(&d.entity_path(id), &[]).await {
                Ok(body) => Some(body),
                Err(ApiError::NotFound { .. }) => None,
                Err(err) => return Err(err.into()),
            },
            None => None,
        };

        let intent = decide(ctx.operation.state, ext_id.as_deref(), current.is_some())?;
        self.carry_out(d, &params, ctx, intent, current).await
    }

    async fn carry_out(
        &self,
        d: &ResourceDescriptor,
        params: &Params,
        ctx: &EngineContext,
        intent: Intent,
        current: Option<Json>,
    ) -> Result<InvocationResult, EngineError> {
        // the idempotency diff can downgrade an update to a no-op
        let (intent, desired) = match intent {
            Intent::Update { ext_id } => {
                let Some(body) = &current else {
                    return Err(DecisionError::NotFound { ext_id }.into());
                };
                let doc = d.entity_document(body);
                let desired = build_spec(&d.schema, params, Some(doc), BuildMode::Update)?;
                if is_noop(doc, &desired, &d.schema.server_owned_pointers()) {
                    return Ok(InvocationResult::skipped(
                        self.shape(d, doc.clone()),
                        "specs match, nothing to update",
                    )
                    .with_ext_id(ext_id));
                }
                (Intent::Update { ext_id }, Some(desired))
            }
            other => (other, None),
        };

        if ctx.operation.check_mode {
            let mut result = InvocationResult::unchanged(check_mode_msg(&intent));
            result.changed = intent.is_mutating();
            return Ok(result);
        }

        match intent {
            Intent::Create => {
                let spec = build_spec(&d.schema, params, None, BuildMode::Create)?;
                let spec = run_pipeline(&d.sub_builders, params, spec)?;
                let body = ctx.client.post(&d.base_path, &spec).await?;
                self.finish_mutation(d, ctx, body, None).await
            }
            Intent::Update { ext_id } => {
                // desired was computed above against the current spec
                let desired = desired.unwrap_or(Json::Null);
                let etag = self.etag_for_mutation(d, current.as_ref())?;
                let path = d.entity_path(&ext_id);
                // v4 takes PATCH under If-Match; the legacy dialect
                // replaces the whole document with PUT
                let body = match d.dialect {
                    ApiDialect::V4 => ctx.client.patch(&path, &desired, etag.as_deref()).await?,
                    ApiDialect::V3 => ctx.client.put(&path, &desired, None).await?,
                };
                self.finish_mutation(d, ctx, body, Some(ext_id)).await
            }
            Intent::Delete { ext_id } => {
                let etag = self.etag_for_mutation(d, current.as_ref())?;
                let body = ctx
                    .client
                    .delete(&d.entity_path(&ext_id), etag.as_deref())
                    .await?;
                self.finish_delete(d, ctx, body, ext_id).await
            }
            Intent::NoOp => Ok(InvocationResult::unchanged("no change required")),
            Intent::Subcommand { verb, ext_id } => {
                let spec = build_spec(&d.schema, params, None, BuildMode::Create)?;
                let suffix = d
                    .subcommand_spec(&verb)
                    .map(|s| s.path_suffix.clone())
                    .unwrap_or_default();
                let path = format!("{}{}", d.entity_path(&ext_id), suffix);
                let body = ctx.client.post(&path, &spec).await?;
                self.finish_mutation(d, ctx, body, Some(ext_id)).await
            }
        }
    }

    /// Track the task (when the kind is task-tracked and `wait` is on),
    /// then refresh the entity and shape the final response.
    async fn finish_mutation(
        &self,
        d: &ResourceDescriptor,
        ctx: &EngineContext,
        body: Json,
        known_ext_id: Option<String>,
    ) -> Result<InvocationResult, EngineError> {
        let task_id = if d.tracked_by_task {
            task_id_from_response(&body)
        } else {
            None
        };

        let Some(task_id) = task_id else {
            // synchronous mutation: the response already is the entity
            let doc = d.entity_document(&body).clone();
            let ext_id = d.entity_ext_id(&doc).or(known_ext_id);
            let mut result = InvocationResult::changed(self.shape(d, doc));
            result.ext_id = ext_id;
            return Ok(result);
        };

        if !ctx.operation.wait {
            let mut result = InvocationResult::changed(self.shape(d, body)).with_task(task_id);
            result.ext_id = known_ext_id;
            return Ok(result);
        }

        let handle =
            wait_for_task(&ctx.client, &d.task_path, &task_id, self.cadence, ctx.deadline())
                .await?;

        let ext_id = d
            .task_rel
            .as_deref()
            .and_then(|rel| handle.entity_for_rel(rel))
            .map(str::to_string)
            .or_else(|| {
                d.completion_detail_key
                    .as_deref()
                    .and_then(|key| handle.completion_detail(key))
                    .and_then(Json::as_str)
                    .map(str::to_string)
            })
            .or(known_ext_id);

        match ext_id {
            Some(id) => {
                let fresh = ctx.client.get(&d.entity_path(&id), &[]).await?;
                let doc = d.entity_document(&fresh).clone();
                Ok(InvocationResult::changed(self.shape(d, doc))
                    .with_ext_id(id)
                    .with_task(task_id))
            }
            None => {
                Ok(InvocationResult::changed(self.shape(d, handle.raw)).with_task(task_id))
            }
        }
    }

    /// Delete never re-reads the entity; the response is the task
    /// payload or the server's acknowledgement.
    async fn finish_delete(
        &self,
        d: &ResourceDescriptor,
        ctx: &EngineContext,
        body: Json,
        ext_id: String,
    ) -> Result<InvocationResult, EngineError> {
        if d.tracked_by_task
            && let Some(task_id) = task_id_from_response(&body)
        {
            if ctx.operation.wait {
                let handle = wait_for_task(
                    &ctx.client,
                    &d.task_path,
                    &task_id,
                    self.cadence,
                    ctx.deadline(),
                )
                .await?;
                return Ok(InvocationResult::changed(self.shape(d, handle.raw))
                    .with_ext_id(ext_id)
                    .with_task(task_id));
            }
            return Ok(InvocationResult::changed(self.shape(d, body))
                .with_ext_id(ext_id)
                .with_task(task_id));
        }
        Ok(InvocationResult::changed(self.shape(d, body)).with_ext_id(ext_id))
    }

    async fn list(
        &self,
        d: &ResourceDescriptor,
        params: &Params,
        ctx: &EngineContext,
    ) -> Result<InvocationResult, EngineError> {
        let pairs = match d.dialect {
            ApiDialect::V3 => V3Query::from_params(params).to_pairs(),
            ApiDialect::V4 => V4Query::from_params(params).to_pairs(),
        };
        let body = ctx.client.get(&d.base_path, &pairs).await?;
        Ok(InvocationResult {
            response: self.shape(d, body),
            ..InvocationResult::default()
        })
    }

    async fn read(
        &self,
        d: &ResourceDescriptor,
        ctx: &EngineContext,
    ) -> Result<InvocationResult, EngineError> {
        let Some(ext_id) = ctx.operation.ext_id.clone() else {
            return Err(DecisionError::SubcommandNeedsId {
                verb: "read".to_string(),
            }
            .into());
        };
        let body = ctx.client.get(&d.entity_path(&ext_id), &[]).await?;
        let doc = d.entity_document(&body).clone();
        Ok(InvocationResult {
            response: self.shape(d, doc),
            ext_id: Some(ext_id),
            ..InvocationResult::default()
        })
    }

    /// Rewrite `{name: ...}` entity references into canonical IDs so the
    /// builder stays free of I/O.
    async fn resolve_references(
        &self,
        d: &ResourceDescriptor,
        params: &mut Params,
        ctx: &EngineContext,
    ) -> Result<(), EngineError> {
        let mut ref_fields: Vec<(String, String)> = d
            .schema
            .fields
            .values()
            .filter_map(|f| f.ref_kind.clone().map(|kind| (f.name.clone(), kind)))
            .collect();
        ref_fields.sort();

        for (name, ref_kind) in ref_fields {
            let Some(value) = params.get(&name) else {
                continue;
            };
            if matches!(value, Value::String(_)) {
                // already a canonical ID
                continue;
            }
            let target = self
                .registry
                .get(&ref_kind)
                .ok_or_else(|| EngineError::UnknownKind {
                    kind: ref_kind.clone(),
                })?;
            let entity = EntityRef::from_value(value);
            let id = ctx
                .resolver
                .resolve(&ctx.client, target.dialect, &target.base_path, &ref_kind, &entity)
                .await?;
            params.insert(name, Value::String(id));
        }
        Ok(())
    }

    /// The target entity's ID: explicit ext_id first, then lookup by
    /// name. A name that matches nothing is not an error here; the
    /// decision table turns it into a create or a no-op.
    async fn target_ext_id(
        &self,
        d: &ResourceDescriptor,
        params: &Params,
        ctx: &EngineContext,
    ) -> Result<Option<String>, EngineError> {
        if let Some(id) = &ctx.operation.ext_id {
            return Ok(Some(id.clone()));
        }
        let Some(name_field) = &d.name_field else {
            return Ok(None);
        };
        let Some(name) = params.get(name_field).and_then(Value::as_str) else {
            return Ok(None);
        };

        let entity = EntityRef {
            name: Some(name.to_string()),
            ext_id: None,
        };
        match ctx
            .resolver
            .resolve(&ctx.client, d.dialect, &d.base_path, &d.kind, &entity)
            .await
        {
            Ok(id) => Ok(Some(id)),
            Err(ResolveError::NotFound { .. }) => Ok(None),
            Err(err) => Err(err.into()),
        }
    }

    /// The v4 dialect requires If-Match on every update and delete; the
    /// token comes from the precursor read, and its absence is fatal.
    fn etag_for_mutation(
        &self,
        d: &ResourceDescriptor,
        current: Option<&Json>,
    ) -> Result<Option<String>, EngineError> {
        if d.dialect != ApiDialect::V4 {
            return Ok(None);
        }
        let etag = current
            .and_then(|body| body.get(ETAG_KEY))
            .and_then(Json::as_str)
            .map(str::to_string);
        match etag {
            Some(etag) => Ok(Some(etag)),
            None => Err(ApiError::EtagMissing.into()),
        }
    }

    fn shape(&self, d: &ResourceDescriptor, doc: Json) -> Json {
        let internal: Vec<&str> = d.internal_attributes.iter().map(String::as_str).collect();
        shape_response(doc, &internal, &d.schema.no_log_pointers())
    }

    fn fail(
        &self,
        d: &ResourceDescriptor,
        secrets: &[String],
        err: EngineError,
    ) -> InvocationResult {
        let response = match err.payload() {
            Some(payload) => self.shape(d, payload.clone()),
            None => Json::Null,
        };
        let msg = scrub_text(&err.to_string(), secrets);
        tracing::error!(kind = %d.kind, error = err.kind(), "invocation failed: {msg}");
        InvocationResult::failed(err.kind(), msg, response)
    }
}

fn check_mode_msg(intent: &Intent) -> String {
    match intent {
        Intent::Create => "check mode: would create".to_string(),
        Intent::Update { ext_id } => format!("check mode: would update '{ext_id}'"),
        Intent::Delete { ext_id } => format!("check mode: would delete '{ext_id}'"),
        Intent::NoOp => "no change required".to_string(),
        Intent::Subcommand { verb, ext_id } => {
            format!("check mode: would run '{verb}' on '{ext_id}'")
        }
    }
}

/// The task reference carried by a mutation response, across both
/// dialects (v4 task envelope, v3 execution context, NDB operation id)
fn task_id_from_response(body: &Json) -> Option<String> {
    [
        "/data/extId",
        "/taskUuid",
        "/task_uuid",
        "/status/execution_context/task_uuid",
        "/operationId",
    ]
    .iter()
    .find_map(|p| body.pointer(p))
    .and_then(Json::as_str)
    .map(str::to_string)
}
