//! Provisioning engine
//!
//! Diffs a validated [`Stack`] against recorded state, then drives the
//! provider one resource at a time. Nothing runs in parallel and the first
//! failure stops the run; state is saved after every successful step so an
//! interrupted apply can be resumed by planning again.

use crate::action::{Action, ActionType, ApplyResult, Plan};
use crate::error::{CloudError, Result};
use crate::provider::{CloudProvider, ResolvedResource};
use crate::state::{GlobalState, ResourceState, ResourceStatus, StateLock, StateManager};
use serde_json::{Value, json};
use stackflow_core::{ResourceKind, Stack, validate_stack};
use std::collections::{BTreeMap, BTreeSet, HashSet};
use std::time::Instant;
use tracing::{debug, info, warn};

/// Compute the actions that bring `state` in line with `stack`
pub fn compute_plan<P: CloudProvider + ?Sized>(
    provider: &P,
    stack: &Stack,
    state: &GlobalState,
) -> Result<Plan> {
    let order = validate_stack(stack)?;

    let removed: Vec<&String> = state
        .resources
        .keys()
        .filter(|name| stack.get(name).is_none())
        .collect();
    let deletes: Vec<Action> = state
        .deletion_order(&removed)
        .into_iter()
        .filter_map(|name| {
            let recorded = state.get_resource(&name)?;
            Some(
                Action::new(
                    ActionType::Delete,
                    recorded.resource_type,
                    name.as_str(),
                    format!("Delete {} {} ({})", recorded.resource_type, name, recorded.id),
                )
                .with_detail("id", json!(recorded.id)),
            )
        })
        .collect();

    let mut actions: Vec<Action> = Vec::with_capacity(order.len() + deletes.len());
    let mut replaced: HashSet<&str> = HashSet::new();
    for name in order.iter() {
        let Some(resource) = stack.get(name) else {
            continue;
        };
        let kind = resource.kind();

        let action = match state.get_resource(name) {
            None => Action::new(
                ActionType::Create,
                kind,
                name,
                format!("Create {} {}", kind, name),
            ),
            Some(recorded) => {
                let replaced_dependency = resource
                    .dependencies()
                    .into_iter()
                    .find(|dep| replaced.contains(dep));

                let action = if recorded.resource_type != kind {
                    Action::new(
                        ActionType::Replace,
                        kind,
                        name,
                        format!("Replace {} {} (was {})", kind, name, recorded.resource_type),
                    )
                } else if let Some(dep) = replaced_dependency {
                    Action::new(
                        ActionType::Replace,
                        kind,
                        name,
                        format!("Replace {} {} ({} is replaced)", kind, name, dep),
                    )
                } else if recorded.resource == *resource {
                    Action::new(ActionType::NoOp, kind, name, format!("{} {}", kind, name))
                } else if provider.requires_replacement(&recorded.resource, resource) {
                    Action::new(
                        ActionType::Replace,
                        kind,
                        name,
                        format!("Replace {} {}", kind, name),
                    )
                } else {
                    Action::new(
                        ActionType::Update,
                        kind,
                        name,
                        format!("Update {} {} in place", kind, name),
                    )
                };
                action.with_detail("id", json!(recorded.id))
            }
        };

        if action.action_type == ActionType::Replace {
            replaced.insert(name);
        }
        debug!("plan: {} {}", action.action_type, name);
        actions.push(action);
    }

    // removed resources go last so surviving ones can move off them first
    actions.extend(deletes);
    Ok(Plan::new(actions))
}

/// Resolve every declared output against recorded attributes
///
/// Outputs whose resource or attribute is not recorded yet resolve to null.
pub fn resolve_outputs(stack: &Stack, state: &GlobalState) -> BTreeMap<String, Value> {
    stack
        .outputs
        .iter()
        .map(|output| {
            let value = state
                .get_resource(output.resource.name())
                .and_then(|recorded| recorded.attribute_value(&output.attribute))
                .unwrap_or(Value::Null);
            (output.name.clone(), value)
        })
        .collect()
}

/// Drives a provider against the state of one project
pub struct Engine<'a, P: CloudProvider + ?Sized> {
    provider: &'a P,
    state: &'a StateManager,
}

impl<'a, P: CloudProvider + ?Sized> Engine<'a, P> {
    pub fn new(provider: &'a P, state: &'a StateManager) -> Self {
        Self { provider, state }
    }

    /// Plan against the recorded state
    pub async fn plan(&self, stack: &Stack) -> Result<Plan> {
        let state = self.state.load().await?;
        self.check_stack_name(stack, &state)?;
        compute_plan(self.provider, stack, &state)
    }

    /// Apply a plan computed by [`Engine::plan`]
    pub async fn apply(&self, stack: &Stack, plan: &Plan) -> Result<ApplyResult> {
        let start = Instant::now();
        let lock = self.state.acquire_lock().await?;
        let mut state = self.state.load().await?;
        self.check_stack_name(stack, &state)?;
        state.stack = Some(stack.name.clone());

        let mut result = ApplyResult::new();

        let (before, after) = split_teardown(plan, &state);

        // Phase 1: old half of replacements and whatever was built on them
        for name in &before {
            if !self.delete_recorded(&mut state, name, &mut result).await? {
                return self.finish(lock, result, start).await;
            }
        }

        // Phase 2: creations and updates in dependency order
        for action in plan.actions.iter().filter(|a| a.action_type.provisions()) {
            let name = action.resource_id.as_str();
            let resource = stack.get(name).ok_or_else(|| {
                CloudError::ResourceNotFound(format!("{} is not declared in the stack", name))
            })?;

            let outcome = match ResolvedResource::resolve(&stack.name, resource, &state) {
                Ok(resolved) => match (action.action_type, state.get_resource(name)) {
                    (ActionType::Update, Some(current)) => {
                        info!("Updating {} {} ({})", action.resource_type, name, current.id);
                        self.provider
                            .update(&resolved, current)
                            .await
                            .map(|p| (p, Some(current.created_at)))
                    }
                    _ => {
                        info!("Creating {} {}", action.resource_type, name);
                        self.provider.create(&resolved).await.map(|p| (p, None))
                    }
                },
                Err(e) => Err(e),
            };

            match outcome {
                Ok((provisioned, created_at)) => {
                    let mut recorded = ResourceState::new(provisioned.id, resource)
                        .with_status(status_for(action.resource_type));
                    recorded.attributes = provisioned.attributes;
                    if let Some(created_at) = created_at {
                        recorded.created_at = created_at;
                    }

                    result.add_success(
                        action.id.clone(),
                        format!("{} {} ({})", past_tense(action.action_type), name, recorded.id),
                    );
                    state.set_resource(name, recorded);
                    self.state.save(&state).await?;
                }
                Err(e) => {
                    result.add_failure(action.id.clone(), e.to_string());
                    return self.finish(lock, result, start).await;
                }
            }
        }

        // Phase 3: resources no longer declared, once nothing provisioned uses them
        for name in &after {
            if !self.delete_recorded(&mut state, name, &mut result).await? {
                return self.finish(lock, result, start).await;
            }
        }

        state.outputs = resolve_outputs(stack, &state);
        self.state.save(&state).await?;

        self.finish(lock, result, start).await
    }

    /// Delete every recorded resource
    pub async fn destroy(&self) -> Result<ApplyResult> {
        let start = Instant::now();
        let lock = self.state.acquire_lock().await?;
        let mut state = self.state.load().await?;
        let mut result = ApplyResult::new();

        for name in state.full_deletion_order() {
            if !self.delete_recorded(&mut state, &name, &mut result).await? {
                return self.finish(lock, result, start).await;
            }
            state.outputs.clear();
            self.state.save(&state).await?;
        }

        if state.is_empty() {
            state.stack = None;
            self.state.save(&state).await?;
        }

        self.finish(lock, result, start).await
    }

    /// Output values for the stack from recorded state
    pub async fn outputs(&self, stack: &Stack) -> Result<BTreeMap<String, Value>> {
        let state = self.state.load().await?;
        Ok(resolve_outputs(stack, &state))
    }

    /// Delete one recorded resource and save state
    ///
    /// Returns `false` when the provider call failed; the failure is recorded
    /// in `result`.
    async fn delete_recorded(
        &self,
        state: &mut GlobalState,
        name: &str,
        result: &mut ApplyResult,
    ) -> Result<bool> {
        let Some(recorded) = state.get_resource(name).cloned() else {
            return Ok(true);
        };
        let action_id = format!("delete-{}", name);
        info!(
            "Deleting {} {} ({})",
            recorded.resource_type, name, recorded.id
        );

        match self.provider.delete(&recorded).await {
            Ok(()) => {
                state.remove_resource(name);
                self.state.save(state).await?;
                result.add_success(
                    action_id,
                    format!("Deleted {} {}", recorded.resource_type, name),
                );
                Ok(true)
            }
            Err(e) => {
                result.add_failure(action_id, e.to_string());
                Ok(false)
            }
        }
    }

    fn check_stack_name(&self, stack: &Stack, state: &GlobalState) -> Result<()> {
        match &state.stack {
            Some(recorded) if recorded != &stack.name && !state.is_empty() => {
                Err(CloudError::StateError(format!(
                    "State belongs to stack '{}', not '{}'",
                    recorded, stack.name
                )))
            }
            _ => Ok(()),
        }
    }

    async fn finish(
        &self,
        lock: StateLock,
        mut result: ApplyResult,
        start: Instant,
    ) -> Result<ApplyResult> {
        result.duration_ms = start.elapsed().as_millis() as u64;
        if !result.is_success() {
            warn!("Stopped after {} failed action(s)", result.failed.len());
        }
        lock.release().await?;
        Ok(result)
    }
}

/// Split the teardown of a plan around the provisioning phase
///
/// Replaced resources go first, together with removed resources recorded as
/// depending on one of them. Every other removed resource waits until
/// surviving resources have been moved off it.
fn split_teardown(plan: &Plan, state: &GlobalState) -> (Vec<String>, Vec<String>) {
    let mut before: BTreeSet<&str> = BTreeSet::new();
    let mut after: Vec<&str> = Vec::new();
    for action in plan.actions.iter().filter(|a| a.action_type.tears_down()) {
        match action.action_type {
            ActionType::Replace => {
                before.insert(action.resource_id.as_str());
            }
            _ => after.push(action.resource_id.as_str()),
        }
    }

    loop {
        let remaining = after.len();
        after.retain(|name| {
            let built_on_replaced = state
                .get_resource(name)
                .is_some_and(|r| r.depends_on.iter().any(|d| before.contains(d.as_str())));
            if built_on_replaced {
                before.insert(*name);
            }
            !built_on_replaced
        });
        if after.len() == remaining {
            break;
        }
    }

    let before: Vec<&str> = before.into_iter().collect();
    (state.deletion_order(&before), state.deletion_order(&after))
}

fn status_for(kind: ResourceKind) -> ResourceStatus {
    match kind {
        ResourceKind::Instance => ResourceStatus::Running,
        _ => ResourceStatus::Available,
    }
}

fn past_tense(action_type: ActionType) -> &'static str {
    match action_type {
        ActionType::Create => "Created",
        ActionType::Update => "Updated",
        ActionType::Replace => "Replaced",
        ActionType::Delete => "Deleted",
        ActionType::NoOp => "Unchanged",
    }
}
