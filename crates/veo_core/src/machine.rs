//! Generic linear, reversible state machine.
//!
//! A [`Catalogue`] lists the states in order together with one forward
//! transition and one rollback transition per pair of neighbouring states.
//! The [`StateMachine`] walks forward until the last state is reached. When
//! a forward transition fails it switches to rollback and walks backward
//! through the rollback transitions until the first state is reached or a
//! rollback transition fails too.
//!
//! # Example
//!
//! ```rust,ignore
//! let catalogue = Catalogue::new(vec![State::A, State::B])
//!     .forward(State::A, State::B, Arc::new(DoSomething))
//!     .rollback(State::B, State::A, Arc::new(NoOperation));
//!
//! let mut machine = StateMachine::new(catalogue, State::A, context, hooks)?;
//! let completed = machine.run().await;
//! ```

use std::fmt::Debug;
use std::sync::Arc;

use async_trait::async_trait;
use tracing::{debug, info, warn};

use crate::error::{CoreError, CoreResult};

/// One unit of work moving the machine between two neighbouring states.
///
/// A transition reports success or failure only. It must not update the
/// context when it fails.
#[async_trait]
pub trait Transition<C>: Send + Sync {
    /// Stable name, used in events and logs.
    fn name(&self) -> &str;

    async fn execute(&self, context: &mut C) -> bool;
}

/// A transition with nothing to do.
#[derive(Debug, Clone, Default)]
pub struct NoOperation {
    name: String,
}

impl NoOperation {
    pub fn new() -> Self {
        Self {
            name: "no_operation".to_string(),
        }
    }

    /// A no-op carrying a specific name.
    pub fn named(name: impl Into<String>) -> Self {
        Self { name: name.into() }
    }
}

#[async_trait]
impl<C: Send + Sync + 'static> Transition<C> for NoOperation {
    fn name(&self) -> &str {
        &self.name
    }

    async fn execute(&self, _context: &mut C) -> bool {
        true
    }
}

/// Callbacks invoked by the machine while it runs.
#[async_trait]
pub trait MachineHooks<S, C>: Send + Sync {
    /// Called after a successful transition moved the machine to `new`.
    async fn state_changed(&self, context: &mut C, old: S, new: S);

    fn transition_started(&self, context: &C, name: &str);

    fn transition_ended(&self, context: &C, name: &str);

    fn transition_failed(&self, context: &C, name: &str);

    /// Called once, when a forward failure switches the machine to rollback.
    async fn aborted(&self, context: &mut C);
}

/// A transition bound to the pair of states it moves between.
pub struct TransitionEntry<S, C> {
    pub from: S,
    pub to: S,
    pub transition: Arc<dyn Transition<C>>,
}

impl<S: Copy, C> Clone for TransitionEntry<S, C> {
    fn clone(&self) -> Self {
        Self {
            from: self.from,
            to: self.to,
            transition: Arc::clone(&self.transition),
        }
    }
}

/// Ordered states with their forward and rollback transitions.
pub struct Catalogue<S, C> {
    states: Vec<S>,
    forward: Vec<TransitionEntry<S, C>>,
    rollback: Vec<TransitionEntry<S, C>>,
}

impl<S, C> Catalogue<S, C>
where
    S: Copy + PartialEq + Debug + Send + Sync + 'static,
    C: Send + Sync + 'static,
{
    /// Create a catalogue over states given in forward order.
    pub fn new(states: Vec<S>) -> Self {
        Self {
            states,
            forward: Vec::new(),
            rollback: Vec::new(),
        }
    }

    /// Add a forward transition.
    pub fn forward(mut self, from: S, to: S, transition: Arc<dyn Transition<C>>) -> Self {
        self.forward.push(TransitionEntry { from, to, transition });
        self
    }

    /// Add a rollback transition.
    pub fn rollback(mut self, from: S, to: S, transition: Arc<dyn Transition<C>>) -> Self {
        self.rollback.push(TransitionEntry { from, to, transition });
        self
    }

    pub fn contains(&self, state: S) -> bool {
        self.states.contains(&state)
    }

    /// Transition leading from `state` to the state after it.
    pub fn next_forward(&self, state: S) -> Option<&TransitionEntry<S, C>> {
        let index = self.index_of(state)?;
        let to = *self.states.get(index + 1)?;
        self.forward.iter().find(|entry| entry.from == state && entry.to == to)
    }

    /// Transition leading from `state` back to the state before it.
    pub fn next_rollback(&self, state: S) -> Option<&TransitionEntry<S, C>> {
        let index = self.index_of(state)?;
        let to = *self.states.get(index.checked_sub(1)?)?;
        self.rollback.iter().find(|entry| entry.from == state && entry.to == to)
    }

    fn index_of(&self, state: S) -> Option<usize> {
        self.states.iter().position(|s| *s == state)
    }
}

/// Runs a catalogue of transitions against a context.
pub struct StateMachine<S, C> {
    catalogue: Catalogue<S, C>,
    state: S,
    rolling_back: bool,
    context: C,
    hooks: Arc<dyn MachineHooks<S, C>>,
}

impl<S, C> StateMachine<S, C>
where
    S: Copy + PartialEq + Debug + Send + Sync + 'static,
    C: Send + Sync + 'static,
{
    /// Create a machine positioned at `initial`.
    pub fn new(
        catalogue: Catalogue<S, C>,
        initial: S,
        context: C,
        hooks: Arc<dyn MachineHooks<S, C>>,
    ) -> CoreResult<Self> {
        if !catalogue.contains(initial) {
            return Err(CoreError::InvalidState(format!(
                "state {:?} is not part of the catalogue",
                initial
            )));
        }
        Ok(Self {
            catalogue,
            state: initial,
            rolling_back: false,
            context,
            hooks,
        })
    }

    pub fn state(&self) -> S {
        self.state
    }

    pub fn is_rolling_back(&self) -> bool {
        self.rolling_back
    }

    pub fn context(&self) -> &C {
        &self.context
    }

    pub fn into_context(self) -> C {
        self.context
    }

    fn next_transition(&self) -> Option<TransitionEntry<S, C>> {
        if self.rolling_back {
            self.catalogue.next_rollback(self.state).cloned()
        } else {
            self.catalogue.next_forward(self.state).cloned()
        }
    }

    /// Run transitions until none is left.
    ///
    /// Returns `true` when the last state was reached going forward and
    /// `false` once the machine went into rollback, whether or not the
    /// rollback completed.
    pub async fn run(&mut self) -> bool {
        loop {
            let entry = match self.next_transition() {
                Some(entry) => entry,
                None => {
                    if self.rolling_back {
                        info!("Rollback finished at state {:?}", self.state);
                    } else {
                        info!("Forward path finished at state {:?}", self.state);
                    }
                    return !self.rolling_back;
                }
            };

            let name = entry.transition.name().to_string();
            debug!("Executing transition '{}' ({:?} -> {:?})", name, entry.from, entry.to);
            self.hooks.transition_started(&self.context, &name);

            if entry.transition.execute(&mut self.context).await {
                self.hooks.transition_ended(&self.context, &name);
                let old = self.state;
                self.state = entry.to;
                self.hooks.state_changed(&mut self.context, old, entry.to).await;
                continue;
            }

            self.hooks.transition_failed(&self.context, &name);
            if self.rolling_back {
                warn!(
                    "Rollback transition '{}' failed, stuck at state {:?}",
                    name, self.state
                );
                return false;
            }

            warn!("Transition '{}' failed at state {:?}, rolling back", name, self.state);
            self.rolling_back = true;
            self.hooks.aborted(&mut self.context).await;
        }
    }
}
