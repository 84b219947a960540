use super::{Batch, Handle};

/// Represents a single experience or transition in the environment
///
/// ### Type Parameters:
/// - `S`: State
/// - `A`: Action
#[derive(Debug, Clone, PartialEq)]
pub struct Exp<S, A> {
    /// The state of the environment before taking the action
    pub state: S,
    /// The action taken in the given state
    pub action: A,
    /// The state of the environment after the action is taken, or if terminal, `None`
    pub next_state: Option<S>,
    /// The reward received after taking the action
    pub reward: f32,
}

impl<S, A> Exp<S, A> {
    /// Whether the action ended the episode
    pub fn is_terminal(&self) -> bool {
        self.next_state.is_none()
    }
}

/// A zipped batch of [experiences](Exp)
#[derive(Clone, Debug, PartialEq)]
pub struct ExpBatch<S, A> {
    /// The state of the environment before taking the action
    pub states: Vec<S>,
    /// The action taken in the given state
    pub actions: Vec<A>,
    /// The state of the environment after the action is taken, or if terminal, `None`
    pub next_states: Vec<Option<S>>,
    /// The reward received after taking the action
    pub rewards: Vec<f32>,
}

impl<S, A> ExpBatch<S, A> {
    /// Construct an `ExpBatch` from an iterator of [experiences](Exp) and a specified batch size
    pub fn from_iter(iter: impl IntoIterator<Item = Exp<S, A>>, batch_size: usize) -> Self {
        let batch = Self {
            states: Vec::with_capacity(batch_size),
            actions: Vec::with_capacity(batch_size),
            next_states: Vec::with_capacity(batch_size),
            rewards: Vec::with_capacity(batch_size),
        };

        iter.into_iter().fold(batch, |mut b, e| {
            b.states.push(e.state);
            b.actions.push(e.action);
            b.next_states.push(e.next_state);
            b.rewards.push(e.reward);
            b
        })
    }
}

/// A sampled batch zipped into columns, along with its handles and optional weights
pub type ZippedBatch<S, A> = (ExpBatch<S, A>, Vec<Handle>, Option<Vec<f32>>);

impl<S, A> Batch<Exp<S, A>> {
    /// Zip the sampled experiences into a tuple of vectors
    pub fn zipped(self) -> ZippedBatch<S, A> {
        let batch_size = self.samples.len();
        let batch = ExpBatch::from_iter(self.samples, batch_size);
        (batch, self.handles, self.weights)
    }
}
