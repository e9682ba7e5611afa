use std::fmt::{Display, Formatter};
use std::time::Duration;

use tracing::{debug, trace};

use super::model::{FormContext, FormErrors, FormEvent, FormEventKind, FormValues, SubmitError};

#[derive(Clone, Copy, Debug, Eq, PartialEq, Hash)]
pub enum SubmitPhase {
    ValidatingBeforeSubmit,
    SuccessfulValidation,
}

#[derive(Clone, Copy, Debug, Default, Eq, PartialEq, Hash)]
pub enum FormState {
    #[default]
    Idle,
    Changing,
    Validating,
    Submitting(SubmitPhase),
}

impl FormState {
    pub fn path(self) -> &'static str {
        match self {
            FormState::Idle => "idle",
            FormState::Changing => "changing",
            FormState::Validating => "validating",
            FormState::Submitting(SubmitPhase::ValidatingBeforeSubmit) => {
                "submitting.validatingBeforeSubmit"
            }
            FormState::Submitting(SubmitPhase::SuccessfulValidation) => {
                "submitting.successfulValidation"
            }
        }
    }

    /// `"submitting"` matches both submit phases, a full path matches exactly.
    pub fn matches(self, path: &str) -> bool {
        let own = self.path();
        own == path
            || own
                .strip_prefix(path)
                .is_some_and(|rest| rest.starts_with('.'))
    }

    pub fn is_validating(self) -> bool {
        matches!(
            self,
            FormState::Validating | FormState::Submitting(SubmitPhase::ValidatingBeforeSubmit)
        )
    }

    pub fn is_submitting(self) -> bool {
        matches!(self, FormState::Submitting(_))
    }

    fn leaf(self) -> StateNode {
        match self {
            FormState::Idle => StateNode::Idle,
            FormState::Changing => StateNode::Changing,
            FormState::Validating => StateNode::Validating,
            FormState::Submitting(SubmitPhase::ValidatingBeforeSubmit) => {
                StateNode::ValidatingBeforeSubmit
            }
            FormState::Submitting(SubmitPhase::SuccessfulValidation) => {
                StateNode::SuccessfulValidation
            }
        }
    }
}

impl Display for FormState {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.path())
    }
}

#[derive(Clone, Copy, Debug, Eq, PartialEq)]
enum StateNode {
    Root,
    Idle,
    Changing,
    Validating,
    Submitting,
    ValidatingBeforeSubmit,
    SuccessfulValidation,
}

impl StateNode {
    fn parent(self) -> Option<StateNode> {
        match self {
            StateNode::Root => None,
            StateNode::Idle
            | StateNode::Changing
            | StateNode::Validating
            | StateNode::Submitting => Some(StateNode::Root),
            StateNode::ValidatingBeforeSubmit | StateNode::SuccessfulValidation => {
                Some(StateNode::Submitting)
            }
        }
    }

    fn initial_child(self) -> Option<StateNode> {
        match self {
            StateNode::Root => Some(StateNode::Idle),
            StateNode::Submitting => Some(StateNode::ValidatingBeforeSubmit),
            _ => None,
        }
    }

    fn is_proper_ancestor_of(self, other: StateNode) -> bool {
        let mut cursor = other.parent();
        while let Some(node) = cursor {
            if node == self {
                return true;
            }
            cursor = node.parent();
        }
        false
    }

    /// Nodes from the root down to `self`, inclusive.
    fn path(self) -> Vec<StateNode> {
        let mut nodes = vec![self];
        let mut cursor = self.parent();
        while let Some(node) = cursor {
            nodes.push(node);
            cursor = node.parent();
        }
        nodes.reverse();
        nodes
    }

    fn as_state(self) -> Option<FormState> {
        match self {
            StateNode::Idle => Some(FormState::Idle),
            StateNode::Changing => Some(FormState::Changing),
            StateNode::Validating => Some(FormState::Validating),
            StateNode::ValidatingBeforeSubmit => Some(FormState::Submitting(
                SubmitPhase::ValidatingBeforeSubmit,
            )),
            StateNode::SuccessfulValidation => {
                Some(FormState::Submitting(SubmitPhase::SuccessfulValidation))
            }
            StateNode::Root | StateNode::Submitting => None,
        }
    }
}

#[derive(Clone, Copy, Debug, Eq, PartialEq, Hash)]
pub enum InputKind {
    Event(FormEventKind),
    DebounceElapsed,
    ValidationDone,
    ValidationFailed,
    SubmissionDone,
    SubmissionFailed,
}

/// Everything the reducer accepts: user events plus completions of the
/// work it scheduled. Completions carry the epoch of the state entry that
/// requested them.
#[derive(Clone, Debug, PartialEq)]
pub enum MachineInput<V, E> {
    Event(FormEvent<V>),
    DebounceElapsed {
        epoch: u64,
    },
    ValidationSettled {
        epoch: u64,
        outcome: Result<(), FormErrors>,
    },
    SubmissionSettled {
        epoch: u64,
        outcome: Result<(), SubmitError<E>>,
    },
}

impl<V, E> MachineInput<V, E> {
    pub fn kind(&self) -> InputKind {
        match self {
            MachineInput::Event(event) => InputKind::Event(event.kind()),
            MachineInput::DebounceElapsed { .. } => InputKind::DebounceElapsed,
            MachineInput::ValidationSettled { outcome, .. } => match outcome {
                Ok(()) => InputKind::ValidationDone,
                Err(_) => InputKind::ValidationFailed,
            },
            MachineInput::SubmissionSettled { outcome, .. } => match outcome {
                Ok(()) => InputKind::SubmissionDone,
                Err(_) => InputKind::SubmissionFailed,
            },
        }
    }

    pub fn epoch(&self) -> Option<u64> {
        match self {
            MachineInput::Event(_) => None,
            MachineInput::DebounceElapsed { epoch }
            | MachineInput::ValidationSettled { epoch, .. }
            | MachineInput::SubmissionSettled { epoch, .. } => Some(*epoch),
        }
    }
}

impl<V, E> From<FormEvent<V>> for MachineInput<V, E> {
    fn from(event: FormEvent<V>) -> Self {
        MachineInput::Event(event)
    }
}

/// Work the driver performs on behalf of the machine.
#[derive(Clone, Debug, PartialEq)]
pub enum Effect<V> {
    StartDebounce { epoch: u64, delay: Duration },
    CancelDebounce,
    InvokeValidation { epoch: u64, values: FormValues<V> },
    CancelValidation,
    InvokeSubmission { epoch: u64, values: FormValues<V> },
    CancelSubmission,
}

#[derive(Clone, Copy, Debug, Eq, PartialEq)]
enum Guard {
    ShouldValidateOnChange,
    ShouldValidateOnBlur,
    ShouldValidateOnSetValues,
    ShouldValidateOnSetFieldTouched,
}

#[derive(Clone, Copy, Debug, Eq, PartialEq)]
enum Action {
    ReportChange,
    ReportErrors,
    ReportSubmitError,
    ClearErrors,
    ClearSubmitError,
    ResetForm,
    ReportFieldTouched,
    MergeValues,
    MergeTouched,
    SetValidateOnBlur,
    SetValidateOnChange,
}

struct TransitionRow {
    source: StateNode,
    input: InputKind,
    guard: Option<Guard>,
    actions: &'static [Action],
    target: Option<StateNode>,
}

const fn row(
    source: StateNode,
    input: InputKind,
    guard: Option<Guard>,
    actions: &'static [Action],
    target: Option<StateNode>,
) -> TransitionRow {
    TransitionRow {
        source,
        input,
        guard,
        actions,
        target,
    }
}

const fn on(kind: FormEventKind) -> InputKind {
    InputKind::Event(kind)
}

// Rows of one source are tried top to bottom; the innermost source with a
// passing row wins.
static TRANSITIONS: &[TransitionRow] = &[
    row(
        StateNode::Idle,
        on(FormEventKind::Submit),
        None,
        &[Action::ClearErrors],
        Some(StateNode::Submitting),
    ),
    row(
        StateNode::Changing,
        InputKind::DebounceElapsed,
        Some(Guard::ShouldValidateOnChange),
        &[],
        Some(StateNode::Validating),
    ),
    row(
        StateNode::Changing,
        InputKind::DebounceElapsed,
        None,
        &[],
        Some(StateNode::Idle),
    ),
    row(
        StateNode::Validating,
        InputKind::ValidationDone,
        None,
        &[],
        Some(StateNode::Idle),
    ),
    row(
        StateNode::Validating,
        InputKind::ValidationFailed,
        None,
        &[Action::ReportErrors],
        Some(StateNode::Idle),
    ),
    row(
        StateNode::Validating,
        on(FormEventKind::Submit),
        None,
        &[],
        Some(StateNode::Submitting),
    ),
    row(
        StateNode::ValidatingBeforeSubmit,
        InputKind::ValidationDone,
        None,
        &[Action::ClearErrors],
        Some(StateNode::SuccessfulValidation),
    ),
    row(
        StateNode::ValidatingBeforeSubmit,
        InputKind::ValidationFailed,
        None,
        &[Action::ReportErrors],
        Some(StateNode::Idle),
    ),
    row(
        StateNode::SuccessfulValidation,
        InputKind::SubmissionDone,
        None,
        &[Action::ClearSubmitError],
        Some(StateNode::Idle),
    ),
    row(
        StateNode::SuccessfulValidation,
        InputKind::SubmissionFailed,
        None,
        &[Action::ReportSubmitError],
        Some(StateNode::Idle),
    ),
    row(
        StateNode::Root,
        on(FormEventKind::Change),
        None,
        &[Action::ReportChange, Action::ClearErrors],
        Some(StateNode::Changing),
    ),
    row(
        StateNode::Root,
        on(FormEventKind::Blur),
        Some(Guard::ShouldValidateOnBlur),
        &[Action::ReportFieldTouched, Action::ClearErrors],
        Some(StateNode::Validating),
    ),
    row(
        StateNode::Root,
        on(FormEventKind::Blur),
        None,
        &[Action::ReportFieldTouched, Action::ClearErrors],
        None,
    ),
    row(
        StateNode::Root,
        on(FormEventKind::Reset),
        None,
        &[Action::ResetForm],
        Some(StateNode::Idle),
    ),
    row(
        StateNode::Root,
        on(FormEventKind::SetValues),
        Some(Guard::ShouldValidateOnSetValues),
        &[Action::MergeValues, Action::ClearErrors],
        Some(StateNode::Validating),
    ),
    row(
        StateNode::Root,
        on(FormEventKind::SetValues),
        None,
        &[Action::MergeValues, Action::ClearErrors],
        Some(StateNode::Idle),
    ),
    row(
        StateNode::Root,
        on(FormEventKind::SetFieldTouched),
        Some(Guard::ShouldValidateOnSetFieldTouched),
        &[Action::MergeTouched, Action::ClearErrors],
        Some(StateNode::Validating),
    ),
    row(
        StateNode::Root,
        on(FormEventKind::SetFieldTouched),
        None,
        &[Action::MergeTouched, Action::ClearErrors],
        Some(StateNode::Idle),
    ),
    row(
        StateNode::Root,
        on(FormEventKind::SetValidateOnBlur),
        None,
        &[Action::SetValidateOnBlur],
        None,
    ),
    row(
        StateNode::Root,
        on(FormEventKind::SetValidateOnChange),
        None,
        &[Action::SetValidateOnChange],
        None,
    ),
];

/// Outcome of reducing one input.
#[derive(Debug, PartialEq)]
pub struct Step<V> {
    pub effects: Vec<Effect<V>>,
    pub changed: bool,
}

impl<V> Step<V> {
    fn ignored() -> Self {
        Self {
            effects: Vec::new(),
            changed: false,
        }
    }
}

/// Pure form state machine: state, context and the epoch of the last state
/// entry. Time and I/O live in the driver.
#[derive(Clone, Debug)]
pub struct FormMachine<V, E> {
    state: FormState,
    context: FormContext<V, E>,
    epoch: u64,
}

impl<V, E> FormMachine<V, E>
where
    V: Clone,
    E: Clone,
{
    pub fn new(context: FormContext<V, E>) -> Self {
        Self {
            state: FormState::Idle,
            context,
            epoch: 0,
        }
    }

    pub fn state(&self) -> FormState {
        self.state
    }

    pub fn context(&self) -> &FormContext<V, E> {
        &self.context
    }

    pub fn epoch(&self) -> u64 {
        self.epoch
    }

    pub fn transition(&mut self, input: impl Into<MachineInput<V, E>>) -> Step<V> {
        let input = input.into();
        let kind = input.kind();

        if let Some(epoch) = input.epoch() {
            if epoch != self.epoch {
                trace!(
                    state = %self.state,
                    input = ?kind,
                    epoch,
                    current_epoch = self.epoch,
                    "ignoring stale completion"
                );
                return Step::ignored();
            }
        }

        let Some(row) = self.select(kind, &input) else {
            trace!(state = %self.state, input = ?kind, "no transition for input");
            return Step::ignored();
        };

        let previous = self.state;
        let mut effects = Vec::new();

        let Some(target) = row.target else {
            for action in row.actions {
                self.apply(*action, &input);
            }
            debug!(state = %self.state, input = ?kind, "form context updated");
            return Step {
                effects,
                changed: !row.actions.is_empty(),
            };
        };

        let domain = transition_domain(row.source, target);
        for node in self.state.leaf().path().into_iter().rev() {
            if domain.is_proper_ancestor_of(node) {
                effects.extend(exit_effect(node));
            }
        }

        for action in row.actions {
            self.apply(*action, &input);
        }

        let entered = entry_path(domain, target);
        if let Some(leaf) = entered.last().and_then(|node| node.as_state()) {
            self.state = leaf;
        }
        self.epoch = self.epoch.wrapping_add(1);
        for node in entered {
            effects.extend(self.entry_effect(node));
        }

        debug!(from = %previous, to = %self.state, input = ?kind, epoch = self.epoch, "form transition");
        Step {
            effects,
            changed: true,
        }
    }

    fn select(&self, kind: InputKind, input: &MachineInput<V, E>) -> Option<&'static TransitionRow> {
        self.state.leaf().path().into_iter().rev().find_map(|node| {
            TRANSITIONS
                .iter()
                .filter(|row| row.source == node && row.input == kind)
                .find(|row| row.guard.is_none_or(|guard| self.check(guard, input)))
        })
    }

    fn check(&self, guard: Guard, input: &MachineInput<V, E>) -> bool {
        match guard {
            Guard::ShouldValidateOnChange => self.context.validate_on_change,
            Guard::ShouldValidateOnBlur => self.context.validate_on_blur,
            Guard::ShouldValidateOnSetValues => matches!(
                input,
                MachineInput::Event(FormEvent::SetValues {
                    should_validate: true,
                    ..
                })
            ),
            Guard::ShouldValidateOnSetFieldTouched => matches!(
                input,
                MachineInput::Event(FormEvent::SetFieldTouched {
                    should_validate: true,
                    ..
                })
            ),
        }
    }

    fn apply(&mut self, action: Action, input: &MachineInput<V, E>) {
        let context = &mut self.context;
        match (action, input) {
            (Action::ReportChange, MachineInput::Event(FormEvent::Change { field, value })) => {
                context.values.insert(field.clone(), value.clone());
            }
            (
                Action::ReportErrors,
                MachineInput::ValidationSettled {
                    outcome: Err(errors),
                    ..
                },
            ) => {
                context.errors = errors.clone();
            }
            (
                Action::ReportSubmitError,
                MachineInput::SubmissionSettled {
                    outcome: Err(error),
                    ..
                },
            ) => {
                context.submit_error = Some(error.clone());
            }
            (Action::ClearErrors, _) => {
                context.errors.clear();
                context.submit_error = None;
            }
            (Action::ClearSubmitError, _) => {
                context.submit_error = None;
            }
            (Action::ResetForm, _) => {
                context.values.clear();
                context.errors.clear();
                context.touched.clear();
                context.submit_error = None;
            }
            (Action::ReportFieldTouched, MachineInput::Event(FormEvent::Blur { field })) => {
                context.touched.insert(field.clone(), true);
            }
            (
                Action::MergeValues,
                MachineInput::Event(FormEvent::SetValues { values, .. }),
            ) => {
                context
                    .values
                    .extend(values.iter().map(|(key, value)| (key.clone(), value.clone())));
            }
            (
                Action::MergeTouched,
                MachineInput::Event(FormEvent::SetFieldTouched { touched, .. }),
            ) => {
                // Flags only go up; RESET is the sole way back to untouched.
                for (key, flag) in touched {
                    *context.touched.entry(key.clone()).or_default() |= *flag;
                }
            }
            (
                Action::SetValidateOnBlur,
                MachineInput::Event(FormEvent::SetValidateOnBlur { should_validate }),
            ) => {
                context.validate_on_blur = *should_validate;
            }
            (
                Action::SetValidateOnChange,
                MachineInput::Event(FormEvent::SetValidateOnChange { should_validate }),
            ) => {
                context.validate_on_change = *should_validate;
            }
            (action, input) => {
                trace!(?action, input = ?input.kind(), "action does not apply to input");
            }
        }
    }

    fn entry_effect(&self, node: StateNode) -> Option<Effect<V>> {
        match node {
            StateNode::Changing => Some(Effect::StartDebounce {
                epoch: self.epoch,
                delay: self.context.validator_debounce(),
            }),
            StateNode::Validating | StateNode::ValidatingBeforeSubmit => {
                Some(Effect::InvokeValidation {
                    epoch: self.epoch,
                    values: self.context.values.clone(),
                })
            }
            StateNode::SuccessfulValidation => Some(Effect::InvokeSubmission {
                epoch: self.epoch,
                values: self.context.values.clone(),
            }),
            StateNode::Root | StateNode::Idle | StateNode::Submitting => None,
        }
    }
}

fn exit_effect<V>(node: StateNode) -> Option<Effect<V>> {
    match node {
        StateNode::Changing => Some(Effect::CancelDebounce),
        StateNode::Validating | StateNode::ValidatingBeforeSubmit => Some(Effect::CancelValidation),
        StateNode::SuccessfulValidation => Some(Effect::CancelSubmission),
        StateNode::Root | StateNode::Idle | StateNode::Submitting => None,
    }
}

/// Deepest node that is a proper ancestor of both ends. Transitions declared
/// on the root always re-enter their target.
fn transition_domain(source: StateNode, target: StateNode) -> StateNode {
    let mut cursor = source.parent();
    while let Some(node) = cursor {
        if node.is_proper_ancestor_of(target) {
            return node;
        }
        cursor = node.parent();
    }
    StateNode::Root
}

/// Nodes entered below `domain` to reach `target`, outermost first, followed
/// by initial children of compound targets.
fn entry_path(domain: StateNode, target: StateNode) -> Vec<StateNode> {
    let mut nodes = target
        .path()
        .into_iter()
        .filter(|node| domain.is_proper_ancestor_of(*node))
        .collect::<Vec<_>>();
    while let Some(child) = nodes.last().and_then(|node| node.initial_child()) {
        nodes.push(child);
    }
    nodes
}
