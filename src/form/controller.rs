use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, RwLock, RwLockReadGuard, RwLockWriteGuard};

use futures::channel::mpsc;
use tracing::trace;

use super::machine::{FormMachine, FormState};
use super::model::{
    FieldKey, FormErrors, FormEvent, FormTouched, FormValues, SubmitError,
};

static FORM_ID_ALLOCATOR: AtomicU64 = AtomicU64::new(1);

#[derive(Clone, Copy, Debug, Eq, PartialEq, Ord, PartialOrd, Hash)]
pub struct FormId(pub u64);

impl FormId {
    pub fn next() -> Self {
        Self(FORM_ID_ALLOCATOR.fetch_add(1, Ordering::SeqCst))
    }
}

#[derive(Debug, Clone, Eq, PartialEq, thiserror::Error)]
pub enum FormError {
    #[error("form state lock poisoned while {0}")]
    StatePoisoned(&'static str),
    #[error("form service has stopped")]
    ServiceStopped,
}

pub type FormResult<T> = Result<T, FormError>;

/// What a view renders: the active state plus a copy of the context.
#[derive(Clone, Debug, PartialEq)]
pub struct FormSnapshot<V, E> {
    pub state: FormState,
    pub values: FormValues<V>,
    pub errors: FormErrors,
    pub touched: FormTouched,
    pub submit_error: Option<SubmitError<E>>,
    pub validate_on_blur: bool,
    pub validate_on_change: bool,
    pub is_valid: bool,
}

impl<V, E> FormSnapshot<V, E>
where
    V: Clone,
    E: Clone,
{
    pub(super) fn capture(machine: &FormMachine<V, E>) -> Self {
        let context = machine.context();
        Self {
            state: machine.state(),
            values: context.values.clone(),
            errors: context.errors.clone(),
            touched: context.touched.clone(),
            submit_error: context.submit_error.clone(),
            validate_on_blur: context.validate_on_blur,
            validate_on_change: context.validate_on_change,
            is_valid: context.is_valid(),
        }
    }
}

impl<V, E> FormSnapshot<V, E> {
    pub fn matches(&self, path: &str) -> bool {
        self.state.matches(path)
    }

    pub fn is_touched(&self, field: &str) -> bool {
        self.touched.get(field).copied().unwrap_or(false)
    }

    pub fn error(&self, field: &str) -> Option<&str> {
        self.errors.get(field).map(String::as_str)
    }
}

pub(super) struct Published<V, E> {
    pub(super) snapshot: FormSnapshot<V, E>,
    pub(super) subscribers: Vec<mpsc::UnboundedSender<FormSnapshot<V, E>>>,
}

/// Command surface of a running form. Every command only enqueues an event;
/// the paired [`FormService`](super::FormService) applies it, so a snapshot
/// read right after a command may not reflect it yet.
#[derive(Clone)]
pub struct FormController<V, E>
where
    V: Clone + Send + Sync + 'static,
    E: Clone + Send + Sync + 'static,
{
    pub(super) id: FormId,
    pub(super) events: mpsc::UnboundedSender<FormEvent<V>>,
    pub(super) published: Arc<RwLock<Published<V, E>>>,
}

impl<V, E> FormController<V, E>
where
    V: Clone + Send + Sync + 'static,
    E: Clone + Send + Sync + 'static,
{
    pub fn form_id(&self) -> FormId {
        self.id
    }

    pub fn send(&self, event: FormEvent<V>) -> FormResult<()> {
        trace!(form = self.id.0, event = ?event.kind(), "queueing form event");
        self.events
            .unbounded_send(event)
            .map_err(|_| FormError::ServiceStopped)
    }

    pub fn change(&self, field: impl Into<FieldKey>, value: V) -> FormResult<()> {
        self.send(FormEvent::change(field, value))
    }

    pub fn blur(&self, field: impl Into<FieldKey>) -> FormResult<()> {
        self.send(FormEvent::blur(field))
    }

    pub fn submit(&self) -> FormResult<()> {
        self.send(FormEvent::submit())
    }

    pub fn reset(&self) -> FormResult<()> {
        self.send(FormEvent::reset())
    }

    pub fn set_values(&self, values: FormValues<V>, should_validate: bool) -> FormResult<()> {
        self.send(FormEvent::set_values(values, should_validate))
    }

    pub fn set_field_touched(&self, touched: FormTouched, should_validate: bool) -> FormResult<()> {
        self.send(FormEvent::set_field_touched(touched, should_validate))
    }

    pub fn set_validate_on_blur(&self, should_validate: bool) -> FormResult<()> {
        self.send(FormEvent::set_validate_on_blur(should_validate))
    }

    pub fn set_validate_on_change(&self, should_validate: bool) -> FormResult<()> {
        self.send(FormEvent::set_validate_on_change(should_validate))
    }

    pub fn snapshot(&self) -> FormResult<FormSnapshot<V, E>> {
        Ok(read_lock(&self.published, "reading form snapshot")?
            .snapshot
            .clone())
    }

    pub fn state(&self) -> FormResult<FormState> {
        Ok(read_lock(&self.published, "reading form state")?.snapshot.state)
    }

    pub fn is_valid(&self) -> FormResult<bool> {
        Ok(read_lock(&self.published, "reading form validity")?
            .snapshot
            .is_valid)
    }

    pub fn is_submitting(&self) -> FormResult<bool> {
        Ok(self.state()?.is_submitting())
    }

    /// Stream of snapshots, starting with the current one and followed by one
    /// per processed input that changed the form.
    pub fn subscribe(&self) -> FormResult<mpsc::UnboundedReceiver<FormSnapshot<V, E>>> {
        let (sender, receiver) = mpsc::unbounded();
        let mut published = write_lock(&self.published, "subscribing to form snapshots")?;
        sender
            .unbounded_send(published.snapshot.clone())
            .map_err(|_| FormError::ServiceStopped)?;
        published.subscribers.push(sender);
        Ok(receiver)
    }
}

pub(super) fn read_lock<'a, T>(
    lock: &'a RwLock<T>,
    context: &'static str,
) -> FormResult<RwLockReadGuard<'a, T>> {
    lock.read().map_err(|_| FormError::StatePoisoned(context))
}

pub(super) fn write_lock<'a, T>(
    lock: &'a RwLock<T>,
    context: &'static str,
) -> FormResult<RwLockWriteGuard<'a, T>> {
    lock.write().map_err(|_| FormError::StatePoisoned(context))
}
