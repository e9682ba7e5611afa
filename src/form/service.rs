use std::future::Future;
use std::sync::{Arc, RwLock};
use std::task::{Context, Poll, ready};
use std::time::Duration;

use futures::StreamExt;
use futures::channel::mpsc;
use futures::future::{BoxFuture, FutureExt, poll_fn};
use futures_timer::Delay;
use tracing::{Instrument, debug, debug_span, trace};

use super::controller::{FormController, FormId, FormResult, FormSnapshot, Published, write_lock};
use super::machine::{Effect, FormMachine, MachineInput};
use super::model::{FormContext, FormErrors, FormEvent, FormOptions, FormValues, SubmitError};
use super::validation::{FormSubmitter, FormValidator, run_submission, run_validation};

pub struct FormBuilder<V, E> {
    values: FormValues<V>,
    options: FormOptions,
    validator: Option<Arc<dyn FormValidator<V>>>,
    submitter: Option<Arc<dyn FormSubmitter<V, E>>>,
}

impl<V, E> FormBuilder<V, E>
where
    V: Clone + Send + Sync + 'static,
    E: Clone + Send + Sync + 'static,
{
    pub fn new(initial_values: FormValues<V>) -> Self {
        Self {
            values: initial_values,
            options: FormOptions::default(),
            validator: None,
            submitter: None,
        }
    }

    pub fn options(mut self, options: FormOptions) -> Self {
        self.options = options;
        self
    }

    pub fn validate_on_blur(mut self, validate: bool) -> Self {
        self.options.validate_on_blur = validate;
        self
    }

    pub fn validate_on_change(mut self, validate: bool) -> Self {
        self.options.validate_on_change = validate;
        self
    }

    pub fn on_change_validator_debounce(mut self, debounce: Duration) -> Self {
        self.options.on_change_validator_debounce = debounce;
        self
    }

    pub fn on_validate(mut self, validator: impl FormValidator<V> + 'static) -> Self {
        self.validator = Some(Arc::new(validator));
        self
    }

    pub fn on_submit(mut self, submitter: impl FormSubmitter<V, E> + 'static) -> Self {
        self.submitter = Some(Arc::new(submitter));
        self
    }

    pub fn build(self) -> (FormController<V, E>, FormService<V, E>) {
        let id = FormId::next();
        let machine = FormMachine::new(FormContext::new(self.values, self.options));
        let published = Arc::new(RwLock::new(Published {
            snapshot: FormSnapshot::capture(&machine),
            subscribers: Vec::new(),
        }));
        let (sender, receiver) = mpsc::unbounded();

        let controller = FormController {
            id,
            events: sender,
            published: published.clone(),
        };
        let service = FormService {
            id,
            machine,
            validator: self.validator,
            submitter: self.submitter,
            events: receiver,
            published,
            debounce: None,
            validation: None,
            submission: None,
        };
        (controller, service)
    }
}

type Slot<F> = Option<(u64, F)>;

/// Drives one form: reduces queued events and completions one at a time and
/// owns the debounce timer and the outstanding callback futures.
pub struct FormService<V, E> {
    id: FormId,
    machine: FormMachine<V, E>,
    validator: Option<Arc<dyn FormValidator<V>>>,
    submitter: Option<Arc<dyn FormSubmitter<V, E>>>,
    events: mpsc::UnboundedReceiver<FormEvent<V>>,
    published: Arc<RwLock<Published<V, E>>>,
    debounce: Slot<Delay>,
    validation: Slot<BoxFuture<'static, Result<(), FormErrors>>>,
    submission: Slot<BoxFuture<'static, Result<(), SubmitError<E>>>>,
}

impl<V, E> FormService<V, E>
where
    V: Clone + Send + Sync + 'static,
    E: Clone + Send + Sync + 'static,
{
    pub fn form_id(&self) -> FormId {
        self.id
    }

    /// Runs until every [`FormController`] for this form is dropped.
    /// Pending timers and callbacks are dropped with the service.
    pub async fn run(mut self) -> FormResult<()> {
        let span = debug_span!("form", id = self.id.0);
        async move {
            debug!(state = %self.machine.state(), "form service started");
            loop {
                let Some(input) = poll_fn(|cx| self.poll_input(cx)).await else {
                    break;
                };
                self.dispatch(input)?;
            }
            debug!(state = %self.machine.state(), "form service stopped");
            Ok(())
        }
        .instrument(span)
        .await
    }

    fn poll_input(&mut self, cx: &mut Context<'_>) -> Poll<Option<MachineInput<V, E>>> {
        match self.events.poll_next_unpin(cx) {
            Poll::Ready(Some(event)) => return Poll::Ready(Some(MachineInput::Event(event))),
            Poll::Ready(None) => return Poll::Ready(None),
            Poll::Pending => {}
        }
        if let Poll::Ready((epoch, ())) = poll_slot(&mut self.debounce, cx) {
            return Poll::Ready(Some(MachineInput::DebounceElapsed { epoch }));
        }
        if let Poll::Ready((epoch, outcome)) = poll_slot(&mut self.validation, cx) {
            return Poll::Ready(Some(MachineInput::ValidationSettled { epoch, outcome }));
        }
        if let Poll::Ready((epoch, outcome)) = poll_slot(&mut self.submission, cx) {
            return Poll::Ready(Some(MachineInput::SubmissionSettled { epoch, outcome }));
        }
        Poll::Pending
    }

    fn dispatch(&mut self, input: MachineInput<V, E>) -> FormResult<()> {
        let step = self.machine.transition(input);
        for effect in step.effects {
            self.perform(effect);
        }
        if step.changed {
            self.publish()?;
        }
        Ok(())
    }

    fn perform(&mut self, effect: Effect<V>) {
        match effect {
            Effect::StartDebounce { epoch, delay } => {
                trace!(epoch, ?delay, "starting validator debounce");
                self.debounce = Some((epoch, Delay::new(delay)));
            }
            Effect::CancelDebounce => {
                self.debounce = None;
            }
            Effect::InvokeValidation { epoch, values } => {
                trace!(epoch, "invoking validator");
                let call = run_validation(self.validator.clone(), values);
                self.validation = Some((epoch, call));
            }
            Effect::CancelValidation => {
                if self.validation.take().is_some() {
                    trace!("abandoning validation call");
                }
            }
            Effect::InvokeSubmission { epoch, values } => {
                trace!(epoch, "invoking submitter");
                let call = run_submission(self.submitter.clone(), values);
                self.submission = Some((epoch, call));
            }
            Effect::CancelSubmission => {
                if self.submission.take().is_some() {
                    trace!("abandoning submission call");
                }
            }
        }
    }

    fn publish(&self) -> FormResult<()> {
        let snapshot = FormSnapshot::capture(&self.machine);
        let mut published = write_lock(&self.published, "publishing form snapshot")?;
        published
            .subscribers
            .retain(|subscriber| subscriber.unbounded_send(snapshot.clone()).is_ok());
        published.snapshot = snapshot;
        Ok(())
    }
}

fn poll_slot<F>(slot: &mut Slot<F>, cx: &mut Context<'_>) -> Poll<(u64, F::Output)>
where
    F: Future + Unpin,
{
    let Some((epoch, future)) = slot.as_mut() else {
        return Poll::Pending;
    };
    let output = ready!(future.poll_unpin(cx));
    let epoch = *epoch;
    *slot = None;
    Poll::Ready((epoch, output))
}
