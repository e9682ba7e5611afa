use std::any::Any;
use std::future::Future;
use std::panic::AssertUnwindSafe;
use std::pin::Pin;
use std::sync::Arc;

use futures::FutureExt;
use futures::future::BoxFuture;
use tracing::warn;

use super::model::{FieldKey, FormErrors, FormValues, SubmitError};

pub type BoxedValidationFuture = Pin<Box<dyn Future<Output = Result<(), FormErrors>> + Send>>;
pub type BoxedSubmitFuture<E> = Pin<Box<dyn Future<Output = Result<(), E>> + Send>>;

/// Form-wide validation callback. Rejects with the errors keyed by field.
pub trait FormValidator<V>: Send + Sync {
    fn validate(&self, values: FormValues<V>) -> BoxedValidationFuture;
}

impl<V, F, Fut> FormValidator<V> for F
where
    F: Fn(FormValues<V>) -> Fut + Send + Sync,
    Fut: Future<Output = Result<(), FormErrors>> + Send + 'static,
{
    fn validate(&self, values: FormValues<V>) -> BoxedValidationFuture {
        Box::pin((self)(values))
    }
}

/// Submission callback. Rejects with an error opaque to the form.
pub trait FormSubmitter<V, E>: Send + Sync {
    fn submit(&self, values: FormValues<V>) -> BoxedSubmitFuture<E>;
}

impl<V, E, F, Fut> FormSubmitter<V, E> for F
where
    F: Fn(FormValues<V>) -> Fut + Send + Sync,
    Fut: Future<Output = Result<(), E>> + Send + 'static,
{
    fn submit(&self, values: FormValues<V>) -> BoxedSubmitFuture<E> {
        Box::pin((self)(values))
    }
}

/// Runs one validation call. A missing validator always succeeds and a
/// panic is recorded under [`FieldKey::FORM`].
pub(super) fn run_validation<V>(
    validator: Option<Arc<dyn FormValidator<V>>>,
    values: FormValues<V>,
) -> BoxFuture<'static, Result<(), FormErrors>>
where
    V: Send + 'static,
{
    let call = async move {
        match validator {
            Some(validator) => validator.validate(values).await,
            None => Ok(()),
        }
    };
    AssertUnwindSafe(call)
        .catch_unwind()
        .map(|result| {
            result.unwrap_or_else(|payload| {
                let message = panic_message(payload.as_ref());
                warn!(%message, "form validator panicked");
                Err(FormErrors::from([(FieldKey::form(), message)]))
            })
        })
        .boxed()
}

/// Runs one submission call. A missing submitter always succeeds and a
/// panic is recorded as [`SubmitError::Panicked`].
pub(super) fn run_submission<V, E>(
    submitter: Option<Arc<dyn FormSubmitter<V, E>>>,
    values: FormValues<V>,
) -> BoxFuture<'static, Result<(), SubmitError<E>>>
where
    V: Send + 'static,
    E: Send + 'static,
{
    let call = async move {
        match submitter {
            Some(submitter) => submitter.submit(values).await,
            None => Ok(()),
        }
    };
    AssertUnwindSafe(call)
        .catch_unwind()
        .map(|result| match result {
            Ok(outcome) => outcome.map_err(SubmitError::Rejected),
            Err(payload) => {
                let message = panic_message(payload.as_ref());
                warn!(%message, "form submitter panicked");
                Err(SubmitError::Panicked(message))
            }
        })
        .boxed()
}

fn panic_message(payload: &(dyn Any + Send)) -> String {
    if let Some(message) = payload.downcast_ref::<&'static str>() {
        (*message).to_string()
    } else if let Some(message) = payload.downcast_ref::<String>() {
        message.clone()
    } else {
        "unknown panic".to_string()
    }
}
