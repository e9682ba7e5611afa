mod controller;
mod machine;
mod model;
mod service;
mod validation;


pub use controller::{FormController, FormError, FormId, FormResult, FormSnapshot};
pub use form_machine_derive::FormModel;
pub use machine::{Effect, FormMachine, FormState, InputKind, MachineInput, Step, SubmitPhase};
pub use model::{
    DEFAULT_VALIDATOR_DEBOUNCE, FieldKey, FormContext, FormErrors, FormEvent, FormEventKind,
    FormModel, FormOptions, FormTouched, FormValues, SubmitError, field_map,
};
pub use service::{FormBuilder, FormService};
pub use validation::{BoxedSubmitFuture, BoxedValidationFuture, FormSubmitter, FormValidator};
