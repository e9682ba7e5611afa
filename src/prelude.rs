pub use crate::form::{
    FieldKey, FormBuilder, FormController, FormError, FormErrors, FormEvent, FormModel,
    FormOptions, FormResult, FormService, FormSnapshot, FormState, FormSubmitter, FormTouched,
    FormValidator, FormValues, SubmitError, SubmitPhase, field_map,
};
