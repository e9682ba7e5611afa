pub mod form;
pub mod prelude;

pub use form::{FormBuilder, FormController, FormService, FormSnapshot, FormState};
