use std::borrow::Borrow;
use std::collections::BTreeMap;
use std::fmt::{Display, Formatter};
use std::sync::Arc;
use std::time::Duration;

pub const DEFAULT_VALIDATOR_DEBOUNCE: Duration = Duration::from_millis(500);

#[derive(Clone, Debug, Eq, PartialEq, Ord, PartialOrd, Hash)]
pub struct FieldKey(Arc<str>);

impl FieldKey {
    /// Key under which form-level validation failures are reported.
    pub const FORM: &'static str = "_form";

    pub fn new(value: impl AsRef<str>) -> Self {
        Self(Arc::from(value.as_ref()))
    }

    pub fn form() -> Self {
        Self::new(Self::FORM)
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl Display for FieldKey {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        f.write_str(&self.0)
    }
}

impl Borrow<str> for FieldKey {
    fn borrow(&self) -> &str {
        &self.0
    }
}

impl From<&str> for FieldKey {
    fn from(value: &str) -> Self {
        Self::new(value)
    }
}

impl From<String> for FieldKey {
    fn from(value: String) -> Self {
        Self(Arc::from(value))
    }
}

impl From<&String> for FieldKey {
    fn from(value: &String) -> Self {
        Self::new(value)
    }
}

pub type FormValues<V> = BTreeMap<FieldKey, V>;
pub type FormErrors = BTreeMap<FieldKey, String>;
pub type FormTouched = BTreeMap<FieldKey, bool>;

/// Builds a map keyed by [`FieldKey`] from any iterator of `(name, value)` pairs.
pub fn field_map<K, T, I>(entries: I) -> BTreeMap<FieldKey, T>
where
    K: Into<FieldKey>,
    I: IntoIterator<Item = (K, T)>,
{
    entries
        .into_iter()
        .map(|(key, value)| (key.into(), value))
        .collect()
}

#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub struct FormOptions {
    pub validate_on_blur: bool,
    pub validate_on_change: bool,
    pub on_change_validator_debounce: Duration,
}

impl Default for FormOptions {
    fn default() -> Self {
        Self {
            validate_on_blur: false,
            validate_on_change: false,
            on_change_validator_debounce: DEFAULT_VALIDATOR_DEBOUNCE,
        }
    }
}

/// Value recorded in the submit error channel.
#[derive(Clone, Debug, Eq, PartialEq)]
pub enum SubmitError<E> {
    Rejected(E),
    Panicked(String),
}

impl<E> SubmitError<E> {
    pub fn rejected(&self) -> Option<&E> {
        match self {
            SubmitError::Rejected(error) => Some(error),
            SubmitError::Panicked(_) => None,
        }
    }
}

impl<E: Display> Display for SubmitError<E> {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self {
            SubmitError::Rejected(error) => write!(f, "{error}"),
            SubmitError::Panicked(message) => write!(f, "submit handler panicked: {message}"),
        }
    }
}

/// Data owned by a running form machine.
///
/// `errors` is only ever populated by a rejected validation and
/// `submit_error` only by a rejected submission.
#[derive(Clone, Debug, Eq, PartialEq)]
pub struct FormContext<V, E> {
    pub values: FormValues<V>,
    pub errors: FormErrors,
    pub touched: FormTouched,
    pub validate_on_blur: bool,
    pub validate_on_change: bool,
    pub on_change_validator_debounce: Duration,
    pub submit_error: Option<SubmitError<E>>,
}

impl<V, E> FormContext<V, E> {
    pub fn new(values: FormValues<V>, options: FormOptions) -> Self {
        Self {
            values,
            errors: FormErrors::new(),
            touched: FormTouched::new(),
            validate_on_blur: options.validate_on_blur,
            validate_on_change: options.validate_on_change,
            on_change_validator_debounce: options.on_change_validator_debounce,
            submit_error: None,
        }
    }

    pub fn is_valid(&self) -> bool {
        self.errors.is_empty()
    }

    /// Delay spent in `changing` before the debounce elapses.
    pub fn validator_debounce(&self) -> Duration {
        if self.validate_on_change {
            self.on_change_validator_debounce
        } else {
            Duration::ZERO
        }
    }

    pub fn options(&self) -> FormOptions {
        FormOptions {
            validate_on_blur: self.validate_on_blur,
            validate_on_change: self.validate_on_change,
            on_change_validator_debounce: self.on_change_validator_debounce,
        }
    }
}

impl<V, E> Default for FormContext<V, E> {
    fn default() -> Self {
        Self::new(FormValues::new(), FormOptions::default())
    }
}

#[derive(Clone, Copy, Debug, Eq, PartialEq, Hash)]
pub enum FormEventKind {
    Change,
    Blur,
    Submit,
    Reset,
    SetValues,
    SetFieldTouched,
    SetValidateOnBlur,
    SetValidateOnChange,
}

/// Events a view routes into the machine.
#[derive(Clone, Debug, PartialEq)]
pub enum FormEvent<V> {
    Change {
        field: FieldKey,
        value: V,
    },
    Blur {
        field: FieldKey,
    },
    Submit,
    Reset,
    SetValues {
        values: FormValues<V>,
        should_validate: bool,
    },
    SetFieldTouched {
        touched: FormTouched,
        should_validate: bool,
    },
    SetValidateOnBlur {
        should_validate: bool,
    },
    SetValidateOnChange {
        should_validate: bool,
    },
}

impl<V> FormEvent<V> {
    pub fn change(field: impl Into<FieldKey>, value: V) -> Self {
        FormEvent::Change {
            field: field.into(),
            value,
        }
    }

    pub fn blur(field: impl Into<FieldKey>) -> Self {
        FormEvent::Blur {
            field: field.into(),
        }
    }

    pub fn submit() -> Self {
        FormEvent::Submit
    }

    pub fn reset() -> Self {
        FormEvent::Reset
    }

    pub fn set_values(values: FormValues<V>, should_validate: bool) -> Self {
        FormEvent::SetValues {
            values,
            should_validate,
        }
    }

    pub fn set_field_touched(touched: FormTouched, should_validate: bool) -> Self {
        FormEvent::SetFieldTouched {
            touched,
            should_validate,
        }
    }

    pub fn set_validate_on_blur(should_validate: bool) -> Self {
        FormEvent::SetValidateOnBlur { should_validate }
    }

    pub fn set_validate_on_change(should_validate: bool) -> Self {
        FormEvent::SetValidateOnChange { should_validate }
    }

    pub fn kind(&self) -> FormEventKind {
        match self {
            FormEvent::Change { .. } => FormEventKind::Change,
            FormEvent::Blur { .. } => FormEventKind::Blur,
            FormEvent::Submit => FormEventKind::Submit,
            FormEvent::Reset => FormEventKind::Reset,
            FormEvent::SetValues { .. } => FormEventKind::SetValues,
            FormEvent::SetFieldTouched { .. } => FormEventKind::SetFieldTouched,
            FormEvent::SetValidateOnBlur { .. } => FormEventKind::SetValidateOnBlur,
            FormEvent::SetValidateOnChange { .. } => FormEventKind::SetValidateOnChange,
        }
    }
}

/// Typed field catalogue, usually produced by `#[derive(FormModel)]`.
pub trait FormModel {
    type Fields;

    const FIELD_NAMES: &'static [&'static str];

    fn fields() -> Self::Fields;

    fn field_keys() -> Vec<FieldKey> {
        Self::FIELD_NAMES.iter().map(|name| FieldKey::new(name)).collect()
    }
}
