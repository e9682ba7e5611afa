use form_machine::form::{FieldKey, FormModel, FormValues};

#[derive(Clone, form_machine::form::FormModel)]
struct LoginForm {
    email: String,
    password: String,
}

fn main() {
    let fields = LoginForm::fields();
    assert_eq!(fields.email(), FieldKey::new("email"));
    assert_eq!(LoginForm::FIELD_NAMES, &["email", "password"]);

    let values: FormValues<String> = LoginForm {
        email: "a@b.com".to_string(),
        password: String::new(),
    }
    .into_form_values();
    assert_eq!(values.get("email").map(String::as_str), Some("a@b.com"));
    assert_eq!(values.len(), 2);
}
