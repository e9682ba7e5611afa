#![allow(dead_code)]

#[derive(form_machine::form::FormModel)]
struct Credentials(String, String);

fn main() {}
