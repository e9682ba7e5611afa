#![allow(dead_code)]

#[derive(form_machine::form::FormModel)]
enum Step {
    Email,
    Password,
}

fn main() {}
