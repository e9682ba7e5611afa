#![allow(dead_code)]

#[derive(form_machine::form::FormModel)]
struct Draft<T> {
    body: T,
}

fn main() {}
