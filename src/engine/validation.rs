//! Field rules for new orders. Rules run in table order and the first
//! failure wins, so clients always see one stable message.

use once_cell::sync::Lazy;
use regex::Regex;

use crate::models::order::OrderInput;

/// Colombian mobile numbers: ten digits starting with 3.
pub fn is_mobile_number(phone: &str) -> bool {
    static RE: Lazy<Regex> = Lazy::new(|| Regex::new(r"^3\d{9}$").expect("valid regex"));
    RE.is_match(phone.trim())
}

pub fn is_email(email: &str) -> bool {
    static RE: Lazy<Regex> =
        Lazy::new(|| Regex::new(r"^[^\s@]+@[^\s@]+\.[^\s@]+$").expect("valid regex"));
    RE.is_match(email.trim())
}

type Rule = (fn(&OrderInput) -> bool, &'static str);

fn present(value: &str) -> bool {
    !value.trim().is_empty()
}

const RULES: &[Rule] = &[
    (|o| o.weight > 0.0, "El peso debe ser mayor que 0"),
    (
        |o| o.dimensions.length > 0.0 && o.dimensions.width > 0.0 && o.dimensions.height > 0.0,
        "Las dimensiones del paquete deben ser mayores que 0",
    ),
    (|o| present(&o.product_type), "El tipo de producto es requerido"),
    (
        |o| present(&o.recipient_name),
        "El nombre del destinatario es requerido",
    ),
    (
        |o| is_email(&o.recipient_email),
        "El correo electrónico del destinatario no es válido",
    ),
    (
        |o| is_mobile_number(&o.recipient_phone),
        "El teléfono del destinatario debe ser un celular válido de Colombia",
    ),
    (
        |o| o.sender_email.as_deref().map_or(true, is_email),
        "El correo electrónico del remitente no es válido",
    ),
    (
        |o| o.sender_phone.as_deref().map_or(true, is_mobile_number),
        "El teléfono del remitente debe ser un celular válido de Colombia",
    ),
];

/// Returns the message of the first rule the input breaks.
pub fn check_order_input(input: &OrderInput) -> Result<(), &'static str> {
    match RULES.iter().find(|(holds, _)| !holds(input)) {
        Some(&(_, message)) => Err(message),
        None => Ok(()),
    }
}
