//! Rendering of caught panics

use std::any::Any;

/// Best-effort text of a panic payload
pub fn panic_message(panic: &(dyn Any + Send)) -> String {
    if let Some(message) = panic.downcast_ref::<&str>() {
        (*message).to_string()
    } else if let Some(message) = panic.downcast_ref::<String>() {
        message.clone()
    } else {
        "unknown panic payload".to_string()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_panic_message_variants() {
        let literal: Box<dyn Any + Send> = Box::new("static text");
        let owned: Box<dyn Any + Send> = Box::new(format!("slave {}", 3));
        let other: Box<dyn Any + Send> = Box::new(42u32);

        assert_eq!(panic_message(literal.as_ref()), "static text");
        assert_eq!(panic_message(owned.as_ref()), "slave 3");
        assert_eq!(panic_message(other.as_ref()), "unknown panic payload");
    }
}
