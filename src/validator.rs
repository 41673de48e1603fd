//! Cross-field invariants that apply to a fully assembled message, shared
//! between the end of parsing and the start of formatting so the two paths
//! can never drift apart.

use crate::error::MessageError;
use crate::header::{Header, MessageType};

/// Checks the invariants that apply to Empty messages (`code_class == 0 &&
/// code_detail == 0`) and to Reset messages (`type == Reset`).
///
/// An Empty message must be Confirmable or Acknowledgement (never
/// NonConfirmable), must carry no token, no options and no payload. A Reset
/// message is always Empty, so the same four checks apply to it.
pub fn validate(
    header: &Header,
    token_len: usize,
    options_empty: bool,
    payload_len: usize,
) -> Result<(), MessageError> {
    let is_reset = header.get_type() == MessageType::Reset;
    let is_empty_code = header.get_code_class() == 0 && header.get_code_detail() == 0;

    if is_reset && !is_empty_code {
        return Err(MessageError::InvalidMessageSemantics);
    }

    if is_empty_code {
        if header.get_type() == MessageType::NonConfirmable {
            return Err(MessageError::InvalidMessageSemantics);
        }
        if token_len != 0 || !options_empty || payload_len != 0 {
            return Err(MessageError::InvalidMessageSemantics);
        }
    }

    Ok(())
}
