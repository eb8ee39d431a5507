/// Resolve the caller's identity from the environment.
///
/// Checks `HOTDESK_USER` first so several people sharing one OS
/// account can tell themselves apart, then falls back to `USER`.
pub fn resolve_user() -> String {
    for var in ["HOTDESK_USER", "USER"] {
        if let Ok(value) = std::env::var(var)
            && !value.is_empty()
        {
            return value;
        }
    }
    generated_fallback()
}

/// Auto-generated fallback for environments with no usable identity.
pub fn generated_fallback() -> String {
    let mut bytes = [0_u8; 4];
    if getrandom::fill(&mut bytes).is_err() {
        return format!("user-{}", std::process::id());
    }
    let token: String = bytes.iter().map(|b| format!("{b:02x}")).collect();
    format!("user-{token}")
}
