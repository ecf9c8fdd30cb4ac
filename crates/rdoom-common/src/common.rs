// common.rs — console printing shared by every crate
//
// com_printf / com_dprintf / com_warning go through the `log` facade so the
// embedding program picks the sink. A redirect buffer can capture output
// instead, which is how callers (and tests) collect the text of one operation.

use std::cell::RefCell;

thread_local! {
    static RD_BUFFER: RefCell<Option<String>> = const { RefCell::new(None) };
}

// ============================================================
// Redirect buffer
// ============================================================

/// Begin redirecting printed output on this thread into a buffer.
pub fn com_begin_redirect() {
    RD_BUFFER.with(|b| *b.borrow_mut() = Some(String::new()));
}

/// End the redirect and return whatever was captured.
pub fn com_end_redirect() -> Option<String> {
    RD_BUFFER.with(|b| b.borrow_mut().take())
}

/// Appends to the redirect buffer. Returns false when no redirect is active.
fn redirect(msg: &str) -> bool {
    RD_BUFFER.with(|b| match b.borrow_mut().as_mut() {
        Some(s) => {
            s.push_str(msg);
            true
        }
        None => false,
    })
}

// ============================================================
// Com_Printf / Com_DPrintf / Com_Warning
// ============================================================

/// General-purpose print.
pub fn com_printf(msg: &str) {
    if redirect(msg) {
        return;
    }
    log::info!("{}", msg.trim_end());
}

/// Developer-only print, gated on the "developer" cvar.
pub fn com_dprintf(msg: &str) {
    if crate::cvar::cvar_variable_value("developer") == 0.0 {
        return;
    }
    if redirect(msg) {
        return;
    }
    log::debug!("{}", msg.trim_end());
}

/// Report a recoverable anomaly, such as a malformed level reference.
pub fn com_warning(msg: &str) {
    if redirect(&format!("WARNING: {}", msg)) {
        return;
    }
    log::warn!("{}", msg.trim_end());
}
