//! Human-readable notices written into a terminal stream.

const GREEN: &str = "\x1b[32m";
const YELLOW: &str = "\x1b[33m";
const RED: &str = "\x1b[31m";
const RESET: &str = "\x1b[0m";

fn framed(color: &str, text: &str) -> String {
    format!("\r\n{color}[{text}]{RESET}\r\n")
}

pub fn connected(session_id: &str) -> String {
    framed(GREEN, &format!("Connected to session {session_id}"))
}

pub fn process_exited(code: Option<i32>) -> String {
    match code {
        Some(code) => framed(YELLOW, &format!("Process exited with code {code}")),
        None => framed(YELLOW, "Process exited"),
    }
}

pub fn start_failed(reason: &str) -> String {
    framed(RED, &format!("Failed to start session: {reason}"))
}

pub fn already_attached(session_id: &str) -> String {
    framed(RED, &format!("Session {session_id} is already attached"))
}

pub fn disconnected() -> String {
    framed(RED, "Disconnected")
}
