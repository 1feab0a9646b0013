//! Log line formats, one line per event.
//!
//! Lines are returned without the trailing newline; the sink appends it.
//! Embedded line breaks are escaped so one event is always one line.

use podtrace_events::{ExecEvent, KernelEvent, OpenEvent, TcpEvent};

/// `exec: {image}`
#[must_use]
pub fn exec_line(event: &ExecEvent) -> String {
    format!("exec: {}", single_line(event.image_name()))
}

/// `open: {path}`
#[must_use]
pub fn open_line(event: &OpenEvent) -> String {
    format!("open: {}", single_line(&event.path))
}

/// `{operation}: {src}->{dst}`
#[must_use]
pub fn tcp_line(event: &TcpEvent) -> String {
    format!(
        "{}: {}->{}",
        single_line(&event.operation),
        single_line(&event.saddr),
        single_line(&event.daddr)
    )
}

/// `syscall: {name}`, for live events and drained history alike.
#[must_use]
pub fn syscall_line(name: &str) -> String {
    format!("syscall: {}", single_line(name))
}

/// Formats any kernel event.
#[must_use]
pub fn event_line(event: &KernelEvent) -> String {
    match event {
        KernelEvent::Exec(e) => exec_line(e),
        KernelEvent::Open(e) => open_line(e),
        KernelEvent::Tcp(e) => tcp_line(e),
        KernelEvent::Syscall(e) => syscall_line(&e.name),
    }
}

fn single_line(field: &str) -> std::borrow::Cow<'_, str> {
    if field.contains(['\n', '\r']) {
        field.replace('\n', "\\n").replace('\r', "\\r").into()
    } else {
        field.into()
    }
}

#[cfg(test)]
mod tests {
    use podtrace_common::types::ContainerKey;
    use podtrace_events::SyscallEvent;

    use super::*;

    fn key() -> ContainerKey {
        ContainerKey::new("a", "b", "c")
    }

    #[test]
    fn exec_uses_image_name() {
        let event = ExecEvent {
            key: key(),
            retval: 0,
            comm: "sh".into(),
            args: vec![],
        };
        assert_eq!(exec_line(&event), "exec: sh");
    }

    #[test]
    fn open_line_format() {
        let event = OpenEvent {
            key: key(),
            ret: 3,
            path: "/etc/passwd".into(),
        };
        assert_eq!(open_line(&event), "open: /etc/passwd");
    }

    #[test]
    fn tcp_line_format() {
        let event = TcpEvent {
            key: key(),
            operation: "connect".into(),
            saddr: "10.0.0.2:41000".into(),
            daddr: "10.0.0.9:443".into(),
        };
        assert_eq!(tcp_line(&event), "connect: 10.0.0.2:41000->10.0.0.9:443");
    }

    #[test]
    fn syscall_line_format() {
        let event = KernelEvent::Syscall(SyscallEvent::new(key(), "openat"));
        assert_eq!(event_line(&event), "syscall: openat");
    }

    #[test]
    fn embedded_newlines_are_escaped() {
        let event = OpenEvent {
            key: key(),
            ret: 3,
            path: "/tmp/evil\nexec: fake".into(),
        };
        assert_eq!(open_line(&event), "open: /tmp/evil\\nexec: fake");
    }
}
