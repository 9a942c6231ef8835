//! Presentation of status snapshots.
//!
//! The engine hands out `StatusSnapshot` data only. Everything about how a
//! report looks lives here.

use std::fmt::Write as _;
use std::io::{self, Write};

use crossterm::cursor::MoveTo;
use crossterm::queue;
use crossterm::terminal::{Clear, ClearType};

use udpmon_core::{MachineReport, StatusSnapshot};

/// Something that can display a snapshot.
pub trait Render {
    fn render(&mut self, snapshot: &StatusSnapshot) -> io::Result<()>;
}

// ============================================================================
// Console
// ============================================================================

/// Fixed-width text report, redrawn in place.
pub struct ConsoleRenderer<W: Write> {
    out: W,
    clear_screen: bool,
}

impl ConsoleRenderer<io::Stdout> {
    /// Renders to stdout, clearing the terminal before each report.
    pub fn stdout() -> Self {
        Self::new(io::stdout(), true)
    }
}

impl<W: Write> ConsoleRenderer<W> {
    pub fn new(out: W, clear_screen: bool) -> Self {
        Self { out, clear_screen }
    }

    pub fn into_inner(self) -> W {
        self.out
    }
}

impl<W: Write> Render for ConsoleRenderer<W> {
    fn render(&mut self, snapshot: &StatusSnapshot) -> io::Result<()> {
        if self.clear_screen {
            queue!(self.out, Clear(ClearType::All), MoveTo(0, 0))?;
        }
        self.out.write_all(format_report(snapshot).as_bytes())?;
        self.out.flush()
    }
}

/// Formats the whole report.
pub fn format_report(snapshot: &StatusSnapshot) -> String {
    let mut text = format!("\n----STATUS{}\n\n", "-".repeat(60));
    for machine in &snapshot.machines {
        text.push_str(&format_row(machine));
        text.push('\n');
    }
    let _ = write!(text, "\n{}\n\n", "-".repeat(70));
    text
}

/// Formats one machine row: identity, session column, then metrics.
pub fn format_row(machine: &MachineReport) -> String {
    let mut session = String::from("session: ");
    match machine.role {
        Some(role) => {
            let _ = write!(session, "{} {} ", role.label(), machine.qualifier.label());
        }
        None => {
            let _ = write!(session, "{} ", machine.qualifier.label());
        }
    }
    let _ = write!(session, "<{}>", machine.session);

    let mut row = format!("{:<16}{:<40}", format!("<{}>", machine.id), session);
    if let Some(status) = machine.status {
        let _ = write!(row, " v={} FPS={}", status.version, status.fps);
    }
    row
}

// ============================================================================
// JSON
// ============================================================================

/// One JSON document per report, newline-terminated.
pub struct JsonRenderer<W: Write> {
    out: W,
}

impl JsonRenderer<io::Stdout> {
    pub fn stdout() -> Self {
        Self::new(io::stdout())
    }
}

impl<W: Write> JsonRenderer<W> {
    pub fn new(out: W) -> Self {
        Self { out }
    }

    pub fn into_inner(self) -> W {
        self.out
    }
}

impl<W: Write> Render for JsonRenderer<W> {
    fn render(&mut self, snapshot: &StatusSnapshot) -> io::Result<()> {
        serde_json::to_writer(&mut self.out, snapshot)?;
        self.out.write_all(b"\n")?;
        self.out.flush()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{TimeZone, Utc};
    use udpmon_core::{MachineId, MachineStatus, Qualifier, Role, SessionName};

    fn row(id: &str, role: Option<Role>, qualifier: Qualifier, status: Option<MachineStatus>) -> MachineReport {
        MachineReport {
            id: MachineId::new(id),
            session: SessionName::new("roomA"),
            role,
            qualifier,
            status,
        }
    }

    fn snapshot(machines: Vec<MachineReport>) -> StatusSnapshot {
        StatusSnapshot {
            taken_at: Utc.with_ymd_and_hms(2024, 1, 1, 12, 0, 0).unwrap(),
            machines,
            sessions: Vec::new(),
        }
    }

    #[test]
    fn test_format_master_row() {
        let line = format_row(&row(
            "m1",
            Some(Role::Master),
            Qualifier::InSession,
            Some(MachineStatus::new(2.0, 30)),
        ));
        assert_eq!(
            line,
            format!("{:<16}{:<40} v=2 FPS=30", "<m1>", "session: MASTER in <roomA>")
        );
    }

    #[test]
    fn test_format_just_joined_and_waiting_rows() {
        let line = format_row(&row("m2", Some(Role::Slave), Qualifier::JustJoined, None));
        assert_eq!(line.trim_end(), "<m2>            session: SLAVE just joined <roomA>");

        let line = format_row(&row("m3", None, Qualifier::WaitingToJoin, None));
        assert_eq!(line.trim_end(), "<m3>            session: waiting to join <roomA>");
    }

    #[test]
    fn test_format_fractional_version() {
        let line = format_row(&row(
            "m1",
            Some(Role::Master),
            Qualifier::InSession,
            Some(MachineStatus::new(1.5, 60)),
        ));
        assert!(line.ends_with(" v=1.5 FPS=60"));
    }

    #[test]
    fn test_format_report_frame() {
        let report = format_report(&snapshot(vec![row("m3", None, Qualifier::WaitingToJoin, None)]));
        let lines: Vec<&str> = report.lines().collect();
        assert_eq!(lines[1], format!("----STATUS{}", "-".repeat(60)));
        assert!(lines[3].starts_with("<m3>"));
        assert_eq!(lines[5], "-".repeat(70));
    }

    #[test]
    fn test_console_renderer_without_clear() {
        let mut renderer = ConsoleRenderer::new(Vec::new(), false);
        renderer.render(&snapshot(Vec::new())).unwrap();
        let out = String::from_utf8(renderer.into_inner()).unwrap();
        assert_eq!(out, format_report(&snapshot(Vec::new())));
    }

    #[test]
    fn test_json_renderer_writes_one_line_per_report() {
        let mut renderer = JsonRenderer::new(Vec::new());
        let snap = snapshot(vec![row("m1", Some(Role::Master), Qualifier::JustJoined, None)]);
        renderer.render(&snap).unwrap();
        renderer.render(&snap).unwrap();

        let out = String::from_utf8(renderer.into_inner()).unwrap();
        let lines: Vec<&str> = out.lines().collect();
        assert_eq!(lines.len(), 2);

        let parsed: StatusSnapshot = serde_json::from_str(lines[0]).unwrap();
        assert_eq!(parsed, snap);
        assert!(lines[0].contains("\"role\":\"MASTER\""));
    }
}
