//! Running-process check used to gate destructive operations

use super::GameLayout;
use std::path::Path;

/// Check whether the game is currently running.
///
/// Looks through `/proc` for a process whose name or command line matches the
/// game's process name or either executable. Under Proton the game shows up
/// as a Windows executable path in the command line.
pub fn is_game_running(layout: &GameLayout) -> bool {
    let needles = process_needles(layout);
    let Ok(entries) = std::fs::read_dir("/proc") else {
        return false;
    };

    entries
        .filter_map(|e| e.ok())
        .filter(|e| {
            e.file_name()
                .to_str()
                .map(|name| name.chars().all(|c| c.is_ascii_digit()))
                .unwrap_or(false)
        })
        .any(|e| process_matches(&e.path(), &needles))
}

fn process_needles(layout: &GameLayout) -> Vec<String> {
    let mut needles = vec![layout.process_name.to_lowercase()];
    for exe in [&layout.executable_64, &layout.executable_32] {
        if let Some(name) = exe.file_name().and_then(|n| n.to_str()) {
            let name = name.to_lowercase();
            if !needles.contains(&name) {
                needles.push(name);
            }
        }
    }
    needles
}

fn process_matches(proc_dir: &Path, needles: &[String]) -> bool {
    // comm is truncated to 15 bytes by the kernel
    if let Ok(comm) = std::fs::read_to_string(proc_dir.join("comm")) {
        if comm_matches(&comm.trim().to_lowercase(), needles) {
            return true;
        }
    }

    match std::fs::read(proc_dir.join("cmdline")) {
        Ok(raw) => {
            let cmdline = String::from_utf8_lossy(&raw).replace('\0', " ").to_lowercase();
            cmdline_matches(&cmdline, needles)
        }
        Err(_) => false,
    }
}

fn comm_matches(comm: &str, needles: &[String]) -> bool {
    const COMM_LEN: usize = 15;
    !comm.is_empty()
        && needles
            .iter()
            .any(|n| n.starts_with(comm) && comm.len() >= COMM_LEN.min(n.len()))
}

fn cmdline_matches(cmdline: &str, needles: &[String]) -> bool {
    needles
        .iter()
        .filter(|n| n.ends_with(".exe"))
        .any(|n| cmdline.contains(n.as_str()))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn needles_include_process_and_executables() {
        let needles = process_needles(&GameLayout::default());
        assert_eq!(needles, vec!["septaroad voyager".to_string(), "srvgame.exe".to_string()]);
    }

    #[test]
    fn comm_matching_handles_truncation() {
        let needles = process_needles(&GameLayout::default());
        assert!(comm_matches("septaroad voyag", &needles));
        assert!(comm_matches("srvgame.exe", &needles));
        assert!(!comm_matches("srv", &needles));
        assert!(!comm_matches("", &needles));
    }

    #[test]
    fn cmdline_matching_uses_executable_names() {
        let needles = process_needles(&GameLayout::default());
        assert!(cmdline_matches(
            r"z:\games\steamapps\common\septaroad voyager\binaries\win64\srvgame.exe -seekfreeloading",
            &needles
        ));
        assert!(!cmdline_matches("/usr/bin/bash", &needles));
    }
}
