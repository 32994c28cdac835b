//! Network-interface link state collaborator
//!
//! Enumerates interfaces and their carrier state from `/sys/class/net`.

use std::fmt;
use std::io;
use std::path::Path;

const IFF_LOOPBACK: u32 = 0x8;

/// Link state of one interface
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LinkState {
    Up,
    Down,
    Unknown,
}

impl fmt::Display for LinkState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            LinkState::Up => write!(f, "up"),
            LinkState::Down => write!(f, "down"),
            LinkState::Unknown => write!(f, "unknown"),
        }
    }
}

#[derive(Debug, Clone)]
pub struct Interface {
    pub name: String,
    pub state: LinkState,
    pub loopback: bool,
}

/// Enumerate interfaces with their current link state
pub fn interfaces() -> io::Result<Vec<Interface>> {
    interfaces_from(Path::new("/sys/class/net"))
}

fn interfaces_from(root: &Path) -> io::Result<Vec<Interface>> {
    let mut found = Vec::new();

    for entry in std::fs::read_dir(root)? {
        let entry = entry?;
        let name = entry.file_name().to_string_lossy().into_owned();
        let path = entry.path();

        found.push(Interface {
            state: link_state(&path),
            loopback: is_loopback(&path),
            name,
        });
    }

    found.sort_by(|a, b| a.name.cmp(&b.name));
    Ok(found)
}

fn link_state(path: &Path) -> LinkState {
    match std::fs::read_to_string(path.join("operstate")) {
        Ok(state) => match state.trim() {
            "up" => LinkState::Up,
            "down" => LinkState::Down,
            // Drivers reporting "unknown" still expose carrier
            _ => match std::fs::read_to_string(path.join("carrier")) {
                Ok(carrier) if carrier.trim() == "1" => LinkState::Up,
                Ok(_) => LinkState::Down,
                Err(_) => LinkState::Unknown,
            },
        },
        Err(_) => LinkState::Unknown,
    }
}

fn is_loopback(path: &Path) -> bool {
    std::fs::read_to_string(path.join("flags"))
        .ok()
        .and_then(|flags| u32::from_str_radix(flags.trim().trim_start_matches("0x"), 16).ok())
        .map(|flags| flags & IFF_LOOPBACK != 0)
        .unwrap_or(false)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs;

    fn fake_interface(root: &Path, name: &str, operstate: &str, flags: &str) {
        let dir = root.join(name);
        fs::create_dir_all(&dir).unwrap();
        fs::write(dir.join("operstate"), operstate).unwrap();
        fs::write(dir.join("flags"), flags).unwrap();
    }

    #[test]
    fn test_enumeration_and_state() {
        let root = tempfile::tempdir().unwrap();

        fake_interface(root.path(), "lo", "unknown\n", "0x9\n");
        fs::write(root.path().join("lo/carrier"), "1\n").unwrap();
        fake_interface(root.path(), "eth0", "up\n", "0x1003\n");
        fake_interface(root.path(), "eth1", "down\n", "0x1003\n");

        let found = interfaces_from(root.path()).unwrap();
        assert_eq!(found.len(), 3);

        let eth0 = found.iter().find(|i| i.name == "eth0").unwrap();
        assert_eq!(eth0.state, LinkState::Up);
        assert!(!eth0.loopback);

        let eth1 = found.iter().find(|i| i.name == "eth1").unwrap();
        assert_eq!(eth1.state, LinkState::Down);

        let lo = found.iter().find(|i| i.name == "lo").unwrap();
        assert!(lo.loopback);
        assert_eq!(lo.state, LinkState::Up);
    }

    #[test]
    fn test_missing_operstate_is_unknown() {
        let root = tempfile::tempdir().unwrap();
        fs::create_dir_all(root.path().join("weird0")).unwrap();

        let found = interfaces_from(root.path()).unwrap();
        assert_eq!(found[0].state, LinkState::Unknown);
        assert!(!found[0].loopback);
    }
}
