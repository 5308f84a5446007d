use sha2::{Digest, Sha256};

/// Derive the stable identifier for this host.
///
/// The id is a SHA-256 over a fixed list of durable host signals. The same
/// machine yields the same id across process restarts; none of the inputs
/// change between runs short of an OS reinstall or rename.
pub fn derive_device_id() -> String {
    let mut hasher = Sha256::new();
    for (key, value) in host_signals() {
        hasher.update(key.as_bytes());
        hasher.update(b"=");
        hasher.update(value.as_bytes());
        hasher.update(b";");
    }
    hex::encode(hasher.finalize())
}

/// Durable low-entropy signals folded into the device id
pub fn host_signals() -> Vec<(String, String)> {
    vec![
        ("os".to_string(), std::env::consts::OS.to_string()),
        ("arch".to_string(), std::env::consts::ARCH.to_string()),
        ("family".to_string(), std::env::consts::FAMILY.to_string()),
        ("cpus".to_string(), cpu_count().to_string()),
        ("hostname".to_string(), hostname()),
        ("user".to_string(), username()),
    ]
}

/// Logical CPU count, 1 when the platform cannot report it
pub fn cpu_count() -> usize {
    std::thread::available_parallelism()
        .map(|n| n.get())
        .unwrap_or(1)
}

/// Host name from the environment, with a filesystem fallback on unix
pub fn hostname() -> String {
    if let Ok(name) = std::env::var("HOSTNAME") {
        if !name.trim().is_empty() {
            return name.trim().to_string();
        }
    }
    if let Ok(name) = std::env::var("COMPUTERNAME") {
        if !name.trim().is_empty() {
            return name.trim().to_string();
        }
    }
    if let Ok(contents) = std::fs::read_to_string("/etc/hostname") {
        let name = contents.trim();
        if !name.is_empty() {
            return name.to_string();
        }
    }
    "unknown-host".to_string()
}

/// Login name of the user running the process
pub fn username() -> String {
    std::env::var("USER")
        .or_else(|_| std::env::var("USERNAME"))
        .unwrap_or_else(|_| "unknown".to_string())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_device_id_is_sha256_hex() {
        let id = derive_device_id();
        assert_eq!(id.len(), 64);
        assert!(id.chars().all(|c| c.is_ascii_hexdigit()));
    }

    #[test]
    fn test_device_id_is_stable() {
        assert_eq!(derive_device_id(), derive_device_id());
    }

    #[test]
    fn test_host_signals_cover_expected_keys() {
        let signals = host_signals();
        let keys: Vec<&str> = signals.iter().map(|(k, _)| k.as_str()).collect();
        assert_eq!(
            keys,
            vec!["os", "arch", "family", "cpus", "hostname", "user"]
        );
        assert!(signals.iter().all(|(_, v)| !v.is_empty()));
    }
}
