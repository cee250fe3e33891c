//! Platform DNS backends (spec §4.9: a polymorphic
//! trait/interface with a single `dispatch(os) -> impl`, not the source's
//! constructor-override trick).

use std::path::{Path, PathBuf};
use std::process::Command;

use stoneridge_types::Result;

/// One platform's way of switching and restoring the system DNS server.
/// `save_dns` is called once, at daemon startup, before the accept loop
/// begins; `set_dns`/`reset_dns` are called once per TCP request.
pub trait DnsBackend: Send + Sync {
    fn save_dns(&self) -> Result<()>;
    fn set_dns(&self, server: &str) -> Result<()>;
    fn reset_dns(&self) -> Result<()>;
}

fn run(program: &str, args: &[&str]) -> Result<String> {
    let output = Command::new(program)
        .args(args)
        .output()
        .map_err(|e| anyhow::anyhow!("spawning {program}: {e}"))?;
    if !output.status.success() {
        return Err(anyhow::anyhow!(
            "{program} {args:?} exited {:?}: {}",
            output.status.code(),
            String::from_utf8_lossy(&output.stderr)
        )
        .into());
    }
    Ok(String::from_utf8_lossy(&output.stdout).into_owned())
}

/// Selects the backend for the platform this binary was built for.
pub fn current(run_dir: &Path) -> Box<dyn DnsBackend> {
    #[cfg(target_os = "linux")]
    {
        Box::new(LinuxBackend::new(run_dir))
    }
    #[cfg(target_os = "macos")]
    {
        Box::new(MacBackend::new(run_dir))
    }
    #[cfg(target_os = "windows")]
    {
        Box::new(WindowsBackend::new())
    }
    #[cfg(not(any(target_os = "linux", target_os = "macos", target_os = "windows")))]
    {
        compile_error!("stoneridge-dns has no backend for this target platform")
    }
}

#[cfg(target_os = "linux")]
pub struct LinuxBackend {
    resolvconf: PathBuf,
    backup: PathBuf,
}

#[cfg(target_os = "linux")]
impl LinuxBackend {
    pub fn new(run_dir: &Path) -> Self {
        LinuxBackend {
            resolvconf: PathBuf::from("/etc/resolv.conf"),
            backup: run_dir.join("resolv.conf"),
        }
    }
}

#[cfg(target_os = "linux")]
impl DnsBackend for LinuxBackend {
    fn save_dns(&self) -> Result<()> {
        if !self.backup.exists() {
            std::fs::copy(&self.resolvconf, &self.backup)
                .map_err(|e| anyhow::anyhow!("backing up {}: {e}", self.resolvconf.display()))?;
        }
        Ok(())
    }

    fn set_dns(&self, server: &str) -> Result<()> {
        let original = std::fs::read_to_string(&self.resolvconf)
            .map_err(|e| anyhow::anyhow!("reading {}: {e}", self.resolvconf.display()))?;

        let nsline = format!("nameserver {server}");
        let mut replaced = false;
        let mut lines = Vec::new();
        for line in original.lines() {
            if line.starts_with("nameserver ") {
                if !replaced {
                    lines.push(nsline.clone());
                    replaced = true;
                }
            } else {
                lines.push(line.to_string());
            }
        }
        if !replaced {
            lines.push(nsline);
        }

        std::fs::write(&self.resolvconf, lines.join("\n") + "\n")
            .map_err(|e| anyhow::anyhow!("writing {}: {e}", self.resolvconf.display()))?;
        Ok(())
    }

    fn reset_dns(&self) -> Result<()> {
        std::fs::copy(&self.backup, &self.resolvconf)
            .map_err(|e| anyhow::anyhow!("restoring {}: {e}", self.resolvconf.display()))?;
        Ok(())
    }
}

#[cfg(target_os = "macos")]
pub struct MacBackend {
    backup: PathBuf,
}

#[cfg(target_os = "macos")]
impl MacBackend {
    pub fn new(run_dir: &Path) -> Self {
        MacBackend {
            backup: run_dir.join("dnsbackup"),
        }
    }

    fn main_interface() -> Result<String> {
        let out = run("networksetup", &["-listnetworkserviceorder"])?;
        out.lines()
            .find(|line| line.starts_with("(1)"))
            .map(|line| line.trim_start_matches("(1)").trim().to_string())
            .ok_or_else(|| anyhow::anyhow!("could not determine primary network service").into())
    }
}

#[cfg(target_os = "macos")]
impl DnsBackend for MacBackend {
    fn save_dns(&self) -> Result<()> {
        if self.backup.exists() {
            return Ok(());
        }
        let main_if = Self::main_interface()?;
        let out = run("networksetup", &["-getdnsservers", &main_if])?;
        std::fs::write(&self.backup, out).map_err(|e| anyhow::anyhow!("writing {}: {e}", self.backup.display()))?;
        Ok(())
    }

    fn set_dns(&self, server: &str) -> Result<()> {
        let main_if = Self::main_interface()?;
        run("networksetup", &["-setdnsservers", &main_if, server])?;
        Ok(())
    }

    fn reset_dns(&self) -> Result<()> {
        let main_if = Self::main_interface()?;
        let orig = std::fs::read_to_string(&self.backup)
            .map_err(|e| anyhow::anyhow!("reading {}: {e}", self.backup.display()))?;
        let servers: Vec<&str> = orig.lines().filter(|l| !l.trim().is_empty()).collect();
        if servers.is_empty() {
            return Ok(());
        }
        let mut args = vec!["-setdnsservers", &main_if];
        args.extend(servers);
        run("networksetup", &args)?;
        Ok(())
    }
}

#[cfg(target_os = "windows")]
pub struct WindowsBackend;

#[cfg(target_os = "windows")]
impl WindowsBackend {
    pub fn new() -> Self {
        WindowsBackend
    }
}

#[cfg(target_os = "windows")]
impl DnsBackend for WindowsBackend {
    fn save_dns(&self) -> Result<()> {
        // Windows never changes the primary adapter's DNS servers; only the
        // dedicated StoneRidge interface, which has no prior state to save.
        Ok(())
    }

    fn set_dns(&self, server: &str) -> Result<()> {
        run("netsh.exe", &["interface", "set", "interface", "name=WAN", "admin=DISABLED"])?;
        run(
            "reg.exe",
            &[
                "add",
                r"HKLM\System\CurrentControlSet\Services\TCPIP\Parameters",
                "/v",
                "SearchList",
                "/d",
                "",
                "/f",
            ],
        )?;
        run(
            "netsh.exe",
            &[
                "ipv4", "set", "dnsservers", "StoneRidge", "static", server, "validate=no",
            ],
        )?;
        Ok(())
    }

    fn reset_dns(&self) -> Result<()> {
        run(
            "netsh.exe",
            &[
                "ipv4", "set", "dnsservers", "StoneRidge", "static", "none", "validate=no",
            ],
        )?;
        run("netsh.exe", &["interface", "set", "interface", "name=WAN", "admin=ENABLED"])?;
        run(
            "reg.exe",
            &[
                "add",
                r"HKLM\System\CurrentControlSet\Services\TCPIP\Parameters",
                "/v",
                "SearchList",
                "/d",
                "mozilla.com",
                "/f",
            ],
        )?;
        Ok(())
    }
}

/// In-memory backend for the protocol round-trip test, so the TCP framing
/// logic is exercised without touching any real network configuration.
#[cfg(test)]
#[derive(Clone)]
pub struct FakeBackend {
    succeed: bool,
    pub last_set: std::sync::Arc<std::sync::Mutex<Option<String>>>,
}

#[cfg(test)]
impl FakeBackend {
    pub fn new(succeed: bool) -> Self {
        FakeBackend {
            succeed,
            last_set: std::sync::Arc::new(std::sync::Mutex::new(None)),
        }
    }
}

#[cfg(test)]
impl DnsBackend for FakeBackend {
    fn save_dns(&self) -> Result<()> {
        Ok(())
    }

    fn set_dns(&self, server: &str) -> Result<()> {
        *self.last_set.lock().unwrap() = Some(server.to_string());
        if self.succeed {
            Ok(())
        } else {
            Err(anyhow::anyhow!("fake backend configured to fail").into())
        }
    }

    fn reset_dns(&self) -> Result<()> {
        if self.succeed {
            Ok(())
        } else {
            Err(anyhow::anyhow!("fake backend configured to fail").into())
        }
    }
}
