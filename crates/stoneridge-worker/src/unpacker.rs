//! Unpacks the firefox distribution and the tests zipfile and puts every
//! file where the runner expects it. Mirroring the upstream `srunpacker`
//! agent: the platform-specific part is only how the firefox
//! archive itself is extracted (tar+bzip2 on Linux, zip on Windows, a
//! helper shell script on Mac); everything after that is common.

use std::io::Read;
use std::path::{Path, PathBuf};

use stoneridge_types::request::OperatingSystem;
use stoneridge_types::{Result, StoneRidgeError};

/// Extracts the browser distribution archive into `dest`. Platform dispatch
/// is a trait rather than a runtime subclass switch.
pub trait FirefoxUnpacker {
    fn unpack_firefox(&self, archive: &Path, dest: &Path) -> Result<()>;
}

pub struct LinuxUnpacker;
impl FirefoxUnpacker for LinuxUnpacker {
    fn unpack_firefox(&self, archive: &Path, dest: &Path) -> Result<()> {
        let file = std::fs::File::open(archive)
            .map_err(|e| StoneRidgeError::UnpackFailed(format!("opening {}: {e}", archive.display())))?;
        let decoder = bzip2::read::BzDecoder::new(file);
        let mut tar = tar::Archive::new(decoder);
        tar.unpack(dest)
            .map_err(|e| StoneRidgeError::UnpackFailed(format!("untarring {}: {e}", archive.display())))
    }
}

pub struct WindowsUnpacker;
impl FirefoxUnpacker for WindowsUnpacker {
    fn unpack_firefox(&self, archive: &Path, dest: &Path) -> Result<()> {
        let file = std::fs::File::open(archive)
            .map_err(|e| StoneRidgeError::UnpackFailed(format!("opening {}: {e}", archive.display())))?;
        let mut zip = zip::ZipArchive::new(file)
            .map_err(|e| StoneRidgeError::UnpackFailed(format!("reading zip {}: {e}", archive.display())))?;
        zip.extract(dest)
            .map_err(|e| StoneRidgeError::UnpackFailed(format!("extracting {}: {e}", archive.display())))
    }
}

/// Mac ships its build as a DMG; there's no pure-Rust DMG reader in the
/// reference material, so this shells out to a helper script.
pub struct MacUnpacker {
    pub installdmg_script: PathBuf,
}
impl FirefoxUnpacker for MacUnpacker {
    fn unpack_firefox(&self, archive: &Path, dest: &Path) -> Result<()> {
        let output = std::process::Command::new("/bin/bash")
            .arg(&self.installdmg_script)
            .arg(archive)
            .current_dir(dest)
            .output()
            .map_err(|e| StoneRidgeError::UnpackFailed(format!("spawning installdmg.sh: {e}")))?;
        if !output.status.success() {
            return Err(StoneRidgeError::UnpackFailed(format!(
                "installdmg.sh exited {:?}: {}",
                output.status.code(),
                String::from_utf8_lossy(&output.stderr)
            )));
        }
        Ok(())
    }
}

pub fn unpacker_for(os: OperatingSystem, installdmg_script: PathBuf) -> Box<dyn FirefoxUnpacker> {
    match os {
        OperatingSystem::Linux => Box::new(LinuxUnpacker),
        OperatingSystem::Windows => Box::new(WindowsUnpacker),
        OperatingSystem::Mac => Box::new(MacUnpacker { installdmg_script }),
    }
}

/// Everything the unpacker needs to know about where to put things, kept as
/// one struct rather than threading five separate path arguments through
/// `unpack`.
pub struct UnpackPlan<'a> {
    pub firefox_archive: &'a Path,
    pub test_zip: &'a Path,
    pub workdir: &'a Path,
    pub bindir: &'a Path,
    pub pageloader_root: &'a Path,
    pub xpcshell_bin: &'a str,
}

pub fn unpack(unpacker: &dyn FirefoxUnpacker, plan: &UnpackPlan) -> Result<()> {
    unpacker.unpack_firefox(plan.firefox_archive, plan.workdir)?;

    let unzip_dir = plan.workdir.join("tests");
    std::fs::create_dir_all(&unzip_dir)
        .map_err(|e| StoneRidgeError::UnpackFailed(format!("creating {}: {e}", unzip_dir.display())))?;
    extract_bin_members(plan.test_zip, &unzip_dir)?;

    let unzip_bin = unzip_dir.join("bin");
    let xpcshell = unzip_bin.join(plan.xpcshell_bin);
    set_executable(&xpcshell)?;
    copy_file(&xpcshell, &plan.bindir.join(plan.xpcshell_bin))?;

    copy_tree(&unzip_bin, "components", plan.bindir)?;
    copy_tree(&unzip_bin, "plugins", plan.bindir)?;

    copy_tree(plan.pageloader_root, "components", plan.bindir)?;
    copy_tree(plan.pageloader_root, "chrome", plan.bindir)?;

    let chrome_dir = plan.bindir.join("chrome");
    let srdata_dst = chrome_dir.join("srdata.js");
    if srdata_dst.exists() {
        std::fs::remove_file(&srdata_dst)
            .map_err(|e| StoneRidgeError::UnpackFailed(format!("removing {}: {e}", srdata_dst.display())))?;
    }
    copy_file(&plan.pageloader_root.join("srdata.js"), &srdata_dst)?;

    append_chrome_manifest(
        &plan.pageloader_root.join("chrome.manifest"),
        &plan.bindir.join("chrome.manifest"),
    )
}

/// Unzip only the `bin/*` members of the tests bundle, matching
/// `srunpacker`'s member filter.
fn extract_bin_members(test_zip: &Path, dest: &Path) -> Result<()> {
    let file = std::fs::File::open(test_zip)
        .map_err(|e| StoneRidgeError::UnpackFailed(format!("opening {}: {e}", test_zip.display())))?;
    let mut zip = zip::ZipArchive::new(file)
        .map_err(|e| StoneRidgeError::UnpackFailed(format!("reading zip {}: {e}", test_zip.display())))?;

    for i in 0..zip.len() {
        let mut entry = zip
            .by_index(i)
            .map_err(|e| StoneRidgeError::UnpackFailed(format!("reading zip entry: {e}")))?;
        let name = entry.name().to_string();
        if !name.starts_with("bin") {
            continue;
        }
        let outpath = dest.join(&name);
        if entry.is_dir() {
            std::fs::create_dir_all(&outpath)
                .map_err(|e| StoneRidgeError::UnpackFailed(format!("creating {}: {e}", outpath.display())))?;
            continue;
        }
        if let Some(parent) = outpath.parent() {
            std::fs::create_dir_all(parent)
                .map_err(|e| StoneRidgeError::UnpackFailed(format!("creating {}: {e}", parent.display())))?;
        }
        let mut buf = Vec::new();
        entry
            .read_to_end(&mut buf)
            .map_err(|e| StoneRidgeError::UnpackFailed(format!("reading {name}: {e}")))?;
        std::fs::write(&outpath, buf)
            .map_err(|e| StoneRidgeError::UnpackFailed(format!("writing {}: {e}", outpath.display())))?;
    }
    Ok(())
}

#[cfg(unix)]
fn set_executable(path: &Path) -> Result<()> {
    use std::os::unix::fs::PermissionsExt;
    let mut perms = std::fs::metadata(path)
        .map_err(|e| StoneRidgeError::UnpackFailed(format!("stat {}: {e}", path.display())))?
        .permissions();
    perms.set_mode(0o755);
    std::fs::set_permissions(path, perms)
        .map_err(|e| StoneRidgeError::UnpackFailed(format!("chmod {}: {e}", path.display())))
}

#[cfg(not(unix))]
fn set_executable(_path: &Path) -> Result<()> {
    Ok(())
}

fn copy_file(src: &Path, dst: &Path) -> Result<()> {
    if let Some(parent) = dst.parent() {
        std::fs::create_dir_all(parent)
            .map_err(|e| StoneRidgeError::UnpackFailed(format!("creating {}: {e}", parent.display())))?;
    }
    std::fs::copy(src, dst)
        .map_err(|e| StoneRidgeError::UnpackFailed(format!("copying {} -> {}: {e}", src.display(), dst.display())))?;
    Ok(())
}

/// Recursively copy `srcdir/name/*` into `dstdir/name/`, matching
/// `srunpacker`'s `_copy_tree`.
fn copy_tree(srcdir: &Path, name: &str, dstdir: &Path) -> Result<()> {
    let src = srcdir.join(name);
    if !src.exists() {
        return Ok(());
    }
    let dst = dstdir.join(name);
    std::fs::create_dir_all(&dst)
        .map_err(|e| StoneRidgeError::UnpackFailed(format!("creating {}: {e}", dst.display())))?;
    copy_dir_recursive(&src, &dst)
}

fn copy_dir_recursive(src: &Path, dst: &Path) -> Result<()> {
    for entry in std::fs::read_dir(src)
        .map_err(|e| StoneRidgeError::UnpackFailed(format!("reading {}: {e}", src.display())))?
    {
        let entry = entry.map_err(|e| StoneRidgeError::UnpackFailed(e.to_string()))?;
        let from = entry.path();
        let to = dst.join(entry.file_name());
        if entry
            .file_type()
            .map_err(|e| StoneRidgeError::UnpackFailed(e.to_string()))?
            .is_dir()
        {
            std::fs::create_dir_all(&to)
                .map_err(|e| StoneRidgeError::UnpackFailed(format!("creating {}: {e}", to.display())))?;
            copy_dir_recursive(&from, &to)?;
        } else {
            copy_file(&from, &to)?;
        }
    }
    Ok(())
}

/// Append the pageloader's `chrome.manifest` lines to the firefox install's
/// own, matching `srunpacker`'s read-both-write-concatenated approach.
fn append_chrome_manifest(pageloader_manifest: &Path, firefox_manifest: &Path) -> Result<()> {
    let mut combined = if firefox_manifest.exists() {
        std::fs::read(firefox_manifest)
            .map_err(|e| StoneRidgeError::UnpackFailed(format!("reading {}: {e}", firefox_manifest.display())))?
    } else {
        Vec::new()
    };
    if pageloader_manifest.exists() {
        let extra = std::fs::read(pageloader_manifest).map_err(|e| {
            StoneRidgeError::UnpackFailed(format!("reading {}: {e}", pageloader_manifest.display()))
        })?;
        combined.extend_from_slice(&extra);
    }
    std::fs::write(firefox_manifest, combined)
        .map_err(|e| StoneRidgeError::UnpackFailed(format!("writing {}: {e}", firefox_manifest.display())))
}
