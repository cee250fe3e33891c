//! Stage binary: unpacks the downloaded firefox archive and tests.zip into
//! the work directory's install tree.

use std::path::PathBuf;

use clap::Parser;
use stoneridge_config::StoneRidgeConfig;
use stoneridge_worker::unpacker::{unpack, unpacker_for, UnpackPlan};
use stoneridge_worker::{os_from, work_dir_from};

#[derive(Parser, Debug)]
#[command(name = "srunpacker", version)]
struct Cli {
    #[arg(long)]
    config: PathBuf,
    #[arg(long)]
    runconfig: PathBuf,
    /// Append tracing output to this file in addition to stderr.
    #[arg(long)]
    log: Option<PathBuf>,
}

fn main() {
    let cli = Cli::parse();
    let _log_guard = stoneridge_config::init_logging(cli.log.as_deref()).expect("failed to init logging");

    let config = match StoneRidgeConfig::load_with_overlay(&cli.config, &cli.runconfig) {
        Ok(c) => c,
        Err(e) => {
            tracing::error!(error = %e, "failed to load config");
            std::process::exit(1);
        }
    };

    let os = match os_from(&config) {
        Ok(os) => os,
        Err(e) => {
            tracing::error!(error = %e, "invalid run os");
            std::process::exit(1);
        }
    };
    let work_dir = work_dir_from(&config);
    let firefox_path = config.get_string("machine", "firefox_path", "firefox");
    let download_suffix = config.get_string("machine", "download_suffix", "tar.bz2");
    let xpcshell_bin = config.get_string("machine", "xpcshell_bin", "xpcshell");
    let pageloader_root = PathBuf::from(config.get_string("unpacker", "pageloader_root", "pageloader"));
    let installdmg_script = PathBuf::from(config.get_string("unpacker", "installdmg_script", "installdmg.sh"));

    let download_dir = work_dir.download_dir();
    let firefox_archive = download_dir.join(format!("firefox.{download_suffix}"));
    let test_zip = download_dir.join("tests.zip");
    let bindir = work_dir.firefox_install_dir(&firefox_path);

    let unpacker = unpacker_for(os, installdmg_script);
    let plan = UnpackPlan {
        firefox_archive: &firefox_archive,
        test_zip: &test_zip,
        workdir: &work_dir.root,
        bindir: &bindir,
        pageloader_root: &pageloader_root,
        xpcshell_bin: &xpcshell_bin,
    };

    if let Err(e) = unpack(unpacker.as_ref(), &plan) {
        tracing::error!(error = %e, "unpacker failed");
        std::process::exit(1);
    }
}

