#![allow(dead_code)]

use assert_cmd::Command;
use std::time::Duration;

/// Nothing listens here, so any remote call fails fast.
pub const UNREACHABLE_ADDR: &str = "127.0.0.1:1";

/// A `wsh` command isolated from the caller's environment.
///
/// Stdin is a pipe, so the terminal can never be acquired.
pub fn wsh() -> Command {
    let bin_path = env!("CARGO_BIN_EXE_wsh");
    let mut cmd = Command::new(bin_path);
    cmd.timeout(Duration::from_secs(30));
    for var in ["WSH_NETWORK", "WSH_ADDR", "WSH_ROOTFS", "WSH_LOG", "WSH_LOG_FILE"] {
        cmd.env_remove(var);
    }
    cmd.write_stdin("");
    cmd
}
