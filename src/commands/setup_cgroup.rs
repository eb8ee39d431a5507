use colored::Colorize;

use crate::config::Config;
use crate::error::{HotdeskError, Result};
use crate::output::Format;
use crate::track::cgroup;

/// Report whether cgroup-backed tracking can work on this host, and
/// print the one-time admin setup when it cannot. Exits non-zero in
/// that case so provisioning scripts can gate on it.
pub fn run(config: &Config, format: Format) -> Result<()> {
    let cgroup2 = cgroup::is_cgroup2();
    let base = &config.cgroup_base;
    // The probe migrates this process into the base group. Fine for a
    // short-lived CLI, and the only way to prove delegation works.
    let manageable = cgroup2 && cgroup::can_manage(base);

    match format {
        Format::Json => println!(
            "{}",
            serde_json::json!({
                "cgroup2": cgroup2,
                "base": base,
                "manageable": manageable,
            })
        ),
        Format::Minimal => println!("{}", if manageable { "ready" } else { "unavailable" }),
        Format::Pretty => {
            let yes_no = |ok: bool| {
                if ok {
                    "yes".green()
                } else {
                    "no".red()
                }
            };
            println!("cgroup v2 mounted:  {}", yes_no(cgroup2));
            println!("base directory:     {}", base.display());
            println!("desks manageable:   {}", yes_no(manageable));
        }
    }

    if manageable {
        if format == Format::Pretty {
            println!();
            println!("Cgroup tracking is ready. Desks started now get cgroup-backed tracking.");
        }
        return Ok(());
    }

    if format == Format::Pretty {
        println!();
        println!("{}", "One-time setup (run as an admin):".bold());
        println!("  sudo mkdir -p {}", base.display());
        println!("  sudo chown -R $(id -un) {}", base.display());
        println!();
        println!("Until then, desks fall back to pane-tree tracking.");
    }

    let reason = if cgroup2 {
        format!("cgroup base not writable: {}", base.display())
    } else {
        "cgroup v2 not detected (missing /sys/fs/cgroup/cgroup.controllers)".to_string()
    };
    Err(HotdeskError::TrackingUnavailable(reason))
}
