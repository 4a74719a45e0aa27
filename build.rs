use std::env;

/// Enables a monitor/wait strategy cfg when its cargo feature is on, the target
/// is x86, loom is off and the integrator has not set `<var>=0`.
fn enable(feature: &str, var: &str, cfg: &str, x86: bool, loom: bool) {
    println!("cargo::rerun-if-env-changed={var}");

    let requested = env::var_os(format!("CARGO_FEATURE_{feature}")).is_some();
    let overridden = matches!(env::var(var).as_deref(), Ok("0") | Ok("false"));

    if requested && x86 && !loom && !overridden {
        println!("cargo::rustc-cfg={cfg}");
    }
}

fn main() {
    let arch = env::var("CARGO_CFG_TARGET_ARCH").unwrap_or_default();
    let x86 = matches!(arch.as_str(), "x86" | "x86_64");
    // loom cannot model monitor/wait, nor can it hand out a raw address.
    let loom = env::var_os("CARGO_FEATURE_LOOM").is_some();

    enable("MONITORX", "SPINX_MONITORX", "spinx_monitorx", x86, loom);
    enable("UMONITOR", "SPINX_UMONITOR", "spinx_umonitor", x86, loom);

    println!("cargo::rerun-if-changed=build.rs");
}
