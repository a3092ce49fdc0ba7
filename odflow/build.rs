fn main() {
    // Prevent warnings when checking for flag `odflow_loom`.
    println!("cargo::rustc-check-cfg=cfg(odflow_loom)");
}
