use std::env;
use std::fs;
use std::path::Path;

fn main() {
    // Create config template if it doesn't exist
    let out_dir = env::var("OUT_DIR").unwrap_or_else(|_| "./".to_string());
    let template_path = Path::new(&out_dir).join("../../../tsdemux.template.toml");

    let template = r#"# tsdemux configuration template
# Copy this file to 'tsdemux.toml' next to your binary and adjust the values.

# Verify the CRC32 of PAT/PMT sections and drop sections that fail
verify_crc = false

# Upper bound in bytes for a single reassembled PES packet
max_pes_size = 4194304

# Log packets on PIDs that no program claims at warn level instead of debug
log_unhandled_pids = false
"#;

    let _ = fs::write(template_path, template);
    println!("cargo:rerun-if-changed=build.rs");
}
