use std::env;
use std::fs;
use std::path::Path;

fn main() {
    // Create config template if it doesn't exist
    let out_dir = env::var("OUT_DIR").unwrap_or_else(|_| "./".to_string());
    let template_path = Path::new(&out_dir).join("../../../tspes_config.template.toml");

    let template = r#"# tspes configuration template
# Copy this file to 'tspes_config.toml' and adjust the values

# PID of the elementary stream to extract (decimal or 0x-prefixed hex)
pid = 136

# Stop after this many transport packets (0 = read the whole input)
max_packets = 10000

input = "example_new.ts"
output = "PID136.mp2"
"#;

    let _ = fs::write(template_path, template);
    println!("cargo:rerun-if-changed=build.rs");
}
