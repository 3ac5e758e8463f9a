//! Build script for index-soak-proto.
//!
//! Compiles protobuf definitions into Rust code using tonic-prost-build.
//! When the proto sources aren't checked out (e.g., a published crate or a
//! vendored tree), we fall back to the pre-generated code in src/generated/.

use std::path::Path;

fn main() -> Result<(), Box<dyn std::error::Error>> {
    // Declare custom cfg for conditional compilation
    println!("cargo::rustc-check-cfg=cfg(use_pregenerated_proto)");

    let proto_path = Path::new("../../proto/store/v1/store.proto");

    // Only generate if proto files exist (development environment).
    // Otherwise use pre-generated code in src/generated/.
    if proto_path.exists() {
        println!("cargo::rerun-if-changed=../../proto/store/v1/store.proto");

        tonic_prost_build::configure()
            .build_server(true)
            .build_client(true)
            .emit_rerun_if_changed(true)
            .compile_protos(&["../../proto/store/v1/store.proto"], &["../../proto"])?;
    } else {
        // Signal that we're using pre-generated code
        println!("cargo::rustc-cfg=use_pregenerated_proto");
    }

    Ok(())
}
